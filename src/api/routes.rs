use axum::{
    routing::{delete, get, patch, post, put},
    Router,
};
use std::sync::Arc;

use crate::api::handlers;
use crate::store::traits::Store;

pub fn create_router<S: Store + 'static>() -> Router<Arc<S>> {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Template management
        .route("/templates", get(handlers::list_templates::<S>))
        .route("/templates", post(handlers::create_template::<S>))
        .route("/templates/:id", get(handlers::get_template::<S>))
        .route("/templates/:id", patch(handlers::update_template::<S>))
        .route("/templates/:id", delete(handlers::delete_template::<S>))
        // Default-checkpoint pointer (explicit id indirection, not tag lookup)
        .route(
            "/templates/:id/default-checkpoint",
            get(handlers::get_default_checkpoint::<S>),
        )
        .route(
            "/templates/:id/default-checkpoint",
            put(handlers::set_default_checkpoint::<S>),
        )
        // Template-scoped checkpoints
        .route(
            "/templates/:id/checkpoints",
            get(handlers::list_template_checkpoints::<S>),
        )
        .route(
            "/templates/:id/checkpoints",
            post(handlers::create_template_checkpoint::<S>),
        )
        .route(
            "/templates/:id/checkpoints/resolve",
            get(handlers::resolve_template_checkpoint::<S>),
        )
        // Instance management
        .route("/instances", get(handlers::list_instances::<S>))
        .route("/instances", post(handlers::create_instance::<S>))
        .route("/instances/:id", get(handlers::get_instance::<S>))
        .route("/instances/:id", patch(handlers::update_instance::<S>))
        .route("/instances/:id", delete(handlers::delete_instance::<S>))
        // Instance-scoped checkpoints
        .route(
            "/instances/:id/checkpoints",
            get(handlers::list_instance_checkpoints::<S>),
        )
        .route(
            "/instances/:id/checkpoints",
            post(handlers::create_instance_checkpoint::<S>),
        )
        .route(
            "/instances/:id/checkpoints/resolve",
            get(handlers::resolve_instance_checkpoint::<S>),
        )
        // Checkpoint access and tag promotion
        .route("/checkpoints/:id", get(handlers::get_checkpoint::<S>))
        .route("/checkpoints/:id", patch(handlers::update_checkpoint::<S>))
        .route("/checkpoints/:id", delete(handlers::delete_checkpoint::<S>))
        .route(
            "/checkpoints/:id/promote",
            post(handlers::promote_checkpoint::<S>),
        )
        // Prelabel predictions
        .route("/predictions", post(handlers::submit_prelabel::<S>))
        .route("/predictions/:id", get(handlers::get_prediction::<S>))
        .route(
            "/predictions/:id/outputs",
            get(handlers::list_prediction_outputs::<S>),
        )
}
