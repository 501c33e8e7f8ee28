use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    Json as RequestJson,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::logic::{
    self, InstanceManager, RegistryError, TemplateManager,
};
use crate::model::{
    project, projection, AiInstanceUpdate, Checkpoint, CheckpointUpdate, EntityKind, Id,
    InstanceListFilter, NewAiInstance, NewCheckpoint, NewTemplate, PrelabelBody, PrelabelOutput,
    Prediction, TagFilter, TemplateListFilter, TemplateUpdate, Visibility,
};
use crate::store::traits::Store;

pub type AppState<S> = Arc<S>;

/// Simple health check endpoint
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

#[derive(Debug, Serialize)]
pub struct ListResponse<T> {
    pub items: Vec<T>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: &str) -> Self {
        Self {
            error: message.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct IdResponse {
    pub id: Id,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn registry_error(err: RegistryError) -> ApiError {
    let status = match &err {
        RegistryError::AmbiguousCheckpoint { .. } => StatusCode::CONFLICT,
        RegistryError::InvalidReference(_) => StatusCode::UNPROCESSABLE_ENTITY,
        RegistryError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(ErrorResponse::new(&err.to_string())))
}

fn store_error(err: anyhow::Error) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse::new(&err.to_string())),
    )
}

fn not_found(what: &str) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse::new(&format!("{} not found", what))),
    )
}

fn bad_request(message: &str) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(ErrorResponse::new(message)))
}

/// Serializes an entity and trims it to the BASE (or BASE++EXTRA) projection.
fn projected<T: Serialize>(entity: &T, kind: EntityKind, verbose: bool) -> serde_json::Value {
    let value = serde_json::to_value(entity).unwrap_or(serde_json::Value::Null);
    project(&value, &projection(kind, verbose))
}

fn projected_list<T: Serialize>(
    items: &[T],
    kind: EntityKind,
    verbose: bool,
) -> ListResponse<serde_json::Value> {
    ListResponse {
        total: items.len(),
        items: items.iter().map(|i| projected(i, kind, verbose)).collect(),
    }
}

#[derive(Debug, Deserialize)]
pub struct VerboseQuery {
    pub verbose: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct TemplateListQuery {
    pub name: Option<String>,
    pub version: Option<i32>,
    pub visibility: Option<Visibility>,
    pub trainable: Option<bool>,
    pub verbose: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct InstanceListQuery {
    pub name: Option<String>,
    pub ai_name: Option<String>,
    pub ai_version: Option<String>,
    pub visibility: Option<Visibility>,
    pub checkpoint_tag: Option<String>,
    pub verbose: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct CheckpointListQuery {
    /// `tagged`, `untagged` or `all` (default).
    pub tags: Option<TagFilter>,
    pub verbose: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct ResolveQuery {
    pub tag: Option<String>,
    /// Template resolution only: fall back to the default-checkpoint pointer
    /// when the tag misses.
    pub fallback_to_default: Option<bool>,
}

// ---------------------------------------------------------------------------
// Templates

pub async fn list_templates<S: Store>(
    State(store): State<AppState<S>>,
    Query(query): Query<TemplateListQuery>,
) -> Result<Json<ListResponse<serde_json::Value>>, ApiError> {
    let filter = TemplateListFilter {
        name: query.name,
        version: query.version,
        visibility: query.visibility,
        trainable: query.trainable,
    };
    let templates = TemplateManager::new(store)
        .list(&filter)
        .await
        .map_err(registry_error)?;
    Ok(Json(projected_list(
        &templates,
        EntityKind::Template,
        query.verbose.unwrap_or(false),
    )))
}

pub async fn create_template<S: Store>(
    State(store): State<AppState<S>>,
    RequestJson(new): RequestJson<NewTemplate>,
) -> Result<(StatusCode, Json<IdResponse>), ApiError> {
    let id = TemplateManager::new(store)
        .create(new)
        .await
        .map_err(registry_error)?;
    Ok((StatusCode::CREATED, Json(IdResponse { id })))
}

pub async fn get_template<S: Store>(
    State(store): State<AppState<S>>,
    Path(id): Path<Id>,
    Query(query): Query<VerboseQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let template = TemplateManager::new(store)
        .get(&id)
        .await
        .map_err(registry_error)?
        .ok_or_else(|| not_found("template"))?;
    Ok(Json(projected(
        &template,
        EntityKind::Template,
        query.verbose.unwrap_or(false),
    )))
}

pub async fn update_template<S: Store>(
    State(store): State<AppState<S>>,
    Path(id): Path<Id>,
    RequestJson(update): RequestJson<TemplateUpdate>,
) -> Result<Json<IdResponse>, ApiError> {
    let id = TemplateManager::new(store)
        .update(&id, update)
        .await
        .map_err(registry_error)?
        .ok_or_else(|| not_found("template"))?;
    Ok(Json(IdResponse { id }))
}

pub async fn delete_template<S: Store>(
    State(store): State<AppState<S>>,
    Path(id): Path<Id>,
) -> Result<Json<IdResponse>, ApiError> {
    let id = TemplateManager::new(store)
        .delete(&id)
        .await
        .map_err(registry_error)?
        .ok_or_else(|| not_found("template"))?;
    Ok(Json(IdResponse { id }))
}

#[derive(Debug, Deserialize)]
pub struct DefaultCheckpointBody {
    pub checkpoint_id: Option<Id>,
}

pub async fn get_default_checkpoint<S: Store>(
    State(store): State<AppState<S>>,
    Path(id): Path<Id>,
) -> Result<Json<Option<Checkpoint>>, ApiError> {
    let checkpoint = logic::resolve_default_for_template(&*store, &id)
        .await
        .map_err(registry_error)?;
    Ok(Json(checkpoint))
}

pub async fn set_default_checkpoint<S: Store>(
    State(store): State<AppState<S>>,
    Path(id): Path<Id>,
    RequestJson(body): RequestJson<DefaultCheckpointBody>,
) -> Result<Json<IdResponse>, ApiError> {
    let id = TemplateManager::new(store)
        .set_default_checkpoint(&id, body.checkpoint_id)
        .await
        .map_err(registry_error)?
        .ok_or_else(|| not_found("template"))?;
    Ok(Json(IdResponse { id }))
}

// ---------------------------------------------------------------------------
// Instances

pub async fn list_instances<S: Store>(
    State(store): State<AppState<S>>,
    Query(query): Query<InstanceListQuery>,
) -> Result<Json<ListResponse<serde_json::Value>>, ApiError> {
    let filter = InstanceListFilter {
        name: query.name,
        ai_name: query.ai_name,
        ai_version: query.ai_version,
        visibility: query.visibility,
        checkpoint_tag: query.checkpoint_tag,
    };
    let instances = InstanceManager::new(store)
        .list(&filter)
        .await
        .map_err(registry_error)?;
    Ok(Json(projected_list(
        &instances,
        EntityKind::Instance,
        query.verbose.unwrap_or(false),
    )))
}

pub async fn create_instance<S: Store>(
    State(store): State<AppState<S>>,
    RequestJson(new): RequestJson<NewAiInstance>,
) -> Result<(StatusCode, Json<IdResponse>), ApiError> {
    let id = InstanceManager::new(store)
        .create(new)
        .await
        .map_err(registry_error)?;
    Ok((StatusCode::CREATED, Json(IdResponse { id })))
}

pub async fn get_instance<S: Store>(
    State(store): State<AppState<S>>,
    Path(id): Path<Id>,
    Query(query): Query<VerboseQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let instance = InstanceManager::new(store)
        .get(&id)
        .await
        .map_err(registry_error)?
        .ok_or_else(|| not_found("instance"))?;
    Ok(Json(projected(
        &instance,
        EntityKind::Instance,
        query.verbose.unwrap_or(false),
    )))
}

pub async fn update_instance<S: Store>(
    State(store): State<AppState<S>>,
    Path(id): Path<Id>,
    RequestJson(update): RequestJson<AiInstanceUpdate>,
) -> Result<Json<IdResponse>, ApiError> {
    let id = InstanceManager::new(store)
        .update(&id, update)
        .await
        .map_err(registry_error)?
        .ok_or_else(|| not_found("instance"))?;
    Ok(Json(IdResponse { id }))
}

pub async fn delete_instance<S: Store>(
    State(store): State<AppState<S>>,
    Path(id): Path<Id>,
) -> Result<Json<IdResponse>, ApiError> {
    let id = InstanceManager::new(store)
        .delete(&id)
        .await
        .map_err(registry_error)?
        .ok_or_else(|| not_found("instance"))?;
    Ok(Json(IdResponse { id }))
}

// ---------------------------------------------------------------------------
// Checkpoints

/// Checkpoint creation body without scope fields; the route supplies the
/// scope, so a caller can never write into someone else's.
#[derive(Debug, Deserialize)]
pub struct NewCheckpointBody {
    pub tag: Option<String>,
    pub version: i32,
    pub parent_version: Option<i32>,
    pub weights_path: String,
    pub metadata: Option<serde_json::Value>,
    pub description: Option<String>,
}

impl NewCheckpointBody {
    fn into_new_checkpoint(self, template_id: Id, ai_instance_id: Option<Id>) -> NewCheckpoint {
        NewCheckpoint {
            template_id,
            ai_instance_id,
            tag: self.tag,
            version: self.version,
            parent_version: self.parent_version,
            weights_path: self.weights_path,
            metadata: self.metadata,
            description: self.description,
        }
    }
}

pub async fn list_template_checkpoints<S: Store>(
    State(store): State<AppState<S>>,
    Path(id): Path<Id>,
    Query(query): Query<CheckpointListQuery>,
) -> Result<Json<ListResponse<serde_json::Value>>, ApiError> {
    let checkpoints = logic::list_for_template(&*store, &id, query.tags.unwrap_or_default())
        .await
        .map_err(registry_error)?;
    Ok(Json(projected_list(
        &checkpoints,
        EntityKind::Checkpoint,
        query.verbose.unwrap_or(false),
    )))
}

pub async fn create_template_checkpoint<S: Store>(
    State(store): State<AppState<S>>,
    Path(id): Path<Id>,
    RequestJson(body): RequestJson<NewCheckpointBody>,
) -> Result<(StatusCode, Json<IdResponse>), ApiError> {
    if store
        .get_template(&id)
        .await
        .map_err(store_error)?
        .is_none()
    {
        return Err(not_found("template"));
    }
    let checkpoint_id = store
        .insert_checkpoint(body.into_new_checkpoint(id, None))
        .await
        .map_err(store_error)?;
    Ok((StatusCode::CREATED, Json(IdResponse { id: checkpoint_id })))
}

pub async fn resolve_template_checkpoint<S: Store>(
    State(store): State<AppState<S>>,
    Path(id): Path<Id>,
    Query(query): Query<ResolveQuery>,
) -> Result<Json<Option<Checkpoint>>, ApiError> {
    let tag = query.tag.as_deref();
    let resolved = if query.fallback_to_default.unwrap_or(false) {
        logic::resolve_or_default_for_template(&*store, &id, tag).await
    } else {
        logic::resolve_for_template(&*store, &id, tag).await
    }
    .map_err(registry_error)?;
    Ok(Json(resolved))
}

pub async fn list_instance_checkpoints<S: Store>(
    State(store): State<AppState<S>>,
    Path(id): Path<Id>,
    Query(query): Query<CheckpointListQuery>,
) -> Result<Json<ListResponse<serde_json::Value>>, ApiError> {
    let checkpoints = logic::list_for_instance(&*store, &id, query.tags.unwrap_or_default())
        .await
        .map_err(registry_error)?;
    Ok(Json(projected_list(
        &checkpoints,
        EntityKind::Checkpoint,
        query.verbose.unwrap_or(false),
    )))
}

pub async fn create_instance_checkpoint<S: Store>(
    State(store): State<AppState<S>>,
    Path(id): Path<Id>,
    RequestJson(body): RequestJson<NewCheckpointBody>,
) -> Result<(StatusCode, Json<IdResponse>), ApiError> {
    let instance = store
        .get_instance(&id)
        .await
        .map_err(store_error)?
        .ok_or_else(|| not_found("instance"))?;
    let checkpoint_id = store
        .insert_checkpoint(body.into_new_checkpoint(instance.template_id, Some(id)))
        .await
        .map_err(store_error)?;
    Ok((StatusCode::CREATED, Json(IdResponse { id: checkpoint_id })))
}

pub async fn resolve_instance_checkpoint<S: Store>(
    State(store): State<AppState<S>>,
    Path(id): Path<Id>,
    Query(query): Query<ResolveQuery>,
) -> Result<Json<Option<Checkpoint>>, ApiError> {
    let resolved = logic::resolve_for_instance(&*store, &id, query.tag.as_deref())
        .await
        .map_err(registry_error)?;
    Ok(Json(resolved))
}

pub async fn get_checkpoint<S: Store>(
    State(store): State<AppState<S>>,
    Path(id): Path<Id>,
    Query(query): Query<VerboseQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let checkpoint = store
        .get_checkpoint(&id)
        .await
        .map_err(store_error)?
        .ok_or_else(|| not_found("checkpoint"))?;
    Ok(Json(projected(
        &checkpoint,
        EntityKind::Checkpoint,
        query.verbose.unwrap_or(false),
    )))
}

pub async fn update_checkpoint<S: Store>(
    State(store): State<AppState<S>>,
    Path(id): Path<Id>,
    RequestJson(update): RequestJson<CheckpointUpdate>,
) -> Result<Json<IdResponse>, ApiError> {
    let id = store
        .update_checkpoint(&id, update)
        .await
        .map_err(store_error)?
        .ok_or_else(|| not_found("checkpoint"))?;
    Ok(Json(IdResponse { id }))
}

pub async fn delete_checkpoint<S: Store>(
    State(store): State<AppState<S>>,
    Path(id): Path<Id>,
) -> Result<Json<IdResponse>, ApiError> {
    let id = store
        .delete_checkpoint(&id)
        .await
        .map_err(store_error)?
        .ok_or_else(|| not_found("checkpoint"))?;
    Ok(Json(IdResponse { id }))
}

#[derive(Debug, Deserialize)]
pub struct PromoteBody {
    pub tag: String,
}

/// Moves a tag to this checkpoint within its own scope, displacing the
/// current holder in one store-side step.
pub async fn promote_checkpoint<S: Store>(
    State(store): State<AppState<S>>,
    Path(id): Path<Id>,
    RequestJson(body): RequestJson<PromoteBody>,
) -> Result<Json<IdResponse>, ApiError> {
    if body.tag.trim().is_empty() {
        return Err(bad_request("tag must be non-empty"));
    }
    let checkpoint = store
        .get_checkpoint(&id)
        .await
        .map_err(store_error)?
        .ok_or_else(|| not_found("checkpoint"))?;
    let holder = store
        .transfer_tag(&checkpoint.scope(), &body.tag, &id)
        .await
        .map_err(store_error)?;
    Ok(Json(IdResponse { id: holder }))
}

// ---------------------------------------------------------------------------
// Predictions

#[derive(Debug, Deserialize)]
pub struct PrelabelRequest {
    pub app_id: Id,
    pub job_id: Id,
    pub checkpoint_id: Id,
    pub assignment_type: String,
    /// A single output object or a list of them.
    pub outputs: PrelabelBody,
}

pub async fn submit_prelabel<S: Store>(
    State(store): State<AppState<S>>,
    RequestJson(request): RequestJson<PrelabelRequest>,
) -> Result<(StatusCode, Json<IdResponse>), ApiError> {
    let prediction_id = logic::submit_prelabel(
        &*store,
        request.outputs,
        request.app_id,
        request.job_id,
        request.checkpoint_id,
        request.assignment_type,
    )
    .await
    .map_err(store_error)?;
    Ok((
        StatusCode::CREATED,
        Json(IdResponse { id: prediction_id }),
    ))
}

pub async fn get_prediction<S: Store>(
    State(store): State<AppState<S>>,
    Path(id): Path<Id>,
) -> Result<Json<Prediction>, ApiError> {
    let prediction = store
        .get_prediction(&id)
        .await
        .map_err(store_error)?
        .ok_or_else(|| not_found("prediction"))?;
    Ok(Json(prediction))
}

pub async fn list_prediction_outputs<S: Store>(
    State(store): State<AppState<S>>,
    Path(id): Path<Id>,
) -> Result<Json<ListResponse<PrelabelOutput>>, ApiError> {
    if store
        .get_prediction(&id)
        .await
        .map_err(store_error)?
        .is_none()
    {
        return Err(not_found("prediction"));
    }
    let outputs = store.list_outputs(&id).await.map_err(store_error)?;
    Ok(Json(ListResponse {
        total: outputs.len(),
        items: outputs,
    }))
}
