use crate::model::{
    AiInstance, AiInstanceUpdate, Checkpoint, CheckpointFilter, CheckpointScope, CheckpointUpdate,
    Id, InstanceListFilter, NewAiInstance, NewCheckpoint, NewPrediction, NewTemplate,
    PrelabelOutput, Prediction, Template, TemplateListFilter, TemplateUpdate,
};
use anyhow::Result;

#[async_trait::async_trait]
pub trait TemplateStore: Send + Sync {
    async fn get_template(&self, id: &Id) -> Result<Option<Template>>;
    async fn list_templates(&self, filter: &TemplateListFilter) -> Result<Vec<Template>>;
    /// Inserts a new template and returns the store-assigned id.
    async fn insert_template(&self, new: NewTemplate) -> Result<Id>;
    /// Partial update; returns the id on success without re-fetching.
    async fn update_template(&self, id: &Id, update: TemplateUpdate) -> Result<Option<Id>>;
    async fn delete_template(&self, id: &Id) -> Result<Option<Id>>;
    /// The only way the default-checkpoint pointer moves.
    async fn set_default_checkpoint(
        &self,
        template_id: &Id,
        checkpoint_id: Option<Id>,
    ) -> Result<Option<Id>>;
}

#[async_trait::async_trait]
pub trait AiInstanceStore: Send + Sync {
    async fn get_instance(&self, id: &Id) -> Result<Option<AiInstance>>;
    async fn list_instances(&self, filter: &InstanceListFilter) -> Result<Vec<AiInstance>>;
    async fn insert_instance(&self, new: NewAiInstance) -> Result<Id>;
    async fn update_instance(&self, id: &Id, update: AiInstanceUpdate) -> Result<Option<Id>>;
    async fn delete_instance(&self, id: &Id) -> Result<Option<Id>>;
}

#[async_trait::async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn get_checkpoint(&self, id: &Id) -> Result<Option<Checkpoint>>;
    /// Executes a resolver-built filter; no uniqueness enforcement here.
    async fn find_checkpoints(&self, filter: &CheckpointFilter) -> Result<Vec<Checkpoint>>;
    async fn insert_checkpoint(&self, new: NewCheckpoint) -> Result<Id>;
    async fn update_checkpoint(&self, id: &Id, update: CheckpointUpdate) -> Result<Option<Id>>;
    async fn delete_checkpoint(&self, id: &Id) -> Result<Option<Id>>;
    /// Moves `tag` within `scope` to the checkpoint `to`: clears the current
    /// holder(s) and sets the new one as a single store-side step, so a
    /// concurrent reader never observes two holders.
    async fn transfer_tag(&self, scope: &CheckpointScope, tag: &str, to: &Id) -> Result<Id>;
}

#[async_trait::async_trait]
pub trait PredictionStore: Send + Sync {
    async fn get_prediction(&self, id: &Id) -> Result<Option<Prediction>>;
    async fn insert_prediction(&self, new: NewPrediction) -> Result<Id>;
    /// Inserts one output child; independent of any other child insert.
    async fn insert_output(&self, output: PrelabelOutput) -> Result<()>;
    /// Outputs ordered by sequence index.
    async fn list_outputs(&self, prediction_id: &Id) -> Result<Vec<PrelabelOutput>>;
}

pub trait Store:
    TemplateStore + AiInstanceStore + CheckpointStore + PredictionStore + Send + Sync
{
}
