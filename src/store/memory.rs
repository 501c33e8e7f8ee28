use std::collections::HashMap;

use anyhow::{anyhow, Result};
use parking_lot::RwLock;

use crate::model::{
    contains_ci, generate_id, AiInstance, AiInstanceUpdate, Checkpoint, CheckpointFilter,
    CheckpointScope, CheckpointUpdate, Id, InstanceListFilter, NewAiInstance, NewCheckpoint,
    NewPrediction, NewTemplate, PrelabelOutput, Prediction, Template, TemplateListFilter,
    TemplateUpdate,
};
use crate::store::traits::{
    AiInstanceStore, CheckpointStore, PredictionStore, Store, TemplateStore,
};

/// In-memory store used by tests and local runs (`REGISTRY_STORE=memory`).
///
/// Unlike the Postgres schema it carries no unique index on `(scope, tag)`,
/// so writers that bypass `transfer_tag` can break the one-holder-per-tag
/// invariant; the resolver's multi-row check is what surfaces that.
#[derive(Debug, Default)]
pub struct MemoryStore {
    templates: RwLock<HashMap<Id, Template>>,
    instances: RwLock<HashMap<Id, AiInstance>>,
    checkpoints: RwLock<HashMap<Id, Checkpoint>>,
    predictions: RwLock<HashMap<Id, Prediction>>,
    outputs: RwLock<Vec<PrelabelOutput>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn sorted_by_creation<T, F: Fn(&T) -> chrono::DateTime<chrono::Utc>>(
    mut rows: Vec<T>,
    key: F,
) -> Vec<T> {
    rows.sort_by_key(|row| key(row));
    rows
}

#[async_trait::async_trait]
impl TemplateStore for MemoryStore {
    async fn get_template(&self, id: &Id) -> Result<Option<Template>> {
        Ok(self.templates.read().get(id).cloned())
    }

    async fn list_templates(&self, filter: &TemplateListFilter) -> Result<Vec<Template>> {
        let rows = self
            .templates
            .read()
            .values()
            .filter(|t| {
                filter
                    .name
                    .as_ref()
                    .map_or(true, |n| contains_ci(&t.name, n))
                    && filter.version.map_or(true, |v| t.version == v)
                    && filter.visibility.map_or(true, |v| t.visibility == v)
                    && filter.trainable.map_or(true, |b| t.trainable == b)
            })
            .cloned()
            .collect();
        Ok(sorted_by_creation(rows, |t| t.created_at))
    }

    async fn insert_template(&self, new: NewTemplate) -> Result<Id> {
        let id = generate_id();
        let template = new.into_template(id.clone());
        self.templates.write().insert(id.clone(), template);
        Ok(id)
    }

    async fn update_template(&self, id: &Id, update: TemplateUpdate) -> Result<Option<Id>> {
        let mut templates = self.templates.write();
        match templates.get_mut(id) {
            Some(template) => {
                template.apply_update(update);
                Ok(Some(id.clone()))
            }
            None => Ok(None),
        }
    }

    async fn delete_template(&self, id: &Id) -> Result<Option<Id>> {
        // Store-side foreign keys: deletion fails while dependents exist.
        if self
            .instances
            .read()
            .values()
            .any(|i| &i.template_id == id)
            || self
                .checkpoints
                .read()
                .values()
                .any(|c| &c.template_id == id)
        {
            return Err(anyhow!(
                "template {} is referenced by instances or checkpoints",
                id
            ));
        }
        Ok(self.templates.write().remove(id).map(|t| t.id))
    }

    async fn set_default_checkpoint(
        &self,
        template_id: &Id,
        checkpoint_id: Option<Id>,
    ) -> Result<Option<Id>> {
        let mut templates = self.templates.write();
        match templates.get_mut(template_id) {
            Some(template) => {
                template.default_checkpoint = checkpoint_id;
                template.updated_at = chrono::Utc::now();
                Ok(Some(template_id.clone()))
            }
            None => Ok(None),
        }
    }
}

#[async_trait::async_trait]
impl AiInstanceStore for MemoryStore {
    async fn get_instance(&self, id: &Id) -> Result<Option<AiInstance>> {
        Ok(self.instances.read().get(id).cloned())
    }

    async fn list_instances(&self, filter: &InstanceListFilter) -> Result<Vec<AiInstance>> {
        let templates = self.templates.read();
        let rows = self
            .instances
            .read()
            .values()
            .filter(|i| {
                let template = templates.get(&i.template_id);
                filter
                    .name
                    .as_ref()
                    .map_or(true, |n| contains_ci(&i.name, n))
                    && filter.ai_name.as_ref().map_or(true, |n| {
                        template.map_or(false, |t| contains_ci(&t.name, n))
                    })
                    && filter.ai_version.as_ref().map_or(true, |v| {
                        template.map_or(false, |t| contains_ci(&t.version.to_string(), v))
                    })
                    && filter.visibility.map_or(true, |v| i.visibility == v)
                    && filter
                        .checkpoint_tag
                        .as_ref()
                        .map_or(true, |tag| i.checkpoint_tag.as_deref() == Some(tag))
            })
            .cloned()
            .collect();
        Ok(sorted_by_creation(rows, |i| i.created_at))
    }

    async fn insert_instance(&self, new: NewAiInstance) -> Result<Id> {
        if !self.templates.read().contains_key(&new.template_id) {
            return Err(anyhow!("template {} does not exist", new.template_id));
        }
        let id = generate_id();
        let instance = new.into_instance(id.clone());
        self.instances.write().insert(id.clone(), instance);
        Ok(id)
    }

    async fn update_instance(&self, id: &Id, update: AiInstanceUpdate) -> Result<Option<Id>> {
        let mut instances = self.instances.write();
        match instances.get_mut(id) {
            Some(instance) => {
                instance.apply_update(update);
                Ok(Some(id.clone()))
            }
            None => Ok(None),
        }
    }

    async fn delete_instance(&self, id: &Id) -> Result<Option<Id>> {
        if self
            .checkpoints
            .read()
            .values()
            .any(|c| c.ai_instance_id.as_ref() == Some(id))
        {
            return Err(anyhow!("instance {} is referenced by checkpoints", id));
        }
        Ok(self.instances.write().remove(id).map(|i| i.id))
    }
}

#[async_trait::async_trait]
impl CheckpointStore for MemoryStore {
    async fn get_checkpoint(&self, id: &Id) -> Result<Option<Checkpoint>> {
        Ok(self.checkpoints.read().get(id).cloned())
    }

    async fn find_checkpoints(&self, filter: &CheckpointFilter) -> Result<Vec<Checkpoint>> {
        let rows = self
            .checkpoints
            .read()
            .values()
            .filter(|c| c.scope() == filter.scope && filter.tag.matches(c.tag.as_deref()))
            .cloned()
            .collect();
        Ok(sorted_by_creation(rows, |c| c.created_at))
    }

    async fn insert_checkpoint(&self, new: NewCheckpoint) -> Result<Id> {
        if !self.templates.read().contains_key(&new.template_id) {
            return Err(anyhow!("template {} does not exist", new.template_id));
        }
        if let Some(instance_id) = &new.ai_instance_id {
            if !self.instances.read().contains_key(instance_id) {
                return Err(anyhow!("instance {} does not exist", instance_id));
            }
        }
        let id = generate_id();
        let checkpoint = new.into_checkpoint(id.clone());
        self.checkpoints.write().insert(id.clone(), checkpoint);
        Ok(id)
    }

    async fn update_checkpoint(&self, id: &Id, update: CheckpointUpdate) -> Result<Option<Id>> {
        let mut checkpoints = self.checkpoints.write();
        match checkpoints.get_mut(id) {
            Some(checkpoint) => {
                checkpoint.apply_update(update);
                Ok(Some(id.clone()))
            }
            None => Ok(None),
        }
    }

    async fn delete_checkpoint(&self, id: &Id) -> Result<Option<Id>> {
        Ok(self.checkpoints.write().remove(id).map(|c| c.id))
    }

    async fn transfer_tag(&self, scope: &CheckpointScope, tag: &str, to: &Id) -> Result<Id> {
        // One write-lock section: a reader sees either the old holder or the
        // new one, never both and never a tagless gap.
        let mut checkpoints = self.checkpoints.write();

        let target_scope = checkpoints
            .get(to)
            .map(|c| c.scope())
            .ok_or_else(|| anyhow!("checkpoint {} does not exist", to))?;
        if &target_scope != scope {
            return Err(anyhow!(
                "checkpoint {} is scoped to {}, not {}",
                to,
                target_scope,
                scope
            ));
        }

        let now = chrono::Utc::now();
        for checkpoint in checkpoints.values_mut() {
            if checkpoint.scope() == *scope && checkpoint.tag.as_deref() == Some(tag) {
                checkpoint.tag = None;
                checkpoint.updated_at = now;
            }
        }
        let target = checkpoints
            .get_mut(to)
            .ok_or_else(|| anyhow!("checkpoint {} does not exist", to))?;
        target.tag = Some(tag.to_string());
        target.updated_at = now;
        Ok(to.clone())
    }
}

#[async_trait::async_trait]
impl PredictionStore for MemoryStore {
    async fn get_prediction(&self, id: &Id) -> Result<Option<Prediction>> {
        Ok(self.predictions.read().get(id).cloned())
    }

    async fn insert_prediction(&self, new: NewPrediction) -> Result<Id> {
        let id = generate_id();
        let prediction = new.into_prediction(id.clone());
        self.predictions.write().insert(id.clone(), prediction);
        Ok(id)
    }

    async fn insert_output(&self, output: PrelabelOutput) -> Result<()> {
        if !self.predictions.read().contains_key(&output.prediction_id) {
            return Err(anyhow!(
                "prediction {} does not exist",
                output.prediction_id
            ));
        }
        self.outputs.write().push(output);
        Ok(())
    }

    async fn list_outputs(&self, prediction_id: &Id) -> Result<Vec<PrelabelOutput>> {
        let mut rows: Vec<PrelabelOutput> = self
            .outputs
            .read()
            .iter()
            .filter(|o| &o.prediction_id == prediction_id)
            .cloned()
            .collect();
        rows.sort_by_key(|o| o.sequence_index);
        Ok(rows)
    }
}

impl Store for MemoryStore {}
