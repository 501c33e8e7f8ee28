use std::sync::Arc;

use crate::logic::resolve::RegistryError;
use crate::model::{Id, NewTemplate, Template, TemplateListFilter, TemplateUpdate};
use crate::store::traits::Store;

/// CRUD front for templates over an injected store handle.
pub struct TemplateManager<S: Store> {
    store: Arc<S>,
}

impl<S: Store> TemplateManager<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub async fn get(&self, id: &Id) -> Result<Option<Template>, RegistryError> {
        Ok(self.store.get_template(id).await?)
    }

    pub async fn list(&self, filter: &TemplateListFilter) -> Result<Vec<Template>, RegistryError> {
        Ok(self.store.list_templates(filter).await?)
    }

    /// Inserts a template; the id is store-assigned, so any caller-supplied
    /// id simply has no field to land in.
    pub async fn create(&self, new: NewTemplate) -> Result<Id, RegistryError> {
        let id = self.store.insert_template(new).await?;
        log::info!("created template {}", id);
        Ok(id)
    }

    /// Partial update; the returned id is the acknowledgment, not a re-fetch.
    pub async fn update(
        &self,
        id: &Id,
        update: TemplateUpdate,
    ) -> Result<Option<Id>, RegistryError> {
        Ok(self.store.update_template(id, update).await?)
    }

    /// Returns the deleted id; callers compare it against what they asked for.
    pub async fn delete(&self, id: &Id) -> Result<Option<Id>, RegistryError> {
        let deleted = self.store.delete_template(id).await?;
        if deleted.is_some() {
            log::info!("deleted template {}", id);
        }
        Ok(deleted)
    }

    /// Moves the default-checkpoint pointer. The checkpoint must exist and
    /// belong to this template; `None` clears the pointer.
    pub async fn set_default_checkpoint(
        &self,
        template_id: &Id,
        checkpoint_id: Option<Id>,
    ) -> Result<Option<Id>, RegistryError> {
        if let Some(checkpoint_id) = &checkpoint_id {
            let checkpoint = self
                .store
                .get_checkpoint(checkpoint_id)
                .await?
                .ok_or_else(|| {
                    RegistryError::InvalidReference(format!(
                        "checkpoint {} does not exist",
                        checkpoint_id
                    ))
                })?;
            if &checkpoint.template_id != template_id {
                return Err(RegistryError::InvalidReference(format!(
                    "checkpoint {} belongs to template {}, not {}",
                    checkpoint_id, checkpoint.template_id, template_id
                )));
            }
        }
        Ok(self
            .store
            .set_default_checkpoint(template_id, checkpoint_id)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NewCheckpoint, Visibility};
    use crate::store::traits::CheckpointStore as _;
    use crate::store::MemoryStore;

    fn manager() -> TemplateManager<MemoryStore> {
        TemplateManager::new(Arc::new(MemoryStore::new()))
    }

    fn new_template(name: &str, version: i32) -> NewTemplate {
        NewTemplate {
            name: name.to_string(),
            version,
            trainable: false,
            visibility: Visibility::Private,
            input_schema: None,
            output_schema: None,
            description: None,
            image: None,
            model_artifact: None,
            owner_id: "owner-1".to_string(),
        }
    }

    #[tokio::test]
    async fn update_acknowledges_with_the_same_id() {
        let manager = manager();
        let id = manager.create(new_template("classifier", 1)).await.unwrap();

        let ack = manager
            .update(
                &id,
                TemplateUpdate {
                    description: Some("tuned".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(ack, Some(id.clone()));

        let missing = manager
            .update(&"nope".to_string(), TemplateUpdate::default())
            .await
            .unwrap();
        assert_eq!(missing, None);
    }

    #[tokio::test]
    async fn list_filters_are_conjunctive() {
        let manager = manager();
        manager.create(new_template("Sentiment", 1)).await.unwrap();
        manager.create(new_template("Sentiment", 2)).await.unwrap();
        manager.create(new_template("Vision", 1)).await.unwrap();

        let all = manager.list(&TemplateListFilter::default()).await.unwrap();
        assert_eq!(all.len(), 3);

        let filtered = manager
            .list(&TemplateListFilter {
                name: Some("senti".to_string()),
                version: Some(2),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].version, 2);
    }

    #[tokio::test]
    async fn default_pointer_rejects_foreign_checkpoint() {
        let manager = manager();
        let template_a = manager.create(new_template("a", 1)).await.unwrap();
        let template_b = manager.create(new_template("b", 1)).await.unwrap();
        let foreign = manager
            .store
            .insert_checkpoint(NewCheckpoint {
                template_id: template_b.clone(),
                ai_instance_id: None,
                tag: None,
                version: 1,
                parent_version: None,
                weights_path: "s3://w".to_string(),
                metadata: None,
                description: None,
            })
            .await
            .unwrap();

        let err = manager
            .set_default_checkpoint(&template_a, Some(foreign))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::InvalidReference(_)));

        // Clearing is always legal.
        let ack = manager
            .set_default_checkpoint(&template_a, None)
            .await
            .unwrap();
        assert_eq!(ack, Some(template_a));
    }
}
