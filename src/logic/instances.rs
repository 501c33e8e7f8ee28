use std::sync::Arc;

use crate::logic::resolve::RegistryError;
use crate::model::{AiInstance, AiInstanceUpdate, Id, InstanceListFilter, NewAiInstance};
use crate::store::traits::Store;

/// CRUD front for AI instances over an injected store handle.
pub struct InstanceManager<S: Store> {
    store: Arc<S>,
}

impl<S: Store> InstanceManager<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub async fn get(&self, id: &Id) -> Result<Option<AiInstance>, RegistryError> {
        Ok(self.store.get_instance(id).await?)
    }

    /// Conjunctive compound filter; an empty filter returns everything.
    pub async fn list(
        &self,
        filter: &InstanceListFilter,
    ) -> Result<Vec<AiInstance>, RegistryError> {
        Ok(self.store.list_instances(filter).await?)
    }

    pub async fn create(&self, new: NewAiInstance) -> Result<Id, RegistryError> {
        let id = self.store.insert_instance(new).await?;
        log::info!("created instance {}", id);
        Ok(id)
    }

    pub async fn update(
        &self,
        id: &Id,
        update: AiInstanceUpdate,
    ) -> Result<Option<Id>, RegistryError> {
        Ok(self.store.update_instance(id, update).await?)
    }

    pub async fn delete(&self, id: &Id) -> Result<Option<Id>, RegistryError> {
        let deleted = self.store.delete_instance(id).await?;
        if deleted.is_some() {
            log::info!("deleted instance {}", id);
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NewTemplate, Visibility};
    use crate::store::traits::TemplateStore as _;
    use crate::store::MemoryStore;

    async fn seed() -> (InstanceManager<MemoryStore>, Id, Id) {
        let store = Arc::new(MemoryStore::new());
        let sentiment = store
            .insert_template(NewTemplate {
                name: "Sentiment".to_string(),
                version: 3,
                trainable: true,
                visibility: Visibility::Public,
                input_schema: None,
                output_schema: None,
                description: None,
                image: None,
                model_artifact: None,
                owner_id: "owner-1".to_string(),
            })
            .await
            .unwrap();
        let vision = store
            .insert_template(NewTemplate {
                name: "Vision".to_string(),
                version: 1,
                trainable: false,
                visibility: Visibility::Private,
                input_schema: None,
                output_schema: None,
                description: None,
                image: None,
                model_artifact: None,
                owner_id: "owner-1".to_string(),
            })
            .await
            .unwrap();
        (InstanceManager::new(store), sentiment, vision)
    }

    fn new_instance(template_id: &Id, name: &str, tag: Option<&str>) -> NewAiInstance {
        NewAiInstance {
            template_id: template_id.clone(),
            name: name.to_string(),
            visibility: Visibility::Private,
            checkpoint_tag: tag.map(str::to_string),
            deployment_parameters: None,
            owner_id: "owner-1".to_string(),
            editor_id: None,
            organisation_id: None,
        }
    }

    #[tokio::test]
    async fn empty_filter_returns_all_instances() {
        let (manager, sentiment, vision) = seed().await;
        manager.create(new_instance(&sentiment, "prod", None)).await.unwrap();
        manager.create(new_instance(&vision, "staging", None)).await.unwrap();

        let all = manager.list(&InstanceListFilter::default()).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn compound_filter_matches_owning_template() {
        let (manager, sentiment, vision) = seed().await;
        manager
            .create(new_instance(&sentiment, "prod", Some("LATEST")))
            .await
            .unwrap();
        manager
            .create(new_instance(&vision, "prod-vision", Some("LATEST")))
            .await
            .unwrap();

        // ai_name is a case-insensitive substring over the template name.
        let by_template = manager
            .list(&InstanceListFilter {
                ai_name: Some("SENT".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(by_template.len(), 1);
        assert_eq!(by_template[0].template_id, sentiment);

        // ai_version substring-matches the stringified template version.
        let by_version = manager
            .list(&InstanceListFilter {
                ai_version: Some("3".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(by_version.len(), 1);

        // checkpoint_tag is exact.
        let by_tag = manager
            .list(&InstanceListFilter {
                checkpoint_tag: Some("LAT".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(by_tag.is_empty());
    }

    #[tokio::test]
    async fn tag_reassignment_is_a_pointer_change() {
        let (manager, sentiment, _) = seed().await;
        let id = manager.create(new_instance(&sentiment, "prod", None)).await.unwrap();

        let ack = manager
            .update(
                &id,
                AiInstanceUpdate {
                    checkpoint_tag: Some(Some("stable".to_string())),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(ack, Some(id.clone()));

        let instance = manager.get(&id).await.unwrap().unwrap();
        assert_eq!(instance.checkpoint_tag.as_deref(), Some("stable"));

        // Explicit null clears the pin.
        manager
            .update(
                &id,
                AiInstanceUpdate {
                    checkpoint_tag: Some(None),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let instance = manager.get(&id).await.unwrap().unwrap();
        assert_eq!(instance.checkpoint_tag, None);
    }

    #[tokio::test]
    async fn delete_echoes_the_id() {
        let (manager, sentiment, _) = seed().await;
        let id = manager.create(new_instance(&sentiment, "prod", None)).await.unwrap();

        assert_eq!(manager.delete(&id).await.unwrap(), Some(id.clone()));
        assert_eq!(manager.delete(&id).await.unwrap(), None);
    }
}
