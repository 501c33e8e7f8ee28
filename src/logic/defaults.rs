use crate::logic::resolve::ResolveResult;
use crate::model::Id;
use crate::store::traits::{CheckpointStore, TemplateStore};

/// Follows a template's `default_checkpoint` pointer: fetch the template,
/// then fetch the referenced checkpoint by primary key. Two hops, no tag
/// filter involved.
///
/// Absence of a default is a normal state, so a missing template, a null
/// pointer, or a pointer whose checkpoint has since been deleted all come
/// back as `Ok(None)`. The pointer is independent of tag resolution and the
/// two may disagree; callers wanting the current holder of a tag must use
/// the tag resolver instead.
pub async fn resolve_default_for_template<S>(store: &S, template_id: &Id) -> ResolveResult
where
    S: TemplateStore + CheckpointStore + ?Sized,
{
    let Some(template) = store.get_template(template_id).await? else {
        return Ok(None);
    };
    let Some(checkpoint_id) = template.default_checkpoint else {
        return Ok(None);
    };
    Ok(store.get_checkpoint(&checkpoint_id).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::resolve::resolve_for_template;
    use crate::model::{CheckpointUpdate, NewCheckpoint, NewTemplate, Visibility};
    use crate::store::MemoryStore;

    async fn seed(store: &MemoryStore) -> (Id, Id) {
        let template_id = store
            .insert_template(NewTemplate {
                name: "classifier".to_string(),
                version: 1,
                trainable: false,
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
        let checkpoint_id = store
            .insert_checkpoint(NewCheckpoint {
                template_id: template_id.clone(),
                ai_instance_id: None,
                tag: Some("LATEST".to_string()),
                version: 1,
                parent_version: None,
                weights_path: "s3://weights/v1".to_string(),
                metadata: None,
                description: None,
            })
            .await
            .unwrap();
        (template_id, checkpoint_id)
    }

    #[tokio::test]
    async fn follows_the_pointer_by_primary_key() {
        let store = MemoryStore::new();
        let (template_id, checkpoint_id) = seed(&store).await;
        store
            .set_default_checkpoint(&template_id, Some(checkpoint_id.clone()))
            .await
            .unwrap();

        let resolved = resolve_default_for_template(&store, &template_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resolved.id, checkpoint_id);
    }

    #[tokio::test]
    async fn missing_template_and_missing_pointer_are_soft() {
        let store = MemoryStore::new();
        let (template_id, _) = seed(&store).await;

        let no_template = resolve_default_for_template(&store, &"nope".to_string())
            .await
            .unwrap();
        assert!(no_template.is_none());

        let no_pointer = resolve_default_for_template(&store, &template_id)
            .await
            .unwrap();
        assert!(no_pointer.is_none());
    }

    #[tokio::test]
    async fn pointer_survives_tag_reassignment() {
        // The default pointer and the tag are independently settable; moving
        // one must not move the other.
        let store = MemoryStore::new();
        let (template_id, checkpoint_id) = seed(&store).await;
        store
            .set_default_checkpoint(&template_id, Some(checkpoint_id.clone()))
            .await
            .unwrap();

        store
            .update_checkpoint(
                &checkpoint_id,
                CheckpointUpdate {
                    tag: Some(Some("archive".to_string())),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let via_default = resolve_default_for_template(&store, &template_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(via_default.id, checkpoint_id);
        assert_eq!(via_default.tag.as_deref(), Some("archive"));

        // And the tag lookup now legitimately disagrees with the pointer.
        let via_tag = resolve_for_template(&store, &template_id, Some("LATEST"))
            .await
            .unwrap();
        assert!(via_tag.is_none());

        // Setting the tag elsewhere must not move the pointer either.
        let other = store
            .insert_checkpoint(NewCheckpoint {
                template_id: template_id.clone(),
                ai_instance_id: None,
                tag: Some("LATEST".to_string()),
                version: 2,
                parent_version: Some(1),
                weights_path: "s3://weights/v2".to_string(),
                metadata: None,
                description: None,
            })
            .await
            .unwrap();
        let template = store.get_template(&template_id).await.unwrap().unwrap();
        assert_eq!(template.default_checkpoint, Some(checkpoint_id));
        assert_ne!(template.default_checkpoint, Some(other));
    }

    #[tokio::test]
    async fn dangling_pointer_is_soft() {
        let store = MemoryStore::new();
        let (template_id, checkpoint_id) = seed(&store).await;
        store
            .set_default_checkpoint(&template_id, Some(checkpoint_id.clone()))
            .await
            .unwrap();
        store.delete_checkpoint(&checkpoint_id).await.unwrap();

        let resolved = resolve_default_for_template(&store, &template_id)
            .await
            .unwrap();
        assert!(resolved.is_none());
    }

    #[tokio::test]
    async fn fallback_composition_prefers_tag_resolution() {
        use crate::logic::resolve::resolve_or_default_for_template;

        let store = MemoryStore::new();
        let (template_id, tagged_id) = seed(&store).await;
        let default_id = store
            .insert_checkpoint(NewCheckpoint {
                template_id: template_id.clone(),
                ai_instance_id: None,
                tag: None,
                version: 2,
                parent_version: Some(1),
                weights_path: "s3://weights/v2".to_string(),
                metadata: None,
                description: None,
            })
            .await
            .unwrap();
        store
            .set_default_checkpoint(&template_id, Some(default_id.clone()))
            .await
            .unwrap();

        // Tag hit wins; the default is not consulted.
        let hit = resolve_or_default_for_template(&store, &template_id, None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hit.id, tagged_id);

        // Tag miss falls through to the pointer.
        let miss = resolve_or_default_for_template(&store, &template_id, Some("stable"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(miss.id, default_id);
    }
}
