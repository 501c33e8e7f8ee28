use crate::model::{
    Checkpoint, CheckpointFilter, CheckpointScope, Id, TagFilter, TagPredicate, LATEST_TAG,
};
use crate::store::traits::{CheckpointStore, TemplateStore};
use thiserror::Error;

/// Typed failure surface of the resolution layer.
///
/// Absence is never an error: every resolver returns
/// `Ok(Some)` / `Ok(None)` / `Err`, so callers must branch before they can
/// touch a checkpoint.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A resolution query that must return 0 or 1 rows returned more. Signals
    /// a data-integrity violation that resolution cannot repair; never
    /// retried here.
    #[error("ambiguous checkpoint: {count} checkpoints carry tag '{tag}' in scope {scope}")]
    AmbiguousCheckpoint {
        scope: String,
        tag: String,
        count: usize,
    },
    /// A caller-supplied reference that points at the wrong entity.
    #[error("invalid reference: {0}")]
    InvalidReference(String),
    /// Store/transport failure, propagated unchanged.
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

pub type ResolveResult = Result<Option<Checkpoint>, RegistryError>;

fn enforce_single(
    mut rows: Vec<Checkpoint>,
    scope: &CheckpointScope,
    tag: &str,
) -> ResolveResult {
    match rows.len() {
        0 => Ok(None),
        1 => Ok(rows.pop()),
        count => {
            log::warn!(
                "tag uniqueness violated: {} checkpoints carry '{}' in {}",
                count,
                tag,
                scope
            );
            Err(RegistryError::AmbiguousCheckpoint {
                scope: scope.to_string(),
                tag: tag.to_string(),
                count,
            })
        }
    }
}

/// Resolves the single checkpoint carrying `tag` within an instance's scope.
/// `tag` defaults to `LATEST`. A non-error return is guaranteed unambiguous.
pub async fn resolve_for_instance<S: CheckpointStore + ?Sized>(
    store: &S,
    instance_id: &Id,
    tag: Option<&str>,
) -> ResolveResult {
    let tag = tag.unwrap_or(LATEST_TAG);
    let filter = CheckpointFilter::new(
        CheckpointScope::Instance(instance_id.clone()),
        TagPredicate::Eq(tag.to_string()),
    );
    let rows = store.find_checkpoints(&filter).await?;
    enforce_single(rows, &filter.scope, tag)
}

/// Resolves the single template-scoped checkpoint carrying `tag`.
///
/// The scope explicitly excludes instance-scoped checkpoints: an instance
/// artifact sharing the tag and template must never be picked up here.
pub async fn resolve_for_template<S: CheckpointStore + ?Sized>(
    store: &S,
    template_id: &Id,
    tag: Option<&str>,
) -> ResolveResult {
    let tag = tag.unwrap_or(LATEST_TAG);
    let filter = CheckpointFilter::new(
        CheckpointScope::Template(template_id.clone()),
        TagPredicate::Eq(tag.to_string()),
    );
    let rows = store.find_checkpoints(&filter).await?;
    enforce_single(rows, &filter.scope, tag)
}

/// Lists an instance's checkpoints. Listing is not resolution: no uniqueness
/// enforcement, any number of rows comes back.
pub async fn list_for_instance<S: CheckpointStore + ?Sized>(
    store: &S,
    instance_id: &Id,
    tags: TagFilter,
) -> Result<Vec<Checkpoint>, RegistryError> {
    let filter = CheckpointFilter::new(
        CheckpointScope::Instance(instance_id.clone()),
        tags.predicate(),
    );
    Ok(store.find_checkpoints(&filter).await?)
}

/// Lists a template's template-scoped checkpoints.
pub async fn list_for_template<S: CheckpointStore + ?Sized>(
    store: &S,
    template_id: &Id,
    tags: TagFilter,
) -> Result<Vec<Checkpoint>, RegistryError> {
    let filter = CheckpointFilter::new(
        CheckpointScope::Template(template_id.clone()),
        tags.predicate(),
    );
    Ok(store.find_checkpoints(&filter).await?)
}

/// Tag resolution with fallback: the template default pointer is consulted
/// only when tag resolution finds nothing. An ambiguous tag still fails —
/// the default never papers over a broken invariant.
pub async fn resolve_or_default_for_template<S>(
    store: &S,
    template_id: &Id,
    tag: Option<&str>,
) -> ResolveResult
where
    S: CheckpointStore + TemplateStore + ?Sized,
{
    if let Some(checkpoint) = resolve_for_template(store, template_id, tag).await? {
        return Ok(Some(checkpoint));
    }
    crate::logic::defaults::resolve_default_for_template(store, template_id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NewCheckpoint, NewTemplate, Visibility};
    use crate::store::traits::CheckpointStore as _;
    use crate::store::MemoryStore;

    async fn seed_template(store: &MemoryStore, name: &str) -> Id {
        store
            .insert_template(NewTemplate {
                name: name.to_string(),
                version: 1,
                trainable: true,
                visibility: Visibility::Private,
                input_schema: None,
                output_schema: None,
                description: None,
                image: None,
                model_artifact: None,
                owner_id: "owner-1".to_string(),
            })
            .await
            .unwrap()
    }

    fn new_checkpoint(template_id: &Id, instance_id: Option<&Id>, tag: Option<&str>) -> NewCheckpoint {
        NewCheckpoint {
            template_id: template_id.clone(),
            ai_instance_id: instance_id.cloned(),
            tag: tag.map(str::to_string),
            version: 1,
            parent_version: None,
            weights_path: "s3://weights/v1".to_string(),
            metadata: None,
            description: None,
        }
    }

    #[tokio::test]
    async fn resolves_single_tagged_checkpoint() {
        let store = MemoryStore::new();
        let template_id = seed_template(&store, "classifier").await;
        let ckpt_id = store
            .insert_checkpoint(new_checkpoint(&template_id, None, Some("LATEST")))
            .await
            .unwrap();

        let resolved = resolve_for_template(&store, &template_id, None)
            .await
            .unwrap()
            .expect("checkpoint should resolve");
        assert_eq!(resolved.id, ckpt_id);
    }

    #[tokio::test]
    async fn absence_is_none_not_error() {
        let store = MemoryStore::new();
        let template_id = seed_template(&store, "classifier").await;

        let resolved = resolve_for_template(&store, &template_id, Some("stable"))
            .await
            .unwrap();
        assert!(resolved.is_none());
    }

    #[tokio::test]
    async fn duplicate_tag_in_scope_is_ambiguous() {
        let store = MemoryStore::new();
        let template_id = seed_template(&store, "classifier").await;
        // Two writers bypass transfer_tag and both land the same tag.
        store
            .insert_checkpoint(new_checkpoint(&template_id, None, Some("LATEST")))
            .await
            .unwrap();
        store
            .insert_checkpoint(new_checkpoint(&template_id, None, Some("LATEST")))
            .await
            .unwrap();

        let err = resolve_for_template(&store, &template_id, Some("LATEST"))
            .await
            .unwrap_err();
        match err {
            RegistryError::AmbiguousCheckpoint { count, tag, .. } => {
                assert_eq!(count, 2);
                assert_eq!(tag, "LATEST");
            }
            other => panic!("expected AmbiguousCheckpoint, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn template_resolution_excludes_instance_scoped_checkpoints() {
        use crate::model::NewAiInstance;
        use crate::store::traits::AiInstanceStore as _;

        let store = MemoryStore::new();
        let template_id = seed_template(&store, "classifier").await;
        let instance_id = store
            .insert_instance(NewAiInstance {
                template_id: template_id.clone(),
                name: "prod".to_string(),
                visibility: Visibility::Private,
                checkpoint_tag: None,
                deployment_parameters: None,
                owner_id: "owner-1".to_string(),
                editor_id: None,
                organisation_id: None,
            })
            .await
            .unwrap();

        // Same template, same tag, but instance-scoped.
        store
            .insert_checkpoint(new_checkpoint(&template_id, Some(&instance_id), Some("LATEST")))
            .await
            .unwrap();

        let resolved = resolve_for_template(&store, &template_id, Some("LATEST"))
            .await
            .unwrap();
        assert!(resolved.is_none());

        let resolved = resolve_for_instance(&store, &instance_id, Some("LATEST"))
            .await
            .unwrap();
        assert!(resolved.is_some());
    }

    #[tokio::test]
    async fn listing_modes_partition_a_scope() {
        use crate::model::NewAiInstance;
        use crate::store::traits::AiInstanceStore as _;

        let store = MemoryStore::new();
        let template_id = seed_template(&store, "classifier").await;
        let instance_id = store
            .insert_instance(NewAiInstance {
                template_id: template_id.clone(),
                name: "prod".to_string(),
                visibility: Visibility::Private,
                checkpoint_tag: None,
                deployment_parameters: None,
                owner_id: "owner-1".to_string(),
                editor_id: None,
                organisation_id: None,
            })
            .await
            .unwrap();

        store
            .insert_checkpoint(new_checkpoint(&template_id, Some(&instance_id), Some("LATEST")))
            .await
            .unwrap();
        store
            .insert_checkpoint(new_checkpoint(&template_id, Some(&instance_id), None))
            .await
            .unwrap();
        store
            .insert_checkpoint(new_checkpoint(&template_id, Some(&instance_id), None))
            .await
            .unwrap();

        let tagged = list_for_instance(&store, &instance_id, TagFilter::TaggedOnly)
            .await
            .unwrap();
        let untagged = list_for_instance(&store, &instance_id, TagFilter::UntaggedOnly)
            .await
            .unwrap();
        let all = list_for_instance(&store, &instance_id, TagFilter::All)
            .await
            .unwrap();

        assert_eq!(tagged.len(), 1);
        assert_eq!(untagged.len(), 2);
        assert_eq!(all.len(), 3);
        assert!(tagged.iter().all(|c| c.tag.is_some()));
        assert!(untagged.iter().all(|c| c.tag.is_none()));
        // The two filtered modes partition the scope.
        assert!(tagged.iter().all(|t| untagged.iter().all(|u| t.id != u.id)));
    }

    #[tokio::test]
    async fn untagged_instance_checkpoint_resolves_to_none() {
        use crate::model::NewAiInstance;
        use crate::store::traits::AiInstanceStore as _;

        let store = MemoryStore::new();
        let template_id = seed_template(&store, "classifier").await;
        let instance_id = store
            .insert_instance(NewAiInstance {
                template_id: template_id.clone(),
                name: "prod".to_string(),
                visibility: Visibility::Private,
                checkpoint_tag: None,
                deployment_parameters: None,
                owner_id: "owner-1".to_string(),
                editor_id: None,
                organisation_id: None,
            })
            .await
            .unwrap();
        store
            .insert_checkpoint(new_checkpoint(&template_id, Some(&instance_id), None))
            .await
            .unwrap();

        let listed = list_for_instance(&store, &instance_id, TagFilter::UntaggedOnly)
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);

        // No match is a soft miss, not an error.
        let resolved = resolve_for_instance(&store, &instance_id, None).await.unwrap();
        assert!(resolved.is_none());
    }

    #[tokio::test]
    async fn transfer_tag_keeps_exactly_one_holder() {
        let store = MemoryStore::new();
        let template_id = seed_template(&store, "classifier").await;
        let first = store
            .insert_checkpoint(new_checkpoint(&template_id, None, Some("LATEST")))
            .await
            .unwrap();
        let second = store
            .insert_checkpoint(new_checkpoint(&template_id, None, None))
            .await
            .unwrap();

        let scope = CheckpointScope::Template(template_id.clone());
        store.transfer_tag(&scope, "LATEST", &second).await.unwrap();

        let resolved = resolve_for_template(&store, &template_id, None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resolved.id, second);

        let old = store.get_checkpoint(&first).await.unwrap().unwrap();
        assert_eq!(old.tag, None);
    }

    #[tokio::test]
    async fn transfer_tag_rejects_cross_scope_target() {
        let store = MemoryStore::new();
        let template_a = seed_template(&store, "classifier").await;
        let template_b = seed_template(&store, "detector").await;
        let foreign = store
            .insert_checkpoint(new_checkpoint(&template_b, None, None))
            .await
            .unwrap();

        let scope = CheckpointScope::Template(template_a);
        assert!(store.transfer_tag(&scope, "LATEST", &foreign).await.is_err());
    }
}
