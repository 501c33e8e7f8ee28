use serde_json::Value;

/// Entity kinds that support BASE/EXTRA field projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Template,
    Instance,
    Checkpoint,
    Prediction,
}

/// Fields always returned.
pub const TEMPLATE_BASE_FIELDS: &[&str] = &[
    "id",
    "name",
    "version",
    "trainable",
    "visibility",
    "owner_id",
];
/// Fields returned only when a caller asks for a verbose response.
pub const TEMPLATE_EXTRA_FIELDS: &[&str] = &[
    "default_checkpoint",
    "input_schema",
    "output_schema",
    "description",
    "image",
    "model_artifact",
    "created_at",
    "updated_at",
];

pub const INSTANCE_BASE_FIELDS: &[&str] = &[
    "id",
    "template_id",
    "name",
    "visibility",
    "checkpoint_tag",
    "owner_id",
];
pub const INSTANCE_EXTRA_FIELDS: &[&str] = &[
    "deployment_parameters",
    "editor_id",
    "organisation_id",
    "served_by",
    "created_at",
    "updated_at",
];

pub const CHECKPOINT_BASE_FIELDS: &[&str] = &[
    "id",
    "template_id",
    "ai_instance_id",
    "tag",
    "version",
    "weights_path",
];
pub const CHECKPOINT_EXTRA_FIELDS: &[&str] = &[
    "parent_version",
    "metadata",
    "description",
    "created_at",
    "updated_at",
];

pub const PREDICTION_BASE_FIELDS: &[&str] = &[
    "id",
    "app_id",
    "job_id",
    "checkpoint_id",
    "assignment_type",
];
pub const PREDICTION_EXTRA_FIELDS: &[&str] = &["created_at"];

impl EntityKind {
    pub fn base_fields(self) -> &'static [&'static str] {
        match self {
            EntityKind::Template => TEMPLATE_BASE_FIELDS,
            EntityKind::Instance => INSTANCE_BASE_FIELDS,
            EntityKind::Checkpoint => CHECKPOINT_BASE_FIELDS,
            EntityKind::Prediction => PREDICTION_BASE_FIELDS,
        }
    }

    pub fn extra_fields(self) -> &'static [&'static str] {
        match self {
            EntityKind::Template => TEMPLATE_EXTRA_FIELDS,
            EntityKind::Instance => INSTANCE_EXTRA_FIELDS,
            EntityKind::Checkpoint => CHECKPOINT_EXTRA_FIELDS,
            EntityKind::Prediction => PREDICTION_EXTRA_FIELDS,
        }
    }
}

/// Returns the field list for a response: BASE, or BASE ++ EXTRA when
/// `verbose`. Order-stable across calls; BASE and EXTRA are disjoint so the
/// result never contains duplicates.
pub fn projection(kind: EntityKind, verbose: bool) -> Vec<&'static str> {
    let mut fields: Vec<&'static str> = kind.base_fields().to_vec();
    if verbose {
        fields.extend_from_slice(kind.extra_fields());
    }
    fields
}

/// Trims a serialized entity down to the projected fields. Fields that were
/// skipped during serialization (None options) simply stay absent.
pub fn project(value: &Value, fields: &[&str]) -> Value {
    match value.as_object() {
        Some(map) => {
            let projected = fields
                .iter()
                .filter_map(|f| map.get(*f).map(|v| (f.to_string(), v.clone())))
                .collect();
            Value::Object(projected)
        }
        None => value.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use itertools::Itertools;
    use std::collections::HashSet;

    const ALL_KINDS: [EntityKind; 4] = [
        EntityKind::Template,
        EntityKind::Instance,
        EntityKind::Checkpoint,
        EntityKind::Prediction,
    ];

    #[test]
    fn verbose_projection_is_a_duplicate_free_superset() {
        for kind in ALL_KINDS {
            let base: HashSet<_> = projection(kind, false).into_iter().collect();
            let verbose = projection(kind, true);
            assert_eq!(verbose.iter().unique().count(), verbose.len(), "{:?}", kind);
            let verbose: HashSet<_> = verbose.into_iter().collect();
            assert!(base.is_subset(&verbose), "{:?}", kind);
        }
    }

    #[test]
    fn projection_is_stable_across_calls() {
        for kind in ALL_KINDS {
            assert_eq!(projection(kind, true), projection(kind, true));
            assert_eq!(projection(kind, false), projection(kind, false));
        }
    }

    #[test]
    fn project_drops_unlisted_fields() {
        let value = serde_json::json!({"id": "x", "name": "n", "secret": 42});
        let trimmed = project(&value, &["id", "name"]);
        assert_eq!(trimmed, serde_json::json!({"id": "x", "name": "n"}));
    }

    #[test]
    fn project_tolerates_absent_fields() {
        let value = serde_json::json!({"id": "x"});
        let trimmed = project(&value, &["id", "description"]);
        assert_eq!(trimmed, serde_json::json!({"id": "x"}));
    }
}
