use crate::model::{Id, Visibility};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A deployable configuration bound to exactly one [`Template`](crate::model::Template).
///
/// `checkpoint_tag` is a logical pointer: reassigning it moves which
/// checkpoint the instance considers authoritative without moving any data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiInstance {
    pub id: Id,
    pub template_id: Id,
    pub name: String,
    pub visibility: Visibility,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkpoint_tag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deployment_parameters: Option<serde_json::Value>,
    pub owner_id: Id,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub editor_id: Option<Id>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organisation_id: Option<Id>,
    /// Reference to an active deployment; derived, never supplied on create.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub served_by: Option<Id>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Instance input model for creation (id and `served_by` are not accepted
/// from callers).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAiInstance {
    pub template_id: Id,
    pub name: String,
    pub visibility: Visibility,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkpoint_tag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deployment_parameters: Option<serde_json::Value>,
    pub owner_id: Id,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub editor_id: Option<Id>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organisation_id: Option<Id>,
}

impl NewAiInstance {
    pub fn into_instance(self, id: Id) -> AiInstance {
        let now = Utc::now();
        AiInstance {
            id,
            template_id: self.template_id,
            name: self.name,
            visibility: self.visibility,
            checkpoint_tag: self.checkpoint_tag,
            deployment_parameters: self.deployment_parameters,
            owner_id: self.owner_id,
            editor_id: self.editor_id,
            organisation_id: self.organisation_id,
            served_by: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Instance update model for PATCH operations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AiInstanceUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Visibility>,
    /// `Some(None)` clears the tag, `Some(Some(t))` re-pins it.
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    pub checkpoint_tag: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deployment_parameters: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub editor_id: Option<Id>,
    #[serde(skip_serializing_if = "Option::is_none", with = "double_option", default)]
    pub served_by: Option<Option<Id>>,
}

/// Distinguishes "field absent" from "field explicitly null" in PATCH bodies.
pub(crate) mod double_option {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<T, S>(value: &Option<Option<T>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: Serialize,
        S: Serializer,
    {
        match value {
            Some(inner) => inner.serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
    where
        T: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        Ok(Some(Option::deserialize(deserializer)?))
    }
}

impl AiInstance {
    pub fn apply_update(&mut self, update: AiInstanceUpdate) {
        if let Some(name) = update.name {
            self.name = name;
        }
        if let Some(visibility) = update.visibility {
            self.visibility = visibility;
        }
        if let Some(checkpoint_tag) = update.checkpoint_tag {
            self.checkpoint_tag = checkpoint_tag;
        }
        if let Some(deployment_parameters) = update.deployment_parameters {
            self.deployment_parameters = Some(deployment_parameters);
        }
        if let Some(editor_id) = update.editor_id {
            self.editor_id = Some(editor_id);
        }
        if let Some(served_by) = update.served_by {
            self.served_by = served_by;
        }
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_distinguishes_absent_from_null_tag() {
        let absent: AiInstanceUpdate = serde_json::from_str(r#"{"name": "renamed"}"#).unwrap();
        assert_eq!(absent.checkpoint_tag, None);

        let cleared: AiInstanceUpdate = serde_json::from_str(r#"{"checkpoint_tag": null}"#).unwrap();
        assert_eq!(cleared.checkpoint_tag, Some(None));

        let pinned: AiInstanceUpdate =
            serde_json::from_str(r#"{"checkpoint_tag": "LATEST"}"#).unwrap();
        assert_eq!(pinned.checkpoint_tag, Some(Some("LATEST".to_string())));
    }
}
