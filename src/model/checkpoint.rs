use crate::model::Id;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An immutable, versioned weights artifact.
///
/// `template_id` is always set; `ai_instance_id == None` means the checkpoint
/// is template-scoped, `Some(id)` means it belongs to one instance. Only
/// tag, description and metadata are mutable after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub id: Id,
    pub template_id: Id,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_instance_id: Option<Id>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    pub version: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_version: Option<i32>,
    pub weights_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Checkpoint {
    /// The scope that bounds tag uniqueness for this checkpoint.
    pub fn scope(&self) -> CheckpointScope {
        match &self.ai_instance_id {
            Some(instance_id) => CheckpointScope::Instance(instance_id.clone()),
            None => CheckpointScope::Template(self.template_id.clone()),
        }
    }
}

/// The `(template_id, instance_id?)` pair that bounds tag uniqueness.
///
/// `Template` scope explicitly excludes instance-scoped checkpoints: a
/// template-scoped lookup must never pick up an instance artifact that
/// happens to share the tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointScope {
    Template(Id),
    Instance(Id),
}

impl std::fmt::Display for CheckpointScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckpointScope::Template(id) => write!(f, "template/{}", id),
            CheckpointScope::Instance(id) => write!(f, "instance/{}", id),
        }
    }
}

/// Checkpoint input model for creation; the id is store-assigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCheckpoint {
    pub template_id: Id,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_instance_id: Option<Id>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    pub version: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_version: Option<i32>,
    pub weights_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl NewCheckpoint {
    pub fn into_checkpoint(self, id: Id) -> Checkpoint {
        let now = Utc::now();
        Checkpoint {
            id,
            template_id: self.template_id,
            ai_instance_id: self.ai_instance_id,
            tag: self.tag,
            version: self.version,
            parent_version: self.parent_version,
            weights_path: self.weights_path,
            metadata: self.metadata,
            description: self.description,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Checkpoint update model; weights and scope are immutable, so only the
/// mutable trio is patchable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckpointUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none", with = "super::instance::double_option")]
    pub tag: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl Checkpoint {
    pub fn apply_update(&mut self, update: CheckpointUpdate) {
        if let Some(tag) = update.tag {
            self.tag = tag;
        }
        if let Some(description) = update.description {
            self.description = Some(description);
        }
        if let Some(metadata) = update.metadata {
            self.metadata = Some(metadata);
        }
        self.updated_at = Utc::now();
    }
}
