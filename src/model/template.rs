use crate::model::{Id, Visibility};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered AI definition: the root of the versioning tree.
///
/// `(name, version, owner_id)` uniqueness is enforced by the store schema,
/// not by this layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub id: Id,
    pub name: String,
    pub version: i32,
    pub trainable: bool,
    pub visibility: Visibility,
    /// Explicit id pointer to a checkpoint, set by an administrator.
    /// Independent of tag resolution; the two may legitimately disagree.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_checkpoint: Option<Id>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_artifact: Option<String>,
    pub owner_id: Id,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Template input model for creation.
///
/// The id is store-assigned and `default_checkpoint` is only ever set through
/// the dedicated pointer update, so neither appears here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTemplate {
    pub name: String,
    pub version: i32,
    #[serde(default)]
    pub trainable: bool,
    pub visibility: Visibility,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_artifact: Option<String>,
    pub owner_id: Id,
}

impl NewTemplate {
    pub fn into_template(self, id: Id) -> Template {
        let now = Utc::now();
        Template {
            id,
            name: self.name,
            version: self.version,
            trainable: self.trainable,
            visibility: self.visibility,
            default_checkpoint: None,
            input_schema: self.input_schema,
            output_schema: self.output_schema,
            description: self.description,
            image: self.image,
            model_artifact: self.model_artifact,
            owner_id: self.owner_id,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Template update model for PATCH operations; only supplied fields are sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplateUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trainable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Visibility>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_artifact: Option<String>,
}

impl Template {
    pub fn apply_update(&mut self, update: TemplateUpdate) {
        if let Some(name) = update.name {
            self.name = name;
        }
        if let Some(trainable) = update.trainable {
            self.trainable = trainable;
        }
        if let Some(visibility) = update.visibility {
            self.visibility = visibility;
        }
        if let Some(input_schema) = update.input_schema {
            self.input_schema = Some(input_schema);
        }
        if let Some(output_schema) = update.output_schema {
            self.output_schema = Some(output_schema);
        }
        if let Some(description) = update.description {
            self.description = Some(description);
        }
        if let Some(image) = update.image {
            self.image = Some(image);
        }
        if let Some(model_artifact) = update.model_artifact {
            self.model_artifact = Some(model_artifact);
        }
        self.updated_at = Utc::now();
    }
}
