use crate::model::{CheckpointScope, Visibility};
use serde::{Deserialize, Serialize};

/// Store-facing predicate over the checkpoint tag column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagPredicate {
    Eq(String),
    IsNull,
    NotNull,
    Any,
}

impl TagPredicate {
    pub fn matches(&self, tag: Option<&str>) -> bool {
        match self {
            TagPredicate::Eq(expected) => tag == Some(expected.as_str()),
            TagPredicate::IsNull => tag.is_none(),
            TagPredicate::NotNull => tag.is_some(),
            TagPredicate::Any => true,
        }
    }
}

/// Conjunctive filter built by the tag resolver and executed by the store.
///
/// The scope carries the `ai_instance_id IS NULL` exclusion for
/// template-scoped lookups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointFilter {
    pub scope: CheckpointScope,
    pub tag: TagPredicate,
}

impl CheckpointFilter {
    pub fn new(scope: CheckpointScope, tag: TagPredicate) -> Self {
        Self { scope, tag }
    }
}

/// Listing mode for checkpoint listings.
///
/// Replaces the historical `include_untagged`/`with_tag` boolean, whose
/// meaning was inverted between call sites. `TaggedOnly` and `UntaggedOnly`
/// partition a scope's checkpoints; `All` lists everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagFilter {
    #[serde(rename = "tagged")]
    TaggedOnly,
    #[serde(rename = "untagged")]
    UntaggedOnly,
    #[default]
    All,
}

impl TagFilter {
    pub fn predicate(self) -> TagPredicate {
        match self {
            TagFilter::TaggedOnly => TagPredicate::NotNull,
            TagFilter::UntaggedOnly => TagPredicate::IsNull,
            TagFilter::All => TagPredicate::Any,
        }
    }
}

/// Compound listing filter for instances; every set field adds one AND
/// predicate. `name`, `ai_name` and `ai_version` are case-insensitive
/// substring matches (the `ai_*` pair matches the owning template),
/// `visibility` and `checkpoint_tag` are exact.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstanceListFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Visibility>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkpoint_tag: Option<String>,
}

impl InstanceListFilter {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.ai_name.is_none()
            && self.ai_version.is_none()
            && self.visibility.is_none()
            && self.checkpoint_tag.is_none()
    }
}

/// Compound listing filter for templates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplateListFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Visibility>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trainable: Option<bool>,
}

/// Case-insensitive substring match used by the listing filters.
pub fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}
