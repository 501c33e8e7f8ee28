use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type Id = String;

/// Tag value used when a caller resolves without naming a tag.
pub const LATEST_TAG: &str = "LATEST";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Visibility {
    Private,
    Public,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Private => "PRIVATE",
            Visibility::Public => "PUBLIC",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PRIVATE" => Some(Visibility::Private),
            "PUBLIC" => Some(Visibility::Public),
            _ => None,
        }
    }
}

pub fn generate_id() -> Id {
    Uuid::new_v4().to_string()
}
