use crate::model::Id;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Parent record for one inference request; its per-item results live in
/// [`PrelabelOutput`] children keyed by `(prediction_id, sequence_index)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub id: Id,
    pub app_id: Id,
    pub job_id: Id,
    pub checkpoint_id: Id,
    pub assignment_type: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPrediction {
    pub app_id: Id,
    pub job_id: Id,
    pub checkpoint_id: Id,
    pub assignment_type: String,
}

impl NewPrediction {
    pub fn into_prediction(self, id: Id) -> Prediction {
        Prediction {
            id,
            app_id: self.app_id,
            job_id: self.job_id,
            checkpoint_id: self.checkpoint_id,
            assignment_type: self.assignment_type,
            created_at: Utc::now(),
        }
    }
}

/// One decomposed output row of a prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrelabelOutput {
    pub prediction_id: Id,
    pub sequence_index: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

/// One element of a prelabel submission; `output` and `score` are both
/// optional sub-fields of whatever the model produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PrelabelItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

/// Prelabel request body: a single item or a list of items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrelabelBody {
    Many(Vec<PrelabelItem>),
    One(PrelabelItem),
}

impl PrelabelBody {
    /// Normalizes to a list; a single object becomes a one-element list.
    pub fn into_items(self) -> Vec<PrelabelItem> {
        match self {
            PrelabelBody::Many(items) => items,
            PrelabelBody::One(item) => vec![item],
        }
    }
}
