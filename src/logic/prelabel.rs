use crate::model::{Id, NewPrediction, PrelabelBody, PrelabelOutput};
use crate::store::traits::PredictionStore;
use anyhow::Result;

/// Decomposes a prelabel submission into one parent prediction and one
/// output child per item, children keyed by `(prediction_id, sequence_index)`.
///
/// The writes are independent; there is no transaction and no compensating
/// rollback. A failed child insert is logged and skipped, so a successful
/// return can still describe a partial submission — callers discover that by
/// re-querying the outputs. Only a failed parent insert is an error.
pub async fn submit_prelabel<S: PredictionStore + ?Sized>(
    store: &S,
    body: PrelabelBody,
    app_id: Id,
    job_id: Id,
    checkpoint_id: Id,
    assignment_type: String,
) -> Result<Id> {
    let prediction_id = store
        .insert_prediction(NewPrediction {
            app_id,
            job_id,
            checkpoint_id,
            assignment_type,
        })
        .await?;

    let items = body.into_items();
    let total = items.len();
    for (index, item) in items.into_iter().enumerate() {
        let output = PrelabelOutput {
            prediction_id: prediction_id.clone(),
            sequence_index: index as i32,
            output: item.output,
            score: item.score,
        };
        if let Err(err) = store.insert_output(output).await {
            log::warn!(
                "prediction {}: output {}/{} failed to persist: {:#}",
                prediction_id,
                index,
                total,
                err
            );
        }
    }

    Ok(prediction_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PrelabelItem;
    use crate::store::MemoryStore;

    fn item(score: f64) -> PrelabelItem {
        PrelabelItem {
            output: Some(serde_json::json!({"label": "cat"})),
            score: Some(score),
        }
    }

    #[tokio::test]
    async fn list_body_creates_indexed_children() {
        let store = MemoryStore::new();
        let prediction_id = submit_prelabel(
            &store,
            PrelabelBody::Many(vec![item(0.1), item(0.2), item(0.3)]),
            "app-1".to_string(),
            "job-1".to_string(),
            "ckpt-1".to_string(),
            "prelabel".to_string(),
        )
        .await
        .unwrap();

        let parent = store.get_prediction(&prediction_id).await.unwrap().unwrap();
        assert_eq!(parent.app_id, "app-1");

        let outputs = store.list_outputs(&prediction_id).await.unwrap();
        assert_eq!(outputs.len(), 3);
        let indices: Vec<i32> = outputs.iter().map(|o| o.sequence_index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(outputs[1].score, Some(0.2));
    }

    #[tokio::test]
    async fn single_body_creates_one_child_at_index_zero() {
        let store = MemoryStore::new();
        let prediction_id = submit_prelabel(
            &store,
            PrelabelBody::One(item(0.9)),
            "app-1".to_string(),
            "job-1".to_string(),
            "ckpt-1".to_string(),
            "prelabel".to_string(),
        )
        .await
        .unwrap();

        let outputs = store.list_outputs(&prediction_id).await.unwrap();
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].sequence_index, 0);
    }

    #[tokio::test]
    async fn child_failures_do_not_fail_the_submission() {
        use crate::model::{NewPrediction, PrelabelOutput, Prediction};
        use anyhow::anyhow;

        // Store whose child inserts fail after the parent lands.
        struct FlakyChildren(MemoryStore);

        #[async_trait::async_trait]
        impl PredictionStore for FlakyChildren {
            async fn get_prediction(&self, id: &Id) -> Result<Option<Prediction>> {
                self.0.get_prediction(id).await
            }
            async fn insert_prediction(&self, new: NewPrediction) -> Result<Id> {
                self.0.insert_prediction(new).await
            }
            async fn insert_output(&self, _output: PrelabelOutput) -> Result<()> {
                Err(anyhow!("write refused"))
            }
            async fn list_outputs(&self, prediction_id: &Id) -> Result<Vec<PrelabelOutput>> {
                self.0.list_outputs(prediction_id).await
            }
        }

        let store = FlakyChildren(MemoryStore::new());
        let prediction_id = submit_prelabel(
            &store,
            PrelabelBody::Many(vec![item(0.1), item(0.2)]),
            "app-1".to_string(),
            "job-1".to_string(),
            "ckpt-1".to_string(),
            "prelabel".to_string(),
        )
        .await
        .unwrap();

        // Orphaned parent, zero children: the documented partial-write state.
        assert!(store.get_prediction(&prediction_id).await.unwrap().is_some());
        assert!(store.list_outputs(&prediction_id).await.unwrap().is_empty());
    }
}
