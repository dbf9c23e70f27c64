use crate::{
    error::PredictError,
    features,
    model_service::{InferenceError, ModelService},
};
use ndarray::ArrayView1;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct GesturePrediction {
    pub gesture: String,
    pub confidence: f64,
}

#[derive(Debug, Clone)]
pub struct InferenceService<M: ModelService> {
    model_service: Arc<M>,
}

impl<M: ModelService> InferenceService<M> {
    pub fn new(model_service: M) -> Self {
        Self {
            model_service: Arc::new(model_service),
        }
    }

    pub fn labels(&self) -> &[String] {
        &self.model_service.topology().labels
    }

    pub fn input_width(&self) -> usize {
        self.model_service.topology().input_width
    }

    /// Scores every row of the batch but reports only the first one.
    pub async fn predict(&self, data: Option<&Value>) -> Result<GesturePrediction, PredictError> {
        let batch = features::to_batch(data, self.input_width())?;
        if batch.nrows() > 1 {
            tracing::warn!(
                "Received a batch of {} rows, only the first row is reported",
                batch.nrows()
            );
        }

        let scores = self.model_service.infer(batch).await?;

        let labels = self.labels();
        if scores.nrows() == 0 || scores.ncols() != labels.len() {
            return Err(InferenceError::UnexpectedOutput {
                actual: scores.shape().to_vec(),
                expected: labels.len(),
            }
            .into());
        }

        let first = scores.row(0);
        let top_index = argmax(first);
        let prediction = GesturePrediction {
            gesture: labels[top_index].clone(),
            confidence: f64::from(first[top_index]) * 100.0,
        };

        tracing::debug!(
            "Predicted gesture {} with confidence {:.2}",
            prediction.gesture,
            prediction.confidence
        );

        Ok(prediction)
    }
}

/// Index of the largest score; ties go to the lowest index.
fn argmax(scores: ArrayView1<f32>) -> usize {
    scores
        .iter()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |best, (index, &value)| {
            if value > best.1 {
                (index, value)
            } else {
                best
            }
        })
        .0
}
