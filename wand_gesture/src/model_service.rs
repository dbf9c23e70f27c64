use crate::topology::ModelTopology;
use async_trait::async_trait;
use ndarray::Array2;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("inference failed: {0}")]
    Runtime(String),
    #[error("session mutex poisoned: {0}")]
    Poisoned(String),
    #[error("unexpected model output shape {actual:?}, expected (N, {expected})")]
    UnexpectedOutput { actual: Vec<usize>, expected: usize },
}

/// Scores a batch of feature vectors. Implementations are loaded once and shared read-only.
#[async_trait]
pub trait ModelService: Send + Sync + Clone + 'static {
    /// `batch` is `(N, input_width)`; the result is `(N, labels.len())`.
    async fn infer(&self, batch: Array2<f32>) -> Result<Array2<f32>, InferenceError>;

    fn topology(&self) -> &ModelTopology;
}

#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use ndarray::Axis;

    /// Two-class softmax over the sums of each half of the row. Deterministic.
    #[derive(Clone, Default)]
    pub struct MockModelService {
        topology: ModelTopology,
    }

    #[async_trait]
    impl ModelService for MockModelService {
        async fn infer(&self, batch: Array2<f32>) -> Result<Array2<f32>, InferenceError> {
            let half = batch.ncols() / 2;
            let mut scores = Array2::zeros((batch.nrows(), 2));
            for (row, mut out) in batch.axis_iter(Axis(0)).zip(scores.axis_iter_mut(Axis(0))) {
                let left: f32 = row.iter().take(half).sum();
                let right: f32 = row.iter().skip(half).sum();
                let max = left.max(right);
                let (l, r) = ((left - max).exp(), (right - max).exp());
                out[0] = l / (l + r);
                out[1] = r / (l + r);
            }
            Ok(scores)
        }

        fn topology(&self) -> &ModelTopology {
            &self.topology
        }
    }

    #[derive(Clone, Default)]
    pub struct FailingModelService {
        topology: ModelTopology,
    }

    #[async_trait]
    impl ModelService for FailingModelService {
        async fn infer(&self, _batch: Array2<f32>) -> Result<Array2<f32>, InferenceError> {
            Err(InferenceError::Runtime("backend unavailable".to_string()))
        }

        fn topology(&self) -> &ModelTopology {
            &self.topology
        }
    }

    /// Returns a fixed score matrix regardless of input.
    #[derive(Clone)]
    pub struct FixedModelService {
        pub scores: Array2<f32>,
        pub topology: ModelTopology,
    }

    #[async_trait]
    impl ModelService for FixedModelService {
        async fn infer(&self, _batch: Array2<f32>) -> Result<Array2<f32>, InferenceError> {
            Ok(self.scores.clone())
        }

        fn topology(&self) -> &ModelTopology {
            &self.topology
        }
    }
}
