use crate::{
    config::ModelConfig,
    model_service::{InferenceError, ModelService},
    topology::{ModelTopology, TopologyError},
};
use async_trait::async_trait;
use ndarray::{Array2, Ix2};
use ort::{
    session::{builder::GraphOptimizationLevel, Session},
    value::{TensorRef, ValueType},
};
use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelLoadError {
    #[error("Model file not found: {0:?}")]
    NotFound(PathBuf),
    #[error("Failed to load model: {0}")]
    Runtime(#[from] ort::Error),
    #[error("Invalid topology: {0}")]
    Topology(#[from] TopologyError),
    #[error("Model {kind} is not a tensor")]
    NotATensor { kind: &'static str },
    #[error("Model has no {kind}")]
    MissingIo { kind: &'static str },
    #[error("Model {kind} width {actual} does not match topology width {expected}")]
    IncompatibleWidth {
        kind: &'static str,
        actual: i64,
        expected: usize,
    },
}

/// ONNX Runtime host for the gesture network.
///
/// Holds a pool of sessions over the same weights; requests pick one
/// round-robin. Sessions are never reloaded after construction.
#[derive(Clone)]
pub struct OrtModelService {
    sessions: Arc<Vec<Arc<Mutex<Session>>>>,
    counter: Arc<AtomicUsize>,
    output_name: Arc<str>,
    topology: Arc<ModelTopology>,
}

impl OrtModelService {
    pub fn new(model_config: &ModelConfig, topology: ModelTopology) -> Result<Self, ModelLoadError> {
        topology.validate()?;

        let model_path = model_config.get_path();
        if !model_path.exists() {
            return Err(ModelLoadError::NotFound(model_path));
        }

        let num_instances = model_config.num_instances.max(1);
        let sessions = (0..num_instances)
            .map(|_| {
                let session = Session::builder()?
                    .with_optimization_level(GraphOptimizationLevel::Level3)?
                    .commit_from_file(&model_path)?;
                Ok(session)
            })
            .collect::<Result<Vec<_>, ort::Error>>()?;

        let output_name = check_io(&sessions[0], &topology)?;

        tracing::info!(
            "Created {} ONNX sessions from {:?}",
            num_instances,
            model_path
        );

        Ok(Self {
            sessions: Arc::new(
                sessions
                    .into_iter()
                    .map(|session| Arc::new(Mutex::new(session)))
                    .collect(),
            ),
            counter: Arc::new(AtomicUsize::new(0)),
            output_name: output_name.into(),
            topology: Arc::new(topology),
        })
    }

    pub fn run_inference(&self, input: &Array2<f32>) -> Result<Array2<f32>, InferenceError> {
        let index = self.counter.fetch_add(1, Ordering::SeqCst) % self.sessions.len();
        let mut session = self.sessions[index]
            .lock()
            .map_err(|e| InferenceError::Poisoned(e.to_string()))?;

        tracing::debug!("Handling request with session {}", index);
        let owned_buffer;
        let input_view = if input.view().is_standard_layout() {
            input.view()
        } else {
            owned_buffer = input.as_standard_layout().to_owned();
            owned_buffer.view()
        };

        let tensor_ref = TensorRef::from_array_view(input_view)
            .map_err(|e| InferenceError::Runtime(format!("failed to build tensor: {}", e)))?;

        let outputs = session
            .run(ort::inputs![tensor_ref])
            .map_err(|e| InferenceError::Runtime(e.to_string()))?;

        let (shape, data) = outputs[&*self.output_name]
            .try_extract_tensor::<f32>()
            .map_err(|e| InferenceError::Runtime(format!("failed to extract tensor: {}", e)))?;

        let unexpected = InferenceError::UnexpectedOutput {
            actual: shape.iter().map(|&d| d.max(0) as usize).collect(),
            expected: self.topology.output_width(),
        };

        let scores = match ndarray::ArrayD::from_shape_vec(shape.to_ixdyn(), data.to_vec())
            .ok()
            .and_then(|array| array.into_dimensionality::<Ix2>().ok())
        {
            Some(scores) => scores,
            None => return Err(unexpected),
        };

        Ok(scores)
    }
}

/// Checks the session boundary against the topology and returns the output name.
fn check_io(session: &Session, topology: &ModelTopology) -> Result<String, ModelLoadError> {
    let input = session
        .inputs
        .first()
        .ok_or(ModelLoadError::MissingIo { kind: "input" })?;
    check_width("input", &input.input_type, topology.input_width)?;

    let output = session
        .outputs
        .first()
        .ok_or(ModelLoadError::MissingIo { kind: "output" })?;
    check_width("output", &output.output_type, topology.output_width())?;

    Ok(output.name.clone())
}

fn check_width(
    kind: &'static str,
    value_type: &ValueType,
    expected: usize,
) -> Result<(), ModelLoadError> {
    let dimensions = match value_type {
        ValueType::Tensor { shape, .. } => Some(&shape[..]),
        _ => None,
    };
    check_dimensions(kind, dimensions, expected)
}

/// `None` means the value is not a tensor at all.
fn check_dimensions(
    kind: &'static str,
    dimensions: Option<&[i64]>,
    expected: usize,
) -> Result<(), ModelLoadError> {
    let dimensions = dimensions.ok_or(ModelLoadError::NotATensor { kind })?;

    match dimensions.last() {
        // Negative dimensions are symbolic and resolved at run time.
        Some(&width) if width < 0 || width as usize == expected => Ok(()),
        Some(&width) => Err(ModelLoadError::IncompatibleWidth {
            kind,
            actual: width,
            expected,
        }),
        None => Err(ModelLoadError::IncompatibleWidth {
            kind,
            actual: 0,
            expected,
        }),
    }
}

#[async_trait]
impl ModelService for OrtModelService {
    async fn infer(&self, batch: Array2<f32>) -> Result<Array2<f32>, InferenceError> {
        self.run_inference(&batch)
    }

    fn topology(&self) -> &ModelTopology {
        &self.topology
    }
}
