use serde::Deserialize;
use std::{collections::HashSet, path::Path};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TopologyError {
    #[error("Failed to read topology descriptor: {0}")]
    Unreadable(#[from] config::ConfigError),
    #[error("Unsupported topology version {0}")]
    UnsupportedVersion(u32),
    #[error("Topology input width must be positive")]
    ZeroInputWidth,
    #[error("Topology has no layers")]
    NoLayers,
    #[error("Layer {0} has no units")]
    EmptyLayer(usize),
    #[error("Output layer must use softmax activation, found {0:?}")]
    OutputActivation(Activation),
    #[error("Output layer has {units} units but {labels} labels are configured")]
    LabelMismatch { units: usize, labels: usize },
    #[error("Gesture labels must be non-empty and unique")]
    InvalidLabels,
}

pub const SUPPORTED_VERSION: u32 = 1;

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    Relu,
    Softmax,
    Linear,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct DenseLayer {
    pub units: usize,
    pub activation: Activation,
}

impl DenseLayer {
    fn new(units: usize, activation: Activation) -> Self {
        Self { units, activation }
    }
}

/// Versioned descriptor of the network paired with a weights file.
///
/// Only the boundary matters to the service: `input_width` is the feature
/// vector length and the output layer has one unit per label. Hidden layers
/// are carried for the startup summary and parameter count.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct ModelTopology {
    pub version: u32,
    pub input_width: usize,
    pub layers: Vec<DenseLayer>,
    pub labels: Vec<String>,
}

impl Default for ModelTopology {
    fn default() -> Self {
        Self {
            version: SUPPORTED_VERSION,
            input_width: 300,
            layers: vec![
                DenseLayer::new(128, Activation::Relu),
                DenseLayer::new(64, Activation::Relu),
                DenseLayer::new(2, Activation::Softmax),
            ],
            labels: vec!["V".to_string(), "O".to_string()],
        }
    }
}

impl ModelTopology {
    pub fn from_file(path: &Path) -> Result<Self, TopologyError> {
        let topology = config::Config::builder()
            .add_source(config::File::from(path))
            .build()?
            .try_deserialize::<ModelTopology>()?;

        topology.validate()?;
        Ok(topology)
    }

    pub fn validate(&self) -> Result<(), TopologyError> {
        if self.version != SUPPORTED_VERSION {
            return Err(TopologyError::UnsupportedVersion(self.version));
        }
        if self.input_width == 0 {
            return Err(TopologyError::ZeroInputWidth);
        }
        if let Some(index) = self.layers.iter().position(|layer| layer.units == 0) {
            return Err(TopologyError::EmptyLayer(index));
        }

        let output = self.layers.last().ok_or(TopologyError::NoLayers)?;
        if output.activation != Activation::Softmax {
            return Err(TopologyError::OutputActivation(output.activation));
        }
        if output.units != self.labels.len() {
            return Err(TopologyError::LabelMismatch {
                units: output.units,
                labels: self.labels.len(),
            });
        }

        let mut seen = HashSet::new();
        if self
            .labels
            .iter()
            .any(|label| label.is_empty() || !seen.insert(label.as_str()))
        {
            return Err(TopologyError::InvalidLabels);
        }

        Ok(())
    }

    pub fn output_width(&self) -> usize {
        self.labels.len()
    }

    /// Weights plus biases over all dense layers.
    pub fn parameter_count(&self) -> usize {
        let mut fan_in = self.input_width;
        let mut total = 0;
        for layer in &self.layers {
            total += fan_in * layer.units + layer.units;
            fan_in = layer.units;
        }
        total
    }

    /// Startup summary as declared by the descriptor. The weights file is only
    /// checked at its input and output widths, so hidden layers are not verified.
    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines = vec![format!(
            "Topology v{} (declared by descriptor): input width {}, labels {:?}",
            self.version, self.input_width, self.labels
        )];
        let mut fan_in = self.input_width;
        for (i, layer) in self.layers.iter().enumerate() {
            lines.push(format!(
                "  dense_{}: {} -> {} ({:?}), {} params",
                i,
                fan_in,
                layer.units,
                layer.activation,
                fan_in * layer.units + layer.units
            ));
            fan_in = layer.units;
        }
        lines.push(format!("Declared params: {}", self.parameter_count()));
        lines
    }

    pub fn log_summary(&self) {
        for line in self.summary_lines() {
            tracing::info!("{}", line);
        }
    }
}
