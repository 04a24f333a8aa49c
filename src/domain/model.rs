//! Feed-forward model reconstructed from an architecture descriptor and a
//! separate weights payload.
//!
//! The two parts arrive as distinct blobs inside the model archive and are
//! merged exactly once, at load time, into an immutable [`SequentialModel`].

use serde::{Deserialize, Serialize};

use super::features::FEATURE_COUNT;
use super::ArtifactError;

/// Layer activation function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    Relu,
    Sigmoid,
    Tanh,
    Linear,
}

impl Activation {
    fn apply(self, x: f64) -> f64 {
        match self {
            Self::Relu => x.max(0.0),
            Self::Sigmoid => 1.0 / (1.0 + (-x).exp()),
            Self::Tanh => x.tanh(),
            Self::Linear => x,
        }
    }
}

/// One dense layer in the architecture descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseLayerSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub units: usize,
    pub activation: Activation,
}

/// Architecture descriptor (JSON).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArchitecture {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub input_dim: usize,
    pub layers: Vec<DenseLayerSpec>,
}

impl ModelArchitecture {
    /// Parse a descriptor blob.
    ///
    /// # Errors
    /// Returns `ArtifactError::Deserialization` if the JSON is malformed.
    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self, ArtifactError> {
        serde_json::from_slice(bytes)
            .map_err(|e| ArtifactError::Deserialization(format!("architecture: {e}")))
    }
}

/// Trained parameters of one dense layer.
///
/// `kernel` is row-major with shape `fan_in x units`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerWeights {
    pub kernel: Vec<f64>,
    pub bias: Vec<f64>,
}

/// Weights payload (bincode).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelWeights {
    pub layers: Vec<LayerWeights>,
}

impl ModelWeights {
    /// Decode a bincode weights blob.
    ///
    /// # Errors
    /// Returns `ArtifactError::Deserialization` if the payload cannot be decoded.
    pub fn from_bincode(bytes: &[u8]) -> Result<Self, ArtifactError> {
        bincode::deserialize(bytes)
            .map_err(|e| ArtifactError::Deserialization(format!("weights: {e}")))
    }

    /// Encode as bincode.
    ///
    /// # Errors
    /// Returns `ArtifactError::Deserialization` if encoding fails.
    pub fn to_bincode(&self) -> Result<Vec<u8>, ArtifactError> {
        bincode::serialize(self)
            .map_err(|e| ArtifactError::Deserialization(format!("weights: {e}")))
    }
}

#[derive(Debug, Clone)]
struct DenseLayer {
    fan_in: usize,
    units: usize,
    activation: Activation,
    kernel: Vec<f64>,
    bias: Vec<f64>,
}

impl DenseLayer {
    fn forward(&self, input: &[f64]) -> Vec<f64> {
        (0..self.units)
            .map(|j| {
                let z = input
                    .iter()
                    .enumerate()
                    .fold(self.bias[j], |acc, (i, x)| {
                        acc + x * self.kernel[i * self.units + j]
                    });
                self.activation.apply(z)
            })
            .collect()
    }
}

/// Immutable feed-forward model producing one positive-class probability.
#[derive(Debug, Clone)]
pub struct SequentialModel {
    name: Option<String>,
    input_dim: usize,
    layers: Vec<DenseLayer>,
}

fn all_finite(values: &[f64]) -> bool {
    values.iter().all(|v| v.is_finite())
}

impl SequentialModel {
    /// Apply a weights payload to an architecture.
    ///
    /// # Errors
    /// Returns `ArtifactError::ShapeMismatch` when the weights do not fit the
    /// architecture, or the architecture does not fit the feature schema.
    pub fn assemble(
        architecture: ModelArchitecture,
        weights: ModelWeights,
    ) -> Result<Self, ArtifactError> {
        if architecture.input_dim != FEATURE_COUNT {
            return Err(ArtifactError::ShapeMismatch(format!(
                "architecture expects {} inputs, feature schema has {FEATURE_COUNT}",
                architecture.input_dim
            )));
        }
        if architecture.layers.is_empty() {
            return Err(ArtifactError::ShapeMismatch(
                "architecture has no layers".into(),
            ));
        }
        if architecture.layers.len() != weights.layers.len() {
            return Err(ArtifactError::ShapeMismatch(format!(
                "architecture has {} layers, weights have {}",
                architecture.layers.len(),
                weights.layers.len()
            )));
        }

        let mut layers = Vec::with_capacity(architecture.layers.len());
        let mut fan_in = architecture.input_dim;
        for (i, (spec, w)) in architecture.layers.into_iter().zip(weights.layers).enumerate() {
            let label = spec.name.clone().unwrap_or_else(|| format!("layer {i}"));
            if spec.units == 0 {
                return Err(ArtifactError::ShapeMismatch(format!("{label}: zero units")));
            }
            let kernel_len = fan_in.checked_mul(spec.units).ok_or_else(|| {
                ArtifactError::ShapeMismatch(format!(
                    "{label}: {fan_in}x{} overflows",
                    spec.units
                ))
            })?;
            if w.kernel.len() != kernel_len {
                return Err(ArtifactError::ShapeMismatch(format!(
                    "{label}: kernel has {} values, expected {fan_in}x{}",
                    w.kernel.len(),
                    spec.units
                )));
            }
            if w.bias.len() != spec.units {
                return Err(ArtifactError::ShapeMismatch(format!(
                    "{label}: bias has {} values, expected {}",
                    w.bias.len(),
                    spec.units
                )));
            }
            if !all_finite(&w.kernel) || !all_finite(&w.bias) {
                return Err(ArtifactError::ShapeMismatch(format!(
                    "{label}: non-finite weights"
                )));
            }

            layers.push(DenseLayer {
                fan_in,
                units: spec.units,
                activation: spec.activation,
                kernel: w.kernel,
                bias: w.bias,
            });
            fan_in = spec.units;
        }

        if let Some(last) = layers.last() {
            if last.units != 1 || last.activation != Activation::Sigmoid {
                return Err(ArtifactError::ShapeMismatch(format!(
                    "output layer must be 1 sigmoid unit, got {} {:?}",
                    last.units, last.activation
                )));
            }
        }

        Ok(Self {
            name: architecture.name,
            input_dim: architecture.input_dim,
            layers,
        })
    }

    /// Model name from the descriptor, if any.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Expected input width.
    #[must_use]
    pub fn input_dim(&self) -> usize {
        self.input_dim
    }

    /// Number of dense layers.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.layers.len()
    }

    /// Total trainable parameter count.
    #[must_use]
    pub fn parameter_count(&self) -> usize {
        self.layers
            .iter()
            .map(|l| l.kernel.len() + l.bias.len())
            .sum()
    }

    /// Forward pass for one row; returns the output unit.
    ///
    /// # Errors
    /// Returns `ArtifactError::ShapeMismatch` if `input` has the wrong width.
    pub fn forward(&self, input: &[f64]) -> Result<f64, ArtifactError> {
        if input.len() != self.input_dim {
            return Err(ArtifactError::ShapeMismatch(format!(
                "input has {} values, model expects {}",
                input.len(),
                self.input_dim
            )));
        }

        let mut activations = input.to_vec();
        for layer in &self.layers {
            activations = layer.forward(&activations);
        }

        activations
            .first()
            .copied()
            .ok_or_else(|| ArtifactError::ShapeMismatch("model produced no output".into()))
    }
}

#[cfg(test)]
pub(crate) fn logistic_fixture(weights: [f64; FEATURE_COUNT], bias: f64) -> SequentialModel {
    let architecture = ModelArchitecture {
        name: Some("logistic".into()),
        input_dim: FEATURE_COUNT,
        layers: vec![DenseLayerSpec {
            name: None,
            units: 1,
            activation: Activation::Sigmoid,
        }],
    };
    let weights = ModelWeights {
        layers: vec![LayerWeights {
            kernel: weights.to_vec(),
            bias: vec![bias],
        }],
    };
    SequentialModel::assemble(architecture, weights).expect("valid fixture")
}
