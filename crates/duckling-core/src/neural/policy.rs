//! Policy trait and built-in policies
//!
//! A policy maps one observation to one action. Its input and output lengths
//! are fixed when it is constructed or loaded.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::{Error, Result};

/// A learned (or scripted) control policy
pub trait Policy: Send {
    /// Produce an action from an observation
    fn infer(&mut self, observation: &[f64]) -> Result<Vec<f64>>;

    /// Expected observation length, `None` if any length is accepted
    fn input_dim(&self) -> Option<usize>;

    /// Length of every produced action
    fn output_dim(&self) -> usize;

    /// Human-readable name for this policy
    fn name(&self) -> &str;
}

fn check_input(expected: Option<usize>, observation: &[f64]) -> Result<()> {
    match expected {
        Some(dim) if dim != observation.len() => Err(Error::Inference(format!(
            "observation has {} values, policy expects {}",
            observation.len(),
            dim
        ))),
        _ => Ok(()),
    }
}

/// Always returns a zero action
#[derive(Debug, Clone)]
pub struct ZeroPolicy {
    output_dim: usize,
}

impl ZeroPolicy {
    pub fn new(output_dim: usize) -> Self {
        Self { output_dim }
    }
}

impl Policy for ZeroPolicy {
    fn infer(&mut self, _observation: &[f64]) -> Result<Vec<f64>> {
        Ok(vec![0.0; self.output_dim])
    }

    fn input_dim(&self) -> Option<usize> {
        None
    }

    fn output_dim(&self) -> usize {
        self.output_dim
    }

    fn name(&self) -> &str {
        "ZeroPolicy"
    }
}

/// Always returns the same action
#[derive(Debug, Clone)]
pub struct ConstantPolicy {
    action: Vec<f64>,
}

impl ConstantPolicy {
    pub fn new(action: Vec<f64>) -> Self {
        Self { action }
    }
}

impl Policy for ConstantPolicy {
    fn infer(&mut self, _observation: &[f64]) -> Result<Vec<f64>> {
        Ok(self.action.clone())
    }

    fn input_dim(&self) -> Option<usize> {
        None
    }

    fn output_dim(&self) -> usize {
        self.action.len()
    }

    fn name(&self) -> &str {
        "ConstantPolicy"
    }
}

/// A policy backed by a closure
pub struct FnPolicy<F> {
    output_dim: usize,
    infer: F,
}

impl<F> FnPolicy<F>
where
    F: FnMut(&[f64]) -> Result<Vec<f64>> + Send,
{
    pub fn new(output_dim: usize, infer: F) -> Self {
        Self { output_dim, infer }
    }
}

impl<F> Policy for FnPolicy<F>
where
    F: FnMut(&[f64]) -> Result<Vec<f64>> + Send,
{
    fn infer(&mut self, observation: &[f64]) -> Result<Vec<f64>> {
        (self.infer)(observation)
    }

    fn input_dim(&self) -> Option<usize> {
        None
    }

    fn output_dim(&self) -> usize {
        self.output_dim
    }

    fn name(&self) -> &str {
        "FnPolicy"
    }
}

/// Activation applied after a dense layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    #[default]
    Identity,
    Relu,
    Elu,
    Tanh,
}

impl Activation {
    #[inline]
    fn apply(self, x: f64) -> f64 {
        match self {
            Activation::Identity => x,
            Activation::Relu => x.max(0.0),
            Activation::Elu => {
                if x > 0.0 {
                    x
                } else {
                    x.exp_m1()
                }
            }
            Activation::Tanh => x.tanh(),
        }
    }
}

/// One fully connected layer as stored in the model resource
///
/// `weights` is row-major, one row per output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DenseLayer {
    pub weights: Vec<Vec<f64>>,
    pub bias: Vec<f64>,
    #[serde(default)]
    pub activation: Activation,
}

#[derive(Debug, Deserialize)]
struct DenseModelFile {
    layers: Vec<DenseLayer>,
}

#[derive(Debug, Clone)]
struct CompiledLayer {
    weights: DMatrix<f64>,
    bias: DVector<f64>,
    activation: Activation,
}

/// A multilayer perceptron loaded from a JSON weights file
#[derive(Debug, Clone)]
pub struct DenseMlpPolicy {
    layers: Vec<CompiledLayer>,
    input_dim: usize,
    output_dim: usize,
}

impl DenseMlpPolicy {
    /// Build from layers, checking that shapes chain together
    pub fn from_layers(layers: Vec<DenseLayer>) -> Result<Self> {
        if layers.is_empty() {
            return Err(Error::Resource("model has no layers".into()));
        }

        let mut compiled = Vec::with_capacity(layers.len());
        let mut prev_out: Option<usize> = None;
        for (i, layer) in layers.into_iter().enumerate() {
            let rows = layer.weights.len();
            let cols = layer.weights.first().map(Vec::len).unwrap_or(0);
            if rows == 0 || cols == 0 {
                return Err(Error::Resource(format!("layer {} has empty weights", i)));
            }
            if layer.weights.iter().any(|row| row.len() != cols) {
                return Err(Error::Resource(format!("layer {} has ragged weights", i)));
            }
            if layer.bias.len() != rows {
                return Err(Error::Resource(format!(
                    "layer {} has {} biases for {} outputs",
                    i,
                    layer.bias.len(),
                    rows
                )));
            }
            if let Some(prev) = prev_out {
                if prev != cols {
                    return Err(Error::Resource(format!(
                        "layer {} takes {} inputs but previous layer produces {}",
                        i, cols, prev
                    )));
                }
            }
            prev_out = Some(rows);

            compiled.push(CompiledLayer {
                weights: DMatrix::from_fn(rows, cols, |r, c| layer.weights[r][c]),
                bias: DVector::from_vec(layer.bias),
                activation: layer.activation,
            });
        }

        let input_dim = compiled[0].weights.ncols();
        let output_dim = compiled[compiled.len() - 1].weights.nrows();
        Ok(Self {
            layers: compiled,
            input_dim,
            output_dim,
        })
    }

    /// Load a model resource
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::ResourceNotFound {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path)?;
        let model: DenseModelFile = serde_json::from_str(&content)
            .map_err(|e| Error::Resource(format!("{}: {}", path.display(), e)))?;
        let policy = Self::from_layers(model.layers)?;
        tracing::info!(
            "Loaded dense policy from {} ({} -> {})",
            path.display(),
            policy.input_dim,
            policy.output_dim
        );
        Ok(policy)
    }
}

impl Policy for DenseMlpPolicy {
    fn infer(&mut self, observation: &[f64]) -> Result<Vec<f64>> {
        check_input(Some(self.input_dim), observation)?;

        let mut x = DVector::from_column_slice(observation);
        for layer in &self.layers {
            let mut y = &layer.weights * &x + &layer.bias;
            y.apply(|v| *v = layer.activation.apply(*v));
            x = y;
        }

        if x.iter().any(|v| !v.is_finite()) {
            return Err(Error::Inference("policy produced a non-finite action".into()));
        }
        Ok(x.as_slice().to_vec())
    }

    fn input_dim(&self) -> Option<usize> {
        Some(self.input_dim)
    }

    fn output_dim(&self) -> usize {
        self.output_dim
    }

    fn name(&self) -> &str {
        "DenseMlpPolicy"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_zero_policy() {
        let mut policy = ZeroPolicy::new(3);
        assert_eq!(policy.infer(&[1.0, 2.0]).unwrap(), vec![0.0; 3]);
        assert_eq!(policy.output_dim(), 3);
        assert!(policy.input_dim().is_none());
    }

    #[test]
    fn test_constant_policy() {
        let mut policy = ConstantPolicy::new(vec![0.5, -0.5]);
        assert_eq!(policy.infer(&[]).unwrap(), vec![0.5, -0.5]);
    }

    #[test]
    fn test_fn_policy() {
        let mut policy = FnPolicy::new(1, |obs: &[f64]| Ok(vec![obs.iter().sum()]));
        assert_eq!(policy.infer(&[1.0, 2.0, 3.0]).unwrap(), vec![6.0]);
    }

    fn two_layer() -> DenseMlpPolicy {
        DenseMlpPolicy::from_layers(vec![
            DenseLayer {
                weights: vec![vec![1.0, 0.0], vec![0.0, -1.0]],
                bias: vec![0.0, 0.0],
                activation: Activation::Relu,
            },
            DenseLayer {
                weights: vec![vec![1.0, 1.0]],
                bias: vec![0.5],
                activation: Activation::Identity,
            },
        ])
        .unwrap()
    }

    #[test]
    fn test_dense_forward() {
        let mut policy = two_layer();
        assert_eq!(policy.input_dim(), Some(2));
        assert_eq!(policy.output_dim(), 1);
        // relu([2, -3]) = [2, 3] -> 2 + 3 + 0.5
        let out = policy.infer(&[2.0, 3.0]).unwrap();
        assert_relative_eq!(out[0], 2.5);
        let out = policy.infer(&[2.0, -3.0]).unwrap();
        assert_relative_eq!(out[0], 5.5);
    }

    #[test]
    fn test_dense_rejects_wrong_input() {
        let mut policy = two_layer();
        assert!(matches!(policy.infer(&[1.0]), Err(Error::Inference(_))));
    }

    #[test]
    fn test_dense_shape_validation() {
        let bad = DenseMlpPolicy::from_layers(vec![
            DenseLayer {
                weights: vec![vec![1.0, 0.0]],
                bias: vec![0.0],
                activation: Activation::Tanh,
            },
            DenseLayer {
                weights: vec![vec![1.0, 1.0]],
                bias: vec![0.0],
                activation: Activation::Identity,
            },
        ]);
        assert!(bad.is_err());
        assert!(DenseMlpPolicy::from_layers(vec![]).is_err());
    }

    #[test]
    fn test_activations() {
        assert_relative_eq!(Activation::Elu.apply(-1.0), (-1.0f64).exp() - 1.0);
        assert_relative_eq!(Activation::Elu.apply(2.0), 2.0);
        assert_relative_eq!(Activation::Relu.apply(-2.0), 0.0);
        assert_relative_eq!(Activation::Tanh.apply(0.0), 0.0);
    }

    #[test]
    fn test_load_missing_model() {
        let err = DenseMlpPolicy::load("/nonexistent/model.json").unwrap_err();
        assert!(matches!(err, Error::ResourceNotFound { .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_load_model_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policy.json");
        std::fs::write(
            &path,
            r#"{"layers": [{"weights": [[2.0]], "bias": [1.0], "activation": "elu"}]}"#,
        )
        .unwrap();
        let mut policy = DenseMlpPolicy::load(&path).unwrap();
        assert_relative_eq!(policy.infer(&[1.0]).unwrap()[0], 3.0);
    }
}
