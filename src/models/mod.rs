//! Models handed out by fixtures
//!
//! [`SimpleModel`] is the small MLP that run state fixtures train; the
//! [`tiny`] module holds miniature transformer fixtures for tests that need
//! a real architecture.

pub mod tiny;

use candle_core::{DType, Device, Tensor, Var};
use candle_nn::{linear, Linear, Module, VarBuilder, VarMap};
use serde::{Deserialize, Serialize};

use crate::checkout::{checkout_via_serde, Checkout};
use crate::error::Result;

/// Shape of a [`SimpleModel`]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SimpleModelConfig {
    /// Input features per sample
    pub num_features: usize,
    /// Width of the hidden layer
    pub hidden_dim: usize,
    /// Output classes
    pub num_classes: usize,
}

impl Default for SimpleModelConfig {
    fn default() -> Self {
        Self {
            num_features: 8,
            hidden_dim: 16,
            num_classes: 2,
        }
    }
}

/// Two-layer MLP classifier for run state fixtures
///
/// Small enough to build in microseconds, real enough to push batches
/// through an optimizer.
pub struct SimpleModel {
    config: SimpleModelConfig,
    device: Device,
    vars: VarMap,
    fc1: Linear,
    fc2: Linear,
}

impl SimpleModel {
    /// Build a freshly initialized model on `device`
    pub fn new(config: SimpleModelConfig, device: &Device) -> Result<Self> {
        Self::from_vars(config, device, VarMap::new())
    }

    /// Rebuild layer views over a variable map.
    ///
    /// Variables missing from the map are created and initialized; present
    /// ones are reused as-is, which is what deep copies and device moves
    /// rely on.
    fn from_vars(config: SimpleModelConfig, device: &Device, vars: VarMap) -> Result<Self> {
        let vb = VarBuilder::from_varmap(&vars, DType::F32, device);
        let fc1 = linear(config.num_features, config.hidden_dim, vb.pp("fc1"))?;
        let fc2 = linear(config.hidden_dim, config.num_classes, vb.pp("fc2"))?;
        Ok(Self {
            config,
            device: device.clone(),
            vars,
            fc1,
            fc2,
        })
    }

    /// Forward pass over a `(batch, num_features)` tensor
    pub fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let hidden = self.fc1.forward(xs)?.relu()?;
        Ok(self.fc2.forward(&hidden)?)
    }

    /// The model's shape
    pub fn config(&self) -> &SimpleModelConfig {
        &self.config
    }

    /// Device the parameters live on
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// All trainable parameters, in the form optimizers take
    pub fn trainable_vars(&self) -> Vec<Var> {
        self.vars.all_vars()
    }

    /// Look up one parameter by name, e.g. `"fc1.weight"`
    pub fn var(&self, name: &str) -> Option<Var> {
        self.vars.data().lock().unwrap().get(name).cloned()
    }

    /// Total number of scalar parameters
    pub fn parameter_count(&self) -> usize {
        self.vars
            .all_vars()
            .iter()
            .map(|v| v.as_tensor().elem_count())
            .sum()
    }

    /// Copy the model onto another device
    pub fn to_device(&self, device: &Device) -> Result<Self> {
        let vars = VarMap::new();
        {
            let src = self.vars.data().lock().unwrap();
            let mut dst = vars.data().lock().unwrap();
            for (name, var) in src.iter() {
                let moved = var.as_tensor().to_device(device)?;
                dst.insert(name.clone(), Var::from_tensor(&moved)?);
            }
        }
        Self::from_vars(self.config, device, vars)
    }
}

impl Checkout for SimpleModel {
    fn checkout(&self) -> Result<Self> {
        let vars = deep_copy_varmap(&self.vars)?;
        Self::from_vars(self.config, &self.device, vars)
    }
}

/// Deep-copy every variable in a map into fresh storage.
///
/// `VarMap` clones share `Var` storage, so a merely cloned model observes
/// the original's parameter updates. `Var::from_tensor` allocates new
/// backing memory for each entry.
pub fn deep_copy_varmap(src: &VarMap) -> Result<VarMap> {
    let copy = VarMap::new();
    {
        let src_data = src.data().lock().unwrap();
        let mut dst_data = copy.data().lock().unwrap();
        for (name, var) in src_data.iter() {
            dst_data.insert(name.clone(), Var::from_tensor(var.as_tensor())?);
        }
    }
    Ok(copy)
}

/// LoRA adapter hyperparameters handed to adapter-aware tests
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoraAdapterConfig {
    /// Rank of the low-rank update matrices
    pub rank: usize,
    /// Scaling factor applied to the update
    pub alpha: f32,
    /// Dropout probability on the adapter path
    pub dropout: f32,
    /// Module names the adapter attaches to
    pub target_modules: Vec<String>,
    /// Whether the wrapped layer stores transposed weights
    pub fan_in_fan_out: bool,
}

impl Default for LoraAdapterConfig {
    fn default() -> Self {
        Self {
            rank: 4,
            alpha: 8.0,
            dropout: 0.0,
            target_modules: vec!["q_proj".to_string(), "v_proj".to_string()],
            fan_in_fan_out: false,
        }
    }
}

impl Checkout for LoraAdapterConfig {
    fn checkout(&self) -> Result<Self> {
        checkout_via_serde(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device;

    fn model() -> SimpleModel {
        SimpleModel::new(SimpleModelConfig::default(), &device::cpu()).unwrap()
    }

    #[test]
    fn test_forward_shape() {
        let model = model();
        let batch = Tensor::zeros((4, 8), DType::F32, &device::cpu()).unwrap();
        let logits = model.forward(&batch).unwrap();
        assert_eq!(logits.dims(), &[4, 2]);
    }

    #[test]
    fn test_parameter_count() {
        // fc1: 8*16 + 16, fc2: 16*2 + 2
        assert_eq!(model().parameter_count(), 178);
    }

    #[test]
    fn test_named_parameters_exist() {
        let model = model();
        assert_eq!(
            model.var("fc1.weight").unwrap().as_tensor().dims(),
            &[16, 8]
        );
        assert_eq!(model.var("fc2.bias").unwrap().as_tensor().dims(), &[2]);
        assert!(model.var("fc3.weight").is_none());
    }

    #[test]
    fn test_checkout_preserves_weights() {
        let original = model();
        let copy = original.checkout().unwrap();

        let a = original
            .var("fc1.weight")
            .unwrap()
            .as_tensor()
            .to_vec2::<f32>()
            .unwrap();
        let b = copy
            .var("fc1.weight")
            .unwrap()
            .as_tensor()
            .to_vec2::<f32>()
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_checkout_does_not_share_storage() {
        let original = model();
        let copy = original.checkout().unwrap();

        let weight = copy.var("fc1.weight").unwrap();
        let zeros = weight.as_tensor().zeros_like().unwrap();
        weight.set(&zeros).unwrap();

        let copied_sum = copy
            .var("fc1.weight")
            .unwrap()
            .as_tensor()
            .abs()
            .unwrap()
            .sum_all()
            .unwrap()
            .to_scalar::<f32>()
            .unwrap();
        let original_sum = original
            .var("fc1.weight")
            .unwrap()
            .as_tensor()
            .abs()
            .unwrap()
            .sum_all()
            .unwrap()
            .to_scalar::<f32>()
            .unwrap();

        assert_eq!(copied_sum, 0.0);
        assert!(original_sum > 0.0);
    }

    #[test]
    fn test_to_device_keeps_values() {
        let original = model();
        let moved = original.to_device(&device::cpu()).unwrap();
        assert_eq!(
            original
                .var("fc2.weight")
                .unwrap()
                .as_tensor()
                .to_vec2::<f32>()
                .unwrap(),
            moved
                .var("fc2.weight")
                .unwrap()
                .as_tensor()
                .to_vec2::<f32>()
                .unwrap()
        );
    }

    #[test]
    fn test_lora_adapter_config_checkout() {
        let config = LoraAdapterConfig::default();
        let mut copy = config.checkout().unwrap();
        copy.target_modules.push("o_proj".to_string());
        assert_eq!(config.target_modules.len(), 2);
        assert_eq!(copy.target_modules.len(), 3);
    }
}
