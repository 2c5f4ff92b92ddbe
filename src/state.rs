//! Mid-run execution state handed to tests
//!
//! [`RunState`] mirrors what a trainer would have assembled right before
//! its first step: a model on the right device, a bounded duration, and
//! (depending on the fixture) an optimizer and dataloader. Fixtures build
//! these fresh per test; [`Checkout`] exists for tests that want a second
//! independent copy of one.

use std::fmt;

use candle_core::Device;
use candle_nn::{Optimizer, SGD};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::checkout::Checkout;
use crate::data::Loader;
use crate::error::Result;
use crate::models::SimpleModel;
use crate::time::TimeBudget;

/// Numeric precision a run trains in
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum Precision {
    /// Full 32-bit floats
    #[default]
    #[serde(rename = "fp32")]
    Fp32,
    /// 16-bit floats
    #[serde(rename = "fp16")]
    Fp16,
    /// bfloat16
    #[serde(rename = "bf16")]
    Bf16,
}

impl Precision {
    /// The candle dtype for this precision
    pub fn as_dtype(&self) -> candle_core::DType {
        match self {
            Precision::Fp32 => candle_core::DType::F32,
            Precision::Fp16 => candle_core::DType::F16,
            Precision::Bf16 => candle_core::DType::BF16,
        }
    }
}

/// Learning-rate schedule attached to a run
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LrSchedule {
    /// Multiply the base rate by a fixed factor at every step
    Constant(f64),
}

impl LrSchedule {
    /// The multiplier applied at `step`
    pub fn factor_at(&self, _step: u64) -> f64 {
        match self {
            LrSchedule::Constant(factor) => *factor,
        }
    }
}

/// Execution state of one training run
pub struct RunState {
    /// Name the run reports to loggers and trackers
    pub run_name: String,
    /// Device the run computes on
    pub device: Device,
    /// Seed rank zero trains with
    pub rank_zero_seed: u64,
    /// Upper bound on how long the run may train
    pub max_duration: TimeBudget,
    /// The model being trained
    pub model: SimpleModel,
    /// Optimizer over the model's parameters, when the fixture provides one
    pub optimizer: Option<SGD>,
    /// Learning-rate schedule, when the fixture provides one
    pub lr_schedule: Option<LrSchedule>,
    /// Numeric precision of the run
    pub precision: Precision,
    /// Per-device microbatch size, when capped
    pub device_train_microbatch_size: Option<usize>,
    /// When this state was assembled
    pub created_at: DateTime<Utc>,
    dataloader: Option<Loader>,
    dataloader_label: Option<String>,
}

impl RunState {
    /// Assemble a state with only what every run needs; optimizer,
    /// schedule, and dataloader start unset.
    pub fn new(
        run_name: impl Into<String>,
        device: Device,
        rank_zero_seed: u64,
        max_duration: TimeBudget,
        model: SimpleModel,
    ) -> Self {
        Self {
            run_name: run_name.into(),
            device,
            rank_zero_seed,
            max_duration,
            model,
            optimizer: None,
            lr_schedule: None,
            precision: Precision::default(),
            device_train_microbatch_size: None,
            created_at: Utc::now(),
            dataloader: None,
            dataloader_label: None,
        }
    }

    /// Attach a dataloader and the label its metrics are grouped under
    pub fn set_dataloader(&mut self, loader: Loader, label: impl Into<String>) {
        self.dataloader = Some(loader);
        self.dataloader_label = Some(label.into());
    }

    /// The active dataloader, if one is attached
    pub fn dataloader(&self) -> Option<&Loader> {
        self.dataloader.as_ref()
    }

    /// Label of the active dataloader
    pub fn dataloader_label(&self) -> Option<&str> {
        self.dataloader_label.as_deref()
    }
}

impl Checkout for RunState {
    fn checkout(&self) -> Result<Self> {
        let model = self.model.checkout()?;
        // A rebuilt optimizer must drive the copied parameters, not the
        // original's.
        let optimizer = match &self.optimizer {
            Some(opt) => Some(SGD::new(model.trainable_vars(), opt.learning_rate())?),
            None => None,
        };
        let dataloader = match &self.dataloader {
            Some(loader) => Some(loader.checkout()?),
            None => None,
        };

        Ok(Self {
            run_name: self.run_name.clone(),
            device: self.device.clone(),
            rank_zero_seed: self.rank_zero_seed,
            max_duration: self.max_duration,
            model,
            optimizer,
            lr_schedule: self.lr_schedule,
            precision: self.precision,
            device_train_microbatch_size: self.device_train_microbatch_size,
            created_at: self.created_at,
            dataloader,
            dataloader_label: self.dataloader_label.clone(),
        })
    }
}

impl fmt::Debug for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunState")
            .field("run_name", &self.run_name)
            .field("device", &self.device)
            .field("rank_zero_seed", &self.rank_zero_seed)
            .field("max_duration", &self.max_duration)
            .field("precision", &self.precision)
            .field("has_optimizer", &self.optimizer.is_some())
            .field("dataloader_label", &self.dataloader_label)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{RandomClassificationConfig, RandomClassificationDataset};
    use crate::device;
    use crate::models::SimpleModelConfig;

    fn base_state() -> RunState {
        let model = SimpleModel::new(SimpleModelConfig::default(), &device::cpu()).unwrap();
        RunState::new(
            "test_run",
            device::cpu(),
            0,
            TimeBudget::epochs(100),
            model,
        )
    }

    #[test]
    fn test_new_state_starts_minimal() {
        let state = base_state();
        assert!(state.optimizer.is_none());
        assert!(state.lr_schedule.is_none());
        assert!(state.dataloader().is_none());
        assert!(state.dataloader_label().is_none());
        assert_eq!(state.precision, Precision::Fp32);
        assert!(state.device_train_microbatch_size.is_none());
    }

    #[test]
    fn test_set_dataloader_records_the_label() {
        let mut state = base_state();
        let dataset = RandomClassificationDataset::generate(
            &RandomClassificationConfig::default(),
            &device::cpu(),
        )
        .unwrap();
        state.set_dataloader(Loader::new(&dataset, 4).unwrap(), "train");

        assert_eq!(state.dataloader_label(), Some("train"));
        assert_eq!(state.dataloader().unwrap().batch_size(), 4);
    }

    #[test]
    fn test_checkout_rebuilds_the_optimizer() {
        let mut state = base_state();
        state.optimizer = Some(SGD::new(state.model.trainable_vars(), 0.001).unwrap());

        let copy = state.checkout().unwrap();
        let copied_opt = copy.optimizer.as_ref().unwrap();
        assert_eq!(copied_opt.learning_rate(), 0.001);
        assert_eq!(copy.run_name, state.run_name);
    }

    #[test]
    fn test_checkout_model_is_independent() {
        let state = base_state();
        let copy = state.checkout().unwrap();

        let weight = copy.model.var("fc1.weight").unwrap();
        let zeros = weight.as_tensor().zeros_like().unwrap();
        weight.set(&zeros).unwrap();

        let original_sum = state
            .model
            .var("fc1.weight")
            .unwrap()
            .as_tensor()
            .abs()
            .unwrap()
            .sum_all()
            .unwrap()
            .to_scalar::<f32>()
            .unwrap();
        assert!(original_sum > 0.0);
    }

    #[test]
    fn test_precision_serializes_to_short_tags() {
        assert_eq!(serde_json::to_string(&Precision::Fp32).unwrap(), "\"fp32\"");
        assert_eq!(serde_json::to_string(&Precision::Bf16).unwrap(), "\"bf16\"");
        assert_eq!(Precision::Fp16.as_dtype(), candle_core::DType::F16);
    }

    #[test]
    fn test_constant_schedule_is_flat() {
        let schedule = LrSchedule::Constant(1.0);
        assert_eq!(schedule.factor_at(0), 1.0);
        assert_eq!(schedule.factor_at(10_000), 1.0);
    }
}
