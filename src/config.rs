//! Agent and training-loop configuration.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{DynaError, Result};
use crate::optimizer::OptimizerKind;

/// Every tunable of the Dyna agent and its outer training loop.
///
/// Missing fields in a JSON file fall back to [`DynaConfig::default`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DynaConfig {
    /// Discount factor, `0 < gamma <= 1`
    pub gamma: f32,
    pub epsilon_decay_rate: f32,
    pub final_epsilon_value: f32,
    /// Mixing coefficient of the soft target update
    pub target_moving_average: f32,
    pub priority_threshold: f32,
    pub priority_decay: f32,
    /// `None` leaves rollout depth unbounded
    pub max_rollout_length: Option<usize>,
    /// Updates before planning and epsilon decay kick in
    pub warmup_period: u64,
    pub model_loss_threshold: f32,
    /// Capacity of the rollout queue
    pub queue_capacity: usize,
    /// Critic learning rate
    pub lr: f32,
    /// Dynamics model learning rate
    pub model_lr: f32,
    pub optimizer: OptimizerKind,
    pub hidden_layers: Vec<usize>,
    pub model_hidden_layers: Vec<usize>,

    pub iterations: usize,
    pub interactions_per_iter: usize,
    pub planning_steps_per_iter: usize,
    pub episodes_per_eval: usize,
    /// Cap on a single evaluation episode
    pub max_episode_steps: usize,

    pub seed: Option<u64>,
    pub run_tag: String,
    /// Tensorboard CSV logs are written here when set
    pub log_dir: Option<PathBuf>,
    pub checkpoint_dir: Option<PathBuf>,
    /// Iterations between checkpoints; 0 disables periodic checkpoints
    pub checkpoint_interval: usize,
}

impl Default for DynaConfig {
    fn default() -> Self {
        DynaConfig {
            gamma: 0.99,
            epsilon_decay_rate: 0.999,
            final_epsilon_value: 0.05,
            target_moving_average: 0.01,
            priority_threshold: 0.1,
            priority_decay: 0.9,
            max_rollout_length: None,
            warmup_period: 100,
            model_loss_threshold: 0.1,
            queue_capacity: 10_000,
            lr: 1e-3,
            model_lr: 1e-3,
            optimizer: OptimizerKind::Adam,
            hidden_layers: vec![64, 64],
            model_hidden_layers: vec![64, 64],
            iterations: 1_000,
            interactions_per_iter: 8,
            planning_steps_per_iter: 32,
            episodes_per_eval: 1,
            max_episode_steps: 500,
            seed: None,
            run_tag: "dyna".to_string(),
            log_dir: None,
            checkpoint_dir: None,
            checkpoint_interval: 0,
        }
    }
}

fn check(ok: bool, name: &str, reason: &str) -> Result<()> {
    if ok {
        Ok(())
    } else {
        Err(DynaError::invalid_parameter(name, reason))
    }
}

impl DynaConfig {
    pub fn validate(&self) -> Result<()> {
        check(self.gamma > 0.0 && self.gamma <= 1.0, "gamma", "must be in (0, 1]")?;
        check(
            self.epsilon_decay_rate > 0.0 && self.epsilon_decay_rate <= 1.0,
            "epsilon_decay_rate",
            "must be in (0, 1]",
        )?;
        check(
            (0.0..=1.0).contains(&self.final_epsilon_value),
            "final_epsilon_value",
            "must be in [0, 1]",
        )?;
        check(
            (0.0..=1.0).contains(&self.target_moving_average),
            "target_moving_average",
            "must be in [0, 1]",
        )?;
        check(
            self.priority_threshold.is_finite() && self.priority_threshold >= 0.0,
            "priority_threshold",
            "must be finite and non-negative",
        )?;
        check(
            self.priority_decay > 0.0 && self.priority_decay <= 1.0,
            "priority_decay",
            "must be in (0, 1]",
        )?;
        check(
            self.model_loss_threshold.is_finite(),
            "model_loss_threshold",
            "must be finite",
        )?;
        check(self.queue_capacity > 0, "queue_capacity", "must be at least 1")?;
        check(self.lr > 0.0 && self.lr.is_finite(), "lr", "must be positive")?;
        check(self.model_lr > 0.0 && self.model_lr.is_finite(), "model_lr", "must be positive")?;
        check(
            self.hidden_layers.iter().all(|&h| h > 0),
            "hidden_layers",
            "layer sizes must be non-zero",
        )?;
        check(
            self.model_hidden_layers.iter().all(|&h| h > 0),
            "model_hidden_layers",
            "layer sizes must be non-zero",
        )?;
        check(self.max_episode_steps > 0, "max_episode_steps", "must be at least 1")?;
        Ok(())
    }

    /// Load and validate a JSON config file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let config: DynaConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        DynaConfig::default().validate().unwrap();
    }

    #[test]
    fn test_validation_rejects_out_of_range() {
        let config = DynaConfig {
            gamma: 0.0,
            ..DynaConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(DynaError::InvalidParameter { ref name, .. }) if name == "gamma"
        ));

        let config = DynaConfig {
            queue_capacity: 0,
            ..DynaConfig::default()
        };
        assert!(config.validate().is_err());

        let config = DynaConfig {
            priority_decay: 1.5,
            ..DynaConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: DynaConfig =
            serde_json::from_str(r#"{"gamma": 0.9, "max_rollout_length": 3, "optimizer": "sgd"}"#).unwrap();
        assert_eq!(config.gamma, 0.9);
        assert_eq!(config.max_rollout_length, Some(3));
        assert_eq!(config.optimizer, OptimizerKind::Sgd);
        assert_eq!(config.queue_capacity, 10_000);
    }

    #[test]
    fn test_json_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dyna.json");
        let config = DynaConfig {
            seed: Some(42),
            warmup_period: 5,
            ..DynaConfig::default()
        };
        config.to_json_file(&path).unwrap();
        assert_eq!(DynaConfig::from_json_file(&path).unwrap(), config);
    }
}
