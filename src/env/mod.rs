//! Environment collaborator: discrete-action simulators the agent trains on.

mod chain_walk;

pub use chain_walk::ChainWalk;

use ndarray::Array1;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{DynaError, Result};

/// Action space of an environment. Only discrete spaces can be planned over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ActionSpace {
    Discrete { n: usize },
    Continuous { low: Array1<f32>, high: Array1<f32> },
}

/// An action drawn from an [`ActionSpace`].
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Discrete(usize),
    Continuous(Array1<f32>),
}

impl ActionSpace {
    /// Number of actions, or `UnsupportedActionSpace` for continuous spaces.
    pub fn discrete_size(&self) -> Result<usize> {
        match self {
            ActionSpace::Discrete { n } if *n > 0 => Ok(*n),
            ActionSpace::Discrete { .. } => Err(DynaError::UnsupportedActionSpace(
                "discrete action space with zero actions".to_string(),
            )),
            ActionSpace::Continuous { low, .. } => Err(DynaError::UnsupportedActionSpace(format!(
                "continuous action space of dimension {}",
                low.len()
            ))),
        }
    }

    pub fn is_discrete(&self) -> bool {
        matches!(self, ActionSpace::Discrete { .. })
    }

    /// Uniform sample from the space.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Action {
        match self {
            ActionSpace::Discrete { n } => Action::Discrete(rng.gen_range(0..(*n).max(1))),
            ActionSpace::Continuous { low, high } => Action::Continuous(
                low.iter()
                    .zip(high.iter())
                    .map(|(&l, &h)| if l < h { rng.gen_range(l..h) } else { l })
                    .collect(),
            ),
        }
    }

    pub fn contains(&self, action: &Action) -> bool {
        match (self, action) {
            (ActionSpace::Discrete { n }, Action::Discrete(a)) => a < n,
            (ActionSpace::Continuous { low, high }, Action::Continuous(values)) => {
                values.len() == low.len()
                    && values
                        .iter()
                        .zip(low.iter().zip(high.iter()))
                        .all(|(&v, (&l, &h))| v >= l && v <= h)
            }
            _ => false,
        }
    }
}

/// Outcome of one environment step.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub next_state: Array1<f32>,
    pub reward: f32,
    pub done: bool,
    pub info: HashMap<String, f32>,
}

impl Transition {
    pub fn new(next_state: Array1<f32>, reward: f32, done: bool) -> Self {
        Transition {
            next_state,
            reward,
            done,
            info: HashMap::new(),
        }
    }
}

/// Reset/step simulator.
pub trait Environment {
    fn observation_size(&self) -> usize;

    fn action_space(&self) -> ActionSpace;

    /// Start a new episode and return its first observation.
    fn reset(&mut self) -> Array1<f32>;

    fn step(&mut self, action: usize) -> Result<Transition>;
}
