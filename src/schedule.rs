//! Exploration schedule.
//!
//! The step counter and current epsilon are carried in an explicit
//! [`ScheduleState`] value; [`EpsilonSchedule`] only holds the constants and
//! maps one state to the next.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{DynaError, Result};

/// Global step counter and current exploration rate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScheduleState {
    pub step_count: u64,
    pub epsilon: f32,
}

impl ScheduleState {
    /// Step zero, fully random exploration.
    pub fn initial() -> Self {
        ScheduleState {
            step_count: 0,
            epsilon: 1.0,
        }
    }
}

impl Default for ScheduleState {
    fn default() -> Self {
        Self::initial()
    }
}

/// Multiplicative epsilon decay with a floor, active once `warmup` steps
/// have been taken.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpsilonSchedule {
    decay_rate: f32,
    final_epsilon: f32,
    warmup: u64,
}

impl EpsilonSchedule {
    pub fn new(decay_rate: f32, final_epsilon: f32, warmup: u64) -> Result<Self> {
        if !(decay_rate > 0.0 && decay_rate <= 1.0) {
            return Err(DynaError::invalid_parameter(
                "epsilon_decay_rate",
                "must be in (0, 1]",
            ));
        }
        if !(0.0..=1.0).contains(&final_epsilon) {
            return Err(DynaError::invalid_parameter(
                "final_epsilon_value",
                "must be in [0, 1]",
            ));
        }
        Ok(EpsilonSchedule {
            decay_rate,
            final_epsilon,
            warmup,
        })
    }

    pub fn decay_rate(&self) -> f32 {
        self.decay_rate
    }

    pub fn final_epsilon(&self) -> f32 {
        self.final_epsilon
    }

    pub fn warmup(&self) -> u64 {
        self.warmup
    }

    /// Apply one decay at `state.step_count`; before warmup this is a no-op.
    pub fn on_step(&self, state: ScheduleState) -> ScheduleState {
        if state.step_count >= self.warmup {
            ScheduleState {
                epsilon: (state.epsilon * self.decay_rate).max(self.final_epsilon),
                ..state
            }
        } else {
            state
        }
    }

    /// Advance the step counter by one, then apply [`EpsilonSchedule::on_step`].
    pub fn tick(&self, state: ScheduleState) -> ScheduleState {
        self.on_step(ScheduleState {
            step_count: state.step_count + 1,
            ..state
        })
    }

    /// Epsilon-greedy choice over `n_actions` discrete actions.
    pub fn sample_action<R: Rng + ?Sized>(
        &self,
        state: &ScheduleState,
        greedy_action: usize,
        n_actions: usize,
        rng: &mut R,
    ) -> usize {
        if n_actions > 0 && rng.gen::<f32>() < state.epsilon {
            rng.gen_range(0..n_actions)
        } else {
            greedy_action
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_no_decay_before_warmup() {
        let schedule = EpsilonSchedule::new(0.5, 0.1, 10).unwrap();
        let state = ScheduleState { step_count: 9, epsilon: 1.0 };
        assert_eq!(schedule.on_step(state), state);
    }

    #[test]
    fn test_decay_and_floor() {
        let schedule = EpsilonSchedule::new(0.5, 0.2, 0).unwrap();
        let mut state = ScheduleState::initial();
        state = schedule.tick(state);
        assert_eq!(state.step_count, 1);
        assert_eq!(state.epsilon, 0.5);
        state = schedule.tick(state);
        assert_eq!(state.epsilon, 0.25);
        state = schedule.tick(state);
        assert_eq!(state.epsilon, 0.2);
    }

    #[test]
    fn test_tick_decays_on_reaching_warmup() {
        let schedule = EpsilonSchedule::new(0.5, 0.0, 2).unwrap();
        let state = schedule.tick(ScheduleState::initial());
        assert_eq!(state.epsilon, 1.0);
        let state = schedule.tick(state);
        assert_eq!(state.step_count, 2);
        assert_eq!(state.epsilon, 0.5);
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(EpsilonSchedule::new(0.0, 0.1, 0).is_err());
        assert!(EpsilonSchedule::new(1.5, 0.1, 0).is_err());
        assert!(EpsilonSchedule::new(0.9, -0.1, 0).is_err());
    }

    #[test]
    fn test_sample_action_extremes() {
        let schedule = EpsilonSchedule::new(0.9, 0.0, 0).unwrap();
        let mut rng = StdRng::seed_from_u64(11);

        let greedy = ScheduleState { step_count: 0, epsilon: 0.0 };
        for _ in 0..100 {
            assert_eq!(schedule.sample_action(&greedy, 2, 4, &mut rng), 2);
        }

        let random = ScheduleState { step_count: 0, epsilon: 1.0 };
        let picks: Vec<usize> = (0..200)
            .map(|_| schedule.sample_action(&random, 2, 4, &mut rng))
            .collect();
        assert!(picks.iter().all(|&a| a < 4));
        assert!(picks.iter().any(|&a| a != 2));
    }
}
