use ndarray::Array1;

use super::{ActionSpace, Environment, Transition};
use crate::error::{DynaError, Result};

/// Deterministic corridor of `length` cells.
///
/// The agent starts in cell 0. Action 0 moves left, action 1 moves right.
/// Reaching the last cell pays `1.0` and ends the episode; every other step
/// pays nothing. Episodes are truncated after `max_steps` steps, flagged by
/// `info["truncated"] == 1.0`. Observations are one-hot cell encodings.
#[derive(Debug, Clone)]
pub struct ChainWalk {
    length: usize,
    max_steps: usize,
    position: usize,
    steps: usize,
}

impl ChainWalk {
    pub const LEFT: usize = 0;
    pub const RIGHT: usize = 1;

    pub fn new(length: usize, max_steps: usize) -> Result<Self> {
        if length < 2 {
            return Err(DynaError::invalid_parameter("length", "corridor needs at least two cells"));
        }
        if max_steps == 0 {
            return Err(DynaError::invalid_parameter("max_steps", "must be at least 1"));
        }
        Ok(ChainWalk {
            length,
            max_steps,
            position: 0,
            steps: 0,
        })
    }

    pub fn position(&self) -> usize {
        self.position
    }

    fn observation(&self) -> Array1<f32> {
        let mut obs = Array1::zeros(self.length);
        obs[self.position] = 1.0;
        obs
    }
}

impl Environment for ChainWalk {
    fn observation_size(&self) -> usize {
        self.length
    }

    fn action_space(&self) -> ActionSpace {
        ActionSpace::Discrete { n: 2 }
    }

    fn reset(&mut self) -> Array1<f32> {
        self.position = 0;
        self.steps = 0;
        self.observation()
    }

    fn step(&mut self, action: usize) -> Result<Transition> {
        match action {
            Self::LEFT => self.position = self.position.saturating_sub(1),
            Self::RIGHT => self.position = (self.position + 1).min(self.length - 1),
            _ => {
                return Err(DynaError::InvalidAction {
                    action,
                    max_actions: 2,
                })
            }
        }
        self.steps += 1;

        let reached_goal = self.position == self.length - 1;
        let truncated = !reached_goal && self.steps >= self.max_steps;
        let reward = if reached_goal { 1.0 } else { 0.0 };

        let mut transition = Transition::new(self.observation(), reward, reached_goal || truncated);
        transition
            .info
            .insert("truncated".to_string(), if truncated { 1.0 } else { 0.0 });
        Ok(transition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_walk_right_reaches_goal() {
        let mut env = ChainWalk::new(3, 10).unwrap();
        assert_eq!(env.reset(), array![1.0, 0.0, 0.0]);

        let t = env.step(ChainWalk::RIGHT).unwrap();
        assert_eq!(t.next_state, array![0.0, 1.0, 0.0]);
        assert_eq!(t.reward, 0.0);
        assert!(!t.done);

        let t = env.step(ChainWalk::RIGHT).unwrap();
        assert_eq!(t.reward, 1.0);
        assert!(t.done);
        assert_eq!(t.info["truncated"], 0.0);
    }

    #[test]
    fn test_left_wall_and_truncation() {
        let mut env = ChainWalk::new(4, 2).unwrap();
        env.reset();
        let t = env.step(ChainWalk::LEFT).unwrap();
        assert_eq!(env.position(), 0);
        assert!(!t.done);

        let t = env.step(ChainWalk::LEFT).unwrap();
        assert!(t.done);
        assert_eq!(t.info["truncated"], 1.0);
    }

    #[test]
    fn test_rejects_invalid_action() {
        let mut env = ChainWalk::new(3, 10).unwrap();
        env.reset();
        assert!(matches!(env.step(2), Err(DynaError::InvalidAction { action: 2, .. })));
        assert!(ChainWalk::new(1, 10).is_err());
    }
}
