//! Units of learning work: real transitions and simulated rollout queries.
//!
//! Per-sample types ([`Experience`], [`RolloutQuery`]) are stacked into
//! struct-of-arrays batches ([`ExperienceBatch`], [`Trajectory`]) only at the
//! approximator boundary.

use ndarray::{Array1, Array2, ArrayView2};

use crate::error::{DynaError, Result};

/// A single real (or simulated) transition.
#[derive(Clone, Debug, PartialEq)]
pub struct Experience {
    pub state: Array1<f32>,
    pub action: usize,
    pub reward: f32,
    pub next_state: Array1<f32>,
    pub done: bool,
}

impl Experience {
    pub fn new(state: Array1<f32>, action: usize, reward: f32, next_state: Array1<f32>, done: bool) -> Self {
        Experience {
            state,
            action,
            reward,
            next_state,
            done,
        }
    }
}

/// A stacked batch of transitions, one row per sample.
#[derive(Clone, Debug, PartialEq)]
pub struct ExperienceBatch {
    pub states: Array2<f32>,
    pub actions: Vec<usize>,
    pub rewards: Array1<f32>,
    pub next_states: Array2<f32>,
    pub dones: Vec<bool>,
}

fn stack_rows<'a, I>(rows: I, len: usize, width: usize, field: &str) -> Result<Array2<f32>>
where
    I: IntoIterator<Item = &'a Array1<f32>>,
{
    let mut stacked = Array2::zeros((len, width));
    for (i, row) in rows.into_iter().enumerate() {
        if row.len() != width {
            return Err(DynaError::invalid_batch(format!(
                "{} row {} has {} elements, expected {}",
                field,
                i,
                row.len(),
                width
            )));
        }
        stacked.row_mut(i).assign(row);
    }
    Ok(stacked)
}

fn ensure_finite_rows(values: ArrayView2<f32>, field: &str) -> Result<()> {
    if let Some((index, _)) = values.indexed_iter().find(|(_, v)| !v.is_finite()) {
        return Err(DynaError::NumericInstability(format!(
            "non-finite value in {} at {:?}",
            field, index
        )));
    }
    Ok(())
}

impl ExperienceBatch {
    /// Build a batch from already stacked fields, checking that every field
    /// has one entry per sample.
    pub fn new(
        states: Array2<f32>,
        actions: Vec<usize>,
        rewards: Array1<f32>,
        next_states: Array2<f32>,
        dones: Vec<bool>,
    ) -> Result<Self> {
        let n = states.nrows();
        let counts = [actions.len(), rewards.len(), next_states.nrows(), dones.len()];
        if counts.iter().any(|&c| c != n) {
            return Err(DynaError::invalid_batch(format!(
                "field lengths disagree: states={}, actions={}, rewards={}, next_states={}, dones={}",
                n, counts[0], counts[1], counts[2], counts[3]
            )));
        }
        if states.ncols() != next_states.ncols() {
            return Err(DynaError::invalid_batch(format!(
                "state width {} differs from next_state width {}",
                states.ncols(),
                next_states.ncols()
            )));
        }
        Ok(ExperienceBatch {
            states,
            actions,
            rewards,
            next_states,
            dones,
        })
    }

    /// Stack a slice of transitions.
    pub fn from_experiences(experiences: &[Experience]) -> Result<Self> {
        let first = experiences
            .first()
            .ok_or_else(|| DynaError::invalid_batch("no experiences to stack"))?;
        let width = first.state.len();
        let n = experiences.len();

        let states = stack_rows(experiences.iter().map(|e| &e.state), n, width, "state")?;
        let next_states = stack_rows(experiences.iter().map(|e| &e.next_state), n, width, "next_state")?;

        Self::new(
            states,
            experiences.iter().map(|e| e.action).collect(),
            experiences.iter().map(|e| e.reward).collect(),
            next_states,
            experiences.iter().map(|e| e.done).collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn state_dim(&self) -> usize {
        self.states.ncols()
    }

    /// `1 - done` per sample.
    pub fn continuation_mask(&self) -> Array1<f32> {
        self.dones.iter().map(|&d| if d { 0.0 } else { 1.0 }).collect()
    }

    /// Fail with [`DynaError::NumericInstability`] on any NaN/Inf.
    pub fn ensure_finite(&self) -> Result<()> {
        ensure_finite_rows(self.states.view(), "states")?;
        ensure_finite_rows(self.next_states.view(), "next_states")?;
        if let Some(i) = self.rewards.iter().position(|r| !r.is_finite()) {
            return Err(DynaError::NumericInstability(format!("non-finite reward at sample {}", i)));
        }
        Ok(())
    }

    pub fn unstack(&self) -> Vec<Experience> {
        (0..self.len())
            .map(|i| Experience {
                state: self.states.row(i).to_owned(),
                action: self.actions[i],
                reward: self.rewards[i],
                next_state: self.next_states.row(i).to_owned(),
                done: self.dones[i],
            })
            .collect()
    }
}

/// One pending simulated continuation.
///
/// `inner_return` is the discounted reward already accumulated between
/// `state` and `final_state`; `depth` counts the simulated hops separating
/// `state` from the real observation that seeded the chain.
#[derive(Clone, Debug, PartialEq)]
pub struct RolloutQuery {
    pub action: usize,
    pub state: Array1<f32>,
    pub inner_return: f32,
    pub final_state: Array1<f32>,
    pub done: bool,
    pub depth: usize,
}

/// A stacked batch of rollout queries.
#[derive(Clone, Debug)]
pub struct Trajectory {
    pub actions: Vec<usize>,
    pub states: Array2<f32>,
    pub inner_returns: Array1<f32>,
    pub final_states: Array2<f32>,
    pub dones: Vec<bool>,
    pub depths: Vec<usize>,
}

impl Trajectory {
    pub fn stack(queries: Vec<RolloutQuery>) -> Result<Self> {
        let first = queries
            .first()
            .ok_or_else(|| DynaError::invalid_batch("no rollout queries to stack"))?;
        let width = first.state.len();
        let n = queries.len();

        let states = stack_rows(queries.iter().map(|q| &q.state), n, width, "query state")?;
        let final_states = stack_rows(queries.iter().map(|q| &q.final_state), n, width, "query final_state")?;

        Ok(Trajectory {
            actions: queries.iter().map(|q| q.action).collect(),
            states,
            inner_returns: queries.iter().map(|q| q.inner_return).collect(),
            final_states,
            dones: queries.iter().map(|q| q.done).collect(),
            depths: queries.iter().map(|q| q.depth).collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn exp(x: f32, action: usize, done: bool) -> Experience {
        Experience::new(array![x, -x], action, x * 10.0, array![x + 1.0, -x - 1.0], done)
    }

    #[test]
    fn test_stack_and_unstack() {
        let experiences = vec![exp(0.0, 1, false), exp(1.0, 0, true)];
        let batch = ExperienceBatch::from_experiences(&experiences).unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.states.row(1), array![1.0, -1.0]);
        assert_eq!(batch.rewards, array![0.0, 10.0]);
        assert_eq!(batch.continuation_mask(), array![1.0, 0.0]);
        assert_eq!(batch.unstack(), experiences);
    }

    #[test]
    fn test_empty_batch_is_invalid() {
        assert!(matches!(
            ExperienceBatch::from_experiences(&[]),
            Err(DynaError::InvalidBatch { .. })
        ));
    }

    #[test]
    fn test_mismatched_widths_are_invalid() {
        let mut bad = exp(2.0, 0, false);
        bad.next_state = array![1.0];
        let err = ExperienceBatch::from_experiences(&[exp(0.0, 0, false), bad]).unwrap_err();
        assert!(matches!(err, DynaError::InvalidBatch { .. }));
    }

    #[test]
    fn test_mismatched_counts_are_invalid() {
        let err = ExperienceBatch::new(
            Array2::zeros((2, 3)),
            vec![0],
            Array1::zeros(2),
            Array2::zeros((2, 3)),
            vec![false, false],
        )
        .unwrap_err();
        assert!(matches!(err, DynaError::InvalidBatch { .. }));
    }

    #[test]
    fn test_non_finite_detection() {
        let mut e = exp(0.0, 0, false);
        e.state[1] = f32::NAN;
        let batch = ExperienceBatch::from_experiences(&[e]).unwrap();
        assert!(matches!(batch.ensure_finite(), Err(DynaError::NumericInstability(_))));
    }

    #[test]
    fn test_trajectory_stack() {
        let q = RolloutQuery {
            action: 2,
            state: array![0.0, 1.0],
            inner_return: 0.5,
            final_state: array![1.0, 1.0],
            done: false,
            depth: 3,
        };
        let t = Trajectory::stack(vec![q.clone(), q]).unwrap();
        assert_eq!(t.len(), 2);
        assert_eq!(t.depths, vec![3, 3]);
        assert_eq!(t.inner_returns, array![0.5, 0.5]);
    }
}
