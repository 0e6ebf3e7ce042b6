//! Prioritized sweeping over simulated rollouts.
//!
//! Real transitions whose TD error is large enough seed depth-0 queries, one
//! per action. `plan` pops the most promising queries, asks the dynamics
//! model for the step that leads into each one, trains the critic on the
//! resulting multi-step return and re-admits the extended chain one level
//! deeper. Priorities decay geometrically with depth, so every chain is
//! eventually dropped by the threshold, the depth cap or queue eviction.

use log::debug;
use ndarray::{Array1, ArrayView1};

use crate::approximator::Approximator;
use crate::config::DynaConfig;
use crate::dynamics::DynamicsModel;
use crate::error::{DynaError, Result};
use crate::experience::{ExperienceBatch, RolloutQuery, Trajectory};
use crate::queue::BoundedPriorityQueue;
use crate::value::{ValueLearner, ValueUpdate};

/// Decides whether a TD error earns further expansion, and at what priority.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdmissionPolicy {
    pub priority_threshold: f32,
    pub priority_decay: f32,
    pub max_rollout_length: Option<usize>,
}

impl AdmissionPolicy {
    pub fn from_config(config: &DynaConfig) -> Self {
        AdmissionPolicy {
            priority_threshold: config.priority_threshold,
            priority_decay: config.priority_decay,
            max_rollout_length: config.max_rollout_length,
        }
    }

    /// `|td_error| * decay^depth`
    pub fn priority(&self, td_error: f32, depth: usize) -> f32 {
        let exponent = i32::try_from(depth).unwrap_or(i32::MAX);
        td_error.abs() * self.priority_decay.powi(exponent)
    }

    /// Priority of an admitted query, or `None` if it is discarded.
    ///
    /// The threshold comparison is strict and `depth` must stay below
    /// `max_rollout_length` when one is set.
    pub fn admit(&self, td_error: f32, depth: usize) -> Option<f32> {
        if let Some(max_depth) = self.max_rollout_length {
            if depth >= max_depth {
                return None;
            }
        }
        let priority = self.priority(td_error, depth);
        if priority > self.priority_threshold {
            Some(priority)
        } else {
            None
        }
    }
}

/// What a call to [`PlanningEngine::plan`] did.
#[derive(Debug, Clone, Default)]
pub struct PlanOutcome {
    /// Queries popped and simulated
    pub expanded: usize,
    /// Deeper queries pushed back, counted before eviction
    pub requeued: usize,
    /// Critic update on the simulated batch, if any query was expanded
    pub update: Option<ValueUpdate>,
}

/// Owns the rollout queue and the admission policy.
#[derive(Debug)]
pub struct PlanningEngine {
    queue: BoundedPriorityQueue<RolloutQuery>,
    policy: AdmissionPolicy,
    gamma: f32,
    warmup_period: u64,
    model_loss_threshold: f32,
    n_actions: usize,
}

impl PlanningEngine {
    pub fn new(config: &DynaConfig, n_actions: usize) -> Result<Self> {
        config.validate()?;
        if n_actions == 0 {
            return Err(DynaError::invalid_parameter("n_actions", "must be at least 1"));
        }
        Ok(PlanningEngine {
            queue: BoundedPriorityQueue::with_capacity(config.queue_capacity)?,
            policy: AdmissionPolicy::from_config(config),
            gamma: config.gamma,
            warmup_period: config.warmup_period,
            model_loss_threshold: config.model_loss_threshold,
            n_actions,
        })
    }

    pub fn policy(&self) -> &AdmissionPolicy {
        &self.policy
    }

    pub fn n_actions(&self) -> usize {
        self.n_actions
    }

    pub fn queue(&self) -> &BoundedPriorityQueue<RolloutQuery> {
        &self.queue
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Admission test plus branching: on success one query per action is
    /// pushed at the shared priority.
    ///
    /// Returns the number of queries pushed, counted before eviction. When the
    /// queue is full some of them may already be gone; see [`Self::queue_len`].
    pub fn queue_rollouts(
        &mut self,
        state: ArrayView1<f32>,
        inner_return: f32,
        final_state: ArrayView1<f32>,
        done: bool,
        depth: usize,
        td_error: f32,
    ) -> Result<usize> {
        if !td_error.is_finite() {
            return Err(DynaError::NumericInstability(format!(
                "TD error {} at depth {}",
                td_error, depth
            )));
        }
        let priority = match self.policy.admit(td_error, depth) {
            Some(p) => p,
            None => return Ok(0),
        };
        if !inner_return.is_finite()
            || state.iter().chain(final_state.iter()).any(|v| !v.is_finite())
        {
            return Err(DynaError::NumericInstability(format!(
                "non-finite rollout query at depth {}",
                depth
            )));
        }

        let mut evicted = 0;
        for action in 0..self.n_actions {
            let query = RolloutQuery {
                action,
                state: state.to_owned(),
                inner_return,
                final_state: final_state.to_owned(),
                done,
                depth,
            };
            if self.queue.push(query, priority)?.is_some() {
                evicted += 1;
            }
        }
        if evicted > 0 {
            debug!("rollout queue full, evicted {} queries", evicted);
        }
        Ok(self.n_actions)
    }

    /// Seed depth-0 queries from a freshly trained real batch.
    ///
    /// Nothing is seeded unless `model_loss < model_loss_threshold`. The
    /// count is of queries pushed, before eviction.
    pub fn seed(&mut self, batch: &ExperienceBatch, td_errors: &Array1<f32>, model_loss: f32) -> Result<usize> {
        if td_errors.len() != batch.len() {
            return Err(DynaError::invalid_batch(format!(
                "{} TD errors for {} experiences",
                td_errors.len(),
                batch.len()
            )));
        }
        if !model_loss.is_finite() {
            return Err(DynaError::NumericInstability(format!("model loss {}", model_loss)));
        }
        if model_loss >= self.model_loss_threshold {
            debug!(
                "model loss {:.4} above threshold {:.4}, skipping seeding",
                model_loss, self.model_loss_threshold
            );
            return Ok(0);
        }

        let mut pushed = 0;
        for i in 0..batch.len() {
            pushed += self.queue_rollouts(
                batch.states.row(i),
                batch.rewards[i],
                batch.next_states.row(i),
                batch.dones[i],
                0,
                td_errors[i],
            )?;
        }
        Ok(pushed)
    }

    /// Expand up to `k` queries.
    ///
    /// A popped depth-`d` query is extended by one simulated hop. The critic
    /// is updated with `n_steps = d`, so the label discounts the bootstrap by
    /// `gamma^(d + 1)`, and the extended chain is re-admitted at depth `d + 1`.
    pub fn plan<Q: Approximator, M: Approximator>(
        &mut self,
        k: usize,
        value: &mut ValueLearner<Q>,
        model: &mut DynamicsModel<M>,
    ) -> Result<PlanOutcome> {
        if value.global_step() < self.warmup_period {
            return Ok(PlanOutcome::default());
        }

        let mut popped = Vec::with_capacity(k.min(self.queue.len()));
        while popped.len() < k && !self.queue.is_empty() {
            let (query, _) = self.queue.pop()?;
            popped.push(query);
        }
        if popped.is_empty() {
            return Ok(PlanOutcome::default());
        }

        let trajectory = Trajectory::stack(popped)?;
        let (new_states, new_rewards) = model.predict(trajectory.states.view(), &trajectory.actions)?;
        let new_returns = &new_rewards + &(&trajectory.inner_returns * self.gamma);
        let depths = trajectory.depths;

        let batch = ExperienceBatch::new(
            new_states,
            trajectory.actions,
            new_returns,
            trajectory.final_states,
            trajectory.dones,
        )?;
        let update = value.update_n_step(&batch, &depths)?;

        let mut requeued = 0;
        for (i, &depth) in depths.iter().enumerate() {
            requeued += self.queue_rollouts(
                batch.states.row(i),
                batch.rewards[i],
                batch.next_states.row(i),
                batch.dones[i],
                depth + 1,
                update.td_errors[i],
            )?;
        }

        Ok(PlanOutcome {
            expanded: batch.len(),
            requeued,
            update: Some(update),
        })
    }
}
