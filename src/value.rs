use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::Rng;

use crate::approximator::Approximator;
use crate::config::DynaConfig;
use crate::error::{DynaError, Result};
use crate::experience::ExperienceBatch;
use crate::loss::SmoothL1Loss;
use crate::schedule::{EpsilonSchedule, ScheduleState};
use crate::telemetry::MetricsSink;

/// Result of one online critic update.
#[derive(Debug, Clone)]
pub struct ValueUpdate {
    /// Signed `label - prediction` per sample
    pub td_errors: Array1<f32>,
    pub loss: f32,
    pub q_acted: Array1<f32>,
    pub q_label: Array1<f32>,
}

impl ValueUpdate {
    pub fn mean_abs_td_error(&self) -> f32 {
        mean(self.td_errors.mapv(f32::abs).view())
    }

    pub fn report(&self, sink: &mut dyn MetricsSink, step: u64) {
        sink.add_scalar("dyna/critic_loss", self.loss, step);
        sink.add_scalar("dyna/mean_abs_td_error", self.mean_abs_td_error(), step);
        sink.add_scalar("dyna/mean_q_acted", mean(self.q_acted.view()), step);
        sink.add_scalar("dyna/mean_q_label", mean(self.q_label.view()), step);
        sink.add_histogram("dyna/q_acted", self.q_acted.view(), step);
        sink.add_histogram("dyna/q_label", self.q_label.view(), step);
        sink.add_histogram("dyna/td_error", self.td_errors.view(), step);
    }
}

fn mean(values: ArrayView1<f32>) -> f32 {
    values.mean().unwrap_or(0.0)
}

fn argmax(row: ArrayView1<f32>) -> usize {
    row.iter()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |(best, best_value), (i, &v)| {
            if v > best_value {
                (i, v)
            } else {
                (best, best_value)
            }
        })
        .0
}

fn ensure_finite(values: &Array2<f32>, what: &str) -> Result<()> {
    if values.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(DynaError::NumericInstability(format!("non-finite {}", what)))
    }
}

/// Online and target Q-function approximators plus the exploration schedule.
///
/// Every online update is followed by a soft target update with mixing
/// coefficient `tau`, and advances the global step counter that drives the
/// epsilon schedule.
pub struct ValueLearner<Q: Approximator> {
    online: Q,
    target: Q,
    n_actions: usize,
    gamma: f32,
    tau: f32,
    learning_rate: f32,
    loss: SmoothL1Loss,
    schedule: EpsilonSchedule,
    schedule_state: ScheduleState,
}

impl<Q: Approximator> ValueLearner<Q> {
    /// The target approximator starts as an exact copy of `online`.
    pub fn new(online: Q, config: &DynaConfig) -> Result<Self> {
        config.validate()?;
        let n_actions = online.output_size();
        if n_actions == 0 {
            return Err(DynaError::invalid_parameter("online", "critic must have at least one output"));
        }
        let schedule = EpsilonSchedule::new(
            config.epsilon_decay_rate,
            config.final_epsilon_value,
            config.warmup_period,
        )?;
        let target = online.clone();

        Ok(ValueLearner {
            online,
            target,
            n_actions,
            gamma: config.gamma,
            tau: config.target_moving_average,
            learning_rate: config.lr,
            loss: SmoothL1Loss::default(),
            schedule,
            schedule_state: ScheduleState::initial(),
        })
    }

    pub fn n_actions(&self) -> usize {
        self.n_actions
    }

    pub fn gamma(&self) -> f32 {
        self.gamma
    }

    pub fn epsilon(&self) -> f32 {
        self.schedule_state.epsilon
    }

    pub fn global_step(&self) -> u64 {
        self.schedule_state.step_count
    }

    pub fn schedule(&self) -> &EpsilonSchedule {
        &self.schedule
    }

    pub fn schedule_state(&self) -> ScheduleState {
        self.schedule_state
    }

    pub fn set_schedule_state(&mut self, state: ScheduleState) {
        self.schedule_state = state;
    }

    pub fn online(&self) -> &Q {
        &self.online
    }

    pub fn online_mut(&mut self) -> &mut Q {
        &mut self.online
    }

    pub fn target(&self) -> &Q {
        &self.target
    }

    /// `Q_online(state, .)` for every action.
    pub fn q_values(&mut self, state: ArrayView1<f32>) -> Result<Array1<f32>> {
        if state.iter().any(|v| !v.is_finite()) {
            return Err(DynaError::NumericInstability("non-finite state".to_string()));
        }
        let q = self.online.predict(state.insert_axis(Axis(0)))?;
        ensure_finite(&q, "Q-values")?;
        Ok(q.index_axis_move(Axis(0), 0))
    }

    /// `argmax_a Q_online(state, a)`
    pub fn greedy_action(&mut self, state: ArrayView1<f32>) -> Result<usize> {
        let q = self.q_values(state)?;
        Ok(argmax(q.view()))
    }

    /// Epsilon-greedy action under the current schedule state.
    pub fn act<R: Rng + ?Sized>(&mut self, state: ArrayView1<f32>, rng: &mut R) -> Result<usize> {
        let greedy = self.greedy_action(state)?;
        Ok(self
            .schedule
            .sample_action(&self.schedule_state, greedy, self.n_actions, rng))
    }

    /// One-step Double-Q update on real transitions.
    pub fn update(&mut self, batch: &ExperienceBatch) -> Result<ValueUpdate> {
        let horizons = vec![0; batch.len()];
        self.update_n_step(batch, &horizons)
    }

    /// Double-Q update where sample `i` collapses `horizons[i]` extra hops:
    /// `label = r + (1 - done) * gamma^(h + 1) * Q_target(s', argmax_a Q_online(s', a))`.
    pub fn update_n_step(&mut self, batch: &ExperienceBatch, horizons: &[usize]) -> Result<ValueUpdate> {
        if batch.is_empty() {
            return Err(DynaError::invalid_batch("cannot update on an empty batch"));
        }
        if horizons.len() != batch.len() {
            return Err(DynaError::invalid_batch(format!(
                "{} horizons for {} samples",
                horizons.len(),
                batch.len()
            )));
        }
        if let Some(&action) = batch.actions.iter().find(|&&a| a >= self.n_actions) {
            return Err(DynaError::InvalidAction {
                action,
                max_actions: self.n_actions,
            });
        }
        batch.ensure_finite()?;

        // Bootstrap values first: the online forward pass on `states` must be
        // the last one before the gradient step.
        let next_q_online = self.online.predict(batch.next_states.view())?;
        let next_q_target = self.target.predict(batch.next_states.view())?;
        ensure_finite(&next_q_online, "online next-state Q-values")?;
        ensure_finite(&next_q_target, "target next-state Q-values")?;

        let continuation = batch.continuation_mask();
        let q_label: Array1<f32> = (0..batch.len())
            .map(|i| {
                let next_action = argmax(next_q_online.row(i));
                let discount = self.gamma.powi(horizons[i] as i32 + 1);
                batch.rewards[i] + continuation[i] * discount * next_q_target[[i, next_action]]
            })
            .collect();

        let q_predictions = self.online.predict(batch.states.view())?;
        ensure_finite(&q_predictions, "Q-values")?;
        let q_acted: Array1<f32> = batch
            .actions
            .iter()
            .enumerate()
            .map(|(i, &a)| q_predictions[[i, a]])
            .collect();

        let td_errors = &q_label - &q_acted;
        if td_errors.iter().any(|v| !v.is_finite()) {
            return Err(DynaError::NumericInstability("non-finite TD error".to_string()));
        }

        let loss = self.loss.compute(q_acted.view(), q_label.view());
        let acted_gradients = self.loss.gradient(q_acted.view(), q_label.view());
        let mut output_gradients = Array2::zeros(q_predictions.dim());
        for (i, &a) in batch.actions.iter().enumerate() {
            output_gradients[[i, a]] = acted_gradients[i];
        }
        self.online.apply_gradients(output_gradients.view(), self.learning_rate)?;

        self.schedule_state = self.schedule.tick(self.schedule_state);
        self.soft_update(self.tau)?;

        Ok(ValueUpdate {
            td_errors,
            loss,
            q_acted,
            q_label,
        })
    }

    /// Replace both approximators and the schedule state, e.g. from a
    /// checkpoint. The approximators must match the current architecture.
    pub fn restore(&mut self, online: Q, target: Q, schedule_state: ScheduleState) -> Result<()> {
        for candidate in [&online, &target] {
            if candidate.input_size() != self.online.input_size() || candidate.output_size() != self.n_actions {
                return Err(DynaError::dimension_mismatch(
                    format!("critic {} -> {}", self.online.input_size(), self.n_actions),
                    format!("critic {} -> {}", candidate.input_size(), candidate.output_size()),
                ));
            }
        }
        self.online = online;
        self.target = target;
        self.schedule_state = schedule_state;
        Ok(())
    }

    /// Copy the online parameters into the target exactly.
    pub fn hard_update(&mut self) -> Result<()> {
        self.target.hard_update_from(&self.online)
    }

    /// `target = tau * online + (1 - tau) * target`
    pub fn soft_update(&mut self, tau: f32) -> Result<()> {
        self.target.soft_update_from(&self.online, tau)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::NeuralNetwork;
    use crate::optimizer::{OptimizerWrapper, SGD};
    use ndarray::array;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn learner(config: &DynaConfig) -> ValueLearner<NeuralNetwork> {
        let mut rng = StdRng::seed_from_u64(5);
        let net = NeuralNetwork::mlp(2, &[8], 3, OptimizerWrapper::SGD(SGD::new()), &mut rng).unwrap();
        ValueLearner::new(net, config).unwrap()
    }

    #[test]
    fn test_argmax_prefers_first_maximum() {
        assert_eq!(argmax(array![1.0, 3.0, 3.0, 0.0].view()), 1);
        assert_eq!(argmax(array![-5.0].view()), 0);
    }

    #[test]
    fn test_target_starts_as_copy() {
        let learner = learner(&DynaConfig::default());
        assert_eq!(learner.online().parameters(), learner.target().parameters());
        assert_eq!(learner.n_actions(), 3);
        assert_eq!(learner.epsilon(), 1.0);
    }

    #[test]
    fn test_rejects_out_of_range_action() {
        let mut learner = learner(&DynaConfig::default());
        let batch = ExperienceBatch::new(
            array![[0.0, 0.0]],
            vec![3],
            array![1.0],
            array![[0.0, 0.0]],
            vec![false],
        )
        .unwrap();
        assert!(matches!(
            learner.update(&batch),
            Err(DynaError::InvalidAction { action: 3, max_actions: 3 })
        ));
        assert_eq!(learner.global_step(), 0);
    }

    #[test]
    fn test_rejects_mismatched_horizons() {
        let mut learner = learner(&DynaConfig::default());
        let batch = ExperienceBatch::new(
            array![[0.0, 0.0]],
            vec![0],
            array![1.0],
            array![[0.0, 0.0]],
            vec![false],
        )
        .unwrap();
        assert!(matches!(
            learner.update_n_step(&batch, &[0, 1]),
            Err(DynaError::InvalidBatch { .. })
        ));
    }
}
