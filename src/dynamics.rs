//! Learned dynamics model used to generate simulated rollouts.
//!
//! The model is trained in the *inverse* direction: given `(next_state,
//! action)` it regresses the `(state, reward)` that led there. Planning calls
//! it with a query's `(state, action)` and treats the output as the point one
//! simulated hop further back along the chain. Model outputs are taken as
//! ground truth; no uncertainty estimate is kept.

use ndarray::{concatenate, s, Array1, Array2, ArrayView2, Axis};

use crate::approximator::Approximator;
use crate::error::{DynaError, Result};
use crate::experience::ExperienceBatch;
use crate::loss::{Loss, SmoothL1Loss};
use crate::telemetry::MetricsSink;

/// Losses of one model fitting step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelFit {
    /// `state_loss + reward_loss`
    pub loss: f32,
    pub state_loss: f32,
    pub reward_loss: f32,
    /// Mean absolute error of the predicted states
    pub state_abs_err: f32,
}

impl ModelFit {
    pub fn report(&self, sink: &mut dyn MetricsSink, step: u64) {
        sink.add_scalar("dyna/model_loss", self.loss, step);
        sink.add_scalar("dyna/model_state_loss", self.state_loss, step);
        sink.add_scalar("dyna/model_state_abs_err", self.state_abs_err, step);
        sink.add_scalar("dyna/model_reward_loss", self.reward_loss, step);
    }
}

/// Adapter turning an [`Approximator`] with input `state_dim + n_actions`
/// and output `state_dim + 1` into a `(state, action) -> (state, reward)`
/// predictor.
pub struct DynamicsModel<M: Approximator> {
    model: M,
    state_dim: usize,
    n_actions: usize,
    learning_rate: f32,
    loss: SmoothL1Loss,
}

impl<M: Approximator> DynamicsModel<M> {
    pub fn new(model: M, state_dim: usize, n_actions: usize, learning_rate: f32) -> Result<Self> {
        if model.input_size() != state_dim + n_actions {
            return Err(DynaError::dimension_mismatch(
                format!("model input of {} (state {} + {} actions)", state_dim + n_actions, state_dim, n_actions),
                format!("model input of {}", model.input_size()),
            ));
        }
        if model.output_size() != state_dim + 1 {
            return Err(DynaError::dimension_mismatch(
                format!("model output of {} (state + reward)", state_dim + 1),
                format!("model output of {}", model.output_size()),
            ));
        }
        Ok(DynamicsModel {
            model,
            state_dim,
            n_actions,
            learning_rate,
            loss: SmoothL1Loss::default(),
        })
    }

    pub fn state_dim(&self) -> usize {
        self.state_dim
    }

    pub fn n_actions(&self) -> usize {
        self.n_actions
    }

    pub fn inner(&self) -> &M {
        &self.model
    }

    pub fn inner_mut(&mut self) -> &mut M {
        &mut self.model
    }

    /// Swap in another approximator of the same shape.
    pub fn restore(&mut self, model: M) -> Result<()> {
        if model.input_size() != self.model.input_size() || model.output_size() != self.model.output_size() {
            return Err(DynaError::dimension_mismatch(
                format!("model {} -> {}", self.model.input_size(), self.model.output_size()),
                format!("model {} -> {}", model.input_size(), model.output_size()),
            ));
        }
        self.model = model;
        Ok(())
    }

    fn encode(&self, states: ArrayView2<f32>, actions: &[usize]) -> Result<Array2<f32>> {
        if states.nrows() != actions.len() {
            return Err(DynaError::invalid_batch(format!(
                "{} states for {} actions",
                states.nrows(),
                actions.len()
            )));
        }
        if states.ncols() != self.state_dim {
            return Err(DynaError::dimension_mismatch(
                format!("{} state columns", self.state_dim),
                format!("{} state columns", states.ncols()),
            ));
        }
        let mut one_hot = Array2::zeros((actions.len(), self.n_actions));
        for (i, &a) in actions.iter().enumerate() {
            if a >= self.n_actions {
                return Err(DynaError::InvalidAction {
                    action: a,
                    max_actions: self.n_actions,
                });
            }
            one_hot[[i, a]] = 1.0;
        }
        concatenate(Axis(1), &[states.view(), one_hot.view()])
            .map_err(|e| DynaError::dimension_mismatch("stackable model inputs".to_string(), e.to_string()))
    }

    /// Predicted `(state, reward)` for each `(state, action)` row.
    pub fn predict(&mut self, states: ArrayView2<f32>, actions: &[usize]) -> Result<(Array2<f32>, Array1<f32>)> {
        let inputs = self.encode(states, actions)?;
        let outputs = self.model.predict(inputs.view())?;
        if outputs.iter().any(|v| !v.is_finite()) {
            return Err(DynaError::NumericInstability("non-finite dynamics prediction".to_string()));
        }
        let predicted_states = outputs.slice(s![.., ..self.state_dim]).to_owned();
        let predicted_rewards = outputs.column(self.state_dim).to_owned();
        Ok((predicted_states, predicted_rewards))
    }

    /// One regression step: `(next_state, action) -> (state, reward)`.
    pub fn fit(&mut self, batch: &ExperienceBatch) -> Result<ModelFit> {
        if batch.is_empty() {
            return Err(DynaError::invalid_batch("cannot fit the model on an empty batch"));
        }
        batch.ensure_finite()?;

        let (prev_states, prev_rewards) = self.predict(batch.next_states.view(), &batch.actions)?;
        let prev_rewards = prev_rewards.insert_axis(Axis(1));
        let rewards = batch.rewards.view().insert_axis(Axis(1));

        let state_loss = self.loss.compute_batch(prev_states.view(), batch.states.view());
        let reward_loss = self.loss.compute_batch(prev_rewards.view(), rewards);
        let state_abs_err = (&prev_states - &batch.states).mapv(f32::abs).mean().unwrap_or(0.0);

        let state_gradients = self.loss.gradient_batch(prev_states.view(), batch.states.view());
        let reward_gradients = self.loss.gradient_batch(prev_rewards.view(), rewards);
        let output_gradients = concatenate(Axis(1), &[state_gradients.view(), reward_gradients.view()])
            .map_err(|e| DynaError::dimension_mismatch("stackable model gradients".to_string(), e.to_string()))?;
        self.model.apply_gradients(output_gradients.view(), self.learning_rate)?;

        Ok(ModelFit {
            loss: state_loss + reward_loss,
            state_loss,
            reward_loss,
            state_abs_err,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::NeuralNetwork;
    use crate::optimizer::{Adam, OptimizerWrapper, SGD};
    use ndarray::array;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn model(state_dim: usize, n_actions: usize) -> DynamicsModel<NeuralNetwork> {
        let mut rng = StdRng::seed_from_u64(9);
        let net = NeuralNetwork::mlp(
            state_dim + n_actions,
            &[16],
            state_dim + 1,
            OptimizerWrapper::Adam(Adam::default()),
            &mut rng,
        )
        .unwrap();
        DynamicsModel::new(net, state_dim, n_actions, 0.01).unwrap()
    }

    #[test]
    fn test_shape_validation() {
        let mut rng = StdRng::seed_from_u64(9);
        let net = NeuralNetwork::mlp(3, &[4], 3, OptimizerWrapper::SGD(SGD::new()), &mut rng).unwrap();
        assert!(DynamicsModel::new(net, 2, 2, 0.01).is_err());
    }

    #[test]
    fn test_predict_shapes() {
        let mut m = model(2, 3);
        let (states, rewards) = m.predict(array![[0.0, 1.0], [1.0, 0.0]].view(), &[0, 2]).unwrap();
        assert_eq!(states.dim(), (2, 2));
        assert_eq!(rewards.len(), 2);
        assert!(matches!(
            m.predict(array![[0.0, 1.0]].view(), &[3]),
            Err(DynaError::InvalidAction { .. })
        ));
    }

    #[test]
    fn test_fit_learns_inverse_direction() {
        let mut m = model(1, 2);
        let batch = ExperienceBatch::new(
            array![[0.5], [-0.5]],
            vec![0, 1],
            array![1.0, -1.0],
            array![[0.0], [0.0]],
            vec![false, false],
        )
        .unwrap();

        let first = m.fit(&batch).unwrap();
        assert!((first.loss - (first.state_loss + first.reward_loss)).abs() < 1e-6);
        let mut last = first;
        for _ in 0..500 {
            last = m.fit(&batch).unwrap();
        }
        assert!(last.loss < first.loss);

        // The model maps (next_state, action) back to (state, reward).
        let (prev, reward) = m.predict(array![[0.0]].view(), &[0]).unwrap();
        assert!((prev[[0, 0]] - 0.5).abs() < 0.2);
        assert!((reward[0] - 1.0).abs() < 0.3);
    }
}
