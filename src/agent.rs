use log::{debug, info};
use ndarray::ArrayView1;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::approximator::Approximator;
use crate::config::DynaConfig;
use crate::dynamics::{DynamicsModel, ModelFit};
use crate::env::{ActionSpace, Environment};
use crate::error::{DynaError, Result};
use crate::experience::{Experience, ExperienceBatch};
use crate::network::NeuralNetwork;
use crate::planning::{PlanOutcome, PlanningEngine};
use crate::schedule::ScheduleState;
use crate::telemetry::{MetricsSink, NullSink};
use crate::value::{ValueLearner, ValueUpdate};

/// Everything one call to [`DynaAgent::train`] produced.
#[derive(Debug, Clone)]
pub struct TrainStep {
    pub value: ValueUpdate,
    pub model: ModelFit,
    /// Depth-0 queries admitted from this batch
    pub seeded: usize,
    pub queue_length: usize,
}

#[derive(Serialize)]
struct CheckpointRef<'a, Q, M> {
    online: &'a Q,
    target: &'a Q,
    model: &'a M,
    schedule: ScheduleState,
}

#[derive(Deserialize)]
struct Checkpoint<Q, M> {
    online: Q,
    target: Q,
    model: M,
    schedule: ScheduleState,
}

/// Dyna agent with prioritized sweeping.
///
/// Real transitions train the critic and the dynamics model; transitions
/// with large TD errors seed the planner, which then replays model-simulated
/// predecessors through the critic in order of priority.
///
/// # Example
///
/// ```no_run
/// use dyna::agent::DynaAgent;
/// use dyna::config::DynaConfig;
/// use dyna::env::{ChainWalk, Environment};
///
/// let mut env = ChainWalk::new(5, 50).unwrap();
/// let config = DynaConfig { seed: Some(0), ..DynaConfig::default() };
/// let mut agent = DynaAgent::new(env.observation_size(), &env.action_space(), config).unwrap();
///
/// let state = env.reset();
/// let action = agent.act(state.view()).unwrap();
/// let transition = env.step(action).unwrap();
/// agent
///     .train(&[dyna::experience::Experience::new(
///         state,
///         action,
///         transition.reward,
///         transition.next_state,
///         transition.done,
///     )])
///     .unwrap();
/// agent.plan(8).unwrap();
/// ```
pub struct DynaAgent<Q: Approximator = NeuralNetwork, M: Approximator = NeuralNetwork> {
    value: ValueLearner<Q>,
    model: DynamicsModel<M>,
    planner: PlanningEngine,
    config: DynaConfig,
    state_dim: usize,
    rng: StdRng,
    sink: Box<dyn MetricsSink>,
}

impl DynaAgent<NeuralNetwork, NeuralNetwork> {
    /// Build the default MLP critic and dynamics model from `config`.
    pub fn new(state_dim: usize, action_space: &ActionSpace, config: DynaConfig) -> Result<Self> {
        let n_actions = action_space.discrete_size()?;
        config.validate()?;
        let mut rng = seeded_rng(config.seed);

        let critic = NeuralNetwork::mlp(
            state_dim,
            &config.hidden_layers,
            n_actions,
            config.optimizer.build(),
            &mut rng,
        )?;
        let model = NeuralNetwork::mlp(
            state_dim + n_actions,
            &config.model_hidden_layers,
            state_dim + 1,
            config.optimizer.build(),
            &mut rng,
        )?;

        Self::assemble(critic, model, state_dim, n_actions, config, rng)
    }
}

fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

impl<Q: Approximator, M: Approximator> DynaAgent<Q, M> {
    /// Assemble an agent around caller-supplied approximators.
    ///
    /// `critic` must map `state_dim` inputs to one value per action and
    /// `model` must map `state_dim + n_actions` inputs to `state_dim + 1`
    /// outputs.
    pub fn from_parts(
        critic: Q,
        model: M,
        state_dim: usize,
        action_space: &ActionSpace,
        config: DynaConfig,
    ) -> Result<Self> {
        let n_actions = action_space.discrete_size()?;
        let rng = seeded_rng(config.seed);
        Self::assemble(critic, model, state_dim, n_actions, config, rng)
    }

    fn assemble(
        critic: Q,
        model: M,
        state_dim: usize,
        n_actions: usize,
        config: DynaConfig,
        rng: StdRng,
    ) -> Result<Self> {
        if critic.input_size() != state_dim || critic.output_size() != n_actions {
            return Err(DynaError::dimension_mismatch(
                format!("critic {} -> {}", state_dim, n_actions),
                format!("critic {} -> {}", critic.input_size(), critic.output_size()),
            ));
        }
        let value = ValueLearner::new(critic, &config)?;
        let model = DynamicsModel::new(model, state_dim, n_actions, config.model_lr)?;
        let planner = PlanningEngine::new(&config, n_actions)?;

        Ok(DynaAgent {
            value,
            model,
            planner,
            config,
            state_dim,
            rng,
            sink: Box::new(NullSink),
        })
    }

    /// Route telemetry into `sink` instead of discarding it.
    pub fn with_sink(mut self, sink: Box<dyn MetricsSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn config(&self) -> &DynaConfig {
        &self.config
    }

    pub fn state_dim(&self) -> usize {
        self.state_dim
    }

    pub fn n_actions(&self) -> usize {
        self.value.n_actions()
    }

    pub fn global_step(&self) -> u64 {
        self.value.global_step()
    }

    pub fn epsilon(&self) -> f32 {
        self.value.epsilon()
    }

    pub fn queue_len(&self) -> usize {
        self.planner.queue_len()
    }

    pub fn value(&self) -> &ValueLearner<Q> {
        &self.value
    }

    pub fn model(&self) -> &DynamicsModel<M> {
        &self.model
    }

    pub fn planner(&self) -> &PlanningEngine {
        &self.planner
    }

    pub fn sink_mut(&mut self) -> &mut dyn MetricsSink {
        self.sink.as_mut()
    }

    /// Epsilon-greedy action for `state`.
    pub fn act(&mut self, state: ArrayView1<f32>) -> Result<usize> {
        if state.len() != self.state_dim {
            return Err(DynaError::dimension_mismatch(
                format!("state of length {}", self.state_dim),
                format!("state of length {}", state.len()),
            ));
        }
        let step = self.value.global_step();
        self.sink.add_scalar("dyna/epsilon", self.value.epsilon(), step);
        self.value.act(state, &mut self.rng)
    }

    /// Learn from a batch of real transitions.
    ///
    /// Updates the critic, fits the dynamics model on the same batch and, if
    /// the model loss is below `model_loss_threshold`, seeds the planner with
    /// every transition whose TD error passes admission.
    pub fn train(&mut self, experiences: &[Experience]) -> Result<TrainStep> {
        let batch = ExperienceBatch::from_experiences(experiences)?;
        if batch.state_dim() != self.state_dim {
            return Err(DynaError::dimension_mismatch(
                format!("states of length {}", self.state_dim),
                format!("states of length {}", batch.state_dim()),
            ));
        }

        let value = self.value.update(&batch)?;
        let step = self.value.global_step();
        value.report(self.sink.as_mut(), step);

        let model = self.model.fit(&batch)?;
        model.report(self.sink.as_mut(), step);

        let seeded = self.planner.seed(&batch, &value.td_errors, model.loss)?;
        let queue_length = self.planner.queue_len();
        self.sink.add_scalar("dyna/queue_length", queue_length as f32, step);

        Ok(TrainStep {
            value,
            model,
            seeded,
            queue_length,
        })
    }

    /// Expand up to `simulator_steps` queued rollouts.
    pub fn plan(&mut self, simulator_steps: usize) -> Result<PlanOutcome> {
        let outcome = self.planner.plan(simulator_steps, &mut self.value, &mut self.model)?;
        if let Some(update) = &outcome.update {
            update.report(self.sink.as_mut(), self.value.global_step());
            debug!(
                "planned {} rollouts, requeued {}, queue length {}",
                outcome.expanded,
                outcome.requeued,
                self.planner.queue_len()
            );
        }
        Ok(outcome)
    }

    /// Average undiscounted return over `n_episodes` episodes of `env`.
    ///
    /// Episodes are cut after `max_episode_steps` steps.
    pub fn evaluate<E: Environment + ?Sized>(&mut self, env: &mut E, n_episodes: usize) -> Result<f32> {
        if n_episodes == 0 {
            return Err(DynaError::invalid_parameter("n_episodes", "must be at least 1"));
        }
        let mut total_reward = 0.0;
        for _ in 0..n_episodes {
            let mut state = env.reset();
            for _ in 0..self.config.max_episode_steps {
                let action = self.act(state.view())?;
                let transition = env.step(action)?;
                total_reward += transition.reward;
                state = transition.next_state;
                if transition.done {
                    break;
                }
            }
        }
        let average = total_reward / n_episodes as f32;
        self.sink
            .add_scalar("dyna/test_episode_reward", average, self.value.global_step());
        Ok(average)
    }
}

impl<Q, M> DynaAgent<Q, M>
where
    Q: Approximator + Serialize + DeserializeOwned,
    M: Approximator + Serialize + DeserializeOwned,
{
    /// Write online, target and model parameters plus the schedule state.
    pub fn save_checkpoint<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let checkpoint = CheckpointRef {
            online: self.value.online(),
            target: self.value.target(),
            model: self.model.inner(),
            schedule: self.value.schedule_state(),
        };
        fs::write(path.as_ref(), bincode::serialize(&checkpoint)?)?;
        info!(
            "saved checkpoint at step {} to {}",
            self.value.global_step(),
            path.as_ref().display()
        );
        Ok(())
    }

    /// Restore a checkpoint written by [`DynaAgent::save_checkpoint`]. The
    /// planner queue is left untouched.
    pub fn load_checkpoint<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let data = fs::read(path.as_ref())?;
        let checkpoint: Checkpoint<Q, M> = bincode::deserialize(&data)?;
        self.model.restore(checkpoint.model)?;
        self.value
            .restore(checkpoint.online, checkpoint.target, checkpoint.schedule)?;
        info!(
            "loaded checkpoint at step {} from {}",
            checkpoint.schedule.step_count,
            path.as_ref().display()
        );
        Ok(())
    }
}

/// Fluent construction of a [`DynaAgent`] with the default approximators.
pub struct DynaAgentBuilder {
    state_dim: usize,
    action_space: ActionSpace,
    config: DynaConfig,
    sink: Option<Box<dyn MetricsSink>>,
}

impl DynaAgentBuilder {
    pub fn new(state_dim: usize, action_space: ActionSpace) -> Self {
        DynaAgentBuilder {
            state_dim,
            action_space,
            config: DynaConfig::default(),
            sink: None,
        }
    }

    pub fn config(mut self, config: DynaConfig) -> Self {
        self.config = config;
        self
    }

    pub fn gamma(mut self, gamma: f32) -> Self {
        self.config.gamma = gamma;
        self
    }

    pub fn hidden_layers(mut self, sizes: Vec<usize>) -> Self {
        self.config.hidden_layers = sizes;
        self
    }

    pub fn model_hidden_layers(mut self, sizes: Vec<usize>) -> Self {
        self.config.model_hidden_layers = sizes;
        self
    }

    pub fn warmup_period(mut self, steps: u64) -> Self {
        self.config.warmup_period = steps;
        self
    }

    pub fn max_rollout_length(mut self, depth: Option<usize>) -> Self {
        self.config.max_rollout_length = depth;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = Some(seed);
        self
    }

    pub fn sink(mut self, sink: Box<dyn MetricsSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn build(self) -> Result<DynaAgent> {
        let agent = DynaAgent::new(self.state_dim, &self.action_space, self.config)?;
        Ok(match self.sink {
            Some(sink) => agent.with_sink(sink),
            None => agent,
        })
    }
}
