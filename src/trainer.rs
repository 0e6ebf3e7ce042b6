//! Outer loop: interleave real interaction, learning, planning and evaluation.

use log::{debug, info};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::create_dir_all;
use std::path::PathBuf;

use crate::agent::DynaAgent;
use crate::approximator::Approximator;
use crate::config::DynaConfig;
use crate::env::Environment;
use crate::error::Result;
use crate::experience::Experience;

/// Totals of a [`train_agent`] run.
#[derive(Debug, Clone, Default)]
pub struct TrainingSummary {
    pub iterations: usize,
    pub env_steps: usize,
    /// Finished training episodes
    pub episodes: usize,
    pub last_train_episode_reward: Option<f32>,
    /// One entry per evaluation round
    pub eval_rewards: Vec<f32>,
    /// Rollouts expanded by the planner
    pub planned: usize,
    pub checkpoints: Vec<PathBuf>,
}

impl TrainingSummary {
    pub fn best_eval_reward(&self) -> Option<f32> {
        self.eval_rewards.iter().copied().reduce(f32::max)
    }
}

/// Run `config.iterations` outer iterations.
///
/// Each iteration collects `interactions_per_iter` real transitions from
/// `env`, trains on them, expands `planning_steps_per_iter` simulated
/// rollouts and evaluates on `test_env` for `episodes_per_eval` episodes.
/// Checkpoints are written every `checkpoint_interval` iterations when a
/// `checkpoint_dir` is configured.
pub fn train_agent<Q, M, E, T>(
    agent: &mut DynaAgent<Q, M>,
    env: &mut E,
    test_env: &mut T,
    config: &DynaConfig,
) -> Result<TrainingSummary>
where
    Q: Approximator + Serialize + DeserializeOwned,
    M: Approximator + Serialize + DeserializeOwned,
    E: Environment + ?Sized,
    T: Environment + ?Sized,
{
    config.validate()?;
    if let Some(dir) = &config.checkpoint_dir {
        create_dir_all(dir)?;
    }

    let mut summary = TrainingSummary::default();
    let mut state = env.reset();
    let mut episode_reward = 0.0;

    for iteration in 1..=config.iterations {
        let mut experiences = Vec::with_capacity(config.interactions_per_iter);
        for _ in 0..config.interactions_per_iter {
            let action = agent.act(state.view())?;
            let transition = env.step(action)?;
            episode_reward += transition.reward;
            summary.env_steps += 1;

            let next_state = transition.next_state;
            experiences.push(Experience::new(
                state,
                action,
                transition.reward,
                next_state.clone(),
                transition.done,
            ));

            state = if transition.done {
                summary.episodes += 1;
                let step = agent.global_step();
                let sink = agent.sink_mut();
                sink.add_scalar("dyna/episode", summary.episodes as f32, step);
                sink.add_scalar("dyna/train_episode_reward", episode_reward, step);
                info!(
                    "episode {} finished with reward {:.3} (step {})",
                    summary.episodes, episode_reward, step
                );
                summary.last_train_episode_reward = Some(episode_reward);
                episode_reward = 0.0;
                env.reset()
            } else {
                next_state
            };
        }

        if !experiences.is_empty() {
            let step = agent.train(&experiences)?;
            debug!(
                "iteration {}: critic loss {:.4}, model loss {:.4}, seeded {}",
                iteration, step.value.loss, step.model.loss, step.seeded
            );
        }

        let outcome = agent.plan(config.planning_steps_per_iter)?;
        summary.planned += outcome.expanded;

        if config.episodes_per_eval > 0 {
            let reward = agent.evaluate(test_env, config.episodes_per_eval)?;
            summary.eval_rewards.push(reward);
        }

        if config.checkpoint_interval > 0 && iteration % config.checkpoint_interval == 0 {
            if let Some(dir) = &config.checkpoint_dir {
                let path = dir.join(format!("{}_iter{:06}.bin", config.run_tag, iteration));
                agent.save_checkpoint(&path)?;
                summary.checkpoints.push(path);
            }
        }
        summary.iterations = iteration;
    }

    agent.sink_mut().flush();
    info!(
        "training done: {} iterations, {} env steps, {} episodes, {} planned rollouts",
        summary.iterations, summary.env_steps, summary.episodes, summary.planned
    );
    Ok(summary)
}
