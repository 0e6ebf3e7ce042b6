//! # Dyna - Model-Based Reinforcement Learning with Prioritized Sweeping
//!
//! Dyna learns a Q-function from real experience and, in parallel, a model of
//! the environment's dynamics. The model is then used to replay simulated
//! transitions through the critic, with a bounded priority queue deciding
//! which simulated chains are worth expanding next.
//!
//! ## Key Features
//!
//! - **Prioritized planning**: bounded max-priority queue of rollout queries,
//!   geometric priority decay with depth and breadth-first branching over actions
//! - **Double-Q learning**: online/target critics with soft target updates
//!   and n-step bootstrapping for collapsed simulated chains
//! - **Pluggable approximators**: anything implementing [`approximator::Approximator`];
//!   a small MLP with SGD/Adam is included
//! - **Telemetry**: scalars and histograms through a single [`telemetry::MetricsSink`],
//!   with a CSV tensorboard-style writer
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dyna::agent::DynaAgent;
//! use dyna::config::DynaConfig;
//! use dyna::env::{ChainWalk, Environment};
//! use dyna::trainer::train_agent;
//!
//! let config = DynaConfig { iterations: 200, seed: Some(7), ..DynaConfig::default() };
//! let mut env = ChainWalk::new(6, 50).unwrap();
//! let mut test_env = env.clone();
//! let mut agent = DynaAgent::new(env.observation_size(), &env.action_space(), config.clone()).unwrap();
//!
//! let summary = train_agent(&mut agent, &mut env, &mut test_env, &config).unwrap();
//! println!("best evaluation reward: {:?}", summary.best_eval_reward());
//! ```
//!
//! ## Module Organization
//!
//! - [`agent`] - The Dyna agent tying learners, model and planner together
//! - [`planning`] - Admission policy and prioritized rollout expansion
//! - [`queue`] - Fixed-capacity priority queue
//! - [`value`] - Double-Q critic with target network
//! - [`dynamics`] - Learned dynamics model adapter
//! - [`schedule`] - Epsilon-greedy exploration schedule
//! - [`experience`] - Real transitions, batches and rollout queries
//! - [`approximator`] - Function approximator interface
//! - [`network`], [`layers`], [`activations`], [`optimizer`], [`loss`] - Default MLP approximator
//! - [`env`] - Environment interface and a corridor test environment
//! - [`trainer`] - Outer training loop
//! - [`config`] - Configuration
//! - [`telemetry`], [`tensorboard`] - Metrics sinks
//! - [`error`] - Error types and result handling

pub mod activations;
pub mod agent;
pub mod approximator;
pub mod config;
pub mod dynamics;
pub mod env;
pub mod error;
pub mod experience;
pub mod layers;
pub mod loss;
pub mod network;
pub mod optimizer;
pub mod planning;
pub mod queue;
pub mod schedule;
pub mod telemetry;
pub mod tensorboard;
pub mod trainer;
pub mod value;

#[cfg(test)]
mod tests;
