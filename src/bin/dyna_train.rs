//! Dyna training CLI
//!
//! Trains a Dyna agent on the `ChainWalk` corridor and prints a summary.

use clap::Parser;
use log::info;
use std::path::PathBuf;

use dyna::agent::DynaAgent;
use dyna::config::DynaConfig;
use dyna::env::{ChainWalk, Environment};
use dyna::error::Result;
use dyna::tensorboard::TensorboardWriter;
use dyna::trainer::train_agent;

/// Dyna prioritized-sweeping trainer
#[derive(Parser)]
#[command(name = "dyna-train")]
#[command(about = "Train a Dyna agent with prioritized planning", long_about = None)]
struct Cli {
    /// JSON config file; missing fields use defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of outer iterations
    #[arg(long)]
    iterations: Option<usize>,

    /// Planning steps per iteration
    #[arg(long)]
    planning_steps: Option<usize>,

    /// Random seed
    #[arg(long)]
    seed: Option<u64>,

    /// Tensorboard CSV log directory
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Run name under the log directory
    #[arg(long)]
    run_tag: Option<String>,

    /// Checkpoint directory
    #[arg(long)]
    checkpoint_dir: Option<PathBuf>,

    /// Iterations between checkpoints
    #[arg(long)]
    checkpoint_interval: Option<usize>,

    /// Load checkpoint to resume training
    #[arg(long)]
    resume_from: Option<PathBuf>,

    /// Number of corridor cells
    #[arg(long, default_value_t = 8)]
    chain_length: usize,

    /// Step limit of a training episode
    #[arg(long, default_value_t = 100)]
    episode_limit: usize,

    /// Write the effective config to this file and exit
    #[arg(long)]
    dump_config: Option<PathBuf>,
}

impl Cli {
    fn resolve_config(&self) -> Result<DynaConfig> {
        let mut config = match &self.config {
            Some(path) => DynaConfig::from_json_file(path)?,
            None => DynaConfig::default(),
        };
        if let Some(iterations) = self.iterations {
            config.iterations = iterations;
        }
        if let Some(steps) = self.planning_steps {
            config.planning_steps_per_iter = steps;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        if self.log_dir.is_some() {
            config.log_dir = self.log_dir.clone();
        }
        if let Some(tag) = &self.run_tag {
            config.run_tag = tag.clone();
        }
        if self.checkpoint_dir.is_some() {
            config.checkpoint_dir = self.checkpoint_dir.clone();
        }
        if let Some(interval) = self.checkpoint_interval {
            config.checkpoint_interval = interval;
        }
        config.validate()?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = cli.resolve_config()?;

    if let Some(path) = &cli.dump_config {
        config.to_json_file(path)?;
        info!("wrote config to {}", path.display());
        return Ok(());
    }

    let mut env = ChainWalk::new(cli.chain_length, cli.episode_limit)?;
    let mut test_env = env.clone();

    let mut agent = DynaAgent::new(env.observation_size(), &env.action_space(), config.clone())?;
    if let Some(dir) = &config.log_dir {
        let writer = TensorboardWriter::new(dir, &config.run_tag)?;
        info!("logging metrics to {}", writer.log_dir().display());
        agent = agent.with_sink(Box::new(writer));
    }
    if let Some(path) = &cli.resume_from {
        agent.load_checkpoint(path)?;
    }

    info!(
        "training on a {}-cell corridor for {} iterations",
        cli.chain_length, config.iterations
    );
    let summary = train_agent(&mut agent, &mut env, &mut test_env, &config)?;

    println!("iterations:        {}", summary.iterations);
    println!("environment steps: {}", summary.env_steps);
    println!("episodes:          {}", summary.episodes);
    println!("planned rollouts:  {}", summary.planned);
    println!("final epsilon:     {:.4}", agent.epsilon());
    match summary.best_eval_reward() {
        Some(reward) => println!("best eval reward:  {:.3}", reward),
        None => println!("best eval reward:  n/a"),
    }
    for path in &summary.checkpoints {
        println!("checkpoint:        {}", path.display());
    }
    Ok(())
}
