//! Policy-gradient training against the environments.
//!
//! Deliberately small: a linear-Gaussian policy and a REINFORCE update,
//! run single-process over synchronous rollout workers. It exists to
//! consume the environments exactly the way an external trainer would —
//! spaces queried per reset, one adapter instance per worker, episodes
//! driven to termination — not to compete with a real RL library.

use log::{debug, info};

use crate::core::{Env, Result, TrafficError};
use crate::experiment::Policy;
use crate::registry::EnvDyn;
use crate::spaces::BoxSpace;
use crate::utils::rng::{RngStream, SeedSequence, sample_gaussian};
use crate::vector::SyncVectorEnv;

/// Trainer hyperparameters with their defaulting and failure rules fixed
/// up front.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TrainingConfig {
    /// Rollout workers, each holding an independent environment instance.
    pub num_workers: usize,
    /// Policy updates to run.
    pub training_iterations: usize,
    /// Discount rate for returns-to-go.
    pub gamma: f32,
    /// Gradient-ascent step size.
    pub learning_rate: f32,
    /// Fixed standard deviation of the Gaussian policy.
    pub policy_std: f32,
    /// Root seed for worker resets and action sampling.
    pub seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            num_workers: 4,
            training_iterations: 100,
            gamma: 0.999,
            learning_rate: 5e-4,
            policy_std: 0.5,
            seed: 0,
        }
    }
}

impl TrainingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.num_workers == 0 {
            return Err(TrafficError::InvalidParam {
                name: "num_workers".into(),
                reason: "must be at least 1".into(),
            });
        }
        if self.training_iterations == 0 {
            return Err(TrafficError::InvalidParam {
                name: "training_iterations".into(),
                reason: "must be at least 1".into(),
            });
        }
        if !(self.gamma > 0.0 && self.gamma <= 1.0) {
            return Err(TrafficError::InvalidParam {
                name: "gamma".into(),
                reason: format!("must be in (0, 1], got {}", self.gamma),
            });
        }
        for (name, v) in [("learning_rate", self.learning_rate), ("policy_std", self.policy_std)] {
            if !(v.is_finite() && v > 0.0) {
                return Err(TrafficError::InvalidParam {
                    name: name.to_string(),
                    reason: format!("must be finite and positive, got {v}"),
                });
            }
        }
        Ok(())
    }
}

/// Gaussian policy with a linear mean: `a ~ N(W·obs + b, std²)`.
///
/// The observation width is fixed at construction, so training targets
/// environments whose vehicle count does not change mid-episode (the ring
/// scenarios).
#[derive(Clone, Debug)]
pub struct LinearGaussianPolicy {
    /// Row-major: one weight row per action dimension.
    weights: Vec<Vec<f32>>,
    bias: Vec<f32>,
    std: f32,
}

impl LinearGaussianPolicy {
    pub fn new(obs_dim: usize, act_dim: usize, std: f32) -> Self {
        Self { weights: vec![vec![0.0; obs_dim]; act_dim], bias: vec![0.0; act_dim], std }
    }

    pub fn obs_dim(&self) -> usize {
        self.weights.first().map_or(0, Vec::len)
    }

    pub fn act_dim(&self) -> usize {
        self.bias.len()
    }

    pub fn mean(&self, obs: &[f32]) -> Vec<f32> {
        self.weights
            .iter()
            .zip(self.bias.iter())
            .map(|(row, b)| row.iter().zip(obs.iter()).map(|(w, x)| w * x).sum::<f32>() + b)
            .collect()
    }
}

impl Policy for LinearGaussianPolicy {
    fn act(&mut self, obs: &[f32], action_space: &BoxSpace, rng: &mut RngStream) -> Vec<f32> {
        let low = action_space.low();
        let high = action_space.high();
        self.mean(obs)
            .into_iter()
            .enumerate()
            .map(|(j, mu)| (mu + self.std * sample_gaussian(rng)).clamp(low[j], high[j]))
            .collect()
    }
}

/// Mean return and episode length for one training iteration.
#[derive(Clone, Debug, PartialEq)]
pub struct IterationStats {
    pub iteration: usize,
    pub mean_return: f32,
    pub mean_episode_len: f32,
}

/// Per-iteration statistics accumulated over a training run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TrainingReport {
    pub iterations: Vec<IterationStats>,
}

impl TrainingReport {
    pub fn final_mean_return(&self) -> Option<f32> {
        self.iterations.last().map(|s| s.mean_return)
    }
}

struct Trajectory {
    observations: Vec<Vec<f32>>,
    actions: Vec<Vec<f32>>,
    rewards: Vec<f32>,
}

/// Single-process REINFORCE over synchronous rollout workers.
pub struct Reinforce {
    config: TrainingConfig,
}

impl Reinforce {
    pub fn new(config: TrainingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Train a fresh policy on environments produced by `factory`, one per
    /// worker. Returns the trained policy and per-iteration statistics.
    pub fn train<W, F>(&self, factory: F) -> Result<(LinearGaussianPolicy, TrainingReport)>
    where
        W: Env<Obs = Vec<f32>, Act = Vec<f32>> + EnvDyn,
        F: FnMut() -> W,
    {
        let cfg = &self.config;
        let mut workers = SyncVectorEnv::new(cfg.num_workers, factory);
        let mut seq = SeedSequence::new(cfg.seed);
        let mut rng = seq.next_rng();

        // Probe the spaces once to size the policy; every later episode must
        // keep the same widths.
        let initial = workers.reset_all(Some(seq.next_subseed()));
        let obs_dim = initial[0].0.len();
        let act_dim = workers.envs()[0].action_space()?.dim();
        let mut policy = LinearGaussianPolicy::new(obs_dim, act_dim, cfg.policy_std);
        info!(
            "REINFORCE: {} workers, obs_dim={obs_dim}, act_dim={act_dim}, {} iterations",
            cfg.num_workers, cfg.training_iterations,
        );

        let mut report = TrainingReport::default();
        for iteration in 0..cfg.training_iterations {
            let observations = workers.reset_all(Some(seq.next_subseed()));
            let mut trajectories = Vec::with_capacity(cfg.num_workers);
            for (worker, (first_obs, _info)) in workers.envs_mut().iter_mut().zip(observations) {
                trajectories.push(collect_episode(worker, &mut policy, first_obs, &mut rng)?);
            }
            let stats = self.update(&mut policy, &trajectories, iteration);
            debug!(
                "iteration {}: mean_return={:.3} mean_len={:.1}",
                iteration, stats.mean_return, stats.mean_episode_len,
            );
            report.iterations.push(stats);
        }

        workers.close_all();
        if let Some(final_return) = report.final_mean_return() {
            info!("training complete, final mean return {final_return:.3}");
        }
        Ok((policy, report))
    }

    /// One REINFORCE step: discounted returns-to-go, mean baseline, and the
    /// closed-form Gaussian score-function gradient.
    fn update(
        &self,
        policy: &mut LinearGaussianPolicy,
        trajectories: &[Trajectory],
        iteration: usize,
    ) -> IterationStats {
        let cfg = &self.config;
        let mut returns: Vec<Vec<f32>> = Vec::with_capacity(trajectories.len());
        for traj in trajectories {
            let mut g = 0.0f32;
            let mut rtg = vec![0.0; traj.rewards.len()];
            for (t, &r) in traj.rewards.iter().enumerate().rev() {
                g = r + cfg.gamma * g;
                rtg[t] = g;
            }
            returns.push(rtg);
        }

        let total_steps: usize = returns.iter().map(Vec::len).sum();
        let baseline =
            returns.iter().flatten().sum::<f32>() / total_steps.max(1) as f32;

        let inv_var = 1.0 / (policy.std * policy.std);
        let scale = cfg.learning_rate / total_steps.max(1) as f32;
        for (traj, rtg) in trajectories.iter().zip(returns.iter()) {
            for t in 0..traj.rewards.len() {
                let advantage = rtg[t] - baseline;
                let mu = policy.mean(&traj.observations[t]);
                for j in 0..policy.act_dim() {
                    let score = (traj.actions[t][j] - mu[j]) * inv_var;
                    let step = scale * advantage * score;
                    for (w, &x) in
                        policy.weights[j].iter_mut().zip(traj.observations[t].iter())
                    {
                        *w += step * x;
                    }
                    policy.bias[j] += step;
                }
            }
        }

        let mean_return = trajectories
            .iter()
            .map(|t| t.rewards.iter().sum::<f32>())
            .sum::<f32>()
            / trajectories.len().max(1) as f32;
        let mean_episode_len = total_steps as f32 / trajectories.len().max(1) as f32;
        IterationStats { iteration, mean_return, mean_episode_len }
    }
}

fn collect_episode<W>(
    worker: &mut W,
    policy: &mut LinearGaussianPolicy,
    first_obs: Vec<f32>,
    rng: &mut RngStream,
) -> Result<Trajectory>
where
    W: Env<Obs = Vec<f32>, Act = Vec<f32>> + EnvDyn,
{
    let mut traj =
        Trajectory { observations: Vec::new(), actions: Vec::new(), rewards: Vec::new() };
    let mut obs = first_obs;
    loop {
        if obs.len() != policy.obs_dim() {
            return Err(TrafficError::Training(format!(
                "observation width changed from {} to {} during training",
                policy.obs_dim(),
                obs.len(),
            )));
        }
        let space = worker.action_space()?;
        if space.dim() != policy.act_dim() {
            return Err(TrafficError::Training(format!(
                "action width changed from {} to {} during training",
                policy.act_dim(),
                space.dim(),
            )));
        }
        let action = policy.act(&obs, &space, rng);
        let step = Env::step(worker, action.clone());
        traj.observations.push(obs);
        traj.actions.push(action);
        traj.rewards.push(step.reward);
        let done = step.done();
        obs = step.observation;
        if done {
            return Ok(traj);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envs::{AccelEnv, Episode};
    use crate::params::{EnvParams, RingParams, SimParams, VehicleEnvParams};
    use crate::sim::RingRoad;

    fn tiny_worker() -> Episode<AccelEnv<RingRoad>> {
        let ring = RingParams { num_vehicles: 4, num_rl_vehicles: 1, ..RingParams::default() };
        Episode::new(
            AccelEnv::new(
                RingRoad::new(ring, None),
                SimParams::default(),
                EnvParams { horizon: 20, warmup_steps: 0, ..EnvParams::default() },
                VehicleEnvParams::default(),
            )
            .unwrap(),
        )
    }

    fn smoke_config() -> TrainingConfig {
        TrainingConfig {
            num_workers: 2,
            training_iterations: 3,
            learning_rate: 1e-3,
            seed: 7,
            ..TrainingConfig::default()
        }
    }

    #[test]
    fn config_validation_catches_bad_fields() {
        assert!(TrainingConfig { num_workers: 0, ..TrainingConfig::default() }.validate().is_err());
        assert!(TrainingConfig { gamma: 1.5, ..TrainingConfig::default() }.validate().is_err());
        assert!(
            TrainingConfig { learning_rate: 0.0, ..TrainingConfig::default() }
                .validate()
                .is_err()
        );
        assert!(TrainingConfig::default().validate().is_ok());
    }

    #[test]
    fn training_produces_a_well_formed_report() {
        let trainer = Reinforce::new(smoke_config()).unwrap();
        let (policy, report) = trainer.train(tiny_worker).unwrap();
        assert_eq!(report.iterations.len(), 3);
        for s in &report.iterations {
            assert!(s.mean_return.is_finite());
            assert!(s.mean_episode_len > 0.0);
        }
        assert_eq!(policy.obs_dim(), 8);
        assert_eq!(policy.act_dim(), 1);
    }

    #[test]
    fn gradient_updates_move_the_policy() {
        let trainer = Reinforce::new(smoke_config()).unwrap();
        let (policy, _report) = trainer.train(tiny_worker).unwrap();
        let moved = policy.bias.iter().any(|&b| b != 0.0)
            || policy.weights.iter().flatten().any(|&w| w != 0.0);
        assert!(moved, "training never updated the policy parameters");
        assert!(policy.weights.iter().flatten().all(|w| w.is_finite()));
    }

    #[test]
    fn same_seed_trains_identically() {
        let a = Reinforce::new(smoke_config()).unwrap().train(tiny_worker).unwrap();
        let b = Reinforce::new(smoke_config()).unwrap().train(tiny_worker).unwrap();
        assert_eq!(a.1, b.1);
    }
}
