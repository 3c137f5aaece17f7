//! Environment adapters: the bridge between per-step vehicle state and a
//! policy-learning loop.
//!
//! [`RlEnv`] is the contract every concrete environment implements — five
//! operations over a fixed configuration, free of any episode state of
//! their own. [`Episode`] owns the step/reset cycle (warmup, horizon,
//! termination) and turns any adapter into a steppable [`Env`].

pub mod accel;
pub mod velocity;

pub use accel::AccelEnv;
pub use velocity::DesiredVelocityEnv;

use crate::core::{Env, Info, InfoValue, Result, Step, TrafficError};
use crate::params::{EnvParams, SimParams, VehicleEnvParams};
use crate::sim::Kernel;
use crate::spaces::BoxSpace;

/// Mean speed over all vehicles currently present; 0.0 on an empty road.
pub(crate) fn mean_speed<K: Kernel>(kernel: &K) -> f32 {
    let ids = kernel.ids();
    if ids.is_empty() {
        return 0.0;
    }
    ids.iter().map(|&id| kernel.speed(id)).sum::<f32>() / ids.len() as f32
}

/// The adapter contract: five operations over a kernel and a fixed
/// configuration.
///
/// Adapters are pure mappings from the current kernel snapshot — they cache
/// nothing across steps and hold no episode state. Spaces are rebuilt on
/// every call because the vehicle count may change between steps. All
/// operations assume a live kernel; the episode driver guarantees that.
pub trait RlEnv {
    type K: Kernel;

    fn kernel(&self) -> &Self::K;
    fn kernel_mut(&mut self) -> &mut Self::K;
    fn sim_params(&self) -> &SimParams;
    fn env_params(&self) -> &EnvParams;
    fn vehicle_params(&self) -> &VehicleEnvParams;

    /// The control signal the policy may emit: one bounded acceleration per
    /// controllable vehicle, in `[-|max_decel|, max_accel]`.
    fn action_space(&self) -> Result<BoxSpace> {
        let p = self.vehicle_params();
        for (name, v) in [("max_accel", p.max_accel), ("max_decel", p.max_decel)] {
            if !v.is_finite() {
                return Err(TrafficError::InvalidParam {
                    name: name.to_string(),
                    reason: format!("action bounds must be finite, got {v}"),
                });
            }
        }
        BoxSpace::uniform(-p.max_decel.abs(), p.max_accel, self.kernel().num_rl_vehicles())
    }

    /// The feature vector describing simulation state: a position and a
    /// speed per vehicle, both non-negative and unbounded above.
    fn observation_space(&self) -> Result<BoxSpace> {
        BoxSpace::uniform(0.0, f32::INFINITY, 2 * self.kernel().num_vehicles())
    }

    /// Forward one acceleration per controllable vehicle, paired with
    /// [`Kernel::rl_ids`] in order. Length validation is the caller's job
    /// (the episode driver checks before forwarding).
    fn apply_rl_actions(&mut self, actions: &[f32]) {
        let ids = self.kernel().rl_ids();
        self.kernel_mut().apply_acceleration(&ids, actions);
    }

    /// Positions of every vehicle in lookup order, then speeds in the same
    /// order. Recomputed fresh on every call.
    fn get_state(&self) -> Vec<f32> {
        let kernel = self.kernel();
        let ids = kernel.ids();
        ids.iter()
            .map(|&id| kernel.position(id))
            .chain(ids.iter().map(|&id| kernel.speed(id)))
            .collect()
    }

    /// Scalar reward for the step that just applied `actions`.
    fn compute_reward(&self, actions: &[f32]) -> f32;
}

/// The step/reset cycle around an adapter.
///
/// Owns the step counter and enforces warmup, horizon and termination — the
/// adapter itself stays stateless. Also acts as the action-validation layer:
/// a step whose action length disagrees with the current controllable count
/// is a programmer error and panics.
pub struct Episode<E: RlEnv> {
    env: E,
    t: u32,
}

impl<E: RlEnv> Episode<E> {
    pub fn new(env: E) -> Self {
        let mut episode = Self { env, t: 0 };
        let sorted = episode.env.env_params().sort_vehicles;
        episode.env.kernel_mut().set_sorted(sorted);
        episode
    }

    /// Steps taken since the last reset.
    pub fn elapsed_steps(&self) -> u32 {
        self.t
    }

    pub fn env(&self) -> &E {
        &self.env
    }

    pub fn env_mut(&mut self) -> &mut E {
        &mut self.env
    }

    pub fn into_inner(self) -> E {
        self.env
    }

    fn step_info(&self) -> Info {
        let mut info = Info::new();
        info.insert("num_vehicles", InfoValue::from(self.env.kernel().num_vehicles()));
        info.insert("mean_speed", InfoValue::from(mean_speed(self.env.kernel())));
        info
    }
}

impl<E: RlEnv> Env for Episode<E> {
    type Obs = Vec<f32>;
    type Act = Vec<f32>;

    fn reset(&mut self, seed: Option<u64>) -> (Self::Obs, Info) {
        self.t = 0;
        let kernel_seed = seed.or(self.env.sim_params().seed);
        self.env.kernel_mut().reset(kernel_seed);
        let dt = self.env.sim_params().sim_step;
        for _ in 0..self.env.env_params().warmup_steps {
            // No policy in the loop yet: RL vehicles coast on a zero
            // command while the humans settle.
            self.env.kernel_mut().advance(dt);
        }
        (self.env.get_state(), self.step_info())
    }

    fn step(&mut self, action: Self::Act) -> Step<Self::Obs> {
        let expected = self.env.kernel().num_rl_vehicles();
        assert_eq!(
            action.len(),
            expected,
            "action length {} does not match the {} controllable vehicles",
            action.len(),
            expected,
        );

        self.env.apply_rl_actions(&action);
        let dt = self.env.sim_params().sim_step;
        for _ in 0..self.env.env_params().sims_per_step {
            self.env.kernel_mut().advance(dt);
        }
        self.t += 1;

        let observation = self.env.get_state();
        let reward = self.env.compute_reward(&action);
        let terminated = self.env.kernel().crash();
        let truncated = self.t >= self.env.env_params().horizon;
        Step::new(observation, reward, terminated, truncated, self.step_info())
    }
}
