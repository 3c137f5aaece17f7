use crate::core::Result;
use crate::envs::{RlEnv, mean_speed};
use crate::params::{EnvParams, SimParams, VehicleEnvParams};
use crate::sim::Kernel;

/// Acceleration-control environment rewarding high network speed.
///
/// The policy commands one acceleration per controllable vehicle; the
/// reward is the arithmetic mean speed of everything on the road, so the
/// policy is pushed toward smoothing traffic rather than merely driving
/// its own vehicles fast.
pub struct AccelEnv<K: Kernel> {
    kernel: K,
    sim: SimParams,
    env: EnvParams,
    vehicle: VehicleEnvParams,
}

impl<K: Kernel> AccelEnv<K> {
    pub fn new(
        kernel: K,
        sim: SimParams,
        env: EnvParams,
        vehicle: VehicleEnvParams,
    ) -> Result<Self> {
        sim.validate()?;
        env.validate()?;
        vehicle.validate()?;
        Ok(Self { kernel, sim, env, vehicle })
    }
}

impl<K: Kernel> RlEnv for AccelEnv<K> {
    type K = K;

    fn kernel(&self) -> &K {
        &self.kernel
    }

    fn kernel_mut(&mut self) -> &mut K {
        &mut self.kernel
    }

    fn sim_params(&self) -> &SimParams {
        &self.sim
    }

    fn env_params(&self) -> &EnvParams {
        &self.env
    }

    fn vehicle_params(&self) -> &VehicleEnvParams {
        &self.vehicle
    }

    /// Arithmetic mean of all current vehicle speeds. An empty road yields
    /// 0.0 rather than an undefined mean.
    fn compute_reward(&self, _actions: &[f32]) -> f32 {
        mean_speed(&self.kernel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Env;
    use crate::envs::Episode;
    use crate::params::RingParams;
    use crate::sim::RingRoad;
    use crate::spaces::Space;
    use crate::utils::rng::rng_from_seed;

    fn ring_env() -> AccelEnv<RingRoad> {
        let ring = RingParams { num_vehicles: 8, num_rl_vehicles: 2, ..RingParams::default() };
        AccelEnv::new(
            RingRoad::new(ring, Some(0)),
            SimParams::default(),
            EnvParams { horizon: 20, warmup_steps: 5, ..EnvParams::default() },
            VehicleEnvParams::default(),
        )
        .unwrap()
    }

    #[test]
    fn action_space_tracks_bounds_and_rl_count() {
        let env = ring_env();
        let space = env.action_space().unwrap();
        assert_eq!(space.dim(), 2);
        assert!(space.low().iter().all(|&lo| lo == -3.0));
        assert!(space.high().iter().all(|&hi| hi == 3.0));
    }

    #[test]
    fn observation_space_is_twice_the_vehicle_count() {
        let env = ring_env();
        let space = env.observation_space().unwrap();
        assert_eq!(space.dim(), 16);
        assert!(space.low().iter().all(|&lo| lo == 0.0));
        assert!(space.high().iter().all(|&hi| hi == f32::INFINITY));
    }

    #[test]
    fn nonfinite_bound_is_a_configuration_error() {
        let mut env = ring_env();
        env.vehicle.max_accel = f32::INFINITY;
        assert!(env.action_space().is_err());
    }

    #[test]
    fn state_is_positions_then_speeds() {
        let env = ring_env();
        let state = env.get_state();
        let kernel = env.kernel();
        let ids = kernel.ids();
        assert_eq!(state.len(), 2 * ids.len());
        for (i, &id) in ids.iter().enumerate() {
            assert_eq!(state[i], kernel.position(id));
            assert_eq!(state[ids.len() + i], kernel.speed(id));
        }
    }

    #[test]
    fn reward_is_the_mean_speed() {
        let mut env = ring_env();
        // Drive everything for a while so speeds are nonzero.
        let mut episode = Episode::new(env);
        episode.reset(Some(3));
        let step = episode.step(vec![1.0, 1.0]);
        env = episode.into_inner();
        let ids = env.kernel().ids();
        let expected: f32 =
            ids.iter().map(|&id| env.kernel().speed(id)).sum::<f32>() / ids.len() as f32;
        assert!((step.reward - expected).abs() < 1e-6);
    }

    #[test]
    fn episode_truncates_at_horizon() {
        let mut episode = Episode::new(ring_env());
        episode.reset(Some(0));
        let mut last = None;
        for _ in 0..20 {
            last = Some(episode.step(vec![0.5, 0.5]));
            if last.as_ref().unwrap().done() {
                break;
            }
        }
        let last = last.unwrap();
        assert!(last.truncated);
        assert_eq!(episode.elapsed_steps(), 20);
    }

    #[test]
    fn sampled_actions_are_valid_for_stepping() {
        let mut rng = rng_from_seed(11);
        let mut episode = Episode::new(ring_env());
        episode.reset(Some(5));
        for _ in 0..5 {
            let action = episode.env().action_space().unwrap().sample(&mut rng);
            let step = episode.step(action);
            assert_eq!(step.observation.len(), 16);
        }
    }

    #[test]
    #[should_panic(expected = "does not match")]
    fn wrong_action_length_panics_in_the_driver() {
        let mut episode = Episode::new(ring_env());
        episode.reset(Some(0));
        episode.step(vec![0.0]);
    }
}
