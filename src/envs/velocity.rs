use crate::core::Result;
use crate::envs::RlEnv;
use crate::params::{EnvParams, SimParams, VehicleEnvParams};
use crate::sim::Kernel;

/// Acceleration-control environment rewarding closeness to a target speed.
///
/// The reward is `(‖v_t·1‖ − ‖v − v_t·1‖) / ‖v_t·1‖` over the current
/// speed vector: 1.0 when every vehicle drives exactly at
/// `target_velocity`, falling off with the L2 distance from that profile
/// and clipped at 0. A crash or an empty road yields 0.0.
pub struct DesiredVelocityEnv<K: Kernel> {
    kernel: K,
    sim: SimParams,
    env: EnvParams,
    vehicle: VehicleEnvParams,
}

impl<K: Kernel> DesiredVelocityEnv<K> {
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

impl<K: Kernel> RlEnv for DesiredVelocityEnv<K> {
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

    fn compute_reward(&self, _actions: &[f32]) -> f32 {
        let ids = self.kernel.ids();
        if ids.is_empty() || self.kernel.crash() {
            return 0.0;
        }
        let target = self.vehicle.target_velocity;
        let n = ids.len() as f32;
        let max_cost = target * n.sqrt();
        let cost = ids
            .iter()
            .map(|&id| {
                let d = self.kernel.speed(id) - target;
                d * d
            })
            .sum::<f32>()
            .sqrt();
        ((max_cost - cost) / max_cost).max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Env;
    use crate::envs::Episode;
    use crate::params::RingParams;
    use crate::sim::RingRoad;

    fn ring_env(target: f32) -> DesiredVelocityEnv<RingRoad> {
        let ring = RingParams { num_vehicles: 6, num_rl_vehicles: 1, ..RingParams::default() };
        DesiredVelocityEnv::new(
            RingRoad::new(ring, Some(0)),
            SimParams::default(),
            EnvParams { horizon: 50, warmup_steps: 0, ..EnvParams::default() },
            VehicleEnvParams { target_velocity: target, ..VehicleEnvParams::default() },
        )
        .unwrap()
    }

    #[test]
    fn standstill_scores_zero() {
        // All speeds are 0 at reset with no warmup, so the cost equals the
        // maximum cost exactly.
        let mut episode = Episode::new(ring_env(30.0));
        episode.reset(Some(1));
        let step = episode.step(vec![0.0]);
        assert!(step.reward.abs() < 0.05, "near-standstill should score ~0, got {}", step.reward);
    }

    #[test]
    fn reward_grows_as_speeds_approach_target() {
        let mut episode = Episode::new(ring_env(5.0));
        episode.reset(Some(1));
        let early = episode.step(vec![1.0]).reward;
        for _ in 0..40 {
            episode.step(vec![1.0]);
        }
        let late = episode.step(vec![0.5]).reward;
        assert!(
            late > early,
            "reward should improve as the platoon speeds up ({early} -> {late})"
        );
    }

    #[test]
    fn reward_is_bounded_by_one() {
        let mut episode = Episode::new(ring_env(5.0));
        episode.reset(Some(2));
        for _ in 0..50 {
            let r = episode.step(vec![0.5]).reward;
            assert!((0.0..=1.0).contains(&r), "reward {r} out of [0, 1]");
            if episode.elapsed_steps() >= 49 {
                break;
            }
        }
    }
}
