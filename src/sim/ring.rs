use rand::Rng;

use crate::params::RingParams;
use crate::sim::idm::{IdmParams, idm_accel};
use crate::sim::{Fleet, Kernel, VEHICLE_LENGTH, Vehicle, VehicleId, VehicleKind};
use crate::utils::rng::{RngStream, rng_from_seed};

const DEFAULT_SEED: u64 = 42;

/// Closed single-lane loop. The vehicle set is fixed at reset: human
/// vehicles follow the car-following model, RL vehicles hold their
/// commanded acceleration, and positions wrap modulo the loop length.
pub struct RingRoad {
    params: RingParams,
    idm: IdmParams,
    fleet: Fleet,
    rng: RngStream,
}

impl RingRoad {
    pub fn new(params: RingParams, seed: Option<u64>) -> Self {
        let idm = IdmParams::with_speed_limit(params.speed_limit);
        let mut kernel = Self {
            params,
            idm,
            fleet: Fleet::default(),
            rng: rng_from_seed(seed.unwrap_or(DEFAULT_SEED)),
        };
        kernel.populate();
        kernel
    }

    pub fn params(&self) -> &RingParams {
        &self.params
    }

    /// Place vehicles evenly around the loop with a small seeded jitter,
    /// standing still. RL vehicles are spread evenly through the platoon.
    fn populate(&mut self) {
        let n = self.params.num_vehicles as usize;
        let num_rl = self.params.num_rl_vehicles as usize;
        let spacing = self.params.length / n as f32;
        let jitter = ((spacing - VEHICLE_LENGTH) / 2.0).max(0.0) * 0.5;

        let rl_slots: Vec<usize> = (0..num_rl).map(|k| k * n / num_rl.max(1)).collect();
        for i in 0..n {
            let kind = if rl_slots.contains(&i) { VehicleKind::Rl } else { VehicleKind::Human };
            let offset = if jitter > 0.0 { self.rng.gen_range(-jitter..=jitter) } else { 0.0 };
            self.fleet.insert(Vehicle {
                kind,
                pos: (i as f32 * spacing + offset).rem_euclid(self.params.length),
                speed: 0.0,
                accel: 0.0,
            });
        }
    }

    /// Bumper-to-bumper gap from `pos` to the leader at `lead_pos`,
    /// wrapping around the loop.
    fn gap(&self, pos: f32, lead_pos: f32, single: bool) -> f32 {
        let sep = if single {
            self.params.length
        } else {
            (lead_pos - pos).rem_euclid(self.params.length)
        };
        sep - VEHICLE_LENGTH
    }

    fn position_ordered(&self) -> Vec<VehicleId> {
        let mut ids = self.fleet.insertion_order().to_vec();
        ids.sort_by(|&a, &b| {
            self.fleet.get(a)
                .pos
                .partial_cmp(&self.fleet.get(b).pos)
                .expect("vehicle positions are never NaN")
        });
        ids
    }
}

impl Kernel for RingRoad {
    fn reset(&mut self, seed: Option<u64>) {
        if let Some(s) = seed {
            self.rng = rng_from_seed(s);
        }
        self.fleet.clear();
        self.populate();
    }

    fn advance(&mut self, dt: f32) {
        let ordered = self.position_ordered();
        let n = ordered.len();
        if n == 0 {
            return;
        }

        // Accelerations from the pre-step snapshot, then one integration
        // pass, so update order cannot leak into the dynamics.
        let mut accels = Vec::with_capacity(n);
        for i in 0..n {
            let veh = self.fleet.get(ordered[i]);
            let lead = self.fleet.get(ordered[(i + 1) % n]);
            let gap = self.gap(veh.pos, lead.pos, n == 1);
            let a = match veh.kind {
                VehicleKind::Human => idm_accel(veh.speed, lead.speed, gap.max(0.0), &self.idm),
                VehicleKind::Rl => veh.accel,
            };
            accels.push(a);
        }

        let length = self.params.length;
        let speed_limit = self.params.speed_limit;
        for (i, &a) in accels.iter().enumerate() {
            let veh = self.fleet.get_mut(ordered[i]);
            veh.accel = a;
            veh.speed = (veh.speed + a * dt).clamp(0.0, speed_limit);
            veh.pos = (veh.pos + veh.speed * dt).rem_euclid(length);
        }

        if n > 1 {
            let ordered = self.position_ordered();
            for i in 0..n {
                let veh = self.fleet.get(ordered[i]);
                let lead = self.fleet.get(ordered[(i + 1) % n]);
                if self.gap(veh.pos, lead.pos, false) < 0.0 {
                    self.fleet.mark_crashed();
                }
            }
        }
    }

    fn ids(&self) -> Vec<VehicleId> {
        self.fleet.ids()
    }

    fn rl_ids(&self) -> Vec<VehicleId> {
        self.fleet.rl_ids()
    }

    fn num_vehicles(&self) -> usize {
        self.fleet.len()
    }

    fn num_rl_vehicles(&self) -> usize {
        self.fleet.num_rl()
    }

    fn position(&self, id: VehicleId) -> f32 {
        self.fleet.get(id).pos
    }

    fn speed(&self, id: VehicleId) -> f32 {
        self.fleet.get(id).speed
    }

    fn apply_acceleration(&mut self, ids: &[VehicleId], accels: &[f32]) {
        assert_eq!(ids.len(), accels.len(), "id/acceleration lists must pair up");
        for (&id, &a) in ids.iter().zip(accels.iter()) {
            self.fleet.get_mut(id).accel = a;
        }
    }

    fn crash(&self) -> bool {
        self.fleet.crashed()
    }

    fn set_sorted(&mut self, sorted: bool) {
        self.fleet.set_sorted(sorted);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_ring() -> RingRoad {
        RingRoad::new(
            RingParams { length: 100.0, num_vehicles: 5, num_rl_vehicles: 1, speed_limit: 30.0 },
            Some(0),
        )
    }

    #[test]
    fn populates_requested_counts() {
        let k = small_ring();
        assert_eq!(k.num_vehicles(), 5);
        assert_eq!(k.num_rl_vehicles(), 1);
        assert_eq!(k.ids().len(), 5);
    }

    #[test]
    fn vehicle_count_is_conserved_across_steps() {
        let mut k = small_ring();
        for _ in 0..200 {
            k.advance(0.1);
        }
        assert_eq!(k.num_vehicles(), 5);
        assert!(!k.crash());
    }

    #[test]
    fn positions_stay_on_the_loop() {
        let mut k = small_ring();
        for _ in 0..500 {
            k.advance(0.1);
        }
        for id in k.ids() {
            let pos = k.position(id);
            assert!((0.0..100.0).contains(&pos), "position {pos} left the loop");
        }
    }

    #[test]
    fn humans_pull_away_from_standstill() {
        let mut k = small_ring();
        for _ in 0..50 {
            k.advance(0.1);
        }
        let humans: Vec<_> = k
            .ids()
            .into_iter()
            .filter(|id| !k.rl_ids().contains(id))
            .collect();
        assert!(humans.iter().any(|&id| k.speed(id) > 0.1));
    }

    #[test]
    fn commanded_acceleration_sticks_until_reapplied() {
        let mut k = small_ring();
        let rl = k.rl_ids();
        k.apply_acceleration(&rl, &[2.0]);
        k.advance(0.1);
        let v1 = k.speed(rl[0]);
        k.advance(0.1);
        let v2 = k.speed(rl[0]);
        assert!(v1 > 0.0 && v2 > v1, "commanded acceleration should persist");
    }

    #[test]
    fn reset_with_same_seed_reproduces_layout() {
        let mut a = small_ring();
        let mut b = small_ring();
        a.reset(Some(9));
        b.reset(Some(9));
        let pa: Vec<f32> = a.ids().iter().map(|&id| a.position(id)).collect();
        let pb: Vec<f32> = b.ids().iter().map(|&id| b.position(id)).collect();
        assert_eq!(pa, pb);
    }

    #[test]
    fn sorted_lookup_orders_by_position() {
        let mut k = small_ring();
        k.set_sorted(true);
        for _ in 0..30 {
            k.advance(0.1);
        }
        let positions: Vec<f32> = k.ids().iter().map(|&id| k.position(id)).collect();
        for w in positions.windows(2) {
            assert!(w[0] <= w[1], "ids not sorted by position: {positions:?}");
        }
    }
}
