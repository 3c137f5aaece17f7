use rand::Rng;

use crate::params::OpenRoadParams;
use crate::sim::idm::{IdmParams, idm_accel, idm_free_accel};
use crate::sim::{Fleet, Kernel, VEHICLE_LENGTH, Vehicle, VehicleId, VehicleKind};
use crate::utils::rng::{RngStream, rng_from_seed};

const DEFAULT_SEED: u64 = 42;

/// Extra clearance required at the entry before a new vehicle may be
/// inserted, meters.
const ENTRY_CLEARANCE: f32 = 2.0;

/// Finite single-lane segment fed by a stochastic inflow. Vehicles enter at
/// position zero, drive to the far end and are removed, so the vehicle count
/// (and with it the space dimensions) varies over an episode — including
/// down to zero.
pub struct OpenRoad {
    params: OpenRoadParams,
    idm: IdmParams,
    fleet: Fleet,
    rng: RngStream,
    /// Total insertions since reset, used to pick RL vehicles by period.
    insertions: u64,
}

impl OpenRoad {
    pub fn new(params: OpenRoadParams, seed: Option<u64>) -> Self {
        let idm = IdmParams::with_speed_limit(params.speed_limit);
        Self {
            params,
            idm,
            fleet: Fleet::default(),
            rng: rng_from_seed(seed.unwrap_or(DEFAULT_SEED)),
            insertions: 0,
        }
    }

    pub fn params(&self) -> &OpenRoadParams {
        &self.params
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

    fn entry_clear(&self) -> bool {
        self.fleet
            .insertion_order()
            .iter()
            .all(|&id| self.fleet.get(id).pos > VEHICLE_LENGTH + ENTRY_CLEARANCE)
    }

    fn maybe_insert(&mut self, dt: f32) {
        let p = (self.params.inflow.vehs_per_hour / 3600.0 * dt).min(1.0);
        if self.rng.gen_range(0.0f32..1.0) >= p {
            return;
        }
        if !self.entry_clear() {
            return;
        }
        self.insertions += 1;
        let period = self.params.inflow.rl_period as u64;
        let kind = if period > 0 && self.insertions % period == 0 {
            VehicleKind::Rl
        } else {
            VehicleKind::Human
        };
        self.fleet.insert(Vehicle {
            kind,
            pos: 0.0,
            speed: self.params.inflow.enter_speed.min(self.params.speed_limit),
            accel: 0.0,
        });
    }
}

impl Kernel for OpenRoad {
    fn reset(&mut self, seed: Option<u64>) {
        if let Some(s) = seed {
            self.rng = rng_from_seed(s);
        }
        self.fleet.clear();
        self.insertions = 0;
    }

    fn advance(&mut self, dt: f32) {
        let ordered = self.position_ordered();
        let n = ordered.len();

        let mut accels = Vec::with_capacity(n);
        for i in 0..n {
            let veh = self.fleet.get(ordered[i]);
            let a = match veh.kind {
                VehicleKind::Rl => veh.accel,
                VehicleKind::Human => {
                    if i + 1 < n {
                        let lead = self.fleet.get(ordered[i + 1]);
                        let gap = lead.pos - veh.pos - VEHICLE_LENGTH;
                        idm_accel(veh.speed, lead.speed, gap.max(0.0), &self.idm)
                    } else {
                        idm_free_accel(veh.speed, &self.idm)
                    }
                }
            };
            accels.push(a);
        }

        let speed_limit = self.params.speed_limit;
        for (i, &a) in accels.iter().enumerate() {
            let veh = self.fleet.get_mut(ordered[i]);
            veh.accel = a;
            veh.speed = (veh.speed + a * dt).clamp(0.0, speed_limit);
            veh.pos += veh.speed * dt;
        }

        // Departures at the far end.
        let length = self.params.length;
        let departed: Vec<VehicleId> = self
            .fleet
            .insertion_order()
            .iter()
            .copied()
            .filter(|&id| self.fleet.get(id).pos > length)
            .collect();
        for id in departed {
            self.fleet.remove(id);
        }

        let ordered = self.position_ordered();
        for w in ordered.windows(2) {
            let gap = self.fleet.get(w[1]).pos - self.fleet.get(w[0]).pos - VEHICLE_LENGTH;
            if gap < 0.0 {
                self.fleet.mark_crashed();
            }
        }

        self.maybe_insert(dt);
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
