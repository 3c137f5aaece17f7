//! The simulation kernel: vehicle state the environments read through, and
//! the two built-in single-lane scenarios that host them.
//!
//! The kernel owns all vehicle state exclusively. Environments read
//! positions and speeds through the accessors once per step and never retain
//! snapshots; the only mutation they perform is `apply_acceleration` on the
//! policy-controlled vehicles.

pub mod idm;
mod open;
mod ring;

pub use open::OpenRoad;
pub use ring::RingRoad;

use slotmap::{SlotMap, new_key_type};

new_key_type! {
    /// Unique id of a vehicle within one kernel.
    pub struct VehicleId;
}

/// Bumper-to-bumper length of every vehicle, meters.
pub const VEHICLE_LENGTH: f32 = 5.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VehicleKind {
    /// Follows the car-following model.
    Human,
    /// Acceleration dictated by the learned policy.
    Rl,
}

#[derive(Clone, Debug)]
pub struct Vehicle {
    pub kind: VehicleKind,
    /// Absolute position along the lane, meters.
    pub pos: f32,
    /// Current speed, m/s.
    pub speed: f32,
    /// Acceleration applied on the next advance: commanded for RL vehicles,
    /// recomputed every step for humans.
    pub accel: f32,
}

/// Control interface the environments consume.
///
/// Every operation assumes a live kernel; passing an id that is no longer
/// present is a caller contract violation and panics.
pub trait Kernel {
    /// Rebuild the initial vehicle set. A `Some` seed reseeds the kernel's
    /// RNG stream; `None` continues the current stream.
    fn reset(&mut self, seed: Option<u64>);

    /// Advance the simulation by `dt` seconds: car-following accelerations
    /// for humans, commanded accelerations for RL vehicles, clamped
    /// integration, arrivals/departures, crash detection.
    fn advance(&mut self, dt: f32);

    /// All vehicle ids in lookup order: insertion order, or ascending
    /// position when position-sorting is enabled.
    fn ids(&self) -> Vec<VehicleId>;

    /// Policy-controlled vehicle ids, always in insertion order.
    fn rl_ids(&self) -> Vec<VehicleId>;

    fn num_vehicles(&self) -> usize;
    fn num_rl_vehicles(&self) -> usize;

    fn position(&self, id: VehicleId) -> f32;
    fn speed(&self, id: VehicleId) -> f32;

    /// Set commanded accelerations on exactly the given vehicles. The two
    /// slices are paired; lengths must match.
    fn apply_acceleration(&mut self, ids: &[VehicleId], accels: &[f32]);

    /// Whether any vehicle has overlapped its leader since the last reset.
    fn crash(&self) -> bool;

    /// Toggle position-sorted id lookup.
    fn set_sorted(&mut self, sorted: bool);
}

/// Shared vehicle storage used by the concrete kernels: keyed vehicles plus
/// an explicit insertion-order list, so id lookup order survives slot reuse
/// after removals.
#[derive(Debug, Default)]
pub(crate) struct Fleet {
    vehicles: SlotMap<VehicleId, Vehicle>,
    order: Vec<VehicleId>,
    sorted: bool,
    crashed: bool,
}

impl Fleet {
    pub fn clear(&mut self) {
        self.vehicles.clear();
        self.order.clear();
        self.crashed = false;
    }

    pub fn insert(&mut self, vehicle: Vehicle) -> VehicleId {
        let id = self.vehicles.insert(vehicle);
        self.order.push(id);
        id
    }

    pub fn remove(&mut self, id: VehicleId) {
        self.vehicles.remove(id);
        self.order.retain(|&v| v != id);
    }

    pub fn ids(&self) -> Vec<VehicleId> {
        let mut ids = self.order.clone();
        if self.sorted {
            ids.sort_by(|&a, &b| {
                self.vehicles[a]
                    .pos
                    .partial_cmp(&self.vehicles[b].pos)
                    .expect("vehicle positions are never NaN")
            });
        }
        ids
    }

    pub fn rl_ids(&self) -> Vec<VehicleId> {
        self.order
            .iter()
            .copied()
            .filter(|&id| self.vehicles[id].kind == VehicleKind::Rl)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn num_rl(&self) -> usize {
        self.order
            .iter()
            .filter(|&&id| self.vehicles[id].kind == VehicleKind::Rl)
            .count()
    }

    pub fn get(&self, id: VehicleId) -> &Vehicle {
        &self.vehicles[id]
    }

    pub fn get_mut(&mut self, id: VehicleId) -> &mut Vehicle {
        &mut self.vehicles[id]
    }

    pub fn insertion_order(&self) -> &[VehicleId] {
        &self.order
    }

    pub fn set_sorted(&mut self, sorted: bool) {
        self.sorted = sorted;
    }

    pub fn crashed(&self) -> bool {
        self.crashed
    }

    pub fn mark_crashed(&mut self) {
        self.crashed = true;
    }
}
