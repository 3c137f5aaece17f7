//! Typed simulation and environment parameters.
//!
//! Everything the environments dereference is a named, typed field with its
//! defaulting and failure rules fixed at construction time, rather than an
//! open string-keyed mapping. The string-keyed form (`KwArgs`) only appears
//! at the registry boundary, where ids are instantiated from user-supplied
//! key-value pairs; parsing fails eagerly there, not at first use.
//!
//! Parameters are read-only for the lifetime of an episode.

use std::collections::HashMap;

use crate::core::{Result, TrafficError};

/// Key-value arguments accepted by the registry when constructing an
/// environment by id.
pub type KwArgs = HashMap<String, String>;

fn parse_f32(kwargs: &KwArgs, key: &str) -> Result<Option<f32>> {
    match kwargs.get(key) {
        None => Ok(None),
        Some(raw) => {
            let v: f32 = raw.parse().map_err(|_| TrafficError::InvalidParam {
                name: key.to_string(),
                reason: format!("not a number: {raw:?}"),
            })?;
            if v.is_nan() {
                return Err(TrafficError::InvalidParam {
                    name: key.to_string(),
                    reason: "NaN".to_string(),
                });
            }
            Ok(Some(v))
        }
    }
}

fn require_f32(kwargs: &KwArgs, key: &str) -> Result<f32> {
    parse_f32(kwargs, key)?.ok_or_else(|| TrafficError::MissingParam(key.to_string()))
}

fn parse_u32(kwargs: &KwArgs, key: &str) -> Result<Option<u32>> {
    match kwargs.get(key) {
        None => Ok(None),
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| TrafficError::InvalidParam {
                name: key.to_string(),
                reason: format!("not a non-negative integer: {raw:?}"),
            }),
    }
}

fn parse_bool(kwargs: &KwArgs, key: &str) -> Result<Option<bool>> {
    match kwargs.get(key) {
        None => Ok(None),
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| TrafficError::InvalidParam {
                name: key.to_string(),
                reason: format!("not a bool: {raw:?}"),
            }),
    }
}

fn positive(name: &str, v: f32) -> Result<f32> {
    if v.is_finite() && v > 0.0 {
        Ok(v)
    } else {
        Err(TrafficError::InvalidParam {
            name: name.to_string(),
            reason: format!("must be finite and positive, got {v}"),
        })
    }
}

/// Simulator-level parameters: integration step and base seed.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SimParams {
    /// Seconds of simulated time per kernel advance.
    pub sim_step: f32,
    /// Base seed for the kernel's RNG stream; `None` derives one at reset.
    pub seed: Option<u64>,
}

impl Default for SimParams {
    fn default() -> Self {
        Self { sim_step: 0.1, seed: None }
    }
}

impl SimParams {
    pub fn from_kwargs(kwargs: &KwArgs) -> Result<Self> {
        let mut p = Self::default();
        if let Some(v) = parse_f32(kwargs, "sim_step")? {
            p.sim_step = v;
        }
        if let Some(v) = parse_u32(kwargs, "seed")? {
            p.seed = Some(v as u64);
        }
        p.validate()?;
        Ok(p)
    }

    pub fn validate(&self) -> Result<()> {
        positive("sim_step", self.sim_step)?;
        Ok(())
    }
}

/// Episode-level parameters enforced by the episode driver.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EnvParams {
    /// Steps per episode before truncation.
    pub horizon: u32,
    /// Kernel advances run at reset, before the first observation.
    pub warmup_steps: u32,
    /// Kernel advances per environment step.
    pub sims_per_step: u32,
    /// Return vehicle ids sorted by absolute position instead of insertion
    /// order.
    pub sort_vehicles: bool,
}

impl Default for EnvParams {
    fn default() -> Self {
        Self { horizon: 500, warmup_steps: 50, sims_per_step: 1, sort_vehicles: false }
    }
}

impl EnvParams {
    pub fn from_kwargs(kwargs: &KwArgs) -> Result<Self> {
        let mut p = Self::default();
        if let Some(v) = parse_u32(kwargs, "horizon")? {
            p.horizon = v;
        }
        if let Some(v) = parse_u32(kwargs, "warmup_steps")? {
            p.warmup_steps = v;
        }
        if let Some(v) = parse_u32(kwargs, "sims_per_step")? {
            p.sims_per_step = v;
        }
        if let Some(v) = parse_bool(kwargs, "sort_vehicles")? {
            p.sort_vehicles = v;
        }
        p.validate()?;
        Ok(p)
    }

    pub fn validate(&self) -> Result<()> {
        if self.horizon == 0 {
            return Err(TrafficError::InvalidParam {
                name: "horizon".into(),
                reason: "must be at least 1".into(),
            });
        }
        if self.sims_per_step == 0 {
            return Err(TrafficError::InvalidParam {
                name: "sims_per_step".into(),
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }
}

/// The named numeric parameters the environment adapters dereference.
///
/// `max_decel` is interpreted as a magnitude: `3.0` and `-3.0` yield the
/// same action-space lower bound of `-3.0`.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VehicleEnvParams {
    /// Upper bound on commanded acceleration, m/s^2.
    pub max_accel: f32,
    /// Magnitude of the largest commanded deceleration, m/s^2.
    pub max_decel: f32,
    /// Speed the desired-velocity reward drives vehicles toward, m/s.
    pub target_velocity: f32,
}

impl Default for VehicleEnvParams {
    fn default() -> Self {
        Self { max_accel: 3.0, max_decel: 3.0, target_velocity: 30.0 }
    }
}

impl VehicleEnvParams {
    /// Parse from kwargs. `max_accel` and `max_decel` are required;
    /// `target_velocity` defaults to 30 m/s.
    pub fn from_kwargs(kwargs: &KwArgs) -> Result<Self> {
        let max_accel = require_f32(kwargs, "max_accel")?;
        let max_decel = require_f32(kwargs, "max_decel")?;
        let target_velocity =
            parse_f32(kwargs, "target_velocity")?.unwrap_or(Self::default().target_velocity);
        let p = Self { max_accel, max_decel, target_velocity };
        p.validate()?;
        Ok(p)
    }

    pub fn validate(&self) -> Result<()> {
        positive("max_accel", self.max_accel)?;
        positive("max_decel", self.max_decel.abs())?;
        positive("target_velocity", self.target_velocity)?;
        Ok(())
    }
}

/// Closed single-lane loop.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RingParams {
    /// Loop circumference, meters.
    pub length: f32,
    /// Total vehicles placed at reset.
    pub num_vehicles: u32,
    /// How many of those are policy-controlled.
    pub num_rl_vehicles: u32,
    /// Speed cap for every vehicle, m/s.
    pub speed_limit: f32,
}

impl Default for RingParams {
    fn default() -> Self {
        Self { length: 230.0, num_vehicles: 22, num_rl_vehicles: 1, speed_limit: 30.0 }
    }
}

impl RingParams {
    pub fn from_kwargs(kwargs: &KwArgs) -> Result<Self> {
        let mut p = Self::default();
        if let Some(v) = parse_f32(kwargs, "length")? {
            p.length = v;
        }
        if let Some(v) = parse_u32(kwargs, "num_vehicles")? {
            p.num_vehicles = v;
        }
        if let Some(v) = parse_u32(kwargs, "num_rl_vehicles")? {
            p.num_rl_vehicles = v;
        }
        if let Some(v) = parse_f32(kwargs, "speed_limit")? {
            p.speed_limit = v;
        }
        p.validate()?;
        Ok(p)
    }

    pub fn validate(&self) -> Result<()> {
        positive("length", self.length)?;
        positive("speed_limit", self.speed_limit)?;
        if self.num_vehicles == 0 {
            return Err(TrafficError::InvalidParam {
                name: "num_vehicles".into(),
                reason: "ring must hold at least one vehicle".into(),
            });
        }
        if self.num_rl_vehicles > self.num_vehicles {
            return Err(TrafficError::InvalidParam {
                name: "num_rl_vehicles".into(),
                reason: format!(
                    "{} exceeds num_vehicles = {}",
                    self.num_rl_vehicles, self.num_vehicles
                ),
            });
        }
        let occupied = self.num_vehicles as f32 * crate::sim::VEHICLE_LENGTH;
        if occupied >= self.length {
            return Err(TrafficError::InvalidParam {
                name: "num_vehicles".into(),
                reason: format!(
                    "{} vehicles occupy {occupied} m, more than the {} m loop",
                    self.num_vehicles, self.length
                ),
            });
        }
        Ok(())
    }
}

/// Stochastic vehicle arrivals at the entry of an open road.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InflowParams {
    /// Mean arrival rate.
    pub vehs_per_hour: f32,
    /// Speed vehicles enter with, m/s.
    pub enter_speed: f32,
    /// Every `rl_period`-th inserted vehicle is policy-controlled;
    /// 0 disables RL insertions.
    pub rl_period: u32,
}

impl Default for InflowParams {
    fn default() -> Self {
        Self { vehs_per_hour: 600.0, enter_speed: 10.0, rl_period: 5 }
    }
}

impl InflowParams {
    pub fn from_kwargs(kwargs: &KwArgs) -> Result<Self> {
        let mut p = Self::default();
        if let Some(v) = parse_f32(kwargs, "vehs_per_hour")? {
            p.vehs_per_hour = v;
        }
        if let Some(v) = parse_f32(kwargs, "enter_speed")? {
            p.enter_speed = v;
        }
        if let Some(v) = parse_u32(kwargs, "rl_period")? {
            p.rl_period = v;
        }
        p.validate()?;
        Ok(p)
    }

    pub fn validate(&self) -> Result<()> {
        positive("vehs_per_hour", self.vehs_per_hour)?;
        if !self.enter_speed.is_finite() || self.enter_speed < 0.0 {
            return Err(TrafficError::InvalidParam {
                name: "enter_speed".into(),
                reason: format!("must be finite and non-negative, got {}", self.enter_speed),
            });
        }
        Ok(())
    }
}

/// Finite single-lane segment fed by an inflow; vehicles leave at the far
/// end, so the vehicle count varies over an episode.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OpenRoadParams {
    /// Segment length, meters.
    pub length: f32,
    /// Speed cap for every vehicle, m/s.
    pub speed_limit: f32,
    pub inflow: InflowParams,
}

impl Default for OpenRoadParams {
    fn default() -> Self {
        Self { length: 500.0, speed_limit: 30.0, inflow: InflowParams::default() }
    }
}

impl OpenRoadParams {
    pub fn from_kwargs(kwargs: &KwArgs) -> Result<Self> {
        let mut p = Self::default();
        if let Some(v) = parse_f32(kwargs, "length")? {
            p.length = v;
        }
        if let Some(v) = parse_f32(kwargs, "speed_limit")? {
            p.speed_limit = v;
        }
        p.inflow = InflowParams::from_kwargs(kwargs)?;
        p.validate()?;
        Ok(p)
    }

    pub fn validate(&self) -> Result<()> {
        positive("length", self.length)?;
        positive("speed_limit", self.speed_limit)?;
        self.inflow.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kwargs(pairs: &[(&str, &str)]) -> KwArgs {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn vehicle_params_require_bounds() {
        let err = VehicleEnvParams::from_kwargs(&kwargs(&[("max_accel", "3.0")])).unwrap_err();
        assert!(matches!(err, TrafficError::MissingParam(k) if k == "max_decel"));

        let err = VehicleEnvParams::from_kwargs(&KwArgs::new()).unwrap_err();
        assert!(matches!(err, TrafficError::MissingParam(k) if k == "max_accel"));
    }

    #[test]
    fn vehicle_params_parse_and_default_target_velocity() {
        let p = VehicleEnvParams::from_kwargs(&kwargs(&[
            ("max_accel", "1.5"),
            ("max_decel", "-2.5"),
        ]))
        .unwrap();
        assert_eq!(p.max_accel, 1.5);
        assert_eq!(p.max_decel, -2.5);
        assert_eq!(p.target_velocity, 30.0);
    }

    #[test]
    fn garbage_values_are_invalid_not_missing() {
        let err =
            VehicleEnvParams::from_kwargs(&kwargs(&[("max_accel", "fast"), ("max_decel", "3")]))
                .unwrap_err();
        assert!(matches!(err, TrafficError::InvalidParam { name, .. } if name == "max_accel"));
    }

    #[test]
    fn env_params_defaults_and_overrides() {
        let p = EnvParams::from_kwargs(&kwargs(&[("horizon", "100"), ("sort_vehicles", "true")]))
            .unwrap();
        assert_eq!(p.horizon, 100);
        assert_eq!(p.warmup_steps, 50);
        assert!(p.sort_vehicles);

        assert!(EnvParams::from_kwargs(&kwargs(&[("horizon", "0")])).is_err());
    }

    #[test]
    fn ring_rejects_overfull_loop() {
        let p = RingParams { length: 50.0, num_vehicles: 22, ..RingParams::default() };
        assert!(p.validate().is_err());
    }

    #[test]
    fn sim_step_must_be_positive() {
        assert!(SimParams::from_kwargs(&kwargs(&[("sim_step", "0")])).is_err());
        assert!(SimParams::from_kwargs(&kwargs(&[("sim_step", "0.5")])).is_ok());
    }
}
