//! Intelligent-driver-model car following for human vehicles.

/// IDM parameters. `v0` is the free-flow speed, normally wired from the
/// network speed limit.
#[derive(Clone, Debug, PartialEq)]
pub struct IdmParams {
    /// Free-flow (desired) speed, m/s.
    pub v0: f32,
    /// Desired time headway, seconds.
    pub t_headway: f32,
    /// Maximum acceleration, m/s^2.
    pub a: f32,
    /// Comfortable braking deceleration, m/s^2.
    pub b: f32,
    /// Jam distance, meters.
    pub s0: f32,
    /// Acceleration exponent.
    pub delta: f32,
}

impl IdmParams {
    pub fn with_speed_limit(v0: f32) -> Self {
        Self { v0, t_headway: 1.0, a: 1.0, b: 1.5, s0: 2.0, delta: 4.0 }
    }
}

/// Minimum gap fed into the interaction term; below this the model returns
/// an emergency brake instead of dividing by a vanishing gap.
const MIN_GAP: f32 = 0.1;

/// Acceleration of a follower at `speed` behind a leader at `lead_speed`
/// with bumper-to-bumper `gap` meters of free space.
pub fn idm_accel(speed: f32, lead_speed: f32, gap: f32, p: &IdmParams) -> f32 {
    if gap < MIN_GAP {
        return -p.b * 4.0;
    }
    let s_star =
        p.s0 + (speed * p.t_headway + speed * (speed - lead_speed) / (2.0 * (p.a * p.b).sqrt())).max(0.0);
    p.a * (1.0 - (speed / p.v0).powf(p.delta) - (s_star / gap).powi(2))
}

/// Acceleration on an empty road ahead (no interaction term).
pub fn idm_free_accel(speed: f32, p: &IdmParams) -> f32 {
    p.a * (1.0 - (speed / p.v0).powf(p.delta))
}
