//! Active-velocity models, impulses, and velocity helpers for character movement.
#![forbid(unsafe_code)]

use rapier3d::math::Vector;
use rapier3d::na::Rotation3;
use rapier3d::prelude::Real;
use serde::{Deserialize, Serialize};

/// Hard cap on the per-second speed change of the simple model.
pub const MAX_SPEED_CHANGE: Real = 50.0;

const ZERO_DIRECTION_EPSILON: Real = 1.0e-6;
/// Squared-speed floor under which braking snaps to a full stop.
const BRAKE_STOP_SQ: Real = 1.0e-3;
/// Looser floor used when constant deceleration is also pulling the speed down.
const BRAKE_STOP_DECEL_SQ: Real = 1.0e-2;

/// Selects how input becomes active velocity each tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VelocityMode {
    /// Input is applied verbatim, no ramping.
    None,
    /// Linear ramp toward the input at a single configured rate.
    #[default]
    Simple,
    /// Braking / friction / acceleration model.
    Advanced,
}

/// Tuning for the advanced velocity model. Units are per second.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct VelocityConfig {
    pub accel: Real,
    pub decel: Real,
    pub friction: Real,
    pub braking_friction: Real,
}

impl Default for VelocityConfig {
    fn default() -> Self {
        Self {
            accel: 30.0,
            decel: 30.0,
            friction: 8.0,
            braking_friction: 8.0,
        }
    }
}

/// Advances the active velocity one tick under the selected model.
pub fn step_active_velocity(
    mode: VelocityMode,
    velocity: Vector<Real>,
    input_speed: Real,
    input_direction: Vector<Real>,
    speed_change: Real,
    config: &VelocityConfig,
    dt: Real,
) -> Vector<Real> {
    match mode {
        VelocityMode::None => input_direction * input_speed,
        VelocityMode::Simple => {
            simple_velocity(velocity, input_speed, input_direction, speed_change, dt)
        }
        VelocityMode::Advanced => {
            advanced_velocity(velocity, input_speed, input_direction, config, dt)
        }
    }
}

/// Linear ramp toward `speed * direction`, capped at [`MAX_SPEED_CHANGE`].
pub fn simple_velocity(
    velocity: Vector<Real>,
    speed: Real,
    direction: Vector<Real>,
    speed_change: Real,
    dt: Real,
) -> Vector<Real> {
    let max_delta = speed_change.clamp(0.0, MAX_SPEED_CHANGE) * dt;
    move_towards(velocity, direction * speed, max_delta)
}

/// Braking / friction / acceleration model.
///
/// Brakes when there is no acceleration to apply or the current speed exceeds
/// the desired speed; otherwise bends the velocity toward the desired
/// direction with friction, then accelerates and clamps to the desired speed.
pub fn advanced_velocity(
    mut velocity: Vector<Real>,
    desired_speed: Real,
    desired_direction: Vector<Real>,
    config: &VelocityConfig,
    dt: Real,
) -> Vector<Real> {
    let zero_accel =
        config.accel == 0.0 || desired_direction.norm_squared() < ZERO_DIRECTION_EPSILON;
    let over_speed = velocity.norm_squared() > desired_speed * desired_speed;

    if zero_accel || over_speed {
        velocity = apply_velocity_braking(velocity, config.braking_friction, config.decel, dt);
    } else if config.friction > 0.0 {
        let blend = (config.friction * dt).min(1.0);
        velocity -= blend * (velocity - desired_direction * velocity.norm());
    }

    if !zero_accel {
        velocity += desired_direction * (config.accel * dt);
        velocity = clamp_magnitude(velocity, desired_speed);
    }
    velocity
}

/// One braking step: exponential friction plus constant deceleration, with a
/// snap to zero on sign reversal or once the speed is negligible. With both
/// coefficients at zero there is nothing to brake with and the velocity
/// passes through unchanged.
pub fn apply_velocity_braking(
    velocity: Vector<Real>,
    braking_friction: Real,
    decel: Real,
    dt: Real,
) -> Vector<Real> {
    if braking_friction == 0.0 && decel == 0.0 {
        return velocity;
    }
    let speed_sq = velocity.norm_squared();
    if speed_sq < ZERO_DIRECTION_EPSILON {
        return Vector::zeros();
    }

    let direction = velocity / speed_sq.sqrt();
    let braked = velocity + (-braking_friction * velocity - decel * direction) * dt;

    let reversed = braked.dot(&velocity) <= 0.0;
    let stop_sq = if decel != 0.0 {
        BRAKE_STOP_DECEL_SQ
    } else {
        BRAKE_STOP_SQ
    };
    if reversed || braked.norm_squared() <= stop_sq {
        Vector::zeros()
    } else {
        braked
    }
}

/// Moves `from` toward `to` by at most `max_delta`, landing exactly on `to`
/// when within range.
pub fn move_towards(from: Vector<Real>, to: Vector<Real>, max_delta: Real) -> Vector<Real> {
    let delta = to - from;
    let distance = delta.norm();
    if distance <= max_delta || distance < ZERO_DIRECTION_EPSILON {
        to
    } else {
        from + delta * (max_delta / distance)
    }
}

/// Clamps the vector's magnitude to `max`. Non-positive `max` clamps to zero.
pub fn clamp_magnitude(velocity: Vector<Real>, max: Real) -> Vector<Real> {
    if max <= 0.0 {
        return Vector::zeros();
    }
    let norm_sq = velocity.norm_squared();
    if norm_sq > max * max {
        velocity * (max / norm_sq.sqrt())
    } else {
        velocity
    }
}

/// Rotates `velocity` by the rotation taking world-up onto `normal`,
/// preserving its magnitude exactly. Degenerate inputs pass through.
pub fn align_velocity_to_normal(velocity: Vector<Real>, normal: Vector<Real>) -> Vector<Real> {
    let speed = velocity.norm();
    if speed < ZERO_DIRECTION_EPSILON {
        return velocity;
    }
    match Rotation3::rotation_between(&Vector::y(), &normal) {
        Some(rotation) => rotation * (velocity / speed) * speed,
        None => velocity,
    }
}

/// Caller-chosen impulse identity; re-adding the same id restarts the impulse.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ImpulseId(pub u64);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ImpulseSpeedMode {
    /// Contribution is added as-is.
    #[default]
    Unbounded,
    /// Contribution is clamped so active speed plus impulse stays under `max_speed`.
    Max,
}

/// How the contribution evolves over the impulse's duration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ImpulseShape {
    #[default]
    Constant,
    /// Scales linearly from full strength down to zero at expiry.
    LinearDecay,
}

/// A time-bounded velocity contribution layered on top of the active velocity.
#[derive(Clone, Copy, Debug)]
pub struct Impulse {
    pub id: ImpulseId,
    pub velocity: Vector<Real>,
    pub duration: Real,
    pub shape: ImpulseShape,
    pub speed_mode: ImpulseSpeedMode,
    pub max_speed: Real,
    pub align_to_ground: bool,
    elapsed: Real,
}

impl Impulse {
    pub fn new(id: ImpulseId, velocity: Vector<Real>, duration: Real) -> Self {
        Self {
            id,
            velocity,
            duration,
            shape: ImpulseShape::Constant,
            speed_mode: ImpulseSpeedMode::Unbounded,
            max_speed: 0.0,
            align_to_ground: false,
            elapsed: 0.0,
        }
    }

    pub fn with_shape(mut self, shape: ImpulseShape) -> Self {
        self.shape = shape;
        self
    }

    pub fn with_max_speed(mut self, max_speed: Real) -> Self {
        self.speed_mode = ImpulseSpeedMode::Max;
        self.max_speed = max_speed;
        self
    }

    pub fn aligned_to_ground(mut self) -> Self {
        self.align_to_ground = true;
        self
    }

    pub fn restart(&mut self) {
        self.elapsed = 0.0;
    }

    pub fn is_active(&self) -> bool {
        self.elapsed < self.duration
    }

    /// Returns this tick's contribution and advances the impulse's clock.
    pub fn evaluate(&mut self, dt: Real) -> Vector<Real> {
        if !self.is_active() {
            return Vector::zeros();
        }
        let scale = match self.shape {
            ImpulseShape::Constant => 1.0,
            ImpulseShape::LinearDecay => 1.0 - (self.elapsed / self.duration).min(1.0),
        };
        self.elapsed += dt;
        self.velocity * scale
    }
}

/// The mover's bounded set of live impulses.
#[derive(Default)]
pub struct ImpulseSet {
    impulses: Vec<Impulse>,
}

impl ImpulseSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.impulses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.impulses.is_empty()
    }

    /// Adds an impulse; an impulse with the same id is replaced and restarted
    /// rather than duplicated.
    pub fn add(&mut self, mut impulse: Impulse) {
        impulse.restart();
        match self.impulses.iter_mut().find(|i| i.id == impulse.id) {
            Some(existing) => *existing = impulse,
            None => self.impulses.push(impulse),
        }
    }

    pub fn remove(&mut self, id: ImpulseId) {
        self.impulses.retain(|i| i.id != id);
    }

    /// Sums the tick's contributions, applying per-impulse max-speed clamps
    /// (relative to the current active speed) and slope alignment, then drops
    /// impulses that have expired.
    pub fn evaluate(
        &mut self,
        dt: Real,
        active_speed: Real,
        slope_normal: Vector<Real>,
    ) -> Vector<Real> {
        let mut sum = Vector::zeros();
        for impulse in &mut self.impulses {
            let mut contribution = impulse.evaluate(dt);
            if impulse.speed_mode == ImpulseSpeedMode::Max {
                let headroom = (impulse.max_speed - active_speed).max(0.0);
                contribution = clamp_magnitude(contribution, headroom);
            }
            if impulse.align_to_ground {
                contribution = align_velocity_to_normal(contribution, slope_normal);
            }
            sum += contribution;
        }
        self.impulses.retain(|i| i.is_active());
        sum
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rapier3d::prelude::*;

    const DT: Real = 0.02;

    #[test]
    fn simple_model_ramps_to_target() {
        let mut velocity = Vector::zeros();
        let target = vector![4.0, 0.0, 0.0];
        for _ in 0..100 {
            velocity = simple_velocity(velocity, 4.0, vector![1.0, 0.0, 0.0], 30.0, DT);
        }
        assert!((velocity - target).norm() < 1.0e-5);
    }

    #[test]
    fn simple_model_caps_speed_change() {
        let velocity = simple_velocity(
            Vector::zeros(),
            10.0,
            vector![1.0, 0.0, 0.0],
            1000.0,
            DT,
        );
        // Rate is capped at MAX_SPEED_CHANGE, so one tick moves at most 1.0.
        assert!((velocity.x - MAX_SPEED_CHANGE * DT).abs() < 1.0e-6);
    }

    #[test]
    fn braking_converges_to_exact_zero_without_reversal() {
        let mut velocity = vector![5.0, 0.0, 0.0];
        let mut previous_speed = velocity.norm();
        let mut stopped_at = None;
        for tick in 0..400 {
            velocity = apply_velocity_braking(velocity, 2.0, 0.0, DT);
            assert!(velocity.x >= 0.0, "sign reversal at tick {tick}");
            let speed = velocity.norm();
            assert!(speed <= previous_speed, "speed grew at tick {tick}");
            previous_speed = speed;
            if speed == 0.0 {
                stopped_at = Some(tick);
                break;
            }
        }
        assert!(stopped_at.is_some(), "never reached exact zero");
    }

    #[test]
    fn braking_without_coefficients_leaves_velocity_alone() {
        // Even a speed under the stop threshold survives when there is no
        // friction and no deceleration to apply.
        let crawl = vector![0.02, 0.0, 0.0];
        assert_eq!(apply_velocity_braking(crawl, 0.0, 0.0, DT), crawl);
    }

    #[test]
    fn advanced_model_accelerates_and_clamps_to_desired_speed() {
        let config = VelocityConfig::default();
        let mut velocity = Vector::zeros();
        for _ in 0..200 {
            velocity = advanced_velocity(velocity, 6.0, vector![0.0, 0.0, 1.0], &config, DT);
        }
        assert!((velocity.norm() - 6.0).abs() < 1.0e-3);
        assert!(velocity.z > 5.9);
    }

    #[test]
    fn advanced_model_brakes_when_over_speed() {
        let config = VelocityConfig::default();
        let fast = vector![10.0, 0.0, 0.0];
        let next = advanced_velocity(fast, 3.0, vector![1.0, 0.0, 0.0], &config, DT);
        assert!(next.norm() < fast.norm());
    }

    #[test]
    fn none_model_applies_input_verbatim() {
        let config = VelocityConfig::default();
        let velocity = step_active_velocity(
            VelocityMode::None,
            vector![9.0, 0.0, 0.0],
            2.0,
            vector![0.0, 0.0, 1.0],
            30.0,
            &config,
            DT,
        );
        assert_eq!(velocity, vector![0.0, 0.0, 2.0]);
    }

    #[test]
    fn alignment_preserves_speed() {
        let velocity = vector![3.0, 0.0, 4.0];
        let normal = vector![0.6, 0.8, 0.0];
        let aligned = align_velocity_to_normal(velocity, normal);
        assert!((aligned.norm() - velocity.norm()).abs() < 1.0e-4);
        // Aligned velocity lies in the slope plane.
        assert!(aligned.dot(&normal).abs() < 1.0e-4);
    }

    #[test]
    fn alignment_passes_degenerate_inputs_through() {
        assert_eq!(
            align_velocity_to_normal(Vector::zeros(), vector![0.0, 1.0, 0.0]),
            Vector::zeros()
        );
        let velocity = vector![1.0, 2.0, 3.0];
        assert_eq!(align_velocity_to_normal(velocity, Vector::zeros()), velocity);
    }

    #[test]
    fn move_towards_lands_exactly() {
        let from = vector![0.0, 0.0, 0.0];
        let to = vector![0.5, 0.0, 0.0];
        assert_eq!(move_towards(from, to, 1.0), to);
        let partial = move_towards(from, vector![2.0, 0.0, 0.0], 1.0);
        assert!((partial.x - 1.0).abs() < 1.0e-6);
    }

    #[test]
    fn clamp_magnitude_handles_zero_max() {
        assert_eq!(clamp_magnitude(vector![1.0, 2.0, 3.0], 0.0), Vector::zeros());
        let kept = clamp_magnitude(vector![1.0, 0.0, 0.0], 5.0);
        assert_eq!(kept, vector![1.0, 0.0, 0.0]);
    }

    #[test]
    fn readding_an_impulse_restarts_instead_of_duplicating() {
        let mut set = ImpulseSet::new();
        let id = ImpulseId(7);
        set.add(Impulse::new(id, vector![0.0, 5.0, 0.0], 0.5));
        set.evaluate(0.4, 0.0, Vector::y());
        set.add(Impulse::new(id, vector![0.0, 5.0, 0.0], 0.5));
        assert_eq!(set.len(), 1);
        // Restarted clock: still active well past the original expiry.
        set.evaluate(0.4, 0.0, Vector::y());
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn expired_impulses_are_dropped() {
        let mut set = ImpulseSet::new();
        set.add(Impulse::new(ImpulseId(1), vector![2.0, 0.0, 0.0], 0.05));
        let first = set.evaluate(DT, 0.0, Vector::y());
        assert_eq!(first, vector![2.0, 0.0, 0.0]);
        set.evaluate(DT, 0.0, Vector::y());
        set.evaluate(DT, 0.0, Vector::y());
        assert!(set.is_empty());
    }

    #[test]
    fn max_speed_impulse_respects_active_speed() {
        let mut set = ImpulseSet::new();
        set.add(Impulse::new(ImpulseId(2), vector![10.0, 0.0, 0.0], 1.0).with_max_speed(6.0));
        let contribution = set.evaluate(DT, 4.0, Vector::y());
        // Headroom is 6 - 4 = 2.
        assert!((contribution.norm() - 2.0).abs() < 1.0e-5);
    }

    #[test]
    fn linear_decay_impulse_fades() {
        let mut impulse =
            Impulse::new(ImpulseId(3), vector![4.0, 0.0, 0.0], 1.0).with_shape(ImpulseShape::LinearDecay);
        let start = impulse.evaluate(0.5);
        let mid = impulse.evaluate(0.25);
        assert!((start.x - 4.0).abs() < 1.0e-6);
        assert!((mid.x - 2.0).abs() < 1.0e-6);
    }
}
