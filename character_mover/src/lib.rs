//! Floating-capsule character mover: per-tick velocity composition over rapier.
#![forbid(unsafe_code)]

use character_motor::{
    align_velocity_to_normal, step_active_velocity, Impulse, ImpulseId, ImpulseSet, VelocityConfig,
    VelocityMode,
};
use character_sense::{
    evaluate_contacts, find_step, ContactSummary, GroundInfo, GroundSensor, SlopeEstimator,
    SlopeProbeConfig, StepSearchConfig,
};
use physics_rapier::{ContactSample, PhysicsWorld};
use rapier3d::math::{Point, Vector};
use rapier3d::prelude::{
    ColliderBuilder, ColliderHandle, Group, InteractionGroups, QueryFilter, Real,
    RigidBodyBuilder, RigidBodyHandle,
};
use serde::{Deserialize, Serialize};

const ZERO_DIRECTION_EPSILON: Real = 1.0e-6;

/// Full tuning surface of a character mover. Loadable from TOML.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MoverConfig {
    /// Total character height, feet to head, including the step clearance.
    pub height: Real,
    /// Character diameter.
    pub thickness: Real,
    pub velocity_mode: VelocityMode,
    /// Ramp rate of the simple velocity model, units per second.
    pub speed_change: Real,
    /// Writes the floating correction into the body velocity when set.
    pub snap_to_ground: bool,
    /// Zeroes horizontal velocity when a tick would leave the ground.
    pub restrict_to_ground: bool,
    /// Recomputes the floating correction against the post-move position.
    pub predictive_ground_step: bool,
    /// Degrees from vertical up to which a contact still counts as ground.
    pub ground_angle_limit: Real,
    /// Degrees from vertical up to which ground also counts as flat.
    pub flat_ground_angle_limit: Real,
    /// Probe distance past the desired ground distance.
    pub ground_probe_range: Real,
    /// Probe sphere diameter; zero or less casts a ray instead.
    pub ground_probe_thickness: Real,
    /// Slack factor on the desired ground distance before contact is lost.
    pub ground_tolerance_factor: Real,
    /// Floor of the extra threshold granted while grounded.
    pub min_extra_ground_threshold: Real,
    pub use_real_ground_normal: bool,
    /// Tallest ledge the mover floats over.
    pub step_height: Real,
    /// Horizontal nudge past a found step edge.
    pub step_up_overshoot: Real,
    /// Smoothing divisors for upward/downward float correction, in ticks.
    pub step_up_smooth: Real,
    pub step_down_smooth: Real,
    pub slope_probing: bool,
    pub slope_front_offset: Real,
    pub slope_front_count: u32,
    pub slope_back_offset: Real,
    pub slope_back_count: u32,
    /// Ground probe interaction groups as (memberships, filter) bits.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ground_filter_groups: Option<[u32; 2]>,
    pub velocity_config: VelocityConfig,
}

impl Default for MoverConfig {
    fn default() -> Self {
        Self {
            height: 2.0,
            thickness: 1.0,
            velocity_mode: VelocityMode::Simple,
            speed_change: 30.0,
            snap_to_ground: true,
            restrict_to_ground: false,
            predictive_ground_step: false,
            ground_angle_limit: 90.0,
            flat_ground_angle_limit: 70.0,
            ground_probe_range: 10.0,
            ground_probe_thickness: 0.1,
            ground_tolerance_factor: 0.1,
            min_extra_ground_threshold: 0.25,
            use_real_ground_normal: true,
            step_height: 0.3,
            step_up_overshoot: 0.01,
            step_up_smooth: 10.0,
            step_down_smooth: 10.0,
            slope_probing: true,
            slope_front_offset: 1.0,
            slope_front_count: 2,
            slope_back_offset: 1.0,
            slope_back_count: 2,
            ground_filter_groups: None,
            velocity_config: VelocityConfig::default(),
        }
    }
}

impl MoverConfig {
    pub fn parse_toml(text: &str) -> Result<Self, String> {
        let config: Self = toml::from_str(text).map_err(|e| e.to_string())?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, String> {
        toml::to_string_pretty(self).map_err(|e| e.to_string())
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.height <= 0.0 || self.thickness <= 0.0 {
            return Err(format!(
                "capsule dimensions must be positive (height {}, thickness {})",
                self.height, self.thickness
            ));
        }
        if self.step_height < 0.0 || self.step_height >= self.height {
            return Err(format!(
                "step_height {} must be in [0, height {})",
                self.step_height, self.height
            ));
        }
        if self.step_up_smooth < 1.0 || self.step_down_smooth < 1.0 {
            return Err("step smoothing divisors must be at least 1".into());
        }
        if self.ground_angle_limit <= 0.0 || self.ground_angle_limit > 180.0 {
            return Err(format!(
                "ground_angle_limit {} out of (0, 180]",
                self.ground_angle_limit
            ));
        }
        if self.ground_tolerance_factor < 0.0 {
            return Err("ground_tolerance_factor must not be negative".into());
        }
        Ok(())
    }

    /// Collider height; the step clearance below it is kept free.
    pub fn capsule_height(&self) -> Real {
        self.height - self.step_height
    }

    pub fn capsule_half_height(&self) -> Real {
        self.capsule_height() / 2.0
    }

    /// Radius limited so the capsule never becomes wider than tall.
    pub fn capsule_radius(&self) -> Real {
        (self.thickness / 2.0).min(self.capsule_half_height())
    }

    /// Capsule centre above the character origin (the feet).
    pub fn capsule_center_offset(&self) -> Real {
        (self.height + self.step_height) / 2.0
    }

    pub fn min_ground_dot(&self) -> Real {
        self.ground_angle_limit.to_radians().cos()
    }

    pub fn min_flat_ground_dot(&self) -> Real {
        self.flat_ground_angle_limit.to_radians().cos()
    }

    /// Capsule-centre-to-ground distance held by the float correction,
    /// widened by the tolerance factor before contact counts as lost.
    pub fn desired_ground_distance(&self) -> Real {
        (self.capsule_half_height() + self.step_height) * (1.0 + self.ground_tolerance_factor)
    }

    /// Extra threshold granted while grounded, so stairs and downhill slopes
    /// do not flicker the ground state.
    pub fn extra_ground_threshold(&self) -> Real {
        self.step_height.max(self.min_extra_ground_threshold)
    }

    pub fn total_probe_range(&self) -> Real {
        self.desired_ground_distance() + self.ground_probe_range
    }

    fn slope_probe_config(&self) -> SlopeProbeConfig {
        SlopeProbeConfig {
            front_offset: self.slope_front_offset,
            front_count: self.slope_front_count,
            back_offset: self.slope_back_offset,
            back_count: self.slope_back_count,
        }
    }

    fn step_search_config(&self) -> StepSearchConfig {
        StepSearchConfig {
            step_height: self.step_height,
            overshoot: self.step_up_overshoot,
            min_ground_dot: self.min_ground_dot(),
        }
    }
}

/// Ground-contact transition reported by a tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GroundEvent {
    Gained,
    Lost,
}

/// Per-tick output of [`CharacterMover::tick`].
#[derive(Clone, Copy, Debug)]
pub struct MoverFrame {
    /// The velocity written to the body this tick, float correction included.
    pub velocity: Vector<Real>,
    pub is_on_ground: bool,
    pub is_on_flat_ground: bool,
    pub ground_normal: Vector<Real>,
    pub slope_normal: Vector<Real>,
    /// At most one transition per tick, never both.
    pub ground_event: Option<GroundEvent>,
}

#[derive(Clone, Copy, Debug)]
struct DirectMove {
    velocity: Vector<Real>,
    restrict_to_ground: bool,
    ignore_connected_ground: bool,
}

/// Mover state that persists across ticks.
#[derive(Clone, Debug)]
pub struct CharacterState {
    pub is_on_ground: bool,
    pub was_on_ground: bool,
    pub is_on_flat_ground: bool,
    pub ground_normal: Vector<Real>,
    pub slope_normal: Vector<Real>,
    pub ground_point: Point<Real>,
    pub ground_distance: Real,
    pub ground_collider: Option<ColliderHandle>,
    pub active_velocity: Vector<Real>,
    /// Last nonzero normalized active direction, orients slope probing.
    pub nonzero_active_direction: Vector<Real>,
    pub connected_body_velocity: Vector<Real>,
    pub ground_step_velocity: Vector<Real>,
    /// Velocity written to the body on the previous tick.
    pub last_velocity: Vector<Real>,
}

impl Default for CharacterState {
    fn default() -> Self {
        Self {
            is_on_ground: false,
            was_on_ground: false,
            is_on_flat_ground: false,
            ground_normal: Vector::y(),
            slope_normal: Vector::y(),
            ground_point: Point::origin(),
            ground_distance: 0.0,
            ground_collider: None,
            active_velocity: Vector::zeros(),
            nonzero_active_direction: Vector::zeros(),
            connected_body_velocity: Vector::zeros(),
            ground_step_velocity: Vector::zeros(),
            last_velocity: Vector::zeros(),
        }
    }
}

/// A floating capsule character driven by one velocity write per fixed tick.
///
/// Owns its rigid body and capsule collider; gameplay code feeds it input
/// through [`input_move`](Self::input_move) and friends, then calls
/// [`tick`](Self::tick) once per fixed step before the world steps.
pub struct CharacterMover {
    config: MoverConfig,
    body: RigidBodyHandle,
    collider: ColliderHandle,
    sensor: GroundSensor,
    slope_estimator: SlopeEstimator,
    impulses: ImpulseSet,
    state: CharacterState,
    contacts: Vec<ContactSample>,
    // One-tick inputs, cleared at the end of every tick.
    input_speed: Real,
    input_direction: Vector<Real>,
    extra_velocity: Vector<Real>,
    direct_move: Option<DirectMove>,
    // Surface-follow tracking for moving ground.
    connected_surface_position: Option<Vector<Real>>,
    extra_threshold_enabled: bool,
}

impl CharacterMover {
    /// Inserts the character's body and capsule at `position` (the feet) and
    /// returns the mover. Fails when the configuration is invalid.
    pub fn spawn(
        world: &mut PhysicsWorld,
        config: MoverConfig,
        position: Vector<Real>,
    ) -> Result<Self, String> {
        config.validate()?;

        let body = world.insert_body(
            RigidBodyBuilder::dynamic()
                .translation(position)
                .gravity_scale(0.0)
                .lock_rotations()
                .ccd_enabled(true)
                .can_sleep(false)
                .build(),
        );
        let radius = config.capsule_radius();
        let half_cylinder = (config.capsule_half_height() - radius).max(0.0);
        let collider = world.attach_collider(
            ColliderBuilder::capsule_y(half_cylinder, radius)
                .translation(Vector::new(0.0, config.capsule_center_offset(), 0.0))
                .build(),
            body,
        );

        let mut sensor = GroundSensor::new(config.desired_ground_distance());
        sensor.use_real_ground_normal = config.use_real_ground_normal;

        Ok(Self {
            config,
            body,
            collider,
            sensor,
            slope_estimator: SlopeEstimator::new(),
            impulses: ImpulseSet::new(),
            state: CharacterState::default(),
            contacts: Vec::new(),
            input_speed: 0.0,
            input_direction: Vector::zeros(),
            extra_velocity: Vector::zeros(),
            direct_move: None,
            connected_surface_position: None,
            extra_threshold_enabled: false,
        })
    }

    /// Sets this tick's input target for the active-velocity model.
    pub fn input_move(&mut self, speed: Real, direction: Vector<Real>) {
        self.input_speed = speed;
        self.input_direction = direction;
    }

    /// One-tick additive velocity contribution.
    pub fn set_extra_velocity(&mut self, velocity: Vector<Real>) {
        self.extra_velocity = velocity;
    }

    /// One-tick override bypassing the active-velocity model. Connected-body
    /// velocity still applies unless `ignore_connected_ground` is set;
    /// `restrict_to_ground` requests edge restriction for this tick only.
    pub fn direct_move(
        &mut self,
        velocity: Vector<Real>,
        restrict_to_ground: bool,
        ignore_connected_ground: bool,
    ) {
        self.direct_move = Some(DirectMove {
            velocity,
            restrict_to_ground,
            ignore_connected_ground,
        });
    }

    pub fn add_impulse(&mut self, impulse: Impulse) {
        self.impulses.add(impulse);
    }

    pub fn remove_impulse(&mut self, id: ImpulseId) {
        self.impulses.remove(id);
    }

    pub fn impulse_count(&self) -> usize {
        self.impulses.len()
    }

    pub fn is_on_ground(&self) -> bool {
        self.state.is_on_ground
    }

    pub fn is_on_flat_ground(&self) -> bool {
        self.state.is_on_flat_ground
    }

    pub fn ground_normal(&self) -> Vector<Real> {
        self.state.ground_normal
    }

    pub fn slope_normal(&self) -> Vector<Real> {
        self.state.slope_normal
    }

    pub fn ground_point(&self) -> Point<Real> {
        self.state.ground_point
    }

    pub fn state(&self) -> &CharacterState {
        &self.state
    }

    pub fn config(&self) -> &MoverConfig {
        &self.config
    }

    pub fn body(&self) -> RigidBodyHandle {
        self.body
    }

    pub fn collider(&self) -> ColliderHandle {
        self.collider
    }

    /// Current body velocity as the physics world sees it.
    pub fn velocity(&self, world: &PhysicsWorld) -> Vector<Real> {
        world.body_linvel(self.body).unwrap_or_else(Vector::zeros)
    }

    fn query_filter(&self) -> QueryFilter<'static> {
        let mut filter = QueryFilter::default().exclude_rigid_body(self.body);
        if let Some([memberships, filter_bits]) = self.config.ground_filter_groups {
            filter = filter.groups(InteractionGroups::new(
                Group::from_bits_truncate(memberships),
                Group::from_bits_truncate(filter_bits),
            ));
        }
        filter
    }

    fn capsule_center(&self, world: &PhysicsWorld) -> Point<Real> {
        let center = world
            .collider_translation(self.collider)
            .unwrap_or_else(Vector::zeros);
        Point::from(center)
    }

    fn probe_ground(&mut self, world: &PhysicsWorld, origin: Point<Real>) -> GroundInfo {
        self.sensor.threshold_distance = self.config.desired_ground_distance()
            + if self.extra_threshold_enabled {
                self.config.extra_ground_threshold()
            } else {
                0.0
            };
        self.sensor.probe(
            world,
            origin,
            self.config.total_probe_range(),
            self.config.ground_probe_thickness,
            self.query_filter(),
        )
    }

    /// Tracks the ground surface's own motion. A changed collider is a new
    /// connection and resets tracking; a continued one yields the surface
    /// velocity from its position delta.
    fn update_connection(&mut self, world: &PhysicsWorld, info: &GroundInfo, dt: Real) {
        let Some(surface) = info.collider.filter(|_| info.is_on_ground) else {
            self.state.ground_collider = None;
            self.state.connected_body_velocity = Vector::zeros();
            self.connected_surface_position = None;
            return;
        };
        let Some(current) = world.collider_translation(surface) else {
            self.state.ground_collider = None;
            self.state.connected_body_velocity = Vector::zeros();
            self.connected_surface_position = None;
            return;
        };

        if self.state.ground_collider == Some(surface) {
            if let Some(previous) = self.connected_surface_position {
                self.state.connected_body_velocity = (current - previous) / dt;
            }
        } else {
            self.state.ground_collider = Some(surface);
            self.state.connected_body_velocity = Vector::zeros();
        }
        self.connected_surface_position = Some(current);
    }

    fn step_correction(&self, required_delta: Real, snap: bool, dt: Real) -> Real {
        if snap {
            required_delta / dt
        } else {
            let smooth = if required_delta > 0.0 {
                self.config.step_up_smooth
            } else {
                self.config.step_down_smooth
            };
            required_delta / (dt * smooth)
        }
    }

    fn required_ground_delta(&self, measured_distance: Real, dt: Real) -> Real {
        let connected_dy = self.state.connected_body_velocity.y * dt;
        (self.config.capsule_half_height() + self.config.step_height + connected_dy)
            - measured_distance
    }

    /// Runs one fixed-tick update and writes the resulting velocity to the
    /// body. Call once per fixed step, before stepping the world.
    pub fn tick(&mut self, world: &mut PhysicsWorld, dt: Real) -> MoverFrame {
        // 1. Classify the contacts gathered since the last step.
        self.contacts.clear();
        world.gather_contacts(self.collider, &mut self.contacts);
        let summary: ContactSummary = evaluate_contacts(
            &self.contacts,
            self.config.min_ground_dot(),
            self.config.min_flat_ground_dot(),
        );

        // 2. Probe the ground and track the connected surface.
        let origin = self.capsule_center(world);
        let info = self.probe_ground(world, origin);
        self.update_connection(world, &info, dt);

        self.state.is_on_ground = info.is_on_ground;
        self.state.is_on_flat_ground = info.is_on_ground && summary.touching_flat_ground;
        self.state.ground_normal = if info.is_on_ground {
            info.normal
        } else {
            Vector::y()
        };
        self.state.ground_point = info.point;
        self.state.ground_distance = info.distance;

        // 3. Ground-state transition, at most one event per tick.
        let ground_state_changed = self.state.is_on_ground != self.state.was_on_ground;
        let ground_event = if !ground_state_changed {
            None
        } else if self.state.is_on_ground {
            self.extra_threshold_enabled = true;
            Some(GroundEvent::Gained)
        } else {
            self.extra_threshold_enabled = false;
            Some(GroundEvent::Lost)
        };

        // 4. Floating correction, snapped on transitions and ceiling contact.
        self.state.ground_step_velocity = Vector::zeros();
        if self.state.is_on_ground {
            let required_delta = self.required_ground_delta(info.distance, dt);
            let snap = ground_state_changed || summary.touching_ceiling;
            self.state.ground_step_velocity.y = self.step_correction(required_delta, snap, dt);

            // 5. Step resolution against wall-like contacts.
            if summary.touching_ground {
                if let Some(offset) = find_step(
                    world,
                    &self.contacts,
                    summary.ground_height,
                    &self.config.step_search_config(),
                ) {
                    self.state.ground_step_velocity +=
                        offset / (dt * self.config.step_up_smooth);
                }
            }
        }

        // 6. Active velocity and the direction that orients slope probes.
        self.state.active_velocity = step_active_velocity(
            self.config.velocity_mode,
            self.state.active_velocity,
            self.input_speed,
            self.input_direction,
            self.config.speed_change,
            &self.config.velocity_config,
            dt,
        );
        if let Some(direction) = self
            .state
            .active_velocity
            .try_normalize(ZERO_DIRECTION_EPSILON)
        {
            self.state.nonzero_active_direction = direction;
        }

        // 7. Slope estimation and speed-preserving alignment.
        self.state.slope_normal = Vector::y();
        let mut aligned_active = self.state.active_velocity;
        if self.state.is_on_ground {
            let filter = self.query_filter();
            self.state.slope_normal = if self.config.slope_probing {
                self.slope_estimator
                    .probe(
                        world,
                        &self.config.slope_probe_config(),
                        info.point,
                        self.state.nonzero_active_direction,
                        origin.y + self.config.capsule_half_height(),
                        self.sensor.threshold_distance + self.config.capsule_half_height(),
                        self.config.step_height,
                        filter,
                    )
                    .unwrap_or(self.state.ground_normal)
            } else {
                self.state.ground_normal
            };
            aligned_active =
                align_velocity_to_normal(self.state.active_velocity, self.state.slope_normal);
        }

        // 8. Impulses, clamped against the active speed where requested.
        let impulse_sum = self.impulses.evaluate(
            dt,
            self.state.active_velocity.norm(),
            self.state.slope_normal,
        );

        // 9. Final velocity: direct override or composed sum, never both.
        let (mut final_velocity, restrict) = match self.direct_move {
            Some(direct) => {
                let connected = if direct.ignore_connected_ground {
                    Vector::zeros()
                } else {
                    self.state.connected_body_velocity
                };
                (
                    direct.velocity + connected,
                    self.config.restrict_to_ground || direct.restrict_to_ground,
                )
            }
            None => (
                self.state.connected_body_velocity
                    + aligned_active
                    + self.extra_velocity
                    + impulse_sum,
                self.config.restrict_to_ground,
            ),
        };

        // 10. Predictive probe at the post-move position.
        if self.state.is_on_ground && (self.config.predictive_ground_step || restrict) {
            let predicted = self.probe_ground(world, origin + final_velocity * dt);
            if restrict && !predicted.is_on_ground {
                final_velocity.x = 0.0;
                final_velocity.z = 0.0;
            } else if self.config.predictive_ground_step && predicted.is_on_ground {
                let required_delta = self.required_ground_delta(predicted.distance, dt);
                let snap = ground_state_changed || summary.touching_ceiling;
                self.state.ground_step_velocity.y =
                    self.step_correction(required_delta, snap, dt);
            }
        }

        // 11. Single velocity write, then clear the one-tick inputs.
        let written = if self.config.snap_to_ground {
            final_velocity + self.state.ground_step_velocity
        } else {
            final_velocity
        };
        world.set_body_linvel(self.body, written);

        self.input_speed = 0.0;
        self.input_direction = Vector::zeros();
        self.extra_velocity = Vector::zeros();
        self.direct_move = None;
        self.state.was_on_ground = self.state.is_on_ground;
        self.state.last_velocity = written;

        MoverFrame {
            velocity: written,
            is_on_ground: self.state.is_on_ground,
            is_on_flat_ground: self.state.is_on_flat_ground,
            ground_normal: self.state.ground_normal,
            slope_normal: self.state.slope_normal,
            ground_event,
        }
    }
}
