//! Ground, slope, and step sensing for floating capsule movers.
#![forbid(unsafe_code)]

use physics_rapier::{ContactSample, PhysicsWorld};
use rapier3d::math::{Point, Vector};
use rapier3d::prelude::{ColliderHandle, QueryFilter, Real};

/// Margin added to the ground-angle dot when classifying contacts.
pub const GROUND_DOT_EPSILON: Real = 0.001;
/// Lift above a sphere-cast hit before re-probing for the true surface normal.
const REAL_NORMAL_PROBE_LIFT: Real = 0.01;
const REAL_NORMAL_PROBE_RANGE: Real = 0.1;
/// Clearance above the step top when searching for a steppable ledge.
const STEP_PROBE_CLEARANCE: Real = 0.01;
/// Tiny vertical offset applied to a found step point.
const STEP_POINT_LIFT: Real = 1.0e-4;

const SLOPE_NORMAL_EPSILON: Real = 1.0e-6;

/// Result of one downward ground probe. Valid for a single tick.
#[derive(Clone, Copy, Debug)]
pub struct GroundInfo {
    pub is_on_ground: bool,
    pub normal: Vector<Real>,
    pub point: Point<Real>,
    /// Vertical clearance from the probe origin down to the surface.
    pub distance: Real,
    pub collider: Option<ColliderHandle>,
}

impl GroundInfo {
    pub fn none() -> Self {
        Self {
            is_on_ground: false,
            normal: Vector::y(),
            point: Point::origin(),
            distance: 0.0,
            collider: None,
        }
    }
}

/// Downward ray/sphere probe with a configurable in-range threshold.
#[derive(Clone, Copy, Debug)]
pub struct GroundSensor {
    pub threshold_distance: Real,
    pub use_real_ground_normal: bool,
}

impl GroundSensor {
    pub fn new(threshold_distance: Real) -> Self {
        Self {
            threshold_distance,
            use_real_ground_normal: false,
        }
    }

    pub fn is_within_ground(&self, distance: Real) -> bool {
        distance <= self.threshold_distance
    }

    /// Probes straight down from `origin`. Casts a ray when `thickness` is
    /// zero or less, otherwise a sphere of radius `thickness / 2`.
    ///
    /// A hit only counts as ground when the vertical clearance
    /// `origin.y - point.y` is within the threshold distance. Sphere casts
    /// return a blended normal near edges, so when `use_real_ground_normal`
    /// is set a short extra ray against the hit collider recovers the true
    /// surface normal.
    pub fn probe(
        &self,
        world: &PhysicsWorld,
        origin: Point<Real>,
        range: Real,
        thickness: Real,
        filter: QueryFilter,
    ) -> GroundInfo {
        let down = -Vector::y();
        let hit = if thickness <= 0.0 {
            world.cast_ray(origin, down, range, filter)
        } else {
            world.cast_sphere(origin, thickness / 2.0, down, range, filter)
        };
        let Some(hit) = hit else {
            return GroundInfo::none();
        };

        let distance = origin.y - hit.point.y;
        if !self.is_within_ground(distance) {
            let mut info = GroundInfo::none();
            info.distance = distance;
            return info;
        }

        let mut normal = hit.normal;
        if self.use_real_ground_normal && thickness > 0.0 {
            let lifted = Point::new(
                hit.point.x,
                hit.point.y + REAL_NORMAL_PROBE_LIFT,
                hit.point.z,
            );
            if let Some(real) =
                world.cast_ray_against(hit.collider, lifted, down, REAL_NORMAL_PROBE_RANGE)
            {
                normal = real.normal;
            }
        }

        GroundInfo {
            is_on_ground: true,
            normal,
            point: hit.point,
            distance,
            collider: Some(hit.collider),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContactClass {
    FlatGround,
    Ground,
    Ceiling,
    Neither,
}

/// Classifies one contact normal against the ground and flat-ground limits.
///
/// `min_ground_dot` and `min_flat_ground_dot` are cosines of the configured
/// angle limits; flat ground is a refinement of ground.
pub fn classify_contact(
    normal_y: Real,
    min_ground_dot: Real,
    min_flat_ground_dot: Real,
) -> ContactClass {
    if normal_y > min_ground_dot + GROUND_DOT_EPSILON {
        if normal_y > min_flat_ground_dot {
            ContactClass::FlatGround
        } else {
            ContactClass::Ground
        }
    } else if normal_y < -GROUND_DOT_EPSILON {
        ContactClass::Ceiling
    } else {
        ContactClass::Neither
    }
}

/// Aggregated view of one tick's contact samples.
#[derive(Clone, Copy, Debug)]
pub struct ContactSummary {
    pub has_contact: bool,
    pub touching_ground: bool,
    pub touching_flat_ground: bool,
    pub touching_ceiling: bool,
    /// Average ground normal, up when no ground contact exists.
    pub ground_normal: Vector<Real>,
    /// Mean contact height of the last ground collision evaluated.
    pub ground_height: Real,
}

impl ContactSummary {
    fn empty() -> Self {
        Self {
            has_contact: false,
            touching_ground: false,
            touching_flat_ground: false,
            touching_ceiling: false,
            ground_normal: Vector::y(),
            ground_height: 0.0,
        }
    }
}

/// Evaluates the tick's contact samples.
///
/// Contacts sharing a collider form one collision; normals are averaged
/// within each collision, then across collisions, so simultaneous ground
/// surfaces are equally authoritative regardless of contact count. Ground
/// height is a running mean kept per collision, and the last ground
/// collision's mean is the one reported.
pub fn evaluate_contacts(
    samples: &[ContactSample],
    min_ground_dot: Real,
    min_flat_ground_dot: Real,
) -> ContactSummary {
    let mut summary = ContactSummary::empty();
    // Per collision: collider, accumulated normal, height mean, contact count.
    let mut collisions: Vec<(ColliderHandle, Vector<Real>, Real, usize)> = Vec::new();

    for sample in samples {
        summary.has_contact = true;
        match classify_contact(sample.normal.y, min_ground_dot, min_flat_ground_dot) {
            ContactClass::FlatGround | ContactClass::Ground => {
                summary.touching_ground = true;
                if sample.normal.y > min_flat_ground_dot {
                    summary.touching_flat_ground = true;
                }
                match collisions
                    .iter_mut()
                    .find(|(collider, ..)| *collider == sample.collider)
                {
                    Some((_, normal, height, count)) => {
                        *normal += sample.normal;
                        *count += 1;
                        let n = *count as Real;
                        *height = *height * (n - 1.0) / n + sample.point.y / n;
                    }
                    None => {
                        collisions.push((sample.collider, sample.normal, sample.point.y, 1))
                    }
                }
            }
            ContactClass::Ceiling => summary.touching_ceiling = true,
            ContactClass::Neither => {}
        }
    }

    if summary.touching_ground {
        let mut accumulated = Vector::zeros();
        for (_, normal, _, count) in &collisions {
            accumulated += normal / *count as Real;
        }
        summary.ground_normal = accumulated / collisions.len() as Real;
        if let Some((_, _, height, _)) = collisions.last() {
            summary.ground_height = *height;
        }
    }

    summary
}

/// Slope probe ray counts and offsets, per side of the movement direction.
#[derive(Clone, Copy, Debug)]
pub struct SlopeProbeConfig {
    pub front_offset: Real,
    pub front_count: u32,
    pub back_offset: Real,
    pub back_count: u32,
}

impl Default for SlopeProbeConfig {
    fn default() -> Self {
        Self {
            front_offset: 1.0,
            front_count: 2,
            back_offset: 1.0,
            back_count: 2,
        }
    }
}

/// Approximates the local terrain tangent by sampling fore and aft of the
/// current ground point. Owns a reusable sample buffer.
#[derive(Default)]
pub struct SlopeEstimator {
    points: Vec<Point<Real>>,
}

impl SlopeEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the estimated slope normal, or `None` when the probes found
    /// nothing better than the single-point ground normal.
    ///
    /// `direction` is flattened to its horizontal component; probe rays start
    /// at `origin_y` (above the character) and only accept points within
    /// `step_height` of the base point's height.
    #[allow(clippy::too_many_arguments)]
    pub fn probe(
        &mut self,
        world: &PhysicsWorld,
        config: &SlopeProbeConfig,
        base_point: Point<Real>,
        direction: Vector<Real>,
        origin_y: Real,
        range: Real,
        step_height: Real,
        filter: QueryFilter,
    ) -> Option<Vector<Real>> {
        let direction = Vector::new(direction.x, 0.0, direction.z);
        if config.front_count <= 1 && config.back_count <= 1 {
            probe_two_point(
                world,
                base_point,
                direction,
                origin_y,
                range,
                step_height,
                config.front_offset,
                config.back_offset,
                filter,
            )
        } else {
            probe_multi_point(
                world,
                config,
                base_point,
                direction,
                origin_y,
                range,
                step_height,
                filter,
                &mut self.points,
            )
        }
    }
}

/// Normal of a slope segment: `slope x (up x slope)`, normalized.
fn slope_segment_normal(slope: Vector<Real>) -> Option<Vector<Real>> {
    slope
        .cross(&Vector::y().cross(&slope))
        .try_normalize(SLOPE_NORMAL_EPSILON)
}

#[allow(clippy::too_many_arguments)]
fn probe_two_point(
    world: &PhysicsWorld,
    base_point: Point<Real>,
    direction: Vector<Real>,
    origin_y: Real,
    range: Real,
    step_height: Real,
    front_offset: Real,
    back_offset: Real,
    filter: QueryFilter,
) -> Option<Vector<Real>> {
    let down = -Vector::y();
    let step_y = base_point.y + step_height;

    let front_origin = Point::new(
        base_point.x + front_offset * direction.x,
        origin_y,
        base_point.z + front_offset * direction.z,
    );
    let back_origin = Point::new(
        base_point.x - back_offset * direction.x,
        origin_y,
        base_point.z - back_offset * direction.z,
    );

    let mut front_point = base_point;
    if let Some(hit) = world.cast_ray(front_origin, down, range, filter) {
        if hit.point.y <= step_y {
            front_point = hit.point;
        }
    }
    let mut back_point = base_point;
    if let Some(hit) = world.cast_ray(back_origin, down, range, filter) {
        if hit.point.y <= step_y {
            back_point = hit.point;
        }
    }

    if front_point == back_point {
        return None;
    }
    slope_segment_normal(front_point - back_point)
}

#[allow(clippy::too_many_arguments)]
fn probe_multi_point(
    world: &PhysicsWorld,
    config: &SlopeProbeConfig,
    base_point: Point<Real>,
    direction: Vector<Real>,
    origin_y: Real,
    range: Real,
    step_height: Real,
    filter: QueryFilter,
    points: &mut Vec<Point<Real>>,
) -> Option<Vector<Real>> {
    let down = -Vector::y();
    let step_y = base_point.y + step_height;
    let front_count = config.front_count.max(1);
    let back_count = config.back_count.max(1);
    let front_step = direction * (config.front_offset / front_count as Real);
    let back_step = direction * (config.back_offset / back_count as Real);

    points.clear();

    // Front side: walk from the farthest point back toward the base. A miss
    // discards what was collected so far, so only the contiguous run of
    // valid points adjacent to the base survives.
    let mut front_origin = Point::new(
        base_point.x + config.front_offset * direction.x,
        origin_y,
        base_point.z + config.front_offset * direction.z,
    );
    for _ in 0..front_count {
        let accepted = world
            .cast_ray(front_origin, down, range, filter)
            .filter(|hit| hit.point.y <= step_y);
        match accepted {
            Some(hit) => points.push(hit.point),
            None => points.clear(),
        }
        front_origin -= front_step;
    }

    points.push(base_point);

    // Back side: walk outward from the base and stop at the first miss,
    // keeping everything collected before it.
    let mut back_origin = Point::new(
        base_point.x - back_step.x,
        origin_y,
        base_point.z - back_step.z,
    );
    for _ in 0..back_count {
        let accepted = world
            .cast_ray(back_origin, down, range, filter)
            .filter(|hit| hit.point.y <= step_y);
        match accepted {
            Some(hit) => points.push(hit.point),
            None => break,
        }
        back_origin -= back_step;
    }

    let mut accumulated = Vector::zeros();
    let mut found = false;
    for pair in points.windows(2) {
        if let Some(normal) = slope_segment_normal(pair[1] - pair[0]) {
            accumulated += normal;
            found = true;
        }
    }
    if !found {
        return None;
    }
    accumulated.try_normalize(SLOPE_NORMAL_EPSILON)
}

/// Step search parameters derived from the mover configuration.
#[derive(Clone, Copy, Debug)]
pub struct StepSearchConfig {
    pub step_height: Real,
    pub overshoot: Real,
    /// Cosine of the ground angle limit; contacts steeper than this are
    /// treated as wall-like step candidates.
    pub min_ground_dot: Real,
}

/// Searches the tick's contacts for a steppable ledge, returning the offset
/// from the contact point (at ground height) up onto the ledge.
pub fn find_step(
    world: &PhysicsWorld,
    samples: &[ContactSample],
    ground_height: Real,
    config: &StepSearchConfig,
) -> Option<Vector<Real>> {
    samples
        .iter()
        .find_map(|sample| resolve_step_up(world, sample, ground_height, config))
}

fn resolve_step_up(
    world: &PhysicsWorld,
    contact: &ContactSample,
    ground_height: Real,
    config: &StepSearchConfig,
) -> Option<Vector<Real>> {
    // Only near-vertical, wall-like contacts can front a step.
    if contact.normal.y.abs() >= config.min_ground_dot {
        return None;
    }
    if contact.point.y - ground_height >= config.step_height {
        return None;
    }

    // Probe straight down from just above the would-be step top, against the
    // collider that produced the contact.
    let origin = Point::new(
        contact.point.x,
        ground_height + config.step_height + STEP_PROBE_CLEARANCE,
        contact.point.z,
    );
    let hit = world.cast_ray_against(contact.collider, origin, -Vector::y(), config.step_height)?;

    let inverse_normal = Vector::new(-contact.normal.x, 0.0, -contact.normal.z);
    let step_up_point = Point::new(
        contact.point.x,
        hit.point.y + STEP_POINT_LIFT,
        contact.point.z,
    ) + inverse_normal * config.overshoot;
    Some(step_up_point - Point::new(contact.point.x, ground_height, contact.point.z))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rapier3d::prelude::*;

    fn flat_world() -> PhysicsWorld {
        let mut world = PhysicsWorld::new(vector![0.0, -9.81, 0.0]);
        let floor = ColliderBuilder::cuboid(10.0, 0.1, 10.0)
            .translation(vector![0.0, -0.1, 0.0])
            .build();
        world.insert_static_collider(floor);
        world.step(1.0 / 60.0);
        world
    }

    fn sample(collider: ColliderHandle, normal: Vector<Real>, point: Point<Real>) -> ContactSample {
        ContactSample {
            collider,
            normal,
            point,
        }
    }

    #[test]
    fn classifies_ground_and_flat_ground() {
        // 90 degree limit: anything above horizontal counts as ground.
        let min_ground_dot = 90.0_f32.to_radians().cos();
        // 70 degree limit refines it to flat ground.
        let min_flat_dot = 70.0_f32.to_radians().cos();
        assert_eq!(
            classify_contact(0.5, min_ground_dot, min_flat_dot),
            ContactClass::FlatGround
        );
        assert_eq!(
            classify_contact(0.2, min_ground_dot, min_flat_dot),
            ContactClass::Ground
        );
        assert_eq!(
            classify_contact(-0.5, min_ground_dot, min_flat_dot),
            ContactClass::Ceiling
        );
        assert_eq!(
            classify_contact(0.0005, min_ground_dot, min_flat_dot),
            ContactClass::Neither
        );
    }

    #[test]
    fn averages_normals_per_collision_and_takes_last_collision_height() {
        let mut world = flat_world();
        let handle_a = world.colliders().iter().next().unwrap().0;
        let handle_b = world.insert_static_collider(ColliderBuilder::ball(0.5).build());

        let tilted = vector![0.6, 0.8, 0.0];
        let samples = [
            sample(handle_a, vector![0.0, 1.0, 0.0], point![0.0, 0.0, 0.0]),
            sample(handle_a, vector![0.0, 1.0, 0.0], point![0.1, 0.2, 0.0]),
            sample(handle_b, tilted, point![0.2, 0.4, 0.0]),
        ];
        let summary = evaluate_contacts(&samples, 0.0, 0.342);

        assert!(summary.touching_ground);
        assert!(summary.touching_flat_ground);
        // Collision A averages to straight up, collision B stays tilted; the
        // two collisions then weigh equally.
        let expected = (vector![0.0, 1.0, 0.0] + tilted) / 2.0;
        assert!((summary.ground_normal - expected).norm() < 1.0e-5);
        // Height comes from the last ground collision (B), not a global mean
        // over all three contacts (which would be 0.2).
        assert!((summary.ground_height - 0.4).abs() < 1.0e-5);
    }

    #[test]
    fn last_collision_height_is_its_contacts_mean() {
        let mut world = flat_world();
        let handle_a = world.colliders().iter().next().unwrap().0;
        let handle_b = world.insert_static_collider(ColliderBuilder::ball(0.5).build());

        let up = vector![0.0, 1.0, 0.0];
        let samples = [
            sample(handle_a, up, point![0.0, 1.0, 0.0]),
            sample(handle_b, up, point![0.0, 0.3, 0.0]),
            sample(handle_b, up, point![0.1, 0.5, 0.0]),
        ];
        let summary = evaluate_contacts(&samples, 0.0, 0.342);
        assert!((summary.ground_height - 0.4).abs() < 1.0e-5);
    }

    #[test]
    fn no_ground_contact_defaults_normal_up() {
        let summary = evaluate_contacts(&[], 0.0, 0.342);
        assert!(!summary.has_contact);
        assert!(!summary.touching_ground);
        assert_eq!(summary.ground_normal, Vector::y());
    }

    #[test]
    fn probe_reports_distance_and_threshold() {
        let world = flat_world();
        let mut sensor = GroundSensor::new(1.5);

        let info = sensor.probe(
            &world,
            point![0.0, 1.0, 0.0],
            10.0,
            0.0,
            QueryFilter::default(),
        );
        assert!(info.is_on_ground);
        assert!((info.distance - 1.0).abs() < 1.0e-3);
        assert!(info.normal.y > 0.99);
        assert!(info.collider.is_some());

        // Same surface, but beyond the threshold: hit exists, not ground.
        sensor.threshold_distance = 0.5;
        let info = sensor.probe(
            &world,
            point![0.0, 1.0, 0.0],
            10.0,
            0.0,
            QueryFilter::default(),
        );
        assert!(!info.is_on_ground);
        assert!((info.distance - 1.0).abs() < 1.0e-3);
    }

    #[test]
    fn probe_miss_defaults_up() {
        let world = flat_world();
        let sensor = GroundSensor::new(1.5);
        let info = sensor.probe(
            &world,
            point![0.0, 20.0, 0.0],
            5.0,
            0.1,
            QueryFilter::default(),
        );
        assert!(!info.is_on_ground);
        assert_eq!(info.normal, Vector::y());
    }

    #[test]
    fn two_point_slope_on_flat_ground_is_up() {
        let world = flat_world();
        let mut estimator = SlopeEstimator::new();
        let config = SlopeProbeConfig {
            front_count: 1,
            back_count: 1,
            ..Default::default()
        };
        let normal = estimator
            .probe(
                &world,
                &config,
                point![0.0, 0.0, 0.0],
                vector![1.0, 0.0, 0.0],
                2.0,
                5.0,
                10.0,
                QueryFilter::default(),
            )
            .expect("flat ground yields a slope segment");
        assert!((normal - Vector::y()).norm() < 1.0e-4);
    }

    #[test]
    fn slope_probe_without_direction_falls_back() {
        let world = flat_world();
        let mut estimator = SlopeEstimator::new();
        let config = SlopeProbeConfig {
            front_count: 1,
            back_count: 1,
            ..Default::default()
        };
        // Zero direction makes both sample points coincide.
        let normal = estimator.probe(
            &world,
            &config,
            point![0.0, 0.0, 0.0],
            Vector::zeros(),
            2.0,
            5.0,
            10.0,
            QueryFilter::default(),
        );
        assert!(normal.is_none());
    }

    #[test]
    fn multi_point_slope_follows_ramp() {
        let mut world = PhysicsWorld::new(vector![0.0, -9.81, 0.0]);
        let ramp = ColliderBuilder::cuboid(10.0, 0.1, 10.0)
            .rotation(vector![0.0, 0.0, 0.3])
            .build();
        world.insert_static_collider(ramp);
        world.step(1.0 / 60.0);

        let mut estimator = SlopeEstimator::new();
        let config = SlopeProbeConfig::default();
        let normal = estimator
            .probe(
                &world,
                &config,
                point![0.0, 0.1, 0.0],
                vector![1.0, 0.0, 0.0],
                3.0,
                8.0,
                10.0,
                QueryFilter::default(),
            )
            .expect("ramp yields slope segments");
        assert!((normal.norm() - 1.0).abs() < 1.0e-4);
        // A positive roll about z raises the surface along +x, so the normal
        // leans toward -x.
        assert!(normal.y > 0.9);
        assert!(normal.x < -0.01);
    }

    #[test]
    fn front_gap_discards_points_beyond_it() {
        let mut world = PhysicsWorld::new(vector![0.0, -9.81, 0.0]);
        // Pad under the base point and the first back probe (x in [-0.7, 0.25]).
        world.insert_static_collider(
            ColliderBuilder::cuboid(0.475, 0.1, 5.0)
                .translation(vector![-0.225, -0.1, 0.0])
                .build(),
        );
        // Raised island under the farthest front probe only (x in [0.9, 1.1]).
        world.insert_static_collider(
            ColliderBuilder::cuboid(0.1, 0.1, 5.0)
                .translation(vector![1.0, 0.1, 0.0])
                .build(),
        );
        world.step(1.0 / 60.0);

        let mut estimator = SlopeEstimator::new();
        let config = SlopeProbeConfig::default();
        // Probes land at x = 1.0 (island hit), 0.5 (gap), base, -0.5, -1.0.
        // The gap discards the island point, so only the flat pad remains.
        let normal = estimator
            .probe(
                &world,
                &config,
                point![0.0, 0.0, 0.0],
                vector![1.0, 0.0, 0.0],
                2.0,
                5.0,
                10.0,
                QueryFilter::default(),
            )
            .expect("pad segments survive the front gap");
        assert!(normal.x.abs() < 1.0e-3);
        assert!(normal.y > 0.999);
    }

    #[test]
    fn back_miss_keeps_points_collected_before_it() {
        let mut world = PhysicsWorld::new(vector![0.0, -9.81, 0.0]);
        // Lower pad under the first back probe only (x in [-0.6, -0.4],
        // top at y = -0.2); nothing in front and nothing at x = -1.0.
        world.insert_static_collider(
            ColliderBuilder::cuboid(0.1, 0.1, 5.0)
                .translation(vector![-0.5, -0.3, 0.0])
                .build(),
        );
        world.step(1.0 / 60.0);

        let mut estimator = SlopeEstimator::new();
        let config = SlopeProbeConfig::default();
        // The second back probe misses, but the base-to-first-back segment is
        // kept: terrain rises toward +x, so the normal leans toward -x.
        let normal = estimator
            .probe(
                &world,
                &config,
                point![0.0, 0.0, 0.0],
                vector![1.0, 0.0, 0.0],
                2.0,
                5.0,
                10.0,
                QueryFilter::default(),
            )
            .expect("segment before the back miss is kept");
        assert!(normal.x < -0.05);
        assert!(normal.y > 0.8);
    }

    #[test]
    fn finds_step_on_wall_contact() {
        let mut world = PhysicsWorld::new(vector![0.0, -9.81, 0.0]);
        let floor = ColliderBuilder::cuboid(5.0, 0.1, 5.0)
            .translation(vector![0.0, -0.1, 0.0])
            .build();
        world.insert_static_collider(floor);
        // Step box: face at x = 1.0, top at y = 0.2.
        let step_box = world.insert_static_collider(
            ColliderBuilder::cuboid(0.3, 0.1, 0.5)
                .translation(vector![1.3, 0.1, 0.0])
                .build(),
        );
        world.step(1.0 / 60.0);

        let config = StepSearchConfig {
            step_height: 0.3,
            overshoot: 0.05,
            min_ground_dot: 45.0_f32.to_radians().cos(),
        };
        let contact = sample(step_box, vector![-1.0, 0.0, 0.0], point![1.001, 0.1, 0.0]);
        let offset = find_step(&world, &[contact], 0.0, &config)
            .expect("ledge within step height is steppable");
        assert!((offset.y - 0.2).abs() < 1.0e-2);
        // Overshoot nudges further along the inverse contact normal (+x).
        assert!(offset.x > 0.0);
    }

    #[test]
    fn rejects_step_above_step_height() {
        let mut world = PhysicsWorld::new(vector![0.0, -9.81, 0.0]);
        let tall_box = world.insert_static_collider(
            ColliderBuilder::cuboid(0.3, 0.5, 0.5)
                .translation(vector![1.3, 0.5, 0.0])
                .build(),
        );
        world.step(1.0 / 60.0);

        let config = StepSearchConfig {
            step_height: 0.3,
            overshoot: 0.05,
            min_ground_dot: 45.0_f32.to_radians().cos(),
        };
        // Contact halfway up a 1m wall: too high to step.
        let contact = sample(tall_box, vector![-1.0, 0.0, 0.0], point![1.001, 0.5, 0.0]);
        assert!(find_step(&world, &[contact], 0.0, &config).is_none());
    }

    #[test]
    fn rejects_ground_like_contacts_as_steps() {
        let world = flat_world();
        let floor = world.colliders().iter().next().unwrap().0;
        let config = StepSearchConfig {
            step_height: 0.3,
            overshoot: 0.05,
            min_ground_dot: 45.0_f32.to_radians().cos(),
        };
        let contact = sample(floor, vector![0.0, 1.0, 0.0], point![0.0, 0.0, 0.0]);
        assert!(find_step(&world, &[contact], 0.0, &config).is_none());
    }
}
