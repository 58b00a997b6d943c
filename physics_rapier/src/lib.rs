//! Rapier world wrapper: casts, contact enumeration, and body access.
#![forbid(unsafe_code)]

use rapier3d::parry::query::ShapeCastOptions;
use rapier3d::prelude::*;

/// One collision contact gathered from the narrow phase, with the normal
/// oriented from the touched surface toward the character.
#[derive(Clone, Copy, Debug)]
pub struct ContactSample {
    pub collider: ColliderHandle,
    pub normal: Vector<Real>,
    pub point: Point<Real>,
}

/// A ray or shape cast hit against the world.
#[derive(Clone, Copy, Debug)]
pub struct RayHit {
    pub collider: ColliderHandle,
    pub point: Point<Real>,
    pub normal: Vector<Real>,
    /// Travel distance of the cast, not the vertical clearance.
    pub distance: Real,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct DebugDrawConfig {
    pub draw_colliders: bool,
    pub draw_bodies: bool,
    pub draw_contacts: bool,
}

#[derive(Clone, Copy, Debug)]
pub struct DebugLine {
    pub start: [f32; 3],
    pub end: [f32; 3],
    pub color: [f32; 4],
}

#[derive(Default)]
pub struct PhysicsDebugLines {
    pub lines: Vec<DebugLine>,
}

impl PhysicsDebugLines {
    fn push_line(&mut self, start: Point<Real>, end: Point<Real>, color: [f32; 4]) {
        self.lines.push(DebugLine {
            start: [start.x, start.y, start.z],
            end: [end.x, end.y, end.z],
            color,
        });
    }
}

impl rapier3d::pipeline::DebugRenderBackend for PhysicsDebugLines {
    fn draw_line(
        &mut self,
        object: rapier3d::pipeline::DebugRenderObject,
        a: Point<Real>,
        b: Point<Real>,
        _color: [f32; 4],
    ) {
        let color = match object {
            rapier3d::pipeline::DebugRenderObject::Collider(..)
            | rapier3d::pipeline::DebugRenderObject::ColliderAabb(..) => [0.2, 0.8, 0.9, 1.0],
            rapier3d::pipeline::DebugRenderObject::RigidBody(..) => [0.3, 0.7, 0.3, 1.0],
            rapier3d::pipeline::DebugRenderObject::ImpulseJoint(..)
            | rapier3d::pipeline::DebugRenderObject::MultibodyJoint(..) => [0.9, 0.7, 0.2, 1.0],
            rapier3d::pipeline::DebugRenderObject::ContactPair(..) => [0.9, 0.2, 0.2, 1.0],
        };
        self.push_line(a, b, color);
    }
}

pub struct PhysicsWorld {
    pub gravity: Vector<Real>,
    integration_parameters: IntegrationParameters,
    pipeline: PhysicsPipeline,
    island_manager: IslandManager,
    broad_phase: BroadPhaseMultiSap,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,
    query_pipeline: QueryPipeline,
    debug_pipeline: rapier3d::pipeline::DebugRenderPipeline,
}

impl PhysicsWorld {
    pub fn new(gravity: Vector<Real>) -> Self {
        Self {
            gravity,
            integration_parameters: IntegrationParameters::default(),
            pipeline: PhysicsPipeline::new(),
            island_manager: IslandManager::new(),
            broad_phase: BroadPhaseMultiSap::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
            debug_pipeline: rapier3d::pipeline::DebugRenderPipeline::default(),
        }
    }

    pub fn bodies(&self) -> &RigidBodySet {
        &self.bodies
    }

    pub fn colliders(&self) -> &ColliderSet {
        &self.colliders
    }

    pub fn query_pipeline(&self) -> &QueryPipeline {
        &self.query_pipeline
    }

    pub fn step(&mut self, dt: Real) {
        self.integration_parameters.dt = dt;
        let physics_hooks = ();
        let event_handler = ();
        self.pipeline.step(
            &self.gravity,
            &self.integration_parameters,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd_solver,
            Some(&mut self.query_pipeline),
            &physics_hooks,
            &event_handler,
        );
        self.query_pipeline.update(&self.colliders);
    }

    pub fn insert_static_collider(&mut self, collider: Collider) -> ColliderHandle {
        self.colliders.insert(collider)
    }

    pub fn insert_body(&mut self, body: RigidBody) -> RigidBodyHandle {
        self.bodies.insert(body)
    }

    pub fn attach_collider(
        &mut self,
        collider: Collider,
        body: RigidBodyHandle,
    ) -> ColliderHandle {
        self.colliders
            .insert_with_parent(collider, body, &mut self.bodies)
    }

    pub fn body(&self, handle: RigidBodyHandle) -> Option<&RigidBody> {
        self.bodies.get(handle)
    }

    pub fn body_mut(&mut self, handle: RigidBodyHandle) -> Option<&mut RigidBody> {
        self.bodies.get_mut(handle)
    }

    pub fn collider(&self, handle: ColliderHandle) -> Option<&Collider> {
        self.colliders.get(handle)
    }

    pub fn collider_mut(&mut self, handle: ColliderHandle) -> Option<&mut Collider> {
        self.colliders.get_mut(handle)
    }

    pub fn body_translation(&self, handle: RigidBodyHandle) -> Option<Vector<Real>> {
        Some(*self.bodies.get(handle)?.translation())
    }

    pub fn body_linvel(&self, handle: RigidBodyHandle) -> Option<Vector<Real>> {
        Some(*self.bodies.get(handle)?.linvel())
    }

    /// The single per-tick velocity write consumed by the integrator.
    pub fn set_body_linvel(&mut self, handle: RigidBodyHandle, velocity: Vector<Real>) {
        if let Some(body) = self.bodies.get_mut(handle) {
            body.set_linvel(velocity, true);
        }
    }

    /// World-space position of a collider, including its parent offset.
    pub fn collider_translation(&self, handle: ColliderHandle) -> Option<Vector<Real>> {
        Some(self.colliders.get(handle)?.position().translation.vector)
    }

    pub fn cast_ray(
        &self,
        origin: Point<Real>,
        direction: Vector<Real>,
        max_distance: Real,
        filter: QueryFilter,
    ) -> Option<RayHit> {
        let ray = Ray::new(origin, direction);
        let (collider, hit) = self.query_pipeline.cast_ray_and_get_normal(
            &self.bodies,
            &self.colliders,
            &ray,
            max_distance,
            true,
            filter,
        )?;
        Some(RayHit {
            collider,
            point: ray.point_at(hit.time_of_impact),
            normal: hit.normal,
            distance: hit.time_of_impact,
        })
    }

    pub fn cast_sphere(
        &self,
        origin: Point<Real>,
        radius: Real,
        direction: Vector<Real>,
        max_distance: Real,
        filter: QueryFilter,
    ) -> Option<RayHit> {
        let shape = Ball::new(radius);
        let shape_pos = Isometry::translation(origin.x, origin.y, origin.z);
        let (collider, hit) = self.query_pipeline.cast_shape(
            &self.bodies,
            &self.colliders,
            &shape_pos,
            &direction,
            &shape,
            ShapeCastOptions::with_max_time_of_impact(max_distance),
            filter,
        )?;
        let normal = hit.normal1.into_inner();
        // The surface point sits one radius from the sphere center at impact,
        // opposite the hit normal.
        let center = origin + direction * hit.time_of_impact;
        Some(RayHit {
            collider,
            point: center - normal * radius,
            normal,
            distance: hit.time_of_impact,
        })
    }

    /// Ray cast against one specific collider, ignoring everything else.
    pub fn cast_ray_against(
        &self,
        target: ColliderHandle,
        origin: Point<Real>,
        direction: Vector<Real>,
        max_distance: Real,
    ) -> Option<RayHit> {
        let collider = self.colliders.get(target)?;
        let ray = Ray::new(origin, direction);
        let hit = collider
            .shape()
            .cast_ray_and_get_normal(collider.position(), &ray, max_distance, true)?;
        Some(RayHit {
            collider: target,
            point: ray.point_at(hit.time_of_impact),
            normal: hit.normal,
            distance: hit.time_of_impact,
        })
    }

    /// Collects the contacts touching `character` since the last step.
    ///
    /// Sample normals always point from the touched surface toward the
    /// character, which is the orientation ground classification expects.
    pub fn gather_contacts(&self, character: ColliderHandle, out: &mut Vec<ContactSample>) {
        for pair in self.narrow_phase.contact_pairs_with(character) {
            if !pair.has_any_active_contact {
                continue;
            }
            let character_is_first = pair.collider1 == character;
            let other = if character_is_first {
                pair.collider2
            } else {
                pair.collider1
            };
            let Some(other_collider) = self.colliders.get(other) else {
                continue;
            };
            for manifold in &pair.manifolds {
                // Manifold normals point out of the first collider.
                let normal = if character_is_first {
                    -manifold.data.normal
                } else {
                    manifold.data.normal
                };
                if manifold.data.solver_contacts.is_empty() {
                    // Fresh pairs may not have solver contacts yet.
                    for contact in &manifold.points {
                        let local = if character_is_first {
                            contact.local_p2
                        } else {
                            contact.local_p1
                        };
                        out.push(ContactSample {
                            collider: other,
                            normal,
                            point: other_collider.position() * local,
                        });
                    }
                } else {
                    for contact in &manifold.data.solver_contacts {
                        out.push(ContactSample {
                            collider: other,
                            normal,
                            point: contact.point,
                        });
                    }
                }
            }
        }
    }

    pub fn debug_lines(&mut self, config: DebugDrawConfig) -> PhysicsDebugLines {
        let mut lines = PhysicsDebugLines::default();
        let mut mode = rapier3d::pipeline::DebugRenderMode::empty();
        if config.draw_colliders {
            mode |= rapier3d::pipeline::DebugRenderMode::COLLIDER_SHAPES;
        }
        if config.draw_bodies {
            mode |= rapier3d::pipeline::DebugRenderMode::RIGID_BODY_AXES;
        }
        if config.draw_contacts {
            mode |= rapier3d::pipeline::DebugRenderMode::CONTACTS;
        }
        if !mode.is_empty() {
            self.debug_pipeline.mode = mode;
            self.debug_pipeline.render(
                &mut lines,
                &self.bodies,
                &self.colliders,
                &self.impulse_joints,
                &self.multibody_joints,
                &self.narrow_phase,
            );
        }
        lines
    }
}
