use na::{RealField, Unit};
use ncollide::bounding_volume::{BoundingVolume, AABB};
use ncollide::partitioning::{VisitStatus, Visitor, BVH, DBVT, DBVTLeaf, DBVTLeafId};

use crate::counters::SyncCounters;
use crate::error::CordeError;
use crate::math::{Point, Vector, DIM};
use crate::object::{Collidable, CollidableHandle, CollidableKind, Corde, RodConfig, RodModel};
use crate::solver::{SolverId, SolverState};

/// One bounding-volume leaf tracking one mass point of the rod.
struct RopeLeaf<N: RealField> {
    tree_id: DBVTLeafId,
    /// The tight bound of the mass point, with margins applied.
    aabb: AABB<N>,
    /// The loosened bound actually stored in the tree.
    tree_volume: AABB<N>,
}

/// A persistent attachment pinning one mass point to a world position.
struct RopeAnchor<N: RealField> {
    node: usize,
    partner: CollidableHandle,
    target: Point<N>,
}

/// One contact generated by the default collision handler, resolved at the
/// constraint-solving phase of the same tick.
struct RopeContact<N: RealField> {
    node: usize,
    target: Point<N>,
    normal: Unit<Vector<N>>,
}

/// The bridge letting a deformable rod participate in a rigid-body collision
/// pipeline.
///
/// The bridge owns the rod model, one bounding-volume leaf per mass point, a
/// dynamic bounding-volume tree over those leaves, and the aggregate bound
/// published to the broadphase. Stepping is split in two phases: a
/// speculative `predict_motion` that advances the model without committing
/// it and republishes every bound, and an `integrate_motion` that commits
/// the advance. Collision callbacks arrive in between, once the broadphase
/// has run on the speculative bounds.
pub struct CollisionRope<N: RealField, M: RodModel<N> = Corde<N>> {
    model: M,
    leaves: Vec<RopeLeaf<N>>,
    ndbvt: DBVT<N, usize, AABB<N>>,
    bounds: AABB<N>,
    sst: SolverState<N>,
    timescale: N,
    solver: Option<SolverId>,
    collision_disabled: Vec<CollidableHandle>,
    anchors: Vec<RopeAnchor<N>>,
    contacts: Vec<RopeContact<N>>,
    counters: SyncCounters,
}

/// The speculative bound of one mass point.
///
/// It covers the committed and the predicted position, inflated by the
/// radial margin, then expanded along the motion direction by the velocity
/// margin.
fn leaf_volume<N: RealField>(
    position: &Point<N>,
    predicted: &Point<N>,
    velocity: &Vector<N>,
    sst: &SolverState<N>,
) -> AABB<N> {
    let mins = position.coords.inf(&predicted.coords);
    let maxs = position.coords.sup(&predicted.coords);
    let aabb = AABB::new(Point::from(mins), Point::from(maxs)).loosened(sst.radmrg);

    if sst.velmrg > N::zero() {
        signed_expand(&aabb, &(*velocity * (sst.velmrg * sst.sdt)))
    } else {
        aabb
    }
}

/// Expands `aabb` by `amount`, each axis growing only toward the sign of the
/// corresponding component.
fn signed_expand<N: RealField>(aabb: &AABB<N>, amount: &Vector<N>) -> AABB<N> {
    let mut mins = *aabb.mins();
    let mut maxs = *aabb.maxs();

    for i in 0..DIM {
        if amount[i] > N::zero() {
            maxs[i] += amount[i];
        } else {
            mins[i] += amount[i];
        }
    }

    AABB::new(mins, maxs)
}

fn contains_point<N: RealField>(aabb: &AABB<N>, point: &Point<N>) -> bool {
    for i in 0..DIM {
        if point[i] < aabb.mins()[i] || point[i] > aabb.maxs()[i] {
            return false;
        }
    }

    true
}

struct InterferencesVisitor<'a, N: RealField> {
    volume: &'a AABB<N>,
    collector: &'a mut Vec<usize>,
}

impl<'a, N: RealField> Visitor<usize, AABB<N>> for InterferencesVisitor<'a, N> {
    fn visit(&mut self, bv: &AABB<N>, data: Option<&usize>) -> VisitStatus {
        if bv.intersects(self.volume) {
            if let Some(point) = data {
                self.collector.push(*point);
            }

            VisitStatus::Continue
        } else {
            VisitStatus::Stop
        }
    }
}

impl<N: RealField> CollisionRope<N, Corde<N>> {
    /// Builds a rod from a center-line and wraps it in a collision bridge.
    pub fn from_centerline(centerline: &[Point<N>], config: &RodConfig<N>) -> Self {
        Self::with_model(Corde::new(centerline, config), config)
    }
}

impl<N: RealField, M: RodModel<N>> CollisionRope<N, M> {
    /// Wraps an existing rod model in a collision bridge.
    ///
    /// One bounding-volume leaf is created per mass point, inflated by the
    /// radial margin, and inserted into the tree with the update margin as
    /// hysteresis.
    pub fn with_model(model: M, config: &RodConfig<N>) -> Self {
        assert!(
            model.num_points() >= 2,
            "A rod needs at least two mass points."
        );

        let sst = SolverState::new(
            config.velocity_margin,
            config.radial_margin,
            config.update_margin,
        );

        let mut ndbvt = DBVT::new();
        let mut leaves = Vec::with_capacity(model.num_points());

        for i in 0..model.num_points() {
            let position = model.position(i);
            let aabb = AABB::new(position, position).loosened(sst.radmrg);
            let tree_volume = aabb.loosened(sst.updmrg);
            let tree_id = ndbvt.insert(DBVTLeaf::new(tree_volume.clone(), i));

            leaves.push(RopeLeaf {
                tree_id,
                aabb,
                tree_volume,
            });
        }

        let mut bounds = leaves[0].aabb.clone();
        for leaf in &leaves[1..] {
            bounds.merge(&leaf.aabb);
        }

        let mut counters = SyncCounters::new(false);
        counters.nleaves = leaves.len();

        CollisionRope {
            model,
            leaves,
            ndbvt,
            bounds,
            sst,
            timescale: config.timescale,
            solver: None,
            collision_disabled: Vec::new(),
            anchors: Vec::new(),
            contacts: Vec::new(),
            counters,
        }
    }

    /// The rod model wrapped by this bridge.
    pub fn model(&self) -> &M {
        &self.model
    }

    /// The mutable rod model wrapped by this bridge.
    pub fn model_mut(&mut self) -> &mut M {
        &mut self.model
    }

    /// The aggregate bound covering every leaf of this rod.
    pub fn bounds(&self) -> &AABB<N> {
        &self.bounds
    }

    /// The number of bounding-volume leaves of this rod.
    pub fn num_leaves(&self) -> usize {
        self.leaves.len()
    }

    /// The bound of the `i`-th mass point, margins included.
    pub fn leaf_aabb(&self, i: usize) -> &AABB<N> {
        &self.leaves[i].aabb
    }

    /// The per-step solver parameters of this rod.
    pub fn solver_state(&self) -> &SolverState<N> {
        &self.sst
    }

    /// The synchronization counters of this rod.
    pub fn counters(&self) -> &SyncCounters {
        &self.counters
    }

    /// The mutable synchronization counters of this rod.
    pub fn counters_mut(&mut self) -> &mut SyncCounters {
        &mut self.counters
    }

    /// Attach a solver to this rod.
    ///
    /// Attaching the solver already attached is a no-op. Attaching while a
    /// different solver is attached is an error; the current attachment is
    /// kept.
    pub fn set_solver(&mut self, solver: SolverId) -> Result<(), CordeError> {
        match self.solver {
            Some(current) if current != solver => Err(CordeError::SolverAlreadyAttached),
            _ => {
                self.solver = Some(solver);
                Ok(())
            }
        }
    }

    /// The solver currently attached to this rod, if any.
    pub fn solver(&self) -> Option<SolverId> {
        self.solver
    }

    /// Detach the current solver and return it.
    pub fn detach_solver(&mut self) -> Option<SolverId> {
        self.solver.take()
    }

    /// Pin the `i`-th mass point to a world position.
    ///
    /// Collisions with the partner holding the anchor are disabled so the
    /// attachment itself does not generate contacts.
    pub fn append_anchor(&mut self, node: usize, partner: CollidableHandle, target: Point<N>) {
        assert!(node < self.model.num_points(), "Node index out of bounds.");
        self.anchors.push(RopeAnchor {
            node,
            partner,
            target,
        });
        self.disable_collision_with(partner);
    }

    /// Remove every anchor held by the given partner and re-enable
    /// collisions with it.
    pub fn remove_anchors(&mut self, partner: CollidableHandle) {
        self.anchors.retain(|a| a.partner != partner);
        self.enable_collision_with(partner);
    }

    /// Add a partner to the exclusion set of this rod.
    pub fn disable_collision_with(&mut self, partner: CollidableHandle) {
        if !self.collision_disabled.contains(&partner) {
            self.collision_disabled.push(partner);
        }
    }

    /// Remove a partner from the exclusion set of this rod.
    pub fn enable_collision_with(&mut self, partner: CollidableHandle) {
        self.collision_disabled.retain(|h| *h != partner);
    }

    /// The indices of the mass points whose tree volume intersects `volume`.
    pub fn overlapping_leaves(&self, volume: &AABB<N>) -> Vec<usize> {
        let mut collector = Vec::new();
        let mut visitor = InterferencesVisitor {
            volume,
            collector: &mut collector,
        };

        self.ndbvt.visit(&mut visitor);
        collector
    }

    /// Generate contacts pushing the rod's points out of a rigid partner's
    /// volume.
    ///
    /// A speculative point found inside the volume (inflated by the radial
    /// margin) is pushed to the nearest face, along the axis of minimum
    /// penetration. The contacts are resolved at `solve_constraints`.
    fn collide_with_volume(&mut self, volume: &AABB<N>) {
        let vol = volume.loosened(self.sst.radmrg);

        for node in 0..self.model.num_points() {
            let point = self.model.predicted_position(node);

            if !contains_point(&vol, &point) {
                continue;
            }

            let mut best = point[0] - vol.mins()[0];
            let mut best_axis = 0;
            let mut positive = false;

            for axis in 0..DIM {
                let low = point[axis] - vol.mins()[axis];
                let high = vol.maxs()[axis] - point[axis];

                if low < best {
                    best = low;
                    best_axis = axis;
                    positive = false;
                }

                if high < best {
                    best = high;
                    best_axis = axis;
                    positive = true;
                }
            }

            let mut target = point;
            let mut normal = Vector::zeros();

            if positive {
                target[best_axis] = vol.maxs()[best_axis];
                normal[best_axis] = N::one();
            } else {
                target[best_axis] = vol.mins()[best_axis];
                normal[best_axis] = -N::one();
            }

            self.contacts.push(RopeContact {
                node,
                target,
                normal: Unit::new_unchecked(normal),
            });
        }
    }
}

impl<N: RealField, M: RodModel<N> + 'static> CollisionRope<N, M> {
    /// Recover a bridge from a generic collidable reference.
    ///
    /// The kind tag is checked first, so partners of another kind are
    /// rejected without a speculative cast.
    pub fn upcast<'a>(object: &'a dyn Collidable<N>) -> Option<&'a Self> {
        if object.kind() == CollidableKind::SoftRope {
            object.downcast_ref::<Self>()
        } else {
            None
        }
    }

    /// Mutable variant of [`CollisionRope::upcast`].
    pub fn upcast_mut<'a>(object: &'a mut dyn Collidable<N>) -> Option<&'a mut Self> {
        if object.kind() == CollidableKind::SoftRope {
            object.downcast_mut::<Self>()
        } else {
            None
        }
    }
}

impl<N: RealField, M: RodModel<N> + 'static> Collidable<N> for CollisionRope<N, M> {
    fn kind(&self) -> CollidableKind {
        CollidableKind::SoftRope
    }

    fn aabb(&self) -> AABB<N> {
        self.bounds.clone()
    }

    fn collision_disabled(&self) -> &[CollidableHandle] {
        &self.collision_disabled
    }

    fn handle_collision(&mut self, partner: &dyn Collidable<N>) {
        match partner.kind() {
            // Rope against rope is left to a dedicated soft-contact solver.
            CollidableKind::SoftRope => {}
            _ => self.collide_with_volume(&partner.aabb()),
        }
    }

    fn predict_motion(&mut self, dt: N) -> Result<(), CordeError> {
        if dt <= N::zero() {
            return Err(CordeError::InvalidTimestep);
        }

        self.counters.prediction_started();
        self.sst.recompute(dt, self.timescale);
        self.model.predict(self.sst.sdt);

        self.counters.sync_started();
        let mut nreinserted = 0;

        for (i, leaf) in self.leaves.iter_mut().enumerate() {
            let aabb = leaf_volume(
                &self.model.position(i),
                &self.model.predicted_position(i),
                &self.model.velocity(i),
                &self.sst,
            );

            if !leaf.tree_volume.contains(&aabb) {
                let _ = self.ndbvt.remove(leaf.tree_id);
                leaf.tree_volume = aabb.loosened(self.sst.updmrg);
                leaf.tree_id = self.ndbvt.insert(DBVTLeaf::new(leaf.tree_volume.clone(), i));
                nreinserted += 1;
            }

            leaf.aabb = aabb;
        }

        self.counters.nreinserted = nreinserted;
        self.counters.sync_completed();

        self.bounds = self.leaves[0].aabb.clone();
        for leaf in &self.leaves[1..] {
            self.bounds.merge(&leaf.aabb);
        }

        self.contacts.clear();
        self.counters.prediction_completed();
        Ok(())
    }

    fn integrate_motion(&mut self, dt: N) -> Result<(), CordeError> {
        if dt <= N::zero() {
            return Err(CordeError::InvalidTimestep);
        }

        self.model.integrate(dt * self.timescale);
        Ok(())
    }

    fn solve_constraints(&mut self) {
        for anchor in &self.anchors {
            self.model.set_position(anchor.node, anchor.target);
            self.model.set_velocity(anchor.node, Vector::zeros());
        }

        for contact in &self.contacts {
            self.model.set_position(contact.node, contact.target);

            let n = *contact.normal;
            let velocity = self.model.velocity(contact.node);
            let vn = velocity.dot(&n);

            if vn < N::zero() {
                self.model.set_velocity(contact.node, velocity - n * vn);
            }
        }
    }
}

#[cfg(test)]
mod test {
    use approx::assert_relative_eq;
    use ncollide::bounding_volume::{BoundingVolume, AABB};

    use crate::math::{Point, Vector};
    use crate::object::{Collidable, CollidableHandle, CollisionRope, RodConfig, RodModel};
    use crate::solver::SolverId;
    use crate::CordeError;

    fn centerline(n: usize, spacing: f64) -> Vec<Point<f64>> {
        (0..n)
            .map(|i| Point::new(i as f64 * spacing, 0.0, 0.0))
            .collect()
    }

    /// A configuration with no gravity and no velocity margin, so bounds at
    /// rest are easy to predict.
    fn rest_config() -> RodConfig<f64> {
        RodConfig {
            gravity: Vector::zeros(),
            velocity_margin: 0.0,
            radial_margin: 0.05,
            ..RodConfig::default()
        }
    }

    /// A configuration with no internal forces at all: points only move when
    /// a test moves them, so leaf volumes are exactly predictable.
    fn slack_config() -> RodConfig<f64> {
        RodConfig {
            stretch_stiffness: 0.0,
            bend_stiffness: 0.0,
            damping: 0.0,
            ..rest_config()
        }
    }

    #[test]
    fn rest_leaves_apply_the_radial_margin() {
        let mut rope = CollisionRope::from_centerline(&centerline(5, 0.2), &rest_config());
        rope.predict_motion(0.01).unwrap();

        for i in 0..rope.num_leaves() {
            let x = i as f64 * 0.2;
            let leaf = rope.leaf_aabb(i);
            assert_relative_eq!(*leaf.mins(), Point::new(x - 0.05, -0.05, -0.05));
            assert_relative_eq!(*leaf.maxs(), Point::new(x + 0.05, 0.05, 0.05));
        }

        let bounds = rope.bounds();
        assert_relative_eq!(*bounds.mins(), Point::new(-0.05, -0.05, -0.05));
        assert_relative_eq!(*bounds.maxs(), Point::new(0.85, 0.05, 0.05));
    }

    #[test]
    fn prediction_covers_the_current_and_predicted_positions() {
        let mut config = rest_config();
        config.gravity = Vector::new(0.0, -9.81, 0.0);

        let mut rope = CollisionRope::from_centerline(&centerline(4, 0.25), &rest_config());
        let mut falling = CollisionRope::from_centerline(&centerline(4, 0.25), &config);

        rope.predict_motion(0.05).unwrap();
        falling.predict_motion(0.05).unwrap();

        for i in 0..falling.num_leaves() {
            let leaf = falling.leaf_aabb(i);
            let current = falling.model().position(i);
            let predicted = falling.model().predicted_position(i);

            assert!(super::contains_point(leaf, &current));
            assert!(super::contains_point(leaf, &predicted));

            // The falling leaf strictly contains the resting one.
            assert!(leaf.contains(rope.leaf_aabb(i)));
        }
    }

    #[test]
    fn leaf_reinsertion_honors_the_update_margin() {
        let mut rope = CollisionRope::from_centerline(&centerline(4, 1.0), &slack_config());
        rope.predict_motion(0.01).unwrap();
        assert_eq!(rope.counters().nreinserted, 0);

        // A displacement within the update margin: the recorded tree volume
        // still contains the new leaf, no reinsertion happens.
        rope.model_mut().set_position(0, Point::new(0.01, 0.0, 0.0));
        rope.predict_motion(0.01).unwrap();
        assert_eq!(rope.counters().nreinserted, 0);

        // A displacement escaping the tree volume: exactly that one leaf is
        // removed and reinserted.
        rope.model_mut().set_position(0, Point::new(-1.0, 0.0, 0.0));
        rope.predict_motion(0.01).unwrap();
        assert_eq!(rope.counters().nreinserted, 1);

        // The tree tracked the move.
        let volume = AABB::new(Point::new(-1.1, -0.1, -0.1), Point::new(-0.9, 0.1, 0.1));
        assert_eq!(rope.overlapping_leaves(&volume), vec![0]);

        // Nothing moved since the last prediction: back to zero.
        rope.predict_motion(0.01).unwrap();
        assert_eq!(rope.counters().nreinserted, 0);
    }

    #[test]
    fn the_velocity_margin_expands_leaves_only_along_the_motion() {
        let config = RodConfig {
            velocity_margin: 1.0,
            ..slack_config()
        };

        let mut rope = CollisionRope::from_centerline(&centerline(3, 1.0), &config);
        rope.model_mut().set_velocity(0, Vector::new(2.0, 0.0, 0.0));
        rope.predict_motion(0.01).unwrap();

        // Point 0 moves from x = 0 to x = 0.02; the velocity expansion adds
        // another 2.0 * 1.0 * 0.01 on the +x side only.
        let leaf = rope.leaf_aabb(0);
        assert_relative_eq!(*leaf.mins(), Point::new(-0.05, -0.05, -0.05));
        assert_relative_eq!(*leaf.maxs(), Point::new(0.09, 0.05, 0.05));

        // A stationary point keeps the symmetric radial margin.
        let leaf = rope.leaf_aabb(1);
        assert_relative_eq!(*leaf.mins(), Point::new(0.95, -0.05, -0.05));
        assert_relative_eq!(*leaf.maxs(), Point::new(1.05, 0.05, 0.05));
    }

    #[test]
    fn prediction_is_idempotent() {
        let mut rope = CollisionRope::from_centerline(&centerline(5, 0.2), &rest_config());
        rope.predict_motion(0.01).unwrap();

        let bounds = rope.bounds().clone();
        let leaf = rope.leaf_aabb(2).clone();

        rope.predict_motion(0.01).unwrap();

        assert_relative_eq!(*rope.bounds().mins(), *bounds.mins());
        assert_relative_eq!(*rope.bounds().maxs(), *bounds.maxs());
        assert_relative_eq!(*rope.leaf_aabb(2).mins(), *leaf.mins());
        assert_relative_eq!(*rope.leaf_aabb(2).maxs(), *leaf.maxs());
    }

    #[test]
    fn an_invalid_timestep_is_rejected_before_any_mutation() {
        let mut rope = CollisionRope::from_centerline(&centerline(4, 0.25), &RodConfig::default());
        rope.predict_motion(0.01).unwrap();

        let bounds = rope.bounds().clone();
        let position = rope.model().position(2);

        assert_eq!(rope.predict_motion(0.0), Err(CordeError::InvalidTimestep));
        assert_eq!(rope.predict_motion(-0.01), Err(CordeError::InvalidTimestep));
        assert_eq!(rope.integrate_motion(0.0), Err(CordeError::InvalidTimestep));

        assert_relative_eq!(*rope.bounds().mins(), *bounds.mins());
        assert_relative_eq!(*rope.bounds().maxs(), *bounds.maxs());
        assert_relative_eq!(rope.model().position(2), position);
    }

    #[test]
    fn leaves_track_the_mass_points() {
        for n in 2..8 {
            let mut rope = CollisionRope::from_centerline(&centerline(n, 0.2), &RodConfig::default());
            assert_eq!(rope.num_leaves(), n);

            for _ in 0..10 {
                rope.predict_motion(0.01).unwrap();
                rope.integrate_motion(0.01).unwrap();
            }

            assert_eq!(rope.num_leaves(), n);
            for i in 0..n {
                assert!(super::contains_point(
                    rope.leaf_aabb(i),
                    &rope.model().position(i)
                ));
            }
        }
    }

    #[test]
    fn upcast_checks_the_kind_tag() {
        use crate::math::Isometry;
        use crate::object::Ground;
        use ncollide::shape::{Cuboid, ShapeHandle};

        let rope = CollisionRope::from_centerline(&centerline(3, 0.2), &RodConfig::default());
        let ground = Ground::new(
            ShapeHandle::new(Cuboid::new(Vector::new(1.0, 0.1, 1.0))),
            Isometry::identity(),
        );

        let as_collidable: &dyn Collidable<f64> = &rope;
        assert!(CollisionRope::<f64>::upcast(as_collidable).is_some());

        let as_collidable: &dyn Collidable<f64> = &ground;
        assert!(CollisionRope::<f64>::upcast(as_collidable).is_none());
    }

    #[test]
    fn solver_attachment_is_exclusive() {
        let mut rope = CollisionRope::from_centerline(&centerline(3, 0.2), &RodConfig::default());

        assert_eq!(rope.solver(), None);
        assert_eq!(rope.set_solver(SolverId(1)), Ok(()));
        assert_eq!(rope.set_solver(SolverId(1)), Ok(()));
        assert_eq!(
            rope.set_solver(SolverId(2)),
            Err(CordeError::SolverAlreadyAttached)
        );
        assert_eq!(rope.solver(), Some(SolverId(1)));

        assert_eq!(rope.detach_solver(), Some(SolverId(1)));
        assert_eq!(rope.set_solver(SolverId(2)), Ok(()));
    }

    #[test]
    fn anchors_pin_points_and_extend_the_exclusion_set() {
        let mut rope = CollisionRope::from_centerline(&centerline(4, 0.25), &RodConfig::default());
        let partner = CollidableHandle(7);
        let target = Point::new(0.0, 1.0, 0.0);

        rope.append_anchor(0, partner, target);
        assert_eq!(rope.collision_disabled(), &[partner]);

        for _ in 0..5 {
            rope.predict_motion(0.01).unwrap();
            rope.integrate_motion(0.01).unwrap();
            rope.solve_constraints();
        }

        assert_relative_eq!(rope.model().position(0), target);
        assert_relative_eq!(rope.model().velocity(0), Vector::zeros());

        // Unanchored points keep falling.
        assert!(rope.model().position(3).y < 0.0);

        rope.remove_anchors(partner);
        assert!(rope.collision_disabled().is_empty());
    }

    #[test]
    fn overlapping_leaves_queries_the_tree() {
        let mut rope = CollisionRope::from_centerline(&centerline(5, 1.0), &rest_config());
        rope.predict_motion(0.01).unwrap();

        let volume = AABB::new(Point::new(1.9, -0.5, -0.5), Point::new(3.1, 0.5, 0.5));
        let mut hits = rope.overlapping_leaves(&volume);
        hits.sort();

        assert_eq!(hits, vec![2, 3]);
    }
}
