use na::{self, DVector, RealField, Unit};

use crate::math::{Dim, Point, Vector, DIM};
use crate::object::rod::{RodConfig, RodModel};

#[derive(Clone)]
struct LengthConstraint<N: RealField> {
    nodes: (usize, usize),
    rest_length: N,
    stiffness: N,
}

impl<N: RealField> LengthConstraint<N> {
    fn from_positions(nodes: (usize, usize), positions: &[N], stiffness: N) -> Self {
        let p0 = Point::from_slice(&positions[nodes.0..nodes.0 + DIM]);
        let p1 = Point::from_slice(&positions[nodes.1..nodes.1 + DIM]);

        LengthConstraint {
            nodes,
            rest_length: na::distance(&p0, &p1),
            stiffness,
        }
    }
}

/// A rod modeled as a chain of mass points with stretch and bend constraints.
///
/// Stretch constraints link consecutive points; bend constraints link second
/// neighbors. The speculative advance is a semi-implicit Euler step kept in a
/// separate buffer; the commit copies that buffer and then runs a fixed
/// number of position-projection iterations over the constraints.
pub struct Corde<N: RealField> {
    positions: DVector<N>,
    velocities: DVector<N>,
    accelerations: DVector<N>,
    predicted_positions: DVector<N>,
    predicted_velocities: DVector<N>,
    workspace: DVector<N>,
    constraints: Vec<LengthConstraint<N>>,
    node_mass: N,
    inv_node_mass: N,
    gravity: Vector<N>,
    damping: N,
    solver_iterations: usize,
}

impl<N: RealField> Corde<N> {
    /// Builds a rod from an initial center-line.
    ///
    /// The rod is initialized at rest, with the rest length of every
    /// constraint taken from the center-line itself.
    pub fn new(centerline: &[Point<N>], config: &RodConfig<N>) -> Self {
        assert!(
            centerline.len() >= 2,
            "A rod needs at least two mass points."
        );

        let ndofs = centerline.len() * DIM;
        let mut positions = DVector::zeros(ndofs);

        for (i, pos) in positions.as_mut_slice().chunks_mut(DIM).enumerate() {
            pos.copy_from_slice(centerline[i].coords.as_slice())
        }

        let mut constraints = Vec::with_capacity(2 * centerline.len());

        for i in 0..centerline.len() - 1 {
            constraints.push(LengthConstraint::from_positions(
                (i * DIM, (i + 1) * DIM),
                positions.as_slice(),
                config.stretch_stiffness,
            ));
        }

        for i in 0..centerline.len() - 2 {
            constraints.push(LengthConstraint::from_positions(
                (i * DIM, (i + 2) * DIM),
                positions.as_slice(),
                config.bend_stiffness,
            ));
        }

        let node_mass = config.mass / na::convert(centerline.len() as f64);

        Corde {
            predicted_positions: positions.clone(),
            positions,
            velocities: DVector::zeros(ndofs),
            accelerations: DVector::zeros(ndofs),
            predicted_velocities: DVector::zeros(ndofs),
            workspace: DVector::zeros(ndofs),
            constraints,
            node_mass,
            inv_node_mass: N::one() / node_mass,
            gravity: config.gravity,
            damping: config.damping,
            solver_iterations: config.solver_iterations,
        }
    }

    /// The number of internal constraints of this rod.
    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    /// The mass of one point of this rod.
    pub fn node_mass(&self) -> N {
        self.node_mass
    }

    fn update_accelerations(&mut self) {
        self.accelerations.fill(N::zero());

        for i in 0..self.positions.len() / DIM {
            let mut acc = self.accelerations.fixed_rows_mut::<Dim>(i * DIM);
            acc += &self.gravity;
        }

        for constraint in &self.constraints {
            let p0 = self.positions.fixed_rows::<Dim>(constraint.nodes.0);
            let p1 = self.positions.fixed_rows::<Dim>(constraint.nodes.1);
            let l = p1 - p0;

            if let Some((dir, length)) = Unit::try_new_and_get(l, N::zero()) {
                let dir = dir.into_inner();
                let v0 = self.velocities.fixed_rows::<Dim>(constraint.nodes.0);
                let v1 = self.velocities.fixed_rows::<Dim>(constraint.nodes.1);

                let err = length - constraint.rest_length;
                let relvel = (v1 - v0).dot(&dir);
                let force = dir
                    * ((constraint.stiffness * err + self.damping * relvel)
                        * self.inv_node_mass);

                {
                    let mut acc = self.accelerations.fixed_rows_mut::<Dim>(constraint.nodes.0);
                    acc += &force;
                }
                {
                    let mut acc = self.accelerations.fixed_rows_mut::<Dim>(constraint.nodes.1);
                    acc -= &force;
                }
            }
        }
    }

    fn project_constraints(&mut self) {
        let half: N = na::convert(0.5);

        for _ in 0..self.solver_iterations {
            for constraint in &self.constraints {
                let p0 = self.positions.fixed_rows::<Dim>(constraint.nodes.0);
                let p1 = self.positions.fixed_rows::<Dim>(constraint.nodes.1);
                let l = p1 - p0;

                if let Some((dir, length)) = Unit::try_new_and_get(l, N::zero()) {
                    // Projection weight in [0, 1).
                    let weight = constraint.stiffness / (constraint.stiffness + N::one());
                    let corr = dir.into_inner()
                        * ((length - constraint.rest_length) * weight * half);

                    {
                        let mut p = self.positions.fixed_rows_mut::<Dim>(constraint.nodes.0);
                        p += &corr;
                    }
                    {
                        let mut p = self.positions.fixed_rows_mut::<Dim>(constraint.nodes.1);
                        p -= &corr;
                    }
                }
            }
        }
    }
}

impl<N: RealField> RodModel<N> for Corde<N> {
    fn num_points(&self) -> usize {
        self.positions.len() / DIM
    }

    fn position(&self, i: usize) -> Point<N> {
        Point::from_slice(&self.positions.as_slice()[i * DIM..(i + 1) * DIM])
    }

    fn velocity(&self, i: usize) -> Vector<N> {
        self.velocities.fixed_rows::<Dim>(i * DIM).into_owned()
    }

    fn predicted_position(&self, i: usize) -> Point<N> {
        Point::from_slice(&self.predicted_positions.as_slice()[i * DIM..(i + 1) * DIM])
    }

    fn predict(&mut self, dt: N) {
        self.update_accelerations();

        self.predicted_velocities.copy_from(&self.velocities);
        self.predicted_velocities.axpy(dt, &self.accelerations, N::one());

        self.predicted_positions.copy_from(&self.positions);
        self.predicted_positions
            .axpy(dt, &self.predicted_velocities, N::one());
    }

    fn integrate(&mut self, dt: N) {
        self.workspace.copy_from(&self.positions);
        self.positions.copy_from(&self.predicted_positions);

        self.project_constraints();

        // Velocities consistent with the projected positions.
        self.velocities.copy_from(&self.positions);
        self.velocities -= &self.workspace;
        self.velocities *= N::one() / dt;
    }

    fn set_position(&mut self, i: usize, position: Point<N>) {
        self.positions
            .fixed_rows_mut::<Dim>(i * DIM)
            .copy_from(&position.coords);
    }

    fn set_velocity(&mut self, i: usize, velocity: Vector<N>) {
        self.velocities
            .fixed_rows_mut::<Dim>(i * DIM)
            .copy_from(&velocity);
    }
}

#[cfg(test)]
mod test {
    use approx::assert_relative_eq;

    use crate::math::{Point, Vector};
    use crate::object::{Corde, RodConfig, RodModel};

    fn centerline(n: usize, spacing: f64) -> Vec<Point<f64>> {
        (0..n)
            .map(|i| Point::new(i as f64 * spacing, 0.0, 0.0))
            .collect()
    }

    #[test]
    fn construction_builds_stretch_and_bend_constraints() {
        let rod = Corde::new(&centerline(5, 0.3), &RodConfig::default());
        assert_eq!(rod.num_points(), 5);
        assert_eq!(rod.num_constraints(), 4 + 3);

        let rod = Corde::new(&centerline(2, 0.3), &RodConfig::default());
        assert_eq!(rod.num_constraints(), 1);
    }

    #[test]
    fn prediction_leaves_the_committed_state_untouched() {
        let mut rod = Corde::new(&centerline(4, 0.25), &RodConfig::default());
        rod.predict(0.01);

        for i in 0..rod.num_points() {
            assert_relative_eq!(rod.position(i), Point::new(i as f64 * 0.25, 0.0, 0.0));
            assert_relative_eq!(rod.velocity(i), Vector::zeros());
        }

        // The speculative state did move under gravity.
        for i in 0..rod.num_points() {
            assert!(rod.predicted_position(i).y < 0.0);
        }
    }

    #[test]
    fn integration_commits_the_predicted_state() {
        let mut rod = Corde::new(&centerline(4, 0.25), &RodConfig::default());
        rod.predict(0.01);
        rod.integrate(0.01);

        for i in 0..rod.num_points() {
            assert!(rod.position(i).y < 0.0);
            assert!(rod.velocity(i).y < 0.0);
        }
    }

    #[test]
    fn stretch_projection_keeps_segments_near_their_rest_length() {
        let mut rod = Corde::new(&centerline(6, 0.2), &RodConfig::default());

        for _ in 0..50 {
            rod.predict(0.005);
            rod.integrate(0.005);
        }

        for i in 0..rod.num_points() - 1 {
            let length = na::distance(&rod.position(i), &rod.position(i + 1));
            assert!((length - 0.2).abs() < 0.05, "segment length drifted: {}", length);
        }
    }
}
