use na::RealField;

/// Per-step scalar parameters governing how predicted motion is translated
/// into bound inflation.
///
/// The state is recomputed at the start of every prediction from the
/// externally supplied timestep and is read-only during the remainder of the
/// step. `isdt` is undefined while `sdt` is zero, i.e. before the first
/// prediction.
#[derive(Copy, Clone, Debug)]
pub struct SolverState<N: RealField> {
    /// The effective timestep: raw timestep times the timescale factor.
    pub sdt: N,
    /// The inverse of the effective timestep. Must not be read while `sdt`
    /// is zero.
    pub isdt: N,
    /// The velocity margin: bound inflation along the motion direction, per
    /// unit of predicted displacement.
    pub velmrg: N,
    /// The radial margin: fixed bound inflation applied to every leaf.
    pub radmrg: N,
    /// The update margin: hysteresis applied to tree volumes so slowly
    /// moving leaves are not reinserted every tick.
    pub updmrg: N,
}

impl<N: RealField> SolverState<N> {
    /// Creates a solver state with the given margins and a zero timestep.
    pub fn new(velmrg: N, radmrg: N, updmrg: N) -> Self {
        SolverState {
            sdt: N::zero(),
            isdt: N::zero(),
            velmrg,
            radmrg,
            updmrg,
        }
    }

    /// Recompute the effective timestep and its inverse from a raw timestep.
    ///
    /// The timestep must be strictly positive; callers validate before
    /// calling this.
    pub fn recompute(&mut self, dt: N, timescale: N) {
        assert!(
            dt > N::zero(),
            "The timestep must be strictly positive."
        );
        self.sdt = dt * timescale;
        self.isdt = N::one() / self.sdt;
    }
}
