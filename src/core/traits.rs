//! Core capability traits: the seams between the time-stepping machinery and
//! the problem-specific collaborators.

use crate::core::rhs::Rhs;
use crate::error::PfasstError;
use crate::level::LevelState;

/// An initial value problem `u' = f(u, t)` posed on a flat vector of dofs.
///
/// The controller never looks inside the spatial discretization; it only
/// evaluates the rhs, solves the backward-Euler-type system
/// `u - factor * f_I(u, t) = rhs` and asks for reference values.
pub trait Problem {
    /// Solution vector type.
    type State: Clone + AsRef<[f64]> + AsMut<[f64]> + From<Vec<f64>>;

    /// Number of degrees of freedom.
    fn dofs(&self) -> usize;

    /// A typed zero value of the problem's state type.
    fn init_value(&self) -> Self::State;

    /// Evaluate the rhs at `(u, t)`.
    fn eval_f(&self, u: &Self::State, t: f64) -> Result<Rhs<Self::State>, PfasstError>;

    /// Solve `u - factor * f_I(u, t) = rhs`, starting from the guess `u0`.
    fn solve_system(
        &self,
        rhs: &Self::State,
        factor: f64,
        u0: &Self::State,
        t: f64,
    ) -> Result<Self::State, PfasstError>;

    /// Exact (or reference) solution at time `t`.
    fn u_exact(&self, t: f64) -> Result<Self::State, PfasstError>;
}

/// One SDC correction sweep on a level's collocation nodes.
///
/// Implementations own the quadrature matrices and the Q-delta
/// preconditioner; all mutable per-step data lives in the [`LevelState`]
/// passed in.
pub trait Sweeper<V> {
    /// Spread the initial value to all nodes and evaluate the rhs there.
    fn predict(
        &self,
        lvl: &mut LevelState<V>,
        prob: &dyn Problem<State = V>,
    ) -> Result<(), PfasstError>;

    /// One full correction sweep: node-local implicit solves against the
    /// Q-delta preconditioner, combining fresh node values with the
    /// quadrature integral of the previous iterate.
    fn update_nodes(
        &self,
        lvl: &mut LevelState<V>,
        prob: &dyn Problem<State = V>,
    ) -> Result<(), PfasstError>;

    /// Quadrature-weighted defect against the collocation equation; stores
    /// the norm on the level.
    fn compute_residual(&self, lvl: &mut LevelState<V>) -> Result<(), PfasstError>;

    /// Value at the right edge of the interval, either the last node or the
    /// collocation update.
    fn compute_end_point(&self, lvl: &mut LevelState<V>) -> Result<(), PfasstError>;

    /// `dt * Q * F` per node, without the FAS correction (callers add it
    /// where the algorithm asks for it).
    fn integrate(&self, lvl: &LevelState<V>) -> Result<Vec<V>, PfasstError>;

    /// Number of collocation nodes M.
    fn num_nodes(&self) -> usize;

    /// Collocation abscissae on the unit interval.
    fn nodes(&self) -> &[f64];

    /// Whether the end point equals the last node value. Required for
    /// time-parallel runs, where the end point is shipped downstream as-is.
    fn end_point_is_node(&self) -> bool;
}

/// Spatial restriction/prolongation between the meshes of two adjacent
/// levels. A round trip at matching resolutions must be the identity.
pub trait SpaceTransfer<V> {
    fn restrict(&self, fine: &V) -> Result<V, PfasstError>;
    fn prolong(&self, coarse: &V) -> Result<V, PfasstError>;
}
