//! One space/time resolution instance: collocation state plus its sweeper
//! and problem.

use crate::core::rhs::Rhs;
use crate::core::traits::{Problem, Sweeper};
use crate::error::PfasstError;

/// Mutable per-step numerics of a level.
///
/// `u` and `f` hold M+1 entries: index 0 is the left interval edge, indices
/// 1..=M the collocation nodes. The residual is defined only after at least
/// one sweep.
pub struct LevelState<V> {
    /// Start of the owned time interval.
    pub time: f64,
    /// Step size of the owned time interval.
    pub dt: f64,
    pub u: Vec<V>,
    pub f: Vec<Rhs<V>>,
    /// Value at the right interval edge, set by `compute_end_point`.
    pub uend: Option<V>,
    /// FAS correction per node, set on coarse levels by the restriction.
    pub tau: Option<Vec<V>>,
    /// Norm of the collocation defect after the latest sweep.
    pub residual: Option<f64>,
}

/// A level couples its state with the sweeper and problem collaborators
/// chosen at setup.
pub struct Level<V> {
    pub index: usize,
    pub state: LevelState<V>,
    pub sweeper: Box<dyn Sweeper<V>>,
    pub problem: Box<dyn Problem<State = V>>,
    /// Node values saved before the last restriction, consumed by the next
    /// prolongation to form a correction.
    pub uold: Option<Vec<V>>,
}

impl<V> Level<V>
where
    V: Clone + AsRef<[f64]> + AsMut<[f64]> + From<Vec<f64>>,
{
    pub fn new(
        index: usize,
        problem: Box<dyn Problem<State = V>>,
        sweeper: Box<dyn Sweeper<V>>,
        dt: f64,
    ) -> Self {
        let m = sweeper.num_nodes();
        let zero = problem.init_value();
        let state = LevelState {
            time: 0.0,
            dt,
            u: vec![zero.clone(); m + 1],
            f: vec![Rhs::Full(zero); m + 1],
            uend: None,
            tau: None,
            residual: None,
        };
        Self {
            index,
            state,
            sweeper,
            problem,
            uold: None,
        }
    }

    pub fn num_nodes(&self) -> usize {
        self.sweeper.num_nodes()
    }

    pub fn dofs(&self) -> usize {
        self.problem.dofs()
    }

    /// Clear everything derived, keeping the allocation; called at block
    /// restarts before the new initial value arrives.
    pub fn reset(&mut self, time: f64) {
        self.state.time = time;
        self.state.uend = None;
        self.state.tau = None;
        self.state.residual = None;
        self.uold = None;
    }

    /// Install a received (or seeded) initial value. Receipt re-derives the
    /// rhs at the interval start rather than copying it.
    pub fn accept_initial(&mut self, u0: V) -> Result<(), PfasstError> {
        let t = self.state.time;
        self.state.f[0] = self.problem.eval_f(&u0, t)?;
        self.state.u[0] = u0;
        Ok(())
    }

    pub fn predict(&mut self) -> Result<(), PfasstError> {
        self.sweeper.predict(&mut self.state, self.problem.as_ref())
    }

    pub fn sweep(&mut self) -> Result<(), PfasstError> {
        self.sweeper
            .update_nodes(&mut self.state, self.problem.as_ref())
    }

    pub fn compute_residual(&mut self) -> Result<(), PfasstError> {
        self.sweeper.compute_residual(&mut self.state)
    }

    pub fn compute_end_point(&mut self) -> Result<(), PfasstError> {
        self.sweeper.compute_end_point(&mut self.state)
    }

    pub fn integrate(&self) -> Result<Vec<V>, PfasstError> {
        self.sweeper.integrate(&self.state)
    }

    /// The end point to ship downstream; an error before `compute_end_point`
    /// ran is an ordering bug in the controller.
    pub fn uend(&self) -> Result<&V, PfasstError> {
        self.state
            .uend
            .as_ref()
            .ok_or(PfasstError::Internal("end point requested before computed"))
    }
}
