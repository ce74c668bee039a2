//! One time slice: an ordered hierarchy of levels (finest first) plus the
//! control state driven by the controllers.

use crate::core::traits::SpaceTransfer;
use crate::error::PfasstError;
use crate::level::Level;
use crate::parallel::BlockLayout;
use crate::utils::linalg::axpy;

/// Stages of the per-step state machine. The enum is exhaustive on purpose:
/// there is no representable "unknown stage", so the fatal-on-unknown rule
/// of the original design moves into the type system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Spread,
    Predict,
    ItFine,
    ItCheck,
    ItUp,
    ItCoarseRecv,
    ItCoarse,
    ItDown,
    Done,
}

/// Per-step mutable control state, reset at every block restart.
#[derive(Debug, Clone)]
pub struct StepStatus {
    pub stage: Stage,
    /// Iteration counter, starting at 1; incremented only in `ItCheck` when
    /// the step keeps iterating.
    pub iter: usize,
    pub done: bool,
    /// Whether the predecessor reported done; pipelined stopping gate.
    pub prev_done: bool,
    pub slot: usize,
    pub first: bool,
    pub last: bool,
}

impl StepStatus {
    pub fn new(layout: &BlockLayout) -> Self {
        Self {
            stage: Stage::Spread,
            iter: 1,
            done: false,
            prev_done: false,
            slot: layout.slot,
            first: layout.first(),
            last: layout.last(),
        }
    }
}

/// Stage reached after spreading the initial guess.
pub fn stage_after_spread(num_levels: usize, num_procs: usize, predict: bool) -> Stage {
    if num_levels > 1 && predict {
        Stage::Predict
    } else if num_levels > 1 {
        Stage::ItFine
    } else if num_procs > 1 {
        Stage::ItCoarse
    } else {
        Stage::ItFine
    }
}

/// Stage reached from `ItCheck` when the step keeps iterating.
pub fn stage_after_check(num_levels: usize, num_procs: usize) -> Stage {
    if num_levels > 1 {
        Stage::ItUp
    } else if num_procs > 1 {
        Stage::ItCoarseRecv
    } else {
        Stage::ItFine
    }
}

/// Stage reached after the coarsest sweep.
pub fn stage_after_coarse(num_levels: usize) -> Stage {
    if num_levels > 1 {
        Stage::ItDown
    } else {
        Stage::ItCheck
    }
}

pub struct Step<V> {
    /// Levels ordered finest (index 0) to coarsest.
    pub levels: Vec<Level<V>>,
    /// `transfers[l]` maps between levels `l` (fine) and `l + 1` (coarse).
    pub transfers: Vec<Box<dyn SpaceTransfer<V>>>,
    pub status: StepStatus,
    pub dt: f64,
}

impl<V> Step<V>
where
    V: Clone + AsRef<[f64]> + AsMut<[f64]> + From<Vec<f64>>,
{
    pub fn new(
        levels: Vec<Level<V>>,
        transfers: Vec<Box<dyn SpaceTransfer<V>>>,
        dt: f64,
    ) -> Result<Self, PfasstError> {
        if levels.is_empty() {
            return Err(PfasstError::Config("a step needs at least one level".into()));
        }
        if transfers.len() + 1 != levels.len() {
            return Err(PfasstError::Config(format!(
                "{} levels need {} transfers, got {}",
                levels.len(),
                levels.len() - 1,
                transfers.len()
            )));
        }
        let m0 = levels[0].num_nodes();
        if levels.iter().any(|l| l.num_nodes() != m0) {
            return Err(PfasstError::Config(
                "all levels of a step must share one collocation rule".into(),
            ));
        }
        if !(dt.is_finite() && dt > 0.0) {
            return Err(PfasstError::Config(format!("step size must be positive, got {dt}")));
        }
        let status = StepStatus::new(&BlockLayout::new(0, 1));
        Ok(Self {
            levels,
            transfers,
            status,
            dt,
        })
    }

    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    pub fn coarsest(&self) -> usize {
        self.levels.len() - 1
    }

    /// Reset for a new block: fresh status, level clocks moved to `time`,
    /// finest level seeded with `u0`.
    pub fn restart(&mut self, layout: &BlockLayout, time: f64, u0: &V) -> Result<(), PfasstError> {
        self.status = StepStatus::new(layout);
        for lvl in &mut self.levels {
            lvl.reset(time);
            lvl.state.dt = self.dt;
        }
        self.levels[0].accept_initial(u0.clone())
    }

    /// Fine-to-coarse transfer between `fine` and `fine + 1`: restrict node
    /// values, re-derive the coarse rhs, compute the FAS correction and
    /// remember the pre-sweep coarse values for the next prolongation.
    pub fn restrict(&mut self, fine: usize) -> Result<(), PfasstError> {
        if fine + 1 >= self.levels.len() {
            return Err(PfasstError::Internal("restriction below the coarsest level"));
        }
        let (left, right) = self.levels.split_at_mut(fine + 1);
        let fl = &left[fine];
        let cl = &mut right[0];
        let tr = &self.transfers[fine];
        let m = cl.num_nodes();

        for node in 0..=m {
            cl.state.u[node] = tr.restrict(&fl.state.u[node])?;
        }
        cl.state.f[0] = cl.problem.eval_f(&cl.state.u[0], cl.state.time)?;
        for node in 1..=m {
            let t = cl.state.time + cl.state.dt * cl.sweeper.nodes()[node - 1];
            cl.state.f[node] = cl.problem.eval_f(&cl.state.u[node], t)?;
        }

        let mut fine_int = fl.integrate()?;
        if let Some(tau_f) = &fl.state.tau {
            for (fi, tf) in fine_int.iter_mut().zip(tau_f) {
                axpy(1.0, tf.as_ref(), fi.as_mut());
            }
        }
        let coarse_int = cl.integrate()?;
        let mut tau = Vec::with_capacity(m);
        for node in 0..m {
            let mut t = tr.restrict(&fine_int[node])?;
            axpy(-1.0, coarse_int[node].as_ref(), t.as_mut());
            tau.push(t);
        }
        cl.state.tau = Some(tau);
        cl.uold = Some(cl.state.u.clone());
        cl.state.residual = None;
        cl.state.uend = None;
        Ok(())
    }

    /// Coarse-to-fine transfer between `coarse` and `coarse - 1`: prolong
    /// the coarse *correction* and re-derive the fine rhs.
    pub fn prolong(&mut self, coarse: usize) -> Result<(), PfasstError> {
        if coarse == 0 || coarse >= self.levels.len() {
            return Err(PfasstError::Internal("prolongation above the finest level"));
        }
        let (left, right) = self.levels.split_at_mut(coarse);
        let fl = &mut left[coarse - 1];
        let cl = &right[0];
        let tr = &self.transfers[coarse - 1];
        let m = cl.num_nodes();

        let uold = cl
            .uold
            .as_ref()
            .ok_or(PfasstError::Internal("prolongation before restriction"))?;
        for node in 0..=m {
            let mut diff = cl.state.u[node].clone();
            axpy(-1.0, uold[node].as_ref(), diff.as_mut());
            let corr = tr.prolong(&diff)?;
            axpy(1.0, corr.as_ref(), fl.state.u[node].as_mut());
        }
        fl.state.f[0] = fl.problem.eval_f(&fl.state.u[0], fl.state.time)?;
        for node in 1..=m {
            let t = fl.state.time + fl.state.dt * fl.sweeper.nodes()[node - 1];
            fl.state.f[node] = fl.problem.eval_f(&fl.state.u[node], t)?;
        }
        fl.state.residual = None;
        fl.state.uend = None;
        Ok(())
    }

    /// Restrict through the whole hierarchy, finest to coarsest.
    pub fn restrict_to_coarsest(&mut self) -> Result<(), PfasstError> {
        for l in 0..self.levels.len() - 1 {
            self.restrict(l)?;
        }
        Ok(())
    }

    /// Prolong through the whole hierarchy, coarsest to finest, without
    /// intermediate sweeps (predictor tail).
    pub fn prolong_to_finest(&mut self) -> Result<(), PfasstError> {
        for l in (1..self.levels.len()).rev() {
            self.prolong(l)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{NodeFamily, QDeltaKind, SweeperOptions};
    use crate::level::Level;
    use crate::problem::TestEquation;
    use crate::sweeper::GenericImplicit;
    use crate::transfer::Trivial;

    fn two_level_step() -> Step<Vec<f64>> {
        let opts = SweeperOptions::new(3, NodeFamily::GaussRadauRight)
            .with_qdelta(QDeltaKind::ImplicitEuler);
        let mk_level = |idx| {
            Level::new(
                idx,
                Box::new(TestEquation::new(vec![-1.0])),
                Box::new(GenericImplicit::new(&opts).unwrap()),
                0.1,
            )
        };
        Step::new(vec![mk_level(0), mk_level(1)], vec![Box::new(Trivial)], 0.1).unwrap()
    }

    #[test]
    fn spread_branches() {
        assert_eq!(stage_after_spread(2, 1, true), Stage::Predict);
        assert_eq!(stage_after_spread(2, 1, false), Stage::ItFine);
        assert_eq!(stage_after_spread(1, 4, true), Stage::ItCoarse);
        assert_eq!(stage_after_spread(1, 1, true), Stage::ItFine);
    }

    #[test]
    fn check_branches() {
        assert_eq!(stage_after_check(2, 4), Stage::ItUp);
        assert_eq!(stage_after_check(1, 4), Stage::ItCoarseRecv);
        assert_eq!(stage_after_check(1, 1), Stage::ItFine);
    }

    #[test]
    fn coarse_branches() {
        assert_eq!(stage_after_coarse(2), Stage::ItDown);
        assert_eq!(stage_after_coarse(1), Stage::ItCheck);
    }

    #[test]
    fn rejects_mismatched_transfer_count() {
        let opts = SweeperOptions::new(2, NodeFamily::GaussRadauRight)
            .with_qdelta(QDeltaKind::ImplicitEuler);
        let lvl = Level::<Vec<f64>>::new(
            0,
            Box::new(TestEquation::new(vec![-1.0])),
            Box::new(GenericImplicit::new(&opts).unwrap()),
            0.1,
        );
        assert!(Step::new(vec![lvl], vec![Box::new(Trivial)], 0.1).is_err());
    }

    #[test]
    fn identical_levels_produce_zero_fas_correction() {
        let mut step = two_level_step();
        let layout = BlockLayout::new(0, 1);
        step.restart(&layout, 0.0, &vec![1.0]).unwrap();
        step.levels[0].predict().unwrap();
        step.restrict(0).unwrap();
        let tau = step.levels[1].state.tau.as_ref().unwrap();
        for t in tau {
            assert!(t[0].abs() < 1e-14, "tau should vanish, got {}", t[0]);
        }
    }

    #[test]
    fn prolong_before_restrict_is_an_error() {
        let mut step = two_level_step();
        let layout = BlockLayout::new(0, 1);
        step.restart(&layout, 0.0, &vec![1.0]).unwrap();
        assert!(step.prolong(1).is_err());
    }

    #[test]
    fn coarse_sweep_correction_reaches_the_fine_level() {
        let mut step = two_level_step();
        let layout = BlockLayout::new(0, 1);
        step.restart(&layout, 0.0, &vec![1.0]).unwrap();
        step.levels[0].predict().unwrap();
        step.restrict(0).unwrap();
        let before = step.levels[0].state.u[3].clone();
        step.levels[1].sweep().unwrap();
        step.prolong(1).unwrap();
        let after = &step.levels[0].state.u[3];
        assert!((after[0] - before[0]).abs() > 1e-12);
    }
}
