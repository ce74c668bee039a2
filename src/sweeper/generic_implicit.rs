//! Fully implicit SDC sweep: one implicit solve per node, preconditioned by
//! a lower-triangular Q-delta matrix.

use faer::Mat;

use crate::collocation::Collocation;
use crate::config::SweeperOptions;
use crate::core::traits::{Problem, Sweeper};
use crate::error::PfasstError;
use crate::level::LevelState;
use crate::qdelta::qdelta;
use crate::sweeper::{add_tau, end_point, integrate_q, integrate_to_state, residual_norm, spread};
use crate::utils::linalg::axpy;

pub struct GenericImplicit {
    coll: Collocation,
    qd: Mat<f64>,
    do_coll_update: bool,
}

impl GenericImplicit {
    pub fn new(opts: &SweeperOptions) -> Result<Self, PfasstError> {
        opts.validate()?;
        let coll = Collocation::new(opts.num_nodes, opts.node_family)?;
        let qd = qdelta(&coll, opts.qdelta)?;
        Ok(Self {
            coll,
            qd,
            do_coll_update: opts.do_coll_update,
        })
    }

    pub fn collocation(&self) -> &Collocation {
        &self.coll
    }
}

impl<V> Sweeper<V> for GenericImplicit
where
    V: Clone + AsRef<[f64]> + AsMut<[f64]> + From<Vec<f64>>,
{
    fn predict(
        &self,
        lvl: &mut LevelState<V>,
        prob: &dyn Problem<State = V>,
    ) -> Result<(), PfasstError> {
        spread(&self.coll, lvl, prob)
    }

    fn update_nodes(
        &self,
        lvl: &mut LevelState<V>,
        prob: &dyn Problem<State = V>,
    ) -> Result<(), PfasstError> {
        let m = self.coll.num_nodes;
        let dt = lvl.dt;
        let u0 = lvl.u[0].as_ref().to_vec();

        // Known part per node: u0 + dt ((Q - QD) F)(u^k) + tau.
        let mut known = integrate_q(&self.coll, lvl);
        for (row, acc) in known.iter_mut().enumerate() {
            for j in 1..=m {
                let fj = lvl.f[j].full()?;
                axpy(-dt * self.qd[(row + 1, j)], fj.as_ref(), acc);
            }
            axpy(1.0, &u0, acc);
            add_tau(acc, &lvl.tau, row);
        }

        // Gauss-Seidel pass over the nodes, reusing freshly updated values.
        for row in 1..=m {
            let mut rhs = known[row - 1].clone();
            for j in 1..row {
                let fj = lvl.f[j].full()?;
                axpy(dt * self.qd[(row, j)], fj.as_ref(), &mut rhs);
            }
            let t_row = lvl.time + dt * self.coll.nodes[row - 1];
            lvl.u[row] = prob.solve_system(
                &V::from(rhs),
                dt * self.qd[(row, row)],
                &lvl.u[row],
                t_row,
            )?;
            lvl.f[row] = prob.eval_f(&lvl.u[row], t_row)?;
        }
        Ok(())
    }

    fn compute_residual(&self, lvl: &mut LevelState<V>) -> Result<(), PfasstError> {
        lvl.residual = Some(residual_norm(&self.coll, lvl));
        Ok(())
    }

    fn compute_end_point(&self, lvl: &mut LevelState<V>) -> Result<(), PfasstError> {
        end_point(&self.coll, self.do_coll_update, lvl)
    }

    fn integrate(&self, lvl: &LevelState<V>) -> Result<Vec<V>, PfasstError> {
        Ok(integrate_to_state(&self.coll, lvl))
    }

    fn num_nodes(&self) -> usize {
        self.coll.num_nodes
    }

    fn nodes(&self) -> &[f64] {
        &self.coll.nodes
    }

    fn end_point_is_node(&self) -> bool {
        self.coll.right_is_node && !self.do_coll_update
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{NodeFamily, QDeltaKind};
    use crate::problem::TestEquation;
    use approx::assert_abs_diff_eq;

    fn dahlquist_level(lambda: f64, dt: f64) -> (LevelState<Vec<f64>>, TestEquation, GenericImplicit) {
        let prob = TestEquation::new(vec![lambda]);
        let opts = SweeperOptions::new(3, NodeFamily::GaussRadauRight)
            .with_qdelta(QDeltaKind::ImplicitEuler);
        let sweeper = GenericImplicit::new(&opts).unwrap();
        let lvl = LevelState {
            time: 0.0,
            dt,
            u: vec![vec![1.0]; 4],
            f: vec![crate::core::rhs::Rhs::Full(vec![0.0]); 4],
            uend: None,
            tau: None,
            residual: None,
        };
        (lvl, prob, sweeper)
    }

    #[test]
    fn residual_is_idempotent() {
        let (mut lvl, prob, sweeper) = dahlquist_level(-1.0, 0.1);
        sweeper.predict(&mut lvl, &prob).unwrap();
        sweeper.update_nodes(&mut lvl, &prob).unwrap();
        sweeper.compute_residual(&mut lvl).unwrap();
        let first = lvl.residual.unwrap();
        sweeper.compute_residual(&mut lvl).unwrap();
        assert_eq!(first, lvl.residual.unwrap());
    }

    #[test]
    fn sweeps_contract_toward_collocation_solution() {
        let (mut lvl, prob, sweeper) = dahlquist_level(-1.0, 0.05);
        sweeper.predict(&mut lvl, &prob).unwrap();
        let mut residuals = Vec::new();
        for _ in 0..6 {
            sweeper.update_nodes(&mut lvl, &prob).unwrap();
            sweeper.compute_residual(&mut lvl).unwrap();
            residuals.push(lvl.residual.unwrap());
        }
        for pair in residuals.windows(2) {
            assert!(pair[1] < pair[0], "residuals must decrease: {residuals:?}");
        }
        assert!(residuals.last().unwrap() < &1e-8);
    }

    #[test]
    fn end_point_is_last_node_for_radau_right() {
        let (mut lvl, prob, sweeper) = dahlquist_level(-1.0, 0.1);
        sweeper.predict(&mut lvl, &prob).unwrap();
        sweeper.update_nodes(&mut lvl, &prob).unwrap();
        sweeper.compute_end_point(&mut lvl).unwrap();
        assert_eq!(lvl.uend.as_ref().unwrap(), &lvl.u[3]);
        assert!(<GenericImplicit as Sweeper<Vec<f64>>>::end_point_is_node(&sweeper));
    }

    #[test]
    fn collocation_update_integrates_weights() {
        let prob = TestEquation::new(vec![-1.0]);
        let opts = SweeperOptions::new(3, NodeFamily::GaussLegendre)
            .with_qdelta(QDeltaKind::ImplicitEuler)
            .with_coll_update(true);
        let sweeper = GenericImplicit::new(&opts).unwrap();
        let mut lvl = LevelState {
            time: 0.0,
            dt: 0.1,
            u: vec![vec![1.0]; 4],
            f: vec![crate::core::rhs::Rhs::Full(vec![0.0]); 4],
            uend: None,
            tau: None,
            residual: None,
        };
        sweeper.predict(&mut lvl, &prob).unwrap();
        for _ in 0..8 {
            sweeper.update_nodes(&mut lvl, &prob).unwrap();
        }
        sweeper.compute_end_point(&mut lvl).unwrap();
        let uend = lvl.uend.unwrap()[0];
        assert_abs_diff_eq!(uend, (-0.1_f64).exp(), epsilon = 1e-8);
    }
}
