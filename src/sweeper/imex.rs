//! First-order IMEX SDC sweep: implicit solves against Q-delta for the stiff
//! part, explicit-Euler preconditioning for the non-stiff part.

use faer::Mat;

use crate::collocation::Collocation;
use crate::config::{QDeltaKind, SweeperOptions};
use crate::core::traits::{Problem, Sweeper};
use crate::error::PfasstError;
use crate::level::LevelState;
use crate::qdelta::qdelta;
use crate::sweeper::{add_tau, end_point, integrate_q, integrate_to_state, residual_norm, spread};
use crate::utils::linalg::axpy;

pub struct Imex {
    coll: Collocation,
    qi: Mat<f64>,
    qe: Mat<f64>,
    do_coll_update: bool,
}

impl Imex {
    pub fn new(opts: &SweeperOptions) -> Result<Self, PfasstError> {
        opts.validate()?;
        let coll = Collocation::new(opts.num_nodes, opts.node_family)?;
        let qi = qdelta(&coll, opts.qdelta)?;
        let qe = qdelta(&coll, QDeltaKind::ExplicitEuler)?;
        Ok(Self {
            coll,
            qi,
            qe,
            do_coll_update: opts.do_coll_update,
        })
    }

    pub fn collocation(&self) -> &Collocation {
        &self.coll
    }
}

impl<V> Sweeper<V> for Imex
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

        // Known part per node: u0 + dt (Q F - QI F_I - QE F_E)(u^k) + tau.
        let mut known = integrate_q(&self.coll, lvl);
        for (row, acc) in known.iter_mut().enumerate() {
            for j in 1..=m {
                axpy(
                    -dt * self.qi[(row + 1, j)],
                    lvl.f[j].implicit_part()?.as_ref(),
                    acc,
                );
                axpy(
                    -dt * self.qe[(row + 1, j)],
                    lvl.f[j].explicit_part()?.as_ref(),
                    acc,
                );
            }
            axpy(1.0, &u0, acc);
            add_tau(acc, &lvl.tau, row);
        }

        for row in 1..=m {
            let mut rhs = known[row - 1].clone();
            for j in 1..row {
                axpy(
                    dt * self.qi[(row, j)],
                    lvl.f[j].implicit_part()?.as_ref(),
                    &mut rhs,
                );
                axpy(
                    dt * self.qe[(row, j)],
                    lvl.f[j].explicit_part()?.as_ref(),
                    &mut rhs,
                );
            }
            let t_row = lvl.time + dt * self.coll.nodes[row - 1];
            lvl.u[row] = prob.solve_system(
                &V::from(rhs),
                dt * self.qi[(row, row)],
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
