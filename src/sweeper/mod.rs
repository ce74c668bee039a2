//! SDC correction sweeps.
//!
//! Each sweeper owns its collocation rule and Q-delta preconditioner and
//! implements the node-update recipe for one rhs splitting. The pieces that
//! do not depend on the splitting (spreading, quadrature integrals, the
//! residual and the end point) are shared below.

pub mod generic_implicit;
pub mod imex;

pub use generic_implicit::GenericImplicit;
pub use imex::Imex;

use crate::collocation::Collocation;
use crate::core::traits::Problem;
use crate::error::PfasstError;
use crate::level::LevelState;
use crate::utils::linalg::norm_inf;

/// Spread the initial value to all nodes and evaluate the rhs everywhere.
pub(crate) fn spread<V>(
    coll: &Collocation,
    lvl: &mut LevelState<V>,
    prob: &dyn Problem<State = V>,
) -> Result<(), PfasstError>
where
    V: Clone + AsRef<[f64]> + AsMut<[f64]> + From<Vec<f64>>,
{
    lvl.f[0] = prob.eval_f(&lvl.u[0], lvl.time)?;
    for m in 1..=coll.num_nodes {
        lvl.u[m] = lvl.u[0].clone();
        let t_m = lvl.time + lvl.dt * coll.nodes[m - 1];
        lvl.f[m] = prob.eval_f(&lvl.u[m], t_m)?;
    }
    lvl.uend = None;
    lvl.residual = None;
    Ok(())
}

/// `dt * Q * F` per node, without the FAS correction (callers add it where
/// the algorithm asks for it).
pub(crate) fn integrate_q<V>(coll: &Collocation, lvl: &LevelState<V>) -> Vec<Vec<f64>>
where
    V: Clone + AsRef<[f64]> + AsMut<[f64]> + From<Vec<f64>>,
{
    let m = coll.num_nodes;
    let n = lvl.u[0].as_ref().len();
    let mut out = Vec::with_capacity(m);
    for row in 1..=m {
        let mut acc = vec![0.0; n];
        for j in 1..=m {
            lvl.f[j].add_scaled_into(lvl.dt * coll.qmat[(row, j)], &mut acc);
        }
        out.push(acc);
    }
    out
}

/// Collocation defect norm: `max_m || u0 + (dt Q F)_m + tau_m - u_m ||_inf`.
pub(crate) fn residual_norm<V>(coll: &Collocation, lvl: &LevelState<V>) -> f64
where
    V: Clone + AsRef<[f64]> + AsMut<[f64]> + From<Vec<f64>>,
{
    let mut worst = 0.0_f64;
    let u0 = lvl.u[0].as_ref();
    for (m, mut res) in integrate_q(coll, lvl).into_iter().enumerate() {
        for (r, &u0i) in res.iter_mut().zip(u0) {
            *r += u0i;
        }
        if let Some(tau) = &lvl.tau {
            for (r, &t) in res.iter_mut().zip(tau[m].as_ref()) {
                *r += t;
            }
        }
        for (r, &ui) in res.iter_mut().zip(lvl.u[m + 1].as_ref()) {
            *r -= ui;
        }
        worst = worst.max(norm_inf(&res));
    }
    worst
}

/// End point: the last node value when the rule contains the right edge,
/// otherwise the collocation update `u0 + dt * sum_j w_j f_j`.
pub(crate) fn end_point<V>(
    coll: &Collocation,
    do_coll_update: bool,
    lvl: &mut LevelState<V>,
) -> Result<(), PfasstError>
where
    V: Clone + AsRef<[f64]> + AsMut<[f64]> + From<Vec<f64>>,
{
    let m = coll.num_nodes;
    let uend = if coll.right_is_node && !do_coll_update {
        lvl.u[m].clone()
    } else {
        let mut acc = lvl.u[0].as_ref().to_vec();
        for j in 1..=m {
            lvl.f[j].add_scaled_into(lvl.dt * coll.weights[j - 1], &mut acc);
        }
        V::from(acc)
    };
    lvl.uend = Some(uend);
    Ok(())
}

/// Per-node integrals returned through the `Sweeper` trait object.
pub(crate) fn integrate_to_state<V>(coll: &Collocation, lvl: &LevelState<V>) -> Vec<V>
where
    V: Clone + AsRef<[f64]> + AsMut<[f64]> + From<Vec<f64>>,
{
    integrate_q(coll, lvl).into_iter().map(V::from).collect()
}

pub(crate) fn add_tau(acc: &mut [f64], tau: &Option<Vec<impl AsRef<[f64]>>>, m: usize) {
    if let Some(tau) = tau {
        for (a, &t) in acc.iter_mut().zip(tau[m].as_ref()) {
            *a += t;
        }
    }
}
