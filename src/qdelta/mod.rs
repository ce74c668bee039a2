//! Q-delta matrices: cheaply invertible lower-triangular approximations of
//! the collocation integration matrix, used to precondition the node sweeps.

use faer::Mat;

use crate::collocation::Collocation;
use crate::config::QDeltaKind;
use crate::error::PfasstError;

/// Build the (M+1) x (M+1) Q-delta matrix for the given rule. Row/column 0
/// are zero except for the explicit-Euler variant, whose lower triangle is
/// shifted one node to the left.
pub fn qdelta(coll: &Collocation, kind: QDeltaKind) -> Result<Mat<f64>, PfasstError> {
    let m = coll.num_nodes;
    let mut qd = Mat::zeros(m + 1, m + 1);
    match kind {
        QDeltaKind::ImplicitEuler => {
            for row in 1..=m {
                for col in 1..=row {
                    qd[(row, col)] = coll.delta[col - 1];
                }
            }
        }
        QDeltaKind::ExplicitEuler => {
            for row in 2..=m {
                for col in 1..row {
                    qd[(row, col)] = coll.delta[col];
                }
            }
        }
        QDeltaKind::Lu => {
            let u = unpivoted_u_of_q_transpose(coll)?;
            for row in 1..=m {
                for col in 1..=row {
                    // QΔ = Uᵀ
                    qd[(row, col)] = u[(col - 1, row - 1)];
                }
            }
        }
    }
    Ok(qd)
}

/// U factor of the unpivoted LU decomposition of Qᵀ (node block only).
/// Pivoting must stay off: the trick relies on U belonging to Qᵀ exactly.
fn unpivoted_u_of_q_transpose(coll: &Collocation) -> Result<Mat<f64>, PfasstError> {
    let m = coll.num_nodes;
    let mut lu = Mat::from_fn(m, m, |i, j| coll.qmat[(j + 1, i + 1)]);
    for k in 0..m {
        let pivot = lu[(k, k)];
        if pivot.abs() < 1e-14 {
            return Err(PfasstError::ZeroPivot(k));
        }
        for i in (k + 1)..m {
            let factor = lu[(i, k)] / pivot;
            lu[(i, k)] = factor;
            for j in (k + 1)..m {
                lu[(i, j)] -= factor * lu[(k, j)];
            }
        }
    }
    Ok(Mat::from_fn(m, m, |i, j| if j >= i { lu[(i, j)] } else { 0.0 }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NodeFamily;
    use approx::assert_abs_diff_eq;

    #[test]
    fn implicit_euler_rows_integrate_to_nodes() {
        let coll = Collocation::new(3, NodeFamily::GaussRadauRight).unwrap();
        let qd = qdelta(&coll, QDeltaKind::ImplicitEuler).unwrap();
        for row in 1..=3 {
            let sum: f64 = (1..=3).map(|col| qd[(row, col)]).sum();
            assert_abs_diff_eq!(sum, coll.nodes[row - 1], epsilon = 1e-12);
        }
    }

    #[test]
    fn explicit_euler_has_zero_diagonal() {
        let coll = Collocation::new(4, NodeFamily::GaussRadauRight).unwrap();
        let qd = qdelta(&coll, QDeltaKind::ExplicitEuler).unwrap();
        for row in 1..=4 {
            for col in row..=4 {
                assert_eq!(qd[(row, col)], 0.0);
            }
        }
    }

    #[test]
    fn lu_factors_reconstruct_q_transpose() {
        let coll = Collocation::new(4, NodeFamily::GaussRadauRight).unwrap();
        let m = coll.num_nodes;
        let qd = qdelta(&coll, QDeltaKind::Lu).unwrap();
        // Uᵀ must be lower triangular with nonzero diagonal.
        for row in 1..=m {
            assert!(qd[(row, row)].abs() > 0.0);
            for col in (row + 1)..=m {
                assert_eq!(qd[(row, col)], 0.0);
            }
        }
        // And L * U == Qᵀ within round-off.
        let u = unpivoted_u_of_q_transpose(&coll).unwrap();
        let mut lu = Mat::from_fn(m, m, |i, j| coll.qmat[(j + 1, i + 1)]);
        for k in 0..m {
            let pivot = lu[(k, k)];
            for i in (k + 1)..m {
                let factor = lu[(i, k)] / pivot;
                lu[(i, k)] = factor;
                for j in (k + 1)..m {
                    lu[(i, j)] -= factor * lu[(k, j)];
                }
            }
        }
        for i in 0..m {
            for j in 0..m {
                let mut acc = 0.0;
                for k in 0..m {
                    let l_ik = if k < i {
                        lu[(i, k)]
                    } else if k == i {
                        1.0
                    } else {
                        0.0
                    };
                    acc += l_ik * u[(k, j)];
                }
                assert_abs_diff_eq!(acc, coll.qmat[(j + 1, i + 1)], epsilon = 1e-10);
            }
        }
    }
}
