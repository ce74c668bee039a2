//! Collocation rules on the unit interval.
//!
//! A rule consists of M abscissae in (0, 1], the quadrature weights over
//! [0, 1] and the integration matrix Q with `Q[m][j] = ∫_0^{τ_m} ℓ_j`.
//! Matrices are stored with an extra zero row/column 0 so that indices line
//! up with the node-value storage, which keeps the left interval edge at
//! position 0.
//!
//! Nodes are computed from the Legendre recurrence with a sign-scan plus
//! bisection, which is deterministic and accurate to machine precision for
//! the small node counts used in practice.

use faer::Mat;

use crate::config::NodeFamily;
use crate::error::PfasstError;

/// Largest supported node count; the monomial-basis weight integration is
/// well-conditioned only for small rules.
const MAX_NODES: usize = 12;

#[derive(Debug, Clone)]
pub struct Collocation {
    pub num_nodes: usize,
    pub family: NodeFamily,
    /// Abscissae in (0, 1], excluding the left interval edge.
    pub nodes: Vec<f64>,
    /// Quadrature weights over [0, 1].
    pub weights: Vec<f64>,
    /// Integration matrix, (M+1) x (M+1) with zero row/column 0.
    pub qmat: Mat<f64>,
    /// Node spacings, `delta[0] = nodes[0]`.
    pub delta: Vec<f64>,
    pub left_is_node: bool,
    pub right_is_node: bool,
}

impl Collocation {
    pub fn new(num_nodes: usize, family: NodeFamily) -> Result<Self, PfasstError> {
        if num_nodes == 0 || num_nodes > MAX_NODES {
            return Err(PfasstError::Config(format!(
                "node count {num_nodes} outside supported range 1..={MAX_NODES}"
            )));
        }
        let nodes = unit_nodes(num_nodes, family)?;
        let m = nodes.len();

        let mut qmat = Mat::zeros(m + 1, m + 1);
        let mut weights = vec![0.0; m];
        for j in 0..m {
            let coeffs = lagrange_coeffs(&nodes, j);
            weights[j] = antiderivative_at(&coeffs, 1.0);
            for (row, &tm) in nodes.iter().enumerate() {
                qmat[(row + 1, j + 1)] = antiderivative_at(&coeffs, tm);
            }
        }

        let mut delta = Vec::with_capacity(m);
        let mut prev = 0.0;
        for &t in &nodes {
            delta.push(t - prev);
            prev = t;
        }

        let left_is_node = family == NodeFamily::GaussLobatto;
        let right_is_node = matches!(
            family,
            NodeFamily::GaussRadauRight | NodeFamily::GaussLobatto
        );

        Ok(Self {
            num_nodes: m,
            family,
            nodes,
            weights,
            qmat,
            delta,
            left_is_node,
            right_is_node,
        })
    }
}

/// Legendre polynomial value and derivative at `x` via the three-term
/// recurrence.
fn legendre(n: usize, x: f64) -> (f64, f64) {
    if n == 0 {
        return (1.0, 0.0);
    }
    let mut p_prev = 1.0;
    let mut p = x;
    for k in 1..n {
        let kf = k as f64;
        let p_next = ((2.0 * kf + 1.0) * x * p - kf * p_prev) / (kf + 1.0);
        p_prev = p;
        p = p_next;
    }
    // (x^2 - 1) P_n' = n (x P_n - P_{n-1})
    let dp = if (x * x - 1.0).abs() < 1e-300 {
        // endpoint limit, P_n'(±1) = ±^{n+1} n(n+1)/2
        let sign = if x > 0.0 { 1.0 } else { (-1.0_f64).powi(n as i32 + 1) };
        sign * (n * (n + 1)) as f64 / 2.0
    } else {
        n as f64 * (x * p - p_prev) / (x * x - 1.0)
    };
    (p, dp)
}

/// All roots of `f` inside (lo, hi), found by a fine sign scan followed by
/// bisection. Errors out if the scan does not isolate `expected` roots.
fn scan_roots(
    f: impl Fn(f64) -> f64,
    lo: f64,
    hi: f64,
    expected: usize,
) -> Result<Vec<f64>, PfasstError> {
    const SAMPLES: usize = 20_000;
    let mut roots = Vec::with_capacity(expected);
    let h = (hi - lo) / SAMPLES as f64;
    let mut a = lo;
    let mut fa = f(a);
    for i in 1..=SAMPLES {
        let b = lo + i as f64 * h;
        let fb = f(b);
        if fa == 0.0 {
            roots.push(a);
        } else if fa * fb < 0.0 {
            let (mut x0, mut x1, mut f0) = (a, b, fa);
            for _ in 0..200 {
                let mid = 0.5 * (x0 + x1);
                let fm = f(mid);
                if fm == 0.0 || x1 - x0 < 1e-16 {
                    x0 = mid;
                    break;
                }
                if f0 * fm < 0.0 {
                    x1 = mid;
                } else {
                    x0 = mid;
                    f0 = fm;
                }
            }
            roots.push(0.5 * (x0 + x1));
        }
        a = b;
        fa = fb;
    }
    if roots.len() != expected {
        return Err(PfasstError::Config(format!(
            "root scan found {} nodes, expected {expected}",
            roots.len()
        )));
    }
    Ok(roots)
}

/// Nodes on [0, 1] for the requested family.
fn unit_nodes(m: usize, family: NodeFamily) -> Result<Vec<f64>, PfasstError> {
    let eps = 1e-5;
    let raw = match family {
        NodeFamily::GaussRadauRight => {
            // interior nodes are the roots of P_{M-1} - P_M; x = 1 completes
            // the rule
            let mut r = if m == 1 {
                Vec::new()
            } else {
                scan_roots(
                    |x| legendre(m - 1, x).0 - legendre(m, x).0,
                    -1.0 + 1e-12,
                    1.0 - eps,
                    m - 1,
                )?
            };
            r.push(1.0);
            r
        }
        NodeFamily::GaussLobatto => {
            if m < 2 {
                return Err(PfasstError::Config(
                    "Gauss-Lobatto rules need at least 2 nodes".into(),
                ));
            }
            let mut r = vec![-1.0];
            if m > 2 {
                r.extend(scan_roots(
                    |x| legendre(m - 1, x).1,
                    -1.0 + eps,
                    1.0 - eps,
                    m - 2,
                )?);
            }
            r.push(1.0);
            r
        }
        NodeFamily::GaussLegendre => {
            scan_roots(|x| legendre(m, x).0, -1.0 + 1e-12, 1.0 - 1e-12, m)?
        }
    };
    Ok(raw.into_iter().map(|x| 0.5 * (x + 1.0)).collect())
}

/// Monomial coefficients of the Lagrange basis polynomial `ℓ_j` over `nodes`.
fn lagrange_coeffs(nodes: &[f64], j: usize) -> Vec<f64> {
    let mut c = vec![1.0];
    for (i, &ti) in nodes.iter().enumerate() {
        if i == j {
            continue;
        }
        let denom = nodes[j] - ti;
        let mut next = vec![0.0; c.len() + 1];
        for (k, &ck) in c.iter().enumerate() {
            next[k + 1] += ck / denom;
            next[k] -= ck * ti / denom;
        }
        c = next;
    }
    c
}

/// `∫_0^x p` for a polynomial given by monomial coefficients.
fn antiderivative_at(coeffs: &[f64], x: f64) -> f64 {
    let mut acc = 0.0;
    let mut xp = x;
    for (k, &c) in coeffs.iter().enumerate() {
        acc += c * xp / (k + 1) as f64;
        xp *= x;
    }
    acc
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn radau_right_three_nodes_match_reference() {
        let coll = Collocation::new(3, NodeFamily::GaussRadauRight).unwrap();
        let s6 = 6.0_f64.sqrt();
        assert_abs_diff_eq!(coll.nodes[0], (4.0 - s6) / 10.0, epsilon = 1e-12);
        assert_abs_diff_eq!(coll.nodes[1], (4.0 + s6) / 10.0, epsilon = 1e-12);
        assert_abs_diff_eq!(coll.nodes[2], 1.0, epsilon = 1e-14);
        assert_abs_diff_eq!(coll.weights[0], (16.0 - s6) / 36.0, epsilon = 1e-12);
        assert_abs_diff_eq!(coll.weights[1], (16.0 + s6) / 36.0, epsilon = 1e-12);
        assert_abs_diff_eq!(coll.weights[2], 1.0 / 9.0, epsilon = 1e-12);
    }

    #[test]
    fn radau_right_two_nodes_match_reference() {
        let coll = Collocation::new(2, NodeFamily::GaussRadauRight).unwrap();
        assert_abs_diff_eq!(coll.nodes[0], 1.0 / 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(coll.weights[0], 0.75, epsilon = 1e-12);
        assert_abs_diff_eq!(coll.weights[1], 0.25, epsilon = 1e-12);
    }

    #[test]
    fn radau_right_single_node_is_implicit_euler() {
        let coll = Collocation::new(1, NodeFamily::GaussRadauRight).unwrap();
        assert_eq!(coll.nodes, vec![1.0]);
        assert_eq!(coll.weights, vec![1.0]);
    }

    #[test]
    fn lobatto_three_nodes_match_reference() {
        let coll = Collocation::new(3, NodeFamily::GaussLobatto).unwrap();
        assert_abs_diff_eq!(coll.nodes[0], 0.0, epsilon = 1e-14);
        assert_abs_diff_eq!(coll.nodes[1], 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(coll.nodes[2], 1.0, epsilon = 1e-14);
        assert_abs_diff_eq!(coll.weights[0], 1.0 / 6.0, epsilon = 1e-12);
        assert_abs_diff_eq!(coll.weights[1], 2.0 / 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(coll.weights[2], 1.0 / 6.0, epsilon = 1e-12);
    }

    #[test]
    fn weights_sum_to_one() {
        for family in [
            NodeFamily::GaussRadauRight,
            NodeFamily::GaussLobatto,
            NodeFamily::GaussLegendre,
        ] {
            for m in 2..=7 {
                let coll = Collocation::new(m, family).unwrap();
                let sum: f64 = coll.weights.iter().sum();
                assert_abs_diff_eq!(sum, 1.0, epsilon = 1e-11);
            }
        }
    }

    #[test]
    fn last_q_row_equals_weights_when_right_edge_is_node() {
        let coll = Collocation::new(4, NodeFamily::GaussRadauRight).unwrap();
        let m = coll.num_nodes;
        for j in 0..m {
            assert_abs_diff_eq!(coll.qmat[(m, j + 1)], coll.weights[j], epsilon = 1e-11);
        }
    }

    #[test]
    fn q_integrates_polynomials_exactly() {
        // Q applied to nodal values of t^2 must reproduce ∫_0^{τ_m} t^2.
        let coll = Collocation::new(5, NodeFamily::GaussLegendre).unwrap();
        let m = coll.num_nodes;
        for row in 1..=m {
            let mut acc = 0.0;
            for j in 1..=m {
                acc += coll.qmat[(row, j)] * coll.nodes[j - 1].powi(2);
            }
            let exact = coll.nodes[row - 1].powi(3) / 3.0;
            assert_abs_diff_eq!(acc, exact, epsilon = 1e-12);
        }
    }

    #[test]
    fn rejects_unsupported_node_counts() {
        assert!(Collocation::new(0, NodeFamily::GaussRadauRight).is_err());
        assert!(Collocation::new(40, NodeFamily::GaussRadauRight).is_err());
    }
}
