//! Right-hand-side evaluations, whole or split into implicit/explicit parts.

use crate::error::PfasstError;
use crate::utils::linalg::axpy;

/// One rhs evaluation `f(u, t)`.
///
/// Problems integrated with a fully implicit sweeper return `Full`; problems
/// meant for an IMEX sweeper return `Split`, where only the implicit part is
/// inverted by `solve_system`.
#[derive(Clone, Debug)]
pub enum Rhs<V> {
    Full(V),
    Split { implicit: V, explicit: V },
}

impl<V: AsRef<[f64]>> Rhs<V> {
    /// `out += alpha * f`, summing both parts for a split rhs.
    pub fn add_scaled_into(&self, alpha: f64, out: &mut [f64]) {
        match self {
            Rhs::Full(v) => axpy(alpha, v.as_ref(), out),
            Rhs::Split { implicit, explicit } => {
                axpy(alpha, implicit.as_ref(), out);
                axpy(alpha, explicit.as_ref(), out);
            }
        }
    }

    /// The single unsplit evaluation; rejects split rhs values.
    pub fn full(&self) -> Result<&V, PfasstError> {
        match self {
            Rhs::Full(v) => Ok(v),
            Rhs::Split { .. } => Err(PfasstError::Config(
                "problem returns a split rhs, use an IMEX sweeper".into(),
            )),
        }
    }

    /// The implicit part; rejects unsplit rhs values.
    pub fn implicit_part(&self) -> Result<&V, PfasstError> {
        match self {
            Rhs::Split { implicit, .. } => Ok(implicit),
            Rhs::Full(_) => Err(PfasstError::Config(
                "problem returns an unsplit rhs, use a fully implicit sweeper".into(),
            )),
        }
    }

    /// The explicit part; rejects unsplit rhs values.
    pub fn explicit_part(&self) -> Result<&V, PfasstError> {
        match self {
            Rhs::Split { explicit, .. } => Ok(explicit),
            Rhs::Full(_) => Err(PfasstError::Config(
                "problem returns an unsplit rhs, use a fully implicit sweeper".into(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_rhs_accumulates_scaled() {
        let f = Rhs::Full(vec![1.0, -2.0]);
        let mut out = vec![0.5, 0.5];
        f.add_scaled_into(2.0, &mut out);
        assert_eq!(out, vec![2.5, -3.5]);
    }

    #[test]
    fn split_rhs_sums_both_parts() {
        let f = Rhs::Split {
            implicit: vec![1.0],
            explicit: vec![3.0],
        };
        let mut out = vec![0.0];
        f.add_scaled_into(0.5, &mut out);
        assert_eq!(out, vec![2.0]);
    }

    #[test]
    fn part_accessors_reject_wrong_variant() {
        let full: Rhs<Vec<f64>> = Rhs::Full(vec![1.0]);
        assert!(full.implicit_part().is_err());
        let split: Rhs<Vec<f64>> = Rhs::Split {
            implicit: vec![1.0],
            explicit: vec![2.0],
        };
        assert!(split.full().is_err());
    }
}
