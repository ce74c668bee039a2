//! Dahlquist test equation `u' = lambda u`, componentwise over a vector of
//! lambdas. The implicit solve is a scalar division, which makes this the
//! problem of choice for order and contraction tests.

use crate::core::rhs::Rhs;
use crate::core::traits::Problem;
use crate::error::PfasstError;

pub struct TestEquation {
    lambdas: Vec<f64>,
    u0: Vec<f64>,
}

impl TestEquation {
    pub fn new(lambdas: Vec<f64>) -> Self {
        let n = lambdas.len();
        Self {
            lambdas,
            u0: vec![1.0; n],
        }
    }

    pub fn with_initial(lambdas: Vec<f64>, u0: Vec<f64>) -> Result<Self, PfasstError> {
        if lambdas.len() != u0.len() {
            return Err(PfasstError::Config(format!(
                "{} lambdas but {} initial values",
                lambdas.len(),
                u0.len()
            )));
        }
        Ok(Self { lambdas, u0 })
    }
}

impl Problem for TestEquation {
    type State = Vec<f64>;

    fn dofs(&self) -> usize {
        self.lambdas.len()
    }

    fn init_value(&self) -> Vec<f64> {
        vec![0.0; self.lambdas.len()]
    }

    fn eval_f(&self, u: &Vec<f64>, _t: f64) -> Result<Rhs<Vec<f64>>, PfasstError> {
        Ok(Rhs::Full(
            u.iter().zip(&self.lambdas).map(|(ui, l)| ui * l).collect(),
        ))
    }

    fn solve_system(
        &self,
        rhs: &Vec<f64>,
        factor: f64,
        _u0: &Vec<f64>,
        _t: f64,
    ) -> Result<Vec<f64>, PfasstError> {
        rhs.iter()
            .zip(&self.lambdas)
            .map(|(r, l)| {
                let denom = 1.0 - factor * l;
                if denom == 0.0 {
                    Err(PfasstError::Solve(format!(
                        "singular scalar system for lambda {l} and factor {factor}"
                    )))
                } else {
                    Ok(r / denom)
                }
            })
            .collect()
    }

    fn u_exact(&self, t: f64) -> Result<Vec<f64>, PfasstError> {
        Ok(self
            .u0
            .iter()
            .zip(&self.lambdas)
            .map(|(u, l)| u * (l * t).exp())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn implicit_solve_inverts_eval() {
        let prob = TestEquation::new(vec![-2.0, 0.5]);
        let u = vec![1.5, -0.25];
        let factor = 0.1;
        // rhs = u - factor * f(u) must be mapped back to u
        let f = prob.eval_f(&u, 0.0).unwrap();
        let f = f.full().unwrap();
        let rhs: Vec<f64> = u.iter().zip(f).map(|(ui, fi)| ui - factor * fi).collect();
        let back = prob.solve_system(&rhs, factor, &u, 0.0).unwrap();
        for (b, ui) in back.iter().zip(&u) {
            assert_abs_diff_eq!(*b, *ui, epsilon = 1e-14);
        }
    }

    #[test]
    fn exact_solution_decays() {
        let prob = TestEquation::new(vec![-1.0]);
        let u = prob.u_exact(1.0).unwrap();
        assert_abs_diff_eq!(u[0], (-1.0_f64).exp(), epsilon = 1e-15);
    }
}
