//! Forced 1-D heat equation with homogeneous Dirichlet boundaries, split for
//! IMEX integration: the diffusion term is implicit, the forcing explicit.
//!
//! The forcing is manufactured so that `u(x, t) = sin(pi x) cos(t)` solves
//! the continuous problem.

use std::cell::RefCell;
use std::f64::consts::PI;

use faer::linalg::solvers::{PartialPivLu, SolveCore};
use faer::{Conj, Mat, MatMut};

use crate::core::rhs::Rhs;
use crate::core::traits::Problem;
use crate::error::PfasstError;
use crate::utils::linalg::mat_vec;

pub struct HeatForced1d {
    nvars: usize,
    nu: f64,
    lap: Mat<f64>,
    factored: RefCell<Option<(f64, PartialPivLu<f64>)>>,
}

impl HeatForced1d {
    /// `nvars` interior mesh points on (0, 1), diffusivity `nu`.
    pub fn new(nvars: usize, nu: f64) -> Result<Self, PfasstError> {
        if nvars < 2 {
            return Err(PfasstError::Config(format!(
                "heat mesh needs at least 2 interior points, got {nvars}"
            )));
        }
        if nu <= 0.0 {
            return Err(PfasstError::Config(format!(
                "diffusivity must be positive, got {nu}"
            )));
        }
        let dx = 1.0 / (nvars + 1) as f64;
        let scale = nu / (dx * dx);
        let mut lap = Mat::zeros(nvars, nvars);
        for i in 0..nvars {
            lap[(i, i)] = -2.0 * scale;
            if i > 0 {
                lap[(i, i - 1)] = scale;
            }
            if i + 1 < nvars {
                lap[(i, i + 1)] = scale;
            }
        }
        Ok(Self {
            nvars,
            nu,
            lap,
            factored: RefCell::new(None),
        })
    }

    fn mesh(&self, i: usize) -> f64 {
        (i + 1) as f64 / (self.nvars + 1) as f64
    }
}

impl Problem for HeatForced1d {
    type State = Vec<f64>;

    fn dofs(&self) -> usize {
        self.nvars
    }

    fn init_value(&self) -> Vec<f64> {
        vec![0.0; self.nvars]
    }

    fn eval_f(&self, u: &Vec<f64>, t: f64) -> Result<Rhs<Vec<f64>>, PfasstError> {
        let mut implicit = vec![0.0; self.nvars];
        mat_vec(&self.lap, u, &mut implicit);
        let explicit = (0..self.nvars)
            .map(|i| {
                let x = self.mesh(i);
                (PI * x).sin() * (self.nu * PI * PI * t.cos() - t.sin())
            })
            .collect();
        Ok(Rhs::Split { implicit, explicit })
    }

    fn solve_system(
        &self,
        rhs: &Vec<f64>,
        factor: f64,
        _u0: &Vec<f64>,
        _t: f64,
    ) -> Result<Vec<f64>, PfasstError> {
        if factor == 0.0 {
            return Ok(rhs.clone());
        }
        let mut cache = self.factored.borrow_mut();
        let rebuild = match cache.as_ref() {
            Some((f, _)) => *f != factor,
            None => true,
        };
        if rebuild {
            let n = self.nvars;
            let system = Mat::from_fn(n, n, |i, j| {
                let id = if i == j { 1.0 } else { 0.0 };
                id - factor * self.lap[(i, j)]
            });
            *cache = Some((factor, PartialPivLu::new(system.as_ref())));
        }
        let (_, lu) = cache.as_ref().ok_or(PfasstError::Internal(
            "factorization cache empty after rebuild",
        ))?;
        let mut x = rhs.clone();
        let n = x.len();
        let x_mat = MatMut::from_column_major_slice_mut(&mut x, n, 1);
        lu.solve_in_place_with_conj(Conj::No, x_mat);
        Ok(x)
    }

    fn u_exact(&self, t: f64) -> Result<Vec<f64>, PfasstError> {
        Ok((0..self.nvars)
            .map(|i| (PI * self.mesh(i)).sin() * t.cos())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn split_parts_have_matching_sizes() {
        let prob = HeatForced1d::new(15, 0.1).unwrap();
        let u = prob.u_exact(0.0).unwrap();
        match prob.eval_f(&u, 0.3).unwrap() {
            Rhs::Split { implicit, explicit } => {
                assert_eq!(implicit.len(), 15);
                assert_eq!(explicit.len(), 15);
            }
            Rhs::Full(_) => panic!("heat problem must return a split rhs"),
        }
    }

    #[test]
    fn forcing_balances_diffusion_at_t_zero() {
        // at t = 0 the manufactured solution is stationary up to the O(dx^2)
        // discretization error of the Laplacian
        let prob = HeatForced1d::new(127, 0.1).unwrap();
        let u = prob.u_exact(0.0).unwrap();
        match prob.eval_f(&u, 0.0).unwrap() {
            Rhs::Split { implicit, explicit } => {
                for (im, ex) in implicit.iter().zip(&explicit) {
                    assert_abs_diff_eq!(im + ex, 0.0, epsilon = 1e-3);
                }
            }
            Rhs::Full(_) => unreachable!(),
        }
    }

    #[test]
    fn implicit_solve_inverts_diffusion() {
        let prob = HeatForced1d::new(15, 0.1).unwrap();
        let u = prob.u_exact(0.2).unwrap();
        let factor = 0.05;
        let mut lap_u = vec![0.0; 15];
        mat_vec(&prob.lap, &u, &mut lap_u);
        let rhs: Vec<f64> = u.iter().zip(&lap_u).map(|(ui, l)| ui - factor * l).collect();
        let back = prob.solve_system(&rhs, factor, &u, 0.0).unwrap();
        for (b, ui) in back.iter().zip(&u) {
            assert_abs_diff_eq!(*b, *ui, epsilon = 1e-10);
        }
    }
}
