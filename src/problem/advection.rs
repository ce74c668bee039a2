//! 1-D linear advection `u_t + c u_x = 0` on the periodic unit interval,
//! discretized with second-order centered differences. Implicit solves
//! factorize `I - factor * A` once per factor and reuse the decomposition
//! for repeated node solves.

use std::cell::RefCell;

use faer::linalg::solvers::{PartialPivLu, SolveCore};
use faer::{Conj, Mat, MatMut};

use crate::core::rhs::Rhs;
use crate::core::traits::Problem;
use crate::error::PfasstError;
use crate::utils::linalg::mat_vec;

pub struct Advection1d {
    nvars: usize,
    c: f64,
    freq: usize,
    a: Mat<f64>,
    factored: RefCell<Option<(f64, PartialPivLu<f64>)>>,
}

impl Advection1d {
    pub fn new(nvars: usize, c: f64, freq: usize) -> Result<Self, PfasstError> {
        if nvars < 4 {
            return Err(PfasstError::Config(format!(
                "advection mesh needs at least 4 points, got {nvars}"
            )));
        }
        let dx = 1.0 / nvars as f64;
        let coeff = -c / (2.0 * dx);
        let mut a = Mat::zeros(nvars, nvars);
        for i in 0..nvars {
            a[(i, (i + 1) % nvars)] = coeff;
            a[(i, (i + nvars - 1) % nvars)] = -coeff;
        }
        Ok(Self {
            nvars,
            c,
            freq,
            a,
            factored: RefCell::new(None),
        })
    }

    fn mesh(&self, i: usize) -> f64 {
        i as f64 / self.nvars as f64
    }
}

impl Problem for Advection1d {
    type State = Vec<f64>;

    fn dofs(&self) -> usize {
        self.nvars
    }

    fn init_value(&self) -> Vec<f64> {
        vec![0.0; self.nvars]
    }

    fn eval_f(&self, u: &Vec<f64>, _t: f64) -> Result<Rhs<Vec<f64>>, PfasstError> {
        let mut f = vec![0.0; self.nvars];
        mat_vec(&self.a, u, &mut f);
        Ok(Rhs::Full(f))
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
                id - factor * self.a[(i, j)]
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
        let k = 2.0 * std::f64::consts::PI * self.freq as f64;
        Ok((0..self.nvars)
            .map(|i| (k * (self.mesh(i) - self.c * t)).sin())
            .collect())
    }
}
