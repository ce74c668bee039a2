//! Small dense kernels shared by sweepers and problem classes.

use faer::Mat;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// y += alpha * x
pub fn axpy(alpha: f64, x: &[f64], y: &mut [f64]) {
    debug_assert_eq!(x.len(), y.len());
    for (yi, xi) in y.iter_mut().zip(x) {
        *yi += alpha * *xi;
    }
}

/// Max-norm of a vector.
pub fn norm_inf(x: &[f64]) -> f64 {
    x.iter().fold(0.0_f64, |acc, &v| acc.max(v.abs()))
}

/// Dense mat-vec y = A x, row-parallel when the `rayon` feature is on.
#[cfg(feature = "rayon")]
pub fn mat_vec(a: &Mat<f64>, x: &[f64], y: &mut [f64]) {
    assert_eq!(a.ncols(), x.len());
    assert_eq!(a.nrows(), y.len());
    y.par_iter_mut().enumerate().for_each(|(i, yi)| {
        let mut acc = 0.0;
        for j in 0..a.ncols() {
            acc += a[(i, j)] * x[j];
        }
        *yi = acc;
    });
}

/// Dense mat-vec y = A x.
#[cfg(not(feature = "rayon"))]
pub fn mat_vec(a: &Mat<f64>, x: &[f64], y: &mut [f64]) {
    assert_eq!(a.ncols(), x.len());
    assert_eq!(a.nrows(), y.len());
    for i in 0..a.nrows() {
        let mut acc = 0.0;
        for j in 0..a.ncols() {
            acc += a[(i, j)] * x[j];
        }
        y[i] = acc;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use faer::Mat;

    #[test]
    fn axpy_accumulates() {
        let mut y = vec![1.0, 2.0];
        axpy(0.5, &[2.0, -4.0], &mut y);
        assert_eq!(y, vec![2.0, 0.0]);
    }

    #[test]
    fn norm_inf_picks_largest_magnitude() {
        assert_eq!(norm_inf(&[0.5, -3.0, 2.0]), 3.0);
        assert_eq!(norm_inf(&[]), 0.0);
    }

    #[test]
    fn mat_vec_matches_hand_computation() {
        let a = Mat::from_fn(2, 2, |i, j| (i * 2 + j) as f64 + 1.0);
        let mut y = vec![0.0; 2];
        mat_vec(&a, &[1.0, 1.0], &mut y);
        assert_eq!(y, vec![3.0, 7.0]);
    }
}
