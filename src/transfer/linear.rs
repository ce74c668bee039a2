//! Injection restriction and linear-interpolation prolongation between two
//! periodic 1-D meshes with refinement ratio 2.

use crate::core::traits::SpaceTransfer;
use crate::error::PfasstError;

pub struct Linear1d {
    fine_n: usize,
    coarse_n: usize,
}

impl Linear1d {
    pub fn new(fine_n: usize, coarse_n: usize) -> Result<Self, PfasstError> {
        if fine_n != 2 * coarse_n || coarse_n == 0 {
            return Err(PfasstError::Config(format!(
                "periodic linear transfer needs fine = 2 * coarse dofs, got {fine_n}/{coarse_n}"
            )));
        }
        Ok(Self { fine_n, coarse_n })
    }
}

impl<V> SpaceTransfer<V> for Linear1d
where
    V: Clone + AsRef<[f64]> + AsMut<[f64]> + From<Vec<f64>>,
{
    fn restrict(&self, fine: &V) -> Result<V, PfasstError> {
        let f = fine.as_ref();
        if f.len() != self.fine_n {
            return Err(PfasstError::Config(format!(
                "restriction input has {} dofs, expected {}",
                f.len(),
                self.fine_n
            )));
        }
        Ok(V::from((0..self.coarse_n).map(|i| f[2 * i]).collect()))
    }

    fn prolong(&self, coarse: &V) -> Result<V, PfasstError> {
        let c = coarse.as_ref();
        if c.len() != self.coarse_n {
            return Err(PfasstError::Config(format!(
                "prolongation input has {} dofs, expected {}",
                c.len(),
                self.coarse_n
            )));
        }
        let mut out = vec![0.0; self.fine_n];
        for i in 0..self.coarse_n {
            out[2 * i] = c[i];
            out[2 * i + 1] = 0.5 * (c[i] + c[(i + 1) % self.coarse_n]);
        }
        Ok(V::from(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn rejects_incompatible_sizes() {
        assert!(Linear1d::new(10, 4).is_err());
        assert!(Linear1d::new(0, 0).is_err());
    }

    #[test]
    fn restrict_injects_even_points() {
        let tr = Linear1d::new(8, 4).unwrap();
        let fine: Vec<f64> = (0..8).map(|i| i as f64).collect();
        let coarse = tr.restrict(&fine).unwrap();
        assert_eq!(coarse, vec![0.0, 2.0, 4.0, 6.0]);
    }

    #[test]
    fn prolong_is_exact_for_linear_data() {
        // Piecewise-linear data on the coarse mesh is reproduced exactly at
        // the fine midpoints.
        let tr = Linear1d::new(8, 4).unwrap();
        let coarse = vec![0.0, 1.0, 2.0, 3.0];
        let fine = tr.prolong(&coarse).unwrap();
        for i in 0..3 {
            assert_abs_diff_eq!(fine[2 * i + 1], coarse[i] + 0.5, epsilon = 1e-14);
        }
        // periodic wrap
        assert_abs_diff_eq!(fine[7], 1.5, epsilon = 1e-14);
    }

    #[test]
    fn restrict_after_prolong_is_identity() {
        let tr = Linear1d::new(8, 4).unwrap();
        let coarse = vec![1.0, -0.5, 2.0, 0.25];
        let back = tr.restrict(&tr.prolong(&coarse).unwrap()).unwrap();
        for (b, c) in back.iter().zip(&coarse) {
            assert_abs_diff_eq!(*b, *c, epsilon = 1e-14);
        }
    }
}
