//! Identity transfer for levels sharing one spatial resolution (time-only
//! coarsening, or plain multi-step runs).

use crate::core::traits::SpaceTransfer;
use crate::error::PfasstError;

pub struct Trivial;

impl<V: Clone> SpaceTransfer<V> for Trivial {
    fn restrict(&self, fine: &V) -> Result<V, PfasstError> {
        Ok(fine.clone())
    }

    fn prolong(&self, coarse: &V) -> Result<V, PfasstError> {
        Ok(coarse.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_is_identity() {
        let tr = Trivial;
        let x = vec![1.0, -2.0, 3.5];
        let back: Vec<f64> = tr.prolong(&tr.restrict(&x).unwrap()).unwrap();
        assert_eq!(back, x);
    }
}
