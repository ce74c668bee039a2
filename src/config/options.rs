//! Typed options for controllers and sweepers.
//!
//! Every dynamic "description" knob of an SDC/PFASST run lives in one of the
//! structs below and is validated eagerly, before any time stepping starts.
//! Invalid combinations are reported as `PfasstError::Config` from the
//! controller constructors rather than surfacing late inside a sweep.

use bitflags::bitflags;

use crate::error::PfasstError;

bitflags! {
    /// Toggles for the controller state machine.
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct ControllerFlags: u32 {
        /// Run the serial coarse-level predictor before the first iteration.
        const PREDICT   = 0b0000_0001;
        /// Overlap-send end points on the finest and intermediate levels.
        const FINE_COMM = 0b0000_0010;
    }
}

impl Default for ControllerFlags {
    fn default() -> Self {
        ControllerFlags::PREDICT | ControllerFlags::FINE_COMM
    }
}

/// Controller-wide parameters.
#[derive(Debug, Clone)]
pub struct ControllerOptions {
    /// Number of time slices iterated concurrently in one block.
    pub num_procs: usize,
    /// Absolute residual tolerance on the finest level.
    pub restol: f64,
    /// Iteration cap per step; reaching it marks the step done.
    pub maxiter: usize,
    /// Predictor / overlap-communication toggles.
    pub flags: ControllerFlags,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            num_procs: 1,
            restol: 1e-10,
            maxiter: 20,
            flags: ControllerFlags::default(),
        }
    }
}

impl ControllerOptions {
    pub fn validate(&self) -> Result<(), PfasstError> {
        if self.num_procs == 0 {
            return Err(PfasstError::Config("num_procs must be at least 1".into()));
        }
        if self.maxiter == 0 {
            return Err(PfasstError::Config("maxiter must be at least 1".into()));
        }
        if !self.restol.is_finite() || self.restol < 0.0 {
            return Err(PfasstError::Config(format!(
                "restol must be finite and non-negative, got {}",
                self.restol
            )));
        }
        Ok(())
    }

    pub fn predict(&self) -> bool {
        self.flags.contains(ControllerFlags::PREDICT)
    }

    pub fn fine_comm(&self) -> bool {
        self.flags.contains(ControllerFlags::FINE_COMM)
    }
}

/// Collocation node families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeFamily {
    /// Gauss-Radau nodes including the right interval edge.
    GaussRadauRight,
    /// Gauss-Lobatto nodes including both interval edges.
    GaussLobatto,
    /// Gauss-Legendre nodes, interior only.
    GaussLegendre,
}

/// Choice of the Q-delta preconditioner matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QDeltaKind {
    /// Lower-triangular implicit-Euler stencil.
    ImplicitEuler,
    /// Uᵀ from the unpivoted LU decomposition of Qᵀ.
    Lu,
    /// Strictly lower-triangular explicit-Euler stencil.
    ExplicitEuler,
}

/// Per-sweeper parameters: quadrature rule and preconditioner.
#[derive(Debug, Clone)]
pub struct SweeperOptions {
    pub num_nodes: usize,
    pub node_family: NodeFamily,
    /// Preconditioner used for the implicit node solves.
    pub qdelta: QDeltaKind,
    /// Force the end point to be recomputed by quadrature even when the
    /// right interval edge is a node.
    pub do_coll_update: bool,
}

impl SweeperOptions {
    pub fn new(num_nodes: usize, node_family: NodeFamily) -> Self {
        Self {
            num_nodes,
            node_family,
            qdelta: QDeltaKind::Lu,
            do_coll_update: false,
        }
    }

    pub fn with_qdelta(mut self, qdelta: QDeltaKind) -> Self {
        self.qdelta = qdelta;
        self
    }

    pub fn with_coll_update(mut self, do_coll_update: bool) -> Self {
        self.do_coll_update = do_coll_update;
        self
    }

    pub fn validate(&self) -> Result<(), PfasstError> {
        if self.num_nodes == 0 {
            return Err(PfasstError::Config("num_nodes must be at least 1".into()));
        }
        if self.node_family == NodeFamily::GaussLobatto && self.num_nodes < 2 {
            return Err(PfasstError::Config(
                "Gauss-Lobatto rules need at least 2 nodes".into(),
            ));
        }
        if self.qdelta == QDeltaKind::ExplicitEuler {
            return Err(PfasstError::Config(
                "the explicit-Euler Q-delta cannot precondition implicit node solves".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_flags_enable_predict_and_fine_comm() {
        let opts = ControllerOptions::default();
        assert!(opts.predict());
        assert!(opts.fine_comm());
    }

    #[test]
    fn rejects_zero_maxiter() {
        let opts = ControllerOptions {
            maxiter: 0,
            ..Default::default()
        };
        assert!(opts.validate().is_err());
    }

    #[test]
    fn rejects_negative_restol() {
        let opts = ControllerOptions {
            restol: -1.0,
            ..Default::default()
        };
        assert!(opts.validate().is_err());
    }

    #[test]
    fn rejects_explicit_qdelta_for_implicit_solves() {
        let opts = SweeperOptions::new(3, NodeFamily::GaussRadauRight)
            .with_qdelta(QDeltaKind::ExplicitEuler);
        assert!(opts.validate().is_err());
    }
}
