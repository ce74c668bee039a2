//! Time-stepping controllers.
//!
//! [`SerialController`] runs any of SDC, MLSDC, MSSDC and PFASST inside one
//! process, pipelining the steps of a block through in-process mailboxes.
//! [`MpiController`] (behind the `mpi` feature) runs one step per rank with
//! real point-to-point communication; both drive the identical per-step
//! state machine and produce numerically consistent results.

pub mod serial;
pub use serial::SerialController;

#[cfg(feature = "mpi")]
pub mod mpi;
#[cfg(feature = "mpi")]
pub use mpi::MpiController;

use crate::config::ControllerOptions;
use crate::error::PfasstError;
use crate::hooks::{Hook, Stats};
use crate::step::Step;

#[derive(Clone, Copy)]
pub(crate) enum HookPoint {
    PreBlock,
    PreStep,
    PreIteration,
    PostSweep,
    PostIteration,
    PostStep,
}

pub(crate) fn fire_hooks<V>(
    hooks: &mut [Box<dyn Hook<V>>],
    stats: &mut Stats,
    step: &Step<V>,
    point: HookPoint,
    level: usize,
) {
    for hook in hooks.iter_mut() {
        match point {
            HookPoint::PreBlock => hook.pre_block(step, stats),
            HookPoint::PreStep => hook.pre_step(step, level, stats),
            HookPoint::PreIteration => hook.pre_iteration(step, level, stats),
            HookPoint::PostSweep => hook.post_sweep(step, level, stats),
            HookPoint::PostIteration => hook.post_iteration(step, level, stats),
            HookPoint::PostStep => hook.post_step(step, level, stats),
        }
    }
}

/// Fail-fast checks tying controller options to the step composition.
pub(crate) fn validate_setup<V>(
    opts: &ControllerOptions,
    step: &Step<V>,
    time_parallel: bool,
) -> Result<(), PfasstError>
where
    V: Clone + AsRef<[f64]> + AsMut<[f64]> + From<Vec<f64>>,
{
    opts.validate()?;
    if time_parallel {
        for lvl in &step.levels {
            if !lvl.sweeper.end_point_is_node() {
                return Err(PfasstError::Config(
                    "time-parallel runs ship the last node value downstream; use a node \
                     family containing the right interval edge and no collocation end update"
                        .into(),
                ));
            }
        }
    }
    Ok(())
}
