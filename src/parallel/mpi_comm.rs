//! MPI transport for the time-parallel controller.
//!
//! Wraps the point-to-point and collective operations the controller needs:
//! neighbour sends tagged by level, a status stream, block-end broadcasts
//! rooted at the last active rank, and the per-block split into the active
//! sub-communicator.

use mpi::request::StaticScope;
use mpi::topology::{Color, SimpleCommunicator};
use mpi::traits::*;
use mpi::Tag;

use crate::error::PfasstError;

/// Tag carrying the pipelined done flag; level tags use the level index.
pub const STATUS_TAG: Tag = 99;

/// One in-flight buffered send. The payload is leaked for the lifetime of
/// the request and reclaimed in `wait`.
pub struct PendingSend {
    req: mpi::request::Request<'static, [f64], StaticScope>,
    buf: *mut [f64],
}

impl PendingSend {
    pub fn wait(self) {
        self.req.wait();
        // Safety: `buf` came out of `Box::leak` in `isend` and the request
        // holding the only other reference has just completed.
        unsafe {
            drop(Box::from_raw(self.buf));
        }
    }
}

/// Communicator wrapper holding the ranks of one active block.
pub struct MpiTimeComm {
    pub comm: SimpleCommunicator,
}

impl MpiTimeComm {
    pub fn new(comm: SimpleCommunicator) -> Self {
        Self { comm }
    }

    pub fn rank(&self) -> usize {
        self.comm.rank() as usize
    }

    pub fn size(&self) -> usize {
        self.comm.size() as usize
    }

    /// Split off the sub-communicator of still-active ranks; inactive ranks
    /// get `None` and sit out until the final broadcast.
    pub fn split_active(&self, active: bool) -> Option<MpiTimeComm> {
        let color = if active {
            Color::with_value(0)
        } else {
            Color::undefined()
        };
        self.comm.split_by_color(color).map(MpiTimeComm::new)
    }

    /// Non-blocking buffered send of a value stream message.
    pub fn isend(&self, dest: usize, tag: Tag, data: Vec<f64>) -> PendingSend {
        let buf: &'static [f64] = Box::leak(data.into_boxed_slice());
        let ptr = buf as *const [f64] as *mut [f64];
        let req = self
            .comm
            .process_at_rank(dest as i32)
            .immediate_send_with_tag(StaticScope, buf, tag);
        PendingSend { req, buf: ptr }
    }

    /// Blocking send of a value stream message.
    pub fn send(&self, dest: usize, tag: Tag, data: &[f64]) {
        self.comm
            .process_at_rank(dest as i32)
            .send_with_tag(data, tag);
    }

    /// Blocking receive of a value stream message.
    pub fn recv(&self, source: usize, tag: Tag) -> Result<Vec<f64>, PfasstError> {
        let (data, _status) = self
            .comm
            .process_at_rank(source as i32)
            .receive_vec_with_tag::<f64>(tag);
        Ok(data)
    }

    /// Broadcast a buffer in place from `root`.
    pub fn bcast_into(&self, root: usize, buf: &mut [f64]) {
        self.comm.process_at_rank(root as i32).broadcast_into(buf);
    }

    /// Gather one scalar from every rank.
    pub fn allgather(&self, x: f64) -> Vec<f64> {
        let mut out = vec![0.0; self.size()];
        self.comm.all_gather_into(&x, &mut out[..]);
        out
    }
}
