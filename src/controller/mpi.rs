//! Distributed controller: one step per MPI rank, blocks advanced until the
//! global end time is reached.
//!
//! Ranks exchange end points with their neighbours only; the sole
//! collectives are the block-end broadcasts (new time and value, rooted at
//! the last active rank) and the deterministic re-split of the active
//! sub-communicator. Value sends on the fine and intermediate levels are
//! issued asynchronously and waited on only right before their buffer is
//! recomputed, overlapping communication with the next sweep.

use std::collections::HashMap;

use log::{debug, info};

use crate::config::ControllerOptions;
use crate::controller::{fire_hooks, validate_setup, HookPoint};
use crate::error::PfasstError;
use crate::hooks::{Hook, Stats, StatsHook};
use crate::parallel::mpi_comm::{MpiTimeComm, PendingSend, STATUS_TAG};
use crate::parallel::{BlockLayout, TIME_EPS};
use crate::step::{stage_after_check, stage_after_coarse, stage_after_spread, Stage, Step};
use crate::utils::convergence::Convergence;

pub struct MpiController<V> {
    opts: ControllerOptions,
    step: Step<V>,
    hooks: Vec<Box<dyn Hook<V>>>,
    stats: Stats,
    universe: mpi::environment::Universe,
    /// In-flight value sends, one slot per level.
    pending_values: HashMap<usize, PendingSend>,
    /// In-flight done-flag send.
    pending_status: Option<PendingSend>,
}

impl<V> MpiController<V>
where
    V: Clone + AsRef<[f64]> + AsMut<[f64]> + From<Vec<f64>>,
{
    /// Initialize MPI and build the controller around this rank's step. The
    /// block size is the world size; `opts.num_procs` is ignored here.
    pub fn new(opts: ControllerOptions, step: Step<V>) -> Result<Self, PfasstError> {
        let universe = mpi::initialize()
            .ok_or_else(|| PfasstError::Comm("MPI is already initialized".into()))?;
        let time_parallel = MpiTimeComm::new(universe.world()).size() > 1;
        validate_setup(&opts, &step, time_parallel)?;
        Ok(Self {
            opts,
            step,
            hooks: vec![Box::new(StatsHook)],
            stats: Stats::new(),
            universe,
            pending_values: HashMap::new(),
            pending_status: None,
        })
    }

    pub fn add_hook(&mut self, hook: Box<dyn Hook<V>>) {
        self.hooks.push(hook);
    }

    /// Integrate from `t0` to `tend`; every rank returns the same final
    /// value. Returns `u0` untouched when no slice fits before `tend`.
    pub fn run(&mut self, u0: V, t0: f64, tend: f64) -> Result<(V, Stats), PfasstError> {
        let world = MpiTimeComm::new(self.universe.world());
        let world_size = world.size();
        let world_rank = world.rank();
        let dt = self.step.dt;

        let mut n_total = 0usize;
        while t0 + n_total as f64 * dt < tend - TIME_EPS {
            n_total += 1;
        }
        if n_total == 0 {
            return Ok((u0, std::mem::take(&mut self.stats)));
        }
        // Active ranks always form a prefix of the world, so the owner of
        // the very last slice is known up front.
        let rem = n_total % world_size;
        let final_root = if rem == 0 { world_size } else { rem } - 1;

        let all_dt = world.allgather(dt);
        let mut time = t0 + all_dt[..world_rank].iter().sum::<f64>();
        let mut active = time < tend - TIME_EPS;
        let mut uend = u0;
        let mut comm = world.split_active(active);

        while active {
            let c = comm
                .as_ref()
                .ok_or(PfasstError::Internal("active rank without communicator"))?;
            let rank = c.rank();
            let size = c.size();
            info!("rank {rank}/{size} starts block at t = {time:.6e}");

            self.drain_pending();
            let layout = BlockLayout::new(rank, size);
            self.step.restart(&layout, time, &uend)?;
            fire_hooks(&mut self.hooks, &mut self.stats, &self.step, HookPoint::PreBlock, 0);

            while !self.step.status.done {
                self.transition(c)?;
            }

            let root = size - 1;
            let mut tnew = time + dt;
            c.bcast_into(root, std::slice::from_mut(&mut tnew));
            let mut ubuf = self.step.levels[0].uend()?.as_ref().to_vec();
            c.bcast_into(root, &mut ubuf);
            uend = V::from(ubuf);

            let all_dt = c.allgather(dt);
            time = tnew + all_dt[..rank].iter().sum::<f64>();
            active = time < tend - TIME_EPS;
            let next = c.split_active(active);
            comm = next;
        }
        self.drain_pending();

        let mut ubuf = uend.as_ref().to_vec();
        world.bcast_into(final_root, &mut ubuf);
        Ok((V::from(ubuf), std::mem::take(&mut self.stats)))
    }

    /// One stage transition of this rank's step.
    fn transition(&mut self, c: &MpiTimeComm) -> Result<(), PfasstError> {
        let stage = self.step.status.stage;
        debug!(
            "rank {} iter {} stage {:?}",
            self.step.status.slot, self.step.status.iter, stage
        );
        let num_procs = c.size();
        match stage {
            Stage::Spread => {
                self.fire(HookPoint::PreStep, 0);
                self.step.levels[0].predict()?;
                let next = stage_after_spread(self.step.num_levels(), num_procs, self.opts.predict());
                if next != Stage::Predict {
                    self.fire(HookPoint::PreIteration, 0);
                }
                self.step.status.stage = next;
            }

            Stage::Predict => {
                self.predictor(c)?;
                self.fire(HookPoint::PreIteration, 0);
                self.step.status.stage = Stage::ItFine;
            }

            Stage::ItFine => {
                self.step.levels[0].sweep()?;
                self.step.levels[0].compute_residual()?;
                self.fire(HookPoint::PostSweep, 0);
                let overlap = !self.step.status.last && self.opts.fine_comm();
                if overlap {
                    // the end-point buffer may still be in flight
                    if let Some(p) = self.pending_values.remove(&0) {
                        p.wait();
                    }
                }
                self.step.levels[0].compute_end_point()?;
                if overlap {
                    let data = self.step.levels[0].uend()?.as_ref().to_vec();
                    let next = self.step.status.slot + 1;
                    self.pending_values.insert(0, c.isend(next, 0, data));
                }
                self.step.status.stage = Stage::ItCheck;
            }

            Stage::ItCheck => {
                let first = self.step.status.first;
                if !first && !self.step.status.prev_done {
                    let msg = c.recv(self.step.status.slot - 1, STATUS_TAG)?;
                    self.step.status.prev_done = msg.first().copied().unwrap_or(0.0) != 0.0;
                }
                self.fire(HookPoint::PostIteration, 0);

                let conv = Convergence {
                    restol: self.opts.restol,
                    maxiter: self.opts.maxiter,
                };
                let (local_done, _) =
                    conv.check(self.step.levels[0].state.residual, self.step.status.iter);
                let done = local_done && (first || self.step.status.prev_done);
                self.step.status.done = done;

                if !self.step.status.last {
                    if let Some(p) = self.pending_status.take() {
                        p.wait();
                    }
                    let next = self.step.status.slot + 1;
                    let flag = if done { 1.0 } else { 0.0 };
                    self.pending_status = Some(c.isend(next, STATUS_TAG, vec![flag]));
                }

                if done {
                    self.step.levels[0].compute_end_point()?;
                    self.fire(HookPoint::PostStep, 0);
                    self.step.status.stage = Stage::Done;
                } else {
                    self.step.status.iter += 1;
                    self.step.status.stage =
                        stage_after_check(self.step.num_levels(), num_procs);
                }
            }

            Stage::ItUp => {
                self.step.restrict(0)?;
                let nl = self.step.num_levels();
                for l in 1..nl - 1 {
                    self.step.levels[l].sweep()?;
                    self.step.levels[l].compute_residual()?;
                    self.fire(HookPoint::PostSweep, l);
                    let overlap = !self.step.status.last && self.opts.fine_comm();
                    if overlap {
                        if let Some(p) = self.pending_values.remove(&l) {
                            p.wait();
                        }
                    }
                    self.step.levels[l].compute_end_point()?;
                    if overlap {
                        let data = self.step.levels[l].uend()?.as_ref().to_vec();
                        let next = self.step.status.slot + 1;
                        self.pending_values.insert(l, c.isend(next, l as i32, data));
                    }
                    self.step.restrict(l)?;
                }
                self.step.status.stage = Stage::ItCoarseRecv;
            }

            Stage::ItCoarseRecv => {
                if !self.step.status.first && !self.step.status.prev_done {
                    let cidx = self.step.coarsest();
                    let data = c.recv(self.step.status.slot - 1, cidx as i32)?;
                    self.step.levels[cidx].accept_initial(V::from(data))?;
                }
                self.step.status.stage = Stage::ItCoarse;
            }

            Stage::ItCoarse => {
                let cidx = self.step.coarsest();
                self.step.levels[cidx].sweep()?;
                self.step.levels[cidx].compute_residual()?;
                self.fire(HookPoint::PostSweep, cidx);
                self.step.levels[cidx].compute_end_point()?;
                if !self.step.status.last {
                    let data = self.step.levels[cidx].uend()?.as_ref().to_vec();
                    c.send(self.step.status.slot + 1, cidx as i32, &data);
                }
                self.step.status.stage = stage_after_coarse(self.step.num_levels());
            }

            Stage::ItDown => {
                let nl = self.step.num_levels();
                for l in (1..nl).rev() {
                    if !self.step.status.first
                        && self.opts.fine_comm()
                        && !self.step.status.prev_done
                    {
                        let data = c.recv(self.step.status.slot - 1, (l - 1) as i32)?;
                        self.step.levels[l - 1].accept_initial(V::from(data))?;
                    }
                    self.step.prolong(l)?;
                    if l - 1 > 0 {
                        self.step.levels[l - 1].sweep()?;
                        self.step.levels[l - 1].compute_residual()?;
                        self.fire(HookPoint::PostSweep, l - 1);
                    }
                }
                self.step.status.stage = Stage::ItFine;
            }

            Stage::Done => {}
        }
        Ok(())
    }

    /// Serial burn-in along the pipeline on the coarsest level.
    fn predictor(&mut self, c: &MpiTimeComm) -> Result<(), PfasstError> {
        self.step.restrict_to_coarsest()?;
        let cidx = self.step.coarsest();
        let (slot, first, last) = {
            let st = &self.step.status;
            (st.slot, st.first, st.last)
        };
        for pass in 0..=slot {
            if pass != 0 && !first {
                let data = c.recv(slot - 1, cidx as i32)?;
                self.step.levels[cidx].accept_initial(V::from(data))?;
            }
            self.step.levels[cidx].sweep()?;
            self.step.levels[cidx].compute_end_point()?;
            if !last {
                let data = self.step.levels[cidx].uend()?.as_ref().to_vec();
                c.send(slot + 1, cidx as i32, &data);
            }
        }
        self.step.prolong_to_finest()?;
        Ok(())
    }

    fn fire(&mut self, point: HookPoint, level: usize) {
        fire_hooks(&mut self.hooks, &mut self.stats, &self.step, point, level);
    }

    /// Complete leftover asynchronous sends before their buffers go away.
    /// Messages this small complete eagerly, so the waits cannot stall the
    /// restart even when the receiver has already converged.
    fn drain_pending(&mut self) {
        for (_, p) in self.pending_values.drain() {
            p.wait();
        }
        if let Some(p) = self.pending_status.take() {
            p.wait();
        }
    }
}
