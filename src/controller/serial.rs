//! Single-process controller for SDC, MLSDC, MSSDC and PFASST.
//!
//! All steps of a block live in this process and communicate through FIFO
//! mailboxes with the same point-to-point semantics the distributed
//! controller gets from its transport. The event loop offers every
//! non-finished step one stage transition per round, in slot order; a step
//! whose receive has not arrived yet simply stays in its stage until the
//! upstream step has produced the message. That reproduces the pipelined
//! wavefront of the parallel run deterministically.

use log::{debug, info};

use crate::config::ControllerOptions;
use crate::controller::{fire_hooks, validate_setup, HookPoint};
use crate::error::PfasstError;
use crate::hooks::{Hook, Stats, StatsHook};
use crate::parallel::{active_slots, BlockLayout, Mailbox, TIME_EPS};
use crate::step::{stage_after_check, stage_after_coarse, stage_after_spread, Stage, Step};
use crate::utils::convergence::Convergence;

pub struct SerialController<V> {
    opts: ControllerOptions,
    steps: Vec<Step<V>>,
    hooks: Vec<Box<dyn Hook<V>>>,
    stats: Stats,
    mailbox: Mailbox<V>,
}

impl<V> SerialController<V>
where
    V: Clone + AsRef<[f64]> + AsMut<[f64]> + From<Vec<f64>>,
{
    /// Build a controller with `opts.num_procs` identical steps produced by
    /// `build_step(slot)`. All configuration errors surface here.
    pub fn new(
        opts: ControllerOptions,
        mut build_step: impl FnMut(usize) -> Result<Step<V>, PfasstError>,
    ) -> Result<Self, PfasstError> {
        opts.validate()?;
        let steps = (0..opts.num_procs)
            .map(&mut build_step)
            .collect::<Result<Vec<_>, _>>()?;
        let dt = steps[0].dt;
        for step in &steps {
            validate_setup(&opts, step, opts.num_procs > 1)?;
            if step.dt != dt {
                return Err(PfasstError::Config(
                    "all steps of a block must share one step size".into(),
                ));
            }
        }
        Ok(Self {
            opts,
            steps,
            hooks: vec![Box::new(StatsHook)],
            stats: Stats::new(),
            mailbox: Mailbox::new(),
        })
    }

    pub fn add_hook(&mut self, hook: Box<dyn Hook<V>>) {
        self.hooks.push(hook);
    }

    /// Integrate from `t0` to `tend`, returning the final value and the
    /// collected statistics. Returns `u0` untouched when no slice fits
    /// before `tend`.
    pub fn run(&mut self, u0: V, t0: f64, tend: f64) -> Result<(V, Stats), PfasstError> {
        if !(tend.is_finite() && t0.is_finite()) {
            return Err(PfasstError::Config("start and end time must be finite".into()));
        }
        let dt = self.steps[0].dt;
        let mut time = t0;
        let mut u = u0;

        while time < tend - TIME_EPS {
            let active = active_slots(time, dt, self.opts.num_procs, tend);
            if active == 0 {
                break;
            }
            info!("block at t = {time:.6e} with {active} active slots");
            self.mailbox.clear();
            for s in 0..active {
                let layout = BlockLayout::new(s, active);
                self.steps[s].restart(&layout, time + s as f64 * dt, &u)?;
            }
            for s in 0..active {
                self.fire(s, HookPoint::PreBlock, 0);
            }

            loop {
                let mut all_done = true;
                let mut progressed = false;
                for s in 0..active {
                    if self.steps[s].status.done {
                        continue;
                    }
                    all_done = false;
                    if self.advance(s, active)? {
                        progressed = true;
                    }
                }
                if all_done {
                    break;
                }
                if !progressed {
                    return Err(PfasstError::Internal("pipelined iteration stalled"));
                }
            }

            u = self.steps[active - 1].levels[0].uend()?.clone();
            time += active as f64 * dt;
        }
        Ok((u, std::mem::take(&mut self.stats)))
    }

    /// Offer step `s` one stage transition. Returns false when the step is
    /// blocked on a message its predecessor has not sent yet.
    fn advance(&mut self, s: usize, num_procs: usize) -> Result<bool, PfasstError> {
        let stage = self.steps[s].status.stage;
        debug!(
            "slot {} iter {} stage {:?}",
            s, self.steps[s].status.iter, stage
        );
        match stage {
            Stage::Spread => {
                self.fire(s, HookPoint::PreStep, 0);
                self.steps[s].levels[0].predict()?;
                let nl = self.steps[s].num_levels();
                let next = stage_after_spread(nl, num_procs, self.opts.predict());
                if next != Stage::Predict {
                    self.fire(s, HookPoint::PreIteration, 0);
                }
                self.steps[s].status.stage = next;
            }

            Stage::Predict => {
                self.predictor(s)?;
                self.fire(s, HookPoint::PreIteration, 0);
                self.steps[s].status.stage = Stage::ItFine;
            }

            Stage::ItFine => {
                self.steps[s].levels[0].sweep()?;
                self.steps[s].levels[0].compute_residual()?;
                self.fire(s, HookPoint::PostSweep, 0);
                self.steps[s].levels[0].compute_end_point()?;
                let last = self.steps[s].status.last;
                if !last && self.opts.fine_comm() {
                    let v = self.steps[s].levels[0].uend()?.clone();
                    self.mailbox.send_value(s, 0, v);
                }
                self.steps[s].status.stage = Stage::ItCheck;
            }

            Stage::ItCheck => {
                // The predecessor's verdict gates ours, so fetch it before
                // judging and forwarding our own.
                let (first, prev_done) = {
                    let st = &self.steps[s].status;
                    (st.first, st.prev_done)
                };
                if !first && !prev_done {
                    match self.mailbox.recv_status(s - 1) {
                        Some(d) => self.steps[s].status.prev_done = d,
                        None => return Ok(false),
                    }
                }
                self.fire(s, HookPoint::PostIteration, 0);

                let conv = Convergence {
                    restol: self.opts.restol,
                    maxiter: self.opts.maxiter,
                };
                let residual = self.steps[s].levels[0].state.residual;
                let iter = self.steps[s].status.iter;
                let (local_done, _) = conv.check(residual, iter);
                let done = local_done && (first || self.steps[s].status.prev_done);

                self.steps[s].status.done = done;
                if !self.steps[s].status.last {
                    self.mailbox.send_status(s, done);
                }
                if done {
                    debug_assert!(first || self.steps[s].status.prev_done);
                    self.steps[s].levels[0].compute_end_point()?;
                    self.fire(s, HookPoint::PostStep, 0);
                    self.steps[s].status.stage = Stage::Done;
                } else {
                    self.steps[s].status.iter += 1;
                    let nl = self.steps[s].num_levels();
                    self.steps[s].status.stage = stage_after_check(nl, num_procs);
                }
            }

            Stage::ItUp => {
                self.steps[s].restrict(0)?;
                let nl = self.steps[s].num_levels();
                for l in 1..nl - 1 {
                    self.steps[s].levels[l].sweep()?;
                    self.steps[s].levels[l].compute_residual()?;
                    self.fire(s, HookPoint::PostSweep, l);
                    self.steps[s].levels[l].compute_end_point()?;
                    let last = self.steps[s].status.last;
                    if !last && self.opts.fine_comm() {
                        let v = self.steps[s].levels[l].uend()?.clone();
                        self.mailbox.send_value(s, l, v);
                    }
                    self.steps[s].restrict(l)?;
                }
                self.steps[s].status.stage = Stage::ItCoarseRecv;
            }

            Stage::ItCoarseRecv => {
                let (first, prev_done) = {
                    let st = &self.steps[s].status;
                    (st.first, st.prev_done)
                };
                if !first && !prev_done {
                    let c = self.steps[s].coarsest();
                    match self.mailbox.recv_value(s - 1, c) {
                        Some(v) => self.steps[s].levels[c].accept_initial(v)?,
                        None => return Ok(false),
                    }
                }
                self.steps[s].status.stage = Stage::ItCoarse;
            }

            Stage::ItCoarse => {
                let c = self.steps[s].coarsest();
                self.steps[s].levels[c].sweep()?;
                self.steps[s].levels[c].compute_residual()?;
                self.fire(s, HookPoint::PostSweep, c);
                self.steps[s].levels[c].compute_end_point()?;
                if !self.steps[s].status.last {
                    let v = self.steps[s].levels[c].uend()?.clone();
                    self.mailbox.send_value(s, c, v);
                }
                let nl = self.steps[s].num_levels();
                self.steps[s].status.stage = stage_after_coarse(nl);
            }

            Stage::ItDown => {
                let nl = self.steps[s].num_levels();
                for l in (1..nl).rev() {
                    let (first, prev_done) = {
                        let st = &self.steps[s].status;
                        (st.first, st.prev_done)
                    };
                    if !first && self.opts.fine_comm() && !prev_done {
                        // The matching send happened earlier in the
                        // predecessor's cycle, so the message must be there.
                        let v = self
                            .mailbox
                            .recv_value(s - 1, l - 1)
                            .ok_or(PfasstError::Internal("fine exchange message missing"))?;
                        self.steps[s].levels[l - 1].accept_initial(v)?;
                    }
                    self.steps[s].prolong(l)?;
                    if l - 1 > 0 {
                        self.steps[s].levels[l - 1].sweep()?;
                        self.steps[s].levels[l - 1].compute_residual()?;
                        self.fire(s, HookPoint::PostSweep, l - 1);
                    }
                }
                self.steps[s].status.stage = Stage::ItFine;
            }

            Stage::Done => {}
        }
        Ok(true)
    }

    /// Serial burn-in along the pipeline: restrict to the coarsest level,
    /// then one coarse sweep per predecessor pass, receiving and forwarding
    /// end points, and prolong the result back up.
    fn predictor(&mut self, s: usize) -> Result<(), PfasstError> {
        self.steps[s].restrict_to_coarsest()?;
        let c = self.steps[s].coarsest();
        let (slot, first, last) = {
            let st = &self.steps[s].status;
            (st.slot, st.first, st.last)
        };
        for pass in 0..=slot {
            if pass != 0 && !first {
                let v = self
                    .mailbox
                    .recv_value(s - 1, c)
                    .ok_or(PfasstError::Internal("predictor message missing"))?;
                self.steps[s].levels[c].accept_initial(v)?;
            }
            self.steps[s].levels[c].sweep()?;
            self.steps[s].levels[c].compute_end_point()?;
            if !last {
                let v = self.steps[s].levels[c].uend()?.clone();
                self.mailbox.send_value(s, c, v);
            }
        }
        self.steps[s].prolong_to_finest()?;
        Ok(())
    }

    fn fire(&mut self, s: usize, point: HookPoint, level: usize) {
        fire_hooks(&mut self.hooks, &mut self.stats, &self.steps[s], point, level);
    }
}
