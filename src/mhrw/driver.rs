use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

use crate::controllers::{AdjustStage, MHRWController};
use crate::stats::{MHRWStatsCollector, RawMove, Sample, WalkProgress, WalkView};

use super::{MHFnSyntax, MHRWErrors, MHRWParams, MHWalker};

/// # The Metropolis-Hastings random-walk driver
/// * composes a [`MHWalker`], a stats collector and a controller and takes
///   care of the full walk: thermalisation first, then the sampling phase
///   with one live sample per sweep
/// * the driver owns its random number generator and the current point; the
///   walker, stats collector and controller are borrowed from the caller
/// * an optional interrupt flag is checked once per sweep;
///   [`run`](Self::run) returns `Err(Interrupted)` when it is raised, leaving
///   no partial sweep committed
pub struct MHRandomWalk<'a, W, S, C, R>
where
    W: MHWalker,
    S: MHRWStatsCollector<W::Point, W::WalkerParams>,
    C: MHRWController<W>,
    R: Rng,
{
    n: MHRWParams<W::WalkerParams>,
    rng: R,
    walker: &'a mut W,
    stats: &'a mut S,
    controller: &'a mut C,
    fn_syntax: MHFnSyntax,
    num_accepted: u64,
    num_live_points: u64,
    interrupt: Option<Arc<AtomicBool>>,
}

impl<'a, W, S, C, R> MHRandomWalk<'a, W, S, C, R>
where
    W: MHWalker,
    S: MHRWStatsCollector<W::Point, W::WalkerParams>,
    C: MHRWController<W>,
    R: Rng,
{
    /// # Create a new driver
    /// * the function-value convention of the walker is resolved here, once
    pub fn new(
        n: MHRWParams<W::WalkerParams>,
        walker: &'a mut W,
        stats: &'a mut S,
        controller: &'a mut C,
        rng: R,
    ) -> Self {
        let fn_syntax = walker.fn_syntax();
        Self {
            n,
            rng,
            walker,
            stats,
            controller,
            fn_syntax,
            num_accepted: 0,
            num_live_points: 0,
            interrupt: None,
        }
    }

    /// # Register a cooperative interrupt flag
    /// * checked once per sweep in both phases
    pub fn set_interrupt_flag(&mut self, flag: Arc<AtomicBool>) {
        self.interrupt = Some(flag);
    }

    /// the current walk parameters (controllers may have adjusted them)
    #[inline]
    pub fn mhrw_params(&self) -> &MHRWParams<W::WalkerParams> {
        &self.n
    }

    /// accepted moves during the sampling phase so far
    #[inline]
    pub fn num_accepted(&self) -> u64 {
        self.num_accepted
    }

    /// total moves during the sampling phase so far
    #[inline]
    pub fn num_live_points(&self) -> u64 {
        self.num_live_points
    }

    /// # The acceptance ratio of the sampling phase
    /// * `None` while no sampling-phase move happened yet
    pub fn acceptance_ratio(&self) -> Option<f64> {
        self.progress().acceptance_ratio()
    }

    /// # Run the random walk
    /// * thermalises for at least `n_sweep * n_therm` iterations, extended
    ///   while the controller vetoes; then samples for at least
    ///   `n_sweep * n_run` iterations, one live sample per sweep
    pub fn run(&mut self) -> Result<(), MHRWErrors> {
        self.num_accepted = 0;
        self.num_live_points = 0;

        let mut curpt = self.walker.start_point();
        let mut curptval = self.point_value(&curpt);

        self.walker.init();
        self.stats.init();
        {
            let progress = self.progress();
            self.controller.init(&self.n, &*self.walker, &progress);
        }

        debug!(
            n_sweep = self.n.n_sweep,
            n_therm = self.n.n_therm,
            n_run = self.n.n_run,
            "starting thermalisation"
        );

        // the loop bounds are re-read every iteration: a controller may
        // extend the phase by vetoing, and allow_done is only consulted once
        // the nominal iteration count is exhausted
        let mut k: u64 = 0;
        loop {
            if k >= self.n.n_sweep * self.n.n_therm && self.allow_therm_done(k) {
                break;
            }
            self.do_move(k, true, false, &mut curpt, &mut curptval);
            self.adjust(k, true, false);
            k += 1;
            if k % self.n.n_sweep == 0 {
                self.check_interrupt()?;
            }
        }

        self.walker.thermalizing_done();
        self.stats.thermalizing_done();
        {
            let progress = self.progress();
            self.controller
                .thermalizing_done(&self.n, &*self.walker, &progress);
        }

        debug!("thermalisation done, starting live sweeps");

        let mut n_live: u64 = 0;
        let mut k: u64 = 0;
        loop {
            if k >= self.n.n_sweep * self.n.n_run && self.allow_runs_done(k) {
                break;
            }
            let is_live = (k + 1) % self.n.n_sweep == 0;
            self.do_move(k, false, is_live, &mut curpt, &mut curptval);
            self.adjust(k, false, false);
            if is_live {
                {
                    let view = WalkView {
                        params: &self.n,
                        progress: WalkProgress {
                            num_accepted: self.num_accepted,
                            num_live_points: self.num_live_points,
                        },
                    };
                    let sample = Sample {
                        iter_k: k,
                        sample_num: n_live,
                        curpt: &curpt,
                        curptval,
                    };
                    self.stats.process_sample(&sample, &view);
                }
                n_live += 1;
                self.adjust(k, false, true);
                self.check_interrupt()?;
            }
            k += 1;
        }

        self.walker.done();
        self.stats.done();
        {
            let progress = self.progress();
            self.controller.done(&self.n, &*self.walker, &progress);
        }

        debug!(
            num_accepted = self.num_accepted,
            num_live_points = self.num_live_points,
            "random walk completed"
        );

        Ok(())
    }

    /// process one proposed move
    fn do_move(
        &mut self,
        iter_k: u64,
        is_thermalizing: bool,
        is_live_iter: bool,
        curpt: &mut W::Point,
        curptval: &mut f64,
    ) {
        let newpt = self.walker.jump_fn(curpt, &self.n.mhwalker_params);
        let newptval = self.point_value(&newpt);
        let a = self.a_value(&newpt, newptval, curpt, *curptval);

        let accepted = if a >= 1.0 {
            true
        } else {
            self.rng.gen::<f64>() <= a
        };

        if !is_thermalizing {
            if accepted {
                self.num_accepted += 1;
            }
            self.num_live_points += 1;
        }

        {
            let view = WalkView {
                params: &self.n,
                progress: WalkProgress {
                    num_accepted: self.num_accepted,
                    num_live_points: self.num_live_points,
                },
            };
            let mv = RawMove {
                iter_k,
                is_thermalizing,
                is_live_iter,
                accepted,
                a,
                newpt: &newpt,
                newptval,
                curpt,
                curptval: *curptval,
            };
            self.stats.raw_move(&mv, &view);
        }

        if accepted {
            *curpt = newpt;
            *curptval = newptval;
        }
    }

    fn progress(&self) -> WalkProgress {
        WalkProgress {
            num_accepted: self.num_accepted,
            num_live_points: self.num_live_points,
        }
    }

    fn adjust(&mut self, iter_k: u64, is_thermalizing: bool, is_after_sample: bool) {
        if self
            .controller
            .adjustment_strategy()
            .enables(is_thermalizing, is_after_sample)
        {
            let progress = self.progress();
            let stage = AdjustStage {
                is_thermalizing,
                is_after_sample,
            };
            self.controller
                .adjust_params(stage, &mut self.n, &mut *self.walker, iter_k, &progress);
        }
    }

    fn allow_therm_done(&mut self, iter_k: u64) -> bool {
        let progress = self.progress();
        self.controller
            .allow_done_thermalization(&self.n, &*self.walker, iter_k, &progress)
    }

    fn allow_runs_done(&mut self, iter_k: u64) -> bool {
        let progress = self.progress();
        self.controller
            .allow_done_runs(&self.n, &*self.walker, iter_k, &progress)
    }

    fn check_interrupt(&self) -> Result<(), MHRWErrors> {
        match &self.interrupt {
            Some(flag) if flag.load(Ordering::Relaxed) => Err(MHRWErrors::Interrupted),
            _ => Ok(()),
        }
    }

    /// function value at `pt`, or a dummy for the relative-value convention
    fn point_value(&self, pt: &W::Point) -> f64 {
        match self.fn_syntax {
            MHFnSyntax::RelativeValue => 0.0,
            _ => self.walker.fn_value(pt),
        }
    }

    /// the Metropolis-Hastings acceptance ratio of a proposed move
    fn a_value(&self, newpt: &W::Point, newptval: f64, curpt: &W::Point, curptval: f64) -> f64 {
        match self.fn_syntax {
            MHFnSyntax::Value => newptval / curptval,
            MHFnSyntax::LogValue => {
                if newptval > curptval {
                    1.0
                } else {
                    (newptval - curptval).exp()
                }
            }
            MHFnSyntax::RelativeValue => self.walker.fn_rel_value(newpt, curpt),
        }
    }
}
