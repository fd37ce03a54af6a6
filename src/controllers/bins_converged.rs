use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, warn};

use crate::mhrw::{MHRWParams, MHWalker};
use crate::stats::{ValueCalculator, ValueHistogramWithBinningCollector, WalkProgress};

use super::{AdjustmentStrategy, HasAdjustmentStrategy, MHRWController};

#[cfg(feature = "serde_support")]
use serde::{Serialize, Deserialize};

/// # Tuning knobs of the [`BinsConvergedController`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde_support", derive(Serialize, Deserialize))]
pub struct BinsConvergedControllerParams {
    /// how many bins with unknown error-bar convergence are tolerated
    pub max_allowed_unknown: usize,
    /// how many *non-isolated* unknown bins (adjacent to other unknown bins)
    /// are tolerated
    pub max_allowed_unknown_not_isolated: usize,
    /// how many bins with non-converged error bars are tolerated
    pub max_allowed_not_converged: usize,
    /// how often the convergence is re-examined, in sweeps
    pub check_frequency_sweeps: u64,
}

impl Default for BinsConvergedControllerParams {
    fn default() -> Self {
        Self {
            max_allowed_unknown: 2,
            max_allowed_unknown_not_isolated: 0,
            max_allowed_not_converged: 0,
            check_frequency_sweeps: 1024,
        }
    }
}

/// # Keep sampling until the binning error bars have converged
/// * periodically recomputes a provisional convergence summary from the
///   with-binning stats collector (shared via `Rc<RefCell<..>>`) and vetoes
///   the end of the sampling phase while too many bins are undecided or not
///   converged
/// * never adjusts any walk parameter
pub struct BinsConvergedController<VC> {
    params: BinsConvergedControllerParams,
    collector: Rc<RefCell<ValueHistogramWithBinningCollector<VC>>>,
    last_check_iter: Option<u64>,
    last_verdict: bool,
}

impl<VC: ValueCalculator> BinsConvergedController<VC> {
    /// Create a controller with default thresholds, watching `collector`
    pub fn new(collector: Rc<RefCell<ValueHistogramWithBinningCollector<VC>>>) -> Self {
        Self::with_params(collector, BinsConvergedControllerParams::default())
    }

    /// Create a controller with explicit thresholds
    pub fn with_params(
        collector: Rc<RefCell<ValueHistogramWithBinningCollector<VC>>>,
        params: BinsConvergedControllerParams,
    ) -> Self {
        Self {
            params,
            collector,
            last_check_iter: None,
            last_verdict: false,
        }
    }

    fn examine(&self) -> bool {
        let summary = match self.collector.borrow().provisional_convergence_summary() {
            Ok(summary) => summary,
            Err(err) => {
                // a mis-sized collector would already have failed at
                // construction; never block the walk on this
                warn!(error = %err, "could not examine error-bar convergence");
                return true;
            }
        };
        let ok = summary.n_unknown <= self.params.max_allowed_unknown
            && summary.n_unknown_not_isolated() <= self.params.max_allowed_unknown_not_isolated
            && summary.n_not_converged <= self.params.max_allowed_not_converged;
        debug!(summary = %summary, allow_done = ok, "examined error-bar convergence");
        ok
    }
}

impl<VC> HasAdjustmentStrategy for BinsConvergedController<VC> {
    fn adjustment_strategy(&self) -> AdjustmentStrategy {
        // this controller only vetoes, it never adjusts
        AdjustmentStrategy::NONE
    }
}

impl<W, VC> MHRWController<W> for BinsConvergedController<VC>
where
    W: MHWalker,
    VC: ValueCalculator,
{
    fn allow_done_runs(
        &mut self,
        params: &MHRWParams<W::WalkerParams>,
        _walker: &W,
        iter_k: u64,
        _progress: &WalkProgress,
    ) -> bool {
        let check_iters = self.params.check_frequency_sweeps.max(1) * params.n_sweep;
        let due = match self.last_check_iter {
            None => true,
            Some(last) => iter_k.saturating_sub(last) >= check_iters,
        };
        if due {
            self.last_verdict = self.examine();
            self.last_check_iter = Some(iter_k);
        }
        self.last_verdict
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::histogram::HistogramParams;
    use crate::mhrw::{MHFnSyntax, MHRWParams, StepSize};
    use crate::stats::{MHRWStatsCollector, Sample, WalkView};

    struct Identity;

    impl ValueCalculator for Identity {
        type Point = f64;

        fn get_value(&self, pt: &f64) -> f64 {
            *pt
        }
    }

    struct DummyWalker;

    impl MHWalker for DummyWalker {
        type Point = f64;
        type WalkerParams = StepSize;

        fn start_point(&mut self) -> f64 {
            0.0
        }

        fn jump_fn(&mut self, cur: &f64, _params: &StepSize) -> f64 {
            *cur
        }

        fn fn_syntax(&self) -> MHFnSyntax {
            MHFnSyntax::LogValue
        }

        fn fn_value(&self, _pt: &f64) -> f64 {
            0.0
        }
    }

    #[test]
    fn vetoes_until_bins_converge() {
        let hist_params = HistogramParams::new(0.0, 1.0, 2).unwrap();
        let collector = Rc::new(RefCell::new(
            ValueHistogramWithBinningCollector::new(hist_params, Identity, 3).unwrap(),
        ));
        let mut ctrl = BinsConvergedController::with_params(
            Rc::clone(&collector),
            BinsConvergedControllerParams {
                check_frequency_sweeps: 1,
                ..Default::default()
            },
        );
        let params = MHRWParams::new(StepSize(0.1), 1, 0, 8).unwrap();
        let walker = DummyWalker;
        let progress = WalkProgress::default();

        // no samples yet: binning levels are empty, bins are unknown
        assert!(!MHRWController::<DummyWalker>::allow_done_runs(
            &mut ctrl, &params, &walker, 8, &progress
        ));

        // feed a perfectly constant stream long enough for all levels
        for i in 0..64u64 {
            let view = WalkView {
                params: &params,
                progress,
            };
            let sample = Sample {
                iter_k: i,
                sample_num: i,
                curpt: &0.25,
                curptval: 0.0,
            };
            collector.borrow_mut().process_sample(&sample, &view);
        }
        // verdict is cached until the next check is due
        assert!(!MHRWController::<DummyWalker>::allow_done_runs(
            &mut ctrl, &params, &walker, 8, &progress
        ));
        assert!(MHRWController::<DummyWalker>::allow_done_runs(
            &mut ctrl, &params, &walker, 9, &progress
        ));
    }
}
