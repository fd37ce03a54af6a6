use std::cell::RefCell;
use std::fmt::Write as _;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::histogram::histogram_short_bar;
use crate::mhrw::{ACCEPTANCE_RATIO_RECOMMENDED_MAX, ACCEPTANCE_RATIO_RECOMMENDED_MIN};

use super::{
    MHRWStatsCollector, RawMove, ValueCalculator, ValueHistogramCollector,
    ValueHistogramWithBinningCollector, WalkView,
};

/// # One-line textual status of a stats collector
/// * rendered into the per-worker status reports of the
///   [`multiproc`](crate::multiproc) dispatcher
pub trait StatusLine {
    /// a short single-line status, at most `width` characters
    fn status_line(&self, width: usize) -> String;
}

impl<T: StatusLine> StatusLine for Rc<RefCell<T>> {
    fn status_line(&self, width: usize) -> String {
        self.borrow().status_line(width)
    }
}

impl StatusLine for () {
    fn status_line(&self, _width: usize) -> String {
        String::new()
    }
}

impl<VC: ValueCalculator> StatusLine for ValueHistogramCollector<VC> {
    fn status_line(&self, width: usize) -> String {
        histogram_short_bar(self.histogram(), true, width)
    }
}

impl<VC: ValueCalculator> StatusLine for ValueHistogramWithBinningCollector<VC> {
    fn status_line(&self, width: usize) -> String {
        histogram_short_bar(self.histogram(), true, width)
    }
}

/// # Status snapshot of one running walk
#[derive(Debug, Clone)]
pub struct WorkerStatusReport {
    /// index of the worker within the dispatcher
    pub worker_id: usize,
    /// iteration counter within the current phase
    pub iter_k: u64,
    /// fraction of the nominal total iteration count already done
    pub fraction_done: f64,
    /// acceptance ratio, if any sampling-phase move happened yet
    pub acceptance_ratio: Option<f64>,
    /// walk parameter snapshot, e.g. `step_size=0.04,n_sweep=50,...`
    pub mhrw_params: String,
    /// pre-rendered human-readable status, possibly spanning two lines
    pub msg: String,
}

/// # Mailbox between the dispatcher and one walk's status reporter
/// * the dispatcher raises `requested`; the walk fills in a report at its
///   next sweep boundary and lowers the flag again
#[derive(Debug, Default)]
pub struct StatusSlot {
    requested: AtomicBool,
    report: Mutex<Option<WorkerStatusReport>>,
}

impl StatusSlot {
    /// Create an empty slot
    pub fn new() -> Self {
        Self::default()
    }

    /// ask the walk for a fresh report at its next sweep boundary
    pub fn request(&self) {
        self.requested.store(true, Ordering::Relaxed);
    }

    /// is a report currently requested?
    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::Relaxed)
    }

    /// store a report, lowering the request flag
    pub fn store(&self, report: WorkerStatusReport) {
        *self.report.lock().expect("status slot poisoned") = Some(report);
        self.requested.store(false, Ordering::Relaxed);
    }

    /// the latest report, if any was filed yet
    pub fn latest(&self) -> Option<WorkerStatusReport> {
        self.report.lock().expect("status slot poisoned").clone()
    }

    /// drop any stored report and pending request, e.g. when the walk ended
    pub fn clear(&self) {
        *self.report.lock().expect("status slot poisoned") = None;
        self.requested.store(false, Ordering::Relaxed);
    }
}

/// # Stats collector filling a [`StatusSlot`] on demand
/// * checks the slot once per sweep; when a report was requested it renders
///   the current phase, progress, acceptance ratio and the status line of the
///   wrapped collector (usually the value histogram)
pub struct PeriodicStatusReporter<L> {
    worker_id: usize,
    slot: std::sync::Arc<StatusSlot>,
    status_source: L,
}

impl<L: StatusLine> PeriodicStatusReporter<L> {
    /// Create a reporter writing into `slot`
    pub fn new(worker_id: usize, slot: std::sync::Arc<StatusSlot>, status_source: L) -> Self {
        Self {
            worker_id,
            slot,
            status_source,
        }
    }
}

impl<L, P, WP> MHRWStatsCollector<P, WP> for PeriodicStatusReporter<L>
where
    L: StatusLine,
    WP: std::fmt::Display,
{
    fn raw_move(&mut self, mv: &RawMove<'_, P>, rw: &WalkView<'_, WP>) {
        if !self.slot.is_requested() || (mv.iter_k + 1) % rw.params.n_sweep != 0 {
            return;
        }

        let params = rw.params;
        let total_iters = params.n_total_iters();
        let iters_done = if mv.is_thermalizing {
            mv.iter_k
        } else {
            mv.iter_k + params.n_sweep * params.n_therm
        };
        let fraction_done = (iters_done as f64 / total_iters as f64).min(1.0);
        let acceptance_ratio = rw.progress.acceptance_ratio();

        let mut msg = if mv.is_thermalizing {
            format!(
                "therm. sweep {}/{} [+rn:{}]",
                mv.iter_k / params.n_sweep,
                params.n_therm,
                params.n_run
            )
        } else {
            format!(
                "run sweep    {}/{} [+th:{}]",
                mv.iter_k / params.n_sweep,
                params.n_run,
                params.n_therm
            )
        };
        let _ = write!(msg, " : {:5.2}% done", fraction_done * 100.0);
        if let Some(ratio) = acceptance_ratio {
            let warn = !(ACCEPTANCE_RATIO_RECOMMENDED_MIN..=ACCEPTANCE_RATIO_RECOMMENDED_MAX)
                .contains(&ratio);
            let _ = write!(
                msg,
                "  [{}accept ratio={:.2}{}]",
                if warn { "!!** " } else { "" },
                ratio,
                if warn { " **!!" } else { "" },
            );
        }
        let status = self.status_source.status_line(60);
        if !status.is_empty() {
            msg.push_str("\n    ");
            msg.push_str(&status);
        }

        self.slot.store(WorkerStatusReport {
            worker_id: self.worker_id,
            iter_k: mv.iter_k,
            fraction_done,
            acceptance_ratio,
            mhrw_params: params.to_string(),
            msg,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mhrw::{MHRWParams, StepSize};
    use crate::stats::WalkProgress;
    use std::sync::Arc;

    #[test]
    fn reporter_fills_slot_only_on_request_at_sweep_boundary() {
        let slot = Arc::new(StatusSlot::new());
        let mut reporter = PeriodicStatusReporter::new(3, Arc::clone(&slot), ());
        let params = MHRWParams::new(StepSize(0.04), 10, 4, 16).unwrap();
        let pt = 0.0f64;

        let raw = |iter_k: u64, is_thermalizing: bool| RawMove {
            iter_k,
            is_thermalizing,
            is_live_iter: false,
            accepted: true,
            a: 1.0,
            newpt: &pt,
            newptval: 0.0,
            curpt: &pt,
            curptval: 0.0,
        };
        let view = WalkView {
            params: &params,
            progress: WalkProgress {
                num_accepted: 25,
                num_live_points: 100,
            },
        };

        // no request -> nothing stored
        MHRWStatsCollector::<f64, StepSize>::raw_move(&mut reporter, &raw(9, true), &view);
        assert!(slot.latest().is_none());

        slot.request();
        // not a sweep boundary -> keeps waiting
        MHRWStatsCollector::<f64, StepSize>::raw_move(&mut reporter, &raw(3, true), &view);
        assert!(slot.latest().is_none());
        assert!(slot.is_requested());

        MHRWStatsCollector::<f64, StepSize>::raw_move(&mut reporter, &raw(19, false), &view);
        let report = slot.latest().expect("report stored");
        assert!(!slot.is_requested());
        assert_eq!(report.worker_id, 3);
        assert_eq!(report.iter_k, 19);
        assert!(report.msg.contains("run sweep"));
        assert!(report.msg.contains("accept ratio=0.25"));
        assert!(report.acceptance_ratio.is_some());
        // 40 therm iters + 19 done out of 200 total
        assert!((report.fraction_done - 59.0 / 200.0).abs() < 1e-12);
    }
}
