use rand::SeedableRng;
use rand_pcg::Pcg64;
use std::cell::RefCell;
use std::fmt::Display;
use std::rc::Rc;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::warn;

use crate::controllers::{
    BinsConvergedController, MHRWMultipleControllers, StepSizeController,
};
use crate::histogram::Histogram;
use crate::mhrw::{AdjustableStepSize, MHRWErrors, MHRWParams, MHRandomWalk, MHWalker};
use crate::multiproc::{
    run_parallel_tasks, MultiProcErrors, TaskDispatchOptions, TaskDispatchOutcome, TaskErrors,
};
use crate::stats::{
    MovingAverageAcceptRatioCollector, PeriodicStatusReporter, StatusSlot,
    ValueHistogramCollector, ValueHistogramWithBinningCollector, ValueHistogramWithBinningResult,
};

use super::{driver_seed, walker_seed, MHRWTaskCData};

#[cfg(feature = "serde_support")]
use serde::{Serialize, Deserialize};

/// # Result of one finished random-walk task, with binning error bars
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde_support", derive(Serialize, Deserialize))]
pub struct MHRWTaskResult<WP> {
    /// index of the task within the dispatch
    pub task_idx: usize,
    /// histogram, error levels and convergence statuses
    pub result: ValueHistogramWithBinningResult,
    /// acceptance ratio of the sampling phase
    pub acceptance_ratio: Option<f64>,
    /// walk parameters at the end of the run (controllers may have adjusted
    /// the step size)
    pub final_params: MHRWParams<WP>,
}

/// # Result of one finished random-walk task without binning analysis
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde_support", derive(Serialize, Deserialize))]
pub struct SimpleTaskResult<WP> {
    /// index of the task within the dispatch
    pub task_idx: usize,
    /// the raw histogram of the figure of merit
    pub histogram: Histogram<u64>,
    /// acceptance ratio of the sampling phase
    pub acceptance_ratio: Option<f64>,
    /// walk parameters at the end of the run
    pub final_params: MHRWParams<WP>,
}

/// # Pick a number of binning levels the planned run can support
/// * reducing until the last level is fed at least `MIN_LAST_LEVEL_SAMPLES`
///   block averages; a reduction is reported as a configuration warning
pub fn effective_binning_levels(requested: usize, n_run: u64) -> usize {
    const MIN_LAST_LEVEL_SAMPLES: u64 = 8;
    let mut levels = requested.max(1);
    while levels > 1 && (n_run >> levels) < MIN_LAST_LEVEL_SAMPLES {
        levels -= 1;
    }
    if levels != requested {
        warn!(
            requested,
            effective = levels,
            n_run,
            "too few run sweeps for the requested binning levels; reducing"
        );
    }
    levels
}

fn map_walk_error(err: MHRWErrors) -> TaskErrors {
    match err {
        MHRWErrors::Interrupted => TaskErrors::Interrupted,
        other => TaskErrors::Failed(other.to_string()),
    }
}

/// # Run one task of the value-histogram-with-binning kind
/// * composes the with-binning collector, the moving-average acceptance
///   tracker, a status reporter, the step-size controller and the
///   bins-converged controller exactly as the reference pipeline does
pub fn run_single_task<C>(
    cdata: &C,
    task_idx: usize,
    slot: Arc<StatusSlot>,
    interrupt: Arc<AtomicBool>,
) -> Result<MHRWTaskResult<<C::Walker as MHWalker>::WalkerParams>, TaskErrors>
where
    C: MHRWTaskCData,
    <C::Walker as MHWalker>::WalkerParams: AdjustableStepSize + Display + Clone,
{
    let params = cdata.mhrw_params();
    let levels = effective_binning_levels(cdata.binning_num_levels(), params.n_run);

    let value_histogram = Rc::new(RefCell::new(
        ValueHistogramWithBinningCollector::new(
            cdata.histogram_params(),
            cdata.new_value_calculator(),
            levels,
        )
        .map_err(|e| TaskErrors::Failed(e.to_string()))?,
    ));
    let tracker = Rc::new(RefCell::new(MovingAverageAcceptRatioCollector::default()));
    let reporter = PeriodicStatusReporter::new(task_idx, slot, Rc::clone(&value_histogram));
    let mut stats = (
        Rc::clone(&value_histogram),
        Rc::clone(&tracker),
        reporter,
    );

    let mut controller = <MHRWMultipleControllers<(StepSizeController, BinsConvergedController<C::Calc>)>>::new((
        StepSizeController::with_params(
            Rc::clone(&tracker),
            cdata.step_size_controller_params(),
        ),
        BinsConvergedController::with_params(
            Rc::clone(&value_histogram),
            cdata.bins_converged_controller_params(),
        ),
    ))
    .map_err(|e| TaskErrors::Failed(e.to_string()))?;

    let mut walker = cdata.new_walker(Pcg64::seed_from_u64(walker_seed(
        cdata.base_seed(),
        task_idx,
    )));
    let rng = Pcg64::seed_from_u64(driver_seed(cdata.base_seed(), task_idx));

    let mut rw = MHRandomWalk::new(params, &mut walker, &mut stats, &mut controller, rng);
    rw.set_interrupt_flag(interrupt);
    rw.run().map_err(map_walk_error)?;

    let acceptance_ratio = rw.acceptance_ratio();
    let final_params = rw.mhrw_params().clone();
    drop(rw);
    drop(controller);
    drop(stats);

    let result = Rc::try_unwrap(value_histogram)
        .map_err(|_| TaskErrors::Failed("collector still shared after the run".to_string()))?
        .into_inner()
        .into_result()
        .map_err(|e| TaskErrors::Failed(e.to_string()))?;

    Ok(MHRWTaskResult {
        task_idx,
        result,
        acceptance_ratio,
        final_params,
    })
}

/// # Run one task recording a plain histogram, without binning analysis
/// * only the step-size controller is active; error bars on the final
///   histogram then come from the inter-task spread alone
pub fn run_single_task_simple<C>(
    cdata: &C,
    task_idx: usize,
    slot: Arc<StatusSlot>,
    interrupt: Arc<AtomicBool>,
) -> Result<SimpleTaskResult<<C::Walker as MHWalker>::WalkerParams>, TaskErrors>
where
    C: MHRWTaskCData,
    <C::Walker as MHWalker>::WalkerParams: AdjustableStepSize + Display + Clone,
{
    let params = cdata.mhrw_params();

    let value_histogram = Rc::new(RefCell::new(ValueHistogramCollector::new(
        cdata.histogram_params(),
        cdata.new_value_calculator(),
    )));
    let tracker = Rc::new(RefCell::new(MovingAverageAcceptRatioCollector::default()));
    let reporter = PeriodicStatusReporter::new(task_idx, slot, Rc::clone(&value_histogram));
    let mut stats = (
        Rc::clone(&value_histogram),
        Rc::clone(&tracker),
        reporter,
    );

    let mut controller = StepSizeController::with_params(
        Rc::clone(&tracker),
        cdata.step_size_controller_params(),
    );

    let mut walker = cdata.new_walker(Pcg64::seed_from_u64(walker_seed(
        cdata.base_seed(),
        task_idx,
    )));
    let rng = Pcg64::seed_from_u64(driver_seed(cdata.base_seed(), task_idx));

    let mut rw = MHRandomWalk::new(params, &mut walker, &mut stats, &mut controller, rng);
    rw.set_interrupt_flag(interrupt);
    rw.run().map_err(map_walk_error)?;

    let acceptance_ratio = rw.acceptance_ratio();
    let final_params = rw.mhrw_params().clone();
    drop(rw);
    drop(controller);
    drop(stats);

    let histogram = Rc::try_unwrap(value_histogram)
        .map_err(|_| TaskErrors::Failed("collector still shared after the run".to_string()))?
        .into_inner()
        .into_histogram();

    Ok(SimpleTaskResult {
        task_idx,
        histogram,
        acceptance_ratio,
        final_params,
    })
}

/// # Run `num_tasks` independent with-binning walks
/// * see [`run_parallel_tasks`] for the scheduling, status-report and
///   cancellation semantics
pub fn run_value_histogram_tasks<C, Status>(
    cdata: &C,
    num_tasks: usize,
    options: TaskDispatchOptions,
    status_callback: Status,
) -> Result<
    TaskDispatchOutcome<MHRWTaskResult<<C::Walker as MHWalker>::WalkerParams>>,
    MultiProcErrors<MHRWTaskResult<<C::Walker as MHWalker>::WalkerParams>>,
>
where
    C: MHRWTaskCData,
    <C::Walker as MHWalker>::WalkerParams: AdjustableStepSize + Display + Clone + Send,
    Status: FnMut(&crate::multiproc::FullStatusReport) + Send,
{
    run_parallel_tasks(
        num_tasks,
        options,
        |task_idx, slot, interrupt| run_single_task(cdata, task_idx, slot, interrupt),
        status_callback,
    )
}

/// # Run `num_tasks` independent walks without binning analysis
pub fn run_value_histogram_tasks_simple<C, Status>(
    cdata: &C,
    num_tasks: usize,
    options: TaskDispatchOptions,
    status_callback: Status,
) -> Result<
    TaskDispatchOutcome<SimpleTaskResult<<C::Walker as MHWalker>::WalkerParams>>,
    MultiProcErrors<SimpleTaskResult<<C::Walker as MHWalker>::WalkerParams>>,
>
where
    C: MHRWTaskCData,
    <C::Walker as MHWalker>::WalkerParams: AdjustableStepSize + Display + Clone + Send,
    Status: FnMut(&crate::multiproc::FullStatusReport) + Send,
{
    run_parallel_tasks(
        num_tasks,
        options,
        |task_idx, slot, interrupt| run_single_task_simple(cdata, task_idx, slot, interrupt),
        status_callback,
    )
}
