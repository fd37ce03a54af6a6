use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;
use std::cell::RefCell;
use std::rc::Rc;

use tomo_mcmc::controllers::{
    BinsConvergedControllerParams, NoController, StepSizeController, StepSizeControllerParams,
};
use tomo_mcmc::histogram::HistogramParams;
use tomo_mcmc::mhrw::{MHFnSyntax, MHRWParams, MHRandomWalk, MHWalker, StepSize};
use tomo_mcmc::multiproc::TaskDispatchOptions;
use tomo_mcmc::stats::{
    MovingAverageAcceptRatioCollector, ValueCalculator, ValueHistogramCollector,
};
use tomo_mcmc::tasks::{aggregate_results, run_value_histogram_tasks, MHRWTaskCData};

/// walk on the real line targeting a standard normal distribution; the
/// acceptance ratio decreases monotonically with the step size
struct GaussianWalker {
    rng: Pcg64,
    start: f64,
}

impl MHWalker for GaussianWalker {
    type Point = f64;
    type WalkerParams = StepSize;

    fn start_point(&mut self) -> f64 {
        self.start
    }

    fn jump_fn(&mut self, cur: &f64, params: &StepSize) -> f64 {
        cur + params.0 * (self.rng.gen::<f64>() * 2.0 - 1.0)
    }

    fn fn_syntax(&self) -> MHFnSyntax {
        MHFnSyntax::LogValue
    }

    fn fn_value(&self, pt: &f64) -> f64 {
        -0.5 * pt * pt
    }
}

struct Identity;

impl ValueCalculator for Identity {
    type Point = f64;

    fn get_value(&self, pt: &f64) -> f64 {
        *pt
    }
}

#[test]
fn empirical_distribution_matches_the_target() {
    let params = MHRWParams::new(StepSize(1.5), 8, 256, 8192).unwrap();
    let mut walker = GaussianWalker {
        rng: Pcg64::seed_from_u64(11),
        start: 2.5,
    };
    let mut stats = ValueHistogramCollector::new(
        HistogramParams::new(-4.0, 4.0, 32).unwrap(),
        Identity,
    );
    let mut controller = NoController;
    let mut rw = MHRandomWalk::new(
        params,
        &mut walker,
        &mut stats,
        &mut controller,
        Pcg64::seed_from_u64(12),
    );
    rw.run().unwrap();

    let hist = stats.histogram();
    let total = hist.total_counts() as f64;
    assert_eq!(hist.total_counts(), 8192);

    // empirical mean from the bin centers
    let mean: f64 = (0..hist.num_bins())
        .map(|k| hist.params.bin_center_value(k) * hist.count(k) as f64)
        .sum::<f64>()
        / total;
    assert!(mean.abs() < 0.1, "empirical mean {}", mean);

    // probability mass inside [-1, 1): Phi(1) - Phi(-1) = 0.6827
    let mass: f64 = (0..hist.num_bins())
        .filter(|&k| {
            hist.params.bin_lower_value(k) >= -1.0 && hist.params.bin_upper_value(k) <= 1.0
        })
        .map(|k| hist.count(k) as f64)
        .sum::<f64>()
        / total;
    assert!((mass - 0.6827).abs() < 0.05, "mass in [-1,1] = {}", mass);
}

#[test]
fn step_size_controller_reaches_the_acceptable_band() {
    // start with an absurdly large step so the controller has to act
    let params = MHRWParams::new(StepSize(50.0), 16, 512, 64).unwrap();
    let mut walker = GaussianWalker {
        rng: Pcg64::seed_from_u64(21),
        start: 0.0,
    };
    let tracker = Rc::new(RefCell::new(MovingAverageAcceptRatioCollector::default()));
    let mut stats = (Rc::clone(&tracker),);
    let mut controller = StepSizeController::with_params(
        Rc::clone(&tracker),
        StepSizeControllerParams::default(),
    );
    let mut rw = MHRandomWalk::new(
        params,
        &mut walker,
        &mut stats,
        &mut controller,
        Pcg64::seed_from_u64(22),
    );
    rw.run().unwrap();

    let final_step = rw.mhrw_params().mhwalker_params.0;
    assert!(
        final_step < 50.0,
        "controller should have shrunk the step, got {}",
        final_step
    );
    assert!(controller.num_adjustments() >= 1);

    // the thermalisation veto only lifts once the moving average lies in the
    // acceptable band, and the tracker did not move since that decision
    let ratio = tracker.borrow().moving_average().unwrap();
    assert!(
        (0.15..=0.40).contains(&ratio),
        "moving-average acceptance ratio {} outside the acceptable band",
        ratio
    );
}

/// task context sampling the standard normal with the identity figure of
/// merit
struct GaussCData {
    hist: HistogramParams,
    mhrw: MHRWParams<StepSize>,
    seed: u64,
}

impl MHRWTaskCData for GaussCData {
    type Walker = GaussianWalker;
    type Calc = Identity;

    fn histogram_params(&self) -> HistogramParams {
        self.hist
    }

    fn mhrw_params(&self) -> MHRWParams<StepSize> {
        self.mhrw
    }

    fn binning_num_levels(&self) -> usize {
        5
    }

    fn base_seed(&self) -> u64 {
        self.seed
    }

    fn new_walker(&self, rng: Pcg64) -> GaussianWalker {
        GaussianWalker { rng, start: 0.0 }
    }

    fn new_value_calculator(&self) -> Identity {
        Identity
    }

    fn bins_converged_controller_params(&self) -> BinsConvergedControllerParams {
        // a short test run cannot be expected to converge every bin; the
        // controller must not extend the walk here
        BinsConvergedControllerParams {
            max_allowed_unknown: usize::MAX,
            max_allowed_unknown_not_isolated: usize::MAX,
            max_allowed_not_converged: usize::MAX,
            check_frequency_sweeps: 64,
        }
    }
}

fn run_gauss_tasks(seed: u64) -> Vec<tomo_mcmc::tasks::MHRWTaskResult<StepSize>> {
    let cdata = GaussCData {
        hist: HistogramParams::new(-3.0, 3.0, 30).unwrap(),
        mhrw: MHRWParams::new(StepSize(1.0), 8, 64, 1024).unwrap(),
        seed,
    };
    let outcome =
        run_value_histogram_tasks(&cdata, 8, TaskDispatchOptions::default(), |_| {}).unwrap();
    assert_eq!(outcome.num_finished(), 8);
    outcome
        .outcomes
        .into_iter()
        .map(|o| match o {
            tomo_mcmc::multiproc::TaskOutcome::Finished(r) => r,
            other => panic!("unexpected outcome {:?}", other),
        })
        .collect()
}

#[test]
fn identical_seeds_give_identical_task_results() {
    let a = run_gauss_tasks(0xfeed);
    let b = run_gauss_tasks(0xfeed);
    for (ta, tb) in a.iter().zip(&b) {
        assert_eq!(ta.result.histogram, tb.result.histogram);
        assert_eq!(ta.acceptance_ratio, tb.acceptance_ratio);
        assert_eq!(ta.result.converged_status, tb.result.converged_status);
    }

    // distinct tasks sample distinct streams
    assert_ne!(a[0].result.histogram, a[1].result.histogram);
}

#[test]
fn aggregation_of_real_runs_is_order_independent() {
    let tasks = run_gauss_tasks(0xabcd);
    let in_order = aggregate_results(tasks.iter().map(|t| &t.result)).unwrap();
    let reversed = aggregate_results(tasks.iter().rev().map(|t| &t.result)).unwrap();
    let shuffled_idx = [5usize, 2, 7, 0, 3, 6, 1, 4];
    let shuffled =
        aggregate_results(shuffled_idx.iter().map(|&i| &tasks[i].result)).unwrap();

    assert_eq!(in_order.final_histogram, reversed.final_histogram);
    assert_eq!(in_order.final_histogram, shuffled.final_histogram);
    assert_eq!(in_order.simple_final_histogram, shuffled.simple_final_histogram);

    // per-task scaling: each task contributes a unit of probability
    let total: f64 = in_order.final_histogram.bins().iter().sum::<f64>()
        + in_order.final_histogram.off_chart();
    assert!((total - 1.0).abs() < 1e-9);
}
