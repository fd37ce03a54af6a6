//! # tomo_mcmc — reference tomography run
//! * reads outcome counts of independent POVM measurements from a JSON data
//!   file, runs parallel Metropolis-Hastings walks over the purified state
//!   space, and reports the histogram of the chosen figure of merit with
//!   statistically reliable error bars

use clap::Parser;
use serde::Deserialize;
use std::fs::File;
use std::path::PathBuf;
use std::process::exit;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use tomo_mcmc::controllers::{BinsConvergedControllerParams, StepSizeControllerParams};
use tomo_mcmc::datafile::DataFile;
use tomo_mcmc::densedm::{
    DMValueCalculator, DenseDMTaskCData, DenseMatrix, FidelityToRef, IndepMeasLLH, JumpsMethod,
    ObservableValue, PurifDistToRef, TrDistToRef,
};
use tomo_mcmc::histogram::{histogram_pretty_print, histogram_short_bar, HistogramParams};
use tomo_mcmc::mhrw::{MHRWParams, StepSize};
use tomo_mcmc::multiproc::{MultiProcErrors, TaskDispatchOptions, TaskOutcome};
use tomo_mcmc::tasks::{
    aggregate_results, aggregate_simple_histograms, render_final_report,
    run_value_histogram_tasks, run_value_histogram_tasks_simple, write_histogram_csv,
};

const EXIT_OK: i32 = 0;
const EXIT_DATA_ERROR: i32 = 1;
const EXIT_MISSING_INPUT: i32 = 3;
const EXIT_BAD_OPTION: i32 = 127;
const EXIT_INTERRUPTED: i32 = 130;

const REPORT_WIDTH: usize = 100;

#[derive(Parser, Debug)]
#[command(
    name = "tomo_mcmc",
    version,
    about = "Histogram of a figure of merit of an unknown quantum state, \
             estimated by Metropolis-Hastings sampling of the Bayesian posterior"
)]
struct Opts {
    /// JSON data file with `dim`, `Emn`, `Nm` and reference states
    #[arg(long)]
    data_file_name: Option<PathBuf>,

    /// figure of merit: fidelity[:ref], purif-dist[:ref], tr-dist[:ref],
    /// obs-value:NAME
    #[arg(long)]
    value_type: Option<String>,

    /// histogram range and bin count, as MIN:MAX/NUM_BINS
    #[arg(long)]
    value_hist: Option<String>,

    /// record a plain histogram without the binning error analysis
    #[arg(long)]
    no_binning_analysis_error_bars: bool,

    /// number of binning levels of the error analysis
    #[arg(long)]
    binning_analysis_num_levels: Option<usize>,

    /// step size of the random walk
    #[arg(long)]
    step_size: Option<f64>,

    /// iterations per sweep (default: about 1/step_size)
    #[arg(long)]
    n_sweep: Option<u64>,

    /// thermalisation sweeps
    #[arg(long)]
    n_therm: Option<u64>,

    /// sampling sweeps (one live sample each)
    #[arg(long)]
    n_run: Option<u64>,

    /// number of independent random walks
    #[arg(long)]
    n_repeats: Option<usize>,

    /// multiply all observation counts by this factor (diagnostic)
    #[arg(long)]
    n_meas_amplify_factor: Option<f64>,

    /// write the final histogram to FILE.csv
    #[arg(long)]
    write_histogram: Option<PathBuf>,

    /// jump flavour of the purified walker: full or light
    #[arg(long)]
    jumps_method: Option<String>,

    /// print a status report every MS milliseconds (0 disables)
    #[arg(long)]
    periodic_status_report_ms: Option<u64>,

    /// base seed of the per-task RNG streams (default: from the clock)
    #[arg(long)]
    seed: Option<u64>,

    /// increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// append log messages to this file instead of stderr
    #[arg(long)]
    log: Option<PathBuf>,

    /// JSON file holding the same options; explicit flags win
    #[arg(long)]
    config: Option<PathBuf>,
}

/// the `--config` file: every command-line option, all optional
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
struct ConfigFile {
    data_file_name: Option<PathBuf>,
    value_type: Option<String>,
    value_hist: Option<String>,
    no_binning_analysis_error_bars: Option<bool>,
    binning_analysis_num_levels: Option<usize>,
    step_size: Option<f64>,
    n_sweep: Option<u64>,
    n_therm: Option<u64>,
    n_run: Option<u64>,
    n_repeats: Option<usize>,
    n_meas_amplify_factor: Option<f64>,
    write_histogram: Option<PathBuf>,
    jumps_method: Option<String>,
    periodic_status_report_ms: Option<u64>,
    seed: Option<u64>,
}

struct Failure {
    code: i32,
    msg: String,
}

impl Failure {
    fn new(code: i32, msg: impl Into<String>) -> Self {
        Self {
            code,
            msg: msg.into(),
        }
    }
}

fn main() {
    let opts = match Opts::try_parse() {
        Ok(opts) => opts,
        Err(e) => {
            use clap::error::ErrorKind;
            let code = match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => EXIT_OK,
                _ => EXIT_BAD_OPTION,
            };
            let _ = e.print();
            exit(code);
        }
    };
    match run(opts) {
        Ok(code) => exit(code),
        Err(failure) => {
            eprintln!("{}", failure.msg);
            exit(failure.code);
        }
    }
}

fn init_logging(verbose: u8, log_file: Option<&PathBuf>) -> Result<(), Failure> {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = tracing_subscriber::EnvFilter::new(level);
    match log_file {
        Some(path) => {
            let file = File::options()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| {
                    Failure::new(
                        EXIT_BAD_OPTION,
                        format!("InvalidArgument: cannot open log file: {}", e),
                    )
                })?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::sync::Mutex::new(file))
                .with_ansi(false)
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}

fn parse_value_hist(spec: &str) -> Result<HistogramParams, Failure> {
    let bad = || {
        Failure::new(
            EXIT_BAD_OPTION,
            format!("InvalidArgument: --value-hist wants MIN:MAX/NUM_BINS, got `{}`", spec),
        )
    };
    let (range, bins) = spec.split_once('/').ok_or_else(bad)?;
    let (min, max) = range.split_once(':').ok_or_else(bad)?;
    let min: f64 = min.trim().parse().map_err(|_| bad())?;
    let max: f64 = max.trim().parse().map_err(|_| bad())?;
    let num_bins: usize = bins.trim().parse().map_err(|_| bad())?;
    HistogramParams::new(min, max, num_bins).map_err(|e| {
        Failure::new(
            EXIT_BAD_OPTION,
            format!("InvalidArgument: bad --value-hist: {}", e),
        )
    })
}

fn make_value_calculator(
    spec: &str,
    data: &DataFile,
) -> Result<DMValueCalculator, Failure> {
    let (kind, ref_name) = match spec.split_once(':') {
        Some((kind, name)) => (kind, Some(name)),
        None => (spec, None),
    };
    let lookup = |name: Option<&str>| -> Result<DenseMatrix, Failure> {
        data.named_matrix(name.unwrap_or("rho_MLE"))
            .map_err(|e| Failure::new(EXIT_DATA_ERROR, e.to_string()))
    };
    let calc_err = |e: tomo_mcmc::densedm::DenseDMErrors| {
        Failure::new(EXIT_DATA_ERROR, e.to_string())
    };
    match kind {
        "fidelity" => Ok(DMValueCalculator::Fidelity(
            FidelityToRef::new(&lookup(ref_name)?).map_err(calc_err)?,
        )),
        "purif-dist" => Ok(DMValueCalculator::PurifDist(
            PurifDistToRef::new(&lookup(ref_name)?).map_err(calc_err)?,
        )),
        "tr-dist" => Ok(DMValueCalculator::TrDist(
            TrDistToRef::new(&lookup(ref_name)?).map_err(calc_err)?,
        )),
        "obs-value" => {
            let name = ref_name.ok_or_else(|| {
                Failure::new(
                    EXIT_MISSING_INPUT,
                    "InvalidArgument: --value-type=obs-value needs an observable \
                     name, e.g. obs-value:A",
                )
            })?;
            Ok(DMValueCalculator::Observable(
                ObservableValue::new(&lookup(Some(name))?).map_err(calc_err)?,
            ))
        }
        other => Err(Failure::new(
            EXIT_BAD_OPTION,
            format!("InvalidArgument: unknown figure of merit `{}`", other),
        )),
    }
}

fn clock_seed() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

fn run(opts: Opts) -> Result<i32, Failure> {
    init_logging(opts.verbose, opts.log.as_ref())?;

    let config: ConfigFile = match &opts.config {
        Some(path) => {
            let file = File::open(path).map_err(|e| {
                Failure::new(
                    EXIT_BAD_OPTION,
                    format!("InvalidArgument: cannot read config file: {}", e),
                )
            })?;
            serde_json::from_reader(file).map_err(|e| {
                Failure::new(
                    EXIT_BAD_OPTION,
                    format!("InvalidArgument: malformed config file: {}", e),
                )
            })?
        }
        None => ConfigFile::default(),
    };

    // command line wins over the config file
    let data_file_name = opts
        .data_file_name
        .or(config.data_file_name)
        .ok_or_else(|| Failure::new(EXIT_MISSING_INPUT, "InvalidArgument: no data file given"))?;
    let value_hist_spec = opts
        .value_hist
        .or(config.value_hist)
        .ok_or_else(|| Failure::new(EXIT_MISSING_INPUT, "InvalidArgument: no --value-hist given"))?;
    let value_type = opts
        .value_type
        .or(config.value_type)
        .unwrap_or_else(|| "fidelity".to_string());
    let use_binning = !(opts.no_binning_analysis_error_bars
        || config.no_binning_analysis_error_bars.unwrap_or(false));
    let binning_levels = opts
        .binning_analysis_num_levels
        .or(config.binning_analysis_num_levels)
        .unwrap_or(8);
    let step_size = opts.step_size.or(config.step_size).unwrap_or(0.01);
    if !(step_size.is_finite() && step_size > 0.0) {
        return Err(Failure::new(
            EXIT_BAD_OPTION,
            "InvalidArgument: --step-size must be positive",
        ));
    }
    let n_sweep = opts
        .n_sweep
        .or(config.n_sweep)
        .unwrap_or(((1.0 / step_size).ceil() as u64).max(1));
    let n_therm = opts.n_therm.or(config.n_therm).unwrap_or(1024);
    let n_run = opts.n_run.or(config.n_run).unwrap_or(32768);
    let n_repeats = opts.n_repeats.or(config.n_repeats).unwrap_or(8);
    let amplify = opts
        .n_meas_amplify_factor
        .or(config.n_meas_amplify_factor)
        .unwrap_or(1.0);
    let write_histogram = opts.write_histogram.or(config.write_histogram);
    let jumps_method: JumpsMethod = opts
        .jumps_method
        .or(config.jumps_method)
        .unwrap_or_else(|| "full".to_string())
        .parse()
        .map_err(|e| Failure::new(EXIT_BAD_OPTION, format!("{}", e)))?;
    let status_ms = opts
        .periodic_status_report_ms
        .or(config.periodic_status_report_ms)
        .filter(|&ms| ms > 0);
    let base_seed = opts.seed.or(config.seed).unwrap_or_else(clock_seed);

    let hist_params = parse_value_hist(&value_hist_spec)?;

    // read the measurement data
    let file = File::open(&data_file_name).map_err(|e| {
        Failure::new(
            EXIT_DATA_ERROR,
            format!("InvalidInput: cannot read data file: {}", e),
        )
    })?;
    let data = DataFile::from_reader(file)
        .map_err(|e| Failure::new(EXIT_DATA_ERROR, e.to_string()))?;
    let effects = data
        .effects()
        .map_err(|e| Failure::new(EXIT_DATA_ERROR, e.to_string()))?;

    let mut llh = IndepMeasLLH::new(data.dim);
    llh.set_measurements(&effects, &data.nm)
        .map_err(|e| Failure::new(EXIT_DATA_ERROR, e.to_string()))?;
    if amplify != 1.0 {
        llh.amplify_counts(amplify);
    }

    let calc = make_value_calculator(&value_type, &data)?;

    let mhrw = MHRWParams::new(StepSize(step_size), n_sweep, n_therm, n_run)
        .map_err(|e| Failure::new(EXIT_BAD_OPTION, e.to_string()))?;

    let cdata = DenseDMTaskCData {
        llh: Arc::new(llh),
        calc,
        hist_params,
        mhrw,
        binning_levels,
        base_seed,
        jumps_method,
        step_size_controller: StepSizeControllerParams::default(),
        bins_converged_controller: BinsConvergedControllerParams::default(),
    };

    // cooperative cancellation on Ctrl-C
    let interrupt = Arc::new(AtomicBool::new(false));
    {
        let interrupt = Arc::clone(&interrupt);
        if let Err(e) = ctrlc::set_handler(move || {
            interrupt.store(true, std::sync::atomic::Ordering::Relaxed);
        }) {
            warn!(error = %e, "could not install the Ctrl-C handler");
        }
    }

    let dispatch_options = TaskDispatchOptions {
        num_threads: None,
        status_report_interval: status_ms.map(Duration::from_millis),
        interrupt: Some(Arc::clone(&interrupt)),
    };
    let status_callback = |report: &tomo_mcmc::multiproc::FullStatusReport| {
        eprint!("{}", report.human_report());
    };

    if use_binning {
        let (outcomes, interrupted) =
            match run_value_histogram_tasks(&cdata, n_repeats, dispatch_options, status_callback) {
                Ok(outcome) => (outcome.outcomes, false),
                Err(MultiProcErrors::TasksInterrupted(outcome)) => (outcome.outcomes, true),
            };
        let finished: Vec<_> = outcomes
            .iter()
            .filter_map(|o| o.finished())
            .map(|t| &t.result)
            .collect();
        if finished.is_empty() {
            return Err(Failure::new(
                if interrupted { EXIT_INTERRUPTED } else { EXIT_DATA_ERROR },
                "Interrupted: no task ran to completion",
            ));
        }
        let aggregated = aggregate_results(finished.iter().copied())
            .map_err(|e| Failure::new(EXIT_DATA_ERROR, e.to_string()))?;
        print!("{}", render_final_report(&outcomes, &aggregated, REPORT_WIDTH));

        if let Some(path) = write_histogram {
            let csv_path = format!("{}.csv", path.display());
            let mut out = File::create(&csv_path).map_err(|e| {
                Failure::new(
                    EXIT_DATA_ERROR,
                    format!("InvalidInput: cannot write `{}`: {}", csv_path, e),
                )
            })?;
            write_histogram_csv(
                &mut out,
                &aggregated.final_histogram,
                Some(&aggregated.simple_final_histogram),
                "\t",
            )
            .map_err(|e| Failure::new(EXIT_DATA_ERROR, e.to_string()))?;
            println!("histogram written to {}", csv_path);
        }
        Ok(if interrupted { EXIT_INTERRUPTED } else { EXIT_OK })
    } else {
        let (outcomes, interrupted) = match run_value_histogram_tasks_simple(
            &cdata,
            n_repeats,
            dispatch_options,
            status_callback,
        ) {
            Ok(outcome) => (outcome.outcomes, false),
            Err(MultiProcErrors::TasksInterrupted(outcome)) => (outcome.outcomes, true),
        };
        let finished: Vec<_> = outcomes.iter().filter_map(|o| o.finished()).collect();
        if finished.is_empty() {
            return Err(Failure::new(
                if interrupted { EXIT_INTERRUPTED } else { EXIT_DATA_ERROR },
                "Interrupted: no task ran to completion",
            ));
        }
        let final_histogram =
            aggregate_simple_histograms(finished.iter().map(|t| &t.histogram))
                .map_err(|e| Failure::new(EXIT_DATA_ERROR, e.to_string()))?;

        let mut report = String::new();
        for (i, outcome) in outcomes.iter().enumerate() {
            match outcome {
                TaskOutcome::Finished(task) => {
                    let ratio = task
                        .acceptance_ratio
                        .map(|r| format!("{:.2}", r))
                        .unwrap_or_else(|| "n/a".to_string());
                    report.push_str(&format!(
                        "#{:>3}: {}  [accept ratio = {}]\n",
                        i,
                        histogram_short_bar(&task.histogram, true, REPORT_WIDTH - 30),
                        ratio
                    ));
                }
                TaskOutcome::Interrupted => report.push_str(&format!("#{:>3}: <interrupted>\n", i)),
                TaskOutcome::Failed(msg) => {
                    report.push_str(&format!("#{:>3}: <failed: {}>\n", i, msg))
                }
            }
        }
        report.push_str(&histogram_pretty_print(&final_histogram, REPORT_WIDTH));
        print!("{}", report);

        if let Some(path) = write_histogram {
            let csv_path = format!("{}.csv", path.display());
            let mut out = File::create(&csv_path).map_err(|e| {
                Failure::new(
                    EXIT_DATA_ERROR,
                    format!("InvalidInput: cannot write `{}`: {}", csv_path, e),
                )
            })?;
            write_histogram_csv(&mut out, &final_histogram, None, "\t")
                .map_err(|e| Failure::new(EXIT_DATA_ERROR, e.to_string()))?;
            println!("histogram written to {}", csv_path);
        }
        Ok(if interrupted { EXIT_INTERRUPTED } else { EXIT_OK })
    }
}
