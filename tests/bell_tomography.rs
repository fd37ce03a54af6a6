use nalgebra::Complex;
use std::sync::Arc;

use tomo_mcmc::controllers::{BinsConvergedControllerParams, StepSizeControllerParams};
use tomo_mcmc::densedm::{
    DMValueCalculator, DenseDMTaskCData, DenseMatrix, FidelityToRef, IndepMeasLLH, JumpsMethod,
};
use tomo_mcmc::histogram::HistogramParams;
use tomo_mcmc::mhrw::{MHRWParams, StepSize};
use tomo_mcmc::multiproc::TaskDispatchOptions;
use tomo_mcmc::tasks::{aggregate_results, run_value_histogram_tasks};

fn c(re: f64, im: f64) -> Complex<f64> {
    Complex::new(re, im)
}

fn identity(dim: usize) -> DenseMatrix {
    DenseMatrix::identity(dim, dim)
}

fn pauli(which: char) -> DenseMatrix {
    match which {
        'x' => DenseMatrix::from_row_slice(2, 2, &[c(0.0, 0.0), c(1.0, 0.0), c(1.0, 0.0), c(0.0, 0.0)]),
        'y' => DenseMatrix::from_row_slice(2, 2, &[c(0.0, 0.0), c(0.0, -1.0), c(0.0, 1.0), c(0.0, 0.0)]),
        'z' => DenseMatrix::from_row_slice(2, 2, &[c(1.0, 0.0), c(0.0, 0.0), c(0.0, 0.0), c(-1.0, 0.0)]),
        _ => unreachable!(),
    }
}

fn kron(a: &DenseMatrix, b: &DenseMatrix) -> DenseMatrix {
    a.kronecker(b)
}

/// the projective effects (I +- S⊗S)/2 of a two-qubit correlation measurement
fn pair_effects(which: char) -> (DenseMatrix, DenseMatrix) {
    let ss = kron(&pauli(which), &pauli(which));
    let plus = (identity(4) + &ss) * c(0.5, 0.0);
    let minus = (identity(4) - &ss) * c(0.5, 0.0);
    (plus, minus)
}

/// |Phi+><Phi+| with |Phi+> = (|00> + |11>) / sqrt(2)
fn bell_state() -> DenseMatrix {
    let mut rho = DenseMatrix::zeros(4, 4);
    for &i in &[0usize, 3] {
        for &j in &[0usize, 3] {
            rho[(i, j)] = c(0.5, 0.0);
        }
    }
    rho
}

/// Bell-pair tomography data: Pauli pair measurements XX, YY, ZZ with
/// outcome counts (95, 5), (8, 92), (98, 2)
fn bell_llh() -> IndepMeasLLH {
    let mut llh = IndepMeasLLH::new(4);
    let counts = [('x', 95.0, 5.0), ('y', 8.0, 92.0), ('z', 98.0, 2.0)];
    for (which, n_plus, n_minus) in counts {
        let (plus, minus) = pair_effects(which);
        llh.add_measurement(&plus, n_plus).unwrap();
        llh.add_measurement(&minus, n_minus).unwrap();
    }
    llh
}

fn bell_cdata(mhrw: MHRWParams<StepSize>, binning_levels: usize, lenient: bool) -> DenseDMTaskCData {
    let bins_converged = if lenient {
        // a scaled-down test run cannot converge every bin; do not let the
        // controller extend the walk
        BinsConvergedControllerParams {
            max_allowed_unknown: usize::MAX,
            max_allowed_unknown_not_isolated: usize::MAX,
            max_allowed_not_converged: usize::MAX,
            check_frequency_sweeps: 256,
        }
    } else {
        BinsConvergedControllerParams::default()
    };
    DenseDMTaskCData {
        llh: Arc::new(bell_llh()),
        calc: DMValueCalculator::Fidelity(FidelityToRef::new(&bell_state()).unwrap()),
        hist_params: HistogramParams::new(0.70, 1.00, 50).unwrap(),
        mhrw,
        binning_levels,
        base_seed: 31415,
        jumps_method: JumpsMethod::Full,
        step_size_controller: StepSizeControllerParams::default(),
        bins_converged_controller: bins_converged,
    }
}

#[test]
fn bell_fidelity_posterior_concentrates_near_the_mle() {
    let cdata = bell_cdata(
        MHRWParams::new(StepSize(0.04), 20, 128, 2048).unwrap(),
        5,
        true,
    );
    let outcome =
        run_value_histogram_tasks(&cdata, 4, TaskDispatchOptions::default(), |_| {}).unwrap();
    assert_eq!(outcome.num_finished(), 4);

    let results: Vec<_> = outcome
        .outcomes
        .iter()
        .filter_map(|o| o.finished())
        .collect();
    for task in &results {
        let ratio = task.acceptance_ratio.expect("sampling phase ran");
        assert!(
            (0.1..=0.5).contains(&ratio),
            "acceptance ratio {} way off",
            ratio
        );
    }

    let agg = aggregate_results(results.iter().map(|t| &t.result)).unwrap();
    let hist = &agg.final_histogram;

    // per-task scaling: the total probability is one
    let total: f64 = hist.bins().iter().sum::<f64>() + hist.off_chart();
    assert!((total - 1.0).abs() < 1e-9);

    // the posterior must sit well above fidelity 0.85 (the MLE fidelity is
    // about 0.96 for these counts)
    let mode_bin = (0..hist.num_bins())
        .max_by(|&a, &b| hist.count(a).total_cmp(&hist.count(b)))
        .unwrap();
    let mode_center = hist.params.bin_center_value(mode_bin);
    assert!(
        mode_center >= 0.90,
        "posterior mode at fidelity {}, expected close to 0.96",
        mode_center
    );
    let mass_high: f64 = (0..hist.num_bins())
        .filter(|&k| hist.params.bin_lower_value(k) >= 0.85)
        .map(|k| hist.count(k))
        .sum();
    assert!(
        mass_high > 0.8,
        "only {} of the posterior mass above fidelity 0.85",
        mass_high
    );
    // hardly anything should fall outside [0.70, 1.00)
    assert!(hist.off_chart() < 0.05);
}

/// the full literal scenario; expensive, run with `cargo test -- --ignored`
#[test]
#[ignore]
fn bell_fidelity_full_scenario() {
    let cdata = bell_cdata(
        MHRWParams::new(StepSize(0.04), 50, 1024, 32768).unwrap(),
        8,
        false,
    );
    let outcome =
        run_value_histogram_tasks(&cdata, 20, TaskDispatchOptions::default(), |_| {}).unwrap();
    assert_eq!(outcome.num_finished(), 20);

    let results: Vec<_> = outcome
        .outcomes
        .iter()
        .filter_map(|o| o.finished())
        .collect();
    for task in &results {
        let ratio = task.acceptance_ratio.expect("sampling phase ran");
        assert!(
            (0.15..=0.40).contains(&ratio),
            "acceptance ratio {} outside the acceptable band",
            ratio
        );
        let summary = task.result.convergence_summary();
        assert_eq!(summary.n_not_converged, 0);
        assert!(summary.n_unknown <= 2);
    }

    let agg = aggregate_results(results.iter().map(|t| &t.result)).unwrap();
    let hist = &agg.final_histogram;
    let mode_bin = (0..hist.num_bins())
        .max_by(|&a, &b| hist.count(a).total_cmp(&hist.count(b)))
        .unwrap();
    let mode_center = hist.params.bin_center_value(mode_bin);
    assert!(
        (0.93..=0.99).contains(&mode_center),
        "posterior mode at fidelity {}",
        mode_center
    );

    // binning error bars and the naive inter-run spread agree within a
    // factor of about two on the well-populated bins
    for k in 0..hist.num_bins() {
        let combined = hist.error_bar(k);
        let simple = agg.simple_final_histogram.error_bar(k);
        if combined > 1e-4 && simple > 1e-4 {
            let ratio = combined / simple;
            assert!(
                (0.25..=4.0).contains(&ratio),
                "bin {}: combined {} vs simple {}",
                k,
                combined,
                simple
            );
        }
    }
}
