use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;
use tomo_mcmc::binning::{BinningAnalysis, ConvergenceStatus};

#[test]
fn constant_stream_converges_with_zero_error() {
    let mut binning = BinningAnalysis::new(1, 8).unwrap();
    for _ in 0..1 << 10 {
        binning.process_new_values(&[0.5]).unwrap();
    }
    let levels = binning.calc_error_levels(&binning.bin_means()).unwrap();
    for &eps in &levels[0] {
        assert_eq!(eps, 0.0);
    }
    assert_eq!(
        binning.determine_error_convergence(&levels),
        vec![ConvergenceStatus::Converged]
    );
}

#[test]
fn iid_stream_reproduces_the_standard_error() {
    // 2^16 i.i.d. uniform samples; every binning level estimates the same
    // standard error of the mean, sigma / sqrt(n)
    let mut rng = Pcg64::seed_from_u64(0x5eed);
    let n: u64 = 1 << 16;
    let mut binning = BinningAnalysis::new(1, 4).unwrap();
    for _ in 0..n {
        binning.process_new_values(&[rng.gen::<f64>()]).unwrap();
    }

    let sigma = (1.0f64 / 12.0).sqrt();
    let expected = sigma / (n as f64).sqrt();

    let means = binning.bin_means();
    assert!((means[0] - 0.5).abs() < 0.01);

    let levels = binning.calc_error_levels(&means).unwrap();
    for (l, &eps) in levels[0].iter().enumerate() {
        assert!(
            (eps - expected).abs() < 0.15 * expected,
            "level {}: eps = {}, expected about {}",
            l,
            eps,
            expected
        );
    }
    assert_eq!(
        binning.determine_error_convergence(&levels),
        vec![ConvergenceStatus::Converged]
    );

    let bars = binning.error_bars().unwrap();
    assert!((bars[0] - expected).abs() < 0.15 * expected);
}

#[test]
fn block_counts_follow_the_hierarchy() {
    let mut binning = BinningAnalysis::new(2, 6).unwrap();
    let total: u64 = 1000;
    let mut rng = Pcg64::seed_from_u64(3);
    for _ in 0..total {
        binning
            .process_new_values(&[rng.gen::<f64>(), rng.gen::<f64>()])
            .unwrap();
    }
    for level in 0..=6 {
        assert_eq!(binning.samples_at_level(level), total >> level);
    }
}
