use std::cmp::Ordering;

use crate::histogram::{
    AveragedHistogram, HistErrors, Histogram, HistogramWithErrorBars,
};
use crate::stats::ValueHistogramWithBinningResult;

#[cfg(feature = "serde_support")]
use serde::{Serialize, Deserialize};

/// # The two final histograms produced from a set of task results
/// * `final_histogram` combines the per-task binning error bars
/// * `simple_final_histogram` ignores them and reports the naive inter-task
///   standard error instead; comparing the two is a useful sanity check of
///   the binning analysis
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde_support", derive(Serialize, Deserialize))]
pub struct AggregatedHistograms {
    /// averaged histogram with error bars combined from the binning analyses
    pub final_histogram: HistogramWithErrorBars,
    /// averaged histogram with naive inter-task error bars
    pub simple_final_histogram: HistogramWithErrorBars,
}

/// lexicographic total order on float slices
fn cmp_slices(x: &[f64], y: &[f64]) -> Ordering {
    for (a, b) in x.iter().zip(y) {
        match a.total_cmp(b) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    x.len().cmp(&y.len())
}

/// total order on histograms, used to make aggregation independent of the
/// order the task results arrive in
fn canonical_cmp(
    a: &ValueHistogramWithBinningResult,
    b: &ValueHistogramWithBinningResult,
) -> Ordering {
    cmp_slices(a.histogram.bins(), b.histogram.bins())
        .then_with(|| cmp_slices(a.histogram.delta(), b.histogram.delta()))
        .then_with(|| a.histogram.off_chart().total_cmp(&b.histogram.off_chart()))
}

/// # Aggregate per-task results into the final histograms
/// * all results must share the same histogram parameters
/// * the inputs are brought into a canonical order before accumulation, so
///   the result is bitwise independent of the order of the slice
pub fn aggregate_results<'a, I>(results: I) -> Result<AggregatedHistograms, HistErrors>
where
    I: IntoIterator<Item = &'a ValueHistogramWithBinningResult>,
{
    let mut sorted: Vec<&ValueHistogramWithBinningResult> = results.into_iter().collect();
    if sorted.is_empty() {
        return Err(HistErrors::NoData);
    }
    sorted.sort_by(|a, b| canonical_cmp(a, b));

    let params = sorted[0].histogram.params;
    let mut final_avg = AveragedHistogram::<HistogramWithErrorBars>::new(params);
    let mut simple_avg = AveragedHistogram::<Histogram<f64>>::new(params);

    for result in &sorted {
        final_avg.add_histogram(&result.histogram)?;
        // the very same per-task histogram, stripped of its error bars
        let mut plain = Histogram::<f64>::new(params);
        plain.load(result.histogram.bins(), result.histogram.off_chart())?;
        simple_avg.add_histogram(&plain)?;
    }
    final_avg.finalize()?;
    simple_avg.finalize()?;

    Ok(AggregatedHistograms {
        final_histogram: final_avg.into_final_histogram()?,
        simple_final_histogram: simple_avg.into_final_histogram()?,
    })
}

/// # Aggregate raw per-task histograms (no binning analysis)
/// * each histogram is first scaled to the fraction of its own samples, so
///   tasks of different lengths still contribute comparably
/// * the error bars of the result are the inter-task standard error
pub fn aggregate_simple_histograms<'a, I>(
    histograms: I,
) -> Result<HistogramWithErrorBars, HistErrors>
where
    I: IntoIterator<Item = &'a Histogram<u64>>,
{
    let mut scaled: Vec<Histogram<f64>> = histograms
        .into_iter()
        .map(|h| h.normalized_counts())
        .collect();
    if scaled.is_empty() {
        return Err(HistErrors::NoData);
    }
    scaled.sort_by(|a, b| {
        cmp_slices(a.bins(), b.bins())
            .then_with(|| a.off_chart().total_cmp(&b.off_chart()))
    });

    let mut avg = AveragedHistogram::<Histogram<f64>>::new(scaled[0].params);
    for h in &scaled {
        avg.add_histogram(h)?;
    }
    avg.finalize()?;
    avg.into_final_histogram()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binning::ConvergenceStatus;
    use crate::histogram::HistogramParams;

    fn result_from(bins: Vec<f64>, delta: Vec<f64>) -> ValueHistogramWithBinningResult {
        let params = HistogramParams::new(0.0, 1.0, bins.len()).unwrap();
        let num_bins = bins.len();
        ValueHistogramWithBinningResult {
            histogram: HistogramWithErrorBars::from_parts(params, bins, delta, 0.0).unwrap(),
            error_levels: vec![vec![0.0; 3]; num_bins],
            converged_status: vec![ConvergenceStatus::Converged; num_bins],
        }
    }

    #[test]
    fn aggregation_is_order_independent() {
        let results = vec![
            result_from(vec![0.31, 0.19, 0.5], vec![0.01, 0.02, 0.01]),
            result_from(vec![0.27, 0.23, 0.5], vec![0.02, 0.01, 0.03]),
            result_from(vec![0.35, 0.15, 0.5], vec![0.015, 0.025, 0.02]),
            result_from(vec![0.29, 0.21, 0.5], vec![0.011, 0.021, 0.012]),
        ];
        let forward = aggregate_results(results.iter()).unwrap();
        let backward = aggregate_results(results.iter().rev()).unwrap();
        let shuffled_order = [2usize, 0, 3, 1];
        let shuffled =
            aggregate_results(shuffled_order.iter().map(|&i| &results[i])).unwrap();

        assert_eq!(forward.final_histogram, backward.final_histogram);
        assert_eq!(forward.final_histogram, shuffled.final_histogram);
        assert_eq!(
            forward.simple_final_histogram,
            shuffled.simple_final_histogram
        );
    }

    #[test]
    fn combined_and_simple_error_bars_differ_as_specified() {
        let results = vec![
            result_from(vec![0.6, 0.4], vec![0.1, 0.1]),
            result_from(vec![0.4, 0.6], vec![0.1, 0.1]),
        ];
        let agg = aggregate_results(results.iter()).unwrap();
        // combined: sqrt(0.01 + 0.01) / 2
        let combined = (0.02f64).sqrt() / 2.0;
        assert!((agg.final_histogram.error_bar(0) - combined).abs() < 1e-12);
        // naive: standard error of {0.6, 0.4} = 0.1
        assert!((agg.simple_final_histogram.error_bar(0) - 0.1).abs() < 1e-12);
        // means agree
        assert!((agg.final_histogram.count(0) - 0.5).abs() < 1e-12);
        assert!((agg.simple_final_histogram.count(0) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn empty_input_is_rejected() {
        assert_eq!(
            aggregate_results(std::iter::empty()).unwrap_err(),
            HistErrors::NoData
        );
    }
}
