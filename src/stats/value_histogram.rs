use tracing::debug;

use crate::binning::{BinningAnalysis, BinningErrors, ConvergenceStatus, ConvergenceSummary};
use crate::histogram::{HistErrors, Histogram, HistogramParams, HistogramWithErrorBars};

use super::{MHRWStatsCollector, Sample, WalkView};

#[cfg(feature = "serde_support")]
use serde::{Serialize, Deserialize};

/// # Something that turns a walk point into the scalar of interest
/// * e.g. the fidelity of the density matrix to a reference state; see the
///   [`densedm`](crate::densedm) module for the concrete calculators
pub trait ValueCalculator {
    /// the point type this calculator understands
    type Point;

    /// the figure of merit at `pt`
    fn get_value(&self, pt: &Self::Point) -> f64;
}

/// # Collect a histogram of a figure of merit along the walk
/// * on every live sample the [`ValueCalculator`] is evaluated at the current
///   point and the value recorded into the histogram
pub struct ValueHistogramCollector<VC> {
    calc: VC,
    histogram: Histogram<u64>,
}

impl<VC: ValueCalculator> ValueHistogramCollector<VC> {
    /// Create a collector recording into a histogram with the given shape
    pub fn new(params: HistogramParams, calc: VC) -> Self {
        Self {
            calc,
            histogram: Histogram::new(params),
        }
    }

    /// the histogram accumulated so far
    #[inline]
    pub fn histogram(&self) -> &Histogram<u64> {
        &self.histogram
    }

    /// consume the collector, returning the accumulated histogram
    pub fn into_histogram(self) -> Histogram<u64> {
        self.histogram
    }

    /// record one sample, returning the bin it fell into
    fn record_sample(&mut self, sample: &Sample<'_, VC::Point>) -> Option<usize> {
        let value = self.calc.get_value(sample.curpt);
        self.histogram.record(value)
    }
}

impl<VC: ValueCalculator, WP> MHRWStatsCollector<VC::Point, WP> for ValueHistogramCollector<VC> {
    fn init(&mut self) {
        self.histogram.reset();
    }

    fn process_sample(&mut self, sample: &Sample<'_, VC::Point>, _rw: &WalkView<'_, WP>) {
        self.record_sample(sample);
    }
}

/// # Result of a [`ValueHistogramWithBinningCollector`]
/// * the histogram is scaled such that each bin holds the fraction of samples
///   that fell into it; its error bars come from the last binning level
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde_support", derive(Serialize, Deserialize))]
pub struct ValueHistogramWithBinningResult {
    /// scaled histogram with error bars from the binning analysis
    pub histogram: HistogramWithErrorBars,
    /// error bars of every bin at every binning level,
    /// `num_bins x (num_levels + 1)`
    pub error_levels: Vec<Vec<f64>>,
    /// per-bin convergence diagnosis of the binning error bars
    pub converged_status: Vec<ConvergenceStatus>,
}

impl ValueHistogramWithBinningResult {
    /// tally of the per-bin convergence statuses
    pub fn convergence_summary(&self) -> ConvergenceSummary {
        ConvergenceSummary::from_statuses(&self.converged_status)
    }
}

/// # Value histogram with binning-analysis error bars
/// * every sample feeds the canonical basis vector of its bin (the bin
///   indicator) into a [`BinningAnalysis`]; each histogram bin is the time
///   average of its indicator, which is exactly the kind of stationary
///   correlated series the binning analysis produces reliable error bars for
/// * the final [`ValueHistogramWithBinningResult`] is assembled in
///   [`done`](MHRWStatsCollector::done)
pub struct ValueHistogramWithBinningCollector<VC> {
    value_histogram: ValueHistogramCollector<VC>,
    binning: BinningAnalysis,
    indicator: Vec<f64>,
    result: Option<ValueHistogramWithBinningResult>,
}

impl<VC: ValueCalculator> ValueHistogramWithBinningCollector<VC> {
    /// # Create a collector
    /// * the binning analysis tracks one coordinate per histogram bin across
    ///   `num_levels` levels
    pub fn new(
        params: HistogramParams,
        calc: VC,
        num_levels: usize,
    ) -> Result<Self, BinningErrors> {
        Ok(Self {
            value_histogram: ValueHistogramCollector::new(params, calc),
            binning: BinningAnalysis::new(params.num_bins, num_levels)?,
            indicator: vec![0.0; params.num_bins],
            result: None,
        })
    }

    /// the raw (unscaled) histogram accumulated so far
    #[inline]
    pub fn histogram(&self) -> &Histogram<u64> {
        self.value_histogram.histogram()
    }

    /// the underlying binning analysis
    #[inline]
    pub fn binning_analysis(&self) -> &BinningAnalysis {
        &self.binning
    }

    /// # Current bin means
    /// * fraction of samples per bin, `bins[k] / (sum(bins) + off_chart)`
    pub fn bin_means(&self) -> Vec<f64> {
        let h = self.value_histogram.histogram();
        let denom = num_samples_denom(h);
        h.bins().iter().map(|&b| b as f64 / denom).collect()
    }

    /// # Convergence summary for the data collected so far
    /// * used by the
    ///   [`BinsConvergedController`](crate::controllers::BinsConvergedController)
    ///   to decide whether the sampling phase may end
    pub fn provisional_convergence_summary(&self) -> Result<ConvergenceSummary, BinningErrors> {
        let error_levels = self.binning.calc_error_levels(&self.bin_means())?;
        let statuses = self.binning.determine_error_convergence(&error_levels);
        Ok(ConvergenceSummary::from_statuses(&statuses))
    }

    /// # The final result
    /// * `Err(NotFinalized)` until the walk has finished, i.e. until
    ///   [`done`](MHRWStatsCollector::done) ran
    pub fn result(&self) -> Result<&ValueHistogramWithBinningResult, HistErrors> {
        self.result.as_ref().ok_or(HistErrors::NotFinalized)
    }

    /// consume the collector, returning the final result
    pub fn into_result(self) -> Result<ValueHistogramWithBinningResult, HistErrors> {
        self.result.ok_or(HistErrors::NotFinalized)
    }
}

fn num_samples_denom(h: &Histogram<u64>) -> f64 {
    // avoid 0/0 for an empty histogram
    h.total_counts().max(1) as f64
}

impl<VC: ValueCalculator, WP> MHRWStatsCollector<VC::Point, WP>
    for ValueHistogramWithBinningCollector<VC>
{
    fn init(&mut self) {
        MHRWStatsCollector::<VC::Point, WP>::init(&mut self.value_histogram);
        self.result = None;
    }

    fn process_sample(&mut self, sample: &Sample<'_, VC::Point>, _rw: &WalkView<'_, WP>) {
        let index = self.value_histogram.record_sample(sample);
        self.indicator.iter_mut().for_each(|x| *x = 0.0);
        if let Some(j) = index {
            self.indicator[j] = 1.0;
        }
        self.binning
            .process_new_values(&self.indicator)
            .expect("indicator length matches the number of tracked bins");
    }

    fn done(&mut self) {
        // each bin mean is the averaged indicator of its value interval; the
        // relevant denominator therefore counts off-chart samples as well
        let h = self.value_histogram.histogram();
        let denom = num_samples_denom(h);
        let bins: Vec<f64> = h.bins().iter().map(|&b| b as f64 / denom).collect();
        let off_chart = h.off_chart() as f64 / denom;

        let error_levels = self
            .binning
            .calc_error_levels(&bins)
            .expect("bin means length matches the number of tracked bins");
        let delta: Vec<f64> = error_levels
            .iter()
            .map(|row| {
                let e = row[row.len() - 1];
                if e.is_finite() {
                    e
                } else {
                    0.0
                }
            })
            .collect();
        let converged_status = self.binning.determine_error_convergence(&error_levels);

        debug!(
            summary = %ConvergenceSummary::from_statuses(&converged_status),
            "binning analysis finished"
        );

        let histogram =
            HistogramWithErrorBars::from_parts(h.params, bins, delta, off_chart)
                .expect("histogram shape invariant");
        self.result = Some(ValueHistogramWithBinningResult {
            histogram,
            error_levels,
            converged_status,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::WalkProgress;
    use crate::mhrw::{MHRWParams, StepSize};

    /// identity calculator on scalar points
    struct Identity;

    impl ValueCalculator for Identity {
        type Point = f64;

        fn get_value(&self, pt: &f64) -> f64 {
            *pt
        }
    }

    fn feed<S: MHRWStatsCollector<f64, StepSize>>(collector: &mut S, values: &[f64]) {
        let params = MHRWParams::new(StepSize(0.1), 1, 0, values.len() as u64).unwrap();
        collector.init();
        collector.thermalizing_done();
        for (i, &v) in values.iter().enumerate() {
            let view = WalkView {
                params: &params,
                progress: WalkProgress::default(),
            };
            let sample = Sample {
                iter_k: i as u64,
                sample_num: i as u64,
                curpt: &v,
                curptval: 0.0,
            };
            collector.process_sample(&sample, &view);
        }
        collector.done();
    }

    #[test]
    fn basic_collector_records_samples() {
        let params = HistogramParams::new(0.0, 1.0, 4).unwrap();
        let mut c = ValueHistogramCollector::new(params, Identity);
        feed(&mut c, &[0.1, 0.3, 0.3, 0.8, 1.5]);
        assert_eq!(c.histogram().bins(), &[1, 2, 0, 1]);
        assert_eq!(c.histogram().off_chart(), 1);
    }

    #[test]
    fn binning_collector_scales_by_total_samples() {
        let params = HistogramParams::new(0.0, 1.0, 2).unwrap();
        let mut c = ValueHistogramWithBinningCollector::new(params, Identity, 2).unwrap();
        assert!(c.result().is_err());
        // 8 samples: 6 in bin 0, 1 in bin 1, 1 off chart
        feed(&mut c, &[0.1, 0.2, 0.1, 0.4, 0.3, 0.2, 0.7, 1.2]);
        let result = c.result().unwrap();
        assert!((result.histogram.count(0) - 6.0 / 8.0).abs() < 1e-12);
        assert!((result.histogram.count(1) - 1.0 / 8.0).abs() < 1e-12);
        assert!((result.histogram.off_chart() - 1.0 / 8.0).abs() < 1e-12);
        assert_eq!(result.error_levels.len(), 2);
        assert_eq!(result.error_levels[0].len(), 3);
        assert_eq!(result.converged_status.len(), 2);
    }

    #[test]
    fn constant_value_converges_with_zero_error() {
        let params = HistogramParams::new(0.0, 1.0, 2).unwrap();
        let mut c = ValueHistogramWithBinningCollector::new(params, Identity, 4).unwrap();
        feed(&mut c, &vec![0.25; 64]);
        let result = c.result().unwrap();
        assert_eq!(result.histogram.count(0), 1.0);
        assert!(result.histogram.error_bar(0).abs() < 1e-12);
        assert_eq!(result.converged_status[0], ConvergenceStatus::Converged);
        assert!(result.convergence_summary().n_converged >= 1);
    }
}
