use average::{Estimate, Variance};
use std::marker::PhantomData;

use super::{AveragableHistogram, HistErrors, HistogramParams, HistogramWithErrorBars};

/// # Average many histograms of identical shape
/// * feed histograms with [`add_histogram`](Self::add_histogram), then call
///   [`finalize`](Self::finalize) once
/// * for input histograms **without** error bars the resulting error bar per
///   bin is the standard error of the mean across the inputs,
///   `sqrt((⟨x²⟩ - ⟨x⟩²) / (N - 1))`
/// * for input histograms **with** error bars `δ_i` the resulting error bar is
///   `sqrt(Σ δ_i²) / N`
pub struct AveragedHistogram<H> {
    params: HistogramParams,
    accum: Accum,
    off_chart_sum: f64,
    num_histograms: usize,
    finalized: Option<HistogramWithErrorBars>,
    marker: PhantomData<H>,
}

enum Accum {
    /// inputs without error bars: online mean/variance per bin
    Naive(Vec<Variance>),
    /// inputs with error bars: sum of values and sum of squared error bars
    Combined { bins_sum: Vec<f64>, delta_sq_sum: Vec<f64> },
}

impl<H: AveragableHistogram> AveragedHistogram<H> {
    /// Create an empty averager for histograms with the given parameters
    pub fn new(params: HistogramParams) -> Self {
        let accum = if H::HAS_ERROR_BARS {
            Accum::Combined {
                bins_sum: vec![0.0; params.num_bins],
                delta_sq_sum: vec![0.0; params.num_bins],
            }
        } else {
            Accum::Naive(vec![Variance::new(); params.num_bins])
        };
        Self {
            params,
            accum,
            off_chart_sum: 0.0,
            num_histograms: 0,
            finalized: None,
            marker: PhantomData,
        }
    }

    /// number of histograms added so far
    #[inline]
    pub fn num_histograms(&self) -> usize {
        self.num_histograms
    }

    /// # Accumulate one histogram
    /// * `Err(BinCountMismatch)` if the shape does not match
    /// * `Err(AlreadyFinalized)` if [`finalize`](Self::finalize) was called;
    ///   use [`reset`](Self::reset) to start over
    pub fn add_histogram(&mut self, histogram: &H) -> Result<(), HistErrors> {
        if self.finalized.is_some() {
            return Err(HistErrors::AlreadyFinalized);
        }
        if *histogram.params() != self.params {
            return Err(HistErrors::BinCountMismatch);
        }
        match &mut self.accum {
            Accum::Naive(vars) => {
                for (k, var) in vars.iter_mut().enumerate() {
                    var.add(histogram.bin_value(k));
                }
            }
            Accum::Combined {
                bins_sum,
                delta_sq_sum,
            } => {
                for k in 0..self.params.num_bins {
                    bins_sum[k] += histogram.bin_value(k);
                    let d = histogram.bin_error(k);
                    delta_sq_sum[k] += d * d;
                }
            }
        }
        self.off_chart_sum += histogram.off_chart_value();
        self.num_histograms += 1;
        Ok(())
    }

    /// # Finalize the averaging
    /// * computes the mean bin values and the error bars
    /// * `Err(NotFinalized)` if no histogram was added
    pub fn finalize(&mut self) -> Result<(), HistErrors> {
        if self.num_histograms == 0 {
            return Err(HistErrors::NotFinalized);
        }
        if self.finalized.is_some() {
            return Ok(());
        }
        let n = self.num_histograms as f64;
        let (bins, delta): (Vec<f64>, Vec<f64>) = match &self.accum {
            Accum::Naive(vars) => vars.iter().map(|v| (v.mean(), v.error())).unzip(),
            Accum::Combined {
                bins_sum,
                delta_sq_sum,
            } => bins_sum
                .iter()
                .zip(delta_sq_sum)
                .map(|(&s, &dsq)| (s / n, dsq.sqrt() / n))
                .unzip(),
        };
        self.finalized = Some(
            HistogramWithErrorBars::from_parts(self.params, bins, delta, self.off_chart_sum / n)
                .expect("bin count invariant"),
        );
        Ok(())
    }

    /// # The averaged histogram
    /// * `Err(NotFinalized)` unless [`finalize`](Self::finalize) was called
    pub fn final_histogram(&self) -> Result<&HistogramWithErrorBars, HistErrors> {
        self.finalized.as_ref().ok_or(HistErrors::NotFinalized)
    }

    /// Consume the averager, returning the averaged histogram
    pub fn into_final_histogram(self) -> Result<HistogramWithErrorBars, HistErrors> {
        self.finalized.ok_or(HistErrors::NotFinalized)
    }

    /// Discard all accumulated data, allowing the averager to be reused
    pub fn reset(&mut self) {
        *self = Self::new(self.params);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::histogram::Histogram;

    fn params() -> HistogramParams {
        HistogramParams::new(0.0, 1.0, 4).unwrap()
    }

    fn hist_from(bins: &[u64]) -> Histogram<u64> {
        let mut h = Histogram::<u64>::new(params());
        h.load(bins, 0).unwrap();
        h
    }

    #[test]
    fn averaging_without_error_bars() {
        // scenario: three histograms, same support
        let hists = [
            hist_from(&[4, 3, 2, 1]),
            hist_from(&[2, 3, 4, 1]),
            hist_from(&[3, 3, 3, 1]),
        ];
        let mut avg = AveragedHistogram::new(params());
        for h in &hists {
            avg.add_histogram(h).unwrap();
        }
        avg.finalize().unwrap();
        let fin = avg.final_histogram().unwrap();
        assert_eq!(fin.bins(), &[3.0, 3.0, 3.0, 1.0]);
        // standard error of the mean: sqrt(((16+4+9)/3 - 9) / 2) = sqrt(1/3)
        let expected = (1.0f64 / 3.0).sqrt();
        assert!((fin.error_bar(0) - expected).abs() < 1e-12);
        assert!(fin.error_bar(1).abs() < 1e-12);
        assert!((fin.error_bar(2) - expected).abs() < 1e-12);
        assert!(fin.error_bar(3).abs() < 1e-12);
    }

    #[test]
    fn same_histogram_n_times_has_zero_spread() {
        let h = hist_from(&[5, 1, 0, 2]);
        let mut avg = AveragedHistogram::new(params());
        for _ in 0..8 {
            avg.add_histogram(&h).unwrap();
        }
        avg.finalize().unwrap();
        let fin = avg.final_histogram().unwrap();
        assert_eq!(fin.bins(), &[5.0, 1.0, 0.0, 2.0]);
        for k in 0..4 {
            assert!(fin.error_bar(k).abs() < 1e-12);
        }
    }

    #[test]
    fn averaging_with_error_bars_scales_delta() {
        let h = HistogramWithErrorBars::from_parts(
            params(),
            vec![0.25; 4],
            vec![0.1, 0.2, 0.0, 0.4],
            0.0,
        )
        .unwrap();
        let n = 4usize;
        let mut avg = AveragedHistogram::<HistogramWithErrorBars>::new(params());
        for _ in 0..n {
            avg.add_histogram(&h).unwrap();
        }
        avg.finalize().unwrap();
        let fin = avg.final_histogram().unwrap();
        // delta = sqrt(N δ²) / N = δ / sqrt(N)
        for k in 0..4 {
            assert!((fin.error_bar(k) - h.error_bar(k) / (n as f64).sqrt()).abs() < 1e-12);
            assert!((fin.count(k) - 0.25).abs() < 1e-12);
        }
    }

    #[test]
    fn result_gated_on_finalize() {
        let mut avg = AveragedHistogram::<Histogram<u64>>::new(params());
        assert_eq!(avg.final_histogram().unwrap_err(), HistErrors::NotFinalized);
        assert_eq!(avg.finalize().unwrap_err(), HistErrors::NotFinalized);
        avg.add_histogram(&hist_from(&[1, 1, 1, 1])).unwrap();
        avg.finalize().unwrap();
        assert!(avg.final_histogram().is_ok());
        assert_eq!(
            avg.add_histogram(&hist_from(&[1, 1, 1, 1])).unwrap_err(),
            HistErrors::AlreadyFinalized
        );
    }
}
