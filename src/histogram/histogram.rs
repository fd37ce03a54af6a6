use num_traits::{Num, NumCast};
use std::ops::AddAssign;

use super::{HistErrors, HistogramParams};

#[cfg(feature = "serde_support")]
use serde::{Serialize, Deserialize};

/// Anything usable as a bin count, i.e. unsigned integers for raw counting
/// or floats for scaled histograms
pub trait HistCount: Num + NumCast + AddAssign + Copy + PartialOrd {}
impl<T> HistCount for T where T: Num + NumCast + AddAssign + Copy + PartialOrd {}

/// # Histogram with fixed range and equal-width bins
/// * values outside of `[min, max)` are collected in the `off_chart` counter
/// * the count type `C` is `u64` for raw counting; scaled histograms use `f64`
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde_support", derive(Serialize, Deserialize))]
pub struct Histogram<C = u64> {
    /// binning parameters of this histogram
    pub params: HistogramParams,
    bins: Vec<C>,
    off_chart: C,
}

impl<C: HistCount> Histogram<C> {
    /// Create an empty histogram for the given binning parameters
    pub fn new(params: HistogramParams) -> Self {
        Self {
            params,
            bins: vec![C::zero(); params.num_bins],
            off_chart: C::zero(),
        }
    }

    /// the bin counts
    #[inline]
    pub fn bins(&self) -> &[C] {
        &self.bins
    }

    /// count of bin `index`
    #[inline]
    pub fn count(&self, index: usize) -> C {
        self.bins[index]
    }

    /// number of bins
    #[inline]
    pub fn num_bins(&self) -> usize {
        self.bins.len()
    }

    /// weight recorded outside of `[min, max)`
    #[inline]
    pub fn off_chart(&self) -> C {
        self.off_chart
    }

    /// reset all counts to zero
    pub fn reset(&mut self) {
        self.bins.iter_mut().for_each(|b| *b = C::zero());
        self.off_chart = C::zero();
    }

    /// # Record a value with weight 1
    /// * returns the index of the bin the value was counted in
    /// * `None` if the value was counted as off-chart
    pub fn record(&mut self, value: f64) -> Option<usize> {
        self.record_with_weight(value, C::one())
    }

    /// # Record a value with the given weight
    /// * returns the index of the bin the value was counted in
    /// * `None` if the value was counted as off-chart
    pub fn record_with_weight(&mut self, value: f64, weight: C) -> Option<usize> {
        match self.params.bin_index(value) {
            Ok(idx) => {
                self.bins[idx] += weight;
                Some(idx)
            }
            Err(_) => {
                self.off_chart += weight;
                None
            }
        }
    }

    /// # Bulk add counts
    /// * adds `bins[i]` to bin `i` and `off_chart` to the off-chart counter
    /// * `Err(BinCountMismatch)` if the slice length does not match
    pub fn add_counts(&mut self, bins: &[C], off_chart: C) -> Result<(), HistErrors> {
        if bins.len() != self.bins.len() {
            return Err(HistErrors::BinCountMismatch);
        }
        for (b, &a) in self.bins.iter_mut().zip(bins) {
            *b += a;
        }
        self.off_chart += off_chart;
        Ok(())
    }

    /// # Replace the current contents
    /// * `Err(BinCountMismatch)` if the slice length does not match
    pub fn load(&mut self, bins: &[C], off_chart: C) -> Result<(), HistErrors> {
        if bins.len() != self.bins.len() {
            return Err(HistErrors::BinCountMismatch);
        }
        self.bins.copy_from_slice(bins);
        self.off_chart = off_chart;
        Ok(())
    }

    /// total weight recorded, i.e. `sum(bins) + off_chart`
    pub fn total_counts(&self) -> C {
        let mut sum = self.off_chart;
        for &b in &self.bins {
            sum += b;
        }
        sum
    }

    /// # Normalization factor
    /// * `off_chart + bin_width * sum(bins)`, such that dividing by it turns
    ///   the bin counts into a probability density over `[min, max)`
    pub fn normalization(&self) -> f64 {
        let mut sum = 0.0;
        for &b in &self.bins {
            sum += b.to_f64().unwrap_or(f64::NAN);
        }
        self.off_chart.to_f64().unwrap_or(f64::NAN) + self.params.bin_width() * sum
    }

    /// histogram with every count divided by [`normalization`](Self::normalization)
    pub fn normalized(&self) -> Histogram<f64> {
        self.scaled_by(1.0 / self.normalization())
    }

    /// histogram with every count divided by [`total_counts`](Self::total_counts)
    pub fn normalized_counts(&self) -> Histogram<f64> {
        let total = self.total_counts().to_f64().unwrap_or(f64::NAN);
        self.scaled_by(1.0 / total)
    }

    fn scaled_by(&self, factor: f64) -> Histogram<f64> {
        Histogram {
            params: self.params,
            bins: self
                .bins
                .iter()
                .map(|b| b.to_f64().unwrap_or(f64::NAN) * factor)
                .collect(),
            off_chart: self.off_chart.to_f64().unwrap_or(f64::NAN) * factor,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> HistogramParams {
        HistogramParams::new(0.0, 1.0, 10).unwrap()
    }

    #[test]
    fn record_and_off_chart() {
        let mut hist = Histogram::<u64>::new(params());
        assert_eq!(hist.record(0.05), Some(0));
        assert_eq!(hist.record(0.95), Some(9));
        // right border is exclusive
        assert_eq!(hist.record(1.0), None);
        assert_eq!(hist.record(-1e-12), None);
        assert_eq!(hist.off_chart(), 2);
        assert_eq!(hist.total_counts(), 4);
    }

    #[test]
    fn conservation_under_add_and_record() {
        let mut hist = Histogram::<u64>::new(params());
        for i in 0..100 {
            hist.record(i as f64 / 50.0);
        }
        let mut other = Histogram::<u64>::new(params());
        other.add_counts(hist.bins(), hist.off_chart()).unwrap();
        other.record_with_weight(0.5, 7);
        assert_eq!(other.total_counts(), 107);
    }

    #[test]
    fn add_counts_len_mismatch() {
        let mut hist = Histogram::<u64>::new(params());
        assert_eq!(
            hist.add_counts(&[1, 2, 3], 0).unwrap_err(),
            HistErrors::BinCountMismatch
        );
    }

    #[test]
    fn normalization_is_density() {
        let mut hist = Histogram::<u64>::new(params());
        for _ in 0..10 {
            hist.record(0.35);
        }
        hist.record(2.0); // off chart
        // normalization = 1 + 0.1 * 10 = 2
        assert!((hist.normalization() - 2.0).abs() < 1e-12);
        let n = hist.normalized();
        // density integrates to 1 - off_chart_fraction
        let integral: f64 = n.bins().iter().sum::<f64>() * n.params.bin_width();
        assert!((integral + n.off_chart() - 1.0).abs() < 1e-12);

        let nc = hist.normalized_counts();
        let total: f64 = nc.bins().iter().sum::<f64>() + nc.off_chart();
        assert!((total - 1.0).abs() < 1e-12);
    }
}
