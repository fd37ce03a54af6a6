use super::{HistCount, HistErrors, Histogram, HistogramParams};

#[cfg(feature = "serde_support")]
use serde::{Serialize, Deserialize};

/// # Histogram with one error bar per bin
/// * this type does not support recording; it is produced by the binning
///   analysis or by averaging histograms, see
///   [`AveragedHistogram`](super::AveragedHistogram)
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde_support", derive(Serialize, Deserialize))]
pub struct HistogramWithErrorBars {
    /// binning parameters of this histogram
    pub params: HistogramParams,
    bins: Vec<f64>,
    delta: Vec<f64>,
    off_chart: f64,
}

impl HistogramWithErrorBars {
    /// Create a zeroed histogram for the given binning parameters
    pub fn new(params: HistogramParams) -> Self {
        Self {
            params,
            bins: vec![0.0; params.num_bins],
            delta: vec![0.0; params.num_bins],
            off_chart: 0.0,
        }
    }

    /// # Create from explicit bin values and error bars
    /// * `Err(BinCountMismatch)` if a length does not match `params.num_bins`
    pub fn from_parts(
        params: HistogramParams,
        bins: Vec<f64>,
        delta: Vec<f64>,
        off_chart: f64,
    ) -> Result<Self, HistErrors> {
        if bins.len() != params.num_bins || delta.len() != params.num_bins {
            return Err(HistErrors::BinCountMismatch);
        }
        Ok(Self {
            params,
            bins,
            delta,
            off_chart,
        })
    }

    /// the bin values
    #[inline]
    pub fn bins(&self) -> &[f64] {
        &self.bins
    }

    /// the error bars, one per bin
    #[inline]
    pub fn delta(&self) -> &[f64] {
        &self.delta
    }

    /// value of bin `index`
    #[inline]
    pub fn count(&self, index: usize) -> f64 {
        self.bins[index]
    }

    /// error bar of bin `index`
    #[inline]
    pub fn error_bar(&self, index: usize) -> f64 {
        self.delta[index]
    }

    /// number of bins
    #[inline]
    pub fn num_bins(&self) -> usize {
        self.bins.len()
    }

    /// weight accounted outside of `[min, max)`
    #[inline]
    pub fn off_chart(&self) -> f64 {
        self.off_chart
    }

    /// `sum(bins) + off_chart`
    pub fn total_counts(&self) -> f64 {
        self.bins.iter().sum::<f64>() + self.off_chart
    }

    /// `off_chart + bin_width * sum(bins)`
    pub fn normalization(&self) -> f64 {
        self.off_chart + self.params.bin_width() * self.bins.iter().sum::<f64>()
    }

    /// # Histogram scaled to a unit probability density
    /// * bin values and error bars are both divided by
    ///   [`normalization`](Self::normalization)
    pub fn normalized(&self) -> HistogramWithErrorBars {
        let f = 1.0 / self.normalization();
        HistogramWithErrorBars {
            params: self.params,
            bins: self.bins.iter().map(|b| b * f).collect(),
            delta: self.delta.iter().map(|d| d * f).collect(),
            off_chart: self.off_chart * f,
        }
    }
}

/// # Histogram shapes that can be fed to an [`AveragedHistogram`](super::AveragedHistogram)
/// * the associated constant selects, at compile time, how error bars are
///   combined when averaging
pub trait AveragableHistogram {
    /// does this histogram type carry its own error bars?
    const HAS_ERROR_BARS: bool;

    /// binning parameters
    fn params(&self) -> &HistogramParams;
    /// value of bin `index`, as a float
    fn bin_value(&self, index: usize) -> f64;
    /// error bar of bin `index`; zero for histograms without error bars
    fn bin_error(&self, _index: usize) -> f64 {
        0.0
    }
    /// off-chart weight, as a float
    fn off_chart_value(&self) -> f64;
}

impl<C: HistCount> AveragableHistogram for Histogram<C> {
    const HAS_ERROR_BARS: bool = false;

    #[inline]
    fn params(&self) -> &HistogramParams {
        &self.params
    }

    #[inline]
    fn bin_value(&self, index: usize) -> f64 {
        self.count(index).to_f64().unwrap_or(f64::NAN)
    }

    #[inline]
    fn off_chart_value(&self) -> f64 {
        self.off_chart().to_f64().unwrap_or(f64::NAN)
    }
}

impl AveragableHistogram for HistogramWithErrorBars {
    const HAS_ERROR_BARS: bool = true;

    #[inline]
    fn params(&self) -> &HistogramParams {
        &self.params
    }

    #[inline]
    fn bin_value(&self, index: usize) -> f64 {
        self.count(index)
    }

    #[inline]
    fn bin_error(&self, index: usize) -> f64 {
        self.error_bar(index)
    }

    #[inline]
    fn off_chart_value(&self) -> f64 {
        self.off_chart
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_parts_checks_len() {
        let params = HistogramParams::new(0.0, 1.0, 4).unwrap();
        assert_eq!(
            HistogramWithErrorBars::from_parts(params, vec![0.0; 3], vec![0.0; 4], 0.0)
                .unwrap_err(),
            HistErrors::BinCountMismatch
        );
        let h =
            HistogramWithErrorBars::from_parts(params, vec![1.0; 4], vec![0.5; 4], 2.0).unwrap();
        assert_eq!(h.total_counts(), 6.0);
        assert_eq!(h.error_bar(2), 0.5);
    }

    #[test]
    fn normalized_scales_errors_alike() {
        let params = HistogramParams::new(0.0, 2.0, 4).unwrap();
        let h =
            HistogramWithErrorBars::from_parts(params, vec![2.0; 4], vec![1.0; 4], 0.0).unwrap();
        let n = h.normalized();
        for k in 0..4 {
            assert!((n.count(k) / n.error_bar(k) - 2.0).abs() < 1e-12);
        }
        let integral: f64 = n.bins().iter().sum::<f64>() * n.params.bin_width();
        assert!((integral - 1.0).abs() < 1e-12);
    }
}
