use std::fmt;

#[cfg(feature = "serde_support")]
use serde::{Serialize, Deserialize};

/// Possible Errors of the histogram types
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
#[cfg_attr(feature = "serde_support", derive(Serialize, Deserialize))]
pub enum HistErrors {
    /// A histogram without any bins does not make sense!
    NoBins,

    /// Nothing can hit the bin! (`min >= max`?)
    IntervalWidthZero,

    /// Could be NAN, INFINITY or similar
    InvalidVal,

    /// The value lies outside of `[min, max)`
    OutsideHist,

    /// The number of bins of the histograms involved do not match
    BinCountMismatch,

    /// Requested a result before `finalize` was called
    NotFinalized,

    /// Tried to add data after `finalize` was called
    AlreadyFinalized,

    /// Nothing to aggregate
    NoData,
}

impl HistErrors {
    /// get error message as `&str`, for printing etc.
    pub fn to_str(self) -> &'static str {
        match self {
            HistErrors::NoBins => "NoBins",
            HistErrors::IntervalWidthZero => "IntervalWidthZero",
            HistErrors::InvalidVal => "InvalidVal",
            HistErrors::OutsideHist => "OutsideHist",
            HistErrors::BinCountMismatch => "BinCountMismatch",
            HistErrors::NotFinalized => "NotFinalized",
            HistErrors::AlreadyFinalized => "AlreadyFinalized",
            HistErrors::NoData => "NoData",
        }
    }
}

impl fmt::Display for HistErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            HistErrors::NoBins
            | HistErrors::IntervalWidthZero
            | HistErrors::BinCountMismatch
            | HistErrors::NoData => "InvalidArgument",
            HistErrors::InvalidVal
            | HistErrors::OutsideHist
            | HistErrors::NotFinalized
            | HistErrors::AlreadyFinalized => "OutOfRange",
        };
        write!(f, "{}: {}", kind, self.to_str())
    }
}

impl std::error::Error for HistErrors {}

/// # Parameters of an equal-width binned histogram
/// * the interval is `[min, max)`, left inclusive, right exclusive
/// * bin `i` covers `[min + i*w, min + (i+1)*w)` with `w = (max - min) / num_bins`
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde_support", derive(Serialize, Deserialize))]
pub struct HistogramParams {
    /// lower border of the histogram range (inclusive)
    pub min: f64,
    /// upper border of the histogram range (exclusive)
    pub max: f64,
    /// number of bins the range is divided into
    pub num_bins: usize,
}

impl HistogramParams {
    /// # Create new histogram parameters
    /// * `min` and `max` have to be finite with `min < max`
    /// * `num_bins` has to be at least 1
    pub fn new(min: f64, max: f64, num_bins: usize) -> Result<Self, HistErrors> {
        if !min.is_finite() || !max.is_finite() {
            return Err(HistErrors::InvalidVal);
        } else if min >= max {
            return Err(HistErrors::IntervalWidthZero);
        } else if num_bins < 1 {
            return Err(HistErrors::NoBins);
        }
        Ok(Self { min, max, num_bins })
    }

    /// width of a single bin
    #[inline]
    pub fn bin_width(&self) -> f64 {
        (self.max - self.min) / self.num_bins as f64
    }

    /// is `value` inside of `[min, max)`?
    #[inline]
    pub fn is_within_range(&self, value: f64) -> bool {
        value >= self.min && value < self.max
    }

    /// # Index of the bin containing `value`
    /// * `Err(InvalidVal)` if `value` is NaN or infinite
    /// * `Err(OutsideHist)` if `value` is not inside `[min, max)`
    pub fn bin_index(&self, value: f64) -> Result<usize, HistErrors> {
        if !value.is_finite() {
            return Err(HistErrors::InvalidVal);
        } else if !self.is_within_range(value) {
            return Err(HistErrors::OutsideHist);
        }
        let idx = ((value - self.min) * self.num_bins as f64 / (self.max - self.min)) as usize;
        // values just below `max` can round up to `num_bins`
        Ok(idx.min(self.num_bins - 1))
    }

    /// lower border of bin `index` (inclusive)
    #[inline]
    pub fn bin_lower_value(&self, index: usize) -> f64 {
        self.min + index as f64 * self.bin_width()
    }

    /// center value of bin `index`
    #[inline]
    pub fn bin_center_value(&self, index: usize) -> f64 {
        self.min + (index as f64 + 0.5) * self.bin_width()
    }

    /// upper border of bin `index` (exclusive)
    #[inline]
    pub fn bin_upper_value(&self, index: usize) -> f64 {
        self.min + (index as f64 + 1.0) * self.bin_width()
    }
}

impl fmt::Display for HistogramParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{},{}]/{}", self.min, self.max, self.num_bins)
    }
}
