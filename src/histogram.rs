//! # Histogram primitives
//! * fixed-range histograms with equal-width bins, left inclusive, right exclusive
//! * [`Histogram`] counts samples, [`HistogramWithErrorBars`] additionally
//!   carries one error bar per bin
//! * [`AveragedHistogram`] combines many histograms of the same shape into
//!   an averaged histogram with error bars
//! * see [`histogram_pretty_print`] and [`histogram_short_bar`] for
//!   human-readable renderings

mod parameters;
#[allow(clippy::module_inception)]
mod histogram;
mod error_bars;
mod averaged;
mod pretty;

pub use parameters::*;
pub use histogram::*;
pub use error_bars::*;
pub use averaged::*;
pub use pretty::*;
