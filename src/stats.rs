//! # Stats collectors for the random walk
//! * a stats collector observes every raw move and every live sample of a
//!   [`MHRandomWalk`](crate::mhrw::MHRandomWalk)
//! * collectors compose as tuples, invoked in order; see
//!   [`MHRWStatsCollector`]
//! * the work horse is [`ValueHistogramCollector`] and its binning-analysis
//!   variant [`ValueHistogramWithBinningCollector`]

mod collector;
mod value_histogram;
mod accept_ratio;
mod status;

pub use collector::*;
pub use value_histogram::*;
pub use accept_ratio::*;
pub use status::*;
