//! # Random-walk tasks over a shared context
//! * [`MHRWTaskCData`] is the immutable context shared by all tasks: walker
//!   factory, value calculator, histogram shape, walk parameters and the base
//!   seed
//! * [`run_value_histogram_tasks`] runs N independent walks through the
//!   [`multiproc`](crate::multiproc) dispatcher, each seeded deterministically
//!   from `(base_seed, task_index)`
//! * [`aggregate_results`] merges the per-task histograms into the final
//!   histogram with combined binning error bars, plus the naive inter-task
//!   spread as a diagnostic

mod cdata;
mod runner;
mod aggregate;
mod report;

pub use cdata::*;
pub use runner::*;
pub use aggregate::*;
pub use report::*;
