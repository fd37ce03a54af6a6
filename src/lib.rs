//! # Monte-Carlo estimation of histograms of quantum-state figures of merit
//!
//! This lib estimates, with statistically reliable error bars, the histogram
//! of a scalar figure of merit of an unknown quantum state, given outcome
//! counts of independent POVM measurements.
//!
//! * the estimator is a Metropolis-Hastings random walk over purifications of
//!   density matrices whose stationary distribution is the Bayesian posterior
//!   of the state given the data; see [`mhrw`](mhrw/index.html)
//! * each sample is mapped to a scalar (fidelity, trace distance, purified
//!   distance, an observable expectation, or a custom callback; see
//!   [`densedm`](densedm/index.html)) and binned into a histogram
//! * the error bar of every histogram bin comes from a hierarchical binning
//!   analysis of the bin-indicator time series; see
//!   [`binning`](binning/index.html) and [`stats`](stats/index.html)
//! * many independent walks run in parallel
//!   ([`multiproc`](multiproc/index.html), [`tasks`](tasks/index.html)) and
//!   their histograms are merged with two kinds of error bars
//!   ([`tasks::aggregate_results`])
//!
//! The random-walk core is agnostic of the quantum use case: anything
//! implementing [`mhrw::MHWalker`] can be driven.
//!
//! # Example
//!
//! Sampling a plain standard normal distribution with a hand-built walker:
//!
//! ```
//! use tomo_mcmc::controllers::NoController;
//! use tomo_mcmc::histogram::HistogramParams;
//! use tomo_mcmc::mhrw::{MHFnSyntax, MHRWParams, MHRandomWalk, MHWalker, StepSize};
//! use tomo_mcmc::stats::{ValueCalculator, ValueHistogramCollector};
//! use tomo_mcmc::rand::{Rng, SeedableRng};
//! use rand_pcg::Pcg64;
//!
//! struct LineWalker {
//!     rng: Pcg64,
//! }
//!
//! impl MHWalker for LineWalker {
//!     type Point = f64;
//!     type WalkerParams = StepSize;
//!
//!     fn start_point(&mut self) -> f64 {
//!         0.0
//!     }
//!
//!     fn jump_fn(&mut self, cur: &f64, params: &StepSize) -> f64 {
//!         cur + params.0 * (self.rng.gen::<f64>() * 2.0 - 1.0)
//!     }
//!
//!     fn fn_syntax(&self) -> MHFnSyntax {
//!         MHFnSyntax::LogValue
//!     }
//!
//!     fn fn_value(&self, pt: &f64) -> f64 {
//!         -0.5 * pt * pt
//!     }
//! }
//!
//! struct Identity;
//!
//! impl ValueCalculator for Identity {
//!     type Point = f64;
//!
//!     fn get_value(&self, pt: &f64) -> f64 {
//!         *pt
//!     }
//! }
//!
//! let params = MHRWParams::new(StepSize(1.0), 10, 64, 512).unwrap();
//! let mut walker = LineWalker { rng: Pcg64::seed_from_u64(1) };
//! let mut stats = ValueHistogramCollector::new(
//!     HistogramParams::new(-4.0, 4.0, 16).unwrap(),
//!     Identity,
//! );
//! let mut controller = NoController;
//!
//! let mut rw = MHRandomWalk::new(
//!     params,
//!     &mut walker,
//!     &mut stats,
//!     &mut controller,
//!     Pcg64::seed_from_u64(2),
//! );
//! rw.run().unwrap();
//!
//! // one live sample per sweep
//! assert_eq!(stats.histogram().total_counts(), 512);
//! ```
//!
//! For the full quantum-tomography pipeline (likelihood, purified walker,
//! parallel tasks, aggregation) see [`densedm::DenseDMTaskCData`] together
//! with [`tasks::run_value_histogram_tasks`], or the `tomo_mcmc` binary.
#![deny(missing_docs)]

pub mod histogram;
pub mod binning;
pub mod mhrw;
pub mod stats;
pub mod controllers;
pub mod multiproc;
pub mod tasks;
pub mod densedm;
#[cfg(feature = "serde_support")]
pub mod datafile;

pub use rand;
