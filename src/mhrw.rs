//! # Metropolis-Hastings random walk core
//! * [`MHWalker`] is the interface a state space has to provide: a starting
//!   point, a jump proposal, and the target function value
//! * [`MHRandomWalk`] drives the walk through its thermalisation and sampling
//!   phases, relaying callbacks to stats collectors and controllers
//! * see the [`stats`](crate::stats) and [`controllers`](crate::controllers)
//!   modules for the observer types

mod parameters;
mod walker;
mod driver;

pub use parameters::*;
pub use walker::*;
pub use driver::*;
