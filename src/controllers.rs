//! # Random-walk controllers
//! * a controller may adjust the walk parameters while the walk runs and may
//!   veto the end of the thermalisation or sampling phase
//! * when and how often a controller is consulted is declared through its
//!   [`AdjustmentStrategy`] bitmask
//! * [`MHRWMultipleControllers`] composes several controllers, rejecting
//!   combinations that would adjust in the same stage and frequency cell

mod strategy;
mod step_size;
mod bins_converged;
mod multiple;

pub use strategy::*;
pub use step_size::*;
pub use bins_converged::*;
pub use multiple::*;

use crate::mhrw::{MHRWParams, MHWalker};
use crate::stats::WalkProgress;

/// # In which part of an iteration a controller is being consulted
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct AdjustStage {
    /// is the walk still thermalizing?
    pub is_thermalizing: bool,
    /// is this the callback directly after a live sample was taken?
    pub is_after_sample: bool,
}

/// # Declares when a controller adjusts the walk parameters
/// * independent of the walker type, so that
///   [`MHRWMultipleControllers`] can verify strategy compatibility when it is
///   constructed
pub trait HasAdjustmentStrategy {
    /// when this controller wants its `adjust_params` callback invoked
    fn adjustment_strategy(&self) -> AdjustmentStrategy;
}

/// # Controller protocol of the random walk
/// * [`adjust_params`](Self::adjust_params) is only invoked in the
///   stage/frequency cells enabled by the
///   [`adjustment_strategy`](HasAdjustmentStrategy::adjustment_strategy)
/// * the `allow_done_*` callbacks are consulted once the nominal iteration
///   count is exhausted; returning `false` extends the respective phase
#[allow(unused_variables)]
pub trait MHRWController<W: MHWalker>: HasAdjustmentStrategy {
    /// called once before the walk starts
    fn init(&mut self, params: &MHRWParams<W::WalkerParams>, walker: &W, progress: &WalkProgress) {
    }

    /// called when the thermalisation phase ends
    fn thermalizing_done(
        &mut self,
        params: &MHRWParams<W::WalkerParams>,
        walker: &W,
        progress: &WalkProgress,
    ) {
    }

    /// called once after the walk finished
    fn done(&mut self, params: &MHRWParams<W::WalkerParams>, walker: &W, progress: &WalkProgress) {
    }

    /// inspect and possibly mutate the walk parameters
    fn adjust_params(
        &mut self,
        stage: AdjustStage,
        params: &mut MHRWParams<W::WalkerParams>,
        walker: &mut W,
        iter_k: u64,
        progress: &WalkProgress,
    ) {
    }

    /// may the thermalisation phase end at iteration `iter_k`?
    fn allow_done_thermalization(
        &mut self,
        params: &MHRWParams<W::WalkerParams>,
        walker: &W,
        iter_k: u64,
        progress: &WalkProgress,
    ) -> bool {
        true
    }

    /// may the sampling phase end at iteration `iter_k`?
    fn allow_done_runs(
        &mut self,
        params: &MHRWParams<W::WalkerParams>,
        walker: &W,
        iter_k: u64,
        progress: &WalkProgress,
    ) -> bool {
        true
    }
}

/// # The trivial controller
/// * never adjusts anything, never vetoes phase termination
#[derive(Debug, Clone, Copy, Default)]
pub struct NoController;

impl HasAdjustmentStrategy for NoController {
    #[inline]
    fn adjustment_strategy(&self) -> AdjustmentStrategy {
        AdjustmentStrategy::NONE
    }
}

impl<W: MHWalker> MHRWController<W> for NoController {}
