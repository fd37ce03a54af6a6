use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, warn};

use crate::mhrw::{
    AdjustableStepSize, MHRWParams, MHWalker, ACCEPTANCE_RATIO_RECOMMENDED_MAX,
    ACCEPTANCE_RATIO_RECOMMENDED_MIN,
};
use crate::stats::{MovingAverageAcceptRatioCollector, WalkProgress};

use super::{AdjustStage, AdjustmentStrategy, HasAdjustmentStrategy, MHRWController};

#[cfg(feature = "serde_support")]
use serde::{Serialize, Deserialize};

/// # Tuning knobs of the [`StepSizeController`]
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde_support", derive(Serialize, Deserialize))]
pub struct StepSizeControllerParams {
    /// lower edge of the target acceptance-ratio band
    pub desired_accept_ratio_min: f64,
    /// upper edge of the target acceptance-ratio band
    pub desired_accept_ratio_max: f64,
    /// lowest acceptance ratio the thermalisation may finish with
    pub acceptable_accept_ratio_min: f64,
    /// highest acceptance ratio the thermalisation may finish with
    pub acceptable_accept_ratio_max: f64,
    /// fraction of `n_therm` sweeps that must elapse, with fixed parameters,
    /// after the last step-size adjustment before thermalisation may end
    pub ensure_n_therm_fixed_params_fraction: f64,
}

impl Default for StepSizeControllerParams {
    fn default() -> Self {
        Self {
            desired_accept_ratio_min: 0.20,
            desired_accept_ratio_max: 0.35,
            acceptable_accept_ratio_min: 0.15,
            acceptable_accept_ratio_max: 0.40,
            ensure_n_therm_fixed_params_fraction: 0.5,
        }
    }
}

/// # Dynamically adjust the step size during thermalisation
/// * consults a shared moving-average acceptance-ratio tracker (register the
///   same `Rc<RefCell<..>>` as a stats collector of the walk)
/// * while the moving average lies outside the desired band, the step size is
///   multiplied by a bounded factor `clamp(r / r_target, 0.5, 1.5)`; at most
///   one adjustment per refill of the tracker window
/// * thermalisation is vetoed until the parameters have been stable for
///   `ceil(fraction * n_therm)` sweeps **and** the moving average lies inside
///   the acceptable band
pub struct StepSizeController {
    params: StepSizeControllerParams,
    tracker: Rc<RefCell<MovingAverageAcceptRatioCollector>>,
    last_adjust_iter: Option<u64>,
    num_adjustments: u64,
}

impl StepSizeController {
    /// Create a controller with default tuning, observing `tracker`
    pub fn new(tracker: Rc<RefCell<MovingAverageAcceptRatioCollector>>) -> Self {
        Self::with_params(tracker, StepSizeControllerParams::default())
    }

    /// Create a controller with explicit tuning knobs
    pub fn with_params(
        tracker: Rc<RefCell<MovingAverageAcceptRatioCollector>>,
        params: StepSizeControllerParams,
    ) -> Self {
        Self {
            params,
            tracker,
            last_adjust_iter: None,
            num_adjustments: 0,
        }
    }

    /// number of step-size adjustments performed so far
    #[inline]
    pub fn num_adjustments(&self) -> u64 {
        self.num_adjustments
    }

    fn moving_average(&self) -> Option<f64> {
        self.tracker.borrow().moving_average()
    }
}

impl HasAdjustmentStrategy for StepSizeController {
    fn adjustment_strategy(&self) -> AdjustmentStrategy {
        AdjustmentStrategy::WHILE_THERMALIZING | AdjustmentStrategy::EVERY_ITERATION
    }
}

impl<W> MHRWController<W> for StepSizeController
where
    W: MHWalker,
    W::WalkerParams: AdjustableStepSize,
{
    fn adjust_params(
        &mut self,
        _stage: AdjustStage,
        params: &mut MHRWParams<W::WalkerParams>,
        _walker: &mut W,
        iter_k: u64,
        _progress: &WalkProgress,
    ) {
        let ratio = match self.moving_average() {
            Some(r) => r,
            None => return,
        };
        if (self.params.desired_accept_ratio_min..=self.params.desired_accept_ratio_max)
            .contains(&ratio)
        {
            return;
        }
        // wait until the tracker window only contains moves made with the
        // current step size
        let window = self.tracker.borrow().window() as u64;
        if let Some(last) = self.last_adjust_iter {
            if iter_k.saturating_sub(last) < window {
                return;
            }
        }

        let target = 0.5
            * (self.params.desired_accept_ratio_min + self.params.desired_accept_ratio_max);
        let factor = (ratio / target).clamp(0.5, 1.5);
        let old_step = params.mhwalker_params.step_size();
        let new_step = old_step * factor;
        params.mhwalker_params.set_step_size(new_step);
        self.last_adjust_iter = Some(iter_k);
        self.num_adjustments += 1;

        debug!(
            iter_k,
            accept_ratio = ratio,
            old_step,
            new_step,
            "adjusted step size"
        );
    }

    fn allow_done_thermalization(
        &mut self,
        params: &MHRWParams<W::WalkerParams>,
        _walker: &W,
        iter_k: u64,
        _progress: &WalkProgress,
    ) -> bool {
        let ratio = match self.moving_average() {
            Some(r) => r,
            None => return false,
        };
        let stable_sweeps =
            (self.params.ensure_n_therm_fixed_params_fraction * params.n_therm as f64).ceil()
                as u64;
        let stable_iters = stable_sweeps * params.n_sweep;
        let since_adjust = iter_k.saturating_sub(self.last_adjust_iter.unwrap_or(0));
        since_adjust >= stable_iters
            && (self.params.acceptable_accept_ratio_min..=self.params.acceptable_accept_ratio_max)
                .contains(&ratio)
    }

    fn thermalizing_done(
        &mut self,
        params: &MHRWParams<W::WalkerParams>,
        _walker: &W,
        _progress: &WalkProgress,
    ) {
        if let Some(ratio) = self.moving_average() {
            if !(ACCEPTANCE_RATIO_RECOMMENDED_MIN..=ACCEPTANCE_RATIO_RECOMMENDED_MAX)
                .contains(&ratio)
            {
                warn!(
                    accept_ratio = ratio,
                    step_size = params.mhwalker_params.step_size(),
                    "acceptance ratio out of recommended bounds [{}, {}] after \
                     thermalisation",
                    ACCEPTANCE_RATIO_RECOMMENDED_MIN,
                    ACCEPTANCE_RATIO_RECOMMENDED_MAX
                );
            }
        }
    }
}
