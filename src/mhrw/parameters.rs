use std::fmt;

#[cfg(feature = "serde_support")]
use serde::{Serialize, Deserialize};

/// acceptance ratios below this are a hint that the step size is too large
pub const ACCEPTANCE_RATIO_RECOMMENDED_MIN: f64 = 0.2;
/// acceptance ratios above this are a hint that the step size is too small
pub const ACCEPTANCE_RATIO_RECOMMENDED_MAX: f64 = 0.4;

/// Possible errors of the random-walk driver
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
#[cfg_attr(feature = "serde_support", derive(Serialize, Deserialize))]
pub enum MHRWErrors {
    /// `n_sweep` and `n_run` both have to be nonzero
    InvalidParams,
    /// the walk was cancelled through the interrupt flag
    Interrupted,
}

impl MHRWErrors {
    /// get error message as `&str`, for printing etc.
    pub fn to_str(self) -> &'static str {
        match self {
            MHRWErrors::InvalidParams => "InvalidArgument: n_sweep and n_run must be nonzero",
            MHRWErrors::Interrupted => "Interrupted: random walk cancelled",
        }
    }
}

impl fmt::Display for MHRWErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_str())
    }
}

impl std::error::Error for MHRWErrors {}

/// # The step size of a random walk
/// * the canonical walker parameter bundle: a single positive real
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde_support", derive(Serialize, Deserialize))]
pub struct StepSize(pub f64);

impl fmt::Display for StepSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "step_size={:.6}", self.0)
    }
}

/// # Walker parameter bundles which expose a scalar step size
/// * implemented by [`StepSize`]; controllers adjusting the step size are
///   generic over this trait
pub trait AdjustableStepSize {
    /// the current step size
    fn step_size(&self) -> f64;
    /// overwrite the step size
    fn set_step_size(&mut self, step_size: f64);
}

impl AdjustableStepSize for StepSize {
    #[inline]
    fn step_size(&self) -> f64 {
        self.0
    }

    #[inline]
    fn set_step_size(&mut self, step_size: f64) {
        self.0 = step_size;
    }
}

/// # Parameters of a Metropolis-Hastings random walk
/// * a *sweep* is a block of `n_sweep` single-step iterations; during the
///   sampling phase one live sample is taken per sweep
/// * the walk thermalises for `n_therm` sweeps (samples discarded), then runs
///   for `n_run` sweeps
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde_support", derive(Serialize, Deserialize))]
pub struct MHRWParams<WP = StepSize> {
    /// parameter bundle handed to the walker's jump function
    pub mhwalker_params: WP,
    /// number of iterations per sweep, must be nonzero
    pub n_sweep: u64,
    /// number of thermalisation sweeps
    pub n_therm: u64,
    /// number of sampling sweeps, must be nonzero
    pub n_run: u64,
}

impl<WP> MHRWParams<WP> {
    /// # Create new random-walk parameters
    /// * `Err(InvalidParams)` unless `n_sweep > 0` and `n_run > 0`
    pub fn new(
        mhwalker_params: WP,
        n_sweep: u64,
        n_therm: u64,
        n_run: u64,
    ) -> Result<Self, MHRWErrors> {
        if n_sweep == 0 || n_run == 0 {
            return Err(MHRWErrors::InvalidParams);
        }
        Ok(Self {
            mhwalker_params,
            n_sweep,
            n_therm,
            n_run,
        })
    }

    /// total number of iterations of a full walk,
    /// `n_sweep * (n_therm + n_run)`
    #[inline]
    pub fn n_total_iters(&self) -> u64 {
        self.n_sweep * (self.n_therm + self.n_run)
    }
}

impl<WP: fmt::Display> fmt::Display for MHRWParams<WP> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},n_sweep={},n_therm={},n_run={}",
            self.mhwalker_params, self.n_sweep, self.n_therm, self.n_run
        )
    }
}
