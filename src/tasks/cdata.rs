use rand_pcg::Pcg64;

use crate::controllers::{BinsConvergedControllerParams, StepSizeControllerParams};
use crate::histogram::HistogramParams;
use crate::mhrw::{MHRWParams, MHWalker};
use crate::stats::ValueCalculator;

/// # Immutable shared context of a set of random-walk tasks
/// * shared by reference across all worker threads; everything mutable
///   (walker, collectors, RNG) is created per task from this context
pub trait MHRWTaskCData: Sync {
    /// the walker type driving each task
    type Walker: MHWalker;
    /// the figure-of-merit calculator recorded into the histogram
    type Calc: ValueCalculator<Point = <Self::Walker as MHWalker>::Point>;

    /// shape of the recorded histogram
    fn histogram_params(&self) -> HistogramParams;

    /// random-walk parameters each task starts from
    fn mhrw_params(&self) -> MHRWParams<<Self::Walker as MHWalker>::WalkerParams>;

    /// requested number of binning levels
    fn binning_num_levels(&self) -> usize {
        8
    }

    /// base seed; together with the task index it determines each task's RNG
    /// streams
    fn base_seed(&self) -> u64;

    /// create the walker of one task, owning its proposal RNG
    fn new_walker(&self, rng: Pcg64) -> Self::Walker;

    /// create the value calculator of one task
    fn new_value_calculator(&self) -> Self::Calc;

    /// tuning of the step-size controller
    fn step_size_controller_params(&self) -> StepSizeControllerParams {
        StepSizeControllerParams::default()
    }

    /// tuning of the bins-converged controller
    fn bins_converged_controller_params(&self) -> BinsConvergedControllerParams {
        BinsConvergedControllerParams::default()
    }
}

/// # Derive a per-stream seed from the base seed
/// * splitmix-style mixing: statistically independent streams for distinct
///   `(base_seed, stream)` pairs, bitwise reproducible across runs
pub fn task_seed(base_seed: u64, stream: u64) -> u64 {
    let mut z = base_seed.wrapping_add(0x9E37_79B9_7F4A_7C15u64.wrapping_mul(stream.wrapping_add(1)));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// seed of the acceptance RNG of task `task_idx`
pub(crate) fn driver_seed(base_seed: u64, task_idx: usize) -> u64 {
    task_seed(base_seed, 2 * task_idx as u64)
}

/// seed of the walker's proposal RNG of task `task_idx`
pub(crate) fn walker_seed(base_seed: u64, task_idx: usize) -> u64 {
    task_seed(base_seed, 2 * task_idx as u64 + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeds_are_distinct_and_reproducible() {
        let mut seen = std::collections::HashSet::new();
        for task in 0..100 {
            assert!(seen.insert(driver_seed(42, task)));
            assert!(seen.insert(walker_seed(42, task)));
        }
        assert_eq!(driver_seed(42, 7), driver_seed(42, 7));
        assert_ne!(driver_seed(42, 7), driver_seed(43, 7));
    }
}
