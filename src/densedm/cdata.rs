use rand_pcg::Pcg64;
use std::sync::Arc;

use crate::controllers::{BinsConvergedControllerParams, StepSizeControllerParams};
use crate::histogram::HistogramParams;
use crate::mhrw::{MHRWParams, StepSize};
use crate::tasks::MHRWTaskCData;

use super::{DMValueCalculator, IndepMeasLLH, JumpsMethod, PurifiedStateWalker};

/// # Shared context of a dense density-matrix tomography run
/// * the immutable inputs every task reads: likelihood data, figure-of-merit
///   calculator, histogram shape, walk parameters, seeding and controller
///   tuning
#[derive(Clone)]
pub struct DenseDMTaskCData {
    /// measurement data and likelihood
    pub llh: Arc<IndepMeasLLH>,
    /// the figure of merit recorded into the histogram
    pub calc: DMValueCalculator,
    /// shape of the recorded histogram
    pub hist_params: HistogramParams,
    /// random-walk parameters
    pub mhrw: MHRWParams<StepSize>,
    /// requested number of binning levels
    pub binning_levels: usize,
    /// base seed of the task RNG streams
    pub base_seed: u64,
    /// jump proposal flavour of the purified walker
    pub jumps_method: JumpsMethod,
    /// step-size controller tuning
    pub step_size_controller: StepSizeControllerParams,
    /// bins-converged controller tuning
    pub bins_converged_controller: BinsConvergedControllerParams,
}

impl MHRWTaskCData for DenseDMTaskCData {
    type Walker = PurifiedStateWalker;
    type Calc = DMValueCalculator;

    fn histogram_params(&self) -> HistogramParams {
        self.hist_params
    }

    fn mhrw_params(&self) -> MHRWParams<StepSize> {
        self.mhrw
    }

    fn binning_num_levels(&self) -> usize {
        self.binning_levels
    }

    fn base_seed(&self) -> u64 {
        self.base_seed
    }

    fn new_walker(&self, rng: Pcg64) -> PurifiedStateWalker {
        PurifiedStateWalker::new(Arc::clone(&self.llh), rng, self.jumps_method)
    }

    fn new_value_calculator(&self) -> DMValueCalculator {
        self.calc.clone()
    }

    fn step_size_controller_params(&self) -> StepSizeControllerParams {
        self.step_size_controller
    }

    fn bins_converged_controller_params(&self) -> BinsConvergedControllerParams {
        self.bins_converged_controller
    }
}
