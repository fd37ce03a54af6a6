use std::fmt;

use crate::mhrw::{MHRWParams, MHWalker};
use crate::stats::WalkProgress;

use super::{AdjustStage, AdjustmentStrategy, HasAdjustmentStrategy, MHRWController};

/// Possible errors when composing controllers
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ControllerErrors {
    /// two controllers want to adjust in the same stage x frequency cell
    IncompatibleStrategies,
}

impl fmt::Display for ControllerErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControllerErrors::IncompatibleStrategies => write!(
                f,
                "InvalidArgument: controllers adjust in the same stage/frequency cell"
            ),
        }
    }
}

impl std::error::Error for ControllerErrors {}

/// # Compose several controllers into one
/// * callbacks are relayed to every child, in tuple order; `allow_done_*` is
///   the logical AND across the children
/// * construction fails with
///   [`IncompatibleStrategies`](ControllerErrors::IncompatibleStrategies) if
///   any two children would adjust parameters in the same stage and with the
///   same frequency
pub struct MHRWMultipleControllers<T>(T);

impl<T> MHRWMultipleControllers<T> {
    /// the composed controllers
    pub fn controllers(&self) -> &T {
        &self.0
    }

    fn check_pairwise(strategies: &[AdjustmentStrategy]) -> Result<(), ControllerErrors> {
        for (i, a) in strategies.iter().enumerate() {
            for b in &strategies[i + 1..] {
                if a.collides_with(*b) {
                    return Err(ControllerErrors::IncompatibleStrategies);
                }
            }
        }
        Ok(())
    }
}

macro_rules! impl_multiple_controllers {
    ($(($($name:ident . $idx:tt),+))*) => {
        $(
            impl<$($name: HasAdjustmentStrategy),+> MHRWMultipleControllers<($($name,)+)> {
                /// # Compose the given controllers
                /// * fails if two of them adjust in the same stage/frequency
                ///   cell
                pub fn new(controllers: ($($name,)+)) -> Result<Self, ControllerErrors> {
                    Self::check_pairwise(&[$(controllers.$idx.adjustment_strategy()),+])?;
                    Ok(Self(controllers))
                }
            }

            impl<$($name: HasAdjustmentStrategy),+> HasAdjustmentStrategy
                for MHRWMultipleControllers<($($name,)+)>
            {
                fn adjustment_strategy(&self) -> AdjustmentStrategy {
                    let mut strategy = AdjustmentStrategy::NONE;
                    $(strategy = strategy | self.0.$idx.adjustment_strategy();)+
                    strategy
                }
            }

            impl<W, $($name),+> MHRWController<W> for MHRWMultipleControllers<($($name,)+)>
            where
                W: MHWalker,
                $($name: MHRWController<W>),+
            {
                fn init(
                    &mut self,
                    params: &MHRWParams<W::WalkerParams>,
                    walker: &W,
                    progress: &WalkProgress,
                ) {
                    $(self.0.$idx.init(params, walker, progress);)+
                }

                fn thermalizing_done(
                    &mut self,
                    params: &MHRWParams<W::WalkerParams>,
                    walker: &W,
                    progress: &WalkProgress,
                ) {
                    $(self.0.$idx.thermalizing_done(params, walker, progress);)+
                }

                fn done(
                    &mut self,
                    params: &MHRWParams<W::WalkerParams>,
                    walker: &W,
                    progress: &WalkProgress,
                ) {
                    $(self.0.$idx.done(params, walker, progress);)+
                }

                fn adjust_params(
                    &mut self,
                    stage: AdjustStage,
                    params: &mut MHRWParams<W::WalkerParams>,
                    walker: &mut W,
                    iter_k: u64,
                    progress: &WalkProgress,
                ) {
                    $(
                        if self.0.$idx
                            .adjustment_strategy()
                            .enables(stage.is_thermalizing, stage.is_after_sample)
                        {
                            self.0.$idx.adjust_params(stage, params, walker, iter_k, progress);
                        }
                    )+
                }

                fn allow_done_thermalization(
                    &mut self,
                    params: &MHRWParams<W::WalkerParams>,
                    walker: &W,
                    iter_k: u64,
                    progress: &WalkProgress,
                ) -> bool {
                    true $(&& self.0.$idx.allow_done_thermalization(params, walker, iter_k, progress))+
                }

                fn allow_done_runs(
                    &mut self,
                    params: &MHRWParams<W::WalkerParams>,
                    walker: &W,
                    iter_k: u64,
                    progress: &WalkProgress,
                ) -> bool {
                    true $(&& self.0.$idx.allow_done_runs(params, walker, iter_k, progress))+
                }
            }
        )*
    };
}

impl_multiple_controllers! {
    (A.0)
    (A.0, B.1)
    (A.0, B.1, C.2)
}
