/// # How a walker reports its target function
/// * the driver resolves this once when it is constructed and derives the
///   Metropolis-Hastings acceptance ratio accordingly
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum MHFnSyntax {
    /// [`fn_value`](MHWalker::fn_value) returns the target function itself;
    /// the acceptance ratio is `v_new / v_cur`
    Value,
    /// [`fn_value`](MHWalker::fn_value) returns the logarithm of the target
    /// function; the acceptance ratio is `exp(min(0, l_new - l_cur))`
    LogValue,
    /// [`fn_rel_value`](MHWalker::fn_rel_value) returns the acceptance ratio
    /// directly; [`fn_value`](MHWalker::fn_value) is never consulted
    RelativeValue,
}

/// # A state space the Metropolis-Hastings driver can walk on
/// * provides the starting point, the jump proposal and the function value
///   the acceptance ratio is derived from
/// * the jump proposal density must be symmetric, or the value returned by
///   [`fn_rel_value`](Self::fn_rel_value) must already contain the Hastings
///   correction; the driver does not compensate
#[allow(unused_variables)]
pub trait MHWalker {
    /// a point of the state space
    type Point: Clone;
    /// parameter bundle consumed by [`jump_fn`](Self::jump_fn), canonically
    /// [`StepSize`](crate::mhrw::StepSize)
    type WalkerParams;

    /// the point the walk starts from
    fn start_point(&mut self) -> Self::Point;

    /// called once before the walk starts
    fn init(&mut self) {}

    /// called when the thermalisation phase ends
    fn thermalizing_done(&mut self) {}

    /// called once after the walk finished
    fn done(&mut self) {}

    /// propose a new point, starting from `cur`
    fn jump_fn(&mut self, cur: &Self::Point, params: &Self::WalkerParams) -> Self::Point;

    /// which function-value convention this walker uses
    fn fn_syntax(&self) -> MHFnSyntax;

    /// # The target function value at `pt`
    /// * the function itself for [`MHFnSyntax::Value`], its logarithm for
    ///   [`MHFnSyntax::LogValue`]
    /// * walkers using [`MHFnSyntax::RelativeValue`] should return `0.0`; the
    ///   value is stored but never used
    fn fn_value(&self, pt: &Self::Point) -> f64;

    /// # The acceptance ratio between two points
    /// * only consulted for [`MHFnSyntax::RelativeValue`]
    fn fn_rel_value(&self, newpt: &Self::Point, curpt: &Self::Point) -> f64 {
        1.0
    }
}
