use std::cell::RefCell;
use std::rc::Rc;

use crate::mhrw::MHRWParams;

/// # A snapshot of one proposed move
/// * handed to [`MHRWStatsCollector::raw_move`] for every iteration of the
///   walk, thermalizing or not
#[derive(Debug)]
pub struct RawMove<'a, P> {
    /// iteration counter within the current phase, starting at zero
    pub iter_k: u64,
    /// is the walk still thermalizing?
    pub is_thermalizing: bool,
    /// will this iteration produce a live sample?
    pub is_live_iter: bool,
    /// was the proposed move accepted?
    pub accepted: bool,
    /// the Metropolis-Hastings acceptance ratio of the move
    pub a: f64,
    /// the proposed point
    pub newpt: &'a P,
    /// function value at the proposed point
    pub newptval: f64,
    /// the current point (before accepting/rejecting)
    pub curpt: &'a P,
    /// function value at the current point
    pub curptval: f64,
}

/// # A live sample of the sampling phase
/// * handed to [`MHRWStatsCollector::process_sample`] once per sweep
#[derive(Debug)]
pub struct Sample<'a, P> {
    /// iteration counter of the sampling phase
    pub iter_k: u64,
    /// running number of this sample, starting at zero
    pub sample_num: u64,
    /// the current point of the walk
    pub curpt: &'a P,
    /// function value at the current point
    pub curptval: f64,
}

/// # Acceptance counters of a running walk
#[derive(Debug, Clone, Copy, Default)]
pub struct WalkProgress {
    /// accepted moves during the sampling phase
    pub num_accepted: u64,
    /// total moves during the sampling phase
    pub num_live_points: u64,
}

impl WalkProgress {
    /// # The acceptance ratio so far
    /// * `None` while no sampling-phase moves happened, e.g. during
    ///   thermalisation
    pub fn acceptance_ratio(&self) -> Option<f64> {
        if self.num_live_points > 0 {
            Some(self.num_accepted as f64 / self.num_live_points as f64)
        } else {
            None
        }
    }
}

/// # Read-only view of the driving random walk
/// * passed along with every stats-collector callback
#[derive(Debug)]
pub struct WalkView<'a, WP> {
    /// the current (possibly controller-adjusted) walk parameters
    pub params: &'a MHRWParams<WP>,
    /// acceptance counters
    pub progress: WalkProgress,
}

/// # Observer protocol of the random walk
/// * all callbacks are optional; collectors compose as tuples which relay the
///   callbacks in order
/// * collectors must not fail in steady state; invalid configuration should be
///   rejected when the collector is constructed
#[allow(unused_variables)]
pub trait MHRWStatsCollector<P, WP> {
    /// called once before the walk starts
    fn init(&mut self) {}

    /// called when the thermalisation phase ends
    fn thermalizing_done(&mut self) {}

    /// called once after the walk finished
    fn done(&mut self) {}

    /// called for every single iteration of the walk
    fn raw_move(&mut self, mv: &RawMove<'_, P>, rw: &WalkView<'_, WP>) {}

    /// called once per sweep during the sampling phase
    fn process_sample(&mut self, sample: &Sample<'_, P>, rw: &WalkView<'_, WP>) {}
}

/// the trivial collector which records nothing
impl<P, WP> MHRWStatsCollector<P, WP> for () {}

/// # Shared collectors
/// * a collector wrapped in `Rc<RefCell<..>>` can be registered with the walk
///   and simultaneously inspected by a controller; per-task state is
///   single-threaded, see the concurrency notes of
///   [`multiproc`](crate::multiproc)
impl<P, WP, T> MHRWStatsCollector<P, WP> for Rc<RefCell<T>>
where
    T: MHRWStatsCollector<P, WP>,
{
    fn init(&mut self) {
        self.borrow_mut().init();
    }

    fn thermalizing_done(&mut self) {
        self.borrow_mut().thermalizing_done();
    }

    fn done(&mut self) {
        self.borrow_mut().done();
    }

    fn raw_move(&mut self, mv: &RawMove<'_, P>, rw: &WalkView<'_, WP>) {
        self.borrow_mut().raw_move(mv, rw);
    }

    fn process_sample(&mut self, sample: &Sample<'_, P>, rw: &WalkView<'_, WP>) {
        self.borrow_mut().process_sample(sample, rw);
    }
}

macro_rules! impl_stats_collector_tuple {
    ($(($($name:ident),+))*) => {
        $(
            impl<P, WP, $($name),+> MHRWStatsCollector<P, WP> for ($($name,)+)
            where
                $($name: MHRWStatsCollector<P, WP>),+
            {
                fn init(&mut self) {
                    #[allow(non_snake_case)]
                    let ($($name,)+) = self;
                    $($name.init();)+
                }

                fn thermalizing_done(&mut self) {
                    #[allow(non_snake_case)]
                    let ($($name,)+) = self;
                    $($name.thermalizing_done();)+
                }

                fn done(&mut self) {
                    #[allow(non_snake_case)]
                    let ($($name,)+) = self;
                    $($name.done();)+
                }

                fn raw_move(&mut self, mv: &RawMove<'_, P>, rw: &WalkView<'_, WP>) {
                    #[allow(non_snake_case)]
                    let ($($name,)+) = self;
                    $($name.raw_move(mv, rw);)+
                }

                fn process_sample(&mut self, sample: &Sample<'_, P>, rw: &WalkView<'_, WP>) {
                    #[allow(non_snake_case)]
                    let ($($name,)+) = self;
                    $($name.process_sample(sample, rw);)+
                }
            }
        )*
    };
}

impl_stats_collector_tuple! {
    (A)
    (A, B)
    (A, B, C)
    (A, B, C, D)
    (A, B, C, D, E)
}
