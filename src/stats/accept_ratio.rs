use super::{MHRWStatsCollector, RawMove, WalkView};

/// default window length of the moving-average acceptance-ratio tracker
pub const DEFAULT_ACCEPT_RATIO_WINDOW: usize = 2048;

/// # Moving average of the acceptance ratio
/// * tracks whether each of the last `window` moves (thermalizing or not) was
///   accepted, in a ring buffer
/// * the step-size controller consults this through a shared
///   `Rc<RefCell<..>>` registration, see
///   [`StepSizeController`](crate::controllers::StepSizeController)
#[derive(Debug, Clone)]
pub struct MovingAverageAcceptRatioCollector {
    buffer: Vec<bool>,
    pos: u64,
}

impl MovingAverageAcceptRatioCollector {
    /// Create a tracker with the given window length
    pub fn new(window: usize) -> Self {
        Self {
            buffer: vec![false; window.max(1)],
            pos: 0,
        }
    }

    /// the window length
    #[inline]
    pub fn window(&self) -> usize {
        self.buffer.len()
    }

    /// has the buffer been filled at least once?
    #[inline]
    pub fn has_moving_average(&self) -> bool {
        self.pos >= self.buffer.len() as u64
    }

    /// # The moving-average acceptance ratio
    /// * `None` until the buffer has been filled once
    pub fn moving_average(&self) -> Option<f64> {
        if !self.has_moving_average() {
            return None;
        }
        let accepted = self.buffer.iter().filter(|&&a| a).count();
        Some(accepted as f64 / self.buffer.len() as f64)
    }
}

impl Default for MovingAverageAcceptRatioCollector {
    fn default() -> Self {
        Self::new(DEFAULT_ACCEPT_RATIO_WINDOW)
    }
}

impl<P, WP> MHRWStatsCollector<P, WP> for MovingAverageAcceptRatioCollector {
    fn raw_move(&mut self, mv: &RawMove<'_, P>, _rw: &WalkView<'_, WP>) {
        // overwrite the oldest entry
        let len = self.buffer.len() as u64;
        self.buffer[(self.pos % len) as usize] = mv.accepted;
        self.pos += 1;
    }
}
