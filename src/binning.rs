//! # Binning analysis
//! * estimates the standard error of the mean of a correlated, stationary
//!   vector-valued time series
//! * level `l` of the hierarchy holds arithmetic means over non-overlapping
//!   blocks of `2^l` consecutive raw samples; the error estimate at the last
//!   level is robust to autocorrelation once the block length exceeds the
//!   autocorrelation time
//! * see [`BinningAnalysis`]

use std::fmt;

#[cfg(feature = "serde_support")]
use serde::{Serialize, Deserialize};

/// Possible errors of the binning analysis
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
#[cfg_attr(feature = "serde_support", derive(Serialize, Deserialize))]
pub enum BinningErrors {
    /// at least one binning level is required
    NoLevels,
    /// at least one tracked coordinate is required
    NoTrackedValues,
    /// the length of a supplied vector does not match the number of tracked
    /// coordinates
    TrackCountMismatch,
}

impl BinningErrors {
    /// get error message as `&str`, for printing etc.
    pub fn to_str(self) -> &'static str {
        match self {
            BinningErrors::NoLevels => "NoLevels",
            BinningErrors::NoTrackedValues => "NoTrackedValues",
            BinningErrors::TrackCountMismatch => "TrackCountMismatch",
        }
    }
}

impl fmt::Display for BinningErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InvalidArgument: {}", self.to_str())
    }
}

impl std::error::Error for BinningErrors {}

/// Convergence diagnosis of one error-bar sequence across binning levels
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
#[cfg_attr(feature = "serde_support", derive(Serialize, Deserialize))]
pub enum ConvergenceStatus {
    /// the error estimates of the last levels agree, the error bar is reliable
    Converged,
    /// the error estimate was still growing at the last level
    NotConverged,
    /// neither criterion fired
    Unknown,
}

impl fmt::Display for ConvergenceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConvergenceStatus::Converged => "converged",
            ConvergenceStatus::NotConverged => "not converged",
            ConvergenceStatus::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

/// # Summary of the convergence statuses of all tracked coordinates
/// * `unknown` coordinates which sit next to another `unknown` coordinate are
///   counted as *not isolated*; a cluster of unknowns is a stronger hint of a
///   problem than a lone undecided bin
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
#[cfg_attr(feature = "serde_support", derive(Serialize, Deserialize))]
pub struct ConvergenceSummary {
    /// number of converged coordinates
    pub n_converged: usize,
    /// number of coordinates with unknown convergence
    pub n_unknown: usize,
    /// number of unknown coordinates not adjacent to another unknown one
    pub n_unknown_isolated: usize,
    /// number of coordinates whose error did not converge
    pub n_not_converged: usize,
}

impl ConvergenceSummary {
    /// Tally a slice of per-coordinate statuses
    pub fn from_statuses(statuses: &[ConvergenceStatus]) -> Self {
        let n_converged = statuses
            .iter()
            .filter(|&&s| s == ConvergenceStatus::Converged)
            .count();
        let n_not_converged = statuses
            .iter()
            .filter(|&&s| s == ConvergenceStatus::NotConverged)
            .count();
        let n_unknown = statuses
            .iter()
            .filter(|&&s| s == ConvergenceStatus::Unknown)
            .count();
        let n_unknown_following = statuses
            .windows(2)
            .filter(|w| w[0] == ConvergenceStatus::Unknown && w[1] == ConvergenceStatus::Unknown)
            .count();
        Self {
            n_converged,
            n_unknown,
            n_unknown_isolated: n_unknown - n_unknown_following,
            n_not_converged,
        }
    }

    /// number of unknown coordinates adjacent to another unknown one
    #[inline]
    pub fn n_unknown_not_isolated(&self) -> usize {
        self.n_unknown - self.n_unknown_isolated
    }

    /// all coordinates converged?
    #[inline]
    pub fn all_converged(&self) -> bool {
        self.n_unknown == 0 && self.n_not_converged == 0
    }
}

impl fmt::Display for ConvergenceSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} converged / {} maybe ({} isolated) / {} not converged",
            self.n_converged, self.n_unknown, self.n_unknown_isolated, self.n_not_converged
        )
    }
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde_support", derive(Serialize, Deserialize))]
struct Level {
    /// number of (block-averaged) samples seen at this level
    n: u64,
    /// per-coordinate sum of squares of the samples at this level
    sumsq: Vec<f64>,
    /// first half of a pending pair, waiting for its partner
    pending: Option<Vec<f64>>,
}

impl Level {
    fn new(num_track: usize) -> Self {
        Self {
            n: 0,
            sumsq: vec![0.0; num_track],
            pending: None,
        }
    }
}

/// # Online hierarchical binning analysis
/// * tracks `K` coordinates across levels `0..=L`
/// * feed raw vectors with [`process_new_values`](Self::process_new_values);
///   pairs at each level are averaged into the next level on the fly, so the
///   memory footprint is `O(K * L)` regardless of the stream length
/// * the error of the mean at level `l` for coordinate `k` is
///   `sqrt((Q_l[k]/n_l - mu[k]^2) / (n_l - 1))` where `Q_l` is the sum of
///   squares at level `l` and `mu` the mean of the raw stream
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde_support", derive(Serialize, Deserialize))]
pub struct BinningAnalysis {
    num_track: usize,
    num_levels: usize,
    levels: Vec<Level>,
    /// level-0 per-coordinate sum, for the raw mean
    sum: Vec<f64>,
}

impl BinningAnalysis {
    /// # Create a new analysis
    /// * `num_track`: number of tracked coordinates `K`
    /// * `num_levels`: highest binning level `L >= 1`; a level-`L` sample
    ///   consumes `2^L` raw samples
    pub fn new(num_track: usize, num_levels: usize) -> Result<Self, BinningErrors> {
        if num_track == 0 {
            return Err(BinningErrors::NoTrackedValues);
        } else if num_levels == 0 {
            return Err(BinningErrors::NoLevels);
        }
        Ok(Self {
            num_track,
            num_levels,
            levels: (0..=num_levels).map(|_| Level::new(num_track)).collect(),
            sum: vec![0.0; num_track],
        })
    }

    /// number of tracked coordinates `K`
    #[inline]
    pub fn num_track_values(&self) -> usize {
        self.num_track
    }

    /// highest binning level `L`
    #[inline]
    pub fn num_levels(&self) -> usize {
        self.num_levels
    }

    /// number of raw samples processed so far
    #[inline]
    pub fn num_samples(&self) -> u64 {
        self.levels[0].n
    }

    /// number of block-averaged samples available at `level`
    #[inline]
    pub fn samples_at_level(&self, level: usize) -> u64 {
        self.levels[level].n
    }

    /// # Feed one raw sample vector
    /// * `Err(TrackCountMismatch)` unless `values.len() == K`
    pub fn process_new_values(&mut self, values: &[f64]) -> Result<(), BinningErrors> {
        if values.len() != self.num_track {
            return Err(BinningErrors::TrackCountMismatch);
        }
        for (s, &v) in self.sum.iter_mut().zip(values) {
            *s += v;
        }

        let mut carry: Vec<f64> = values.to_vec();
        for level in self.levels.iter_mut() {
            level.n += 1;
            for (q, &v) in level.sumsq.iter_mut().zip(carry.iter()) {
                *q += v * v;
            }
            match level.pending.take() {
                None => {
                    level.pending = Some(carry);
                    break;
                }
                Some(partner) => {
                    // average the pair and propagate it one level up
                    for (c, p) in carry.iter_mut().zip(partner) {
                        *c = 0.5 * (*c + p);
                    }
                }
            }
        }
        Ok(())
    }

    /// per-coordinate mean of the raw stream
    pub fn bin_means(&self) -> Vec<f64> {
        let n = self.levels[0].n as f64;
        self.sum.iter().map(|&s| s / n).collect()
    }

    /// # Error of the mean at every binning level
    /// * `means` are the per-coordinate means to use (for a histogram these
    ///   come from the bin counts rather than from the tracked stream)
    /// * returns a `K x (L+1)` matrix as row-major nested vectors; levels with
    ///   fewer than two samples yield `NaN`
    pub fn calc_error_levels(&self, means: &[f64]) -> Result<Vec<Vec<f64>>, BinningErrors> {
        if means.len() != self.num_track {
            return Err(BinningErrors::TrackCountMismatch);
        }
        let mut out = vec![vec![0.0; self.num_levels + 1]; self.num_track];
        for (level_idx, level) in self.levels.iter().enumerate() {
            let n = level.n as f64;
            for (k, row) in out.iter_mut().enumerate() {
                row[level_idx] = if level.n < 2 {
                    f64::NAN
                } else {
                    let var = (level.sumsq[k] / n - means[k] * means[k]).max(0.0);
                    (var / (n - 1.0)).sqrt()
                };
            }
        }
        Ok(out)
    }

    /// error of the mean at the last binning level, using the internal means
    pub fn error_bars(&self) -> Result<Vec<f64>, BinningErrors> {
        let levels = self.calc_error_levels(&self.bin_means())?;
        Ok(levels.iter().map(|row| row[self.num_levels]).collect())
    }

    /// # Diagnose the convergence of each coordinate's error sequence
    /// * inspects the last `min(4, L+1)` levels of each row of `error_levels`
    /// * `Converged` when all windowed errors are finite and their relative
    ///   spread `(max - min)/max` is at most 0.10 (or all are zero)
    /// * `NotConverged` when the error was still growing at the last level,
    ///   `eps_L > 1.05 * eps_{L-1}`
    /// * `Unknown` otherwise, in particular when the last level holds fewer
    ///   than two samples
    pub fn determine_error_convergence(
        &self,
        error_levels: &[Vec<f64>],
    ) -> Vec<ConvergenceStatus> {
        const WINDOW: usize = 4;
        const REL_TOL: f64 = 0.10;
        const GROWTH_TOL: f64 = 0.05;

        error_levels
            .iter()
            .map(|row| {
                let window = &row[row.len().saturating_sub(WINDOW)..];
                let last = row[row.len() - 1];
                let second_last = if row.len() >= 2 {
                    row[row.len() - 2]
                } else {
                    f64::NAN
                };
                let growing = last.is_finite()
                    && second_last.is_finite()
                    && last > second_last * (1.0 + GROWTH_TOL);

                if window.iter().all(|e| e.is_finite()) {
                    let mx = window.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
                    let mn = window.iter().cloned().fold(f64::INFINITY, f64::min);
                    if mx <= 0.0 || (mx - mn) / mx <= REL_TOL {
                        ConvergenceStatus::Converged
                    } else if growing {
                        ConvergenceStatus::NotConverged
                    } else {
                        ConvergenceStatus::Unknown
                    }
                } else if growing {
                    ConvergenceStatus::NotConverged
                } else {
                    ConvergenceStatus::Unknown
                }
            })
            .collect()
    }
}
