use nalgebra::Complex;
use rand::Rng;
use rand_distr::StandardNormal;
use rand_pcg::Pcg64;
use std::str::FromStr;
use std::sync::Arc;

use crate::mhrw::{MHFnSyntax, MHWalker, StepSize};

use super::{x_from_herm_unchecked, DenseDMErrors, DenseMatrix, IndepMeasLLH};

#[cfg(feature = "serde_support")]
use serde::{Serialize, Deserialize};

/// # How the purified walker proposes a jump
#[derive(Debug, Clone, Copy, Eq, PartialEq, Default)]
#[cfg_attr(feature = "serde_support", derive(Serialize, Deserialize))]
pub enum JumpsMethod {
    /// add a step-size-scaled complex Gaussian matrix to `T` and renormalise
    #[default]
    Full,
    /// apply a norm-preserving elementary rotation mixing two random entries
    /// of `T`; much cheaper for large dimensions
    Light,
}

impl FromStr for JumpsMethod {
    type Err = DenseDMErrors;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "full" => Ok(JumpsMethod::Full),
            "light" => Ok(JumpsMethod::Light),
            other => Err(DenseDMErrors::UnknownName(other.to_string())),
        }
    }
}

/// # Random walk over purifications of density matrices
/// * the walk point is a complex `dim x dim` matrix `T` of unit Frobenius
///   norm, representing the state `rho = T * T†`
/// * the target distribution is the measurement likelihood; together with the
///   uniform walk over the `T`-sphere this samples the Bayesian posterior
///   under the Hilbert-Schmidt-like prior induced by the purification measure
/// * proposals are symmetric, so no Hastings correction is needed
pub struct PurifiedStateWalker {
    llh: Arc<IndepMeasLLH>,
    rng: Pcg64,
    jumps: JumpsMethod,
}

impl PurifiedStateWalker {
    /// Create a walker for the given likelihood, owning its proposal RNG
    pub fn new(llh: Arc<IndepMeasLLH>, rng: Pcg64, jumps: JumpsMethod) -> Self {
        Self { llh, rng, jumps }
    }

    fn gaussian_complex(&mut self) -> Complex<f64> {
        let re: f64 = self.rng.sample(StandardNormal);
        let im: f64 = self.rng.sample(StandardNormal);
        Complex::new(re, im)
    }

    fn jump_full(&mut self, cur: &DenseMatrix, step_size: f64) -> DenseMatrix {
        let dim = cur.nrows();
        let delta = DenseMatrix::from_fn(dim, dim, |_, _| self.gaussian_complex());
        let new = cur + delta * Complex::new(step_size, 0.0);
        let norm = new.norm();
        new / Complex::new(norm, 0.0)
    }

    fn jump_light(&mut self, cur: &DenseMatrix, step_size: f64) -> DenseMatrix {
        let n = cur.nrows() * cur.ncols();
        let k = self.rng.gen_range(0..n);
        let l = loop {
            let l = self.rng.gen_range(0..n);
            if l != k {
                break l;
            }
        };
        let angle: f64 = step_size * self.rng.sample::<f64, _>(StandardNormal);
        let phi: f64 = step_size * self.rng.sample::<f64, _>(StandardNormal);
        let (sin, cos) = angle.sin_cos();
        let phase = Complex::from_polar(1.0, phi);

        // 2x2 unitary acting on the chosen pair of entries keeps |T| = 1
        let mut new = cur.clone();
        let a = cur[k];
        let b = cur[l];
        new[k] = a * cos - b * phase.conj() * sin;
        new[l] = a * phase * sin + b * cos;
        new
    }
}

impl MHWalker for PurifiedStateWalker {
    type Point = DenseMatrix;
    type WalkerParams = StepSize;

    fn start_point(&mut self) -> DenseMatrix {
        let dim = self.llh.dim();
        let scale = Complex::new(1.0 / (dim as f64).sqrt(), 0.0);
        DenseMatrix::identity(dim, dim) * scale
    }

    fn jump_fn(&mut self, cur: &DenseMatrix, params: &StepSize) -> DenseMatrix {
        match self.jumps {
            JumpsMethod::Full => self.jump_full(cur, params.0),
            JumpsMethod::Light => self.jump_light(cur, params.0),
        }
    }

    fn fn_syntax(&self) -> MHFnSyntax {
        MHFnSyntax::LogValue
    }

    fn fn_value(&self, pt: &DenseMatrix) -> f64 {
        let rho = pt * pt.adjoint();
        self.llh.log_likelihood_x(&x_from_herm_unchecked(&rho))
    }
}
