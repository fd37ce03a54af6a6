use nalgebra::{Complex, SymmetricEigen};
use std::fmt;
use std::sync::Arc;

use crate::stats::ValueCalculator;

use super::{herm_to_x, x_from_herm_unchecked, DenseDMErrors, DenseMatrix, XVector};

/// Hermitian matrix square root via eigendecomposition, clamping tiny
/// negative eigenvalues to zero
fn herm_sqrt(a: &DenseMatrix) -> DenseMatrix {
    let eig = SymmetricEigen::new(a.clone());
    let dim = a.nrows();
    let mut sqrt_diag = DenseMatrix::zeros(dim, dim);
    for (i, &val) in eig.eigenvalues.iter().enumerate() {
        sqrt_diag[(i, i)] = Complex::new(val.max(0.0).sqrt(), 0.0);
    }
    &eig.eigenvectors * sqrt_diag * eig.eigenvectors.adjoint()
}

/// nuclear norm (sum of singular values)
fn nuclear_norm(a: &DenseMatrix) -> f64 {
    a.clone().singular_values().iter().sum()
}

/// # Fidelity to a reference state
/// * `F(rho, rho_ref) = || sqrt(rho) * sqrt(rho_ref) ||_1`, evaluated on the
///   purified walk point as `|| T_ref† * T ||_1` (the square root of the
///   reference is pre-computed once)
#[derive(Debug, Clone)]
pub struct FidelityToRef {
    t_ref: DenseMatrix,
}

impl FidelityToRef {
    /// # Create a fidelity calculator
    /// * `rho_ref` has to be a Hermitian, positive semidefinite square matrix
    pub fn new(rho_ref: &DenseMatrix) -> Result<Self, DenseDMErrors> {
        if !rho_ref.is_square() {
            return Err(DenseDMErrors::NotSquare);
        }
        // validates Hermiticity as a side effect
        herm_to_x(rho_ref)?;
        Ok(Self {
            t_ref: herm_sqrt(rho_ref),
        })
    }
}

impl ValueCalculator for FidelityToRef {
    type Point = DenseMatrix;

    fn get_value(&self, pt: &DenseMatrix) -> f64 {
        nuclear_norm(&(self.t_ref.adjoint() * pt))
    }
}

/// # Purified distance to a reference state
/// * `P(rho, rho_ref) = sqrt(1 - F²)`
#[derive(Debug, Clone)]
pub struct PurifDistToRef {
    fidelity: FidelityToRef,
}

impl PurifDistToRef {
    /// Create a purified-distance calculator for the given reference state
    pub fn new(rho_ref: &DenseMatrix) -> Result<Self, DenseDMErrors> {
        Ok(Self {
            fidelity: FidelityToRef::new(rho_ref)?,
        })
    }
}

impl ValueCalculator for PurifDistToRef {
    type Point = DenseMatrix;

    fn get_value(&self, pt: &DenseMatrix) -> f64 {
        let f = self.fidelity.get_value(pt).min(1.0);
        (1.0 - f * f).max(0.0).sqrt()
    }
}

/// # Trace distance to a reference state
/// * `D(rho, rho_ref) = 1/2 * || rho - rho_ref ||_1`
#[derive(Debug, Clone)]
pub struct TrDistToRef {
    rho_ref: DenseMatrix,
}

impl TrDistToRef {
    /// Create a trace-distance calculator for the given reference state
    pub fn new(rho_ref: &DenseMatrix) -> Result<Self, DenseDMErrors> {
        if !rho_ref.is_square() {
            return Err(DenseDMErrors::NotSquare);
        }
        herm_to_x(rho_ref)?;
        Ok(Self {
            rho_ref: rho_ref.clone(),
        })
    }
}

impl ValueCalculator for TrDistToRef {
    type Point = DenseMatrix;

    fn get_value(&self, pt: &DenseMatrix) -> f64 {
        let diff = pt * pt.adjoint() - &self.rho_ref;
        0.5 * SymmetricEigen::new(diff)
            .eigenvalues
            .iter()
            .map(|e| e.abs())
            .sum::<f64>()
    }
}

/// # Expectation value of an observable
/// * `tr(A * rho)`, computed as a dot product in the X-parameterisation
#[derive(Debug, Clone)]
pub struct ObservableValue {
    x_a: XVector,
}

impl ObservableValue {
    /// # Create an expectation-value calculator
    /// * the observable `A` has to be Hermitian (so the value is real)
    pub fn new(a: &DenseMatrix) -> Result<Self, DenseDMErrors> {
        Ok(Self { x_a: herm_to_x(a)? })
    }
}

impl ValueCalculator for ObservableValue {
    type Point = DenseMatrix;

    fn get_value(&self, pt: &DenseMatrix) -> f64 {
        let rho = pt * pt.adjoint();
        self.x_a.dot(&x_from_herm_unchecked(&rho))
    }
}

/// # The figure-of-merit calculators understood by the reference pipeline
/// * a tagged union so the calculator can be chosen at run time (e.g. from
///   the command line) while the walk's inner loop stays monomorphic
#[derive(Clone)]
pub enum DMValueCalculator {
    /// fidelity to a reference state
    Fidelity(FidelityToRef),
    /// purified distance to a reference state
    PurifDist(PurifDistToRef),
    /// trace distance to a reference state
    TrDist(TrDistToRef),
    /// expectation value of an observable
    Observable(ObservableValue),
    /// select one of several calculators by index
    Multiplexor {
        /// the available calculators
        calculators: Vec<DMValueCalculator>,
        /// which one is active
        selected: usize,
    },
    /// defer to a host-supplied callback
    Callable(Arc<dyn Fn(&DenseMatrix) -> f64 + Send + Sync>),
}

impl DMValueCalculator {
    /// # Build a multiplexor, validating the index
    pub fn multiplexor(
        calculators: Vec<DMValueCalculator>,
        selected: usize,
    ) -> Result<Self, DenseDMErrors> {
        if selected >= calculators.len() {
            return Err(DenseDMErrors::BadCalculatorIndex);
        }
        Ok(DMValueCalculator::Multiplexor {
            calculators,
            selected,
        })
    }
}

impl fmt::Debug for DMValueCalculator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DMValueCalculator::Fidelity(_) => write!(f, "Fidelity"),
            DMValueCalculator::PurifDist(_) => write!(f, "PurifDist"),
            DMValueCalculator::TrDist(_) => write!(f, "TrDist"),
            DMValueCalculator::Observable(_) => write!(f, "Observable"),
            DMValueCalculator::Multiplexor { selected, .. } => {
                write!(f, "Multiplexor(selected={})", selected)
            }
            DMValueCalculator::Callable(_) => write!(f, "Callable"),
        }
    }
}

impl ValueCalculator for DMValueCalculator {
    type Point = DenseMatrix;

    fn get_value(&self, pt: &DenseMatrix) -> f64 {
        match self {
            DMValueCalculator::Fidelity(c) => c.get_value(pt),
            DMValueCalculator::PurifDist(c) => c.get_value(pt),
            DMValueCalculator::TrDist(c) => c.get_value(pt),
            DMValueCalculator::Observable(c) => c.get_value(pt),
            DMValueCalculator::Multiplexor {
                calculators,
                selected,
            } => calculators[*selected].get_value(pt),
            DMValueCalculator::Callable(f) => f(pt),
        }
    }
}
