//! # Dense density-matrix state space
//! * the reference quantum layer consumed by the core: a purified random
//!   walker over density matrices, the independent-measurements likelihood,
//!   and the figure-of-merit calculators
//! * density matrices are parameterised as `rho = T * T†` with a complex
//!   `dim x dim` matrix `T` of unit Frobenius norm (the walk point), and
//!   Hermitian operators additionally carry an X-parameterisation (a real
//!   vector) for fast trace inner products

mod param_x;
mod llh;
mod walker;
mod value_calc;
mod cdata;

pub use param_x::*;
pub use llh::*;
pub use walker::*;
pub use value_calc::*;
pub use cdata::*;

use std::fmt;

#[cfg(feature = "serde_support")]
use serde::{Serialize, Deserialize};

/// dense complex matrix, the workhorse of this module
pub type DenseMatrix = nalgebra::DMatrix<nalgebra::Complex<f64>>;

/// real vector holding the X-parameterisation of a Hermitian matrix
pub type XVector = nalgebra::DVector<f64>;

/// Possible errors of the dense density-matrix layer
#[derive(Debug, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "serde_support", derive(Serialize, Deserialize))]
pub enum DenseDMErrors {
    /// a matrix that has to be square is not
    NotSquare,
    /// a matrix does not have the dimension of the system
    WrongDimension,
    /// the lengths of the POVM effect list and the count vector differ
    LengthMismatch,
    /// a matrix that has to be Hermitian is not
    NotHermitian,
    /// a POVM effect has a negative eigenvalue
    NotPositive,
    /// a multiplexed value-calculator index is out of range
    BadCalculatorIndex,
    /// an unknown figure-of-merit or jumps-method name was given
    UnknownName(String),
}

impl fmt::Display for DenseDMErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenseDMErrors::NotSquare => write!(f, "InvalidArgument: matrix is not square"),
            DenseDMErrors::WrongDimension => {
                write!(f, "InvalidArgument: matrix dimension does not match the system")
            }
            DenseDMErrors::LengthMismatch => write!(
                f,
                "InvalidArgument: POVM effect list and count vector have different lengths"
            ),
            DenseDMErrors::NotHermitian => {
                write!(f, "InvalidArgument: matrix is not Hermitian")
            }
            DenseDMErrors::NotPositive => {
                write!(f, "InvalidInput: POVM effect is not positive semidefinite")
            }
            DenseDMErrors::BadCalculatorIndex => {
                write!(f, "InvalidArgument: multiplexed calculator index out of range")
            }
            DenseDMErrors::UnknownName(name) => {
                write!(f, "InvalidArgument: unknown name `{}`", name)
            }
        }
    }
}

impl std::error::Error for DenseDMErrors {}
