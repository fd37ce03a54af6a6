//! # Measurement data files
//! * JSON container with the variables `dim` (system dimension), `Emn` (list
//!   of POVM effect matrices), `Nm` (observation counts), `rho_MLE` (the
//!   default reference state) and optionally further named matrices used as
//!   reference states or observables
//! * complex matrices are written as nested row-major arrays whose entries
//!   are either a plain number or a `[re, im]` pair

use nalgebra::Complex;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::io;

use crate::densedm::DenseMatrix;

/// Possible errors when reading a data file
#[derive(Debug)]
pub enum DataFileErrors {
    /// the file could not be read
    Io(io::Error),
    /// the file is not valid JSON or does not match the schema
    Parse(String),
    /// a required variable is missing
    MissingVariable(String),
    /// a matrix variable is not rectangular
    NotRectangular(String),
}

impl fmt::Display for DataFileErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataFileErrors::Io(e) => write!(f, "InvalidInput: cannot read data file: {}", e),
            DataFileErrors::Parse(msg) => write!(f, "InvalidInput: malformed data file: {}", msg),
            DataFileErrors::MissingVariable(name) => {
                write!(f, "InvalidInput: data file misses the variable `{}`", name)
            }
            DataFileErrors::NotRectangular(name) => {
                write!(f, "InvalidInput: matrix `{}` is not rectangular", name)
            }
        }
    }
}

impl std::error::Error for DataFileErrors {}

impl From<io::Error> for DataFileErrors {
    fn from(e: io::Error) -> Self {
        DataFileErrors::Io(e)
    }
}

/// one complex entry, either a plain real number or a `[re, im]` pair
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(untagged)]
pub enum ComplexEntry {
    /// a real number
    Real(f64),
    /// a `[re, im]` pair
    Pair([f64; 2]),
}

impl ComplexEntry {
    fn to_complex(self) -> Complex<f64> {
        match self {
            ComplexEntry::Real(re) => Complex::new(re, 0.0),
            ComplexEntry::Pair([re, im]) => Complex::new(re, im),
        }
    }
}

/// a complex matrix as stored in the data file
#[derive(Debug, Clone, Deserialize)]
#[serde(transparent)]
pub struct MatrixData(pub Vec<Vec<ComplexEntry>>);

impl MatrixData {
    /// # Convert to a dense matrix
    /// * `name` is only used in the error message
    pub fn to_matrix(&self, name: &str) -> Result<DenseMatrix, DataFileErrors> {
        let rows = self.0.len();
        let cols = self.0.first().map(Vec::len).unwrap_or(0);
        if rows == 0 || cols == 0 || self.0.iter().any(|r| r.len() != cols) {
            return Err(DataFileErrors::NotRectangular(name.to_string()));
        }
        Ok(DenseMatrix::from_fn(rows, cols, |i, j| {
            self.0[i][j].to_complex()
        }))
    }
}

/// # The parsed contents of a measurement data file
#[derive(Debug, Deserialize)]
pub struct DataFile {
    /// dimension of the quantum system
    pub dim: usize,
    /// the POVM effect matrices, one per measured outcome
    #[serde(rename = "Emn")]
    pub emn: Vec<MatrixData>,
    /// how often each outcome was observed
    #[serde(rename = "Nm")]
    pub nm: Vec<f64>,
    /// maximum-likelihood estimate, the default reference state
    #[serde(rename = "rho_MLE")]
    pub rho_mle: Option<MatrixData>,
    /// further named matrices (reference states, observables)
    #[serde(flatten)]
    pub named: HashMap<String, serde_json::Value>,
}

impl DataFile {
    /// # Parse a data file from a reader
    pub fn from_reader<R: io::Read>(reader: R) -> Result<Self, DataFileErrors> {
        serde_json::from_reader(reader).map_err(|e| DataFileErrors::Parse(e.to_string()))
    }

    /// the POVM effect matrices
    pub fn effects(&self) -> Result<Vec<DenseMatrix>, DataFileErrors> {
        self.emn
            .iter()
            .enumerate()
            .map(|(k, m)| m.to_matrix(&format!("Emn[{}]", k)))
            .collect()
    }

    /// the default reference state `rho_MLE`
    pub fn reference_state(&self) -> Result<DenseMatrix, DataFileErrors> {
        match &self.rho_mle {
            Some(m) => m.to_matrix("rho_MLE"),
            None => Err(DataFileErrors::MissingVariable("rho_MLE".to_string())),
        }
    }

    /// # Look up a named matrix variable
    /// * `rho_MLE` may also be referred to by name
    pub fn named_matrix(&self, name: &str) -> Result<DenseMatrix, DataFileErrors> {
        if name == "rho_MLE" {
            return self.reference_state();
        }
        let value = self
            .named
            .get(name)
            .ok_or_else(|| DataFileErrors::MissingVariable(name.to_string()))?;
        let data: MatrixData = serde_json::from_value(value.clone())
            .map_err(|e| DataFileErrors::Parse(format!("variable `{}`: {}", name, e)))?;
        data.to_matrix(name)
    }
}
