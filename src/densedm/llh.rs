use nalgebra::SymmetricEigen;

use super::{herm_to_x, x_from_herm_unchecked, DenseDMErrors, DenseMatrix, XVector};

/// eigenvalues above this negative tolerance still count as positive
/// semidefinite
const PSD_TOL: f64 = 1e-10;

/// # Log-likelihood of independent POVM measurements
/// * stores every POVM effect `E_k` in its X-parameterisation together with
///   the number of times `N_k` its outcome was observed
/// * `log_likelihood(rho) = sum_k N_k * ln tr(E_k * rho)`; the trace reduces
///   to a real dot product in the X-parameterisation
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde_support", derive(serde::Serialize, serde::Deserialize))]
pub struct IndepMeasLLH {
    dim: usize,
    exn: Vec<XVector>,
    nx: Vec<f64>,
}

impl IndepMeasLLH {
    /// Create an empty likelihood for a `dim`-dimensional system
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            exn: Vec::new(),
            nx: Vec::new(),
        }
    }

    /// system dimension
    #[inline]
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// number of stored POVM effects
    #[inline]
    pub fn num_effects(&self) -> usize {
        self.exn.len()
    }

    /// total number of observed outcomes
    pub fn total_counts(&self) -> f64 {
        self.nx.iter().sum()
    }

    /// # Append one POVM effect and its observation count
    /// * the effect has to be a Hermitian, positive semidefinite `dim x dim`
    ///   matrix
    pub fn add_measurement(&mut self, effect: &DenseMatrix, count: f64) -> Result<(), DenseDMErrors> {
        if !effect.is_square() {
            return Err(DenseDMErrors::NotSquare);
        }
        if effect.nrows() != self.dim {
            return Err(DenseDMErrors::WrongDimension);
        }
        let x = herm_to_x(effect)?;
        let min_eig = SymmetricEigen::new(effect.clone())
            .eigenvalues
            .iter()
            .cloned()
            .fold(f64::INFINITY, f64::min);
        if min_eig < -PSD_TOL {
            return Err(DenseDMErrors::NotPositive);
        }
        self.exn.push(x);
        self.nx.push(count);
        Ok(())
    }

    /// # Set the full list of effects and counts at once
    /// * `Err(LengthMismatch)` unless both slices have the same length
    pub fn set_measurements(
        &mut self,
        effects: &[DenseMatrix],
        counts: &[f64],
    ) -> Result<(), DenseDMErrors> {
        if effects.len() != counts.len() {
            return Err(DenseDMErrors::LengthMismatch);
        }
        self.exn.clear();
        self.nx.clear();
        for (effect, &count) in effects.iter().zip(counts) {
            self.add_measurement(effect, count)?;
        }
        Ok(())
    }

    /// multiply every observation count by `factor`
    pub fn amplify_counts(&mut self, factor: f64) {
        self.nx.iter_mut().for_each(|n| *n *= factor);
    }

    /// # Log-likelihood at the X-parameterised state `x_rho`
    /// * states giving a non-positive outcome probability yield `-inf`, i.e.
    ///   such states are rejected with certainty by the walk
    pub fn log_likelihood_x(&self, x_rho: &XVector) -> f64 {
        let mut llh = 0.0;
        for (ex, &n) in self.exn.iter().zip(&self.nx) {
            let p = ex.dot(x_rho);
            if p <= 0.0 {
                return f64::NEG_INFINITY;
            }
            llh += n * p.ln();
        }
        llh
    }

    /// log-likelihood at the density matrix `rho`
    pub fn log_likelihood(&self, rho: &DenseMatrix) -> Result<f64, DenseDMErrors> {
        if !rho.is_square() {
            return Err(DenseDMErrors::NotSquare);
        }
        if rho.nrows() != self.dim {
            return Err(DenseDMErrors::WrongDimension);
        }
        Ok(self.log_likelihood_x(&x_from_herm_unchecked(rho)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Complex;

    fn c(re: f64, im: f64) -> Complex<f64> {
        Complex::new(re, im)
    }

    /// projectors |0><0| and |1><1| of a qubit
    fn z_projectors() -> (DenseMatrix, DenseMatrix) {
        let p0 = DenseMatrix::from_row_slice(2, 2, &[c(1.0, 0.0), c(0.0, 0.0), c(0.0, 0.0), c(0.0, 0.0)]);
        let p1 = DenseMatrix::from_row_slice(2, 2, &[c(0.0, 0.0), c(0.0, 0.0), c(0.0, 0.0), c(1.0, 0.0)]);
        (p0, p1)
    }

    #[test]
    fn log_likelihood_of_diagonal_state() {
        let (p0, p1) = z_projectors();
        let mut llh = IndepMeasLLH::new(2);
        llh.set_measurements(&[p0, p1], &[30.0, 70.0]).unwrap();
        assert_eq!(llh.num_effects(), 2);
        assert_eq!(llh.total_counts(), 100.0);

        // rho = diag(0.3, 0.7)
        let rho = DenseMatrix::from_row_slice(
            2,
            2,
            &[c(0.3, 0.0), c(0.0, 0.0), c(0.0, 0.0), c(0.7, 0.0)],
        );
        let expected = 30.0 * 0.3f64.ln() + 70.0 * 0.7f64.ln();
        assert!((llh.log_likelihood(&rho).unwrap() - expected).abs() < 1e-10);
    }

    #[test]
    fn impossible_state_is_rejected_hard() {
        let (p0, p1) = z_projectors();
        let mut llh = IndepMeasLLH::new(2);
        llh.set_measurements(&[p0.clone(), p1], &[1.0, 1.0]).unwrap();
        // pure |1><1| gives zero probability for the |0> outcome
        let rho = DenseMatrix::from_row_slice(
            2,
            2,
            &[c(0.0, 0.0), c(0.0, 0.0), c(0.0, 0.0), c(1.0, 0.0)],
        );
        assert_eq!(llh.log_likelihood(&rho).unwrap(), f64::NEG_INFINITY);
    }

    #[test]
    fn shape_checks() {
        let mut llh = IndepMeasLLH::new(2);
        let wrong = DenseMatrix::zeros(3, 3);
        assert_eq!(
            llh.add_measurement(&wrong, 1.0).unwrap_err(),
            DenseDMErrors::WrongDimension
        );
        let (p0, _) = z_projectors();
        assert_eq!(
            llh.set_measurements(&[p0], &[1.0, 2.0]).unwrap_err(),
            DenseDMErrors::LengthMismatch
        );
    }

    #[test]
    fn negative_effect_is_rejected() {
        let mut llh = IndepMeasLLH::new(2);
        let neg = DenseMatrix::from_row_slice(
            2,
            2,
            &[c(-0.5, 0.0), c(0.0, 0.0), c(0.0, 0.0), c(1.0, 0.0)],
        );
        assert_eq!(
            llh.add_measurement(&neg, 1.0).unwrap_err(),
            DenseDMErrors::NotPositive
        );
    }

    #[test]
    fn amplification_scales_counts() {
        let (p0, p1) = z_projectors();
        let mut llh = IndepMeasLLH::new(2);
        llh.set_measurements(&[p0, p1], &[3.0, 7.0]).unwrap();
        llh.amplify_counts(10.0);
        assert_eq!(llh.total_counts(), 100.0);
    }
}
