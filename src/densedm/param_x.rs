use nalgebra::Complex;

use super::{DenseDMErrors, DenseMatrix, XVector};

const SQRT2: f64 = std::f64::consts::SQRT_2;

/// tolerance used when checking Hermiticity
pub(crate) const HERMITICITY_TOL: f64 = 1e-10;

/// # X-parameterisation of a Hermitian matrix
/// * a `dim x dim` Hermitian matrix maps to a real vector of length `dim²`:
///   the `dim` diagonal entries first, then `sqrt(2) * Re` and `sqrt(2) * Im`
///   of every off-diagonal entry above the diagonal, row by row
/// * the map is an isometry: `tr(A * B) = x_A . x_B` for Hermitian `A`, `B`,
///   which makes the likelihood inner loop a plain dot product
pub fn herm_to_x(a: &DenseMatrix) -> Result<XVector, DenseDMErrors> {
    if !a.is_square() {
        return Err(DenseDMErrors::NotSquare);
    }
    let dim = a.nrows();
    for i in 0..dim {
        for j in i..dim {
            let diff = a[(i, j)] - a[(j, i)].conj();
            if diff.norm() > HERMITICITY_TOL {
                return Err(DenseDMErrors::NotHermitian);
            }
        }
    }
    Ok(x_from_herm_unchecked(a))
}

/// X-parameterisation without the Hermiticity check, for matrices that are
/// Hermitian by construction (like `T * T†`)
pub(crate) fn x_from_herm_unchecked(a: &DenseMatrix) -> XVector {
    let dim = a.nrows();
    let mut x = XVector::zeros(dim * dim);
    for i in 0..dim {
        x[i] = a[(i, i)].re;
    }
    let mut k = dim;
    for i in 0..dim {
        for j in (i + 1)..dim {
            x[k] = SQRT2 * a[(i, j)].re;
            x[k + 1] = SQRT2 * a[(i, j)].im;
            k += 2;
        }
    }
    x
}

/// # Reconstruct the Hermitian matrix from its X-parameterisation
/// * inverse of [`herm_to_x`]; the vector length must be `dim²`
pub fn x_to_herm(x: &XVector, dim: usize) -> Result<DenseMatrix, DenseDMErrors> {
    if x.len() != dim * dim {
        return Err(DenseDMErrors::WrongDimension);
    }
    let mut a = DenseMatrix::zeros(dim, dim);
    for i in 0..dim {
        a[(i, i)] = Complex::new(x[i], 0.0);
    }
    let mut k = dim;
    for i in 0..dim {
        for j in (i + 1)..dim {
            let re = x[k] / SQRT2;
            let im = x[k + 1] / SQRT2;
            a[(i, j)] = Complex::new(re, im);
            a[(j, i)] = Complex::new(re, -im);
            k += 2;
        }
    }
    Ok(a)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Complex;

    fn example_herm() -> DenseMatrix {
        DenseMatrix::from_row_slice(
            2,
            2,
            &[
                Complex::new(0.7, 0.0),
                Complex::new(0.1, -0.2),
                Complex::new(0.1, 0.2),
                Complex::new(0.3, 0.0),
            ],
        )
    }

    #[test]
    fn x_roundtrip() {
        let a = example_herm();
        let x = herm_to_x(&a).unwrap();
        assert_eq!(x.len(), 4);
        let back = x_to_herm(&x, 2).unwrap();
        assert!((&a - &back).norm() < 1e-14);
    }

    #[test]
    fn inner_product_is_trace() {
        let a = example_herm();
        let b = DenseMatrix::from_row_slice(
            2,
            2,
            &[
                Complex::new(0.5, 0.0),
                Complex::new(-0.3, 0.4),
                Complex::new(-0.3, -0.4),
                Complex::new(0.5, 0.0),
            ],
        );
        let xa = herm_to_x(&a).unwrap();
        let xb = herm_to_x(&b).unwrap();
        let tr = (&a * &b).trace();
        assert!(tr.im.abs() < 1e-14);
        assert!((xa.dot(&xb) - tr.re).abs() < 1e-12);
    }

    #[test]
    fn rejects_non_hermitian() {
        let mut a = example_herm();
        a[(0, 1)] = Complex::new(1.0, 1.0);
        assert_eq!(herm_to_x(&a).unwrap_err(), DenseDMErrors::NotHermitian);
    }
}
