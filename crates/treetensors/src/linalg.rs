//! Adapters to the external dense linear-algebra backend.
//!
//! Each routine copies the caller's buffer into faer, runs the
//! decomposition there, and copies the result back; nothing is
//! reimplemented locally. Eigenvectors and singular vectors get a
//! deterministic phase: the first component of each vector is forced to
//! a non-negative real part, so repeated runs and different backends
//! produce identical output.

use faer::linalg::solvers::{Qr, Solve, Svd, SvdError};
use faer::{Mat, Side};
use faer_traits::math_utils;

use crate::error::TensorError;
use crate::matrix::Matrix;
use crate::scalar::Scalar;

/// Eigenvectors (as columns) and real eigenvalues of a Hermitian matrix.
#[derive(Debug, Clone)]
pub struct SpectralDecomposition<T: Scalar> {
    /// Eigenvectors stored column-wise.
    pub vectors: Matrix<T>,
    /// Eigenvalues in nondecreasing order.
    pub values: Vec<f64>,
}

/// Thin singular value decomposition `A = U · diag(s) · V†`.
#[derive(Debug, Clone)]
pub struct SvdResult<T: Scalar> {
    pub u: Matrix<T>,
    pub values: Vec<f64>,
    pub v: Matrix<T>,
}

fn fix_column_phases<T: Scalar>(m: &mut Matrix<T>) {
    for j in 0..m.cols() {
        if m.at(0, j).re() < 0.0 {
            for i in 0..m.rows() {
                *m.at_mut(i, j) = -m.at(i, j);
            }
        }
    }
}

/// Eigendecomposition of a Hermitian (or real symmetric) matrix.
///
/// Eigenvalues are real and returned in nondecreasing order; each
/// eigenvector's phase follows the fixed convention above.
pub fn diag_hermitian<T: Scalar>(a: &Matrix<T>) -> Result<SpectralDecomposition<T>, TensorError> {
    assert_eq!(a.rows(), a.cols(), "eigendecomposition needs a square matrix");
    let n = a.rows();
    let evd = a
        .as_faer_mat()
        .self_adjoint_eigen(Side::Lower)
        .map_err(|e| TensorError::EigenError {
            message: format!("{:?}", e),
        })?;
    let s = evd.S();
    let u = evd.U();
    let mut values = Vec::with_capacity(n);
    for i in 0..n {
        values.push(math_utils::real(&s[i]));
    }
    let mut vectors = Matrix::zeros(n, n);
    for j in 0..n {
        for i in 0..n {
            *vectors.at_mut(i, j) = u[(i, j)];
        }
    }
    fix_column_phases(&mut vectors);
    Ok(SpectralDecomposition { vectors, values })
}

/// Recompose `V · diag(λ) · V†` from a spectral decomposition.
pub fn to_matrix<T: Scalar>(x: &SpectralDecomposition<T>) -> Matrix<T> {
    let mut scaled = x.vectors.clone();
    for (k, &lambda) in x.values.iter().enumerate() {
        for i in 0..scaled.rows() {
            *scaled.at_mut(i, k) *= T::from_f64(lambda);
        }
    }
    Matrix::mat_mul(&x.vectors, &scaled.adjoint())
}

/// Regularized pseudo-inverse from a spectral decomposition: each
/// eigenvalue `λ` becomes `1 / (λ + ε·exp(−λ/ε))`, so spectra below `ε`
/// stay bounded instead of blowing up.
pub fn build_inverse<T: Scalar>(x: &SpectralDecomposition<T>, eps: f64) -> Matrix<T> {
    let inverted = SpectralDecomposition {
        vectors: x.vectors.clone(),
        values: x
            .values
            .iter()
            .map(|&lambda| 1.0 / (lambda + eps * (-lambda / eps).exp()))
            .collect(),
    };
    to_matrix(&inverted)
}

/// Invert a square matrix via partial-pivot LU.
///
/// A singular or ill-conditioned input surfaces as non-finite entries in
/// the solve; that is reported as a fatal [`TensorError::SingularMatrix`]
/// after a diagnostic, never returned silently.
pub fn inverse<T: Scalar>(a: &Matrix<T>) -> Result<Matrix<T>, TensorError> {
    assert_eq!(a.rows(), a.cols(), "inversion needs a square matrix");
    let n = a.rows();
    let lu = a.as_faer_mat().partial_piv_lu();
    let mut x = Mat::from_fn(n, n, |i, j| if i == j { T::one() } else { T::zero() });
    lu.solve_in_place(&mut x);
    let mut out = Matrix::zeros(n, n);
    for j in 0..n {
        for i in 0..n {
            let v = x[(i, j)];
            if !v.is_finite() {
                log::error!("matrix inversion produced non-finite entries: singular input");
                return Err(TensorError::SingularMatrix {
                    operation: "inverse",
                });
            }
            *out.at_mut(i, j) = v;
        }
    }
    Ok(out)
}

/// Solve the dense linear system `A · x = b`.
pub fn solve<T: Scalar>(a: &Matrix<T>, b: &[T]) -> Result<Vec<T>, TensorError> {
    assert_eq!(a.rows(), a.cols(), "solve needs a square matrix");
    assert_eq!(a.rows(), b.len(), "right-hand side length must match");
    let n = a.rows();
    let lu = a.as_faer_mat().partial_piv_lu();
    let mut x = Mat::from_fn(n, 1, |i, _| b[i]);
    lu.solve_in_place(&mut x);
    let mut out = Vec::with_capacity(n);
    for i in 0..n {
        let v = x[(i, 0)];
        if !v.is_finite() {
            log::error!("linear solve produced non-finite entries: singular input");
            return Err(TensorError::SingularMatrix { operation: "solve" });
        }
        out.push(v);
    }
    Ok(out)
}

/// Thin SVD with the fixed sign convention applied to matching columns
/// of `U` and `V`.
pub fn svd<T: Scalar>(a: &Matrix<T>) -> Result<SvdResult<T>, TensorError> {
    let rank = a.rows().min(a.cols());
    let result: Svd<T> =
        Svd::new_thin(a.as_faer_mat()).map_err(|e: SvdError| TensorError::SvdError {
            message: format!("{:?}", e),
        })?;
    let u_mat = result.U();
    let s_diag = result.S();
    let v_mat = result.V();
    let mut u = Matrix::zeros(a.rows(), rank);
    for j in 0..rank {
        for i in 0..a.rows() {
            *u.at_mut(i, j) = u_mat[(i, j)];
        }
    }
    let mut v = Matrix::zeros(a.cols(), rank);
    for j in 0..rank {
        for i in 0..a.cols() {
            *v.at_mut(i, j) = v_mat[(i, j)];
        }
    }
    let mut values = Vec::with_capacity(rank);
    for i in 0..rank {
        values.push(math_utils::real(&s_diag[i]));
    }
    // Flip matching U/V columns together so the product is unchanged.
    for j in 0..rank {
        if u.at(0, j).re() < 0.0 {
            for i in 0..u.rows() {
                *u.at_mut(i, j) = -u.at(i, j);
            }
            for i in 0..v.rows() {
                *v.at_mut(i, j) = -v.at(i, j);
            }
        }
    }
    Ok(SvdResult { u, values, v })
}

/// Thin orthogonal factor of the QR decomposition.
pub fn qr<T: Scalar>(a: &Matrix<T>) -> Matrix<T> {
    let decomposition: Qr<T> = Qr::new(a.as_faer_mat());
    let q = decomposition.compute_thin_Q();
    Matrix::from_faer_mat(q.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scalar::c64;
    use approx::assert_relative_eq;

    #[test]
    fn test_diag_hermitian_reconstructs() {
        let a = Matrix::from_vec(2, 2, vec![4.0, 1.0, 1.0, 3.0]).unwrap();
        let x = diag_hermitian(&a).unwrap();
        assert!(x.values[0] <= x.values[1]);
        let back = to_matrix(&x);
        assert_relative_eq!(Matrix::residual(&a, &back), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_diag_hermitian_phase_convention() {
        let a = Matrix::from_vec(2, 2, vec![2.0, 1.0, 1.0, 2.0]).unwrap();
        let x = diag_hermitian(&a).unwrap();
        for j in 0..2 {
            assert!(x.vectors.at(0, j) >= 0.0);
        }
    }

    #[test]
    fn test_diag_hermitian_complex() {
        let a = Matrix::from_vec(
            2,
            2,
            vec![
                c64::new(2.0, 0.0),
                c64::new(1.0, -1.0),
                c64::new(1.0, 1.0),
                c64::new(3.0, 0.0),
            ],
        )
        .unwrap();
        let x = diag_hermitian(&a).unwrap();
        let back = to_matrix(&x);
        assert_relative_eq!(Matrix::residual(&a, &back), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_inverse() {
        let a = Matrix::from_vec(2, 2, vec![4.0, 2.0, 7.0, 6.0]).unwrap();
        let inv = inverse(&a).unwrap();
        let eye = Matrix::mat_mul(&a, &inv);
        assert_relative_eq!(
            Matrix::residual(&eye, &Matrix::identity(2)),
            0.0,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_inverse_singular_is_fatal() {
        let a = Matrix::from_vec(2, 2, vec![1.0, 2.0, 2.0, 4.0]).unwrap();
        match inverse(&a) {
            Err(TensorError::SingularMatrix { .. }) => {}
            other => panic!("expected SingularMatrix, got {:?}", other),
        }
    }

    #[test]
    fn test_solve() {
        let a = Matrix::from_vec(2, 2, vec![3.0, 1.0, 1.0, 2.0]).unwrap();
        // A * [1, 2]^T = [3 + 2, 1 + 4] = [5, 5]
        let x = solve(&a, &[5.0, 5.0]).unwrap();
        assert_relative_eq!(x[0], 1.0, epsilon = 1e-12);
        assert_relative_eq!(x[1], 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_svd_reconstructs() {
        let a = Matrix::from_vec(3, 2, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        let x = svd(&a).unwrap();
        // U * diag(s) * V^H
        let mut sv = x.v.adjoint();
        for (i, &s) in x.values.iter().enumerate() {
            for j in 0..sv.cols() {
                *sv.at_mut(i, j) *= s;
            }
        }
        let back = Matrix::mat_mul(&x.u, &sv);
        assert_relative_eq!(Matrix::residual(&a, &back), 0.0, epsilon = 1e-10);
        // Sign convention on U columns.
        for j in 0..x.u.cols() {
            assert!(x.u.at(0, j) >= 0.0);
        }
    }

    #[test]
    fn test_qr_orthonormal_columns() {
        let a = Matrix::from_vec(3, 2, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        let q = qr(&a);
        assert_eq!(q.rows(), 3);
        assert_eq!(q.cols(), 2);
        let gram = Matrix::mult_atb(&q, &q);
        assert_relative_eq!(
            Matrix::residual(&gram, &Matrix::identity(2)),
            0.0,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_build_inverse_regularizes() {
        let a = Matrix::from_vec(2, 2, vec![1.0, 0.0, 0.0, 0.0]).unwrap();
        let x = diag_hermitian(&a).unwrap();
        let inv = build_inverse(&x, 1e-6);
        // The zero eigenvalue maps to 1/eps instead of infinity.
        assert!(inv.data().iter().all(|v| v.is_finite()));
    }
}
