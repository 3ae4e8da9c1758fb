//! State-space orthonormalization and projections.

use crate::contraction::mult_state_transposed;
use crate::error::TensorError;
use crate::linalg;
use crate::matrix::Matrix;
use crate::scalar::Scalar;
use crate::tensor::{single_dot, Tensor};

/// Iteration budget for the re-orthogonalization sweeps.
const MAX_SWEEPS: usize = 15;
/// Inner convergence threshold on the accumulated cross-overlap.
const CONVERGENCE: f64 = 1e-12;
/// Outer acceptance threshold; exceeding it after the budget is fatal.
const ACCEPTANCE: f64 = 1e-9;

/// Orthonormalize the states of `a` with iterative modified Gram-Schmidt.
///
/// Each state is repeatedly orthogonalized against all previous ones and
/// renormalized until the accumulated cross-overlap falls below the
/// convergence threshold or the iteration budget runs out. If the
/// residual still exceeds the acceptance threshold, a diagnostic is
/// emitted and a fatal [`TensorError::OrthogonalityLoss`] is returned —
/// a non-orthogonal tensor is never handed back silently.
pub fn gram_schmidt<T: Scalar>(a: &mut Tensor<T>) -> Result<(), TensorError> {
    let ntensor = a.shape().ntensor();
    let dim_part = a.shape().dim_part();

    for n in 0..ntensor {
        let mut sweeps = 0;
        let mut accum = 1.0;
        while accum > CONVERGENCE && sweeps < MAX_SWEEPS {
            sweeps += 1;
            accum = 0.0;
            for m in 0..n {
                let overlap = single_dot(a, a, m, n);
                accum += overlap.abs();
                for i in 0..dim_part {
                    let v = a.at(i, m);
                    *a.at_mut(i, n) -= overlap * v;
                }
            }

            let norm = single_dot(a, a, n, n);
            if norm.abs() != 0.0 {
                let norm = norm.re().sqrt();
                for i in 0..dim_part {
                    *a.at_mut(i, n) /= T::from_f64(norm);
                }
            }
        }
        if accum >= ACCEPTANCE {
            log::error!(
                "no orthogonality in Gram-Schmidt for state {}: residual {:e}, acceptance {:e}",
                n,
                accum,
                ACCEPTANCE
            );
            return Err(TensorError::OrthogonalityLoss {
                residual: accum,
                acceptance: ACCEPTANCE,
            });
        }
    }
    Ok(())
}

/// Project the states of `b` onto the span of the states of `a`.
///
/// The overlap of `a` with itself is inverted to compensate for a
/// non-orthonormal `a`; both tensors must carry the same state count.
pub fn project<T: Scalar>(a: &Tensor<T>, b: &Tensor<T>) -> Result<Tensor<T>, TensorError> {
    let overlap = a.gram(a);
    let inverse_overlap = linalg::inverse(&overlap)?;
    let dot = a.gram(b);
    let product = Matrix::mat_mul(&inverse_overlap, &dot);
    Ok(mult_state_transposed(&product, a))
}

/// Make `a` orthogonal to `b`: returns `(1 − P_b) · a`.
pub fn project_out<T: Scalar>(a: &Tensor<T>, b: &Tensor<T>) -> Result<Tensor<T>, TensorError> {
    let projector = project(b, a)?;
    let mut perp = a.clone();
    perp.add_scaled(&projector, -T::one());
    Ok(perp)
}

/// Projection of `b` onto an already-orthonormal `a`; skips the overlap
/// inversion.
pub fn project_orthogonal<T: Scalar>(a: &Tensor<T>, b: &Tensor<T>) -> Tensor<T> {
    let dot = a.gram(b);
    mult_state_transposed(&dot, a)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scalar::{c64, RandomNormal};
    use crate::shape::TensorShape;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn random_tensor<T: RandomNormal>(dims: &[usize], seed: u64) -> Tensor<T> {
        let shape = TensorShape::new(dims).unwrap();
        let mut rng = StdRng::seed_from_u64(seed);
        Tensor::randn_with_rng(&shape, &mut rng)
    }

    fn assert_orthonormal<T: Scalar>(a: &Tensor<T>, eps: f64) {
        let s = a.gram(a);
        let n = a.shape().ntensor();
        assert_relative_eq!(
            Matrix::residual(&s, &Matrix::identity(n)),
            0.0,
            epsilon = eps
        );
    }

    #[test]
    fn test_gram_schmidt_orthonormalizes() {
        let mut a = random_tensor::<f64>(&[8, 3], 7);
        gram_schmidt(&mut a).unwrap();
        assert_orthonormal(&a, 1e-10);
    }

    #[test]
    fn test_gram_schmidt_complex() {
        let mut a = random_tensor::<c64>(&[6, 4], 11);
        gram_schmidt(&mut a).unwrap();
        assert_orthonormal(&a, 1e-10);
    }

    #[test]
    fn test_gram_schmidt_idempotent() {
        let mut a = random_tensor::<f64>(&[8, 3], 13);
        gram_schmidt(&mut a).unwrap();
        let before = a.clone();
        gram_schmidt(&mut a).unwrap();
        let mut diff = a.clone();
        diff.add_scaled(&before, -1.0);
        let drift: f64 = diff.data().iter().map(|x| x.abs_sqr()).sum::<f64>().sqrt();
        assert!(drift < 1e-9, "second pass moved the tensor by {:e}", drift);
    }

    #[test]
    fn test_project_out_is_orthogonal() {
        let mut basis = random_tensor::<f64>(&[10, 2], 17);
        gram_schmidt(&mut basis).unwrap();
        let target = random_tensor::<f64>(&[10, 2], 19);
        let perp = project_out(&target, &basis).unwrap();
        let cross = basis.gram(&perp);
        for i in 0..cross.rows() {
            for j in 0..cross.cols() {
                assert_relative_eq!(cross.at(i, j), 0.0, epsilon = 1e-10);
            }
        }
    }

    #[test]
    fn test_project_keeps_span() {
        let mut basis = random_tensor::<f64>(&[10, 2], 23);
        gram_schmidt(&mut basis).unwrap();
        // Something already inside the span projects to itself.
        let inside = project_orthogonal(&basis, &basis);
        let mut diff = inside.clone();
        diff.add_scaled(&basis, -1.0);
        let drift: f64 = diff.data().iter().map(|x| x.abs_sqr()).sum::<f64>().sqrt();
        assert!(drift < 1e-10);
    }
}
