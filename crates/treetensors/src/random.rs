//! Random tensor construction.

use rand::Rng;

use crate::matrix::Matrix;
use crate::scalar::RandomNormal;
use crate::shape::TensorShape;
use crate::tensor::Tensor;

impl<T: RandomNormal> Tensor<T> {
    /// Create a tensor with standard normal entries from a caller-owned
    /// RNG, so seeded runs are reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use rand::SeedableRng;
    /// use rand::rngs::StdRng;
    /// use treetensors::{Tensor, TensorShape};
    ///
    /// let shape = TensorShape::new(&[4, 2]).unwrap();
    /// let mut rng = StdRng::seed_from_u64(42);
    /// let a: Tensor<f64> = Tensor::randn_with_rng(&shape, &mut rng);
    /// let mut rng = StdRng::seed_from_u64(42);
    /// let b: Tensor<f64> = Tensor::randn_with_rng(&shape, &mut rng);
    /// assert_eq!(a.data(), b.data());
    /// ```
    pub fn randn_with_rng<R: Rng>(shape: &TensorShape, rng: &mut R) -> Self {
        let data = (0..shape.total()).map(|_| T::sample_normal(rng)).collect();
        Self::from_vec(shape, data).expect("length matches shape by construction")
    }
}

impl<T: RandomNormal> Matrix<T> {
    /// Create a matrix with standard normal entries from a caller-owned
    /// RNG.
    pub fn randn_with_rng<R: Rng>(rows: usize, cols: usize, rng: &mut R) -> Self {
        let data = (0..rows * cols).map(|_| T::sample_normal(rng)).collect();
        Self::from_vec(rows, cols, data).expect("length matches dimensions by construction")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scalar::c64;
    use crate::scalar::Scalar;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_randn_reproducible() {
        let shape = TensorShape::new(&[3, 4]).unwrap();
        let mut rng1 = StdRng::seed_from_u64(54321);
        let a: Tensor<f64> = Tensor::randn_with_rng(&shape, &mut rng1);
        let mut rng2 = StdRng::seed_from_u64(54321);
        let b: Tensor<f64> = Tensor::randn_with_rng(&shape, &mut rng2);
        assert_eq!(a.data(), b.data());
    }

    #[test]
    fn test_randn_complex_unit_variance() {
        let shape = TensorShape::new(&[200, 1]).unwrap();
        let mut rng = StdRng::seed_from_u64(99);
        let t: Tensor<c64> = Tensor::randn_with_rng(&shape, &mut rng);
        let mean_sq: f64 =
            t.data().iter().map(|z| z.abs_sqr()).sum::<f64>() / t.data().len() as f64;
        assert!(
            mean_sq > 0.5 && mean_sq < 1.5,
            "mean |z|^2 {} too far from 1",
            mean_sq
        );
    }

    #[test]
    fn test_randn_matrix() {
        let mut rng = StdRng::seed_from_u64(7);
        let m: Matrix<f64> = Matrix::randn_with_rng(3, 2, &mut rng);
        assert_eq!(m.rows(), 3);
        assert_eq!(m.cols(), 2);
    }
}
