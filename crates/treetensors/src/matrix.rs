//! Dense matrix: the 2-mode tensor specialization.

use std::fmt;
use std::io::{Read, Write};
use std::ops::{AddAssign, DivAssign, Index, IndexMut, MulAssign, SubAssign};

use faer::{Mat, MatRef};

use crate::error::TensorError;
use crate::record::{expect_magic, read_i32, write_i32, write_magic};
use crate::scalar::Scalar;

const MAGIC: [u8; 4] = *b"MATR";

/// Dense matrix with explicit row and column counts, stored column-major
/// in one owned contiguous buffer (the layout faer consumes zero-copy).
///
/// # Examples
///
/// ```
/// use treetensors::Matrix;
///
/// let eye = Matrix::<f64>::identity(3);
/// assert_eq!(eye.trace(), 3.0);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix<T: Scalar> {
    rows: usize,
    cols: usize,
    data: Vec<T>,
}

impl<T: Scalar> Matrix<T> {
    /// Create a zero matrix.
    pub fn zeros(rows: usize, cols: usize) -> Self {
        assert!(rows > 0 && cols > 0, "matrix dimensions must be positive");
        Self {
            rows,
            cols,
            data: vec![T::zero(); rows * cols],
        }
    }

    /// Create the `dim × dim` identity.
    pub fn identity(dim: usize) -> Self {
        let mut m = Self::zeros(dim, dim);
        for i in 0..dim {
            *m.at_mut(i, i) = T::one();
        }
        m
    }

    /// Create a matrix from a column-major buffer.
    pub fn from_vec(rows: usize, cols: usize, data: Vec<T>) -> Result<Self, TensorError> {
        if data.len() != rows * cols {
            return Err(TensorError::ShapeMismatch {
                expected: rows * cols,
                actual: data.len(),
            });
        }
        Ok(Self { rows, cols, data })
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Column-major flat buffer.
    #[inline]
    pub fn data(&self) -> &[T] {
        &self.data
    }

    /// Mutable column-major flat buffer.
    #[inline]
    pub fn data_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Element `(i, j)`.
    #[inline]
    pub fn at(&self, i: usize, j: usize) -> T {
        assert!(i < self.rows, "row index {} out of range", i);
        assert!(j < self.cols, "column index {} out of range", j);
        self.data[j * self.rows + i]
    }

    /// Mutable element `(i, j)`.
    #[inline]
    pub fn at_mut(&mut self, i: usize, j: usize) -> &mut T {
        assert!(i < self.rows, "row index {} out of range", i);
        assert!(j < self.cols, "column index {} out of range", j);
        &mut self.data[j * self.rows + i]
    }

    /// Reset all elements to zero.
    pub fn zero(&mut self) {
        self.data.fill(T::zero());
    }

    /// Conjugate transpose.
    pub fn adjoint(&self) -> Self {
        let mut b = Self::zeros(self.cols, self.rows);
        for j in 0..self.cols {
            for i in 0..self.rows {
                *b.at_mut(j, i) = self.at(i, j).conj();
            }
        }
        b
    }

    /// Transpose without conjugation.
    pub fn transpose(&self) -> Self {
        let mut b = Self::zeros(self.cols, self.rows);
        for j in 0..self.cols {
            for i in 0..self.rows {
                *b.at_mut(j, i) = self.at(i, j);
            }
        }
        b
    }

    /// Sum of the diagonal; requires a square matrix.
    pub fn trace(&self) -> T {
        assert_eq!(self.rows, self.cols, "trace requires a square matrix");
        let mut acc = T::zero();
        for i in 0..self.rows {
            acc += self.at(i, i);
        }
        acc
    }

    /// Frobenius norm.
    pub fn frobenius_norm(&self) -> f64 {
        self.data.iter().map(|x| x.abs_sqr()).sum::<f64>().sqrt()
    }

    /// Main diagonal, up to `min(rows, cols)` entries.
    pub fn diag(&self) -> Vec<T> {
        (0..self.rows.min(self.cols)).map(|i| self.at(i, i)).collect()
    }

    /// Copy of row `i`.
    pub fn row(&self, i: usize) -> Vec<T> {
        (0..self.cols).map(|j| self.at(i, j)).collect()
    }

    /// Copy of column `j`.
    pub fn col(&self, j: usize) -> Vec<T> {
        (0..self.rows).map(|i| self.at(i, j)).collect()
    }

    /// View as a faer matrix (zero-copy; both sides are column-major).
    pub fn as_faer_mat(&self) -> MatRef<'_, T> {
        MatRef::from_column_major_slice(&self.data, self.rows, self.cols)
    }

    /// Copy a faer matrix into an owned [`Matrix`].
    pub fn from_faer_mat(mat: MatRef<'_, T>) -> Self {
        let rows = mat.nrows();
        let cols = mat.ncols();
        let mut data = Vec::with_capacity(rows * cols);
        for j in 0..cols {
            for i in 0..rows {
                data.push(mat[(i, j)]);
            }
        }
        Self { rows, cols, data }
    }

    /// Matrix product `A · B` via the faer backend.
    pub fn mat_mul(a: &Self, b: &Self) -> Self {
        assert_eq!(a.cols, b.rows, "inner dimensions must agree");
        let c: Mat<T> = a.as_faer_mat() * b.as_faer_mat();
        Self::from_faer_mat(c.as_ref())
    }

    /// Adjoint-contracting product `A† · B`.
    pub fn mult_atb(a: &Self, b: &Self) -> Self {
        assert_eq!(a.rows, b.rows, "row counts must agree");
        let mut c = Self::zeros(a.cols, b.cols);
        for j in 0..b.cols {
            for i in 0..a.cols {
                let mut acc = T::zero();
                for k in 0..a.rows {
                    acc += a.at(k, i).conj() * b.at(k, j);
                }
                *c.at_mut(i, j) = acc;
            }
        }
        c
    }

    /// Frobenius norm of `A − B`.
    pub fn residual(a: &Self, b: &Self) -> f64 {
        assert_eq!(a.rows, b.rows, "row counts must agree");
        assert_eq!(a.cols, b.cols, "column counts must agree");
        a.data
            .iter()
            .zip(b.data.iter())
            .map(|(&x, &y)| (x - y).abs_sqr())
            .sum::<f64>()
            .sqrt()
    }

    /// Copy `A` with `eps · exp(−a_ii / eps)` added along the diagonal,
    /// keeping near-singular overlap matrices invertible.
    pub fn regularize(&self, eps: f64) -> Self {
        let mut b = self.clone();
        for i in 0..self.rows.min(self.cols) {
            let a_ii = self.at(i, i);
            *b.at_mut(i, i) = a_ii + T::from_f64(eps) * T::from_f64((-a_ii.re() / eps).exp());
        }
        b
    }

    /// Write the binary record: `"MATR"`, rows, columns, element size,
    /// then the column-major payload.
    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<(), TensorError> {
        write_magic(w, &MAGIC)?;
        write_i32(w, self.rows as i32)?;
        write_i32(w, self.cols as i32)?;
        write_i32(w, T::ELEMENT_SIZE as i32)?;
        for x in &self.data {
            x.write_le(w)?;
        }
        Ok(())
    }

    /// Read a binary record written by [`write_to`](Matrix::write_to).
    pub fn read_from<R: Read>(r: &mut R) -> Result<Self, TensorError> {
        expect_magic(r, &MAGIC)?;
        let rows = read_i32(r)? as usize;
        let cols = read_i32(r)? as usize;
        if rows == 0 || cols == 0 {
            return Err(TensorError::ShapeMismatch {
                expected: 1,
                actual: 0,
            });
        }
        let size = read_i32(r)? as usize;
        if size != T::ELEMENT_SIZE {
            return Err(TensorError::ElementSizeMismatch {
                expected: T::ELEMENT_SIZE,
                actual: size,
            });
        }
        let mut data = Vec::with_capacity(rows * cols);
        for _ in 0..rows * cols {
            data.push(T::read_le(r)?);
        }
        Self::from_vec(rows, cols, data)
    }
}

impl Matrix<f64> {
    /// Promote to complex elements. Mixing a real matrix into a complex
    /// mode multiplication goes through this explicit conversion.
    pub fn to_c64(&self) -> Matrix<crate::scalar::c64> {
        Matrix {
            rows: self.rows,
            cols: self.cols,
            data: self
                .data
                .iter()
                .map(|&x| crate::scalar::c64::new(x, 0.0))
                .collect(),
        }
    }
}

impl<T: Scalar> Index<usize> for Matrix<T> {
    type Output = T;

    #[inline]
    fn index(&self, i: usize) -> &T {
        &self.data[i]
    }
}

impl<T: Scalar> IndexMut<usize> for Matrix<T> {
    #[inline]
    fn index_mut(&mut self, i: usize) -> &mut T {
        &mut self.data[i]
    }
}

impl<T: Scalar> AddAssign<&Matrix<T>> for Matrix<T> {
    fn add_assign(&mut self, other: &Matrix<T>) {
        assert_eq!(self.rows, other.rows, "row counts must agree");
        assert_eq!(self.cols, other.cols, "column counts must agree");
        for (x, &y) in self.data.iter_mut().zip(other.data.iter()) {
            *x += y;
        }
    }
}

impl<T: Scalar> SubAssign<&Matrix<T>> for Matrix<T> {
    fn sub_assign(&mut self, other: &Matrix<T>) {
        assert_eq!(self.rows, other.rows, "row counts must agree");
        assert_eq!(self.cols, other.cols, "column counts must agree");
        for (x, &y) in self.data.iter_mut().zip(other.data.iter()) {
            *x -= y;
        }
    }
}

impl<T: Scalar> MulAssign<T> for Matrix<T> {
    fn mul_assign(&mut self, a: T) {
        for x in &mut self.data {
            *x *= a;
        }
    }
}

impl<T: Scalar> DivAssign<T> for Matrix<T> {
    fn div_assign(&mut self, a: T) {
        for x in &mut self.data {
            *x /= a;
        }
    }
}

/// Diagnostic text form, one row per line.
impl<T: Scalar> fmt::Display for Matrix<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for i in 0..self.rows {
            for j in 0..self.cols {
                write!(f, "{:?} ", self.at(i, j))?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
