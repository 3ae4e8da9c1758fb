//! Dense tensor with mode-decomposed multi-index addressing.

use std::fmt;
use std::io::{Read, Write};
use std::ops::{AddAssign, DivAssign, Index, IndexMut, MulAssign};

use rayon::prelude::*;

use crate::error::TensorError;
use crate::matrix::Matrix;
use crate::record::{expect_magic, read_i32, write_i32, write_magic};
use crate::scalar::Scalar;
use crate::shape::TensorShape;

const MAGIC: [u8; 4] = *b"TENS";

/// Dense tensor owning one contiguous buffer of `shape.total()` elements
/// in flat-index order (mode 0 varies fastest).
///
/// Value semantics: `Clone` duplicates the buffer, a move transfers it.
/// All mutation goes through the defined operators; the dimension
/// adjustments return new instances.
///
/// # Examples
///
/// ```
/// use treetensors::{Tensor, TensorShape};
///
/// let shape = TensorShape::new(&[4, 3]).unwrap();
/// let mut t = Tensor::<f64>::zeros(&shape);
/// *t.at_mut(2, 1) = 5.0;
/// assert_eq!(t[1 * 4 + 2], 5.0);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor<T: Scalar> {
    shape: TensorShape,
    data: Vec<T>,
}

impl<T: Scalar> Tensor<T> {
    /// Create a zero-initialized tensor over `shape`.
    pub fn zeros(shape: &TensorShape) -> Self {
        Self {
            shape: shape.clone(),
            data: vec![T::zero(); shape.total()],
        }
    }

    /// Create a tensor from a flat buffer in flat-index order.
    pub fn from_vec(shape: &TensorShape, data: Vec<T>) -> Result<Self, TensorError> {
        if data.len() != shape.total() {
            return Err(TensorError::ShapeMismatch {
                expected: shape.total(),
                actual: data.len(),
            });
        }
        Ok(Self {
            shape: shape.clone(),
            data,
        })
    }

    /// The tensor's shape.
    #[inline]
    pub fn shape(&self) -> &TensorShape {
        &self.shape
    }

    /// Flat buffer.
    #[inline]
    pub fn data(&self) -> &[T] {
        &self.data
    }

    /// Mutable flat buffer.
    #[inline]
    pub fn data_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Reset all elements to zero.
    pub fn zero(&mut self) {
        self.data.fill(T::zero());
    }

    /// Element `i` of state `n`: the buffer splits into `ntensor`
    /// contiguous blocks of `dim_part` elements each.
    #[inline]
    pub fn at(&self, i: usize, n: usize) -> T {
        let dim_part = self.shape.dim_part();
        assert!(i < dim_part, "part index {} out of range", i);
        assert!(n < self.shape.ntensor(), "state index {} out of range", n);
        self.data[n * dim_part + i]
    }

    /// Mutable variant of [`at`](Tensor::at).
    #[inline]
    pub fn at_mut(&mut self, i: usize, n: usize) -> &mut T {
        let dim_part = self.shape.dim_part();
        assert!(i < dim_part, "part index {} out of range", i);
        assert!(n < self.shape.ntensor(), "state index {} out of range", n);
        &mut self.data[n * dim_part + i]
    }

    fn mode_index(&self, i: usize, j: usize, k: usize, mode: usize, n: usize) -> usize {
        let shape = &self.shape;
        assert!(mode + 1 < shape.order(), "mode {} is not a part mode", mode);
        let before = shape.before(mode);
        let active = shape.dim(mode);
        let behind = shape.after(mode) / shape.ntensor();
        assert!(i < before, "before index {} out of range", i);
        assert!(j < active, "active index {} out of range", j);
        assert!(k < behind, "behind index {} out of range", k);
        assert!(n < shape.ntensor(), "state index {} out of range", n);
        n * shape.dim_part() + k * before * active + j * before + i
    }

    /// Element addressed by the decomposition around one mode:
    /// before-block `i`, active slot `j`, behind-block `k`, state `n`.
    #[inline]
    pub fn at_mode(&self, i: usize, j: usize, k: usize, mode: usize, n: usize) -> T {
        self.data[self.mode_index(i, j, k, mode, n)]
    }

    /// Mutable variant of [`at_mode`](Tensor::at_mode).
    #[inline]
    pub fn at_mode_mut(&mut self, i: usize, j: usize, k: usize, mode: usize, n: usize) -> &mut T {
        let idx = self.mode_index(i, j, k, mode, n);
        &mut self.data[idx]
    }

    fn hole2_index(
        &self,
        bef: usize,
        i: usize,
        mid: usize,
        j: usize,
        beh: usize,
        mode1: usize,
        mode2: usize,
        n: usize,
    ) -> usize {
        let shape = &self.shape;
        assert!(mode1 < mode2, "hole modes must be ordered");
        assert!(mode2 + 1 < shape.order(), "mode {} is not a part mode", mode2);
        let before1 = shape.before(mode1);
        let active1 = shape.dim(mode1);
        let before2 = shape.before(mode2);
        let active2 = shape.dim(mode2);
        let mid_max = before2 / (before1 * active1);
        let behind2 = shape.after(mode2) / shape.ntensor();
        assert!(bef < before1, "before index {} out of range", bef);
        assert!(i < active1, "first active index {} out of range", i);
        assert!(mid < mid_max, "mid index {} out of range", mid);
        assert!(j < active2, "second active index {} out of range", j);
        assert!(beh < behind2, "behind index {} out of range", beh);
        assert!(n < shape.ntensor(), "state index {} out of range", n);
        n * shape.dim_part()
            + beh * before2 * active2
            + j * before2
            + mid * before1 * active1
            + i * before1
            + bef
    }

    /// Element addressed by the double-hole decomposition around two
    /// distinct modes `mode1 < mode2`: before-block `bef`, first active
    /// slot `i`, mid-block `mid`, second active slot `j`, behind-block
    /// `beh`, state `n`.
    #[inline]
    #[allow(clippy::too_many_arguments)]
    pub fn at_hole2(
        &self,
        bef: usize,
        i: usize,
        mid: usize,
        j: usize,
        beh: usize,
        mode1: usize,
        mode2: usize,
        n: usize,
    ) -> T {
        self.data[self.hole2_index(bef, i, mid, j, beh, mode1, mode2, n)]
    }

    /// Elementwise (Hadamard) product of two same-shaped tensors.
    pub fn hadamard(a: &Self, b: &Self) -> Self {
        assert_eq!(a.shape, b.shape, "hadamard requires equal shapes");
        let data = a
            .data
            .iter()
            .zip(b.data.iter())
            .map(|(&x, &y)| x * y)
            .collect();
        Self {
            shape: a.shape.clone(),
            data,
        }
    }

    /// `self += coeff * other`.
    pub fn add_scaled(&mut self, other: &Self, coeff: T) {
        assert_eq!(
            self.shape.total(),
            other.shape.total(),
            "add_scaled requires equal totals"
        );
        for (x, &y) in self.data.iter_mut().zip(other.data.iter()) {
            *x += coeff * y;
        }
    }

    /// Elementwise complex conjugate.
    pub fn conj(&self) -> Self {
        Self {
            shape: self.shape.clone(),
            data: self.data.iter().map(|&x| x.conj()).collect(),
        }
    }


    /// Per-state-pair inner product matrix
    /// `S[m, n] = Σ_i conj(self[i, m]) · other[i, n]`,
    /// conjugate-linear in `self`. The two tensors may carry different
    /// state counts but must share `dim_part`. Output cells are computed
    /// in parallel.
    pub fn gram(&self, other: &Self) -> Matrix<T> {
        let npart = self.shape.dim_part();
        assert_eq!(
            npart,
            other.shape.dim_part(),
            "gram requires matching per-state sizes"
        );
        let mmax = self.shape.ntensor();
        let nmax = other.shape.ntensor();
        let mut s = Matrix::zeros(mmax, nmax);
        let a = &self.data;
        let b = &other.data;
        s.data_mut()
            .par_chunks_mut(mmax)
            .enumerate()
            .for_each(|(n, col)| {
                for (m, cell) in col.iter_mut().enumerate() {
                    let mut acc = T::zero();
                    for i in 0..npart {
                        acc += a[m * npart + i].conj() * b[n * npart + i];
                    }
                    *cell = acc;
                }
            });
        s
    }

    /// Return a tensor with mode `mode` resized to `active`, zero-padding
    /// new slots. Shrinking drops data and does not preserve the norm.
    pub fn adjust_active_dim(&self, active: usize, mode: usize) -> Result<Self, TensorError> {
        let shape = &self.shape;
        if mode + 1 >= shape.order() {
            return Err(TensorError::ModeOutOfRange {
                mode,
                order: shape.order().saturating_sub(1),
            });
        }
        let old_active = shape.dim(mode);
        if active < old_active {
            log::debug!(
                "shrinking mode {} from {} to {}: truncation is not norm-preserving",
                mode,
                old_active,
                active
            );
        }
        let new_shape = shape.replace_dimension(mode, active)?;
        let mut out = Self::zeros(&new_shape);
        let before = shape.before(mode);
        let behind = shape.after(mode) / shape.ntensor();
        let min_active = active.min(old_active);
        for n in 0..shape.ntensor() {
            for k in 0..behind {
                for j in 0..min_active {
                    for i in 0..before {
                        *out.at_mode_mut(i, j, k, mode, n) = self.at_mode(i, j, k, mode, n);
                    }
                }
            }
        }
        Ok(out)
    }

    /// Return a tensor with the trailing state count resized to `n`.
    /// New states are zero; truncated states are dropped.
    pub fn adjust_state_dim(&self, n: usize) -> Result<Self, TensorError> {
        let shape = &self.shape;
        let new_shape = shape.replace_dimension(shape.order() - 1, n)?;
        let mut out = Self::zeros(&new_shape);
        let dim_part = shape.dim_part();
        let keep = n.min(shape.ntensor());
        for m in 0..keep {
            for i in 0..dim_part {
                *out.at_mut(i, m) = self.at(i, m);
            }
        }
        Ok(out)
    }

    /// Resize every mode to match `new_shape` (same order required).
    pub fn adjust_dimensions(&self, new_shape: &TensorShape) -> Result<Self, TensorError> {
        if new_shape.order() != self.shape.order() {
            return Err(TensorError::ShapeMismatch {
                expected: self.shape.order(),
                actual: new_shape.order(),
            });
        }
        let mut out = self.clone();
        for k in 0..new_shape.order() - 1 {
            out = out.adjust_active_dim(new_shape.dim(k), k)?;
        }
        out.adjust_state_dim(new_shape.ntensor())
    }

    /// Write the binary record: `"TENS"`, the shape record, the element
    /// size, then the raw payload in flat-index order.
    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<(), TensorError> {
        write_magic(w, &MAGIC)?;
        self.shape.write_to(w)?;
        write_i32(w, T::ELEMENT_SIZE as i32)?;
        for x in &self.data {
            x.write_le(w)?;
        }
        Ok(())
    }

    /// Read a binary record written by [`write_to`](Tensor::write_to).
    pub fn read_from<R: Read>(r: &mut R) -> Result<Self, TensorError> {
        expect_magic(r, &MAGIC)?;
        let shape = TensorShape::read_from(r)?;
        let size = read_i32(r)? as usize;
        if size != T::ELEMENT_SIZE {
            return Err(TensorError::ElementSizeMismatch {
                expected: T::ELEMENT_SIZE,
                actual: size,
            });
        }
        let mut data = Vec::with_capacity(shape.total());
        for _ in 0..shape.total() {
            data.push(T::read_le(r)?);
        }
        Self::from_vec(&shape, data)
    }
}

impl Tensor<f64> {
    /// Promote to complex elements. Mixing a real operand into a
    /// complex operation goes through this explicit conversion.
    pub fn to_c64(&self) -> Tensor<crate::scalar::c64> {
        Tensor {
            shape: self.shape.clone(),
            data: self
                .data
                .iter()
                .map(|&x| crate::scalar::c64::new(x, 0.0))
                .collect(),
        }
    }
}

/// `Σ_i conj(a[i, n]) · b[i, m]` for one state pair.
pub fn single_dot<T: Scalar>(a: &Tensor<T>, b: &Tensor<T>, n: usize, m: usize) -> T {
    let npart = a.shape().dim_part();
    assert_eq!(
        npart,
        b.shape().dim_part(),
        "single_dot requires matching per-state sizes"
    );
    let mut acc = T::zero();
    for i in 0..npart {
        acc += a.at(i, n).conj() * b.at(i, m);
    }
    acc
}

impl<T: Scalar> Index<usize> for Tensor<T> {
    type Output = T;

    #[inline]
    fn index(&self, i: usize) -> &T {
        &self.data[i]
    }
}

impl<T: Scalar> IndexMut<usize> for Tensor<T> {
    #[inline]
    fn index_mut(&mut self, i: usize) -> &mut T {
        &mut self.data[i]
    }
}

impl<T: Scalar> AddAssign<&Tensor<T>> for Tensor<T> {
    fn add_assign(&mut self, other: &Tensor<T>) {
        assert_eq!(
            self.shape.total(),
            other.shape.total(),
            "tensor addition requires equal totals"
        );
        for (x, &y) in self.data.iter_mut().zip(other.data.iter()) {
            *x += y;
        }
    }
}

impl<T: Scalar> MulAssign<T> for Tensor<T> {
    fn mul_assign(&mut self, a: T) {
        for x in &mut self.data {
            *x *= a;
        }
    }
}

impl<T: Scalar> DivAssign<T> for Tensor<T> {
    fn div_assign(&mut self, a: T) {
        for x in &mut self.data {
            *x /= a;
        }
    }
}

/// Diagnostic text form: one line per state. Not bit-exact; use the
/// binary record for storage.
impl<T: Scalar> fmt::Display for Tensor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for n in 0..self.shape.ntensor() {
            for i in 0..self.shape.dim_part() {
                write!(f, "{:?} ", self.at(i, n))?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
