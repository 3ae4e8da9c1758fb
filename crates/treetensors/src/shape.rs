//! Tensor shapes and the multi-index addressing scheme.
//!
//! A [`TensorShape`] is an ordered list of positive mode sizes; the last
//! mode conventionally counts the simultaneous states sharing one mode
//! structure. Elements are addressed column-major (mode 0 varies
//! fastest), so a flat index decomposes around mode `k` into a
//! before-block of size `before(k)`, an active slot in `dim(k)` and a
//! behind-block of size `after(k)`. Every contraction kernel in this
//! crate is written in terms of that decomposition.

use std::fmt;
use std::io::{Read, Write};

use crate::error::TensorError;
use crate::record::{expect_magic, read_i32, write_i32, write_magic};

const MAGIC: [u8; 4] = *b"TDIM";

/// Ordered mode sizes of a tensor, with the derived index-decomposition
/// constants cached.
///
/// Immutable value type: any resize goes through [`replace_dimension`]
/// and produces a new shape.
///
/// # Examples
///
/// ```
/// use treetensors::TensorShape;
///
/// let shape = TensorShape::new(&[4, 3, 2]).unwrap();
/// assert_eq!(shape.total(), 24);
/// assert_eq!(shape.before(1), 4);
/// assert_eq!(shape.after(1), 2);
/// assert_eq!(shape.ntensor(), 2);
/// ```
///
/// [`replace_dimension`]: TensorShape::replace_dimension
#[derive(Debug, Clone)]
pub struct TensorShape {
    dims: Vec<usize>,
    before: Vec<usize>,
    after: Vec<usize>,
    total: usize,
}

impl TensorShape {
    /// Build a shape from an ordered list of mode sizes.
    ///
    /// Rejects an empty list and zero-sized modes.
    pub fn new(dims: &[usize]) -> Result<Self, TensorError> {
        if dims.is_empty() {
            return Err(TensorError::EmptyShape);
        }
        for (mode, &d) in dims.iter().enumerate() {
            if d == 0 {
                return Err(TensorError::ZeroDimension { mode });
            }
        }
        let mut before = Vec::with_capacity(dims.len());
        let mut product = 1;
        for &d in dims {
            before.push(product);
            product *= d;
        }
        let total = product;
        let mut after = vec![1; dims.len()];
        let mut behind = 1;
        for k in (0..dims.len()).rev() {
            after[k] = behind;
            behind *= dims[k];
        }
        Ok(Self {
            dims: dims.to_vec(),
            before,
            after,
            total,
        })
    }

    /// Number of modes, including the trailing state mode.
    #[inline]
    pub fn order(&self) -> usize {
        self.dims.len()
    }

    /// Size of mode `k`.
    #[inline]
    pub fn dim(&self, k: usize) -> usize {
        self.dims[k]
    }

    /// All mode sizes in order.
    #[inline]
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Trailing state count (size of the last mode).
    #[inline]
    pub fn ntensor(&self) -> usize {
        *self.dims.last().expect("shape has at least one mode")
    }

    /// Elements per state: `total / ntensor`.
    #[inline]
    pub fn dim_part(&self) -> usize {
        self.total / self.ntensor()
    }

    /// Product of the mode sizes strictly preceding `k`.
    #[inline]
    pub fn before(&self, k: usize) -> usize {
        assert!(k < self.order(), "mode {} out of range", k);
        self.before[k]
    }

    /// Product of the mode sizes strictly following `k`.
    #[inline]
    pub fn after(&self, k: usize) -> usize {
        assert!(k < self.order(), "mode {} out of range", k);
        self.after[k]
    }

    /// Product of all mode sizes.
    #[inline]
    pub fn total(&self) -> usize {
        self.total
    }

    /// Decode a flat index into one sub-index per mode (mode 0 varies
    /// fastest).
    pub fn to_multi_index(&self, mut flat: usize) -> Vec<usize> {
        assert!(flat < self.total, "flat index {} out of range", flat);
        let mut idx = Vec::with_capacity(self.order());
        for &d in &self.dims {
            idx.push(flat % d);
            flat /= d;
        }
        idx
    }

    /// Encode one sub-index per mode into a flat index.
    pub fn to_flat_index(&self, idx: &[usize]) -> usize {
        assert_eq!(idx.len(), self.order(), "wrong number of sub-indices");
        let mut flat = 0;
        for (k, &i) in idx.iter().enumerate() {
            assert!(i < self.dims[k], "sub-index {} out of range in mode {}", i, k);
            flat += self.before[k] * i;
        }
        flat
    }

    /// Return a new shape with mode `k` resized to `new_size`.
    pub fn replace_dimension(&self, k: usize, new_size: usize) -> Result<Self, TensorError> {
        if k >= self.order() {
            return Err(TensorError::ModeOutOfRange {
                mode: k,
                order: self.order(),
            });
        }
        let mut dims = self.dims.clone();
        dims[k] = new_size;
        Self::new(&dims)
    }

    /// Write the binary record: `"TDIM"`, mode count, one `i32` per mode.
    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<(), TensorError> {
        write_magic(w, &MAGIC)?;
        write_i32(w, self.order() as i32)?;
        for &d in &self.dims {
            write_i32(w, d as i32)?;
        }
        Ok(())
    }

    /// Read a binary record written by [`write_to`](TensorShape::write_to).
    pub fn read_from<R: Read>(r: &mut R) -> Result<Self, TensorError> {
        expect_magic(r, &MAGIC)?;
        let order = read_i32(r)?;
        if order <= 0 {
            return Err(TensorError::EmptyShape);
        }
        let mut dims = Vec::with_capacity(order as usize);
        for _ in 0..order {
            dims.push(read_i32(r)? as usize);
        }
        Self::new(&dims)
    }
}

impl PartialEq for TensorShape {
    fn eq(&self, other: &Self) -> bool {
        self.dims == other.dims
    }
}

impl Eq for TensorShape {}

impl fmt::Display for TensorShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (k, d) in self.dims.iter().enumerate() {
            if k > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", d)?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_before_after_total() {
        let shape = TensorShape::new(&[2, 3, 4]).unwrap();
        assert_eq!(shape.before(0), 1);
        assert_eq!(shape.before(1), 2);
        assert_eq!(shape.before(2), 6);
        assert_eq!(shape.after(0), 12);
        assert_eq!(shape.after(1), 4);
        assert_eq!(shape.after(2), 1);
        for k in 0..shape.order() {
            assert_eq!(shape.before(k) * shape.dim(k) * shape.after(k), shape.total());
        }
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(TensorShape::new(&[]).is_err());
        assert!(TensorShape::new(&[2, 0, 3]).is_err());
    }

    #[test]
    fn test_index_mapping_roundtrip() {
        let shape = TensorShape::new(&[3, 4, 5]).unwrap();
        for flat in 0..shape.total() {
            let idx = shape.to_multi_index(flat);
            assert_eq!(shape.to_flat_index(&idx), flat);
        }
    }

    #[test]
    fn test_mode_zero_varies_fastest() {
        let shape = TensorShape::new(&[3, 4]).unwrap();
        assert_eq!(shape.to_multi_index(1), vec![1, 0]);
        assert_eq!(shape.to_multi_index(3), vec![0, 1]);
        assert_eq!(shape.to_flat_index(&[2, 1]), 5);
    }

    #[test]
    fn test_replace_dimension() {
        let shape = TensorShape::new(&[2, 3, 4]).unwrap();
        let grown = shape.replace_dimension(1, 5).unwrap();
        assert_eq!(grown.dims(), &[2, 5, 4]);
        // Original untouched.
        assert_eq!(shape.dims(), &[2, 3, 4]);
        assert!(shape.replace_dimension(3, 1).is_err());
        assert!(shape.replace_dimension(1, 0).is_err());
    }

    #[test]
    fn test_equality_is_structural() {
        let a = TensorShape::new(&[2, 3]).unwrap();
        let b = TensorShape::new(&[2, 3]).unwrap();
        let c = TensorShape::new(&[3, 2]).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_binary_roundtrip() {
        let shape = TensorShape::new(&[4, 1, 7, 3]).unwrap();
        let mut buf = Vec::new();
        shape.write_to(&mut buf).unwrap();
        // "TDIM" + order + 4 dims, all 4 bytes wide
        assert_eq!(buf.len(), 4 + 4 + 4 * 4);
        let back = TensorShape::read_from(&mut buf.as_slice()).unwrap();
        assert_eq!(back, shape);
    }

    #[test]
    fn test_bad_magic_is_fatal() {
        let shape = TensorShape::new(&[2, 2]).unwrap();
        let mut buf = Vec::new();
        shape.write_to(&mut buf).unwrap();
        buf[0] = b'X';
        match TensorShape::read_from(&mut buf.as_slice()) {
            Err(TensorError::BadMagic { .. }) => {}
            other => panic!("expected BadMagic, got {:?}", other),
        }
    }
}
