//! Scalar trait for tensor element types.

use std::fmt::Debug;
use std::io::{self, Read, Write};
use std::ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Sub, SubAssign};

use faer_traits::ComplexField;
use rand::Rng;
use rand_distr::StandardNormal;

pub use faer::c64;

/// Trait for scalar types supported by treetensors.
///
/// Wraps faer's `ComplexField` (required by the linear-algebra adapters)
/// with the arithmetic, conjugation and byte-codec capabilities the
/// contraction kernels and the binary records need. Implemented for `f64`
/// and [`c64`]; the element type of every tensor is resolved at compile
/// time, never via runtime dispatch.
pub trait Scalar:
    ComplexField<Real = f64>
    + Copy
    + Debug
    + Default
    + PartialEq
    + Send
    + Sync
    + 'static
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
    + AddAssign
    + SubAssign
    + MulAssign
    + DivAssign
{
    /// Size of one element in the binary records, in bytes.
    const ELEMENT_SIZE: usize;

    /// Additive identity.
    fn zero() -> Self {
        Self::default()
    }

    /// Multiplicative identity.
    fn one() -> Self;

    /// Complex conjugate (identity for real scalars).
    fn conj(self) -> Self;

    /// Real part.
    fn re(self) -> f64;

    /// Squared modulus.
    fn abs_sqr(self) -> f64;

    /// Modulus.
    fn abs(self) -> f64 {
        self.abs_sqr().sqrt()
    }

    /// Embed a real number.
    fn from_f64(x: f64) -> Self;

    /// Check for NaN/infinity, used to detect ill-conditioned solves.
    fn is_finite(self) -> bool;

    /// Write one element in little-endian byte order.
    fn write_le<W: Write>(&self, w: &mut W) -> io::Result<()>;

    /// Read one element in little-endian byte order.
    fn read_le<R: Read>(r: &mut R) -> io::Result<Self>;
}

impl Scalar for f64 {
    const ELEMENT_SIZE: usize = 8;

    fn one() -> Self {
        1.0
    }

    fn conj(self) -> Self {
        self
    }

    fn re(self) -> f64 {
        self
    }

    fn abs_sqr(self) -> f64 {
        self * self
    }

    fn from_f64(x: f64) -> Self {
        x
    }

    fn is_finite(self) -> bool {
        f64::is_finite(self)
    }

    fn write_le<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(&self.to_le_bytes())
    }

    fn read_le<R: Read>(r: &mut R) -> io::Result<Self> {
        let mut buf = [0u8; 8];
        r.read_exact(&mut buf)?;
        Ok(f64::from_le_bytes(buf))
    }
}

impl Scalar for c64 {
    const ELEMENT_SIZE: usize = 16;

    fn one() -> Self {
        c64::new(1.0, 0.0)
    }

    fn conj(self) -> Self {
        c64::new(self.re, -self.im)
    }

    fn re(self) -> f64 {
        self.re
    }

    fn abs_sqr(self) -> f64 {
        self.re * self.re + self.im * self.im
    }

    fn from_f64(x: f64) -> Self {
        c64::new(x, 0.0)
    }

    fn is_finite(self) -> bool {
        self.re.is_finite() && self.im.is_finite()
    }

    fn write_le<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(&self.re.to_le_bytes())?;
        w.write_all(&self.im.to_le_bytes())
    }

    fn read_le<R: Read>(r: &mut R) -> io::Result<Self> {
        let mut buf = [0u8; 8];
        r.read_exact(&mut buf)?;
        let re = f64::from_le_bytes(buf);
        r.read_exact(&mut buf)?;
        let im = f64::from_le_bytes(buf);
        Ok(c64::new(re, im))
    }
}

/// Trait for scalars that can be sampled from a standard normal
/// distribution, used by the random tensor constructors.
pub trait RandomNormal: Scalar {
    /// Sample a value from the standard normal distribution.
    fn sample_normal<R: Rng>(rng: &mut R) -> Self;
}

impl RandomNormal for f64 {
    fn sample_normal<R: Rng>(rng: &mut R) -> Self {
        rng.sample(StandardNormal)
    }
}

impl RandomNormal for c64 {
    fn sample_normal<R: Rng>(rng: &mut R) -> Self {
        // Standard complex normal: independent N(0, 1/2) parts so that
        // |z|^2 has mean 1.
        let scale = std::f64::consts::FRAC_1_SQRT_2;
        c64::new(
            rng.sample::<f64, _>(StandardNormal) * scale,
            rng.sample::<f64, _>(StandardNormal) * scale,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_one() {
        assert_eq!(<f64 as Scalar>::zero(), 0.0);
        assert_eq!(<f64 as Scalar>::one(), 1.0);
        assert_eq!(<c64 as Scalar>::zero(), c64::new(0.0, 0.0));
        assert_eq!(<c64 as Scalar>::one(), c64::new(1.0, 0.0));
    }

    #[test]
    fn test_conj() {
        let z = c64::new(1.0, 2.0);
        assert_eq!(Scalar::conj(z), c64::new(1.0, -2.0));
        assert_eq!(Scalar::conj(3.0_f64), 3.0);
    }

    #[test]
    fn test_abs_sqr() {
        assert_eq!(c64::new(3.0, 4.0).abs_sqr(), 25.0);
        assert_eq!(Scalar::abs(c64::new(3.0, 4.0)), 5.0);
    }

    #[test]
    fn test_byte_roundtrip_f64() {
        let mut buf = Vec::new();
        1.5_f64.write_le(&mut buf).unwrap();
        assert_eq!(buf.len(), <f64 as Scalar>::ELEMENT_SIZE);
        let back = f64::read_le(&mut buf.as_slice()).unwrap();
        assert_eq!(back, 1.5);
    }

    #[test]
    fn test_byte_roundtrip_c64() {
        let z = c64::new(-0.25, 7.0);
        let mut buf = Vec::new();
        z.write_le(&mut buf).unwrap();
        assert_eq!(buf.len(), <c64 as Scalar>::ELEMENT_SIZE);
        let back = c64::read_le(&mut buf.as_slice()).unwrap();
        assert_eq!(back, z);
    }
}
