//! Shared primitives for the fixed binary records.
//!
//! All records are little-endian: a 4-byte magic tag, fixed-width `i32`
//! header fields, then the raw element payload. A wrong tag or element
//! size fails the read before any payload is consumed.

use std::io::{Read, Write};

use crate::error::TensorError;

pub(crate) fn write_magic<W: Write>(w: &mut W, magic: &[u8; 4]) -> Result<(), TensorError> {
    w.write_all(magic)?;
    Ok(())
}

pub(crate) fn expect_magic<R: Read>(r: &mut R, expected: &[u8; 4]) -> Result<(), TensorError> {
    let mut found = [0u8; 4];
    r.read_exact(&mut found)?;
    if &found != expected {
        return Err(TensorError::BadMagic {
            expected: *expected,
            found,
        });
    }
    Ok(())
}

pub(crate) fn write_i32<W: Write>(w: &mut W, value: i32) -> Result<(), TensorError> {
    w.write_all(&value.to_le_bytes())?;
    Ok(())
}

pub(crate) fn read_i32<R: Read>(r: &mut R) -> Result<i32, TensorError> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(i32::from_le_bytes(buf))
}
