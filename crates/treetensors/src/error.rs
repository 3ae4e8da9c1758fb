//! Error types for treetensors.

use thiserror::Error;

/// Errors that can occur in tensor and tree operations.
///
/// All of these are fatal for the operation that raised them; there is no
/// retry path inside this crate.
#[derive(Debug, Error)]
pub enum TensorError {
    /// Shape constructed from an empty dimension list.
    #[error("a shape needs at least one mode")]
    EmptyShape,

    /// Shape constructed with a zero-sized mode.
    #[error("mode {mode} has size zero")]
    ZeroDimension { mode: usize },

    /// Buffer length does not match the shape's total size.
    #[error("shape mismatch: expected {expected} elements, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    /// Mode index outside a shape's order.
    #[error("mode {mode} out of range for shape of order {order}")]
    ModeOutOfRange { mode: usize, order: usize },

    /// Gram-Schmidt failed to reach the acceptance threshold within the
    /// iteration budget.
    #[error("orthogonality loss: residual {residual:e} above acceptance {acceptance:e}")]
    OrthogonalityLoss { residual: f64, acceptance: f64 },

    /// Matrix inversion or linear solve hit a singular system.
    #[error("singular matrix in {operation}")]
    SingularMatrix { operation: &'static str },

    /// Eigendecomposition failure reported by the backend.
    #[error("eigendecomposition failed: {message}")]
    EigenError { message: String },

    /// SVD failure reported by the backend.
    #[error("SVD failed: {message}")]
    SvdError { message: String },

    /// Wrong magic tag at the start of a binary record.
    #[error("bad magic tag: expected {expected:?}, found {found:?}")]
    BadMagic { expected: [u8; 4], found: [u8; 4] },

    /// Element size recorded in a binary record does not match the
    /// element type being read.
    #[error("element size mismatch: record says {actual} bytes, expected {expected}")]
    ElementSizeMismatch { expected: usize, actual: usize },

    /// Leaf-mode reindexing map is not a bijection.
    #[error("leaf-mode mapping is not a bijection on 0..{num_modes}")]
    NonBijectiveMapping { num_modes: usize },

    /// Malformed tree topology text.
    #[error("tree topology parse error: {message}")]
    TopologyParse { message: String },

    /// Tree constructor given unusable parameters.
    #[error("invalid tree: {message}")]
    InvalidTree { message: String },

    /// Underlying I/O failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
