//! treetensors - tree tensor network states over dense tensors.
//!
//! This crate represents several simultaneous high-order tensor states
//! as a hierarchical (tree tensor network) decomposition, the way
//! many-body quantum-dynamics codes do. Three tightly coupled layers:
//!
//! ```text
//! Layer 1: dense primitives
//!     → TensorShape, Tensor, Matrix, mode-wise contraction kernels
//!
//! Layer 2: tree topology
//!     → Tree / Node / Leaf with stable linear addressing
//!
//! Layer 3: sweeps
//!     → bottom-up overlap (dot_product), top-down reduced density
//!       (contraction) over two states sharing one topology
//! ```
//!
//! Dense linear algebra (eigendecomposition, SVD, QR, inversion, solve)
//! is delegated to faer through thin adapters in [`linalg`]; element
//! types are `f64` or [`c64`], chosen at compile time via the
//! [`Scalar`] trait.
//!
//! # Example
//!
//! ```
//! use rand::SeedableRng;
//! use rand::rngs::StdRng;
//! use treetensors::{dot_product, TensorTree, Tree};
//!
//! // A balanced tree over 4 physical modes of dimension 4, with 3
//! // states on every internal bond.
//! let tree = Tree::balanced(4, 4, 3).unwrap();
//! assert_eq!(tree.num_nodes(), 7);
//!
//! // A random orthonormal state on it: all overlap matrices are 1.
//! let mut rng = StdRng::seed_from_u64(1);
//! let psi = TensorTree::<f64>::random_with_rng(&tree, &mut rng).unwrap();
//! let s = dot_product(&psi, &psi, &tree);
//! let root = tree.root_address();
//! assert!((s[root].at(0, 0) - 1.0).abs() < 1e-10);
//! ```

pub mod contraction;
pub mod error;
pub mod linalg;
pub mod matrix;
pub mod orthogonal;
mod record;
pub mod scalar;
pub mod shape;
pub mod sweep;
pub mod tensor;
pub mod tree;

mod random;

pub use contraction::{
    double_hole_product, hole_product, mult_ab, mult_ab_into, mult_atb, mult_state_ab,
    mult_state_transposed,
};
pub use error::TensorError;
pub use matrix::Matrix;
pub use orthogonal::{gram_schmidt, project, project_orthogonal, project_out};
pub use scalar::{c64, RandomNormal, Scalar};
pub use shape::TensorShape;
pub use sweep::{contraction, dot_product, occupancies, MatrixTree, TensorTree};
pub use tensor::{single_dot, Tensor};
pub use tree::{BasisParams, Leaf, Node, NodeId, Tree, TreeMarker};
