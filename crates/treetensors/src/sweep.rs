//! Overlap and reduced-density sweeps over two tree tensor states.
//!
//! Both algorithms assume the two states share one topology node for
//! node and visit the tree in its linear address order: children
//! strictly before parents for the bottom-up overlap sweep, the reverse
//! (excluding the root) for the top-down reduced-density sweep. Each
//! sweep allocates a fresh per-node output map and never mutates its
//! inputs, so independent sweeps over the same tree can run side by
//! side.

use std::io::{Read, Write};
use std::ops::{Index, IndexMut};

use rand::Rng;

use crate::contraction::{hole_product, mult_ab, mult_state_ab};
use crate::error::TensorError;
use crate::matrix::Matrix;
use crate::orthogonal::gram_schmidt;
use crate::scalar::{RandomNormal, Scalar};
use crate::tensor::Tensor;
use crate::tree::{NodeId, Tree};

/// One owned tensor per tree node, indexed by node address.
#[derive(Debug, Clone)]
pub struct TensorTree<T: Scalar> {
    tensors: Vec<Tensor<T>>,
}

impl<T: Scalar> TensorTree<T> {
    /// Zero tensors conforming to every node's shape.
    pub fn zeros(tree: &Tree) -> Self {
        Self {
            tensors: tree.iter().map(|node| Tensor::zeros(node.shape())).collect(),
        }
    }

    /// Number of per-node tensors.
    #[inline]
    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    /// Write every tensor's binary record in address order.
    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<(), TensorError> {
        for t in &self.tensors {
            t.write_to(w)?;
        }
        Ok(())
    }

    /// Read per-node tensors in address order, validating each against
    /// the node's shape.
    pub fn read_from<R: Read>(r: &mut R, tree: &Tree) -> Result<Self, TensorError> {
        let mut tensors = Vec::with_capacity(tree.num_nodes());
        for node in tree.iter() {
            let t = Tensor::read_from(r)?;
            if t.shape() != node.shape() {
                return Err(TensorError::ShapeMismatch {
                    expected: node.shape().total(),
                    actual: t.shape().total(),
                });
            }
            tensors.push(t);
        }
        Ok(Self { tensors })
    }
}

impl<T: RandomNormal> TensorTree<T> {
    /// Fill every node with seeded normal entries and orthonormalize its
    /// states, producing a valid random state on `tree`.
    ///
    /// Fails fatally if any node cannot be orthonormalized.
    pub fn random_with_rng<R: Rng>(tree: &Tree, rng: &mut R) -> Result<Self, TensorError> {
        let mut tensors = Vec::with_capacity(tree.num_nodes());
        for node in tree.iter() {
            let mut t = Tensor::randn_with_rng(node.shape(), rng);
            gram_schmidt(&mut t)?;
            tensors.push(t);
        }
        Ok(Self { tensors })
    }
}

impl<T: Scalar> Index<NodeId> for TensorTree<T> {
    type Output = Tensor<T>;

    #[inline]
    fn index(&self, address: NodeId) -> &Tensor<T> {
        &self.tensors[address]
    }
}

impl<T: Scalar> IndexMut<NodeId> for TensorTree<T> {
    #[inline]
    fn index_mut(&mut self, address: NodeId) -> &mut Tensor<T> {
        &mut self.tensors[address]
    }
}

/// One owned matrix per tree node, indexed by node address.
#[derive(Debug, Clone)]
pub struct MatrixTree<T: Scalar> {
    matrices: Vec<Matrix<T>>,
}

impl<T: Scalar> MatrixTree<T> {
    /// Square zero matrices sized to every node's state count.
    pub fn zeros(tree: &Tree) -> Self {
        Self {
            matrices: tree
                .iter()
                .map(|node| Matrix::zeros(node.ntensor(), node.ntensor()))
                .collect(),
        }
    }

    /// Number of per-node matrices.
    #[inline]
    pub fn len(&self) -> usize {
        self.matrices.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.matrices.is_empty()
    }
}

impl<T: Scalar> Index<NodeId> for MatrixTree<T> {
    type Output = Matrix<T>;

    #[inline]
    fn index(&self, address: NodeId) -> &Matrix<T> {
        &self.matrices[address]
    }
}

impl<T: Scalar> IndexMut<NodeId> for MatrixTree<T> {
    #[inline]
    fn index_mut(&mut self, address: NodeId) -> &mut Matrix<T> {
        &mut self.matrices[address]
    }
}

/// Check that two states live on `tree` with identical per-node shapes.
/// With `allow_root_states` the trailing state count of the root may
/// differ (two bundles of different width can still overlap).
fn assert_topology<T: Scalar>(
    psi: &TensorTree<T>,
    chi: &TensorTree<T>,
    tree: &Tree,
    allow_root_states: bool,
) {
    assert_eq!(psi.len(), tree.num_nodes(), "bra does not match the tree");
    assert_eq!(chi.len(), tree.num_nodes(), "ket does not match the tree");
    for (addr, node) in tree.iter().enumerate() {
        let sp = psi[addr].shape();
        let sc = chi[addr].shape();
        let loose = allow_root_states && addr == tree.root_address();
        let conforms = |s: &crate::shape::TensorShape| {
            if loose {
                s.order() == node.shape().order()
                    && (0..s.order() - 1).all(|k| s.dim(k) == node.shape().dim(k))
            } else {
                s == node.shape()
            }
        };
        assert!(conforms(sp), "bra topology differs at node {}", addr);
        assert!(conforms(sc), "ket topology differs at node {}", addr);
    }
}

/// Bottom-up overlap sweep.
///
/// Visits nodes in contraction order; at each node the partner tensor is
/// folded with the already-computed child matrices, then the hole
/// product over the trailing state mode becomes this node's matrix. The
/// root entry is the global inner product between the two states (their
/// Gram matrix when `psi` and `chi` coincide).
pub fn dot_product<T: Scalar>(
    psi: &TensorTree<T>,
    chi: &TensorTree<T>,
    tree: &Tree,
) -> MatrixTree<T> {
    assert_topology(psi, chi, tree, true);
    let mut s = MatrixTree::zeros(tree);
    for (addr, node) in tree.iter().enumerate() {
        let mut chi_work = chi[addr].clone();
        for (k, &child) in node.child_ids().iter().enumerate() {
            chi_work = mult_ab(&s[child], &chi_work, k);
        }
        let state_mode = node.shape().order() - 1;
        s[addr] = hole_product(&psi[addr], &chi_work, state_mode);
    }
    s
}

/// Top-down reduced-density sweep.
///
/// Visits every non-root node in reverse contraction order and computes
/// its single-mode reduced-density (mean-field) matrix against the rest
/// of the tree. When `overlap` is supplied, every sibling's overlap
/// matrix is folded into the ket first (skipping this node's own slot)
/// to correct for non-orthonormal bases; when the parent is not the
/// root, the parent's own already-computed density is folded in
/// state-wise.
pub fn contraction<T: Scalar>(
    psi: &TensorTree<T>,
    chi: &TensorTree<T>,
    tree: &Tree,
    overlap: Option<&MatrixTree<T>>,
) -> MatrixTree<T> {
    assert_topology(psi, chi, tree, false);
    if let Some(s) = overlap {
        assert_eq!(s.len(), tree.num_nodes(), "overlap does not match the tree");
    }
    let root = tree.root_address();
    let mut rho = MatrixTree::zeros(tree);
    for addr in (0..root).rev() {
        let node = tree.node(addr);
        let parent_addr = node.parent().expect("non-root node has a parent");
        let parent = tree.node(parent_addr);
        let child_idx = node.child_index().expect("non-root node has a slot");

        let bra = &psi[parent_addr];
        let mut ket = chi[parent_addr].clone();
        if let Some(s) = overlap {
            for (k, &sibling) in parent.child_ids().iter().enumerate() {
                if k != child_idx {
                    ket = mult_ab(&s[sibling], &ket, k);
                }
            }
        }
        if parent_addr != root {
            ket = mult_state_ab(&rho[parent_addr], &ket);
        }
        rho[addr] = hole_product(bra, &ket, child_idx);
    }
    rho
}

/// Real diagonal of every per-node matrix: the occupancies of a
/// reduced-density tree. Diagnostics only.
pub fn occupancies<T: Scalar>(rho: &MatrixTree<T>) -> Vec<Vec<f64>> {
    (0..rho.len())
        .map(|addr| rho[addr].diag().iter().map(|x| x.re()).collect())
        .collect()
}
