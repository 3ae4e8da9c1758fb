//! Sparse subtree markers.
//!
//! A marker selects the ancestor closure of a set of physical modes and
//! assigns the selected nodes dense sparse addresses, so operators
//! acting on few modes can sweep only the relevant part of a tree.

use std::collections::{BTreeSet, HashMap};

use crate::tree::{NodeId, Tree};

/// Ancestor closure of a set of marked leaves, in address order, with a
/// dense sparse-address mapping.
#[derive(Debug, Clone)]
pub struct TreeMarker {
    addresses: Vec<NodeId>,
    sparse: HashMap<NodeId, usize>,
}

impl TreeMarker {
    /// Mark every node on a path from one of `modes`' bottom nodes to
    /// the root.
    ///
    /// With `tail` set the full closure is kept. Without it, the
    /// single-branch tail is cut: nodes strictly above the last ancestor
    /// with more than one active child are dropped, and that branching
    /// ancestor itself stays marked. A closure with no branching
    /// ancestor at all (a single marked mode) keeps only its bottom
    /// node.
    pub fn sparse(modes: &[usize], tree: &Tree, tail: bool) -> Self {
        let mut active: BTreeSet<NodeId> = BTreeSet::new();
        for &mode in modes {
            let mut addr = tree.leaf_address(mode);
            loop {
                active.insert(addr);
                match tree.node(addr).parent() {
                    Some(p) => addr = p,
                    None => break,
                }
            }
        }
        // Addresses ascend, so the closure is already in contraction
        // order (children before parents).
        let mut addresses: Vec<NodeId> = active.iter().copied().collect();

        if !tail && !addresses.is_empty() {
            let set: BTreeSet<NodeId> = active;
            let branching = addresses.iter().rposition(|&addr| {
                tree.node(addr)
                    .child_ids()
                    .iter()
                    .filter(|c| set.contains(c))
                    .count()
                    > 1
            });
            match branching {
                Some(i) => addresses.truncate(i + 1),
                None => addresses.truncate(1),
            }
        }

        let sparse = addresses
            .iter()
            .enumerate()
            .map(|(i, &addr)| (addr, i))
            .collect();
        Self { addresses, sparse }
    }

    /// Number of marked nodes.
    #[inline]
    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    /// Whether `address` is marked.
    #[inline]
    pub fn contains(&self, address: NodeId) -> bool {
        self.sparse.contains_key(&address)
    }

    /// Sparse index of a marked address.
    #[inline]
    pub fn sparse_index(&self, address: NodeId) -> Option<usize> {
        self.sparse.get(&address).copied()
    }

    /// Tree address of the `i`-th marked node.
    #[inline]
    pub fn address(&self, i: usize) -> NodeId {
        self.addresses[i]
    }

    /// Marked addresses in contraction order.
    pub fn iter(&self) -> std::slice::Iter<'_, NodeId> {
        self.addresses.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_closure() {
        let tree = Tree::balanced(4, 2, 2).unwrap();
        let marker = TreeMarker::sparse(&[0, 1, 2, 3], &tree, true);
        assert_eq!(marker.len(), tree.num_nodes());
        for (i, &addr) in marker.iter().enumerate() {
            assert_eq!(marker.sparse_index(addr), Some(i));
        }
    }

    #[test]
    fn test_partial_closure_keeps_ancestors() {
        let tree = Tree::balanced(4, 2, 2).unwrap();
        let marker = TreeMarker::sparse(&[0], &tree, true);
        // Bottom node, its parent, the root.
        assert_eq!(marker.len(), 3);
        assert!(marker.contains(tree.leaf_address(0)));
        assert!(marker.contains(tree.root_address()));
    }

    #[test]
    fn test_tail_cut_keeps_branching_ancestor() {
        let tree = Tree::balanced(4, 2, 2).unwrap();
        // Modes 0 and 1 share one parent; everything above that parent
        // is a single-branch tail.
        let marker = TreeMarker::sparse(&[0, 1], &tree, false);
        let parent = tree.node(tree.leaf_address(0)).parent().unwrap();
        assert_eq!(marker.len(), 3);
        assert!(marker.contains(parent));
        assert!(!marker.contains(tree.root_address()));
    }

    #[test]
    fn test_tail_cut_single_mode_keeps_bottom_only() {
        let tree = Tree::balanced(4, 2, 2).unwrap();
        let marker = TreeMarker::sparse(&[2], &tree, false);
        assert_eq!(marker.len(), 1);
        assert_eq!(marker.address(0), tree.leaf_address(2));
    }

    #[test]
    fn test_marked_addresses_are_contraction_ordered() {
        let tree = Tree::balanced(8, 2, 2).unwrap();
        let marker = TreeMarker::sparse(&[1, 5], &tree, true);
        for w in marker.addresses.windows(2) {
            assert!(w[0] < w[1]);
        }
    }
}
