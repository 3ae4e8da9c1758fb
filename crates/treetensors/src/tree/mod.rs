//! Rooted ordered tree of tensor shapes with stable linear addressing.
//!
//! The tree owns its nodes in an arena. After every structural change the
//! arena is renumbered into contraction order — descendants strictly
//! before ancestors, root last — so a node's address is simply its arena
//! index, and the sweep algorithms can walk `0..num_nodes()` without any
//! per-node iteration state. A second cache maps each physical mode
//! number to its bottom node.

mod leaf;
mod marker;
mod node;

pub use leaf::{BasisParams, Leaf};
pub use marker::TreeMarker;
pub use node::{Children, Node, NodeId};

use std::collections::HashMap;
use std::io::{Read, Write};

use crate::error::TensorError;
use crate::shape::TensorShape;

/// Rooted tree of nodes, each carrying a [`TensorShape`] whose leading
/// modes are its children's state counts and whose trailing mode is its
/// own state count.
///
/// # Examples
///
/// ```
/// use treetensors::Tree;
///
/// let tree = Tree::balanced(4, 4, 3).unwrap();
/// assert_eq!(tree.num_nodes(), 7);
/// assert_eq!(tree.num_leaves(), 4);
/// assert!(tree.is_working());
/// ```
#[derive(Debug, Clone)]
pub struct Tree {
    nodes: Vec<Node>,
    leaves: Vec<NodeId>,
    root: NodeId,
}

impl Tree {
    /// Build a close-to-balanced tree: `num_leaves` identical bottom
    /// nodes of primitive dimension `dim_leaves` are grouped pairwise,
    /// layer by layer, until one root remains (a trailing odd node
    /// passes through to the next layer). Every internal state count is
    /// `dim_nodes`; the root's is forced to 1. Leaf modes are labeled
    /// densely in contraction order.
    pub fn balanced(
        num_leaves: usize,
        dim_leaves: usize,
        dim_nodes: usize,
    ) -> Result<Self, TensorError> {
        Self::check_builder_args(num_leaves, dim_leaves, dim_nodes)?;
        let mut nodes = Vec::new();
        let mut current: Vec<NodeId> = (0..num_leaves)
            .map(|mode| {
                nodes.push(bottom_node(dim_leaves, mode, dim_nodes));
                nodes.len() - 1
            })
            .collect();

        while current.len() > 1 {
            let mut next = Vec::new();
            let n_groups = current.len() / 2;
            for g in 0..n_groups {
                let kids = vec![current[2 * g], current[2 * g + 1]];
                let id = nodes.len();
                for &k in &kids {
                    nodes[k].parent = Some(id);
                }
                nodes.push(internal_node(kids, dim_nodes));
                next.push(id);
            }
            // Remainder passes through to the next layer unchanged.
            for r in 2 * n_groups..current.len() {
                next.push(current[r]);
            }
            current = next;
        }

        let root = current[0];
        let mut tree = Self {
            nodes,
            leaves: Vec::new(),
            root,
        };
        tree.set_ntensor(root, 1);
        tree.update();
        tree.relabel_leaf_modes();
        Ok(tree)
    }

    /// Build an unbalanced "train": bottom node 0 pairs with bottom
    /// node 1, the result pairs with bottom node 2, and so on, yielding
    /// `2·num_leaves − 1` nodes. Internal state counts are `dim_nodes`;
    /// the root's is `dim_root`.
    pub fn train(
        num_leaves: usize,
        dim_leaves: usize,
        dim_nodes: usize,
        dim_root: usize,
    ) -> Result<Self, TensorError> {
        Self::check_builder_args(num_leaves, dim_leaves, dim_nodes)?;
        if dim_root == 0 {
            return Err(TensorError::InvalidTree {
                message: "root state count must be positive".into(),
            });
        }
        let mut nodes = Vec::new();
        nodes.push(bottom_node(dim_leaves, 0, dim_nodes));
        let mut head = 0;
        for mode in 1..num_leaves {
            nodes.push(bottom_node(dim_leaves, mode, dim_nodes));
            let bottom = nodes.len() - 1;
            let id = nodes.len();
            nodes[head].parent = Some(id);
            nodes[bottom].parent = Some(id);
            nodes.push(internal_node(vec![head, bottom], dim_nodes));
            head = id;
        }
        let mut tree = Self {
            nodes,
            leaves: Vec::new(),
            root: head,
        };
        tree.set_ntensor(head, dim_root);
        tree.update();
        tree.relabel_leaf_modes();
        Ok(tree)
    }

    fn check_builder_args(
        num_leaves: usize,
        dim_leaves: usize,
        dim_nodes: usize,
    ) -> Result<(), TensorError> {
        if num_leaves == 0 {
            return Err(TensorError::InvalidTree {
                message: "a tree needs at least one leaf".into(),
            });
        }
        if dim_leaves == 0 || dim_nodes == 0 {
            return Err(TensorError::InvalidTree {
                message: "leaf and node dimensions must be positive".into(),
            });
        }
        Ok(())
    }

    /// Number of nodes (bottom nodes included, leaves themselves not
    /// counted separately).
    #[inline]
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Number of physical modes.
    #[inline]
    pub fn num_leaves(&self) -> usize {
        self.leaves.len()
    }

    /// Node at `address` in contraction order.
    #[inline]
    pub fn node(&self, address: NodeId) -> &Node {
        &self.nodes[address]
    }

    /// Address of the root (always the last node).
    #[inline]
    pub fn root_address(&self) -> NodeId {
        self.root
    }

    /// Address of the bottom node carrying physical mode `mode`.
    #[inline]
    pub fn leaf_address(&self, mode: usize) -> NodeId {
        self.leaves[mode]
    }

    /// The leaf of physical mode `mode`.
    pub fn leaf(&self, mode: usize) -> &Leaf {
        self.nodes[self.leaves[mode]].leaf()
    }

    /// Nodes in contraction order (descendants before ancestors, root
    /// last).
    pub fn iter(&self) -> std::slice::Iter<'_, Node> {
        self.nodes.iter()
    }

    /// Remove the internal node at `parent`'s `i`-th child slot and
    /// splice its children directly under `parent` at the same position,
    /// preserving sibling order. Shapes, positions and addresses of the
    /// whole tree are refreshed afterwards.
    ///
    /// # Panics
    ///
    /// Panics if `parent` is a bottom node or the `i`-th child is not
    /// internal (contract violation).
    pub fn expand_child(&mut self, parent: NodeId, i: usize) {
        assert!(
            !self.nodes[parent].is_bottom(),
            "cannot expand below a bottom node"
        );
        let child = self.nodes[parent].child_ids()[i];
        assert!(
            !self.nodes[child].is_bottom(),
            "the expanded child must be internal"
        );
        let grandchildren = self.nodes[child].child_ids().to_vec();
        for &g in &grandchildren {
            self.nodes[g].parent = Some(parent);
        }
        if let Children::Nodes(kids) = &mut self.nodes[parent].children {
            kids.splice(i..=i, grandchildren);
        }
        // The removed intermediate is now unreachable; update() drops it.
        self.update();
    }

    /// Replace the non-root subtree rooted at `address` with `subtree`.
    /// Leaf modes are relabeled densely afterwards, and shapes,
    /// positions and addresses of the whole tree are refreshed.
    ///
    /// # Panics
    ///
    /// Panics if `address` is the root (contract violation).
    pub fn replace_node(&mut self, address: NodeId, subtree: Tree) {
        assert_ne!(
            address, self.root,
            "the root cannot be replaced; build a new tree instead"
        );
        let parent = self.nodes[address].parent.expect("non-root has a parent");
        let slot = self.nodes[parent]
            .child_ids()
            .iter()
            .position(|&c| c == address)
            .expect("parent and child agree");

        // Graft the subtree's arena behind ours, shifting its ids.
        let offset = self.nodes.len();
        let sub_root = offset + subtree.root;
        for mut node in subtree.nodes {
            node.parent = node.parent.map(|p| p + offset);
            if let Children::Nodes(kids) = &mut node.children {
                for k in kids {
                    *k += offset;
                }
            }
            self.nodes.push(node);
        }
        self.nodes[sub_root].parent = Some(parent);
        if let Children::Nodes(kids) = &mut self.nodes[parent].children {
            kids[slot] = sub_root;
        }
        // The old subtree is unreachable; update() drops it.
        self.update();
        self.relabel_leaf_modes();
    }

    /// Apply a bijection on leaf mode numbers.
    ///
    /// The map must assign every mode in `0..num_leaves` a distinct new
    /// mode in the same range; anything else is rejected as fatal.
    pub fn reindex_leaf_modes(&mut self, map: &HashMap<usize, usize>) -> Result<(), TensorError> {
        let n = self.num_leaves();
        let bad = || TensorError::NonBijectiveMapping { num_modes: n };
        if map.len() != n {
            return Err(bad());
        }
        let mut seen = vec![false; n];
        for (&from, &to) in map {
            if from >= n || to >= n || seen[to] {
                return Err(bad());
            }
            seen[to] = true;
        }
        for node in &mut self.nodes {
            if node.is_bottom() {
                let leaf = node.leaf_mut();
                leaf.mode = map[&leaf.mode];
            }
        }
        self.rebuild_leaf_cache();
        Ok(())
    }

    /// Post-order node sequence derived purely from the current
    /// structure (children left to right, parent afterwards).
    fn post_order(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![(self.root, 0usize)];
        while let Some((id, next_child)) = stack.pop() {
            let kids = self.nodes[id].child_ids();
            if next_child < kids.len() {
                stack.push((id, next_child + 1));
                stack.push((kids[next_child], 0));
            } else {
                order.push(id);
            }
        }
        order
    }

    /// Refresh the whole tree after a structural change: renumber the
    /// arena into contraction order (dropping unreachable nodes),
    /// recompute every shape bottom-up and every position top-down, and
    /// rebuild the leaf cache.
    pub fn update(&mut self) {
        let order = self.post_order();
        let mut new_id = vec![usize::MAX; self.nodes.len()];
        for (idx, &old) in order.iter().enumerate() {
            new_id[old] = idx;
        }

        let mut nodes = Vec::with_capacity(order.len());
        for &old in &order {
            let mut node = self.nodes[old].clone();
            node.parent = node.parent.map(|p| new_id[p]);
            if let Children::Nodes(kids) = &mut node.children {
                for k in kids {
                    *k = new_id[*k];
                }
            }
            nodes.push(node);
        }
        self.nodes = nodes;
        self.root = self.nodes.len() - 1;

        // Shapes bottom-up: children precede parents in the new order.
        for idx in 0..self.nodes.len() {
            let ntensor = self.nodes[idx].ntensor();
            let dims: Vec<usize> = match &self.nodes[idx].children {
                Children::Leaf(leaf) => vec![leaf.dim, ntensor],
                Children::Nodes(kids) => kids
                    .iter()
                    .map(|&k| self.nodes[k].ntensor())
                    .chain(std::iter::once(ntensor))
                    .collect(),
            };
            self.nodes[idx].shape =
                TensorShape::new(&dims).expect("node dimensions are positive");
        }

        // Positions top-down: parents follow their children in the
        // order, so walk it backwards.
        self.nodes[self.root].position = Vec::new();
        for idx in (0..self.nodes.len()).rev() {
            let kids = self.nodes[idx].child_ids().to_vec();
            let base = self.nodes[idx].position.clone();
            for (slot, k) in kids.into_iter().enumerate() {
                let mut p = base.clone();
                p.push(slot);
                self.nodes[k].position = p;
            }
        }

        self.rebuild_leaf_cache();
    }

    fn rebuild_leaf_cache(&mut self) {
        let count = self
            .nodes
            .iter()
            .filter(|n| n.is_bottom())
            .count();
        let mut leaves = vec![usize::MAX; count];
        for (addr, node) in self.nodes.iter().enumerate() {
            if node.is_bottom() {
                let mode = node.leaf().mode;
                assert!(mode < count, "leaf mode {} out of range", mode);
                assert_eq!(leaves[mode], usize::MAX, "duplicate leaf mode {}", mode);
                leaves[mode] = addr;
            }
        }
        self.leaves = leaves;
    }

    /// Relabel leaf modes densely in contraction order.
    fn relabel_leaf_modes(&mut self) {
        let mut mode = 0;
        for node in &mut self.nodes {
            if node.is_bottom() {
                node.leaf_mut().mode = mode;
                mode += 1;
            }
        }
        self.rebuild_leaf_cache();
    }

    fn set_ntensor(&mut self, id: NodeId, ntensor: usize) {
        let shape = &self.nodes[id].shape;
        self.nodes[id].shape = shape
            .replace_dimension(shape.order() - 1, ntensor)
            .expect("last mode always exists");
    }

    /// Consistency check used by tests and debugging, not by production
    /// mutation paths: addresses contiguous in contraction order,
    /// parent/child references mutually consistent, root last, shapes
    /// conforming, leaf cache aligned with mode numbers.
    pub fn is_working(&self) -> bool {
        if self.nodes.is_empty() || self.root != self.nodes.len() - 1 {
            log::warn!("root is not the last linearized node");
            return false;
        }
        for (addr, node) in self.nodes.iter().enumerate() {
            for (slot, &c) in node.child_ids().iter().enumerate() {
                if c >= addr {
                    log::warn!("child {} does not precede parent {}", c, addr);
                    return false;
                }
                if self.nodes[c].parent != Some(addr) {
                    log::warn!("parent/child connectivity broken at {}", addr);
                    return false;
                }
                let mut expected = node.position.clone();
                expected.push(slot);
                if self.nodes[c].position != expected {
                    log::warn!("position of node {} inconsistent with parent", c);
                    return false;
                }
            }
            match &node.children {
                Children::Leaf(leaf) => {
                    if node.shape.order() != 2 || node.shape.dim(0) != leaf.dim {
                        log::warn!("bottom node {} has a non-conforming shape", addr);
                        return false;
                    }
                }
                Children::Nodes(kids) => {
                    if node.shape.order() != kids.len() + 1 {
                        log::warn!("node {} shape order mismatches child count", addr);
                        return false;
                    }
                    for (slot, &c) in kids.iter().enumerate() {
                        if node.shape.dim(slot) != self.nodes[c].ntensor() {
                            log::warn!("node {} shape disagrees with child {}", addr, c);
                            return false;
                        }
                    }
                }
            }
            if (node.parent.is_none()) != (addr == self.root) {
                log::warn!("node {} has an inconsistent root flag", addr);
                return false;
            }
        }
        for (mode, &addr) in self.leaves.iter().enumerate() {
            if addr >= self.nodes.len()
                || !self.nodes[addr].is_bottom()
                || self.nodes[addr].leaf().mode != mode
            {
                log::warn!("leaf cache corrupted at mode {}", mode);
                return false;
            }
        }
        true
    }

    /// Write the topology text format: per node a depth-indented line
    /// `ntensor<TAB>-childCount` (bottom nodes use `-1` and then their
    /// leaf line `dim<TAB>mode`), followed by one basis-parameter line
    /// per leaf in mode order.
    pub fn write_topology<W: Write>(&self, w: &mut W) -> Result<(), TensorError> {
        self.write_node(w, self.root)?;
        for mode in 0..self.num_leaves() {
            let par = self.leaf(mode).par;
            writeln!(w, "{} {} {} {}", par.omega, par.r0, par.wfr0, par.wfomega)?;
        }
        Ok(())
    }

    fn write_node<W: Write>(&self, w: &mut W, id: NodeId) -> Result<(), TensorError> {
        let node = &self.nodes[id];
        for _ in 0..node.layer() {
            write!(w, "\t")?;
        }
        match &node.children {
            Children::Leaf(leaf) => {
                writeln!(w, "{}\t-1", node.ntensor())?;
                for _ in 0..node.layer() + 1 {
                    write!(w, "\t")?;
                }
                writeln!(w, "{}\t{}", leaf.dim, leaf.mode)?;
            }
            Children::Nodes(kids) => {
                writeln!(w, "{}\t-{}", node.ntensor(), kids.len())?;
                for &k in kids {
                    self.write_node(w, k)?;
                }
            }
        }
        Ok(())
    }

    /// Read the topology text format written by
    /// [`write_topology`](Tree::write_topology). Indentation is
    /// ignored; structure comes from the child counts alone.
    pub fn read_topology<R: Read>(r: &mut R) -> Result<Self, TensorError> {
        let mut text = String::new();
        r.read_to_string(&mut text)?;
        let tokens: Vec<&str> = text.split_whitespace().collect();
        let mut pos = 0;
        let mut nodes = Vec::new();
        let root = parse_node(&tokens, &mut pos, &mut nodes, None)?;
        let mut tree = Self {
            nodes,
            leaves: Vec::new(),
            root,
        };
        let n_leaves = tree.nodes.iter().filter(|n| n.is_bottom()).count();
        // One basis-parameter line per leaf, in mode order.
        for mode in 0..n_leaves {
            let mut par = [0.0f64; 4];
            for v in &mut par {
                *v = next_float(&tokens, &mut pos)?;
            }
            let node = tree
                .nodes
                .iter_mut()
                .find(|n| n.is_bottom() && n.leaf().mode == mode)
                .ok_or_else(|| TensorError::TopologyParse {
                    message: format!("no leaf with mode {}", mode),
                })?;
            node.leaf_mut().par = BasisParams {
                omega: par[0],
                r0: par[1],
                wfr0: par[2],
                wfomega: par[3],
            };
        }
        if pos != tokens.len() {
            return Err(TensorError::TopologyParse {
                message: format!("{} trailing tokens", tokens.len() - pos),
            });
        }
        tree.update();
        Ok(tree)
    }
}

fn bottom_node(dim_leaves: usize, mode: usize, ntensor: usize) -> Node {
    Node {
        parent: None,
        children: Children::Leaf(Leaf::new(dim_leaves, mode)),
        shape: TensorShape::new(&[dim_leaves, ntensor]).expect("positive dimensions"),
        position: Vec::new(),
    }
}

fn internal_node(kids: Vec<NodeId>, ntensor: usize) -> Node {
    // Leading dims are placeholders; update() recomputes them from the
    // children's state counts.
    let dims: Vec<usize> = kids.iter().map(|_| 1).chain(std::iter::once(ntensor)).collect();
    Node {
        parent: None,
        children: Children::Nodes(kids),
        shape: TensorShape::new(&dims).expect("positive dimensions"),
        position: Vec::new(),
    }
}

fn next_int(tokens: &[&str], pos: &mut usize) -> Result<i64, TensorError> {
    let tok = tokens.get(*pos).ok_or_else(|| TensorError::TopologyParse {
        message: "unexpected end of input".into(),
    })?;
    *pos += 1;
    tok.parse().map_err(|_| TensorError::TopologyParse {
        message: format!("expected an integer, found {:?}", tok),
    })
}

fn next_float(tokens: &[&str], pos: &mut usize) -> Result<f64, TensorError> {
    let tok = tokens.get(*pos).ok_or_else(|| TensorError::TopologyParse {
        message: "unexpected end of input".into(),
    })?;
    *pos += 1;
    tok.parse().map_err(|_| TensorError::TopologyParse {
        message: format!("expected a number, found {:?}", tok),
    })
}

fn parse_node(
    tokens: &[&str],
    pos: &mut usize,
    nodes: &mut Vec<Node>,
    parent: Option<NodeId>,
) -> Result<NodeId, TensorError> {
    let ntensor = next_int(tokens, pos)?;
    if ntensor <= 0 {
        return Err(TensorError::TopologyParse {
            message: format!("state count must be positive, found {}", ntensor),
        });
    }
    let marker = next_int(tokens, pos)?;
    if marker >= 0 {
        return Err(TensorError::TopologyParse {
            message: format!("expected a negative child count, found {}", marker),
        });
    }
    let n_children = (-marker) as usize;

    // Reserve this node's slot so children can reference it.
    let id = nodes.len();
    nodes.push(internal_node(Vec::new(), ntensor as usize));
    nodes[id].parent = parent;

    // Peek the first child's second field: non-negative means this is a
    // bottom node holding one leaf line.
    let mark = *pos;
    let dim = next_int(tokens, pos)?;
    let second = next_int(tokens, pos)?;
    if second >= 0 {
        if n_children != 1 {
            return Err(TensorError::TopologyParse {
                message: "a bottom node holds exactly one leaf".into(),
            });
        }
        if dim <= 0 {
            return Err(TensorError::TopologyParse {
                message: format!("leaf dimension must be positive, found {}", dim),
            });
        }
        nodes[id].children = Children::Leaf(Leaf::new(dim as usize, second as usize));
        return Ok(id);
    }
    // Internal node: rewind and parse the children recursively.
    *pos = mark;
    let mut kids = Vec::with_capacity(n_children);
    for _ in 0..n_children {
        kids.push(parse_node(tokens, pos, nodes, Some(id))?);
    }
    nodes[id].children = Children::Nodes(kids);
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_balanced_node_count() {
        // 4 leaves, fan-out 2: 4 bottom + 2 internal + 1 root = 7 nodes.
        let tree = Tree::balanced(4, 4, 3).unwrap();
        assert_eq!(tree.num_nodes(), 7);
        assert_eq!(tree.num_leaves(), 4);
        assert!(tree.is_working());
    }

    #[test]
    fn test_balanced_shapes() {
        let (n_leaf, n_node) = (4, 2);
        let top = TensorShape::new(&[n_node, n_node, 1]).unwrap();
        let upper = TensorShape::new(&[n_node, n_node, n_node]).unwrap();
        let bottom = TensorShape::new(&[n_leaf, n_node]).unwrap();
        for n_modes in 2..18 {
            let tree = Tree::balanced(n_modes, n_leaf, n_node).unwrap();
            assert!(tree.is_working());
            for node in tree.iter() {
                if node.is_root() {
                    assert_eq!(node.shape(), &top);
                } else if node.is_bottom() {
                    assert_eq!(node.shape(), &bottom);
                } else {
                    assert_eq!(node.shape(), &upper);
                }
            }
        }
    }

    #[test]
    fn test_single_leaf_tree() {
        let tree = Tree::balanced(1, 5, 3).unwrap();
        assert_eq!(tree.num_nodes(), 1);
        assert!(tree.is_working());
        assert_eq!(tree.node(0).shape().dims(), &[5, 1]);
    }

    #[test]
    fn test_odd_leaf_count_passes_remainder_through() {
        let tree = Tree::balanced(5, 2, 2).unwrap();
        assert!(tree.is_working());
        assert_eq!(tree.num_leaves(), 5);
    }

    #[test]
    fn test_train_node_count() {
        let tree = Tree::train(12, 4, 2, 6).unwrap();
        assert_eq!(tree.num_nodes(), 2 * 12 - 1);
        assert!(tree.is_working());
        assert_eq!(tree.node(tree.root_address()).ntensor(), 6);
    }

    #[test]
    fn test_addresses_are_contraction_ordered() {
        let tree = Tree::balanced(8, 2, 2).unwrap();
        for (addr, node) in tree.iter().enumerate() {
            for &c in node.child_ids() {
                assert!(c < addr);
            }
        }
        assert!(tree.node(tree.root_address()).is_root());
    }

    #[test]
    fn test_leaf_cache_matches_modes() {
        let tree = Tree::balanced(6, 3, 2).unwrap();
        for mode in 0..tree.num_leaves() {
            assert_eq!(tree.leaf(mode).mode, mode);
            assert_eq!(tree.leaf(mode).dim, 3);
        }
    }

    #[test]
    fn test_expand_child_keeps_tree_working() {
        let mut tree = Tree::balanced(4, 4, 3).unwrap();
        let root = tree.root_address();
        let child = tree.node(root).child_ids()[0];
        let grandchildren = tree.node(child).num_children();
        tree.expand_child(root, 0);
        assert!(tree.is_working());
        assert_eq!(tree.num_nodes(), 6);
        let root = tree.root_address();
        assert_eq!(tree.node(root).num_children(), grandchildren + 1);
        // The root shape follows the new child list.
        assert_eq!(tree.node(root).shape().order(), grandchildren + 2);
    }

    #[test]
    #[should_panic(expected = "must be internal")]
    fn test_expand_bottom_child_is_fatal() {
        let mut tree = Tree::balanced(2, 4, 3).unwrap();
        let root = tree.root_address();
        tree.expand_child(root, 0);
    }

    #[test]
    fn test_replace_node_keeps_tree_working() {
        let mut tree = Tree::balanced(4, 4, 3).unwrap();
        let root = tree.root_address();
        let target = tree.node(root).child_ids()[1];
        let subtree = Tree::balanced(3, 4, 3).unwrap();
        tree.replace_node(target, subtree);
        assert!(tree.is_working());
        assert_eq!(tree.num_leaves(), 5);
        // 2 original bottoms + 1 internal + grafted (3 bottoms + 2) + root
        assert_eq!(tree.num_nodes(), 9);
    }

    #[test]
    fn test_reindex_leaf_modes() {
        let n_modes = 9;
        let mut tree = Tree::balanced(n_modes, 2, 4).unwrap();
        let map: HashMap<usize, usize> =
            (0..n_modes).map(|k| (k, n_modes - 1 - k)).collect();
        tree.reindex_leaf_modes(&map).unwrap();
        assert!(tree.is_working());
        let mut seen: Vec<usize> = tree
            .iter()
            .filter(|n| n.is_bottom())
            .map(|n| n.leaf().mode)
            .collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..n_modes).collect::<Vec<_>>());
    }

    #[test]
    fn test_reindex_rejects_non_bijection() {
        let mut tree = Tree::balanced(4, 2, 2).unwrap();
        let map: HashMap<usize, usize> = (0..4).map(|k| (k, 0)).collect();
        assert!(matches!(
            tree.reindex_leaf_modes(&map),
            Err(TensorError::NonBijectiveMapping { .. })
        ));
        let short: HashMap<usize, usize> = [(0, 1), (1, 0)].into_iter().collect();
        assert!(tree.reindex_leaf_modes(&short).is_err());
    }

    #[test]
    fn test_topology_roundtrip() {
        let mut tree = Tree::balanced(13, 4, 2).unwrap();
        // Give one leaf non-default parameters to cover the block.
        let addr = tree.leaves[5];
        tree.nodes[addr].leaf_mut().par = BasisParams {
            omega: 1.5,
            r0: -0.25,
            wfr0: 0.5,
            wfomega: 2.0,
        };
        let mut buf = Vec::new();
        tree.write_topology(&mut buf).unwrap();
        let back = Tree::read_topology(&mut buf.as_slice()).unwrap();
        assert!(back.is_working());
        assert_eq!(back.num_nodes(), tree.num_nodes());
        assert_eq!(back.num_leaves(), tree.num_leaves());
        for mode in 0..tree.num_leaves() {
            assert_eq!(back.leaf(mode).par, tree.leaf(mode).par);
        }
        for (a, b) in tree.iter().zip(back.iter()) {
            assert_eq!(a.shape(), b.shape());
        }
    }

    #[test]
    fn test_topology_rejects_garbage() {
        let text = "1\t-2\n\t2\t-1\n";
        assert!(Tree::read_topology(&mut text.as_bytes()).is_err());
    }
}
