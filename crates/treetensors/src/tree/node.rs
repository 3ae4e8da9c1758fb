//! Tree nodes.

use crate::shape::TensorShape;
use crate::tree::leaf::Leaf;

/// Index of a node inside its [`Tree`](crate::tree::Tree)'s arena.
///
/// After every structural refresh the arena is stored in contraction
/// order, so a `NodeId` doubles as the node's address.
pub type NodeId = usize;

/// Payload distinguishing internal nodes from bottom nodes.
///
/// A node either has internal children or wraps exactly one physical
/// leaf; the two cases never mix. Callers dispatch on
/// [`Node::is_bottom`] rather than downcasting.
#[derive(Debug, Clone)]
pub enum Children {
    /// Ordered internal children, referenced by arena index.
    Nodes(Vec<NodeId>),
    /// Terminal payload of a bottom node.
    Leaf(Leaf),
}

/// One node of the tree: an ordered child list (or a leaf), the shape of
/// the tensor living on this node, and a non-owning back-reference to
/// the parent. Ownership flows strictly root → leaves through the
/// arena; the parent link is an index, never an owning edge.
#[derive(Debug, Clone)]
pub struct Node {
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Children,
    pub(crate) shape: TensorShape,
    /// Path of child indices from the root; empty for the root itself.
    pub(crate) position: Vec<usize>,
}

impl Node {
    /// Shape of the tensor this node carries. The leading modes equal
    /// the children's trailing state counts in order; the trailing mode
    /// is this node's own state count.
    #[inline]
    pub fn shape(&self) -> &TensorShape {
        &self.shape
    }

    /// This node's state count (trailing dimension of its shape).
    #[inline]
    pub fn ntensor(&self) -> usize {
        self.shape.ntensor()
    }

    /// Address of the parent; `None` for the root.
    #[inline]
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Whether this node wraps a leaf instead of internal children.
    #[inline]
    pub fn is_bottom(&self) -> bool {
        matches!(self.children, Children::Leaf(_))
    }

    /// Whether this node is the root.
    #[inline]
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Addresses of the internal children; empty for bottom nodes.
    #[inline]
    pub fn child_ids(&self) -> &[NodeId] {
        match &self.children {
            Children::Nodes(ids) => ids,
            Children::Leaf(_) => &[],
        }
    }

    /// Number of internal children.
    #[inline]
    pub fn num_children(&self) -> usize {
        self.child_ids().len()
    }

    /// The wrapped leaf.
    ///
    /// # Panics
    ///
    /// Panics when called on an internal node.
    pub fn leaf(&self) -> &Leaf {
        match &self.children {
            Children::Leaf(leaf) => leaf,
            Children::Nodes(_) => panic!("leaf() called on an internal node"),
        }
    }

    pub(crate) fn leaf_mut(&mut self) -> &mut Leaf {
        match &mut self.children {
            Children::Leaf(leaf) => leaf,
            Children::Nodes(_) => panic!("leaf_mut() called on an internal node"),
        }
    }

    /// Path of child indices from the root down to this node.
    #[inline]
    pub fn position(&self) -> &[usize] {
        &self.position
    }

    /// Depth below the root.
    #[inline]
    pub fn layer(&self) -> usize {
        self.position.len()
    }

    /// This node's index among its parent's children; `None` for the
    /// root.
    #[inline]
    pub fn child_index(&self) -> Option<usize> {
        self.position.last().copied()
    }
}
