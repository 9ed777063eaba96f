//! Arena-backed trie nodes.
//!
//! Nodes are owned by a [`Tree`](super::tree::Tree) and addressed by
//! [`NodeId`]. Splitting an edge moves fields from one arena slot into a
//! freshly pushed slot, so no node is ever aliased while it is mutated.

use std::sync::Arc;

/// Index of a node inside its tree's arena.
pub type NodeId = usize;

/// What kind of edge a node represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// The empty edge every tree starts from.
    Root,
    /// A literal byte fragment of the path.
    Static,
    /// `:name`, matches exactly one segment.
    Param,
    /// `*name`, matches the rest of the path.
    CatchAll,
}

/// One edge of a per-method compressed trie.
#[derive(Debug)]
pub struct Node<T> {
    /// Literal bytes for static edges, `:name` / `*name` for wildcards.
    /// Bytes rather than `str`: an edge may be split inside a multi-byte char.
    pub path: Vec<u8>,
    pub kind: NodeKind,
    /// First byte of every static child, parallel to `children`.
    pub indices: Vec<u8>,
    pub children: Vec<NodeId>,
    /// The single non-static child, if any.
    pub wildcard: Option<NodeId>,
    /// Number of routes passing through this node. Only orders `children`.
    pub priority: u32,
    /// Wildcard name, shared with every `Params` entry it produces.
    pub name: Option<Arc<str>>,
    /// Set only where a route ends.
    pub value: Option<T>,
}

impl<T> Node<T> {
    pub fn root() -> Self {
        Self::with_kind(Vec::new(), NodeKind::Root)
    }

    pub fn literal(path: &[u8]) -> Self {
        Self::with_kind(path.to_vec(), NodeKind::Static)
    }

    /// Build a wildcard node. `kind` must be `Param` or `CatchAll`.
    pub fn wildcard(kind: NodeKind, name: &str) -> Self {
        let marker = if kind == NodeKind::CatchAll { '*' } else { ':' };
        let mut node = Self::with_kind(format!("{marker}{name}").into_bytes(), kind);
        node.name = Some(Arc::from(name));
        node
    }

    fn with_kind(path: Vec<u8>, kind: NodeKind) -> Self {
        Self {
            path,
            kind,
            indices: Vec::new(),
            children: Vec::new(),
            wildcard: None,
            priority: 0,
            name: None,
            value: None,
        }
    }

    /// Position of the static child starting with `byte`.
    #[inline]
    pub fn child_position(&self, byte: u8) -> Option<usize> {
        self.indices.iter().position(|&b| b == byte)
    }
}
