//! Compressed trie used for one HTTP method.
//!
//! Insertion walks the longest common byte prefix of the pattern and each
//! edge, splitting edges where the pattern diverges. Wildcards hang off the
//! node that ends with the `/` in front of them.
//!
//! ## Precedence
//!
//! - A static edge is tried before the wildcard of the same node. If the
//!   static branch dead-ends, lookup backtracks into the parameter.
//! - A parameter may share its parent with static children, so
//!   `/users/:id` and `/users/all` coexist.
//! - A catch-all may not: it owns its whole edge, and its parent cannot
//!   carry a handler of its own.
//! - Two wildcards with different names at one edge are rejected.

use std::mem;

use super::node::{Node, NodeId, NodeKind};
use super::params::Params;
use crate::error::RouteError;

const ROOT: NodeId = 0;

/// One piece of a parsed pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Piece<'p> {
    Static(&'p str),
    Param(&'p str),
    CatchAll(&'p str),
}

/// Split a pattern into literal runs and wildcards.
fn parse_pattern(pattern: &str) -> Result<Vec<Piece<'_>>, RouteError> {
    let invalid = |reason| RouteError::InvalidPattern {
        pattern: pattern.to_string(),
        reason,
    };
    if !pattern.starts_with('/') {
        return Err(invalid("path must begin with '/'"));
    }

    let bytes = pattern.as_bytes();
    let mut pieces = Vec::new();
    let mut literal_start = 0;
    let mut i = 0;
    while i < bytes.len() {
        let marker = bytes[i];
        if marker != b':' && marker != b'*' {
            i += 1;
            continue;
        }
        if bytes[i - 1] != b'/' {
            return Err(invalid("wildcards must start a path segment"));
        }

        let end = pattern[i..].find('/').map_or(bytes.len(), |p| i + p);
        let name = &pattern[i + 1..end];
        if name.is_empty() {
            return Err(RouteError::UnnamedWildcard {
                pattern: pattern.to_string(),
            });
        }
        if name.contains([':', '*']) {
            return Err(invalid("only one wildcard per path segment is allowed"));
        }

        if literal_start < i {
            pieces.push(Piece::Static(&pattern[literal_start..i]));
        }
        if marker == b':' {
            pieces.push(Piece::Param(name));
        } else {
            if end != bytes.len() {
                return Err(RouteError::CatchAllNotLast {
                    pattern: pattern.to_string(),
                });
            }
            pieces.push(Piece::CatchAll(name));
        }
        i = end;
        literal_start = end;
    }
    if literal_start < bytes.len() {
        pieces.push(Piece::Static(&pattern[literal_start..]));
    }
    Ok(pieces)
}

fn common_prefix(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}

/// Outcome of [`Tree::lookup`].
#[derive(Debug)]
pub struct Lookup<'t, T> {
    pub value: Option<&'t T>,
    /// Set on a miss when the path with its trailing slash added or removed
    /// would have matched.
    pub trailing_slash: bool,
}

/// Per-method compressed trie over route patterns.
#[derive(Debug)]
pub struct Tree<T> {
    nodes: Vec<Node<T>>,
}

impl<T> Default for Tree<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Tree<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::root()],
        }
    }

    /// Every registered value, in arena order.
    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.nodes.iter_mut().filter_map(|node| node.value.as_mut())
    }

    /// Register `value` under `pattern`.
    pub fn insert(&mut self, pattern: &str, value: T) -> Result<(), RouteError> {
        let pieces = parse_pattern(pattern)?;
        self.nodes[ROOT].priority += 1;

        let mut current = ROOT;
        for piece in pieces {
            current = match piece {
                Piece::Static(text) => self.insert_static(current, text.as_bytes(), pattern)?,
                Piece::Param(name) => {
                    self.insert_wildcard(current, NodeKind::Param, name, pattern)?
                }
                Piece::CatchAll(name) => {
                    self.insert_wildcard(current, NodeKind::CatchAll, name, pattern)?
                }
            };
        }

        if self.nodes[current].value.is_some() {
            return Err(RouteError::DuplicateHandler {
                pattern: pattern.to_string(),
            });
        }
        self.ensure_no_catch_all(current, pattern)?;
        self.nodes[current].value = Some(value);
        Ok(())
    }

    fn insert_static(
        &mut self,
        mut parent: NodeId,
        mut text: &[u8],
        pattern: &str,
    ) -> Result<NodeId, RouteError> {
        while let Some(&first) = text.first() {
            let Some(pos) = self.nodes[parent].child_position(first) else {
                self.ensure_no_catch_all(parent, pattern)?;
                let mut leaf = Node::literal(text);
                leaf.priority = 1;
                let child = self.push(leaf);
                let node = &mut self.nodes[parent];
                node.indices.push(first);
                node.children.push(child);
                let last = node.children.len() - 1;
                self.reorder(parent, last);
                return Ok(child);
            };

            let pos = self.bump_child(parent, pos);
            let child = self.nodes[parent].children[pos];
            let common = common_prefix(&self.nodes[child].path, text);
            if common < self.nodes[child].path.len() {
                self.split(child, common);
            }
            parent = child;
            text = &text[common..];
        }
        Ok(parent)
    }

    fn insert_wildcard(
        &mut self,
        parent: NodeId,
        kind: NodeKind,
        name: &str,
        pattern: &str,
    ) -> Result<NodeId, RouteError> {
        if let Some(existing) = self.nodes[parent].wildcard {
            let node = &self.nodes[existing];
            if node.kind != kind || node.name.as_deref() != Some(name) {
                return Err(RouteError::Conflict {
                    pattern: pattern.to_string(),
                    existing: String::from_utf8_lossy(&node.path).into_owned(),
                });
            }
            self.nodes[existing].priority += 1;
            return Ok(existing);
        }

        if kind == NodeKind::CatchAll {
            let node = &self.nodes[parent];
            if let Some(&first) = node.children.first() {
                return Err(RouteError::Conflict {
                    pattern: pattern.to_string(),
                    existing: String::from_utf8_lossy(&self.nodes[first].path).into_owned(),
                });
            }
            if node.value.is_some() {
                return Err(RouteError::Conflict {
                    pattern: pattern.to_string(),
                    existing: String::from_utf8_lossy(&node.path).into_owned(),
                });
            }
        }

        let mut wild = Node::wildcard(kind, name);
        wild.priority = 1;
        let id = self.push(wild);
        self.nodes[parent].wildcard = Some(id);
        Ok(id)
    }

    /// A catch-all owns its edge: nothing else may end at or branch off it.
    fn ensure_no_catch_all(&self, id: NodeId, pattern: &str) -> Result<(), RouteError> {
        match self.nodes[id].wildcard.map(|w| &self.nodes[w]) {
            Some(wild) if wild.kind == NodeKind::CatchAll => Err(RouteError::Conflict {
                pattern: pattern.to_string(),
                existing: String::from_utf8_lossy(&wild.path).into_owned(),
            }),
            _ => Ok(()),
        }
    }

    /// Cut `id` after `at` bytes; the remainder moves into a new child.
    fn split(&mut self, id: NodeId, at: usize) {
        let node = &mut self.nodes[id];
        let tail = Node {
            path: node.path.split_off(at),
            kind: NodeKind::Static,
            indices: mem::take(&mut node.indices),
            children: mem::take(&mut node.children),
            wildcard: node.wildcard.take(),
            priority: node.priority.saturating_sub(1),
            name: None,
            value: node.value.take(),
        };
        let first = tail.path[0];
        let tail_id = self.push(tail);
        let node = &mut self.nodes[id];
        node.indices = vec![first];
        node.children = vec![tail_id];
    }

    fn bump_child(&mut self, parent: NodeId, pos: usize) -> usize {
        let child = self.nodes[parent].children[pos];
        self.nodes[child].priority += 1;
        self.reorder(parent, pos)
    }

    /// Move a child ahead of lower-priority siblings.
    fn reorder(&mut self, parent: NodeId, mut pos: usize) -> usize {
        let priority = self.nodes[self.nodes[parent].children[pos]].priority;
        while pos > 0 {
            let previous = self.nodes[parent].children[pos - 1];
            if self.nodes[previous].priority >= priority {
                break;
            }
            let node = &mut self.nodes[parent];
            node.children.swap(pos - 1, pos);
            node.indices.swap(pos - 1, pos);
            pos -= 1;
        }
        pos
    }

    fn push(&mut self, node: Node<T>) -> NodeId {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    /// Find the value registered for `path`, appending captures to `params`.
    ///
    /// On a miss `params` is left as it was passed in.
    pub fn lookup<'t>(&'t self, path: &str, params: &mut Params) -> Lookup<'t, T> {
        let mark = params.len();
        if let Some(value) = self.find(ROOT, path, 0, params) {
            return Lookup {
                value: Some(value),
                trailing_slash: false,
            };
        }
        params.truncate(mark);
        Lookup {
            value: None,
            trailing_slash: self.has_slash_variant(path),
        }
    }

    fn has_slash_variant(&self, path: &str) -> bool {
        let mut scratch = Params::new();
        match path.strip_suffix('/') {
            Some("") => false,
            Some(stripped) => self.find(ROOT, stripped, 0, &mut scratch).is_some(),
            None => {
                let extended = format!("{path}/");
                self.find(ROOT, &extended, 0, &mut scratch).is_some()
            }
        }
    }

    /// `pos` is the offset into `path` right after `id`'s own fragment.
    fn find<'t>(
        &'t self,
        id: NodeId,
        path: &str,
        pos: usize,
        params: &mut Params,
    ) -> Option<&'t T> {
        let node = &self.nodes[id];
        let rest = &path.as_bytes()[pos..];

        let Some(&first) = rest.first() else {
            if node.value.is_some() {
                return node.value.as_ref();
            }
            // an empty remainder still satisfies a catch-all
            let wild = &self.nodes[node.wildcard?];
            if wild.kind == NodeKind::CatchAll {
                params.push(wild.name.clone()?, "");
                return wild.value.as_ref();
            }
            return None;
        };

        if let Some(i) = node.child_position(first) {
            let child_id = node.children[i];
            let child = &self.nodes[child_id];
            if rest.starts_with(&child.path) {
                let mark = params.len();
                if let Some(value) = self.find(child_id, path, pos + child.path.len(), params) {
                    return Some(value);
                }
                params.truncate(mark);
            }
        }

        let wild_id = node.wildcard?;
        let wild = &self.nodes[wild_id];
        let name = wild.name.clone()?;
        match wild.kind {
            NodeKind::Param => {
                let end = rest
                    .iter()
                    .position(|&b| b == b'/')
                    .map_or(path.len(), |p| pos + p);
                if end == pos {
                    return None;
                }
                let mark = params.len();
                params.push(name, &path[pos..end]);
                let found = self.find(wild_id, path, end, params);
                if found.is_none() {
                    params.truncate(mark);
                }
                found
            }
            NodeKind::CatchAll => {
                params.push(name, &path[pos..]);
                wild.value.as_ref()
            }
            NodeKind::Root | NodeKind::Static => None,
        }
    }
}
