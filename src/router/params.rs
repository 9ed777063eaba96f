use smallvec::SmallVec;
use std::sync::Arc;

/// Maximum number of path parameters before heap allocation.
/// Most REST APIs have ≤4 path params (e.g., /users/:id/posts/:post_id).
pub const MAX_INLINE_PARAMS: usize = 8;

/// Stack-allocated parameter storage for the hot path.
///
/// Param names are `Arc<str>` shared with the trie node that captured them;
/// values are per-request data cut from the URL.
pub type ParamVec = SmallVec<[(Arc<str>, String); MAX_INLINE_PARAMS]>;

/// Path parameters captured by one lookup, in pattern order.
///
/// Values are percent-decoded once at capture; `+` is left alone.
/// Duplicate names are kept; [`Params::get`] returns the first one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    inner: ParamVec,
}

impl Params {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Value of the first parameter called `name`.
    #[inline]
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.inner
            .iter()
            .find(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    /// Stores a captured segment, percent-decoded. A segment that does not
    /// decode to UTF-8 is kept as sent.
    pub fn push(&mut self, name: Arc<str>, raw: &str) {
        let value = match urlencoding::decode(raw) {
            Ok(decoded) => decoded.into_owned(),
            Err(_) => raw.to_string(),
        };
        self.inner.push((name, value));
    }

    pub fn truncate(&mut self, len: usize) {
        self.inner.truncate(len);
    }

    pub fn clear(&mut self) {
        self.inner.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner.iter().map(|(k, v)| (k.as_ref(), v.as_str()))
    }
}
