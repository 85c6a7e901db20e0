//! Extension points for decorators that track entry order (access-ordered or
//! insertion-ordered views, eviction policies).

/// Callbacks invoked by [`HybridMap`](crate::HybridMap) after the structure
/// is consistent again.
///
/// Each callback fires exactly once per corresponding operation. Hooks only
/// observe; they cannot reach the map while it is being mutated.
pub trait EntryHooks<K, V> {
    /// An existing entry was read for update: a put that found its key, a
    /// replace, or a compute/merge that kept the entry.
    fn after_access(&mut self, _key: &K, _value: &V) {}

    /// A new entry was committed, after any resize it triggered. `evict` is
    /// false while the map is being populated by construction
    /// (`FromIterator`).
    fn after_insertion(&mut self, _evict: bool) {}

    /// An entry was unlinked from the table; it is dropped right after.
    fn after_removal(&mut self, _key: &K, _value: &V) {}
}

/// Default hook strategy: does nothing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NoHooks;

impl<K, V> EntryHooks<K, V> for NoHooks {}
