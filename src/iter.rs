//! Iterators over `HybridMap` and the detached fail-fast `Cursor`.

use core::iter::FusedIterator;
use core::marker::PhantomData;

use crate::error::MapError;
use crate::hooks::EntryHooks;
use crate::map::HybridMap;
use crate::node::{Node, NodeKey};
use crate::table::RawTable;

/// Iterator over `(&K, &V)` in bucket order.
pub struct Iter<'a, K, V> {
    table: &'a RawTable<K, V>,
    index: usize,
    next: Option<NodeKey>,
    remaining: usize,
    expected: u64,
}

impl<'a, K, V> Iter<'a, K, V> {
    pub(crate) fn new(table: &'a RawTable<K, V>) -> Self {
        let mut index = 0;
        let next = table.next_occupied(&mut index);
        Self {
            table,
            index,
            next,
            remaining: table.len(),
            expected: table.mod_count.get(),
        }
    }
}

impl<K, V> Clone for Iter<'_, K, V> {
    fn clone(&self) -> Self {
        Self {
            table: self.table,
            index: self.index,
            next: self.next,
            remaining: self.remaining,
            expected: self.expected,
        }
    }
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let n = self.next?;
        let table = self.table;
        debug_assert_eq!(table.mod_count.get(), self.expected);
        self.next = table.successor(n, &mut self.index);
        self.remaining -= 1;
        let node = &table.arena[n];
        Some((&node.key, &node.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}
impl<K, V> FusedIterator for Iter<'_, K, V> {}

/// Iterator over keys in bucket order.
pub struct Keys<'a, K, V> {
    pub(crate) inner: Iter<'a, K, V>,
}

impl<'a, K, V> Iterator for Keys<'a, K, V> {
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, _)| k)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Keys<'_, K, V> {}
impl<K, V> FusedIterator for Keys<'_, K, V> {}

/// Iterator over values in bucket order.
pub struct Values<'a, K, V> {
    pub(crate) inner: Iter<'a, K, V>,
}

impl<'a, K, V> Iterator for Values<'a, K, V> {
    type Item = &'a V;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, v)| v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Values<'_, K, V> {}
impl<K, V> FusedIterator for Values<'_, K, V> {}

/// Iterator over `(&K, &mut V)` in storage order.
pub struct IterMut<'a, K, V> {
    pub(crate) it: slotmap::basic::IterMut<'a, NodeKey, Node<K, V>>,
    pub(crate) _pd: PhantomData<&'a mut (K, V)>,
}

impl<'a, K, V> Iterator for IterMut<'a, K, V> {
    type Item = (&'a K, &'a mut V);

    fn next(&mut self) -> Option<Self::Item> {
        self.it.next().map(|(_, node)| (&node.key, &mut node.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.it.size_hint()
    }
}

impl<K, V> ExactSizeIterator for IterMut<'_, K, V> {}
impl<K, V> FusedIterator for IterMut<'_, K, V> {}

/// Iterator over `&mut V` in storage order.
pub struct ValuesMut<'a, K, V> {
    pub(crate) inner: IterMut<'a, K, V>,
}

impl<'a, K, V> Iterator for ValuesMut<'a, K, V> {
    type Item = &'a mut V;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, v)| v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for ValuesMut<'_, K, V> {}
impl<K, V> FusedIterator for ValuesMut<'_, K, V> {}

/// Owning iterator over `(K, V)` in storage order.
pub struct IntoIter<K, V> {
    pub(crate) it: slotmap::basic::IntoIter<NodeKey, Node<K, V>>,
}

impl<K, V> Iterator for IntoIter<K, V> {
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        self.it.next().map(|(_, node)| (node.key, node.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.it.size_hint()
    }
}

impl<K, V> ExactSizeIterator for IntoIter<K, V> {}
impl<K, V> FusedIterator for IntoIter<K, V> {}

/// Draining iterator returned by [`HybridMap::drain`]. The buckets are already
/// empty when it is created; entries not consumed are dropped with it.
pub struct Drain<'a, K, V> {
    pub(crate) it: slotmap::basic::Drain<'a, NodeKey, Node<K, V>>,
}

impl<K, V> Iterator for Drain<'_, K, V> {
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        self.it.next().map(|(_, node)| (node.key, node.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.it.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Drain<'_, K, V> {}

/// A fail-fast position in a map that does not borrow it.
///
/// Between steps the caller is free to touch the map. Any structural change
/// made by something other than [`Cursor::remove`] makes the next step fail
/// with [`MapError::ConcurrentModification`]; value updates are allowed.
///
/// ```
/// use hybrid_hashmap::HybridMap;
///
/// let mut map: HybridMap<u32, u32> = (0..10).map(|k| (k, k)).collect();
/// let mut cursor = map.cursor();
/// while let Some((k, _)) = cursor.next(&map).unwrap() {
///     if k % 2 == 0 {
///         cursor.remove(&mut map).unwrap();
///     }
/// }
/// assert_eq!(map.len(), 5);
/// ```
#[derive(Clone, Debug)]
pub struct Cursor {
    index: usize,
    next: Option<NodeKey>,
    current: Option<NodeKey>,
    expected: u64,
}

impl Cursor {
    pub(crate) fn new<K, V>(table: &RawTable<K, V>) -> Self {
        let mut index = 0;
        let next = table.next_occupied(&mut index);
        Self {
            index,
            next,
            current: None,
            expected: table.mod_count.get(),
        }
    }

    /// Whether a further entry was reachable at the last successful step.
    pub fn has_next(&self) -> bool {
        self.next.is_some()
    }

    /// Advance and return the next entry of `map`.
    pub fn next<'m, K, V, S, O, H>(
        &mut self,
        map: &'m HybridMap<K, V, S, O, H>,
    ) -> Result<Option<(&'m K, &'m V)>, MapError> {
        let table = &map.table;
        table.mod_count.check(self.expected)?;
        let Some(n) = self.next else {
            return Ok(None);
        };
        let node = table.arena.get(n).ok_or(MapError::ConcurrentModification {
            expected: self.expected,
            found: table.mod_count.get(),
        })?;
        self.next = table.successor(n, &mut self.index);
        self.current = Some(n);
        Ok(Some((&node.key, &node.value)))
    }

    /// Remove the entry last returned by [`Cursor::next`].
    ///
    /// The bucket keeps its representation and list order, so the cursor's
    /// position stays valid and its snapshot is refreshed.
    pub fn remove<K, V, S, O, H>(&mut self, map: &mut HybridMap<K, V, S, O, H>) -> Result<(K, V), MapError>
    where
        H: EntryHooks<K, V>,
    {
        let n = self.current.ok_or(MapError::NoCurrentEntry)?;
        map.table.mod_count.check(self.expected)?;
        self.current = None;
        let entry = map.unlink(n, false).ok_or(MapError::NoCurrentEntry)?;
        self.expected = map.table.mod_count.get();
        Ok(entry)
    }
}
