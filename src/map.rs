//! HybridMap: the public map over `RawTable`, adding hashing, hooks and the
//! compute/merge family.

use core::borrow::Borrow;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use core::marker::PhantomData;
use core::mem;

use hashbrown::hash_map::DefaultHashBuilder;

use crate::builder::MapBuilder;
use crate::error::MapError;
use crate::hooks::{EntryHooks, NoHooks};
use crate::iter::{Cursor, Drain, IntoIter, Iter, IterMut, Keys, Values, ValuesMut};
use crate::node::{spread, BucketKind, NodeKey};
use crate::order::{KeyOrder, Unordered};
use crate::table::{check_capacity, BucketStats, Put, RawTable, DEFAULT_LOAD_FACTOR};

/// Hash map whose buckets are short lists that turn into red-black trees when
/// too many keys collide.
///
/// - `S` hashes keys (default: hashbrown's `DefaultHashBuilder`).
/// - `O` breaks ties between equal hashes inside tree buckets; use
///   [`Natural`](crate::Natural) for `Ord` keys.
/// - `H` receives entry lifecycle callbacks.
#[derive(Clone)]
pub struct HybridMap<K, V, S = DefaultHashBuilder, O = Unordered, H = NoHooks> {
    pub(crate) table: RawTable<K, V>,
    hash_builder: S,
    order: O,
    hooks: H,
}

impl<K, V> HybridMap<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a map whose first allocation holds at least `capacity` buckets
    /// (rounded up to a power of two).
    ///
    /// # Panics
    ///
    /// Panics if `capacity` exceeds [`MAXIMUM_CAPACITY`](crate::MAXIMUM_CAPACITY).
    /// Use [`try_with_capacity`](Self::try_with_capacity) to get an error instead.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_hasher(capacity, DefaultHashBuilder::default())
    }

    pub fn try_with_capacity(capacity: usize) -> Result<Self, MapError> {
        let capacity = check_capacity(capacity)?;
        Ok(Self::with_capacity(capacity))
    }

    pub fn builder() -> MapBuilder<K, V> {
        MapBuilder::new()
    }
}

impl<K, V, S> HybridMap<K, V, S> {
    pub fn with_hasher(hash_builder: S) -> Self {
        Self::from_parts(RawTable::new(None, DEFAULT_LOAD_FACTOR), hash_builder, Unordered, NoHooks)
    }

    /// # Panics
    ///
    /// Panics if `capacity` exceeds [`MAXIMUM_CAPACITY`](crate::MAXIMUM_CAPACITY).
    pub fn with_capacity_and_hasher(capacity: usize, hash_builder: S) -> Self {
        let capacity = match check_capacity(capacity) {
            Ok(capacity) => capacity,
            Err(e) => panic!("{e}"),
        };
        Self::from_parts(
            RawTable::new(Some(capacity), DEFAULT_LOAD_FACTOR),
            hash_builder,
            Unordered,
            NoHooks,
        )
    }
}

impl<K, V, S, O, H> HybridMap<K, V, S, O, H> {
    pub(crate) fn from_parts(table: RawTable<K, V>, hash_builder: S, order: O, hooks: H) -> Self {
        Self {
            table,
            hash_builder,
            order,
            hooks,
        }
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.len() == 0
    }

    /// Number of buckets; 0 until the first insert.
    pub fn capacity(&self) -> usize {
        self.table.capacity()
    }

    pub fn load_factor(&self) -> f32 {
        self.table.load_factor()
    }

    pub fn hasher(&self) -> &S {
        &self.hash_builder
    }

    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    pub fn hooks_mut(&mut self) -> &mut H {
        &mut self.hooks
    }

    /// Current structural modification count.
    pub fn mod_count(&self) -> u64 {
        self.table.mod_count.get()
    }

    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter::new(&self.table)
    }

    pub fn keys(&self) -> Keys<'_, K, V> {
        Keys { inner: self.iter() }
    }

    pub fn values(&self) -> Values<'_, K, V> {
        Values { inner: self.iter() }
    }

    /// Mutable iteration in storage order rather than bucket order.
    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        IterMut {
            it: self.table.arena.iter_mut(),
            _pd: PhantomData,
        }
    }

    pub fn values_mut(&mut self) -> ValuesMut<'_, K, V> {
        ValuesMut { inner: self.iter_mut() }
    }

    /// Remove every entry, yielding them in storage order. Removal hooks are
    /// not called, as with [`clear`](Self::clear).
    pub fn drain(&mut self) -> Drain<'_, K, V> {
        Drain { it: self.table.drain() }
    }

    /// Start a detached fail-fast traversal.
    pub fn cursor(&self) -> Cursor {
        Cursor::new(&self.table)
    }

    pub fn contains_value(&self, value: &V) -> bool
    where
        V: PartialEq,
    {
        self.values().any(|v| v == value)
    }

    /// Visit every entry in bucket order.
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&K, &V),
    {
        for (k, v) in self.iter() {
            f(k, v);
        }
    }

    /// Replace every value with `f(key, value)`, in bucket order.
    pub fn replace_all<F>(&mut self, mut f: F)
    where
        F: FnMut(&K, &V) -> V,
    {
        let mut index = 0;
        let mut cur = self.table.next_occupied(&mut index);
        while let Some(n) = cur {
            let node = &mut self.table.arena[n];
            node.value = f(&node.key, &node.value);
            cur = self.table.successor(n, &mut index);
        }
    }

    /// Drop every entry; the bucket array keeps its size.
    pub fn clear(&mut self) {
        self.table.clear();
    }

    pub fn stats(&self) -> BucketStats {
        self.table.stats()
    }

    /// Check bucket placement, list/tree representation and the red-black
    /// properties of every tree bucket.
    pub fn check_invariants(&self) -> Result<(), &'static str> {
        self.table.check_invariants()?;
        if self.len() > self.table.threshold() {
            return Err("entry count above resize threshold");
        }
        Ok(())
    }
}

impl<K, V, S, O, H> HybridMap<K, V, S, O, H>
where
    H: EntryHooks<K, V>,
{
    /// Unlink `n` and report the removal to the hooks.
    pub(crate) fn unlink(&mut self, n: NodeKey, movable: bool) -> Option<(K, V)> {
        let node = self.table.remove_node(n, movable)?;
        self.hooks.after_removal(&node.key, &node.value);
        Some((node.key, node.value))
    }

    fn touch(&mut self, n: NodeKey) {
        let node = &self.table.arena[n];
        self.hooks.after_access(&node.key, &node.value);
    }

    /// Keep only the entries for which `f` returns true. Removals keep each
    /// bucket's representation, as cursor removals do.
    pub fn retain<F>(&mut self, mut f: F)
    where
        F: FnMut(&K, &mut V) -> bool,
    {
        let mut index = 0;
        let mut cur = self.table.next_occupied(&mut index);
        while let Some(n) = cur {
            cur = self.table.successor(n, &mut index);
            let node = &mut self.table.arena[n];
            if !f(&node.key, &mut node.value) {
                self.unlink(n, false);
            }
        }
    }
}

impl<K, V, S, O, H> HybridMap<K, V, S, O, H>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    fn make_hash<Q>(&self, q: &Q) -> u32
    where
        Q: ?Sized + Hash,
    {
        spread(self.hash_builder.hash_one(q))
    }

    fn find_node<Q>(&self, key: &Q) -> Option<NodeKey>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        O: KeyOrder<Q>,
    {
        let hash = self.make_hash(key);
        self.table.find(hash, key, &self.order)
    }

    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        O: KeyOrder<Q>,
    {
        self.find_node(key).map(|n| &self.table.arena[n].value)
    }

    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        O: KeyOrder<Q>,
    {
        let n = self.find_node(key)?;
        Some(&mut self.table.arena[n].value)
    }

    pub fn get_key_value<Q>(&self, key: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        O: KeyOrder<Q>,
    {
        self.find_node(key).map(|n| {
            let node = &self.table.arena[n];
            (&node.key, &node.value)
        })
    }

    /// The stored value, or `default` when `key` is absent.
    pub fn get_or_default<'a, Q>(&'a self, key: &Q, default: &'a V) -> &'a V
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        O: KeyOrder<Q>,
    {
        self.get(key).unwrap_or(default)
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        O: KeyOrder<Q>,
    {
        self.find_node(key).is_some()
    }

    /// Representation of the bucket `key` hashes to, or `None` when that
    /// bucket is empty. The key itself need not be present.
    pub fn bucket_kind<Q>(&self, key: &Q) -> Option<BucketKind>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash,
    {
        self.table.bucket_kind(self.make_hash(key))
    }
}

impl<K, V, S, O, H> HybridMap<K, V, S, O, H>
where
    K: Eq + Hash,
    S: BuildHasher,
    O: KeyOrder<K>,
    H: EntryHooks<K, V>,
{
    fn put_val(&mut self, hash: u32, key: K, value: V, only_if_absent: bool, evict: bool) -> Put<V> {
        let put = self.table.put(hash, key, value, only_if_absent, &self.order);
        match put {
            Put::Inserted(_) => self.hooks.after_insertion(evict),
            Put::Replaced(n, _) | Put::Kept(n, _) => self.touch(n),
        }
        put
    }

    fn put_all<I>(&mut self, iter: I, evict: bool)
    where
        I: IntoIterator<Item = (K, V)>,
    {
        let iter = iter.into_iter();
        self.table.presize(iter.size_hint().0, &self.order);
        for (key, value) in iter {
            let hash = self.make_hash(&key);
            self.put_val(hash, key, value, false, evict);
        }
    }

    /// Insert or overwrite. Returns the previous value; the stored key is
    /// kept and `key` is dropped when the entry already existed.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        let hash = self.make_hash(&key);
        match self.put_val(hash, key, value, false, true) {
            Put::Inserted(_) => None,
            Put::Replaced(_, old) | Put::Kept(_, old) => Some(old),
        }
    }

    /// Insert only when `key` is absent. Returns the existing value otherwise
    /// and leaves it untouched.
    pub fn insert_if_absent(&mut self, key: K, value: V) -> Option<&V> {
        let hash = self.make_hash(&key);
        match self.put_val(hash, key, value, true, true) {
            Put::Inserted(_) => None,
            Put::Replaced(n, _) | Put::Kept(n, _) => Some(&self.table.arena[n].value),
        }
    }

    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        O: KeyOrder<Q>,
    {
        self.remove_entry(key).map(|(_, v)| v)
    }

    pub fn remove_entry<Q>(&mut self, key: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        O: KeyOrder<Q>,
    {
        let n = self.find_node(key)?;
        self.unlink(n, true)
    }

    /// Remove `key` only if `pred` accepts its current value.
    pub fn remove_if<Q, F>(&mut self, key: &Q, pred: F) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        O: KeyOrder<Q>,
        F: FnOnce(&V) -> bool,
    {
        let n = self.find_node(key)?;
        if !pred(&self.table.arena[n].value) {
            return None;
        }
        self.unlink(n, true).map(|(_, v)| v)
    }

    /// Overwrite the value of an existing key; absent keys are left absent.
    pub fn replace<Q>(&mut self, key: &Q, value: V) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        O: KeyOrder<Q>,
    {
        let n = self.find_node(key)?;
        let old = mem::replace(&mut self.table.arena[n].value, value);
        self.touch(n);
        Some(old)
    }

    /// Overwrite the value of `key` only if `pred` accepts the current one.
    pub fn replace_if<Q, F>(&mut self, key: &Q, value: V, pred: F) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        O: KeyOrder<Q>,
        F: FnOnce(&V) -> bool,
    {
        let Some(n) = self.find_node(key) else {
            return false;
        };
        if !pred(&self.table.arena[n].value) {
            return false;
        }
        self.table.arena[n].value = value;
        self.touch(n);
        true
    }

    /// Compute a new mapping from the current one. `f` sees `None` for an
    /// absent key; returning `None` removes the entry (or inserts nothing).
    pub fn compute<F>(&mut self, key: K, f: F) -> Option<&V>
    where
        F: FnOnce(&K, Option<&V>) -> Option<V>,
    {
        let hash = self.make_hash(&key);
        match self.table.find(hash, &key, &self.order) {
            Some(n) => {
                let node = &self.table.arena[n];
                match f(&node.key, Some(&node.value)) {
                    Some(value) => {
                        self.table.arena[n].value = value;
                        self.touch(n);
                        Some(&self.table.arena[n].value)
                    }
                    None => {
                        self.unlink(n, true);
                        None
                    }
                }
            }
            None => {
                let value = f(&key, None)?;
                let n = self.put_val(hash, key, value, false, true).node();
                Some(&self.table.arena[n].value)
            }
        }
    }

    /// Return the value for `key`, inserting `f(&key)` first when absent.
    /// `f` is not called for a present key; returning `None` inserts nothing.
    pub fn compute_if_absent<F>(&mut self, key: K, f: F) -> Option<&V>
    where
        F: FnOnce(&K) -> Option<V>,
    {
        let hash = self.make_hash(&key);
        if let Some(n) = self.table.find(hash, &key, &self.order) {
            self.touch(n);
            return Some(&self.table.arena[n].value);
        }
        let value = f(&key)?;
        let n = self.put_val(hash, key, value, false, true).node();
        Some(&self.table.arena[n].value)
    }

    /// Remap the value of a present key; returning `None` removes it. `f` is
    /// not called for an absent key.
    pub fn compute_if_present<Q, F>(&mut self, key: &Q, f: F) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        O: KeyOrder<Q>,
        F: FnOnce(&K, &V) -> Option<V>,
    {
        let n = self.find_node(key)?;
        let node = &self.table.arena[n];
        match f(&node.key, &node.value) {
            Some(value) => {
                self.table.arena[n].value = value;
                self.touch(n);
                Some(&self.table.arena[n].value)
            }
            None => {
                self.unlink(n, true);
                None
            }
        }
    }

    /// Insert `value` when `key` is absent, otherwise store
    /// `f(current, value)`; returning `None` removes the entry.
    pub fn merge<F>(&mut self, key: K, value: V, f: F) -> Option<&V>
    where
        F: FnOnce(&V, V) -> Option<V>,
    {
        let hash = self.make_hash(&key);
        match self.table.find(hash, &key, &self.order) {
            Some(n) => match f(&self.table.arena[n].value, value) {
                Some(merged) => {
                    self.table.arena[n].value = merged;
                    self.touch(n);
                    Some(&self.table.arena[n].value)
                }
                None => {
                    self.unlink(n, true);
                    None
                }
            },
            None => {
                let n = self.put_val(hash, key, value, false, true).node();
                Some(&self.table.arena[n].value)
            }
        }
    }

    /// Grow the table so that `additional` more entries fit without a resize.
    pub fn try_reserve(&mut self, additional: usize) -> Result<(), MapError> {
        self.table.try_reserve(additional, &self.order)
    }
}

impl<K, V, S, O, H> Default for HybridMap<K, V, S, O, H>
where
    S: Default,
    O: Default,
    H: Default,
{
    fn default() -> Self {
        Self::from_parts(
            RawTable::new(None, DEFAULT_LOAD_FACTOR),
            S::default(),
            O::default(),
            H::default(),
        )
    }
}

impl<K, V, S, O, H> Extend<(K, V)> for HybridMap<K, V, S, O, H>
where
    K: Eq + Hash,
    S: BuildHasher,
    O: KeyOrder<K>,
    H: EntryHooks<K, V>,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        self.put_all(iter, true);
    }
}

/// Construction reports `after_insertion(false)` for each new entry.
impl<K, V, S, O, H> FromIterator<(K, V)> for HybridMap<K, V, S, O, H>
where
    K: Eq + Hash,
    S: BuildHasher + Default,
    O: KeyOrder<K> + Default,
    H: EntryHooks<K, V> + Default,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::default();
        map.put_all(iter, false);
        map
    }
}

impl<K, V, S, O, H> PartialEq for HybridMap<K, V, S, O, H>
where
    K: Eq + Hash,
    V: PartialEq,
    S: BuildHasher,
    O: KeyOrder<K>,
{
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|(k, v)| other.get(k) == Some(v))
    }
}

impl<K, V, S, O, H> Eq for HybridMap<K, V, S, O, H>
where
    K: Eq + Hash,
    V: Eq,
    S: BuildHasher,
    O: KeyOrder<K>,
{
}

impl<K, V, S, O, H> fmt::Debug for HybridMap<K, V, S, O, H>
where
    K: fmt::Debug,
    V: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V, S, O, H> IntoIterator for HybridMap<K, V, S, O, H> {
    type Item = (K, V);
    type IntoIter = IntoIter<K, V>;

    fn into_iter(self) -> Self::IntoIter {
        IntoIter {
            it: self.table.arena.into_iter(),
        }
    }
}

impl<'a, K, V, S, O, H> IntoIterator for &'a HybridMap<K, V, S, O, H> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, K, V, S, O, H> IntoIterator for &'a mut HybridMap<K, V, S, O, H> {
    type Item = (&'a K, &'a mut V);
    type IntoIter = IterMut<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::Natural;
    use crate::table::MAXIMUM_CAPACITY;
    use std::hash::Hasher;

    #[derive(Clone, Default)]
    struct ConstBuildHasher;
    struct ConstHasher;
    impl BuildHasher for ConstBuildHasher {
        type Hasher = ConstHasher;
        fn build_hasher(&self) -> Self::Hasher {
            ConstHasher
        }
    }
    impl Hasher for ConstHasher {
        fn write(&mut self, _bytes: &[u8]) {}
        fn finish(&self) -> u64 {
            0
        } // every key lands in bucket 0
    }

    #[derive(Default, Debug, PartialEq, Eq)]
    struct Counting {
        accesses: usize,
        insertions: usize,
        evicting_insertions: usize,
        removals: usize,
    }

    impl EntryHooks<u32, u32> for Counting {
        fn after_access(&mut self, _key: &u32, _value: &u32) {
            self.accesses += 1;
        }
        fn after_insertion(&mut self, evict: bool) {
            self.insertions += 1;
            if evict {
                self.evicting_insertions += 1;
            }
        }
        fn after_removal(&mut self, _key: &u32, _value: &u32) {
            self.removals += 1;
        }
    }

    fn colliding(cap: usize) -> HybridMap<u32, u32, ConstBuildHasher, Natural> {
        MapBuilder::new()
            .initial_capacity(cap)
            .natural_order()
            .build_with_hasher(ConstBuildHasher)
            .unwrap()
    }

    /// Invariant: insert returns the previous value and `len` counts distinct
    /// keys.
    #[test]
    fn insert_get_remove_basics() {
        let mut m: HybridMap<String, i32> = HybridMap::new();
        assert!(m.is_empty());
        assert_eq!(m.insert("a".to_string(), 1), None);
        assert_eq!(m.insert("b".to_string(), 2), None);
        assert_eq!(m.insert("a".to_string(), 3), Some(1));
        assert_eq!(m.len(), 2);
        assert_eq!(m.get("a"), Some(&3));
        assert_eq!(m.get_key_value("b"), Some((&"b".to_string(), &2)));
        assert!(m.contains_key("b"));
        assert!(!m.contains_key("c"));
        assert_eq!(m.remove("a"), Some(3));
        assert_eq!(m.remove("a"), None);
        assert_eq!(m.len(), 1);
        assert_eq!(m.check_invariants(), Ok(()));
    }

    /// Invariant: absent and present-with-default are distinguished by
    /// `contains_key`, not by the value.
    #[test]
    fn optional_keys_and_values() {
        let mut m: HybridMap<Option<u32>, Option<u32>> = HybridMap::new();
        m.insert(None, None);
        m.insert(Some(1), None);
        assert!(m.contains_key(&None));
        assert_eq!(m.get(&None), Some(&None));
        assert_eq!(m.get(&Some(2)), None);
        assert_eq!(m.remove(&None), Some(None));
        assert!(!m.contains_key(&None));
    }

    /// Invariant: insert_if_absent keeps the existing value and reports it.
    #[test]
    fn insert_if_absent_keeps_existing() {
        let mut m: HybridMap<u32, u32> = HybridMap::new();
        assert_eq!(m.insert_if_absent(1, 10), None);
        assert_eq!(m.insert_if_absent(1, 20), Some(&10));
        assert_eq!(m.get(&1), Some(&10));
    }

    /// Invariant: colliding keys are all retrievable through list and tree
    /// buckets, and the map stays valid while it grows.
    #[test]
    fn full_collisions_stay_retrievable() {
        let mut m: HybridMap<u32, u32, ConstBuildHasher> = HybridMap::with_hasher(ConstBuildHasher);
        for k in 0..200 {
            m.insert(k, k * 3);
            assert_eq!(m.check_invariants(), Ok(()));
        }
        assert_eq!(m.bucket_kind(&0), Some(BucketKind::Tree));
        for k in 0..200 {
            assert_eq!(m.get(&k), Some(&(k * 3)));
        }
        assert_eq!(m.stats().tree_buckets, 1);
    }

    /// Invariant: removals shrink a tree bucket back into a list once the
    /// tree becomes shallow, without losing entries.
    #[test]
    fn tree_bucket_untreeifies_on_removal() {
        let mut m = colliding(64);
        for k in 0..12 {
            m.insert(k, k);
        }
        assert_eq!(m.bucket_kind(&0), Some(BucketKind::Tree));
        for k in 0..10 {
            assert_eq!(m.remove(&k), Some(k));
            assert_eq!(m.check_invariants(), Ok(()));
        }
        assert_eq!(m.bucket_kind(&0), Some(BucketKind::List));
        assert_eq!(m.get(&10), Some(&10));
        assert_eq!(m.get(&11), Some(&11));
    }

    /// Invariant: compute inserts, updates and removes depending on the
    /// closure's answer.
    #[test]
    fn compute_family() {
        let mut m: HybridMap<u32, u32> = HybridMap::new();
        assert_eq!(m.compute(1, |_, old| Some(old.map_or(1, |v| v + 1))), Some(&1));
        assert_eq!(m.compute(1, |_, old| Some(old.map_or(1, |v| v + 1))), Some(&2));
        assert_eq!(m.compute(1, |_, _| None), None);
        assert!(m.is_empty());
        assert_eq!(m.compute(2, |_, _| None), None);
        assert!(m.is_empty());

        assert_eq!(m.compute_if_absent(5, |k| Some(k * 10)), Some(&50));
        assert_eq!(m.compute_if_absent(5, |_| panic!("present key")), Some(&50));
        assert_eq!(m.compute_if_absent(6, |_| None), None);
        assert!(!m.contains_key(&6));

        assert_eq!(m.compute_if_present(&5, |_, v| Some(v + 1)), Some(&51));
        assert_eq!(m.compute_if_present(&7, |_, _| panic!("absent key")), None);
        assert_eq!(m.compute_if_present(&5, |_, _| None), None);
        assert!(m.is_empty());
    }

    #[test]
    fn merge_combines_or_removes() {
        let mut m: HybridMap<&str, u32> = HybridMap::new();
        assert_eq!(m.merge("x", 1, |a, b| Some(a + b)), Some(&1));
        assert_eq!(m.merge("x", 4, |a, b| Some(a + b)), Some(&5));
        assert_eq!(m.merge("x", 0, |_, _| None), None);
        assert!(m.is_empty());
    }

    /// Invariant: conditional forms only act when the predicate accepts the
    /// current value.
    #[test]
    fn conditional_remove_and_replace() {
        let mut m: HybridMap<u32, u32> = (0..4).map(|k| (k, k)).collect();
        assert_eq!(m.remove_if(&1, |v| *v == 9), None);
        assert_eq!(m.remove_if(&1, |v| *v == 1), Some(1));
        assert!(!m.replace_if(&2, 20, |v| *v == 9));
        assert!(m.replace_if(&2, 20, |v| *v == 2));
        assert_eq!(m.get(&2), Some(&20));
        assert_eq!(m.replace(&3, 30), Some(3));
        assert_eq!(m.replace(&42, 1), None);
        assert!(!m.contains_key(&42));
        assert_eq!(m.remove_entry(&0), Some((0, 0)));
    }

    /// Invariant: each hook fires exactly once per access, insertion and
    /// removal; construction reports non-evicting insertions.
    #[test]
    fn hooks_fire_once_per_operation() {
        let mut m: HybridMap<u32, u32, DefaultHashBuilder, Unordered, Counting> =
            (0..3).map(|k| (k, k)).collect();
        assert_eq!(m.hooks().insertions, 3);
        assert_eq!(m.hooks().evicting_insertions, 0);

        m.insert(3, 3);
        m.insert(3, 4);
        m.insert_if_absent(3, 5);
        m.replace(&3, 6);
        m.compute_if_present(&3, |_, v| Some(v + 1));
        m.merge(3, 1, |a, b| Some(a + b));
        m.remove(&0);
        m.remove_if(&1, |_| true);
        m.retain(|k, _| *k != 2);
        m.get(&3);

        assert_eq!(
            *m.hooks(),
            Counting {
                accesses: 5,
                insertions: 4,
                evicting_insertions: 1,
                removals: 3,
            }
        );
    }

    /// Invariant: retain and replace_all visit every entry once.
    #[test]
    fn retain_and_replace_all() {
        let mut m: HybridMap<u32, u32> = (0..100).map(|k| (k, k)).collect();
        m.retain(|k, v| {
            *v += 1;
            k % 3 == 0
        });
        assert_eq!(m.len(), 34);
        assert!(m.iter().all(|(k, v)| *v == k + 1));
        m.replace_all(|k, _| k * 2);
        let mut sum = 0;
        m.for_each(|k, v| {
            assert_eq!(*v, k * 2);
            sum += 1;
        });
        assert_eq!(sum, 34);
        assert_eq!(m.check_invariants(), Ok(()));
    }

    /// Invariant: retain removes from tree buckets without breaking the walk.
    #[test]
    fn retain_inside_tree_bucket() {
        let mut m = colliding(64);
        for k in 0..20 {
            m.insert(k, k);
        }
        m.retain(|k, _| k % 2 == 1);
        assert_eq!(m.len(), 10);
        assert_eq!(m.check_invariants(), Ok(()));
        assert_eq!(m.bucket_kind(&1), Some(BucketKind::Tree));
        for k in 0..20 {
            assert_eq!(m.contains_key(&k), k % 2 == 1);
        }
    }

    #[test]
    fn drain_and_clear_empty_the_map() {
        let mut m: HybridMap<u32, u32> = (0..10).map(|k| (k, k)).collect();
        let cap = m.capacity();
        let mut drained: Vec<_> = m.drain().collect();
        drained.sort();
        assert_eq!(drained, (0..10).map(|k| (k, k)).collect::<Vec<_>>());
        assert!(m.is_empty());
        assert_eq!(m.capacity(), cap);
        assert_eq!(m.get(&3), None);
        m.insert(1, 1);
        m.clear();
        assert!(m.is_empty());
        assert_eq!(m.check_invariants(), Ok(()));
    }

    /// Invariant: equality ignores bucket representation and capacity.
    #[test]
    fn equality_across_representations() {
        let mut a = colliding(64);
        let mut b = colliding(1);
        for k in 0..12 {
            a.insert(k, k);
        }
        for k in (0..12).rev() {
            b.insert(k, k);
        }
        assert_eq!(a, b);
        b.insert(3, 99);
        assert_ne!(a, b);
        let c = a.clone();
        assert_eq!(a, c);
        assert_eq!(c.check_invariants(), Ok(()));
    }

    #[test]
    fn lookup_helpers() {
        let mut m: HybridMap<u32, u32> = HybridMap::with_capacity(4);
        m.extend([(1, 10), (2, 20)]);
        assert_eq!(m.get_or_default(&1, &0), &10);
        assert_eq!(m.get_or_default(&9, &0), &0);
        assert!(m.contains_value(&20));
        assert!(!m.contains_value(&30));
        *m.get_mut(&2).unwrap() = 21;
        for v in m.values_mut() {
            *v += 1;
        }
        assert_eq!(m.get(&2), Some(&22));
        assert_eq!(format!("{:?}", HybridMap::<u32, u32>::new()), "{}");
    }

    /// Invariant: capacity requests beyond the maximum are rejected by the
    /// fallible paths; the maximum itself is accepted lazily.
    #[test]
    fn capacity_limits() {
        assert!(matches!(
            HybridMap::<u32, u32>::try_with_capacity(MAXIMUM_CAPACITY + 1),
            Err(MapError::CapacityOverflow { .. })
        ));
        let mut m: HybridMap<u32, u32> = HybridMap::with_capacity(MAXIMUM_CAPACITY);
        assert_eq!(m.capacity(), 0);
        assert!(m.try_reserve(10).is_ok());
        assert!(m.try_reserve(usize::MAX).is_err());
    }

    #[test]
    #[should_panic(expected = "exceeds the maximum table capacity")]
    fn with_capacity_panics_above_maximum() {
        let _ = HybridMap::<u32, u32>::with_capacity(usize::MAX);
    }

    /// Invariant: structural operations bump the modification count; value
    /// updates do not.
    #[test]
    fn mod_count_tracks_structure_only() {
        let mut m: HybridMap<u32, u32> = HybridMap::new();
        m.insert(1, 1);
        let mc = m.mod_count();
        m.insert(1, 2);
        *m.get_mut(&1).unwrap() = 3;
        m.replace(&1, 4);
        assert_eq!(m.mod_count(), mc);
        m.insert(2, 2);
        assert!(m.mod_count() > mc);
        let mc = m.mod_count();
        m.remove(&2);
        assert!(m.mod_count() > mc);
    }
}
