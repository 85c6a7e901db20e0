//! RawTable: the bucket array, its resize/split algorithm, and the
//! list/tree promotion controller.
//!
//! Everything here works on cached 32-bit hashes; `K: Hash` is never called.
//! Buckets hold arena keys only, so the array is replaced wholesale on resize
//! while nodes stay where they are.

use core::borrow::Borrow;
use core::mem;

use crate::error::MapError;
use crate::modcount::ModCount;
use crate::node::{Arena, Bucket, BucketKind, Node, NodeKey};
use crate::order::KeyOrder;
use crate::tree::{self, TreeSlot};

pub(crate) const DEFAULT_INITIAL_CAPACITY: usize = 16;
pub(crate) const DEFAULT_LOAD_FACTOR: f32 = 0.75;
/// Largest bucket array the table will allocate.
pub const MAXIMUM_CAPACITY: usize = 1 << 30;
/// A list bucket that reaches this many nodes before an append is treeified.
pub(crate) const TREEIFY_THRESHOLD: usize = 8;
/// A split half with at most this many nodes is stored as a list.
pub(crate) const UNTREEIFY_THRESHOLD: usize = 6;
/// Below this capacity an overlong bucket grows the table instead of
/// treeifying.
pub(crate) const MIN_TREEIFY_CAPACITY: usize = 64;

/// Smallest power of two >= `cap`, clamped to `[1, MAXIMUM_CAPACITY]`.
pub(crate) fn table_size_for(cap: usize) -> usize {
    cap.max(1)
        .checked_next_power_of_two()
        .map_or(MAXIMUM_CAPACITY, |c| c.min(MAXIMUM_CAPACITY))
}

/// Reject a capacity request above `MAXIMUM_CAPACITY`.
pub(crate) fn check_capacity(requested: usize) -> Result<usize, MapError> {
    if requested > MAXIMUM_CAPACITY {
        Err(MapError::CapacityOverflow {
            requested,
            max: MAXIMUM_CAPACITY,
        })
    } else {
        Ok(requested)
    }
}

/// Result of a structural put.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Put<V> {
    /// A new node was committed (and any resize it caused has happened).
    Inserted(NodeKey),
    /// The key existed; its value was swapped and the old one is returned.
    Replaced(NodeKey, V),
    /// The key existed and `only_if_absent` was set; the offered value is
    /// handed back untouched.
    Kept(NodeKey, V),
}

impl<V> Put<V> {
    /// Node now holding the key.
    pub(crate) fn node(&self) -> NodeKey {
        match *self {
            Put::Inserted(n) | Put::Replaced(n, _) | Put::Kept(n, _) => n,
        }
    }
}

/// Bucket occupancy summary, see [`HybridMap::stats`](crate::HybridMap::stats).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BucketStats {
    pub capacity: usize,
    pub len: usize,
    pub empty_buckets: usize,
    pub list_buckets: usize,
    pub tree_buckets: usize,
    pub longest_list: usize,
}

#[derive(Clone, Debug)]
pub(crate) struct RawTable<K, V> {
    pub(crate) arena: Arena<K, V>,
    pub(crate) buckets: Vec<Bucket>,
    // Before the first allocation this holds the requested initial capacity
    // (0 selects the default).
    threshold: usize,
    load_factor: f32,
    pub(crate) mod_count: ModCount,
}

impl<K, V> RawTable<K, V> {
    pub(crate) fn new(initial_capacity: Option<usize>, load_factor: f32) -> Self {
        Self {
            arena: Arena::with_key(),
            buckets: Vec::new(),
            threshold: initial_capacity.map_or(0, table_size_for),
            load_factor,
            mod_count: ModCount::default(),
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.arena.len()
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.buckets.len()
    }

    #[inline]
    pub(crate) fn load_factor(&self) -> f32 {
        self.load_factor
    }

    #[inline]
    pub(crate) fn threshold(&self) -> usize {
        self.threshold
    }

    #[inline]
    fn index_for(&self, hash: u32) -> usize {
        (self.buckets.len() - 1) & hash as usize
    }

    fn bucket_for(&self, hash: u32) -> Bucket {
        if self.buckets.is_empty() {
            Bucket::Empty
        } else {
            self.buckets[self.index_for(hash)]
        }
    }

    pub(crate) fn bucket_kind(&self, hash: u32) -> Option<BucketKind> {
        match self.bucket_for(hash) {
            Bucket::Empty => None,
            Bucket::List { .. } => Some(BucketKind::List),
            Bucket::Tree(_) => Some(BucketKind::Tree),
        }
    }

    pub(crate) fn find<Q, O>(&self, hash: u32, key: &Q, order: &O) -> Option<NodeKey>
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
        O: KeyOrder<Q>,
    {
        match self.bucket_for(hash) {
            Bucket::Empty => None,
            Bucket::List { head } => {
                let mut cur = Some(head);
                while let Some(n) = cur {
                    let node = &self.arena[n];
                    if node.hash == hash && node.key.borrow() == key {
                        return Some(n);
                    }
                    cur = node.next;
                }
                None
            }
            Bucket::Tree(bin) => {
                let first = &self.arena[bin.first];
                if first.hash == hash && first.key.borrow() == key {
                    return Some(bin.first);
                }
                tree::find(&self.arena, Some(bin.root), hash, key, order)
            }
        }
    }

    /// Insert or update `key`. Allocates the table lazily, appends new list
    /// nodes at the tail, promotes overlong lists, and resizes once the new
    /// entry pushes `len` past the threshold.
    pub(crate) fn put<O>(&mut self, hash: u32, key: K, value: V, only_if_absent: bool, order: &O) -> Put<V>
    where
        K: Eq,
        O: KeyOrder<K>,
    {
        if self.buckets.is_empty() {
            self.resize(order);
        }
        let i = self.index_for(hash);
        let existing = match self.buckets[i] {
            Bucket::Empty => {
                let n = self.arena.insert(Node::new(hash, key, value));
                self.buckets[i] = Bucket::List { head: n };
                return self.commit_insert(n, order);
            }
            Bucket::Tree(mut bin) => match tree::slot_for(&self.arena, bin.root, hash, &key, order) {
                TreeSlot::Occupied(n) => n,
                TreeSlot::Vacant { parent, left } => {
                    let n = self.arena.insert(Node::new(hash, key, value));
                    tree::link_leaf(&mut self.arena, &mut bin, parent, left, n);
                    self.buckets[i] = Bucket::Tree(bin);
                    return self.commit_insert(n, order);
                }
            },
            Bucket::List { head } => {
                let mut p = head;
                let mut bin_count = 0usize;
                loop {
                    let node = &self.arena[p];
                    if node.hash == hash && node.key == key {
                        break p;
                    }
                    match node.next {
                        Some(next) => {
                            p = next;
                            bin_count += 1;
                        }
                        None => {
                            let n = self.arena.insert(Node::new(hash, key, value));
                            self.arena[p].next = Some(n);
                            if bin_count >= TREEIFY_THRESHOLD - 1 {
                                self.treeify_bin(hash, order);
                            }
                            return self.commit_insert(n, order);
                        }
                    }
                }
            }
        };

        if only_if_absent {
            Put::Kept(existing, value)
        } else {
            let old = mem::replace(&mut self.arena[existing].value, value);
            Put::Replaced(existing, old)
        }
    }

    fn commit_insert<O>(&mut self, n: NodeKey, order: &O) -> Put<V>
    where
        O: KeyOrder<K>,
    {
        self.mod_count.bump();
        // Small load factors can leave a doubled table's threshold below `len`.
        while self.len() > self.threshold && self.buckets.len() < MAXIMUM_CAPACITY {
            self.resize(order);
        }
        Put::Inserted(n)
    }

    /// Unlink node `n` and return it. A movable removal may untreeify its
    /// bucket and move the tree root to the front; a non-movable one keeps
    /// the bucket's list order intact.
    pub(crate) fn remove_node(&mut self, n: NodeKey, movable: bool) -> Option<Node<K, V>> {
        let hash = self.arena.get(n)?.hash;
        if self.buckets.is_empty() {
            return None;
        }
        let i = self.index_for(hash);
        let bucket = match self.buckets[i] {
            Bucket::Empty => return None,
            Bucket::List { head } if head == n => match self.arena[n].next {
                Some(next) => Bucket::List { head: next },
                None => Bucket::Empty,
            },
            Bucket::List { head } => {
                let mut p = head;
                loop {
                    match self.arena[p].next {
                        Some(x) if x == n => break,
                        Some(x) => p = x,
                        None => return None,
                    }
                }
                self.arena[p].next = self.arena[n].next;
                Bucket::List { head }
            }
            Bucket::Tree(bin) => tree::remove_tree_node(&mut self.arena, bin, n, movable),
        };
        self.buckets[i] = bucket;
        self.mod_count.bump();
        self.arena.remove(n)
    }

    /// Promote the list bucket holding `hash` to a tree, or grow the table
    /// when it is still smaller than `MIN_TREEIFY_CAPACITY`.
    fn treeify_bin<O>(&mut self, hash: u32, order: &O)
    where
        O: KeyOrder<K>,
    {
        if self.buckets.len() < MIN_TREEIFY_CAPACITY {
            self.resize(order);
            return;
        }
        let i = self.index_for(hash);
        if let Bucket::List { head } = self.buckets[i] {
            let bin = tree::treeify(&mut self.arena, head, order);
            self.buckets[i] = Bucket::Tree(bin);
            self.mod_count.bump();
            #[cfg(feature = "logging")]
            log::trace!("treeified bucket {i} at capacity {}", self.buckets.len());
        }
    }

    /// Allocate the initial table or double it.
    ///
    /// Nodes are redistributed without rehashing: with old capacity `c`, a
    /// node in bucket `j` stays at `j` when `hash & c == 0` and moves to
    /// `j + c` otherwise. Both halves keep their relative order.
    pub(crate) fn resize<O>(&mut self, order: &O)
    where
        O: KeyOrder<K>,
    {
        let old_cap = self.buckets.len();
        let old_thr = self.threshold;
        let mut new_thr = 0;
        let new_cap = if old_cap > 0 {
            if old_cap >= MAXIMUM_CAPACITY {
                self.threshold = usize::MAX;
                return;
            }
            let new_cap = old_cap << 1;
            if new_cap < MAXIMUM_CAPACITY && old_cap >= DEFAULT_INITIAL_CAPACITY {
                new_thr = old_thr.saturating_mul(2);
            }
            new_cap
        } else if old_thr > 0 {
            old_thr
        } else {
            DEFAULT_INITIAL_CAPACITY
        };
        if new_thr == 0 {
            let ft = new_cap as f32 * self.load_factor;
            new_thr = if new_cap < MAXIMUM_CAPACITY && ft < MAXIMUM_CAPACITY as f32 {
                ft as usize
            } else {
                usize::MAX
            };
        }
        self.threshold = new_thr;

        let old = mem::replace(&mut self.buckets, vec![Bucket::Empty; new_cap]);
        self.mod_count.bump();
        #[cfg(feature = "logging")]
        log::debug!(
            "resized table from {old_cap} to {new_cap} buckets ({} entries, next threshold {new_thr})",
            self.len()
        );

        let bit = old_cap as u32;
        for (j, bucket) in old.into_iter().enumerate() {
            match bucket {
                Bucket::Empty => {}
                Bucket::List { head } => {
                    if self.arena[head].next.is_none() {
                        let idx = self.arena[head].hash as usize & (new_cap - 1);
                        self.buckets[idx] = bucket;
                    } else {
                        let (lo, hi) = self.split_list(head, bit);
                        self.buckets[j] = lo;
                        self.buckets[j + old_cap] = hi;
                    }
                }
                Bucket::Tree(bin) => {
                    let (lo, hi) = tree::split(&mut self.arena, bin, bit, order);
                    self.buckets[j] = lo;
                    self.buckets[j + old_cap] = hi;
                }
            }
        }
    }

    fn split_list(&mut self, head: NodeKey, bit: u32) -> (Bucket, Bucket) {
        let (mut lo_head, mut lo_tail) = (None, None);
        let (mut hi_head, mut hi_tail) = (None, None);
        let mut cur = Some(head);
        while let Some(e) = cur {
            cur = self.arena[e].next;
            let (h, t) = if self.arena[e].hash & bit == 0 {
                (&mut lo_head, &mut lo_tail)
            } else {
                (&mut hi_head, &mut hi_tail)
            };
            match *t {
                None => *h = Some(e),
                Some(tail) => self.arena[tail].next = Some(e),
            }
            *t = Some(e);
        }
        for tail in [lo_tail, hi_tail].into_iter().flatten() {
            self.arena[tail].next = None;
        }
        let as_bucket = |h: Option<NodeKey>| h.map_or(Bucket::Empty, |head| Bucket::List { head });
        (as_bucket(lo_head), as_bucket(hi_head))
    }

    /// Size the table for `entries` before a bulk insert. Before allocation
    /// only the initial capacity is raised; afterwards the table doubles until
    /// the threshold covers `entries` (or the maximum is reached).
    pub(crate) fn presize<O>(&mut self, entries: usize, order: &O)
    where
        O: KeyOrder<K>,
    {
        if entries == 0 {
            return;
        }
        if self.buckets.is_empty() {
            let ft = entries as f32 / self.load_factor + 1.0;
            let t = if ft < MAXIMUM_CAPACITY as f32 {
                ft as usize
            } else {
                MAXIMUM_CAPACITY
            };
            if t > self.threshold {
                self.threshold = table_size_for(t);
            }
        } else {
            while entries > self.threshold && self.buckets.len() < MAXIMUM_CAPACITY {
                self.resize(order);
            }
        }
    }

    pub(crate) fn try_reserve<O>(&mut self, additional: usize, order: &O) -> Result<(), MapError>
    where
        O: KeyOrder<K>,
    {
        let overflow = |requested| MapError::CapacityOverflow {
            requested,
            max: MAXIMUM_CAPACITY,
        };
        let entries = self
            .len()
            .checked_add(additional)
            .ok_or_else(|| overflow(usize::MAX))?;
        let needed = (entries as f64 / f64::from(self.load_factor)).ceil();
        if needed > MAXIMUM_CAPACITY as f64 {
            return Err(overflow(needed.min(usize::MAX as f64) as usize));
        }
        self.presize(entries, order);
        Ok(())
    }

    pub(crate) fn clear(&mut self) {
        self.mod_count.bump();
        self.arena.clear();
        self.buckets.fill(Bucket::Empty);
    }

    /// Empty every bucket and hand the entries over in storage order.
    pub(crate) fn drain(&mut self) -> slotmap::basic::Drain<'_, NodeKey, Node<K, V>> {
        self.mod_count.bump();
        self.buckets.fill(Bucket::Empty);
        self.arena.drain()
    }

    /// First node of the first non-empty bucket at or after `*index`. On
    /// return `*index` points one past that bucket.
    pub(crate) fn next_occupied(&self, index: &mut usize) -> Option<NodeKey> {
        while *index < self.buckets.len() {
            let bucket = self.buckets[*index];
            *index += 1;
            if let Some(n) = bucket.first() {
                return Some(n);
            }
        }
        None
    }

    /// Node after `n` in iteration order.
    pub(crate) fn successor(&self, n: NodeKey, index: &mut usize) -> Option<NodeKey> {
        self.arena[n].next.or_else(|| self.next_occupied(index))
    }

    pub(crate) fn stats(&self) -> BucketStats {
        let mut stats = BucketStats {
            capacity: self.buckets.len(),
            len: self.len(),
            ..BucketStats::default()
        };
        for bucket in &self.buckets {
            match *bucket {
                Bucket::Empty => stats.empty_buckets += 1,
                Bucket::List { head } => {
                    stats.list_buckets += 1;
                    stats.longest_list = stats.longest_list.max(tree::list_len(&self.arena, head));
                }
                Bucket::Tree(_) => stats.tree_buckets += 1,
            }
        }
        stats
    }

    /// Verify placement, representation and per-bucket tree invariants.
    pub(crate) fn check_invariants(&self) -> Result<(), &'static str> {
        if !self.buckets.is_empty() && !self.buckets.len().is_power_of_two() {
            return Err("capacity is not a power of two");
        }
        if self.buckets.is_empty() && !self.arena.is_empty() {
            return Err("entries present without a table");
        }
        let mut seen = 0usize;
        for (i, bucket) in self.buckets.iter().enumerate() {
            let Some(first) = bucket.first() else { continue };
            if let Bucket::Tree(bin) = *bucket {
                tree::check_invariants(&self.arena, bin)?;
            }
            let mut cur = Some(first);
            while let Some(n) = cur {
                let node = &self.arena[n];
                if self.index_for(node.hash) != i {
                    return Err("node stored in the wrong bucket");
                }
                if matches!(bucket, Bucket::List { .. }) && node.links != Default::default() {
                    return Err("list node carries tree links");
                }
                seen += 1;
                cur = node.next;
            }
        }
        if seen != self.arena.len() {
            return Err("bucket chains and arena disagree on entry count");
        }
        Ok(())
    }
}
