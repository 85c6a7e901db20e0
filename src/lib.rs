//! hybrid-hashmap: a single-threaded hash map whose buckets are short
//! chains that turn into red-black trees when too many keys collide.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: average O(1) get/insert/remove, degrading to O(log n) instead
//!   of O(n) when many keys share a bucket.
//! - Layers:
//!   - `node`: arena-allocated entries (`slotmap`), each caching its
//!     32-bit spread hash, plus the `Bucket` sum type
//!     (`Empty | List | Tree`).
//!   - `tree`: red-black insert/delete/split over arena keys. A tree
//!     bucket is also a doubly-linked list so it can be iterated and
//!     untreeified in order.
//!   - `table`: the power-of-two bucket array, lazy allocation, resize
//!     by bit-partitioning, and list/tree promotion.
//!   - `map::HybridMap`: hashing, the public API, hook dispatch.
//!
//! Constraints
//! - Capacity is a power of two in `[1, 2^30]`; the table doubles once
//!   `len > capacity * load_factor`.
//! - A list bucket becomes a tree when an append makes it 9 long and the
//!   table has at least 64 buckets; smaller tables grow instead.
//! - A split half of at most 6 nodes is stored as a list. Removal turns a
//!   tree back into a list based on the tree's shape, not its size.
//! - `K: Hash` is called once per operation on the probe key; stored
//!   entries are placed by their cached hash.
//!
//! Hashing and ordering
//! - The `u64` from the `BuildHasher` is folded to 32 bits and its high
//!   half is XOR-ed into the low half before masking, so high bits still
//!   influence small tables.
//! - Equal hashes inside a tree are ordered by the `KeyOrder` strategy
//!   (`Unordered` or `Natural`), then by arena key. Lookups with no usable
//!   order search both subtrees.
//!
//! Fail-fast traversal
//! - Every structural change bumps a per-map modification count.
//! - Borrowing iterators cannot observe concurrent changes; `Cursor` holds
//!   no borrow and re-checks the count on every step, failing with
//!   `MapError::ConcurrentModification`. `Cursor::remove` is the one
//!   structural change it tolerates.
//!
//! Notes and non-goals
//! - Not thread-safe; the map is `Send` when its contents are, so it can
//!   live behind a lock.
//! - No persistence or stable serialization format.
//! - `iter_mut`, `values_mut`, `into_iter` and `drain` visit entries in
//!   storage order; shared iterators use bucket order.
//!
//! Logging
//! - With the `logging` feature, resizes are reported at `debug` and
//!   treeify/untreeify at `trace` through the `log` facade.

mod builder;
mod error;
mod hooks;
mod iter;
mod map;
#[cfg(test)]
mod map_proptest;
mod modcount;
mod node;
mod order;
mod table;
mod tree;

// Public surface
pub use builder::MapBuilder;
pub use error::MapError;
pub use hooks::{EntryHooks, NoHooks};
pub use iter::{Cursor, Drain, IntoIter, Iter, IterMut, Keys, Values, ValuesMut};
pub use map::HybridMap;
pub use node::BucketKind;
pub use order::{KeyOrder, Natural, Unordered};
pub use table::{BucketStats, MAXIMUM_CAPACITY};
