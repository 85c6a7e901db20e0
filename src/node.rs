//! Entry storage: arena-allocated nodes, their tree links, and the bucket
//! representation stored in the table.

use slotmap::SlotMap;

slotmap::new_key_type! {
    /// Generational key of a node in the entry arena.
    pub(crate) struct NodeKey;
}

pub(crate) type Arena<K, V> = SlotMap<NodeKey, Node<K, V>>;

/// Red-black and doubly-linked-list links of a node.
///
/// Only meaningful while the node's bucket is a `Bucket::Tree`; list buckets
/// keep them cleared.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct TreeLinks {
    pub(crate) parent: Option<NodeKey>,
    pub(crate) left: Option<NodeKey>,
    pub(crate) right: Option<NodeKey>,
    pub(crate) prev: Option<NodeKey>,
    pub(crate) red: bool,
}

#[derive(Clone, Debug)]
pub(crate) struct Node<K, V> {
    pub(crate) hash: u32,
    pub(crate) key: K,
    pub(crate) value: V,
    pub(crate) next: Option<NodeKey>,
    pub(crate) links: TreeLinks,
}

impl<K, V> Node<K, V> {
    pub(crate) fn new(hash: u32, key: K, value: V) -> Self {
        Self {
            hash,
            key,
            value,
            next: None,
            links: TreeLinks::default(),
        }
    }
}

/// Head of a tree bucket. `first` starts the bucket's list view and need not
/// be the root.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct TreeBin {
    pub(crate) root: NodeKey,
    pub(crate) first: NodeKey,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) enum Bucket {
    #[default]
    Empty,
    List {
        head: NodeKey,
    },
    Tree(TreeBin),
}

impl Bucket {
    /// First node in list order, if any.
    #[inline]
    pub(crate) fn first(self) -> Option<NodeKey> {
        match self {
            Bucket::Empty => None,
            Bucket::List { head } => Some(head),
            Bucket::Tree(bin) => Some(bin.first),
        }
    }
}

/// Representation of a non-empty bucket, as reported by
/// [`HybridMap::bucket_kind`](crate::HybridMap::bucket_kind).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BucketKind {
    List,
    Tree,
}

/// Fold a 64-bit hasher output to the 32-bit hash cached in each node.
///
/// Bucket indices only use the low bits of the hash, so the upper half is
/// XOR-folded down twice: 64 to 32 bits, then the high 16 bits into the low 16.
#[inline]
pub(crate) fn spread(raw: u64) -> u32 {
    let h = (raw ^ (raw >> 32)) as u32;
    h ^ (h >> 16)
}
