/// Errors signaled by [`HybridMap`](crate::HybridMap) and its builder.
///
/// None of these are transient; they report caller bugs or resource limits
/// and leave the map as it was at the point of detection.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum MapError {
    /// The map was structurally modified after a [`Cursor`](crate::Cursor)
    /// took its snapshot, by something other than the cursor itself.
    #[error(
        "map was structurally modified during traversal \
    (expected modification count {expected}, found {found})"
    )]
    ConcurrentModification { expected: u64, found: u64 },

    /// [`Cursor::remove`](crate::Cursor::remove) was called before `next`
    /// yielded an entry, or twice for the same entry.
    #[error("cursor has no current entry to remove")]
    NoCurrentEntry,

    /// A capacity request exceeds the largest table the map can allocate.
    #[error("requested capacity {requested} exceeds the maximum table capacity {max}")]
    CapacityOverflow { requested: usize, max: usize },

    /// Load factors must be positive and finite.
    #[error("load factor must be positive and finite, got {0}")]
    InvalidLoadFactor(f32),
}
