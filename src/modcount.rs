//! Structural modification counter used for fail-fast traversal.

use crate::error::MapError;

/// Per-instance counter bumped on every structural change (new key, removal,
/// resize, treeify/untreeify, clear). Value-only updates leave it alone.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct ModCount(u64);

impl ModCount {
    #[inline]
    pub(crate) fn get(self) -> u64 {
        self.0
    }

    #[inline]
    pub(crate) fn bump(&mut self) {
        self.0 = self.0.wrapping_add(1);
    }

    /// Compare against a snapshot taken earlier.
    #[inline]
    pub(crate) fn check(self, expected: u64) -> Result<(), MapError> {
        if self.0 == expected {
            Ok(())
        } else {
            Err(MapError::ConcurrentModification {
                expected,
                found: self.0,
            })
        }
    }
}
