//! Key ordering used only to break ties between equal hashes inside a tree
//! bucket. It never decides bucket placement or iteration order.

use core::cmp::Ordering;

/// Secondary comparison of two keys whose hashes are equal.
///
/// Returning `Ordering::Equal` means "no opinion": the tree then falls back
/// to an exhaustive subtree search on lookup and to the identity tie-break on
/// insert. Implementations must agree between a key and its borrowed forms
/// (the usual `Borrow` contract).
pub trait KeyOrder<Q: ?Sized> {
    fn compare(&self, a: &Q, b: &Q) -> Ordering;
}

/// No secondary ordering. Works for every key type.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Unordered;

impl<Q: ?Sized> KeyOrder<Q> for Unordered {
    #[inline]
    fn compare(&self, _a: &Q, _b: &Q) -> Ordering {
        Ordering::Equal
    }
}

/// The key's natural `Ord`. Keeps colliding-hash lookups at O(log n).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Natural;

impl<Q: ?Sized + Ord> KeyOrder<Q> for Natural {
    #[inline]
    fn compare(&self, a: &Q, b: &Q) -> Ordering {
        a.cmp(b)
    }
}
