//! Sparse, pointer-stable multi-way radix tries
//!
//! Two tries share the same node machinery: [`IntTrie`] maps a machine
//! word to a stored object, [`StrTrie`] maps an arbitrary byte string.
//! Stored objects are supplied by the caller and embed their own key;
//! the tries never move a stored object after insertion (pointer
//! stability), and release them only through a
//! [`TypeAdapter`](crate::adapter::TypeAdapter) when asked to.

mod child;
mod int_trie;
mod iter;
mod str_trie;

pub use child::{BranchLike, Child, FANOUT};
pub use int_trie::{IntBranch, IntRootDist, IntTrie};
pub use iter::TrieIter;
pub use str_trie::{StrBranch, StrRootDist, StrTrie};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Key extraction for objects stored in an [`IntTrie`].
///
/// This is the trie's node header: a single machine-word key embedded in
/// the stored object. The key must not change while the object is in a
/// trie.
pub trait WordKeyed {
    /// The object's key
    fn key(&self) -> usize;
}

/// Key extraction for objects stored in a [`StrTrie`].
///
/// The returned bytes are the node header `(addr, len)`: they must stay
/// valid, stable, and unchanged for as long as the object is in a trie.
pub trait ByteKeyed {
    /// The object's key bytes
    fn key(&self) -> &[u8];
}

/// Statistics about trie structure
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TrieStats {
    /// Number of stored leaves
    pub num_keys: usize,
    /// Number of allocated branch nodes
    pub num_branches: usize,
    /// Longest root-to-leaf branch chain
    pub max_depth: usize,
    /// Bytes held by the trie itself (root array and branches; stored
    /// objects are not counted)
    pub memory_usage: usize,
}

/// Highest 2-bit-aligned set-bit position of `diff`.
///
/// `diff` must be non-zero; insert paths guarantee this because equal
/// keys short-circuit before any difference is computed.
#[inline]
pub(crate) fn top_even_bit(diff: usize) -> u32 {
    debug_assert_ne!(diff, 0);
    (usize::BITS - 1 - diff.leading_zeros()) & !1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_top_even_bit() {
        assert_eq!(top_even_bit(1), 0);
        assert_eq!(top_even_bit(2), 0);
        assert_eq!(top_even_bit(3), 0);
        assert_eq!(top_even_bit(4), 2);
        assert_eq!(top_even_bit(0b1100), 2);
        assert_eq!(top_even_bit(0b1_0000), 4);
        assert_eq!(top_even_bit(usize::MAX), usize::BITS - 2);
    }
}
