//! Byte-string-keyed radix trie
//!
//! Keys are arbitrary byte sequences. The key space treats a key as its
//! bytes followed by the length value itself at the virtual final
//! offset `usize::MAX`, encoded in a word-wide slot: two keys of
//! different length always differ there, so no stored key is a proper
//! prefix of another. Branches partition at an `(offset, shift)` pair —
//! byte offset into the key plus an even bit position — and those pairs
//! strictly advance along any root-to-leaf path (offset ascending,
//! shift descending within an offset).

use std::ptr::NonNull;

use crate::adapter::TypeAdapter;
use crate::error::{QuadixError, Result};
use crate::memory;

use super::child::{BranchLike, Child, FANOUT};
use super::iter::TrieIter;
use super::{top_even_bit, ByteKeyed, TrieStats};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The virtual final key position carrying the key length
const FINAL_POS: usize = usize::MAX;

/// Byte (or length) value of `key` at `offset` in the extended key space
#[inline]
fn key_value_at(key: &[u8], offset: usize) -> usize {
    if offset == FINAL_POS {
        key.len()
    } else if offset < key.len() {
        key[offset] as usize
    } else {
        0
    }
}

/// First position where two distinct keys disagree.
///
/// Returns the offset and the XOR of the two values there; for keys
/// that differ only in length this is `(FINAL_POS, len_a ^ len_b)`.
/// Identical keys are a caller error.
fn first_diff(a: &[u8], b: &[u8]) -> Result<(usize, usize)> {
    let shared = a.len().min(b.len());
    for offset in 0..shared {
        if a[offset] != b[offset] {
            return Ok((offset, (a[offset] ^ b[offset]) as usize));
        }
    }
    if a.len() != b.len() {
        return Ok((FINAL_POS, a.len() ^ b.len()));
    }
    Err(QuadixError::invalid_argument(
        "first_diff called on identical keys",
    ))
}

/// True if split position `a` is closer to the root than `b`:
/// smaller offset, or same offset and higher bit position.
#[inline]
fn splits_above(a_offset: usize, a_shift: u32, b_offset: usize, b_shift: u32) -> bool {
    a_offset < b_offset || (a_offset == b_offset && a_shift > b_shift)
}

/// Rule mapping a key to its slot in the root array.
///
/// Affects locality and iteration order only. None of these orders are
/// key-sorted in general; see the trie docs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum StrRootDist {
    /// 16 slots indexed by `len & 0xF`
    FourBitLenLow,
    /// 64 slots indexed by `len & 0x3F`
    SixBitLenLow,
    /// 8 slots indexed by the MSB position of the first byte
    MsbFirstByte,
    /// 16 slots indexed by the top 4 bits of the first byte
    FourBitFirstByte,
    /// 64 slots indexed by the top 6 bits of the first byte
    SixBitFirstByte,
    /// 256 slots indexed by the first byte
    EightBitFirstByte,
}

impl StrRootDist {
    fn size(self) -> usize {
        match self {
            StrRootDist::FourBitLenLow => 16,
            StrRootDist::SixBitLenLow => 64,
            StrRootDist::MsbFirstByte => 8,
            StrRootDist::FourBitFirstByte => 16,
            StrRootDist::SixBitFirstByte => 64,
            StrRootDist::EightBitFirstByte => 256,
        }
    }

    fn index(self, key: &[u8]) -> usize {
        // A missing first byte indexes like 0x00
        let b0 = key.first().copied().unwrap_or(0) as usize;
        match self {
            StrRootDist::FourBitLenLow => key.len() & 0xF,
            StrRootDist::SixBitLenLow => key.len() & 0x3F,
            StrRootDist::MsbFirstByte => {
                if b0 == 0 {
                    0
                } else {
                    (usize::BITS - 1 - b0.leading_zeros()) as usize
                }
            }
            StrRootDist::FourBitFirstByte => b0 >> 4,
            StrRootDist::SixBitFirstByte => b0 >> 2,
            StrRootDist::EightBitFirstByte => b0,
        }
    }
}

/// Internal 4-way branch node of a [`StrTrie`]
pub struct StrBranch<L> {
    child: [Child<L, StrBranch<L>>; FANOUT],
    /// Byte offset into the key, or `FINAL_POS` for the length slot
    offset: usize,
    /// Even bit position within the value at `offset`
    shift: u32,
    /// Count of non-empty children, >= 2 while attached
    used: u8,
}

impl<L> StrBranch<L> {
    fn new(
        offset: usize,
        shift: u32,
        k1: &[u8],
        c1: Child<L, StrBranch<L>>,
        k2: &[u8],
        c2: Child<L, StrBranch<L>>,
    ) -> Result<NonNull<Self>> {
        let i1 = (key_value_at(k1, offset) >> shift) & 3;
        let i2 = (key_value_at(k2, offset) >> shift) & 3;
        debug_assert_ne!(i1, i2);

        let mut child = [Child::Empty; FANOUT];
        child[i1] = c1;
        child[i2] = c2;
        memory::alloc_raw(StrBranch {
            child,
            offset,
            shift,
            used: 2,
        })
    }
}

impl<L> BranchLike<L> for StrBranch<L> {
    #[inline]
    fn child(&self, idx: usize) -> Child<L, Self> {
        self.child[idx]
    }
}

struct FindState<L> {
    root_idx: usize,
    parent: Option<NonNull<StrBranch<L>>>,
    pparent: Option<NonNull<StrBranch<L>>>,
    child_idx: usize,
    pchild_idx: usize,
    found: Option<NonNull<L>>,
}

/// Map from byte-string keys to caller-supplied objects.
///
/// Objects implement [`ByteKeyed`]; both the object and its key bytes
/// must stay valid and stable while the entry is stored. Distinct keys
/// of any lengths coexist — a key is never a prefix of another in the
/// extended key space — and stored objects never move (pointer
/// stability).
///
/// # Examples
///
/// ```rust
/// use std::ptr::NonNull;
/// use quadix::{ByteKeyed, StrRootDist, StrTrie};
///
/// struct Entry {
///     name: Vec<u8>,
/// }
///
/// impl ByteKeyed for Entry {
///     fn key(&self) -> &[u8] {
///         &self.name
///     }
/// }
///
/// let mut trie = StrTrie::new(StrRootDist::EightBitFirstByte);
/// let entry = Box::leak(Box::new(Entry { name: b"alpha".to_vec() }));
/// unsafe { trie.try_insert(NonNull::from(entry), None)? };
///
/// assert!(trie.contains(b"alpha"));
/// assert!(!trie.contains(b"alp"));
/// # Ok::<(), quadix::QuadixError>(())
/// ```
pub struct StrTrie<L: ByteKeyed> {
    root: Box<[Child<L, StrBranch<L>>]>,
    len: usize,
    dist: StrRootDist,
}

impl<L: ByteKeyed> StrTrie<L> {
    /// Create an empty trie with the given root distribution
    pub fn new(dist: StrRootDist) -> Self {
        Self {
            root: vec![Child::Empty; dist.size()].into_boxed_slice(),
            len: 0,
            dist,
        }
    }

    /// Number of stored objects
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// True if nothing is stored
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn find(&self, key: &[u8]) -> FindState<L> {
        let root_idx = self.dist.index(key);
        let mut state = FindState {
            root_idx,
            parent: None,
            pparent: None,
            child_idx: 0,
            pchild_idx: 0,
            found: None,
        };

        let mut cur = self.root[root_idx];
        loop {
            match cur {
                Child::Empty => return state,
                Child::Leaf(leaf) => {
                    state.found = Some(leaf);
                    return state;
                }
                Child::Branch(branch) => {
                    // Safety: branches are owned by this trie
                    let node = unsafe { branch.as_ref() };
                    state.pparent = state.parent;
                    state.pchild_idx = state.child_idx;
                    state.parent = Some(branch);
                    state.child_idx = (key_value_at(key, node.offset) >> node.shift) & 3;
                    cur = node.child[state.child_idx];
                }
            }
        }
    }

    /// Look up the object stored under `key`
    pub fn at(&self, key: &[u8]) -> Option<&L> {
        let state = self.find(key);
        let leaf = state.found?;
        // Safety: stored leaves are valid per the insert contract
        let obj = unsafe { &*leaf.as_ptr() };
        // Full byte compare including length, not just the branch path
        (obj.key() == key).then_some(obj)
    }

    /// True if an object is stored under `key`
    pub fn contains(&self, key: &[u8]) -> bool {
        self.at(key).is_some()
    }

    /// Insert an object, logging when the key is already present.
    ///
    /// If `adapter` provides a copy constructor the trie stores and
    /// later owns a deep copy (whose key bytes must equal the
    /// original's); otherwise the caller retains ownership of `leaf`.
    ///
    /// # Safety
    ///
    /// `leaf` — and the bytes its key borrows — must stay valid and
    /// unchanged until the entry is removed or the trie is destroyed
    /// (irrelevant when the adapter copies: `leaf` only needs to be
    /// valid for this call).
    pub unsafe fn insert(
        &mut self,
        leaf: NonNull<L>,
        adapter: Option<&dyn TypeAdapter<L>>,
    ) -> Result<NonNull<L>> {
        // Safety: forwarded caller contract
        let result = unsafe { self.insert_impl(leaf, adapter) };
        if let Err(QuadixError::AlreadyExists) = &result {
            let key_len = unsafe { leaf.as_ref() }.key().len();
            tracing::debug!(key_len, "str trie insert: key already present");
        }
        result
    }

    /// Insert without logging on `AlreadyExists`.
    ///
    /// # Safety
    ///
    /// Same contract as [`StrTrie::insert`].
    pub unsafe fn try_insert(
        &mut self,
        leaf: NonNull<L>,
        adapter: Option<&dyn TypeAdapter<L>>,
    ) -> Result<NonNull<L>> {
        // Safety: forwarded caller contract
        unsafe { self.insert_impl(leaf, adapter) }
    }

    unsafe fn insert_impl(
        &mut self,
        leaf: NonNull<L>,
        adapter: Option<&dyn TypeAdapter<L>>,
    ) -> Result<NonNull<L>> {
        // Safety: caller guarantees leaf is live for this call
        let src_key = unsafe { &*leaf.as_ptr() }.key();
        if src_key.len() == FINAL_POS {
            return Err(QuadixError::invalid_argument(
                "key length usize::MAX is reserved",
            ));
        }

        let state = self.find(src_key);
        if let Some(found) = state.found {
            // Safety: stored leaves are valid per the insert contract
            if unsafe { &*found.as_ptr() }.key() == src_key {
                return Err(QuadixError::AlreadyExists);
            }
        }

        let node = match adapter {
            // Safety: as above
            Some(a) => match a.new_copy(unsafe { &*leaf.as_ptr() })? {
                Some(copy) => copy,
                None => leaf,
            },
            None => leaf,
        };

        // Safety: node is either leaf or a fresh adapter copy; both live
        let result = self.link(node, unsafe { &*node.as_ptr() }.key(), &state);
        match result {
            Ok(stored) => {
                self.len += 1;
                Ok(stored)
            }
            Err(err) => {
                if node != leaf {
                    if let Some(a) = adapter {
                        let _ = a.delete(node);
                    }
                }
                Err(err)
            }
        }
    }

    fn link(&mut self, node: NonNull<L>, key: &[u8], state: &FindState<L>) -> Result<NonNull<L>> {
        let Some(parent) = state.parent else {
            return match state.found {
                None => {
                    self.root[state.root_idx] = Child::Leaf(node);
                    Ok(node)
                }
                Some(existing) => {
                    // Safety: stored leaves are valid per the insert contract
                    let q = unsafe { &*existing.as_ptr() }.key();
                    let (offset, diff) = first_diff(key, q)?;
                    let shift = top_even_bit(diff);
                    let branch = StrBranch::new(
                        offset,
                        shift,
                        key,
                        Child::Leaf(node),
                        q,
                        Child::Leaf(existing),
                    )?;
                    self.root[state.root_idx] = Child::Branch(branch);
                    Ok(node)
                }
            };
        };

        // Safety: branches are owned by this trie
        let pnode = unsafe { &mut *parent.as_ptr() };

        if let Some(existing) = state.found {
            // Safety: stored leaves are valid per the insert contract
            let q = unsafe { &*existing.as_ptr() }.key();
            let (offset, diff) = first_diff(key, q)?;
            let shift = top_even_bit(diff);
            if splits_above(pnode.offset, pnode.shift, offset, shift) {
                // Divergence is strictly below the parent: split the slot
                let branch = StrBranch::new(
                    offset,
                    shift,
                    key,
                    Child::Leaf(node),
                    q,
                    Child::Leaf(existing),
                )?;
                pnode.child[state.child_idx] = Child::Branch(branch);
                return Ok(node);
            }
            return self.prefix_split(node, key, q, offset, shift, state.root_idx);
        }

        // Empty slot under an existing branch
        let q_leaf = first_leaf_under(parent);
        // Safety: as above
        let q = unsafe { &*q_leaf.as_ptr() }.key();
        let (offset, diff) = first_diff(key, q)?;
        let shift = top_even_bit(diff);
        if !splits_above(offset, shift, pnode.offset, pnode.shift) {
            // Divergence not above the parent's window: the empty slot
            // is the right home
            pnode.child[state.child_idx] = Child::Leaf(node);
            pnode.used += 1;
            return Ok(node);
        }
        self.prefix_split(node, key, q, offset, shift, state.root_idx)
    }

    fn prefix_split(
        &mut self,
        node: NonNull<L>,
        key: &[u8],
        q: &[u8],
        offset: usize,
        shift: u32,
        root_idx: usize,
    ) -> Result<NonNull<L>> {
        let mut parent: Option<NonNull<StrBranch<L>>> = None;
        let mut child_idx = 0usize;
        let mut cur = self.root[root_idx];

        while let Child::Branch(branch) = cur {
            // Safety: branches are owned by this trie
            let bnode = unsafe { branch.as_ref() };
            if !splits_above(bnode.offset, bnode.shift, offset, shift) {
                break;
            }
            parent = Some(branch);
            child_idx = (key_value_at(key, bnode.offset) >> bnode.shift) & 3;
            cur = bnode.child[child_idx];
        }
        debug_assert!(!cur.is_empty());

        let branch = StrBranch::new(offset, shift, key, Child::Leaf(node), q, cur)?;
        match parent {
            // Safety: as above
            Some(p) => unsafe { &mut *p.as_ptr() }.child[child_idx] = Child::Branch(branch),
            None => self.root[root_idx] = Child::Branch(branch),
        }
        Ok(node)
    }

    /// Remove the entry stored under `key`, logging on a miss.
    ///
    /// Returns the stored pointer without destroying the object.
    pub fn remove(&mut self, key: &[u8]) -> Result<NonNull<L>> {
        let result = self.remove_impl(key);
        if let Err(QuadixError::NotFound) = &result {
            tracing::debug!(key_len = key.len(), "str trie remove: key not found");
        }
        result
    }

    /// Remove without logging on `NotFound`
    pub fn try_remove(&mut self, key: &[u8]) -> Result<NonNull<L>> {
        self.remove_impl(key)
    }

    fn remove_impl(&mut self, key: &[u8]) -> Result<NonNull<L>> {
        let state = self.find(key);
        let leaf = state
            .found
            // Safety: stored leaves are valid per the insert contract
            .filter(|l| unsafe { &*l.as_ptr() }.key() == key)
            .ok_or(QuadixError::NotFound)?;

        match state.parent {
            None => {
                self.root[state.root_idx] = Child::Empty;
            }
            Some(parent) => {
                // Safety: branches are owned by this trie
                let pnode = unsafe { &mut *parent.as_ptr() };
                if pnode.used > 2 {
                    pnode.child[state.child_idx] = Child::Empty;
                    pnode.used -= 1;
                } else {
                    let mut other = Child::Empty;
                    for idx in 0..FANOUT {
                        if idx != state.child_idx && !pnode.child[idx].is_empty() {
                            other = pnode.child[idx];
                            break;
                        }
                    }
                    debug_assert!(!other.is_empty());
                    match state.pparent {
                        // Safety: as above
                        Some(pp) => unsafe { &mut *pp.as_ptr() }.child[state.pchild_idx] = other,
                        None => self.root[state.root_idx] = other,
                    }
                    // Safety: unlinked above; StrBranch has no drop glue
                    unsafe { memory::free_raw(parent) };
                }
            }
        }

        self.len -= 1;
        Ok(leaf)
    }

    /// Iterate over the stored objects in root-array order
    pub fn iter(&self) -> TrieIter<'_, L, StrBranch<L>> {
        TrieIter::new(&self.root)
    }

    /// Walk the structure and report size statistics
    pub fn stats(&self) -> TrieStats {
        let mut stats = TrieStats {
            num_keys: self.len,
            memory_usage: std::mem::size_of::<Self>()
                + self.root.len() * std::mem::size_of::<Child<L, StrBranch<L>>>(),
            ..TrieStats::default()
        };

        let mut stack: Vec<(NonNull<StrBranch<L>>, usize)> = Vec::new();
        for slot in self.root.iter() {
            if let Child::Branch(branch) = slot {
                stack.push((*branch, 1));
            }
        }
        while let Some((branch, depth)) = stack.pop() {
            stats.num_branches += 1;
            stats.max_depth = stats.max_depth.max(depth);
            stats.memory_usage += std::mem::size_of::<StrBranch<L>>();
            // Safety: branches are owned by this trie
            let node = unsafe { branch.as_ref() };
            for idx in 0..FANOUT {
                if let Child::Branch(sub) = node.child[idx] {
                    stack.push((sub, depth + 1));
                }
            }
        }
        stats
    }

    /// Destroy the trie, releasing every remaining leaf through the
    /// adapter's `delete` (when provided) and freeing every branch.
    ///
    /// Branch nodes are always freed, even when a callback fails; the
    /// first failure is returned after the walk completes.
    pub fn destroy(mut self, adapter: Option<&dyn TypeAdapter<L>>) -> Result<()> {
        self.release(adapter)
    }

    fn release(&mut self, adapter: Option<&dyn TypeAdapter<L>>) -> Result<()> {
        let mut first_err: Option<QuadixError> = None;
        let mut delete_leaf = |leaf: NonNull<L>| {
            if let Some(a) = adapter {
                if let Err(err) = a.delete(leaf) {
                    first_err.get_or_insert(err);
                }
            }
        };

        let mut stack: Vec<NonNull<StrBranch<L>>> = Vec::new();
        for slot in self.root.iter_mut() {
            match std::mem::replace(slot, Child::Empty) {
                Child::Empty => {}
                Child::Leaf(leaf) => delete_leaf(leaf),
                Child::Branch(branch) => stack.push(branch),
            }
        }
        while let Some(branch) = stack.pop() {
            // Safety: each branch is visited exactly once and freed below
            let node = unsafe { branch.as_ref() };
            for idx in 0..FANOUT {
                match node.child[idx] {
                    Child::Empty => {}
                    Child::Leaf(leaf) => delete_leaf(leaf),
                    Child::Branch(sub) => stack.push(sub),
                }
            }
            // Safety: unlinked above; StrBranch has no drop glue
            unsafe { memory::free_raw(branch) };
        }

        self.len = 0;
        match first_err {
            None => Ok(()),
            Some(err) => Err(err),
        }
    }
}

impl<L: ByteKeyed> Drop for StrTrie<L> {
    fn drop(&mut self) {
        let _ = self.release(None);
    }
}

impl<L: ByteKeyed> std::fmt::Debug for StrTrie<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrTrie")
            .field("len", &self.len)
            .field("dist", &self.dist)
            .finish()
    }
}

/// Some leaf under `branch`, found by scanning children left-to-right
/// and descending into the first non-empty slot.
fn first_leaf_under<L: ByteKeyed>(branch: NonNull<StrBranch<L>>) -> NonNull<L> {
    let mut cur = branch;
    loop {
        // Safety: branches are owned by the calling trie
        let node = unsafe { cur.as_ref() };
        let slot = (0..FANOUT)
            .map(|idx| node.child[idx])
            .find(|slot| !slot.is_empty())
            .expect("attached branches hold at least two children");
        match slot {
            Child::Leaf(leaf) => return leaf,
            Child::Branch(sub) => cur = sub,
            Child::Empty => unreachable!(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SNode {
        bytes: Vec<u8>,
        tag: u32,
    }

    impl ByteKeyed for SNode {
        fn key(&self) -> &[u8] {
            &self.bytes
        }
    }

    fn leaked(bytes: &[u8]) -> NonNull<SNode> {
        NonNull::from(Box::leak(Box::new(SNode {
            bytes: bytes.to_vec(),
            tag: bytes.len() as u32,
        })))
    }

    fn reclaim(ptr: NonNull<SNode>) {
        // Safety: ptr came from leaked() and is no longer stored anywhere
        unsafe { drop(Box::from_raw(ptr.as_ptr())) };
    }

    fn insert(trie: &mut StrTrie<SNode>, ptr: NonNull<SNode>) -> Result<NonNull<SNode>> {
        // Safety: test leaves live until reclaim()
        unsafe { trie.try_insert(ptr, None) }
    }

    #[test]
    fn test_key_value_at() {
        let key = b"ab";
        assert_eq!(key_value_at(key, 0), b'a' as usize);
        assert_eq!(key_value_at(key, 1), b'b' as usize);
        assert_eq!(key_value_at(key, 2), 0);
        assert_eq!(key_value_at(key, 1000), 0);
        assert_eq!(key_value_at(key, FINAL_POS), 2);
        assert_eq!(key_value_at(b"", FINAL_POS), 0);
    }

    #[test]
    fn test_first_diff() {
        assert_eq!(first_diff(b"abc", b"abd").unwrap(), (2, (b'c' ^ b'd') as usize));
        assert_eq!(first_diff(b"abc", b"ab").unwrap(), (FINAL_POS, 3 ^ 2));
        assert_eq!(first_diff(b"", b"x").unwrap(), (0, b'x' as usize));
        assert!(first_diff(b"same", b"same").is_err());
    }

    #[test]
    fn test_str_trie_insert_and_find() {
        let mut trie = StrTrie::new(StrRootDist::EightBitFirstByte);
        let keys: [&[u8]; 6] = [b"apple", b"apricot", b"banana", b"band", b"b", b""];
        let ptrs: Vec<_> = keys.iter().map(|k| leaked(k)).collect();

        for &ptr in &ptrs {
            insert(&mut trie, ptr).unwrap();
        }
        assert_eq!(trie.len(), keys.len());

        for (key, &ptr) in keys.iter().zip(&ptrs) {
            let found = trie.at(key).expect("inserted key is present");
            assert_eq!(found as *const SNode, ptr.as_ptr() as *const SNode);
            assert_eq!(found.tag, key.len() as u32);
        }
        assert!(trie.at(b"ap").is_none());
        assert!(trie.at(b"bananas").is_none());
        assert!(trie.at(b"c").is_none());

        for (key, ptr) in keys.iter().zip(ptrs) {
            trie.try_remove(key).unwrap();
            reclaim(ptr);
        }
        assert!(trie.is_empty());
    }

    #[test]
    fn test_str_trie_prefix_pairs_coexist() {
        // A shorter key is never a prefix of a longer one in the
        // extended key space
        let pairs: [(&[u8], &[u8]); 4] = [
            (b"a", b"ab"),
            (b"car", b"card"),
            (b"test", b"test\x00"),
            (b"", b"x"),
        ];

        for (shorter, longer) in pairs {
            for order in 0..2 {
                let mut trie = StrTrie::new(StrRootDist::FourBitFirstByte);
                let first = leaked(if order == 0 { shorter } else { longer });
                let second = leaked(if order == 0 { longer } else { shorter });

                insert(&mut trie, first).unwrap();
                insert(&mut trie, second).unwrap();

                assert!(trie.contains(shorter), "shorter key {shorter:?} present");
                assert!(trie.contains(longer), "longer key {longer:?} present");

                trie.try_remove(shorter).unwrap();
                trie.try_remove(longer).unwrap();
                reclaim(first);
                reclaim(second);
            }
        }
    }

    #[test]
    fn test_str_trie_zero_byte_keys_distinguished_by_length() {
        // All-zero keys of lengths 1..=25: only the virtual final
        // position tells them apart
        let mut trie = StrTrie::new(StrRootDist::SixBitFirstByte);
        let ptrs: Vec<_> = (1usize..=25).map(|len| leaked(&vec![0u8; len])).collect();

        for &ptr in &ptrs {
            insert(&mut trie, ptr).unwrap();
        }
        assert_eq!(trie.len(), 25);

        for len in 1..=25 {
            let key = vec![0u8; len];
            let found = trie.at(&key).expect("zero key present");
            assert_eq!(found.tag, len as u32);
        }
        assert!(trie.at(&vec![0u8; 26]).is_none());
        assert!(trie.at(b"").is_none());

        for (len, ptr) in (1usize..=25).zip(ptrs) {
            trie.try_remove(&vec![0u8; len]).unwrap();
            reclaim(ptr);
        }
    }

    #[test]
    fn test_str_trie_duplicate_insert() {
        let mut trie = StrTrie::new(StrRootDist::EightBitFirstByte);
        let first = leaked(b"dup");
        let second = leaked(b"dup");

        insert(&mut trie, first).unwrap();
        assert!(matches!(
            insert(&mut trie, second).unwrap_err(),
            QuadixError::AlreadyExists
        ));
        assert_eq!(trie.len(), 1);
        assert_eq!(
            trie.at(b"dup").unwrap() as *const SNode,
            first.as_ptr() as *const SNode
        );

        trie.try_remove(b"dup").unwrap();
        reclaim(first);
        reclaim(second);
    }

    #[test]
    fn test_str_trie_remove_collapses_branches() {
        let mut trie = StrTrie::new(StrRootDist::EightBitFirstByte);
        let keys: [&[u8]; 3] = [b"aa", b"ab", b"ac"];
        let ptrs: Vec<_> = keys.iter().map(|k| leaked(k)).collect();
        for &ptr in &ptrs {
            insert(&mut trie, ptr).unwrap();
        }

        // 'a' = 0x61: "aa"/"ab"/"ac" differ at offset 1 in the low bits
        trie.try_remove(b"ab").unwrap();
        assert!(trie.contains(b"aa"));
        assert!(trie.contains(b"ac"));

        trie.try_remove(b"aa").unwrap();
        let root_idx = trie.dist.index(b"ac");
        assert!(trie.root[root_idx].as_leaf().is_some(), "branch collapsed to leaf");
        assert!(trie.contains(b"ac"));

        trie.try_remove(b"ac").unwrap();
        assert!(trie.is_empty());

        for ptr in ptrs {
            reclaim(ptr);
        }
    }

    #[test]
    fn test_str_trie_iter_visits_each_leaf_once() {
        let mut trie = StrTrie::new(StrRootDist::SixBitLenLow);
        let keys: [&[u8]; 7] = [b"", b"a", b"b", b"ab", b"ba", b"abc", b"xyz"];
        let ptrs: Vec<_> = keys.iter().map(|k| leaked(k)).collect();
        for &ptr in &ptrs {
            insert(&mut trie, ptr).unwrap();
        }

        let mut seen: Vec<Vec<u8>> = trie.iter().map(|node| node.bytes.clone()).collect();
        seen.sort();
        let mut expected: Vec<Vec<u8>> = keys.iter().map(|k| k.to_vec()).collect();
        expected.sort();
        assert_eq!(seen, expected);

        for (key, ptr) in keys.iter().zip(ptrs) {
            trie.try_remove(key).unwrap();
            reclaim(ptr);
        }
    }

    #[test]
    fn test_str_trie_length_branch_beyond_byte_width() {
        // Lengths 0x100 and 0x200 differ above bit 7: the length slot
        // is wider than one byte
        let mut trie = StrTrie::new(StrRootDist::MsbFirstByte);
        let a = leaked(&vec![7u8; 0x100]);
        let b = leaked(&vec![7u8; 0x200]);

        insert(&mut trie, a).unwrap();
        insert(&mut trie, b).unwrap();

        assert!(trie.contains(&vec![7u8; 0x100]));
        assert!(trie.contains(&vec![7u8; 0x200]));
        assert!(!trie.contains(&vec![7u8; 0x180]));

        trie.try_remove(&vec![7u8; 0x100]).unwrap();
        trie.try_remove(&vec![7u8; 0x200]).unwrap();
        reclaim(a);
        reclaim(b);
    }

    #[test]
    fn test_str_trie_stats() {
        let mut trie = StrTrie::new(StrRootDist::EightBitFirstByte);
        let keys: [&[u8]; 4] = [b"na", b"nb", b"nc", b"nd"];
        let ptrs: Vec<_> = keys.iter().map(|k| leaked(k)).collect();
        for &ptr in &ptrs {
            insert(&mut trie, ptr).unwrap();
        }

        let stats = trie.stats();
        assert_eq!(stats.num_keys, 4);
        assert!(stats.num_branches >= 1);
        assert!(stats.memory_usage > 0);

        for (key, ptr) in keys.iter().zip(ptrs) {
            trie.try_remove(key).unwrap();
            reclaim(ptr);
        }
    }
}
