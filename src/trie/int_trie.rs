//! Sparse integer-keyed radix trie
//!
//! Maps a machine-word key to a caller-supplied object. Keys route
//! through a fixed root array chosen at construction, then through
//! 4-way branch nodes that each examine two key bits at an even `shift`
//! position. Along any root-to-leaf path the shifts strictly decrease,
//! every attached branch has at least two children, and stored objects
//! never move (pointer stability).

use std::ptr::NonNull;

use crate::adapter::TypeAdapter;
use crate::error::{QuadixError, Result};
use crate::memory;

use super::child::{BranchLike, Child, FANOUT};
use super::iter::TrieIter;
use super::{top_even_bit, TrieStats, WordKeyed};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Maximum root array size, as a power-of-two exponent
const MAX_TOP_BITS: u32 = 23;

/// Rule mapping a key to its slot in the root array.
///
/// The choice affects locality and iteration order only, never
/// correctness. Iteration follows key order iff the distribution
/// indexes the most significant key bits (`MsbPos`, `TopEightOf32`, or
/// a `Custom` whose `pos_shift` covers all lower bits).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum IntRootDist {
    /// 64 slots indexed by `key & 0x3F`
    SixBit,
    /// 256 slots indexed by `key & 0xFF`
    EightBit,
    /// One slot per MSB position of the key; key 0 shares slot 0
    MsbPos,
    /// 256 slots indexed by `(key >> 24) & 0xFF`
    TopEightOf32,
    /// General form: `(key >> pos_shift) & (top_size - 1)`
    Custom {
        /// Root array size; a power of two in `[2, 2^23]`
        top_size: usize,
        /// Right shift applied to the key before masking
        pos_shift: u32,
    },
}

impl IntRootDist {
    fn resolve(self) -> Result<(usize, u32, bool)> {
        match self {
            IntRootDist::SixBit => Ok((64, 0, false)),
            IntRootDist::EightBit => Ok((256, 0, false)),
            IntRootDist::MsbPos => Ok((usize::BITS as usize, 0, true)),
            IntRootDist::TopEightOf32 => Ok((256, 24, false)),
            IntRootDist::Custom {
                top_size,
                pos_shift,
            } => {
                if !top_size.is_power_of_two() || top_size < 2 || top_size > (1 << MAX_TOP_BITS) {
                    return Err(QuadixError::invalid_argument(
                        "root size must be a power of two in [2, 2^23]",
                    ));
                }
                let top_bits = top_size.trailing_zeros();
                if pos_shift > usize::BITS - top_bits {
                    return Err(QuadixError::invalid_argument(
                        "pos_shift exceeds the key width",
                    ));
                }
                Ok((top_size, pos_shift, false))
            }
        }
    }
}

/// Internal 4-way branch node of an [`IntTrie`]
pub struct IntBranch<L> {
    child: [Child<L, IntBranch<L>>; FANOUT],
    /// Even bit position; `(key >> shift) & 3` selects the child
    shift: u32,
    /// Count of non-empty children, >= 2 while attached
    used: u8,
}

impl<L> IntBranch<L> {
    /// Allocate a branch holding two children that disagree in the two
    /// key bits at `shift`.
    fn new(
        shift: u32,
        k1: usize,
        c1: Child<L, IntBranch<L>>,
        k2: usize,
        c2: Child<L, IntBranch<L>>,
    ) -> Result<NonNull<Self>> {
        let i1 = child_index(k1, shift);
        let i2 = child_index(k2, shift);
        debug_assert_ne!(i1, i2);

        let mut child = [Child::Empty; FANOUT];
        child[i1] = c1;
        child[i2] = c2;
        memory::alloc_raw(IntBranch {
            child,
            shift,
            used: 2,
        })
    }
}

impl<L> BranchLike<L> for IntBranch<L> {
    #[inline]
    fn child(&self, idx: usize) -> Child<L, Self> {
        self.child[idx]
    }
}

#[inline]
fn child_index(key: usize, shift: u32) -> usize {
    (key >> shift) & 3
}

/// Outcome of a root-to-slot walk for one key
struct FindState<L> {
    root_idx: usize,
    parent: Option<NonNull<IntBranch<L>>>,
    pparent: Option<NonNull<IntBranch<L>>>,
    child_idx: usize,
    pchild_idx: usize,
    found: Option<NonNull<L>>,
    found_key: usize,
}

/// Sparse map from machine-word keys to caller-supplied objects.
///
/// Objects implement [`WordKeyed`] to expose their embedded key. The
/// trie stores raw pointers to them: an inserted object must stay at
/// its address (and keep its key unchanged) until removed, unless an
/// adapter deep-copied it at insert time. Insert returns the pointer
/// under which the object is stored; that pointer stays valid and
/// unchanged until the matching remove.
///
/// # Examples
///
/// ```rust
/// use std::ptr::NonNull;
/// use quadix::{IntRootDist, IntTrie, WordKeyed};
///
/// struct Entry {
///     id: usize,
///     payload: &'static str,
/// }
///
/// impl WordKeyed for Entry {
///     fn key(&self) -> usize {
///         self.id
///     }
/// }
///
/// let mut trie = IntTrie::new(IntRootDist::SixBit)?;
/// let entry = Box::leak(Box::new(Entry { id: 9, payload: "nine" }));
/// unsafe { trie.try_insert(NonNull::from(entry), None)? };
///
/// assert_eq!(trie.at(9).map(|e| e.payload), Some("nine"));
/// assert!(trie.at(10).is_none());
/// # Ok::<(), quadix::QuadixError>(())
/// ```
pub struct IntTrie<L: WordKeyed> {
    root: Box<[Child<L, IntBranch<L>>]>,
    len: usize,
    pos_shift: u32,
    msb_root: bool,
}

impl<L: WordKeyed> IntTrie<L> {
    /// Create an empty trie with the given root distribution
    pub fn new(dist: IntRootDist) -> Result<Self> {
        let (top_size, pos_shift, msb_root) = dist.resolve()?;
        Ok(Self {
            root: vec![Child::Empty; top_size].into_boxed_slice(),
            len: 0,
            pos_shift,
            msb_root,
        })
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

    #[inline]
    fn root_index(&self, key: usize) -> usize {
        if self.msb_root {
            if key == 0 {
                0
            } else {
                (usize::BITS - 1 - key.leading_zeros()) as usize
            }
        } else {
            (key >> self.pos_shift) & (self.root.len() - 1)
        }
    }

    fn find(&self, key: usize) -> FindState<L> {
        let root_idx = self.root_index(key);
        let mut state = FindState {
            root_idx,
            parent: None,
            pparent: None,
            child_idx: 0,
            pchild_idx: 0,
            found: None,
            found_key: 0,
        };

        let mut cur = self.root[root_idx];
        loop {
            match cur {
                Child::Empty => return state,
                Child::Leaf(leaf) => {
                    // Safety: stored leaves are valid per the insert contract
                    state.found_key = unsafe { leaf.as_ref() }.key();
                    state.found = Some(leaf);
                    return state;
                }
                Child::Branch(branch) => {
                    // Safety: branches are owned by this trie
                    let node = unsafe { branch.as_ref() };
                    state.pparent = state.parent;
                    state.pchild_idx = state.child_idx;
                    state.parent = Some(branch);
                    state.child_idx = child_index(key, node.shift);
                    cur = node.child[state.child_idx];
                }
            }
        }
    }

    /// Look up the object stored under `key`
    pub fn at(&self, key: usize) -> Option<&L> {
        let state = self.find(key);
        let leaf = state.found.filter(|_| state.found_key == key)?;
        // Safety: stored leaves are valid per the insert contract
        Some(unsafe { &*leaf.as_ptr() })
    }

    /// True if an object is stored under `key`
    pub fn contains(&self, key: usize) -> bool {
        self.at(key).is_some()
    }

    /// Insert an object, logging when the key is already present.
    ///
    /// If `adapter` provides a copy constructor the trie stores and
    /// later owns a deep copy; otherwise it stores `leaf` itself and
    /// the caller retains ownership. Returns the stored pointer.
    ///
    /// # Safety
    ///
    /// `leaf` must point to a live object whose address and key stay
    /// valid until the entry is removed or the trie is destroyed
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
            tracing::debug!(key = unsafe { leaf.as_ref() }.key(), "int trie insert: key already present");
        }
        result
    }

    /// Insert without logging on `AlreadyExists`.
    ///
    /// # Safety
    ///
    /// Same contract as [`IntTrie::insert`].
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
        let key = unsafe { leaf.as_ref() }.key();
        let state = self.find(key);

        // Duplicate check runs before the copy so a miss allocates nothing
        if state.found.is_some() && state.found_key == key {
            return Err(QuadixError::AlreadyExists);
        }

        let node = match adapter {
            // Safety: as above
            Some(a) => match a.new_copy(unsafe { leaf.as_ref() })? {
                Some(copy) => copy,
                None => leaf,
            },
            None => leaf,
        };

        match self.link(node, key, &state) {
            Ok(stored) => {
                self.len += 1;
                Ok(stored)
            }
            Err(err) => {
                // Release the adapter-owned copy; the trie is unchanged
                if node != leaf {
                    if let Some(a) = adapter {
                        let _ = a.delete(node);
                    }
                }
                Err(err)
            }
        }
    }

    /// Attach `node` for `key` given the find outcome. On error the
    /// trie is unchanged.
    fn link(&mut self, node: NonNull<L>, key: usize, state: &FindState<L>) -> Result<NonNull<L>> {
        let Some(parent) = state.parent else {
            return match state.found {
                None => {
                    // Empty root slot
                    self.root[state.root_idx] = Child::Leaf(node);
                    Ok(node)
                }
                Some(existing) => {
                    // Root slot holds a lone leaf with a different key
                    let diff = key ^ state.found_key;
                    let shift = top_even_bit(diff);
                    let branch = IntBranch::new(
                        shift,
                        key,
                        Child::Leaf(node),
                        state.found_key,
                        Child::Leaf(existing),
                    )?;
                    self.root[state.root_idx] = Child::Branch(branch);
                    Ok(node)
                }
            };
        };

        // Safety: branches are owned by this trie; no other reference is live
        let pnode = unsafe { &mut *parent.as_ptr() };

        if let Some(existing) = state.found {
            // Collided with a leaf of a different key below `parent`
            let q = state.found_key;
            let diff = key ^ q;
            let shift = top_even_bit(diff);
            if (diff >> pnode.shift) == 0 {
                // Divergence is strictly below the parent: split the slot
                let branch =
                    IntBranch::new(shift, key, Child::Leaf(node), q, Child::Leaf(existing))?;
                pnode.child[state.child_idx] = Child::Branch(branch);
                return Ok(node);
            }
            return self.prefix_split(node, key, q, shift, state.root_idx);
        }

        // Empty slot under an existing branch: compare against any leaf
        // already below the parent
        let q = first_key_under(parent);
        let diff = key ^ q;
        if (diff >> pnode.shift) & !3 == 0 {
            // Shares the parent's prefix: take the empty slot
            pnode.child[state.child_idx] = Child::Leaf(node);
            pnode.used += 1;
            return Ok(node);
        }
        let shift = top_even_bit(diff);
        self.prefix_split(node, key, q, shift, state.root_idx)
    }

    /// Splice a new branch at `shift` above the subtree the key's path
    /// leads to, holding that subtree and the new leaf.
    fn prefix_split(
        &mut self,
        node: NonNull<L>,
        key: usize,
        q: usize,
        shift: u32,
        root_idx: usize,
    ) -> Result<NonNull<L>> {
        let mut parent: Option<NonNull<IntBranch<L>>> = None;
        let mut child_idx = 0usize;
        let mut cur = self.root[root_idx];

        while let Child::Branch(branch) = cur {
            // Safety: branches are owned by this trie
            let bnode = unsafe { branch.as_ref() };
            if bnode.shift <= shift {
                break;
            }
            parent = Some(branch);
            child_idx = child_index(key, bnode.shift);
            cur = bnode.child[child_idx];
        }
        debug_assert!(!cur.is_empty());

        let branch = IntBranch::new(shift, key, Child::Leaf(node), q, cur)?;
        match parent {
            // Safety: as above
            Some(p) => unsafe { &mut *p.as_ptr() }.child[child_idx] = Child::Branch(branch),
            None => self.root[root_idx] = Child::Branch(branch),
        }
        Ok(node)
    }

    /// Remove the entry stored under `key`, logging on a miss.
    ///
    /// Returns the stored pointer without destroying the object; if the
    /// adapter copied it at insert time, pass the pointer to the
    /// adapter's `delete`.
    pub fn remove(&mut self, key: usize) -> Result<NonNull<L>> {
        let result = self.remove_impl(key);
        if let Err(QuadixError::NotFound) = &result {
            tracing::debug!(key, "int trie remove: key not found");
        }
        result
    }

    /// Remove without logging on `NotFound`
    pub fn try_remove(&mut self, key: usize) -> Result<NonNull<L>> {
        self.remove_impl(key)
    }

    fn remove_impl(&mut self, key: usize) -> Result<NonNull<L>> {
        let state = self.find(key);
        let leaf = state
            .found
            .filter(|_| state.found_key == key)
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
                    // Two children left: promote the survivor and drop
                    // the branch
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
                    // Safety: the branch is now unlinked and was allocated
                    // by alloc_raw; IntBranch has no drop glue
                    unsafe { memory::free_raw(parent) };
                }
            }
        }

        self.len -= 1;
        Ok(leaf)
    }

    /// Iterate over the stored objects in root-array order
    pub fn iter(&self) -> TrieIter<'_, L, IntBranch<L>> {
        TrieIter::new(&self.root)
    }

    /// Walk the structure and report size statistics
    pub fn stats(&self) -> TrieStats {
        let mut stats = TrieStats {
            num_keys: self.len,
            memory_usage: std::mem::size_of::<Self>()
                + self.root.len() * std::mem::size_of::<Child<L, IntBranch<L>>>(),
            ..TrieStats::default()
        };

        let mut stack: Vec<(NonNull<IntBranch<L>>, usize)> = Vec::new();
        for slot in self.root.iter() {
            if let Child::Branch(branch) = slot {
                stack.push((*branch, 1));
            }
        }
        while let Some((branch, depth)) = stack.pop() {
            stats.num_branches += 1;
            stats.max_depth = stats.max_depth.max(depth);
            stats.memory_usage += std::mem::size_of::<IntBranch<L>>();
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

        let mut stack: Vec<NonNull<IntBranch<L>>> = Vec::new();
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
            // Safety: unlinked above; IntBranch has no drop glue
            unsafe { memory::free_raw(branch) };
        }

        self.len = 0;
        match first_err {
            None => Ok(()),
            Some(err) => Err(err),
        }
    }
}

impl<L: WordKeyed> Drop for IntTrie<L> {
    fn drop(&mut self) {
        // Branches only; leaves belong to the caller or to an adapter
        // that destroy() would have been given
        let _ = self.release(None);
    }
}

impl<L: WordKeyed> std::fmt::Debug for IntTrie<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntTrie")
            .field("len", &self.len)
            .field("root_size", &self.root.len())
            .finish()
    }
}

/// Key of some leaf under `branch`, found by scanning children
/// left-to-right and descending into the first non-empty slot.
fn first_key_under<L: WordKeyed>(branch: NonNull<IntBranch<L>>) -> usize {
    let mut cur = branch;
    loop {
        // Safety: branches and leaves are owned/tracked by the calling trie
        let node = unsafe { cur.as_ref() };
        let slot = (0..FANOUT)
            .map(|idx| node.child[idx])
            .find(|slot| !slot.is_empty())
            .expect("attached branches hold at least two children");
        match slot {
            Child::Leaf(leaf) => return unsafe { leaf.as_ref() }.key(),
            Child::Branch(sub) => cur = sub,
            Child::Empty => unreachable!(),
        }
    }
}
