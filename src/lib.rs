//! # Quadix: Sparse Pointer-Stable Radix Tries
//!
//! This crate provides an in-memory indexing core built around two
//! 4-way radix tries, together with the infrastructure they need.
//!
//! ## Key Features
//!
//! - **IntTrie**: sparse map from a machine-word key to a user object
//! - **StrTrie**: map from an arbitrary byte-string key, with a
//!   virtual final key position so no key is a prefix of another
//! - **Pointer stability**: a stored object never moves between insert
//!   and remove
//! - **Type adapters**: pluggable copy/free/compare/hash callbacks so
//!   the tries handle objects without knowing their type
//! - **Explicit-stack iteration**: in-order traversal without recursion
//! - **URI codec**: percent-encoding, path normalization, query
//!   parameters, and RFC-3986 reference resolution over the same
//!   allocator primitives
//! - **Small utilities**: CRC-32, bit reversal, byte order, packed
//!   BCD, Galois LFSR, GCD
//!
//! ## Quick Start
//!
//! ```rust
//! use std::ptr::NonNull;
//! use quadix::{EncodedUri, IntRootDist, IntTrie, WordKeyed};
//!
//! struct Record {
//!     id: usize,
//! }
//!
//! impl WordKeyed for Record {
//!     fn key(&self) -> usize {
//!         self.id
//!     }
//! }
//!
//! // A trie of caller-owned records
//! let mut trie = IntTrie::new(IntRootDist::SixBit)?;
//! let record = Box::leak(Box::new(Record { id: 42 }));
//! unsafe { trie.try_insert(NonNull::from(record), None)? };
//! assert!(trie.contains(42));
//!
//! // URI parsing and resolution
//! let base = EncodedUri::parse(b"http://www.de/Path/file?X#Y")?;
//! let rel = EncodedUri::parse(b"../x.html")?;
//! let target = EncodedUri::resolve(&base, &rel)?;
//! assert_eq!(target.bytes(), b"http://www.de/x.html");
//! # Ok::<(), quadix::QuadixError>(())
//! ```
//!
//! ## Concurrency
//!
//! The core is single-threaded: no type here is `Send` or `Sync`, and
//! nothing blocks or yields. Iterators borrow their trie shared, so
//! the borrow checker rules out mutation during iteration.

#![warn(missing_docs)]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod adapter;
pub mod error;
pub mod memory;
pub mod trie;
pub mod uri;
pub mod utils;

pub use adapter::{BorrowAdapter, BoxAdapter, TypeAdapter};
pub use error::{QuadixError, Result};
pub use memory::{Allocator, MemBlock, SystemAllocator};
pub use trie::{
    ByteKeyed, IntRootDist, IntTrie, StrRootDist, StrTrie, TrieIter, TrieStats, WordKeyed,
};
pub use uri::{DecodedUri, EncodedUri, Part, UriAdapter};
