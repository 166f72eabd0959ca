//! Raw memory block management
//!
//! The tries and the URI codec allocate through a single process-wide
//! allocator collaborator rather than owning one. This module provides
//! the block primitive, the allocator interface, and the system-backed
//! singleton.

mod block;

pub use block::{global, Allocator, MemBlock, SystemAllocator, MIN_ALIGN};

pub(crate) use block::{alloc_raw, free_raw};
