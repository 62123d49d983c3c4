//! `banyan` is a single-threaded, general purpose object allocator where
//! liveness is determined by a directed graph of parent → child references
//! rather than an ordinary reference count.
//!
//! Every allocation is an untyped block of bytes, identified by a raw
//! `*mut u8` handle — the address of the payload, not a typed smart
//! pointer — in the spirit of `malloc`. An allocation stays alive as long
//! as at least one parent reference points to it; when its last parent
//! reference is removed, it is torn down immediately: its own parent edges
//! are severed first (breaking any cycle that passes through it), then its
//! destructor runs, then its own child edges are severed, recursively
//! tearing down any child left with no remaining parent.
//!
//! A banyan tree roots new trunks from its own aerial branches, forming one
//! tangled, multiply-rooted structure — the same shape as a graph of
//! objects that can have more than one parent.
//!
//! ```
//! use banyan::{allocate, free, has_parent};
//! use std::ptr;
//!
//! unsafe {
//!     let parent = allocate(ptr::null_mut(), 16);
//!     let child = allocate(parent, 32);
//!     assert!(has_parent(child, parent));
//!
//!     // `child` outlives `parent` being freed only if it has another
//!     // parent; here it doesn't, so freeing `parent` cascades into it.
//!     free(parent);
//! }
//! ```

#[macro_use]
extern crate log;

mod api;
mod context;
mod fatal;
mod hooks;
mod list;
mod realloc;
mod reference;
#[cfg(test)]
mod tests;
mod teardown;

pub use api::{
    add_ref, allocate, clear_destructor, discard, free, has_parent, reallocate, scoped_discard,
    set_destructor, size, unref,
};
pub use hooks::{reset_hooks, set_hooks, FreeHook, MallocHook, ReallocHook};
