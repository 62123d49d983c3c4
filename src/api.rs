//! The public, handle-based allocation API.
//!
//! Every function here takes and returns `*mut u8` handles: the address of
//! a payload, never a `Context` pointer. Handles from this crate must never
//! be passed to another allocator's functions, or vice versa, per §1/§6.
//!
//! A null handle where one is required, or an `unref` naming a parent that
//! is not actually a parent of the given handle, is a programmer error: it
//! is logged and aborts the process rather than being reported through a
//! return value. Allocation and reallocation failure are the only
//! recoverable outcomes, reported as a null return.

use core::ptr::{self, NonNull};

use crate::context::Context;
use crate::fatal::fatal_assert;
use crate::realloc;
use crate::reference::Reference;
use crate::teardown;

unsafe fn handle_to_context(handle: *mut u8) -> NonNull<Context> {
    let handle = unsafe { NonNull::new_unchecked(handle) };
    unsafe { Context::from_handle(handle) }
}

/// Allocates `size` bytes, optionally attaching them as a child of `parent`.
///
/// Pass `ptr::null_mut()` for `parent` to allocate a root with no parent;
/// such an allocation is only ever freed by an explicit [`free`] or
/// [`discard`] call, never cascaded into from elsewhere.
///
/// Returns the new handle, or null if the system is out of memory.
///
/// # Safety
///
/// `parent`, if non-null, must be a live handle previously returned by this
/// crate's own allocation functions.
///
/// ```
/// use banyan::allocate;
/// use std::ptr;
///
/// unsafe {
///     let root = allocate(ptr::null_mut(), 64);
///     assert!(!root.is_null());
///     banyan::free(root);
/// }
/// ```
pub unsafe fn allocate(parent: *mut u8, size: usize) -> *mut u8 {
    let layout = match Context::layout_for(size) {
        Some(layout) => layout,
        None => return ptr::null_mut(),
    };
    let raw = unsafe { crate::hooks::malloc(layout) };
    let ctx = match NonNull::new(raw) {
        Some(raw) => raw.cast::<Context>(),
        None => return ptr::null_mut(),
    };
    unsafe { Context::init(ctx, size) };

    if !parent.is_null() {
        let parent_ctx = unsafe { handle_to_context(parent) };
        unsafe { Reference::link(parent_ctx, ctx) };
    }

    trace!("banyan: allocated {} bytes", size);
    unsafe { Context::payload(ctx).as_ptr() }
}

/// Resizes the block backing `handle` to `size` bytes, preserving every
/// parent and child edge. `handle` may be null, in which case this behaves
/// like [`allocate`]. Returns the (possibly moved) new handle, or null on
/// allocation failure, in which case `handle` remains fully valid and
/// unchanged.
///
/// # Safety
///
/// `handle`, if non-null, must be a live handle previously returned by this
/// crate's own allocation functions. `parent` behaves as in [`allocate`]
/// and is only consulted when `handle` is null.
pub unsafe fn reallocate(handle: *mut u8, parent: *mut u8, size: usize) -> *mut u8 {
    if handle.is_null() {
        return unsafe { allocate(parent, size) };
    }
    let ctx = unsafe { handle_to_context(handle) };
    match unsafe { realloc::reallocate(ctx, size) } {
        Some(new_ctx) => {
            trace!("banyan: reallocated to {} bytes", size);
            unsafe { Context::payload(new_ctx).as_ptr() }
        }
        None => ptr::null_mut(),
    }
}

/// Installs `destructor` to run when `handle` is finalized, replacing any
/// previously set destructor.
///
/// # Safety
///
/// `handle` must be a live handle previously returned by this crate's own
/// allocation functions.
pub unsafe fn set_destructor<F>(handle: *mut u8, destructor: F)
where
    F: FnMut(*mut u8) -> i32 + 'static,
{
    fatal_assert!(!handle.is_null(), "set_destructor called with a null handle");
    let ctx = unsafe { handle_to_context(handle) };
    unsafe { (*ctx.as_ptr()).destructor = Some(Box::new(destructor)) };
}

/// Removes whatever destructor is installed on `handle`, if any.
///
/// # Safety
///
/// `handle` must be a live handle previously returned by this crate's own
/// allocation functions.
pub unsafe fn clear_destructor(handle: *mut u8) {
    fatal_assert!(!handle.is_null(), "clear_destructor called with a null handle");
    let ctx = unsafe { handle_to_context(handle) };
    unsafe { (*ctx.as_ptr()).destructor = None };
}

/// Adds an edge from `parent` to `handle`, keeping `handle` alive at least
/// as long as `parent` (or until the edge is removed with [`unref`]).
/// Duplicate edges between the same two handles are permitted.
///
/// # Safety
///
/// `handle` and `parent` must both be live handles previously returned by
/// this crate's own allocation functions.
pub unsafe fn add_ref(handle: *mut u8, parent: *mut u8) {
    fatal_assert!(!handle.is_null(), "add_ref called with a null handle");
    fatal_assert!(!parent.is_null(), "add_ref called with a null parent");
    let child_ctx = unsafe { handle_to_context(handle) };
    let parent_ctx = unsafe { handle_to_context(parent) };
    unsafe { Reference::link(parent_ctx, child_ctx) };
}

/// Removes one edge from `parent` to `handle`. If that was `handle`'s last
/// remaining parent, `handle` is torn down and freed immediately (which may
/// itself cascade into `handle`'s own children).
///
/// It is a programmer error for `parent` not to actually be a parent of
/// `handle`.
///
/// # Safety
///
/// `handle` and `parent` must both be live handles previously returned by
/// this crate's own allocation functions, and `handle` must not be used
/// again if this call tears it down.
pub unsafe fn unref(handle: *mut u8, parent: *mut u8) {
    fatal_assert!(!handle.is_null(), "unref called with a null handle");
    fatal_assert!(!parent.is_null(), "unref called with a null parent");
    let child_ctx = unsafe { handle_to_context(handle) };
    let parent_ctx = unsafe { handle_to_context(parent) };
    let removed = unsafe { Reference::unlink_one(parent_ctx, child_ctx) };
    fatal_assert!(removed, "unref: parent is not actually a parent of handle");
    if unsafe { crate::list::ListNode::is_empty(Context::parents_head(child_ctx)) } {
        unsafe { teardown::teardown(child_ctx) };
    }
}

/// Tears `handle` down unconditionally: severs every parent edge, runs its
/// destructor, then cascades into its children. Returns the destructor's
/// status, or `0` if none was set.
///
/// # Safety
///
/// `handle` must be a live handle previously returned by this crate's own
/// allocation functions, and must not be used again after this call.
pub unsafe fn free(handle: *mut u8) -> i32 {
    fatal_assert!(!handle.is_null(), "free called with a null handle");
    let ctx = unsafe { handle_to_context(handle) };
    unsafe { teardown::teardown(ctx) }
}

/// Tears `handle` down only if it currently has no parents; a no-op
/// otherwise. Returns the destructor's status, or `0` if the destructor did
/// not run (either it was absent, or `handle` still has a parent).
///
/// # Safety
///
/// `handle` must be a live handle previously returned by this crate's own
/// allocation functions.
pub unsafe fn discard(handle: *mut u8) -> i32 {
    fatal_assert!(!handle.is_null(), "discard called with a null handle");
    let ctx = unsafe { handle_to_context(handle) };
    if unsafe { crate::list::ListNode::is_empty(Context::parents_head(ctx)) } {
        unsafe { teardown::teardown(ctx) }
    } else {
        0
    }
}

/// Whether `handle` has `parent` as a parent, or (if `parent` is null) has
/// any parent at all.
///
/// # Safety
///
/// `handle` must be a live handle; `parent`, if non-null, must be a live
/// handle.
pub unsafe fn has_parent(handle: *mut u8, parent: *mut u8) -> bool {
    fatal_assert!(!handle.is_null(), "has_parent called with a null handle");
    let ctx = unsafe { handle_to_context(handle) };
    let parent_ctx = if parent.is_null() {
        None
    } else {
        Some(unsafe { handle_to_context(parent) })
    };
    unsafe { Reference::has_parent(ctx, parent_ctx) }
}

/// The usable payload size of `handle`, as reported by the system
/// allocator — may be larger than the size originally requested.
///
/// # Safety
///
/// `handle` must be a live handle previously returned by this crate's own
/// allocation functions.
pub unsafe fn size(handle: *mut u8) -> usize {
    fatal_assert!(!handle.is_null(), "size called with a null handle");
    let ctx = unsafe { handle_to_context(handle) };
    unsafe { Context::usable_payload_size(ctx) }
}

/// Calls [`discard`] on `*local` if it is non-null. Meant to be paired with
/// a scope guard pattern: keep a handle in a local, and call this on every
/// exit path to discard it unless ownership was transferred elsewhere
/// (e.g. by handing it a parent before the scope ends).
///
/// # Safety
///
/// `*local`, if non-null, must be a live handle previously returned by this
/// crate's own allocation functions.
pub unsafe fn scoped_discard(local: &mut *mut u8) {
    if !local.is_null() {
        unsafe { discard(*local) };
    }
}
