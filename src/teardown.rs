//! Cascading teardown: §4.3's free/discard/unref sequence.
//!
//! Order is load-bearing and exactly: sever every incoming (parent) edge
//! first, then run the destructor, then sever every outgoing (child) edge,
//! recursing into any child whose parent list becomes empty as a result,
//! then release the block. Severing parents before the destructor runs
//! breaks any cycle passing through this context deterministically, without
//! needing cycle detection: by the time the destructor sees the payload,
//! nothing can reach this context through a parent edge anymore.
//!
//! Because children are severed one edge at a time and a not-yet-visited
//! sibling edge is left intact until the walk reaches it, a destructor
//! invoked partway through this sequence cannot observe a sibling that has
//! already been freed out from under the walk: that sibling's incoming edge
//! from this context is still there, so its parent count cannot have
//! reached zero through any other path.

use core::ptr::NonNull;

use crate::context::Context;
use crate::hooks;
use crate::reference::Reference;

/// Tears `ctx` down: severs its parents, runs its destructor, severs and
/// recursively tears down any children left parentless, then releases the
/// block. Returns the destructor's status, or `0` if none was set.
///
/// # Safety
///
/// `ctx` must point to a valid, live `Context`, and must not be reachable
/// through any reference still believed live by its caller after this
/// returns.
pub(crate) unsafe fn teardown(ctx: NonNull<Context>) -> i32 {
    unsafe {
        Reference::sever_parents(ctx);
        let status = run_destructor(ctx);
        Reference::sever_children(ctx, |child| unsafe {
            teardown(child);
        });
        release(ctx);
        status
    }
}

/// # Safety
///
/// `ctx` must point to a valid, live `Context`.
unsafe fn run_destructor(ctx: NonNull<Context>) -> i32 {
    let destructor = unsafe { core::mem::take(&mut (*ctx.as_ptr()).destructor) };
    match destructor {
        Some(mut d) => unsafe { d(Context::payload(ctx).as_ptr()) },
        None => 0,
    }
}

/// # Safety
///
/// `ctx` must point to a valid `Context` whose lists are both already
/// empty, with a `requested_size` matching the block it was allocated with.
unsafe fn release(ctx: NonNull<Context>) {
    unsafe {
        let size = (*ctx.as_ptr()).requested_size;
        let layout = Context::layout_for(size)
            .expect("layout recomputation must succeed: it already succeeded once, at allocation time");
        hooks::free(ctx.as_ptr().cast(), layout);
    }
}
