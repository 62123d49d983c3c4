//! Reallocation with list-fixup: §4.2's snapshot/reinsert protocol.
//!
//! `realloc` byte-copies the old block to its new address (or returns the
//! same address), which means `Context::parents`/`children` arrive at the
//! new address already holding correct `prev`/`next` pointers to whatever
//! was first and last in each list before the move — except the two stale
//! edges that still point at the header's old address. We snapshot each
//! list's first element beforehand (`None` if empty) and let
//! `ListNode::reattach_after_move` do the rest; the list's own tail is
//! recovered as the post-move head's `prev`, no extra snapshot needed.

use core::ptr::NonNull;

use crate::context::Context;
use crate::hooks;
use crate::list::ListNode;
use crate::reference::Reference;

/// Grows or shrinks the block backing `ctx` to hold `new_size` payload
/// bytes, repairing both the parent and child lists in place. Returns the
/// new `Context` address, or `None` on allocation failure, in which case
/// `ctx` is left completely untouched (every write here happens only after
/// the underlying `realloc` call has already succeeded).
///
/// # Safety
///
/// `ctx` must point to a valid, live `Context` allocated by this crate's own
/// hooks.
pub(crate) unsafe fn reallocate(ctx: NonNull<Context>, new_size: usize) -> Option<NonNull<Context>> {
    let old_size = unsafe { (*ctx.as_ptr()).requested_size };
    let old_layout = Context::layout_for(old_size)?;
    let new_layout = Context::layout_for(new_size)?;

    let parents_first = unsafe { first_or_none(Context::parents_head(ctx)) };
    let children_first = unsafe { first_or_none(Context::children_head(ctx)) };

    let raw = unsafe { hooks::realloc(ctx.as_ptr().cast(), old_layout, new_layout.size()) };
    let new_ctx = NonNull::new(raw)?.cast::<Context>();

    unsafe {
        ListNode::reattach_after_move(Context::parents_head(new_ctx), parents_first);
        ListNode::reattach_after_move(Context::children_head(new_ctx), children_first);

        for node in ListNode::iter(Context::parents_head(new_ctx)) {
            let reference = Reference::from_child_node(node);
            (*reference.as_ptr()).child = new_ctx;
        }
        for node in ListNode::iter(Context::children_head(new_ctx)) {
            let reference = Reference::from_parent_node(node);
            (*reference.as_ptr()).parent = new_ctx;
        }

        (*new_ctx.as_ptr()).requested_size = new_size;
    }

    Some(new_ctx)
}

/// # Safety
///
/// `head` must be valid.
unsafe fn first_or_none(head: NonNull<ListNode>) -> Option<NonNull<ListNode>> {
    if unsafe { ListNode::is_empty(head) } {
        None
    } else {
        Some(unsafe { ListNode::next(head) })
    }
}
