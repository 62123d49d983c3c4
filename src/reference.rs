//! `Reference`: the standalone heap node representing one parent → child
//! edge in the allocation graph.
//!
//! Unlike an ordinary refcount, each edge is its own allocation, embedding
//! two [`ListNode`]s: one spliced into the parent's `children` list, one
//! spliced into the child's `parents` list. Duplicate edges between the same
//! two contexts are permitted and are simply two distinct `Reference`s.

use core::ptr::NonNull;

use crate::context::Context;
use crate::list::ListNode;

#[repr(C)]
pub(crate) struct Reference {
    pub(crate) parent: NonNull<Context>,
    pub(crate) child: NonNull<Context>,
    parent_node: ListNode,
    child_node: ListNode,
}

impl Reference {
    /// # Safety
    ///
    /// `r` must point to a valid `Reference`.
    unsafe fn parent_node_ptr(r: NonNull<Reference>) -> NonNull<ListNode> {
        unsafe { NonNull::new_unchecked(core::ptr::addr_of_mut!((*r.as_ptr()).parent_node)) }
    }

    /// # Safety
    ///
    /// `r` must point to a valid `Reference`.
    unsafe fn child_node_ptr(r: NonNull<Reference>) -> NonNull<ListNode> {
        unsafe { NonNull::new_unchecked(core::ptr::addr_of_mut!((*r.as_ptr()).child_node)) }
    }

    /// Recovers the owning `Reference` from a `ListNode` known to be its
    /// `parent_node` (i.e. yielded while walking some context's `children`
    /// list).
    ///
    /// # Safety
    ///
    /// `node` must be the `parent_node` field of a live `Reference`.
    pub(crate) unsafe fn from_parent_node(node: NonNull<ListNode>) -> NonNull<Reference> {
        let offset = core::mem::offset_of!(Reference, parent_node);
        unsafe { NonNull::new_unchecked(node.as_ptr().cast::<u8>().sub(offset).cast()) }
    }

    /// Recovers the owning `Reference` from a `ListNode` known to be its
    /// `child_node` (i.e. yielded while walking some context's `parents`
    /// list).
    ///
    /// # Safety
    ///
    /// `node` must be the `child_node` field of a live `Reference`.
    pub(crate) unsafe fn from_child_node(node: NonNull<ListNode>) -> NonNull<Reference> {
        let offset = core::mem::offset_of!(Reference, child_node);
        unsafe { NonNull::new_unchecked(node.as_ptr().cast::<u8>().sub(offset).cast()) }
    }

    /// Creates a new edge from `parent` to `child` and splices it into both
    /// endpoints' lists.
    ///
    /// Allocation failure here is treated as unrecoverable: this crate lets
    /// the global allocator's own out-of-memory handler run (which aborts),
    /// rather than returning failure through an API that has none to give
    /// back. See `DESIGN.md` for the rationale.
    ///
    /// # Safety
    ///
    /// `parent` and `child` must point to valid, live `Context`s.
    pub(crate) unsafe fn link(parent: NonNull<Context>, child: NonNull<Context>) {
        let boxed = Box::new(Reference {
            parent,
            child,
            parent_node: ListNode::dangling(),
            child_node: ListNode::dangling(),
        });
        let reference = unsafe { NonNull::new_unchecked(Box::into_raw(boxed)) };
        unsafe {
            ListNode::init(Self::parent_node_ptr(reference));
            ListNode::init(Self::child_node_ptr(reference));
            ListNode::add(Self::parent_node_ptr(reference), Context::children_head(parent));
            ListNode::add(Self::child_node_ptr(reference), Context::parents_head(child));
        }
    }

    /// Finds and removes the first edge from `parent` to `child`, if any,
    /// deallocating it. Returns whether one was found. Duplicate edges are
    /// removed one at a time, oldest first.
    ///
    /// # Safety
    ///
    /// `parent` and `child` must point to valid, live `Context`s.
    pub(crate) unsafe fn unlink_one(parent: NonNull<Context>, child: NonNull<Context>) -> bool {
        let head = unsafe { Context::parents_head(child) };
        let found = unsafe { ListNode::iter(head) }.find(|&node| {
            let reference = unsafe { Self::from_child_node(node) };
            unsafe { (*reference.as_ptr()).parent == parent }
        });
        match found {
            Some(node) => {
                let reference = unsafe { Self::from_child_node(node) };
                unsafe {
                    ListNode::destroy(Self::parent_node_ptr(reference));
                    ListNode::destroy(node);
                    drop(Box::from_raw(reference.as_ptr()));
                }
                true
            }
            None => false,
        }
    }

    /// Whether `child` has at least one edge from `parent`, or (if `parent`
    /// is `None`) at least one parent at all.
    ///
    /// # Safety
    ///
    /// `child` and, if present, `parent` must point to valid `Context`s.
    pub(crate) unsafe fn has_parent(child: NonNull<Context>, parent: Option<NonNull<Context>>) -> bool {
        let head = unsafe { Context::parents_head(child) };
        match parent {
            None => !unsafe { ListNode::is_empty(head) },
            Some(parent) => unsafe { ListNode::iter(head) }.any(|node| {
                let reference = unsafe { Self::from_child_node(node) };
                unsafe { (*reference.as_ptr()).parent == parent }
            }),
        }
    }

    /// Drains `ctx`'s `parents` list, destroying and deallocating each edge.
    /// Used by teardown's first step: severing all incoming edges before the
    /// destructor runs.
    ///
    /// # Safety
    ///
    /// `ctx` must point to a valid, live `Context`.
    pub(crate) unsafe fn sever_parents(ctx: NonNull<Context>) {
        let head = unsafe { Context::parents_head(ctx) };
        for node in unsafe { ListNode::drain(head) } {
            let reference = unsafe { Self::from_child_node(node) };
            unsafe {
                ListNode::destroy(Self::parent_node_ptr(reference));
                ListNode::destroy(node);
                drop(Box::from_raw(reference.as_ptr()));
            }
        }
    }

    /// Drains `ctx`'s `children` list, destroying and deallocating each
    /// edge, and invokes `on_orphaned` for each child whose `parents` list
    /// becomes empty as a result.
    ///
    /// # Safety
    ///
    /// `ctx` must point to a valid, live `Context`.
    pub(crate) unsafe fn sever_children(ctx: NonNull<Context>, mut on_orphaned: impl FnMut(NonNull<Context>)) {
        let head = unsafe { Context::children_head(ctx) };
        for node in unsafe { ListNode::drain(head) } {
            let reference = unsafe { Self::from_parent_node(node) };
            let child = unsafe { (*reference.as_ptr()).child };
            unsafe {
                ListNode::destroy(Self::child_node_ptr(reference));
                ListNode::destroy(node);
                drop(Box::from_raw(reference.as_ptr()));
            }
            if unsafe { ListNode::is_empty(Context::parents_head(child)) } {
                on_orphaned(child);
            }
        }
    }
}
