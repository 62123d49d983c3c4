//! The per-allocation header, `Context`, and the handle/address arithmetic
//! around it.
//!
//! Every live allocation is one contiguous heap block: a `Context` header
//! immediately followed by the caller's payload bytes. The public API never
//! hands out a `Context` pointer; it hands out the payload address (the
//! "handle"), and every internal operation walks back to the header with
//! [`Context::from_handle`].

use core::alloc::Layout;
use core::mem;
use core::ptr::{self, NonNull};

use crate::list::ListNode;

/// A type-erased finalizer, bound at allocation or `set_destructor` time.
/// Returns an advisory status; a nonzero return does not stop teardown, it
/// is only ever surfaced as `free`'s/`unref`'s own return value.
pub(crate) type Destructor = Box<dyn FnMut(*mut u8) -> i32>;

/// The alignment every payload is guaranteed, matching what a general
/// purpose `malloc` promises for an object of unknown type.
pub(crate) const MAX_ALIGN: usize = mem::align_of::<u128>();

const fn round_up(value: usize, align: usize) -> usize {
    (value + align - 1) & !(align - 1)
}

/// Size of the header, padded so the payload that follows it starts at a
/// `MAX_ALIGN`-aligned offset.
pub(crate) const HEADER_SIZE: usize = round_up(mem::size_of::<Context>(), MAX_ALIGN);

#[repr(C)]
pub(crate) struct Context {
    pub(crate) parents: ListNode,
    pub(crate) children: ListNode,
    pub(crate) destructor: Option<Destructor>,
    pub(crate) requested_size: usize,
}

impl Context {
    /// The layout of the combined header+payload block for a payload of
    /// `size` bytes, or `None` if `size` is large enough that `HEADER_SIZE +
    /// size` would overflow or exceed what `Layout` can represent.
    pub(crate) fn layout_for(size: usize) -> Option<Layout> {
        let total = HEADER_SIZE.checked_add(size)?;
        Layout::from_size_align(total, MAX_ALIGN).ok()
    }

    /// Writes an empty `Context` (empty parent/child lists, no destructor)
    /// into freshly allocated storage at `ctx`.
    ///
    /// # Safety
    ///
    /// `ctx` must point to writable storage at least `HEADER_SIZE` bytes
    /// long, aligned to `MAX_ALIGN`, not yet holding a live `Context`.
    pub(crate) unsafe fn init(ctx: NonNull<Context>, requested_size: usize) {
        unsafe {
            ListNode::init(Self::parents_head(ctx));
            ListNode::init(Self::children_head(ctx));
            ptr::write(ptr::addr_of_mut!((*ctx.as_ptr()).destructor), None);
            ptr::write(
                ptr::addr_of_mut!((*ctx.as_ptr()).requested_size),
                requested_size,
            );
        }
    }

    /// # Safety
    ///
    /// `ctx` must point to a valid, initialized `Context`.
    pub(crate) unsafe fn parents_head(ctx: NonNull<Context>) -> NonNull<ListNode> {
        unsafe { NonNull::new_unchecked(ptr::addr_of_mut!((*ctx.as_ptr()).parents)) }
    }

    /// # Safety
    ///
    /// `ctx` must point to a valid, initialized `Context`.
    pub(crate) unsafe fn children_head(ctx: NonNull<Context>) -> NonNull<ListNode> {
        unsafe { NonNull::new_unchecked(ptr::addr_of_mut!((*ctx.as_ptr()).children)) }
    }

    /// Address of the payload that follows `ctx` in the same block.
    ///
    /// # Safety
    ///
    /// `ctx` must point to a valid `Context` at the head of its block.
    pub(crate) unsafe fn payload(ctx: NonNull<Context>) -> NonNull<u8> {
        unsafe { NonNull::new_unchecked(ctx.as_ptr().cast::<u8>().add(HEADER_SIZE)) }
    }

    /// Recovers the owning `Context` from a handle previously returned by
    /// [`Context::payload`].
    ///
    /// # Safety
    ///
    /// `handle` must be a payload address returned by this crate's own
    /// allocation functions, not yet freed.
    pub(crate) unsafe fn from_handle(handle: NonNull<u8>) -> NonNull<Context> {
        unsafe { NonNull::new_unchecked(handle.as_ptr().sub(HEADER_SIZE).cast()) }
    }

    /// The caller-visible usable size: what the system allocator reports for
    /// the whole block, minus the header.
    ///
    /// # Safety
    ///
    /// `ctx` must point to a live `Context` obtained from this crate's own
    /// allocation hooks (the default hooks route through the system
    /// allocator, which `libc::malloc_usable_size` assumes).
    pub(crate) unsafe fn usable_payload_size(ctx: NonNull<Context>) -> usize {
        let usable = unsafe { libc::malloc_usable_size(ctx.as_ptr().cast()) };
        usable.saturating_sub(HEADER_SIZE)
    }
}
