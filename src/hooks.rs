//! Process-wide, swappable allocator hooks.
//!
//! By default every block this crate manages goes through the system
//! allocator (`std::alloc`). Tests that need to exercise allocation-failure
//! paths (§8's realloc-failure scenario) install their own hooks for the
//! duration of the test, the same "install once, mutate before use"
//! discipline the `log` crate uses for its single global logger, scaled to
//! three slots instead of one trait object.

use core::alloc::Layout;
use core::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};

pub type MallocHook = unsafe fn(Layout) -> *mut u8;
pub type ReallocHook = unsafe fn(*mut u8, Layout, usize) -> *mut u8;
pub type FreeHook = unsafe fn(*mut u8, Layout);

unsafe fn default_malloc(layout: Layout) -> *mut u8 {
    unsafe { std::alloc::alloc(layout) }
}

unsafe fn default_realloc(ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
    unsafe { std::alloc::realloc(ptr, layout, new_size) }
}

unsafe fn default_free(ptr: *mut u8, layout: Layout) {
    unsafe { std::alloc::dealloc(ptr, layout) }
}

static MALLOC_HOOK: AtomicPtr<()> = AtomicPtr::new(ptr::null_mut());
static REALLOC_HOOK: AtomicPtr<()> = AtomicPtr::new(ptr::null_mut());
static FREE_HOOK: AtomicPtr<()> = AtomicPtr::new(ptr::null_mut());

/// Installs process-wide hooks in place of the system allocator. Intended
/// for fault-injection in tests; not meant to be swapped mid-graph in
/// production use, since every live block must be freed through whichever
/// hook allocated it.
///
/// # Safety
///
/// `malloc`/`realloc`/`free` must behave like their `std::alloc` namesakes:
/// return null (never a dangling non-null pointer) on failure, and accept
/// exactly the layouts this crate passes them.
pub unsafe fn set_hooks(malloc: MallocHook, realloc: ReallocHook, free: FreeHook) {
    MALLOC_HOOK.store(malloc as *mut (), Ordering::Relaxed);
    REALLOC_HOOK.store(realloc as *mut (), Ordering::Relaxed);
    FREE_HOOK.store(free as *mut (), Ordering::Relaxed);
}

/// Restores the default, system-allocator-backed hooks.
pub fn reset_hooks() {
    MALLOC_HOOK.store(ptr::null_mut(), Ordering::Relaxed);
    REALLOC_HOOK.store(ptr::null_mut(), Ordering::Relaxed);
    FREE_HOOK.store(ptr::null_mut(), Ordering::Relaxed);
}

/// # Safety
///
/// See [`MallocHook`]'s installation contract in [`set_hooks`].
pub(crate) unsafe fn malloc(layout: Layout) -> *mut u8 {
    let raw = MALLOC_HOOK.load(Ordering::Relaxed);
    if raw.is_null() {
        unsafe { default_malloc(layout) }
    } else {
        let hook: MallocHook = unsafe { core::mem::transmute(raw) };
        unsafe { hook(layout) }
    }
}

/// # Safety
///
/// See [`ReallocHook`]'s installation contract in [`set_hooks`].
pub(crate) unsafe fn realloc(ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
    let raw = REALLOC_HOOK.load(Ordering::Relaxed);
    if raw.is_null() {
        unsafe { default_realloc(ptr, layout, new_size) }
    } else {
        let hook: ReallocHook = unsafe { core::mem::transmute(raw) };
        unsafe { hook(ptr, layout, new_size) }
    }
}

/// # Safety
///
/// See [`FreeHook`]'s installation contract in [`set_hooks`].
pub(crate) unsafe fn free(ptr: *mut u8, layout: Layout) {
    let raw = FREE_HOOK.load(Ordering::Relaxed);
    if raw.is_null() {
        unsafe { default_free(ptr, layout) }
    } else {
        let hook: FreeHook = unsafe { core::mem::transmute(raw) };
        unsafe { hook(ptr, layout) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static HOOK_TEST_LOCK: Mutex<()> = Mutex::new(());

    static mut INJECT_FAILURE: bool = false;

    unsafe fn failing_malloc(layout: Layout) -> *mut u8 {
        if unsafe { INJECT_FAILURE } {
            ptr::null_mut()
        } else {
            unsafe { default_malloc(layout) }
        }
    }

    #[test]
    fn default_hooks_round_trip_through_system_allocator() {
        let _guard = HOOK_TEST_LOCK.lock().unwrap();
        reset_hooks();
        let layout = Layout::from_size_align(64, 8).unwrap();
        unsafe {
            let p = malloc(layout);
            assert!(!p.is_null());
            free(p, layout);
        }
    }

    #[test]
    fn installed_hook_can_simulate_allocation_failure() {
        let _guard = HOOK_TEST_LOCK.lock().unwrap();
        unsafe {
            INJECT_FAILURE = true;
            set_hooks(failing_malloc, default_realloc, default_free);
            let layout = Layout::from_size_align(64, 8).unwrap();
            assert!(malloc(layout).is_null());
            INJECT_FAILURE = false;
        }
        reset_hooks();
    }
}
