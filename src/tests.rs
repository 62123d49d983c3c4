//! Internal, flat `#[test]`-per-scenario tests exercising the cascading
//! teardown and reallocation machinery directly through the public handle
//! API, matching every numbered scenario in this crate's end-to-end testable
//! properties.

use std::cell::RefCell;
use std::ptr;
use std::rc::Rc;

use crate::{add_ref, allocate, discard, free, has_parent, reallocate, set_destructor, size, unref};
use crate::hooks::{reset_hooks, set_hooks, FreeHook, MallocHook, ReallocHook};

fn log_destructor(log: Rc<RefCell<Vec<i32>>>, id: i32) -> impl FnMut(*mut u8) -> i32 {
    move |_payload| {
        log.borrow_mut().push(id);
        0
    }
}

#[test]
fn solo_allocation_finalizes_exactly_once_on_free() {
    let log = Rc::new(RefCell::new(Vec::new()));
    unsafe {
        let root = allocate(ptr::null_mut(), 8);
        set_destructor(root, log_destructor(Rc::clone(&log), 1));
        free(root);
    }
    assert_eq!(*log.borrow(), vec![1]);
}

#[test]
fn free_propagates_the_destructors_return_value() {
    unsafe {
        let root = allocate(ptr::null_mut(), 32);
        set_destructor(root, |_payload| 42);
        assert_eq!(free(root), 42);
    }
}

#[test]
fn parent_chain_finalizes_parent_before_child() {
    let log = Rc::new(RefCell::new(Vec::new()));
    unsafe {
        let a = allocate(ptr::null_mut(), 8);
        let b = allocate(a, 8);
        let c = allocate(b, 8);
        set_destructor(a, log_destructor(Rc::clone(&log), 1));
        set_destructor(b, log_destructor(Rc::clone(&log), 2));
        set_destructor(c, log_destructor(Rc::clone(&log), 3));
        free(a);
    }
    assert_eq!(*log.borrow(), vec![1, 2, 3]);
}

#[test]
fn shared_child_survives_until_every_parent_is_gone() {
    let log = Rc::new(RefCell::new(Vec::new()));
    unsafe {
        let p1 = allocate(ptr::null_mut(), 8);
        let p2 = allocate(ptr::null_mut(), 8);
        let child = allocate(p1, 8);
        add_ref(child, p2);
        set_destructor(child, log_destructor(Rc::clone(&log), 9));

        unref(child, p1);
        assert!(log.borrow().is_empty(), "child must survive its first parent's removal");
        assert!(has_parent(child, p2));

        unref(child, p2);
        assert_eq!(*log.borrow(), vec![9]);

        free(p1);
        free(p2);
    }
}

#[test]
fn mutual_reference_cycle_is_broken_by_free() {
    let log = Rc::new(RefCell::new(Vec::new()));
    unsafe {
        let a = allocate(ptr::null_mut(), 8);
        let b = allocate(ptr::null_mut(), 8);
        add_ref(b, a); // a -> b
        add_ref(a, b); // b -> a, closing the cycle
        set_destructor(a, log_destructor(Rc::clone(&log), 1));
        set_destructor(b, log_destructor(Rc::clone(&log), 2));

        free(a);
    }
    // Both sides of the cycle must be torn down exactly once, a before b.
    assert_eq!(*log.borrow(), vec![1, 2]);
}

#[test]
fn reallocate_preserves_parent_and_child_edges() {
    unsafe {
        let parent = allocate(ptr::null_mut(), 8);
        let c1 = allocate(parent, 8);
        let c2 = allocate(parent, 8);

        let grown = reallocate(parent, ptr::null_mut(), 4096);
        assert!(!grown.is_null());

        assert!(has_parent(c1, grown));
        assert!(has_parent(c2, grown));

        free(grown);
    }
}

#[test]
fn reallocate_failure_leaves_handle_fully_intact() {
    unsafe fn always_fails(_layout: core::alloc::Layout) -> *mut u8 {
        ptr::null_mut()
    }
    unsafe fn passthrough_realloc(
        _ptr: *mut u8,
        _layout: core::alloc::Layout,
        _new_size: usize,
    ) -> *mut u8 {
        ptr::null_mut()
    }
    unsafe fn passthrough_free(ptr: *mut u8, layout: core::alloc::Layout) {
        unsafe { std::alloc::dealloc(ptr, layout) }
    }

    let log = Rc::new(RefCell::new(Vec::new()));
    unsafe {
        let handle = allocate(ptr::null_mut(), 8);
        set_destructor(handle, log_destructor(Rc::clone(&log), 7));
        let original_size = size(handle);

        let hooks: (MallocHook, ReallocHook, FreeHook) =
            (always_fails, passthrough_realloc, passthrough_free);
        set_hooks(hooks.0, hooks.1, hooks.2);
        let result = reallocate(handle, ptr::null_mut(), 4096);
        reset_hooks();

        assert!(result.is_null());
        assert_eq!(size(handle), original_size);

        free(handle);
    }
    assert_eq!(*log.borrow(), vec![7]);
}

#[test]
fn discard_frees_an_unclaimed_root_immediately() {
    let log = Rc::new(RefCell::new(Vec::new()));
    unsafe {
        let temp = allocate(ptr::null_mut(), 8);
        set_destructor(temp, log_destructor(Rc::clone(&log), 1));
        discard(temp);
    }
    assert_eq!(*log.borrow(), vec![1]);
}

#[test]
fn discard_propagates_the_destructors_return_value() {
    unsafe {
        let temp = allocate(ptr::null_mut(), 8);
        set_destructor(temp, |_payload| 7);
        assert_eq!(discard(temp), 7);
    }
}

#[test]
fn discard_is_a_no_op_once_something_has_claimed_the_object() {
    let log = Rc::new(RefCell::new(Vec::new()));
    unsafe {
        let temp = allocate(ptr::null_mut(), 8);
        set_destructor(temp, log_destructor(Rc::clone(&log), 1));

        let owner = allocate(ptr::null_mut(), 8);
        add_ref(temp, owner);

        discard(temp);
        assert!(log.borrow().is_empty(), "temp now has a parent, discard must defer to it");

        free(owner);
    }
    assert_eq!(*log.borrow(), vec![1]);
}

#[test]
fn duplicate_edges_are_independent_and_both_must_be_removed() {
    let log = Rc::new(RefCell::new(Vec::new()));
    unsafe {
        let parent = allocate(ptr::null_mut(), 8);
        let child = allocate(parent, 8);
        add_ref(child, parent); // a second, duplicate edge from the same parent
        set_destructor(child, log_destructor(Rc::clone(&log), 1));

        unref(child, parent);
        assert!(log.borrow().is_empty(), "one of two duplicate edges remains");

        unref(child, parent);
        assert_eq!(*log.borrow(), vec![1]);

        free(parent);
    }
}

#[test]
fn destructor_can_detach_a_sibling_mid_cascade() {
    // The destructor for `a` reaches past its own teardown and detaches
    // `sibling` from the same parent before the parent's own children walk
    // gets there, exercising reentrant list mutation during cascade.
    let log = Rc::new(RefCell::new(Vec::new()));
    unsafe {
        let parent = allocate(ptr::null_mut(), 8);
        let a = allocate(parent, 8);
        let sibling = allocate(parent, 8);
        set_destructor(sibling, log_destructor(Rc::clone(&log), 2));

        let sibling_copy = sibling;
        let parent_copy = parent;
        let log_for_a = Rc::clone(&log);
        set_destructor(a, move |_payload| {
            log_for_a.borrow_mut().push(1);
            unsafe { unref(sibling_copy, parent_copy) };
            0
        });

        free(parent);
    }
    assert_eq!(*log.borrow(), vec![1, 2]);
}
