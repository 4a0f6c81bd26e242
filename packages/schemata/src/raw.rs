//! Raw memory primitives.
//!
//! Every allocation made by component pools and field vectors goes through
//! these few functions, so the pointer arithmetic stays in one place.

use std::alloc::{self, Layout};
use std::ptr::{self, NonNull};

/// Allocate a zero-filled block for `layout`.
///
/// Zero-sized layouts never reach the allocator; a dangling pointer with the
/// requested alignment is returned instead.
pub fn alloc_zeroed(layout: Layout) -> NonNull<u8> {
    if layout.size() == 0 {
        return dangling(layout);
    }

    let raw_ptr = unsafe { alloc::alloc_zeroed(layout) };
    match NonNull::new(raw_ptr) {
        Some(ptr) => ptr,
        None => alloc::handle_alloc_error(layout),
    }
}

/// Release a block previously returned by `alloc_zeroed`.
///
/// # Safety
/// `ptr` must come from `alloc_zeroed` called with the same `layout`, and must
/// not be used afterwards.
pub unsafe fn dealloc(ptr: NonNull<u8>, layout: Layout) {
    if layout.size() != 0 {
        alloc::dealloc(ptr.as_ptr(), layout);
    }
}

/// A well-aligned, non-null pointer for zero-sized storage.
pub fn dangling(layout: Layout) -> NonNull<u8> {
    // Alignment is a non-zero power of two, so this is never null.
    unsafe { NonNull::new_unchecked(layout.align() as *mut u8) }
}

/// Offset a pointer by a number of bytes.
///
/// # Safety
/// The result must stay within (or one past the end of) the allocation `ptr`
/// points into.
#[inline]
pub unsafe fn offset(ptr: *mut u8, bytes: usize) -> *mut u8 {
    ptr.add(bytes)
}

/// Fill `len` bytes starting at `ptr` with zero.
///
/// # Safety
/// `ptr` must be valid for writes of `len` bytes.
#[inline]
pub unsafe fn zero(ptr: *mut u8, len: usize) {
    ptr::write_bytes(ptr, 0, len);
}

/// Build the layout of `count` contiguous elements of `size` bytes each.
///
/// # Panics
/// If the total size overflows or the alignment is not a power of two.
pub fn array_layout(size: usize, align: usize, count: usize) -> Layout {
    let total = size.checked_mul(count).expect("allocation size overflow");
    Layout::from_size_align(total, align).expect("invalid element layout")
}
