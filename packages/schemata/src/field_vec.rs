//! A growable, type-erased vector used as the storage of `vector` fields.

use std::alloc::Layout;
use std::fmt::{self, Debug, Formatter};
use std::mem;
use std::ptr::{self, NonNull};
use std::sync::Arc;

use bytemuck::Pod;

use crate::field_type::{FieldType, Primitive};
use crate::raw;
use crate::text::Text;

/// A dynamic array of values described by a `FieldType`.
///
/// Elements are constructed with `FieldType::init` when the vector grows and
/// destroyed with `FieldType::free` when it shrinks. Capacity grows by
/// doubling and is never given back until the vector is dropped.
#[repr(C)]
pub struct FieldVec {
    data: NonNull<u8>,
    len: usize,
    capacity: usize,
    element: Arc<FieldType>,
}

impl FieldVec {
    /// Create a new, empty vector of `element` values.
    ///
    /// # Panics
    /// If `element` has no in-memory representation (e.g. a map).
    pub fn new(element: Arc<FieldType>) -> FieldVec {
        let layout = Layout::from_size_align(element.size(), element.alignment())
            .expect("invalid element layout");

        FieldVec {
            data: raw::dangling(layout),
            len: 0,
            capacity: 0,
            element,
        }
    }

    /// The element type of this vector.
    pub fn element(&self) -> &Arc<FieldType> {
        &self.element
    }

    /// Size of one element in bytes.
    pub fn element_size(&self) -> usize {
        self.element.size()
    }

    /// The number of live elements.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if there are no live elements.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The number of elements that fit without reallocating.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Return a raw pointer to the element at `index`.
    ///
    /// # Panics
    /// If `index` is out of bounds.
    pub fn get_pointer(&mut self, index: usize) -> *mut u8 {
        assert!(index < self.len, "index {} out of bounds (len {})", index, self.len);
        unsafe { self.slot(index) }
    }

    /// Get a reference to a plain element.
    ///
    /// # Panics
    /// If `index` is out of bounds or `T` does not match the element layout.
    pub fn get<T: Pod>(&self, index: usize) -> &T {
        self.check_plain::<T>(false);
        assert!(index < self.len, "index {} out of bounds (len {})", index, self.len);
        unsafe { &*(self.slot(index) as *const T) }
    }

    /// Get a mutable reference to a plain element.
    ///
    /// # Panics
    /// If `index` is out of bounds, `T` does not match the element layout,
    /// or the elements hold a `bool` (see `set_flag`).
    pub fn get_mut<T: Pod>(&mut self, index: usize) -> &mut T {
        self.check_plain::<T>(true);
        unsafe { &mut *(self.get_pointer(index) as *mut T) }
    }

    /// Read a `bool` element.
    ///
    /// # Panics
    /// If `index` is out of bounds or the elements are not `bool`s.
    pub fn flag(&self, index: usize) -> bool {
        self.check_flags();
        assert!(index < self.len, "index {} out of bounds (len {})", index, self.len);
        unsafe { *self.slot(index) != 0 }
    }

    /// Write a `bool` element.
    ///
    /// # Panics
    /// As for `flag`.
    pub fn set_flag(&mut self, index: usize, value: bool) {
        self.check_flags();
        unsafe { *self.get_pointer(index) = value as u8 };
    }

    /// Get a string element.
    ///
    /// # Panics
    /// If `index` is out of bounds or the elements are not strings.
    pub fn text(&self, index: usize) -> &Text {
        assert!(matches!(*self.element, FieldType::String), "vector<{}> does not hold strings", self.element);
        assert!(index < self.len, "index {} out of bounds (len {})", index, self.len);
        unsafe { &*(self.slot(index) as *const Text) }
    }

    /// Get a mutable string element.
    ///
    /// # Panics
    /// If `index` is out of bounds or the elements are not strings.
    pub fn text_mut(&mut self, index: usize) -> &mut Text {
        assert!(matches!(*self.element, FieldType::String), "vector<{}> does not hold strings", self.element);
        unsafe { &mut *(self.get_pointer(index) as *mut Text) }
    }

    /// Get a nested vector element.
    ///
    /// # Panics
    /// If `index` is out of bounds or the elements are not vectors.
    pub fn vector_mut(&mut self, index: usize) -> &mut FieldVec {
        assert!(matches!(*self.element, FieldType::Vector { .. }), "vector<{}> does not hold vectors", self.element);
        unsafe { &mut *(self.get_pointer(index) as *mut FieldVec) }
    }

    /// Append one default-constructed element and return a pointer to it.
    pub fn push_back(&mut self) -> *mut u8 {
        self.resize(self.len + 1);
        self.get_pointer(self.len - 1)
    }

    /// Append a plain value.
    ///
    /// # Panics
    /// If the element type needs construction (strings, vectors, ...) or
    /// holds a `bool`, or `T` does not match the element layout.
    pub fn push_value<T: Pod>(&mut self, value: T) {
        self.check_plain::<T>(true);
        let ptr = self.push_back();
        unsafe { ptr::write(ptr as *mut T, value) };
    }

    /// Remove and destroy the last element.
    ///
    /// # Panics
    /// If the vector is empty.
    pub fn pop_back(&mut self) {
        assert!(self.len > 0, "pop_back on an empty vector");
        self.resize(self.len - 1);
    }

    /// Destroy every element, keeping the allocation.
    pub fn clear(&mut self) {
        self.resize(0);
    }

    /// Grow or shrink to exactly `new_len` elements.
    ///
    /// New elements are zeroed then constructed in order; removed elements
    /// are destroyed in order.
    pub fn resize(&mut self, new_len: usize) {
        let size = self.element.size();

        if new_len > self.len {
            self.reserve(new_len);
            let old_len = self.len;

            unsafe {
                raw::zero(self.slot(old_len), (new_len - old_len) * size);
                for idx in old_len..new_len {
                    self.element.init(self.slot(idx));
                    self.len = idx + 1;
                }
            }
        } else {
            for idx in new_len..self.len {
                unsafe { self.element.free(self.slot(idx)) };
            }
            self.len = new_len;
        }
    }

    /// Ensure room for at least `min_capacity` elements.
    fn reserve(&mut self, min_capacity: usize) {
        if self.capacity >= min_capacity {
            return;
        }

        let size = self.element.size();
        let align = self.element.alignment();
        let new_capacity = (self.capacity * 2).max(min_capacity);
        let new_layout = raw::array_layout(size, align, new_capacity);
        let new_data = raw::alloc_zeroed(new_layout);

        unsafe {
            ptr::copy_nonoverlapping(self.data.as_ptr(), new_data.as_ptr(), self.len * size);
            raw::dealloc(self.data, self.layout());
        }

        self.data = new_data;
        self.capacity = new_capacity;
    }

    fn layout(&self) -> Layout {
        raw::array_layout(self.element.size(), self.element.alignment(), self.capacity)
    }

    fn check_flags(&self) {
        assert!(matches!(*self.element, FieldType::Primitive(Primitive::Bool)),
                "vector<{}> does not hold bools", self.element);
    }

    unsafe fn slot(&self, index: usize) -> *mut u8 {
        raw::offset(self.data.as_ptr(), index * self.element.size())
    }

    fn check_plain<T>(&self, write: bool) {
        assert!(self.element.is_plain(),
                "vector<{}> elements cannot be accessed by value", self.element);
        assert!(!write || self.element.accepts_any_bits(),
                "vector<{}> elements hold a bool and cannot be written by value", self.element);
        assert_eq!(mem::size_of::<T>(), self.element.size(), "element size mismatch");
        assert!(mem::align_of::<T>() <= self.element.alignment(), "element alignment mismatch");
    }
}

impl Drop for FieldVec {
    fn drop(&mut self) {
        self.resize(0);
        unsafe { raw::dealloc(self.data, self.layout()) };
    }
}

impl Debug for FieldVec {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldVec")
            .field("element", &self.element.to_string())
            .field("len", &self.len)
            .field("capacity", &self.capacity)
            .finish()
    }
}
