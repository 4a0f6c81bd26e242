//! In-place string storage for `string` fields.

use std::fmt::{self, Debug, Formatter};
use std::mem::ManuallyDrop;
use std::ptr;

const MIN_CAPACITY: usize = 32;

/// The in-memory representation of a `string` field.
///
/// `Text` has a fixed C layout (pointer, length, capacity) so that it can be
/// addressed from outside Rust. All-zero bytes are a valid empty `Text`, which
/// means a freshly zeroed component slot needs no extra construction.
#[repr(C)]
pub struct Text {
    data: *mut u8,
    len: usize,
    capacity: usize,
}

impl Text {
    /// Create a new empty `Text` without allocating.
    pub const fn new() -> Text {
        Text {
            data: ptr::null_mut(),
            len: 0,
            capacity: 0,
        }
    }

    /// Return the contents as a string slice.
    pub fn as_str(&self) -> &str {
        if self.data.is_null() {
            return "";
        }

        unsafe {
            let bytes = std::slice::from_raw_parts(self.data, self.len);
            std::str::from_utf8_unchecked(bytes)
        }
    }

    /// Return the length in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the string is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Return the size of the heap buffer.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Replace the contents.
    ///
    /// The buffer only grows, doubling with a floor of 32 bytes.
    pub fn set(&mut self, value: &str) {
        let mut buffer = self.take_buffer();
        buffer.clear();
        if buffer.capacity() < value.len() {
            let target = MIN_CAPACITY.max(buffer.capacity() * 2).max(value.len());
            buffer.reserve_exact(target);
        }

        buffer.extend_from_slice(value.as_bytes());
        self.store_buffer(buffer);
    }

    fn take_buffer(&mut self) -> Vec<u8> {
        let buffer = if self.data.is_null() {
            Vec::new()
        } else {
            unsafe { Vec::from_raw_parts(self.data, self.len, self.capacity) }
        };

        self.data = ptr::null_mut();
        self.len = 0;
        self.capacity = 0;
        buffer
    }

    fn store_buffer(&mut self, buffer: Vec<u8>) {
        let mut buffer = ManuallyDrop::new(buffer);
        if buffer.capacity() == 0 {
            return;
        }

        self.data = buffer.as_mut_ptr();
        self.len = buffer.len();
        self.capacity = buffer.capacity();
    }
}

impl Default for Text {
    fn default() -> Self {
        Text::new()
    }
}

impl Drop for Text {
    fn drop(&mut self) {
        drop(self.take_buffer());
    }
}

impl Debug for Text {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Debug::fmt(self.as_str(), f)
    }
}

impl PartialEq<str> for Text {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<&str> for Text {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_zeroed_is_empty() {
        let text: Text = unsafe { std::mem::zeroed() };
        assert!(text.is_empty());
        assert_eq!(text.as_str(), "");
    }

    #[test]
    fn test_set_grows() {
        let mut text = Text::new();
        text.set("hello");
        assert_eq!(text, "hello");
        assert!(text.capacity() >= MIN_CAPACITY);

        let long = "x".repeat(100);
        text.set(&long);
        assert_eq!(text.as_str(), long);
        assert!(text.capacity() >= 100);

        let capacity = text.capacity();
        text.set("short");
        assert_eq!(text, "short");
        assert_eq!(text.capacity(), capacity);
    }
}
