//! Paged, sparse component storage.
//!
//! A pool stores one component type for every entity that has it. Slots are
//! addressed directly by entity ID: entity `n` lives in page
//! `n / page_size` at index `n % page_size`. Pages are allocated on first use
//! and released as soon as their last occupant is removed.
//!
//! Pools only manage bytes. Constructing and destroying the fields of a
//! component is up to the `World`, which knows the component's layout.

use std::alloc::Layout;
use std::fmt::{self, Debug, Formatter};
use std::ptr::NonNull;

use bit_vec::BitVec;
use tracing::debug;

use crate::id::EntityID;
use crate::raw;

struct Page {
    data: Option<NonNull<u8>>,
    occupied: BitVec,
    len: usize,
}

impl Page {
    fn new(page_size: usize) -> Page {
        Page {
            data: None,
            occupied: BitVec::from_elem(page_size, false),
            len: 0,
        }
    }

    fn has(&self, index: usize) -> bool {
        self.occupied.get(index).unwrap_or(false)
    }
}

/// Storage for a single component type, keyed by entity ID.
pub struct ComponentPool {
    element_size: usize,
    element_alignment: usize,
    page_size: usize,
    pages: Vec<Page>,
}

impl ComponentPool {
    /// Create a new, empty pool.
    ///
    /// # Panics
    /// If `page_size` is zero or the element layout is invalid.
    pub fn new(element_size: usize, element_alignment: usize, page_size: usize) -> ComponentPool {
        assert!(page_size > 0, "page size must be non-zero");
        Layout::from_size_align(element_size, element_alignment)
            .expect("invalid component layout");

        ComponentPool {
            element_size,
            element_alignment,
            page_size,
            pages: Vec::new(),
        }
    }

    /// Size in bytes of one component.
    pub fn element_size(&self) -> usize {
        self.element_size
    }

    /// Alignment in bytes of one component.
    pub fn element_alignment(&self) -> usize {
        self.element_alignment
    }

    /// The number of entities stored per page.
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// The number of page slots, allocated or not.
    pub fn num_pages(&self) -> usize {
        self.pages.len()
    }

    /// The number of pages that currently own a buffer.
    pub fn num_allocated_pages(&self) -> usize {
        self.pages.iter().filter(|p| p.data.is_some()).count()
    }

    /// Returns true if the page at `page` currently owns a buffer.
    pub fn is_page_allocated(&self, page: usize) -> bool {
        self.pages.get(page).map_or(false, |p| p.data.is_some())
    }

    /// The number of live components in the pool.
    pub fn len(&self) -> usize {
        self.pages.iter().map(|p| p.len).sum()
    }

    /// Returns true if no entity has a component in this pool.
    pub fn is_empty(&self) -> bool {
        self.pages.iter().all(|p| p.len == 0)
    }

    /// Compute the page and index within the page for an entity.
    pub fn locate(&self, entity: EntityID) -> (usize, usize) {
        let id = entity.index();
        (id / self.page_size, id % self.page_size)
    }

    /// Returns true if the entity has a slot in this pool.
    pub fn has(&self, entity: EntityID) -> bool {
        let (page, index) = self.locate(entity);
        self.pages.get(page).map_or(false, |p| p.has(index))
    }

    /// Reserve and zero a slot for the entity, returning a pointer to it.
    ///
    /// # Panics
    /// If the entity already has a slot.
    pub fn add(&mut self, entity: EntityID) -> NonNull<u8> {
        assert!(!self.has(entity), "{:?} already has a slot in this pool", entity);

        let (page_idx, index) = self.locate(entity);
        if self.pages.len() <= page_idx {
            let page_size = self.page_size;
            self.pages.resize_with(page_idx + 1, || Page::new(page_size));
        }

        let layout = self.page_layout();
        let element_size = self.element_size;
        let page = &mut self.pages[page_idx];
        let data = match page.data {
            Some(data) => data,
            None => {
                debug!(page = page_idx, bytes = layout.size(), "allocating component page");
                let data = raw::alloc_zeroed(layout);
                page.data = Some(data);
                data
            }
        };

        page.occupied.set(index, true);
        page.len += 1;

        unsafe {
            let ptr = raw::offset(data.as_ptr(), index * element_size);
            raw::zero(ptr, element_size);
            NonNull::new_unchecked(ptr)
        }
    }

    /// Get a pointer to the entity's slot.
    ///
    /// # Panics
    /// If the entity has no slot in this pool.
    pub fn get(&mut self, entity: EntityID) -> NonNull<u8> {
        match self.try_get(entity) {
            Some(ptr) => ptr,
            None => panic!("{:?} has no slot in this pool", entity),
        }
    }

    /// Get a pointer to the entity's slot, if it has one.
    pub fn try_get(&self, entity: EntityID) -> Option<NonNull<u8>> {
        let (page_idx, index) = self.locate(entity);
        let page = self.pages.get(page_idx)?;
        if !page.has(index) {
            return None;
        }

        page.data.map(|data| unsafe {
            NonNull::new_unchecked(raw::offset(data.as_ptr(), index * self.element_size))
        })
    }

    /// Release the entity's slot, freeing the page if it is now empty.
    ///
    /// The slot's contents must already have been destroyed.
    ///
    /// # Panics
    /// If the entity has no slot in this pool.
    pub fn remove(&mut self, entity: EntityID) {
        assert!(self.has(entity), "{:?} has no slot in this pool", entity);

        let (page_idx, index) = self.locate(entity);
        let layout = self.page_layout();
        let page = &mut self.pages[page_idx];
        page.occupied.set(index, false);
        page.len -= 1;

        if page.len == 0 {
            if let Some(data) = page.data.take() {
                debug!(page = page_idx, "releasing component page");
                unsafe { raw::dealloc(data, layout) };
            }
        }
    }

    /// Iterate over the IDs of every entity with a slot, in ascending order.
    pub fn entities<'a>(&'a self) -> impl Iterator<Item=EntityID> + 'a {
        let page_size = self.page_size;
        self.pages.iter()
            .enumerate()
            .filter(|(_, page)| page.len > 0)
            .flat_map(move |(page_idx, page)| {
                page.occupied.iter()
                    .enumerate()
                    .filter(|(_, occupied)| *occupied)
                    .map(move |(index, _)| EntityID::new(page_idx * page_size + index))
            })
    }

    fn page_layout(&self) -> Layout {
        raw::array_layout(self.element_size, self.element_alignment, self.page_size)
    }
}

impl Drop for ComponentPool {
    fn drop(&mut self) {
        let layout = self.page_layout();
        for page in &mut self.pages {
            if let Some(data) = page.data.take() {
                unsafe { raw::dealloc(data, layout) };
            }
        }
    }
}

impl Debug for ComponentPool {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentPool")
            .field("element_size", &self.element_size)
            .field("page_size", &self.page_size)
            .field("pages", &self.num_pages())
            .field("allocated_pages", &self.num_allocated_pages())
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn entity(id: usize) -> EntityID {
        EntityID::new(id)
    }

    #[test]
    fn test_round_trip() {
        let mut pool = ComponentPool::new(8, 4, 4);
        assert!(!pool.has(entity(5)));

        let ptr = pool.add(entity(5));
        unsafe {
            let bytes = std::slice::from_raw_parts(ptr.as_ptr(), 8);
            assert!(bytes.iter().all(|b| *b == 0));
            *(ptr.as_ptr() as *mut f32) = 1.5;
        }

        assert!(pool.has(entity(5)));
        assert_eq!(pool.get(entity(5)), ptr);
        assert_eq!(unsafe { *(pool.get(entity(5)).as_ptr() as *const f32) }, 1.5);
        assert_eq!(pool.len(), 1);

        pool.remove(entity(5));
        assert!(!pool.has(entity(5)));
        assert!(pool.try_get(entity(5)).is_none());
    }

    #[test]
    fn test_locate() {
        let pool = ComponentPool::new(4, 4, 16);
        for id in 0..100 {
            assert_eq!(pool.locate(entity(id)), (id / 16, id % 16));
        }
    }

    #[test]
    fn test_page_reclamation() {
        let mut pool = ComponentPool::new(4, 4, 2);
        pool.add(entity(2));
        pool.add(entity(3));
        assert_eq!(pool.num_pages(), 2);
        assert!(!pool.is_page_allocated(0));
        assert!(pool.is_page_allocated(1));

        pool.remove(entity(2));
        assert!(pool.is_page_allocated(1));
        pool.remove(entity(3));
        assert!(!pool.is_page_allocated(1));
        assert_eq!(pool.num_allocated_pages(), 0);

        let ptr = pool.add(entity(3));
        assert!(pool.is_page_allocated(1));
        assert_eq!(unsafe { *(ptr.as_ptr() as *const u32) }, 0);
    }

    #[test]
    fn test_re_add_is_zeroed() {
        let mut pool = ComponentPool::new(4, 4, 4);
        pool.add(entity(0));
        let ptr = pool.add(entity(1));
        unsafe { *(ptr.as_ptr() as *mut u32) = 77 };

        pool.remove(entity(1));
        let ptr = pool.add(entity(1));
        assert_eq!(unsafe { *(ptr.as_ptr() as *const u32) }, 0);
    }

    #[test]
    fn test_entities_ascending() {
        let mut pool = ComponentPool::new(1, 1, 3);
        for id in &[7, 1, 4, 0] {
            pool.add(entity(*id));
        }

        let ids: Vec<usize> = pool.entities().map(|e| e.index()).collect();
        assert_eq!(ids, vec![0, 1, 4, 7]);
    }

    #[test]
    fn test_zero_sized_elements() {
        let mut pool = ComponentPool::new(0, 1, 8);
        pool.add(entity(3));
        assert!(pool.has(entity(3)));
        pool.remove(entity(3));
        assert!(pool.is_empty());
    }

    #[test]
    #[should_panic(expected = "already has a slot")]
    fn test_double_add() {
        let mut pool = ComponentPool::new(4, 4, 4);
        pool.add(entity(1));
        pool.add(entity(1));
    }

    #[test]
    #[should_panic(expected = "has no slot")]
    fn test_remove_missing() {
        let mut pool = ComponentPool::new(4, 4, 4);
        pool.remove(entity(1));
    }
}
