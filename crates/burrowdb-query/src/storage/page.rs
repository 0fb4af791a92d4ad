//! Fixed-capacity row pages and the pins that keep them in use.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use burrowdb_core::Value;

/// One page of rows. Deleted rows leave an empty slot behind.
#[derive(Debug, Default)]
pub(crate) struct Page {
    pub(crate) slots: RwLock<Vec<Option<Vec<Value>>>>,
    pins: AtomicUsize,
}

impl Page {
    pub(crate) fn pin_count(&self) -> usize {
        self.pins.load(Ordering::Acquire)
    }
}

/// A counted reference to a page, held by tuples read from it.
///
/// Creating or cloning a pin increments the page's pin count; dropping it
/// decrements the count.
#[derive(Debug)]
pub struct PagePin {
    page: Arc<Page>,
    page_no: usize,
}

impl PagePin {
    pub(crate) fn new(page: Arc<Page>, page_no: usize) -> Self {
        page.pins.fetch_add(1, Ordering::AcqRel);
        Self { page, page_no }
    }

    /// Returns the pinned page's number.
    #[must_use]
    pub const fn page_no(&self) -> usize {
        self.page_no
    }

    /// Returns how many pins the page currently has, this one included.
    #[must_use]
    pub fn pin_count(&self) -> usize {
        self.page.pin_count()
    }
}

impl Clone for PagePin {
    fn clone(&self) -> Self {
        Self::new(Arc::clone(&self.page), self.page_no)
    }
}

impl Drop for PagePin {
    fn drop(&mut self) {
        self.page.pins.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pins_are_counted() {
        let page = Arc::new(Page::default());
        let pin = PagePin::new(Arc::clone(&page), 0);
        assert_eq!(page.pin_count(), 1);
        let copy = pin.clone();
        assert_eq!(copy.pin_count(), 2);
        drop(pin);
        assert_eq!(page.pin_count(), 1);
        drop(copy);
        assert_eq!(page.pin_count(), 0);
    }
}
