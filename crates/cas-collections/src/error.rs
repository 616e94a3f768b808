//! Allocation failure on the fallible insertion path.

use std::alloc::Layout;
use std::fmt;

/// A node could not be allocated; the rejected value is handed back.
#[derive(thiserror::Error)]
#[error("failed to allocate a {} byte node", .layout.size())]
pub struct AllocError<T> {
    value: T,
    layout: Layout,
}

impl<T> AllocError<T> {
    pub(crate) fn new(value: T, layout: Layout) -> Self {
        Self { value, layout }
    }

    /// Recover the value that was not inserted.
    #[must_use]
    pub fn into_inner(self) -> T {
        self.value
    }

    /// Layout of the allocation that failed.
    #[must_use]
    pub fn layout(&self) -> Layout {
        self.layout
    }
}

impl<T> fmt::Debug for AllocError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AllocError")
            .field("layout", &self.layout)
            .finish_non_exhaustive()
    }
}
