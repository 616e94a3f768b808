//! Fallible node allocation.

use std::alloc::{self, Layout};

use crossbeam_epoch::Owned;

use crate::error::AllocError;

/// Allocate a node for `value` without aborting on failure.
///
/// `build` runs only once the memory is available, so on failure the
/// value is returned untouched inside the error.
pub(crate) fn try_alloc_node<N, T>(
    value: T,
    build: impl FnOnce(T) -> N,
) -> Result<Owned<N>, AllocError<T>> {
    let layout = Layout::new::<N>();
    debug_assert!(layout.size() > 0, "Nodes carry a link and are never zero-sized");

    // SAFETY: the layout is non-zero sized.
    let raw = unsafe { alloc::alloc(layout) }.cast::<N>();
    if raw.is_null() {
        return Err(AllocError::new(value, layout));
    }

    // SAFETY: `raw` is a fresh allocation with the layout of `N`, the same
    // allocation `Box<N>` makes, so `Owned` may take ownership of it.
    unsafe {
        raw.write(build(value));
        Ok(Owned::from_raw(raw))
    }
}
