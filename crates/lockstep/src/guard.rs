#![forbid(unsafe_code)]

//! Depth counter guard shared by the list and the group.

use std::cell::Cell;

/// Increments a depth counter for as long as it lives.
pub(crate) struct DepthGuard<'a> {
    depth: &'a Cell<usize>,
}

impl<'a> DepthGuard<'a> {
    pub(crate) fn enter(depth: &'a Cell<usize>) -> Self {
        depth.set(depth.get() + 1);
        Self { depth }
    }
}

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        self.depth.set(self.depth.get().saturating_sub(1));
    }
}
