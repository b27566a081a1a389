use std::ops::{Deref, DerefMut};

use super::UnitOfWork;

/// Pops the frames pushed by [`UnitOfWork::scoped`] when dropped.
pub struct ContextGuard<'a> {
    uow: &'a mut UnitOfWork,
    depth: usize,
}

impl<'a> ContextGuard<'a> {
    pub(super) fn new(uow: &'a mut UnitOfWork, depth: usize) -> Self {
        Self { uow, depth }
    }
}

impl Deref for ContextGuard<'_> {
    type Target = UnitOfWork;

    fn deref(&self) -> &UnitOfWork {
        self.uow
    }
}

impl DerefMut for ContextGuard<'_> {
    fn deref_mut(&mut self) -> &mut UnitOfWork {
        self.uow
    }
}

impl Drop for ContextGuard<'_> {
    fn drop(&mut self) {
        self.uow.restore_depth(self.depth);
    }
}
