//! The single reader/writer lock guarding one backend (§4.2).
//!
//! A waiting writer must prevent new readers from starving it, since
//! inserts/deletes may rehash and must complete before new readers see a
//! consistent table again. `parking_lot::RwLock` provides exactly that (it
//! is a writer-preferring lock), matching how the wider `rotonda-store`
//! stack favors `parking_lot` over the standard library's lock types.
//! `TableLock` is a thin, named wrapper rather than a bare `parking_lot::RwLock`
//! so call sites read as domain operations ("acquire the backend's read/write
//! lock") instead of generic lock plumbing.

pub use parking_lot::{RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Default)]
pub struct TableLock<T> {
    inner: parking_lot::RwLock<T>,
}

impl<T> TableLock<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: parking_lot::RwLock::new(value),
        }
    }

    /// Acquires the read lock for the duration of one LPM/get/enumeration
    /// operation. Held for the entire operation, per §5.
    pub fn read(&self) -> RwLockReadGuard<'_, T> {
        self.inner.read()
    }

    /// Acquires the write lock for the duration of one insert/delete/set
    /// operation, including any rehash and enumeration-sidecar update.
    pub fn write(&self) -> RwLockWriteGuard<'_, T> {
        self.inner.write()
    }
}
