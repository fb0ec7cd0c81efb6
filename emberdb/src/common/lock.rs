use dashmap::DashMap;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::sync::Arc;

/// A shareable reader/writer lock guarding one collection.
///
/// Cloning a handle yields another handle on the same lock.
#[derive(Clone, Default)]
pub struct LockHandle {
    lock: Arc<RwLock<()>>,
}

impl LockHandle {
    pub fn new() -> Self {
        LockHandle {
            lock: Arc::new(RwLock::new(())),
        }
    }

    pub fn read(&self) -> RwLockReadGuard<'_, ()> {
        self.lock.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, ()> {
        self.lock.write()
    }

    pub fn try_write(&self) -> Option<RwLockWriteGuard<'_, ()>> {
        self.lock.try_write()
    }

    pub fn is_locked_exclusive(&self) -> bool {
        self.lock.is_locked_exclusive()
    }
}

/// Hands out one [LockHandle] per collection name, so every handle opened on
/// the same collection serializes its writers against the same lock.
#[derive(Clone, Default)]
pub struct LockRegistry {
    locks: Arc<DashMap<String, LockHandle>>,
}

impl LockRegistry {
    pub fn new() -> Self {
        LockRegistry {
            locks: Arc::new(DashMap::new()),
        }
    }

    pub fn get_lock(&self, name: &str) -> LockHandle {
        self.locks
            .entry(name.to_string())
            .or_insert_with(LockHandle::new)
            .clone()
    }

    pub fn remove_lock(&self, name: &str) -> bool {
        self.locks.remove(name).is_some()
    }

    pub fn lock_count(&self) -> usize {
        self.locks.len()
    }
}
