//! Borrow tokens handed out by a pool.
//!
//! A `Handle` wraps one constructed resource. Clones share the same
//! underlying handle, so the copy the pool tracks in its borrowed set and
//! the copy the caller holds are the same object: replacing the resource
//! through one is visible through the other, and a handle pushed back by
//! `reclaim_all` keeps its payload.
//!
//! Each checkout stamps the handle value it returns with a fresh checkout
//! number. A pool only accepts a release or discard carrying the number of
//! the current checkout, so a copy kept from an earlier borrow cannot return
//! somebody else's.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use std::time::{Duration, Instant};

use log::debug;
use parking_lot::{Mutex, RwLock};
use respool_core::{HandleId, PoolError, Result};

use crate::pool::{Pool, PoolShared};

struct HandleInner<R> {
    id: OnceLock<HandleId>,
    resource: RwLock<Arc<R>>,
    owner: Mutex<Weak<PoolShared<R>>>,
    checkouts: AtomicU64,
    created_at: Instant,
}

/// A handle to a pooled resource.
pub struct Handle<R> {
    inner: Arc<HandleInner<R>>,
    checkout: u64,
}

impl<R> Clone for Handle<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            checkout: self.checkout,
        }
    }
}

impl<R> Handle<R> {
    /// Wrap a resource in a handle that no pool owns yet.
    ///
    /// Pools create handles themselves; constructing one directly is mostly
    /// useful in tests. Its `release`/`discard` fail with `NoOwner`.
    pub fn new(resource: R) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                id: OnceLock::new(),
                resource: RwLock::new(Arc::new(resource)),
                owner: Mutex::new(Weak::new()),
                checkouts: AtomicU64::new(0),
                created_at: Instant::now(),
            }),
            checkout: 0,
        }
    }

    /// The handle's identifier, or `None` before its first checkout.
    pub fn id(&self) -> Option<&HandleId> {
        self.inner.id.get()
    }

    /// Shared reference to the current resource.
    pub fn resource(&self) -> Arc<R> {
        Arc::clone(&self.inner.resource.read())
    }

    /// Replace the resource; every clone of this handle sees the new value.
    pub fn set_resource(&self, resource: R) {
        *self.inner.resource.write() = Arc::new(resource);
    }

    /// The pool that issued this handle, if it still exists and has not
    /// discarded the handle.
    pub fn owner(&self) -> Option<Pool<R>> {
        self.inner.owner.lock().upgrade().map(Pool::from_shared)
    }

    /// Whether a live pool owns this handle.
    pub fn is_owned(&self) -> bool {
        self.inner.owner.lock().strong_count() > 0
    }

    /// Time since the resource was constructed.
    pub fn age(&self) -> Duration {
        self.inner.created_at.elapsed()
    }

    /// Return this handle to its pool with the resource intact.
    pub fn release(&self) -> Result<()> {
        self.owner().ok_or(PoolError::NoOwner)?.release(self)
    }

    /// Retire this handle; its pool slot goes back to unconstructed.
    pub fn discard(&self) -> Result<()> {
        self.owner().ok_or(PoolError::NoOwner)?.discard(self)
    }

    /// Whether two handles are clones of the same handle.
    ///
    /// True across checkouts: a handle released and acquired again is still
    /// the same handle.
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        Arc::ptr_eq(&this.inner, &other.inner)
    }

    /// Number of the checkout this handle value was issued by; 0 if it was
    /// never checked out.
    pub fn checkout(&self) -> u64 {
        self.checkout
    }

    /// A copy of this handle stamped with the next checkout number.
    pub(crate) fn next_checkout(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            checkout: self.inner.checkouts.fetch_add(1, Ordering::Relaxed) + 1,
        }
    }

    /// Same handle and same checkout.
    pub(crate) fn is_same_checkout(&self, other: &Self) -> bool {
        Self::ptr_eq(self, other) && self.checkout == other.checkout
    }

    pub(crate) fn assign_id(&self, pool_name: &str) -> &HandleId {
        self.inner.id.get_or_init(|| HandleId::generate(pool_name))
    }

    pub(crate) fn set_owner(&self, pool: &Arc<PoolShared<R>>) {
        *self.inner.owner.lock() = Arc::downgrade(pool);
    }

    pub(crate) fn clear_owner(&self) {
        *self.inner.owner.lock() = Weak::new();
    }

    pub(crate) fn display_id(&self) -> String {
        self.id()
            .map_or_else(|| "<unassigned>".to_string(), ToString::to_string)
    }
}

impl<R> fmt::Debug for Handle<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("id", &self.display_id())
            .field("checkout", &self.checkout)
            .field("owned", &self.is_owned())
            .finish_non_exhaustive()
    }
}

/// Releases a handle when dropped, including during unwinding.
pub(crate) struct ReleaseGuard<R> {
    handle: Handle<R>,
}

impl<R> ReleaseGuard<R> {
    pub(crate) fn new(handle: Handle<R>) -> Self {
        Self { handle }
    }

    pub(crate) fn handle(&self) -> &Handle<R> {
        &self.handle
    }
}

impl<R> Drop for ReleaseGuard<R> {
    fn drop(&mut self) {
        // Fails only if the handle was reclaimed or discarded while held.
        if let Err(e) = self.handle.release() {
            debug!("Skipping release of {}: {}", self.handle.display_id(), e);
        }
    }
}

/// Handles held for a multi-pool operation, released last-in first-out.
pub(crate) struct ReleaseStack<R> {
    guards: Vec<ReleaseGuard<R>>,
}

impl<R> ReleaseStack<R> {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            guards: Vec::with_capacity(capacity),
        }
    }

    pub(crate) fn push(&mut self, handle: Handle<R>) {
        self.guards.push(ReleaseGuard::new(handle));
    }

    /// Resources in acquisition order.
    pub(crate) fn resources(&self) -> Vec<Arc<R>> {
        self.guards
            .iter()
            .map(|guard| guard.handle().resource())
            .collect()
    }
}

impl<R> Drop for ReleaseStack<R> {
    fn drop(&mut self) {
        while let Some(guard) = self.guards.pop() {
            drop(guard);
        }
    }
}
