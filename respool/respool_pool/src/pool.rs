//! Capacity-bounded pool with lazy construction.
//!
//! A pool owns `capacity` slots. Idle slots sit on a stack and are either
//! empty (nothing built yet) or hold a ready handle; borrowed handles are
//! tracked by id. Acquisition pops the most recently returned slot, builds a
//! resource if the slot is empty, and records the handle as borrowed.
//!
//! All slot bookkeeping happens under one mutex, and
//! `idle + borrowed + pending == capacity` holds whenever it is released.
//! The factory runs with the lock dropped; its slot is counted as
//! `pending` until the resource is ready or the slot is handed back.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info, log_enabled, trace, warn, Level};
use parking_lot::{Condvar, Mutex, RwLock};
use respool_core::{BoxError, HandleId, PoolConfig, PoolError, Result, RetryPolicy};

use crate::handle::{Handle, ReleaseGuard};
use crate::slot::Slot;
use crate::stats::{PoolCounters, PoolEvent, PoolStats, TelemetryHook};

type Factory<R> = dyn Fn() -> std::result::Result<R, BoxError> + Send + Sync;

struct PoolState<R> {
    slots: Vec<Slot<R>>,
    borrowed: HashMap<HandleId, Handle<R>>,
    pending: usize,
}

#[derive(Debug, Clone, Copy)]
struct Settings {
    retry: RetryPolicy,
    reconnect: RetryPolicy,
}

pub(crate) struct PoolShared<R> {
    name: String,
    capacity: usize,
    factory: Box<Factory<R>>,
    state: Mutex<PoolState<R>>,
    slot_freed: Condvar,
    settings: RwLock<Settings>,
    counters: PoolCounters,
    telemetry: RwLock<Option<TelemetryHook>>,
}

/// A pool of lazily constructed, reusable resources.
///
/// `Pool` is a cheap handle to shared state; clones refer to the same pool.
///
/// ```
/// use respool_pool::Pool;
///
/// let pool = Pool::from_fn("numbers", 2, || 42).unwrap();
///
/// let doubled = pool
///     .with_resource(|n| Ok::<_, respool_core::PoolError>(n * 2))
///     .unwrap();
///
/// assert_eq!(doubled, 84);
/// assert!(pool.is_full());
/// ```
pub struct Pool<R> {
    shared: Arc<PoolShared<R>>,
}

impl<R> Clone for Pool<R> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<R> fmt::Debug for Pool<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("name", &self.shared.name)
            .field("capacity", &self.shared.capacity)
            .finish_non_exhaustive()
    }
}

/// Puts a reserved slot back as empty unless the construction completes.
struct Reservation<'a, R> {
    shared: &'a PoolShared<R>,
    armed: bool,
}

impl<R> Reservation<'_, R> {
    fn complete(mut self, state: &mut PoolState<R>) {
        state.pending -= 1;
        self.armed = false;
    }
}

impl<R> Drop for Reservation<'_, R> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        {
            let mut state = self.shared.state.lock();
            state.pending -= 1;
            state.slots.push(Slot::Empty);
        }
        self.shared.slot_freed.notify_one();
    }
}

impl<R> Pool<R> {
    /// Create a pool with default tunables.
    ///
    /// Fails with `PoolError::Config` if `name` is blank or `capacity` is 0.
    pub fn new<F, E>(name: impl Into<String>, capacity: usize, factory: F) -> Result<Self>
    where
        F: Fn() -> std::result::Result<R, E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        Self::from_config(PoolConfig::new(name, capacity), factory)
    }

    /// Create a pool whose factory cannot fail.
    pub fn from_fn<F>(name: impl Into<String>, capacity: usize, factory: F) -> Result<Self>
    where
        F: Fn() -> R + Send + Sync + 'static,
    {
        Self::new(name, capacity, move || {
            Ok::<_, std::convert::Infallible>(factory())
        })
    }

    /// Create a pool from resolved configuration.
    pub fn from_config<F, E>(config: PoolConfig, factory: F) -> Result<Self>
    where
        F: Fn() -> std::result::Result<R, E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        config.validate()?;

        let PoolConfig {
            name,
            capacity,
            retry,
            reconnect,
        } = config;

        debug!("Creating pool '{}' with capacity {}", name, capacity);

        let boxed: Box<Factory<R>> =
            Box::new(move || factory().map_err(Into::<BoxError>::into));
        let slots = (0..capacity).map(|_| Slot::Empty).collect();
        Ok(Self {
            shared: Arc::new(PoolShared {
                name,
                capacity,
                factory: boxed,
                state: Mutex::new(PoolState {
                    slots,
                    borrowed: HashMap::with_capacity(capacity),
                    pending: 0,
                }),
                slot_freed: Condvar::new(),
                settings: RwLock::new(Settings {
                    retry: RetryPolicy::new(retry.attempts, retry.delay),
                    reconnect: RetryPolicy::new(reconnect.attempts, reconnect.delay),
                }),
                counters: PoolCounters::default(),
                telemetry: RwLock::new(None),
            }),
        })
    }

    pub(crate) fn from_shared(shared: Arc<PoolShared<R>>) -> Self {
        Self { shared }
    }

    /// Pool name.
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Fixed capacity.
    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Borrow a resource, waiting up to `(retry_attempts - 1) * retry_delay`
    /// for a free slot.
    ///
    /// # Errors
    ///
    /// - `PoolError::Empty` if no slot frees up in time
    /// - `PoolError::Connection` if the factory fails `reconnect_attempts` times
    pub fn acquire(&self) -> Result<Handle<R>> {
        let budget = self.shared.settings.read().retry.budget();
        self.acquire_timeout(budget)
    }

    /// Borrow a resource only if a slot is free right now.
    pub fn try_acquire(&self) -> Result<Handle<R>> {
        self.acquire_timeout(Duration::ZERO)
    }

    /// Borrow a resource, waiting at most `timeout` for a free slot.
    ///
    /// The timeout bounds only the wait for a slot; construction retries
    /// follow the reconnect settings.
    pub fn acquire_timeout(&self, timeout: Duration) -> Result<Handle<R>> {
        let result = self.checkout(timeout);
        self.record(PoolEvent::Acquire);
        result
    }

    fn checkout(&self, timeout: Duration) -> Result<Handle<R>> {
        let shared = &*self.shared;
        let deadline = Instant::now().checked_add(timeout);

        let mut state = shared.state.lock();
        let slot = loop {
            if let Some(slot) = state.slots.pop() {
                break slot;
            }
            match deadline {
                Some(deadline) if Instant::now() >= deadline => {
                    PoolCounters::bump(&shared.counters.exhausted, 1);
                    debug!(
                        "Pool '{}' exhausted after waiting {:?}",
                        shared.name, timeout
                    );
                    return Err(PoolError::Empty {
                        pool: shared.name.clone(),
                        capacity: shared.capacity,
                    });
                }
                Some(deadline) => {
                    shared.slot_freed.wait_until(&mut state, deadline);
                }
                None => shared.slot_freed.wait(&mut state),
            }
        };

        let handle = match slot {
            Slot::Ready(handle) => {
                trace!("Reusing {} from pool '{}'", handle.display_id(), shared.name);
                handle
            }
            Slot::Empty => {
                state.pending += 1;
                drop(state);

                let reservation = Reservation {
                    shared,
                    armed: true,
                };
                let handle = self.construct()?;

                state = shared.state.lock();
                reservation.complete(&mut state);
                handle
            }
        };

        let id = handle.assign_id(&shared.name).clone();
        let handle = handle.next_checkout();
        handle.set_owner(&self.shared);
        state.borrowed.insert(id, handle.clone());
        PoolCounters::bump(&shared.counters.acquired, 1);

        Ok(handle)
    }

    fn construct(&self) -> Result<Handle<R>> {
        let shared = &*self.shared;
        let policy = shared.settings.read().reconnect;
        let attempts = policy.attempts.max(1);

        let mut attempt = 0;
        loop {
            attempt += 1;
            match (shared.factory)() {
                Ok(resource) => {
                    PoolCounters::bump(&shared.counters.created, 1);
                    debug!(
                        "Pool '{}' constructed a resource (attempt {}/{})",
                        shared.name, attempt, attempts
                    );
                    return Ok(Handle::new(resource));
                }
                Err(source) if attempt >= attempts => {
                    PoolCounters::bump(&shared.counters.connection_failures, 1);
                    warn!(
                        "Pool '{}' giving up after {} failed construction attempt(s): {}",
                        shared.name, attempt, source
                    );
                    return Err(PoolError::Connection {
                        pool: shared.name.clone(),
                        attempts: attempt,
                        source,
                    });
                }
                Err(e) => {
                    warn!(
                        "Pool '{}' failed to construct a resource (attempt {}/{}): {}",
                        shared.name, attempt, attempts, e
                    );
                    thread::sleep(policy.delay);
                }
            }
        }
    }

    /// Return a borrowed handle with its resource intact.
    ///
    /// # Errors
    ///
    /// `PoolError::NotBorrowed` if the handle is not currently checked out
    /// of this pool, or was issued by an earlier checkout of the same
    /// handle; the pool is left unchanged.
    pub fn release(&self, handle: &Handle<R>) -> Result<()> {
        {
            let mut state = self.shared.state.lock();
            self.take_borrowed(&mut state, handle)?;
            state.slots.push(Slot::Ready(handle.clone()));
        }
        self.shared.slot_freed.notify_one();

        PoolCounters::bump(&self.shared.counters.released, 1);
        trace!("Released {} to pool '{}'", handle.display_id(), self.shared.name);
        self.record(PoolEvent::Release);
        Ok(())
    }

    /// Retire a borrowed handle.
    ///
    /// The handle loses its owner and its slot becomes empty again, so the
    /// next acquisition of that slot runs the factory.
    pub fn discard(&self, handle: &Handle<R>) -> Result<()> {
        {
            let mut state = self.shared.state.lock();
            self.take_borrowed(&mut state, handle)?;
            state.slots.push(Slot::Empty);
        }
        handle.clear_owner();
        self.shared.slot_freed.notify_one();

        PoolCounters::bump(&self.shared.counters.discarded, 1);
        debug!(
            "Discarded {} from pool '{}' after {:?}",
            handle.display_id(),
            self.shared.name,
            handle.age()
        );
        self.record(PoolEvent::Discard);
        Ok(())
    }

    fn take_borrowed(&self, state: &mut PoolState<R>, handle: &Handle<R>) -> Result<Handle<R>> {
        let id = handle.id().filter(|id| {
            state
                .borrowed
                .get(*id)
                .is_some_and(|held| held.is_same_checkout(handle))
        });

        match id.and_then(|id| state.borrowed.remove(id)) {
            Some(held) => Ok(held),
            None => Err(PoolError::NotBorrowed {
                pool: self.shared.name.clone(),
                id: handle.display_id(),
            }),
        }
    }

    /// Return every borrowed handle to the pool. Returns how many were
    /// reclaimed.
    pub fn reclaim_all(&self) -> usize {
        let reclaimed = {
            let mut state = self.shared.state.lock();
            let handles: Vec<Handle<R>> = state.borrowed.drain().map(|(_, h)| h).collect();
            let count = handles.len();
            state.slots.extend(handles.into_iter().map(Slot::Ready));
            count
        };
        self.shared.slot_freed.notify_all();

        PoolCounters::bump(&self.shared.counters.released, reclaimed as u64);
        info!("Reclaimed {} handle(s) in pool '{}'", reclaimed, self.shared.name);
        self.record(PoolEvent::ReclaimAll);
        reclaimed
    }

    /// Retire every borrowed handle. Returns how many were discarded.
    pub fn discard_all(&self) -> usize {
        let handles: Vec<Handle<R>> = {
            let mut state = self.shared.state.lock();
            let handles: Vec<Handle<R>> = state.borrowed.drain().map(|(_, h)| h).collect();
            state.slots.extend(handles.iter().map(|_| Slot::Empty));
            handles
        };
        for handle in &handles {
            handle.clear_owner();
        }
        self.shared.slot_freed.notify_all();

        let discarded = handles.len();
        PoolCounters::bump(&self.shared.counters.discarded, discarded as u64);
        info!("Discarded {} handle(s) in pool '{}'", discarded, self.shared.name);
        self.record(PoolEvent::DiscardAll);
        discarded
    }

    /// Run `callback` with a borrowed resource and always give it back.
    ///
    /// The handle is released when the callback returns, fails or panics.
    /// Acquisition errors are converted into the callback's error type.
    pub fn with_resource<T, E, F>(&self, callback: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&R) -> std::result::Result<T, E>,
        E: From<PoolError>,
    {
        let guard = ReleaseGuard::new(self.acquire()?);
        let resource = guard.handle().resource();
        callback(resource.as_ref())
    }

    /// Number of idle slots.
    pub fn count(&self) -> usize {
        self.shared.state.lock().slots.len()
    }

    /// Number of handles checked out.
    pub fn borrowed_count(&self) -> usize {
        self.shared.state.lock().borrowed.len()
    }

    /// Number of slots whose resource is being constructed.
    pub fn pending_count(&self) -> usize {
        self.shared.state.lock().pending
    }

    /// Whether every slot is checked out.
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Whether nothing is checked out.
    pub fn is_full(&self) -> bool {
        self.count() == self.shared.capacity
    }

    /// Snapshot of slot usage and counters.
    pub fn stats(&self) -> PoolStats {
        let (idle, ready, borrowed, pending) = {
            let state = self.shared.state.lock();
            let ready = state.slots.iter().filter(|slot| slot.is_ready()).count();
            (state.slots.len(), ready, state.borrowed.len(), state.pending)
        };

        let mut stats = PoolStats {
            name: self.shared.name.clone(),
            capacity: self.shared.capacity,
            idle,
            ready,
            borrowed,
            pending,
            created: 0,
            acquired: 0,
            released: 0,
            discarded: 0,
            exhausted: 0,
            connection_failures: 0,
        };
        self.shared.counters.fill(&mut stats);
        stats
    }

    /// Install a hook called after every acquire, release and discard.
    pub fn set_telemetry(&self, hook: TelemetryHook) {
        *self.shared.telemetry.write() = Some(hook);
    }

    /// Remove the telemetry hook.
    pub fn clear_telemetry(&self) {
        *self.shared.telemetry.write() = None;
    }

    fn record(&self, event: PoolEvent) {
        let hook = self.shared.telemetry.read().clone();
        if hook.is_none() && !log_enabled!(Level::Trace) {
            return;
        }

        let stats = self.stats();
        trace!(
            "Pool '{}' {:?}: idle={} borrowed={} pending={}",
            stats.name,
            event,
            stats.idle,
            stats.borrowed,
            stats.pending
        );
        if let Some(hook) = hook {
            hook(event, &stats);
        }
    }

    /// Attempts made to find a free slot.
    pub fn retry_attempts(&self) -> u32 {
        self.shared.settings.read().retry.attempts
    }

    /// Delay between slot attempts.
    pub fn retry_delay(&self) -> Duration {
        self.shared.settings.read().retry.delay
    }

    /// Attempts made to construct a resource.
    pub fn reconnect_attempts(&self) -> u32 {
        self.shared.settings.read().reconnect.attempts
    }

    /// Delay between construction attempts.
    pub fn reconnect_delay(&self) -> Duration {
        self.shared.settings.read().reconnect.delay
    }

    /// Set the slot attempt bound; 0 is raised to 1.
    pub fn set_retry_attempts(&self, attempts: u32) -> &Self {
        let attempts = self.clamp_attempts("retry", attempts);
        self.shared.settings.write().retry.attempts = attempts;
        self
    }

    /// Set the delay between slot attempts.
    pub fn set_retry_delay(&self, delay: Duration) -> &Self {
        self.shared.settings.write().retry.delay = delay;
        self
    }

    /// Set the construction attempt bound; 0 is raised to 1.
    pub fn set_reconnect_attempts(&self, attempts: u32) -> &Self {
        let attempts = self.clamp_attempts("reconnect", attempts);
        self.shared.settings.write().reconnect.attempts = attempts;
        self
    }

    /// Set the delay between construction attempts.
    pub fn set_reconnect_delay(&self, delay: Duration) -> &Self {
        self.shared.settings.write().reconnect.delay = delay;
        self
    }

    fn clamp_attempts(&self, which: &str, attempts: u32) -> u32 {
        if attempts == 0 {
            warn!(
                "Pool '{}': {} attempts must be at least 1, using 1",
                self.shared.name, which
            );
            return 1;
        }
        attempts
    }
}
