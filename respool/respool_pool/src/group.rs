//! Named registry of pools.
//!
//! A group holds independent pools by name. It never locks across pools:
//! `with_resources` acquires one pool at a time, in the order given, and the
//! registry lock is held only long enough to look a name up.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};
use parking_lot::RwLock;
use respool_core::{BoxError, GroupConfig, PoolConfig, PoolError, Result};

use crate::handle::ReleaseStack;
use crate::pool::Pool;
use crate::stats::PoolStats;

struct Registry<R> {
    pools: HashMap<String, Pool<R>>,
    order: Vec<String>,
}

/// A name-keyed collection of pools.
///
/// ```
/// use respool_pool::{Group, Pool};
///
/// let group = Group::new();
/// group.register(Pool::from_fn("left", 1, || "L").unwrap());
/// group.register(Pool::from_fn("right", 1, || "R").unwrap());
///
/// let joined = group
///     .with_resources(&["left", "right"], |r| {
///         Ok::<_, respool_core::PoolError>(format!("{}{}", r[0], r[1]))
///     })
///     .unwrap();
/// assert_eq!(joined, "LR");
/// ```
pub struct Group<R> {
    registry: RwLock<Registry<R>>,
}

impl<R> Default for Group<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> Group<R> {
    /// Create an empty group.
    pub fn new() -> Self {
        Self {
            registry: RwLock::new(Registry {
                pools: HashMap::new(),
                order: Vec::new(),
            }),
        }
    }

    /// Build a group from a configuration file's pools.
    ///
    /// `factory_for` is called once per pool to produce its factory.
    pub fn from_config<M, F, E>(config: &GroupConfig, mut factory_for: M) -> Result<Self>
    where
        M: FnMut(&PoolConfig) -> F,
        F: Fn() -> std::result::Result<R, E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        config.validate()?;

        let group = Self::new();
        for pool_config in config.resolved() {
            let factory = factory_for(&pool_config);
            group.register(Pool::from_config(pool_config, factory)?);
        }
        Ok(group)
    }

    /// Add a pool under its own name, replacing any pool already registered
    /// under that name. Returns the replaced pool.
    pub fn register(&self, pool: Pool<R>) -> Option<Pool<R>> {
        let name = pool.name().to_string();
        let mut registry = self.registry.write();

        let previous = registry.pools.insert(name.clone(), pool);
        if previous.is_some() {
            info!("Replaced pool '{}'", name);
        } else {
            info!("Registered pool '{}'", name);
            registry.order.push(name);
        }
        previous
    }

    /// Look a pool up by name.
    pub fn lookup(&self, name: &str) -> Result<Pool<R>> {
        self.registry
            .read()
            .pools
            .get(name)
            .cloned()
            .ok_or_else(|| PoolError::NotFound(name.to_string()))
    }

    /// Remove a pool; does nothing if the name is not registered.
    pub fn unregister(&self, name: &str) -> Option<Pool<R>> {
        let mut registry = self.registry.write();
        let removed = registry.pools.remove(name);
        if removed.is_some() {
            registry.order.retain(|n| n != name);
            info!("Unregistered pool '{}'", name);
        }
        removed
    }

    /// Whether a pool is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.registry.read().pools.contains_key(name)
    }

    /// Registered names in registration order.
    pub fn names(&self) -> Vec<String> {
        self.registry.read().order.clone()
    }

    /// Number of registered pools.
    pub fn len(&self) -> usize {
        self.registry.read().order.len()
    }

    /// Whether no pools are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the registered pools, in registration order.
    fn pools(&self) -> Vec<Pool<R>> {
        let registry = self.registry.read();
        registry
            .order
            .iter()
            .filter_map(|name| registry.pools.get(name).cloned())
            .collect()
    }

    /// Reclaim every borrowed handle in every pool.
    pub fn reclaim_all(&self) -> usize {
        self.pools().iter().map(Pool::reclaim_all).sum()
    }

    /// Discard every borrowed handle in every pool.
    pub fn discard_all(&self) -> usize {
        self.pools().iter().map(Pool::discard_all).sum()
    }

    /// Per-pool statistics in registration order.
    pub fn stats(&self) -> Vec<PoolStats> {
        self.pools().iter().map(Pool::stats).collect()
    }

    /// Set `retry_attempts` on every pool.
    pub fn set_retry_attempts(&self, attempts: u32) {
        for pool in self.pools() {
            pool.set_retry_attempts(attempts);
        }
    }

    /// Set `retry_delay` on every pool.
    pub fn set_retry_delay(&self, delay: Duration) {
        for pool in self.pools() {
            pool.set_retry_delay(delay);
        }
    }

    /// Set `reconnect_attempts` on every pool.
    pub fn set_reconnect_attempts(&self, attempts: u32) {
        for pool in self.pools() {
            pool.set_reconnect_attempts(attempts);
        }
    }

    /// Set `reconnect_delay` on every pool.
    pub fn set_reconnect_delay(&self, delay: Duration) {
        for pool in self.pools() {
            pool.set_reconnect_delay(delay);
        }
    }

    /// Borrow one resource from each named pool and run `callback` with them.
    ///
    /// Pools are acquired in the order of `names` and the callback receives
    /// the resources in that same order. Every handle is released when the
    /// callback finishes, most recently acquired first. If a name is unknown
    /// or a pool cannot produce a resource, the handles already held are
    /// released the same way before the error is returned.
    ///
    /// # Errors
    ///
    /// `PoolError::InvalidUsage` if `names` is empty, before any pool is
    /// touched; otherwise whatever `lookup`, `Pool::acquire` or the callback
    /// return.
    pub fn with_resources<N, T, E, F>(&self, names: &[N], callback: F) -> std::result::Result<T, E>
    where
        N: AsRef<str>,
        F: FnOnce(&[Arc<R>]) -> std::result::Result<T, E>,
        E: From<PoolError>,
    {
        if names.is_empty() {
            return Err(PoolError::InvalidUsage("Cannot use with empty names".into()).into());
        }

        let mut held = ReleaseStack::with_capacity(names.len());
        for name in names {
            let pool = self.lookup(name.as_ref())?;
            held.push(pool.acquire()?);
        }
        debug!("Holding {} pooled resource(s)", names.len());

        let resources = held.resources();
        callback(&resources)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(name: &str, capacity: usize) -> Pool<String> {
        let value = name.to_string();
        Pool::from_fn(name, capacity, move || value.clone()).unwrap()
    }

    #[test]
    fn test_register_keeps_first_position_on_replace() {
        let group = Group::new();
        assert!(group.register(pool("a", 1)).is_none());
        group.register(pool("b", 1));
        let replaced = group.register(pool("a", 3));

        assert_eq!(replaced.unwrap().capacity(), 1);
        assert_eq!(group.names(), ["a", "b"]);
        assert_eq!(group.lookup("a").unwrap().capacity(), 3);
    }

    #[test]
    fn test_unregister_missing_is_noop() {
        let group = Group::new();
        group.register(pool("a", 1));

        assert!(group.unregister("zzz").is_none());
        assert!(group.unregister("a").is_some());
        assert!(group.is_empty());
        assert!(!group.contains("a"));
    }

    #[test]
    fn test_empty_names_rejected() {
        let group: Group<String> = Group::new();
        let names: [&str; 0] = [];
        let err = group
            .with_resources(&names, |_| Ok::<_, PoolError>(()))
            .unwrap_err();
        assert!(matches!(err, PoolError::InvalidUsage(_)));
    }

    #[test]
    fn test_from_config() {
        let config = GroupConfig::from_toml_str(
            r#"
            [[pools]]
            name = "x"
            capacity = 2
            retry_attempts = 7

            [[pools]]
            name = "y"
            capacity = 1
            "#,
        )
        .unwrap();

        let group: Group<String> = Group::from_config(&config, |pool_config| {
            let name = pool_config.name.clone();
            move || Ok::<_, PoolError>(name.clone())
        })
        .unwrap();

        assert_eq!(group.names(), ["x", "y"]);
        assert_eq!(group.lookup("x").unwrap().retry_attempts(), 7);
        let value = group
            .with_resources(&["y"], |r| Ok::<_, PoolError>(r[0].to_string()))
            .unwrap();
        assert_eq!(value, "y");
    }
}
