//! # WorkerPoolManager: named registry of pools sharing one bus.
//!
//! ```text
//! WorkerPoolManager
//!   ├─ bus: Arc<EventBus>          (shared by every pool it creates)
//!   └─ pools: name → Arc<WorkerPool>
//!
//! start_all / stop_all / release_all ──► join_all(per-pool op)
//! ```
//!
//! ## Rules
//! - Names are unique, and one pool instance is registered at most once.
//! - Lifecycle calls on unknown names, or on pools already in the target
//!   state, are no-ops.
//! - `release` and `release_all` also unregister.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use futures::future::join_all;
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::core::config::{PoolConfig, PoolOption};
use crate::core::pool::WorkerPool;
use crate::drivers::DriverRef;
use crate::error::PoolError;
use crate::events::EventBus;

/// Named collection of [`WorkerPool`]s.
///
/// # Example
/// ```rust
/// use std::sync::Arc;
/// use jobvisor::{MemoryDriver, PoolOption, WorkerPoolManager};
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() {
///     let manager = WorkerPoolManager::new();
///     let (mail, created) = manager.create("mail", Arc::new(MemoryDriver::new()), [PoolOption::MaxWorkers(4)]);
///     assert!(created);
///
///     let (again, created) = manager.create("mail", Arc::new(MemoryDriver::new()), []);
///     assert!(!created);
///     assert!(Arc::ptr_eq(&mail, &again));
///
///     manager.start_all().await;
///     manager.release_all().await;
///     assert!(manager.is_empty());
/// }
/// ```
pub struct WorkerPoolManager {
    bus: Arc<EventBus>,
    pools: Mutex<BTreeMap<String, Arc<WorkerPool>>>,
}

impl Default for WorkerPoolManager {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkerPoolManager {
    /// Creates a manager with its own bus (lifecycle topics registered).
    pub fn new() -> Self {
        Self::with_bus(Arc::new(EventBus::with_lifecycle_topics()))
    }

    /// Creates a manager whose pools publish on `bus`.
    pub fn with_bus(bus: Arc<EventBus>) -> Self {
        bus.ensure_lifecycle_topics();
        Self {
            bus,
            pools: Mutex::new(BTreeMap::new()),
        }
    }

    /// The bus shared by pools created here.
    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// Returns the pool named `name`, creating it if absent.
    ///
    /// The flag is `true` when the pool was created by this call; `driver`
    /// and `options` are ignored otherwise.
    pub fn create(
        &self,
        name: &str,
        driver: DriverRef,
        options: impl IntoIterator<Item = PoolOption>,
    ) -> (Arc<WorkerPool>, bool) {
        let mut pools = self.pools.lock();
        if let Some(pool) = pools.get(name) {
            return (Arc::clone(pool), false);
        }
        let pool = WorkerPool::new(
            name,
            driver,
            Arc::clone(&self.bus),
            PoolConfig::from_options(options),
        );
        pools.insert(name.to_string(), Arc::clone(&pool));
        debug!(pool = name, id = %pool.id(), "pool created");
        (pool, true)
    }

    /// Registers an existing pool under `name` and renames it accordingly.
    ///
    /// # Errors
    /// - [`PoolError::NameExists`] if `name` is taken.
    /// - [`PoolError::InstanceExists`] if `pool` is already registered.
    pub fn add(&self, name: &str, pool: Arc<WorkerPool>) -> Result<(), PoolError> {
        let mut pools = self.pools.lock();
        if pools.contains_key(name) {
            return Err(PoolError::NameExists {
                name: name.to_string(),
            });
        }
        if let Some((existing, _)) = pools.iter().find(|(_, p)| Arc::ptr_eq(p, &pool)) {
            return Err(PoolError::InstanceExists {
                name: existing.clone(),
            });
        }
        pool.set_name(name);
        pools.insert(name.to_string(), pool);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<WorkerPool>> {
        self.pools.lock().get(name).cloned()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.pools.lock().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.pools.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.lock().is_empty()
    }

    /// Unregisters `name` without releasing the pool.
    pub fn remove(&self, name: &str) -> Option<Arc<WorkerPool>> {
        self.pools.lock().remove(name)
    }

    /// Starts the pool named `name`, if any.
    pub async fn start(&self, name: &str) {
        if let Some(pool) = self.get(name) {
            pool.start().await;
        }
    }

    /// Stops the pool named `name`, if any.
    pub async fn stop(&self, name: &str) {
        if let Some(pool) = self.get(name) {
            pool.stop().await;
        }
    }

    /// Releases and unregisters the pool named `name`, if any.
    pub async fn release(&self, name: &str) {
        if let Some(pool) = self.remove(name) {
            pool.release().await;
        }
    }

    /// Starts every pool concurrently.
    pub async fn start_all(&self) {
        let pools = self.snapshot();
        join_all(pools.iter().map(|p| p.start())).await;
        info!(pools = pools.len(), "all pools started");
    }

    /// Stops every running pool concurrently.
    pub async fn stop_all(&self) {
        let pools = self.snapshot();
        join_all(pools.iter().map(|p| p.stop())).await;
        info!(pools = pools.len(), "all pools stopped");
    }

    /// Releases every pool concurrently and clears the registry.
    pub async fn release_all(&self) {
        let pools: Vec<_> = std::mem::take(&mut *self.pools.lock())
            .into_values()
            .collect();
        join_all(pools.iter().map(|p| p.release())).await;
        info!(pools = pools.len(), "all pools released");
    }

    fn snapshot(&self) -> Vec<Arc<WorkerPool>> {
        self.pools.lock().values().cloned().collect()
    }
}

impl fmt::Debug for WorkerPoolManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPoolManager")
            .field("pools", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::pool::PoolStatus;
    use crate::drivers::MemoryDriver;

    fn driver() -> DriverRef {
        Arc::new(MemoryDriver::new())
    }

    #[test]
    fn test_create_round_trip() {
        let m = WorkerPoolManager::new();
        let (a, created) = m.create("mail", driver(), []);
        assert!(created);
        let (b, created) = m.create("mail", driver(), []);
        assert!(!created);
        assert!(Arc::ptr_eq(&a, &b));
        assert!(Arc::ptr_eq(a.bus(), m.bus()));
        assert_eq!(m.names(), ["mail"]);
    }

    #[test]
    fn test_add_conflicts() {
        let m = WorkerPoolManager::new();
        let (mail, _) = m.create("mail", driver(), []);

        let other = WorkerPool::builder("other").build();
        assert_eq!(
            m.add("mail", Arc::clone(&other)),
            Err(PoolError::NameExists {
                name: "mail".into()
            })
        );
        assert_eq!(
            m.add("copy", mail),
            Err(PoolError::InstanceExists {
                name: "mail".into()
            })
        );

        m.add("renamed", Arc::clone(&other)).unwrap();
        assert_eq!(other.name(), "renamed");
        assert_eq!(m.len(), 2);
    }

    #[test]
    fn test_remove_detaches_without_release() {
        let m = WorkerPoolManager::new();
        m.create("mail", driver(), []);
        let pool = m.remove("mail").unwrap();
        assert!(m.is_empty());
        assert!(m.get("mail").is_none());
        assert_eq!(pool.status(), PoolStatus::Pending);
    }

    #[tokio::test]
    async fn test_lifecycle_by_name_is_idempotent() {
        let m = WorkerPoolManager::new();
        let (pool, _) = m.create("mail", driver(), []);

        m.start("missing").await;
        m.start("mail").await;
        m.start("mail").await;
        assert_eq!(pool.status(), PoolStatus::Running);

        m.stop("mail").await;
        m.stop("mail").await;
        assert_eq!(pool.status(), PoolStatus::Stopped);

        m.release("mail").await;
        m.release("mail").await;
        assert_eq!(pool.status(), PoolStatus::Released);
        assert!(m.is_empty());
    }

    #[tokio::test]
    async fn test_all_ops() {
        let m = WorkerPoolManager::new();
        let (a, _) = m.create("a", driver(), []);
        let (b, _) = m.create("b", driver(), []);

        m.start_all().await;
        assert_eq!(a.status(), PoolStatus::Running);
        assert_eq!(b.status(), PoolStatus::Running);

        m.stop_all().await;
        m.stop_all().await;
        assert_eq!(a.status(), PoolStatus::Stopped);

        m.release_all().await;
        assert!(m.is_empty());
        assert_eq!(b.status(), PoolStatus::Released);
    }
}
