use std::sync::Arc;

use crate::core::config::{PoolConfig, PoolOption};
use crate::core::pool::WorkerPool;
use crate::drivers::{DriverRef, MemoryDriver};
use crate::events::EventBus;

/// Builder for a [`WorkerPool`] with optional driver, bus and options.
///
/// Defaults: a fresh [`MemoryDriver`], a private [`EventBus`], and
/// [`PoolConfig::default`].
pub struct WorkerPoolBuilder {
    name: String,
    driver: Option<DriverRef>,
    bus: Option<Arc<EventBus>>,
    config: PoolConfig,
}

impl WorkerPoolBuilder {
    /// Creates a builder for a pool named `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            driver: None,
            bus: None,
            config: PoolConfig::default(),
        }
    }

    /// Sets the queue driver.
    pub fn driver(mut self, driver: DriverRef) -> Self {
        self.driver = Some(driver);
        self
    }

    /// Publishes lifecycle events on a shared bus.
    pub fn bus(mut self, bus: Arc<EventBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Applies one option over the current configuration.
    pub fn option(mut self, option: PoolOption) -> Self {
        self.config.apply(option);
        self
    }

    /// Applies options in order.
    pub fn options(mut self, options: impl IntoIterator<Item = PoolOption>) -> Self {
        for opt in options {
            self.config.apply(opt);
        }
        self
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: PoolConfig) -> Self {
        self.config = config;
        self
    }

    /// Builds the pending pool.
    pub fn build(self) -> Arc<WorkerPool> {
        let driver = self
            .driver
            .unwrap_or_else(|| Arc::new(MemoryDriver::new()));
        let bus = self.bus.unwrap_or_default();
        WorkerPool::new(self.name, driver, bus, self.config)
    }
}
