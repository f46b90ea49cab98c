//! # Runtime configuration.
//!
//! [`Config`] carries the settings a [`SystemMap`](crate::SystemMap) is
//! bootstrapped with. There is deliberately little to tune: the coordinator
//! has no built-in timeouts, and each subsystem's bus is unbounded so that
//! cross-subsystem pushes can never block.
//!
//! # Example
//! ```
//! use subvisor::{Config, SystemMap};
//!
//! let mut cfg = Config::default();
//! cfg.max_subsystems = 64;
//!
//! let map = SystemMap::new(cfg);
//! assert_eq!(map.capacity(), 64);
//! ```

/// Configuration for a system map and the subsystems registered in it.
#[derive(Clone, Debug)]
pub struct Config {
    /// Maximum number of subsystems the registry will admit.
    pub max_subsystems: u32,
}

impl Default for Config {
    /// Provides a default configuration:
    /// - `max_subsystems = 16`
    fn default() -> Self {
        Self { max_subsystems: 16 }
    }
}
