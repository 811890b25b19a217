//! # Esox Instance Pool
//!
//! Recycles expensive instances instead of constructing and destroying them
//! over and over. Each [`Pool`] serves one template; a [`PoolRegistry`] keeps
//! one pool per template and trims idle surplus in the background.
//!
//! ## Features
//!
//! - Reuse of idle instances in creation order
//! - Optional capacity bound; exhaustion is an empty result, not an error
//! - Periodic trimming of idle instances down to a target count
//! - Tolerates instances destroyed behind the pool's back
//! - Cancellable trim tasks on a tokio runtime
//! - Metrics, Prometheus export and health status
//!
//! Instances live in a host environment (a scene, a GPU context, a process
//! table) described by the [`Host`] trait. [`MemoryHost`] is a ready-made
//! in-memory host.
//!
//! ## Quick Start
//!
//! ```rust
//! use esox_instancepool::{Host, MemoryHost, Pool, PoolConfiguration};
//! use std::sync::Arc;
//!
//! let host = Arc::new(MemoryHost::new());
//! let pool = Pool::new(host.clone(), "enemy", PoolConfiguration::new().with_max_count(2)).unwrap();
//!
//! let goblin = pool.acquire(None).unwrap();
//! host.set_active(&goblin, false); // hand it back
//!
//! let again = pool.acquire_detailed(None);
//! assert_eq!(again.value, Some(goblin));
//! assert!(!again.is_new);
//! ```

mod pool;
mod config;
mod host;
mod memory;
mod metrics;
mod health;
mod trim;
mod registry;
mod errors;

pub use pool::{Acquisition, Pool};
pub use config::{PoolConfiguration, MIN_INTERVAL};
pub use host::{ComponentSource, Host};
pub use memory::{InstanceId, Label, MemoryHost, Placement};
pub use metrics::PoolMetrics;
#[cfg(feature = "metrics")]
pub use metrics::MetricsExporter;
pub use health::HealthStatus;
pub use trim::TrimTask;
pub use registry::{PoolRegistry, ShutdownMode};
pub use errors::{PoolError, PoolResult};
