//! Health monitoring for instance pools

use crate::metrics::utilization;

/// Health status of an instance pool
///
/// # Examples
///
/// ```
/// use esox_instancepool::{MemoryHost, Pool, PoolConfiguration};
/// use std::sync::Arc;
///
/// let config = PoolConfiguration::new().with_max_count(4);
/// let pool = Pool::new(Arc::new(MemoryHost::new()), "spark", config).unwrap();
///
/// let health = pool.health_status();
/// assert!(health.is_healthy());
/// assert_eq!(health.idle_instances, 0);
/// ```
#[derive(Debug, Clone)]
pub struct HealthStatus {
    /// Whether the pool is healthy
    pub is_healthy: bool,

    /// Number of warnings detected
    pub warning_count: usize,

    /// Active share of capacity (0.0 to 1.0, 0.0 when unbounded)
    pub utilization: f64,

    pub idle_instances: usize,

    pub active_instances: usize,

    /// Configured capacity, `0` when unbounded
    pub max_count: usize,

    /// Warning messages
    pub warnings: Vec<String>,
}

impl HealthStatus {
    /// Create a new health status
    pub fn new(idle: usize, active: usize, max_count: usize) -> Self {
        let utilization = utilization(active, max_count);

        let mut warnings = Vec::new();
        let mut is_healthy = true;

        if utilization > 0.9 {
            warnings.push(format!("High utilization: {:.1}%", utilization * 100.0));
            is_healthy = false;
        }

        // Next acquire will come back empty
        if max_count > 0 && idle == 0 && active + idle >= max_count {
            warnings.push("Pool is exhausted".to_string());
        }

        Self {
            is_healthy,
            warning_count: warnings.len(),
            utilization,
            idle_instances: idle,
            active_instances: active,
            max_count,
            warnings,
        }
    }

    /// Check if the pool is healthy
    pub fn is_healthy(&self) -> bool {
        self.is_healthy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exhausted_pool_warns() {
        let health = HealthStatus::new(0, 2, 2);
        assert!(!health.is_healthy());
        assert_eq!(health.warning_count, 2);
        assert!(health.warnings.iter().any(|w| w == "Pool is exhausted"));
    }

    #[test]
    fn test_unbounded_pool_is_healthy() {
        let health = HealthStatus::new(0, 500, 0);
        assert!(health.is_healthy());
        assert!(health.warnings.is_empty());
    }
}
