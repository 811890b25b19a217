//! Metrics collection and export for instance pools

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Metrics data for a pool
///
/// # Examples
///
/// ```
/// use esox_instancepool::{MemoryHost, Pool, PoolConfiguration};
/// use std::sync::Arc;
///
/// let pool = Pool::new(Arc::new(MemoryHost::new()), "bolt", PoolConfiguration::default()).unwrap();
///
/// let _bolt = pool.acquire(None).unwrap();
/// let metrics = pool.metrics();
/// assert_eq!(metrics.total_created, 1);
/// assert_eq!(metrics.active_instances, 1);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PoolMetrics {
    /// Acquire calls, successful or not
    pub total_requests: usize,

    /// Instances constructed by the pool
    pub total_created: usize,

    /// Acquires served by an idle instance
    pub total_reused: usize,

    /// Acquires that found the pool at capacity
    pub exhausted_events: usize,

    /// Idle instances destroyed by trimming
    pub total_trimmed: usize,

    /// Instances destroyed by the pool for any reason
    pub total_destroyed: usize,

    /// Stale handles dropped during scans
    pub stale_purged: usize,

    /// Tracked instances the host still reports valid
    ///
    /// Stale handles are only dropped by the next acquire or trim, so until
    /// then this can be lower than [`Pool::count`](crate::Pool::count).
    pub live_instances: usize,

    pub active_instances: usize,

    pub idle_instances: usize,

    /// Active share of `max_count` (0.0 to 1.0, 0.0 when unbounded)
    pub utilization: f64,

    /// Configured capacity, `0` when unbounded
    pub max_count: usize,
}

impl PoolMetrics {
    /// Export metrics as a HashMap
    pub fn export(&self) -> HashMap<String, String> {
        let mut metrics = HashMap::new();
        metrics.insert("total_requests".to_string(), self.total_requests.to_string());
        metrics.insert("total_created".to_string(), self.total_created.to_string());
        metrics.insert("total_reused".to_string(), self.total_reused.to_string());
        metrics.insert("exhausted_events".to_string(), self.exhausted_events.to_string());
        metrics.insert("total_trimmed".to_string(), self.total_trimmed.to_string());
        metrics.insert("total_destroyed".to_string(), self.total_destroyed.to_string());
        metrics.insert("stale_purged".to_string(), self.stale_purged.to_string());
        metrics.insert("live_instances".to_string(), self.live_instances.to_string());
        metrics.insert("active_instances".to_string(), self.active_instances.to_string());
        metrics.insert("idle_instances".to_string(), self.idle_instances.to_string());
        metrics.insert("utilization".to_string(), format!("{:.2}", self.utilization));
        metrics.insert("max_count".to_string(), self.max_count.to_string());
        metrics
    }
}

/// Metrics exporter for Prometheus format
#[cfg(feature = "metrics")]
pub struct MetricsExporter;

#[cfg(feature = "metrics")]
impl MetricsExporter {
    /// Export metrics in Prometheus exposition format
    ///
    /// # Examples
    ///
    /// ```
    /// use esox_instancepool::{MemoryHost, Pool, PoolConfiguration};
    /// use std::collections::HashMap;
    /// use std::sync::Arc;
    ///
    /// let pool = Pool::new(Arc::new(MemoryHost::new()), "bolt", PoolConfiguration::default()).unwrap();
    ///
    /// let mut tags = HashMap::new();
    /// tags.insert("scene".to_string(), "arena".to_string());
    ///
    /// let output = pool.export_metrics_prometheus("bolts", Some(&tags));
    /// assert!(output.contains("instancepool_instances_active"));
    /// assert!(output.contains("scene=\"arena\""));
    /// ```
    pub fn export_prometheus(
        metrics: &PoolMetrics,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> String {
        let mut output = String::new();
        let labels = Self::format_labels(pool_name, tags);

        Self::push(&mut output, "instancepool_instances_live", "gauge", "Tracked instances", &labels, metrics.live_instances);
        Self::push(&mut output, "instancepool_instances_active", "gauge", "Instances in use", &labels, metrics.active_instances);
        Self::push(&mut output, "instancepool_instances_idle", "gauge", "Instances waiting for reuse", &labels, metrics.idle_instances);

        output.push_str("# HELP instancepool_utilization Active instances relative to capacity\n");
        output.push_str("# TYPE instancepool_utilization gauge\n");
        output.push_str(&format!("instancepool_utilization{{{}}} {:.2}\n", labels, metrics.utilization));

        Self::push(&mut output, "instancepool_requests_total", "counter", "Acquire requests", &labels, metrics.total_requests);
        Self::push(&mut output, "instancepool_created_total", "counter", "Instances constructed", &labels, metrics.total_created);
        Self::push(&mut output, "instancepool_reused_total", "counter", "Acquires served by idle instances", &labels, metrics.total_reused);
        Self::push(&mut output, "instancepool_events_exhausted_total", "counter", "Acquires refused at capacity", &labels, metrics.exhausted_events);
        Self::push(&mut output, "instancepool_trimmed_total", "counter", "Idle instances destroyed by trimming", &labels, metrics.total_trimmed);
        Self::push(&mut output, "instancepool_destroyed_total", "counter", "Instances destroyed by the pool", &labels, metrics.total_destroyed);
        Self::push(&mut output, "instancepool_stale_purged_total", "counter", "Stale handles dropped", &labels, metrics.stale_purged);

        output
    }

    fn push(output: &mut String, name: &str, kind: &str, help: &str, labels: &str, value: usize) {
        output.push_str(&format!("# HELP {} {}\n", name, help));
        output.push_str(&format!("# TYPE {} {}\n", name, kind));
        output.push_str(&format!("{}{{{}}} {}\n", name, labels, value));
    }

    fn format_labels(pool_name: &str, tags: Option<&HashMap<String, String>>) -> String {
        let mut labels = vec![format!("pool=\"{}\"", pool_name)];

        if let Some(tags) = tags {
            let mut sorted: Vec<_> = tags.iter().collect();
            sorted.sort();
            for (key, value) in sorted {
                labels.push(format!("{}=\"{}\"", key, value));
            }
        }

        labels.join(",")
    }
}

/// Internal metrics tracker
#[derive(Default)]
pub(crate) struct MetricsTracker {
    pub total_requests: AtomicUsize,
    pub total_created: AtomicUsize,
    pub total_reused: AtomicUsize,
    pub exhausted_events: AtomicUsize,
    pub total_trimmed: AtomicUsize,
    pub total_destroyed: AtomicUsize,
    pub stale_purged: AtomicUsize,
}

impl MetricsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(counter: &AtomicUsize, n: usize) {
        if n > 0 {
            counter.fetch_add(n, Ordering::Relaxed);
        }
    }

    pub fn get_metrics(&self, active: usize, idle: usize, max_count: usize) -> PoolMetrics {
        PoolMetrics {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            total_created: self.total_created.load(Ordering::Relaxed),
            total_reused: self.total_reused.load(Ordering::Relaxed),
            exhausted_events: self.exhausted_events.load(Ordering::Relaxed),
            total_trimmed: self.total_trimmed.load(Ordering::Relaxed),
            total_destroyed: self.total_destroyed.load(Ordering::Relaxed),
            stale_purged: self.stale_purged.load(Ordering::Relaxed),
            live_instances: active + idle,
            active_instances: active,
            idle_instances: idle,
            utilization: utilization(active, max_count),
            max_count,
        }
    }
}

pub(crate) fn utilization(active: usize, max_count: usize) -> f64 {
    if max_count > 0 {
        active as f64 / max_count as f64
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracker_snapshot() {
        let tracker = MetricsTracker::new();
        MetricsTracker::add(&tracker.total_requests, 3);
        MetricsTracker::add(&tracker.total_created, 2);
        MetricsTracker::add(&tracker.exhausted_events, 1);

        let metrics = tracker.get_metrics(2, 0, 2);
        assert_eq!(metrics.total_requests, 3);
        assert_eq!(metrics.total_created, 2);
        assert_eq!(metrics.exhausted_events, 1);
        assert_eq!(metrics.live_instances, 2);
        assert_eq!(metrics.utilization, 1.0);

        let exported = metrics.export();
        assert_eq!(exported["utilization"], "1.00");
        assert_eq!(exported["max_count"], "2");
    }

    #[test]
    fn test_unbounded_utilization_is_zero() {
        assert_eq!(utilization(10, 0), 0.0);
    }

    #[cfg(feature = "metrics")]
    #[test]
    fn test_prometheus_labels_sorted() {
        let metrics = MetricsTracker::new().get_metrics(1, 1, 0);
        let mut tags = HashMap::new();
        tags.insert("zone".to_string(), "b".to_string());
        tags.insert("app".to_string(), "a".to_string());

        let output = MetricsExporter::export_prometheus(&metrics, "p", Some(&tags));
        assert!(output.contains("instancepool_instances_live{pool=\"p\",app=\"a\",zone=\"b\"} 2\n"));
        assert!(output.contains("# TYPE instancepool_trimmed_total counter\n"));
    }
}
