//! Core instance pool

use crate::config::{PoolConfiguration, clamp_interval};
use crate::errors::{PoolError, PoolResult};
use crate::health::HealthStatus;
use crate::host::{ComponentSource, Host};
#[cfg(feature = "metrics")]
use crate::metrics::MetricsExporter;
use crate::metrics::{MetricsTracker, PoolMetrics};

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Outcome of an acquire that also says whether an instance was constructed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acquisition<T> {
    /// The acquired value, `None` when the pool is at capacity
    pub value: Option<T>,

    /// `true` only when the pool had to construct a new instance
    pub is_new: bool,
}

impl<T> Acquisition<T> {
    fn reused(value: T) -> Self {
        Self {
            value: Some(value),
            is_new: false,
        }
    }

    fn created(value: T) -> Self {
        Self {
            value: Some(value),
            is_new: true,
        }
    }

    fn exhausted() -> Self {
        Self {
            value: None,
            is_new: false,
        }
    }

    /// Replaces the value, keeping `is_new`.
    pub fn and_then<U, F>(self, f: F) -> Acquisition<U>
    where
        F: FnOnce(T) -> Option<U>,
    {
        Acquisition {
            value: self.value.and_then(f),
            is_new: self.is_new,
        }
    }

    pub fn into_value(self) -> Option<T> {
        self.value
    }
}

struct PoolInner<H: Host> {
    host: Arc<H>,
    template: H::Template,
    config: RwLock<PoolConfiguration>,
    pooled: Mutex<Vec<H::Instance>>,
    metrics: MetricsTracker,
}

/// Recycling pool for the instances of one template.
///
/// Instances are handed out by [`acquire`](Pool::acquire) and come back by
/// being deactivated. Tracked instances stay in creation order; every acquire
/// and trim first drops handles the host reports as invalid.
///
/// `Pool` is a cheap handle; clones share the same instances.
///
/// # Examples
///
/// ```
/// use esox_instancepool::{Host, MemoryHost, Pool, PoolConfiguration};
/// use std::sync::Arc;
///
/// let host = Arc::new(MemoryHost::new());
/// let pool = Pool::new(host.clone(), "bullet", PoolConfiguration::new().with_max_count(1)).unwrap();
///
/// let first = pool.acquire(None).unwrap();
/// assert!(pool.acquire(None).is_none());
///
/// host.set_active(&first, false);
/// assert_eq!(pool.acquire(None), Some(first));
/// ```
pub struct Pool<H: Host> {
    inner: Arc<PoolInner<H>>,
}

impl<H: Host> Clone for Pool<H> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<H: Host> fmt::Debug for Pool<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("template", &self.inner.template)
            .field("count", &self.count())
            .field("config", &self.configuration())
            .finish()
    }
}

impl<H: Host> Pool<H> {
    /// Create a pool for `template`.
    ///
    /// # Errors
    /// [`PoolError::InvalidArgument`] when the host reports the template as invalid.
    pub fn new(
        host: Arc<H>,
        template: impl Into<H::Template>,
        config: PoolConfiguration,
    ) -> PoolResult<Self> {
        let template = template.into();
        if !host.is_template_valid(&template) {
            return Err(PoolError::invalid_template(&template));
        }
        let config = config.normalized();

        debug!(
            template = ?template,
            max_count = config.max_count,
            prepare_count = config.prepare_count,
            interval_ms = config.interval.as_millis() as u64,
            "Created instance pool"
        );

        Ok(Self {
            inner: Arc::new(PoolInner {
                host,
                template,
                config: RwLock::new(config),
                pooled: Mutex::new(Vec::new()),
                metrics: MetricsTracker::new(),
            }),
        })
    }

    pub fn template(&self) -> &H::Template {
        &self.inner.template
    }

    pub fn host(&self) -> &Arc<H> {
        &self.inner.host
    }

    /// Number of tracked instances, active or idle
    pub fn count(&self) -> usize {
        self.inner.pooled.lock().len()
    }

    /// Tracked instances in creation order
    pub fn instances(&self) -> Vec<H::Instance> {
        self.inner.pooled.lock().clone()
    }

    pub fn active_count(&self) -> usize {
        self.occupancy().0
    }

    pub fn idle_count(&self) -> usize {
        self.occupancy().1
    }

    pub fn configuration(&self) -> PoolConfiguration {
        *self.inner.config.read()
    }

    pub fn max_count(&self) -> usize {
        self.inner.config.read().max_count
    }

    /// Set the capacity. Lowering it never destroys instances; it only stops
    /// new ones from being constructed.
    pub fn set_max_count(&self, count: usize) {
        self.inner.config.write().max_count = count;
    }

    pub fn prepare_count(&self) -> usize {
        self.inner.config.read().prepare_count
    }

    pub fn set_prepare_count(&self, count: usize) {
        self.inner.config.write().prepare_count = count;
    }

    pub fn interval(&self) -> Duration {
        self.inner.config.read().interval
    }

    /// Set the trim interval, clamped to [`MIN_INTERVAL`](crate::MIN_INTERVAL)
    pub fn set_interval(&self, interval: Duration) {
        self.inner.config.write().interval = clamp_interval(interval);
    }

    /// Whether both handles point at the same pool
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Get an instance, reusing an idle one or constructing a new one
    ///
    /// Returns `None` when every instance is active and the pool is at
    /// `max_count`.
    pub fn acquire(&self, placement: Option<&H::Placement>) -> Option<H::Instance> {
        self.acquire_detailed(placement).value
    }

    /// Like [`acquire`](Pool::acquire), also reporting whether the instance is new
    pub fn acquire_detailed(&self, placement: Option<&H::Placement>) -> Acquisition<H::Instance> {
        let inner = &*self.inner;
        let host = &*inner.host;
        let max_count = self.max_count();
        inner.metrics.total_requests.fetch_add(1, Ordering::Relaxed);

        let mut pooled = inner.pooled.lock();
        self.purge_stale(&mut pooled);

        if let Some(instance) = pooled.iter().find(|instance| !host.is_active(instance)) {
            if let Some(placement) = placement {
                host.apply_placement(instance, placement);
            }
            host.set_active(instance, true);
            inner.metrics.total_reused.fetch_add(1, Ordering::Relaxed);
            return Acquisition::reused(instance.clone());
        }

        if max_count == 0 || pooled.len() < max_count {
            let instance = host.construct(&inner.template, placement);
            host.set_active(&instance, true);
            pooled.push(instance.clone());
            inner.metrics.total_created.fetch_add(1, Ordering::Relaxed);
            return Acquisition::created(instance);
        }

        inner.metrics.exhausted_events.fetch_add(1, Ordering::Relaxed);
        Acquisition::exhausted()
    }

    /// Acquire an instance and return its `C` component
    ///
    /// The instance stays acquired even when it has no such component.
    pub fn acquire_component<C>(&self, placement: Option<&H::Placement>) -> Option<C>
    where
        H: ComponentSource<C>,
    {
        self.acquire_component_detailed(placement).value
    }

    pub fn acquire_component_detailed<C>(&self, placement: Option<&H::Placement>) -> Acquisition<C>
    where
        H: ComponentSource<C>,
    {
        let host = &*self.inner.host;
        self.acquire_detailed(placement)
            .and_then(|instance| <H as ComponentSource<C>>::component(host, &instance))
    }

    /// Deactivate a tracked instance so the next acquire can reuse it.
    ///
    /// Returns `false` for handles this pool does not track or that went stale.
    pub fn release(&self, instance: &H::Instance) -> bool {
        let host = &*self.inner.host;
        let pooled = self.inner.pooled.lock();
        if !pooled.contains(instance) || !host.is_valid(instance) {
            return false;
        }
        host.set_active(instance, false);
        true
    }

    /// Destroy idle instances until at most `keep_at_most` remain
    ///
    /// Active instances are never destroyed, so the pool can stay above
    /// `keep_at_most`. Returns the number of instances destroyed.
    pub fn trim(&self, keep_at_most: usize) -> usize {
        let inner = &*self.inner;
        let host = &*inner.host;

        let mut pooled = inner.pooled.lock();
        self.purge_stale(&mut pooled);
        if pooled.len() <= keep_at_most {
            return 0;
        }

        let surplus = pooled.len() - keep_at_most;
        let mut remaining = surplus;
        pooled.retain(|instance| {
            if remaining == 0 || host.is_active(instance) {
                return true;
            }
            host.destroy(instance);
            remaining -= 1;
            false
        });

        let destroyed = surplus - remaining;
        if destroyed > 0 {
            MetricsTracker::add(&inner.metrics.total_trimmed, destroyed);
            MetricsTracker::add(&inner.metrics.total_destroyed, destroyed);
            debug!(
                template = ?inner.template,
                destroyed,
                remaining = pooled.len(),
                "Trimmed idle instances"
            );
        }
        destroyed
    }

    /// Destroy every tracked instance, active or idle
    pub fn destroy_all(&self) -> usize {
        let inner = &*self.inner;
        let host = &*inner.host;

        let pooled = std::mem::take(&mut *inner.pooled.lock());
        let mut destroyed = 0;
        for instance in pooled.iter().filter(|instance| host.is_valid(instance)) {
            host.destroy(instance);
            destroyed += 1;
        }

        MetricsTracker::add(&inner.metrics.total_destroyed, destroyed);
        debug!(template = ?inner.template, destroyed, "Destroyed all pooled instances");
        destroyed
    }

    /// Trim to `prepare_count` every `interval` until `cancel` fires
    ///
    /// Settings are re-read each cycle. Cancellation is only observed while
    /// waiting, never in the middle of a trim pass.
    pub async fn trim_loop(&self, cancel: CancellationToken) {
        while !cancel.is_cancelled() {
            self.trim(self.prepare_count());

            tokio::select! {
                () = tokio::time::sleep(self.interval()) => {}
                () = cancel.cancelled() => break,
            }
        }
    }

    /// Get pool metrics
    pub fn metrics(&self) -> PoolMetrics {
        let (active, idle) = self.occupancy();
        self.inner.metrics.get_metrics(active, idle, self.max_count())
    }

    /// Export metrics
    pub fn export_metrics(&self) -> HashMap<String, String> {
        self.metrics().export()
    }

    /// Export metrics in Prometheus format
    #[cfg(feature = "metrics")]
    pub fn export_metrics_prometheus(
        &self,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> String {
        MetricsExporter::export_prometheus(&self.metrics(), pool_name, tags)
    }

    /// Get health status
    pub fn health_status(&self) -> HealthStatus {
        let (active, idle) = self.occupancy();
        HealthStatus::new(idle, active, self.max_count())
    }

    /// (active, idle) among tracked instances that are still valid
    fn occupancy(&self) -> (usize, usize) {
        let host = &*self.inner.host;
        let pooled = self.inner.pooled.lock();
        pooled
            .iter()
            .filter(|instance| host.is_valid(instance))
            .fold((0, 0), |(active, idle), instance| {
                if host.is_active(instance) {
                    (active + 1, idle)
                } else {
                    (active, idle + 1)
                }
            })
    }

    fn purge_stale(&self, pooled: &mut Vec<H::Instance>) {
        let host = &*self.inner.host;
        let before = pooled.len();
        pooled.retain(|instance| host.is_valid(instance));

        let purged = before - pooled.len();
        if purged > 0 {
            MetricsTracker::add(&self.inner.metrics.stale_purged, purged);
            trace!(template = ?self.inner.template, purged, "Dropped stale instance handles");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MIN_INTERVAL;
    use crate::memory::{Label, MemoryHost, Placement};

    fn pool_with(config: PoolConfiguration) -> (Arc<MemoryHost>, Pool<MemoryHost>) {
        let host = Arc::new(MemoryHost::new());
        let pool = Pool::new(host.clone(), "bullet", config).unwrap();
        (host, pool)
    }

    #[test]
    fn test_invalid_template_rejected() {
        let host = Arc::new(MemoryHost::new());
        host.retire_template("ghost");

        let result = Pool::new(host.clone(), "ghost", PoolConfiguration::default());
        assert!(matches!(result, Err(PoolError::InvalidArgument(_))));
        assert!(matches!(
            Pool::new(host, "", PoolConfiguration::default()),
            Err(PoolError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_unbounded_pool_always_creates() {
        let (host, pool) = pool_with(PoolConfiguration::default());

        for _ in 0..50 {
            let acquired = pool.acquire_detailed(None);
            assert!(acquired.value.is_some());
            assert!(acquired.is_new);
        }
        assert_eq!(pool.count(), 50);
        assert_eq!(host.active_count(), 50);
    }

    #[test]
    fn test_capacity_exhaustion_is_not_an_error() {
        let (host, pool) = pool_with(PoolConfiguration::new().with_max_count(3));

        for _ in 0..3 {
            assert!(pool.acquire(None).is_some());
        }
        let acquired = pool.acquire_detailed(None);
        assert_eq!(acquired, Acquisition { value: None, is_new: false });
        assert_eq!(host.constructed_count(), 3);
        assert_eq!(pool.metrics().exhausted_events, 1);
    }

    #[test]
    fn test_released_instance_is_reused() {
        let (host, pool) = pool_with(PoolConfiguration::default());
        let first = pool.acquire(None).unwrap();
        let second = pool.acquire(None).unwrap();

        assert!(pool.release(&second));
        let again = pool.acquire_detailed(None);
        assert_eq!(again.value, Some(second));
        assert!(!again.is_new);
        assert_eq!(host.constructed_count(), 2);

        // First idle one in creation order wins
        host.set_active(&first, false);
        host.set_active(&second, false);
        assert_eq!(pool.acquire(None), Some(first));
    }

    #[test]
    fn test_release_unknown_handle() {
        let (host, pool) = pool_with(PoolConfiguration::default());
        let stranger = host.construct(&"other".to_string(), None);
        assert!(!pool.release(&stranger));

        let mine = pool.acquire(None).unwrap();
        host.destroy_externally(mine);
        assert!(!pool.release(&mine));
    }

    #[test]
    fn test_placement_applied() {
        let (host, pool) = pool_with(PoolConfiguration::default());
        let spawn = Placement::at([1.0, 0.0, 0.0]);
        let id = pool.acquire(Some(&spawn)).unwrap();
        assert_eq!(host.placement_of(id), Some(spawn));

        pool.release(&id);
        let moved = Placement::at([5.0, 5.0, 5.0]);
        assert_eq!(pool.acquire(Some(&moved)), Some(id));
        assert_eq!(host.placement_of(id), Some(moved));

        // No placement leaves the instance where it was
        pool.release(&id);
        pool.acquire(None);
        assert_eq!(host.placement_of(id), Some(moved));
    }

    #[test]
    fn test_stale_instances_purged_on_acquire() {
        let (host, pool) = pool_with(PoolConfiguration::new().with_max_count(2));
        let a = pool.acquire(None).unwrap();
        let _b = pool.acquire(None).unwrap();
        assert!(pool.acquire(None).is_none());

        host.destroy_externally(a);
        let replacement = pool.acquire_detailed(None);
        assert!(replacement.is_new);
        assert_eq!(pool.count(), 2);
        assert!(!pool.instances().contains(&a));
        assert_eq!(pool.metrics().stale_purged, 1);
    }

    #[test]
    fn test_stale_instances_purged_on_trim() {
        let (host, pool) = pool_with(PoolConfiguration::default());
        let ids: Vec<_> = (0..3).filter_map(|_| pool.acquire(None)).collect();
        for id in &ids {
            pool.release(id);
        }
        host.destroy_externally(ids[0]);

        // Until a scan drops it, metrics already skip the stale handle
        assert_eq!(pool.count(), 3);
        assert_eq!(pool.metrics().live_instances, 2);

        // The stale handle is not part of the surplus and never reaches destroy
        assert_eq!(pool.trim(2), 0);
        assert_eq!(pool.count(), 2);
        assert_eq!(pool.instances(), ids[1..].to_vec());
        assert_eq!(host.destroyed_count(), 0);
        assert_eq!(pool.metrics().stale_purged, 1);
    }

    #[test]
    fn test_pool_shares_host() {
        let (host, pool) = pool_with(PoolConfiguration::new().with_max_count(1));
        assert!(Arc::ptr_eq(pool.host(), &host));

        let id = pool.acquire_detailed(None).into_value().unwrap();
        assert_eq!(host.template_of(id).as_deref(), Some("bullet"));
        assert_eq!(pool.acquire_detailed(None).into_value(), None);
    }

    #[test]
    fn test_component_accessor() {
        let (host, pool) = pool_with(PoolConfiguration::default());
        assert_eq!(pool.acquire_component::<Label>(None), None);
        // The instance was still taken
        assert_eq!(pool.active_count(), 1);

        host.attach_label("bullet", "tracer");
        let acquired = pool.acquire_component_detailed::<Label>(None);
        assert_eq!(acquired.value, Some(Label("tracer".to_string())));
        assert!(acquired.is_new);
    }

    #[test]
    fn test_trim_keeps_active_instances() {
        let (host, pool) = pool_with(PoolConfiguration::default());
        let ids: Vec<_> = (0..5).filter_map(|_| pool.acquire(None)).collect();
        pool.release(&ids[1]);
        pool.release(&ids[3]);

        assert_eq!(pool.trim(0), 2);
        assert_eq!(pool.count(), 3);
        assert_eq!(pool.idle_count(), 0);
        assert_eq!(host.destroyed_count(), 2);
        assert!(ids.iter().filter(|id| pool.instances().contains(id)).all(|id| host.is_active(id)));
    }

    #[test]
    fn test_trim_stops_at_target() {
        let (_host, pool) = pool_with(PoolConfiguration::default());
        let ids: Vec<_> = (0..4).filter_map(|_| pool.acquire(None)).collect();
        for id in &ids {
            pool.release(id);
        }

        assert_eq!(pool.trim(10), 0);
        assert_eq!(pool.trim(3), 1);
        // Oldest idle instances go first
        assert_eq!(pool.instances(), ids[1..].to_vec());
        assert_eq!(pool.trim(3), 0);
        assert_eq!(pool.trim(0), 3);
        assert_eq!(pool.count(), 0);
    }

    #[test]
    fn test_destroy_all() {
        let (host, pool) = pool_with(PoolConfiguration::default());
        let a = pool.acquire(None).unwrap();
        let b = pool.acquire(None).unwrap();
        pool.acquire(None);
        pool.release(&b);
        host.destroy_externally(a);

        assert_eq!(pool.destroy_all(), 2);
        assert_eq!(pool.count(), 0);
        assert_eq!(host.live_count(), 0);
    }

    #[test]
    fn test_settings_clamped() {
        let (_host, pool) = pool_with(PoolConfiguration {
            interval: Duration::ZERO,
            ..Default::default()
        });
        assert_eq!(pool.interval(), MIN_INTERVAL);

        pool.set_interval(Duration::from_millis(20));
        assert_eq!(pool.interval(), MIN_INTERVAL);
        pool.set_interval(Duration::from_secs(3));
        assert_eq!(pool.interval(), Duration::from_secs(3));
    }

    #[test]
    fn test_lowering_max_count_is_not_retroactive() {
        let (_host, pool) = pool_with(PoolConfiguration::default());
        for _ in 0..4 {
            pool.acquire(None);
        }
        pool.set_max_count(2);
        assert_eq!(pool.count(), 4);
        assert!(pool.acquire(None).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_trim_loop_shrinks_to_prepare_count() {
        let config = PoolConfiguration::new()
            .with_max_count(2)
            .with_prepare_count(1)
            .with_interval_secs(0.1);
        let (host, pool) = pool_with(config);

        let a = pool.acquire_detailed(None);
        let b = pool.acquire_detailed(None);
        assert!(a.is_new && b.is_new);
        host.set_active(&a.value.unwrap(), false);
        host.set_active(&b.value.unwrap(), false);

        let cancel = CancellationToken::new();
        let looping = pool.clone();
        let token = cancel.clone();
        let task = tokio::spawn(async move { looping.trim_loop(token).await });

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(pool.count(), 1);
        assert_eq!(pool.idle_count(), 1);

        let again = pool.acquire_detailed(None);
        assert!(!again.is_new);
        assert_eq!(again.value, b.value);

        cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_trim_loop_uses_updated_settings() {
        let (_host, pool) = pool_with(PoolConfiguration::new().with_prepare_count(10));
        let ids: Vec<_> = (0..3).filter_map(|_| pool.acquire(None)).collect();
        for id in &ids {
            pool.release(id);
        }

        let cancel = CancellationToken::new();
        let looping = pool.clone();
        let token = cancel.clone();
        let task = tokio::spawn(async move { looping.trim_loop(token).await });

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(pool.count(), 3);

        pool.set_prepare_count(0);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(pool.count(), 0);

        cancel.cancel();
        task.await.unwrap();
    }
}
