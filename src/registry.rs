//! Directory of pools keyed by template

use crate::config::PoolConfiguration;
use crate::errors::{PoolError, PoolResult};
use crate::host::Host;
use crate::pool::Pool;
use crate::trim::TrimTask;

use dashmap::DashMap;
use parking_lot::RwLock;
use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt::{self, Debug};
use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::runtime::Handle;
use tracing::{debug, warn};

/// How [`PoolRegistry::shutdown`] treats the instances it still tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownMode {
    /// Remove every pool and destroy all of its instances
    Graceful,

    /// The host is already tearing down: stop trimming and forget every pool
    /// without calling into the host at all
    HostTerminating,
}

struct RegistryState<H: Host> {
    pools: HashMap<H::Template, Pool<H>>,
    order: Vec<Pool<H>>,
}

/// Owns one pool per template and the trim task of each.
///
/// The map and the ordered list change together under one lock. Trim tasks
/// run on the runtime given at construction while the registry is active.
/// Dropping the registry stops every trim task but destroys no instances;
/// call [`shutdown`](PoolRegistry::shutdown) for that.
///
/// # Examples
///
/// ```
/// use esox_instancepool::{MemoryHost, PoolConfiguration, PoolError, PoolRegistry};
/// use std::sync::Arc;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let registry = PoolRegistry::new(Arc::new(MemoryHost::new()), tokio::runtime::Handle::current());
///
/// let pool = registry.get_or_create("arrow", PoolConfiguration::new().with_max_count(8)).unwrap();
/// let same = registry.get_or_create("arrow", PoolConfiguration::default()).unwrap();
/// assert!(pool.ptr_eq(&same));
///
/// registry.remove("arrow", true).unwrap();
/// assert!(matches!(registry.get("arrow"), Err(PoolError::NotFound(_))));
/// # }
/// ```
pub struct PoolRegistry<H: Host> {
    host: Arc<H>,
    scheduler: Handle,
    state: RwLock<RegistryState<H>>,
    trim_tasks: DashMap<H::Template, TrimTask>,
    active: AtomicBool,
}

impl<H: Host> Debug for PoolRegistry<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolRegistry")
            .field("pools", &self.state.read().order)
            .field("trim_tasks", &self.trim_tasks.len())
            .field("active", &self.is_active())
            .finish()
    }
}

impl<H: Host> PoolRegistry<H> {
    /// Create an empty, active registry spawning trim tasks on `scheduler`
    pub fn new(host: Arc<H>, scheduler: Handle) -> Self {
        Self {
            host,
            scheduler,
            state: RwLock::new(RegistryState {
                pools: HashMap::new(),
                order: Vec::new(),
            }),
            trim_tasks: DashMap::new(),
            active: AtomicBool::new(true),
        }
    }

    /// Create a registry restoring previously saved pools, in order
    ///
    /// # Errors
    /// [`PoolError::InvalidArgument`] for an invalid template,
    /// [`PoolError::AlreadyExists`] when a template appears twice.
    pub fn with_pools<I, T>(host: Arc<H>, scheduler: Handle, pools: I) -> PoolResult<Self>
    where
        I: IntoIterator<Item = (T, PoolConfiguration)>,
        T: Into<H::Template>,
    {
        let registry = Self::new(host, scheduler);
        for (template, config) in pools {
            registry.create(template, config)?;
        }
        Ok(registry)
    }

    pub fn host(&self) -> &Arc<H> {
        &self.host
    }

    /// Return the pool for `template`, creating it with `config` if missing
    ///
    /// `config` is ignored when the pool already exists.
    ///
    /// # Errors
    /// [`PoolError::InvalidArgument`] when the template is invalid.
    pub fn get_or_create(
        &self,
        template: impl Into<H::Template>,
        config: PoolConfiguration,
    ) -> PoolResult<Pool<H>> {
        let template = template.into();
        if !self.host.is_template_valid(&template) {
            return Err(PoolError::invalid_template(&template));
        }

        let mut state = self.state.write();
        if let Some(pool) = state.pools.get(&template) {
            return Ok(pool.clone());
        }
        self.register(&mut state, template, config)
    }

    /// Create and register a pool for `template`, starting its trim task
    ///
    /// # Errors
    /// [`PoolError::InvalidArgument`] when the template is invalid,
    /// [`PoolError::AlreadyExists`] when a pool for it is registered.
    pub fn create(
        &self,
        template: impl Into<H::Template>,
        config: PoolConfiguration,
    ) -> PoolResult<Pool<H>> {
        let template = template.into();
        if !self.host.is_template_valid(&template) {
            return Err(PoolError::invalid_template(&template));
        }

        let mut state = self.state.write();
        if state.pools.contains_key(&template) {
            return Err(PoolError::already_exists(&template));
        }
        self.register(&mut state, template, config)
    }

    /// # Errors
    /// [`PoolError::NotFound`] when no pool is registered for `template`.
    pub fn get<Q>(&self, template: &Q) -> PoolResult<Pool<H>>
    where
        H::Template: Borrow<Q>,
        Q: Hash + Eq + Debug + ?Sized,
    {
        self.state
            .read()
            .pools
            .get(template)
            .cloned()
            .ok_or_else(|| PoolError::not_found(&template))
    }

    pub fn has<Q>(&self, template: &Q) -> bool
    where
        H::Template: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.state.read().pools.contains_key(template)
    }

    /// Whether this exact pool is registered here
    pub fn has_pool(&self, pool: &Pool<H>) -> bool {
        self.state
            .read()
            .pools
            .get(pool.template())
            .is_some_and(|registered| registered.ptr_eq(pool))
    }

    /// Unregister the pool for `template` and stop its trim task
    ///
    /// # Errors
    /// [`PoolError::NotFound`] when no pool is registered for `template`.
    pub fn remove<Q>(&self, template: &Q, destroy_instances: bool) -> PoolResult<Pool<H>>
    where
        H::Template: Borrow<Q>,
        Q: Hash + Eq + Debug + ?Sized,
    {
        let pool = self.detach(template, None)?;
        self.finish_removal(&pool, destroy_instances);
        Ok(pool)
    }

    /// Unregister `pool`; same outcome as removing by its template
    ///
    /// # Errors
    /// [`PoolError::NotFound`] when `pool` is not the one registered here.
    pub fn remove_pool(&self, pool: &Pool<H>, destroy_instances: bool) -> PoolResult<()> {
        let pool = self.detach(pool.template(), Some(pool))?;
        self.finish_removal(&pool, destroy_instances);
        Ok(())
    }

    /// Number of registered pools
    pub fn len(&self) -> usize {
        self.state.read().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pool at `index` in registration order
    pub fn pool_at(&self, index: usize) -> Option<Pool<H>> {
        self.state.read().order.get(index).cloned()
    }

    /// All pools in registration order
    pub fn pools(&self) -> Vec<Pool<H>> {
        self.state.read().order.clone()
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Whether a trim task is running for `template`
    pub fn is_trimming<Q>(&self, template: &Q) -> bool
    where
        H::Template: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.trim_tasks
            .get(template)
            .is_some_and(|task| !task.is_finished())
    }

    /// (Re)start the trim task of every registered pool
    pub fn activate(&self) {
        let state = self.state.write();
        self.active.store(true, Ordering::Release);
        for pool in &state.order {
            self.start_trimming(pool);
        }
        debug!(pools = state.order.len(), "Pool registry activated");
    }

    /// Stop every trim task. Pools and instances are kept.
    pub fn deactivate(&self) {
        let state = self.state.write();
        self.active.store(false, Ordering::Release);
        self.trim_tasks.clear();
        debug!(pools = state.order.len(), "Pool registry deactivated");
    }

    /// Stop all trimming and unregister every pool
    ///
    /// Leaves the registry empty and inactive. Returns the number of pools
    /// removed.
    pub fn shutdown(&self, mode: ShutdownMode) -> usize {
        let mut state = self.state.write();
        self.active.store(false, Ordering::Release);
        self.trim_tasks.clear();
        state.pools.clear();
        let pools = std::mem::take(&mut state.order);
        drop(state);

        match mode {
            ShutdownMode::Graceful => {
                for pool in &pools {
                    pool.destroy_all();
                }
                debug!(pools = pools.len(), "Pool registry shut down");
            }
            ShutdownMode::HostTerminating => {
                let abandoned: usize = pools.iter().map(Pool::count).sum();
                warn!(
                    pools = pools.len(),
                    abandoned,
                    "Host is terminating, leaving pooled instances to the host"
                );
            }
        }
        pools.len()
    }

    fn register(
        &self,
        state: &mut RegistryState<H>,
        template: H::Template,
        config: PoolConfiguration,
    ) -> PoolResult<Pool<H>> {
        let pool = Pool::new(Arc::clone(&self.host), template.clone(), config)?;
        state.pools.insert(template, pool.clone());
        state.order.push(pool.clone());

        if self.is_active() {
            self.start_trimming(&pool);
        }
        Ok(pool)
    }

    /// Caller holds the state lock.
    fn start_trimming(&self, pool: &Pool<H>) {
        let task = TrimTask::start(pool.clone(), &self.scheduler);
        if let Some(previous) = self.trim_tasks.insert(pool.template().clone(), task) {
            previous.stop();
        }
    }

    /// Take the pool out of the map, the list and the task table at once.
    fn detach<Q>(&self, template: &Q, expected: Option<&Pool<H>>) -> PoolResult<Pool<H>>
    where
        H::Template: Borrow<Q>,
        Q: Hash + Eq + Debug + ?Sized,
    {
        let mut state = self.state.write();
        let matches = state
            .pools
            .get(template)
            .is_some_and(|registered| expected.is_none_or(|pool| registered.ptr_eq(pool)));
        let Some(pool) = matches.then(|| state.pools.remove(template)).flatten() else {
            return Err(PoolError::not_found(&template));
        };
        state.order.retain(|listed| !listed.ptr_eq(&pool));
        if let Some((_, task)) = self.trim_tasks.remove(template) {
            task.stop();
        }
        Ok(pool)
    }

    fn finish_removal(&self, pool: &Pool<H>, destroy_instances: bool) {
        let destroyed = if destroy_instances { pool.destroy_all() } else { 0 };
        debug!(template = ?pool.template(), destroyed, "Removed pool");
    }
}
