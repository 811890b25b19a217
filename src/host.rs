//! The host environment a pool drives
//!
//! Pools never own instances. They keep handles and ask the host to create,
//! destroy, show and hide the objects behind them.

use std::fmt::Debug;
use std::hash::Hash;

/// Collaborator that creates and manages the real instances behind a pool.
///
/// A handle can go stale at any time when something outside the pool destroys
/// the instance; [`is_valid`](Host::is_valid) must report that, and the pool
/// drops such handles silently on its next scan.
///
/// Pools call these methods while holding their own lock. An implementation
/// must not call back into the same [`Pool`](crate::Pool) from inside them,
/// for example to spawn a sibling of the same template on activation; that
/// deadlocks.
pub trait Host: Send + Sync + 'static {
    /// Identity of what a pool produces. Used as the registry key.
    type Template: Clone + Eq + Hash + Debug + Send + Sync + 'static;

    /// Non-owning handle to one instance.
    type Instance: Clone + PartialEq + Debug + Send + Sync + 'static;

    /// Where an acquired instance should be put.
    type Placement;

    /// Creates a new instance of `template`, placed at `placement` when given.
    fn construct(&self, template: &Self::Template, placement: Option<&Self::Placement>) -> Self::Instance;

    /// Destroys an instance. Called at most once per handle by a pool.
    fn destroy(&self, instance: &Self::Instance);

    /// Shows or hides an instance. Hidden instances are idle.
    fn set_active(&self, instance: &Self::Instance, active: bool);

    fn is_active(&self, instance: &Self::Instance) -> bool;

    /// Whether the handle still refers to a live instance.
    fn is_valid(&self, instance: &Self::Instance) -> bool;

    /// Moves a reused instance to `placement`.
    fn apply_placement(&self, instance: &Self::Instance, placement: &Self::Placement);

    /// Whether `template` can still produce instances.
    ///
    /// By default, every template is valid. Override this when templates are
    /// handles that can be destroyed themselves.
    #[inline(always)]
    fn is_template_valid(&self, _template: &Self::Template) -> bool {
        true
    }
}

/// Hosts that can look up a typed component on an instance.
pub trait ComponentSource<C>: Host {
    /// Returns the component, or `None` when the instance does not carry one.
    fn component(&self, instance: &Self::Instance) -> Option<C>;
}
