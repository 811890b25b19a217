//! In-process host keeping instance records in memory
//!
//! Useful for headless pools, demos and tests. Templates are plain names and
//! instances are numeric handles.

use crate::host::{ComponentSource, Host};

use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Handle to an instance living in a [`MemoryHost`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(u64);

impl InstanceId {
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Position, orientation and optional parent of an instance
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Placement {
    pub position: [f32; 3],
    pub rotation: [f32; 4],
    pub parent: Option<InstanceId>,
}

impl Placement {
    pub fn at(position: [f32; 3]) -> Self {
        Self {
            position,
            rotation: [0.0, 0.0, 0.0, 1.0],
            parent: None,
        }
    }

    pub fn with_parent(mut self, parent: InstanceId) -> Self {
        self.parent = Some(parent);
        self
    }
}

/// Component attached to every instance of a labelled template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label(pub String);

#[derive(Debug, Clone)]
struct Record {
    template: String,
    active: bool,
    placement: Option<Placement>,
}

/// Host that keeps its instances in a map.
///
/// # Examples
///
/// ```
/// use esox_instancepool::{Host, MemoryHost};
///
/// let host = MemoryHost::new();
/// let id = host.construct(&"crate".to_string(), None);
/// assert!(host.is_valid(&id));
///
/// host.destroy_externally(id);
/// assert!(!host.is_valid(&id));
/// ```
#[derive(Default)]
pub struct MemoryHost {
    instances: Mutex<HashMap<InstanceId, Record>>,
    retired_templates: Mutex<HashSet<String>>,
    labels: Mutex<HashMap<String, Label>>,
    next_id: AtomicU64,
    constructed: AtomicUsize,
    destroyed: AtomicUsize,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `template` invalid, as if its source asset had been unloaded.
    pub fn retire_template(&self, template: impl Into<String>) {
        self.retired_templates.lock().insert(template.into());
    }

    /// Attaches a [`Label`] component to every instance of `template`.
    pub fn attach_label(&self, template: impl Into<String>, label: impl Into<String>) {
        self.labels.lock().insert(template.into(), Label(label.into()));
    }

    /// Destroys an instance behind the pool's back.
    pub fn destroy_externally(&self, id: InstanceId) -> bool {
        self.instances.lock().remove(&id).is_some()
    }

    /// Number of instances currently alive
    pub fn live_count(&self) -> usize {
        self.instances.lock().len()
    }

    /// Number of instances alive and active
    pub fn active_count(&self) -> usize {
        self.instances.lock().values().filter(|r| r.active).count()
    }

    /// Total instances ever constructed
    pub fn constructed_count(&self) -> usize {
        self.constructed.load(Ordering::Relaxed)
    }

    /// Total instances destroyed through [`Host::destroy`]
    pub fn destroyed_count(&self) -> usize {
        self.destroyed.load(Ordering::Relaxed)
    }

    pub fn placement_of(&self, id: InstanceId) -> Option<Placement> {
        self.instances.lock().get(&id).and_then(|r| r.placement)
    }

    pub fn template_of(&self, id: InstanceId) -> Option<String> {
        self.instances.lock().get(&id).map(|r| r.template.clone())
    }
}

impl fmt::Debug for MemoryHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryHost")
            .field("live", &self.live_count())
            .field("constructed", &self.constructed_count())
            .field("destroyed", &self.destroyed_count())
            .finish()
    }
}

impl Host for MemoryHost {
    type Template = String;
    type Instance = InstanceId;
    type Placement = Placement;

    fn construct(&self, template: &String, placement: Option<&Placement>) -> InstanceId {
        let id = InstanceId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.instances.lock().insert(
            id,
            Record {
                template: template.clone(),
                active: false,
                placement: placement.copied(),
            },
        );
        self.constructed.fetch_add(1, Ordering::Relaxed);
        id
    }

    fn destroy(&self, instance: &InstanceId) {
        if self.instances.lock().remove(instance).is_some() {
            self.destroyed.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn set_active(&self, instance: &InstanceId, active: bool) {
        if let Some(record) = self.instances.lock().get_mut(instance) {
            record.active = active;
        }
    }

    fn is_active(&self, instance: &InstanceId) -> bool {
        self.instances.lock().get(instance).is_some_and(|r| r.active)
    }

    fn is_valid(&self, instance: &InstanceId) -> bool {
        self.instances.lock().contains_key(instance)
    }

    fn apply_placement(&self, instance: &InstanceId, placement: &Placement) {
        if let Some(record) = self.instances.lock().get_mut(instance) {
            record.placement = Some(*placement);
        }
    }

    fn is_template_valid(&self, template: &String) -> bool {
        !template.is_empty() && !self.retired_templates.lock().contains(template)
    }
}

impl ComponentSource<Label> for MemoryHost {
    fn component(&self, instance: &InstanceId) -> Option<Label> {
        let template = self.template_of(*instance)?;
        self.labels.lock().get(&template).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_construct_and_destroy() {
        let host = MemoryHost::new();
        let template = "tree".to_string();
        let a = host.construct(&template, None);
        let b = host.construct(&template, Some(&Placement::at([1.0, 2.0, 3.0])));

        assert_ne!(a, b);
        assert_eq!(host.live_count(), 3);
        assert_eq!(host.placement_of(b).map(|p| p.position), Some([1.0, 2.0, 3.0]));
        assert_eq!(b.get(), a.get() + 1);
        assert_eq!(b.to_string(), format!("#{}", b.get()));

        let child = host.construct(&template, Some(&Placement::at([0.0; 3]).with_parent(b)));
        assert_eq!(host.placement_of(child).and_then(|p| p.parent), Some(b));

        host.destroy(&a);
        host.destroy(&a);
        assert_eq!(host.destroyed_count(), 1);
        assert!(!host.is_valid(&a));
    }

    #[test]
    fn test_activity_flag() {
        let host = MemoryHost::new();
        let id = host.construct(&"lamp".to_string(), None);
        assert!(!host.is_active(&id));

        host.set_active(&id, true);
        assert!(host.is_active(&id));
        assert_eq!(host.active_count(), 1);

        host.destroy_externally(id);
        assert!(!host.is_active(&id));
        assert_eq!(host.destroyed_count(), 0);
    }

    #[test]
    fn test_template_validity() {
        let host = MemoryHost::new();
        assert!(host.is_template_valid(&"rock".to_string()));
        assert!(!host.is_template_valid(&String::new()));

        host.retire_template("rock");
        assert!(!host.is_template_valid(&"rock".to_string()));
    }

    #[test]
    fn test_label_component() {
        let host = MemoryHost::new();
        host.attach_label("enemy", "goblin");
        let enemy = host.construct(&"enemy".to_string(), None);
        let prop = host.construct(&"prop".to_string(), None);

        assert_eq!(host.component(&enemy), Some(Label("goblin".to_string())));
        assert_eq!(ComponentSource::<Label>::component(&host, &prop), None);
    }
}
