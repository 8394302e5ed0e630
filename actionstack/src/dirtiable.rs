//! Objects that track whether they differ from their last saved state.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::action::ActionItemRef;
use crate::event::{EventHandlers, Subscription};

/// Payload of a dirtiness notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirtinessUpdate {
    pub old_value: bool,
    pub new_value: bool,
}

/// Handler receiving dirtiness notifications.
pub type DirtinessHandler = Box<dyn Fn(&(dyn Dirtiable + 'static), &DirtinessUpdate)>;

/// An object, typically a document, whose dirtiness is driven by a
/// [`DirtiableManager`](crate::DirtiableManager).
pub trait Dirtiable {
    fn is_dirty(&self) -> bool;

    /// Sets the object's own dirty state. Notifies subscribers on every call,
    /// also when the state does not change.
    fn update_dirtiness(&self, dirty: bool);

    fn subscribe_dirtiness(&self, handler: DirtinessHandler) -> Subscription;

    /// Called when an item affecting this object enters the history.
    fn register_action_item(&self, _item: &ActionItemRef) {}

    /// Called when an item affecting this object leaves the history.
    fn discard_action_item(&self, _item: &ActionItemRef) {}
}

/// Returns the weak handle action items use to refer to `dirtiable`.
pub fn downgrade_dirtiable<D: Dirtiable + 'static>(dirtiable: &Rc<D>) -> Weak<dyn Dirtiable> {
    let weak: Weak<D> = Rc::downgrade(dirtiable);
    weak
}

struct Dependency {
    target: Weak<dyn Dirtiable>,
    _subscription: Subscription,
}

/// The provided [`Dirtiable`] implementation.
///
/// An object is dirty when its own state is dirty or when any of the objects
/// it depends on is dirty. Dependency cycles are tolerated.
pub struct DirtiableObject {
    name: String,
    own_dirty: Cell<bool>,
    reported_dirty: Cell<bool>,
    dependencies: RefCell<Vec<Dependency>>,
    handlers: EventHandlers<dyn Dirtiable, DirtinessUpdate>,
    evaluating: Cell<bool>,
    notifying: Cell<bool>,
}

impl DirtiableObject {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            own_dirty: Cell::new(false),
            reported_dirty: Cell::new(false),
            dependencies: RefCell::new(Vec::new()),
            handlers: EventHandlers::new(),
            evaluating: Cell::new(false),
            notifying: Cell::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Makes this object dirty whenever `dependency` is dirty.
    pub fn register_dirtiable_dependency<D: Dirtiable + 'static>(
        self: &Rc<Self>,
        dependency: &Rc<D>,
    ) {
        if self.depends_on(dependency) {
            return;
        }
        let this = Rc::downgrade(self);
        let subscription = dependency.subscribe_dirtiness(Box::new(move |_, _| {
            if let Some(this) = this.upgrade() {
                this.notify();
            }
        }));
        self.dependencies.borrow_mut().push(Dependency {
            target: downgrade_dirtiable(dependency),
            _subscription: subscription,
        });
        if dependency.is_dirty() {
            self.notify();
        }
    }

    /// Removes a dependency registered with
    /// [`register_dirtiable_dependency`](Self::register_dirtiable_dependency).
    pub fn unregister_dirtiable_dependency<D: Dirtiable + 'static>(&self, dependency: &Rc<D>) {
        let removed = {
            let mut dependencies = self.dependencies.borrow_mut();
            let before = dependencies.len();
            dependencies
                .retain(|d| !std::ptr::addr_eq(d.target.as_ptr(), Rc::as_ptr(dependency)));
            before != dependencies.len()
        };
        if removed {
            self.notify();
        }
    }

    pub fn depends_on<D: Dirtiable + 'static>(&self, dependency: &Rc<D>) -> bool {
        self.dependencies
            .borrow()
            .iter()
            .any(|d| std::ptr::addr_eq(d.target.as_ptr(), Rc::as_ptr(dependency)))
    }

    fn notify(&self) {
        if self.notifying.replace(true) {
            return;
        }
        let update = DirtinessUpdate {
            old_value: self.reported_dirty.get(),
            new_value: self.is_dirty(),
        };
        self.reported_dirty.set(update.new_value);
        self.handlers.raise(self, &update);
        self.notifying.set(false);
    }
}

impl Dirtiable for DirtiableObject {
    fn is_dirty(&self) -> bool {
        if self.own_dirty.get() {
            return true;
        }
        if self.evaluating.replace(true) {
            return false;
        }
        let targets: Vec<Rc<dyn Dirtiable>> = self
            .dependencies
            .borrow()
            .iter()
            .filter_map(|d| d.target.upgrade())
            .collect();
        let dirty = targets.iter().any(|target| target.is_dirty());
        self.evaluating.set(false);
        dirty
    }

    fn update_dirtiness(&self, dirty: bool) {
        log::trace!("Dirtiable '{}' own dirtiness set to {dirty}", self.name);
        self.own_dirty.set(dirty);
        self.notify();
    }

    fn subscribe_dirtiness(&self, handler: DirtinessHandler) -> Subscription {
        self.handlers.subscribe(handler)
    }
}

impl fmt::Debug for DirtiableObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirtiableObject")
            .field("name", &self.name)
            .field("own_dirty", &self.own_dirty.get())
            .field("dependencies", &self.dependencies.borrow().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(object: &DirtiableObject) -> (Rc<RefCell<Vec<DirtinessUpdate>>>, Subscription) {
        let updates = Rc::new(RefCell::new(Vec::new()));
        let sink = updates.clone();
        let subscription =
            object.subscribe_dirtiness(Box::new(move |_, update| sink.borrow_mut().push(*update)));
        (updates, subscription)
    }

    #[test]
    fn downgraded_handle_refers_to_the_object() {
        let document = Rc::new(DirtiableObject::new("document"));
        let weak = downgrade_dirtiable(&document);
        assert!(Weak::ptr_eq(&weak, &downgrade_dirtiable(&document)));

        document.update_dirtiness(true);
        assert!(weak.upgrade().is_some_and(|dirtiable| dirtiable.is_dirty()));

        drop(document);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn update_notifies_every_time() {
        let document = DirtiableObject::new("document");
        let (updates, _subscription) = record(&document);

        document.update_dirtiness(true);
        document.update_dirtiness(true);
        document.update_dirtiness(false);

        assert_eq!(
            *updates.borrow(),
            [
                DirtinessUpdate { old_value: false, new_value: true },
                DirtinessUpdate { old_value: true, new_value: true },
                DirtinessUpdate { old_value: true, new_value: false },
            ]
        );
    }

    #[test]
    fn dependency_makes_dependent_dirty() {
        let scene = Rc::new(DirtiableObject::new("scene"));
        let mesh = Rc::new(DirtiableObject::new("mesh"));
        scene.register_dirtiable_dependency(&mesh);
        let (updates, _subscription) = record(&scene);

        mesh.update_dirtiness(true);
        assert!(scene.is_dirty());
        assert_eq!(updates.borrow().last().map(|u| u.new_value), Some(true));

        mesh.update_dirtiness(false);
        assert!(!scene.is_dirty());
    }

    #[test]
    fn unregistered_dependency_no_longer_counts() {
        let scene = Rc::new(DirtiableObject::new("scene"));
        let mesh = Rc::new(DirtiableObject::new("mesh"));
        scene.register_dirtiable_dependency(&mesh);
        mesh.update_dirtiness(true);

        scene.unregister_dirtiable_dependency(&mesh);
        assert!(!scene.depends_on(&mesh));
        assert!(!scene.is_dirty());
    }

    #[test]
    fn cyclic_dependencies_terminate() {
        let a = Rc::new(DirtiableObject::new("a"));
        let b = Rc::new(DirtiableObject::new("b"));
        a.register_dirtiable_dependency(&b);
        b.register_dirtiable_dependency(&a);

        assert!(!a.is_dirty());
        b.update_dirtiness(true);
        assert!(a.is_dirty());
        assert!(b.is_dirty());
    }

    #[test]
    fn dropped_dependency_is_ignored() {
        let scene = Rc::new(DirtiableObject::new("scene"));
        let mesh = Rc::new(DirtiableObject::new("mesh"));
        scene.register_dirtiable_dependency(&mesh);
        mesh.update_dirtiness(true);
        drop(mesh);
        assert!(!scene.is_dirty());
    }
}
