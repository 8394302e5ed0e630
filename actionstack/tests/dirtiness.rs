//! Dirtiness propagation scenarios driven through a transactional stack.

mod common;

use std::cell::RefCell;
use std::rc::Rc;

use rstest::rstest;

use redlilium_actionstack::{
    ActionItemRef, AnonymousActionItem, Dirtiable, DirtiableManager, DirtiableObject,
    DirtinessUpdate, TransactionalActionStack, ValueChangedActionItem, downgrade_dirtiable,
};

fn edit(document: &Rc<DirtiableObject>, name: &str) -> ActionItemRef {
    Rc::new(AnonymousActionItem::new(
        name,
        [downgrade_dirtiable(document)],
        || {},
        || {},
    ))
}

/// A document that remembers the items reported by the manager.
#[derive(Default)]
struct TrackingDocument {
    dirty: std::cell::Cell<bool>,
    registered: RefCell<Vec<String>>,
    discarded: RefCell<Vec<String>>,
    handlers: redlilium_actionstack::EventHandlers<dyn Dirtiable, DirtinessUpdate>,
}

impl Dirtiable for TrackingDocument {
    fn is_dirty(&self) -> bool {
        self.dirty.get()
    }

    fn update_dirtiness(&self, dirty: bool) {
        let old_value = self.dirty.replace(dirty);
        self.handlers.raise(
            self,
            &DirtinessUpdate {
                old_value,
                new_value: dirty,
            },
        );
    }

    fn subscribe_dirtiness(
        &self,
        handler: redlilium_actionstack::DirtinessHandler,
    ) -> redlilium_actionstack::Subscription {
        self.handlers.subscribe(handler)
    }

    fn register_action_item(&self, item: &ActionItemRef) {
        self.registered.borrow_mut().push(item.name());
    }

    fn discard_action_item(&self, item: &ActionItemRef) {
        self.discarded.borrow_mut().push(item.name());
    }
}

#[test]
fn save_round_trip() {
    let stack = TransactionalActionStack::new(10);
    let manager = DirtiableManager::new(&stack);
    let document = Rc::new(DirtiableObject::new("document"));

    stack.add(edit(&document, "edit"));
    assert!(document.is_dirty());

    stack.create_save_point(true);
    manager.notify_save();
    assert!(!document.is_dirty());

    stack.undo();
    assert!(document.is_dirty());
    stack.redo();
    assert!(!document.is_dirty());
}

#[test]
fn buffered_items_do_not_dirty_until_committed() {
    let stack = TransactionalActionStack::new(10);
    let _manager = DirtiableManager::new(&stack);
    let document = Rc::new(DirtiableObject::new("document"));

    stack.begin_transaction();
    stack.add(edit(&document, "a"));
    stack.add(edit(&document, "b"));
    assert!(!document.is_dirty());

    stack.end_transaction("Edit", true).unwrap();
    assert!(document.is_dirty());
}

#[test]
fn aggregate_dirties_every_affected_document() {
    let stack = TransactionalActionStack::new(10);
    let manager = DirtiableManager::new(&stack);
    let scene = Rc::new(DirtiableObject::new("scene"));
    let material = Rc::new(DirtiableObject::new("material"));

    {
        let _transaction = stack.begin_end_transaction("Assign material");
        stack.add(edit(&scene, "bind"));
        stack.add(edit(&material, "tweak"));
    }
    assert!(scene.is_dirty());
    assert!(material.is_dirty());
    assert!(manager.is_tracking(&scene));
    assert!(manager.is_tracking(&material));

    manager.notify_save();
    stack.undo();
    assert!(scene.is_dirty());
    assert!(material.is_dirty());
}

#[test]
fn dirtiness_notifications_are_raised() {
    let stack = TransactionalActionStack::new(10);
    let manager = DirtiableManager::new(&stack);
    let document = Rc::new(DirtiableObject::new("document"));
    let updates = Rc::new(RefCell::new(Vec::new()));
    let sink = updates.clone();
    let _subscription = document.subscribe_dirtiness(Box::new(move |_, update| {
        sink.borrow_mut().push(update.new_value);
    }));

    stack.add(edit(&document, "edit"));
    manager.notify_save();
    stack.undo();

    assert_eq!(*updates.borrow(), [true, false, true]);
}

#[test]
fn dependent_document_follows_dependency() {
    let stack = TransactionalActionStack::new(10);
    let manager = DirtiableManager::new(&stack);
    let project = Rc::new(DirtiableObject::new("project"));
    let scene = Rc::new(DirtiableObject::new("scene"));
    project.register_dirtiable_dependency(&scene);

    stack.add(edit(&scene, "edit scene"));
    assert!(project.is_dirty());

    manager.notify_save();
    assert!(!project.is_dirty());
}

#[test]
fn manager_reports_registered_and_discarded_items() {
    let stack = TransactionalActionStack::new(2);
    let _manager = DirtiableManager::new(&stack);
    let document = Rc::new(TrackingDocument::default());
    let add = |name: &str| {
        stack.add(Rc::new(AnonymousActionItem::new(
            name,
            [downgrade_dirtiable(&document)],
            || {},
            || {},
        )));
    };

    add("1");
    add("2");
    stack.undo();
    add("3");
    add("4");

    assert_eq!(*document.registered.borrow(), ["1", "2", "3", "4"]);
    assert_eq!(*document.discarded.borrow(), ["2", "1"]);
    assert!(document.is_dirty());
}

#[rstest]
#[case::one_undo(1, true)]
#[case::undo_to_save(2, false)]
#[case::undo_past_save(3, true)]
fn dirtiness_after_undos(#[case] undos: usize, #[case] dirty: bool) {
    let stack = TransactionalActionStack::new(10);
    let manager = DirtiableManager::new(&stack);
    let document = Rc::new(DirtiableObject::new("document"));

    stack.add(edit(&document, "1"));
    stack.create_save_point(true);
    manager.notify_save();
    stack.add(edit(&document, "2"));
    stack.add(edit(&document, "3"));

    for _ in 0..undos {
        assert!(stack.undo());
    }
    assert_eq!(document.is_dirty(), dirty);
}

#[test]
fn value_change_updates_target_and_dirtiness() {
    let stack = TransactionalActionStack::new(10);
    let manager = DirtiableManager::new(&stack);
    let document = Rc::new(DirtiableObject::new("document"));
    manager.register_dirtiable(&document);
    let width = Rc::new(std::cell::Cell::new(10));

    width.set(20);
    let target = width.clone();
    stack.add(Rc::new(ValueChangedActionItem::new(
        "Resize",
        [downgrade_dirtiable(&document)],
        10,
        20,
        move |value| target.set(value),
    )));
    assert!(document.is_dirty());

    stack.undo();
    assert_eq!(width.get(), 10);
    assert!(!document.is_dirty());
}
