//! History Demo - scripted editing session on a toy document.
//!
//! Records edits through a transactional action stack, walks the history
//! back and forth, and logs every notification along with the dirtiness
//! of the document.
//!
//! Run with `RUST_LOG=debug` to also see the stack internals.

use std::cell::{Cell, RefCell};
use std::path::PathBuf;
use std::rc::Rc;

use clap::Parser;
use redlilium_actionstack::{
    ActionItemRef, ActionStackConfig, ActionStackResult, AnonymousActionItem, Dirtiable,
    DirtiableManager, DirtiableObject, TransactionEvent, TransactionalActionStack,
    ValueChangedActionItem, downgrade_dirtiable,
};
use redlilium_actionstack_demos::{describe_event, item_names};

/// RedLilium action stack demo arguments.
#[derive(Parser, Debug)]
#[command(
    name = "History Demo",
    about = "Scripted undo/redo session on a toy document"
)]
struct Args {
    /// Maximum number of recorded items. Overrides the config file.
    #[arg(long)]
    capacity: Option<usize>,

    /// Load the stack settings from a TOML file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Never evict old items.
    #[arg(long)]
    unbounded: bool,
}

impl Args {
    fn stack_config(&self) -> ActionStackResult<ActionStackConfig> {
        let mut config = match &self.config {
            Some(path) => ActionStackConfig::load(path)?,
            None => ActionStackConfig::default(),
        };
        if let Some(capacity) = self.capacity {
            config.capacity = capacity;
        }
        config.unbounded |= self.unbounded;
        Ok(config)
    }
}

/// The edited data. Values live behind shared cells so action items can
/// write them back on undo and redo.
struct Document {
    dirtiable: Rc<DirtiableObject>,
    title: Rc<RefCell<String>>,
    width: Rc<Cell<u32>>,
}

impl Document {
    fn new(name: &str) -> Self {
        Self {
            dirtiable: Rc::new(DirtiableObject::new(name)),
            title: Rc::new(RefCell::new(String::from("Untitled"))),
            width: Rc::new(Cell::new(640)),
        }
    }

    fn rename(&self, title: &str) -> ActionItemRef {
        let previous = self.title.replace(title.to_string());
        let target = self.title.clone();
        Rc::new(ValueChangedActionItem::new(
            "Rename",
            [downgrade_dirtiable(&self.dirtiable)],
            previous,
            title.to_string(),
            move |value| *target.borrow_mut() = value,
        ))
    }

    fn grow(&self, amount: u32) -> ActionItemRef {
        self.width.set(self.width.get() + amount);
        let (undo_target, redo_target) = (self.width.clone(), self.width.clone());
        Rc::new(AnonymousActionItem::new(
            format!("Grow by {amount}"),
            [downgrade_dirtiable(&self.dirtiable)],
            move || undo_target.set(undo_target.get() - amount),
            move || redo_target.set(redo_target.get() + amount),
        ))
    }

    fn describe(&self) -> String {
        format!(
            "'{}' width={} dirty={}",
            self.title.borrow(),
            self.width.get(),
            self.dirtiable.is_dirty()
        )
    }
}

fn run(args: &Args) -> ActionStackResult {
    let config = args.stack_config()?;
    log::info!("Stack capacity: {:?}", config.capacity_limit());

    let stack = TransactionalActionStack::from_config(&config);
    let manager = DirtiableManager::new(&stack);

    let _events = stack.subscribe(|_, event| log::info!("{}", describe_event(event)));
    let _transactions = stack.on_transaction(|stack, event| match event {
        TransactionEvent::Started => {
            log::info!("Transaction started (depth {})", stack.transaction_depth())
        }
        TransactionEvent::Completed { kind, items } => {
            log::info!("Transaction {kind:?} with {:?}", item_names(items))
        }
    });

    let document = Document::new("document");
    let _dirtiness = document.dirtiable.subscribe_dirtiness(Box::new(|_, update| {
        log::info!(
            "Dirtiness changed: {} -> {}",
            update.old_value,
            update.new_value
        );
    }));
    manager.register_dirtiable(&document.dirtiable);
    log::info!("Opened {}", document.describe());

    stack.add(document.rename("Draft"));
    {
        let _transaction = stack.begin_end_transaction("Resize twice");
        stack.add(document.grow(100));
        stack.add(document.grow(60));
    }
    log::info!("After edits: {}", document.describe());

    stack.create_save_point(true);
    manager.notify_save();
    log::info!("Saved: {}", document.describe());

    stack.begin_transaction();
    stack.add(document.grow(1000));
    stack.cancel_transaction()?;
    log::info!("After cancelled resize: {}", document.describe());

    stack.add(document.rename("Final"));
    log::info!("Undo: {:?}", stack.undo_names());

    while stack.undo() {
        log::info!("Undone: {}", document.describe());
    }
    while stack.redo() {
        log::info!("Redone: {}", document.describe());
    }

    stack.undo();
    stack.add(document.grow(5));
    log::info!("After branching: {}", document.describe());
    log::info!("Redo: {:?}", stack.redo_names());

    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    redlilium_actionstack::init();

    let args = Args::parse();
    if let Err(err) = run(&args) {
        log::error!("History demo failed: {err}");
        std::process::exit(1);
    }
}
