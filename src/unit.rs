//! Units and the workspace that loads them (§3, §4.8).
//!
//! Script *execution* is a collaborator's concern (§6.2 names the callback
//! surface; the sandbox that actually runs a `.crunit` file lives outside
//! this crate). What belongs here is everything the core is responsible
//! for regardless of which host runs the script: unit-path resolution,
//! re-entrant-safe registration, the namespace/alias bookkeeping a
//! [`UnitContext`] needs, and walking the registered graph to run setup.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;

use crate::context::{SharedWorkspaceContext, StackFrameContext, UnitContext, WorkspaceContext};
use crate::error::{CreatorError, CreatorResult};
use crate::expr::ExprNode;
use crate::parser;
use crate::target::{self, Target, Task};

/// Something a unit can register under a name: a buildable [`Target`] or a
/// bare [`Task`] invoked out-of-graph.
pub enum Member {
    /// A target with build entries and dependencies.
    Target(Rc<RefCell<Target>>),
    /// A task invoked directly, carrying no graph edges.
    Task(Rc<Task>),
}

impl Member {
    /// The target this member wraps, if it is one.
    #[must_use]
    pub fn as_target(&self) -> Option<&Rc<RefCell<Target>>> {
        match self {
            Self::Target(t) => Some(t),
            Self::Task(_) => None,
        }
    }
}

/// A namespace of macros and targets loaded from one script file (§3).
pub struct Unit {
    /// Directory containing the unit's `.crunit` file.
    pub project_path: Utf8PathBuf,
    /// The unit's own identifier, also `aliases["self"]` by default.
    pub identifier: String,
    /// `alias -> unit identifier`, seeded with `"self" -> identifier`.
    pub aliases: Rc<RefCell<IndexMap<String, String>>>,
    /// Targets and tasks registered by this unit's script, in declaration order.
    pub targets: IndexMap<String, Member>,
    /// This unit's namespace-rewriting view of the workspace macro map.
    pub context: UnitContext,
}

impl Unit {
    /// Create a unit rooted at `project_path`, sharing `workspace_context`.
    #[must_use]
    pub fn new(workspace_context: SharedWorkspaceContext, identifier: String, project_path: Utf8PathBuf) -> Rc<RefCell<Self>> {
        let aliases = Rc::new(RefCell::new(IndexMap::new()));
        aliases.borrow_mut().insert("self".to_string(), identifier.clone());
        let context = UnitContext::new(workspace_context, identifier.clone(), Rc::clone(&aliases));
        Rc::new(RefCell::new(Self {
            project_path,
            identifier,
            aliases,
            targets: IndexMap::new(),
            context,
        }))
    }

    /// Evaluate macro text through this unit's context, optionally chained
    /// in front of `stack`'s host-scope locals.
    pub fn eval_with_stack(&self, text: &str, stack: &StackFrameContext) -> CreatorResult<String> {
        let tree = parser::parse(text, self.context.bind_namespace(""));
        let chain = crate::context::ChainContext::new(vec![stack, &self.context]);
        tree.eval(&chain, &[]).map_err(Into::into)
    }

    /// Register `target`, failing with `NameCollision` if `name` is already taken.
    pub fn register_target(
        this: &Rc<RefCell<Self>>,
        name: String,
        on_setup: target::SetupCallback,
    ) -> CreatorResult<Rc<RefCell<Target>>> {
        {
            let unit = this.borrow();
            if unit.targets.contains_key(&name) {
                return Err(CreatorError::NameCollision(name));
            }
        }
        let target = Rc::new(RefCell::new(Target::new(Rc::downgrade(this), name.clone(), on_setup)));
        this.borrow_mut().targets.insert(name, Member::Target(Rc::clone(&target)));
        Ok(target)
    }

    /// Register `task`, failing with `NameCollision` if `name` is already taken.
    pub fn register_task(
        this: &Rc<RefCell<Self>>,
        name: String,
        func: Rc<dyn Fn() -> CreatorResult<()>>,
    ) -> CreatorResult<Rc<Task>> {
        {
            let unit = this.borrow();
            if unit.targets.contains_key(&name) {
                return Err(CreatorError::NameCollision(name));
            }
        }
        let task = Rc::new(Task::new(Rc::downgrade(this), name.clone(), func));
        this.borrow_mut().targets.insert(name, Member::Task(Rc::clone(&task)));
        Ok(task)
    }
}

/// Registry of all loaded units plus the global macro map (§3, §4.8).
pub struct Workspace {
    search_path: Vec<Utf8PathBuf>,
    context: SharedWorkspaceContext,
    units: RefCell<IndexMap<String, Rc<RefCell<Unit>>>>,
    statics: RefCell<IndexMap<Utf8PathBuf, Rc<RefCell<Unit>>>>,
}

impl Workspace {
    /// Build a workspace searching `search_path`, with `seed_pairs` bound as
    /// initial `Text` macros before any unit loads (platform-probing values
    /// such as OS/arch strings are a caller concern, injected here).
    #[must_use]
    pub fn new(search_path: Vec<Utf8PathBuf>, seed_pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        let mut ctx = WorkspaceContext::new();
        for (name, value) in seed_pairs {
            ctx.set(&name, ExprNode::Text(value));
        }
        Self {
            search_path,
            context: Rc::new(RefCell::new(ctx)),
            units: RefCell::new(IndexMap::new()),
            statics: RefCell::new(IndexMap::new()),
        }
    }

    /// The shared workspace-level macro map.
    #[must_use]
    pub fn context(&self) -> SharedWorkspaceContext {
        Rc::clone(&self.context)
    }

    /// Bind a global macro directly (the CLI's `-D`/`-M` flags).
    pub fn define_global(&self, name: &str, node: ExprNode) {
        self.context.borrow_mut().set(name, node);
    }

    /// Resolve `identifier` to its `.crunit` file: each search directory is
    /// tried directly, then one subdirectory level deeper; first match wins.
    pub fn find_unit_path(&self, identifier: &str) -> CreatorResult<Utf8PathBuf> {
        let filename = format!("{identifier}.crunit");
        for dir in &self.search_path {
            let direct = dir.join(&filename);
            if direct.is_file() {
                return Ok(direct);
            }
            let mut subdirs: Vec<Utf8PathBuf> = std::fs::read_dir(dir.as_std_path())
                .into_iter()
                .flatten()
                .filter_map(Result::ok)
                .filter(|entry| entry.path().is_dir())
                .filter_map(|entry| Utf8PathBuf::from_path_buf(entry.path()).ok())
                .collect();
            subdirs.sort();
            for subdir in subdirs {
                let nested = subdir.join(&filename);
                if nested.is_file() {
                    return Ok(nested);
                }
            }
        }
        Err(CreatorError::UnitNotFound(identifier.to_string()))
    }

    /// Begin loading `identifier`: if it is already registered (a re-entrant
    /// load, direct or through a cycle of `load()` calls), return the
    /// existing handle without creating a new one; otherwise insert a fresh
    /// [`Unit`] *before* its script runs, so a recursive load of the same
    /// identifier resolves to the same handle instead of looping.
    pub fn begin_load(&self, identifier: &str, project_path: Utf8PathBuf) -> Rc<RefCell<Unit>> {
        if let Some(existing) = self.units.borrow().get(identifier) {
            return Rc::clone(existing);
        }
        let unit = Unit::new(Rc::clone(&self.context), identifier.to_string(), project_path);
        self.units.borrow_mut().insert(identifier.to_string(), Rc::clone(&unit));
        unit
    }

    /// Undo a [`begin_load`] after its script raised an error.
    pub fn rollback_load(&self, identifier: &str) {
        self.units.borrow_mut().shift_remove(identifier);
    }

    /// An already-registered unit, if any.
    #[must_use]
    pub fn get_unit(&self, identifier: &str) -> Option<Rc<RefCell<Unit>>> {
        self.units.borrow().get(identifier).cloned()
    }

    /// Register `unit` as the per-user static/profile script at `path`.
    pub fn register_static(&self, path: Utf8PathBuf, unit: Rc<RefCell<Unit>>) {
        self.statics.borrow_mut().insert(path, unit);
    }

    /// Resolve `target_ref` (`"unit:name"`, or a bare name against
    /// `current_unit_id`) to a registered, buildable target.
    pub fn resolve_target(&self, target_ref: &str, current_unit_id: &str) -> CreatorResult<Rc<RefCell<Target>>> {
        let (unit_id, name) = match target_ref.split_once(':') {
            Some((unit_id, name)) => (unit_id.to_string(), name.to_string()),
            None => (current_unit_id.to_string(), target_ref.to_string()),
        };
        let units = self.units.borrow();
        let unit = units
            .get(&unit_id)
            .ok_or_else(|| CreatorError::UnitNotFound(unit_id.clone()))?;
        let unit_ref = unit.borrow();
        match unit_ref.targets.get(&name) {
            Some(Member::Target(t)) => Ok(Rc::clone(t)),
            Some(Member::Task(_)) => Err(CreatorError::TypeViolation(format!(
                "`{target_ref}` names a task, not a target"
            ))),
            None => Err(CreatorError::UnitNotFound(target_ref.to_string())),
        }
    }

    /// Walk every registered unit in registration order and every target in
    /// declaration order, running `do_setup` on any that hasn't run yet.
    /// `requires()` may trigger out-of-order setup from inside a callback;
    /// `is_setup` is what makes that safe to revisit here.
    pub fn setup_all(&self) -> CreatorResult<()> {
        let unit_ids: Vec<String> = self.units.borrow().keys().cloned().collect();
        for unit_id in unit_ids {
            let Some(unit) = self.get_unit(&unit_id) else {
                continue;
            };
            let targets: Vec<Rc<RefCell<Target>>> = unit
                .borrow()
                .targets
                .values()
                .filter_map(Member::as_target)
                .cloned()
                .collect();
            for target in targets {
                if !target.borrow().is_setup() {
                    target::do_setup(&target)?;
                }
            }
        }
        Ok(())
    }

    /// Units in registration (first-load) order.
    #[must_use]
    pub fn units_in_order(&self) -> Vec<Rc<RefCell<Unit>>> {
        self.units.borrow().values().cloned().collect()
    }

    /// Test-only helper: register an empty unit named `id` with no on-disk
    /// project path, for exercising target/unit plumbing in isolation.
    #[cfg(test)]
    #[must_use]
    pub fn register_unit_for_test(&self, id: &str) -> Rc<RefCell<Unit>> {
        self.begin_load(id, Utf8Path::new(".").to_path_buf())
    }
}
