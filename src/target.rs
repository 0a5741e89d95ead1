//! Targets, build entries, and tasks (§3, §4.7).
//!
//! A [`Target`] is driven entirely through free functions that take an
//! `Rc<RefCell<Target>>` handle rather than `&mut self` methods: setup can
//! recursively trigger the setup of a dependency, and listeners need to
//! observe the target they're attached to, so the handle has to stay
//! shareable across the whole call chain.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use camino::Utf8PathBuf;

use crate::context::StackFrameContext;
use crate::error::{CreatorError, CreatorResult};
use crate::list_codec;
use crate::unit::{Unit, Workspace};

/// One input/output/command triple, emitted as a single Ninja build edge.
#[derive(Debug, Clone, Default)]
pub struct BuildEntry {
    /// Files consumed by `command`.
    pub inputs: Vec<Utf8PathBuf>,
    /// Files produced by `command`.
    pub outputs: Vec<Utf8PathBuf>,
    /// Final, evaluated, shell-ready command line.
    pub command: String,
    /// Extra inputs appended by listeners after the fact.
    pub auxiliary: Vec<Utf8PathBuf>,
}

/// Mutable record handed to `build` listeners before a [`BuildEntry`] is recorded.
#[derive(Debug, Clone, Default)]
pub struct BuildEvent {
    /// Normalised input paths for this entry.
    pub inputs: Vec<Utf8PathBuf>,
    /// Normalised output paths for this entry.
    pub outputs: Vec<Utf8PathBuf>,
    /// The evaluated command line.
    pub command: String,
    /// Auxiliary inputs a listener may append to.
    pub auxiliary: Vec<Utf8PathBuf>,
}

/// Callback a unit script registers to populate a target's build entries
/// and dependencies. Invoked once by [`do_setup`].
pub type SetupCallback = Rc<dyn Fn(&Rc<RefCell<Target>>) -> CreatorResult<()>>;

/// A listener invoked, in registration order, before each `build()` call
/// records its [`BuildEntry`].
pub type Listener = Rc<dyn Fn(&mut BuildEvent)>;

/// A named set of build entries with dependencies, emitted as Ninja rules
/// and edges (§4.7).
pub struct Target {
    /// The unit that declared this target.
    pub unit: Weak<RefCell<Unit>>,
    /// Target name, unique within its unit.
    pub name: String,
    is_setup: bool,
    /// Other targets this one depends on, populated via [`requires`].
    pub dependencies: Vec<Rc<RefCell<Target>>>,
    on_setup: Option<SetupCallback>,
    listeners: Vec<Listener>,
    /// Build entries recorded by `build()` calls during setup.
    pub command_data: Vec<BuildEntry>,
}

impl std::fmt::Debug for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Target")
            .field("name", &self.name)
            .field("is_setup", &self.is_setup)
            .field("dependencies", &self.dependencies.len())
            .field("command_data", &self.command_data.len())
            .finish()
    }
}

impl Target {
    /// Create a target owned by `unit`, backed by `on_setup`.
    #[must_use]
    pub fn new(unit: Weak<RefCell<Unit>>, name: String, on_setup: SetupCallback) -> Self {
        Self {
            unit,
            name,
            is_setup: false,
            dependencies: Vec::new(),
            on_setup: Some(on_setup),
            listeners: Vec::new(),
            command_data: Vec::new(),
        }
    }

    /// Whether `do_setup` has already run for this target.
    #[must_use]
    pub const fn is_setup(&self) -> bool {
        self.is_setup
    }

    /// Register a `build()` listener, fired in registration order.
    pub fn add_listener(&mut self, listener: Listener) {
        self.listeners.push(listener);
    }
}

/// Resolve and record a dependency on `target_ref` (`"unit:name"`, or a
/// bare name resolved against the requiring target's own unit), setting it
/// up first if it hasn't run yet.
pub fn requires(
    target: &Rc<RefCell<Target>>,
    workspace: &Workspace,
    target_ref: &str,
) -> CreatorResult<()> {
    let current_unit_id = target
        .borrow()
        .unit
        .upgrade()
        .map(|u| u.borrow().identifier.clone())
        .unwrap_or_default();
    let dep = workspace.resolve_target(target_ref, &current_unit_id)?;
    if !dep.borrow().is_setup {
        do_setup(&dep)?;
    }
    target.borrow_mut().dependencies.push(dep);
    Ok(())
}

/// Run this target's setup callback exactly once (§4.7 state machine).
pub fn do_setup(target: &Rc<RefCell<Target>>) -> CreatorResult<()> {
    {
        let t = target.borrow();
        if t.is_setup {
            return Err(CreatorError::SetupViolation(t.name.clone()));
        }
    }
    let callback = target.borrow().on_setup.clone();
    target.borrow_mut().is_setup = true;
    if let Some(cb) = callback {
        cb(target)?;
    }
    Ok(())
}

/// Evaluate `inputs`/`outputs`/`command` through the owning unit and record
/// one [`BuildEntry`] (or one per input/output pair when `each` is set).
///
/// `stack` exposes the caller's host-script locals so that command text can
/// reference them alongside unit and workspace macros (§4.7).
pub fn build(
    target: &Rc<RefCell<Target>>,
    stack: &StackFrameContext,
    inputs: &str,
    outputs: &str,
    command: &str,
    each: bool,
) -> CreatorResult<()> {
    let unit_rc = owning_unit(target)?;
    let inputs_str = unit_rc.borrow().eval_with_stack(inputs, stack)?;
    let outputs_str = unit_rc.borrow().eval_with_stack(outputs, stack)?;
    let input_items = list_codec::decode(&inputs_str);
    let output_items = list_codec::decode(&outputs_str);

    let entries = if each {
        build_each(target, &unit_rc, stack, &input_items, &output_items, command)?
    } else {
        vec![build_joined(target, &unit_rc, stack, &input_items, &output_items, command)?]
    };

    target.borrow_mut().command_data.extend(entries);
    Ok(())
}

fn owning_unit(target: &Rc<RefCell<Target>>) -> CreatorResult<Rc<RefCell<Unit>>> {
    target
        .borrow()
        .unit
        .upgrade()
        .ok_or_else(|| CreatorError::UnitNotFound(target.borrow().name.clone()))
}

fn build_each(
    target: &Rc<RefCell<Target>>,
    unit_rc: &Rc<RefCell<Unit>>,
    stack: &StackFrameContext,
    input_items: &[String],
    output_items: &[String],
    command: &str,
) -> CreatorResult<Vec<BuildEntry>> {
    if input_items.len() != output_items.len() {
        return Err(CreatorError::TypeViolation(format!(
            "build(each=true) on `{}` requires matching input/output counts ({} vs {})",
            target.borrow().name,
            input_items.len(),
            output_items.len(),
        )));
    }
    let mut entries = Vec::with_capacity(input_items.len());
    for (input, output) in input_items.iter().zip(output_items) {
        let mut pair_stack = stack.clone();
        pair_stack.bind_str("<", input.clone());
        pair_stack.bind_str("@", output.clone());
        let cmd = unit_rc.borrow().eval_with_stack(command, &pair_stack)?;
        let mut event = BuildEvent {
            inputs: vec![camino::Utf8PathBuf::from(input)],
            outputs: vec![camino::Utf8PathBuf::from(output)],
            command: cmd,
            auxiliary: Vec::new(),
        };
        fire_listeners(target, &mut event);
        entries.push(BuildEntry {
            inputs: event.inputs,
            outputs: event.outputs,
            command: event.command,
            auxiliary: event.auxiliary,
        });
    }
    Ok(entries)
}

fn build_joined(
    target: &Rc<RefCell<Target>>,
    unit_rc: &Rc<RefCell<Unit>>,
    stack: &StackFrameContext,
    input_items: &[String],
    output_items: &[String],
    command: &str,
) -> CreatorResult<BuildEntry> {
    let mut pair_stack = stack.clone();
    pair_stack.bind_str("<", input_items.join(" "));
    pair_stack.bind_str("@", output_items.join(" "));
    let cmd = unit_rc.borrow().eval_with_stack(command, &pair_stack)?;
    let mut event = BuildEvent {
        inputs: input_items.iter().map(camino::Utf8PathBuf::from).collect(),
        outputs: output_items.iter().map(camino::Utf8PathBuf::from).collect(),
        command: cmd,
        auxiliary: Vec::new(),
    };
    fire_listeners(target, &mut event);
    Ok(BuildEntry {
        inputs: event.inputs,
        outputs: event.outputs,
        command: event.command,
        auxiliary: event.auxiliary,
    })
}

fn fire_listeners(target: &Rc<RefCell<Target>>, event: &mut BuildEvent) {
    let listeners = target.borrow().listeners.clone();
    for listener in listeners {
        listener(event);
    }
}

/// A named callable invoked in-process, carrying no graph edges (§3 Task).
pub struct Task {
    /// The unit that declared this task.
    pub unit: Weak<RefCell<Unit>>,
    /// Task name, unique within its unit.
    pub name: String,
    func: Rc<dyn Fn() -> CreatorResult<()>>,
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task").field("name", &self.name).finish()
    }
}

impl Task {
    /// Create a task owned by `unit`, backed by `func`.
    #[must_use]
    pub fn new(unit: Weak<RefCell<Unit>>, name: String, func: Rc<dyn Fn() -> CreatorResult<()>>) -> Self {
        Self { unit, name, func }
    }

    /// Invoke this task's callback.
    pub fn run(&self) -> CreatorResult<()> {
        (self.func)()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::Workspace;

    #[test]
    fn setup_is_idempotent_under_the_flag() {
        let workspace = Workspace::new(Vec::new(), std::iter::empty());
        let unit = workspace.register_unit_for_test("app");
        let target = Rc::new(RefCell::new(Target::new(
            Rc::downgrade(&unit),
            "build".to_string(),
            Rc::new(|_| Ok(())),
        )));
        assert!(do_setup(&target).is_ok());
        assert!(matches!(do_setup(&target), Err(CreatorError::SetupViolation(_))));
    }

    #[test]
    fn build_joined_binds_dollar_lt_and_at() {
        let workspace = Workspace::new(Vec::new(), std::iter::empty());
        let unit = workspace.register_unit_for_test("app");
        let target = Rc::new(RefCell::new(Target::new(
            Rc::downgrade(&unit),
            "build".to_string(),
            Rc::new(|_| Ok(())),
        )));
        let stack = StackFrameContext::new();
        let result = build(&target, &stack, "a.c;b.c", "out.o", "cc $< -o $@", false);
        assert!(result.is_ok());
        let entries = &target.borrow().command_data;
        assert_eq!(entries.len(), 1);
        let Some(entry) = entries.first() else {
            panic!("expected one build entry");
        };
        assert!(entry.command.contains("a.c b.c"));
        assert!(entry.command.contains("out.o"));
    }
}
