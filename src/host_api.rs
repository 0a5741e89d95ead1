//! Host-script API surface (§6.2).
//!
//! The embedded scripting host that actually runs a `.crunit` file is an
//! external collaborator (§1, §9 Design Notes): "whether scripts are an
//! embedded interpreter, a subcommand protocol, or a compiled plug-in is a
//! product decision, not a core one." What the core owns is the callback
//! surface such a host calls into. [`HostApi`] is that surface, bound to one
//! unit and one call frame; [`ScriptHost`] is the seam a concrete sandbox
//! implements to actually execute script text against it.
//!
//! Symbol mapping from §6.2: `C`/`G` are not handed out as raw context
//! objects (that would leak a `RefCell` borrow across the boundary) — their
//! operations are exposed directly as [`HostApi::define`]/[`defined`]/
//! [`append`]/[`eval`] (unit-scoped, i.e. `C`) and [`define_global`]/
//! [`defined_global`] (workspace-scoped, i.e. `G`). `exit`/`ExitCodeError`
//! are represented by [`HostApi::exit`] constructing a
//! [`CreatorError::ExitCodeError`] for the host to propagate or catch.

use std::cell::RefCell;
use std::io::Write as _;
use std::process::{Command, Stdio};
use std::rc::Rc;

use crate::context::{Context, StackFrameContext};
use crate::error::{CreatorError, CreatorResult};
use crate::expr::ExprNode;
use crate::list_codec;
use crate::parser;
use crate::target::{self, Target, Task};
use crate::unit::{Unit, Workspace};

#[cfg(not(windows))]
const SHELL: &str = "sh";
#[cfg(not(windows))]
const SHELL_ARG: &str = "-c";
#[cfg(windows)]
const SHELL: &str = "cmd";
#[cfg(windows)]
const SHELL_ARG: &str = "/C";

/// Captured result of `shell_get` (§6.2): stdout/stderr text plus the exit
/// status. Returned only on success; a non-zero exit is surfaced as
/// [`CreatorError::ExitCodeError`] instead (§7).
#[derive(Debug, Clone)]
pub struct ShellResponse {
    /// Captured standard output, lossily decoded as UTF-8.
    pub stdout: String,
    /// Captured standard error, lossily decoded as UTF-8.
    pub stderr: String,
    /// Process exit status.
    pub status: i32,
}

/// A concrete sandbox that can execute one unit script's source text
/// against a [`HostApi`] (§1, §9 Design Notes). The core never implements
/// this trait itself; tests exercise the dispatcher with a stand-in host
/// that interprets a trivial call-record format rather than a real
/// language.
pub trait ScriptHost {
    /// Execute `source` — the contents of one `.crunit` file — calling back
    /// into `api` for every host-exposed operation the script performs.
    ///
    /// # Errors
    ///
    /// Returns whatever [`CreatorError`] the script's own calls raised.
    fn run(&self, source: &str, api: &mut HostApi<'_>) -> CreatorResult<()>;
}

/// The callback surface exposed to one unit script invocation (§6.2).
///
/// Holds the unit it is running against, a reference to the workspace it
/// belongs to, the loader callback for `load`/`extends`, and the host-scope
/// local variables visible as `$0`-style locals through `eval`.
pub struct HostApi<'a> {
    /// The unit this script invocation is populating.
    pub unit: Rc<RefCell<Unit>>,
    workspace: &'a Workspace,
    host: &'a dyn ScriptHost,
    stack: StackFrameContext,
}

impl<'a> HostApi<'a> {
    /// Build an API bound to `unit`, sharing `workspace` and `host` for any
    /// recursive `load`/`extends` calls the script makes.
    #[must_use]
    pub fn new(unit: Rc<RefCell<Unit>>, workspace: &'a Workspace, host: &'a dyn ScriptHost) -> Self {
        Self { unit, workspace, host, stack: StackFrameContext::new() }
    }

    /// Bind a local (`$0`-style) host-scope variable, visible to `eval`
    /// calls made through this API for the remainder of its lifetime.
    pub fn bind_local(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.stack.bind_str(name, value);
    }

    /// The unit's own identifier.
    #[must_use]
    pub fn unit_id(&self) -> String {
        self.unit.borrow().identifier.clone()
    }

    /// `C`: bind `name` in this unit's namespace to the macro expression
    /// parsed from `text`.
    pub fn define(&self, name: &str, text: &str) {
        let namespace = self.unit.borrow().context.bind_namespace(name);
        let node = parser::parse(text, namespace);
        self.unit.borrow().context.set(name, node);
    }

    /// `C`: whether `name` resolves to anything in this unit's namespace.
    #[must_use]
    pub fn defined(&self, name: &str) -> bool {
        self.unit.borrow().context.has(name)
    }

    /// `C`: append `text` to `name`'s current value, preserving whatever was
    /// bound before (§4.3's self-reference unrolling does the inlining).
    pub fn append(&self, name: &str, text: &str) {
        let appended = format!("${name}{text}");
        self.define(name, &appended);
    }

    /// `G`: bind `name` directly at the workspace level, bypassing
    /// namespace rewriting.
    pub fn define_global(&self, name: &str, text: &str) {
        let node = parser::parse(text, None);
        self.workspace.define_global(name, node);
    }

    /// `G`: whether `name` resolves at the workspace level.
    #[must_use]
    pub fn defined_global(&self, name: &str) -> bool {
        self.workspace.context().borrow().get(name).is_some()
    }

    /// Evaluate `text` through this unit's context, with the script's
    /// current local variables visible.
    ///
    /// # Errors
    ///
    /// Propagates any [`CreatorError`] the evaluation itself raises (a
    /// builtin called with the wrong arity, for instance).
    pub fn eval(&self, text: &str) -> CreatorResult<String> {
        self.unit.borrow().eval_with_stack(text, &self.stack)
    }

    /// Whether evaluating `a` and `b` produce the same text.
    #[must_use]
    pub fn eq(a: &str, b: &str) -> bool {
        a == b
    }

    /// The negation of [`HostApi::eq`].
    #[must_use]
    pub fn ne(a: &str, b: &str) -> bool {
        a != b
    }

    /// Ensure unit `id` is loaded and register it under `id` as an explicit
    /// cross-unit alias, so later qualified references read the same
    /// whether or not the dependency has otherwise been named.
    ///
    /// # Errors
    ///
    /// Propagates [`CreatorError::UnitNotFound`] or whatever the dependency's
    /// own script raised while loading.
    pub fn extends(&mut self, id: &str) -> CreatorResult<()> {
        self.load(id, Some(id))
    }

    /// `load(id, alias)`: recursively load unit `id` (a no-op if it is
    /// already registered, including mid-load via a cycle), optionally
    /// registering it under `alias` in this unit's alias table.
    ///
    /// # Errors
    ///
    /// Propagates [`CreatorError::UnitNotFound`] or whatever the dependency's
    /// own script raised while loading.
    pub fn load(&mut self, id: &str, alias: Option<&str>) -> CreatorResult<()> {
        crate::dispatch::load_unit(self.workspace, self.host, id)?;
        if let Some(alias) = alias {
            self.unit.borrow().aliases.borrow_mut().insert(alias.to_string(), id.to_string());
        }
        Ok(())
    }

    /// `target(cb) -> Target`: register a target named `name`, backed by
    /// `on_setup`. The real sandbox derives `name` from the callback's own
    /// symbol; here it is passed explicitly since a Rust closure carries no
    /// script-visible name.
    ///
    /// # Errors
    ///
    /// Returns [`CreatorError::NameCollision`] if `name` is already taken in
    /// this unit.
    pub fn target(&self, name: &str, on_setup: target::SetupCallback) -> CreatorResult<Rc<RefCell<Target>>> {
        Unit::register_target(&self.unit, name.to_string(), on_setup)
    }

    /// `task(cb) -> Task`: register a task named `name`, backed by `func`.
    ///
    /// # Errors
    ///
    /// Returns [`CreatorError::NameCollision`] if `name` is already taken in
    /// this unit.
    pub fn task(&self, name: &str, func: Rc<dyn Fn() -> CreatorResult<()>>) -> CreatorResult<Rc<Task>> {
        Unit::register_task(&self.unit, name.to_string(), func)
    }

    /// Log an informational message tagged with this unit's identifier.
    pub fn info(&self, message: &str) {
        tracing::info!(unit = %self.unit_id(), "{message}");
    }

    /// Log a warning tagged with this unit's identifier.
    pub fn warn(&self, message: &str) {
        tracing::warn!(unit = %self.unit_id(), "{message}");
    }

    /// Print `prompt`, read one line from stdin, and return whether it
    /// starts with `y`/`Y`.
    ///
    /// # Errors
    ///
    /// Returns [`CreatorError::UnitIo`] if stdout cannot be flushed or stdin
    /// cannot be read.
    pub fn confirm(&self, prompt: &str) -> CreatorResult<bool> {
        let mut stdout = std::io::stdout();
        write!(stdout, "{prompt} [y/N] ").map_err(|source| CreatorError::UnitIo {
            path: self.unit.borrow().project_path.clone().into_std_path_buf(),
            source,
        })?;
        stdout.flush().map_err(|source| CreatorError::UnitIo {
            path: self.unit.borrow().project_path.clone().into_std_path_buf(),
            source,
        })?;
        let mut line = String::new();
        std::io::stdin().read_line(&mut line).map_err(|source| CreatorError::UnitIo {
            path: self.unit.borrow().project_path.clone().into_std_path_buf(),
            source,
        })?;
        Ok(line.trim().to_lowercase().starts_with('y'))
    }

    /// Run `command` in the platform shell, inheriting stdio, returning its
    /// exit status.
    ///
    /// # Errors
    ///
    /// Returns [`CreatorError::ExitCodeError`] if the shell cannot be spawned
    /// (status `-1`) or exits non-zero.
    pub fn shell(&self, command: &str) -> CreatorResult<i32> {
        let status = Command::new(SHELL).arg(SHELL_ARG).arg(command).status();
        let code = match status {
            Ok(s) => s.code().unwrap_or(-1),
            Err(_) => -1,
        };
        if code == 0 {
            Ok(code)
        } else {
            Err(CreatorError::ExitCodeError { command: command.to_string(), status: code })
        }
    }

    /// Run `command` in the platform shell, capturing its output.
    ///
    /// # Errors
    ///
    /// Returns [`CreatorError::ExitCodeError`] if the command cannot be
    /// spawned or exits non-zero.
    pub fn shell_get(&self, command: &str) -> CreatorResult<ShellResponse> {
        let output = Command::new(SHELL)
            .arg(SHELL_ARG)
            .arg(command)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output();
        let output = output.map_err(|_| CreatorError::ExitCodeError {
            command: command.to_string(),
            status: -1,
        })?;
        let status = output.status.code().unwrap_or(-1);
        let response = ShellResponse {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            status,
        };
        if status == 0 {
            Ok(response)
        } else {
            Err(CreatorError::ExitCodeError { command: command.to_string(), status })
        }
    }

    /// Decode `text` as a semicolon-list (§3).
    #[must_use]
    pub fn split(text: &str) -> Vec<String> {
        list_codec::decode(text)
    }

    /// Encode `items` as a semicolon-list (§3).
    #[must_use]
    pub fn join(items: &[String]) -> String {
        list_codec::encode(items)
    }

    /// Wrap `text` as a literal macro node, bypassing macro parsing.
    #[must_use]
    pub fn raw(text: &str) -> ExprNode {
        ExprNode::Text(text.to_string())
    }

    /// Deprecated per §6.2: iteration over paired input/output lists is now
    /// `build(inputs, outputs, command, each=true)` (§4.7). Calling this
    /// only logs a deprecation warning.
    pub fn foreach_split(&self, inputs: &str, outputs: &str) {
        self.warn(&format!(
            "foreach_split({inputs}, {outputs}) is deprecated; use build(..., each=true)"
        ));
    }

    /// Construct the error a script raises to terminate with `code`,
    /// mirroring the host scripting language's `exit`/`ExitCodeError`.
    #[must_use]
    pub fn exit(&self, code: i32) -> CreatorError {
        CreatorError::ExitCodeError { command: format!("unit `{}`", self.unit_id()), status: code }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;

    struct NoopHost;
    impl ScriptHost for NoopHost {
        fn run(&self, _source: &str, _api: &mut HostApi<'_>) -> CreatorResult<()> {
            Ok(())
        }
    }

    fn api(workspace: &Workspace, host: &dyn ScriptHost) -> HostApi<'_> {
        let unit = workspace.begin_load("app", Utf8PathBuf::from("."));
        HostApi::new(unit, workspace, host)
    }

    #[test]
    fn define_then_eval_round_trips() {
        let workspace = Workspace::new(Vec::new(), std::iter::empty());
        let host = NoopHost;
        let api = api(&workspace, &host);
        api.define("greeting", "hello");
        let Ok(value) = api.eval("$greeting") else {
            panic!("eval should succeed");
        };
        assert_eq!(value, "hello");
    }

    #[test]
    fn append_preserves_prior_value() {
        let workspace = Workspace::new(Vec::new(), std::iter::empty());
        let host = NoopHost;
        let api = api(&workspace, &host);
        api.define("list", "1;2");
        api.append("list", ";3");
        let Ok(value) = api.eval("$list") else {
            panic!("eval should succeed");
        };
        assert_eq!(value, "1;2;3");
    }

    #[test]
    fn defined_reflects_bindings() {
        let workspace = Workspace::new(Vec::new(), std::iter::empty());
        let host = NoopHost;
        let api = api(&workspace, &host);
        assert!(!api.defined("missing"));
        api.define("present", "x");
        assert!(api.defined("present"));
    }

    #[test]
    fn split_and_join_round_trip() {
        let items = HostApi::split("a;b;c");
        assert_eq!(items, vec!["a", "b", "c"]);
        assert_eq!(HostApi::join(&items), "a;b;c");
    }

    #[test]
    fn braced_expansion_round_trips() {
        let workspace = Workspace::new(Vec::new(), std::iter::empty());
        let host = NoopHost;
        let api = api(&workspace, &host);
        api.define("X", "ok");
        let Ok(value) = api.eval("[${X}]") else {
            panic!("eval should succeed");
        };
        assert_eq!(value, "[ok]");
    }

    #[test]
    fn builtin_call_resolves_through_a_unit_script() {
        let workspace = Workspace::new(Vec::new(), std::iter::empty());
        let host = NoopHost;
        let api = api(&workspace, &host);
        let Ok(value) = api.eval("$(addprefix -I,a;b;c)") else {
            panic!("eval should succeed");
        };
        assert_eq!(value, "-Ia -Ib -Ic");
    }

    #[test]
    fn exit_builds_an_exit_code_error() {
        let workspace = Workspace::new(Vec::new(), std::iter::empty());
        let host = NoopHost;
        let api = api(&workspace, &host);
        match api.exit(3) {
            CreatorError::ExitCodeError { status, .. } => assert_eq!(status, 3),
            other => panic!("expected ExitCodeError, got {other:?}"),
        }
    }
}
