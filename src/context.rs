//! Name resolution surfaces (§3 Context, §4.4).
//!
//! Four implementations share one trait: [`MutableContext`] owns a map and
//! supports assignment with self-reference unrolling; [`ChainContext`] and
//! [`StackFrameContext`] are read-only; [`WorkspaceContext`] is a
//! `MutableContext` with builtin and environment fallback, and
//! [`UnitContext`] wraps it with namespace rewriting.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::builtins;
use crate::expr::ExprNode;

/// A lookup surface resolving names to expression nodes, possibly rewriting
/// the name first.
pub trait Context {
    /// Resolve `name`, returning a clone of the bound node if any.
    fn get(&self, name: &str) -> Option<ExprNode>;

    /// The namespace this context rewrites bare names into, if any.
    fn namespace(&self) -> Option<&str>;

    /// Whether `name` resolves to something.
    fn has(&self, name: &str) -> bool {
        self.get(name).is_some()
    }
}

/// Owns a `name -> node` map with self-reference-breaking assignment.
#[derive(Debug, Default)]
pub struct MutableContext {
    map: IndexMap<String, ExprNode>,
}

impl MutableContext {
    /// An empty context.
    #[must_use]
    pub fn new() -> Self {
        Self { map: IndexMap::new() }
    }

    /// Direct lookup, with no builtin or environment fallback.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<ExprNode> {
        self.map.get(name).cloned()
    }

    /// Whether `name` is bound directly in this map.
    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.map.contains_key(name)
    }

    /// Bind `name` to `node`.
    ///
    /// If `name` is already bound, every occurrence of `name` inside `node`
    /// is first replaced with the previous binding (§4.3), so a macro that
    /// refers to its own prior value inlines once instead of looping.
    pub fn set(&mut self, name: &str, node: ExprNode) {
        let resolved = if let Some(old) = self.map.get(name) {
            node.substitute(name, old)
        } else {
            node
        };
        self.map.insert(name.to_string(), resolved);
    }

    /// Remove `name`. Missing names are ignored.
    pub fn remove(&mut self, name: &str) {
        self.map.shift_remove(name);
    }

    /// Iterate bindings in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &ExprNode)> {
        self.map.iter()
    }
}

/// The workspace-level macro map: a [`MutableContext`] with fallback to the
/// builtin table and the process environment (§4.4).
#[derive(Debug, Default)]
pub struct WorkspaceContext {
    mutable: MutableContext,
}

impl WorkspaceContext {
    /// An empty workspace context.
    #[must_use]
    pub fn new() -> Self {
        Self { mutable: MutableContext::new() }
    }

    /// Bind `name` at the workspace level.
    pub fn set(&mut self, name: &str, node: ExprNode) {
        self.mutable.set(name, node);
    }

    /// Remove a workspace-level binding.
    pub fn remove(&mut self, name: &str) {
        self.mutable.remove(name);
    }

    /// Iterate workspace-level bindings in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &ExprNode)> {
        self.mutable.iter()
    }

    /// Direct map lookup under the already-rewritten key, with no builtin or
    /// environment fallback. Used by [`UnitContext::get`], which needs to
    /// fall back to the builtin table and the environment under the
    /// *unqualified* name, not the namespace-rewritten one.
    fn get_bound(&self, name: &str) -> Option<ExprNode> {
        self.mutable.get(name)
    }
}

impl Context for WorkspaceContext {
    fn get(&self, name: &str) -> Option<ExprNode> {
        if let Some(node) = self.mutable.get(name) {
            return Some(node);
        }
        if name.starts_with('_') {
            return None;
        }
        if let Some(builtin) = builtins::lookup(name) {
            return Some(ExprNode::Builtin(builtin));
        }
        std::env::var(name).ok().map(ExprNode::Text)
    }

    fn namespace(&self) -> Option<&str> {
        None
    }
}

/// Shared handle to the single workspace macro map.
pub type SharedWorkspaceContext = Rc<RefCell<WorkspaceContext>>;

/// The result of rewriting a name under a [`UnitContext`].
struct PreparedName {
    key: String,
    namespace: Option<String>,
}

/// Namespace-rewriting wrapper over the workspace context (§4.4).
///
/// Bare names are prefixed with the unit's own identifier; an explicit
/// namespace is resolved through the unit's alias table first; an explicit
/// empty namespace (`:name`) is left unqualified.
pub struct UnitContext {
    workspace: SharedWorkspaceContext,
    unit_id: String,
    aliases: Rc<RefCell<IndexMap<String, String>>>,
}

impl UnitContext {
    /// Build a context for `unit_id`, sharing `workspace` and `aliases`.
    #[must_use]
    pub fn new(
        workspace: SharedWorkspaceContext,
        unit_id: String,
        aliases: Rc<RefCell<IndexMap<String, String>>>,
    ) -> Self {
        Self { workspace, unit_id, aliases }
    }

    fn prepare(&self, name: &str) -> PreparedName {
        match name.split_once(':') {
            Some((ns, var)) if ns.is_empty() => PreparedName { key: var.to_string(), namespace: None },
            Some((ns, var)) => {
                let resolved = self.aliases.borrow().get(ns).cloned().unwrap_or_else(|| ns.to_string());
                PreparedName { key: format!("{resolved}:{var}"), namespace: Some(resolved) }
            }
            None => PreparedName {
                key: format!("{}:{name}", self.unit_id),
                namespace: Some(self.unit_id.clone()),
            },
        }
    }

    /// Bind `name` (rewritten through aliasing/namespacing) to `node`.
    pub fn set(&self, name: &str, node: ExprNode) {
        let prepared = self.prepare(name);
        self.workspace.borrow_mut().set(&prepared.key, node);
    }

    /// Remove `name`'s binding after namespace rewriting.
    pub fn remove(&self, name: &str) {
        let prepared = self.prepare(name);
        self.workspace.borrow_mut().remove(&prepared.key);
    }

    /// The namespace a freshly-parsed `Var` under this context should record
    /// as its `bound_namespace`, for later substitution.
    #[must_use]
    pub fn bind_namespace(&self, name: &str) -> Option<String> {
        self.prepare(name).namespace
    }
}

impl Context for UnitContext {
    fn get(&self, name: &str) -> Option<ExprNode> {
        let prepared = self.prepare(name);
        if let Some(node) = self.workspace.borrow().get_bound(&prepared.key) {
            return Some(node);
        }
        // Namespace rewriting only governs the macro map; the builtin table
        // and the environment are unqualified, so fall back on the plain
        // variable name (stripped of any `namespace:` prefix) rather than
        // the rewritten key, or `$addprefix` would never reach `addprefix`
        // from inside a unit script.
        let varname = name.split_once(':').map_or(name, |(_, var)| var);
        if varname.starts_with('_') {
            return None;
        }
        if let Some(builtin) = builtins::lookup(varname) {
            return Some(ExprNode::Builtin(builtin));
        }
        std::env::var(varname).ok().map(ExprNode::Text)
    }

    fn namespace(&self) -> Option<&str> {
        Some(&self.unit_id)
    }
}

/// An ordered list of contexts; lookup returns the first hit. Read-only.
#[derive(Default)]
pub struct ChainContext<'a> {
    contexts: Vec<&'a dyn Context>,
}

impl<'a> ChainContext<'a> {
    /// Build a chain searched in the given order.
    #[must_use]
    pub fn new(contexts: Vec<&'a dyn Context>) -> Self {
        Self { contexts }
    }
}

impl Context for ChainContext<'_> {
    fn get(&self, name: &str) -> Option<ExprNode> {
        self.contexts.iter().find_map(|ctx| ctx.get(name))
    }

    fn namespace(&self) -> Option<&str> {
        self.contexts.first().and_then(|ctx| ctx.namespace())
    }
}

/// Exposes host-script local variables as read-only text nodes (§4.4).
#[derive(Debug, Default, Clone)]
pub struct StackFrameContext {
    locals: HashMap<String, ExprNode>,
}

impl StackFrameContext {
    /// An empty frame.
    #[must_use]
    pub fn new() -> Self {
        Self { locals: HashMap::new() }
    }

    /// Expose `name` as `value` for the lifetime of this frame.
    pub fn bind(&mut self, name: impl Into<String>, value: ExprNode) {
        self.locals.insert(name.into(), value);
    }

    /// Expose a plain string local, wrapped as a `Text` node.
    pub fn bind_str(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.bind(name, ExprNode::Text(value.into()));
    }
}

impl Context for StackFrameContext {
    fn get(&self, name: &str) -> Option<ExprNode> {
        self.locals.get(name).cloned()
    }

    fn namespace(&self) -> Option<&str> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workspace_falls_back_to_builtins_then_env() {
        let ctx = WorkspaceContext::new();
        assert!(matches!(ctx.get("addprefix"), Some(ExprNode::Builtin(_))));
        let key = "CREATOR_TEST_CONTEXT_ENV_VAR";
        // SAFETY: test-local variable, not shared with other tests.
        unsafe { std::env::set_var(key, "value") };
        assert!(matches!(ctx.get(key), Some(ExprNode::Text(s)) if s == "value"));
        // SAFETY: cleans up the variable set above.
        unsafe { std::env::remove_var(key) };
    }

    #[test]
    fn workspace_hides_underscore_prefixed_env_vars() {
        let ctx = WorkspaceContext::new();
        let key = "_CREATOR_TEST_PRIVATE_ENV_VAR";
        // SAFETY: test-local variable, not shared with other tests.
        unsafe { std::env::set_var(key, "secret") };
        assert!(ctx.get(key).is_none());
        // SAFETY: cleans up the variable set above.
        unsafe { std::env::remove_var(key) };
    }

    #[test]
    fn unit_context_prefixes_bare_names() {
        let workspace = Rc::new(RefCell::new(WorkspaceContext::new()));
        let aliases = Rc::new(RefCell::new(IndexMap::new()));
        let unit = UnitContext::new(Rc::clone(&workspace), "app".into(), Rc::clone(&aliases));
        unit.set("greeting", ExprNode::Text("hi".into()));
        assert!(workspace.borrow().get("app:greeting").is_some());
        assert!(unit.get("greeting").is_some());
    }

    #[test]
    fn unit_context_resolves_aliases() {
        let workspace = Rc::new(RefCell::new(WorkspaceContext::new()));
        let aliases = Rc::new(RefCell::new(IndexMap::new()));
        aliases.borrow_mut().insert("self".into(), "app".into());
        let unit = UnitContext::new(Rc::clone(&workspace), "app".into(), Rc::clone(&aliases));
        unit.set("self:greeting", ExprNode::Text("hi".into()));
        assert!(workspace.borrow().get("app:greeting").is_some());
    }

    #[test]
    fn explicit_empty_namespace_is_global() {
        let workspace = Rc::new(RefCell::new(WorkspaceContext::new()));
        let aliases = Rc::new(RefCell::new(IndexMap::new()));
        let unit = UnitContext::new(Rc::clone(&workspace), "app".into(), aliases);
        unit.set(":global", ExprNode::Text("shared".into()));
        assert!(workspace.borrow().get("global").is_some());
    }

    #[test]
    fn unit_context_reaches_builtins_through_a_bare_name() {
        let workspace = Rc::new(RefCell::new(WorkspaceContext::new()));
        let aliases = Rc::new(RefCell::new(IndexMap::new()));
        let unit = UnitContext::new(workspace, "app".into(), aliases);
        assert!(matches!(unit.get("addprefix"), Some(ExprNode::Builtin(_))));
    }

    #[test]
    fn unit_context_reaches_env_through_a_bare_name() {
        let workspace = Rc::new(RefCell::new(WorkspaceContext::new()));
        let aliases = Rc::new(RefCell::new(IndexMap::new()));
        let unit = UnitContext::new(workspace, "app".into(), aliases);
        let key = "CREATOR_TEST_UNIT_CONTEXT_ENV_VAR";
        // SAFETY: test-local variable, not shared with other tests.
        unsafe { std::env::set_var(key, "value") };
        assert!(matches!(unit.get(key), Some(ExprNode::Text(s)) if s == "value"));
        // SAFETY: cleans up the variable set above.
        unsafe { std::env::remove_var(key) };
    }
}
