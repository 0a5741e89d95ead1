//! Expression nodes: the parsed form of macro text (§3, §4.3).
//!
//! A node's `bound_namespace` is the namespace under which it was parsed
//! (the owning unit's identifier, or the alias target it resolved to, or
//! `None` when parsed with an explicit empty namespace). It is consulted
//! only by [`ExprNode::substitute`], which needs it to recognise that a
//! bare reference and its fully qualified form name the same macro.

use crate::builtins::Builtin;
use crate::context::Context;
use crate::error::CreatorError;

/// A parsed macro expression.
#[derive(Debug, Clone)]
pub enum ExprNode {
    /// A literal string.
    Text(String),
    /// An ordered concatenation of child nodes. Never nests directly.
    Concat(Vec<ExprNode>),
    /// A variable or function-call reference.
    Var {
        /// The referenced name, exactly as written (may be qualified).
        name: String,
        /// Evaluated-at-call-time argument expressions.
        args: Vec<ExprNode>,
        /// Namespace this node was parsed under, used only for substitution.
        bound_namespace: Option<String>,
    },
    /// An opaque builtin function, reached only via context lookup.
    Builtin(Builtin),
}

impl ExprNode {
    /// An empty literal, the identity value for concatenation.
    #[must_use]
    pub const fn empty() -> Self {
        Self::Text(String::new())
    }

    /// Evaluate this node under `ctx`, with `caller_args` bound for any
    /// positional (`$0`, `$1`, …) references it or its children contain.
    pub fn eval(&self, ctx: &dyn Context, caller_args: &[ExprNode]) -> Result<String, CreatorError> {
        match self {
            Self::Text(s) => Ok(s.clone()),
            Self::Concat(children) => {
                let mut out = String::new();
                for child in children {
                    out.push_str(&child.eval(ctx, caller_args)?);
                }
                Ok(out)
            }
            Self::Var { name, args, .. } => eval_var(name, args, ctx, caller_args),
            Self::Builtin(builtin) => {
                let mut strings = Vec::with_capacity(caller_args.len());
                for arg in caller_args {
                    strings.push(arg.eval(ctx, &[])?);
                }
                builtin.call(&strings)
            }
        }
    }

    /// Replace every reference to `ref_name` (by bare name or by its
    /// namespace-qualified form) with a deep copy of `replacement`.
    #[must_use]
    pub fn substitute(&self, ref_name: &str, replacement: &Self) -> Self {
        match self {
            Self::Text(_) | Self::Builtin(_) => self.clone(),
            Self::Concat(children) => {
                Self::Concat(children.iter().map(|c| c.substitute(ref_name, replacement)).collect())
            }
            Self::Var { name, args, bound_namespace } => {
                let qualified = bound_namespace.as_ref().map(|ns| format!("{ns}:{name}"));
                let is_match = name == ref_name || qualified.as_deref() == Some(ref_name);
                let new_args: Vec<Self> = args.iter().map(|a| a.substitute(ref_name, replacement)).collect();
                if is_match {
                    replacement.deep_copy()
                } else {
                    Self::Var {
                        name: name.clone(),
                        args: new_args,
                        bound_namespace: bound_namespace.clone(),
                    }
                }
            }
        }
    }

    /// Deep-copy this expression tree. Nodes own their data, so this is a clone.
    #[must_use]
    pub fn deep_copy(&self) -> Self {
        self.clone()
    }
}

fn eval_var(
    name: &str,
    args: &[ExprNode],
    ctx: &dyn Context,
    caller_args: &[ExprNode],
) -> Result<String, CreatorError> {
    let mut sub_args = Vec::with_capacity(args.len());
    for arg in args {
        sub_args.push(ExprNode::Text(arg.eval(ctx, caller_args)?));
    }

    if let Ok(index) = name.parse::<usize>() {
        if let Some(positional) = caller_args.get(index) {
            let value = positional.eval(ctx, &sub_args)?;
            return Ok(value.trim().to_string());
        }
    }

    match ctx.get(name) {
        Some(node) => {
            let value = node.eval(ctx, &sub_args)?;
            Ok(value.trim().to_string())
        }
        None => Ok(String::new()),
    }
}

/// Incrementally builds a [`ExprNode::Concat`], coalescing adjacent text and
/// flattening any nested `Concat` pushed onto it.
#[derive(Debug, Default)]
pub struct ConcatBuilder {
    nodes: Vec<ExprNode>,
}

impl ConcatBuilder {
    /// Start an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `node`, coalescing with a trailing `Text` and flattening nested `Concat`s.
    pub fn push(&mut self, node: ExprNode) {
        match node {
            ExprNode::Text(s) if s.is_empty() => {}
            ExprNode::Text(s) => self.push_text(s),
            ExprNode::Concat(children) => {
                for child in children {
                    self.push(child);
                }
            }
            other => self.nodes.push(other),
        }
    }

    fn push_text(&mut self, s: String) {
        if let Some(ExprNode::Text(last)) = self.nodes.last_mut() {
            last.push_str(&s);
        } else {
            self.nodes.push(ExprNode::Text(s));
        }
    }

    /// Consume the builder, producing a single node.
    #[must_use]
    pub fn finish(mut self) -> ExprNode {
        match self.nodes.len() {
            0 => ExprNode::empty(),
            1 => self.nodes.pop().unwrap_or_else(ExprNode::empty),
            _ => ExprNode::Concat(self.nodes),
        }
    }
}
