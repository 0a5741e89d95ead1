//! The fixed table of macro builtin functions (§4.5).
//!
//! Every builtin operates purely on the semicolon-list string form: it never
//! touches a [`crate::context::Context`]. Argument evaluation already
//! happened by the time [`crate::expr::ExprNode::eval`] reaches a builtin
//! node, so the host function only ever sees plain strings.

use crate::error::CreatorError;
use crate::list_codec;

/// Arity contract for a builtin, used to produce [`CreatorError::ArityMismatch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// Exactly `n` arguments.
    Exact(usize),
    /// At least `n` arguments.
    AtLeast(usize),
}

impl Arity {
    fn accepts(self, got: usize) -> bool {
        match self {
            Self::Exact(n) => got == n,
            Self::AtLeast(n) => got >= n,
        }
    }

    fn describe(self) -> String {
        match self {
            Self::Exact(n) => n.to_string(),
            Self::AtLeast(n) => format!("at least {n}"),
        }
    }
}

/// Signature shared by every entry in the builtin table.
pub type BuiltinFn = fn(&[String]) -> Result<String, CreatorError>;

/// A single entry of the fixed builtin table.
#[derive(Clone, Copy)]
pub struct Builtin {
    /// The name used to invoke this builtin from macro source, e.g. `addprefix`.
    pub name: &'static str,
    /// The arity contract checked before `func` runs.
    pub arity: Arity,
    /// The host function implementing the builtin.
    pub func: BuiltinFn,
}

impl std::fmt::Debug for Builtin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Builtin").field("name", &self.name).finish()
    }
}

impl Builtin {
    /// Invoke this builtin, checking arity first.
    pub fn call(&self, args: &[String]) -> Result<String, CreatorError> {
        if !self.arity.accepts(args.len()) {
            return Err(CreatorError::ArityMismatch {
                name: self.name.to_string(),
                expected: self.arity.describe(),
                got: args.len(),
            });
        }
        (self.func)(args)
    }
}

const TABLE: &[Builtin] = &[
    Builtin { name: "addprefix", arity: Arity::Exact(2), func: addprefix },
    Builtin { name: "addsuffix", arity: Arity::Exact(2), func: addsuffix },
    Builtin { name: "prefix", arity: Arity::Exact(2), func: prefix },
    Builtin { name: "suffix", arity: Arity::Exact(2), func: suffix },
    Builtin { name: "subst", arity: Arity::Exact(3), func: subst },
    Builtin { name: "split", arity: Arity::AtLeast(1), func: split },
    Builtin { name: "quote", arity: Arity::AtLeast(0), func: quote },
    Builtin { name: "quoteall", arity: Arity::AtLeast(0), func: quoteall },
    Builtin { name: "quotesplit", arity: Arity::AtLeast(0), func: quotesplit },
    Builtin { name: "wildcard", arity: Arity::AtLeast(0), func: wildcard },
    Builtin { name: "move", arity: Arity::Exact(3), func: move_path },
    Builtin { name: "dir", arity: Arity::AtLeast(1), func: dir },
];

/// Look up a builtin by name, returning `None` for anything not in [`TABLE`].
#[must_use]
pub fn lookup(name: &str) -> Option<Builtin> {
    TABLE.iter().find(|b| b.name == name).copied()
}

fn items_of(list: &str) -> Vec<String> {
    list_codec::decode(list)
}

// Unlike `prefix`/`suffix` (list transforms meant to feed further builtin
// calls), `addprefix`/`addsuffix` produce a space-joined flag string ready to
// drop straight into a shell command (spec §8 S2: `$(addprefix -I,a;b;c)` ==
// `"-Ia -Ib -Ic"`, not a re-encoded semicolon list).
fn addprefix(args: &[String]) -> Result<String, CreatorError> {
    let prefix = args.first().map(String::as_str).unwrap_or_default();
    let list = args.get(1).map(String::as_str).unwrap_or_default();
    let items: Vec<String> = items_of(list).into_iter().map(|i| format!("{prefix}{i}")).collect();
    Ok(items.join(" "))
}

fn addsuffix(args: &[String]) -> Result<String, CreatorError> {
    let suffix = args.first().map(String::as_str).unwrap_or_default();
    let list = args.get(1).map(String::as_str).unwrap_or_default();
    let items: Vec<String> = items_of(list).into_iter().map(|i| format!("{i}{suffix}")).collect();
    Ok(items.join(" "))
}

fn prefix(args: &[String]) -> Result<String, CreatorError> {
    let list = args.first().map(String::as_str).unwrap_or_default();
    let prefix = args.get(1).map(String::as_str).unwrap_or_default();
    let items: Vec<String> = items_of(list)
        .into_iter()
        .map(|item| {
            let dir = list_codec::dirname(&item);
            let base = list_codec::basename(&item);
            if dir == "." {
                format!("{prefix}{base}")
            } else {
                format!("{dir}/{prefix}{base}")
            }
        })
        .collect();
    Ok(list_codec::encode(&items))
}

fn suffix(args: &[String]) -> Result<String, CreatorError> {
    let list = args.first().map(String::as_str).unwrap_or_default();
    let suffix_val = args.get(1).map(String::as_str).unwrap_or_default();
    let items: Vec<String> = items_of(list)
        .into_iter()
        .map(|item| list_codec::set_suffix(&item, suffix_val))
        .collect();
    Ok(list_codec::encode(&items))
}

fn subst(args: &[String]) -> Result<String, CreatorError> {
    let from = args.first().map(String::as_str).unwrap_or_default();
    let to = args.get(1).map(String::as_str).unwrap_or_default();
    let list = args.get(2).map(String::as_str).unwrap_or_default();
    let items: Vec<String> = items_of(list).into_iter().map(|i| i.replace(from, to)).collect();
    Ok(list_codec::encode(&items))
}

fn split(args: &[String]) -> Result<String, CreatorError> {
    let joined = args.join(";");
    Ok(items_of(&joined).join(" "))
}

fn quote(args: &[String]) -> Result<String, CreatorError> {
    Ok(args.iter().map(|a| list_codec::quote(a)).collect::<Vec<_>>().join(" "))
}

fn quoteall(args: &[String]) -> Result<String, CreatorError> {
    let joined = args.join(";");
    let items: Vec<String> = items_of(&joined).into_iter().map(|i| list_codec::quote(&i)).collect();
    Ok(list_codec::encode(&items))
}

fn quotesplit(args: &[String]) -> Result<String, CreatorError> {
    let joined = args.join(";");
    let quoted: Vec<String> = items_of(&joined).into_iter().map(|i| list_codec::quote(&i)).collect();
    Ok(quoted.join(" "))
}

fn wildcard(args: &[String]) -> Result<String, CreatorError> {
    let mut seen = std::collections::HashSet::new();
    let mut matches = Vec::new();
    for pattern in args {
        let mut hits: Vec<String> = glob::glob(pattern)
            .into_iter()
            .flatten()
            .filter_map(Result::ok)
            .filter_map(|p| p.to_str().map(str::to_string))
            .collect();
        hits.sort();
        for hit in hits {
            if seen.insert(hit.clone()) {
                matches.push(hit);
            }
        }
    }
    Ok(list_codec::encode(&matches))
}

fn move_path(args: &[String]) -> Result<String, CreatorError> {
    let list = args.first().map(String::as_str).unwrap_or_default();
    let base = args.get(1).map(String::as_str).unwrap_or_default();
    let new_base = args.get(2).map(String::as_str).unwrap_or_default();
    let base_path = camino::Utf8Path::new(base);
    let items: Vec<String> = items_of(list)
        .into_iter()
        .map(|item| {
            let rel = camino::Utf8Path::new(&item)
                .strip_prefix(base_path)
                .map(camino::Utf8Path::to_path_buf)
                .unwrap_or_else(|_| camino::Utf8PathBuf::from(&item));
            camino::Utf8Path::new(new_base).join(rel).into_string()
        })
        .collect();
    Ok(list_codec::encode(&items))
}

fn dir(args: &[String]) -> Result<String, CreatorError> {
    let joined = args.join(";");
    let items: Vec<String> = items_of(&joined).into_iter().map(|i| list_codec::dirname(&i)).collect();
    Ok(list_codec::encode(&items))
}
