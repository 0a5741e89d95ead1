//! A toy script sandbox used only by this crate's integration tests.
//!
//! The real embedded scripting host (§6.2) is an external collaborator —
//! this is a stand-in just thorough enough to drive [`HostApi`] end to end
//! from a `.crunit`-shaped text file, so the integration tests can exercise
//! unit loading, target setup, and Ninja emission together instead of only
//! through unit tests.
//!
//! Line-oriented format, one statement per line, blank lines and `#`
//! comments ignored:
//!
//! ```text
//! define NAME VALUE...
//! extends UNIT
//! target NAME
//! requires REF
//! build INPUTS OUTPUTS COMMAND...
//! endtarget
//! ```
//!
//! `extends` loads another unit immediately, the way a real script must
//! before a `target` block's deferred `requires` line can resolve a
//! cross-unit reference at setup time.
//!
//! `requires`/`build` lines between `target`/`endtarget` are deferred: they
//! run when the target's `on_setup` callback fires, not while the script is
//! being read.

use std::cell::RefCell;
use std::rc::Rc;

use creator::context::StackFrameContext;
use creator::error::CreatorResult;
use creator::host_api::{HostApi, ScriptHost};
use creator::target::{self, Target};
use creator::unit::Workspace;

#[derive(Debug, Clone)]
enum TargetStmt {
    Requires(String),
    Build { inputs: String, outputs: String, command: String },
}

/// A toy [`ScriptHost`] interpreting the line format documented above.
///
/// Holds its own `Rc<Workspace>` independent of the transient `&Workspace`
/// `HostApi` carries, so `on_setup` closures built while parsing a `target`
/// block can close over the workspace and still satisfy `SetupCallback`'s
/// `'static` bound.
pub struct LineScriptHost {
    workspace: Rc<Workspace>,
}

impl LineScriptHost {
    /// Build a host sharing ownership of `workspace`.
    #[must_use]
    pub fn new(workspace: Rc<Workspace>) -> Self {
        Self { workspace }
    }
}

impl ScriptHost for LineScriptHost {
    fn run(&self, source: &str, api: &mut HostApi<'_>) -> CreatorResult<()> {
        let mut lines = source.lines().peekable();
        while let Some(raw) = lines.next() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (keyword, rest) = line.split_once(' ').unwrap_or((line, ""));
            match keyword {
                "define" => {
                    let (name, value) = rest.split_once(' ').unwrap_or((rest, ""));
                    api.define(name, value);
                }
                "extends" => {
                    api.extends(rest)?;
                }
                "target" => {
                    let name = rest.to_string();
                    let mut stmts = Vec::new();
                    for block_line in lines.by_ref() {
                        let block_line = block_line.trim();
                        if block_line == "endtarget" {
                            break;
                        }
                        if block_line.is_empty() || block_line.starts_with('#') {
                            continue;
                        }
                        stmts.push(parse_target_stmt(block_line));
                    }
                    let workspace = Rc::clone(&self.workspace);
                    let on_setup = Rc::new(move |target: &Rc<RefCell<Target>>| -> CreatorResult<()> {
                        let stack = StackFrameContext::new();
                        for stmt in &stmts {
                            match stmt {
                                TargetStmt::Requires(target_ref) => {
                                    target::requires(target, &workspace, target_ref)?;
                                }
                                TargetStmt::Build { inputs, outputs, command } => {
                                    target::build(target, &stack, inputs, outputs, command, false)?;
                                }
                            }
                        }
                        Ok(())
                    });
                    api.target(&name, on_setup)?;
                }
                other => panic!("unrecognised line-script statement: {other}"),
            }
        }
        Ok(())
    }
}

fn parse_target_stmt(line: &str) -> TargetStmt {
    let (keyword, rest) = line.split_once(' ').unwrap_or((line, ""));
    match keyword {
        "requires" => TargetStmt::Requires(rest.to_string()),
        "build" => {
            let mut parts = rest.splitn(3, ' ');
            let inputs = parts.next().unwrap_or_default().to_string();
            let outputs = parts.next().unwrap_or_default().to_string();
            let command = parts.next().unwrap_or_default().to_string();
            TargetStmt::Build { inputs, outputs, command }
        }
        other => panic!("unrecognised target-block statement: {other}"),
    }
}
