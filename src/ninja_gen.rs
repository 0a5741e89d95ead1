//! Deterministic Ninja manifest emission (§4.9, §6.3).
//!
//! [`NinjaWriter`] is the minimal collaborator interface of §6.3: a real
//! Ninja-syntax writer crate could stand in for it without [`emit`] changing
//! at all. Determinism is the whole point of this module, so every
//! iteration order below is explicit rather than left to a `HashMap`.

use std::collections::HashSet;

use camino::Utf8PathBuf;

use crate::error::{CreatorError, CreatorResult};
use crate::target::BuildEntry;
use crate::unit::{Member, Workspace};

/// Minimal Ninja-syntax writer contract (§6.3).
///
/// Escapes `$`, `:`, and spaces per Ninja's own rules, and never wraps a
/// logical line: the expected output width is wide enough (>=1024 columns)
/// that a forced wrap would never be needed to stay within it.
#[derive(Debug, Default)]
pub struct NinjaWriter {
    buf: String,
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        if matches!(ch, '$' | ':' | ' ') {
            out.push('$');
        }
        out.push(ch);
    }
    out
}

fn escape_joined(items: &[String]) -> String {
    items.iter().map(|i| escape(i)).collect::<Vec<_>>().join(" ")
}

impl NinjaWriter {
    /// An empty writer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit a `#`-prefixed comment line.
    pub fn comment(&mut self, text: &str) {
        self.buf.push_str("# ");
        self.buf.push_str(text);
        self.buf.push('\n');
    }

    /// Emit a blank line.
    pub fn newline(&mut self) {
        self.buf.push('\n');
    }

    /// Emit a top-level `key = value` binding.
    pub fn variable(&mut self, key: &str, value: &str) {
        self.buf.push_str(key);
        self.buf.push_str(" = ");
        self.buf.push_str(value);
        self.buf.push('\n');
    }

    /// Emit a `rule` block binding its `command`.
    pub fn rule(&mut self, name: &str, command: &str) {
        self.buf.push_str("rule ");
        self.buf.push_str(name);
        self.buf.push('\n');
        self.buf.push_str("  command = ");
        self.buf.push_str(command);
        self.buf.push('\n');
    }

    /// Emit a `build` edge: `outputs : rule inputs`.
    pub fn build(&mut self, outputs: &[String], rule: &str, inputs: &[String]) {
        self.buf.push_str("build ");
        self.buf.push_str(&escape_joined(outputs));
        self.buf.push_str(": ");
        self.buf.push_str(rule);
        if !inputs.is_empty() {
            self.buf.push(' ');
            self.buf.push_str(&escape_joined(inputs));
        }
        self.buf.push('\n');
    }

    /// Emit the `default` directive.
    pub fn default(&mut self, list: &[String]) {
        if list.is_empty() {
            return;
        }
        self.buf.push_str("default ");
        self.buf.push_str(&escape_joined(list));
        self.buf.push('\n');
    }

    /// Consume the writer, returning the accumulated manifest text.
    #[must_use]
    pub fn finish(self) -> String {
        self.buf
    }
}

/// Replace every character outside `[A-Za-z0-9_]` with `_` (§4.9 `ident`).
fn sanitize_ident(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

fn qualified_target_id(unit_id: &str, target_name: &str) -> String {
    format!("{unit_id}:{target_name}")
}

fn dedup_preserving_order(paths: impl IntoIterator<Item = Utf8PathBuf>) -> Vec<Utf8PathBuf> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for path in paths {
        if seen.insert(path.clone()) {
            out.push(path);
        }
    }
    out
}

fn to_strings(paths: &[Utf8PathBuf]) -> Vec<String> {
    paths.iter().map(std::string::ToString::to_string).collect()
}

/// Union of every dependency's every entry's outputs, deduplicated with
/// first-occurrence order preserved (§4.9 `extra_inputs`).
fn extra_inputs_for(target: &crate::target::Target) -> Vec<Utf8PathBuf> {
    let mut all = Vec::new();
    for dep in &target.dependencies {
        for entry in &dep.borrow().command_data {
            all.extend(entry.outputs.iter().cloned());
        }
    }
    dedup_preserving_order(all)
}

fn emit_target(
    writer: &mut NinjaWriter,
    unit_id: &str,
    target: &crate::target::Target,
) -> CreatorResult<Vec<String>> {
    let tid = qualified_target_id(unit_id, &target.name);
    let extra_inputs = extra_inputs_for(target);
    let mut phony_outputs: Vec<Utf8PathBuf> = Vec::new();

    for (index, entry) in target.command_data.iter().enumerate() {
        emit_entry(writer, &tid, index, entry, &extra_inputs)?;
        phony_outputs.extend(entry.outputs.iter().cloned());
    }

    let phony_outputs = dedup_preserving_order(phony_outputs);
    let phony_strings = to_strings(&phony_outputs);
    writer.build(&[sanitize_ident(&tid)], "phony", &phony_strings);
    writer.newline();
    Ok(phony_strings)
}

fn emit_entry(
    writer: &mut NinjaWriter,
    tid: &str,
    index: usize,
    entry: &BuildEntry,
    extra_inputs: &[Utf8PathBuf],
) -> CreatorResult<()> {
    let rule_name = sanitize_ident(&format!("{tid}_{index:04}"));
    writer.rule(&rule_name, &entry.command);

    if entry.outputs.is_empty() {
        return Err(CreatorError::TypeViolation(format!(
            "build entry {index} of `{tid}` has no outputs"
        )));
    }

    let outputs = to_strings(&entry.outputs);
    let input_strings = to_strings(&dedup_preserving_order(
        entry
            .inputs
            .iter()
            .cloned()
            .chain(extra_inputs.iter().cloned())
            .chain(entry.auxiliary.iter().cloned()),
    ));
    writer.build(&outputs, &rule_name, &input_strings);
    writer.newline();
    Ok(())
}

/// Serialize every unit's target graph to a Ninja manifest (§4.9).
///
/// Units are visited in ascending identifier order, targets within a unit in
/// ascending name order, and build entries within a target in their
/// original append order. `default_targets` names targets (`"unit:name"`)
/// whose combined outputs become the manifest's `default` line; when empty,
/// no `default` directive is written (Ninja then defaults to "build
/// everything").
///
/// # Errors
///
/// Returns [`CreatorError::UnitNotFound`] if a requested default target does
/// not resolve, or [`CreatorError::TypeViolation`] if a build entry somehow
/// carries no outputs.
pub fn emit(workspace: &Workspace, default_targets: &[String]) -> CreatorResult<String> {
    let mut writer = NinjaWriter::new();
    writer.comment("Generated by creator. Do not edit by hand.");
    writer.newline();

    let mut units = workspace.units_in_order();
    units.sort_by(|a, b| a.borrow().identifier.cmp(&b.borrow().identifier));

    for unit in &units {
        let unit_ref = unit.borrow();
        let mut names: Vec<&String> = unit_ref.targets.keys().collect();
        names.sort();
        for name in names {
            let Some(Member::Target(target)) = unit_ref.targets.get(name) else {
                tracing::warn!(unit = %unit_ref.identifier, %name, "skipping non-buildable member");
                continue;
            };
            emit_target(&mut writer, &unit_ref.identifier, &target.borrow())?;
        }
    }

    if !default_targets.is_empty() {
        let mut defaults = Vec::new();
        for target_ref in default_targets {
            let (unit_id, _name) = target_ref.split_once(':').ok_or_else(|| {
                CreatorError::UnitNotFound(format!("`{target_ref}` must be `unit:name`"))
            })?;
            let target = workspace.resolve_target(target_ref, unit_id)?;
            for entry in &target.borrow().command_data {
                defaults.extend(entry.outputs.iter().cloned());
            }
        }
        let defaults = dedup_preserving_order(defaults);
        writer.default(&to_strings(&defaults));
    }

    Ok(writer.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::StackFrameContext;
    use crate::target::{self, Target};
    use crate::unit::Unit;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn make_target(workspace: &Workspace, unit_id: &str, name: &str) -> Rc<RefCell<Target>> {
        let unit = workspace.register_unit_for_test(unit_id);
        let Ok(target) = Unit::register_target(&unit, name.to_string(), Rc::new(|_| Ok(()))) else {
            panic!("target registration should succeed");
        };
        target::do_setup(&target).ok();
        target
    }

    #[test]
    fn rule_names_follow_id_and_padded_index() {
        let workspace = Workspace::new(Vec::new(), std::iter::empty());
        let target = make_target(&workspace, "p", "foo-bar");
        let stack = StackFrameContext::new();
        target::build(&target, &stack, "a.c", "a.o", "cc -c $< -o $@", false).ok();
        target::build(&target, &stack, "b.c", "b.o", "cc -c $< -o $@", false).ok();

        let ninja = emit(&workspace, &[]).expect("emission should succeed");
        assert!(ninja.contains("rule p_foo_bar_0000"));
        assert!(ninja.contains("rule p_foo_bar_0001"));
        assert!(ninja.contains("build p_foo_bar: phony a.o b.o"));
    }

    #[test]
    fn dependency_outputs_fan_into_downstream_inputs() {
        let workspace = Workspace::new(Vec::new(), std::iter::empty());
        let a = make_target(&workspace, "p", "a");
        let stack = StackFrameContext::new();
        target::build(&a, &stack, "", "a.o", "cc -c a.c -o $@", false).ok();

        let b = make_target(&workspace, "p", "b");
        target::requires(&b, &workspace, "p:a").ok();
        target::build(&b, &stack, "b.c", "b.o", "cc -c $< -o $@", false).ok();

        let ninja = emit(&workspace, &[]).expect("emission should succeed");
        let build_line = ninja
            .lines()
            .find(|line| line.starts_with("build b.o"))
            .expect("build line for b.o must exist");
        assert!(build_line.contains("b.c"));
        assert!(build_line.contains("a.o"));
    }

    #[test]
    fn default_directive_unions_requested_target_outputs() {
        let workspace = Workspace::new(Vec::new(), std::iter::empty());
        let target = make_target(&workspace, "p", "all");
        let stack = StackFrameContext::new();
        target::build(&target, &stack, "", "out.bin", "ld -o $@", false).ok();

        let ninja = emit(&workspace, &["p:all".to_string()]).expect("emission should succeed");
        assert!(ninja.lines().any(|l| l == "default out.bin"));
    }

    #[test]
    fn units_and_targets_are_emitted_in_ascending_order() {
        let workspace = Workspace::new(Vec::new(), std::iter::empty());
        make_target(&workspace, "z", "only");
        make_target(&workspace, "a", "only");

        let ninja = emit(&workspace, &[]).expect("emission should succeed");
        let a_pos = ninja.find("a_only").expect("unit a must appear");
        let z_pos = ninja.find("z_only").expect("unit z must appear");
        assert!(a_pos < z_pos, "unit a must be emitted before unit z");
    }
}
