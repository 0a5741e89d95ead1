//! Execution dispatcher: workspace assembly, setup, and either manifest
//! export or Ninja invocation (§5, §6.1).
//!
//! Named `dispatch` rather than `runner` because there is no in-process task
//! scheduler left to run here (§9 Design Notes: the deprecated
//! `pending/running/finished/failed` state machine is not reintroduced) —
//! this module's job is entirely to get the workspace built, set up, and
//! handed off to Ninja or to a bare task invocation.

use std::io::{BufRead, BufReader};
use std::process::{Command, Stdio};

use camino::{Utf8Path, Utf8PathBuf};
use tempfile::Builder;
use tracing::{debug, info, warn};

use creator_ninja_env::{CREATORPATH_ENV, NINJA_ENV};

use crate::cli::Cli;
use crate::context::StackFrameContext;
use crate::error::{CreatorError, CreatorResult};
use crate::host_api::ScriptHost;
use crate::ninja_gen;
use crate::unit::{Member, Unit, Workspace};

/// Default Ninja executable name, resolved against `PATH`.
pub const NINJA_PROGRAM: &str = "ninja";

/// Per-run summary bookkeeping (§6.1's exit-code contract): whether a
/// manifest was written, whether Ninja (or an inline task) ran, and what
/// exit code the process should use.
#[derive(Debug, Clone, Default)]
pub struct Outcome {
    /// Manifest path written, if export happened.
    pub manifest_written: Option<Utf8PathBuf>,
    /// Whether Ninja was invoked (as opposed to a dry run or bare export).
    pub ninja_invoked: bool,
    /// Process exit code: 0 success, 1 build/target failure, 2 CLI misuse.
    pub exit_code: i32,
}

impl Outcome {
    fn success() -> Self {
        Self { exit_code: 0, ..Self::default() }
    }
}

/// Resolve the unit search path: `-i/--unitpath` directories first (§6.1:
/// "prepended to search path"), then the built-in current-directory entry,
/// then `CREATORPATH` (OS path-separator list), in the order they should be
/// searched (§3 Workspace lifecycle).
#[must_use]
pub fn build_search_path(cli: &Cli) -> Vec<Utf8PathBuf> {
    let mut path: Vec<Utf8PathBuf> = cli.unitpath.clone();
    path.push(Utf8PathBuf::from("."));
    if let Ok(creatorpath) = std::env::var(CREATORPATH_ENV) {
        for entry in std::env::split_paths(&creatorpath) {
            if let Ok(dir) = Utf8PathBuf::from_path_buf(entry) {
                path.push(dir);
            }
        }
    }
    path
}

/// Parse a `KEY[=VAL]` CLI argument, defaulting `VAL` to the empty string.
#[must_use]
pub fn split_key_val(raw: &str) -> (String, String) {
    match raw.split_once('=') {
        Some((key, val)) => (key.to_string(), val.to_string()),
        None => (raw.to_string(), String::new()),
    }
}

/// Apply `-D`/`-M` bindings to the workspace. `-D` binds a literal `Text`
/// node; `-M` parses `VAL` as a macro expression first (§6.1).
pub fn apply_cli_macros(workspace: &Workspace, cli: &Cli) {
    for raw in &cli.define {
        let (key, val) = split_key_val(raw);
        workspace.define_global(&key, crate::expr::ExprNode::Text(val));
    }
    for raw in &cli.define_macro {
        let (key, val) = split_key_val(raw);
        let node = crate::parser::parse(&val, None);
        workspace.define_global(&key, node);
    }
}

/// Recursively load unit `identifier`, re-entrant-safe: a cycle through
/// `load`/`extends` resolves to the same in-progress [`Unit`] handle instead
/// of looping (§4.8).
///
/// # Errors
///
/// Returns [`CreatorError::UnitNotFound`] if `identifier` is not on the
/// search path, or propagates whatever error the unit's own script raised
/// (registration is rolled back in that case).
pub fn load_unit(
    workspace: &Workspace,
    host: &dyn ScriptHost,
    identifier: &str,
) -> CreatorResult<std::rc::Rc<std::cell::RefCell<Unit>>> {
    if let Some(existing) = workspace.get_unit(identifier) {
        return Ok(existing);
    }
    let path = workspace.find_unit_path(identifier)?;
    let project_path = path.parent().map_or_else(|| Utf8PathBuf::from("."), Utf8Path::to_path_buf);
    let unit = workspace.begin_load(identifier, project_path);
    let source = std::fs::read_to_string(path.as_std_path())
        .map_err(|source| CreatorError::UnitIo { path: path.clone().into_std_path_buf(), source })?;
    let mut api = crate::host_api::HostApi::new(std::rc::Rc::clone(&unit), workspace, host);
    if let Err(err) = host.run(&source, &mut api) {
        workspace.rollback_load(identifier);
        return Err(err);
    }
    Ok(unit)
}

/// Load the per-user static/profile script (`~/.creator_profile`) if it
/// exists, registering it as a hidden static unit (§3 Workspace lifecycle).
/// Absence is not an error.
///
/// # Errors
///
/// Propagates whatever error the profile script itself raised.
pub fn load_profile(workspace: &Workspace, host: &dyn ScriptHost) -> CreatorResult<()> {
    let Some(home) = std::env::var_os("HOME").or_else(|| std::env::var_os("USERPROFILE")) else {
        return Ok(());
    };
    let Ok(home) = Utf8PathBuf::from_path_buf(std::path::PathBuf::from(home)) else {
        return Ok(());
    };
    let profile_path = home.join(".creator_profile");
    if !profile_path.is_file() {
        return Ok(());
    }
    let unit = workspace.begin_load("__profile__", home);
    let source = std::fs::read_to_string(profile_path.as_std_path())
        .map_err(|source| CreatorError::UnitIo { path: profile_path.clone().into_std_path_buf(), source })?;
    let mut api = crate::host_api::HostApi::new(std::rc::Rc::clone(&unit), workspace, host);
    host.run(&source, &mut api)?;
    workspace.register_static(profile_path, std::rc::Rc::clone(&unit));
    Ok(())
}

/// Find the sole `*.crunit` file in `dir`, for when `-u/--unit` is omitted.
///
/// # Errors
///
/// Returns [`CreatorError::CliMisuse`] if zero or more than one match
/// exists.
pub fn sole_unit_in(dir: &Utf8Path) -> CreatorResult<String> {
    let mut matches: Vec<String> = std::fs::read_dir(dir.as_std_path())
        .into_iter()
        .flatten()
        .filter_map(Result::ok)
        .filter_map(|entry| Utf8PathBuf::from_path_buf(entry.path()).ok())
        .filter(|p| p.extension() == Some("crunit"))
        .filter_map(|p| p.file_stem().map(str::to_string))
        .collect();
    matches.sort();
    match matches.len() {
        1 => matches.pop().ok_or_else(|| CreatorError::CliMisuse("*.crunit".to_string())),
        0 => Err(CreatorError::CliMisuse("no *.crunit file found in current directory".to_string())),
        _ => Err(CreatorError::CliMisuse(format!(
            "ambiguous: {} *.crunit files found, pass -u/--unit explicitly",
            matches.len()
        ))),
    }
}

/// Which Ninja executable to invoke: `CREATOR_NINJA` env override, else
/// `"ninja"` resolved against `PATH`.
#[must_use]
pub fn resolve_ninja_program() -> String {
    std::env::var(NINJA_ENV).unwrap_or_else(|_| NINJA_PROGRAM.to_string())
}

/// Write `manifest` to a fresh temp file and invoke Ninja against it,
/// streaming output and returning its exit status.
///
/// # Errors
///
/// Returns [`CreatorError::UnitIo`] if the temp file cannot be created or
/// written, or [`CreatorError::ExitCodeError`] if Ninja cannot be spawned or
/// returns a non-zero status.
pub fn run_ninja(manifest: &str, cli: &Cli, targets: &[String]) -> CreatorResult<i32> {
    let tmp = Builder::new()
        .prefix("creator.")
        .suffix(".ninja")
        .tempfile()
        .map_err(|source| CreatorError::UnitIo { path: std::env::temp_dir(), source })?;
    std::fs::write(tmp.path(), manifest)
        .map_err(|source| CreatorError::UnitIo { path: tmp.path().to_path_buf(), source })?;

    let program = resolve_ninja_program();
    let mut cmd = Command::new(&program);
    cmd.arg("-f").arg(tmp.path());
    if cli.clean {
        cmd.arg("-t").arg("clean");
    }
    if cli.verbose {
        cmd.arg("-v");
    }
    cmd.args(targets);
    cmd.args(&cli.args);
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    info!(%program, "invoking ninja");
    let mut child = cmd
        .spawn()
        .map_err(|_| CreatorError::ExitCodeError { command: program.clone(), status: -1 })?;
    stream_output(&mut child);
    let status = child
        .wait()
        .map_err(|_| CreatorError::ExitCodeError { command: program.clone(), status: -1 })?;
    let code = status.code().unwrap_or(-1);
    Ok(code)
}

fn stream_output(child: &mut std::process::Child) {
    if let Some(stdout) = child.stdout.take() {
        for line in BufReader::new(stdout).lines().map_while(Result::ok) {
            debug!(target: "ninja.stdout", "{line}");
        }
    }
    if let Some(stderr) = child.stderr.take() {
        for line in BufReader::new(stderr).lines().map_while(Result::ok) {
            debug!(target: "ninja.stderr", "{line}");
        }
    }
}

/// Run the full pipeline described by `cli` against a fresh workspace,
/// delegating script execution to `host` (§1, §6.2).
///
/// # Errors
///
/// Returns [`CreatorError::CliMisuse`] for flag conflicts or an ambiguous/
/// missing main unit, or propagates any error raised while loading units,
/// setting up targets, or emitting the manifest.
pub fn dispatch(cli: &Cli, host: &dyn ScriptHost) -> CreatorResult<Outcome> {
    if cli.export && cli.no_export {
        return Err(CreatorError::CliMisuse("-e/--export and -n/--no-export are mutually exclusive".to_string()));
    }
    if cli.dry && cli.export {
        return Err(CreatorError::CliMisuse("-d/--dry and -e/--export are mutually exclusive".to_string()));
    }

    let seed_pairs = [
        ("OS".to_string(), std::env::consts::OS.to_string()),
        ("ARCH".to_string(), std::env::consts::ARCH.to_string()),
    ];
    let search_path = build_search_path(cli);
    let workspace = Workspace::new(search_path, seed_pairs);

    load_profile(&workspace, host)?;
    apply_cli_macros(&workspace, cli);

    let main_id = match &cli.unit {
        Some(id) => id.clone(),
        None => sole_unit_in(Utf8Path::new("."))?,
    };
    load_unit(&workspace, host, &main_id)?;
    workspace.setup_all()?;

    if cli.dry {
        return Ok(Outcome::success());
    }

    let default_targets: Vec<String> = cli
        .targets
        .iter()
        .map(|t| if t.contains(':') { t.clone() } else { format!("{main_id}:{t}") })
        .collect();

    let buildable_defaults: Vec<String> = default_targets
        .iter()
        .filter(|t| workspace.resolve_target(t, &main_id).is_ok())
        .cloned()
        .collect();

    let manifest = ninja_gen::emit(&workspace, &buildable_defaults)?;

    let output_path = cli
        .output
        .clone()
        .unwrap_or_else(|| default_manifest_path(&workspace, &main_id));

    if cli.no_export {
        return run_tasks(&workspace, &main_id, &default_targets);
    }

    std::fs::write(output_path.as_std_path(), &manifest)
        .map_err(|source| CreatorError::UnitIo { path: output_path.clone().into_std_path_buf(), source })?;

    if cli.export {
        warn_on_task_arguments(&workspace, &main_id, &default_targets);
        return Ok(Outcome { manifest_written: Some(output_path), ninja_invoked: false, exit_code: 0 });
    }

    let code = run_ninja(&manifest, cli, &cli.targets)?;
    Ok(Outcome { manifest_written: Some(output_path), ninja_invoked: true, exit_code: code })
}

/// Default manifest path when `-o/--output` is absent: the main unit's
/// `$self:NinjaOut` macro, falling back to `build.ninja` when the unit is
/// missing or the macro is unset (§6.1).
fn default_manifest_path(workspace: &Workspace, main_id: &str) -> Utf8PathBuf {
    let fallback = || Utf8PathBuf::from("build.ninja");
    let Some(unit) = workspace.get_unit(main_id) else {
        return fallback();
    };
    let stack = StackFrameContext::new();
    match unit.borrow().eval_with_stack("$self:NinjaOut", &stack) {
        Ok(value) if !value.is_empty() => Utf8PathBuf::from(value),
        _ => fallback(),
    }
}

/// `-e/--export` only writes the manifest; a task target passed on the
/// command line would never run, so warn about each one rather than
/// silently ignoring it (§6.1).
fn warn_on_task_arguments(workspace: &Workspace, main_id: &str, targets: &[String]) {
    for target_ref in targets {
        let (unit_id, name) = target_ref
            .split_once(':')
            .map_or((main_id.to_string(), target_ref.clone()), |(u, n)| (u.to_string(), n.to_string()));
        let Some(unit) = workspace.get_unit(&unit_id) else { continue };
        let is_task = matches!(unit.borrow().targets.get(&name), Some(Member::Task(_)));
        if is_task {
            warn!(target = %target_ref, "-e/--export only writes the manifest; this task will not run");
        }
    }
}

/// Invoke bare tasks directly (no Ninja), used under `-n/--no-export` for
/// targets that resolve to [`Member::Task`]s rather than buildable targets.
fn run_tasks(workspace: &Workspace, main_id: &str, targets: &[String]) -> CreatorResult<Outcome> {
    for target_ref in targets {
        let (unit_id, name) = target_ref
            .split_once(':')
            .map_or((main_id.to_string(), target_ref.clone()), |(u, n)| (u.to_string(), n.to_string()));
        let Some(unit) = workspace.get_unit(&unit_id) else {
            return Err(CreatorError::UnitNotFound(target_ref.clone()));
        };
        let task = {
            let unit_ref = unit.borrow();
            match unit_ref.targets.get(&name) {
                Some(Member::Task(task)) => std::rc::Rc::clone(task),
                Some(Member::Target(_)) => {
                    return Err(CreatorError::UnitNotFound(format!(
                        "`{target_ref}` is a target, not a task; pass it to Ninja instead"
                    )));
                }
                None => return Err(CreatorError::UnitNotFound(target_ref.clone())),
            }
        };
        task.run()?;
    }
    Ok(Outcome::success())
}
