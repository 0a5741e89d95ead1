//! End-to-end tests driving unit loading, target setup, and Ninja manifest
//! emission together through a real [`creator::dispatch::load_unit`] call,
//! rather than exercising `ninja_gen`/`target` in isolation as the unit
//! tests elsewhere in this crate do.

mod common;

use std::rc::Rc;

use camino::Utf8PathBuf;
use common::LineScriptHost;
use creator::dispatch;
use creator::ninja_gen;
use creator::unit::Workspace;
use tempfile::tempdir;

#[test]
fn dependent_targets_emit_a_deterministic_manifest() {
    let dir = tempdir().expect("temp dir");
    std::fs::write(
        dir.path().join("lib.crunit"),
        "target compile\n\
         build src/lib.c lib.o cc -c $< -o $@\n\
         endtarget\n",
    )
    .expect("write lib.crunit");
    std::fs::write(
        dir.path().join("app.crunit"),
        "define CC cc\n\
         extends lib\n\
         target link\n\
         requires lib:compile\n\
         build lib.o app $CC $< -o $@\n\
         endtarget\n",
    )
    .expect("write app.crunit");

    let search_path = vec![Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf8 path")];
    let workspace = Rc::new(Workspace::new(search_path, std::iter::empty()));
    let host = LineScriptHost::new(Rc::clone(&workspace));

    dispatch::load_unit(&workspace, &host, "app").expect("app loads");
    workspace.setup_all().expect("setup_all succeeds");

    let manifest = ninja_gen::emit(&workspace, &["app:link".to_string()]).expect("manifest emits");

    assert!(manifest.contains("lib.o"), "manifest should reference the dependency output:\n{manifest}");
    assert!(manifest.contains("cc -c src/lib.c -o lib.o"), "compile command should be substituted:\n{manifest}");
    assert!(manifest.contains("cc lib.o -o app"), "link command should be substituted:\n{manifest}");
    assert!(manifest.contains("default "), "a default directive should be emitted:\n{manifest}");

    let second = ninja_gen::emit(&workspace, &["app:link".to_string()]).expect("manifest emits again");
    assert_eq!(manifest, second, "emission must be deterministic across calls");
}

#[test]
fn missing_dependency_is_reported_as_unit_not_found() {
    let dir = tempdir().expect("temp dir");
    std::fs::write(
        dir.path().join("app.crunit"),
        "target link\n\
         requires nope:compile\n\
         endtarget\n",
    )
    .expect("write app.crunit");

    let search_path = vec![Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf8 path")];
    let workspace = Rc::new(Workspace::new(search_path, std::iter::empty()));
    let host = LineScriptHost::new(Rc::clone(&workspace));

    dispatch::load_unit(&workspace, &host, "app").expect("app loads");
    let err = workspace.setup_all().expect_err("missing dependency should fail setup");
    assert!(matches!(err, creator::error::CreatorError::UnitNotFound(_)));
}
