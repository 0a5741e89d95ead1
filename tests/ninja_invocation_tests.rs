//! End-to-end coverage of the `dispatch` → Ninja hand-off (§5, §6.1): the
//! external Ninja process's own exit status becomes the dispatcher's return
//! code, exercised here against a fake `ninja` executable rather than a real
//! build.

mod common;

use std::rc::Rc;

use camino::Utf8PathBuf;
use clap::Parser as _;
use common::LineScriptHost;
use creator::cli::Cli;
use creator::{dispatch, ninja_gen};
use creator::unit::Workspace;
use serial_test::serial;
use test_support::UnitFixture;

#[test]
#[serial(creator_ninja_env)]
fn ninja_exit_status_propagates_through_run_ninja() {
    let fixture = UnitFixture::new();
    fixture.write(
        "app",
        "target build\n\
         build a.c a.o cc -c $< -o $@\n\
         endtarget\n",
    );

    let search_path = vec![Utf8PathBuf::from_path_buf(fixture.path().to_path_buf()).expect("utf8 path")];
    let workspace = Rc::new(Workspace::new(search_path, std::iter::empty()));
    let host = LineScriptHost::new(Rc::clone(&workspace));
    dispatch::load_unit(&workspace, &host, "app").expect("app loads");
    workspace.setup_all().expect("setup_all succeeds");
    let manifest = ninja_gen::emit(&workspace, &["app:build".to_string()]).expect("manifest emits");

    let (_ninja_dir, ninja_path) = test_support::ninja::fake_ninja(7);
    let _guard = test_support::env::override_ninja_env(&ninja_path);

    let cli = Cli::parse_from(["creator", "app:build"]);
    let code = dispatch::run_ninja(&manifest, &cli, &cli.targets).expect("run_ninja should spawn the fake executable");
    assert_eq!(code, 7, "the fake ninja's exit code must propagate unchanged");
}
