use std::ffi::OsString;
use std::fs;
use std::path::Path;

use tempfile::tempdir;
use ticklist_core::{Status, datastore::FileTodoService};

fn run_in(dir: &Path, args: &[&str]) -> anyhow::Result<()> {
    let rc = dir.join("ticklistrc");
    if !rc.exists() {
        fs::write(&rc, "color=off\n").expect("write rc");
    }

    let mut argv: Vec<OsString> = vec![
        "ticklist".into(),
        "--todorc".into(),
        rc.into_os_string(),
        "--data".into(),
        dir.join("data").into_os_string(),
    ];
    argv.extend(args.iter().map(OsString::from));
    ticklist_core::run(argv)
}

#[test]
fn add_toggle_delete_through_the_cli() {
    let temp = tempdir().expect("tempdir");

    run_in(temp.path(), &["add", "Buy", "milk"]).expect("add");
    run_in(temp.path(), &["add", "Call", "mom"]).expect("add");
    run_in(temp.path(), &["tog", "1"]).expect("toggle");
    run_in(temp.path(), &["list", "completed"]).expect("list");

    let store = FileTodoService::open(&temp.path().join("data")).expect("open datastore");
    let todos = store.load().expect("load");
    assert_eq!(todos.len(), 2);
    assert_eq!(todos[0].body, "Buy milk");
    assert_eq!(todos[0].status, Status::Completed);
    assert_eq!(todos[1].status, Status::Pending);

    run_in(temp.path(), &["delete", "1"]).expect("delete");
    let todos = store.load().expect("load");
    assert_eq!(todos.iter().map(|t| t.id).collect::<Vec<_>>(), vec![2]);
}

#[test]
fn unknown_ids_are_errors() {
    let temp = tempdir().expect("tempdir");
    run_in(temp.path(), &["add", "only"]).expect("add");

    let err = run_in(temp.path(), &["delete", "42"]).expect_err("missing id");
    assert!(format!("{err:#}").contains("todo 42 not found"));

    let err = run_in(temp.path(), &["toggle", "42"]).expect_err("missing id");
    assert!(format!("{err:#}").contains("todo 42 not found"));

    assert!(run_in(temp.path(), &["list", "someday"]).is_err());
}
