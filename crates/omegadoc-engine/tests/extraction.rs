use std::fs;
use std::path::Path;

use omegadoc_engine::io::{FsPlacer, OnExisting, WalkFinder};
use omegadoc_engine::postprocess::Pipeline;
use omegadoc_engine::scanner::{BEGIN_MARKER, IGNORE_MARKER};
use omegadoc_engine::Controller;
use pretty_assertions::assert_eq;
use tempfile::TempDir;

fn write(dir: &Path, relative: &str, content: &str) {
    let path = dir.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn source_tree() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "service/main.go",
        &format!(
            "package main\n\n/*\n{BEGIN_MARKER}END service/overview.md\n# Service\n\nSee [the API](service/api.md).\nEND\n*/\nfunc main() {{}}\n"
        ),
    );
    write(
        dir.path(),
        "service/api/handlers.py",
        &format!("# {BEGIN_MARKER}DOC service/api.md\n# API\nDOC\n"),
    );
    write(
        dir.path(),
        "docs/generator.sh",
        &format!("# {IGNORE_MARKER}\necho \"{BEGIN_MARKER}X skipped.md\"\n"),
    );
    write(dir.path(), "README", "nothing here\n");
    dir
}

fn controller(on_existing: OnExisting) -> Controller {
    Controller::new(
        Box::new(WalkFinder::new()),
        Pipeline::standard(),
        Box::new(FsPlacer::new(on_existing)),
    )
}

#[test]
fn test_extracts_tree_from_disk() {
    let input = source_tree();
    let output = tempfile::tempdir().unwrap();

    let report = controller(OnExisting::DoNotOverwrite)
        .generate_tree(input.path(), output.path())
        .unwrap();

    assert!(report.is_success());
    assert_eq!(report.streams, 3);
    assert_eq!(report.extracted, 2);
    assert_eq!(report.placed.len(), 3);

    assert_eq!(
        fs::read_to_string(output.path().join("service/overview.md")).unwrap(),
        "# Service\n\nSee [the API](api.html).\n"
    );
    assert_eq!(
        fs::read_to_string(output.path().join("service/api.md")).unwrap(),
        "# API\n"
    );
    assert_eq!(
        fs::read_to_string(output.path().join("index.md")).unwrap(),
        "\n# Sitemap\n\n- [service/](service/)\n\t- [api.md](service/api.html)\n\t- [overview.md](service/overview.html)\n\n"
    );
    assert!(!output.path().join("skipped.md").exists());
}

#[test]
fn test_second_run_respects_policy() {
    let input = source_tree();
    let output = tempfile::tempdir().unwrap();
    controller(OnExisting::DoNotOverwrite)
        .generate_tree(input.path(), output.path())
        .unwrap();

    let refused = controller(OnExisting::DoNotOverwrite)
        .generate_tree(input.path(), output.path())
        .unwrap();
    let ignored = controller(OnExisting::Ignore)
        .generate_tree(input.path(), output.path())
        .unwrap();
    let replaced = controller(OnExisting::YesOverwrite)
        .generate_tree(input.path(), output.path())
        .unwrap();

    assert_eq!(refused.placement_failures.len(), 3);
    assert!(ignored.is_success());
    assert_eq!(ignored.skipped.len(), 3);
    assert!(replaced.is_success());
    assert_eq!(replaced.placed.len(), 3);
}
