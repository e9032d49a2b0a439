//! End-to-end tests for the `glimpse` binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn project(doc: &str, config: &str) -> TempDir {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("glimpse.toml"), config).unwrap();
    fs::write(temp.path().join("doc.mdx"), doc).unwrap();
    temp
}

#[allow(deprecated)]
fn glimpse() -> Command {
    let mut cmd = Command::cargo_bin("glimpse").unwrap();
    cmd.env("NO_COLOR", "1")
        .env_remove("RUST_LOG")
        .env("XDG_CONFIG_HOME", "/nonexistent/glimpse-tests");
    cmd
}

#[test]
fn test_render_untrusted_prints_static_html() {
    let temp = project("# Hello\n\n<Chart />\n", "");
    glimpse()
        .args(["render", "doc.mdx"])
        .current_dir(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("<h1>Hello</h1>"))
        .stdout(predicate::str::contains("Chart").not());
}

#[test]
fn test_render_trusted_prints_module() {
    let temp = project("# Hello\n", "");
    glimpse()
        .args(["render", "doc.mdx", "--trust", "--scripts"])
        .current_dir(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("MDXContent"));
}

#[test]
fn test_render_json_emits_messages() {
    let temp = project("# Hello\n", "");
    glimpse()
        .args(["render", "doc.mdx", "--json"])
        .current_dir(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""type":"setTrustState""#))
        .stdout(predicate::str::contains(r#""type":"updatePreviewSafe""#));
}

#[test]
fn test_trusted_folder_in_user_config_grants_execution() {
    let temp = project("# Hello\n", "");
    let root = temp.path().canonicalize().unwrap();
    fs::create_dir_all(root.join("xdg/glimpse")).unwrap();
    fs::write(
        root.join("xdg/glimpse/config.toml"),
        format!("scriptsEnabled = true\ntrustedFolders = [{:?}]\n", root.display().to_string()),
    )
    .unwrap();
    glimpse()
        .args(["check", "doc.mdx"])
        .current_dir(&root)
        .env("XDG_CONFIG_HOME", root.join("xdg"))
        .assert()
        .success()
        .stdout(predicate::str::contains("can execute:     yes"));
}

#[test]
fn test_trusted_folder_in_project_config_is_ignored() {
    let temp = project("# Hello\n", "scriptsEnabled = true\ntrustedFolders = [\".\"]\n");
    glimpse()
        .args(["check", "doc.mdx"])
        .current_dir(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("can execute:     no"));
}

#[test]
fn test_check_reports_untrusted_workspace() {
    let temp = project("# Hello\n", "updateMode = \"manual\"\n");
    glimpse()
        .args(["check", "doc.mdx"])
        .current_dir(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("workspace not trusted"))
        .stdout(predicate::str::contains("update mode:     manual"));
}

#[test]
fn test_missing_document_fails() {
    let temp = TempDir::new().unwrap();
    glimpse()
        .args(["render", "nope.mdx"])
        .current_dir(temp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("File not found"));
}

#[test]
fn test_invalid_settings_fail() {
    let temp = project("# Hello\n", "debounceMs = \"soon\"\n");
    glimpse()
        .args(["check", "doc.mdx"])
        .current_dir(temp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid settings"));
}

#[test]
fn test_trusted_render_keeps_local_imports() {
    let temp = project("import x from './widget.js'\n\n# Hi\n", "");
    fs::write(temp.path().join("widget.js"), "export default 1;").unwrap();
    glimpse()
        .args(["render", "doc.mdx", "--trust", "--scripts"])
        .current_dir(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("./widget.js"));
}
