//! CLI integration tests for buildinit
//!
//! Each test lays out a small multi-project build in a temporary directory
//! and runs the binary against it.

use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Get a command instance for the buildinit binary, isolated from the
/// user's configuration
fn buildinit_cmd(dir: &Path) -> assert_cmd::Command {
    let mut cmd = assert_cmd::Command::new(assert_cmd::cargo::cargo_bin!("buildinit"));
    cmd.current_dir(dir)
        .env("BUILDINIT_CONFIG", dir.join("no-such-config.toml"))
        .env("BUILDINIT_HOME", dir)
        .env_remove("RUST_LOG");
    cmd
}

/// A build with projects `:`, `:app`, `:libs` and `:libs:core`
fn setup_build() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("settings.toml"),
        "root_project_name = \"shop\"\ninclude = [\"app\", \"libs:core\"]\n",
    )
    .unwrap();
    for sub in ["app", "libs/core"] {
        fs::create_dir_all(dir.path().join(sub)).unwrap();
    }
    dir
}

// =============================================================================
// projects
// =============================================================================

#[test]
fn test_projects_lists_tree() {
    let dir = setup_build();

    buildinit_cmd(dir.path())
        .arg("projects")
        .assert()
        .success()
        .stdout(predicate::str::contains("Root project 'shop'"))
        .stdout(predicate::str::contains("+--- Project ':app'"))
        .stdout(predicate::str::contains("\\--- Project ':libs'"))
        .stdout(predicate::str::contains("     \\--- Project ':libs:core'"))
        .stdout(predicate::str::contains("Default project: :"));
}

#[test]
fn test_projects_json() {
    let dir = setup_build();

    let output = buildinit_cmd(dir.path())
        .args(["projects", "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["build_path"], ":");
    assert_eq!(json["root"]["name"], "shop");
    let children: Vec<&str> = json["root"]["children"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["path"].as_str().unwrap())
        .collect();
    assert_eq!(children, vec![":app", ":libs"]);
}

#[test]
fn test_default_project_follows_current_dir() {
    let dir = setup_build();

    buildinit_cmd(&dir.path().join("libs/core"))
        .arg("projects")
        .assert()
        .success()
        .stdout(predicate::str::contains("Default project: :libs:core"));
}

#[test]
fn test_project_dir_flag_selects_project() {
    let dir = setup_build();

    buildinit_cmd(dir.path())
        .args(["-p", "app", "projects"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Default project: :app"));
}

#[test]
fn test_included_build_is_listed() {
    let dir = setup_build();
    let outer = TempDir::new().unwrap();
    let plugins = outer.path().join("plugins");
    fs::create_dir_all(plugins.join("lint")).unwrap();
    fs::write(plugins.join("settings.toml"), "include = [\"lint\"]\n").unwrap();

    buildinit_cmd(dir.path())
        .arg("projects")
        .arg("--include-build")
        .arg(&plugins)
        .assert()
        .success()
        .stdout(predicate::str::contains("Included build ':plugins'"))
        .stdout(predicate::str::contains("\\--- Project ':lint'"));
}

// =============================================================================
// settings
// =============================================================================

#[test]
fn test_settings_shows_location_and_properties() {
    let dir = setup_build();
    fs::write(dir.path().join("properties.toml"), "version = \"1.2\"\n").unwrap();

    buildinit_cmd(dir.path())
        .args(["settings", "-P", "channel=beta"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Root project:"))
        .stdout(predicate::str::contains("shop"))
        .stdout(predicate::str::contains("Projects:"))
        .stdout(predicate::str::contains("version = 1.2"))
        .stdout(predicate::str::contains("channel = beta"));
}

#[test]
fn test_settings_without_settings_file() {
    let dir = TempDir::new().unwrap();

    let output = buildinit_cmd(dir.path())
        .args(["--no-search-upward", "--format", "json", "settings"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert!(json["settings_file"].is_null());
    assert_eq!(json["projects"], 1);
    assert_eq!(json["default_project"], ":");
}

#[test]
fn test_missing_settings_file_fails() {
    let dir = setup_build();

    buildinit_cmd(dir.path())
        .args(["-c", "missing.toml", "settings"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error:"))
        .stderr(predicate::str::contains("missing.toml"));
}

#[test]
fn test_invalid_settings_script_fails() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("settings.toml"), "includes = [\"a\"]\n").unwrap();

    buildinit_cmd(dir.path())
        .arg("projects")
        .assert()
        .failure()
        .stderr(predicate::str::contains("settings.toml"));
}

// =============================================================================
// run
// =============================================================================

#[test]
fn test_run_schedules_tasks_for_all_projects() {
    let dir = setup_build();

    buildinit_cmd(dir.path())
        .args(["run", "build"])
        .assert()
        .success()
        .stdout(predicate::str::contains("> Task :build SKIPPED"))
        .stdout(predicate::str::contains("> Task :app:build SKIPPED"))
        .stdout(predicate::str::contains("> Task :libs:core:build SKIPPED"))
        .stdout(predicate::str::contains("BUILD SUCCESSFUL (4 task(s) scheduled)"));
}

#[test]
fn test_run_qualified_task() {
    let dir = setup_build();

    let output = buildinit_cmd(dir.path())
        .args(["--format", "json", "run", ":app:test"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["tasks"], serde_json::json!([":app:test"]));
    assert_eq!(json["from_cache"], false);
}

#[test]
fn test_run_unknown_project_fails() {
    let dir = setup_build();

    buildinit_cmd(dir.path())
        .args(["run", ":nope:build"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Project ':nope' not found in build ':'."));
}

#[test]
fn test_run_requires_tasks() {
    let dir = setup_build();

    buildinit_cmd(dir.path()).arg("run").assert().failure();
}

// =============================================================================
// configuration cache
// =============================================================================

#[test]
fn test_configuration_cache_is_reused() {
    let dir = setup_build();

    buildinit_cmd(dir.path())
        .args(["--configuration-cache", "run", "build"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Reusing configuration cache.").not());

    buildinit_cmd(dir.path())
        .args(["--configuration-cache", "run", "build"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Reusing configuration cache."))
        .stdout(predicate::str::contains("> Task :libs:core:build SKIPPED"));

    buildinit_cmd(dir.path())
        .args(["cache", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Entries:"))
        .stdout(predicate::str::contains("1"));

    buildinit_cmd(dir.path())
        .args(["cache", "clear"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed 1 configuration cache entries"));
}

#[test]
fn test_configuration_cache_option_from_properties() {
    let dir = setup_build();
    fs::write(
        dir.path().join("properties.toml"),
        "[buildinit]\nconfiguration-cache = true\n",
    )
    .unwrap();

    buildinit_cmd(dir.path()).args(["run", "build"]).assert().success();
    buildinit_cmd(dir.path())
        .args(["run", "build"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Reusing configuration cache."));
}

#[test]
fn test_invalid_build_option_fails() {
    let dir = setup_build();
    fs::write(dir.path().join("properties.toml"), "[buildinit]\noffline = \"maybe\"\n").unwrap();

    buildinit_cmd(dir.path())
        .arg("projects")
        .assert()
        .failure()
        .stderr(predicate::str::contains("buildinit.offline"));
}
