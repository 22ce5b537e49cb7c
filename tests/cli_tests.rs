// Command-line behaviour of the `lexmacro` binary.
// Requires: assert_cmd, predicates crates in [dev-dependencies]

mod common;

use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use predicates::str::contains;

use common::fixture_dir;

fn lexmacro() -> Command {
    Command::cargo_bin("lexmacro").unwrap()
}

fn fixture(dir: &str, file: &str) -> String {
    fixture_dir(dir).join(file).display().to_string()
}

#[test]
fn expand_prints_the_expanded_stream() {
    lexmacro()
        .arg("expand")
        .arg(fixture("load_ok", "simple_macros.lua"))
        .assert()
        .success()
        .stdout(contains("local r = 2 * 3.14159").and(contains("macro PI").not()));
}

#[test]
fn files_share_one_session() {
    let dir = std::env::temp_dir().join(format!("lexmacro-cli-{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    let defs = dir.join("defs.lua");
    let user = dir.join("user.lua");
    fs::write(&defs, "macro ANSWER \"42\"\n").unwrap();
    fs::write(&user, "print(ANSWER)\n").unwrap();

    lexmacro()
        .arg("expand")
        .arg(&defs)
        .arg(&user)
        .assert()
        .success()
        .stdout(contains("print(42)"));

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn tokens_lists_lines_and_tokens() {
    lexmacro()
        .arg("tokens")
        .arg(fixture("load_ok", "simple_macros.lua"))
        .assert()
        .success()
        .stdout(contains("<number> 3.14159").and(contains("    4  local")));
}

#[test]
fn trace_as_json() {
    let output = lexmacro()
        .args(["trace", "--json"])
        .arg(fixture("load_ok", "function_macros.lua"))
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let trace: serde_json::Value = serde_json::from_slice(&output).unwrap();
    let steps = trace.as_array().unwrap();
    assert_eq!(steps.len(), 2);
    assert_eq!(steps[0]["name"], "SQUARE");
    assert_eq!(steps[0]["kind"], "function");
    assert_eq!(steps[0]["args"][0], "n + 1");
}

#[test]
fn diff_shows_changed_lines() {
    lexmacro()
        .arg("diff")
        .arg(fixture("load_ok", "simple_macros.lua"))
        .assert()
        .success()
        .stdout(contains("-local r = TWICE PI").and(contains("+local r = 2 * 3.14159")));
}

#[test]
fn macros_lists_names_and_kinds() {
    lexmacro()
        .arg("macros")
        .arg(fixture("load_ok", "reader_macros.lua"))
        .arg(fixture("load_ok", "function_macros.lua"))
        .assert()
        .success()
        .stdout(contains("reader   LIST").and(contains("function SQUARE")));
}

#[test]
fn check_passes_on_good_scripts() {
    lexmacro()
        .arg("check")
        .arg(fixture_dir("load_ok"))
        .assert()
        .success()
        .stdout(contains("PASS").and(contains("0 failed")));
}

#[test]
fn check_fails_on_bad_scripts() {
    lexmacro()
        .arg("check")
        .arg(fixture_dir("load_err"))
        .assert()
        .failure()
        .stdout(contains("FAIL").and(contains("Stream error at line")));
}

#[test]
fn errors_are_rendered_as_diagnostics() {
    lexmacro()
        .arg("expand")
        .arg(fixture("load_err", "missing_paren.lua"))
        .assert()
        .failure()
        .stderr(contains("expected '(' to start argument list").and(contains("Definition error")));
}

#[test]
fn limits_can_be_overridden() {
    lexmacro()
        .args(["--replacement-capacity", "4", "expand"])
        .arg(fixture("load_ok", "simple_macros.lua"))
        .assert()
        .failure()
        .stderr(contains("overflows replacement buffer"));

    let dir = std::env::temp_dir().join(format!("lexmacro-cfg-{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    let config = dir.join("limits.yaml");
    fs::write(&config, "replacement_capacity: 4\n").unwrap();
    lexmacro()
        .arg("--config")
        .arg(&config)
        .arg("expand")
        .arg(fixture("load_ok", "simple_macros.lua"))
        .assert()
        .failure()
        .stderr(contains("overflows replacement buffer"));
    let _ = fs::remove_dir_all(&dir);
}
