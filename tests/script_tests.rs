// Script fixtures: every file under tests/scripts/load_ok must expand and run, and its
// printed output must match the sibling `.expected` file when there is one. Every file
// under tests/scripts/load_err must fail.

mod common;

use std::fs;

use common::{fixture_dir, run_output, scripts};

fn normalize(text: &str) -> String {
    text.replace("\r\n", "\n").trim_end().to_string()
}

#[test]
fn load_ok_scripts_run() {
    let files = scripts(&fixture_dir("load_ok"));
    assert!(!files.is_empty(), "no scripts in tests/scripts/load_ok");

    let mut failures = Vec::new();
    for file in &files {
        let source = fs::read_to_string(file).unwrap();
        match run_output(&source) {
            Err(e) => failures.push(format!("{}: {}", file.display(), e.located())),
            Ok(output) => {
                let expected = file.with_extension("expected");
                if let Ok(expected) = fs::read_to_string(&expected) {
                    if normalize(&output) != normalize(&expected) {
                        failures.push(format!(
                            "{}: output mismatch\n--- expected\n{}\n--- actual\n{}",
                            file.display(),
                            expected,
                            output
                        ));
                    }
                }
            }
        }
    }
    assert!(failures.is_empty(), "{}", failures.join("\n\n"));
}

#[test]
fn load_err_scripts_fail() {
    let files = scripts(&fixture_dir("load_err"));
    assert!(!files.is_empty(), "no scripts in tests/scripts/load_err");

    let unexpected: Vec<String> = files
        .iter()
        .filter(|file| run_output(&fs::read_to_string(file).unwrap()).is_ok())
        .map(|file| file.display().to_string())
        .collect();
    assert!(unexpected.is_empty(), "these scripts should fail: {:?}", unexpected);
}
