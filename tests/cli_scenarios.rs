//! End-to-end CLI tests built from §8's literal scenarios, exercised
//! against the `amorph` binary via `assert_cmd`.

use assert_cmd::Command;
use predicates::prelude::*;
use predicates::str::contains;
use serde_json::{json, Value};
use std::fs;

fn write_temp(name: &str, value: &Value) -> std::path::PathBuf {
    let path = std::env::temp_dir().join(format!("amorph-test-{}-{}", std::process::id(), name));
    fs::write(&path, serde_json::to_string_pretty(value).unwrap()).unwrap();
    path
}

#[test]
fn run_arithmetic_and_function_prints_six() {
    let program = write_temp(
        "arith.json",
        &json!([
            {"let": {"name": "x", "value": {"add": [1, 2]}}},
            {"def": {"name": "double", "params": ["n"], "body": [
                {"return": {"mul": [{"var": "n"}, 2]}}
            ]}},
            {"let": {"name": "y", "value": {"call": {"name": "double", "args": [{"var": "x"}]}}}},
            {"print": [{"var": "y"}]}
        ]),
    );
    Command::cargo_bin("amorph")
        .unwrap()
        .arg("run")
        .arg(&program)
        .assert()
        .success()
        .stdout("6\n");
    let _ = fs::remove_file(&program);
}

#[test]
fn run_recursive_factorial_prints_one_twenty() {
    let program = write_temp(
        "factorial.json",
        &json!([
            {"def": {"name": "fact", "id": "fn_fact", "params": ["n"], "body": [
                {"if": {
                    "cond": {"le": [{"var": "n"}, 1]},
                    "then": [{"return": 1}],
                    "else": [{"return": {"mul": [{"var": "n"}, {"call": {"id": "fn_fact", "args": [{"sub": [{"var": "n"}, 1]}]}}]}}]
                }}
            ]}},
            {"print": [{"call": {"id": "fn_fact", "args": [5]}}]}
        ]),
    );
    Command::cargo_bin("amorph")
        .unwrap()
        .arg("run")
        .arg(&program)
        .assert()
        .success()
        .stdout("120\n");
    let _ = fs::remove_file(&program);
}

#[test]
fn validate_reports_type_mismatch() {
    let program = write_temp("type_mismatch.json", &json!([{"let": {"name": "x", "value": {"add": [1, "text"]}}}]));
    let output = Command::cargo_bin("amorph")
        .unwrap()
        .arg("validate")
        .arg(&program)
        .arg("--check-types")
        .arg("--json")
        .assert()
        .failure()
        .get_output()
        .stdout
        .clone();
    let report: Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(report["ok"], json!(false));
    let issues = report["issues"].as_array().unwrap();
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0]["code"], "E_TYPE_MISMATCH");
    assert_eq!(issues[0]["path"], "/$[0]/let/value");
    let _ = fs::remove_file(&program);
}

#[test]
fn validate_reports_undefined_variable() {
    let program = write_temp("undefined_var.json", &json!([{"let": {"name": "y", "value": {"var": "undefined"}}}]));
    let output = Command::cargo_bin("amorph")
        .unwrap()
        .arg("validate")
        .arg(&program)
        .arg("--check-scopes")
        .arg("--json")
        .assert()
        .failure()
        .get_output()
        .stdout
        .clone();
    let report: Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(report["ok"], json!(false));
    let issues = report["issues"].as_array().unwrap();
    assert!(issues.iter().any(|i| i["code"] == "E_UNDEFINED_VAR" && i["path"] == "/$[0]/let/value"));
    let _ = fs::remove_file(&program);
}

#[test]
fn rename_variable_then_re_rename_yields_zero_references() {
    let program_path = write_temp(
        "rename.json",
        &json!([
            {"let": {"name": "x", "value": 10}},
            {"let": {"name": "y", "value": {"mul": [{"var": "x"}, 2]}}},
            {"print": [{"var": "x"}]}
        ]),
    );
    let edits_path = write_temp("rename_edits.json", &json!([{"op": "rename_variable", "old_name": "x", "new_name": "count", "scope": "all"}]));

    let first = Command::cargo_bin("amorph")
        .unwrap()
        .arg("edit")
        .arg(&program_path)
        .arg(&edits_path)
        .assert()
        .success()
        .stdout(contains("3 reference(s) renamed from 'x' to 'count'"))
        .get_output()
        .stdout
        .clone();

    // The batch's report line is on stdout before the rewritten program;
    // split it off and persist only the program text for the second pass.
    let first_text = String::from_utf8(first).unwrap();
    let program_text = first_text.splitn(2, '\n').nth(1).unwrap();
    let rewritten_path = std::env::temp_dir().join(format!("amorph-test-rename-rewritten-{}.json", std::process::id()));
    fs::write(&rewritten_path, program_text).unwrap();

    // Renaming `x` again in the already-renamed program finds nothing left.
    Command::cargo_bin("amorph")
        .unwrap()
        .arg("edit")
        .arg(&rewritten_path)
        .arg(&edits_path)
        .assert()
        .success()
        .stdout(contains("0 reference(s) renamed from 'x' to 'count'"));

    let _ = fs::remove_file(&program_path);
    let _ = fs::remove_file(&edits_path);
    let _ = fs::remove_file(&rewritten_path);
}

#[test]
fn rewrite_arithmetic_identity_collapses_add_zero() {
    let program_path = write_temp("rewrite.json", &json!([{"let": {"name": "a", "value": {"add": [{"var": "v"}, 0]}}}]));
    let rules_path = write_temp("rewrite_rules.json", &json!([{"match": {"add": ["$x", 0]}, "replace": "$x"}]));

    Command::cargo_bin("amorph")
        .unwrap()
        .arg("rewrite")
        .arg(&program_path)
        .arg(&rules_path)
        .assert()
        .success()
        .stdout(contains("\"var\": \"v\""));

    let _ = fs::remove_file(&program_path);
    let _ = fs::remove_file(&rules_path);
}

#[test]
fn edit_atomicity_leaves_program_unchanged_on_first_failure() {
    let program_path = write_temp("atomic.json", &json!([{"let": {"name": "x", "value": 1}}]));
    let original = fs::read_to_string(&program_path).unwrap();
    let edits_path = write_temp(
        "atomic_edits.json",
        &json!([
            {"op": "rename_variable", "old_name": "x", "new_name": "count", "scope": "all"},
            {"op": "delete_node", "target": "does-not-exist"}
        ]),
    );

    Command::cargo_bin("amorph")
        .unwrap()
        .arg("edit")
        .arg(&program_path)
        .arg(&edits_path)
        .assert()
        .failure()
        .code(1)
        // apply_edits reports nothing until the whole batch succeeds, so a
        // failing second op means the first op's report never reaches stdout.
        .stdout("");

    // No `--in-place` flag exists for `edit` — the CLI only ever prints the
    // result — so the source file on disk is untouched regardless.
    assert_eq!(fs::read_to_string(&program_path).unwrap(), original);

    let _ = fs::remove_file(&program_path);
    let _ = fs::remove_file(&edits_path);
}

#[test]
fn rewrite_respects_replacement_limit() {
    let program_path = write_temp(
        "limit.json",
        &json!([
            {"let": {"name": "a", "value": {"add": [{"add": [{"var": "v"}, 0]}, 0]}}},
        ]),
    );
    let rules_path = write_temp("limit_rules.json", &json!([{"match": {"add": ["$x", 0]}, "replace": "$x"}]));

    Command::cargo_bin("amorph")
        .unwrap()
        .arg("rewrite")
        .arg(&program_path)
        .arg(&rules_path)
        .arg("--limit")
        .arg("1")
        .assert()
        .success()
        .stdout(contains("1 replacement(s)"));

    let _ = fs::remove_file(&program_path);
    let _ = fs::remove_file(&rules_path);
}

#[test]
fn fmt_output_round_trips_through_canonicalize() {
    let program_path = write_temp("fmt.json", &json!([{"print": [1, 2]}]));
    let first = Command::cargo_bin("amorph").unwrap().arg("fmt").arg(&program_path).assert().success().get_output().stdout.clone();
    fs::write(&program_path, &first).unwrap();
    let second = Command::cargo_bin("amorph").unwrap().arg("fmt").arg(&program_path).assert().success().get_output().stdout.clone();
    assert_eq!(first, second);
    let _ = fs::remove_file(&program_path);
}

#[test]
fn suggest_flags_missing_ids() {
    let program_path = write_temp("suggest.json", &json!([{"def": {"name": "f", "params": [], "body": [{"return": 1}]}}]));
    Command::cargo_bin("amorph")
        .unwrap()
        .arg("suggest")
        .arg(&program_path)
        .assert()
        .success()
        .stdout(contains("S_MISSING_ID"));
    let _ = fs::remove_file(&program_path);
}
