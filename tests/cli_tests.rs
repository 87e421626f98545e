use assert_cmd::Command;
use predicates::prelude::*;

fn cmd() -> Command {
    #[allow(deprecated)]
    Command::cargo_bin("cclint").unwrap()
}

#[test]
fn clean_exits_0() {
    cmd()
        .args(["check", "tests/fixtures/clean", "--quiet"])
        .assert()
        .success();
}

#[test]
fn errors_exit_1() {
    cmd()
        .args(["check", "tests/fixtures/errors", "--quiet"])
        .assert()
        .failure()
        .code(1);
}

#[test]
fn single_file_can_be_checked() {
    cmd()
        .args(["check", "tests/fixtures/errors/bad.c", "--quiet"])
        .assert()
        .failure()
        .code(1);
}

#[test]
fn empty_directory_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    cmd()
        .args(["check", dir.path().to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No C/C++ source files found"));
}

#[test]
fn progress_goes_to_stderr() {
    cmd()
        .args(["check", "tests/fixtures/clean"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Checking "));
}

#[test]
fn quiet_silences_progress() {
    cmd()
        .args(["check", "tests/fixtures/clean", "--quiet"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Checking ").not());
}

#[test]
fn json_output_is_valid() {
    let output = cmd()
        .args(["check", "tests/fixtures/errors", "--quiet", "--format", "json"])
        .output()
        .unwrap();

    let stdout = String::from_utf8(output.stdout).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&stdout).unwrap();

    // bad.c has a division by zero and a null pointer dereference.
    assert_eq!(parsed["summary"]["errors"].as_u64().unwrap(), 2);
    let diagnostics = parsed["diagnostics"].as_array().unwrap();
    assert_eq!(diagnostics.len(), 2);
    let ids: Vec<&str> = diagnostics
        .iter()
        .map(|d| d["id"].as_str().unwrap())
        .collect();
    assert!(ids.contains(&"zerodiv"));
    assert!(ids.contains(&"nullPointer"));
}

#[test]
fn xml_output_has_versioned_envelope() {
    cmd()
        .args([
            "check",
            "tests/fixtures/errors",
            "--quiet",
            "--format",
            "xml",
            "--xml-version",
            "2",
        ])
        .assert()
        .failure()
        .stdout(predicate::str::contains("<results version=\"2\">"))
        .stdout(predicate::str::contains("id=\"zerodiv\""))
        .stdout(predicate::str::contains("</results>"));
}

#[test]
fn template_output_formats_lines() {
    cmd()
        .args([
            "check",
            "tests/fixtures/errors",
            "--quiet",
            "--template",
            "{file}:{line},{severity},{id},{message}",
        ])
        .assert()
        .failure()
        .stdout(predicate::str::contains(",error,zerodiv,Division by zero"));
}

#[test]
fn suppressed_errors_exit_0() {
    cmd()
        .args([
            "check",
            "tests/fixtures/errors",
            "--quiet",
            "--suppress",
            "zerodiv",
            "--suppress",
            "nullPointer",
        ])
        .assert()
        .success();
}

#[test]
fn suppression_is_location_precise() {
    // bad.c line 3 is the division; suppressing a different line changes
    // nothing and the run still fails.
    cmd()
        .args([
            "check",
            "tests/fixtures/errors",
            "--quiet",
            "--suppress",
            "zerodiv:*bad.c:99",
            "--suppress",
            "nullPointer",
        ])
        .assert()
        .failure()
        .stdout(predicate::str::contains("zerodiv"))
        .stdout(predicate::str::contains("unmatchedSuppression"));
}

#[test]
fn unmatched_suppression_reported_but_not_fatal() {
    cmd()
        .args([
            "check",
            "tests/fixtures/clean",
            "--quiet",
            "--suppress",
            "zerodiv:nosuch.c:1",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Unmatched suppression: zerodiv"));
}

#[test]
fn conditional_code_is_checked_in_every_configuration() {
    // The division by zero only exists in the BAD configuration.
    cmd()
        .args(["check", "tests/fixtures/configs", "--quiet"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("zerodiv"));
}

#[test]
fn user_defines_pin_the_configuration() {
    cmd()
        .args(["check", "tests/fixtures/configs", "--quiet", "-D", "GOOD"])
        .assert()
        .success();
}

#[test]
fn style_checks_are_opt_in() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("style.c"),
        "int main(void) { gets(buf); return 0; }\n",
    )
    .unwrap();

    cmd()
        .args(["check", dir.path().to_str().unwrap(), "--quiet"])
        .assert()
        .success();

    cmd()
        .args([
            "check",
            dir.path().to_str().unwrap(),
            "--quiet",
            "--enable",
            "style",
        ])
        .assert()
        .failure()
        .stdout(predicate::str::contains("obsoleteFunctionsgets"));
}

#[test]
fn unused_functions_reported_across_files() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("lib.c"), "void orphan(void) { }\n").unwrap();
    std::fs::write(dir.path().join("main.c"), "int main(void) { return 0; }\n").unwrap();

    cmd()
        .args([
            "check",
            dir.path().to_str().unwrap(),
            "--quiet",
            "--enable",
            "unusedFunctions",
        ])
        .assert()
        .failure()
        .stdout(predicate::str::contains("unusedFunction"))
        .stdout(predicate::str::contains("'orphan'"));
}

#[test]
fn jobs_flag_checks_all_files() {
    let output = cmd()
        .args([
            "check",
            "tests/fixtures/errors",
            "--quiet",
            "--jobs",
            "4",
            "--format",
            "json",
        ])
        .output()
        .unwrap();
    let stdout = String::from_utf8(output.stdout).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(parsed["summary"]["errors"].as_u64().unwrap(), 2);
}

#[test]
fn errorlist_prints_samples() {
    cmd()
        .args(["errorlist"])
        .assert()
        .success()
        .stdout(predicate::str::contains("id=\"zerodiv\""))
        .stdout(predicate::str::contains("id=\"nullPointer\""))
        .stdout(predicate::str::contains("id=\"unusedFunction\""))
        .stdout(predicate::str::contains("id=\"obsoleteFunctionsgets\""));
}

#[test]
fn init_creates_config() {
    let dir = tempfile::tempdir().unwrap();
    cmd()
        .current_dir(dir.path())
        .args(["init"])
        .assert()
        .success();
    assert!(dir.path().join(".cclintrc.toml").exists());

    // Running again refuses to overwrite.
    cmd()
        .current_dir(dir.path())
        .args(["init"])
        .assert()
        .failure();
}

#[test]
fn config_file_is_honored() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("style.c"),
        "int main(void) { gets(buf); return 0; }\n",
    )
    .unwrap();
    std::fs::write(dir.path().join(".cclintrc.toml"), "enabled = [\"style\"]\n").unwrap();

    cmd()
        .args(["check", dir.path().to_str().unwrap(), "--quiet"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("obsoleteFunctionsgets"));
}
