use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

#[test]
fn cli_check() {
    Command::cargo_bin("brex")
        .unwrap()
        .arg("check")
        .arg("<a+>b")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "scratch depth: 2, captures: 1 (0 inside loops)",
        ));
}

#[test]
fn cli_check_error() {
    Command::cargo_bin("brex")
        .unwrap()
        .arg("check")
        .arg("ab)c")
        .assert()
        .failure()
        .stderr("error: unbalanced bracket at offset 2\n\n  ab)c\n    ^\n");

    Command::cargo_bin("brex")
        .unwrap()
        .arg("check")
        .arg("(x*)?")
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "repetition of an expression that can be empty at offset 4",
        ));
}

#[test]
fn cli_max_depth() {
    Command::cargo_bin("brex")
        .unwrap()
        .arg("--max-depth")
        .arg("1")
        .arg("check")
        .arg("((a))")
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "groups nested too deeply at offset 1",
        ));

    Command::cargo_bin("brex")
        .unwrap()
        .arg("check")
        .arg("((a))")
        .arg("--max-depth=2")
        .assert()
        .success();
}

#[test]
fn cli_config_file() {
    let temp_dir = TempDir::new().unwrap();
    let config_file = temp_dir.path().join("brex.toml");

    fs::write(
        &config_file,
        "[compile]\nmax_nesting_depth = 1\n\n[export]\nname = \"FROM_CONFIG\"\n",
    )
    .unwrap();

    Command::cargo_bin("brex")
        .unwrap()
        .arg("--config")
        .arg(&config_file)
        .arg("check")
        .arg("((a))")
        .assert()
        .failure()
        .stderr(predicate::str::contains("groups nested too deeply"));

    Command::cargo_bin("brex")
        .unwrap()
        .arg("--config")
        .arg(&config_file)
        .arg("compile")
        .arg("(a)")
        .assert()
        .success()
        .stdout(predicate::str::contains("pub static FROM_CONFIG: [u8; "));

    fs::write(&config_file, "[compile]\nfoo = 1\n").unwrap();

    Command::cargo_bin("brex")
        .unwrap()
        .arg("--config")
        .arg(&config_file)
        .arg("check")
        .arg("a")
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid config file"));
}

#[test]
fn cli_scan() {
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("input.ini");

    fs::write(&input, "set foo=42;\nset bar=7;\n").unwrap();

    Command::cargo_bin("brex")
        .unwrap()
        .arg("scan")
        .arg(r"<\a+>=<\d+>")
        .arg(&input)
        .assert()
        .success()
        .stdout(format!(
            "{}\n\
             0x4:6: \"foo=42\"\n  \
               <0> 0x4:3: \"foo\"\n  \
               <1> 0x8:2: \"42\"\n\
             0x10:5: \"bar=7\"\n  \
               <0> 0x10:3: \"bar\"\n  \
               <1> 0x14:1: \"7\"\n",
            input.display()
        ));
}

#[test]
fn cli_scan_anchored() {
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("input.txt");

    fs::write(&input, "xab ab").unwrap();

    Command::cargo_bin("brex")
        .unwrap()
        .arg("scan")
        .arg("--anchored")
        .arg("ab")
        .arg(&input)
        .assert()
        .success()
        .stdout("");

    Command::cargo_bin("brex")
        .unwrap()
        .arg("scan")
        .arg("--anchored")
        .arg("x?ab")
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("0x0:3: \"xab\""));
}

#[test]
fn cli_scan_capture_slots() {
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("input.txt");

    fs::write(&input, "aaaa").unwrap();

    Command::cargo_bin("brex")
        .unwrap()
        .arg("scan")
        .arg("--capture-slots=2")
        .arg("(<a>)+")
        .arg(&input)
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "capture buffer exhausted (capacity: 2)",
        ));

    Command::cargo_bin("brex")
        .unwrap()
        .arg("scan")
        .arg("--capture-slots=4")
        .arg("(<a>)+")
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("<0> 0x3:1: \"a\""));
}

#[test]
fn cli_scan_missing_file() {
    Command::cargo_bin("brex")
        .unwrap()
        .arg("scan")
        .arg("a")
        .arg("src/tests/testdata/missing.file")
        .assert()
        .failure()
        .stderr(predicate::str::contains("can not read"));
}

#[test]
fn cli_compile() {
    Command::cargo_bin("brex")
        .unwrap()
        .arg("compile")
        .arg("a+b")
        .arg("--name=AB")
        .assert()
        .success()
        .stdout(predicate::str::starts_with(
            "// Pattern: \"a+b\"\n// Scratch depth: 1\n// Captures: 0 (0 inside loops)\npub static AB: [u8; ",
        ));

    Command::cargo_bin("brex")
        .unwrap()
        .arg("compile")
        .arg("a+b")
        .arg("--name=1AB")
        .assert()
        .failure()
        .stderr(predicate::str::contains("`1AB` is not a valid name"));
}

#[test]
fn cli_compile_append() {
    let temp_dir = TempDir::new().unwrap();
    let output = temp_dir.path().join("patterns.rs");

    Command::cargo_bin("brex")
        .unwrap()
        .arg("compile")
        .arg(r"\d+")
        .arg("--name=NUMBER")
        .arg("-o")
        .arg(&output)
        .assert()
        .success()
        .stdout("");

    Command::cargo_bin("brex")
        .unwrap()
        .arg("compile")
        .arg(r"\i\c*")
        .arg("--name=IDENT")
        .arg("--append")
        .arg("-o")
        .arg(&output)
        .assert()
        .success();

    let src = fs::read_to_string(&output).unwrap();

    assert!(src.contains("pub static NUMBER: [u8; "));
    assert!(src.contains("pub static IDENT: [u8; "));

    assert!(brex::export::from_rust_source(&src, "NUMBER").is_ok());
    assert!(brex::export::from_rust_source(&src, "IDENT").is_ok());

    // Without --append the file is overwritten.
    Command::cargo_bin("brex")
        .unwrap()
        .arg("compile")
        .arg("x")
        .arg("--name=X")
        .arg("-o")
        .arg(&output)
        .assert()
        .success();

    let src = fs::read_to_string(&output).unwrap();

    assert!(!src.contains("NUMBER"));
    assert!(src.contains("pub static X: [u8; "));
}

#[test]
fn cli_disasm() {
    Command::cargo_bin("brex")
        .unwrap()
        .arg("disasm")
        .arg("a|b")
        .assert()
        .success()
        .stdout(
            "code length: 12
scratch depth: 1
captures: 0

00000: SPLIT 00009
00004: LIT 0x61
00005: JUMP 0000a
00009: LIT 0x62
0000a: MATCH
",
        );

    Command::cargo_bin("brex")
        .unwrap()
        .arg("disasm")
        .arg("(<a>)+")
        .assert()
        .success()
        .stdout(predicate::str::contains("captures: 1\n  <0> inside loop\n"));
}
