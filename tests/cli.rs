//! CLI integration tests

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use std::path::PathBuf;

fn ioc_pinout() -> Command {
    cargo_bin_cmd!("ioc_pinout")
}

fn resource(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("resources/test")
        .join(name)
}

#[test]
fn help_lists_subcommands() {
    ioc_pinout()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("report").and(predicate::str::contains("relabel")));
}

#[test]
fn report_without_schematic() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("pins.xlsx");

    ioc_pinout()
        .arg("report")
        .arg(resource("board.ioc"))
        .arg("-o")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("10 pins written"))
        .stdout(predicate::str::contains("differ").not());
    assert!(out.exists());
}

#[test]
fn report_against_schematic() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("pins.xlsx");

    ioc_pinout()
        .arg("report")
        .arg(resource("board.ioc"))
        .arg("--output")
        .arg(&out)
        .arg("--schematic")
        .arg(resource("board.kicad_sch"))
        .args(["--match-by", "name", "--schematic-name", "label"])
        .assert()
        .success()
        .stdout(predicate::str::contains("3 pins differ from the schematic"));
}

#[test]
fn report_from_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("pinout.toml");
    std::fs::write(
        &config,
        format!(
            "ioc = {:?}\noutput = \"from_config.xlsx\"\n[kicad]\nlibrary = {:?}\nunit = 1\n",
            resource("board.ioc"),
            resource("mcu.kicad_sym"),
        ),
    )
    .unwrap();

    ioc_pinout()
        .arg("report")
        .arg("--config")
        .arg(&config)
        .assert()
        .success();
    assert!(dir.path().join("from_config.xlsx").exists());
}

#[test]
fn missing_ioc_file_fails() {
    let dir = tempfile::tempdir().unwrap();

    ioc_pinout()
        .arg("report")
        .arg(dir.path().join("missing.ioc"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("missing.ioc"));
}

#[test]
fn report_needs_an_ioc_file() {
    ioc_pinout()
        .arg("report")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("no .ioc file given"));
}

#[test]
fn relabel_reports_unresolved_labels() {
    let dir = tempfile::tempdir().unwrap();
    let xlsx = dir.path().join("pins.xlsx");
    let sch = dir.path().join("board.kicad_sch");
    std::fs::copy(resource("board.kicad_sch"), &sch).unwrap();

    ioc_pinout()
        .arg("report")
        .arg(resource("board.ioc"))
        .arg("-o")
        .arg(&xlsx)
        .assert()
        .success();

    ioc_pinout()
        .arg("relabel")
        .arg(&sch)
        .arg(&xlsx)
        .assert()
        .code(2)
        .stdout(predicate::str::contains("PA2 -> USART2_TX"))
        .stderr(predicate::str::contains("not on a wire"));

    let text = std::fs::read_to_string(&sch).unwrap();
    assert!(text.contains(r#"(label "USART2_RX""#));
    assert!(dir.path().join("board.kicad_sch.bak").exists());
}

#[test]
fn relabel_with_other_symbol_leaves_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let xlsx = dir.path().join("pins.xlsx");
    let sch = dir.path().join("board.kicad_sch");
    std::fs::copy(resource("board.kicad_sch"), &sch).unwrap();

    ioc_pinout()
        .arg("report")
        .arg(resource("board.ioc"))
        .arg("-o")
        .arg(&xlsx)
        .assert()
        .success();

    ioc_pinout()
        .arg("relabel")
        .arg(&sch)
        .arg(&xlsx)
        .arg("--symbol")
        .arg("Device:R")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("no pin is connected"));

    let text = std::fs::read_to_string(&sch).unwrap();
    assert_eq!(text, std::fs::read_to_string(resource("board.kicad_sch")).unwrap());
    assert!(!dir.path().join("board.kicad_sch.bak").exists());
}
