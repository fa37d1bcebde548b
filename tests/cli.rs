use assert_cmd::Command;
use predicates::prelude::*;

fn statefill() -> Command {
    Command::cargo_bin("statefill").unwrap()
}

#[test]
fn list_shows_the_table_catalog() {
    statefill()
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("address_diffs"))
        .stdout(predicate::str::contains("accounts_alive"));
}

#[test]
fn list_emits_json_when_asked() {
    statefill()
        .args(["list", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"key\": \"address_diffs\""));
}

#[test]
fn info_describes_a_single_table() {
    statefill()
        .args(["info", "address_diffs"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Source tables:"));
}

#[test]
fn info_rejects_unknown_tables() {
    statefill()
        .args(["info", "bogus"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown table 'bogus'"));
}

#[test]
fn run_requires_a_table_selection() {
    statefill()
        .arg("run")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--tables"));
}

#[test]
fn run_rejects_unknown_table_keys_before_connecting() {
    statefill()
        .args(["run", "--tables", "bogus"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown table 'bogus'"));
}

#[test]
fn run_rejects_a_zero_step_size_before_connecting() {
    statefill()
        .args(["run", "--all", "--step-size", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("step size"));
}

#[test]
fn create_tables_requires_a_selection() {
    statefill()
        .arg("create-tables")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--tables"));
}
