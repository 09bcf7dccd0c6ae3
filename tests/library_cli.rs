use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

const LIBRARY: &str = "categories: [Reading]
items:
  - title: Night Watch
    favorite: true
    categories: [Reading]
    chapters:
      - name: Chapter 3
        number: 3
      - name: Chapter 2
        number: 2
        read: true
      - name: Chapter 1
        number: 1
        read: true
        downloaded: true
";

#[test]
fn import_then_list_shows_counts() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("library.db");
    let file = dir.path().join("library.yaml");
    std::fs::write(&file, LIBRARY).unwrap();

    Command::cargo_bin("chapter-deck")
        .unwrap()
        .arg("--db")
        .arg(&db)
        .arg("--import")
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("Imported 1 item(s)."));

    Command::cargo_bin("chapter-deck")
        .unwrap()
        .arg("--db")
        .arg(&db)
        .arg("--list")
        .assert()
        .success()
        .stdout(predicate::str::contains("Night Watch"))
        .stdout(predicate::str::contains("3 chapters, 1 unread"));
}

#[test]
fn empty_library_lists_nothing() {
    let dir = tempdir().unwrap();
    Command::cargo_bin("chapter-deck")
        .unwrap()
        .arg("--db")
        .arg(dir.path().join("library.db"))
        .arg("--list")
        .assert()
        .success()
        .stdout(predicate::str::contains("Library is empty."));
}

#[test]
fn missing_import_file_fails() {
    let dir = tempdir().unwrap();
    Command::cargo_bin("chapter-deck")
        .unwrap()
        .arg("--db")
        .arg(dir.path().join("library.db"))
        .arg("--import")
        .arg(dir.path().join("absent.yaml"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read import file"));
}

#[test]
fn unknown_flag_is_rejected() {
    Command::cargo_bin("chapter-deck")
        .unwrap()
        .arg("--bogus")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("unknown argument"));
}

#[test]
fn version_flag_prints_name_and_version() {
    Command::cargo_bin("chapter-deck")
        .unwrap()
        .arg("-V")
        .assert()
        .success()
        .stdout(predicate::str::starts_with(format!(
            "chapter-deck {}",
            env!("CARGO_PKG_VERSION")
        )));
}

#[test]
fn help_lists_library_commands() {
    Command::cargo_bin("chapter-deck")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("--import <file>")
                .and(predicate::str::contains("--list"))
                .and(predicate::str::contains("--item <id>"))
                .and(predicate::str::contains("--db <path>")),
        );
}
