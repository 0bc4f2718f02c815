use std::io::Write;
use std::path::Path;

use assert_cmd::Command;
use chrono::Utc;
use predicates::prelude::*;
use serde_json::json;
use tempfile::TempDir;

use ledgerbook::audit::{AuditAction, AuditEntry, Changes, EntityType, EntryMetadata, NewAuditEntry};

fn entry(owner: &str, action: AuditAction, entity_type: EntityType, id: &str) -> AuditEntry {
    let changes = match action {
        AuditAction::Create => Changes {
            old: None,
            new: Some(json!({"id": id, "amount": 5000})),
        },
        AuditAction::Update => Changes {
            old: Some(json!({"id": id, "amount": 5000})),
            new: Some(json!({"id": id, "amount": 6000})),
        },
        AuditAction::Delete => Changes {
            old: Some(json!({"id": id, "amount": 6000})),
            new: None,
        },
    };
    NewAuditEntry::new(owner, action, entity_type, id, changes, EntryMetadata::default())
        .unwrap()
        .into_entry(Utc::now())
}

fn write_log(dir: &Path, entries: &[AuditEntry]) {
    let mut file = std::fs::File::create(dir.join("audit.jsonl")).unwrap();
    for entry in entries {
        writeln!(file, "{}", serde_json::to_string(entry).unwrap()).unwrap();
    }
}

fn seeded() -> (TempDir, Vec<AuditEntry>) {
    let dir = TempDir::new().unwrap();
    let entries = vec![
        entry("U1", AuditAction::Create, EntityType::Expense, "E1"),
        entry("U1", AuditAction::Update, EntityType::Expense, "E1"),
        entry("U2", AuditAction::Create, EntityType::Customer, "C9"),
    ];
    write_log(dir.path(), &entries);
    (dir, entries)
}

fn ledgerbook(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("ledgerbook").unwrap();
    cmd.env("LEDGERBOOK_DATA_DIR", dir.path())
        .env_remove("LEDGERBOOK_OWNER")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_help() {
    let dir = TempDir::new().unwrap();
    ledgerbook(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("history"));
}

#[test]
fn test_config_shows_paths() {
    let dir = TempDir::new().unwrap();
    ledgerbook(&dir)
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("Audit log"))
        .stdout(predicate::str::contains("audit.jsonl"));
}

#[test]
fn test_history_list_is_owner_scoped() {
    let (dir, _) = seeded();
    ledgerbook(&dir)
        .args(["history", "list", "--owner", "U1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"totalCount\": 2"))
        .stdout(predicate::str::contains("C9").not());
}

#[test]
fn test_history_owner_from_env() {
    let (dir, _) = seeded();
    ledgerbook(&dir)
        .env("LEDGERBOOK_OWNER", "U2")
        .args(["history", "list", "--entity-type", "customer"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"totalCount\": 1"))
        .stdout(predicate::str::contains("\"entityId\": \"C9\""));
}

#[test]
fn test_history_list_without_log_is_empty() {
    let dir = TempDir::new().unwrap();
    ledgerbook(&dir)
        .args(["history", "list", "--owner", "U1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"totalCount\": 0"));
}

#[test]
fn test_history_rejects_bad_filter() {
    let (dir, _) = seeded();
    ledgerbook(&dir)
        .args(["history", "list", "--owner", "U1", "--action", "PATCH"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown action"));
}

#[test]
fn test_history_show_update() {
    let (dir, entries) = seeded();
    ledgerbook(&dir)
        .args(["history", "show", &entries[1].id.to_string(), "--owner", "U1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("amount: 5000 -> 6000"));
}

#[test]
fn test_history_show_foreign_entry_fails() {
    let (dir, entries) = seeded();
    ledgerbook(&dir)
        .args(["history", "show", &entries[2].id.to_string(), "--owner", "U1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn test_history_stats() {
    let (dir, _) = seeded();
    ledgerbook(&dir)
        .args(["history", "stats", "--owner", "U1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"total\": 2"))
        .stdout(predicate::str::contains("\"UPDATE\": 1"));
}

#[test]
fn test_history_types() {
    let (dir, _) = seeded();
    ledgerbook(&dir)
        .args(["history", "types", "--owner", "U2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("customer"))
        .stdout(predicate::str::contains("expense").not());
}
