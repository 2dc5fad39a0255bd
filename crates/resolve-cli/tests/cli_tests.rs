//! CLI integration tests for resolve-data.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::time::Duration;
use tempfile::TempDir;

const TEST_TIMEOUT_SECS: u64 = 20;

fn resolve_data() -> Command {
    let mut cmd = Command::cargo_bin("resolve-data").unwrap();
    cmd.timeout(Duration::from_secs(TEST_TIMEOUT_SECS));
    cmd
}

#[test]
fn test_help_flag() {
    resolve_data()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Batch runner for the transaction enrichment cascade"));
}

#[test]
fn test_version_flag() {
    resolve_data()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("resolve-data"));
}

#[test]
fn test_validate_succeeds_with_no_env_overrides() {
    resolve_data()
        .arg("validate")
        .env_remove("RESOLVE_TAU")
        .assert()
        .success()
        .stdout(predicate::str::contains("configuration is valid"));
}

#[test]
fn test_validate_reports_out_of_range_tau() {
    resolve_data()
        .arg("validate")
        .env("RESOLVE_TAU", "1.5")
        .assert()
        .failure()
        .stderr(predicate::str::contains("tau must be within"));
}

#[test]
fn test_enrich_rejects_a_missing_batch_file() {
    resolve_data()
        .arg("enrich")
        .arg("/no/such/batch.json")
        .env("RESOLVE_MERCHANT_PROVIDER_URL", "http://localhost:1/enrich")
        .env("RESOLVE_LLM_PROVIDER_URL", "http://localhost:1/llm")
        .env("RESOLVE_SEARCH_PROVIDER_URL", "http://localhost:1/search")
        .assert()
        .failure()
        .stderr(predicate::str::contains("reading"));
}

#[test]
fn test_enrich_requires_provider_urls() {
    let dir = TempDir::new().unwrap();
    let batch_path = dir.path().join("batch.json");
    fs::write(&batch_path, "[]").unwrap();

    resolve_data()
        .arg("enrich")
        .arg(&batch_path)
        .env_remove("RESOLVE_MERCHANT_PROVIDER_URL")
        .env_remove("RESOLVE_LLM_PROVIDER_URL")
        .env_remove("RESOLVE_SEARCH_PROVIDER_URL")
        .assert()
        .failure()
        .stderr(predicate::str::contains("RESOLVE_MERCHANT_PROVIDER_URL"));
}
