use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn kh_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("kh");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let data_dir = root.join("data");
    fs::create_dir_all(&data_dir).unwrap();

    fs::write(
        data_dir.join("trattoria.toml"),
        r#"menu = """
Margherita pizza with basil 10
Pepperoni pizza 12
"""
hours = "Open daily from noon to 11pm"
faqs = """
Do you deliver?
Yes, within 5 km of the restaurant.

Is there parking?
Street parking only.
"""
"#,
    )
    .unwrap();

    fs::write(
        data_dir.join("villas.json"),
        r#"{
  "listings": "Unit 1: sea view villa, 3 bedrooms\n\nUnit 2: garden apartment, 2 bedrooms",
  "paymentPlans": "10% down payment\n\nBalance over 6 years"
}"#,
    )
    .unwrap();

    fs::write(data_dir.join("bad.toml"), "cocktails = \"Mojito\"\n").unwrap();

    let config_content = format!(
        r#"[db]
path = "{}/data/kh.sqlite"

[retrieval]
search_limit = 50
recent_limit_empty_query = 10
recent_limit_fallback = 25
"#,
        root.display()
    );

    let config_path = config_dir.join("kh.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_kh(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = kh_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run kh binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

fn data_file(config_path: &Path, name: &str) -> String {
    config_path
        .parent()
        .unwrap()
        .parent()
        .unwrap()
        .join("data")
        .join(name)
        .to_string_lossy()
        .to_string()
}

#[test]
fn test_init_creates_database() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_kh(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_kh(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_kh(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_ingest_reports_counts() {
    let (_tmp, config_path) = setup_test_env();
    let file = data_file(&config_path, "trattoria.toml");

    run_kh(&config_path, &["init"]);
    let (stdout, stderr, success) =
        run_kh(&config_path, &["--client", "trattoria", "ingest", &file]);
    assert!(success, "ingest failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("ingest trattoria/default"));
    assert!(stdout.contains("sections: 3"));
    // menu 1 + hours 1 + faqs 1 (two blocks bundled)
    assert!(stdout.contains("chunks inserted: 3"));
    assert!(stdout.contains("ok"));
}

#[test]
fn test_reingest_replaces_chunks() {
    let (_tmp, config_path) = setup_test_env();
    let file = data_file(&config_path, "trattoria.toml");

    run_kh(&config_path, &["--client", "trattoria", "ingest", &file]);
    run_kh(&config_path, &["--client", "trattoria", "ingest", &file]);

    let (stdout, _, success) = run_kh(
        &config_path,
        &["--client", "trattoria", "chunks", "--json"],
    );
    assert!(success);
    let chunks: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(chunks.as_array().unwrap().len(), 3);
}

#[test]
fn test_ingest_dry_run_writes_nothing() {
    let (_tmp, config_path) = setup_test_env();
    let file = data_file(&config_path, "trattoria.toml");

    let (stdout, _, success) = run_kh(
        &config_path,
        &["--client", "trattoria", "ingest", &file, "--dry-run"],
    );
    assert!(success);
    assert!(stdout.contains("dry-run"));
    assert!(stdout.contains("faqs: 1 chunks"));

    let (stdout, _, _) = run_kh(&config_path, &["--client", "trattoria", "chunks"]);
    assert!(stdout.contains("No chunks."));
}

#[test]
fn test_ingest_unknown_section_fails() {
    let (_tmp, config_path) = setup_test_env();
    let file = data_file(&config_path, "bad.toml");

    let (_, stderr, success) = run_kh(&config_path, &["--client", "trattoria", "ingest", &file]);
    assert!(!success, "ingest of unknown section should fail");
    assert!(stderr.contains("cocktails"));
}

#[test]
fn test_empty_client_fails() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success) = run_kh(&config_path, &["--client", "  ", "retrieve", "pizza"]);
    assert!(!success, "blank client id should be rejected");
}

#[test]
fn test_missing_client_fails_before_storage() {
    let (_tmp, config_path) = setup_test_env();
    let file = data_file(&config_path, "trattoria.toml");

    let (_, stderr, success) = run_kh(&config_path, &["ingest", &file]);
    assert!(!success, "ingest without --client should be rejected");
    assert!(stderr.contains("clientId is required"));

    let db_path = config_path.parent().unwrap().parent().unwrap().join("data/kh.sqlite");
    assert!(!db_path.exists(), "database should not be touched");

    let (stdout, stderr, success) = run_kh(&config_path, &["init"]);
    assert!(success, "init needs no client: stdout={}, stderr={}", stdout, stderr);
}

#[test]
fn test_retrieve_finds_matching_section() {
    let (_tmp, config_path) = setup_test_env();
    let file = data_file(&config_path, "trattoria.toml");

    run_kh(&config_path, &["--client", "trattoria", "ingest", &file]);
    let (stdout, stderr, success) = run_kh(
        &config_path,
        &["--client", "trattoria", "retrieve", "pepperoni", "--json"],
    );
    assert!(success, "retrieve failed: stdout={}, stderr={}", stdout, stderr);

    let retrieval: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(retrieval["source"], "search");
    assert!(retrieval["groups"]["menu"][0]
        .as_str()
        .unwrap()
        .contains("Pepperoni"));
    assert!(retrieval["groups"].get("hours").is_none());
}

#[test]
fn test_retrieve_falls_back_to_recent() {
    let (_tmp, config_path) = setup_test_env();
    let file = data_file(&config_path, "trattoria.toml");

    run_kh(&config_path, &["--client", "trattoria", "ingest", &file]);
    let (stdout, _, success) = run_kh(
        &config_path,
        &["--client", "trattoria", "retrieve", "xylophone", "--json"],
    );
    assert!(success);

    let retrieval: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(retrieval["source"], "recentFallback");
    assert_eq!(retrieval["poolSize"], 3);
}

#[test]
fn test_retrieve_is_tenant_scoped() {
    let (_tmp, config_path) = setup_test_env();
    let file = data_file(&config_path, "trattoria.toml");

    run_kh(&config_path, &["--client", "trattoria", "ingest", &file]);
    let (stdout, _, success) = run_kh(&config_path, &["--client", "other", "retrieve", "pizza"]);
    assert!(success);
    assert!(stdout.contains("No results."));
}

#[test]
fn test_prompt_real_estate_order_and_placeholder() {
    let (_tmp, config_path) = setup_test_env();
    let file = data_file(&config_path, "villas.json");

    let (_, stderr, success) = run_kh(
        &config_path,
        &["--client", "villas", "--bot", "realestate", "ingest", &file],
    );
    assert!(success, "ingest failed: {}", stderr);

    let (stdout, stderr, success) = run_kh(
        &config_path,
        &[
            "--client",
            "villas",
            "--bot",
            "realestate",
            "prompt",
            "sea view villa",
            "--rules",
            "Be brief.",
        ],
    );
    assert!(success, "prompt failed: {}", stderr);

    let messages: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let messages = messages.as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["role"], "system");
    assert_eq!(messages[0]["content"], "Be brief.");
    assert_eq!(messages[1]["role"], "user");

    let content = messages[1]["content"].as_str().unwrap();
    assert!(content.starts_with("LISTINGS:\n"));
    assert!(content.contains("sea view villa"));
    assert!(content.contains("OFFERS:\nNo relevant data found."));
    assert!(content.ends_with("User message:\nsea view villa"));
    assert!(!content.contains("MENU:"));
}

#[test]
fn test_rechunk_rebuilds_from_stored_sections() {
    let (_tmp, config_path) = setup_test_env();
    let file = data_file(&config_path, "trattoria.toml");

    run_kh(&config_path, &["--client", "trattoria", "ingest", &file]);
    let (stdout, stderr, success) = run_kh(&config_path, &["--client", "trattoria", "rechunk"]);
    assert!(success, "rechunk failed: {}", stderr);
    assert!(stdout.contains("chunks inserted: 3"));
}

#[test]
fn test_rechunk_without_dataset_fails() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_kh(&config_path, &["--client", "nobody", "rechunk"]);
    assert!(!success);
    assert!(stderr.contains("no dataset stored"));
}

#[test]
fn test_chunks_section_filter() {
    let (_tmp, config_path) = setup_test_env();
    let file = data_file(&config_path, "villas.json");

    run_kh(&config_path, &["--client", "villas", "ingest", &file]);
    let (stdout, _, success) = run_kh(
        &config_path,
        &["--client", "villas", "chunks", "--section", "listings", "--json"],
    );
    assert!(success);

    let chunks: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let chunks = chunks.as_array().unwrap();
    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[0]["chunkIndex"], 0);
    assert!(chunks[0]["text"].as_str().unwrap().starts_with("Unit 1"));
}

#[test]
fn test_purge_deletes_tenant_chunks() {
    let (_tmp, config_path) = setup_test_env();
    let file = data_file(&config_path, "trattoria.toml");

    run_kh(&config_path, &["--client", "trattoria", "ingest", &file]);
    let (stdout, _, success) = run_kh(&config_path, &["--client", "trattoria", "purge"]);
    assert!(success);
    assert!(stdout.contains("chunks deleted: 3"));

    let (stdout, _, _) = run_kh(&config_path, &["--client", "trattoria", "retrieve", ""]);
    assert!(stdout.contains("No results."));
}
