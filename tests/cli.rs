use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn docsearch_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_docsearch"))
}

/// SQLite backend, every provider disabled: exercises the paths that need
/// no external services.
fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let config_content = format!(
        r#"[search]
backend = "sqlite"

[db]
path = "{}/data/docsearch.sqlite"

[server]
bind = "127.0.0.1:7431"
"#,
        root.display()
    );

    let config_path = config_dir.join("docsearch.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_docsearch(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = docsearch_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run docsearch binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_help_lists_commands() {
    let output = Command::new(docsearch_binary())
        .arg("--help")
        .output()
        .unwrap();
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success());
    for cmd in ["init", "reindex", "add", "search", "get", "chat", "serve"] {
        assert!(stdout.contains(cmd), "missing {} in help:\n{}", cmd, stdout);
    }
}

#[test]
fn test_missing_config_fails() {
    let tmp = TempDir::new().unwrap();
    let (_, stderr, success) = run_docsearch(&tmp.path().join("nope.toml"), &["init"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"), "stderr: {}", stderr);
}

#[test]
fn test_invalid_backend_fails() {
    let (tmp, config_path) = setup_test_env();
    let content = fs::read_to_string(&config_path)
        .unwrap()
        .replace("backend = \"sqlite\"", "backend = \"solr\"");
    fs::write(&config_path, content).unwrap();

    let (_, stderr, success) = run_docsearch(&config_path, &["init"]);
    assert!(!success);
    assert!(stderr.contains("Unknown search backend"), "stderr: {}", stderr);
    drop(tmp);
}

#[test]
fn test_init_requires_embedding_provider() {
    let (_tmp, config_path) = setup_test_env();
    let (_, stderr, success) = run_docsearch(&config_path, &["init"]);
    assert!(!success);
    assert!(stderr.contains("embedding provider"), "stderr: {}", stderr);
}

#[test]
fn test_reindex_missing_file_reports_format_error() {
    let (tmp, config_path) = setup_test_env();
    let missing = tmp.path().join("missing.json");

    let (_, stderr, success) =
        run_docsearch(&config_path, &["reindex", missing.to_str().unwrap()]);
    assert!(!success);
    assert!(stderr.contains("Reindex failed (ingestion_format)"), "stderr: {}", stderr);
}

#[test]
fn test_reindex_with_embeddings_disabled_reports_error() {
    let (tmp, config_path) = setup_test_env();
    let file = tmp.path().join("docs.json");
    fs::write(&file, r#"[{"summary": "s", "content": "c"}]"#).unwrap();

    let (_, stderr, success) = run_docsearch(&config_path, &["reindex", file.to_str().unwrap()]);
    assert!(!success);
    assert!(
        stderr.contains("Reindex failed (embedding_unavailable)"),
        "stderr: {}",
        stderr
    );
}

#[test]
fn test_get_before_init_fails() {
    let (_tmp, config_path) = setup_test_env();
    let (_, stderr, success) = run_docsearch(&config_path, &["get", "some-id"]);
    assert!(!success);
    assert!(stderr.contains("search engine unavailable"), "stderr: {}", stderr);
}

#[test]
fn test_chat_without_generation_fails() {
    let (_tmp, config_path) = setup_test_env();
    let (_, stderr, success) = run_docsearch(&config_path, &["chat", "hello?", "--no-context"]);
    assert!(!success);
    assert!(stderr.contains("generation provider"), "stderr: {}", stderr);
}
