use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn repodoc_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("repodoc");
    path
}

/// Temp workspace with a small Rust repository and a config whose
/// providers are disabled, so nothing leaves the machine.
fn setup_test_env() -> (TempDir, PathBuf, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let repo = root.join("demo-repo");
    fs::create_dir_all(repo.join("src")).unwrap();
    fs::create_dir_all(repo.join("target")).unwrap();
    fs::write(
        repo.join("Cargo.toml"),
        "[package]\nname = \"demo\"\n\n[dependencies]\nserde = \"1\"\ntokio = \"1\"\n",
    )
    .unwrap();
    fs::write(
        repo.join("src/main.rs"),
        "use serde::Serialize;\n\nfn main() {\n    println!(\"hello\");\n}\n",
    )
    .unwrap();
    fs::write(
        repo.join("README.md"),
        "# Demo\n\nA tiny demo crate.\n\n## Usage\n\nRun it.\n",
    )
    .unwrap();
    fs::write(repo.join("target/junk.rs"), "fn ignored() {}\n").unwrap();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    let config_content = format!(
        r#"[db]
path = "{}/data/repodoc.sqlite"

[chunking]
chunk_size = 64
overlap = 8

[embedding]
provider = "disabled"

[llm]
provider = "disabled"
"#,
        root.display()
    );
    let config_path = config_dir.join("repodoc.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path, repo)
}

fn run_repodoc(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = repodoc_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run repodoc binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_init_is_idempotent() {
    let (tmp, config_path, _repo) = setup_test_env();

    let (stdout, stderr, success) = run_repodoc(&config_path, &["init"]);
    assert!(success, "init failed: {}", stderr);
    assert!(stdout.contains("Database initialized"));
    assert!(tmp.path().join("data/repodoc.sqlite").exists());

    let (_, stderr, success) = run_repodoc(&config_path, &["init"]);
    assert!(success, "second init failed: {}", stderr);
}

#[test]
fn test_analyze_json_report() {
    let (_tmp, config_path, repo) = setup_test_env();

    let (stdout, stderr, success) =
        run_repodoc(&config_path, &["analyze", repo.to_str().unwrap(), "--json"]);
    assert!(success, "analyze failed: {}", stderr);

    let report: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(report["analysis"]["project_type"], "Rust");
    assert_eq!(report["analysis"]["total_files"], 3);
    let deps = report["analysis"]["dependencies"].to_string();
    assert!(deps.contains("serde"));
    assert!(deps.contains("tokio"));
    assert!(report["review"]["validation"]["overall_health"].is_number());
}

#[test]
fn test_analyze_text_report() {
    let (_tmp, config_path, repo) = setup_test_env();

    let (stdout, stderr, success) = run_repodoc(&config_path, &["analyze", repo.to_str().unwrap()]);
    assert!(success, "analyze failed: {}", stderr);
    assert!(stdout.contains("Project type:  Rust"));
    assert!(stdout.contains("Files:         3"));
    assert!(stdout.contains("Missing: LICENSE"));
}

#[test]
fn test_run_completes_with_providers_disabled() {
    let (_tmp, config_path, repo) = setup_test_env();

    let (stdout, stderr, success) = run_repodoc(
        &config_path,
        &[
            "run",
            repo.to_str().unwrap(),
            "--instructions",
            "Write an introduction",
            "--json",
        ],
    );
    assert!(success, "run failed: {}", stderr);

    let ctx: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(ctx["state"], "COMPLETE");
    assert_eq!(ctx["project_id"], "demo-repo");
    assert_eq!(ctx["embedding"]["status"], "skipped");
    assert_eq!(ctx["generation"], "skipped");
    assert_eq!(ctx["partial"], false);
    assert_eq!(
        ctx["history"],
        serde_json::json!([
            "START",
            "ANALYZING",
            "EMBEDDING",
            "GENERATING",
            "REVIEWING",
            "COMPLETE"
        ])
    );

    let (stdout, _, success) = run_repodoc(&config_path, &["projects"]);
    assert!(success);
    assert!(stdout.contains("demo-repo"));
    assert!(stdout.contains("complete"));
}

#[test]
fn test_run_missing_source_fails() {
    let (tmp, config_path, _repo) = setup_test_env();
    let missing = tmp.path().join("nope");

    let (stdout, stderr, success) = run_repodoc(
        &config_path,
        &["run", missing.to_str().unwrap(), "--project", "ghost"],
    );
    assert!(!success);
    assert!(stdout.contains("FAILED"));
    assert!(stderr.contains("failed"));

    let (stdout, _, _) = run_repodoc(&config_path, &["projects"]);
    assert!(stdout.contains("ghost"));
    assert!(stdout.contains("failed"));
}

#[test]
fn test_query_requires_embedding_provider() {
    let (_tmp, config_path, _repo) = setup_test_env();

    let (_, stderr, success) = run_repodoc(&config_path, &["query", "demo", "config loading"]);
    assert!(!success);
    assert!(stderr.contains("Embedding provider is disabled"));
}

#[test]
fn test_delete_project() {
    let (_tmp, config_path, repo) = setup_test_env();

    let (_, stderr, success) = run_repodoc(
        &config_path,
        &["run", repo.to_str().unwrap(), "--project", "gone"],
    );
    assert!(success, "run failed: {}", stderr);

    let (stdout, _, success) = run_repodoc(&config_path, &["delete", "gone"]);
    assert!(success);
    assert!(stdout.contains("Deleted project 'gone'"));

    let (stdout, _, _) = run_repodoc(&config_path, &["projects"]);
    assert!(stdout.contains("No projects."));
}

#[test]
fn test_run_unresolvable_source_records_resolution_error() {
    let (_tmp, config_path, _repo) = setup_test_env();

    let (stdout, _, success) = run_repodoc(
        &config_path,
        &[
            "run",
            "https://example.com/not-a-repo",
            "--project",
            "badurl",
            "--json",
        ],
    );
    assert!(!success);

    let ctx: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(ctx["state"], "FAILED");
    assert_eq!(ctx["failure"]["kind"], "ConfigError");
    let message = ctx["failure"]["message"].as_str().unwrap();
    assert!(message.contains("invalid repository URL"), "{}", message);
    assert!(!message.contains("does not exist"));
}
