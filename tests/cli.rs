use std::io::Write;
use std::process::Command;

fn repoctx() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_repoctx"));
    cmd.env_remove("REPOCTX_CONFIG").env("RUST_LOG", "warn");
    cmd
}

fn write_config(dir: &tempfile::TempDir, body: &str) -> std::path::PathBuf {
    let path = dir.path().join("repoctx.toml");
    let mut f = std::fs::File::create(&path).unwrap();
    write!(f, "{body}").unwrap();
    path
}

#[test]
fn rules_prints_default_rulebook_as_json() {
    let output = repoctx()
        .args(["--config", "config/default.toml", "rules"])
        .current_dir(env!("CARGO_MANIFEST_DIR"))
        .output()
        .unwrap();
    assert!(output.status.success());

    let rules: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let rules = rules.as_array().unwrap();
    assert_eq!(rules.len(), 4);
    assert_eq!(rules[0]["name"], "explain_python_function");
    assert_eq!(rules[0]["scope"], "same_file");
}

#[test]
fn invalid_rulebook_aborts_startup() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        &dir,
        r#"
[[expansion_rules]]
name = "zero"
allowed_intents = ["Explain"]
source_code_types = ["py:function"]
allowed_requested_code_types = []
scope = "same_file"
max_chunks = 0
"#,
    );
    let output = repoctx()
        .arg("--config")
        .arg(&path)
        .arg("rules")
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
}

#[test]
fn unsupported_scope_is_rejected_by_cli() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, "");
    let output = repoctx()
        .arg("--config")
        .arg(&path)
        .args([
            "expand",
            "--ids",
            "a",
            "--scope",
            "same_repo",
            "--max-chunks",
            "2",
            "--intent",
            "Explain",
        ])
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("same_repo"));
}
