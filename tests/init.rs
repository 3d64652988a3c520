use std::process::Command;

#[test]
fn init_creates_valid_toml() {
    let dir = tempfile::tempdir().unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_reposcope"))
        .arg("init")
        .current_dir(dir.path())
        .output()
        .unwrap();

    assert!(
        output.status.success(),
        "reposcope init failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let config_path = dir.path().join(".reposcope.toml");
    assert!(config_path.exists(), ".reposcope.toml should exist");

    let content = std::fs::read_to_string(&config_path).unwrap();
    assert!(content.contains("[embedding]"));
    assert!(content.contains("[cache]"));

    let config: reposcope_core::ScopeConfig = toml::from_str(&content).unwrap();
    assert_eq!(config.embedding.provider, "hash");
    assert_eq!(config.search.default_top_k, 10);
}

#[test]
fn init_refuses_if_exists() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(".reposcope.toml"), "# existing").unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_reposcope"))
        .arg("init")
        .current_dir(dir.path())
        .output()
        .unwrap();

    assert!(!output.status.success());
    let content = std::fs::read_to_string(dir.path().join(".reposcope.toml")).unwrap();
    assert_eq!(content, "# existing");
}
