use std::path::Path;
use std::process::{Command, Output};

fn reposcope(cwd: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_reposcope"))
        .args(args)
        .current_dir(cwd)
        .env_remove("RUST_LOG")
        .output()
        .unwrap()
}

fn write_repo(parent: &Path) {
    let root = parent.join("webapp");
    std::fs::create_dir_all(&root).unwrap();
    std::fs::write(
        root.join("auth.py"),
        "def login(username, password):\n    \"\"\"Sign the user in.\"\"\"\n    return check(username, password)\n",
    )
    .unwrap();
    std::fs::write(root.join("requirements.txt"), "flask\n").unwrap();
}

fn stdout(output: &Output) -> String {
    assert!(
        output.status.success(),
        "command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).to_string()
}

#[test]
fn ask_names_the_login_file() {
    let dir = tempfile::tempdir().unwrap();
    write_repo(dir.path());

    let output = reposcope(
        dir.path(),
        &["ask", "How does the login functionality work?", "--repo", "webapp"],
    );
    let text = stdout(&output);
    assert!(text.contains("webapp/auth.py"), "{text}");
}

#[test]
fn ask_json_is_structured() {
    let dir = tempfile::tempdir().unwrap();
    write_repo(dir.path());

    let output = reposcope(
        dir.path(),
        &["--format", "json", "ask", "How does login work?", "--repo", "webapp"],
    );
    let value: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(value["intent"], "describe_authentication");
    assert_eq!(value["matches"][0]["file"], "webapp/auth.py");
}

#[test]
fn index_twice_hits_the_cache() {
    let dir = tempfile::tempdir().unwrap();
    write_repo(dir.path());

    let first = stdout(&reposcope(dir.path(), &["index", "webapp"]));
    assert!(first.contains("(indexed)"), "{first}");
    assert!(dir.path().join(".reposcope/cache/index").is_dir());

    let second = stdout(&reposcope(dir.path(), &["index", "webapp"]));
    assert!(second.contains("(cache hit)"), "{second}");
}

#[test]
fn summary_json_lists_dependencies() {
    let dir = tempfile::tempdir().unwrap();
    write_repo(dir.path());

    let output = reposcope(
        dir.path(),
        &["--format", "json", "--no-cache", "summary", "--repo", "webapp"],
    );
    let value: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(value["repositories"][0]["name"], "webapp");
    assert_eq!(value["repositories"][0]["dependencies"][0], "flask");
    assert_eq!(value["statistics"]["entities_by_language"]["python"], 1);
    assert!(!dir.path().join(".reposcope").exists());
}

#[test]
fn search_without_semantic_fails() {
    let dir = tempfile::tempdir().unwrap();
    write_repo(dir.path());

    let output = reposcope(dir.path(), &["--no-semantic", "search", "login", "--repo", "webapp"]);
    assert!(!output.status.success());
}

#[test]
fn missing_repository_fails() {
    let dir = tempfile::tempdir().unwrap();
    let output = reposcope(dir.path(), &["index", "nowhere"]);
    assert!(!output.status.success());
}
