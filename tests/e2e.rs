use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

fn hashlit(args: &[&str], cwd: &Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_hashlit"))
        .args(args)
        .current_dir(cwd)
        .env_remove("HASHLIT_LOG")
        .output()
        .expect("failed to execute hashlit")
}

fn run_hashlit(source: &str) -> (String, String, bool) {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("main.hl");
    std::fs::write(&file, source).unwrap();

    let output = hashlit(&["run", file.to_str().unwrap()], temp.path());
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

fn assert_success(source: &str) -> String {
    let (stdout, stderr, success) = run_hashlit(source);
    assert!(success, "program should succeed, stderr:\n{}", stderr);
    stdout
}

fn assert_failure(source: &str) -> String {
    let (_, stderr, success) = run_hashlit(source);
    assert!(!success, "program should fail");
    stderr
}

#[test]
fn test_sequence_literal() {
    let stdout = assert_success("print(Array#[1, 2 + 3, \"x\"]);");
    assert_eq!(stdout, "[1, 5, \"x\"]\n");
}

#[test]
fn test_mapping_literal() {
    let stdout = assert_success(
        r#"
let m = Map#{1: "one", 2: "two"};
print(m.get(2));
"#,
    );
    assert_eq!(stdout, "two\n");
}

#[test]
fn test_literal_binds_like_a_call() {
    // `#` sits at postfix level: the literal is built before `+` and
    // member access applies to the literal's result.
    let stdout = assert_success("print(1 + Array#[1, 2].length);");
    assert_eq!(stdout, "3\n");
}

#[test]
fn test_constructor_from_expression() {
    let stdout = assert_success(
        r#"
let ctors = {seq: Array};
print(ctors.seq#[7, 8]);
"#,
    );
    assert_eq!(stdout, "[7, 8]\n");
}

#[test]
fn test_missing_protocol_reports_location() {
    let stderr = assert_failure("let x = 5;\nlet y = x#[1];\n");
    assert!(stderr.contains("int has no Symbol.sequenceLiteral method"), "{}", stderr);
    assert!(stderr.contains("main.hl:2:"), "{}", stderr);
}

#[test]
fn test_parse_error_reports_location() {
    let stderr = assert_failure("let m = Map#{1: 2, 3};");
    assert!(stderr.contains("malformed entry 2 in mapping literal"), "{}", stderr);
}

#[test]
fn test_inline_code() {
    let temp = TempDir::new().unwrap();
    let output = hashlit(&["run", "-c", "print(Set#[1, 1, 2].size);"], temp.path());
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "2\n");
}

#[test]
fn test_dump_desugared_goes_to_stderr() {
    let temp = TempDir::new().unwrap();
    let output = hashlit(&["run", "--dump-desugared", "-c", "print(Array#[1]);"], temp.path());
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "[1]\n");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("__lit_receiver[Symbol.sequenceLiteral]"), "{}", stderr);
}

#[test]
fn test_tokens_json() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("t.hl");
    std::fs::write(&file, "A#[1] # note\n").unwrap();

    let output = hashlit(&["tokens", "--json", file.to_str().unwrap()], temp.path());
    assert!(output.status.success());
    let tokens: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let kinds: Vec<String> = tokens
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["kind"].to_string())
        .collect();
    assert_eq!(kinds.len(), 6, "{:?}", kinds);
    assert!(kinds[1].contains("Marker"), "{:?}", kinds);
    assert_eq!(tokens[1]["span"]["column"], 2);
}

#[test]
fn test_check_does_not_run() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("t.hl");
    std::fs::write(&file, "print(\"side effect\");").unwrap();

    let output = hashlit(&["check", file.to_str().unwrap()], temp.path());
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "Check passed.\n");
}

#[test]
fn test_init_then_run_project() {
    let temp = TempDir::new().unwrap();
    let init = hashlit(&["init", "demo"], temp.path());
    assert!(init.status.success());
    assert!(temp.path().join("hashlit.toml").exists());

    let run = hashlit(&["run"], temp.path());
    assert!(run.status.success(), "{}", String::from_utf8_lossy(&run.stderr));
    assert_eq!(String::from_utf8_lossy(&run.stdout), "Hello, world!\n");
}

#[test]
fn test_run_without_file_outside_project() {
    let temp = TempDir::new().unwrap();
    let output = hashlit(&["run"], temp.path());
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("no file specified"), "{}", stderr);
}
