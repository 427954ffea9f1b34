use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

const TYPO_DIFF: &str = "\
diff --git a/src/math.js b/src/math.js
index 3b18e51..a1f2c3d 100644
--- a/src/math.js
+++ b/src/math.js
@@ -1,3 +1,3 @@
 function add(a, b) {
-  // Calcualte the sum
+  // Calculate the sum
   return a + b;
";

const LOGIC_DIFF: &str = "\
diff --git a/src/math.js b/src/math.js
index 3b18e51..a1f2c3d 100644
--- a/src/math.js
+++ b/src/math.js
@@ -1,3 +1,3 @@
 function add(a, b) {
-  return a + b;
+  return a - b;
 }
";

/// A command isolated from the caller's config, credentials and CI environment.
fn skip_review(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("skip-review").unwrap();
    cmd.current_dir(dir.path())
        .env("XDG_CONFIG_HOME", dir.path().join("xdg"))
        .env_remove("OPENAI_API_KEY")
        .env_remove("GITHUB_TOKEN")
        .env_remove("GH_TOKEN")
        .env_remove("GITHUB_OUTPUT")
        .env_remove("GITHUB_REPOSITORY")
        .env_remove("GITHUB_EVENT_PATH")
        .env_remove("SKIP_REVIEW_LOG");
    cmd
}

fn write_diff(dir: &TempDir, diff: &str) -> String {
    let path = dir.path().join("change.diff");
    fs::write(&path, diff).unwrap();
    path.display().to_string()
}

#[test]
fn test_missing_oracle_key_fails() {
    let dir = TempDir::new().unwrap();
    let diff = write_diff(&dir, TYPO_DIFF);
    skip_review(&dir)
        .args(["--diff-file", &diff])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("OPENAI_API_KEY"))
        .stdout(predicate::str::contains(r#""result":"error""#));
}

#[test]
fn test_missing_hosting_token_fails() {
    let dir = TempDir::new().unwrap();
    skip_review(&dir)
        .args(["--oracle", "rules", "--repo", "octo/app", "--pr", "1"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("GITHUB_TOKEN"))
        .stdout(predicate::str::contains(r#""error_kind":"configuration""#));
}

#[test]
fn test_local_diff_with_rules_is_eligible() {
    let dir = TempDir::new().unwrap();
    let diff = write_diff(&dir, TYPO_DIFF);
    skip_review(&dir)
        .args(["--oracle", "rules", "--diff-file", &diff])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""result":"eligible""#))
        .stdout(predicate::str::contains(r#""applied":false"#))
        .stderr(predicate::str::contains("category=FixTypos"));
}

#[test]
fn test_local_logic_change_is_not_eligible() {
    let dir = TempDir::new().unwrap();
    let diff = write_diff(&dir, LOGIC_DIFF);
    skip_review(&dir)
        .args(["--oracle", "rules", "--diff-file", &diff])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""result":"not_eligible""#))
        .stderr(predicate::str::contains("eligible=false"));
}

#[test]
fn test_step_outputs_written_to_github_output() {
    let dir = TempDir::new().unwrap();
    let diff = write_diff(&dir, TYPO_DIFF);
    let output = dir.path().join("github_output");
    skip_review(&dir)
        .env("GITHUB_OUTPUT", &output)
        .args(["--oracle", "rules", "--diff-file", &diff])
        .assert()
        .success();

    let written = fs::read_to_string(&output).unwrap();
    assert!(written.contains("eligible=true\n"));
    assert!(written.contains("confidence=95\n"));
    assert!(written.contains("category=FixTypos\n"));
}

#[test]
fn test_invalid_threshold_is_rejected() {
    let dir = TempDir::new().unwrap();
    let diff = write_diff(&dir, TYPO_DIFF);
    skip_review(&dir)
        .args(["--oracle", "rules", "--diff-file", &diff])
        .args(["--confidence-threshold", "101"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("confidence_threshold"));
}

#[test]
fn test_init_local_writes_files() {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join(".git")).unwrap();
    skip_review(&dir)
        .args(["init", "--local"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Local initialization complete!"));

    assert!(dir.path().join(".skip-review.toml").exists());
    assert!(dir.path().join(".skip-review/prompts/classifier.md").exists());

    skip_review(&dir)
        .args(["init", "--local"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Skipping .skip-review.toml"));
}
