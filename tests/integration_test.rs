//! Integration tests for git-mcp-server
//!
//! These tests require git to be installed and available.
//! Every test works in its own temporary repository.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tempfile::TempDir;

use git_mcp_server::config::Config;
use git_mcp_server::edit::ReplaceStrategy;
use git_mcp_server::error::{Error, ToolError};
use git_mcp_server::tools::Dispatcher;

/// Run git in `repo` and return trimmed stdout
async fn git(repo: &Path, args: &[&str]) -> String {
    let output = tokio::process::Command::new("git")
        .current_dir(repo)
        .args(args)
        .output()
        .await
        .unwrap();
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// Helper to create a test git repository on branch `main` with one commit
async fn create_test_repo() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let repo_path = temp_dir.path().to_path_buf();

    git(&repo_path, &["init", "-q"]).await;
    git(&repo_path, &["symbolic-ref", "HEAD", "refs/heads/main"]).await;

    // Configure git user for commits
    git(&repo_path, &["config", "user.email", "test@test.com"]).await;
    git(&repo_path, &["config", "user.name", "Test User"]).await;
    git(&repo_path, &["config", "commit.gpgsign", "false"]).await;

    // Create initial commit
    tokio::fs::write(repo_path.join("README.md"), "# Test Repository\n")
        .await
        .unwrap();
    tokio::fs::write(repo_path.join("initial.txt"), "initial content\n")
        .await
        .unwrap();
    git(&repo_path, &["add", "README.md", "initial.txt"]).await;
    git(&repo_path, &["commit", "-q", "-m", "Initial commit"]).await;

    (temp_dir, repo_path)
}

fn dispatcher() -> Dispatcher {
    Dispatcher::new(&Config {
        typecheck_enabled: false,
        ..Config::default()
    })
}

fn dispatcher_without_sed() -> Dispatcher {
    Dispatcher::new(&Config {
        typecheck_enabled: false,
        sed_enabled: false,
        ..Config::default()
    })
}

/// Dispatch and return the single text block
async fn call(dispatcher: &Dispatcher, tool: &str, repo: &Path, mut args: Value) -> String {
    args["repo_path"] = json!(repo);
    let content = dispatcher.call(tool, args).await.unwrap();
    assert_eq!(content.len(), 1);
    content[0].as_text().to_string()
}

#[tokio::test]
async fn test_status() {
    let (_temp, repo) = create_test_repo().await;
    let d = dispatcher();

    let status = call(&d, "git_status", &repo, json!({})).await;
    assert!(status.starts_with("Repository status:\n"));
    assert!(status.contains("nothing to commit, working tree clean"));

    tokio::fs::write(repo.join("new_file.txt"), "new").await.unwrap();
    let status = call(&d, "git_status", &repo, json!({})).await;
    assert!(status.contains("new_file.txt"));
    assert!(status.contains("Untracked files"));
}

#[tokio::test]
async fn test_diff_variants() {
    let (_temp, repo) = create_test_repo().await;
    let d = dispatcher();

    tokio::fs::write(repo.join("initial.txt"), "modified content\n")
        .await
        .unwrap();
    let diff = call(&d, "git_diff_unstaged", &repo, json!({})).await;
    assert!(diff.starts_with("Unstaged changes:\n"));
    assert!(diff.contains("-initial content"));
    assert!(diff.contains("+modified content"));

    let diff = call(&d, "git_diff", &repo, json!({ "target": "HEAD" })).await;
    assert!(diff.starts_with("Diff with HEAD:\n"));
    assert!(diff.contains("+modified content"));

    tokio::fs::write(repo.join("staged.txt"), "staged content\n")
        .await
        .unwrap();
    git(&repo, &["add", "staged.txt"]).await;
    let diff = call(&d, "git_diff_staged", &repo, json!({})).await;
    assert!(diff.starts_with("Staged changes:\n"));
    assert!(diff.contains("+staged content"));
    assert!(!diff.contains("+modified content"));
}

#[tokio::test]
async fn test_commit_and_log() {
    let (_temp, repo) = create_test_repo().await;
    let d = dispatcher();

    tokio::fs::write(repo.join("commit.txt"), "to commit\n")
        .await
        .unwrap();
    let result = call(&d, "git_add", &repo, json!({ "files": ["commit.txt"] })).await;
    assert_eq!(result, "Files staged successfully");

    let result = call(&d, "git_commit", &repo, json!({ "message": "Test commit message" })).await;
    let head = git(&repo, &["rev-parse", "HEAD"]).await;
    assert_eq!(
        result,
        format!("Changes committed successfully with hash {}", head)
    );

    let log = call(&d, "git_log", &repo, json!({ "max_count": 1 })).await;
    assert!(log.starts_with("Commit history:\n"));
    assert!(log.contains(&format!("Commit: {}", head)));
    assert!(log.contains("Author: Test User"));
    assert!(log.contains("Message: Test commit message"));
    assert!(!log.contains("Initial commit"));

    let log = call(&d, "git_log", &repo, json!({})).await;
    assert_eq!(log.matches("Commit: ").count(), 2);

    let result = call(&d, "git_commit", &repo, json!({ "message": "Empty" })).await;
    assert!(result.starts_with("Error committing changes:"));
}

#[tokio::test]
async fn test_add_and_reset() {
    let (_temp, repo) = create_test_repo().await;
    let d = dispatcher();

    tokio::fs::write(repo.join("reset_file.txt"), "x\n").await.unwrap();
    call(&d, "git_add", &repo, json!({ "files": ["reset_file.txt"] })).await;
    assert_eq!(
        git(&repo, &["diff", "--cached", "--name-only"]).await,
        "reset_file.txt"
    );

    let result = call(&d, "git_reset", &repo, json!({})).await;
    assert_eq!(result, "All staged changes reset");
    assert_eq!(git(&repo, &["diff", "--cached", "--name-only"]).await, "");
    assert!(repo.join("reset_file.txt").exists());

    let result = call(&d, "git_add", &repo, json!({ "files": ["missing.txt"] })).await;
    assert!(result.starts_with("Error staging files:"));
}

#[tokio::test]
async fn test_create_branch_and_checkout() {
    let (_temp, repo) = create_test_repo().await;
    let d = dispatcher();

    let result = call(&d, "git_create_branch", &repo, json!({ "branch_name": "feature" })).await;
    assert_eq!(result, "Created branch 'feature' from 'main'");
    assert_eq!(
        git(&repo, &["rev-parse", "feature"]).await,
        git(&repo, &["rev-parse", "main"]).await
    );

    let result = call(
        &d,
        "git_create_branch",
        &repo,
        json!({ "branch_name": "another_branch", "base_branch": "feature" }),
    )
    .await;
    assert_eq!(result, "Created branch 'another_branch' from 'feature'");

    let result = call(
        &d,
        "git_create_branch",
        &repo,
        json!({ "branch_name": "orphan", "base_branch": "ghost" }),
    )
    .await;
    assert_eq!(result, "Error: base 'ghost' not found");

    let result = call(&d, "git_checkout", &repo, json!({ "branch_name": "feature" })).await;
    assert_eq!(result, "Switched to branch 'feature'");
    assert_eq!(git(&repo, &["symbolic-ref", "--short", "HEAD"]).await, "feature");

    let result = call(&d, "git_checkout", &repo, json!({ "branch_name": "nope" })).await;
    assert_eq!(result, "Error: branch 'nope' not found");
}

#[tokio::test]
async fn test_show() {
    let (_temp, repo) = create_test_repo().await;
    let d = dispatcher();
    let root = git(&repo, &["rev-parse", "HEAD"]).await;

    // Root commit is diffed against the empty tree
    let result = call(&d, "git_show", &repo, json!({ "revision": root })).await;
    assert!(result.starts_with(&format!("Commit: {}\n", root)));
    assert!(result.contains("Message: Initial commit"));
    assert!(result.contains("+# Test Repository"));
    assert!(result.contains("+initial content"));

    tokio::fs::write(repo.join("initial.txt"), "second\n").await.unwrap();
    git(&repo, &["commit", "-q", "-am", "Second"]).await;
    let result = call(&d, "git_show", &repo, json!({ "revision": "HEAD" })).await;
    assert!(result.contains("-initial content"));
    assert!(result.contains("+second"));
    assert!(!result.contains("+# Test Repository"));

    let result = call(&d, "git_show", &repo, json!({ "revision": "does-not-exist" })).await;
    assert_eq!(result, "Error: revision 'does-not-exist' not found");
}

#[tokio::test]
async fn test_stage_all() {
    let (_temp, repo) = create_test_repo().await;
    let d = dispatcher();

    tokio::fs::write(repo.join("file1.txt"), "1").await.unwrap();
    tokio::fs::write(repo.join("file2.txt"), "2").await.unwrap();

    let result = call(&d, "git_stage_all", &repo, json!({})).await;
    assert_eq!(result, "All files staged successfully.");
    let staged = git(&repo, &["diff", "--cached", "--name-only"]).await;
    assert!(staged.contains("file1.txt"));
    assert!(staged.contains("file2.txt"));
}

#[tokio::test]
async fn test_apply_invalid_patch_leaves_tree_unchanged() {
    let (_temp, repo) = create_test_repo().await;
    let d = dispatcher();
    let status_before = git(&repo, &["status", "--porcelain"]).await;

    let result = call(
        &d,
        "git_apply_diff",
        &repo,
        json!({ "diff_content": "this is not a patch" }),
    )
    .await;
    assert!(result.starts_with("<![CDATA[Error applying diff:"));
    assert!(result.ends_with("]]>"));

    let result = call(
        &d,
        "git_apply_diff",
        &repo,
        json!({ "diff_content": "--- a/initial.txt\n+++ b/initial.txt\n@@ -1 +1 @@\n-not what is there\n+new\n" }),
    )
    .await;
    assert!(result.contains("Error applying diff:"));

    assert_eq!(
        tokio::fs::read_to_string(repo.join("initial.txt"))
            .await
            .unwrap(),
        "initial content\n"
    );
    assert_eq!(git(&repo, &["status", "--porcelain"]).await, status_before);
}

#[tokio::test]
async fn test_apply_valid_patch() {
    let (_temp, repo) = create_test_repo().await;
    let d = dispatcher();

    let patch = "--- a/initial.txt\n+++ b/initial.txt\n@@ -1 +1 @@\n-initial content\n+patched content\n";
    let result = call(&d, "git_apply_diff", &repo, json!({ "diff_content": patch })).await;
    assert!(result.starts_with("<![CDATA[Diff applied successfully"));
    assert!(result.contains("\nChanges in initial.txt:\nDiff:\n"));
    assert!(result.contains("+patched content"));
    assert_eq!(
        tokio::fs::read_to_string(repo.join("initial.txt"))
            .await
            .unwrap(),
        "patched content\n"
    );
}

/// Commit `base`, capture the diff to `edited`, then commit `drifted`
async fn patch_against_drift(repo: &Path, base: &str, edited: &str, drifted: &str) -> String {
    let file = repo.join("f.txt");
    tokio::fs::write(&file, base).await.unwrap();
    git(repo, &["add", "f.txt"]).await;
    git(repo, &["commit", "-q", "-m", "base"]).await;

    tokio::fs::write(&file, edited).await.unwrap();
    let patch = format!("{}\n", git(repo, &["diff", "--no-color"]).await);
    git(repo, &["checkout", "-q", "--", "f.txt"]).await;

    tokio::fs::write(&file, drifted).await.unwrap();
    git(repo, &["commit", "-q", "-am", "drift"]).await;
    patch
}

#[tokio::test]
async fn test_apply_patch_three_way_merges_drift() {
    let (_temp, repo) = create_test_repo().await;
    let d = dispatcher();
    let patch = patch_against_drift(
        &repo,
        "l1\nl2\nl3\nl4\nl5\nl6\nl7\n",
        "l1\nl2\nl3\nL4\nl5\nl6\nl7\n",
        "L1-drift\nl2\nl3\nl4\nl5\nl6\nl7\n",
    )
    .await;

    let result = call(&d, "git_apply_diff", &repo, json!({ "diff_content": patch })).await;
    assert!(result.starts_with("<![CDATA[Diff applied successfully"), "{}", result);
    assert_eq!(
        tokio::fs::read_to_string(repo.join("f.txt")).await.unwrap(),
        "L1-drift\nl2\nl3\nL4\nl5\nl6\nl7\n"
    );
}

#[tokio::test]
async fn test_apply_patch_three_way_conflict_restores_tree() {
    let (_temp, repo) = create_test_repo().await;
    let d = dispatcher();
    let drifted = "one\nTWO-drift\nthree\nfour\nfive\n";
    let patch = patch_against_drift(
        &repo,
        "one\ntwo\nthree\nfour\nfive\n",
        "one\ntwo\nTHREE\nfour\nfive\n",
        drifted,
    )
    .await;

    let result = call(&d, "git_apply_diff", &repo, json!({ "diff_content": patch })).await;
    assert!(result.starts_with("<![CDATA[Error applying diff:"), "{}", result);
    assert_eq!(
        tokio::fs::read_to_string(repo.join("f.txt")).await.unwrap(),
        drifted
    );
    assert_eq!(git(&repo, &["status", "--porcelain"]).await, "");
    assert_eq!(git(&repo, &["ls-files", "--unmerged"]).await, "");
}

#[tokio::test]
async fn test_write_and_read_file() {
    let (_temp, repo) = create_test_repo().await;
    let d = dispatcher();

    let content = "line one\n<b>markup</b>\n";
    let result = call(
        &d,
        "write_to_file",
        &repo,
        json!({ "file_path": "new_dir/new_file.txt", "content": content }),
    )
    .await;
    assert_eq!(
        result,
        "<![CDATA[Successfully created new file: new_dir/new_file.txt.]]>"
    );

    let result = call(&d, "git_read_file", &repo, json!({ "file_path": "new_dir/new_file.txt" })).await;
    assert_eq!(
        result,
        format!("<![CDATA[Content of new_dir/new_file.txt:\n{}]]>", content)
    );

    // Rewriting the same content reports no changes
    let result = call(
        &d,
        "write_to_file",
        &repo,
        json!({ "file_path": "new_dir/new_file.txt", "content": content }),
    )
    .await;
    assert!(result.contains("No changes detected (file content was identical)."));

    let result = call(&d, "git_read_file", &repo, json!({ "file_path": "../outside.txt" })).await;
    assert_eq!(result, "<![CDATA[Error: file wasn't found or out of cwd]]>");
}

/// Same request through both pipelines must leave the same bytes on disk
#[tokio::test]
async fn test_search_and_replace_matches_across_strategies() {
    let cases: Vec<(Value, &str)> = vec![
        (
            json!({ "search_string": "search_term", "replace_string": "replace_term" }),
            "line1\nreplace_term\nline3",
        ),
        (
            json!({ "search_string": "search", "replace_string": "X", "start_line": 3 }),
            "line1 search\nline2 search\nline3 X\nline4 X",
        ),
        (
            json!({ "search_string": "search", "replace_string": "Y", "end_line": 2 }),
            "line1 Y\nline2 Y\nline3 search\nline4 search",
        ),
        (
            json!({ "search_string": "search", "replace_string": "replaced", "start_line": 2, "end_line": 3 }),
            "line1 search\nline2 replaced\nline3 replaced\nline4 search",
        ),
    ];

    for (args, expected) in cases {
        for d in [dispatcher(), dispatcher_without_sed()] {
            let (_temp, repo) = create_test_repo().await;
            let original = if args["search_string"] == "search_term" {
                "line1\nsearch_term\nline3"
            } else {
                "line1 search\nline2 search\nline3 search\nline4 search"
            };
            tokio::fs::write(repo.join("target.txt"), original).await.unwrap();

            let mut args = args.clone();
            args["file_path"] = json!("target.txt");
            let result = call(&d, "search_and_replace", &repo, args).await;
            assert!(result.contains("using literal search."), "{}", result);
            assert_eq!(
                tokio::fs::read_to_string(repo.join("target.txt"))
                    .await
                    .unwrap(),
                expected
            );
        }
    }
}

#[tokio::test]
async fn test_search_and_replace_outcomes() {
    let (_temp, repo) = create_test_repo().await;
    let d = dispatcher();
    tokio::fs::write(repo.join("regex.txt"), "apple 123 banana 456")
        .await
        .unwrap();

    let result = call(
        &d,
        "search_and_replace",
        &repo,
        json!({ "file_path": "regex.txt", "search_string": "\\d+", "replace_string": "XXX" }),
    )
    .await;
    assert!(result.contains("Successfully replaced '\\d+' with 'XXX' in regex.txt using regex search."));
    assert_eq!(
        tokio::fs::read_to_string(repo.join("regex.txt")).await.unwrap(),
        "apple XXX banana XXX"
    );

    // Second run finds nothing left to replace
    let result = call(
        &d,
        "search_and_replace",
        &repo,
        json!({ "file_path": "regex.txt", "search_string": "\\d+", "replace_string": "XXX" }),
    )
    .await;
    assert!(result.contains("No changes made. '\\d+' not found"));

    let result = call(
        &d,
        "search_and_replace",
        &repo,
        json!({ "file_path": "regex.txt", "search_string": "[unclosed", "replace_string": "x" }),
    )
    .await;
    assert!(result.contains("Error: Invalid regex pattern"));
    assert_eq!(
        tokio::fs::read_to_string(repo.join("regex.txt")).await.unwrap(),
        "apple XXX banana XXX"
    );

    let result = call(
        &d,
        "search_and_replace",
        &repo,
        json!({ "file_path": "missing.txt", "search_string": "a", "replace_string": "b" }),
    )
    .await;
    assert_eq!(result, "<![CDATA[Error: File not found: missing.txt]]>");
}

#[tokio::test]
async fn test_search_and_replace_ignore_case() {
    let (_temp, repo) = create_test_repo().await;
    let d = dispatcher();
    tokio::fs::write(
        repo.join("literal.txt"),
        "Hello World\nhello world\nGoodbye World",
    )
    .await
    .unwrap();

    let result = call(
        &d,
        "search_and_replace",
        &repo,
        json!({
            "file_path": "literal.txt",
            "search_string": "hello world",
            "replace_string": "hi there",
            "ignore_case": true
        }),
    )
    .await;
    assert!(result.contains("using literal search."));
    assert_eq!(
        tokio::fs::read_to_string(repo.join("literal.txt")).await.unwrap(),
        "hi there\nhi there\nGoodbye World"
    );
}

#[tokio::test]
async fn test_primary_strategy_can_be_disabled() {
    let (_temp, repo) = create_test_repo().await;
    let d = dispatcher().with_primary_replace_strategy(None::<Arc<dyn ReplaceStrategy>>);
    tokio::fs::write(repo.join("a.txt"), "foo foo\n").await.unwrap();

    call(
        &d,
        "search_and_replace",
        &repo,
        json!({ "file_path": "a.txt", "search_string": "foo", "replace_string": "bar" }),
    )
    .await;
    assert_eq!(
        tokio::fs::read_to_string(repo.join("a.txt")).await.unwrap(),
        "bar bar\n"
    );
}

#[tokio::test]
async fn test_execute_command_report() {
    let (_temp, repo) = create_test_repo().await;
    let d = dispatcher();

    let result = call(&d, "execute_command", &repo, json!({ "command": "echo hello" })).await;
    assert!(result.contains("STDOUT:\nhello"));

    let result = call(
        &d,
        "execute_command",
        &repo,
        json!({ "command": "ls non_existent_file" }),
    )
    .await;
    assert!(result.contains("STDERR:"));
    assert!(result.contains("Command failed with exit code"));
}

#[tokio::test]
async fn test_project_env_overlay_reaches_commands() {
    let (_temp, repo) = create_test_repo().await;
    tokio::fs::write(repo.join(".env"), "GIT_MCP_TEST_VALUE=from-dotenv\n")
        .await
        .unwrap();
    let d = dispatcher();

    let result = call(
        &d,
        "execute_command",
        &repo,
        json!({ "command": "echo $GIT_MCP_TEST_VALUE" }),
    )
    .await;
    assert_eq!(result, "STDOUT:\nfrom-dotenv\n");
}

#[tokio::test]
async fn test_protocol_errors() {
    let (_temp, repo) = create_test_repo().await;
    let d = dispatcher();

    let err = d
        .call("invalid_tool", json!({ "repo_path": repo }))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Tool(ToolError::UnknownTool(ref name)) if name == "invalid_tool"));

    let err = d.call("git_status", json!({})).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Tool(ToolError::MissingArgument { ref argument, .. }) if argument == "repo_path"
    ));

    let not_a_repo = TempDir::new().unwrap();
    let err = d
        .call("git_status", json!({ "repo_path": not_a_repo.path() }))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Git(_)));
}

#[tokio::test]
async fn test_catalog_lists_every_tool() {
    let d = dispatcher();
    let names: Vec<&str> = d.list_tools().iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names.len(), 17);
    for name in [
        "git_status",
        "git_diff_unstaged",
        "git_diff_staged",
        "git_diff",
        "git_commit",
        "git_add",
        "git_reset",
        "git_log",
        "git_create_branch",
        "git_checkout",
        "git_show",
        "git_apply_diff",
        "git_read_file",
        "git_stage_all",
        "search_and_replace",
        "write_to_file",
        "execute_command",
    ] {
        assert!(names.contains(&name), "missing {}", name);
    }
}
