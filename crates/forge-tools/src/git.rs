//! Git delivery tools
//!
//! These shell out to `git` and `gh` inside the sandbox. Both binaries are
//! part of the worker image contract.

use serde_json::{json, Value};

use forge_core::{ForgeError, Result};

use crate::context::{Args, ToolEnv};

/// Stage everything and commit. An empty diff is reported, not an error.
pub async fn make_commit(env: &ToolEnv, args: &Args<'_>) -> Result<Value> {
    let message = args.non_empty_str("message")?;

    let add = env
        .sandbox
        .run_program("git", &["add", "-A"], env.git_timeout, &env.cancel)
        .await?;
    if !add.success() {
        return Err(ForgeError::ToolExecution(format!(
            "git add failed: {}",
            first_line(&add.stderr)
        )));
    }

    let commit = env
        .sandbox
        .run_program(
            "git",
            &["commit", "-m", message],
            env.git_timeout,
            &env.cancel,
        )
        .await?;
    if !commit.success() {
        if commit.stdout.contains("nothing to commit")
            || commit.stderr.contains("nothing to commit")
        {
            tracing::info!("Commit skipped: working tree clean");
            return Ok(json!({ "committed": false, "reason": "nothing to commit" }));
        }
        return Err(ForgeError::ToolExecution(format!(
            "git commit failed: {}",
            first_line(&commit.stderr)
        )));
    }

    let head = env
        .sandbox
        .run_program("git", &["rev-parse", "HEAD"], env.git_timeout, &env.cancel)
        .await?;
    let sha = head.stdout.trim().to_string();

    tracing::info!(sha = %sha, "Commit created");
    Ok(json!({ "committed": true, "sha": sha }))
}

/// Poll CI checks for a pull request via `gh pr checks`
///
/// Overall status: failing beats pending beats passing. A PR with zero
/// checks reports pending, since checks may not have been scheduled yet.
pub async fn watch_pr_ci_status(env: &ToolEnv, args: &Args<'_>) -> Result<Value> {
    let pr_number = args.integer("pr_number")?;
    if pr_number <= 0 {
        return Err(ForgeError::InvalidArguments(format!(
            "Invalid PR number {}",
            pr_number
        )));
    }

    let out = env
        .sandbox
        .run_program(
            "gh",
            &["pr", "checks", &pr_number.to_string()],
            env.git_timeout,
            &env.cancel,
        )
        .await?;

    // `gh pr checks` exits non-zero both for failing checks and for a PR
    // with no checks at all; only the latter is not an answer.
    if !out.success() && out.stdout.trim().is_empty() {
        if out.stderr.contains("no checks") {
            return Ok(json!({ "pr_number": pr_number, "overall": "pending", "checks": [] }));
        }
        return Err(ForgeError::ToolExecution(format!(
            "gh pr checks failed: {}",
            first_line(&out.stderr)
        )));
    }

    let checks = parse_checks(&out.stdout);
    let overall = overall_status(&checks);

    tracing::info!(pr_number, overall, count = checks.len(), "CI status");
    Ok(json!({
        "pr_number": pr_number,
        "overall": overall,
        "checks": checks
            .iter()
            .map(|c| {
                json!({
                    "name": c.name,
                    "status": c.status,
                    "elapsed": c.elapsed,
                    "url": c.url,
                })
            })
            .collect::<Vec<_>>(),
    }))
}

#[derive(Debug, PartialEq)]
struct Check {
    name: String,
    status: String,
    elapsed: Option<String>,
    url: Option<String>,
}

/// Parse the tab-separated `gh pr checks` table: name, status, elapsed, url
fn parse_checks(stdout: &str) -> Vec<Check> {
    stdout
        .lines()
        .filter_map(|line| {
            let mut fields = line.split('\t');
            let name = fields.next()?.trim();
            let status = fields.next()?.trim();
            if name.is_empty() || status.is_empty() {
                return None;
            }
            let elapsed = fields.next().map(str::trim).filter(|s| !s.is_empty());
            let url = fields.next().map(str::trim).filter(|s| !s.is_empty());
            Some(Check {
                name: name.to_string(),
                status: status.to_lowercase(),
                elapsed: elapsed.map(str::to_string),
                url: url.map(str::to_string),
            })
        })
        .collect()
}

fn overall_status(checks: &[Check]) -> &'static str {
    if checks.is_empty() {
        return "pending";
    }
    if checks.iter().any(|c| c.status == "fail" || c.status == "failing") {
        return "failing";
    }
    if checks
        .iter()
        .any(|c| c.status == "pending" || c.status == "queued" || c.status == "in_progress")
    {
        return "pending";
    }
    "passing"
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or("").trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_sandbox::Sandbox;
    use forge_session::InMemoryMemoryStore;
    use serde_json::json;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn args_map(value: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
        value.as_object().unwrap().clone()
    }

    async fn git_env() -> (TempDir, ToolEnv) {
        let dir = TempDir::new().unwrap();
        let sandbox = Sandbox::new(dir.path()).unwrap();
        let env = ToolEnv::new(sandbox, Arc::new(InMemoryMemoryStore::new()), "u1");
        let cancel = env.cancel.clone();
        for setup in [
            "git init -q",
            "git config user.email forge@example.com",
            "git config user.name forge",
        ] {
            let out = env
                .sandbox
                .run_shell(setup, env.git_timeout, &cancel)
                .await
                .unwrap();
            assert!(out.success(), "{}: {}", setup, out.stderr);
        }
        (dir, env)
    }

    #[tokio::test]
    async fn test_make_commit_creates_commit() {
        let (dir, env) = git_env().await;
        std::fs::write(dir.path().join("a.txt"), "content").unwrap();

        let map = args_map(json!({"message": "Add a.txt"}));
        let out = make_commit(&env, &Args::new(&map)).await.unwrap();
        assert_eq!(out["committed"], true);
        assert_eq!(out["sha"].as_str().unwrap().len(), 40);
    }

    #[tokio::test]
    async fn test_make_commit_clean_tree_reports_nothing() {
        let (dir, env) = git_env().await;
        std::fs::write(dir.path().join("a.txt"), "content").unwrap();
        let map = args_map(json!({"message": "first"}));
        make_commit(&env, &Args::new(&map)).await.unwrap();

        let map = args_map(json!({"message": "second"}));
        let out = make_commit(&env, &Args::new(&map)).await.unwrap();
        assert_eq!(out["committed"], false);
        assert_eq!(out["reason"], "nothing to commit");
    }

    #[test]
    fn test_parse_checks_table() {
        let stdout = "build\tpass\t1m2s\thttps://ci/1\n\
                      test\tfail\t2m\thttps://ci/2\n\
                      lint\tpending\t\t\n";
        let checks = parse_checks(stdout);
        assert_eq!(checks.len(), 3);
        assert_eq!(checks[0].name, "build");
        assert_eq!(checks[0].status, "pass");
        assert_eq!(checks[0].elapsed.as_deref(), Some("1m2s"));
        assert_eq!(checks[0].url.as_deref(), Some("https://ci/1"));
        assert_eq!(checks[2].elapsed, None);
        assert_eq!(overall_status(&checks), "failing");
    }

    #[test]
    fn test_overall_status_precedence() {
        fn check(status: &str) -> Check {
            Check {
                name: "a".to_string(),
                status: status.to_string(),
                elapsed: None,
                url: None,
            }
        }

        assert_eq!(overall_status(&[check("pass")]), "passing");
        assert_eq!(overall_status(&[check("pass"), check("pending")]), "pending");
        assert_eq!(overall_status(&[]), "pending");
    }
}
