//! File tools
//!
//! All paths arrive workspace-relative and pass through the sandbox before
//! any filesystem access. Mutations additionally go through
//! `ensure_writable` so protected entries stay untouched.

use serde_json::{json, Value};

use forge_core::{ForgeError, Result};

use crate::context::{Args, ToolEnv};

/// Recursive listing: an indented tree rendering plus a flat list of
/// file paths relative to the listed directory. Hidden entries (.git and
/// friends) are skipped at every level.
pub async fn list_files(env: &ToolEnv, args: &Args<'_>) -> Result<Value> {
    let rel = args.str_opt("path").unwrap_or(".");
    let dir = env.sandbox.resolve(rel)?;
    if !dir.is_dir() {
        return Err(ForgeError::ToolExecution(format!(
            "Directory not found: {}",
            rel
        )));
    }

    let mut tree = vec![format!("{}/", rel)];
    let mut files = Vec::new();
    walk(&dir, &dir, 0, &mut tree, &mut files)?;

    Ok(json!({ "path": rel, "tree": tree.join("\n"), "files": files }))
}

fn walk(
    root: &std::path::Path,
    dir: &std::path::Path,
    level: usize,
    tree: &mut Vec<String>,
    files: &mut Vec<String>,
) -> Result<()> {
    let mut file_names = Vec::new();
    let mut dir_names = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') {
            continue;
        }
        if entry.file_type()?.is_dir() {
            dir_names.push(name);
        } else {
            file_names.push(name);
        }
    }
    file_names.sort();
    dir_names.sort();

    let indent = "  ".repeat(level + 1);
    for name in &file_names {
        tree.push(format!("{}{}", indent, name));
        let rel = dir
            .join(name)
            .strip_prefix(root)
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_else(|_| name.clone());
        files.push(rel);
    }
    for name in &dir_names {
        tree.push(format!("{}{}/", indent, name));
        walk(root, &dir.join(name), level + 1, tree, files)?;
    }
    Ok(())
}

pub async fn read_file(env: &ToolEnv, args: &Args<'_>) -> Result<Value> {
    let rel = args.non_empty_str("path")?;
    let path = env.sandbox.resolve(rel)?;
    let content = std::fs::read_to_string(&path)?;
    let numbered: String = content
        .lines()
        .enumerate()
        .map(|(i, line)| format!("{:>5} | {}\n", i + 1, line))
        .collect();
    Ok(json!({ "path": rel, "content": content, "numbered": numbered }))
}

pub async fn write_file(env: &ToolEnv, args: &Args<'_>) -> Result<Value> {
    let rel = args.non_empty_str("path")?;
    let content = args.str("content")?;

    env.sandbox.ensure_writable(rel)?;
    let path = env.sandbox.resolve(rel)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, content)?;

    tracing::debug!(path = rel, bytes = content.len(), "Wrote file");
    Ok(json!({ "path": rel, "bytes_written": content.len() }))
}

/// Apply a unified diff, preferring `git apply` and falling back to
/// `patch -p1` for diffs git refuses (e.g. fuzzier context)
pub async fn apply_patch(env: &ToolEnv, args: &Args<'_>) -> Result<Value> {
    let rel = args.non_empty_str("path")?;
    let diff = args.non_empty_str("diff")?;

    env.sandbox.ensure_writable(rel)?;
    env.sandbox.resolve(rel)?;

    let git = env
        .sandbox
        .run_program_with_stdin(
            "git",
            &["apply", "--whitespace=nowarn", "-"],
            diff.as_bytes(),
            env.git_timeout,
            &env.cancel,
        )
        .await?;
    if git.success() {
        return Ok(json!({ "path": rel, "applied_with": "git apply" }));
    }

    let fallback = env
        .sandbox
        .run_program_with_stdin(
            "patch",
            &["-p1", "--no-backup-if-mismatch"],
            diff.as_bytes(),
            env.git_timeout,
            &env.cancel,
        )
        .await?;
    if fallback.success() {
        return Ok(json!({ "path": rel, "applied_with": "patch" }));
    }

    Err(ForgeError::ToolExecution(format!(
        "Patch did not apply to '{}': {}",
        rel,
        first_line(&git.stderr)
    )))
}

pub async fn delete_file(env: &ToolEnv, args: &Args<'_>) -> Result<Value> {
    let rel = args.non_empty_str("path")?;
    env.sandbox.ensure_writable(rel)?;
    let path = env.sandbox.resolve(rel)?;

    if path.is_dir() {
        std::fs::remove_dir_all(&path)?;
    } else {
        std::fs::remove_file(&path)?;
    }

    tracing::debug!(path = rel, "Deleted");
    Ok(json!({ "path": rel, "deleted": true }))
}

pub async fn rename_file(env: &ToolEnv, args: &Args<'_>) -> Result<Value> {
    let source = args.non_empty_str("source")?;
    let destination = args.non_empty_str("destination")?;

    env.sandbox.ensure_writable(source)?;
    env.sandbox.ensure_writable(destination)?;
    let from = env.sandbox.resolve(source)?;
    let to = env.sandbox.resolve(destination)?;
    if let Some(parent) = to.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::rename(&from, &to)?;

    Ok(json!({ "source": source, "destination": destination }))
}

/// Discard uncommitted changes to one file via `git checkout`
pub async fn restore_file(env: &ToolEnv, args: &Args<'_>) -> Result<Value> {
    let rel = args.non_empty_str("path")?;
    env.sandbox.ensure_writable(rel)?;
    env.sandbox.resolve(rel)?;

    let out = env
        .sandbox
        .run_program(
            "git",
            &["checkout", "--", rel],
            env.git_timeout,
            &env.cancel,
        )
        .await?;
    if !out.success() {
        return Err(ForgeError::ToolExecution(format!(
            "Failed to restore '{}': {}",
            rel,
            first_line(&out.stderr)
        )));
    }
    Ok(json!({ "path": rel, "restored": true }))
}

/// Revert every tracked file and delete untracked ones, returning the
/// checkout to its cloned state
pub async fn reset_all(env: &ToolEnv) -> Result<Value> {
    let reset = env
        .sandbox
        .run_program(
            "git",
            &["reset", "--hard", "HEAD"],
            env.git_timeout,
            &env.cancel,
        )
        .await?;
    if !reset.success() {
        return Err(ForgeError::ToolExecution(format!(
            "git reset failed: {}",
            first_line(&reset.stderr)
        )));
    }

    let clean = env
        .sandbox
        .run_program("git", &["clean", "-fd"], env.git_timeout, &env.cancel)
        .await?;
    if !clean.success() {
        return Err(ForgeError::ToolExecution(format!(
            "git clean failed: {}",
            first_line(&clean.stderr)
        )));
    }

    tracing::info!("Workspace reset to the cloned state");
    Ok(json!({ "reset": true }))
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or("").trim()
}
