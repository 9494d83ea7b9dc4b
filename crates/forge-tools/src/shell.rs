//! Shell and verification tools

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{json, Value};

use forge_core::Result;

use crate::context::{Args, ToolEnv};

/// Where frontend verification screenshots are collected from
const SCREENSHOT_DIR: &str = "screenshots";

pub async fn run_in_bash_session(env: &ToolEnv, args: &Args<'_>) -> Result<Value> {
    let command = args.non_empty_str("command")?;
    tracing::debug!(command, "Running shell command");

    let out = env
        .sandbox
        .run_shell(command, env.sandbox.shell_timeout(), &env.cancel)
        .await?;

    Ok(json!({
        "command": command,
        "exit_code": out.exit_code,
        "stdout": out.stdout,
        "stderr": out.stderr,
    }))
}

pub fn frontend_verification_instructions() -> Result<Value> {
    Ok(json!({
        "instructions": [
            "Start the frontend with its usual dev command and wait for it to serve.",
            "Exercise every page or component your changes touch.",
            format!("Save evidence screenshots as PNG or JPEG under '{}/'.", SCREENSHOT_DIR),
            "Call frontend_verification_complete when finished.",
        ],
    }))
}

/// Collect screenshots saved during verification and return them inline,
/// base64-encoded
pub async fn frontend_verification_complete(env: &ToolEnv, args: &Args<'_>) -> Result<Value> {
    let notes = args.str_opt("notes").unwrap_or("");
    let dir = env.sandbox.resolve(SCREENSHOT_DIR)?;

    let mut screenshots = Vec::new();
    if dir.is_dir() {
        let mut paths: Vec<_> = std::fs::read_dir(&dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .collect();
        paths.sort();

        for path in paths {
            let media_type = match path.extension().and_then(|e| e.to_str()) {
                Some("png") => "image/png",
                Some("jpg") | Some("jpeg") => "image/jpeg",
                _ => continue,
            };
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let data = STANDARD.encode(std::fs::read(&path)?);
            screenshots.push(json!({
                "name": name,
                "media_type": media_type,
                "data": data,
            }));
        }
    }

    tracing::info!(count = screenshots.len(), "Frontend verification evidence collected");
    Ok(json!({ "notes": notes, "screenshots": screenshots }))
}
