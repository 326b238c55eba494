//! Non-interactive editor CLI adapter (§4.N).
//!
//! Runs the configured editor binary as a batch subprocess — one
//! invocation per task, argv built from the task's files and model,
//! no PTY and no interactive back-and-forth.

use crate::vcs;
use std::path::Path;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("working_dir is required")]
    MissingWorkingDir,
    #[error("failed to spawn editor CLI: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("failed to write message file: {0}")]
    MessageFile(#[source] std::io::Error),
}

pub struct EditorRunResult {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    pub diff: String,
    pub meaningful_changes: bool,
}

/// Run the editor CLI against `prompt`, returning its diff (or raw
/// content fallback) and whether the edited files show meaningful
/// content afterward.
pub async fn run(
    editor_cli_path: &str,
    working_dir: &Path,
    prompt: &str,
    model: &str,
    editable_files: &[String],
    readonly_files: &[String],
) -> Result<EditorRunResult, AdapterError> {
    if working_dir.as_os_str().is_empty() {
        return Err(AdapterError::MissingWorkingDir);
    }

    let message_file = tempfile::NamedTempFile::new().map_err(AdapterError::MessageFile)?;
    tokio::fs::write(message_file.path(), prompt)
        .await
        .map_err(AdapterError::MessageFile)?;

    let mut command = Command::new(editor_cli_path);
    command
        .current_dir(working_dir)
        .arg("--model")
        .arg(model)
        .arg("--yes-always")
        .arg("--no-auto-commits")
        .arg("--no-stream")
        .arg("--message-file")
        .arg(message_file.path());

    for file in editable_files {
        command.arg("--file").arg(file);
    }
    for file in readonly_files {
        command.arg("--read").arg(file);
    }

    command.stdin(Stdio::null()).stdout(Stdio::piped()).stderr(Stdio::piped());

    let mut child = command.spawn().map_err(AdapterError::Spawn)?;
    if let Some(mut stdin) = child.stdin.take() {
        let _ = stdin.shutdown().await;
    }
    let output = child.wait_with_output().await.map_err(AdapterError::Spawn)?;

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();

    let diff = vcs::diff_or_content(working_dir, editable_files);
    let meaningful_changes = check_meaningful_changes(working_dir, editable_files);

    Ok(EditorRunResult {
        success: output.status.success() && meaningful_changes,
        stdout,
        stderr,
        diff,
        meaningful_changes,
    })
}

const MEANINGFUL_PATTERNS: &[&str] = &[
    "def ", "class ", "import ", "from ", "async def", "return", "yield", "try:", "except:",
    "function", "const ", "let ", "var ", "export", "require", "=>", "interface", "type ",
    "{", "}", "[", "]", "(", ")", "=", "==", "!=",
];

/// Whether any `editable_files` contain enough real content to count
/// as a meaningful edit, rather than an empty or stub file.
fn check_meaningful_changes(working_dir: &Path, editable_files: &[String]) -> bool {
    for file in editable_files {
        let full_path = working_dir.join(file);
        let content = match std::fs::read_to_string(&full_path) {
            Ok(c) => c,
            Err(_) => continue,
        };
        let stripped = content.trim();
        if stripped.is_empty() {
            continue;
        }
        if stripped.len() > 10 {
            return true;
        }
        if stripped.lines().count() > 1 {
            return true;
        }
        let lower = content.to_lowercase();
        if MEANINGFUL_PATTERNS.iter().any(|p| lower.contains(&p.to_lowercase())) {
            return true;
        }
    }
    false
}
