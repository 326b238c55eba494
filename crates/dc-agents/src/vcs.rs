//! Read-only VCS diff for the editor adapter (§4.N), with a fallback to
//! raw file contents when the working directory isn't a git repository
//! or the diff can't be computed.

use std::path::Path;

/// Diff (or, on failure, raw content) for `editable_files` relative to
/// `working_dir`.
pub fn diff_or_content(working_dir: &Path, editable_files: &[String]) -> String {
    match git2::Repository::discover(working_dir) {
        Ok(repo) => diff_via_git2(&repo, working_dir, editable_files).unwrap_or_else(|_| raw_content_fallback(working_dir, editable_files)),
        Err(_) => raw_content_fallback(working_dir, editable_files),
    }
}

fn diff_via_git2(repo: &git2::Repository, working_dir: &Path, editable_files: &[String]) -> Result<String, git2::Error> {
    let mut opts = git2::DiffOptions::new();
    for file in editable_files {
        opts.pathspec(file);
    }
    opts.include_untracked(true);

    let head_tree = repo.head().ok().and_then(|h| h.peel_to_tree().ok());
    let diff = repo.diff_tree_to_workdir_with_index(head_tree.as_ref(), Some(&mut opts))?;

    let mut output = String::new();
    diff.print(git2::DiffFormat::Patch, |_delta, _hunk, line| {
        let origin = line.origin();
        if origin == '+' || origin == '-' || origin == ' ' {
            output.push(origin);
        }
        output.push_str(&String::from_utf8_lossy(line.content()));
        true
    })?;

    if output.is_empty() {
        return Ok(raw_content_fallback(working_dir, editable_files));
    }
    Ok(output)
}

fn raw_content_fallback(working_dir: &Path, editable_files: &[String]) -> String {
    let mut text = String::from("Git diff unavailable. Current file contents:\n\n");
    for file in editable_files {
        let full_path = working_dir.join(file);
        match std::fs::read_to_string(&full_path) {
            Ok(content) => {
                text.push_str(&format!("--- {file} ---\n{content}\n\n"));
            }
            Err(_) => {
                text.push_str(&format!("--- {file} --- (file not found)\n\n"));
            }
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falls_back_to_raw_content_outside_a_git_repo() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.py"), "print(1)\n").unwrap();
        let diff = diff_or_content(dir.path(), &["a.py".to_string()]);
        assert!(diff.contains("print(1)"));
    }

    #[test]
    fn reports_missing_file_in_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let diff = diff_or_content(dir.path(), &["missing.py".to_string()]);
        assert!(diff.contains("file not found"));
    }
}
