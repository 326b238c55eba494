//! File conflict detection across parallel tasks (§4.J).

use dc_core::config::{ConflictConfig, ConflictVerbosity};
use dc_core::types::{ConflictInfo, TaskPairConflict};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Instant;

pub struct ConflictDetector {
    working_dir: PathBuf,
    config: ConflictConfig,
}

impl ConflictDetector {
    pub fn new(working_dir: impl Into<PathBuf>, config: ConflictConfig) -> Self {
        Self {
            working_dir: working_dir.into(),
            config,
        }
    }

    fn normalize(&self, file_path: &str) -> Option<PathBuf> {
        if file_path.is_empty() {
            return None;
        }
        let path = Path::new(file_path);
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.working_dir.join(path)
        };
        absolute.canonicalize().ok().or(Some(absolute))
    }

    /// Detect overlapping editable files across `tasks`: each entry is
    /// `(task_id, editable_files)`. Respects the configured timeout and
    /// the `enable_conflict_detection` flag.
    pub fn detect_conflicts(&self, tasks: &[(String, Vec<String>)]) -> ConflictInfo {
        if !self.config.enable_conflict_detection || tasks.is_empty() {
            return ConflictInfo::default();
        }

        let start = Instant::now();
        let timeout = std::time::Duration::from_secs(self.config.timeout_secs);

        let mut task_files: Vec<(String, HashSet<PathBuf>)> = Vec::new();
        let mut file_tasks: HashMap<PathBuf, Vec<String>> = HashMap::new();

        for (task_id, editable_files) in tasks {
            if start.elapsed() > timeout {
                return ConflictInfo {
                    timed_out: true,
                    ..ConflictInfo::default()
                };
            }
            let normalized: HashSet<PathBuf> = editable_files.iter().filter_map(|f| self.normalize(f)).collect();
            for path in &normalized {
                file_tasks.entry(path.clone()).or_default().push(task_id.clone());
            }
            task_files.push((task_id.clone(), normalized));
        }

        let mut conflicting_files: Vec<String> = Vec::new();
        for (path, owners) in &file_tasks {
            if owners.len() > 1 {
                conflicting_files.push(path.to_string_lossy().to_string());
            }
        }
        conflicting_files.sort();
        let has_conflicts = !conflicting_files.is_empty();

        let mut conflict_matrix = Vec::new();
        for i in 0..task_files.len() {
            for j in (i + 1)..task_files.len() {
                if start.elapsed() > timeout {
                    return ConflictInfo {
                        has_conflicts,
                        conflicting_files,
                        conflict_matrix,
                        timed_out: true,
                    };
                }
                let (_, files_a) = &task_files[i];
                let (_, files_b) = &task_files[j];
                let mut shared: Vec<String> = files_a
                    .intersection(files_b)
                    .map(|p| p.to_string_lossy().to_string())
                    .collect();
                if !shared.is_empty() {
                    shared.sort();
                    conflict_matrix.push(TaskPairConflict {
                        task_a: i,
                        task_b: j,
                        shared_paths: shared,
                    });
                }
            }
        }

        ConflictInfo {
            has_conflicts,
            conflicting_files,
            conflict_matrix,
            timed_out: false,
        }
    }

    /// Render a human-readable report at the configured verbosity.
    pub fn generate_report(&self, info: &ConflictInfo) -> String {
        let mut lines = vec!["--- File Conflict Report ---".to_string()];

        if info.timed_out {
            lines.push("WARNING: conflict detection timed out before completion.".to_string());
        }

        if !info.has_conflicts {
            lines.push("No file conflicts detected among the provided tasks.".to_string());
            return lines.join("\n");
        }

        lines.push("WARNING: file conflicts detected.".to_string());
        lines.push(String::new());
        lines.push("Conflicting files:".to_string());
        for file in &info.conflicting_files {
            lines.push(format!("- {file}"));
        }

        if matches!(self.config.verbosity, ConflictVerbosity::Standard | ConflictVerbosity::Verbose) {
            lines.push(String::new());
            lines.push("Conflict matrix:".to_string());
            for pair in &info.conflict_matrix {
                lines.push(format!("- tasks {} and {} conflict on:", pair.task_a, pair.task_b));
                for path in &pair.shared_paths {
                    lines.push(format!("    {path}"));
                }
            }
        }

        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_conflict_between_two_tasks_sharing_a_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.py"), "").unwrap();
        let detector = ConflictDetector::new(dir.path(), ConflictConfig::default());

        let tasks = vec![
            ("task-1".to_string(), vec!["a.py".to_string()]),
            ("task-2".to_string(), vec!["a.py".to_string()]),
        ];
        let info = detector.detect_conflicts(&tasks);
        assert!(info.has_conflicts);
        assert_eq!(info.conflict_matrix.len(), 1);
    }

    #[test]
    fn no_conflict_when_files_disjoint() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.py"), "").unwrap();
        std::fs::write(dir.path().join("b.py"), "").unwrap();
        let detector = ConflictDetector::new(dir.path(), ConflictConfig::default());

        let tasks = vec![
            ("task-1".to_string(), vec!["a.py".to_string()]),
            ("task-2".to_string(), vec!["b.py".to_string()]),
        ];
        let info = detector.detect_conflicts(&tasks);
        assert!(!info.has_conflicts);
    }

    #[test]
    fn disabled_detection_returns_no_conflicts() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ConflictConfig::default();
        config.enable_conflict_detection = false;
        let detector = ConflictDetector::new(dir.path(), config);

        let tasks = vec![
            ("task-1".to_string(), vec!["a.py".to_string()]),
            ("task-2".to_string(), vec!["a.py".to_string()]),
        ];
        let info = detector.detect_conflicts(&tasks);
        assert!(!info.has_conflicts);
    }
}
