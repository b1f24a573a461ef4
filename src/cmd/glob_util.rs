//! Expansion of input arguments that may be glob patterns.

use std::path::{Path, PathBuf};

/// Files an input argument resolved to.
#[derive(Debug)]
pub struct InputFiles {
    pub files: Vec<PathBuf>,
    pub from_glob: bool,
}

/// Check if a path string contains glob pattern characters.
pub fn is_glob_pattern(path: &str) -> bool {
    path.contains('*') || path.contains('?') || path.contains('[')
}

/// Resolve a literal path (which must exist) or a glob pattern (which must
/// match at least one regular file). Glob matches are sorted.
pub fn expand_file_pattern(pattern: &Path) -> anyhow::Result<InputFiles> {
    let pattern_str = pattern.to_string_lossy();

    if !is_glob_pattern(&pattern_str) {
        if !pattern.exists() {
            anyhow::bail!("file does not exist: {}", pattern.display());
        }
        return Ok(InputFiles {
            files: vec![pattern.to_path_buf()],
            from_glob: false,
        });
    }

    let mut files = Vec::new();
    for entry in glob::glob(&pattern_str)
        .map_err(|e| anyhow::anyhow!("invalid glob pattern '{}': {}", pattern_str, e))?
    {
        let path = entry
            .map_err(|e| anyhow::anyhow!("error reading path for pattern '{}': {}", pattern_str, e))?;
        if path.is_file() {
            files.push(path);
        }
    }

    if files.is_empty() {
        anyhow::bail!("no files match pattern: {}", pattern_str);
    }
    files.sort();

    Ok(InputFiles {
        files,
        from_glob: true,
    })
}

/// Outcome tally across the files of a glob run.
#[derive(Debug, Default)]
pub struct MultiFileResult {
    pub total_files: usize,
    pub succeeded: usize,
    pub errors: Vec<(PathBuf, String)>,
}

impl MultiFileResult {
    pub fn new(total_files: usize) -> Self {
        Self {
            total_files,
            ..Self::default()
        }
    }

    pub fn record_success(&mut self) {
        self.succeeded += 1;
    }

    pub fn record_failure(&mut self, path: PathBuf, error: String) {
        self.errors.push((path, error));
    }

    pub fn failed(&self) -> usize {
        self.errors.len()
    }

    pub fn has_failures(&self) -> bool {
        !self.errors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_is_glob_pattern() {
        assert!(!is_glob_pattern("dump.sql"));
        assert!(!is_glob_pattern("/backups/dump.sql.gz"));
        assert!(is_glob_pattern("*.sql"));
        assert!(is_glob_pattern("backups/**/*.sql"));
        assert!(is_glob_pattern("dump_?.sql"));
        assert!(is_glob_pattern("[ab].sql"));
    }

    #[test]
    fn test_literal_path() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("dump.sql");
        fs::write(&file, "SELECT 1;").unwrap();

        let result = expand_file_pattern(&file).unwrap();
        assert!(!result.from_glob);
        assert_eq!(result.files, vec![file]);
    }

    #[test]
    fn test_literal_path_missing() {
        let err = expand_file_pattern(Path::new("/nonexistent/dump.sql")).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_glob_matches_sorted_files_only() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b.sql"), "").unwrap();
        fs::write(dir.path().join("a.sql"), "").unwrap();
        fs::write(dir.path().join("c.txt"), "").unwrap();
        fs::create_dir(dir.path().join("d.sql")).unwrap();

        let result = expand_file_pattern(&dir.path().join("*.sql")).unwrap();
        assert!(result.from_glob);
        assert_eq!(
            result.files,
            vec![dir.path().join("a.sql"), dir.path().join("b.sql")]
        );
    }

    #[test]
    fn test_glob_no_matches() {
        let dir = TempDir::new().unwrap();
        let err = expand_file_pattern(&dir.path().join("*.sql")).unwrap_err();
        assert!(err.to_string().contains("no files match"));
    }

    #[test]
    fn test_multi_file_result() {
        let mut result = MultiFileResult::new(3);
        result.record_success();
        result.record_success();
        result.record_failure(PathBuf::from("bad.sql"), "unterminated block".to_string());

        assert_eq!(result.total_files, 3);
        assert_eq!(result.succeeded, 2);
        assert_eq!(result.failed(), 1);
        assert!(result.has_failures());
    }
}
