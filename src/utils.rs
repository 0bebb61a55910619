// ABOUTME: Utility functions for the markdownreveal application
// ABOUTME: Provides helpers for validation, path handling and atomic writes

use crate::errors::{RevealError, Result};
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};

/// Validate that a file exists
pub fn validate_file_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(RevealError::PathNotFoundError(path.to_path_buf()));
    }
    if !path.is_file() {
        return Err(RevealError::ValidationError(format!(
            "Path is not a file: {:?}",
            path
        )));
    }
    Ok(())
}

/// Ensure a directory exists, creating it if necessary
pub fn ensure_directory_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)?;
    } else if !path.is_dir() {
        return Err(RevealError::ValidationError(format!(
            "Path exists but is not a directory: {:?}",
            path
        )));
    }
    Ok(())
}

/// Get the absolute path
pub fn get_absolute_path(path: &Path) -> Result<PathBuf> {
    fs::canonicalize(path).map_err(|e| {
        RevealError::ValidationError(format!("Failed to get absolute path for {:?}: {}", path, e))
    })
}

/// Directory containing `path`, `.` for bare file names
pub fn parent_directory(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Write `content` to `path` through a sibling temporary file and a rename,
/// so readers never observe a half-written file.
pub fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let parent = parent_directory(path);
    ensure_directory_exists(parent)?;

    let file_name = path
        .file_name()
        .ok_or_else(|| RevealError::ValidationError(format!("Not a file path: {:?}", path)))?;
    let mut tmp_name = file_name.to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = parent.join(tmp_name);

    fs::write(&tmp_path, content)?;
    if let Err(e) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(RevealError::FileReadError(e));
    }
    debug!("Wrote {} bytes to {:?}", content.len(), path);
    Ok(())
}

/// Pick the Markdown file to present when none is given on the command line:
/// the first `*.md` file (alphabetically) in `dir`.
pub fn find_default_markdown(dir: &Path) -> Result<PathBuf> {
    let pattern = format!("{}/*.md", glob::Pattern::escape(&dir.to_string_lossy()));
    let mut candidates: Vec<PathBuf> = glob::glob(&pattern)
        .map_err(|e| RevealError::ValidationError(format!("Invalid glob pattern: {}", e)))?
        .flatten()
        .filter(|path| path.is_file())
        .collect();
    candidates.sort();
    candidates.into_iter().next().ok_or_else(|| {
        RevealError::ValidationError(format!("No Markdown file found in {:?}", dir))
    })
}
