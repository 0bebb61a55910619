// ABOUTME: Source mirroring for the markdownreveal application
// ABOUTME: One-way sync of the presentation directory into the output directory

use crate::config::MirrorKind;
use crate::errors::{RevealError, Result};
use crate::utils;
use log::{debug, info};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use walkdir::{DirEntry, WalkDir};

/// Entries never mirrored nor deleted. A leading `/` anchors the name at the
/// top of the tree; other names match at any depth.
pub const MIRROR_EXCLUDES: &[&str] = &[
    "revealjs",
    "katex",
    "markdownrevealstyle",
    ".git",
    "/index.html",
    "/.reload",
];

/// One-way, source-wins directory sync
pub trait Mirror: Send + Sync {
    fn sync(&self, source: &Path, destination: &Path, excludes: &[&str]) -> Result<()>;
}

/// Whether the entry at `relative` (relative to the tree root) is excluded
pub fn is_excluded(relative: &Path, excludes: &[&str]) -> bool {
    let name = match relative.file_name() {
        Some(name) => name.to_string_lossy(),
        None => return false,
    };
    let top_level = relative.components().count() == 1;
    excludes.iter().any(|pattern| match pattern.strip_prefix('/') {
        Some(anchored) => top_level && name == anchored,
        None => name == *pattern,
    })
}

/// In-process mirror built on `walkdir`
#[derive(Debug, Default, Clone, Copy)]
pub struct DirMirror;

impl DirMirror {
    fn walk<'a>(
        root: &'a Path,
        skip: &'a Path,
        excludes: &'a [&'a str],
    ) -> impl Iterator<Item = walkdir::Result<DirEntry>> + 'a {
        WalkDir::new(root)
            .min_depth(1)
            .into_iter()
            .filter_entry(move |entry| {
                if entry.path() == skip {
                    return false;
                }
                match entry.path().strip_prefix(root) {
                    Ok(relative) => !is_excluded(relative, excludes),
                    Err(_) => false,
                }
            })
    }
}

fn walk_error(e: walkdir::Error) -> RevealError {
    RevealError::SyncFailure(format!("Failed to walk directory: {}", e))
}

fn sync_error(action: &str, path: &Path, e: std::io::Error) -> RevealError {
    RevealError::SyncFailure(format!("Failed to {} {:?}: {}", action, path, e))
}

/// Same size and the copy is not older than the source
fn is_up_to_date(source: &fs::Metadata, destination: &Path) -> bool {
    let Ok(existing) = fs::metadata(destination) else {
        return false;
    };
    if !existing.is_file() || existing.len() != source.len() {
        return false;
    }
    match (source.modified(), existing.modified()) {
        (Ok(src), Ok(dst)) => dst >= src,
        _ => false,
    }
}

impl Mirror for DirMirror {
    fn sync(&self, source: &Path, destination: &Path, excludes: &[&str]) -> Result<()> {
        utils::ensure_directory_exists(destination)?;
        let mut copied = 0usize;
        let mut mirrored: HashSet<PathBuf> = HashSet::new();

        for entry in Self::walk(source, destination, excludes) {
            let entry = entry.map_err(walk_error)?;
            let relative = entry
                .path()
                .strip_prefix(source)
                .map_err(|e| RevealError::SyncFailure(e.to_string()))?
                .to_path_buf();
            let target = destination.join(&relative);

            if entry.file_type().is_dir() {
                if target.is_file() {
                    fs::remove_file(&target).map_err(|e| sync_error("replace", &target, e))?;
                }
                fs::create_dir_all(&target).map_err(|e| sync_error("create", &target, e))?;
            } else {
                let metadata = fs::metadata(entry.path())
                    .map_err(|e| sync_error("inspect", entry.path(), e))?;
                if metadata.is_dir() {
                    debug!("Skipping linked directory {:?}", entry.path());
                    continue;
                }
                if target.is_dir() {
                    fs::remove_dir_all(&target).map_err(|e| sync_error("replace", &target, e))?;
                }
                if !is_up_to_date(&metadata, &target) {
                    fs::copy(entry.path(), &target).map_err(|e| sync_error("copy", &target, e))?;
                    copied += 1;
                }
            }
            mirrored.insert(relative);
        }

        // Delete what no longer exists on the source side, deepest first
        let mut stale = Vec::new();
        for entry in Self::walk(destination, source, excludes) {
            let entry = entry.map_err(walk_error)?;
            let relative = entry
                .path()
                .strip_prefix(destination)
                .map_err(|e| RevealError::SyncFailure(e.to_string()))?;
            if !mirrored.contains(relative) {
                stale.push((entry.path().to_path_buf(), entry.file_type().is_dir()));
            }
        }
        for (path, is_dir) in stale.iter().rev() {
            if fs::symlink_metadata(path).is_err() {
                continue;
            }
            let removed = if *is_dir {
                fs::remove_dir_all(path)
            } else {
                fs::remove_file(path)
            };
            removed.map_err(|e| sync_error("delete", path, e))?;
            debug!("Deleted stale {:?}", path);
        }

        info!(
            "Mirrored {:?} into {:?} ({} copied, {} deleted)",
            source,
            destination,
            copied,
            stale.len()
        );
        Ok(())
    }
}

/// Mirror by running `rsync`
#[derive(Debug, Clone)]
pub struct RsyncMirror {
    program: String,
}

impl Default for RsyncMirror {
    fn default() -> Self {
        Self {
            program: "rsync".to_string(),
        }
    }
}

/// `dir` as an rsync "contents of" argument (trailing slash)
fn with_trailing_slash(dir: &Path) -> String {
    let mut path = dir.to_string_lossy().to_string();
    if !path.ends_with('/') {
        path.push('/');
    }
    path
}

impl Mirror for RsyncMirror {
    fn sync(&self, source: &Path, destination: &Path, excludes: &[&str]) -> Result<()> {
        utils::ensure_directory_exists(destination)?;
        let mut command = Command::new(&self.program);
        command.arg("-a").arg("--delete");
        for pattern in excludes {
            command.arg("--exclude").arg(pattern);
        }
        command
            .arg(with_trailing_slash(source))
            .arg(with_trailing_slash(destination));

        debug!("Running {:?}", command);
        let output = command.output().map_err(|e| {
            RevealError::SyncFailure(format!("Failed to start {}: {}", self.program, e))
        })?;
        if !output.status.success() {
            return Err(RevealError::SyncFailure(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        info!("Mirrored {:?} into {:?} with rsync", source, destination);
        Ok(())
    }
}

/// The mirror selected by the configuration
pub fn mirror_for(kind: MirrorKind) -> Arc<dyn Mirror> {
    match kind {
        MirrorKind::Builtin => Arc::new(DirMirror),
        MirrorKind::Rsync => Arc::new(RsyncMirror::default()),
    }
}
