// ABOUTME: Asset bundle handling for the markdownreveal application
// ABOUTME: Links cached reveal.js, KaTeX and style bundles into the output directory

use crate::config::Config;
use crate::errors::{RevealError, Result};
use crate::tweak::TweakSettings;
use crate::utils;
use log::{debug, info, warn};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

/// Output subdirectory holding the reveal.js framework
pub const REVEALJS_DIR: &str = "revealjs";
/// Output subdirectory holding the KaTeX math renderer
pub const KATEX_DIR: &str = "katex";
/// Output subdirectory holding the active style bundle
pub const STYLE_DIR: &str = "markdownrevealstyle";
/// Generic style directory, searched after the active style bundle
pub const GENERIC_STYLE_DIR: &str = "style";

/// Makes the framework, math and style bundles available under the output root
pub trait AssetProvider: Send + Sync {
    /// Prepare the output root and return its path
    fn ensure(&self, config: &Config) -> Result<PathBuf>;
}

/// Links bundles that are already present in the local cache.
///
/// Nothing is downloaded: a bundle missing from the cache is reported and
/// the slides are generated without it.
#[derive(Debug, Default, Clone, Copy)]
pub struct CachedBundles;

/// A bundle's place in the cache and its link name in the output root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bundle {
    pub name: &'static str,
    pub cache_dir: PathBuf,
}

/// Cache key of a style bundle: the SHA-256 of its source URL
pub fn style_cache_key(style_url: &str) -> String {
    format!("{:x}", Sha256::digest(style_url.as_bytes()))
}

/// The bundles a configuration asks for, in link order
pub fn bundles(config: &Config) -> Vec<Bundle> {
    let mut bundles = vec![
        Bundle {
            name: REVEALJS_DIR,
            cache_dir: config
                .local_path
                .join(REVEALJS_DIR)
                .join(&config.reveal_version),
        },
        Bundle {
            name: KATEX_DIR,
            cache_dir: config
                .local_path
                .join(KATEX_DIR)
                .join(&config.katex_version),
        },
    ];
    if !config.style.is_empty() {
        bundles.push(Bundle {
            name: STYLE_DIR,
            cache_dir: config.local_path.join(style_cache_key(&config.style)),
        });
    }
    bundles
}

impl AssetProvider for CachedBundles {
    fn ensure(&self, config: &Config) -> Result<PathBuf> {
        let out = &config.output_path;
        utils::ensure_directory_exists(out)?;

        if config.style.is_empty() {
            remove_link(&out.join(STYLE_DIR), STYLE_DIR)?;
        }

        for bundle in bundles(config) {
            let link = out.join(bundle.name);
            if !bundle.cache_dir.is_dir() {
                warn!(
                    "Bundle {} is not cached at {:?}; slides will be generated without it",
                    bundle.name, bundle.cache_dir
                );
                continue;
            }
            remove_link(&link, bundle.name)?;
            if link.exists() {
                debug!("Keeping existing {} directory at {:?}", bundle.name, link);
                continue;
            }
            symlink_dir(&bundle.cache_dir, &link).map_err(|e| RevealError::AssetFetchFailure {
                bundle: bundle.name.to_string(),
                message: format!("failed to link {:?}: {}", bundle.cache_dir, e),
            })?;
            info!("Linked {} from {:?}", bundle.name, bundle.cache_dir);
        }

        Ok(out.clone())
    }
}

/// Remove `link` if it is a symbolic link; real directories are left alone
fn remove_link(link: &Path, bundle: &str) -> Result<()> {
    match fs::symlink_metadata(link) {
        Ok(meta) if meta.file_type().is_symlink() => {
            remove_symlink(link).map_err(|e| RevealError::AssetFetchFailure {
                bundle: bundle.to_string(),
                message: format!("failed to remove stale link {:?}: {}", link, e),
            })
        }
        _ => Ok(()),
    }
}

#[cfg(unix)]
fn symlink_dir(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn symlink_dir(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::windows::fs::symlink_dir(target, link)
}

#[cfg(unix)]
fn remove_symlink(link: &Path) -> std::io::Result<()> {
    fs::remove_file(link)
}

#[cfg(windows)]
fn remove_symlink(link: &Path) -> std::io::Result<()> {
    fs::remove_dir(link)
}

/// Find a named asset, first in the active style bundle, then in the
/// generic style directory. Returns the path relative to the output root.
///
/// Only the file name of `name` is used: `img/logo.png` is looked up as
/// `markdownrevealstyle/logo.png`, then `style/logo.png`.
pub fn resolve_asset(output_root: &Path, name: &str) -> Option<String> {
    let file_name = Path::new(name).file_name()?;
    if Path::new(file_name) != Path::new(name) {
        debug!(
            "Asset {:?} is looked up by file name {:?} only",
            name, file_name
        );
    }
    [STYLE_DIR, GENERIC_STYLE_DIR]
        .iter()
        .map(|dir| output_root.join(dir).join(file_name))
        .find(|candidate| candidate.is_file())
        .and_then(|found| relative_reference(&found))
}

/// The last two components of `path`, joined with `/` for use in HTML
fn relative_reference(path: &Path) -> Option<String> {
    let file = path.file_name()?.to_string_lossy();
    let dir = path.parent()?.file_name()?.to_string_lossy();
    Some(format!("{}/{}", dir, file))
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Resolve the tweak inputs for a configuration.
///
/// Text fragments are enabled when non-empty; file assets when they
/// resolve to an existing file under the output root.
pub fn tweak_settings(config: &Config) -> TweakSettings {
    let out = &config.output_path;
    let asset = |name: &str| {
        if name.is_empty() {
            return None;
        }
        let resolved = resolve_asset(out, name);
        if resolved.is_none() {
            debug!("Asset {:?} not found, skipping", name);
        }
        resolved
    };

    TweakSettings {
        footer: non_empty(&config.footer),
        header: non_empty(&config.header),
        warmup: if config.no_warmup {
            None
        } else {
            asset(&config.warmup)
        },
        logo: asset(&config.logo),
        background: asset(&config.background),
        custom_css: asset(&config.custom_css),
    }
}
