// ABOUTME: Conversion pipeline for the markdownreveal application
// ABOUTME: Reloads config, mirrors sources, converts, tweaks and writes index.html

use crate::assets::{self, AssetProvider, CachedBundles};
use crate::config::{Config, ConfigLoader, CONFIG_FILE_NAME};
use crate::convert::{self, Converter, ConverterInvocation};
use crate::errors::{RevealError, Result};
use crate::mirror::{self, Mirror, MIRROR_EXCLUDES};
use crate::tweak::{self, SlideDocument};
use crate::utils;
use log::{debug, info};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Name of the generated page in the output root
pub const INDEX_FILE: &str = "index.html";

/// Command-line overrides applied on top of the loaded configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GenerateOptions {
    pub no_warmup: bool,
}

/// External collaborators used by one generation run
#[derive(Clone)]
pub struct Toolchain {
    pub assets: Arc<dyn AssetProvider>,
    pub mirror: Arc<dyn Mirror>,
    pub converter: Arc<dyn Converter>,
}

impl Toolchain {
    /// The collaborators a configuration selects
    pub fn from_config(config: &Config) -> Self {
        Self {
            assets: Arc::new(CachedBundles),
            mirror: mirror::mirror_for(config.mirror),
            converter: convert::converter_for(config.converter),
        }
    }
}

/// Regenerates the slides for one Markdown file
#[derive(Clone)]
pub struct Pipeline {
    loader: ConfigLoader,
    options: GenerateOptions,
    toolchain: Option<Toolchain>,
}

impl Pipeline {
    pub fn new(loader: ConfigLoader, options: GenerateOptions) -> Self {
        Self {
            loader,
            options,
            toolchain: None,
        }
    }

    /// Use fixed collaborators instead of the ones the configuration selects
    pub fn with_toolchain(mut self, toolchain: Toolchain) -> Self {
        self.toolchain = Some(toolchain);
        self
    }

    /// Load a fresh configuration with command-line overrides applied
    pub fn load_config(&self) -> Result<Config> {
        let mut config = self.loader.load()?;
        if self.options.no_warmup {
            config.no_warmup = true;
        }
        Ok(config)
    }

    /// Run the whole pipeline and return the path of the written `index.html`.
    ///
    /// The page is built in memory and written last, so a failure in any
    /// step leaves the previous output untouched.
    pub fn generate(&self, markdown_path: &Path) -> Result<PathBuf> {
        info!("Generating slides from {:?}", markdown_path);
        utils::validate_file_exists(markdown_path)?;

        let config = self.load_config()?;
        let toolchain = match &self.toolchain {
            Some(toolchain) => toolchain.clone(),
            None => Toolchain::from_config(&config),
        };

        let output_root = toolchain.assets.ensure(&config)?;

        let source_dir = utils::get_absolute_path(utils::parent_directory(markdown_path))?;
        toolchain
            .mirror
            .sync(&source_dir, &output_root, MIRROR_EXCLUDES)?;

        let invocation = ConverterInvocation::from_config(&config);
        debug!("Converter invocation: {:?}", invocation);
        let text = fs::read_to_string(markdown_path)?;
        let markup = toolchain.converter.convert(&text, &invocation)?;

        let settings = assets::tweak_settings(&config);
        let document = tweak::tweak(SlideDocument::from_markup(&markup), &settings)?;

        let index = output_root.join(INDEX_FILE);
        utils::write_atomic(&index, &document.into_markup())?;
        info!("Slides written to {:?}", index);
        Ok(index)
    }
}

/// Loader for the presentation at `markdown_path`.
///
/// An explicit `config_path` must exist; otherwise `config.yaml` beside the
/// Markdown file (or in the current directory) is used when present.
pub fn config_loader(markdown_path: Option<&Path>, config_path: Option<&Path>) -> Result<ConfigLoader> {
    match config_path {
        Some(path) => Ok(ConfigLoader::from_env(path)?.require_local_file()),
        None => {
            let dir = markdown_path.map_or(Path::new("."), utils::parent_directory);
            ConfigLoader::from_env(dir.join(CONFIG_FILE_NAME))
        }
    }
}

/// One-shot generation of the slides for `markdown_path`
pub fn generate(
    markdown_path: &Path,
    config_path: Option<&Path>,
    options: GenerateOptions,
) -> Result<PathBuf> {
    let loader = config_loader(Some(markdown_path), config_path)?;
    Pipeline::new(loader, options).generate(markdown_path)
}

/// Remove the whole local cache directory
pub fn clean(config: &Config) -> Result<()> {
    if !config.local_path.exists() {
        info!("Nothing to clean at {:?}", config.local_path);
        return Ok(());
    }
    fs::remove_dir_all(&config.local_path).map_err(|e| {
        RevealError::ValidationError(format!(
            "Failed to remove {:?}: {}",
            config.local_path, e
        ))
    })?;
    info!("Removed {:?}", config.local_path);
    Ok(())
}
