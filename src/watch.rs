// ABOUTME: Watch module for monitoring presentation changes and regenerating slides
// ABOUTME: Owns the file watcher and debounce scheduler of a live `show` session

use log::{debug, error, info};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::event::ModifyKind;
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use notify_debouncer_full::{new_debouncer, DebounceEventResult, Debouncer, FileIdMap};

use crate::config::ReloadMode;
use crate::errors::{RevealError, Result};
use crate::pipeline::{self, GenerateOptions, Pipeline};
use crate::reload::{self, MarkerFileNotifier, Notifier};
use crate::scheduler::{RegenerationScheduler, DEFAULT_PERIOD};
use crate::server::LiveServer;
use crate::utils;

/// Configuration for a `show` session
#[derive(Debug, Clone)]
pub struct WatchConfig {
    /// Path to the markdown file to present
    pub markdown_path: PathBuf,

    /// Explicit local configuration file
    pub config_path: Option<PathBuf>,

    /// Quiet period before a regeneration runs
    pub period: Duration,

    /// How long the file watcher buffers raw events
    pub buffer_delay: Duration,

    /// Address for the live server
    pub host: String,

    /// Port for the live server; 0 picks a free one
    pub port: u16,

    /// Skip the warm-up slide regardless of configuration
    pub no_warmup: bool,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            markdown_path: PathBuf::new(),
            config_path: None,
            period: DEFAULT_PERIOD,
            buffer_delay: Duration::from_millis(100),
            host: "localhost".to_string(),
            port: 8123,
            no_warmup: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Modified,
    Deleted,
    Moved,
}

/// One path touched by a file system event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    pub path: PathBuf,
    pub kind: ChangeKind,
}

impl ChangeKind {
    /// Map a watcher event kind; access and unknown events are not changes
    pub fn from_event_kind(kind: &EventKind) -> Option<Self> {
        match kind {
            EventKind::Create(_) => Some(ChangeKind::Created),
            EventKind::Modify(ModifyKind::Name(_)) => Some(ChangeKind::Moved),
            EventKind::Modify(_) => Some(ChangeKind::Modified),
            EventKind::Remove(_) => Some(ChangeKind::Deleted),
            EventKind::Access(_) | EventKind::Any | EventKind::Other => None,
        }
    }
}

/// Split a watcher event into one change per path
pub fn changes(event: &notify::Event) -> Vec<WatchEvent> {
    let Some(kind) = ChangeKind::from_event_kind(&event.kind) else {
        return Vec::new();
    };
    event
        .paths
        .iter()
        .map(|path| WatchEvent {
            path: path.clone(),
            kind,
        })
        .collect()
}

/// Whether a change at `path` should trigger a regeneration.
///
/// Our own output (which may live inside the watched tree), version control
/// metadata and editor scratch files are ignored.
pub fn is_relevant_path(path: &Path, output_root: &Path) -> bool {
    if path.starts_with(output_root) {
        return false;
    }
    if path.components().any(|c| c.as_os_str() == ".git") {
        return false;
    }
    let name = match path.file_name() {
        Some(name) => name.to_string_lossy(),
        None => return false,
    };
    !(name.ends_with('~')
        || name.starts_with(".#")
        || name.ends_with(".swp")
        || name.ends_with(".swx")
        || name.ends_with(".tmp"))
}

/// A running watch: change events feed the scheduler, the scheduler runs
/// the pipeline and sends the reload signal. Dropping the session stops both.
pub struct WatchSession {
    scheduler: RegenerationScheduler,
    watch_root: PathBuf,
    _debouncer: Debouncer<RecommendedWatcher, FileIdMap>,
}

impl WatchSession {
    pub fn start(
        config: &WatchConfig,
        pipeline: Pipeline,
        notifier: Arc<dyn Notifier>,
        output_root: PathBuf,
    ) -> Result<Self> {
        let markdown_path = config.markdown_path.clone();
        let scheduler = RegenerationScheduler::new(config.period, move || {
            match pipeline.generate(&markdown_path) {
                Ok(index) => {
                    let root = utils::parent_directory(&index);
                    match notifier.notify(root) {
                        Ok(()) => info!("Slides regenerated, reload signal sent"),
                        Err(e) => error!("Failed to send reload signal: {}", e),
                    }
                }
                Err(e) => error!("Failed to regenerate slides: {}", e),
            }
        });

        // Events carry canonical paths
        let output_root = utils::get_absolute_path(&output_root).unwrap_or(output_root);
        let trigger = scheduler.clone();
        let mut debouncer = new_debouncer(
            config.buffer_delay,
            None,
            move |result: DebounceEventResult| match result {
                Ok(events) => {
                    let relevant: Vec<WatchEvent> = events
                        .iter()
                        .flat_map(|event| changes(&event.event))
                        .filter(|change| is_relevant_path(&change.path, &output_root))
                        .collect();
                    for change in &relevant {
                        debug!("Detected {:?} of {:?}", change.kind, change.path);
                    }
                    if !relevant.is_empty() {
                        trigger.trigger();
                    }
                }
                Err(errors) => {
                    for e in errors {
                        error!("Watch error: {:?}", e);
                    }
                }
            },
        )
        .map_err(|e| RevealError::WatchError(format!("Failed to create file watcher: {}", e)))?;

        let watch_root = utils::get_absolute_path(utils::parent_directory(&config.markdown_path))?;
        debug!("Watching absolute path: {:?}", watch_root);
        debouncer
            .watcher()
            .watch(&watch_root, RecursiveMode::Recursive)
            .map_err(|e| {
                RevealError::WatchError(format!(
                    "Failed to start watching directory {:?}: {}",
                    watch_root, e
                ))
            })?;

        info!("Watching for changes in {:?}", watch_root);
        Ok(Self {
            scheduler,
            watch_root,
            _debouncer: debouncer,
        })
    }

    pub fn scheduler(&self) -> &RegenerationScheduler {
        &self.scheduler
    }

    pub fn watch_root(&self) -> &Path {
        &self.watch_root
    }
}

impl Drop for WatchSession {
    fn drop(&mut self) {
        self.scheduler.stop();
    }
}

/// Generate once, then serve and regenerate on every change until interrupted
pub fn show(config: WatchConfig) -> Result<()> {
    utils::validate_file_exists(&config.markdown_path)?;

    let loader = pipeline::config_loader(Some(&config.markdown_path), config.config_path.as_deref())?;
    let pipeline = Pipeline::new(
        loader,
        GenerateOptions {
            no_warmup: config.no_warmup,
        },
    );

    // No reload signal here: nobody is listening yet
    let index = pipeline.generate(&config.markdown_path)?;
    let output_root = utils::parent_directory(&index).to_path_buf();
    let mode = pipeline.load_config()?.reload;
    if mode == ReloadMode::Poll {
        MarkerFileNotifier::prepare(&output_root)?;
    }

    let server = LiveServer::bind(&config.host, config.port, output_root.clone(), mode)?;
    let port = server
        .local_addr()
        .map(|addr| addr.port())
        .unwrap_or(config.port);
    let notifier = reload::notifier_for(mode, &config.host, port)?;

    let _session = WatchSession::start(&config, pipeline, notifier, output_root)?;

    println!(
        "Serving slides at http://{}:{}/ (Press Ctrl+C to stop)",
        config.host, port
    );
    server.run();
    Ok(())
}
