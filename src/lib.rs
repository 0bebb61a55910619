// ABOUTME: Library module for the markdownreveal program.
// ABOUTME: Contains the conversion pipeline, tweak engine, watcher and live server.

pub mod assets;
pub mod config;
pub mod convert;
pub mod errors;
pub mod html;
pub mod math;
pub mod mirror;
pub mod pipeline;
pub mod reload;
pub mod scheduler;
pub mod server;
pub mod tweak;
pub mod utils;
pub mod watch;

// Reexport common types and functions
pub use config::{merge_config, Config, ConfigLoader};
pub use errors::{Result, RevealError};
pub use pipeline::{clean, generate, GenerateOptions, Pipeline, Toolchain};
pub use scheduler::RegenerationScheduler;
pub use server::LiveServer;
pub use tweak::{tweak, SlideDocument, TweakSettings};
pub use watch::{show, WatchConfig, WatchSession};
