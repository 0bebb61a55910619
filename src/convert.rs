// ABOUTME: Converter collaborators for the markdownreveal application
// ABOUTME: Builds the converter invocation and runs pandoc or the in-process converter

use crate::assets::{KATEX_DIR, REVEALJS_DIR};
use crate::config::{Config, ConverterKind, Scalar};
use crate::errors::{RevealError, Result};
use crate::html::ComrakConverter;
use log::{debug, info};
use std::io::Write;
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::thread;

/// Slide nesting level: level-1 headings become title slides, level-2 slides
pub const SLIDE_LEVEL: u8 = 2;

/// Input format, output options and flags for one conversion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConverterInvocation {
    /// Input format identifier, e.g. `markdown+emoji`
    pub input_format: String,
    /// Command-line style arguments, in invocation order
    pub args: Vec<String>,
}

impl ConverterInvocation {
    /// Build the invocation from the three option groups: fixed flags
    /// (plus math and incremental flags), extra flags, extra variables.
    pub fn from_config(config: &Config) -> Self {
        let mut args = vec![
            "-s".to_string(),
            format!("--slide-level={}", SLIDE_LEVEL),
            "-V".to_string(),
            format!("revealjs-url={}", REVEALJS_DIR),
        ];

        if config.katex {
            args.push(format!("--katex={}/katex.min.js", KATEX_DIR));
            args.push(format!("--katex-stylesheet={}/katex.min.css", KATEX_DIR));
        }
        if config.incremental {
            args.push("--incremental".to_string());
        }

        for (flag, value) in &config.converter_flags {
            match value {
                Scalar::Bool(true) => args.push(format!("--{}", flag)),
                other => args.push(format!("--{}={}", flag, other)),
            }
        }

        for (key, value) in &config.template_variables {
            args.push("-V".to_string());
            args.push(format!("{}={}", key, value));
        }

        let mut input_format = "markdown".to_string();
        if config.emoji_codes {
            input_format.push_str("+emoji");
        }

        Self { input_format, args }
    }
}

/// Markdown to reveal.js slide markup
pub trait Converter: Send + Sync {
    fn convert(&self, text: &str, invocation: &ConverterInvocation) -> Result<String>;
}

/// Runs the `pandoc` executable
#[derive(Debug, Clone)]
pub struct PandocConverter {
    program: String,
}

impl Default for PandocConverter {
    fn default() -> Self {
        Self {
            program: "pandoc".to_string(),
        }
    }
}

impl PandocConverter {
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Converter for PandocConverter {
    fn convert(&self, text: &str, invocation: &ConverterInvocation) -> Result<String> {
        info!("Running {} ({})", self.program, invocation.input_format);
        debug!("Converter arguments: {:?}", invocation.args);

        let mut child = Command::new(&self.program)
            .arg(format!("--from={}", invocation.input_format))
            .arg("--to=revealjs")
            .args(&invocation.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                RevealError::ConversionFailure(format!("Failed to start {}: {}", self.program, e))
            })?;

        // Feed stdin from another thread so a large output cannot block us
        let mut stdin = child.stdin.take().ok_or_else(|| {
            RevealError::ConversionFailure("Converter stdin unavailable".to_string())
        })?;
        let input = text.to_string();
        let writer = thread::spawn(move || stdin.write_all(input.as_bytes()));

        let output = child.wait_with_output().map_err(|e| {
            RevealError::ConversionFailure(format!("Failed to wait for {}: {}", self.program, e))
        })?;
        match writer.join() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                return Err(RevealError::ConversionFailure(format!(
                    "Failed to write converter input: {}",
                    e
                )))
            }
            Err(_) => {
                return Err(RevealError::ConversionFailure(
                    "Converter input writer panicked".to_string(),
                ))
            }
        }

        if !output.status.success() {
            return Err(RevealError::ConversionFailure(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        String::from_utf8(output.stdout).map_err(|e| {
            RevealError::ConversionFailure(format!("Converter produced invalid UTF-8: {}", e))
        })
    }
}

/// The converter selected by the configuration
pub fn converter_for(kind: ConverterKind) -> Arc<dyn Converter> {
    match kind {
        ConverterKind::Builtin => Arc::new(ComrakConverter),
        ConverterKind::Pandoc => Arc::new(PandocConverter::default()),
    }
}
