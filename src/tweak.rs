// ABOUTME: HTML tweak engine for the markdownreveal application
// ABOUTME: Inserts branding and theming fragments into generated slide markup, line by line

use crate::errors::{RevealError, Result};
use regex::Regex;
use std::sync::OnceLock;

/// Opening tag of the reveal.js container; may appear more than once
const CONTAINER_ANCHOR: &str = r#"<div class="reveal">"#;
/// Opening tag of the slides container
const SLIDES_ANCHOR: &str = r#"div class="slides""#;
/// A slide section opening at the very start of a line
const SECTION_ANCHOR: &str = r"^<section";
/// The theme stylesheet link
const THEME_ANCHOR: &str = r#"stylesheet.*id="theme""#;
/// End of the document head
const HEAD_END_ANCHOR: &str = r"</head>";

/// Renders emoji with the same glyphs on every browser.
pub const EMOJI_SCRIPT: &str = r#"<script src="https://cdn.jsdelivr.net/npm/twemoji@14.0.2/dist/twemoji.min.js" crossorigin="anonymous"></script>
<script>document.addEventListener("DOMContentLoaded", function () { twemoji.parse(document.body); });</script>"#;

/// Generated slide markup, split into lines
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlideDocument {
    lines: Vec<String>,
}

impl SlideDocument {
    pub fn from_markup(markup: &str) -> Self {
        Self {
            lines: markup.lines().map(str::to_string).collect(),
        }
    }

    pub fn from_lines(lines: Vec<String>) -> Self {
        Self { lines }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn into_markup(self) -> String {
        let mut markup = self.lines.join("\n");
        markup.push('\n');
        markup
    }
}

/// Resolved tweak inputs; `None` disables a feature.
///
/// Asset fields hold the reference path relative to the output root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TweakSettings {
    pub footer: Option<String>,
    pub header: Option<String>,
    pub warmup: Option<String>,
    pub logo: Option<String>,
    pub background: Option<String>,
    pub custom_css: Option<String>,
}

struct Anchor {
    pattern: &'static str,
    regex: OnceLock<Regex>,
}

impl Anchor {
    const fn new(pattern: &'static str) -> Self {
        Self {
            pattern,
            regex: OnceLock::new(),
        }
    }

    fn regex(&self) -> &Regex {
        self.regex
            .get_or_init(|| Regex::new(self.pattern).expect("anchor patterns are valid regexes"))
    }
}

static CONTAINER: Anchor = Anchor::new(CONTAINER_ANCHOR);
static SLIDES: Anchor = Anchor::new(SLIDES_ANCHOR);
static SECTION: Anchor = Anchor::new(SECTION_ANCHOR);
static THEME: Anchor = Anchor::new(THEME_ANCHOR);
static HEAD_END: Anchor = Anchor::new(HEAD_END_ANCHOR);

/// Indexes of every line where `regex` matches
pub fn find_indexes(haystack: &[String], regex: &Regex) -> Vec<usize> {
    haystack
        .iter()
        .enumerate()
        .filter(|(_, line)| regex.is_match(line))
        .map(|(index, _)| index)
        .collect()
}

fn first_index(lines: &[String], feature: &'static str, anchor: &Anchor) -> Result<usize> {
    lines
        .iter()
        .position(|line| anchor.regex().is_match(line))
        .ok_or(RevealError::AnchorNotFound {
            feature,
            anchor: anchor.pattern,
        })
}

fn all_indexes(lines: &[String], feature: &'static str, anchor: &Anchor) -> Result<Vec<usize>> {
    let indexes = find_indexes(lines, anchor.regex());
    if indexes.is_empty() {
        return Err(RevealError::AnchorNotFound {
            feature,
            anchor: anchor.pattern,
        });
    }
    Ok(indexes)
}

/// Insert `fragment` after every anchor line. Walks backwards so earlier
/// insertions do not shift the remaining anchors.
fn insert_after_each(
    lines: &mut Vec<String>,
    feature: &'static str,
    anchor: &Anchor,
    fragment: &str,
) -> Result<()> {
    for index in all_indexes(lines, feature, anchor)?.into_iter().rev() {
        lines.insert(index + 1, fragment.to_string());
    }
    Ok(())
}

fn tweak_footer(lines: &mut Vec<String>, footer: &str) -> Result<()> {
    let fragment = format!(r#"<div class="footer">{}</div>"#, footer);
    insert_after_each(lines, "footer", &CONTAINER, &fragment)
}

fn tweak_header(lines: &mut Vec<String>, header: &str) -> Result<()> {
    let fragment = format!(r#"<div class="header">{}</div>"#, header);
    insert_after_each(lines, "header", &CONTAINER, &fragment)
}

fn tweak_warmup(lines: &mut Vec<String>, warmup: &str) -> Result<()> {
    let index = first_index(lines, "warmup", &SLIDES)?;
    lines.insert(
        index + 1,
        format!(r#"<section><img src="{}" /></section>"#, warmup),
    );
    Ok(())
}

fn tweak_logo(lines: &mut Vec<String>, logo: &str) -> Result<()> {
    let fragment = format!(r#"<div class="logo"><img src="{}" /></div>"#, logo);
    insert_after_each(lines, "logo", &CONTAINER, &fragment)
}

fn tweak_background(lines: &mut [String], background: &str) -> Result<()> {
    let replacement = format!(r#"<section data-background-image="{}""#, background);
    for index in all_indexes(lines, "background", &SECTION)? {
        lines[index] = lines[index].replacen("<section", &replacement, 1);
    }
    Ok(())
}

fn tweak_custom_css(lines: &mut Vec<String>, custom_css: &str) -> Result<()> {
    let index = first_index(lines, "custom stylesheet", &THEME)?;
    lines.insert(
        index + 1,
        format!(r#"<link rel="stylesheet" href="{}">"#, custom_css),
    );
    Ok(())
}

fn tweak_emoji(lines: &mut Vec<String>) -> Result<()> {
    let index = first_index(lines, "emoji script", &HEAD_END)?;
    lines.insert(index, EMOJI_SCRIPT.to_string());
    Ok(())
}

/// Apply every enabled tweak in its fixed order.
///
/// Order matters: each insertion shifts the lines after it, and the
/// background rewrite also reaches the warmup section inserted before it.
pub fn tweak(document: SlideDocument, settings: &TweakSettings) -> Result<SlideDocument> {
    let mut lines = document.lines;

    if let Some(footer) = &settings.footer {
        tweak_footer(&mut lines, footer)?;
    }
    if let Some(header) = &settings.header {
        tweak_header(&mut lines, header)?;
    }
    if let Some(warmup) = &settings.warmup {
        tweak_warmup(&mut lines, warmup)?;
    }
    if let Some(logo) = &settings.logo {
        tweak_logo(&mut lines, logo)?;
    }
    if let Some(background) = &settings.background {
        tweak_background(&mut lines, background)?;
    }
    if let Some(custom_css) = &settings.custom_css {
        tweak_custom_css(&mut lines, custom_css)?;
    }
    tweak_emoji(&mut lines)?;

    Ok(SlideDocument { lines })
}
