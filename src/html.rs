// ABOUTME: In-process Markdown to reveal.js converter for the markdownreveal application
// ABOUTME: Renders slides with comrak and wraps them in a standalone reveal.js document

use crate::convert::{Converter, ConverterInvocation, SLIDE_LEVEL};
use crate::errors::{RevealError, Result};
use crate::math;
use comrak::nodes::{AstNode, NodeValue};
use comrak::{format_html, parse_document, Arena, ComrakOptions};
use log::debug;
use std::collections::HashMap;

/// Variables consumed by the document template rather than `Reveal.initialize`
const TEMPLATE_VARIABLES: &[&str] = &["revealjs-url", "theme", "title", "pagetitle"];

const KATEX_RENDER_SCRIPT: &str = r#"<script>
  document.addEventListener("DOMContentLoaded", function () {
    var mathElements = document.getElementsByClassName("math");
    for (var i = 0; i < mathElements.length; i++) {
      var texText = mathElements[i].firstChild;
      if (mathElements[i].tagName == "SPAN") {
        katex.render(texText.data, mathElements[i], {
          displayMode: mathElements[i].classList.contains("display"),
          throwOnError: false,
          fleqn: false
        });
      }
    }
  });
</script>"#;

/// Converts Markdown to reveal.js markup without external tools.
///
/// Understands the same invocation as pandoc: `-s`, `--slide-level=N`,
/// `--katex=URL`, `--katex-stylesheet=URL`, `--incremental`, `-V key=value`
/// and the `+emoji` input extension. Other flags are ignored.
#[derive(Debug, Default, Clone, Copy)]
pub struct ComrakConverter;

#[derive(Debug, Clone, Default)]
struct RenderSettings {
    standalone: bool,
    slide_level: u8,
    emoji: bool,
    incremental: bool,
    katex_script: Option<String>,
    katex_stylesheet: Option<String>,
    variables: Vec<(String, String)>,
}

impl RenderSettings {
    fn from_invocation(invocation: &ConverterInvocation) -> Self {
        let mut settings = Self {
            slide_level: SLIDE_LEVEL,
            emoji: invocation
                .input_format
                .split('+')
                .skip(1)
                .any(|extension| extension == "emoji"),
            ..Default::default()
        };

        let mut args = invocation.args.iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "-s" | "--standalone" => settings.standalone = true,
                "-i" | "--incremental" => settings.incremental = true,
                "-V" | "--variable" => {
                    if let Some(variable) = args.next() {
                        settings.push_variable(variable);
                    }
                }
                _ => {
                    if let Some(level) = arg.strip_prefix("--slide-level=") {
                        match level.parse() {
                            Ok(level) => settings.slide_level = level,
                            Err(_) => debug!("Ignoring invalid slide level {:?}", level),
                        }
                    } else if let Some(url) = arg.strip_prefix("--katex-stylesheet=") {
                        settings.katex_stylesheet = Some(url.to_string());
                    } else if let Some(url) = arg.strip_prefix("--katex=") {
                        settings.katex_script = Some(url.to_string());
                    } else if let Some(variable) = arg.strip_prefix("--variable=") {
                        settings.push_variable(variable);
                    } else {
                        debug!("Ignoring converter flag {}", arg);
                    }
                }
            }
        }
        settings
    }

    fn push_variable(&mut self, variable: &str) {
        let (key, value) = variable.split_once('=').unwrap_or((variable, "true"));
        self.variables.push((key.to_string(), value.to_string()));
    }

    /// Last value set for `key`
    fn variable(&self, key: &str) -> Option<&str> {
        self.variables
            .iter()
            .rev()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    fn math_enabled(&self) -> bool {
        self.katex_script.is_some()
    }
}

/// Pandoc title block: leading `% Title`, `% Author`, `% Date` lines
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TitleBlock {
    pub title: String,
    pub author: String,
    pub date: String,
}

/// Split a leading title block from the Markdown body
pub fn parse_title_block(content: &str) -> (TitleBlock, String) {
    let lines: Vec<&str> = content.lines().collect();
    let mut fields = Vec::new();
    let mut index = 0;
    while index < lines.len() && index < 3 && lines[index].starts_with('%') {
        fields.push(lines[index].trim_start_matches('%').trim().to_string());
        index += 1;
    }
    if fields.is_empty() {
        return (TitleBlock::default(), content.to_string());
    }

    let mut fields = fields.into_iter();
    let block = TitleBlock {
        title: fields.next().unwrap_or_default(),
        author: fields.next().unwrap_or_default(),
        date: fields.next().unwrap_or_default(),
    };
    (block, lines[index..].join("\n"))
}

/// HTML-escape text for element content and attribute values
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// Section identifier in the style of pandoc's auto identifiers
pub fn slugify(text: &str) -> String {
    let mut slug = String::new();
    for c in text.chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() || c == '_' || c == '-' || c == '.' {
            slug.push(c);
        } else if c.is_whitespace() {
            slug.push('-');
        }
    }
    slug.trim_start_matches(|c: char| !c.is_alphabetic())
        .to_string()
}

fn comrak_options(settings: &RenderSettings) -> ComrakOptions {
    let mut options = ComrakOptions::default();
    options.render.unsafe_ = true; // Allow raw HTML
    options.extension.strikethrough = true;
    options.extension.table = true;
    options.extension.autolink = true;
    options.extension.tasklist = true;
    options.extension.footnotes = true;
    options.extension.shortcodes = settings.emoji;
    options
}

fn node_text<'a>(node: &'a AstNode<'a>) -> String {
    let mut text = String::new();
    for descendant in node.descendants() {
        match &descendant.data.borrow().value {
            NodeValue::Text(literal) => text.push_str(literal),
            NodeValue::Code(code) => text.push_str(&code.literal),
            _ => {}
        }
    }
    text
}

fn render_node<'a>(node: &'a AstNode<'a>, options: &ComrakOptions) -> Result<String> {
    let mut buffer = Vec::new();
    format_html(node, options, &mut buffer)
        .map_err(|e| RevealError::ConversionFailure(format!("Failed to render HTML: {}", e)))?;
    String::from_utf8(buffer)
        .map_err(|e| RevealError::ConversionFailure(format!("Rendered invalid UTF-8: {}", e)))
}

/// One slide: an optional heading (with its level) and the blocks under it
struct Slide<'a> {
    heading: Option<(&'a AstNode<'a>, u8)>,
    body: Vec<&'a AstNode<'a>>,
}

/// Group top-level blocks into slides. Headings up to `slide_level` and
/// horizontal rules start a new slide.
fn split_slides<'a>(root: &'a AstNode<'a>, slide_level: u8) -> Vec<Slide<'a>> {
    let mut slides: Vec<Slide<'a>> = Vec::new();
    for node in root.children() {
        let heading_level = match &node.data.borrow().value {
            NodeValue::Heading(heading) if heading.level <= slide_level => Some(heading.level),
            NodeValue::ThematicBreak => {
                slides.push(Slide {
                    heading: None,
                    body: Vec::new(),
                });
                continue;
            }
            _ => None,
        };
        match heading_level {
            Some(level) => slides.push(Slide {
                heading: Some((node, level)),
                body: Vec::new(),
            }),
            None => match slides.last_mut() {
                Some(slide) => slide.body.push(node),
                None => slides.push(Slide {
                    heading: None,
                    body: vec![node],
                }),
            },
        }
    }
    slides.retain(|slide| slide.heading.is_some() || !slide.body.is_empty());
    slides
}

fn render_slides<'a>(
    slides: &[Slide<'a>],
    options: &ComrakOptions,
    settings: &RenderSettings,
) -> Result<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut html = String::new();

    for slide in slides {
        let mut opening = String::from("<section");
        let level = match slide.heading {
            Some((heading, level)) => {
                let mut id = slugify(&node_text(heading));
                if id.is_empty() {
                    id = "section".to_string();
                }
                let count = seen.entry(id.clone()).or_insert(0);
                if *count > 0 {
                    id = format!("{}-{}", id, count);
                }
                *count += 1;
                opening.push_str(&format!(r#" id="{}""#, escape_html(&id)));
                level
            }
            None => settings.slide_level,
        };
        if level < settings.slide_level {
            opening.push_str(&format!(r#" class="title-slide slide level{}">"#, level));
        } else {
            opening.push_str(&format!(r#" class="slide level{}">"#, level));
        }

        html.push_str(&opening);
        html.push('\n');
        if let Some((heading, _)) = slide.heading {
            html.push_str(&render_node(heading, options)?);
        }
        for node in &slide.body {
            let block = render_node(node, options)?;
            if settings.incremental {
                html.push_str(&block.replace("<li>", r#"<li class="fragment">"#));
            } else {
                html.push_str(&block);
            }
        }
        html.push_str("</section>\n");
    }
    Ok(html)
}

/// `Reveal.initialize` option value: booleans and numbers stay bare
fn js_value(value: &str) -> String {
    if value == "true" || value == "false" || value.parse::<f64>().is_ok() {
        return value.to_string();
    }
    let mut quoted = String::from("'");
    for c in value.chars() {
        match c {
            '\\' => quoted.push_str("\\\\"),
            '\'' => quoted.push_str("\\'"),
            '\n' => quoted.push_str("\\n"),
            c => quoted.push(c),
        }
    }
    quoted.push('\'');
    quoted
}

fn standalone_document(title: &TitleBlock, slides: &str, settings: &RenderSettings) -> String {
    let reveal_url = settings.variable("revealjs-url").unwrap_or("revealjs");
    let theme = settings.variable("theme").unwrap_or("black");
    let page_title = settings
        .variable("pagetitle")
        .or_else(|| settings.variable("title"))
        .map(str::to_string)
        .unwrap_or_else(|| {
            if title.title.is_empty() {
                "Slides".to_string()
            } else {
                title.title.clone()
            }
        });

    let mut doc = String::from("<!DOCTYPE html>\n<html>\n<head>\n");
    doc.push_str("  <meta charset=\"utf-8\">\n");
    doc.push_str("  <meta name=\"generator\" content=\"markdownreveal\">\n");
    doc.push_str(&format!("  <title>{}</title>\n", escape_html(&page_title)));
    doc.push_str("  <meta name=\"apple-mobile-web-app-capable\" content=\"yes\">\n");
    doc.push_str("  <meta name=\"apple-mobile-web-app-status-bar-style\" content=\"black-translucent\">\n");
    doc.push_str("  <meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0, maximum-scale=1.0, user-scalable=no, minimal-ui\">\n");
    doc.push_str(&format!(
        "  <link rel=\"stylesheet\" href=\"{}/dist/reset.css\">\n",
        reveal_url
    ));
    doc.push_str(&format!(
        "  <link rel=\"stylesheet\" href=\"{}/dist/reveal.css\">\n",
        reveal_url
    ));
    doc.push_str(&format!(
        "  <link rel=\"stylesheet\" href=\"{}/dist/theme/{}.css\" id=\"theme\">\n",
        reveal_url, theme
    ));
    if let Some(script) = &settings.katex_script {
        doc.push_str(&format!("  <script src=\"{}\"></script>\n", script));
        doc.push_str(KATEX_RENDER_SCRIPT);
        doc.push('\n');
        if let Some(stylesheet) = &settings.katex_stylesheet {
            doc.push_str(&format!("  <link rel=\"stylesheet\" href=\"{}\" />\n", stylesheet));
        }
    }
    doc.push_str("</head>\n<body>\n");
    doc.push_str("  <div class=\"reveal\">\n");
    doc.push_str("    <div class=\"slides\">\n\n");

    if !title.title.is_empty() {
        doc.push_str("<section id=\"title-slide\">\n");
        doc.push_str(&format!(
            "  <h1 class=\"title\">{}</h1>\n",
            escape_html(&title.title)
        ));
        if !title.author.is_empty() {
            doc.push_str(&format!(
                "  <p class=\"author\">{}</p>\n",
                escape_html(&title.author)
            ));
        }
        if !title.date.is_empty() {
            doc.push_str(&format!(
                "  <p class=\"date\">{}</p>\n",
                escape_html(&title.date)
            ));
        }
        doc.push_str("</section>\n\n");
    }

    doc.push_str(slides);
    doc.push_str("    </div>\n");
    doc.push_str("  </div>\n\n");
    doc.push_str(&format!(
        "  <script src=\"{}/dist/reveal.js\"></script>\n",
        reveal_url
    ));
    doc.push_str("  <script>\n    Reveal.initialize({\n");
    for (key, value) in &settings.variables {
        if TEMPLATE_VARIABLES.contains(&key.as_str()) {
            continue;
        }
        doc.push_str(&format!("      {}: {},\n", js_value(key), js_value(value)));
    }
    doc.push_str("    });\n  </script>\n");
    doc.push_str("</body>\n</html>\n");
    doc
}

impl Converter for ComrakConverter {
    fn convert(&self, text: &str, invocation: &ConverterInvocation) -> Result<String> {
        let settings = RenderSettings::from_invocation(invocation);
        let (title, body) = parse_title_block(text);

        let (body, spans) = if settings.math_enabled() {
            math::protect_math(&body)
        } else {
            (body, Vec::new())
        };

        let options = comrak_options(&settings);
        let arena = Arena::new();
        let root = parse_document(&arena, &body, &options);
        let slides = split_slides(root, settings.slide_level);
        debug!("Rendering {} slides", slides.len());

        let mut rendered = render_slides(&slides, &options, &settings)?;
        if !spans.is_empty() {
            rendered = math::restore_math(&rendered, &spans);
        }

        if settings.standalone {
            Ok(standalone_document(&title, &rendered, &settings))
        } else {
            Ok(rendered)
        }
    }
}
