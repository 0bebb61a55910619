// ABOUTME: TeX math handling for the in-process converter
// ABOUTME: Shields $...$ and $$...$$ spans from Markdown parsing and renders them for KaTeX

use crate::html::escape_html;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MathKind {
    Display,
    Inline,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MathSpan {
    pub kind: MathKind,
    pub tex: String,
}

impl MathSpan {
    /// Markup picked up by the KaTeX render script
    pub fn to_html(&self) -> String {
        match self.kind {
            MathKind::Display => format!(
                r#"<span class="math display">\[{}\]</span>"#,
                escape_html(&self.tex)
            ),
            MathKind::Inline => format!(
                r#"<span class="math inline">\({}\)</span>"#,
                escape_html(&self.tex)
            ),
        }
    }
}

/// Stand-in text for the math span at `index`; survives Markdown rendering
pub fn placeholder(index: usize) -> String {
    format!("\u{E000}{}\u{E001}", index)
}

/// Opening fence of a fenced code block: the fence char and its length
fn fence_marker(line: &str) -> Option<(char, usize)> {
    let first = line.chars().next()?;
    if first != '`' && first != '~' {
        return None;
    }
    let run = line.chars().take_while(|&c| c == first).count();
    if run >= 3 {
        Some((first, run))
    } else {
        None
    }
}

fn closes_fence(line: &str, fence: (char, usize)) -> bool {
    let (marker, length) = fence;
    let run = line.chars().take_while(|&c| c == marker).count();
    run >= length && line[run * marker.len_utf8()..].trim().is_empty()
}

/// Position of the `$` closing an inline span opened at `start`, if any.
///
/// Follows pandoc's rules: no whitespace just inside the dollars, no line
/// break, and the closing dollar is not followed by a digit.
fn inline_close(chars: &[char], start: usize) -> Option<usize> {
    let first = *chars.get(start + 1)?;
    if first.is_whitespace() || first == '$' {
        return None;
    }
    let mut j = start + 1;
    while j < chars.len() && chars[j] != '\n' {
        match chars[j] {
            '\\' => j += 2,
            '$' if !chars[j - 1].is_whitespace()
                && !chars.get(j + 1).map_or(false, |c| c.is_ascii_digit()) =>
            {
                return Some(j);
            }
            _ => j += 1,
        }
    }
    None
}

/// Position of the `$$` closing a display span opened at `start`, if any
fn display_close(chars: &[char], start: usize) -> Option<usize> {
    let mut j = start + 2;
    while j + 1 < chars.len() {
        if chars[j] == '$' && chars[j + 1] == '$' {
            return Some(j);
        }
        j += 1;
    }
    None
}

/// Replace math spans outside code with placeholders.
///
/// Returns the rewritten text and the extracted spans, indexed by
/// placeholder number.
pub fn protect_math(text: &str) -> (String, Vec<MathSpan>) {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut spans = Vec::new();
    let mut fence: Option<(char, usize)> = None;
    let mut i = 0;

    while i < chars.len() {
        if i == 0 || chars[i - 1] == '\n' {
            let line_end = chars[i..]
                .iter()
                .position(|&c| c == '\n')
                .map_or(chars.len(), |offset| i + offset);
            let line: String = chars[i..line_end].iter().collect();
            let trimmed = line.trim_start();

            let verbatim = match fence {
                Some(open) => {
                    if closes_fence(trimmed, open) {
                        fence = None;
                    }
                    true
                }
                None => match fence_marker(trimmed) {
                    Some(open) => {
                        fence = Some(open);
                        true
                    }
                    None => false,
                },
            };
            if verbatim {
                let copy_end = (line_end + 1).min(chars.len());
                out.extend(&chars[i..copy_end]);
                i = copy_end;
                continue;
            }
        }

        match chars[i] {
            '\\' => {
                out.push('\\');
                if let Some(&next) = chars.get(i + 1) {
                    out.push(next);
                }
                i += 2;
            }
            '`' => {
                let run = chars[i..].iter().take_while(|&&c| c == '`').count();
                let mut j = i + run;
                let mut closed = None;
                while j < chars.len() {
                    if chars[j] == '`' {
                        let closing = chars[j..].iter().take_while(|&&c| c == '`').count();
                        if closing == run {
                            closed = Some(j + closing);
                            break;
                        }
                        j += closing;
                    } else {
                        j += 1;
                    }
                }
                let end = closed.unwrap_or(i + run);
                out.extend(&chars[i..end]);
                i = end;
            }
            '$' if chars.get(i + 1) == Some(&'$') => match display_close(&chars, i) {
                Some(close) if !chars[i + 2..close].iter().all(|c| c.is_whitespace()) => {
                    let tex: String = chars[i + 2..close].iter().collect();
                    out.push_str(&placeholder(spans.len()));
                    spans.push(MathSpan {
                        kind: MathKind::Display,
                        tex: tex.trim().to_string(),
                    });
                    i = close + 2;
                }
                _ => {
                    out.push_str("$$");
                    i += 2;
                }
            },
            '$' => match inline_close(&chars, i) {
                Some(close) => {
                    let tex: String = chars[i + 1..close].iter().collect();
                    out.push_str(&placeholder(spans.len()));
                    spans.push(MathSpan {
                        kind: MathKind::Inline,
                        tex,
                    });
                    i = close + 1;
                }
                None => {
                    out.push('$');
                    i += 1;
                }
            },
            c => {
                out.push(c);
                i += 1;
            }
        }
    }

    (out, spans)
}

/// Put rendered math back in place of the placeholders
pub fn restore_math(html: &str, spans: &[MathSpan]) -> String {
    let mut restored = html.to_string();
    for (index, span) in spans.iter().enumerate() {
        restored = restored.replace(&placeholder(index), &span.to_html());
    }
    restored
}
