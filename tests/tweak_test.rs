use markdownreveal::tweak::{find_indexes, EMOJI_SCRIPT};
use markdownreveal::{tweak, RevealError, SlideDocument, TweakSettings};
use regex::Regex;

const SLIDES: &str = r#"<!DOCTYPE html>
<html>
<head>
  <link rel="stylesheet" href="revealjs/dist/reveal.css">
  <link rel="stylesheet" href="revealjs/dist/theme/black.css" id="theme">
</head>
<body>
  <div class="reveal">
    <div class="slides">
<section id="intro" class="slide level2">
<h2>Intro</h2>
<p>Text mentioning <section> inline</p>
  <section class="nested">
  </section>
</section>
<section id="next" class="slide level2">
<h2>Next</h2>
</section>
    </div>
  </div>
</body>
</html>"#;

fn all_features() -> TweakSettings {
    TweakSettings {
        footer: Some("My footer".to_string()),
        header: Some("My header".to_string()),
        warmup: Some("markdownrevealstyle/warmup.png".to_string()),
        logo: Some("markdownrevealstyle/logo.png".to_string()),
        background: Some("style/background.png".to_string()),
        custom_css: Some("style/custom.css".to_string()),
    }
}

fn position(lines: &[String], needle: &str) -> usize {
    lines
        .iter()
        .position(|line| line.contains(needle))
        .unwrap_or_else(|| panic!("No line contains {:?}", needle))
}

#[test]
fn test_emoji_only_adds_one_element_before_head_end() {
    let original = SlideDocument::from_markup(SLIDES);
    let tweaked = tweak(original.clone(), &TweakSettings::default()).expect("Failed to tweak");

    assert_eq!(tweaked.lines().len(), original.lines().len() + 1);
    let head_end = position(tweaked.lines(), "</head>");
    assert_eq!(tweaked.lines()[head_end - 1], EMOJI_SCRIPT);
}

#[test]
fn test_all_features_enabled() {
    let tweaked = tweak(SlideDocument::from_markup(SLIDES), &all_features()).expect("Failed to tweak");
    let lines = tweaked.lines();

    // One fragment each after the reveal container, last inserted first
    let reveal = position(lines, r#"<div class="reveal">"#);
    assert_eq!(lines[reveal + 1], r#"<div class="logo"><img src="markdownrevealstyle/logo.png" /></div>"#);
    assert_eq!(lines[reveal + 2], r#"<div class="header">My header</div>"#);
    assert_eq!(lines[reveal + 3], r#"<div class="footer">My footer</div>"#);

    // The warmup slide is the first slide and also gets the background
    let slides = position(lines, r#"div class="slides""#);
    assert_eq!(
        lines[slides + 1],
        r#"<section data-background-image="style/background.png"><img src="markdownrevealstyle/warmup.png" /></section>"#
    );

    let theme = position(lines, r#"id="theme""#);
    assert_eq!(lines[theme + 1], r#"<link rel="stylesheet" href="style/custom.css">"#);

    assert_eq!(lines.iter().filter(|line| **line == EMOJI_SCRIPT).count(), 1);
}

#[test]
fn test_toggles_are_independent() {
    let base = SlideDocument::from_markup(SLIDES);
    let emoji_only = tweak(base.clone(), &TweakSettings::default()).expect("Failed to tweak");

    let footer_only = TweakSettings {
        footer: Some("F".to_string()),
        ..Default::default()
    };
    let tweaked = tweak(base.clone(), &footer_only).expect("Failed to tweak");
    assert_eq!(tweaked.lines().len(), emoji_only.lines().len() + 1);
    assert!(!tweaked.lines().iter().any(|line| line.contains("data-background-image")));
    assert!(!tweaked.lines().iter().any(|line| line.contains("class=\"header\"")));

    let css_only = TweakSettings {
        custom_css: Some("style/custom.css".to_string()),
        ..Default::default()
    };
    let tweaked = tweak(base, &css_only).expect("Failed to tweak");
    assert_eq!(tweaked.lines().len(), emoji_only.lines().len() + 1);
    assert!(!tweaked.lines().iter().any(|line| line.contains("class=\"footer\"")));
}

#[test]
fn test_tweak_is_deterministic() {
    let first = tweak(SlideDocument::from_markup(SLIDES), &all_features()).expect("Failed to tweak");
    let second = tweak(SlideDocument::from_markup(SLIDES), &all_features()).expect("Failed to tweak");
    assert_eq!(first, second);
    assert_eq!(first.into_markup(), second.into_markup());
}

#[test]
fn test_background_only_rewrites_sections_at_line_start() {
    let settings = TweakSettings {
        background: Some("bg.png".to_string()),
        ..Default::default()
    };
    let tweaked = tweak(SlideDocument::from_markup(SLIDES), &settings).expect("Failed to tweak");
    let lines = tweaked.lines();

    let rewritten: Vec<&String> = lines
        .iter()
        .filter(|line| line.contains("data-background-image"))
        .collect();
    assert_eq!(rewritten.len(), 2);
    assert!(rewritten
        .iter()
        .all(|line| line.starts_with(r#"<section data-background-image="bg.png" id=""#)));

    assert!(lines.contains(&"  <section class=\"nested\">".to_string()));
    assert!(lines.contains(&"<p>Text mentioning <section> inline</p>".to_string()));
}

#[test]
fn test_footer_repeated_for_every_reveal_container() {
    let markup = r#"<html>
<head>
</head>
<body>
<div class="reveal">
<div class="slides"></div>
</div>
<div class="reveal">
<div class="slides"></div>
</div>
</body>
</html>"#;
    let settings = TweakSettings {
        footer: Some("F".to_string()),
        ..Default::default()
    };
    let tweaked = tweak(SlideDocument::from_markup(markup), &settings).expect("Failed to tweak");
    let lines = tweaked.lines();

    let containers = find_indexes(lines, &Regex::new(r#"<div class="reveal">"#).expect("regex"));
    assert_eq!(containers.len(), 2);
    for index in containers {
        assert_eq!(lines[index + 1], r#"<div class="footer">F</div>"#);
    }
}

#[test]
fn test_missing_head_end_is_reported() {
    let result = tweak(
        SlideDocument::from_markup("<section>\n<p>bare fragment</p>\n</section>"),
        &TweakSettings::default(),
    );
    match result {
        Err(RevealError::AnchorNotFound { feature, anchor }) => {
            assert_eq!(feature, "emoji script");
            assert_eq!(anchor, "</head>");
        }
        other => panic!("Expected AnchorNotFound, got {:?}", other),
    }
}

#[test]
fn test_missing_container_is_reported_for_footer() {
    let settings = TweakSettings {
        footer: Some("F".to_string()),
        ..Default::default()
    };
    let result = tweak(SlideDocument::from_markup("<head>\n</head>\n<body></body>"), &settings);
    assert!(matches!(
        result,
        Err(RevealError::AnchorNotFound { feature: "footer", .. })
    ));
}

#[test]
fn test_find_indexes() {
    let lines: Vec<String> = ["<section>", "  <section>", "<p>", "<section id=\"a\">"]
        .iter()
        .map(|line| line.to_string())
        .collect();
    let start = Regex::new("^<section").expect("regex");
    assert_eq!(find_indexes(&lines, &start), vec![0, 3]);
    assert!(find_indexes(&lines, &Regex::new("^</body>").expect("regex")).is_empty());
}

#[test]
fn test_into_markup_ends_with_newline() {
    let document = SlideDocument::from_markup("<a>\n<b>");
    assert_eq!(document.into_markup(), "<a>\n<b>\n");
}
