//! Content normalization and chunking
//!
//! This module turns acquired page content into indexable segments:
//! - boilerplate stripping (scripts, navigation, footers) and text
//!   extraction for markup bodies
//! - whitespace, entity and punctuation cleanup
//! - splitting into overlapping word windows with stable 0-based indexes

use crate::acquire::RawContent;
use crate::batch::EntityId;
use crate::config::ChunkConfig;
use crate::error::Result;
use regex::Regex;
use scraper::{Html, Selector};
use std::sync::OnceLock;

/// One overlapping chunk of normalized text
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    /// Owning entity
    pub entity_id: EntityId,

    /// Position within the normalization pass (0-based, order-significant)
    pub index: usize,

    /// Normalized text content
    pub text: String,

    /// Length in whitespace-delimited words
    pub word_len: usize,
}

/// Normalize acquired content into an ordered sequence of segments.
///
/// Homepage and about-page text are cleaned independently and joined with
/// a blank line before chunking. Empty content yields an empty sequence,
/// not an error.
pub fn normalize(
    raw: &RawContent,
    entity_id: &EntityId,
    config: &ChunkConfig,
) -> Result<Vec<Segment>> {
    segment_clean_text(&clean_content(raw), entity_id, config)
}

/// Clean acquired content into one combined text: homepage plus the
/// about page, each extracted and cleaned, joined with a blank line.
pub fn clean_content(raw: &RawContent) -> String {
    let mut combined = clean_text(&extract_if_markup(&raw.body));
    if let Some(about) = raw.about_text.as_deref() {
        let about_clean = clean_text(&extract_if_markup(about));
        if !about_clean.is_empty() {
            if !combined.is_empty() {
                combined.push_str("\n\n");
            }
            combined.push_str(&about_clean);
        }
    }
    combined
}

/// Chunk already-cleaned text (the extracted-content cache path).
pub fn segment_clean_text(
    text: &str,
    entity_id: &EntityId,
    config: &ChunkConfig,
) -> Result<Vec<Segment>> {
    config.validate()?;
    Ok(chunk_words(text, entity_id, config))
}

/// Extract plain text when the body still carries markup; pass through
/// already-extracted text unchanged.
fn extract_if_markup(body: &str) -> String {
    if looks_like_markup(body) {
        extract_text(body)
    } else {
        body.to_string()
    }
}

fn looks_like_markup(body: &str) -> bool {
    static TAG: OnceLock<Regex> = OnceLock::new();
    let tag = TAG.get_or_init(|| Regex::new(r"<[a-zA-Z!/][^>]*>").expect("tag regex"));
    tag.is_match(body)
}

/// Extract readable text from an HTML document, dropping script, style
/// and chrome elements before conversion.
pub fn extract_text(html: &str) -> String {
    let document = Html::parse_document(html);

    // Collect text from the body, skipping non-content subtrees.
    let skip = ["script", "style", "nav", "footer", "header", "noscript"];
    let root = Selector::parse("body").ok().and_then(|s| {
        document.select(&s).next().map(|e| e.html())
    });
    let source = root.unwrap_or_else(|| html.to_string());

    let stripped = strip_elements(&source, &skip);
    html2text::from_read(stripped.as_bytes(), 120).unwrap_or_else(|_| stripped.clone())
}

fn strip_elements(html: &str, tags: &[&str]) -> String {
    let fragment = Html::parse_fragment(html);
    let mut out = fragment.root_element().html();
    for tag in tags {
        if let Ok(selector) = Selector::parse(tag) {
            for elem in fragment.select(&selector) {
                let markup = elem.html();
                out = out.replace(&markup, " ");
            }
        }
    }
    out
}

/// Clean extracted text: collapse whitespace, drop residual entities and
/// tags, and collapse runs of three or more identical terminal
/// punctuation marks down to one.
pub fn clean_text(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    static WHITESPACE: OnceLock<Regex> = OnceLock::new();
    static ENTITY: OnceLock<Regex> = OnceLock::new();
    static TAG: OnceLock<Regex> = OnceLock::new();
    static DOTS: OnceLock<Regex> = OnceLock::new();
    static BANGS: OnceLock<Regex> = OnceLock::new();
    static QUESTIONS: OnceLock<Regex> = OnceLock::new();

    let whitespace = WHITESPACE.get_or_init(|| Regex::new(r"\s+").expect("ws regex"));
    let entity = ENTITY.get_or_init(|| Regex::new(r"&#?[a-zA-Z0-9]+;").expect("entity regex"));
    let tag = TAG.get_or_init(|| Regex::new(r"<[^>]+>").expect("tag regex"));
    let dots = DOTS.get_or_init(|| Regex::new(r"\.{3,}").expect("dots regex"));
    let bangs = BANGS.get_or_init(|| Regex::new(r"!{3,}").expect("bangs regex"));
    let questions = QUESTIONS.get_or_init(|| Regex::new(r"\?{3,}").expect("questions regex"));

    let text = whitespace.replace_all(text, " ");
    let text = entity.replace_all(&text, " ");
    let text = tag.replace_all(&text, " ");
    let text = dots.replace_all(&text, ".");
    let text = bangs.replace_all(&text, "!");
    let text = questions.replace_all(&text, "?");
    let text = whitespace.replace_all(&text, " ");

    text.trim().to_string()
}

/// Split cleaned text into overlapping word windows.
///
/// Window `i` starts at word offset `i * (window - overlap)`. Text
/// shorter than one window yields exactly one segment equal to the whole
/// text; empty text yields no segments. The caller guarantees
/// `overlap < window` via [`ChunkConfig::validate`], so every iteration
/// advances and the loop terminates in at most ⌈N / (W−O)⌉ windows.
fn chunk_words(text: &str, entity_id: &EntityId, config: &ChunkConfig) -> Vec<Segment> {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return Vec::new();
    }

    if words.len() <= config.window_words {
        return vec![Segment {
            entity_id: entity_id.clone(),
            index: 0,
            text: text.to_string(),
            word_len: words.len(),
        }];
    }

    let stride = config.window_words - config.overlap_words;
    let mut segments = Vec::new();
    let mut start = 0usize;
    let mut index = 0usize;

    while start < words.len() {
        let end = (start + config.window_words).min(words.len());
        let window = &words[start..end];

        segments.push(Segment {
            entity_id: entity_id.clone(),
            index,
            text: window.join(" "),
            word_len: window.len(),
        });

        if end == words.len() {
            break;
        }
        start += stride;
        index += 1;
    }

    segments
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquire::{AcquireMethod, RawContent};

    fn entity() -> EntityId {
        EntityId::from_url("https://acme.com").unwrap()
    }

    fn config(window: usize, overlap: usize) -> ChunkConfig {
        ChunkConfig {
            window_words: window,
            overlap_words: overlap,
        }
    }

    fn words(n: usize) -> String {
        (0..n).map(|i| format!("w{}", i)).collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn test_short_text_yields_single_segment() {
        let text = words(50);
        let segments = chunk_words(&text, &entity(), &config(100, 20));

        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].text, text);
        assert_eq!(segments[0].index, 0);
        assert_eq!(segments[0].word_len, 50);
    }

    #[test]
    fn test_empty_text_yields_no_segments() {
        assert!(chunk_words("", &entity(), &config(100, 20)).is_empty());
        assert!(chunk_words("   ", &entity(), &config(100, 20)).is_empty());
    }

    #[test]
    fn test_consecutive_segments_overlap_exactly() {
        let text = words(250);
        let segments = chunk_words(&text, &entity(), &config(100, 20));

        for pair in segments.windows(2) {
            let prev: Vec<&str> = pair[0].text.split_whitespace().collect();
            let next: Vec<&str> = pair[1].text.split_whitespace().collect();
            let suffix = &prev[prev.len() - 20..];
            let prefix = &next[..20];
            assert_eq!(suffix, prefix);
        }
    }

    #[test]
    fn test_segment_count_bound_and_indexes() {
        let n = 1050;
        let (w, o) = (100, 20);
        let text = words(n);
        let segments = chunk_words(&text, &entity(), &config(w, o));

        let bound = (n + (w - o) - 1) / (w - o);
        assert!(segments.len() <= bound);

        for (i, segment) in segments.iter().enumerate() {
            assert_eq!(segment.index, i);
        }
    }

    #[test]
    fn test_segments_reconstruct_source_text() {
        let text = words(250);
        let (w, o) = (100, 20);
        let segments = chunk_words(&text, &entity(), &config(w, o));

        // Dropping each segment's leading overlap and concatenating
        // rebuilds the source word sequence.
        let mut rebuilt: Vec<String> = Vec::new();
        for (i, segment) in segments.iter().enumerate() {
            let segment_words: Vec<&str> = segment.text.split_whitespace().collect();
            let skip = if i == 0 { 0 } else { o };
            rebuilt.extend(segment_words[skip..].iter().map(|s| s.to_string()));
        }
        assert_eq!(rebuilt.join(" "), text);
    }

    #[test]
    fn test_overlap_ge_window_rejected() {
        let raw = RawContent {
            url: "https://acme.com".to_string(),
            body: words(300),
            about_text: None,
            method: AcquireMethod::Direct,
            bytes: 0,
        };
        let result = normalize(&raw, &entity(), &config(100, 100));
        assert!(result.is_err());
    }

    #[test]
    fn test_clean_text_collapses_whitespace_and_entities() {
        let cleaned = clean_text("Hello\n\n  world &amp; &#8217; friends");
        assert_eq!(cleaned, "Hello world friends");
    }

    #[test]
    fn test_clean_text_collapses_punctuation_runs() {
        assert_eq!(clean_text("Wait... what"), "Wait. what");
        assert_eq!(clean_text("Wow!!!!"), "Wow!");
        assert_eq!(clean_text("Really????"), "Really?");
        // Two marks are left alone; only runs of three or more collapse.
        assert_eq!(clean_text("Hm.."), "Hm..");
    }

    #[test]
    fn test_clean_text_strips_residual_tags() {
        let cleaned = clean_text("before <span class=\"x\">inside</span> after");
        assert_eq!(cleaned, "before inside after");
    }

    #[test]
    fn test_extract_text_drops_boilerplate() {
        let html = r#"
        <html>
        <head><script>var x = 1;</script></head>
        <body>
            <nav>Home About Contact</nav>
            <p>Acme builds rockets.</p>
            <footer>Copyright Acme</footer>
        </body>
        </html>
        "#;

        let text = extract_text(html);
        assert!(text.contains("Acme builds rockets"));
        assert!(!text.contains("var x"));
    }

    #[test]
    fn test_normalize_combines_homepage_and_about() {
        let raw = RawContent {
            url: "https://acme.com".to_string(),
            body: "<html><body><p>Homepage text here.</p></body></html>".to_string(),
            about_text: Some("About page text here.".to_string()),
            method: AcquireMethod::Direct,
            bytes: 0,
        };

        let segments = normalize(&raw, &entity(), &ChunkConfig::default()).unwrap();
        assert_eq!(segments.len(), 1);
        assert!(segments[0].text.contains("Homepage text here"));
        assert!(segments[0].text.contains("About page text here"));
    }

    #[test]
    fn test_normalize_empty_content() {
        let raw = RawContent {
            url: "https://acme.com".to_string(),
            body: String::new(),
            about_text: None,
            method: AcquireMethod::Direct,
            bytes: 0,
        };

        let segments = normalize(&raw, &entity(), &ChunkConfig::default()).unwrap();
        assert!(segments.is_empty());
    }
}
