//! Turns fetched HTML into the bounded, markdown-flavoured text that is
//! hashed, stored, and handed to the extraction adapter.

use std::sync::LazyLock;

use regex::Regex;

static DROPPED_BLOCK_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    ["head", "script", "style", "noscript", "template", "svg"]
        .iter()
        .map(|tag| {
            Regex::new(&format!(r"(?is)<{tag}\b[^>]*>.*?</{tag}\s*>"))
                .expect("valid dropped block regex")
        })
        .collect()
});
static COMMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").expect("valid comment regex"));
static HEADING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<h([1-6])\b[^>]*>(.*?)</h[1-6]\s*>").expect("valid heading regex")
});
static LIST_ITEM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<li\b[^>]*>").expect("valid list item regex"));
static BLOCK_BREAK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)</?(p|div|section|article|header|footer|main|aside|nav|ul|ol|li|table|tr|blockquote|pre|h[1-6])\b[^>]*>|<br\s*/?>",
    )
    .expect("valid block break regex")
});
static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<[^>]+>").expect("valid tag regex"));
static NUMERIC_ENTITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&#(x[0-9a-fA-F]+|[0-9]+);").expect("valid numeric entity regex")
});
static TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("valid title regex"));
static OG_TITLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?is)<meta[^>]+property\s*=\s*["']og:title["'][^>]+content\s*=\s*["'](.*?)["'][^>]*>"#,
    )
    .expect("valid og title regex")
});
static H1_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<h1[^>]*>(.*?)</h1>").expect("valid h1 regex"));

/// A page reduced to its title and readable text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedPage {
    pub title: Option<String>,
    pub text: String,
}

/// Normalize a response body. Bodies that do not look like HTML only get
/// whitespace cleanup.
#[must_use]
pub fn normalize_body(body: &str, content_type: Option<&str>, max_chars: usize) -> NormalizedPage {
    let is_html = content_type.is_some_and(|ct| ct.to_ascii_lowercase().contains("html"))
        || body.trim_start().starts_with('<');

    if is_html {
        NormalizedPage {
            title: extract_title(body),
            text: truncate_chars(&html_to_text(body), max_chars),
        }
    } else {
        NormalizedPage {
            title: None,
            text: truncate_chars(&collapse_lines(body), max_chars),
        }
    }
}

/// Strip markup, keeping headings and list items as light markdown and block
/// boundaries as line breaks.
#[must_use]
pub fn html_to_text(html: &str) -> String {
    let mut stripped = COMMENT_RE.replace_all(html, " ").into_owned();
    for re in DROPPED_BLOCK_RES.iter() {
        stripped = re.replace_all(&stripped, " ").into_owned();
    }
    let headings = HEADING_RE.replace_all(&stripped, |caps: &regex::Captures<'_>| {
        let level = caps
            .get(1)
            .and_then(|m| m.as_str().parse::<usize>().ok())
            .unwrap_or(1);
        let inner = caps.get(2).map_or("", |m| m.as_str());
        format!("\n{} {}\n", "#".repeat(level), inner)
    });
    let items = LIST_ITEM_RE.replace_all(&headings, "\n- ");
    let breaks = BLOCK_BREAK_RE.replace_all(&items, "\n");
    let text = TAG_RE.replace_all(&breaks, " ");
    collapse_lines(&decode_entities(&text))
}

/// Title from `<title>`, then `og:title`, then the first `<h1>`.
#[must_use]
pub fn extract_title(html: &str) -> Option<String> {
    [&*TITLE_RE, &*OG_TITLE_RE, &*H1_RE]
        .into_iter()
        .filter_map(|re| re.captures(html))
        .filter_map(|cap| cap.get(1).map(|m| clean_inline(m.as_str())))
        .find(|title| !title.is_empty())
}

fn clean_inline(fragment: &str) -> String {
    let no_tags = TAG_RE.replace_all(fragment, " ");
    decode_entities(&no_tags)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Collapse runs of spaces inside lines and drop blank lines.
fn collapse_lines(text: &str) -> String {
    text.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty() && line != "-")
        .collect::<Vec<_>>()
        .join("\n")
}

fn decode_entities(text: &str) -> String {
    let numeric = NUMERIC_ENTITY_RE.replace_all(text, |caps: &regex::Captures<'_>| {
        let raw = caps.get(1).map_or("", |m| m.as_str());
        let code = match raw.strip_prefix('x') {
            Some(hex) => u32::from_str_radix(hex, 16).ok(),
            None => raw.parse::<u32>().ok(),
        };
        code.and_then(char::from_u32)
            .map_or_else(|| caps[0].to_string(), |c| c.to_string())
    });

    // `&amp;` last so "&amp;lt;" decodes to the literal "&lt;".
    numeric
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Truncate to at most `max_chars` characters without splitting a char.
#[must_use]
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => text[..byte_idx].trim_end().to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
#[path = "normalize_test.rs"]
mod tests;
