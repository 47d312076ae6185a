use chrono::{DateTime, Local, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

static FILENAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"[<>:"/\\|?*\s]+"#).unwrap());
static HYPHEN_RUN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"-+").unwrap());
static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());
static WS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Convert a stream or topic name to a safe filename.
///
/// Replaces path-hostile characters and whitespace with hyphens, collapses
/// hyphen runs, trims, lowercases. Returns "untitled" if nothing survives.
pub fn sanitize_filename(name: &str) -> String {
    let replaced = FILENAME_RE.replace_all(name, "-");
    let collapsed = HYPHEN_RUN_RE.replace_all(&replaced, "-");
    let trimmed = collapsed.trim_matches('-').to_lowercase();
    if trimmed.is_empty() {
        "untitled".to_string()
    } else {
        trimmed
    }
}

/// Convert rendered HTML to plain text: drop tags, decode the common
/// entities, normalize whitespace.
pub fn strip_html(html: &str) -> String {
    let no_tags = TAG_RE.replace_all(html, "");
    let decoded = no_tags
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");
    WS_RE.replace_all(&decoded, " ").trim().to_string()
}

/// Format a Unix timestamp as local "YYYY-MM-DD HH:MM".
pub fn format_timestamp(ts: i64) -> String {
    match Local.timestamp_opt(ts, 0) {
        chrono::LocalResult::Single(dt) => dt.format("%Y-%m-%d %H:%M").to_string(),
        _ => format!("@{}", ts),
    }
}

/// Format a Unix timestamp as UTC ISO-8601.
pub fn iso_timestamp(ts: i64) -> String {
    DateTime::<Utc>::from_timestamp(ts, 0)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| format!("@{}", ts))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_basic() {
        assert_eq!(sanitize_filename("General Chat"), "general-chat");
    }

    #[test]
    fn test_sanitize_path_chars() {
        assert_eq!(sanitize_filename("a/b\\c:d?e"), "a-b-c-d-e");
    }

    #[test]
    fn test_sanitize_collapses_runs() {
        assert_eq!(sanitize_filename("a -- b"), "a-b");
    }

    #[test]
    fn test_sanitize_empty() {
        assert_eq!(sanitize_filename(""), "untitled");
        assert_eq!(sanitize_filename("///"), "untitled");
    }

    #[test]
    fn test_strip_html_tags() {
        assert_eq!(strip_html("<p>Hello <b>world</b></p>"), "Hello world");
    }

    #[test]
    fn test_strip_html_entities() {
        assert_eq!(strip_html("a &lt;= b &amp;&amp; c"), "a <= b && c");
    }

    #[test]
    fn test_strip_html_whitespace() {
        assert_eq!(strip_html("  a\n\n  b  "), "a b");
    }

    #[test]
    fn test_iso_timestamp() {
        assert_eq!(iso_timestamp(0), "1970-01-01T00:00:00+00:00");
    }
}
