pub mod http;
#[cfg(feature = "aws")]
pub mod sigv4;

/// Current time as epoch seconds.
pub fn epoch_seconds() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Truncate a string to `max_chars` characters, suffix included.
pub fn truncate_string(s: &str, max_chars: usize, suffix: &str) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let keep = max_chars.saturating_sub(suffix.chars().count());
    let end = s.char_indices().nth(keep).map_or(s.len(), |(i, _)| i);
    format!("{}{}", &s[..end], suffix)
}

/// Escape text for interpolation into an HTML page.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_string() {
        assert_eq!(truncate_string("hello", 10, "..."), "hello");
        assert_eq!(truncate_string("hello world", 8, "..."), "hello...");
        assert_eq!(truncate_string("ab", 2, "..."), "ab");
    }

    #[test]
    fn test_truncate_string_counts_chars() {
        assert_eq!(truncate_string("予定です", 4, ""), "予定です");
        assert_eq!(truncate_string("予定です", 3, ""), "予定で");
        assert_eq!(truncate_string("予定です", 3, "…"), "予定…");
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("<b>\"x\" & 'y'</b>"), "&lt;b&gt;&quot;x&quot; &amp; &#39;y&#39;&lt;/b&gt;");
        assert_eq!(escape_html("plain"), "plain");
    }

    #[test]
    fn test_epoch_seconds_is_recent() {
        assert!(epoch_seconds() > 1_700_000_000);
    }
}
