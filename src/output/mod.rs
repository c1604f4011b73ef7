// Output formatting — terminal display and JSON export.

pub mod export;
pub mod terminal;

/// Truncate a string to at most `max_chars` characters, appending "..." if truncated.
///
/// Unlike byte slicing (`&text[..40]`), this respects UTF-8 character boundaries
/// and will never panic on multi-byte characters in non-English keywords.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    let char_count = text.chars().count();
    if char_count <= max_chars {
        text.to_string()
    } else {
        let truncated: String = text.chars().take(max_chars).collect();
        format!("{truncated}...")
    }
}

/// Signed percentage for a relative change ("+40.0%"), or "n/a".
pub fn format_change(change: Option<f64>) -> String {
    match change {
        Some(c) => format!("{:+.1}%", c * 100.0),
        None => "n/a".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_chars_multibyte() {
        assert_eq!(truncate_chars("zapatos para correr", 7), "zapatos...");
        assert_eq!(truncate_chars("café", 10), "café");
        assert_eq!(truncate_chars("日本語のキーワード", 3), "日本語...");
    }

    #[test]
    fn test_format_change() {
        assert_eq!(format_change(Some(0.4)), "+40.0%");
        assert_eq!(format_change(Some(-0.125)), "-12.5%");
        assert_eq!(format_change(None), "n/a");
    }
}
