//! String utilities for the domain layer.

/// Truncate a string to a maximum length with ellipsis (UTF-8 safe)
///
/// Uses byte length for max_len but ensures truncation occurs at valid
/// UTF-8 character boundaries.
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        s.to_string()
    } else {
        let target = max_len.saturating_sub(3);
        let mut end = target.min(s.len());
        while end > 0 && !s.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &s[..end])
    }
}

/// Collapse all runs of whitespace (including newlines) into single spaces.
///
/// Used when embedding free-text reasoning into a one-line prompt summary.
pub fn single_line(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_ascii() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello world", 8), "hello...");
    }

    #[test]
    fn test_truncate_multibyte() {
        // 'ñ' and 'ó' are 2 bytes each
        assert_eq!(truncate("mañana", 20), "mañana");
        // "mañana" is exactly 7 bytes, so a 10 byte budget keeps it whole
        assert_eq!(truncate("mañana habrá sol", 10), "mañana...");
        // "canción" is 8 bytes; a 7 byte budget leaves room for 4 plus ellipsis
        assert_eq!(truncate("canción", 7), "canc...");
        assert_eq!(truncate("canción", 8), "canción");
    }

    #[test]
    fn test_single_line() {
        assert_eq!(single_line("  the user\n asks\tabout   weather "), "the user asks about weather");
        assert_eq!(single_line(""), "");
    }
}
