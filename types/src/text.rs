//! Small pure text helpers.

/// Truncates `raw` so the result, including `suffix`, is at most `max_total`
/// characters.
#[must_use]
pub fn truncate_to_fit(raw: &str, max_total: usize, suffix: &str) -> String {
    if raw.chars().count() <= max_total {
        return raw.to_string();
    }
    let take = max_total.saturating_sub(suffix.chars().count());
    let mut out: String = raw.chars().take(take).collect();
    out.push_str(suffix);
    out
}

/// Trims, flattens newlines to spaces, and truncates with `…`.
#[must_use]
pub fn truncate_with_ellipsis(raw: &str, max: usize) -> String {
    let flat = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    truncate_to_fit(&flat, max.max(1), "…")
}

/// Removes ANSI escape sequences and control characters other than
/// newline and tab.
#[must_use]
pub fn strip_control(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\x1b' => match chars.peek() {
                Some('[') => {
                    chars.next();
                    // CSI: parameters then one final byte in 0x40..=0x7e
                    for c in chars.by_ref() {
                        if ('\x40'..='\x7e').contains(&c) {
                            break;
                        }
                    }
                }
                Some(']') => {
                    chars.next();
                    // OSC: terminated by BEL or ESC \
                    while let Some(c) = chars.next() {
                        if c == '\x07' {
                            break;
                        }
                        if c == '\x1b' && chars.peek() == Some(&'\\') {
                            chars.next();
                            break;
                        }
                    }
                }
                Some(_) => {
                    chars.next();
                }
                None => {}
            },
            '\n' | '\t' => out.push(c),
            c if c.is_control() => {}
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::{strip_control, truncate_to_fit, truncate_with_ellipsis};

    #[test]
    fn to_fit_respects_budget() {
        let result = truncate_to_fit("hello world", 8, "…");
        assert_eq!(result.chars().count(), 8);
        assert!(result.ends_with('…'));
    }

    #[test]
    fn to_fit_short_unchanged() {
        assert_eq!(truncate_to_fit("hello", 5, "…"), "hello");
    }

    #[test]
    fn ellipsis_flattens_whitespace() {
        assert_eq!(truncate_with_ellipsis("  fix\nthe   bug ", 60), "fix the bug");
    }

    #[test]
    fn ellipsis_counts_chars_not_bytes() {
        assert_eq!(truncate_with_ellipsis("ééééé", 3), "éé…");
    }

    #[test]
    fn strip_removes_sgr_and_osc() {
        assert_eq!(strip_control("\x1b[31mred\x1b[0m"), "red");
        assert_eq!(strip_control("a\x1b]0;title\x07b"), "ab");
        assert_eq!(strip_control("line\r\nnext"), "line\nnext");
    }
}
