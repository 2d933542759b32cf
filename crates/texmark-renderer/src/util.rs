//! Shared utility functions for markdown rendering.

use std::fmt::Write;

use pulldown_cmark::HeadingLevel;

/// Escape source code for display when highlighting fails.
///
/// Every character outside `[0-9A-Za-z ]` becomes a decimal numeric character
/// reference. This is a whitelist, not an HTML-aware escaper: input that
/// already contains entities is escaped again.
///
/// # Examples
///
/// ```
/// use texmark_renderer::escape_code;
///
/// assert_eq!(escape_code("<b>"), "&#60;b&#62;");
/// assert_eq!(escape_code("a = 1"), "a &#61; 1");
/// ```
#[must_use]
pub fn escape_code(code: &str) -> String {
    let mut result = String::with_capacity(code.len() * 2);
    for c in code.chars() {
        if c.is_ascii_alphanumeric() || c == ' ' {
            result.push(c);
        } else {
            write!(result, "&#{};", u32::from(c)).unwrap();
        }
    }
    result
}

/// Convert heading level enum to number (1-6).
#[must_use]
pub(crate) fn heading_level_to_num(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}
