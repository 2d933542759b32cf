//! Render backend trait for format-specific rendering.
//!
//! The compiler handles document structure generically and delegates the
//! markup of individual elements to a [`RenderBackend`].

use pulldown_cmark::BlockQuoteKind;

/// GitHub-style alert kind (`> [!NOTE]` and friends).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AlertKind {
    Note,
    Tip,
    Important,
    Warning,
    Caution,
}

impl From<BlockQuoteKind> for AlertKind {
    fn from(kind: BlockQuoteKind) -> Self {
        match kind {
            BlockQuoteKind::Note => Self::Note,
            BlockQuoteKind::Tip => Self::Tip,
            BlockQuoteKind::Important => Self::Important,
            BlockQuoteKind::Warning => Self::Warning,
            BlockQuoteKind::Caution => Self::Caution,
        }
    }
}

/// Backend trait for format-specific rendering operations.
pub trait RenderBackend {
    /// Open a code block. Content follows as the inner HTML of `<code>`.
    ///
    /// # Arguments
    ///
    /// * `lang` - Optional language identifier (e.g., "rust", "python")
    /// * `line_numbers` - Whether the block carries a line-number gutter
    /// * `out` - Output buffer to write to
    fn code_block_start(lang: Option<&str>, line_numbers: bool, out: &mut String);

    /// Close a code block.
    ///
    /// `gutter_lines` is the number of source lines when line numbering is on.
    fn code_block_end(gutter_lines: Option<usize>, out: &mut String);

    /// Render a code block nobody processed.
    fn code_block(lang: Option<&str>, content: &str, gutter_lines: Option<usize>, out: &mut String);

    /// Render a math span no processor handled.
    fn math(expression: &str, display: bool, out: &mut String);

    /// Render blockquote start tag.
    fn blockquote_start(out: &mut String);

    /// Render blockquote end tag.
    fn blockquote_end(out: &mut String);

    /// Render alert start.
    fn alert_start(kind: AlertKind, out: &mut String);

    /// Render alert end.
    fn alert_end(kind: AlertKind, out: &mut String);

    /// Render an image.
    fn image(src: &str, alt: &str, title: &str, out: &mut String);

    /// Render a hard break.
    fn hard_break(out: &mut String) {
        out.push_str("<br>");
    }

    /// Render a horizontal rule.
    fn horizontal_rule(out: &mut String) {
        out.push_str("<hr>");
    }

    /// Render a task list marker.
    fn task_list_marker(checked: bool, out: &mut String) {
        if checked {
            out.push_str(r#"<input type="checkbox" checked disabled> "#);
        } else {
            out.push_str(r#"<input type="checkbox" disabled> "#);
        }
    }
}
