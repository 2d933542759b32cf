//! HTML backend for markdown rendering.

use std::fmt::Write;

use crate::backend::{AlertKind, RenderBackend};
use crate::state::escape_html;

/// HTML render backend.
///
/// Produces semantic HTML5 with:
/// - `<pre><code class="language-x">` for code blocks, with an optional
///   `line-numbers-rows` gutter
/// - `<span class="math ...">` for math left to the client
/// - `<div class="alert ...">` for GitHub-style alerts
pub struct HtmlBackend;

impl RenderBackend for HtmlBackend {
    fn code_block_start(lang: Option<&str>, line_numbers: bool, out: &mut String) {
        out.push_str(if line_numbers {
            r#"<pre class="line-numbers">"#
        } else {
            "<pre>"
        });
        match lang {
            Some(lang) => write!(out, r#"<code class="language-{}">"#, escape_html(lang)).unwrap(),
            None => out.push_str("<code>"),
        }
    }

    fn code_block_end(gutter_lines: Option<usize>, out: &mut String) {
        out.push_str("</code>");
        if let Some(lines) = gutter_lines {
            out.push_str(r#"<span aria-hidden="true" class="line-numbers-rows">"#);
            for _ in 0..lines {
                out.push_str("<span></span>");
            }
            out.push_str("</span>");
        }
        out.push_str("</pre>");
    }

    fn code_block(lang: Option<&str>, content: &str, gutter_lines: Option<usize>, out: &mut String) {
        Self::code_block_start(lang, gutter_lines.is_some(), out);
        out.push_str(&escape_html(content));
        Self::code_block_end(gutter_lines, out);
    }

    fn math(expression: &str, display: bool, out: &mut String) {
        let class = if display { "math-display" } else { "math-inline" };
        write!(
            out,
            r#"<span class="math {class}">{}</span>"#,
            escape_html(expression)
        )
        .unwrap();
    }

    fn blockquote_start(out: &mut String) {
        out.push_str("<blockquote>");
    }

    fn blockquote_end(out: &mut String) {
        out.push_str("</blockquote>");
    }

    fn alert_start(kind: AlertKind, out: &mut String) {
        let (class, title) = match kind {
            AlertKind::Note => ("note", "Note"),
            AlertKind::Tip => ("tip", "Tip"),
            AlertKind::Important => ("important", "Important"),
            AlertKind::Warning => ("warning", "Warning"),
            AlertKind::Caution => ("caution", "Caution"),
        };
        write!(
            out,
            r#"<div class="alert alert-{class}"><p class="alert-title">{title}</p>"#
        )
        .unwrap();
    }

    fn alert_end(_kind: AlertKind, out: &mut String) {
        out.push_str("</div>");
    }

    fn image(src: &str, alt: &str, title: &str, out: &mut String) {
        let title_attr = if title.is_empty() {
            String::new()
        } else {
            format!(r#" title="{}""#, escape_html(title))
        };
        write!(
            out,
            r#"<img src="{}"{title_attr} alt="{}">"#,
            escape_html(src),
            escape_html(alt)
        )
        .unwrap();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_code_block_with_language() {
        let mut out = String::new();
        HtmlBackend::code_block(Some("rust"), "fn main() {}", None, &mut out);
        assert_eq!(
            out,
            r#"<pre><code class="language-rust">fn main() {}</code></pre>"#
        );
    }

    #[test]
    fn test_code_block_without_language() {
        let mut out = String::new();
        HtmlBackend::code_block(None, "a < b", None, &mut out);
        assert_eq!(out, "<pre><code>a &lt; b</code></pre>");
    }

    #[test]
    fn test_code_block_line_numbers() {
        let mut out = String::new();
        HtmlBackend::code_block(None, "a\nb\n", Some(2), &mut out);
        assert_eq!(
            out,
            concat!(
                r#"<pre class="line-numbers"><code>a"#,
                "\nb\n",
                r#"</code><span aria-hidden="true" class="line-numbers-rows"><span></span><span></span></span></pre>"#
            )
        );
    }

    #[test]
    fn test_math_pass_through() {
        let mut out = String::new();
        HtmlBackend::math("a<b", false, &mut out);
        HtmlBackend::math("x", true, &mut out);
        assert_eq!(
            out,
            r#"<span class="math math-inline">a&lt;b</span><span class="math math-display">x</span>"#
        );
    }

    #[test]
    fn test_blockquote() {
        let mut out = String::new();
        HtmlBackend::blockquote_start(&mut out);
        out.push_str("content");
        HtmlBackend::blockquote_end(&mut out);
        assert_eq!(out, "<blockquote>content</blockquote>");
    }

    #[test]
    fn test_alert() {
        let mut out = String::new();
        HtmlBackend::alert_start(AlertKind::Warning, &mut out);
        out.push_str("<p>careful</p>");
        HtmlBackend::alert_end(AlertKind::Warning, &mut out);
        assert_eq!(
            out,
            r#"<div class="alert alert-warning"><p class="alert-title">Warning</p><p>careful</p></div>"#
        );
    }

    #[test]
    fn test_image_with_title() {
        let mut out = String::new();
        HtmlBackend::image("image.png", "Alt text", "Image title", &mut out);
        assert_eq!(
            out,
            r#"<img src="image.png" title="Image title" alt="Alt text">"#
        );
    }
}
