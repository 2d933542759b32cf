//! Extension points for code blocks and math spans.
//!
//! The compiler hands every fenced or indented code block to a
//! [`CodeBlockProcessor`] and every `$...$` / `$$...$$` span to a
//! [`MathProcessor`]. A processor either resolves the span immediately or
//! registers a deferred job and returns its placeholder.
//!
//! # Example
//!
//! ```
//! use texmark_renderer::{
//!     CodeBlockProcessor, CompilerOptions, HtmlBackend, MarkdownRenderer, ProcessResult,
//! };
//!
//! struct Shout;
//!
//! impl CodeBlockProcessor for Shout {
//!     fn process(&mut self, language: Option<&str>, source: &str) -> ProcessResult {
//!         match language {
//!             Some("shout") => ProcessResult::Inline(source.to_uppercase()),
//!             _ => ProcessResult::PassThrough,
//!         }
//!     }
//! }
//!
//! let mut shout = Shout;
//! let doc = MarkdownRenderer::<HtmlBackend>::new(CompilerOptions::default())
//!     .with_code_processor(&mut shout)
//!     .render_markdown("```shout\nhi\n```")
//!     .unwrap();
//! assert_eq!(doc.html, "<pre><code class=\"language-shout\">HI\n</code></pre>");
//! ```

use crate::placeholder::PlaceholderId;

/// Result of processing a code block or math span.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProcessResult {
    /// Emit a placeholder token for a job resolved after the compile pass.
    Placeholder(PlaceholderId),

    /// Emit this HTML immediately.
    ///
    /// For code blocks this is the content of the `<code>` element.
    Inline(String),

    /// Render the span with the backend's default markup.
    PassThrough,
}

/// Processor for code block contents.
pub trait CodeBlockProcessor {
    /// Process a code block.
    ///
    /// # Arguments
    ///
    /// * `language` - First word of the fence info string, `None` when absent
    /// * `source` - Raw content of the code block
    fn process(&mut self, language: Option<&str>, source: &str) -> ProcessResult;
}

/// Processor for math spans.
pub trait MathProcessor {
    /// Process a math expression.
    ///
    /// `display` is `true` for `$$...$$` block math.
    fn process_math(&mut self, expression: &str, display: bool) -> ProcessResult;
}

impl<P: CodeBlockProcessor + ?Sized> CodeBlockProcessor for &mut P {
    fn process(&mut self, language: Option<&str>, source: &str) -> ProcessResult {
        (**self).process(language, source)
    }
}

impl<P: MathProcessor + ?Sized> MathProcessor for &mut P {
    fn process_math(&mut self, expression: &str, display: bool) -> ProcessResult {
        (**self).process_math(expression, display)
    }
}

/// Extract the language token from a fence info string.
///
/// Format: `language [anything ...]`. Only the first word names the language.
#[must_use]
pub(crate) fn fence_language(info: &str) -> Option<&str> {
    info.split_whitespace().next()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fence_language() {
        assert_eq!(fence_language("rust"), Some("rust"));
        assert_eq!(fence_language("python title=\"x.py\""), Some("python"));
        assert_eq!(fence_language("  js  "), Some("js"));
        assert_eq!(fence_language(""), None);
        assert_eq!(fence_language("   "), None);
    }

    #[test]
    fn test_mut_ref_forwards() {
        struct Fixed;
        impl MathProcessor for Fixed {
            fn process_math(&mut self, expression: &str, display: bool) -> ProcessResult {
                ProcessResult::Inline(format!("{expression}:{display}"))
            }
        }

        let mut fixed = Fixed;
        let mut borrowed = &mut fixed;
        assert_eq!(
            borrowed.process_math("x", true),
            ProcessResult::Inline("x:true".to_owned())
        );
    }
}
