//! Syntax highlighting extension point.
//!
//! [`Highlighter`] turns `(code, language)` into highlighted HTML, either
//! immediately or as a future. The crate-internal [`HighlightAdapter`] wraps a
//! highlighter for the compiler: it consults the cache, defers asynchronous
//! results behind placeholders, and degrades failures to escaped source.

use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use syntect::html::{ClassStyle, ClassedHTMLGenerator};
use syntect::parsing::{SyntaxReference, SyntaxSet};
use syntect::util::LinesWithEndings;
use texmark_cache::{Cache, CacheKey};

use crate::code_block::{CodeBlockProcessor, ProcessResult};
use crate::placeholder::{JobKind, PendingJob, PlaceholderRegistry};
use crate::util::escape_code;

/// Highlighting failure. Never surfaces to render callers.
#[derive(Debug, thiserror::Error)]
pub enum HighlightError {
    /// No grammar matches the fence language token.
    #[error("unknown language: {0}")]
    UnknownLanguage(String),

    /// The engine failed while highlighting.
    #[error("highlighting {language} failed: {message}")]
    Engine { language: String, message: String },
}

/// Outcome of a successful highlight call.
pub enum Highlighted {
    /// Highlighted HTML, available now.
    Ready(String),
    /// Highlighted HTML, available once the future resolves.
    Pending(BoxFuture<'static, Result<String, HighlightError>>),
}

/// A syntax highlighting engine.
///
/// Output is the inner HTML of a `<code>` element.
pub trait Highlighter: Send + Sync {
    /// Highlight `code`.
    ///
    /// `language` is `None` when the fence names no language; implementations
    /// should then auto-detect.
    ///
    /// # Errors
    ///
    /// Returns [`HighlightError`] for unknown languages or engine failures.
    fn highlight(&self, code: &str, language: Option<&str>) -> Result<Highlighted, HighlightError>;
}

/// [`Highlighter`] backed by syntect's bundled grammars.
///
/// Emits `<span>` elements with `syntax-` prefixed scope classes.
///
/// # Auto-detection
///
/// Without a language token, the syntax is chosen from the first line only:
/// shebangs, editor modelines, and XML declarations. There is no scoring of
/// the code itself, so most unlabelled blocks render as plain text. Callers
/// wanting content-based guessing can wrap this type in their own
/// [`Highlighter`] that picks a language token first.
#[derive(Debug)]
pub struct SyntectHighlighter {
    syntax_set: SyntaxSet,
    class_style: ClassStyle,
}

impl SyntectHighlighter {
    /// Create a highlighter with syntect's default syntaxes.
    #[must_use]
    pub fn new() -> Self {
        Self::with_syntax_set(SyntaxSet::load_defaults_newlines())
    }

    /// Create a highlighter with a custom syntax set.
    #[must_use]
    pub fn with_syntax_set(syntax_set: SyntaxSet) -> Self {
        Self {
            syntax_set,
            class_style: ClassStyle::SpacedPrefixed { prefix: "syntax-" },
        }
    }

    fn find_syntax(&self, token: &str) -> Option<&SyntaxReference> {
        let lowercase = token.to_ascii_lowercase();
        self.syntax_set
            .find_syntax_by_token(&lowercase)
            .or_else(|| self.syntax_set.find_syntax_by_name(token))
            .or_else(|| self.syntax_set.find_syntax_by_extension(&lowercase))
    }

    fn render(&self, syntax: &SyntaxReference, code: &str) -> Result<String, HighlightError> {
        let mut generator =
            ClassedHTMLGenerator::new_with_class_style(syntax, &self.syntax_set, self.class_style);

        for line in LinesWithEndings::from(code) {
            generator
                .parse_html_for_line_which_includes_newline(line)
                .map_err(|e| HighlightError::Engine {
                    language: syntax.name.clone(),
                    message: e.to_string(),
                })?;
        }

        Ok(generator.finalize())
    }
}

impl Default for SyntectHighlighter {
    fn default() -> Self {
        Self::new()
    }
}

impl Highlighter for SyntectHighlighter {
    fn highlight(&self, code: &str, language: Option<&str>) -> Result<Highlighted, HighlightError> {
        let syntax = match language {
            Some(token) => self
                .find_syntax(token)
                .ok_or_else(|| HighlightError::UnknownLanguage(token.to_owned()))?,
            None => self
                .syntax_set
                .find_syntax_by_first_line(code)
                .unwrap_or_else(|| self.syntax_set.find_syntax_plain_text()),
        };
        self.render(syntax, code).map(Highlighted::Ready)
    }
}

/// Code block processor wrapping a [`Highlighter`] for one render call.
pub(crate) struct HighlightAdapter {
    highlighter: Arc<dyn Highlighter>,
    cache: Option<Arc<dyn Cache>>,
    registry: PlaceholderRegistry,
}

impl HighlightAdapter {
    /// `cache` is `None` when highlight caching is disabled.
    pub fn new(highlighter: Arc<dyn Highlighter>, cache: Option<Arc<dyn Cache>>) -> Self {
        Self {
            highlighter,
            cache,
            registry: PlaceholderRegistry::new(JobKind::Highlight),
        }
    }

    pub fn into_jobs(self) -> Vec<PendingJob> {
        self.registry.into_jobs()
    }
}

impl CodeBlockProcessor for HighlightAdapter {
    fn process(&mut self, language: Option<&str>, source: &str) -> ProcessResult {
        let language = language.filter(|l| !l.is_empty());
        let key = self.cache.as_ref().map(|_| {
            CacheKey::Highlight {
                language: language.unwrap_or_default(),
                code: source,
            }
            .to_string()
        });

        if let (Some(cache), Some(key)) = (&self.cache, &key)
            && let Some(html) = cache.get(key)
        {
            return ProcessResult::Inline(html);
        }

        match self.highlighter.highlight(source, language) {
            Ok(Highlighted::Ready(html)) => {
                if let (Some(cache), Some(key)) = (&self.cache, &key) {
                    cache.set(key, &html);
                }
                ProcessResult::Inline(html)
            }
            Ok(Highlighted::Pending(future)) => {
                let cache = self.cache.clone();
                let code = source.to_owned();
                let job = async move {
                    match future.await {
                        Ok(html) => {
                            if let (Some(cache), Some(key)) = (cache, key) {
                                cache.set(&key, &html);
                            }
                            html
                        }
                        Err(e) => {
                            tracing::warn!("highlighting failed, using escaped source: {e}");
                            escape_code(&code)
                        }
                    }
                }
                .boxed();
                ProcessResult::Placeholder(self.registry.register(job))
            }
            Err(e) => {
                tracing::warn!("highlighting failed, using escaped source: {e}");
                ProcessResult::Inline(escape_code(source))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use texmark_cache::MemoryCache;

    struct Failing;

    impl Highlighter for Failing {
        fn highlight(&self, _code: &str, language: Option<&str>) -> Result<Highlighted, HighlightError> {
            Err(HighlightError::UnknownLanguage(
                language.unwrap_or_default().to_owned(),
            ))
        }
    }

    struct Deferred;

    impl Highlighter for Deferred {
        fn highlight(&self, code: &str, _language: Option<&str>) -> Result<Highlighted, HighlightError> {
            let html = format!("<i>{}</i>", code.trim());
            Ok(Highlighted::Pending(future::ready(Ok(html)).boxed()))
        }
    }

    #[derive(Default)]
    struct Counting {
        calls: AtomicUsize,
    }

    impl Highlighter for Counting {
        fn highlight(&self, code: &str, _language: Option<&str>) -> Result<Highlighted, HighlightError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Highlighted::Ready(code.to_uppercase()))
        }
    }

    #[test]
    fn test_syntect_known_language() {
        let highlighter = SyntectHighlighter::new();
        let Highlighted::Ready(html) = highlighter
            .highlight("fn main() {}\n", Some("rust"))
            .unwrap()
        else {
            panic!("syntect highlights synchronously");
        };
        assert!(html.contains(r#"class="syntax-"#));
        assert!(html.contains("main"));
    }

    #[test]
    fn test_syntect_language_token_is_case_insensitive() {
        let highlighter = SyntectHighlighter::new();
        assert!(highlighter.highlight("x = 1\n", Some("Python")).is_ok());
        assert!(highlighter.highlight("x = 1\n", Some("py")).is_ok());
    }

    #[test]
    fn test_syntect_unknown_language() {
        let highlighter = SyntectHighlighter::new();
        let err = highlighter
            .highlight("code\n", Some("no-such-language"))
            .err()
            .unwrap();
        assert!(matches!(err, HighlightError::UnknownLanguage(lang) if lang == "no-such-language"));
    }

    #[test]
    fn test_syntect_detects_from_first_line() {
        let highlighter = SyntectHighlighter::new();
        let Highlighted::Ready(html) = highlighter
            .highlight("#!/bin/bash\necho hi\n", None)
            .unwrap()
        else {
            panic!("syntect highlights synchronously");
        };
        assert!(html.contains("syntax-shell"));
    }

    #[test]
    fn test_syntect_plain_text_fallback() {
        let highlighter = SyntectHighlighter::new();
        let Highlighted::Ready(html) = highlighter.highlight("a < b\n", None).unwrap() else {
            panic!("syntect highlights synchronously");
        };
        assert!(html.contains("a &lt; b"));
    }

    #[test]
    fn test_syntect_unlabelled_code_is_plain_text() {
        let highlighter = SyntectHighlighter::new();
        let Highlighted::Ready(html) = highlighter
            .highlight("fn main() {\n    let x = 1;\n}\n", None)
            .unwrap()
        else {
            panic!("syntect highlights synchronously");
        };
        assert!(!html.contains("syntax-rust"));
        assert!(html.contains("let x = 1;"));
    }

    #[test]
    fn test_adapter_failure_escapes_source() {
        let mut adapter = HighlightAdapter::new(Arc::new(Failing), None);
        assert_eq!(
            adapter.process(Some("nope"), "<b>"),
            ProcessResult::Inline("&#60;b&#62;".to_owned())
        );
    }

    #[test]
    fn test_adapter_failure_is_not_cached() {
        let cache = Arc::new(MemoryCache::new());
        let mut adapter = HighlightAdapter::new(Arc::new(Failing), Some(cache.clone()));
        adapter.process(Some("nope"), "x");
        assert!(cache.is_empty());
    }

    #[test]
    fn test_adapter_caches_and_reuses() {
        let cache: Arc<dyn Cache> = Arc::new(MemoryCache::new());
        let counting = Arc::new(Counting::default());

        for _ in 0..2 {
            let mut adapter = HighlightAdapter::new(counting.clone(), Some(cache.clone()));
            assert_eq!(
                adapter.process(Some("txt"), "abc"),
                ProcessResult::Inline("ABC".to_owned())
            );
        }

        assert_eq!(counting.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.get("H_txt\nabc").as_deref(), Some("ABC"));
    }

    #[test]
    fn test_adapter_without_cache_always_calls_engine() {
        let counting = Arc::new(Counting::default());
        let mut adapter = HighlightAdapter::new(counting.clone(), None);
        adapter.process(None, "abc");
        adapter.process(None, "abc");
        assert_eq!(counting.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_adapter_defers_async_engine() {
        let cache = Arc::new(MemoryCache::new());
        let mut adapter = HighlightAdapter::new(Arc::new(Deferred), Some(cache.clone()));

        let ProcessResult::Placeholder(id) = adapter.process(Some("x"), "code\n") else {
            panic!("async engine must defer");
        };
        assert_eq!(id.to_string(), "hl-0");

        let jobs = adapter.into_jobs();
        assert_eq!(jobs.len(), 1);
        let replacements = crate::placeholder::resolve_all(jobs)
            .now_or_never()
            .unwrap();
        let html = id.token();
        let spans = vec![crate::placeholder::PlaceholderSpan {
            id,
            range: 0..html.len(),
        }];
        assert_eq!(replacements.apply(&html, &spans), "<i>code</i>");
        assert_eq!(cache.get("H_x\ncode\n").as_deref(), Some("<i>code</i>"));
    }
}
