//! Math typesetting with a synchronous primary engine and an async fallback.
//!
//! Every math span is first offered to the primary [`MathEngine`] (KaTeX by
//! default). Expressions it cannot handle are sent to the
//! [`FallbackMathEngine`], which produces SVG after the compile pass. Fallback
//! failures become a visible inline error box; the render itself succeeds.

use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use katex::{OptsBuilder, OutputType};
use texmark_cache::{Cache, CacheKey};

use crate::code_block::{MathProcessor, ProcessResult};
use crate::placeholder::{JobKind, PendingJob, PlaceholderRegistry};
use crate::state::escape_html;

/// Primary engine failure.
#[derive(Debug, thiserror::Error)]
pub enum MathError {
    #[error("failed to build KaTeX options: {0}")]
    Options(String),

    #[error("KaTeX rendering failed: {0}")]
    Render(String),
}

/// Synchronous math engine producing HTML.
pub trait MathEngine: Send + Sync {
    /// Render `expression`, as block math when `display` is set.
    ///
    /// # Errors
    ///
    /// Returns [`MathError`] for expressions the engine cannot typeset.
    fn render(&self, expression: &str, display: bool) -> Result<String, MathError>;
}

/// [`MathEngine`] backed by KaTeX, producing HTML-only output.
#[derive(Clone, Copy, Debug, Default)]
pub struct KatexEngine;

impl MathEngine for KatexEngine {
    fn render(&self, expression: &str, display: bool) -> Result<String, MathError> {
        let mut builder = OptsBuilder::default();
        builder.display_mode(display);
        builder.output_type(OutputType::Html);

        let opts = builder
            .build()
            .map_err(|e| MathError::Options(e.to_string()))?;

        katex::render_with_opts(expression, opts).map_err(|e| MathError::Render(e.to_string()))
    }
}

/// Input format requested from the fallback engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TexFormat {
    /// Block math.
    Tex,
    /// Inline math.
    InlineTex,
}

impl TexFormat {
    #[must_use]
    pub fn from_display(display: bool) -> Self {
        if display { Self::Tex } else { Self::InlineTex }
    }

    /// Conventional name of the format (`TeX` or `inline-TeX`).
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tex => "TeX",
            Self::InlineTex => "inline-TeX",
        }
    }
}

/// Errors reported by the fallback engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}", .messages.join("; "))]
pub struct FallbackError {
    pub messages: Vec<String>,
}

impl FallbackError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            messages: vec![message.into()],
        }
    }
}

/// Asynchronous math engine producing SVG.
#[async_trait]
pub trait FallbackMathEngine: Send + Sync {
    /// Typeset `expression` as SVG markup.
    ///
    /// # Errors
    ///
    /// Returns [`FallbackError`] with the engine's messages on failure.
    async fn typeset_svg(&self, expression: &str, format: TexFormat) -> Result<String, FallbackError>;
}

/// Inline error box shown in place of an expression no engine could typeset.
#[must_use]
pub fn error_box(error: &FallbackError) -> String {
    let messages: Vec<String> = error.messages.iter().map(|m| escape_html(m)).collect();
    format!(
        r#"<div style="display: inline-block; border: 1px solid #000; "><strong>{}</strong></div>"#,
        messages.join("<br>")
    )
}

/// Place fallback SVG in the document: display math is centered.
///
/// Display math sits inside the surrounding paragraph, so the wrapper must be
/// phrasing content.
fn wrap_svg(svg: &str, display: bool) -> String {
    if display {
        format!(r#"<span style="display: block; text-align: center; ">{svg}</span>"#)
    } else {
        svg.to_owned()
    }
}

/// Math processor wrapping both engines for one render call.
pub(crate) struct MathAdapter {
    engine: Arc<dyn MathEngine>,
    fallback: Arc<dyn FallbackMathEngine>,
    cache: Option<Arc<dyn Cache>>,
    registry: PlaceholderRegistry,
}

impl MathAdapter {
    /// `cache` is `None` when math caching is disabled.
    pub fn new(
        engine: Arc<dyn MathEngine>,
        fallback: Arc<dyn FallbackMathEngine>,
        cache: Option<Arc<dyn Cache>>,
    ) -> Self {
        Self {
            engine,
            fallback,
            cache,
            registry: PlaceholderRegistry::new(JobKind::Math),
        }
    }

    pub fn into_jobs(self) -> Vec<PendingJob> {
        self.registry.into_jobs()
    }
}

impl MathProcessor for MathAdapter {
    fn process_math(&mut self, expression: &str, display: bool) -> ProcessResult {
        let key = self.cache.as_ref().map(|_| {
            CacheKey::Math {
                expression,
                display,
            }
            .to_string()
        });

        if let (Some(cache), Some(key)) = (&self.cache, &key)
            && let Some(html) = cache.get(key)
        {
            return ProcessResult::Inline(html);
        }

        match self.engine.render(expression, display) {
            Ok(html) => {
                if let (Some(cache), Some(key)) = (&self.cache, &key) {
                    cache.set(key, &html);
                }
                ProcessResult::Inline(html)
            }
            Err(e) => {
                tracing::debug!("primary math engine failed, deferring to fallback: {e}");
                let fallback = Arc::clone(&self.fallback);
                let cache = self.cache.clone();
                let expression = expression.to_owned();
                let job = async move {
                    let format = TexFormat::from_display(display);
                    let html = match fallback.typeset_svg(&expression, format).await {
                        Ok(svg) => wrap_svg(&svg, display),
                        Err(e) => {
                            tracing::warn!("failed to typeset {expression:?}: {e}");
                            error_box(&e)
                        }
                    };
                    if let (Some(cache), Some(key)) = (cache, key) {
                        cache.set(&key, &html);
                    }
                    html
                }
                .boxed();
                ProcessResult::Placeholder(self.registry.register(job))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::placeholder::resolve_all;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;
    use texmark_cache::MemoryCache;

    /// Accepts everything except expressions containing `\bad`.
    struct Picky;

    impl MathEngine for Picky {
        fn render(&self, expression: &str, display: bool) -> Result<String, MathError> {
            if expression.contains("\\bad") {
                Err(MathError::Render(format!("undefined control sequence in {expression}")))
            } else {
                Ok(format!("<k d={display}>{expression}</k>"))
            }
        }
    }

    #[derive(Default)]
    struct RecordingFallback {
        calls: Mutex<Vec<(String, TexFormat)>>,
    }

    #[async_trait]
    impl FallbackMathEngine for RecordingFallback {
        async fn typeset_svg(&self, expression: &str, format: TexFormat) -> Result<String, FallbackError> {
            self.calls
                .lock()
                .unwrap()
                .push((expression.to_owned(), format));
            Ok(format!("<svg>{expression}</svg>"))
        }
    }

    struct RejectingFallback;

    #[async_trait]
    impl FallbackMathEngine for RejectingFallback {
        async fn typeset_svg(&self, _expression: &str, _format: TexFormat) -> Result<String, FallbackError> {
            Err(FallbackError {
                messages: vec!["Undefined control sequence <\\bad>".to_owned(), "second".to_owned()],
            })
        }
    }

    #[test]
    fn test_katex_renders_inline_and_display() {
        let inline = KatexEngine.render("x^2", false).unwrap();
        assert!(inline.contains("katex"));
        assert!(!inline.contains("katex-display"));

        let display = KatexEngine.render("x^2", true).unwrap();
        assert!(display.contains("katex-display"));
    }

    #[test]
    fn test_katex_rejects_unknown_macro() {
        let err = KatexEngine.render("\\notamacro{x}", false).unwrap_err();
        assert!(matches!(err, MathError::Render(_)));
    }

    #[test]
    fn test_tex_format() {
        assert_eq!(TexFormat::from_display(true).as_str(), "TeX");
        assert_eq!(TexFormat::from_display(false).as_str(), "inline-TeX");
    }

    #[test]
    fn test_error_box_escapes_messages() {
        let html = error_box(&FallbackError {
            messages: vec!["a < b".to_owned(), "c".to_owned()],
        });
        assert_eq!(
            html,
            r#"<div style="display: inline-block; border: 1px solid #000; "><strong>a &lt; b<br>c</strong></div>"#
        );
    }

    #[test]
    fn test_primary_success_is_inline_and_cached() {
        let cache = Arc::new(MemoryCache::new());
        let mut adapter = MathAdapter::new(
            Arc::new(Picky),
            Arc::new(RecordingFallback::default()),
            Some(cache.clone()),
        );

        let result = adapter.process_math("x", true);
        assert_eq!(result, ProcessResult::Inline("<k d=true>x</k>".to_owned()));
        assert_eq!(cache.get("M_1x").as_deref(), Some("<k d=true>x</k>"));
        assert!(adapter.into_jobs().is_empty());
    }

    #[test]
    fn test_cache_hit_skips_engines() {
        let cache = Arc::new(MemoryCache::new());
        cache.set("M_0\\bad", "<cached/>");
        let fallback = Arc::new(RecordingFallback::default());
        let mut adapter = MathAdapter::new(Arc::new(Picky), fallback.clone(), Some(cache));

        assert_eq!(
            adapter.process_math("\\bad", false),
            ProcessResult::Inline("<cached/>".to_owned())
        );
        assert!(adapter.into_jobs().is_empty());
        assert!(fallback.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_primary_failure_defers_to_fallback() {
        let cache = Arc::new(MemoryCache::new());
        let fallback = Arc::new(RecordingFallback::default());
        let mut adapter = MathAdapter::new(Arc::new(Picky), fallback.clone(), Some(cache.clone()));

        let ProcessResult::Placeholder(first) = adapter.process_math("\\bad 1", true) else {
            panic!("failing expression must defer");
        };
        let ProcessResult::Placeholder(second) = adapter.process_math("\\bad 2", false) else {
            panic!("failing expression must defer");
        };
        assert_eq!(first.to_string(), "math-0");
        assert_eq!(second.to_string(), "math-1");

        let replacements = resolve_all(adapter.into_jobs()).now_or_never().unwrap();
        let html = format!("{}|{}", first.token(), second.token());
        let split = first.token().len();
        let spans = vec![
            crate::placeholder::PlaceholderSpan {
                id: first,
                range: 0..split,
            },
            crate::placeholder::PlaceholderSpan {
                id: second,
                range: split + 1..html.len(),
            },
        ];
        assert_eq!(
            replacements.apply(&html, &spans),
            r#"<span style="display: block; text-align: center; "><svg>\bad 1</svg></span>|<svg>\bad 2</svg>"#
        );
        assert_eq!(
            *fallback.calls.lock().unwrap(),
            vec![
                ("\\bad 1".to_owned(), TexFormat::Tex),
                ("\\bad 2".to_owned(), TexFormat::InlineTex),
            ]
        );
        assert_eq!(cache.get("M_0\\bad 2").as_deref(), Some("<svg>\\bad 2</svg>"));
    }

    #[test]
    fn test_fallback_failure_renders_error_box() {
        let cache = Arc::new(MemoryCache::new());
        let mut adapter =
            MathAdapter::new(Arc::new(Picky), Arc::new(RejectingFallback), Some(cache.clone()));

        let ProcessResult::Placeholder(id) = adapter.process_math("\\bad", false) else {
            panic!("failing expression must defer");
        };
        let replacements = resolve_all(adapter.into_jobs()).now_or_never().unwrap();
        let html = id.token();
        let spans = vec![crate::placeholder::PlaceholderSpan {
            id,
            range: 0..html.len(),
        }];

        let expected = concat!(
            r#"<div style="display: inline-block; border: 1px solid #000; ">"#,
            r#"<strong>Undefined control sequence &lt;\bad&gt;<br>second</strong></div>"#
        );
        assert_eq!(replacements.apply(&html, &spans), expected);
        // Error boxes are cached like any other result
        assert_eq!(cache.get("M_0\\bad").as_deref(), Some(expected));
    }
}
