//! Render orchestration: compile, await deferred spans, splice.
//!
//! One [`Renderer::render`] call runs the compiler once, synchronously, with a
//! fresh highlight adapter and math adapter. Spans the adapters could not
//! resolve on the spot come back as placeholder jobs. All jobs are then
//! awaited concurrently and their results spliced into the compiled HTML by
//! byte offset. Documents without deferred spans complete without ever
//! yielding.

use std::sync::Arc;

use texmark_cache::{Cache, CacheKey, MemoryCache};
use tokio::task::JoinHandle;

use crate::command::CommandMathEngine;
use crate::highlight::{HighlightAdapter, Highlighter, SyntectHighlighter};
use crate::html::HtmlBackend;
use crate::math::{FallbackMathEngine, KatexEngine, MathAdapter, MathEngine};
use crate::placeholder::{PendingJob, resolve_all};
use crate::renderer::{
    CompileError, CompiledDocument, CompilerOptions, CompilerOverrides, MarkdownRenderer,
};

/// Default fallback math command.
pub const DEFAULT_FALLBACK_COMMAND: &str = "tex2svg";

/// Which layers of the cache a [`Renderer`] reads and writes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CacheOptions {
    /// Cache highlighted code blocks.
    pub highlight: bool,
    /// Cache typeset math, including fallback error boxes.
    pub math: bool,
    /// Cache whole documents keyed by their raw input.
    ///
    /// Off by default: keys embed the full input, so an unbounded stream of
    /// distinct documents grows the cache without bound.
    pub result: bool,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            highlight: true,
            math: true,
            result: false,
        }
    }
}

/// Per-call replacements for a renderer's configuration.
#[derive(Clone, Default)]
pub struct RenderOverrides {
    /// Replaces the highlighter for this call.
    pub highlight: Option<Arc<dyn Highlighter>>,
    /// Replaces the primary math engine for this call. The fallback engine
    /// stays in place.
    pub math_renderer: Option<Arc<dyn MathEngine>>,
    /// Compiler options, passed through to the compiler.
    pub compiler: CompilerOverrides,
}

impl RenderOverrides {
    /// Whether no override is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.highlight.is_none()
            && self.math_renderer.is_none()
            && self.compiler == CompilerOverrides::default()
    }
}

/// Caller-visible render failure.
///
/// Highlight and math failures are recovered inside the render and never
/// appear here.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error(transparent)]
    Compile(#[from] CompileError),
}

/// Markdown to HTML renderer with deferred highlighting and math.
///
/// Cheap to share: wrap it in an [`Arc`] and render from many tasks. Every
/// call owns its own placeholder state; calls only share the cache.
///
/// # Example
///
/// ```no_run
/// use texmark_renderer::Renderer;
///
/// # async fn run() -> Result<(), texmark_renderer::RenderError> {
/// let renderer = Renderer::new();
/// let html = renderer.render("# Euler\n\n$e^{i\\pi} + 1 = 0$").await?;
/// assert!(html.starts_with(r#"<h1 id="euler">"#));
/// # Ok(())
/// # }
/// ```
pub struct Renderer {
    cache: Arc<dyn Cache>,
    cache_options: CacheOptions,
    highlighter: Arc<dyn Highlighter>,
    math: Arc<dyn MathEngine>,
    fallback: Arc<dyn FallbackMathEngine>,
    options: CompilerOptions,
}

/// Compiled output plus the jobs its placeholders wait on.
struct Compiled {
    document: CompiledDocument,
    jobs: Vec<PendingJob>,
}

impl Renderer {
    /// Create a renderer with default engines and an in-memory cache.
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    #[must_use]
    pub fn builder() -> RendererBuilder {
        RendererBuilder::default()
    }

    /// The cache shared by all render calls.
    #[must_use]
    pub fn cache(&self) -> &Arc<dyn Cache> {
        &self.cache
    }

    #[must_use]
    pub fn cache_options(&self) -> CacheOptions {
        self.cache_options
    }

    #[must_use]
    pub fn compiler_options(&self) -> CompilerOptions {
        self.options
    }

    /// Render markdown to HTML.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Compile`] if the compiler rejects the document.
    pub async fn render(&self, input: &str) -> Result<String, RenderError> {
        self.render_with(input, &RenderOverrides::default()).await
    }

    /// Render markdown to HTML with per-call overrides.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Compile`] if the compiler rejects the document.
    pub async fn render_with(
        &self,
        input: &str,
        overrides: &RenderOverrides,
    ) -> Result<String, RenderError> {
        if input.trim().is_empty() {
            return Ok(String::new());
        }

        // Keys carry only the input, so overridden renders bypass this layer.
        let result_key = (self.cache_options.result && overrides.is_empty())
            .then(|| CacheKey::Result { input }.to_string());
        if let Some(key) = &result_key
            && let Some(html) = self.cache.get(key)
        {
            tracing::debug!("whole-document cache hit");
            return Ok(html);
        }

        let Compiled { document, jobs } = self.compile(input, overrides)?;

        let html = if jobs.is_empty() {
            document.html
        } else {
            tracing::debug!(jobs = jobs.len(), "awaiting deferred spans");
            let replacements = resolve_all(jobs).await;
            debug_assert!(replacements.covers(&document.placeholders));
            replacements.apply(&document.html, &document.placeholders)
        };

        if let Some(key) = result_key {
            self.cache.set(&key, &html);
        }
        Ok(html)
    }

    /// Render on the tokio runtime and hand the result to `continuation`.
    ///
    /// The continuation runs exactly once, on the spawned task, after every
    /// deferred span has resolved. Must be called from within a tokio runtime.
    pub fn spawn_render<F>(
        self: Arc<Self>,
        input: String,
        overrides: RenderOverrides,
        continuation: F,
    ) -> JoinHandle<()>
    where
        F: FnOnce(Result<String, RenderError>) + Send + 'static,
    {
        tokio::spawn(async move {
            let result = self.render_with(&input, &overrides).await;
            continuation(result);
        })
    }

    /// Run the synchronous compile pass, collecting deferred jobs.
    fn compile(&self, input: &str, overrides: &RenderOverrides) -> Result<Compiled, CompileError> {
        let options = self.options.with_overrides(&overrides.compiler);
        let highlighter = overrides
            .highlight
            .clone()
            .unwrap_or_else(|| Arc::clone(&self.highlighter));
        let engine = overrides
            .math_renderer
            .clone()
            .unwrap_or_else(|| Arc::clone(&self.math));

        // Cached spans belong to the configured engines; a replaced engine
        // neither reads nor writes them.
        let highlight_cache = self.cache_options.highlight && overrides.highlight.is_none();
        let math_cache = self.cache_options.math && overrides.math_renderer.is_none();

        let mut highlight = HighlightAdapter::new(
            highlighter,
            highlight_cache.then(|| Arc::clone(&self.cache)),
        );
        let mut math = MathAdapter::new(
            engine,
            Arc::clone(&self.fallback),
            math_cache.then(|| Arc::clone(&self.cache)),
        );

        let document = MarkdownRenderer::<HtmlBackend>::new(options)
            .with_code_processor(&mut highlight)
            .with_math_processor(&mut math)
            .render_markdown(input)?;

        let mut jobs = highlight.into_jobs();
        jobs.extend(math.into_jobs());
        Ok(Compiled { document, jobs })
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for [`Renderer`].
#[derive(Default)]
pub struct RendererBuilder {
    cache: Option<Arc<dyn Cache>>,
    cache_options: CacheOptions,
    highlighter: Option<Arc<dyn Highlighter>>,
    math: Option<Arc<dyn MathEngine>>,
    fallback: Option<Arc<dyn FallbackMathEngine>>,
    options: CompilerOptions,
}

impl RendererBuilder {
    /// Cache shared by every render call. Defaults to a [`MemoryCache`].
    #[must_use]
    pub fn cache(mut self, cache: Arc<dyn Cache>) -> Self {
        self.cache = Some(cache);
        self
    }

    #[must_use]
    pub fn cache_options(mut self, cache_options: CacheOptions) -> Self {
        self.cache_options = cache_options;
        self
    }

    /// Defaults to [`SyntectHighlighter`].
    #[must_use]
    pub fn highlighter(mut self, highlighter: Arc<dyn Highlighter>) -> Self {
        self.highlighter = Some(highlighter);
        self
    }

    /// Primary math engine. Defaults to [`KatexEngine`].
    #[must_use]
    pub fn math_engine(mut self, engine: Arc<dyn MathEngine>) -> Self {
        self.math = Some(engine);
        self
    }

    /// Fallback math engine. Defaults to a [`CommandMathEngine`] running
    /// [`DEFAULT_FALLBACK_COMMAND`].
    #[must_use]
    pub fn fallback_engine(mut self, engine: Arc<dyn FallbackMathEngine>) -> Self {
        self.fallback = Some(engine);
        self
    }

    #[must_use]
    pub fn compiler_options(mut self, options: CompilerOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn build(self) -> Renderer {
        Renderer {
            cache: self.cache.unwrap_or_else(|| Arc::new(MemoryCache::new())),
            cache_options: self.cache_options,
            highlighter: self
                .highlighter
                .unwrap_or_else(|| Arc::new(SyntectHighlighter::new())),
            math: self.math.unwrap_or_else(|| Arc::new(KatexEngine)),
            fallback: self
                .fallback
                .unwrap_or_else(|| Arc::new(CommandMathEngine::new(DEFAULT_FALLBACK_COMMAND))),
            options: self.options,
        }
    }
}
