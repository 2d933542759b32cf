//! Markdown to HTML rendering with deferred highlighting and math.
//!
//! The [`Renderer`] runs a [`MarkdownRenderer`] compile pass synchronously.
//! Code blocks go to a [`Highlighter`] and math spans to a [`MathEngine`].
//! Spans that cannot be rendered synchronously are emitted as placeholder
//! tokens:
//! - code from an asynchronous highlighter;
//! - math the primary engine rejects, which goes to the
//!   [`FallbackMathEngine`].
//!
//! Once every deferred job has resolved, the placeholders are spliced out by
//! byte offset.
//!
//! # Architecture
//!
//! - [`MarkdownRenderer`]: pulldown-cmark event compiler, generic over a
//!   [`RenderBackend`] ([`HtmlBackend`])
//! - [`CodeBlockProcessor`] / [`MathProcessor`]: span extension points
//! - [`PlaceholderRegistry`]: per-call job ids and their tokens
//! - [`Renderer`]: orchestration, caching, and per-call overrides
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use futures::FutureExt;
//! use texmark_renderer::{CacheOptions, KatexEngine, Renderer};
//!
//! let renderer = Renderer::builder()
//!     .math_engine(Arc::new(KatexEngine))
//!     .cache_options(CacheOptions { result: true, ..CacheOptions::default() })
//!     .build();
//!
//! // Nothing here needs the fallback engine, so the render never yields.
//! let html = renderer
//!     .render("## Mass\n\n$E = mc^2$")
//!     .now_or_never()
//!     .unwrap()
//!     .unwrap();
//! assert!(html.starts_with(r#"<h2 id="mass">Mass</h2><p><span class="katex">"#));
//! ```

mod backend;
mod code_block;
mod command;
mod highlight;
mod html;
mod math;
mod placeholder;
mod render;
mod renderer;
mod state;
mod util;

pub use backend::{AlertKind, RenderBackend};
pub use code_block::{CodeBlockProcessor, MathProcessor, ProcessResult};
pub use command::CommandMathEngine;
pub use highlight::{HighlightError, Highlighted, Highlighter, SyntectHighlighter};
pub use html::HtmlBackend;
pub use math::{
    FallbackError, FallbackMathEngine, KatexEngine, MathEngine, MathError, TexFormat, error_box,
};
pub use placeholder::{
    JobFuture, JobKind, PendingJob, PlaceholderId, PlaceholderRegistry, PlaceholderSpan,
    Replacements, resolve_all,
};
pub use render::{
    CacheOptions, DEFAULT_FALLBACK_COMMAND, RenderError, RenderOverrides, Renderer,
    RendererBuilder,
};
pub use renderer::{
    CompileError, CompiledDocument, CompilerOptions, CompilerOverrides, DEFAULT_MAX_NESTING,
    MarkdownRenderer,
};
pub use state::{escape_html, slugify};
pub use util::escape_code;
