//! `texmark render` command implementation.

use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use texmark_cache::{Cache, FileCache, MemoryCache, NullCache};
use texmark_config::{CliSettings, Config};
use texmark_renderer::{CacheOptions, CommandMathEngine, CompilerOptions, Renderer};

use crate::error::CliError;
use crate::output::Output;

/// Arguments for the render command.
#[derive(Args)]
pub(crate) struct RenderArgs {
    /// Markdown file to render (default: stdin).
    input: Option<PathBuf>,

    /// Write HTML to this file (default: stdout).
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Path to configuration file (default: auto-discover texmark.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Cache whole documents by their input.
    #[arg(long)]
    result_cache: bool,

    /// Disable caching.
    #[arg(long, conflicts_with = "result_cache")]
    no_cache: bool,

    /// Add a line-number gutter to code blocks.
    #[arg(long)]
    line_numbers: bool,

    /// Command typesetting math the primary engine rejects (overrides config).
    #[arg(long, env = "TEXMARK_FALLBACK_COMMAND")]
    fallback_command: Option<String>,

    /// Enable verbose output.
    #[arg(short, long)]
    pub(crate) verbose: bool,
}

impl RenderArgs {
    pub(crate) async fn execute(self, version: &str) -> Result<(), CliError> {
        let output = Output::new();

        let cli_settings = CliSettings {
            cache_enabled: self.no_cache.then_some(false),
            result_cache: self.result_cache.then_some(true),
            line_numbers: self.line_numbers.then_some(true),
            fallback_command: self.fallback_command.clone(),
        };
        let config = Config::load(self.config.as_deref(), Some(&cli_settings))?;
        if let Some(path) = &config.config_path {
            tracing::info!(path = %path.display(), "using configuration");
        }

        let input = match &self.input {
            Some(path) => std::fs::read_to_string(path)?,
            None => {
                let mut buf = String::new();
                std::io::stdin().read_to_string(&mut buf)?;
                buf
            }
        };

        let renderer = build_renderer(&config, version);
        let html = renderer.render(&input).await?;

        match &self.output {
            Some(path) => {
                std::fs::write(path, &html)?;
                output.success(&format!("Rendered to {}", path.display()));
            }
            None => {
                let mut stdout = std::io::stdout().lock();
                stdout.write_all(html.as_bytes())?;
                stdout.flush()?;
            }
        }

        if self.verbose {
            output.info(&format!("{} bytes of HTML", html.len()));
        }
        Ok(())
    }
}

/// Build a renderer from loaded configuration.
///
/// `version` tags the persistent cache so upgrades start from a clean slate.
pub(crate) fn build_renderer(config: &Config, version: &str) -> Renderer {
    let cache: Arc<dyn Cache> = if !config.cache.enabled {
        Arc::new(NullCache)
    } else if let Some(dir) = &config.cache_dir {
        let cache = FileCache::new(dir.clone(), version);
        tracing::info!(dir = %cache.root().display(), "using file cache");
        Arc::new(cache)
    } else {
        Arc::new(MemoryCache::new())
    };

    let fallback = CommandMathEngine::new(config.math.fallback_command.clone())
        .with_args(config.math.fallback_args.clone());

    Renderer::builder()
        .cache(cache)
        .cache_options(CacheOptions {
            highlight: config.cache.highlight,
            math: config.cache.math,
            result: config.cache.result,
        })
        .compiler_options(CompilerOptions {
            gfm: config.markdown.gfm,
            math: config.markdown.math,
            line_numbers: config.markdown.line_numbers,
            max_nesting: config.markdown.max_nesting,
        })
        .fallback_engine(Arc::new(fallback))
        .build()
}
