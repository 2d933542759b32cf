//! Configuration management for texmark.
//!
//! Parses `texmark.toml` with serde and discovers it in the current directory
//! or its parents. CLI flags are layered on top through [`CliSettings`].
//!
//! ## Environment Variable Expansion
//!
//! These fields expand `${VAR}` (error if unset) and `${VAR:-default}`:
//! - `cache.dir`
//! - `math.fallback_command`
//! - `math.fallback_args`

mod expand;

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Configuration filename to search for.
pub const CONFIG_FILENAME: &str = "texmark.toml";

const DEFAULT_FALLBACK_COMMAND: &str = "tex2svg";
const DEFAULT_MAX_NESTING: usize = 128;

/// CLI settings that override configuration file values.
///
/// Only `Some` values override the loaded config.
#[derive(Debug, Clone, Default)]
pub struct CliSettings {
    /// Override cache enabled flag.
    pub cache_enabled: Option<bool>,
    /// Override whole-document caching.
    pub result_cache: Option<bool>,
    /// Override the line-number gutter for code blocks.
    pub line_numbers: Option<bool>,
    /// Override the fallback math command.
    pub fallback_command: Option<String>,
}

impl CliSettings {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cache_enabled.is_none()
            && self.result_cache.is_none()
            && self.line_numbers.is_none()
            && self.fallback_command.is_none()
    }
}

/// Application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub cache: CacheConfig,
    pub markdown: MarkdownConfig,
    pub math: MathConfig,

    /// Resolved cache directory. `None` keeps the cache in memory.
    #[serde(skip)]
    pub cache_dir: Option<PathBuf>,
    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

/// `[cache]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    /// Master switch. When off, nothing is cached.
    pub enabled: bool,
    pub highlight: bool,
    pub math: bool,
    /// Cache whole documents by their input.
    pub result: bool,
    /// Directory for the persistent cache, relative to the config file.
    dir: Option<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            highlight: true,
            math: true,
            result: false,
            dir: None,
        }
    }
}

/// `[markdown]` section.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MarkdownConfig {
    /// GitHub extensions: tables, strikethrough, task lists, alerts.
    pub gfm: bool,
    /// Parse `$...$` and `$$...$$` spans.
    pub math: bool,
    /// Emit a line-number gutter for code blocks.
    pub line_numbers: bool,
    /// Maximum block and inline nesting depth.
    pub max_nesting: usize,
}

impl Default for MarkdownConfig {
    fn default() -> Self {
        Self {
            gfm: true,
            math: true,
            line_numbers: false,
            max_nesting: DEFAULT_MAX_NESTING,
        }
    }
}

/// `[math]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MathConfig {
    /// Program typesetting math the primary engine rejects.
    pub fallback_command: String,
    /// Arguments passed to the fallback program before the expression.
    pub fallback_args: Vec<String>,
}

impl Default for MathConfig {
    fn default() -> Self {
        Self {
            fallback_command: DEFAULT_FALLBACK_COMMAND.to_owned(),
            fallback_args: Vec::new(),
        }
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Configuration error: {0}")]
    Validation(String),
    #[error("Environment variable error in {field}: {message}")]
    EnvVar {
        /// Config field path (e.g. `math.fallback_command`).
        field: String,
        message: String,
    },
}

impl Config {
    /// Load configuration with optional CLI settings.
    ///
    /// Loads `config_path` if given, otherwise the nearest `texmark.toml` in
    /// the current directory or its parents, otherwise the defaults. CLI
    /// settings are applied last and the result is validated.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicit `config_path` doesn't exist, or if
    /// reading, parsing, expansion, or validation fails.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(discovered) = Self::discover_config() {
            Self::load_from_file(&discovered)?
        } else {
            tracing::debug!("no {CONFIG_FILENAME} found, using defaults");
            Self::default()
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
        }
        config.validate()?;

        Ok(config)
    }

    /// Parse configuration from TOML text.
    ///
    /// Relative paths resolve against `base_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if parsing or environment expansion fails.
    pub fn from_toml(content: &str, base_dir: &Path) -> Result<Self, ConfigError> {
        let mut config: Self = toml::from_str(content)?;
        config.expand_env_vars()?;
        config.resolve_paths(base_dir);
        Ok(config)
    }

    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(enabled) = settings.cache_enabled {
            self.cache.enabled = enabled;
        }
        if let Some(result) = settings.result_cache {
            self.cache.result = result;
        }
        if let Some(line_numbers) = settings.line_numbers {
            self.markdown.line_numbers = line_numbers;
        }
        if let Some(command) = &settings.fallback_command {
            self.math.fallback_command.clone_from(command);
        }
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` naming the first invalid field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.math.fallback_command.trim().is_empty() {
            return Err(ConfigError::Validation(
                "math.fallback_command cannot be empty".to_owned(),
            ));
        }
        if self.markdown.max_nesting == 0 {
            return Err(ConfigError::Validation(
                "markdown.max_nesting must be greater than 0".to_owned(),
            ));
        }
        Ok(())
    }

    fn discover_config() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.is_file() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config_dir = path.parent().unwrap_or(Path::new("."));
        let mut config = Self::from_toml(&content, config_dir)?;
        config.config_path = Some(path.to_path_buf());
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    fn expand_env_vars(&mut self) -> Result<(), ConfigError> {
        if let Some(dir) = &self.cache.dir {
            self.cache.dir = Some(expand::expand_env(dir, "cache.dir")?);
        }
        self.math.fallback_command =
            expand::expand_env(&self.math.fallback_command, "math.fallback_command")?;
        self.math.fallback_args = self
            .math
            .fallback_args
            .iter()
            .map(|arg| expand::expand_env(arg, "math.fallback_args"))
            .collect::<Result<_, _>>()?;
        Ok(())
    }

    fn resolve_paths(&mut self, config_dir: &Path) {
        self.cache_dir = self.cache.dir.as_deref().map(|dir| config_dir.join(dir));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.cache.enabled);
        assert!(config.cache.highlight);
        assert!(config.cache.math);
        assert!(!config.cache.result);
        assert!(config.cache_dir.is_none());
        assert!(config.markdown.gfm);
        assert!(config.markdown.math);
        assert!(!config.markdown.line_numbers);
        assert_eq!(config.markdown.max_nesting, 128);
        assert_eq!(config.math.fallback_command, "tex2svg");
        assert!(config.math.fallback_args.is_empty());
        config.validate().unwrap();
    }

    #[test]
    fn test_parse_empty_config() {
        let config = Config::from_toml("", Path::new("/project")).unwrap();
        assert!(config.cache.enabled);
        assert_eq!(config.math.fallback_command, "tex2svg");
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
[cache]
highlight = false
result = true
dir = ".texmark/cache"

[markdown]
gfm = false
line_numbers = true
max_nesting = 16

[math]
fallback_command = "/usr/local/bin/tex2svg"
fallback_args = ["--ex", "8"]
"#;
        let config = Config::from_toml(toml, Path::new("/project")).unwrap();

        assert!(!config.cache.highlight);
        assert!(config.cache.math);
        assert!(config.cache.result);
        assert_eq!(
            config.cache_dir,
            Some(PathBuf::from("/project/.texmark/cache"))
        );
        assert!(!config.markdown.gfm);
        assert!(config.markdown.math);
        assert!(config.markdown.line_numbers);
        assert_eq!(config.markdown.max_nesting, 16);
        assert_eq!(config.math.fallback_command, "/usr/local/bin/tex2svg");
        assert_eq!(config.math.fallback_args, vec!["--ex", "8"]);
    }

    #[test]
    fn test_absolute_cache_dir_is_kept() {
        let toml = r#"
[cache]
dir = "/var/cache/texmark"
"#;
        let config = Config::from_toml(toml, Path::new("/project")).unwrap();
        assert_eq!(config.cache_dir, Some(PathBuf::from("/var/cache/texmark")));
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let toml = r#"
[markdown]
smart_quotes = true
"#;
        let err = Config::from_toml(toml, Path::new("/project")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_expand_fallback_command() {
        // SAFETY: the variable name is unique to this test
        unsafe {
            std::env::set_var("TEXMARK_TEST_MATHJAX", "/opt/mathjax");
        }
        let toml = r#"
[math]
fallback_command = "${TEXMARK_TEST_MATHJAX}/bin/tex2svg"
fallback_args = ["--font=${TEXMARK_TEST_FONT:-TeX}"]
"#;
        let config = Config::from_toml(toml, Path::new("/project")).unwrap();
        assert_eq!(config.math.fallback_command, "/opt/mathjax/bin/tex2svg");
        assert_eq!(config.math.fallback_args, vec!["--font=TeX"]);
        unsafe {
            std::env::remove_var("TEXMARK_TEST_MATHJAX");
        }
    }

    #[test]
    fn test_expand_missing_cache_dir_var() {
        // SAFETY: the variable name is unique to this test
        unsafe {
            std::env::remove_var("TEXMARK_TEST_NO_CACHE_ROOT");
        }
        let toml = r#"
[cache]
dir = "${TEXMARK_TEST_NO_CACHE_ROOT}/texmark"
"#;
        let err = Config::from_toml(toml, Path::new("/project")).unwrap_err();
        assert!(matches!(err, ConfigError::EnvVar { ref field, .. } if field == "cache.dir"));
    }

    #[test]
    fn test_validate_empty_fallback_command() {
        let mut config = Config::default();
        config.math.fallback_command = "  ".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("math.fallback_command"));
    }

    #[test]
    fn test_validate_zero_nesting() {
        let mut config = Config::default();
        config.markdown.max_nesting = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("markdown.max_nesting"));
    }

    #[test]
    fn test_apply_cli_settings() {
        let mut config = Config::default();
        config.apply_cli_settings(&CliSettings {
            cache_enabled: Some(false),
            line_numbers: Some(true),
            fallback_command: Some("mathjax-svg".to_owned()),
            ..Default::default()
        });

        assert!(!config.cache.enabled);
        assert!(!config.cache.result);
        assert!(config.markdown.line_numbers);
        assert_eq!(config.math.fallback_command, "mathjax-svg");
    }

    #[test]
    fn test_cli_settings_is_empty() {
        assert!(CliSettings::default().is_empty());
        let settings = CliSettings {
            result_cache: Some(true),
            ..Default::default()
        };
        assert!(!settings.is_empty());
    }

    #[test]
    fn test_load_explicit_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("custom.toml");
        fs::write(&path, "[cache]\ndir = \"cache\"\n").unwrap();

        let config = Config::load(Some(&path), None).unwrap();
        assert_eq!(config.config_path, Some(path));
        assert_eq!(config.cache_dir, Some(dir.path().join("cache")));
    }

    #[test]
    fn test_load_missing_explicit_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.toml");
        let err = Config::load(Some(&path), None).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(p) if p == path));
    }

    #[test]
    fn test_load_cli_settings_are_validated() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        fs::write(&path, "").unwrap();

        let settings = CliSettings {
            fallback_command: Some(String::new()),
            ..Default::default()
        };
        let err = Config::load(Some(&path), Some(&settings)).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }
}
