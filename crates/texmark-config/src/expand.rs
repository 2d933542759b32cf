//! `${VAR}` and `${VAR:-default}` expansion for configuration strings.

use crate::ConfigError;

/// Expand environment variable references in `value`.
///
/// Strings without `${` are returned unchanged, so a bare `$` in a command
/// argument survives as-is.
pub(crate) fn expand_env(value: &str, field: &str) -> Result<String, ConfigError> {
    if !value.contains("${") {
        return Ok(value.to_owned());
    }

    shellexpand::env_with_context(value, |var| -> Result<Option<String>, UnsetVar> {
        std::env::var(var)
            .map(Some)
            .map_err(|_| UnsetVar(var.to_owned()))
    })
    .map(std::borrow::Cow::into_owned)
    .map_err(|e| ConfigError::EnvVar {
        field: field.to_owned(),
        message: format!("${{{}}} not set", e.cause.0),
    })
}

struct UnsetVar(String);

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_expand_set_var() {
        // SAFETY: the variable name is unique to this test
        unsafe {
            std::env::set_var("TEXMARK_TEST_TEX_BIN", "/opt/mathjax/bin");
        }
        let result = expand_env("${TEXMARK_TEST_TEX_BIN}/tex2svg", "math.fallback_command").unwrap();
        assert_eq!(result, "/opt/mathjax/bin/tex2svg");
        unsafe {
            std::env::remove_var("TEXMARK_TEST_TEX_BIN");
        }
    }

    #[test]
    fn test_expand_default_when_unset() {
        // SAFETY: the variable name is unique to this test
        unsafe {
            std::env::remove_var("TEXMARK_TEST_UNSET");
        }
        let result = expand_env("${TEXMARK_TEST_UNSET:-tex2svg}", "math.fallback_command").unwrap();
        assert_eq!(result, "tex2svg");
    }

    #[test]
    fn test_expand_missing_var_names_field() {
        // SAFETY: the variable name is unique to this test
        unsafe {
            std::env::remove_var("TEXMARK_TEST_MISSING");
        }
        let err = expand_env("${TEXMARK_TEST_MISSING}", "cache.dir").unwrap_err();
        assert!(matches!(err, ConfigError::EnvVar { .. }));
        let message = err.to_string();
        assert!(message.contains("TEXMARK_TEST_MISSING"));
        assert!(message.contains("cache.dir"));
    }

    #[test]
    fn test_bare_dollar_is_literal() {
        assert_eq!(expand_env("--macro=$x", "math.fallback_args").unwrap(), "--macro=$x");
    }
}
