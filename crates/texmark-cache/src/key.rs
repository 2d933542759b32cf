//! Cache key construction.
//!
//! Provides [`CacheKey`], which namespaces keys by the kind of rendered span.
//! Without the kind tag, a code block and a math expression with the same raw
//! text would collide.

use std::fmt;

use sha2::{Digest, Sha256};

/// Parameters identifying one cached render.
///
/// # Key Format
///
/// | Kind | Format |
/// |---|---|
/// | highlight | `H_{language}\n{code}` |
/// | math | `M_{0\|1}{expression}` (1 for display mode) |
/// | whole result | `RES_{input}` |
///
/// Language tokens come from a single fence info line and cannot contain a
/// newline, so the separator is unambiguous. The display flag is a single
/// digit, so math keys need no separator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheKey<'a> {
    /// A highlighted code block. `language` is empty for auto-detection.
    Highlight {
        /// Fence language token.
        language: &'a str,
        /// Raw code.
        code: &'a str,
    },
    /// A rendered math expression.
    Math {
        /// Raw TeX expression.
        expression: &'a str,
        /// Whether the expression is display (block) math.
        display: bool,
    },
    /// A whole rendered document.
    Result {
        /// Raw markdown input.
        input: &'a str,
    },
}

impl fmt::Display for CacheKey<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Highlight { language, code } => write!(f, "H_{language}\n{code}"),
            Self::Math {
                expression,
                display,
            } => write!(f, "M_{}{expression}", u8::from(*display)),
            Self::Result { input } => write!(f, "RES_{input}"),
        }
    }
}

/// Hex-encoded SHA-256 of a raw key string.
pub(crate) fn hash_key(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hex::encode(hasher.finalize())
}
