//! Fallback math engine running an external typesetting command.

use std::io::ErrorKind;
use std::process::Stdio;
use std::time::Instant;

use async_trait::async_trait;
use tokio::process::Command;

use crate::math::{FallbackError, FallbackMathEngine, TexFormat};

/// [`FallbackMathEngine`] that shells out to a TeX-to-SVG command.
///
/// The command is invoked as:
///
/// ```text
/// <program> [args...] [--inline] -- <expression>
/// ```
///
/// `--inline` is passed for inline math. The SVG is read from stdout. A
/// non-zero exit status is a failure, with each non-empty stderr line reported
/// as one message. MathJax's `tex2svg` from `mathjax-node-cli` follows this
/// convention.
#[derive(Clone, Debug)]
pub struct CommandMathEngine {
    program: String,
    args: Vec<String>,
}

impl CommandMathEngine {
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Arguments passed before the format flag and expression.
    #[must_use]
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }
}

#[async_trait]
impl FallbackMathEngine for CommandMathEngine {
    async fn typeset_svg(&self, expression: &str, format: TexFormat) -> Result<String, FallbackError> {
        let started_at = Instant::now();
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        if format == TexFormat::InlineTex {
            command.arg("--inline");
        }
        command
            .arg("--")
            .arg(expression)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = command.output().await.map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                FallbackError::new(format!("math command not found: {}", self.program))
            } else {
                FallbackError::new(format!("failed to run {}: {e}", self.program))
            }
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let mut messages: Vec<String> = stderr
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_owned)
                .collect();
            if messages.is_empty() {
                messages.push(format!("{} exited with {}", self.program, output.status));
            }
            return Err(FallbackError { messages });
        }

        let svg = String::from_utf8_lossy(&output.stdout).trim().to_owned();
        if svg.is_empty() {
            return Err(FallbackError::new(format!(
                "{} produced no output",
                self.program
            )));
        }

        tracing::debug!(
            program = %self.program,
            format = format.as_str(),
            elapsed_ms = u64::try_from(started_at.elapsed().as_millis()).unwrap_or(u64::MAX),
            svg_bytes = svg.len(),
            "typeset math via command"
        );
        Ok(svg)
    }
}
