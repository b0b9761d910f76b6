//! easyeda2kicad adapter.
//!
//! Runs the `easyeda2kicad` CLI as a subprocess. With `--output <dir>/<ID>` it
//! writes `<ID>.kicad_sym`, `<ID>.pretty/*.kicad_mod` and `<ID>.3dshapes/*`
//! into `<dir>`.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

use super::{ConversionError, ConversionRequest, Converter, ConverterOutput};
use crate::library::ArtifactSelector;

/// Bound on `--version` probes
const VERSION_TIMEOUT: Duration = Duration::from_secs(5);

/// easyeda2kicad adapter using subprocess mode
pub struct Easyeda2KicadConverter {
    /// Path to the easyeda2kicad binary (default: "easyeda2kicad")
    binary_path: String,
}

impl Default for Easyeda2KicadConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl Easyeda2KicadConverter {
    /// Create an adapter that looks up `easyeda2kicad` on PATH
    pub fn new() -> Self {
        Self::with_binary_path("easyeda2kicad")
    }

    /// Create an adapter with a custom binary path
    pub fn with_binary_path(binary_path: impl Into<String>) -> Self {
        Self {
            binary_path: binary_path.into(),
        }
    }

    /// Command-line arguments for a request
    fn args(request: &ConversionRequest<'_>) -> Vec<String> {
        let output = request.output_dir.join(request.identifier.as_str());

        let mut args = vec![
            "--lcsc_id".to_string(),
            request.identifier.to_string(),
            "--output".to_string(),
            output.to_string_lossy().into_owned(),
            "--overwrite".to_string(),
        ];

        match request.selector {
            ArtifactSelector::Symbol => args.push("--symbol".to_string()),
            ArtifactSelector::Footprint => args.push("--footprint".to_string()),
            ArtifactSelector::Both => {
                args.push("--symbol".to_string());
                args.push("--footprint".to_string());
            }
        }

        args
    }

    fn spawn_error(&self, e: std::io::Error) -> ConversionError {
        if e.kind() == std::io::ErrorKind::NotFound {
            ConversionError::NotInstalled(self.binary_path.clone())
        } else {
            ConversionError::Io(e)
        }
    }
}

#[async_trait]
impl Converter for Easyeda2KicadConverter {
    fn name(&self) -> &str {
        "easyeda2kicad"
    }

    async fn convert(
        &self,
        request: ConversionRequest<'_>,
        step_timeout: Duration,
    ) -> Result<ConverterOutput, ConversionError> {
        let args = Self::args(&request);
        debug!(binary = %self.binary_path, args = ?args, "Executing converter");

        let child = Command::new(&self.binary_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        // Dropping the future on timeout kills the child
        let output = timeout(step_timeout, child.wait_with_output())
            .await
            .map_err(|_| ConversionError::TimedOut(step_timeout))??;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let diagnostics = [stderr.trim(), stdout.trim()]
                .into_iter()
                .find(|s| !s.is_empty())
                .unwrap_or("Unknown error")
                .to_string();

            return Err(ConversionError::Failed {
                exit_code: output.status.code().unwrap_or(-1),
                diagnostics,
            });
        }

        debug!(output = %stdout.trim(), "Converter finished");
        Ok(ConverterOutput::new(stdout))
    }

    async fn version(&self) -> Result<String, ConversionError> {
        let output = timeout(
            VERSION_TIMEOUT,
            Command::new(&self.binary_path)
                .arg("--version")
                .stdin(Stdio::null())
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| ConversionError::TimedOut(VERSION_TIMEOUT))?
        .map_err(|e| self.spawn_error(e))?;

        if !output.status.success() {
            return Err(ConversionError::Failed {
                exit_code: output.status.code().unwrap_or(-1),
                diagnostics: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        // Some releases print the version on stderr
        let text = if output.stdout.is_empty() {
            output.stderr
        } else {
            output.stdout
        };
        Ok(String::from_utf8_lossy(&text).trim().to_string())
    }
}
