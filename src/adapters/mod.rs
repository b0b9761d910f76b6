//! Adapter interfaces for external converters.
//!
//! A converter turns a catalog part into KiCad artifact files inside a
//! directory it is given. The library manager treats those files opaquely and
//! only checks that the expected artifacts exist afterwards.

pub mod easyeda;

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::library::{ArtifactSelector, ArtifactType, ComponentId};

// Re-export the easyeda2kicad adapter
pub use easyeda::Easyeda2KicadConverter;

/// A single conversion request
#[derive(Debug, Clone, Copy)]
pub struct ConversionRequest<'a> {
    /// Part to convert
    pub identifier: &'a ComponentId,

    /// Artifacts to produce
    pub selector: ArtifactSelector,

    /// Empty directory the converter writes into
    pub output_dir: &'a Path,
}

/// Output from a converter run
#[derive(Debug, Clone, Default)]
pub struct ConverterOutput {
    /// Converter stdout, kept for debug logging
    pub log: String,
}

impl ConverterOutput {
    pub fn new(log: impl Into<String>) -> Self {
        Self { log: log.into() }
    }
}

/// Ways a conversion can fail
#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("{0} is not installed or not accessible")]
    NotInstalled(String),

    #[error("conversion timed out after {0:?}")]
    TimedOut(Duration),

    #[error("converter exited with code {exit_code}: {diagnostics}")]
    Failed { exit_code: i32, diagnostics: String },

    #[error("converter reported success but produced no {0} file")]
    MissingOutput(ArtifactType),

    #[error("failed to run converter: {0}")]
    Io(#[from] std::io::Error),
}

/// Trait for external converters
#[async_trait]
pub trait Converter: Send + Sync {
    /// Human-readable converter name
    fn name(&self) -> &str;

    /// Produce the requested artifacts into `request.output_dir`.
    ///
    /// Must give up with [`ConversionError::TimedOut`] once `timeout` has
    /// elapsed.
    async fn convert(
        &self,
        request: ConversionRequest<'_>,
        timeout: Duration,
    ) -> Result<ConverterOutput, ConversionError>;

    /// Installed converter version
    async fn version(&self) -> Result<String, ConversionError>;
}
