//! Upstream grounded-model abstractions.
//!
//! The analysis model is reached only through [`GroundedModel`]. Concrete
//! clients are built lazily by a [`ClientFactory`] behind a [`LazyModel`],
//! so a process that never analyzes anything never builds one.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use veriscan_core::{InputKind, ModelOutput, ReconcileError};

mod lazy;

pub use lazy::{ClientFactory, LazyModel};

/// Errors from the upstream model.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Response blocked: {0}")]
    Blocked(String),

    #[error("Model not configured: {0}")]
    NotConfigured(String),
}

impl From<ProviderError> for ReconcileError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Timeout(after) => ReconcileError::UpstreamTimeout(after),
            other => ReconcileError::UpstreamTransport(other.to_string()),
        }
    }
}

/// One piece of user input.
#[derive(Debug, Clone, PartialEq)]
pub enum InputPart {
    Text(String),
    Url(String),
    Image { mime_type: String, data: Vec<u8> },
    Document { mime_type: String, data: Vec<u8> },
}

impl InputPart {
    pub fn kind(&self) -> InputKind {
        match self {
            Self::Text(_) => InputKind::Text,
            Self::Url(_) => InputKind::Url,
            Self::Image { .. } => InputKind::Image,
            Self::Document { .. } => InputKind::Document,
        }
    }
}

/// A single analysis request.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisRequest {
    /// Correlates logs and forensic dumps
    pub request_id: String,

    pub parts: Vec<InputPart>,
}

impl AnalysisRequest {
    pub fn new(request_id: impl Into<String>, parts: Vec<InputPart>) -> Self {
        Self {
            request_id: request_id.into(),
            parts,
        }
    }

    /// A request carrying one text claim.
    pub fn text(request_id: impl Into<String>, claim: impl Into<String>) -> Self {
        Self::new(request_id, vec![InputPart::Text(claim.into())])
    }

    /// Kind of the primary input. Media wins over text, text over URL.
    pub fn primary_kind(&self) -> InputKind {
        let kinds: Vec<InputKind> = self.parts.iter().map(InputPart::kind).collect();
        [InputKind::Image, InputKind::Document, InputKind::Text, InputKind::Url]
            .into_iter()
            .find(|k| kinds.contains(k))
            .unwrap_or(InputKind::Text)
    }
}

/// A model that answers with generated text plus grounding metadata.
#[async_trait]
pub trait GroundedModel: Send + Sync {
    /// Run one grounded generation for the request.
    async fn generate(&self, request: &AnalysisRequest) -> Result<ModelOutput, ProviderError>;

    /// Model name for logs.
    fn name(&self) -> &str;
}

/// Replays a recorded model output for every request.
///
/// Used for offline reconciliation of captured responses.
#[derive(Debug, Clone)]
pub struct ReplayModel {
    output: ModelOutput,
}

impl ReplayModel {
    pub fn new(output: ModelOutput) -> Self {
        Self { output }
    }
}

#[async_trait]
impl GroundedModel for ReplayModel {
    async fn generate(&self, _request: &AnalysisRequest) -> Result<ModelOutput, ProviderError> {
        Ok(self.output.clone())
    }

    fn name(&self) -> &str {
        "replay"
    }
}
