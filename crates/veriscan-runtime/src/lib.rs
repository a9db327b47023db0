//! # veriscan-runtime
//!
//! Async request handling for VeriScan.
//!
//! `veriscan-core` turns one model output into an [`AnalysisResult`]
//! deterministically. This crate does the parts that wait on the outside
//! world: obtaining the grounded model, bounding its latency, probing
//! citation links, and capturing failed outputs for later inspection.
//!
//! ## Example
//!
//! ```rust,ignore
//! use veriscan_runtime::{AnalysisOrchestrator, AnalysisRequest, RuntimeConfig};
//!
//! let orchestrator = AnalysisOrchestrator::builder()
//!     .factory(Arc::new(MyClientFactory::from_env()))
//!     .config(RuntimeConfig::from_file("veriscan.yaml")?)
//!     .build()?;
//!
//! let result = orchestrator
//!     .analyze(&AnalysisRequest::text("req-1", "Lemon water detoxes the liver"))
//!     .await;
//! ```
//!
//! [`AnalysisResult`]: veriscan_core::AnalysisResult

use thiserror::Error;

pub mod config;
pub mod forensics;
pub mod orchestrator;
pub mod probe;
pub mod providers;

pub use config::{ForensicsConfig, LinkCacheConfig, RuntimeConfig};
pub use forensics::{FileDumpSink, ForensicRecord, ForensicSink, NoopSink};
pub use orchestrator::{AnalysisOrchestrator, AnalysisOrchestratorBuilder};
pub use probe::{classify_status, LinkChecker, LinkProbe, LinkStatusCache, ProbeError};
pub use providers::{
    AnalysisRequest, ClientFactory, GroundedModel, InputPart, LazyModel, ProviderError,
    ReplayModel,
};

#[cfg(feature = "http")]
pub use probe::HttpLinkProbe;

/// Errors from building the runtime.
///
/// Requests themselves never fail; see [`AnalysisOrchestrator::analyze`].
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Model not configured: {0}")]
    ModelNotConfigured(String),

    #[error("Link probe not configured: {0}")]
    ProbeNotConfigured(String),

    #[error("Invalid configuration: {0}")]
    Config(#[from] veriscan_core::ConfigError),

    #[error("Link probe error: {0}")]
    Probe(#[from] ProbeError),
}
