//! Request orchestration.
//!
//! One request flows through:
//! 1. the lazy model handle (initialized under `model_timeout`)
//! 2. a single model call (under `model_timeout`)
//! 3. the core reconciliation pipeline
//! 4. optional citation link probing
//!
//! Any failure yields the canonical `UNVERIFIABLE` result.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use veriscan_core::{AnalysisResult, ModelOutput, Pipeline, ReconcileError};

use crate::config::RuntimeConfig;
use crate::forensics::{FileDumpSink, ForensicRecord, ForensicSink, NoopSink};
use crate::probe::{LinkChecker, LinkProbe, LinkStatusCache};
use crate::providers::{AnalysisRequest, ClientFactory, GroundedModel, LazyModel, ProviderError};
use crate::RuntimeError;

/// Runs analysis requests against a grounded model.
///
/// Holds no per-request state; share one instance across tasks.
pub struct AnalysisOrchestrator {
    model: LazyModel,
    pipeline: Pipeline,
    config: RuntimeConfig,
    links: Option<LinkChecker>,
    forensics: Arc<dyn ForensicSink>,
}

impl AnalysisOrchestrator {
    pub fn builder() -> AnalysisOrchestratorBuilder {
        AnalysisOrchestratorBuilder::new()
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Analyze a request. Never fails.
    pub async fn analyze(&self, request: &AnalysisRequest) -> AnalysisResult {
        let output = match self.invoke(request).await {
            Ok(output) => output,
            Err(e) => {
                let err = ReconcileError::from(e);
                warn!(
                    request_id = %request.request_id,
                    stage = err.stage(),
                    error = %err,
                    "Analysis degraded to UNVERIFIABLE"
                );
                return AnalysisResult::unverifiable(&err);
            }
        };

        self.reconcile(request, &output).await
    }

    /// Reconcile an already-obtained model output for a request.
    pub async fn reconcile(&self, request: &AnalysisRequest, output: &ModelOutput) -> AnalysisResult {
        let mut result = match self.pipeline.try_reconcile(output) {
            Ok(result) => result,
            Err(err) => {
                warn!(
                    request_id = %request.request_id,
                    stage = err.stage(),
                    error = %err,
                    excerpt = %self.pipeline.excerpt(&output.text),
                    "Analysis degraded to UNVERIFIABLE"
                );
                self.forensics
                    .capture(ForensicRecord::new(&request.request_id, &err, &output.text))
                    .await;
                return AnalysisResult::unverifiable(&err);
            }
        };

        if let Some(links) = &self.links {
            links.refresh(&mut result.grounding_citations).await;
        }

        info!(
            request_id = %request.request_id,
            verdict = %result.verdict,
            citations = result.grounding_citations.len(),
            reliability = result.reliability_metrics.score,
            "Analysis complete"
        );
        result
    }

    /// Obtain the model and call it once, each step under `model_timeout`.
    async fn invoke(&self, request: &AnalysisRequest) -> Result<ModelOutput, ProviderError> {
        let timeout = self.config.model_timeout;

        let client = bounded(timeout, self.model.get()).await?;
        debug!(
            request_id = %request.request_id,
            model = client.name(),
            input = ?request.primary_kind(),
            parts = request.parts.len(),
            "Invoking model"
        );
        bounded(timeout, client.generate(request)).await
    }
}

async fn bounded<T>(
    timeout: Duration,
    fut: impl std::future::Future<Output = Result<T, ProviderError>>,
) -> Result<T, ProviderError> {
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(ProviderError::Timeout(timeout)),
    }
}

/// Builder for [`AnalysisOrchestrator`].
pub struct AnalysisOrchestratorBuilder {
    model: Option<LazyModel>,
    config: RuntimeConfig,
    probe: Option<Arc<dyn LinkProbe>>,
    forensics: Option<Arc<dyn ForensicSink>>,
}

impl AnalysisOrchestratorBuilder {
    pub fn new() -> Self {
        Self {
            model: None,
            config: RuntimeConfig::default(),
            probe: None,
            forensics: None,
        }
    }

    /// Use an already-built model.
    pub fn model(mut self, model: Arc<dyn GroundedModel>) -> Self {
        self.model = Some(LazyModel::ready(model));
        self
    }

    /// Build the model on first use.
    pub fn factory(mut self, factory: Arc<dyn ClientFactory>) -> Self {
        self.model = Some(LazyModel::new(factory));
        self
    }

    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn link_probe(mut self, probe: Arc<dyn LinkProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Overrides the sink derived from `forensics.dump_dir`.
    pub fn forensic_sink(mut self, sink: Arc<dyn ForensicSink>) -> Self {
        self.forensics = Some(sink);
        self
    }

    pub fn build(self) -> Result<AnalysisOrchestrator, RuntimeError> {
        let model = self
            .model
            .ok_or_else(|| RuntimeError::ModelNotConfigured("No model or factory set".to_string()))?;

        self.config.validate()?;
        let pipeline = Pipeline::new(self.config.reconcile.clone())?;

        let links = if self.config.probe_links {
            let probe = match self.probe {
                Some(probe) => probe,
                None => default_probe(self.config.fetch_timeout)?,
            };
            Some(LinkChecker::new(
                probe,
                LinkStatusCache::from_config(&self.config.link_cache),
                self.config.fetch_timeout,
            ))
        } else {
            None
        };

        let forensics: Arc<dyn ForensicSink> = match (self.forensics, &self.config.forensics.dump_dir) {
            (Some(sink), _) => sink,
            (None, Some(dir)) => Arc::new(FileDumpSink::new(dir)),
            (None, None) => Arc::new(NoopSink),
        };

        info!(
            factory = model.factory_name(),
            model_timeout = ?self.config.model_timeout,
            probe_links = links.is_some(),
            "Analysis orchestrator built"
        );

        Ok(AnalysisOrchestrator {
            model,
            pipeline,
            config: self.config,
            links,
            forensics,
        })
    }
}

impl Default for AnalysisOrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "http")]
fn default_probe(timeout: Duration) -> Result<Arc<dyn LinkProbe>, RuntimeError> {
    Ok(Arc::new(crate::probe::HttpLinkProbe::new(timeout)?))
}

#[cfg(not(feature = "http"))]
fn default_probe(_timeout: Duration) -> Result<Arc<dyn LinkProbe>, RuntimeError> {
    Err(RuntimeError::ProbeNotConfigured(
        "probe_links is set but no link probe was given and the `http` feature is off".to_string(),
    ))
}
