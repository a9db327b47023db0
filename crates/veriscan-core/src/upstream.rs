//! Wire types for the grounded model response.
//!
//! The search tool reports grounding in camelCase with every field
//! optional. Nothing here is trusted: indices may be negative or out of
//! range and offsets may point anywhere. The pipeline filters all of it.

use serde::{Deserialize, Serialize};

use crate::anchor::Span;
use crate::evidence::EvidenceChunk;

/// Raw model output: the response text plus whatever grounding came with it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelOutput {
    pub text: String,

    #[serde(default, alias = "groundingMetadata", alias = "grounding_metadata")]
    pub grounding: GroundingMetadata,
}

impl ModelOutput {
    /// Output with no grounding attached.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            grounding: GroundingMetadata::default(),
        }
    }

    pub fn with_grounding(mut self, grounding: GroundingMetadata) -> Self {
        self.grounding = grounding;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroundingMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grounding_chunks: Option<Vec<GroundingChunk>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grounding_supports: Option<Vec<UpstreamSupport>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_search_queries: Option<Vec<String>>,
}

impl GroundingMetadata {
    pub fn chunks(&self) -> &[GroundingChunk] {
        self.grounding_chunks.as_deref().unwrap_or_default()
    }

    pub fn supports(&self) -> &[UpstreamSupport] {
        self.grounding_supports.as_deref().unwrap_or_default()
    }

    /// Evidence chunks in upstream order; position is the chunk index.
    pub fn evidence_chunks(&self) -> Vec<EvidenceChunk> {
        self.chunks()
            .iter()
            .enumerate()
            .map(|(index, chunk)| chunk.to_evidence(index))
            .collect()
    }
}

/// One retrieved source. Web results and file-search results use different keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroundingChunk {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web: Option<WebChunk>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retrieved_context: Option<RetrievedContext>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WebChunk {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievedContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl GroundingChunk {
    /// Normalize into an evidence chunk. Web data wins over retrieved context.
    pub fn to_evidence(&self, index: usize) -> EvidenceChunk {
        let web = self.web.as_ref();
        let ctx = self.retrieved_context.as_ref();

        let url = web
            .and_then(|w| w.uri.clone())
            .or_else(|| ctx.and_then(|c| c.uri.clone()))
            .unwrap_or_default();
        let title = web
            .and_then(|w| w.title.clone())
            .or_else(|| ctx.and_then(|c| c.title.clone()))
            .unwrap_or_default();

        let mut chunk = EvidenceChunk::new(index, title, url);
        if let Some(ctx) = ctx {
            chunk.retrieved_text = ctx.text.clone().filter(|t| !t.trim().is_empty());
            if web.is_none() {
                chunk.source_file = ctx.title.clone().or_else(|| ctx.uri.clone());
            }
        }
        chunk
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpstreamSegment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_index: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_index: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpstreamSupport {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segment: Option<UpstreamSegment>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grounding_chunk_indices: Option<Vec<i64>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_scores: Option<Vec<f64>>,
}

impl UpstreamSupport {
    pub fn segment_text(&self) -> &str {
        self.segment
            .as_ref()
            .and_then(|s| s.text.as_deref())
            .unwrap_or_default()
    }

    /// Offsets the tool claims for this segment, when they form a valid span.
    pub fn claimed_span(&self) -> Option<Span> {
        let segment = self.segment.as_ref()?;
        let start = usize::try_from(segment.start_index.unwrap_or(0)).ok()?;
        let end = usize::try_from(segment.end_index?).ok()?;
        (start < end).then_some(Span { start, end })
    }

    pub fn chunk_indices(&self) -> &[i64] {
        self.grounding_chunk_indices.as_deref().unwrap_or_default()
    }

    pub fn confidence_scores(&self) -> &[f64] {
        self.confidence_scores.as_deref().unwrap_or_default()
    }
}
