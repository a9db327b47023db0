//! Evidence chunks, citations and scanned sources.
//!
//! Upstream chunks arrive in arbitrary order, sometimes duplicated and
//! sometimes pointing at a search redirect instead of the real site. This
//! module normalizes them and decides which ones end up cited.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use url::Url;

use crate::sanitize::sanitize;
use crate::types::Segment;

/// Hosts that front search results instead of serving them.
const REDIRECT_HOSTS: &[&str] = &["vertexaisearch.cloud.google.com"];

/// Placeholder domain for sources with no usable host.
pub const UNKNOWN_DOMAIN: &str = "unknown";

/// A retrieved source as seen by the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceChunk {
    /// Position in the upstream chunk list
    pub index: usize,

    pub title: String,

    pub url: String,

    /// Text excerpt supplied by file search, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retrieved_text: Option<String>,

    /// Originating document for file-search results
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_file: Option<String>,
}

impl EvidenceChunk {
    pub fn new(index: usize, title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            index,
            title: title.into(),
            url: url.into(),
            retrieved_text: None,
            source_file: None,
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.retrieved_text = Some(text.into());
        self
    }

    /// One-based id used in citations.
    pub fn id(&self) -> usize {
        self.index + 1
    }

    pub fn domain(&self) -> String {
        source_domain(&self.url, &self.title)
    }

    /// Title for display; falls back to the domain when the tool gave none.
    pub fn display_title(&self) -> String {
        if self.title.trim().is_empty() {
            self.domain()
        } else {
            self.title.trim().to_string()
        }
    }
}

/// Reachability of a cited link.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkStatus {
    #[default]
    Live,
    /// Reachable but refusing automated access (401, 403, 429, 451)
    Restricted,
    Dead,
}

/// A source cited by at least one segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub id: usize,
    pub title: String,
    pub url: String,
    pub snippet: String,
    #[serde(default)]
    pub source_file: Option<String>,
    #[serde(default)]
    pub status: LinkStatus,
}

/// A source the search returned, cited or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScannedSource {
    pub id: usize,
    pub title: String,
    pub url: String,
    pub is_cited: bool,
}

/// Comparison key for URLs: no scheme, no `www.`, no trailing slash, lowercase.
pub fn normalize_url(url: &str) -> String {
    let lowered = url.trim().to_lowercase();
    let without_scheme = lowered
        .strip_prefix("https://")
        .or_else(|| lowered.strip_prefix("http://"))
        .unwrap_or(&lowered);
    let without_www = without_scheme
        .strip_prefix("www.")
        .unwrap_or(without_scheme);
    without_www.trim_end_matches('/').to_string()
}

/// Lowercased host with any leading `www.` removed; empty if unparseable.
pub fn normalize_domain(raw: &str) -> String {
    let trimmed = raw.trim().to_lowercase();
    if trimmed.is_empty() {
        return String::new();
    }
    let candidate = if trimmed.contains("://") {
        trimmed
    } else {
        format!("http://{}", trimmed)
    };

    match Url::parse(&candidate) {
        Ok(parsed) => parsed
            .host_str()
            .map(|host| host.strip_prefix("www.").unwrap_or(host).to_string())
            .unwrap_or_default(),
        Err(_) => String::new(),
    }
}

/// Domain a source should be credited to.
///
/// Search redirects carry the real site in the chunk title, so the title
/// wins when the URL host is a redirect or missing and the title looks like
/// a hostname.
pub fn source_domain(url: &str, title: &str) -> String {
    let host = normalize_domain(url);
    if !host.is_empty() && !REDIRECT_HOSTS.contains(&host.as_str()) {
        return host;
    }

    if looks_like_domain(title) {
        let from_title = normalize_domain(title);
        if !from_title.is_empty() {
            return from_title;
        }
    }

    if host.is_empty() {
        UNKNOWN_DOMAIN.to_string()
    } else {
        host
    }
}

fn looks_like_domain(text: &str) -> bool {
    let text = text.trim();
    !text.is_empty()
        && text.contains('.')
        && !text.chars().any(char::is_whitespace)
        && !text.ends_with('.')
}

/// Build citations from the chunks referenced by segments.
///
/// Citations appear in chunk order. Two chunks with the same normalized URL
/// yield one citation. The snippet is the chunk's retrieved text, or the
/// first segment that cites the chunk when there is none.
pub fn build_citations(chunks: &[EvidenceChunk], segments: &[Segment]) -> Vec<Citation> {
    let cited: BTreeSet<usize> = segments
        .iter()
        .flat_map(|s| s.chunk_indices.iter().copied())
        .filter(|&i| i < chunks.len())
        .collect();

    let mut seen_urls = HashSet::new();
    let mut citations = Vec::with_capacity(cited.len());

    for index in cited {
        let chunk = &chunks[index];
        let key = normalize_url(&chunk.url);
        if !key.is_empty() && !seen_urls.insert(key) {
            continue;
        }

        let snippet = chunk
            .retrieved_text
            .as_deref()
            .map(sanitize)
            .filter(|s| !s.is_empty())
            .or_else(|| {
                segments
                    .iter()
                    .find(|s| s.chunk_indices.contains(&index))
                    .map(|s| sanitize(&s.text))
            })
            .unwrap_or_default();

        citations.push(Citation {
            id: chunk.id(),
            title: chunk.display_title(),
            url: chunk.url.clone(),
            snippet,
            source_file: chunk.source_file.clone(),
            status: LinkStatus::Live,
        });
    }

    citations
}

/// Every chunk as a scanned source, flagged by whether its URL was cited.
pub fn scanned_sources(chunks: &[EvidenceChunk], citations: &[Citation]) -> Vec<ScannedSource> {
    let cited_urls: HashSet<String> = citations
        .iter()
        .map(|c| normalize_url(&c.url))
        .filter(|u| !u.is_empty())
        .collect();
    let cited_ids: HashSet<usize> = citations.iter().map(|c| c.id).collect();

    chunks
        .iter()
        .map(|chunk| {
            let key = normalize_url(&chunk.url);
            let is_cited = if key.is_empty() {
                cited_ids.contains(&chunk.id())
            } else {
                cited_urls.contains(&key)
            };
            ScannedSource {
                id: chunk.id(),
                title: chunk.display_title(),
                url: chunk.url.clone(),
                is_cited,
            }
        })
        .collect()
}
