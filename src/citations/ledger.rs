//! Source Ledger
//!
//! Run-scoped registry of web sources discovered while researching. Every
//! distinct URL gets a short identifier (`src-1`, `src-2`, ...) on first
//! sighting; later sightings reuse it and only add claims.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::GroundingRecord;

/// Confidence recorded for a claim when the grounding carried no score.
pub const DEFAULT_CONFIDENCE: f64 = 0.5;

const IDENTIFIER_PREFIX: &str = "src-";

/// A segment of research text that a source was judged to support
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupportedClaim {
    pub text_segment: String,
    pub confidence: f64,
}

/// A distinct piece of evidence discovered during research
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    /// Short token, e.g. `src-7`
    pub identifier: String,
    /// Numeric suffix of `identifier`; doubles as discovery order
    pub ordinal: u32,
    pub title: String,
    pub url: String,
    pub domain: String,
    pub supported_claims: Vec<SupportedClaim>,
}

#[derive(Debug, Default)]
pub struct SourceLedger {
    sources: Vec<Source>,
    by_url: HashMap<String, usize>,
    by_identifier: HashMap<String, usize>,
}

impl SourceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record candidate sources, assigning identifiers to unseen URLs and
    /// appending claims to known ones. Candidates without a URL are skipped.
    pub fn ingest(&mut self, candidates: &[GroundingRecord]) {
        for candidate in candidates {
            let url = candidate.url.trim();
            if url.is_empty() {
                debug!("Skipping grounding record without a URL");
                continue;
            }

            let index = match self.by_url.get(url) {
                Some(&index) => index,
                None => self.register(url, candidate),
            };

            if let Some(text) = &candidate.text_segment {
                let confidence = candidate
                    .confidence
                    .filter(|c| c.is_finite())
                    .map(|c| c.clamp(0.0, 1.0))
                    .unwrap_or(DEFAULT_CONFIDENCE);
                self.sources[index].supported_claims.push(SupportedClaim {
                    text_segment: text.clone(),
                    confidence,
                });
            }
        }
    }

    fn register(&mut self, url: &str, candidate: &GroundingRecord) -> usize {
        let ordinal = self.sources.len() as u32 + 1;
        let identifier = format!("{IDENTIFIER_PREFIX}{ordinal}");

        let domain = match candidate.domain.trim() {
            "" => host_of(url).unwrap_or_default(),
            d => d.to_string(),
        };
        // Prefer a distinct title; otherwise show the domain
        let title = match candidate.title.trim() {
            "" => domain.clone(),
            t if t == domain => domain.clone(),
            t => t.to_string(),
        };

        debug!(identifier = %identifier, url = %url, "Registered new source");

        let index = self.sources.len();
        self.sources.push(Source {
            identifier: identifier.clone(),
            ordinal,
            title,
            url: url.to_string(),
            domain,
            supported_claims: Vec::new(),
        });
        self.by_url.insert(url.to_string(), index);
        self.by_identifier.insert(identifier, index);
        index
    }

    /// All known sources in discovery order
    pub fn all_sources(&self) -> &[Source] {
        &self.sources
    }

    pub fn get(&self, identifier: &str) -> Option<&Source> {
        self.by_identifier.get(identifier).map(|&i| &self.sources[i])
    }

    pub fn identifier_for(&self, url: &str) -> Option<&str> {
        self.by_url
            .get(url.trim())
            .map(|&i| self.sources[i].identifier.as_str())
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Listing handed to the composer so it can cite by identifier
    pub fn describe(&self) -> String {
        if self.sources.is_empty() {
            return "No sources were collected.".to_string();
        }
        self.sources
            .iter()
            .map(|s| format!("- {}: {} ({})", s.identifier, s.title, s.url))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn host_of(url: &str) -> Option<String> {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.trim_start_matches("www.").to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(url: &str, title: &str, domain: &str) -> GroundingRecord {
        GroundingRecord::new(url, title, domain)
    }

    #[test]
    fn test_same_url_keeps_identifier() {
        let mut ledger = SourceLedger::new();
        ledger.ingest(&[record("https://a.example", "A", "a.example")]);
        ledger.ingest(&[
            record("https://b.example", "B", "b.example"),
            record("https://a.example", "A again", "a.example"),
        ]);

        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.identifier_for("https://a.example"), Some("src-1"));
        assert_eq!(ledger.identifier_for("https://b.example"), Some("src-2"));
        // First sighting wins for metadata
        assert_eq!(ledger.get("src-1").unwrap().title, "A");
    }

    #[test]
    fn test_claims_accumulate_in_arrival_order() {
        let mut ledger = SourceLedger::new();
        ledger.ingest(&[
            record("https://a.example", "A", "a.example").with_claim("first", Some(0.9)),
            record("https://a.example", "A", "a.example").with_claim("first", Some(0.9)),
        ]);
        ledger.ingest(&[record("https://a.example", "A", "a.example").with_claim("second", None)]);

        let claims = &ledger.get("src-1").unwrap().supported_claims;
        assert_eq!(claims.len(), 3);
        assert_eq!(claims[0].text_segment, "first");
        assert_eq!(claims[1].text_segment, "first");
        assert_eq!(claims[2].text_segment, "second");
        assert_eq!(claims[2].confidence, DEFAULT_CONFIDENCE);
    }

    #[test]
    fn test_record_without_segment_adds_no_claim() {
        let mut ledger = SourceLedger::new();
        ledger.ingest(&[record("https://a.example", "A", "a.example")]);
        assert!(ledger.get("src-1").unwrap().supported_claims.is_empty());
    }

    #[test]
    fn test_missing_url_is_skipped() {
        let mut ledger = SourceLedger::new();
        ledger.ingest(&[
            record("", "Nothing", "nowhere"),
            record("   ", "Blank", "blank"),
            record("https://c.example", "C", "c.example"),
        ]);
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.identifier_for("https://c.example"), Some("src-1"));
    }

    #[test]
    fn test_title_falls_back_to_domain() {
        let mut ledger = SourceLedger::new();
        ledger.ingest(&[
            record("https://a.example/1", "a.example", "a.example"),
            record("https://b.example/1", "", "b.example"),
            record("https://www.c.example/page", "C Page", ""),
        ]);

        assert_eq!(ledger.get("src-1").unwrap().title, "a.example");
        assert_eq!(ledger.get("src-2").unwrap().title, "b.example");
        let third = ledger.get("src-3").unwrap();
        assert_eq!(third.domain, "c.example");
        assert_eq!(third.title, "C Page");
    }

    #[test]
    fn test_identifiers_are_monotonic() {
        let mut ledger = SourceLedger::new();
        for i in 0..12 {
            ledger.ingest(&[record(&format!("https://s{i}.example"), "S", "s.example")]);
        }
        let ordinals: Vec<u32> = ledger.all_sources().iter().map(|s| s.ordinal).collect();
        assert_eq!(ordinals, (1..=12).collect::<Vec<_>>());
        assert_eq!(ledger.all_sources()[11].identifier, "src-12");
    }

    #[test]
    fn test_confidence_is_clamped() {
        let mut ledger = SourceLedger::new();
        ledger.ingest(&[
            record("https://a.example", "A", "a.example").with_claim("x", Some(1.7)),
            record("https://a.example", "A", "a.example").with_claim("y", Some(f64::NAN)),
        ]);
        let claims = &ledger.get("src-1").unwrap().supported_claims;
        assert_eq!(claims[0].confidence, 1.0);
        assert_eq!(claims[1].confidence, DEFAULT_CONFIDENCE);
    }
}
