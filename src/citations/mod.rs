//! Citation handling
//!
//! - **Source Ledger**: deduplicates web sources found across research turns
//!   and hands out stable `src-N` identifiers
//! - **Citation Rewriter**: replaces `<cite source="src-N" />` markers in the
//!   composed report with numbered links and appends the references section

pub mod ledger;
pub mod rewriter;

pub use ledger::{Source, SourceLedger, SupportedClaim, DEFAULT_CONFIDENCE};
pub use rewriter::{CitationRewriter, CitationStyle, RenderedReport, ReportDraft};
