//! Citation Rewriter
//!
//! Turns `<cite source="src-N" />` markers in a composed draft into numbered,
//! linked citations and appends a references section. Unknown identifiers are
//! dropped with a warning; rendering never fails.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::ledger::{Source, SourceLedger};

/// Quote style, inner whitespace and the `/>` vs `>` terminator are all tolerated.
static CITE_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<cite\s+source\s*=\s*["']?\s*src-(\d+)\s*["']?\s*/?>"#)
        .expect("citation marker pattern is valid")
});

static SPACE_BEFORE_PUNCTUATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+([.,;:])").expect("punctuation pattern is valid"));

const REFERENCES_HEADING: &str = "## References";

/// How numbered citations and reference entries are written out
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CitationStyle {
    /// `[[1]](#ref1)` with Markdown reference links
    #[default]
    Markdown,
    /// `[<a href="#ref1">1</a>]` with `<p id="ref1">` entries
    Html,
    /// Wikipedia-style `<sup>` links
    Superscript,
}

impl CitationStyle {
    fn inline(self, index: usize) -> String {
        match self {
            CitationStyle::Markdown => format!("[[{index}]](#ref{index})"),
            CitationStyle::Html => format!("[<a href=\"#ref{index}\">{index}</a>]"),
            CitationStyle::Superscript => format!("<sup><a href=\"#ref{index}\">[{index}]</a></sup>"),
        }
    }

    fn reference(self, index: usize, source: &Source) -> String {
        let domain = if source.domain.is_empty() {
            String::new()
        } else {
            format!(" ({})", source.domain)
        };
        match self {
            // Titles and URLs come from the web; keep them inert inside the link
            CitationStyle::Markdown | CitationStyle::Superscript => format!(
                "<a id=\"ref{index}\"></a>[{index}] [{}]({}){}",
                escape_markdown(&source.title),
                escape_link_target(&source.url),
                escape_markdown(&domain)
            ),
            CitationStyle::Html => format!(
                "<p id=\"ref{index}\">[{index}] <a href=\"{}\">{}</a>{}</p>",
                escape_html(&source.url),
                escape_html(&source.title),
                escape_html(&domain)
            ),
        }
    }

    fn separator(self) -> &'static str {
        match self {
            CitationStyle::Html => "\n",
            CitationStyle::Markdown | CitationStyle::Superscript => "\n\n",
        }
    }
}

impl fmt::Display for CitationStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CitationStyle::Markdown => write!(f, "markdown"),
            CitationStyle::Html => write!(f, "html"),
            CitationStyle::Superscript => write!(f, "superscript"),
        }
    }
}

impl FromStr for CitationStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "markdown" | "md" => Ok(CitationStyle::Markdown),
            "html" => Ok(CitationStyle::Html),
            "superscript" | "sup" | "wikipedia" => Ok(CitationStyle::Superscript),
            other => Err(format!("unknown citation style: {other}")),
        }
    }
}

/// Output of a render pass
#[derive(Debug, Clone, Serialize)]
pub struct RenderedReport {
    pub text: String,
    /// Identifiers that made it into the reference list, in display order
    pub cited: Vec<String>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CitationRewriter {
    style: CitationStyle,
}

impl CitationRewriter {
    pub fn new(style: CitationStyle) -> Self {
        Self { style }
    }

    pub fn render(&self, draft: &str, ledger: &SourceLedger) -> String {
        self.render_detailed(draft, ledger).text
    }

    /// Rewrite every marker and append the references section.
    ///
    /// Display indices are dense over the sources actually cited and follow
    /// discovery order, not the order markers appear in the text. Not
    /// idempotent: a second pass would append a second reference list.
    pub fn render_detailed(&self, draft: &str, ledger: &SourceLedger) -> RenderedReport {
        // ordinal -> source, sorted by discovery
        let mut cited: BTreeMap<u32, &Source> = BTreeMap::new();
        for caps in CITE_MARKER.captures_iter(draft) {
            if let Some(source) = resolve(&caps, ledger) {
                cited.insert(source.ordinal, source);
            }
        }
        let display_index: BTreeMap<u32, usize> = cited
            .keys()
            .enumerate()
            .map(|(i, &ordinal)| (ordinal, i + 1))
            .collect();

        let mut warnings = Vec::new();
        let mut out = String::with_capacity(draft.len());
        let mut last = 0;

        for caps in CITE_MARKER.captures_iter(draft) {
            let Some(marker) = caps.get(0) else { continue };
            out.push_str(&draft[last..marker.start()]);
            last = marker.end();

            let index = resolve(&caps, ledger).and_then(|s| display_index.get(&s.ordinal));
            match index {
                Some(&index) => out.push_str(&self.style.inline(index)),
                None => {
                    warn!(marker = marker.as_str(), "Invalid citation tag found and removed");
                    warnings.push(format!("Removed unresolvable citation {}", marker.as_str()));
                    // Don't leave two spaces where the marker sat between words,
                    // nor a leading space where it opened a line
                    let next = draft[last..].chars().next();
                    if next.map_or(true, char::is_whitespace) {
                        let kept = out.trim_end_matches([' ', '\t']).len();
                        out.truncate(kept);
                        if (out.is_empty() || out.ends_with('\n')) && matches!(next, Some(' ' | '\t')) {
                            last += 1;
                        }
                    }
                }
            }
        }
        out.push_str(&draft[last..]);

        let mut text = SPACE_BEFORE_PUNCTUATION.replace_all(&out, "$1").into_owned();

        if !cited.is_empty() {
            let entries: Vec<String> = cited
                .values()
                .enumerate()
                .map(|(i, source)| self.style.reference(i + 1, source))
                .collect();
            text.push_str("\n\n");
            text.push_str(REFERENCES_HEADING);
            text.push_str("\n\n");
            text.push_str(&entries.join(self.style.separator()));
            text.push('\n');
        }

        debug!(
            cited = cited.len(),
            removed = warnings.len(),
            style = %self.style,
            "Citations rendered"
        );

        RenderedReport {
            text,
            cited: cited.values().map(|s| s.identifier.clone()).collect(),
            warnings,
        }
    }
}

fn resolve<'a>(caps: &regex::Captures<'_>, ledger: &'a SourceLedger) -> Option<&'a Source> {
    let ordinal: u32 = caps.get(1)?.as_str().parse().ok()?;
    ledger.get(&format!("src-{ordinal}"))
}

fn escape_markdown(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('[', "\\[")
        .replace(']', "\\]")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_link_target(url: &str) -> String {
    url.replace(' ', "%20")
        .replace('(', "%28")
        .replace(')', "%29")
        .replace('<', "%3C")
        .replace('>', "%3E")
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// A composed report that still contains citation markers.
///
/// `finalize` consumes the draft, so a draft can be rendered only once.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportDraft(String);

impl ReportDraft {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn push_str(&mut self, text: &str) {
        self.0.push_str(text);
    }

    pub fn finalize(self, rewriter: &CitationRewriter, ledger: &SourceLedger) -> RenderedReport {
        rewriter.render_detailed(&self.0, ledger)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GroundingRecord;

    fn ledger_with(urls: &[&str]) -> SourceLedger {
        let mut ledger = SourceLedger::new();
        for url in urls {
            let domain = url.trim_start_matches("https://").split('/').next().unwrap_or("");
            ledger.ingest(&[GroundingRecord::new(*url, format!("Title {url}"), domain)]);
        }
        ledger
    }

    #[test]
    fn test_dangling_citation_is_removed() {
        let rewriter = CitationRewriter::default();
        let out = rewriter.render_detailed(
            "Revenue grew <cite source=\"src-99\" /> fast.",
            &SourceLedger::new(),
        );
        assert_eq!(out.text, "Revenue grew fast.");
        assert_eq!(out.warnings.len(), 1);
        assert!(out.cited.is_empty());

        let ledger = ledger_with(&["https://a.example"]);
        let out = rewriter.render("Revenue grew <cite source=\"src-2\" /> fast.", &ledger);
        assert_eq!(out, "Revenue grew fast.");
    }

    #[test]
    fn test_dangling_citation_opening_a_line() {
        let rewriter = CitationRewriter::default();
        let out = rewriter.render("Para one.\n<cite source=\"src-9\" /> Next para.", &SourceLedger::new());
        assert_eq!(out, "Para one.\nNext para.");

        let out = rewriter.render("<cite source=\"src-9\" /> Opening line.", &SourceLedger::new());
        assert_eq!(out, "Opening line.");
    }

    #[test]
    fn test_dangling_citation_before_punctuation() {
        let rewriter = CitationRewriter::default();
        let out = rewriter.render("Demand rose <cite source='src-4'/>.", &SourceLedger::new());
        assert_eq!(out, "Demand rose.");
    }

    #[test]
    fn test_punctuation_hugs_citation() {
        let ledger = ledger_with(&["https://a.example"]);
        let rewriter = CitationRewriter::default();
        let out = rewriter.render("Stable <cite source=\"src-1\" /> .", &ledger);
        assert!(out.starts_with("Stable [[1]](#ref1)."), "got {out}");
    }

    #[test]
    fn test_quote_variants_resolve_identically() {
        let ledger = ledger_with(&["https://a.example", "https://b.example"]);
        let rewriter = CitationRewriter::new(CitationStyle::Html);
        let variants = [
            "X <cite source=src-2 />",
            "X <cite source='src-2'/>",
            "X <cite source=\"src-2\" />",
            "X <cite  source = \" src-2 \" >",
        ];
        for v in variants {
            let out = rewriter.render_detailed(v, &ledger);
            assert_eq!(out.cited, vec!["src-2".to_string()], "variant {v}");
            assert!(out.text.starts_with("X [<a href=\"#ref1\">1</a>]"), "variant {v}: {}", out.text);
        }
    }

    #[test]
    fn test_display_order_follows_discovery() {
        let mut ledger = SourceLedger::new();
        ledger.ingest(&[GroundingRecord::new("https://a.example", "A", "a.example")]);
        ledger.ingest(&[GroundingRecord::new("https://x.example", "X", "x.example")]);
        ledger.ingest(&[
            GroundingRecord::new("https://b.example", "B", "b.example"),
            GroundingRecord::new("https://y.example", "Y", "y.example"),
            GroundingRecord::new("https://c.example", "C", "c.example"),
        ]);
        let a = ledger.identifier_for("https://a.example").unwrap().to_string();
        let b = ledger.identifier_for("https://b.example").unwrap().to_string();
        let c = ledger.identifier_for("https://c.example").unwrap().to_string();

        // Markers appear in reverse discovery order
        let draft = format!(
            "C fact <cite source=\"{c}\" />. B fact <cite source=\"{b}\" />. A fact <cite source=\"{a}\" />."
        );
        let out = CitationRewriter::default().render_detailed(&draft, &ledger);

        assert!(out.text.contains("C fact [[3]](#ref3)."));
        assert!(out.text.contains("B fact [[2]](#ref2)."));
        assert!(out.text.contains("A fact [[1]](#ref1)."));
        assert_eq!(out.cited, vec![a, b, c]);
    }

    #[test]
    fn test_unused_sources_are_omitted() {
        let ledger = ledger_with(&["https://a.example", "https://b.example", "https://c.example"]);
        let out = CitationRewriter::default().render("Only B <cite source=\"src-2\" />.", &ledger);

        let references = out.split(REFERENCES_HEADING).nth(1).unwrap();
        assert!(references.contains("https://b.example"));
        assert!(!references.contains("https://a.example"));
        assert!(!references.contains("https://c.example"));
    }

    #[test]
    fn test_no_references_without_citations() {
        let ledger = ledger_with(&["https://a.example"]);
        let out = CitationRewriter::default().render("Plain text.", &ledger);
        assert_eq!(out, "Plain text.");
    }

    #[test]
    fn test_repeated_citation_listed_once() {
        let ledger = ledger_with(&["https://a.example"]);
        let out = CitationRewriter::default().render(
            "One <cite source=\"src-1\" />. Two <cite source=\"src-1\" />.",
            &ledger,
        );
        assert_eq!(out.matches("(#ref1)").count(), 2);
        assert_eq!(out.matches("<a id=\"ref1\"></a>").count(), 1);
    }

    #[test]
    fn test_end_to_end_market_draft() {
        let mut ledger = SourceLedger::new();
        ledger.ingest(&[
            GroundingRecord::new("https://a.example", "Analyst Report", "a.example"),
            GroundingRecord::new("https://a.example/2", "a.example", "b.example"),
        ]);
        let draft = ReportDraft::new(
            "Market size is $5B <cite source=\"src-1\" />. Leader holds 30% share <cite source=\"src-2\" />.",
        );
        let out = draft.finalize(&CitationRewriter::default(), &ledger);

        assert!(out.text.starts_with(
            "Market size is $5B [[1]](#ref1). Leader holds 30% share [[2]](#ref2)."
        ));
        let references = out.text.split(REFERENCES_HEADING).nth(1).unwrap();
        let first = references.find("[Analyst Report](https://a.example) (a.example)").unwrap();
        let second = references.find("[a.example](https://a.example/2) (b.example)").unwrap();
        assert!(first < second);
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn test_html_style_escapes_titles() {
        let mut ledger = SourceLedger::new();
        ledger.ingest(&[GroundingRecord::new("https://a.example", "R&D <2024>", "a.example")]);
        let out = CitationRewriter::new(CitationStyle::Html).render("Fact <cite source=\"src-1\" />.", &ledger);
        assert!(out.contains("<p id=\"ref1\">[1] <a href=\"https://a.example\">R&amp;D &lt;2024&gt;</a> (a.example)</p>"));
    }

    #[test]
    fn test_markdown_reference_neutralises_web_text() {
        let mut ledger = SourceLedger::new();
        ledger.ingest(&[GroundingRecord::new(
            "https://a.example/q (draft)",
            "Evil <img src=x onerror=alert(1)> ]title",
            "a.example",
        )]);
        let out = CitationRewriter::default().render("Fact <cite source=\"src-1\" />.", &ledger);

        let references = out.split(REFERENCES_HEADING).nth(1).unwrap();
        assert!(!references.contains("<img"));
        assert!(references.contains(
            "[1] [Evil &lt;img src=x onerror=alert(1)&gt; \\]title](https://a.example/q%20%28draft%29) (a.example)"
        ));
    }

    #[test]
    fn test_superscript_style() {
        let ledger = ledger_with(&["https://a.example"]);
        let out = CitationRewriter::new(CitationStyle::Superscript).render("Fact <cite source=\"src-1\"/>.", &ledger);
        assert!(out.starts_with("Fact <sup><a href=\"#ref1\">[1]</a></sup>."));
    }

    #[test]
    fn test_malformed_markers_left_untouched() {
        let ledger = ledger_with(&["https://a.example"]);
        let draft = "Keep <cite ref=\"src-1\" /> and <cite source=\"doc-1\" />";
        let out = CitationRewriter::default().render_detailed(draft, &ledger);
        assert_eq!(out.text, draft);
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn test_oversized_identifier_is_dangling() {
        let out = CitationRewriter::default()
            .render("Big <cite source=\"src-99999999999999999999\" /> number.", &SourceLedger::new());
        assert_eq!(out, "Big number.");
    }

    #[test]
    fn test_style_parsing() {
        assert_eq!("HTML".parse::<CitationStyle>().unwrap(), CitationStyle::Html);
        assert_eq!("wikipedia".parse::<CitationStyle>().unwrap(), CitationStyle::Superscript);
        assert!("rtf".parse::<CitationStyle>().is_err());
    }
}
