//! Pipeline kinds
//!
//! Every research pipeline runs the same plan → research → review → compose
//! sequence. What differs is the research focus, the evaluation bar, the
//! report outline and the project field the finished report is stored under.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineKind {
    MarketContext,
    Segmentation,
    ClientOrgResearch,
    TargetOrgResearch,
    ProspectResearch,
}

impl PipelineKind {
    pub const ALL: [PipelineKind; 5] = [
        PipelineKind::MarketContext,
        PipelineKind::Segmentation,
        PipelineKind::ClientOrgResearch,
        PipelineKind::TargetOrgResearch,
        PipelineKind::ProspectResearch,
    ];

    /// Default order for a multi-report run; later reports read earlier ones
    pub fn suite() -> Vec<PipelineKind> {
        vec![
            PipelineKind::Segmentation,
            PipelineKind::ClientOrgResearch,
            PipelineKind::ProspectResearch,
        ]
    }

    pub fn name(self) -> &'static str {
        match self {
            PipelineKind::MarketContext => "market_context",
            PipelineKind::Segmentation => "segmentation",
            PipelineKind::ClientOrgResearch => "client_org_research",
            PipelineKind::TargetOrgResearch => "target_org_research",
            PipelineKind::ProspectResearch => "prospect_research",
        }
    }

    /// Project document field this pipeline's report is stored under
    pub fn report_field(self) -> &'static str {
        match self {
            PipelineKind::MarketContext => "market_context",
            PipelineKind::Segmentation => "market_segment",
            PipelineKind::ClientOrgResearch => "client_org_research",
            PipelineKind::TargetOrgResearch => "target_org_research",
            PipelineKind::ProspectResearch => "prospect_research",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            PipelineKind::MarketContext => "Market Context & Sizing",
            PipelineKind::Segmentation => "Market & Customer Segmentation",
            PipelineKind::ClientOrgResearch => "Organizational Intelligence",
            PipelineKind::TargetOrgResearch => "Target Organization Sales Intelligence",
            PipelineKind::ProspectResearch => "Prospect Persona Research",
        }
    }

    /// Research phases the planner spreads its queries across
    pub fn research_phases(self) -> &'static [&'static str] {
        match self {
            PipelineKind::MarketContext => &["market_sizing", "industry_trends", "competition", "regulation"],
            PipelineKind::Segmentation => &["segment_discovery", "customer_analysis", "attractiveness", "fit"],
            PipelineKind::ClientOrgResearch => &["company_profile", "leadership", "financials", "public_perception"],
            PipelineKind::TargetOrgResearch => &[
                "target_analysis",
                "competitive_intelligence",
                "product_fit",
                "stakeholder_mapping",
                "sales_strategy",
            ],
            PipelineKind::ProspectResearch => &[
                "competitor_customers",
                "demographics_roles",
                "pain_points_behavior",
                "targeting_filters",
            ],
        }
    }

    pub fn research_focus(self) -> &'static str {
        match self {
            PipelineKind::MarketContext => {
                "market size (TAM/SAM/SOM), growth rates, demand drivers, competitive landscape and regulatory context"
            }
            PipelineKind::Segmentation => {
                "market segments, customer groups within them, segment size and growth, competitive intensity and fit with the product"
            }
            PipelineKind::ClientOrgResearch => {
                "the client company's profile, offerings, leadership, financial position, market position and public perception"
            }
            PipelineKind::TargetOrgResearch => {
                "the target organization's needs, current vendors, decision makers, buying signals and fit with the seller's product"
            }
            PipelineKind::ProspectResearch => {
                "buyer personas: job titles, seniority, departments, company sizes, industries, pain points and current solutions"
            }
        }
    }

    pub fn evaluation_criteria(self) -> &'static str {
        match self {
            PipelineKind::MarketContext => {
                "quantified market size with sources, growth figures with time frames, named competitors, and at least one regulatory or macro factor"
            }
            PipelineKind::Segmentation => {
                "a complete segment inventory, customer profiles per segment, sized and prioritized segments with rationale"
            }
            PipelineKind::ClientOrgResearch => {
                "verified company facts, leadership names, recent news, financial indicators and diverse sources"
            }
            PipelineKind::TargetOrgResearch => {
                "stakeholders by role, concrete pain points, competitive alternatives in use, and an actionable sales angle"
            }
            PipelineKind::ProspectResearch => {
                "precise job titles, seniority levels, firmographic filters and pain points for each persona"
            }
        }
    }

    pub fn report_outline(self) -> &'static str {
        match self {
            PipelineKind::MarketContext => {
                "Executive Summary; Market Definition; Market Size & Growth; Demand Drivers; Competitive Landscape; Regulatory Environment; Outlook"
            }
            PipelineKind::Segmentation => {
                "Executive Summary; Market Segments; Customer Segments; Segment Attractiveness; Prioritization; Targeting Recommendations"
            }
            PipelineKind::ClientOrgResearch => {
                "Company Overview; Products & Services; Leadership; Financial Position; Market Position; Recent Developments; Sales Implications"
            }
            PipelineKind::TargetOrgResearch => {
                "Target Overview; Business Priorities; Stakeholder Map; Current Solutions; Product Fit; Engagement Strategy"
            }
            PipelineKind::ProspectResearch => {
                "Persona Overview; Persona Profiles; Pain Points & Triggers; Targeting Filters; Outreach Guidance"
            }
        }
    }
}

impl fmt::Display for PipelineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PipelineKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        PipelineKind::ALL
            .into_iter()
            .find(|k| k.name() == normalized || k.report_field() == normalized)
            .ok_or_else(|| format!("unknown pipeline: {s}"))
    }
}
