// Market Intel - research pipelines that write cited market and sales intelligence reports

pub mod agents;
pub mod citations;
pub mod config;
pub mod db;
pub mod llm;
pub mod middleware;
pub mod models;
pub mod pipelines;
pub mod review;
pub mod routes;
pub mod search; // Web search (Gemini grounding, SerpAPI)
pub mod types;
pub mod utils;

// Re-exports for convenience
pub use config::Config;
pub use models::AppState;
// Note: Import specific items from types module instead of glob to avoid name conflicts
// e.g., use market_intel::types::{LLMRequest, LLMResponse, AppResult};

pub fn create_router(state: AppState) -> axum::Router {
    routes::create_router(state)
}
