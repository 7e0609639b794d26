use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::env;

use crate::citations::CitationStyle;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub llm: LLMConfig,
    pub search: SearchConfig,
    pub research: ResearchConfig,
    pub status: StatusConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub cors_allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Reports are kept in memory when no database is configured
    pub url: Option<String>,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LLMConfig {
    pub openai_api_key: String,
    pub openai_base_url: Option<String>,
    pub google_api_key: String,
    /// Drafting and composition
    pub worker_provider: String,
    pub worker_model: String,
    /// Planning and evaluation
    pub critic_provider: String,
    pub critic_model: String,
    /// Grounded web search (Gemini)
    pub search_model: String,
}

impl LLMConfig {
    pub fn api_key_for(&self, provider: &str) -> Option<String> {
        let key = match provider {
            "openai" | "openrouter" | "litellm" => &self.openai_api_key,
            "google" | "gemini" => &self.google_api_key,
            _ => return None,
        };
        if key.is_empty() {
            None
        } else {
            Some(key.clone())
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    /// "gemini" or "serpapi"
    pub backend: String,
    pub serpapi_key: String,
    pub max_results: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResearchConfig {
    pub max_search_iterations: u32,
    pub citation_style: CitationStyle,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusConfig {
    /// Base URL of the project service notified after each stored report
    pub callback_base_url: Option<String>,
}

fn optional(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let max_search_iterations: u32 = env::var("MAX_SEARCH_ITERATIONS")
            .unwrap_or_else(|_| "2".to_string())
            .parse()
            .context("MAX_SEARCH_ITERATIONS must be a positive integer")?;
        if max_search_iterations == 0 {
            bail!("MAX_SEARCH_ITERATIONS must be at least 1");
        }

        Ok(Self {
            server: ServerConfig {
                port: env::var("PORT")
                    .unwrap_or_else(|_| "8001".to_string())
                    .parse()?,
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                cors_allowed_origins: env::var("ALLOWED_ORIGINS")
                    .unwrap_or_else(|_| "*".to_string())
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            },
            database: DatabaseConfig {
                url: optional("DATABASE_URL"),
                max_connections: env::var("DB_MAX_CONNECTIONS")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()?,
                min_connections: env::var("DB_MIN_CONNECTIONS")
                    .unwrap_or_else(|_| "1".to_string())
                    .parse()?,
            },
            llm: LLMConfig {
                openai_api_key: env::var("OPENAI_API_KEY").unwrap_or_default(),
                openai_base_url: optional("OPENAI_BASE_URL"),
                google_api_key: env::var("GOOGLE_API_KEY").unwrap_or_default(),
                worker_provider: env::var("WORKER_LLM_PROVIDER").unwrap_or_else(|_| "openai".to_string()),
                worker_model: env::var("WORKER_LLM_MODEL").unwrap_or_else(|_| "gpt-5-nano".to_string()),
                critic_provider: env::var("CRITIC_LLM_PROVIDER").unwrap_or_else(|_| "openai".to_string()),
                critic_model: env::var("CRITIC_LLM_MODEL").unwrap_or_else(|_| "gpt-5-mini".to_string()),
                search_model: env::var("SEARCH_MODEL").unwrap_or_else(|_| "gemini-2.5-flash".to_string()),
            },
            search: SearchConfig {
                backend: env::var("SEARCH_BACKEND").unwrap_or_else(|_| "gemini".to_string()),
                serpapi_key: env::var("SERPAPI_API_KEY").unwrap_or_default(),
                max_results: env::var("SEARCH_MAX_RESULTS")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()?,
            },
            research: ResearchConfig {
                max_search_iterations,
                citation_style: env::var("CITATION_STYLE")
                    .unwrap_or_else(|_| "markdown".to_string())
                    .parse()
                    .map_err(anyhow::Error::msg)?,
            },
            status: StatusConfig {
                callback_base_url: optional("STATUS_CALLBACK_URL"),
            },
        })
    }

    /// Configuration with no keys, no database and no callback. Every agent
    /// falls back to its offline behaviour.
    pub fn offline() -> Self {
        Self {
            server: ServerConfig {
                port: 8001,
                host: "127.0.0.1".to_string(),
                cors_allowed_origins: vec!["*".to_string()],
            },
            database: DatabaseConfig {
                url: None,
                max_connections: 1,
                min_connections: 1,
            },
            llm: LLMConfig {
                openai_api_key: String::new(),
                openai_base_url: None,
                google_api_key: String::new(),
                worker_provider: "openai".to_string(),
                worker_model: "gpt-5-nano".to_string(),
                critic_provider: "openai".to_string(),
                critic_model: "gpt-5-mini".to_string(),
                search_model: "gemini-2.5-flash".to_string(),
            },
            search: SearchConfig {
                backend: "gemini".to_string(),
                serpapi_key: String::new(),
                max_results: 10,
            },
            research: ResearchConfig {
                max_search_iterations: 2,
                citation_style: CitationStyle::Markdown,
            },
            status: StatusConfig {
                callback_base_url: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_key_lookup() {
        let mut config = Config::offline();
        assert_eq!(config.llm.api_key_for("openai"), None);

        config.llm.google_api_key = "g-key".to_string();
        assert_eq!(config.llm.api_key_for("gemini").as_deref(), Some("g-key"));
        assert_eq!(config.llm.api_key_for("anthropic"), None);
    }
}
