// Google Gemini adapter (generateContent REST API).
// With `web_search` set the request enables the google_search tool and the
// response's grounding metadata is flattened into GroundingRecords.

use crate::llm::provider::LLMAdapter;
use crate::types::{AppError, AppResult, GroundingRecord, LLMRequest, LLMResponse, TokenUsage};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

pub struct GoogleAdapter {
    client: Client,
    api_key: String,
    base_url: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<serde_json::Value>,
    generation_config: GenerationConfig,
}

#[derive(Serialize, Deserialize, Default)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
    #[serde(default)]
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct GroundingMetadata {
    #[serde(default)]
    grounding_chunks: Vec<GroundingChunk>,
    #[serde(default)]
    grounding_supports: Vec<GroundingSupport>,
}

#[derive(Deserialize)]
struct GroundingChunk {
    #[serde(default)]
    web: Option<WebChunk>,
}

#[derive(Deserialize)]
struct WebChunk {
    #[serde(default)]
    uri: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    domain: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroundingSupport {
    #[serde(default)]
    segment: Option<Segment>,
    #[serde(default)]
    grounding_chunk_indices: Vec<usize>,
    #[serde(default)]
    confidence_scores: Vec<f64>,
}

#[derive(Deserialize)]
struct Segment {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    total_token_count: u32,
}

impl GoogleAdapter {
    pub fn new(api_key: &str, base_url: Option<&str>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            base_url: base_url
                .unwrap_or(GEMINI_API_BASE)
                .trim_end_matches('/')
                .to_string(),
        }
    }

    fn build_request(request: &LLMRequest) -> GenerateContentRequest {
        let mut system_text = request.system_instruction.clone();
        let mut contents = Vec::with_capacity(request.messages.len());

        for message in &request.messages {
            match message.role.as_str() {
                // Gemini has no system role inside `contents`
                "system" => {
                    system_text = Some(match system_text.take() {
                        Some(existing) => format!("{}\n\n{}", existing, message.content),
                        None => message.content.clone(),
                    });
                }
                role => contents.push(Content {
                    role: Some(if role == "assistant" { "model" } else { "user" }.to_string()),
                    parts: vec![Part {
                        text: Some(message.content.clone()),
                    }],
                }),
            }
        }

        GenerateContentRequest {
            contents,
            system_instruction: system_text.map(|text| Content {
                role: None,
                parts: vec![Part { text: Some(text) }],
            }),
            tools: if request.web_search {
                vec![json!({ "google_search": {} })]
            } else {
                Vec::new()
            },
            generation_config: GenerationConfig {
                max_output_tokens: request.max_tokens,
                temperature: request.temperature,
            },
        }
    }
}

/// One record per web chunk, then one per (support, chunk index) pair.
/// Support indices pointing outside the chunk list are ignored; a missing
/// confidence score is left for the ledger to default.
fn grounding_records(metadata: &GroundingMetadata) -> Vec<GroundingRecord> {
    let chunks: Vec<Option<&WebChunk>> = metadata
        .grounding_chunks
        .iter()
        .map(|c| c.web.as_ref().filter(|w| !w.uri.is_empty()))
        .collect();

    let mut records: Vec<GroundingRecord> = chunks
        .iter()
        .flatten()
        .map(|web| GroundingRecord::new(&web.uri, &web.title, &web.domain))
        .collect();

    for support in &metadata.grounding_supports {
        let Some(text) = support
            .segment
            .as_ref()
            .and_then(|s| s.text.as_deref())
            .filter(|t| !t.trim().is_empty())
        else {
            continue;
        };

        for (i, &chunk_idx) in support.grounding_chunk_indices.iter().enumerate() {
            if let Some(Some(web)) = chunks.get(chunk_idx) {
                records.push(
                    GroundingRecord::new(&web.uri, &web.title, &web.domain)
                        .with_claim(text, support.confidence_scores.get(i).copied()),
                );
            }
        }
    }

    records
}

#[async_trait]
impl LLMAdapter for GoogleAdapter {
    async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse> {
        let url = format!("{}/models/{}:generateContent", self.base_url, request.model);
        let body = Self::build_request(request);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::LLMStatus {
                status: status.as_u16(),
                message: error_text,
            });
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| AppError::LLMApi(format!("Failed to parse Gemini response: {}", e)))?;

        let candidate = parsed
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| AppError::LLMApi("Gemini returned no candidates".to_string()))?;

        let content = candidate
            .content
            .map(|c| {
                c.parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        let grounding = candidate
            .grounding_metadata
            .as_ref()
            .map(grounding_records)
            .unwrap_or_default();

        let usage = parsed
            .usage_metadata
            .map(|u| TokenUsage {
                prompt_tokens: u.prompt_token_count,
                completion_tokens: u.candidates_token_count,
                total_tokens: u.total_token_count,
            })
            .unwrap_or_default();

        Ok(LLMResponse {
            content,
            finish_reason: candidate.finish_reason.unwrap_or_else(|| "STOP".to_string()),
            usage,
            grounding,
        })
    }
}
