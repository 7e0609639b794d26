// Helpers for pulling JSON out of LLM replies

/// Strip a ```json (or bare ```) fence if the model wrapped its answer in one
pub fn extract_json_block(response: &str) -> &str {
    if response.contains("```json") {
        response
            .split("```json")
            .nth(1)
            .and_then(|s| s.split("```").next())
            .unwrap_or(response)
            .trim()
    } else if response.contains("```") {
        response.split("```").nth(1).unwrap_or(response).trim()
    } else {
        let trimmed = response.trim();
        // Fall back to the outermost object when the model added prose around it
        match (trimmed.find('{'), trimmed.rfind('}')) {
            (Some(start), Some(end)) if start < end => &trimmed[start..=end],
            _ => trimmed,
        }
    }
}
