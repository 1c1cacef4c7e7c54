//! Web search through the Tavily search API.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, instrument, warn};

use super::{Arguments, Capability, FailureCategory, FailureDescriptor, ParamSpec, ParamType};

const PARAMS: &[ParamSpec] = &[ParamSpec::new(
    "query",
    ParamType::String,
    "The search query, e.g. \"latest Rust release\".",
)];

/// Connection settings for the search capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    /// Search endpoint URL.
    pub endpoint: String,
    /// Environment variable that holds the API key.
    pub api_key_env: String,
    /// Maximum number of results to request.
    pub max_results: u32,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            endpoint: "https://api.tavily.com/search".to_string(),
            api_key_env: "TAVILY_API_KEY".to_string(),
            max_results: 5,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

/// `web_search` capability.
#[derive(Debug, Clone)]
pub struct WebSearch {
    settings: SearchSettings,
}

impl WebSearch {
    pub fn new(settings: SearchSettings) -> Self {
        Self { settings }
    }

    fn api_key(&self) -> Result<String, FailureDescriptor> {
        std::env::var(&self.settings.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                FailureDescriptor::new(
                    FailureCategory::MissingCredential,
                    format!("{} is not set", self.settings.api_key_env),
                )
            })
    }

    #[instrument(skip_all, fields(endpoint = %self.settings.endpoint))]
    fn search(&self, api_key: &str, query: &str) -> Result<SearchResponse, FailureDescriptor> {
        let network = |err: reqwest::Error| {
            warn!(err = %err, "search request failed");
            FailureDescriptor::new(FailureCategory::Network, format!("search error: {err}"))
        };

        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(self.settings.timeout_secs))
            .build()
            .map_err(network)?;
        let response = client
            .post(&self.settings.endpoint)
            .bearer_auth(api_key)
            .json(&json!({
                "query": query,
                "max_results": self.settings.max_results,
            }))
            .send()
            .and_then(reqwest::blocking::Response::error_for_status)
            .map_err(network)?;
        let parsed: SearchResponse = response.json().map_err(network)?;
        debug!(hits = parsed.results.len(), "search completed");
        Ok(parsed)
    }
}

impl Capability for WebSearch {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Searches the web for current information and returns titles, summaries, and source URLs."
    }

    fn parameters(&self) -> &[ParamSpec] {
        PARAMS
    }

    fn invoke(&self, args: &Arguments) -> Result<String, FailureDescriptor> {
        let query = args.get("query").and_then(Value::as_str).ok_or_else(|| {
            FailureDescriptor::new(
                FailureCategory::InvalidArguments,
                "argument 'query' must be a string",
            )
        })?;
        let api_key = self.api_key()?;
        let response = self.search(&api_key, query)?;
        Ok(format_results(query, &response))
    }
}

fn format_results(query: &str, response: &SearchResponse) -> String {
    if response.results.is_empty() {
        return format!("No results found for query: '{query}'");
    }
    response
        .results
        .iter()
        .enumerate()
        .map(|(i, hit)| {
            format!(
                "{}. {}\n   {}\n   Source: {}",
                i + 1,
                hit.title.as_deref().unwrap_or("No title"),
                hit.content.as_deref().unwrap_or("No description"),
                hit.url.as_deref().unwrap_or_default(),
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_api_key_is_a_credential_failure() {
        let search = WebSearch::new(SearchSettings {
            api_key_env: "TODO_AGENT_TEST_UNSET_SEARCH_KEY".to_string(),
            ..SearchSettings::default()
        });
        let args = json!({"query": "rust"});
        let err = search
            .invoke(args.as_object().expect("object"))
            .unwrap_err();
        assert_eq!(err.category, FailureCategory::MissingCredential);
        assert!(err.message.contains("TODO_AGENT_TEST_UNSET_SEARCH_KEY"));
    }

    #[test]
    fn formats_numbered_results_with_fallbacks() {
        let response: SearchResponse = serde_json::from_value(json!({
            "results": [
                {"title": "Rust", "content": "A language", "url": "https://rust-lang.org"},
                {"url": "https://example.com"}
            ]
        }))
        .expect("parse");

        let text = format_results("rust", &response);
        assert_eq!(
            text,
            "1. Rust\n   A language\n   Source: https://rust-lang.org\n\n\
             2. No title\n   No description\n   Source: https://example.com"
        );
    }

    #[test]
    fn empty_results_say_so() {
        let response = SearchResponse {
            results: Vec::new(),
        };
        assert_eq!(
            format_results("xyz", &response),
            "No results found for query: 'xyz'"
        );
    }
}
