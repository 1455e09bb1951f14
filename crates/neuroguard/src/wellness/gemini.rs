use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::config::AdvisorConfig;

#[derive(Debug, thiserror::Error)]
pub enum GeminiError {
    #[error("no Gemini API key configured")]
    MissingApiKey,
    #[error("Gemini request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Gemini returned HTTP {0}")]
    Status(u16),
    #[error("Gemini response carried no text")]
    EmptyResponse,
}

/// Thin client for the `generateContent` endpoint.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: Client,
    endpoint: String,
    api_key: String,
}

impl GeminiClient {
    pub fn from_config(config: &AdvisorConfig) -> Result<Self, GeminiError> {
        let api_key = config.api_key.clone().ok_or(GeminiError::MissingApiKey)?;
        let http = Client::builder().timeout(config.timeout).build()?;
        let endpoint = format!(
            "{}/v1beta/{}:generateContent",
            config.base_url.trim_end_matches('/'),
            config.model.trim_start_matches('/')
        );

        Ok(Self {
            http,
            endpoint,
            api_key,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub async fn generate(&self, prompt: &str) -> Result<String, GeminiError> {
        let body = json!({ "contents": [{ "parts": [{ "text": prompt }] }] });
        let response = self
            .http
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GeminiError::Status(status.as_u16()));
        }

        let payload: GenerateContentResponse = response.json().await?;
        payload.first_text().ok_or(GeminiError::EmptyResponse)
    }
}

#[derive(Debug, Default, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Default, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Content,
}

#[derive(Debug, Default, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Default, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

impl GenerateContentResponse {
    fn first_text(self) -> Option<String> {
        self.candidates
            .into_iter()
            .next()?
            .content
            .parts
            .into_iter()
            .next()?
            .text
            .filter(|text| !text.trim().is_empty())
    }
}
