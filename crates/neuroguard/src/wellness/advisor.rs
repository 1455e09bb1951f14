use serde::Serialize;
use tracing::{info, warn};

use super::gemini::{GeminiClient, GeminiError};
use super::prompt::{suggestion_prompt, summary_prompt};
use super::tips::fallback_suggestions;
use crate::config::AdvisorConfig;
use crate::prediction::FeatureVector;

const OFFLINE_SUMMARY_CHARS: usize = 200;
pub const OFFLINE_SUMMARY_PLACEHOLDER: &str = "Offline summary saved.";
pub const SUMMARY_FAILED: &str = "Summary generation failed.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AdviceSource {
    Gemini,
    Offline,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Advice {
    pub text: String,
    pub source: AdviceSource,
}

/// Turns a score into wellness tips, asking Gemini when configured and falling
/// back to the static tips on any failure.
#[derive(Debug, Clone, Default)]
pub struct WellnessAdvisor {
    client: Option<GeminiClient>,
}

impl WellnessAdvisor {
    pub fn offline() -> Self {
        Self { client: None }
    }

    pub fn with_client(client: GeminiClient) -> Self {
        Self {
            client: Some(client),
        }
    }

    pub fn from_config(config: &AdvisorConfig) -> Self {
        if !config.is_online() {
            info!("GEMINI_API_KEY not set; wellness advice will use offline tips");
            return Self::offline();
        }

        match GeminiClient::from_config(config) {
            Ok(client) => Self::with_client(client),
            Err(error) => {
                warn!(%error, "could not build Gemini client; using offline tips");
                Self::offline()
            }
        }
    }

    pub fn is_online(&self) -> bool {
        self.client.is_some()
    }

    pub async fn suggest(&self, score: u8, metrics: &FeatureVector, history: &[String]) -> Advice {
        let Some(client) = &self.client else {
            return Advice::offline(score);
        };

        match client.generate(&suggestion_prompt(score, metrics, history)).await {
            Ok(text) => Advice {
                text: text.trim().to_string(),
                source: AdviceSource::Gemini,
            },
            Err(error) => {
                log_failure("suggestion", &error);
                Advice::offline(score)
            }
        }
    }

    /// Condenses advice for the history column.
    pub async fn summarise(&self, suggestion: &str) -> String {
        let Some(client) = &self.client else {
            return offline_summary(suggestion);
        };

        match client.generate(&summary_prompt(suggestion)).await {
            Ok(text) => text.trim().to_string(),
            Err(error) => {
                log_failure("summary", &error);
                SUMMARY_FAILED.to_string()
            }
        }
    }
}

impl Advice {
    fn offline(score: u8) -> Self {
        Self {
            text: fallback_suggestions(score).to_string(),
            source: AdviceSource::Offline,
        }
    }
}

fn offline_summary(suggestion: &str) -> String {
    // Only the first raw line counts, so text opening with a blank line saves the placeholder.
    let first_line = suggestion.lines().next().unwrap_or("").trim();
    if first_line.is_empty() {
        return OFFLINE_SUMMARY_PLACEHOLDER.to_string();
    }
    first_line.chars().take(OFFLINE_SUMMARY_CHARS).collect()
}

fn log_failure(call: &'static str, error: &GeminiError) {
    warn!(call, %error, "Gemini call failed; falling back");
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use std::time::Duration;

    fn metrics() -> FeatureVector {
        FeatureVector::new([1.0, 60.0, 6.0, 240.0, 20.0, 40.0, 22.0, 4.0])
    }

    fn online_advisor(base_url: String) -> WellnessAdvisor {
        let config = AdvisorConfig {
            api_key: Some("secret".to_string()),
            model: "models/gemini-2.5-flash".to_string(),
            base_url,
            timeout: Duration::from_secs(5),
        };
        WellnessAdvisor::from_config(&config)
    }

    #[tokio::test]
    async fn offline_advisor_uses_fallback_tips() {
        let advisor = WellnessAdvisor::from_config(&AdvisorConfig::offline());
        assert!(!advisor.is_online());

        let advice = advisor.suggest(20, &metrics(), &[]).await;
        assert_eq!(advice.source, AdviceSource::Offline);
        assert_eq!(advice.text, fallback_suggestions(20));
    }

    #[tokio::test]
    async fn offline_summary_keeps_first_line() {
        let advisor = WellnessAdvisor::offline();
        assert_eq!(
            advisor.summarise("  1) Walk.  \n2) Sleep.").await,
            "1) Walk."
        );
        assert_eq!(
            advisor.summarise("\n1) Walk.\n2) Sleep.").await,
            OFFLINE_SUMMARY_PLACEHOLDER
        );
        assert_eq!(
            advisor.summarise("   ").await,
            OFFLINE_SUMMARY_PLACEHOLDER
        );

        let long = "x".repeat(450);
        assert_eq!(advisor.summarise(&long).await.chars().count(), 200);
    }

    #[tokio::test]
    async fn online_advisor_returns_generated_text() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", Matcher::Regex("generateContent".to_string()))
            .match_query(Matcher::UrlEncoded("key".into(), "secret".into()))
            .match_body(Matcher::Regex("Estimated mental state score: 55/100".to_string()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"candidates":[{"content":{"parts":[{"text":"  1) Breathe.\n"}]}}]}"#)
            .create_async()
            .await;

        let advisor = online_advisor(server.url());
        let advice = advisor.suggest(55, &metrics(), &[]).await;

        assert_eq!(advice.source, AdviceSource::Gemini);
        assert_eq!(advice.text, "1) Breathe.");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn failing_backend_falls_back() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", Matcher::Any)
            .with_status(500)
            .expect_at_least(2)
            .create_async()
            .await;

        let advisor = online_advisor(server.url());
        let advice = advisor.suggest(80, &metrics(), &[]).await;
        assert_eq!(advice.source, AdviceSource::Offline);
        assert_eq!(advice.text, fallback_suggestions(80));

        assert_eq!(advisor.summarise(&advice.text).await, SUMMARY_FAILED);
    }
}
