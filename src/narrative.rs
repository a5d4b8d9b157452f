//! Narrative insights from a chat completion endpoint.
//!
//! The generator is a black box: it gets a compact digest of the summary and
//! returns prose or an error. Callers decide what to show on failure, see
//! [`narrate_or_fallback`].

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::aggregate::{Extreme, Summary};
use crate::config::NarrativeConfig;

/// Shown when no narrative could be produced.
pub const FALLBACK_NARRATIVE: &str = "Maaf, terjadi kesalahan dalam menganalisis data dengan AI.";

/// Errors that can occur while requesting a narrative
#[derive(Debug, Error)]
pub enum NarrativeError {
    /// Disabled in config or no API key available
    #[error("Narrative not configured: {0}")]
    NotConfigured(String),

    /// Request could not be sent or timed out
    #[error("Network error: {0}")]
    Network(String),

    /// Endpoint answered with a non-success status
    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    /// Response body was not the expected JSON
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Empty response")]
    EmptyResponse,
}

pub trait NarrativeGenerator {
    fn generate(&self, digest: &str) -> Result<String, NarrativeError>;
}

/// Totals and the three extremes, the context handed to the generator.
pub fn digest(summary: &Summary) -> String {
    let stats = &summary.statistics;
    format!(
        "Data bisnis yang dianalisis:\n\
         - Total bisnis: {}\n\
         - Rata-rata rating: {}\n\
         - Rata-rata jumlah ulasan: {}\n\
         - Total ulasan: {}\n\n\
         Bisnis dengan rating tertinggi: {}\n\n\
         Bisnis dengan ulasan terbanyak: {}\n\n\
         Bisnis dengan rating terendah: {}\n",
        stats.total_businesses,
        stats.avg_rating,
        stats.avg_reviews,
        stats.total_reviews,
        describe(&summary.highest_rated),
        describe(&summary.most_reviewed),
        describe(&summary.lowest_rated),
    )
}

fn describe(extreme: &Extreme) -> String {
    format!(
        "{} (Rating: {}, Ulasan: {}, Kategori: {})",
        extreme.name, extreme.rating, extreme.review_count, extreme.category
    )
}

pub fn prompt(digest: &str) -> String {
    format!(
        "Berikan analisis insights bisnis berdasarkan data berikut:\n\n\
         {digest}\n\
         Berikan analisis tentang:\n\
         1. Kualitas layanan secara keseluruhan berdasarkan distribusi rating\n\
         2. Popularitas bisnis berdasarkan jumlah ulasan\n\
         3. Rekomendasi strategi untuk meningkatkan rating dan ulasan\n\
         4. Pola atau tren yang terlihat dari data\n\
         5. Insight tentang kategori usaha yang performa baik\n\
         6. Saran improvement untuk bisnis dengan rating rendah\n\n\
         Format respons dalam bahasa Indonesia dengan struktur yang jelas dan actionable insights."
    )
}

/// Asks `generator` for a narrative, logging and replacing any failure with
/// [`FALLBACK_NARRATIVE`].
pub fn narrate_or_fallback(generator: &dyn NarrativeGenerator, summary: &Summary) -> String {
    match generator.generate(&digest(summary)) {
        Ok(text) => text,
        Err(e) => {
            warn!("Narrative generation failed: {e}");
            FALLBACK_NARRATIVE.to_string()
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatContent,
}

#[derive(Debug, Deserialize)]
struct ChatContent {
    content: Option<String>,
}

/// Client for an OpenAI compatible chat completions endpoint (Groq by default).
#[derive(Debug)]
pub struct GroqClient {
    client: reqwest::blocking::Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl GroqClient {
    pub fn from_config(config: &NarrativeConfig) -> Result<Self, NarrativeError> {
        if !config.enabled {
            return Err(NarrativeError::NotConfigured(
                "narrative is disabled in config".to_string(),
            ));
        }
        let api_key = config.resolve_api_key().ok_or_else(|| {
            NarrativeError::NotConfigured(format!(
                "missing API key, set [narrative] api_key or {}",
                crate::config::API_KEY_ENV
            ))
        })?;
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| NarrativeError::Network(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_key,
        })
    }
}

impl NarrativeGenerator for GroqClient {
    fn generate(&self, digest: &str) -> Result<String, NarrativeError> {
        let content = prompt(digest);
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: &content,
            }],
            stream: false,
        };
        debug!("Requesting narrative from {} ({})", self.endpoint, self.model);

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .map_err(|e| NarrativeError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().unwrap_or_default();
            return Err(NarrativeError::Api {
                code: status.as_u16(),
                message,
            });
        }

        let body: ChatResponse = response
            .json()
            .map_err(|e| NarrativeError::Parse(e.to_string()))?;
        let text = parse_content(body)?;
        info!("Received narrative ({} chars)", text.len());
        Ok(text)
    }
}

fn parse_content(body: ChatResponse) -> Result<String, NarrativeError> {
    body.choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|text| !text.trim().is_empty())
        .ok_or(NarrativeError::EmptyResponse)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::compute;
    use crate::config::ColumnContract;
    use crate::table::{Table, Value};

    struct Canned(Result<&'static str, u16>);

    impl NarrativeGenerator for Canned {
        fn generate(&self, digest: &str) -> Result<String, NarrativeError> {
            assert!(digest.contains("Total bisnis"));
            match self.0 {
                Ok(text) => Ok(text.to_string()),
                Err(code) => Err(NarrativeError::Api {
                    code,
                    message: "unavailable".into(),
                }),
            }
        }
    }

    fn summary() -> Summary {
        let mut table = Table::new(vec![
            "nama".into(),
            "rating".into(),
            "jumlah_ulasan".into(),
        ]);
        table.push_row(vec![
            Value::Text("Warung A".into()),
            Value::Number(4.5),
            Value::Number(20.0),
        ]);
        table.push_row(vec![
            Value::Text("Toko B".into()),
            Value::Number(3.0),
            Value::Number(5.0),
        ]);
        compute(&table, &ColumnContract::default()).unwrap()
    }

    #[test]
    fn digest_lists_totals_and_extremes() {
        let text = digest(&summary());
        assert!(text.contains("Total bisnis: 2"));
        assert!(text.contains("Total ulasan: 25"));
        assert!(text.contains("rating tertinggi: Warung A (Rating: 4.5, Ulasan: 20, Kategori: Unavailable)"));
        assert!(text.contains("rating terendah: Warung A"));
    }

    #[test]
    fn successful_generator_text_is_used() {
        let text = narrate_or_fallback(&Canned(Ok("Bagus sekali")), &summary());
        assert_eq!(text, "Bagus sekali");
    }

    #[test]
    fn failing_generator_falls_back() {
        let text = narrate_or_fallback(&Canned(Err(503)), &summary());
        assert_eq!(text, FALLBACK_NARRATIVE);
    }

    #[test]
    fn disabled_config_is_not_configured() {
        let config = NarrativeConfig::default().enabled(false);
        assert!(matches!(
            GroqClient::from_config(&config),
            Err(NarrativeError::NotConfigured(_))
        ));
    }

    #[test]
    fn response_content_is_extracted() {
        let body: ChatResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":"Insight"}}]}"#,
        )
        .unwrap();
        assert_eq!(parse_content(body).unwrap(), "Insight");

        let empty: ChatResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(matches!(parse_content(empty), Err(NarrativeError::EmptyResponse)));
    }
}
