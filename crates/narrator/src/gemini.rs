use std::time::Duration;

use async_trait::async_trait;
use engine::{Currency, Money, Transaction};
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::{
    INSIGHT_FAILED, INSIGHT_OFFLINE, NarrativeService, NarratorError, Result, SUMMARY_FAILED,
    SUMMARY_OFFLINE, insight_prompt, report_prompt,
};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

impl GenerateResponse {
    fn text(self) -> Option<String> {
        let text: String = self
            .candidates
            .into_iter()
            .next()?
            .content?
            .parts
            .into_iter()
            .filter_map(|part| part.text)
            .collect();
        Some(text).filter(|text| !text.trim().is_empty())
    }
}

/// [`NarrativeService`] backed by the Gemini `generateContent` endpoint.
#[derive(Debug, Clone)]
pub struct GeminiNarrator {
    base_url: Url,
    model: String,
    api_key: Option<String>,
    http: reqwest::Client,
}

impl GeminiNarrator {
    /// A blank or missing key keeps the narrator offline.
    pub fn new(api_key: Option<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            base_url: Url::parse(DEFAULT_BASE_URL)
                .map_err(|err| NarratorError::InvalidUrl(err.to_string()))?,
            model: DEFAULT_MODEL.to_string(),
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            http,
        })
    }

    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn base_url(mut self, base_url: &str) -> Result<Self> {
        self.base_url =
            Url::parse(base_url).map_err(|err| NarratorError::InvalidUrl(err.to_string()))?;
        Ok(self)
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Sends one prompt and returns the model's text.
    pub async fn generate(&self, prompt: &str) -> Result<String> {
        let api_key = self.api_key.as_deref().ok_or(NarratorError::MissingApiKey)?;
        let endpoint = self
            .base_url
            .join(&format!("v1beta/models/{}:generateContent", self.model))
            .map_err(|err| NarratorError::InvalidUrl(err.to_string()))?;

        let payload = GenerateRequest {
            contents: [Content {
                parts: [Part { text: prompt }],
            }],
        };

        let res = self
            .http
            .post(endpoint)
            .header("x-goog-api-key", api_key)
            .json(&payload)
            .send()
            .await?;

        if res.status().is_success() {
            return res
                .json::<GenerateResponse>()
                .await?
                .text()
                .ok_or(NarratorError::EmptyResponse);
        }

        let status = res.status();
        let message = res
            .json::<ErrorResponse>()
            .await
            .map(|err| err.error.message)
            .unwrap_or_else(|_| "unknown error".to_string());

        let err = match status.as_u16() {
            401 | 403 => NarratorError::Unauthorized,
            429 => NarratorError::RateLimited,
            code => NarratorError::Api {
                status: code,
                message,
            },
        };
        Err(err)
    }
}

#[async_trait]
impl NarrativeService for GeminiNarrator {
    async fn insight(&self, transactions: &[Transaction], currency: Currency) -> String {
        if !self.is_configured() {
            return INSIGHT_OFFLINE.to_string();
        }
        let result = match insight_prompt(transactions, currency) {
            Ok(prompt) => self.generate(&prompt).await,
            Err(err) => Err(err),
        };
        result.unwrap_or_else(|err| {
            tracing::error!("failed to generate insight: {err}");
            INSIGHT_FAILED.to_string()
        })
    }

    async fn report_summary(
        &self,
        transactions: &[Transaction],
        total_income: Money,
        total_expense: Money,
        currency: Currency,
    ) -> String {
        if !self.is_configured() {
            return SUMMARY_OFFLINE.to_string();
        }
        let result = match report_prompt(transactions, total_income, total_expense, currency) {
            Ok(prompt) => self.generate(&prompt).await,
            Err(err) => Err(err),
        };
        result.unwrap_or_else(|err| {
            tracing::error!("failed to generate report summary: {err}");
            SUMMARY_FAILED.to_string()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_candidate_parts() {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":"Nice "},{"text":"work!"}]}}]}"#;
        let response: GenerateResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.text().as_deref(), Some("Nice work!"));
    }

    #[test]
    fn blank_candidates_count_as_empty() {
        let response: GenerateResponse = serde_json::from_str(r#"{"candidates":[]}"#).unwrap();
        assert_eq!(response.text(), None);
        let response: GenerateResponse =
            serde_json::from_str(r#"{"candidates":[{"content":{"parts":[{"text":"  "}]}}]}"#)
                .unwrap();
        assert_eq!(response.text(), None);
    }

    #[tokio::test]
    async fn missing_key_answers_with_fallback() {
        let narrator = GeminiNarrator::new(Some("   ".to_string())).unwrap();
        assert!(!narrator.is_configured());
        assert_eq!(narrator.insight(&[], Currency::Usd).await, INSIGHT_OFFLINE);
        assert!(matches!(
            narrator.generate("hi").await,
            Err(NarratorError::MissingApiKey)
        ));
    }

    #[tokio::test]
    async fn unreachable_endpoint_answers_with_fallback() {
        let narrator = GeminiNarrator::new(Some("key".to_string()))
            .unwrap()
            .base_url("http://127.0.0.1:9/")
            .unwrap();
        let text = narrator
            .report_summary(&[], Money::ZERO, Money::ZERO, Currency::Eur)
            .await;
        assert_eq!(text, SUMMARY_FAILED);
    }
}
