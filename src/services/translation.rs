use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::{Language, TranslationConfig};

#[derive(Serialize)]
struct TranslateRequest<'a> {
    q: &'a str,
    target: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<&'a str>,
}

#[derive(Deserialize)]
struct TranslateResponse {
    data: TranslateData,
}

#[derive(Deserialize)]
struct TranslateData {
    translations: Vec<TranslatedText>,
}

#[derive(Deserialize)]
struct TranslatedText {
    #[serde(rename = "translatedText")]
    translated_text: String,
}

#[derive(Debug, Error)]
pub enum TranslationError {
    #[error("request failed: {0}")]
    RequestFailed(String),
    #[error("translation service answered with status {0}")]
    Status(u16),
    #[error("malformed translation response: {0}")]
    Malformed(String),
}

impl TranslationError {
    /// Inline text shown in place of the translation
    pub fn user_message(&self) -> &'static str {
        "Translation failed. Please try again."
    }
}

/// Remote translation of a selected span
pub trait Translator {
    fn translate(&self, text: &str, target: Language) -> Result<String, TranslationError>;
}

/// JSON-over-HTTP client for a v2-style translate endpoint
#[derive(Debug, Clone)]
pub struct HttpTranslator {
    client: reqwest::blocking::Client,
    endpoint: String,
    api_key: Option<String>,
    source: Option<Language>,
}

impl HttpTranslator {
    pub fn new(config: &TranslationConfig) -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            source: config.source_language,
        }
    }
}

impl Translator for HttpTranslator {
    fn translate(&self, text: &str, target: Language) -> Result<String, TranslationError> {
        if text.trim().is_empty() {
            return Ok(String::new());
        }

        let request = TranslateRequest {
            q: text,
            target: target.code(),
            source: self.source.map(|l| l.code()),
        };

        let mut builder = self.client.post(&self.endpoint).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.query(&[("key", key)]);
        }

        let response = builder
            .send()
            .map_err(|e| TranslationError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            warn!("translation request rejected with {}", status);
            return Err(TranslationError::Status(status.as_u16()));
        }

        let body = response
            .text()
            .map_err(|e| TranslationError::RequestFailed(e.to_string()))?;
        debug!("translation response: {} bytes", body.len());
        parse_response(&body)
    }
}

/// Pulls the first translated text out of a response body
pub fn parse_response(body: &str) -> Result<String, TranslationError> {
    let response: TranslateResponse =
        serde_json::from_str(body).map_err(|e| TranslationError::Malformed(e.to_string()))?;

    response
        .data
        .translations
        .into_iter()
        .next()
        .map(|t| t.translated_text)
        .ok_or_else(|| TranslationError::Malformed("no translations returned".to_string()))
}
