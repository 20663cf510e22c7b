//! Gemini generateContent translation backend.

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Result, RetryPolicy, TranslateError, TranslateInput, Translator, with_retry};

const GENERATE_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Shown in place of a translation when the call succeeds but the service
/// answers without any text.
pub const FALLBACK_TEXT: &str = "Could not translate.";

/// Configuration for the Gemini translation client.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// API key for the generative language endpoint
    pub api_key: String,

    /// Model to use (defaults to gemini-2.0-flash)
    pub model: Option<String>,

    /// Language the user speaks/types (ISO 639-1 code)
    pub source_language: String,

    /// Language translations are produced in (ISO 639-1 code)
    pub target_language: String,
}

impl GeminiConfig {
    /// Create a new Gemini config with the given API key and language pair.
    pub fn new(
        api_key: impl Into<String>,
        source_language: impl Into<String>,
        target_language: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            model: None,
            source_language: source_language.into(),
            target_language: target_language.into(),
        }
    }

    /// Build from the application config. Fails fast when no credential is
    /// configured rather than attempting a doomed call later.
    pub fn from_config(config: &parlo_core::Config) -> Result<Self> {
        let api_key = config.api_key().ok_or(TranslateError::NoApiKey)?;
        let mut gemini = Self::new(
            api_key,
            config.source_language.clone(),
            config.target_language.clone(),
        );
        gemini.model = config.model().map(str::to_owned);
        Ok(gemini)
    }

    /// Set the model to use.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Get the model name, using default if not set.
    pub fn model(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    /// The fixed instruction attached to every request, audio or text.
    fn instruction(&self) -> String {
        format!(
            "You are a translator. Translate the user's {} speech or text into {} \
             verbatim. Reply with only the translation and no explanations.",
            self.source_language, self.target_language
        )
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    system_instruction: Content,
    contents: Vec<Content>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    parts: Vec<Part>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

impl Part {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            inline_data: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Default, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Content,
}

/// First text part of the first candidate, or the visible fallback when the
/// response carries no usable text.
fn text_from_response(response: GenerateResponse) -> String {
    response
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content.parts.into_iter().find_map(|part| part.text))
        .map(|text| text.trim().to_owned())
        .filter(|text| !text.is_empty())
        .unwrap_or_else(|| FALLBACK_TEXT.to_owned())
}

/// Gemini API client.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    config: GeminiConfig,
    policy: RetryPolicy,
}

impl GeminiClient {
    /// Create a new Gemini client with the given configuration and the
    /// default retry policy.
    pub fn new(config: GeminiConfig) -> Self {
        Self::with_policy(config, RetryPolicy::default())
    }

    /// Create a client with an explicit retry policy.
    pub fn with_policy(config: GeminiConfig, policy: RetryPolicy) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
            policy,
        }
    }

    fn request_body(&self, input: &TranslateInput) -> GenerateRequest {
        let part = match input {
            TranslateInput::Audio { data, mime_type } => Part {
                text: None,
                inline_data: Some(InlineData {
                    mime_type: mime_type.clone(),
                    data: BASE64.encode(data),
                }),
            },
            TranslateInput::Text(text) => Part::text(text.clone()),
        };

        GenerateRequest {
            system_instruction: Content {
                parts: vec![Part::text(self.config.instruction())],
            },
            contents: vec![Content { parts: vec![part] }],
        }
    }

    async fn request(&self, body: &GenerateRequest) -> Result<String> {
        let url = format!(
            "{}/{}:generateContent",
            GENERATE_ENDPOINT,
            self.config.model()
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.config.api_key)
            .json(body)
            .send()
            .await?;

        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            return Err(TranslateError::RateLimited);
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(TranslateError::Api(format!(
                "API returned {}: {}",
                status, body
            )));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| TranslateError::InvalidResponse(e.to_string()))?;

        Ok(text_from_response(parsed))
    }
}

#[async_trait]
impl Translator for GeminiClient {
    async fn translate(&self, input: TranslateInput) -> Result<String> {
        if self.config.api_key.is_empty() {
            return Err(TranslateError::NoApiKey);
        }

        debug!(
            model = self.config.model(),
            audio = matches!(input, TranslateInput::Audio { .. }),
            "Sending translation request to Gemini"
        );

        let body = self.request_body(&input);
        with_retry(&self.policy, || self.request(&body)).await
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> GeminiClient {
        GeminiClient::new(GeminiConfig::new("test-key", "en", "es"))
    }

    #[test]
    fn test_text_request_body() {
        let body = client().request_body(&TranslateInput::Text("good morning".to_string()));
        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(json["contents"][0]["parts"][0]["text"], "good morning");
        let instruction = json["system_instruction"]["parts"][0]["text"]
            .as_str()
            .unwrap();
        assert!(instruction.contains("en"));
        assert!(instruction.contains("es"));
        assert!(instruction.contains("no explanations"));
    }

    #[test]
    fn test_audio_request_body() {
        let body = client().request_body(&TranslateInput::Audio {
            data: vec![1, 2, 3],
            mime_type: "audio/wav".to_string(),
        });
        let json = serde_json::to_value(&body).unwrap();

        let inline = &json["contents"][0]["parts"][0]["inline_data"];
        assert_eq!(inline["mime_type"], "audio/wav");
        assert_eq!(inline["data"], BASE64.encode([1u8, 2, 3]));
        // Same instruction as text requests.
        assert!(
            json["system_instruction"]["parts"][0]["text"]
                .as_str()
                .unwrap()
                .contains("verbatim")
        );
    }

    #[test]
    fn test_empty_response_resolves_to_fallback() {
        let empty: GenerateResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(text_from_response(empty), FALLBACK_TEXT);

        let no_text: GenerateResponse =
            serde_json::from_str(r#"{"candidates":[{"content":{"parts":[{}]}}]}"#).unwrap();
        assert_eq!(text_from_response(no_text), FALLBACK_TEXT);

        let blank: GenerateResponse =
            serde_json::from_str(r#"{"candidates":[{"content":{"parts":[{"text":"  "}]}}]}"#)
                .unwrap();
        assert_eq!(text_from_response(blank), FALLBACK_TEXT);
    }

    #[test]
    fn test_response_text_is_trimmed() {
        let response: GenerateResponse =
            serde_json::from_str(r#"{"candidates":[{"content":{"parts":[{"text":"hola \n"}]}}]}"#)
                .unwrap();
        assert_eq!(text_from_response(response), "hola");
    }

    #[tokio::test]
    async fn test_missing_key_fails_fast() {
        let client = GeminiClient::new(GeminiConfig::new("", "en", "es"));
        let result = client.translate(TranslateInput::Text("hi".to_string())).await;
        assert!(matches!(result, Err(TranslateError::NoApiKey)));
    }

    #[test]
    fn test_from_config_requires_key() {
        let config = parlo_core::Config::default();
        assert!(matches!(
            GeminiConfig::from_config(&config),
            Err(TranslateError::NoApiKey)
        ));

        let config = parlo_core::Config {
            api_key: Some("k".to_string()),
            ..Default::default()
        };
        let gemini = GeminiConfig::from_config(&config).unwrap();
        assert_eq!(gemini.source_language, "en");
        assert_eq!(gemini.target_language, "es");
    }
}
