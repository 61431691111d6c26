use crate::error::{CashbookError, Result};
use crate::llm::types::*;
use reqwest::Client;
use std::time::Duration;

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: String) -> Self {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            api_key,
            base_url: GEMINI_BASE_URL.to_string(),
        }
    }

    /// Reads the API key from `GEMINI_API_KEY`.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var(API_KEY_ENV).map_err(|_| {
            CashbookError::ExtractionFailed(format!("{} is not set", API_KEY_ENV))
        })?;
        Ok(Self::new(api_key))
    }

    /// Points the client at a different endpoint (proxies, test servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub(crate) async fn generate_content(
        &self,
        model: &str,
        system_prompt: &str,
        messages: Vec<Content>,
        response_schema: Option<serde_json::Value>,
    ) -> Result<String> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, model, self.api_key
        );

        let payload = GenerateContentRequest {
            contents: messages,
            system_instruction: Some(Content::user(system_prompt)),
            generation_config: GenerationConfig {
                response_mime_type: "application/json".to_string(),
                response_schema,
            },
        };

        let res = self.client.post(&url).json(&payload).send().await?;
        let status = res.status();

        if !status.is_success() {
            let err_text = res.text().await?;
            return Err(CashbookError::ExtractionFailed(format!(
                "Gemini API Error (status {}): {}",
                status, err_text
            )));
        }

        let body: GenerateContentResponse = res.json().await?;
        first_text(body)
    }
}

fn first_text(body: GenerateContentResponse) -> Result<String> {
    let part = body
        .candidates
        .ok_or_else(|| CashbookError::ExtractionFailed("No candidates returned".to_string()))?
        .into_iter()
        .next()
        .ok_or_else(|| CashbookError::ExtractionFailed("Empty candidates list".to_string()))?
        .content
        .parts
        .into_iter()
        .next()
        .ok_or_else(|| CashbookError::ExtractionFailed("No parts in content".to_string()))?;

    match part {
        Part::Text { text } => Ok(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization() {
        let payload = GenerateContentRequest {
            contents: vec![Content::user("hello")],
            system_instruction: Some(Content::user("system")),
            generation_config: GenerationConfig {
                response_mime_type: "application/json".to_string(),
                response_schema: None,
            },
        };

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["contents"][0]["parts"][0]["text"], "hello");
        assert_eq!(json["systemInstruction"]["parts"][0]["text"], "system");
        assert_eq!(json["generationConfig"]["responseMimeType"], "application/json");
        assert!(json["generationConfig"].get("responseSchema").is_none());
    }

    #[test]
    fn test_first_text_extraction() {
        let body: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"{\"incomes\":[]}"}]}}]}"#,
        )
        .unwrap();
        assert_eq!(first_text(body).unwrap(), "{\"incomes\":[]}");

        let empty: GenerateContentResponse = serde_json::from_str(r#"{"candidates":[]}"#).unwrap();
        assert!(matches!(
            first_text(empty),
            Err(CashbookError::ExtractionFailed(_))
        ));
    }
}
