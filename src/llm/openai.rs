use super::{GenerationBackend, GenerationError, PromptRef};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Backend speaking the OpenAI Responses API with published prompts.
pub struct OpenAiBackend {
    http: Client,
    api_key: String,
    base_url: String,
}

impl OpenAiBackend {
    pub fn from_env() -> Result<Self, GenerationError> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| GenerationError::PromptConfig("OPENAI_API_KEY is not set".into()))?;
        let base_url = std::env::var("OPENAI_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_BASE_URL.into())
            .trim_end_matches('/')
            .to_string();
        Ok(Self {
            http: build_client(),
            api_key,
            base_url,
        })
    }
}

fn build_client() -> Client {
    let timeout = std::env::var("HTTP_TIMEOUT_SECS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(120);
    let connect = std::env::var("HTTP_CONNECT_TIMEOUT_SECS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(5);
    Client::builder()
        .timeout(Duration::from_secs(timeout))
        .connect_timeout(Duration::from_secs(connect))
        .build()
        .unwrap_or_else(|_| Client::new())
}

#[async_trait]
impl GenerationBackend for OpenAiBackend {
    async fn generate_text(
        &self,
        prompt: &PromptRef,
        products_json: &str,
    ) -> Result<String, GenerationError> {
        let body = ResponsesRequest {
            prompt: PromptBody {
                id: prompt.id.clone(),
                version: prompt.version.clone(),
                variables: json!({ "products": products_json }),
            },
        };

        let response = self
            .http
            .post(format!("{}/responses", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| GenerationError::Request(err.to_string()))?;

        if !response.status().is_success() {
            return Err(GenerationError::Request(format!(
                "HTTP {}",
                response.status()
            )));
        }

        let payload: ResponsesPayload = response
            .json()
            .await
            .map_err(|err| GenerationError::Format(err.to_string()))?;
        payload.into_text()
    }
}

#[derive(Debug, Serialize)]
struct ResponsesRequest {
    prompt: PromptBody,
}

#[derive(Debug, Serialize)]
struct PromptBody {
    id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<String>,
    variables: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ResponsesPayload {
    #[serde(default)]
    output: Vec<OutputItem>,
}

#[derive(Debug, Deserialize)]
struct OutputItem {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    content: Vec<OutputContent>,
}

#[derive(Debug, Deserialize)]
struct OutputContent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

impl ResponsesPayload {
    fn into_text(self) -> Result<String, GenerationError> {
        let text: String = self
            .output
            .into_iter()
            .filter(|item| item.kind == "message")
            .flat_map(|item| item.content)
            .filter(|content| content.kind == "output_text")
            .map(|content| content.text)
            .collect();
        if text.is_empty() {
            return Err(GenerationError::Format("response carried no text".into()));
        }
        Ok(text)
    }
}
