//! Google Gemini API client.
//!
//! Talks directly to the Generative Language API: `generateContent` for
//! buffered turns and `streamGenerateContent?alt=sse` for chunked delivery.
//! System messages map to `systemInstruction`; the web-search capability
//! flag maps to the provider's `google_search` tool declaration.

use async_stream::try_stream;
use async_trait::async_trait;
use futures_util::stream::TryStreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncBufReadExt;
use tokio_util::io::StreamReader;

use crate::core_types::{LLMResponse, Message, Role, Usage};
use crate::errors::ChatError;
use crate::llm::{TextStream, LLM};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

pub struct GeminiClient {
    api_key: Option<String>,
    model: String,
    client: Client,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: Option<String>, model: String) -> Self {
        Self::with_base_url(api_key, model, DEFAULT_BASE_URL.to_string())
    }

    pub fn with_base_url(api_key: Option<String>, model: String, base_url: String) -> Self {
        Self {
            api_key,
            model,
            client: Client::new(),
            base_url,
        }
    }

    fn api_key(&self) -> Result<&str, ChatError> {
        self.api_key.as_deref().ok_or_else(|| {
            ChatError::ConfigError(
                "No API key configured for Gemini. Set GEMINI_API_KEY or provide api_key in the config file".to_string(),
            )
        })
    }

    fn endpoint(&self, method: &str) -> Result<String, ChatError> {
        Ok(format!(
            "{}/models/{}:{}?key={}",
            self.base_url,
            self.model,
            method,
            self.api_key()?
        ))
    }
}

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GeminiGenerationConfig,
    #[serde(rename = "systemInstruction", skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<GeminiTool>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
struct GeminiGenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
    #[serde(rename = "topP")]
    top_p: f32,
}

impl Default for GeminiGenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_output_tokens: 4096,
            top_p: 0.9,
        }
    }
}

/// Tool declarations. The only one the proxy uses is the provider-hosted
/// web-search grounding tool.
#[derive(Debug, Serialize)]
struct GeminiTool {
    #[serde(rename = "google_search")]
    google_search: serde_json::Value,
}

impl GeminiTool {
    fn web_search() -> Self {
        Self {
            google_search: serde_json::json!({}),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(rename = "usageMetadata", default)]
    usage_metadata: Option<GeminiUsage>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: GeminiContent,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiUsage {
    #[serde(rename = "promptTokenCount", default)]
    prompt_token_count: Option<i32>,
    #[serde(rename = "candidatesTokenCount", default)]
    candidates_token_count: Option<i32>,
    #[serde(rename = "totalTokenCount", default)]
    total_token_count: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    error: GeminiErrorDetails,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetails {
    code: u16,
    message: String,
}

impl GeminiClient {
    fn convert_messages(
        &self,
        messages: Vec<Message>,
    ) -> (Option<GeminiContent>, Vec<GeminiContent>) {
        let mut system_instruction = None;
        let mut contents = Vec::new();

        for message in messages {
            match message.role {
                Role::System => {
                    // The last system message wins, matching upstream semantics.
                    system_instruction = Some(GeminiContent {
                        role: None,
                        parts: vec![GeminiPart {
                            text: Some(message.content),
                        }],
                    });
                }
                Role::User => contents.push(GeminiContent {
                    role: Some("user".to_string()),
                    parts: vec![GeminiPart {
                        text: Some(message.content),
                    }],
                }),
                Role::Assistant => contents.push(GeminiContent {
                    role: Some("model".to_string()),
                    parts: vec![GeminiPart {
                        text: Some(message.content),
                    }],
                }),
            }
        }

        (system_instruction, contents)
    }

    fn build_request(&self, messages: Vec<Message>, web_search: bool) -> GeminiRequest {
        let (system_instruction, contents) = self.convert_messages(messages);
        GeminiRequest {
            contents,
            generation_config: GeminiGenerationConfig::default(),
            system_instruction,
            tools: web_search.then(|| vec![GeminiTool::web_search()]),
        }
    }

    fn decode_error(status: reqwest::StatusCode, body: &str) -> ChatError {
        if let Ok(gemini_error) = serde_json::from_str::<GeminiError>(body) {
            return ChatError::LLMError(format!(
                "Gemini API error {}: {}",
                gemini_error.error.code, gemini_error.error.message
            ));
        }
        ChatError::LLMError(format!(
            "Gemini API request failed with status {}: {}",
            status, body
        ))
    }

    fn chunk_text(response: &GeminiResponse) -> String {
        response
            .candidates
            .iter()
            .flat_map(|candidate| candidate.content.parts.iter())
            .filter_map(|part| part.text.as_deref())
            .collect()
    }

    fn convert_response(&self, response: GeminiResponse) -> Result<LLMResponse, ChatError> {
        let usage = response.usage_metadata.as_ref().map(|u| Usage {
            prompt_tokens: u.prompt_token_count.unwrap_or(0) as u32,
            completion_tokens: u.candidates_token_count.unwrap_or(0) as u32,
            total_tokens: u.total_token_count.unwrap_or(0) as u32,
        });

        let candidate = response
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| ChatError::LLMError("No candidates in Gemini response".to_string()))?;

        let text: String = candidate
            .content
            .parts
            .iter()
            .filter_map(|part| part.text.as_deref())
            .collect();

        Ok(LLMResponse {
            content: (!text.is_empty()).then_some(text),
            finish_reason: candidate.finish_reason,
            usage,
        })
    }
}

#[async_trait]
impl LLM for GeminiClient {
    async fn generate(
        &self,
        messages: Vec<Message>,
        web_search: bool,
    ) -> Result<LLMResponse, ChatError> {
        let url = self.endpoint("generateContent")?;
        let request = self.build_request(messages, web_search);
        log::debug!(
            "Gemini generateContent: model={} contents={} web_search={}",
            self.model,
            request.contents.len(),
            web_search
        );

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| ChatError::LLMError(format!("Gemini API request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(Self::decode_error(status, &body));
        }

        let gemini_response: GeminiResponse = response
            .json()
            .await
            .map_err(|e| ChatError::ParsingError(format!("Failed to parse Gemini response: {}", e)))?;

        self.convert_response(gemini_response)
    }

    async fn generate_stream(
        &self,
        messages: Vec<Message>,
        web_search: bool,
    ) -> Result<TextStream, ChatError> {
        let url = self.endpoint("streamGenerateContent")?;
        let url = format!("{}&alt=sse", url);
        let request = self.build_request(messages, web_search);
        log::debug!(
            "Gemini streamGenerateContent: model={} contents={}",
            self.model,
            request.contents.len()
        );

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .header("Accept", "text/event-stream")
            .json(&request)
            .send()
            .await
            .map_err(|e| ChatError::LLMError(format!("Gemini API request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(Self::decode_error(status, &body));
        }

        let bytes = response
            .bytes_stream()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Interrupted, e.to_string()));
        let mut lines = StreamReader::new(bytes).lines();

        let stream = try_stream! {
            while let Some(line) = lines
                .next_line()
                .await
                .map_err(|e| ChatError::StreamError(e.to_string()))?
            {
                let Some(data) = line.strip_prefix("data:") else {
                    continue;
                };
                let data = data.trim();
                if data.is_empty() {
                    continue;
                }

                let chunk: GeminiResponse = serde_json::from_str(data).map_err(|e| {
                    ChatError::ParsingError(format!("Failed to parse Gemini stream chunk: {}", e))
                })?;
                let text = Self::chunk_text(&chunk);
                if !text.is_empty() {
                    yield text;
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::mock_upstream::{MockReply, MockUpstream};
    use futures_util::StreamExt;

    fn turn() -> Vec<Message> {
        vec![
            Message::system("You are helpful"),
            Message::user("Hello"),
        ]
    }

    #[test]
    fn system_message_becomes_system_instruction() {
        let client = GeminiClient::new(Some("k".to_string()), "gemini-2.0-flash".to_string());
        let (system, contents) = client.convert_messages(turn());
        assert!(system.is_some());
        assert_eq!(contents.len(), 1);
        assert_eq!(contents[0].role.as_deref(), Some("user"));
    }

    #[test]
    fn web_search_flag_declares_the_search_tool() {
        let client = GeminiClient::new(Some("k".to_string()), "gemini-2.0-flash".to_string());
        let with = client.build_request(turn(), true);
        let without = client.build_request(turn(), false);

        let json = serde_json::to_value(&with).unwrap();
        assert!(json["tools"][0].get("google_search").is_some());
        assert!(serde_json::to_value(&without).unwrap().get("tools").is_none());
    }

    #[test]
    fn missing_api_key_surfaces_as_config_error() {
        let client = GeminiClient::new(None, "gemini-2.0-flash".to_string());
        let err = client.endpoint("generateContent").unwrap_err();
        assert!(matches!(err, ChatError::ConfigError(_)));
    }

    #[tokio::test]
    async fn generate_decodes_a_buffered_response() {
        let upstream = MockUpstream::start(vec![MockReply::Json(serde_json::json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "HEX is "}, {"text": "a token."}]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 10, "candidatesTokenCount": 5, "totalTokenCount": 15}
        }))])
        .await;

        let client = GeminiClient::with_base_url(
            Some("test-key".to_string()),
            "gemini-2.0-flash".to_string(),
            upstream.address(),
        );
        let response = client.generate(turn(), false).await.unwrap();
        assert_eq!(response.content.as_deref(), Some("HEX is a token."));
        assert_eq!(response.usage.unwrap().total_tokens, 15);

        let recorded = upstream.requests();
        assert_eq!(recorded.len(), 1);
        assert_eq!(
            recorded[0]["systemInstruction"]["parts"][0]["text"],
            "You are helpful"
        );
        upstream.shutdown().await;
    }

    #[tokio::test]
    async fn generate_maps_upstream_error_bodies() {
        let upstream = MockUpstream::start(vec![MockReply::Error(
            429,
            serde_json::json!({"error": {"code": 429, "message": "quota exhausted"}}),
        )])
        .await;

        let client = GeminiClient::with_base_url(
            Some("test-key".to_string()),
            "gemini-2.0-flash".to_string(),
            upstream.address(),
        );
        let err = client.generate(turn(), false).await.unwrap_err();
        match err {
            ChatError::LLMError(message) => assert!(message.contains("quota exhausted")),
            other => panic!("unexpected error: {other:?}"),
        }
        upstream.shutdown().await;
    }

    #[tokio::test]
    async fn generate_stream_yields_text_chunks_in_order() {
        let body = concat!(
            "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"Hello\"}]}}]}\n\n",
            "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\", world\"}]}}]}\n\n",
        );
        let upstream = MockUpstream::start(vec![MockReply::Sse(body.to_string())]).await;

        let client = GeminiClient::with_base_url(
            Some("test-key".to_string()),
            "gemini-2.0-flash".to_string(),
            upstream.address(),
        );
        let mut stream = client.generate_stream(turn(), false).await.unwrap();

        let mut collected = String::new();
        while let Some(chunk) = stream.next().await {
            collected.push_str(&chunk.unwrap());
        }
        assert_eq!(collected, "Hello, world");
        upstream.shutdown().await;
    }
}
