use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{ApiFormat, AuthType, ChatMessage, LlmProvider};
use crate::config::LlmConfig;
use crate::core::error::MissionError;

// ── OpenAI-compatible request/response ──

#[derive(Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAiMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize, Deserialize)]
struct OpenAiMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessageOwned,
}

#[derive(Deserialize)]
struct OpenAiMessageOwned {
    #[serde(default)]
    content: Option<String>,
}

// ── Gemini request/response ──

#[derive(Serialize)]
struct GeminiRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    contents: Vec<GeminiContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GeminiGenerationConfig,
}

#[derive(Serialize)]
struct GeminiGenerationConfig {
    temperature: f32,
}

#[derive(Serialize)]
struct GeminiContent {
    role: String,
    parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Deserialize)]
struct GeminiResponse {
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: GeminiResContent,
}

#[derive(Deserialize)]
struct GeminiResContent {
    parts: Vec<GeminiResPart>,
}

#[derive(Deserialize)]
struct GeminiResPart {
    text: String,
}

// ── Generic Provider ──

pub struct GenericProvider {
    settings: LlmConfig,
    api_key: String,
    client: Client,
}

impl GenericProvider {
    pub fn new(settings: LlmConfig, api_key: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()?;
        Ok(Self {
            settings,
            api_key,
            client,
        })
    }

    fn authorize(&self, mut request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if self.api_key.is_empty() {
            return request;
        }
        match self.settings.auth_type {
            AuthType::Bearer => {
                request = request.header("Authorization", format!("Bearer {}", self.api_key))
            }
            AuthType::Header => {
                let header = self.settings.header_name.as_deref().unwrap_or("x-api-key");
                request = request.header(header, &self.api_key);
            }
            AuthType::QueryParam => {
                let param = self.settings.param_name.as_deref().unwrap_or("key");
                request = request.query(&[(param, &self.api_key)]);
            }
        }
        request
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let res = self.authorize(request).send().await.map_err(|e| {
            MissionError::upstream(
                e.status().map(|s| s.as_u16()),
                format!("{} request failed: {}", self.settings.provider_id, e),
            )
        })?;
        let status = res.status();
        if !status.is_success() {
            return Err(MissionError::upstream(
                Some(status.as_u16()),
                format!(
                    "{} API Error: {}",
                    self.settings.provider_id,
                    res.text().await.unwrap_or_default()
                ),
            )
            .into());
        }
        Ok(res)
    }

    async fn generate_openai(&self, model_id: &str, messages: &[ChatMessage]) -> Result<String> {
        let req_messages: Vec<OpenAiMessage> = messages
            .iter()
            .map(|m| OpenAiMessage {
                role: &m.role,
                content: &m.content,
            })
            .collect();

        let req = OpenAiRequest {
            model: model_id,
            messages: req_messages,
            temperature: self.settings.temperature,
        };

        let res = self
            .send(self.client.post(&self.settings.base_url).json(&req))
            .await?;
        let parsed: OpenAiResponse = res.json().await.map_err(|e| {
            MissionError::upstream(None, format!("Malformed model response: {}", e))
        })?;
        Ok(parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default())
    }

    async fn generate_gemini(&self, model_id: &str, messages: &[ChatMessage]) -> Result<String> {
        let (system_instruction, contents) = to_gemini_contents(messages);
        let req = GeminiRequest {
            system_instruction,
            contents,
            generation_config: GeminiGenerationConfig {
                temperature: self.settings.temperature,
            },
        };

        let url = self.settings.base_url.replace("{model}", model_id);
        let res = self.send(self.client.post(&url).json(&req)).await?;
        let parsed: GeminiResponse = res.json().await.map_err(|e| {
            MissionError::upstream(None, format!("Malformed model response: {}", e))
        })?;
        Ok(parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .unwrap_or_default())
    }
}

/// Leading system messages become the system instruction; later ones are
/// folded into user turns with a `[SYSTEM]` prefix. Gemini requires strictly
/// alternating roles, so consecutive same-role entries are merged.
fn to_gemini_contents(messages: &[ChatMessage]) -> (Option<GeminiContent>, Vec<GeminiContent>) {
    let mut contents: Vec<GeminiContent> = Vec::new();
    let mut system_instruction: Option<GeminiContent> = None;
    let mut past_first_non_system = false;

    for m in messages {
        let (role, text) = if m.role == "system" && !past_first_non_system {
            match system_instruction {
                Some(ref mut si) => {
                    if let Some(part) = si.parts.first_mut() {
                        part.text.push('\n');
                        part.text.push_str(&m.content);
                    }
                }
                None => {
                    system_instruction = Some(GeminiContent {
                        role: "user".to_string(),
                        parts: vec![GeminiPart {
                            text: m.content.clone(),
                        }],
                    });
                }
            }
            continue;
        } else if m.role == "system" {
            ("user", format!("[SYSTEM] {}", m.content))
        } else {
            past_first_non_system = true;
            let role = if m.role == "assistant" { "model" } else { "user" };
            (role, m.content.clone())
        };

        if let Some(last) = contents.last_mut()
            && last.role == role
            && let Some(part) = last.parts.first_mut()
        {
            part.text.push('\n');
            part.text.push_str(&text);
        } else {
            contents.push(GeminiContent {
                role: role.to_string(),
                parts: vec![GeminiPart { text }],
            });
        }
    }

    (system_instruction, contents)
}

#[async_trait]
impl LlmProvider for GenericProvider {
    fn provider_id(&self) -> &str {
        &self.settings.provider_id
    }

    async fn generate(&self, model_id: &str, messages: &[ChatMessage]) -> Result<String> {
        match self.settings.api_format {
            ApiFormat::Openai => self.generate_openai(model_id, messages).await,
            ApiFormat::Gemini => self.generate_gemini(model_id, messages).await,
        }
    }
}
