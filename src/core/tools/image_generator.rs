use anyhow::{Result, anyhow};
use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::{Tool, string_arg};
use crate::config::ImageConfig;
use crate::core::images::ImageStore;

pub const TOOL_NAME: &str = "ImageGenerator";

pub const MAX_PROMPT_CHARS: usize = 500;

/// Text-to-image backend. Returns the image as a base64 payload.
#[async_trait]
pub trait ImageBackend: Send + Sync {
    async fn generate(&self, prompt: &str, seed: u32) -> Result<String>;
}

#[derive(Serialize)]
struct ImageRequest<'a> {
    prompt: &'a str,
    seed: u32,
    model: &'a str,
}

#[derive(Deserialize)]
struct ImageResponse {
    #[serde(default)]
    images: Vec<String>,
}

/// Posts `{"prompt", "seed", "model"}` to a configured endpoint and reads the
/// first entry of the `images` array in the reply. Holds only a pooled client
/// and its settings.
pub struct HttpImageBackend {
    endpoint: Option<String>,
    model: String,
    api_key: String,
    client: Client,
}

impl HttpImageBackend {
    pub fn new(settings: &ImageConfig, api_key: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()?;
        Ok(Self {
            endpoint: settings.endpoint.clone(),
            model: settings.model.clone(),
            api_key,
            client,
        })
    }
}

#[async_trait]
impl ImageBackend for HttpImageBackend {
    async fn generate(&self, prompt: &str, seed: u32) -> Result<String> {
        let endpoint = self
            .endpoint
            .as_deref()
            .ok_or_else(|| anyhow!("no image endpoint configured"))?;

        let mut request = self.client.post(endpoint).json(&ImageRequest {
            prompt,
            seed,
            model: &self.model,
        });
        if !self.api_key.is_empty() {
            request = request.header("Authorization", format!("Bearer {}", self.api_key));
        }

        let res = request.send().await?;
        let status = res.status();
        if !status.is_success() {
            return Err(anyhow!(
                "image backend returned {}: {}",
                status,
                res.text().await.unwrap_or_default()
            ));
        }
        let parsed: ImageResponse = res.json().await?;
        parsed
            .images
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("image backend returned no images"))
    }
}

/// Generates an image from a text prompt, stores the payload, and answers
/// with a JSON marker naming the stored file.
pub struct ImageGenerator {
    backend: Arc<dyn ImageBackend>,
    store: ImageStore,
    result_as_answer: bool,
}

impl ImageGenerator {
    pub fn new(backend: Arc<dyn ImageBackend>, store: ImageStore) -> Self {
        Self {
            backend,
            store,
            result_as_answer: true,
        }
    }

    pub fn with_result_as_answer(mut self, enabled: bool) -> Self {
        self.result_as_answer = enabled;
        self
    }

    async fn generate_and_store(&self, prompt: &str) -> Result<String> {
        let seed = rand::random::<u32>();
        let payload = self.backend.generate(prompt, seed).await?;
        let payload = payload.trim();
        base64::engine::general_purpose::STANDARD
            .decode(payload)
            .map_err(|e| anyhow!("backend payload is not valid base64: {}", e))?;
        let name = self.store.save(payload).await?;
        Ok(serde_json::json!({"type": "image", "image_file_name": name}).to_string())
    }
}

fn is_image_marker(output: &str) -> bool {
    matches!(
        serde_json::from_str::<Value>(output),
        Ok(v) if v.get("image_file_name").is_some_and(Value::is_string)
    )
}

#[async_trait]
impl Tool for ImageGenerator {
    fn name(&self) -> &str {
        TOOL_NAME
    }

    fn description(&self) -> &str {
        "Generates an image from a text description (at most 500 characters) and returns a reference to the stored image."
    }

    fn usage(&self) -> &str {
        r#"{"prompt": "<description of the image>"}"#
    }

    fn result_as_answer(&self) -> bool {
        self.result_as_answer
    }

    fn answers_with(&self, output: &str) -> bool {
        self.result_as_answer && is_image_marker(output)
    }

    async fn run(&self, input: Value) -> String {
        let prompt = match string_arg(&input, "prompt").map(str::trim) {
            Some(p) if !p.is_empty() => p,
            _ => return "Prompt is required.".to_string(),
        };
        if prompt.chars().count() > MAX_PROMPT_CHARS {
            return "Error: Prompt exceeds 500 characters. Please provide a shorter description."
                .to_string();
        }

        info!("Generating image ({} chars of prompt)", prompt.chars().count());
        match self.generate_and_store(prompt).await {
            Ok(marker) => marker,
            Err(e) => {
                warn!("Image generation failed: {}", e);
                format!("Error generating image: {}", e)
            }
        }
    }
}
