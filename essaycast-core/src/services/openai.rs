//! OpenAI-compatible chat completion and image generation back-ends.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use crate::language::LanguageDescriptor;
use crate::pipeline::request::ImageModel;
use crate::services::{ContentService, EssayRequest, ImageService, ServiceError, ensure_success};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Model used to turn essay portions into image descriptions.
const PROMPT_MODEL: &str = "gpt-3.5-turbo";
const IMAGE_SIZE: &str = "1024x1024";

/// Thin client over the OpenAI REST API.
#[derive(Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ImageResponse {
    data: Vec<ImageDatum>,
}

#[derive(Deserialize)]
struct ImageDatum {
    url: Option<String>,
    b64_json: Option<String>,
}

impl OpenAiClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_owned(),
        }
    }

    async fn chat(
        &self,
        model: &str,
        messages: &[ChatMessage<'_>],
    ) -> Result<String, ServiceError> {
        let resp = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&json!({ "model": model, "messages": messages }))
            .send()
            .await?;
        let body: ChatResponse = ensure_success("chat completion", resp).await?.json().await?;

        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|text| text.trim().to_owned())
            .filter(|text| !text.is_empty())
            .ok_or(ServiceError::MalformedResponse {
                service: "chat completion",
                detail: "no message content in first choice".into(),
            })
    }

    async fn fetch_image_bytes(&self, datum: ImageDatum) -> Result<Vec<u8>, ServiceError> {
        if let Some(url) = datum.url {
            debug!(%url, "downloading generated image");
            let resp = self.http.get(&url).send().await?;
            let bytes = ensure_success("image download", resp).await?.bytes().await?;
            return Ok(bytes.to_vec());
        }
        if let Some(b64) = datum.b64_json {
            return base64::engine::general_purpose::STANDARD
                .decode(b64)
                .map_err(|e| ServiceError::MalformedResponse {
                    service: "image generation",
                    detail: format!("invalid base64 image: {e}"),
                });
        }
        Err(ServiceError::MalformedResponse {
            service: "image generation",
            detail: "neither url nor b64_json present".into(),
        })
    }
}

pub(crate) fn essay_system_message(word_count: u32, language: &str) -> String {
    format!(
        "Write a coherent essay in {language} about the provided topic. \
         The essay should be approximately {word_count} words long to achieve a spoken duration of {:.1} minutes. \
         Make the essay vivid and descriptive, with clear imagery that can be visualized.",
        word_count as f32 / 150.0
    )
}

pub(crate) fn image_prompt_system_message(language: &str) -> String {
    format!(
        "You are a helpful assistant that creates detailed image prompts in {language} based on text descriptions. \
         Create a vivid and specific image prompt that captures the main visual elements of the text."
    )
}

#[async_trait]
impl ContentService for OpenAiClient {
    async fn essay(&self, request: EssayRequest<'_>) -> Result<String, ServiceError> {
        let model = request.model.model_name();
        info!(
            model,
            language = request.language.display_name,
            "generating essay"
        );

        let mut system =
            essay_system_message(request.target_word_count, request.language.generation_name);
        if let Some(notes) = request.research {
            system.push_str("\n\nUse the following up-to-date research notes as factual background:\n");
            system.push_str(notes);
        }
        let user = format!("Write about: {}", request.topic);

        self.chat(
            model,
            &[
                ChatMessage {
                    role: "system",
                    content: &system,
                },
                ChatMessage {
                    role: "user",
                    content: &user,
                },
            ],
        )
        .await
    }

    async fn image_prompt(
        &self,
        portion: &str,
        language: LanguageDescriptor,
    ) -> Result<String, ServiceError> {
        let system = image_prompt_system_message(language.generation_name);
        self.chat(
            PROMPT_MODEL,
            &[
                ChatMessage {
                    role: "system",
                    content: &system,
                },
                ChatMessage {
                    role: "user",
                    content: portion,
                },
            ],
        )
        .await
    }
}

#[async_trait]
impl ImageService for OpenAiClient {
    async fn render(
        &self,
        prompt: &str,
        model: ImageModel,
        index: usize,
        output_dir: &Path,
    ) -> Result<PathBuf, ServiceError> {
        info!(model = model.model_name(), index, "generating image");
        let resp = self
            .http
            .post(format!("{}/images/generations", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model":  model.model_name(),
                "prompt": prompt,
                "n":      1,
                "size":   IMAGE_SIZE,
            }))
            .send()
            .await?;
        let body: ImageResponse = ensure_success("image generation", resp).await?.json().await?;
        let datum = body
            .data
            .into_iter()
            .next()
            .ok_or(ServiceError::MalformedResponse {
                service: "image generation",
                detail: "empty data array".into(),
            })?;
        let bytes = self.fetch_image_bytes(datum).await?;

        let path = output_dir.join(format!("image_{index}.png"));
        store_png(bytes, path.clone()).await?;
        info!(path = %path.display(), "saved image");
        Ok(path)
    }
}

/// Decode `bytes` (any supported format) and write them out as PNG.
pub(crate) async fn store_png(bytes: Vec<u8>, path: PathBuf) -> Result<(), ServiceError> {
    tokio::task::spawn_blocking(move || -> Result<(), ServiceError> {
        let img = image::load_from_memory(&bytes)?;
        img.save_with_format(&path, image::ImageFormat::Png)?;
        Ok(())
    })
    .await?
}
