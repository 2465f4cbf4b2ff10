//! Text-to-speech back-ends.
//!
//! Both back-ends split the essay into request-sized chunks, concatenate the
//! returned MP3 streams into `speech.mp3` and then measure the result with
//! FFmpeg, since every later timing decision is derived from that duration.

use std::path::Path;

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, info};

use crate::services::ffmpeg::probe_duration;
use crate::services::{ServiceError, SpeechService, SpeechTrack, ensure_success};

pub const SPEECH_FILE_NAME: &str = "speech.mp3";

const GOOGLE_TTS_URL: &str = "https://translate.google.com/translate_tts";
/// The translate endpoint rejects longer inputs.
const GOOGLE_MAX_CHARS: usize = 100;
const OPENAI_MAX_CHARS: usize = 4000;

/// Greedily pack whole words into chunks of at most `max_chars` characters.
/// Words longer than `max_chars` are hard-split.
pub(crate) fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();
        if word_len > max_chars {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let chars: Vec<char> = word.chars().collect();
            for piece in chars.chunks(max_chars) {
                chunks.push(piece.iter().collect());
            }
            continue;
        }

        let needed = if current.is_empty() { word_len } else { word_len + 1 };
        if current_len + needed > max_chars {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if !current.is_empty() {
            current.push(' ');
            current_len += 1;
        }
        current.push_str(word);
        current_len += word_len;
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

async fn write_and_measure(audio: Vec<u8>, output_dir: &Path) -> Result<SpeechTrack, ServiceError> {
    let path = output_dir.join(SPEECH_FILE_NAME);
    tokio::fs::write(&path, &audio).await?;
    let duration_secs = probe_duration(&path).await?;
    info!(path = %path.display(), duration_secs, "speech saved");
    Ok(SpeechTrack {
        path,
        duration_secs,
    })
}

fn empty_text() -> ServiceError {
    ServiceError::MalformedResponse {
        service: "speech",
        detail: "nothing to synthesize".into(),
    }
}

/// Google Translate TTS, the same endpoint gTTS uses. Keyless.
#[derive(Debug, Clone, Default)]
pub struct GoogleTranslateSpeech {
    http: reqwest::Client,
}

impl GoogleTranslateSpeech {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SpeechService for GoogleTranslateSpeech {
    async fn synthesize(
        &self,
        text: &str,
        language_code: &str,
        output_dir: &Path,
    ) -> Result<SpeechTrack, ServiceError> {
        let chunks = chunk_text(text, GOOGLE_MAX_CHARS);
        if chunks.is_empty() {
            return Err(empty_text());
        }
        info!(chunks = chunks.len(), language_code, "converting text to speech");

        let total = chunks.len().to_string();
        let mut audio = Vec::new();
        for (idx, chunk) in chunks.iter().enumerate() {
            debug!(idx, "requesting speech chunk");
            let idx = idx.to_string();
            let textlen = chunk.chars().count().to_string();
            let resp = self
                .http
                .get(GOOGLE_TTS_URL)
                .header(reqwest::header::USER_AGENT, "Mozilla/5.0")
                .query(&[
                    ("ie", "UTF-8"),
                    ("q", chunk.as_str()),
                    ("tl", language_code),
                    ("client", "tw-ob"),
                    ("total", total.as_str()),
                    ("idx", idx.as_str()),
                    ("textlen", textlen.as_str()),
                ])
                .send()
                .await?;
            let bytes = ensure_success("google tts", resp).await?.bytes().await?;
            audio.extend_from_slice(&bytes);
        }

        write_and_measure(audio, output_dir).await
    }
}

/// OpenAI `audio/speech`. The voice model detects the language itself.
#[derive(Clone)]
pub struct OpenAiSpeech {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    voice: String,
}

impl std::fmt::Debug for OpenAiSpeech {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiSpeech")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("voice", &self.voice)
            .finish_non_exhaustive()
    }
}

impl OpenAiSpeech {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            model: "tts-1".to_owned(),
            voice: "alloy".to_owned(),
        }
    }

    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = voice.into();
        self
    }
}

#[async_trait]
impl SpeechService for OpenAiSpeech {
    async fn synthesize(
        &self,
        text: &str,
        language_code: &str,
        output_dir: &Path,
    ) -> Result<SpeechTrack, ServiceError> {
        let chunks = chunk_text(text, OPENAI_MAX_CHARS);
        if chunks.is_empty() {
            return Err(empty_text());
        }
        info!(chunks = chunks.len(), language_code, voice = %self.voice, "converting text to speech");

        let mut audio = Vec::new();
        for chunk in &chunks {
            let resp = self
                .http
                .post(format!("{}/audio/speech", self.base_url))
                .bearer_auth(&self.api_key)
                .json(&json!({
                    "model":           self.model,
                    "voice":           self.voice,
                    "input":           chunk,
                    "response_format": "mp3",
                }))
                .send()
                .await?;
            let bytes = ensure_success("openai speech", resp).await?.bytes().await?;
            audio.extend_from_slice(&bytes);
        }

        write_and_measure(audio, output_dir).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunks_respect_limit_and_word_boundaries() {
        let text = "The ocean conveyor belt moves heat from the equator toward the poles over centuries.";
        let chunks = chunk_text(text, 20);
        assert!(chunks.iter().all(|c| c.chars().count() <= 20));
        assert_eq!(chunks.join(" "), text);
        assert_eq!(chunks[0], "The ocean conveyor");
    }

    #[test]
    fn overlong_word_is_hard_split() {
        let chunks = chunk_text("a Donaudampfschifffahrt b", 8);
        assert_eq!(chunks, vec!["a", "Donaudam", "pfschiff", "fahrt", "b"]);
    }

    #[test]
    fn whitespace_only_text_has_no_chunks() {
        assert!(chunk_text("  \n\t ", 100).is_empty());
    }

    #[test]
    fn multibyte_text_is_measured_in_characters() {
        let text = "été été été";
        let chunks = chunk_text(text, 7);
        assert_eq!(chunks, vec!["été été", "été"]);
    }
}
