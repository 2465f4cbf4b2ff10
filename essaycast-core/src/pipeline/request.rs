use serde::{Deserialize, Serialize};

use crate::language::{self, LanguageDescriptor};
use crate::runtime::types::RuntimeError;

/// Text completion model selector (`0` = GPT-4, `1` = GPT-3.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum TextModel {
    #[default]
    Gpt4,
    Gpt35Turbo,
}

impl TextModel {
    pub fn model_name(&self) -> &'static str {
        match self {
            TextModel::Gpt4 => "gpt-4",
            TextModel::Gpt35Turbo => "gpt-3.5-turbo",
        }
    }
}

impl TryFrom<u8> for TextModel {
    type Error = String;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(TextModel::Gpt4),
            1 => Ok(TextModel::Gpt35Turbo),
            other => Err(format!("unknown text model selector {other}")),
        }
    }
}

impl From<TextModel> for u8 {
    fn from(m: TextModel) -> Self {
        m as u8
    }
}

/// Image synthesis model selector (`0` = DALL-E 2, `1` = DALL-E 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ImageModel {
    DallE2,
    #[default]
    DallE3,
}

impl ImageModel {
    pub fn model_name(&self) -> &'static str {
        match self {
            ImageModel::DallE2 => "dall-e-2",
            ImageModel::DallE3 => "dall-e-3",
        }
    }
}

impl TryFrom<u8> for ImageModel {
    type Error = String;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(ImageModel::DallE2),
            1 => Ok(ImageModel::DallE3),
            other => Err(format!("unknown image model selector {other}")),
        }
    }
}

impl From<ImageModel> for u8 {
    fn from(m: ImageModel) -> Self {
        m as u8
    }
}

/// Target narration length (`0` ≈ 30 s, `1` ≈ 1 min, `2` ≈ 4 min).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum VideoLength {
    Short,
    #[default]
    Medium,
    Long,
}

impl VideoLength {
    /// Essay length in words; narration runs at roughly 150 words a minute.
    pub fn target_word_count(&self) -> u32 {
        match self {
            VideoLength::Short => 75,
            VideoLength::Medium => 150,
            VideoLength::Long => 600,
        }
    }

    pub fn spoken_minutes(&self) -> f32 {
        self.target_word_count() as f32 / 150.0
    }
}

impl TryFrom<u8> for VideoLength {
    type Error = String;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(VideoLength::Short),
            1 => Ok(VideoLength::Medium),
            2 => Ok(VideoLength::Long),
            other => Err(format!("unknown video length selector {other}")),
        }
    }
}

impl From<VideoLength> for u8 {
    fn from(l: VideoLength) -> Self {
        l as u8
    }
}

/// Everything a caller supplies when submitting a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationRequest {
    pub topic: String,
    pub num_images: usize,
    pub language: String,
    pub text_model: TextModel,
    pub image_model: ImageModel,
    pub video_length: VideoLength,
    /// Gather background notes from the research back-end before writing.
    pub use_web_search: bool,
}

impl Default for GenerationRequest {
    fn default() -> Self {
        Self {
            topic: String::new(),
            num_images: 5,
            language: "en".to_owned(),
            text_model: TextModel::default(),
            image_model: ImageModel::default(),
            video_length: VideoLength::default(),
            use_web_search: true,
        }
    }
}

impl GenerationRequest {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            ..Default::default()
        }
    }

    /// Admission checks. Returns the resolved language on success.
    pub fn validate(&self, max_images: usize) -> Result<LanguageDescriptor, RuntimeError> {
        if self.topic.trim().is_empty() {
            return Err(RuntimeError::InvalidInput("topic must not be empty".into()));
        }
        if !(1..=max_images).contains(&self.num_images) {
            return Err(RuntimeError::InvalidInput(format!(
                "Number of images must be between 1 and {max_images}"
            )));
        }
        Ok(language::resolve(&self.language)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selectors_deserialize_from_integers() {
        let req: GenerationRequest = serde_json::from_str(
            r#"{"topic":"tides","num_images":3,"text_model":1,"image_model":0,"video_length":2}"#,
        )
        .unwrap();
        assert_eq!(req.text_model, TextModel::Gpt35Turbo);
        assert_eq!(req.image_model, ImageModel::DallE2);
        assert_eq!(req.video_length.target_word_count(), 600);
        assert_eq!(req.language, "en");
        assert!(req.use_web_search);
    }

    #[test]
    fn unknown_selector_is_rejected() {
        let res: Result<GenerationRequest, _> =
            serde_json::from_str(r#"{"topic":"tides","text_model":7}"#);
        assert!(res.is_err());
    }

    #[test]
    fn validate_bounds_image_count() {
        let mut req = GenerationRequest::new("ocean currents");
        req.num_images = 0;
        assert!(matches!(req.validate(10), Err(RuntimeError::InvalidInput(_))));
        req.num_images = 11;
        assert!(matches!(req.validate(10), Err(RuntimeError::InvalidInput(_))));
        req.num_images = 10;
        assert_eq!(req.validate(10).unwrap().code, "en");
    }

    #[test]
    fn validate_rejects_unknown_language() {
        let mut req = GenerationRequest::new("ocean currents");
        req.language = "xx".into();
        let err = req.validate(10).unwrap_err();
        assert!(err.to_string().contains("unsupported language"));
    }

    #[test]
    fn spoken_minutes_follow_word_count() {
        assert!((VideoLength::Short.spoken_minutes() - 0.5).abs() < f32::EPSILON);
        assert!((VideoLength::Long.spoken_minutes() - 4.0).abs() < f32::EPSILON);
    }
}
