//! Request and response bodies of the HTTP API.

use essaycast_core::{
    GenerationRequest, ImageModel, TaskId, TaskState, TaskStatus, TextModel, VideoLength,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::ServerError;

/// Body of `POST /generate`. Omitted fields take the pipeline defaults.
#[derive(Debug, Deserialize, ToSchema)]
pub struct GenerateBody {
    #[schema(example = "ocean currents")]
    pub topic: String,
    /// Between 1 and 10 (default 5).
    pub num_images: Option<usize>,
    /// Code or name, e.g. `"en"`, `"italiano"` (default `"en"`).
    pub language: Option<String>,
    /// `0` = GPT-4, `1` = GPT-3.5 Turbo (default 0).
    pub text_model: Option<u8>,
    /// `0` = DALL-E 2, `1` = DALL-E 3 (default 1).
    pub image_model: Option<u8>,
    /// `0` ≈ 30 s, `1` ≈ 1 min, `2` ≈ 4 min (default 1).
    pub video_length: Option<u8>,
    pub use_web_search: Option<bool>,
}

impl GenerateBody {
    pub fn into_request(self) -> Result<GenerationRequest, ServerError> {
        let mut req = GenerationRequest::new(self.topic);
        if let Some(n) = self.num_images {
            req.num_images = n;
        }
        if let Some(language) = self.language {
            req.language = language;
        }
        if let Some(v) = self.text_model {
            req.text_model = TextModel::try_from(v).map_err(ServerError::BadRequest)?;
        }
        if let Some(v) = self.image_model {
            req.image_model = ImageModel::try_from(v).map_err(ServerError::BadRequest)?;
        }
        if let Some(v) = self.video_length {
            req.video_length = VideoLength::try_from(v).map_err(ServerError::BadRequest)?;
        }
        if let Some(flag) = self.use_web_search {
            req.use_web_search = flag;
        }
        Ok(req)
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct GenerateResponse {
    #[schema(value_type = uuid::Uuid)]
    pub task_id: TaskId,
    pub status: String,
}

/// Body of `GET /status/{task_id}`.
#[derive(Debug, Serialize, ToSchema)]
pub struct StatusResponse {
    /// One of `queued`, `processing`, `completed`, `failed`.
    pub status: String,
    pub current_step: String,
    pub progress: f32,
    pub error: Option<String>,
}

impl From<TaskState> for StatusResponse {
    fn from(state: TaskState) -> Self {
        Self {
            status: state.status.to_string(),
            current_step: state.current_step,
            progress: state.progress,
            error: state.error,
        }
    }
}

/// One row of `GET /tasks`.
#[derive(Debug, Serialize, ToSchema)]
pub struct TaskSummary {
    #[schema(value_type = uuid::Uuid)]
    pub task_id: TaskId,
    pub status: String,
    pub current_step: String,
    pub progress: f32,
    pub created_at: String,
    pub updated_at: String,
}

impl TaskSummary {
    pub fn new(task_id: TaskId, state: &TaskState) -> Self {
        Self {
            task_id,
            status: state.status.to_string(),
            current_step: state.current_step.clone(),
            progress: state.progress,
            created_at: state.created_at.to_rfc3339(),
            updated_at: state.updated_at.to_rfc3339(),
        }
    }
}

pub fn queued() -> String {
    TaskStatus::Queued.to_string()
}

#[cfg(test)]
mod test {
    use super::*;

    fn body(json: &str) -> GenerateBody {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn omitted_fields_use_pipeline_defaults() {
        let req = body(r#"{"topic":"tides"}"#).into_request().unwrap();
        assert_eq!(req.num_images, 5);
        assert_eq!(req.language, "en");
        assert_eq!(req.image_model, ImageModel::DallE3);
        assert!(req.use_web_search);
    }

    #[test]
    fn selectors_are_converted() {
        let req = body(r#"{"topic":"tides","text_model":1,"image_model":0,"video_length":2,"use_web_search":false}"#)
            .into_request()
            .unwrap();
        assert_eq!(req.text_model, TextModel::Gpt35Turbo);
        assert_eq!(req.image_model, ImageModel::DallE2);
        assert_eq!(req.video_length.target_word_count(), 600);
        assert!(!req.use_web_search);
    }

    #[test]
    fn unknown_selector_is_bad_request() {
        let err = body(r#"{"topic":"tides","video_length":9}"#)
            .into_request()
            .unwrap_err();
        assert!(matches!(err, ServerError::BadRequest(_)));
    }
}
