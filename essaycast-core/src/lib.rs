mod config;
mod runtime;

pub mod language;
pub mod pipeline;
pub mod services;

pub use config::{Config, DegenerateClipPolicy};
pub use language::{LanguageDescriptor, LanguageError};
pub use pipeline::request::{GenerationRequest, ImageModel, TextModel, VideoLength};
pub use runtime::orchestrator::Orchestrator;
pub use runtime::stage::Stage;
pub use runtime::storage::TaskStore;
pub use runtime::types::{RuntimeError, TaskId, TaskState, TaskStatus};
