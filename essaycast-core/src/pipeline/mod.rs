pub mod request;
pub mod segmenter;
pub mod timeline;

/// An image description paired with the position of the portion it was
/// written for.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptRecord {
    pub prompt: String,
    pub position: f64,
}
