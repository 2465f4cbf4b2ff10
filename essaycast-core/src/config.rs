use std::path::PathBuf;

/// How zero- or near-zero-length intervals are treated before encoding.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DegenerateClipPolicy {
    /// Encode intervals as planned; the compositor still shows a
    /// zero-length clip for one frame.
    Keep,
    /// Give every clip at least this many seconds, borrowing time from its
    /// neighbours so the timeline stays contiguous and exhaustive.
    Clamp(f64),
}

/// Configuration for the [`Orchestrator`](crate::Orchestrator).
///
/// All fields have sensible defaults via [`Default`].
#[derive(Debug, Clone)]
pub struct Config {
    /// Root directory; each task writes into `<output_root>/<task_id>/`.
    pub output_root: PathBuf,
    /// Upper bound for `num_images` accepted at admission. Defaults to `10`.
    pub max_images: usize,
    /// Images rendered concurrently within one task. Defaults to `3`.
    pub image_concurrency: usize,
    /// Run image-prompt generation and speech synthesis concurrently.
    pub overlap_speech: bool,
    /// Capacity of the orchestrator submission queue. Defaults to `64`.
    pub queue_capacity: usize,
    /// Output frame rate. Defaults to `24`.
    pub fps: u32,
    /// Edge length of the square output canvas. Defaults to `1024`.
    pub frame_size: u32,
    pub degenerate_policy: DegenerateClipPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_root: PathBuf::from("output"),
            max_images: 10,
            image_concurrency: 3,
            overlap_speech: true,
            queue_capacity: 64,
            fps: 24,
            frame_size: 1024,
            degenerate_policy: DegenerateClipPolicy::Clamp(1.0 / 24.0),
        }
    }
}
