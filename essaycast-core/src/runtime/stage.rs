/// One step of the generation pipeline, in execution order.
///
/// Each stage owns a fixed progress checkpoint and a display label. Both are
/// written to the task's state *before* the stage's work starts so pollers
/// see what is currently running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::AsRefStr, strum::EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum Stage {
    /// Optional web research feeding the essay prompt.
    Research,
    Essay,
    Prompts,
    Speech,
    Images,
    Compose,
    /// Move the encoded video to its permanent name.
    Finalize,
}

pub const COMPLETED_LABEL: &str = "Video generation completed";
pub const COMPLETED_PROGRESS: f32 = 100.0;

impl Stage {
    pub fn label(&self) -> &'static str {
        match self {
            Stage::Research => "Searching the web",
            Stage::Essay => "Generating essay",
            Stage::Prompts => "Generating image prompts",
            Stage::Speech => "Converting text to speech",
            Stage::Images => "Generating images",
            Stage::Compose => "Creating video",
            Stage::Finalize => "Finalizing video",
        }
    }

    pub fn progress(&self) -> f32 {
        match self {
            Stage::Research | Stage::Essay => 0.0,
            Stage::Prompts => 20.0,
            Stage::Speech => 40.0,
            Stage::Images => 60.0,
            Stage::Compose => 80.0,
            Stage::Finalize => 90.0,
        }
    }
}

/// Label after `done` of `total` images have been rendered.
pub(crate) fn image_label(done: usize, total: usize) -> String {
    format!("Generating image {done} of {total}")
}

/// Progress after `done` of `total` images, spread over the images band.
pub(crate) fn image_progress(done: usize, total: usize) -> f32 {
    let band = Stage::Compose.progress() - Stage::Images.progress();
    Stage::Images.progress() + band * done as f32 / total.max(1) as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn checkpoints_never_decrease_in_stage_order() {
        let progress: Vec<f32> = Stage::iter().map(|s| s.progress()).collect();
        assert!(progress.windows(2).all(|w| w[0] <= w[1]));
        assert!(progress.iter().all(|p| *p < COMPLETED_PROGRESS));
    }

    #[test]
    fn image_band_ends_at_compose() {
        assert_eq!(image_progress(1, 4), 65.0);
        assert_eq!(image_progress(4, 4), Stage::Compose.progress());
        assert_eq!(image_label(2, 5), "Generating image 2 of 5");
    }

    #[test]
    fn stage_names_are_snake_case() {
        assert_eq!(Stage::Finalize.to_string(), "finalize");
        assert_eq!(Stage::Images.as_ref(), "images");
    }
}
