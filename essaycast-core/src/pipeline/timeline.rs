//! Audio-driven image timing.
//!
//! Every image carries the fractional position of the essay portion it
//! illustrates. Scaling those positions by the narration length yields the
//! moment each image appears; it stays on screen until the next image takes
//! over, and the last one holds until the narration ends.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::config::DegenerateClipPolicy;
use crate::services::{CompositionSpec, ServiceError, SpeechTrack, VideoCompositor};

/// A rendered image with its resolved on-screen interval, in seconds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimedClip {
    pub image: PathBuf,
    pub start: f64,
    pub end: f64,
}

impl TimedClip {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Resolve `(image, position)` pairs into contiguous intervals over
/// `[0, duration]`.
///
/// Pairs are sorted by position (stable for ties). The first clip always
/// starts at 0 and the last always ends at `duration`; equal positions produce
/// zero-length intervals, which are returned as-is. A NaN position is placed
/// at the end.
pub fn plan(mut pairs: Vec<(PathBuf, f64)>, duration: f64) -> Vec<TimedClip> {
    let duration = duration.max(0.0);
    for (_, position) in &mut pairs {
        if position.is_nan() {
            *position = 1.0;
        }
    }
    pairs.sort_by(|a, b| a.1.total_cmp(&b.1));

    let starts: Vec<f64> = pairs
        .iter()
        .enumerate()
        .map(|(i, (_, p))| {
            if i == 0 {
                0.0
            } else {
                p.clamp(0.0, 1.0) * duration
            }
        })
        .collect();

    pairs
        .into_iter()
        .enumerate()
        .map(|(i, (image, _))| {
            let end = starts.get(i + 1).copied().unwrap_or(duration);
            TimedClip {
                image,
                start: starts[i],
                end,
            }
        })
        .collect()
}

/// Apply `policy` to a planned timeline.
///
/// `Clamp(min)` moves interior boundaries so each clip lasts at least `min`
/// seconds while the first clip still starts at 0 and the last still ends at
/// `duration`. When `duration` cannot hold `clips.len() * min`, the duration
/// is split evenly instead. No clip is ever removed.
pub fn apply_policy(
    mut clips: Vec<TimedClip>,
    duration: f64,
    policy: DegenerateClipPolicy,
) -> Vec<TimedClip> {
    let min = match policy {
        DegenerateClipPolicy::Keep => return clips,
        DegenerateClipPolicy::Clamp(min) if min > 0.0 => min,
        DegenerateClipPolicy::Clamp(_) => return clips,
    };
    if clips.is_empty() || clips.iter().all(|c| c.duration() >= min) {
        return clips;
    }

    let k = clips.len();
    // Boundaries b[0] = 0 ..= b[k] = duration.
    let mut bounds: Vec<f64> = clips.iter().map(|c| c.start).collect();
    bounds.push(duration);

    if duration < min * k as f64 {
        warn!(
            clips = k,
            duration, "narration too short for minimum clip length; splitting evenly"
        );
        for (i, b) in bounds.iter_mut().enumerate() {
            *b = duration * i as f64 / k as f64;
        }
    } else {
        for i in 1..k {
            bounds[i] = bounds[i].max(bounds[i - 1] + min);
        }
        for i in (1..k).rev() {
            bounds[i] = bounds[i].min(bounds[i + 1] - min);
        }
    }
    bounds[k] = duration;

    for (i, clip) in clips.iter_mut().enumerate() {
        if clip.duration() < min {
            debug!(image = %clip.image.display(), "widening degenerate clip");
        }
        clip.start = bounds[i];
        clip.end = bounds[i + 1];
    }
    clips
}

/// Plans image timing against the narration and hands the result to a
/// [`VideoCompositor`].
#[derive(Clone)]
pub struct TimelineComposer {
    compositor: Arc<dyn VideoCompositor>,
    fps: u32,
    frame_size: u32,
    policy: DegenerateClipPolicy,
}

impl std::fmt::Debug for TimelineComposer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimelineComposer")
            .field("fps", &self.fps)
            .field("frame_size", &self.frame_size)
            .field("policy", &self.policy)
            .finish()
    }
}

impl TimelineComposer {
    pub fn new(
        compositor: Arc<dyn VideoCompositor>,
        fps: u32,
        frame_size: u32,
        policy: DegenerateClipPolicy,
    ) -> Self {
        Self {
            compositor,
            fps,
            frame_size,
            policy,
        }
    }

    /// Compose `pairs` against `audio` into `output`.
    pub async fn compose(
        &self,
        pairs: Vec<(PathBuf, f64)>,
        audio: SpeechTrack,
        output: PathBuf,
    ) -> Result<PathBuf, ServiceError> {
        let planned = plan(pairs, audio.duration_secs);
        let degenerate = planned.iter().filter(|c| c.duration() <= 0.0).count();
        if degenerate > 0 {
            warn!(degenerate, "timeline contains zero-length intervals");
        }
        let clips = apply_policy(planned, audio.duration_secs, self.policy);

        self.compositor
            .compose(CompositionSpec {
                clips,
                audio,
                fps: self.fps,
                frame_size: self.frame_size,
                output,
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(positions: &[f64]) -> Vec<(PathBuf, f64)> {
        positions
            .iter()
            .enumerate()
            .map(|(i, p)| (PathBuf::from(format!("image_{i}.png")), *p))
            .collect()
    }

    fn assert_contiguous(clips: &[TimedClip], duration: f64) {
        assert_eq!(clips.first().map(|c| c.start), Some(0.0));
        assert_eq!(clips.last().map(|c| c.end), Some(duration));
        for pair in clips.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
        for c in clips {
            assert!(c.start <= c.end);
        }
    }

    #[test]
    fn single_clip_spans_everything() {
        let clips = plan(pairs(&[0.0]), 42.5);
        assert_eq!(clips.len(), 1);
        assert_eq!((clips[0].start, clips[0].end), (0.0, 42.5));
    }

    #[test]
    fn intervals_follow_positions() {
        let clips = plan(pairs(&[0.0, 0.25, 0.6]), 100.0);
        assert_contiguous(&clips, 100.0);
        let spans: Vec<(f64, f64)> = clips.iter().map(|c| (c.start, c.end)).collect();
        assert_eq!(spans, vec![(0.0, 25.0), (25.0, 60.0), (60.0, 100.0)]);
    }

    #[test]
    fn trailing_position_one_yields_zero_length_clip() {
        let clips = plan(pairs(&[0.0, 0.5, 1.0]), 60.0);
        let spans: Vec<(f64, f64)> = clips.iter().map(|c| (c.start, c.end)).collect();
        assert_eq!(spans, vec![(0.0, 30.0), (30.0, 60.0), (60.0, 60.0)]);
        assert_contiguous(&clips, 60.0);
    }

    #[test]
    fn unsorted_input_is_sorted_stably() {
        let input = vec![
            (PathBuf::from("c.png"), 0.8),
            (PathBuf::from("a.png"), 0.0),
            (PathBuf::from("b1.png"), 0.4),
            (PathBuf::from("b2.png"), 0.4),
        ];
        let clips = plan(input, 10.0);
        let order: Vec<&str> = clips.iter().map(|c| c.image.to_str().unwrap()).collect();
        assert_eq!(order, vec!["a.png", "b1.png", "b2.png", "c.png"]);
        // The earlier of two equal positions gets the empty interval.
        assert_eq!(clips[1].duration(), 0.0);
        assert_eq!((clips[2].start, clips[2].end), (4.0, 8.0));
        assert_contiguous(&clips, 10.0);
    }

    #[test]
    fn nan_position_sorts_last_without_panicking() {
        let input = vec![
            (PathBuf::from("lost.png"), f64::NAN),
            (PathBuf::from("a.png"), 0.0),
            (PathBuf::from("b.png"), 0.5),
        ];
        let clips = plan(input, 10.0);
        let order: Vec<&str> = clips.iter().map(|c| c.image.to_str().unwrap()).collect();
        assert_eq!(order, vec!["a.png", "b.png", "lost.png"]);
        assert_contiguous(&clips, 10.0);
    }

    #[test]
    fn first_clip_is_anchored_at_zero() {
        let clips = plan(pairs(&[0.2, 0.5]), 10.0);
        assert_eq!((clips[0].start, clips[0].end), (0.0, 5.0));
        assert_contiguous(&clips, 10.0);
    }

    #[test]
    fn clamp_widens_degenerate_clips_without_dropping() {
        let planned = plan(pairs(&[0.0, 0.5, 1.0]), 60.0);
        let clips = apply_policy(planned, 60.0, DegenerateClipPolicy::Clamp(0.5));
        assert_eq!(clips.len(), 3);
        assert_contiguous(&clips, 60.0);
        assert!(clips.iter().all(|c| c.duration() >= 0.5 - 1e-9));
        assert_eq!((clips[0].start, clips[0].end), (0.0, 30.0));
        assert!((clips[2].start - 59.5).abs() < 1e-9);
    }

    #[test]
    fn clamp_handles_runs_of_equal_positions() {
        let planned = plan(pairs(&[0.0, 0.5, 0.5, 0.5]), 20.0);
        let clips = apply_policy(planned, 20.0, DegenerateClipPolicy::Clamp(1.0));
        assert_contiguous(&clips, 20.0);
        assert!(clips.iter().all(|c| c.duration() >= 1.0 - 1e-9));
    }

    #[test]
    fn clamp_splits_evenly_when_too_short() {
        let planned = plan(pairs(&[0.0, 1.0, 1.0, 1.0]), 2.0);
        let clips = apply_policy(planned, 2.0, DegenerateClipPolicy::Clamp(1.0));
        let spans: Vec<(f64, f64)> = clips.iter().map(|c| (c.start, c.end)).collect();
        assert_eq!(spans, vec![(0.0, 0.5), (0.5, 1.0), (1.0, 1.5), (1.5, 2.0)]);
    }

    #[test]
    fn keep_policy_leaves_plan_untouched() {
        let planned = plan(pairs(&[0.0, 0.5, 1.0]), 60.0);
        let kept = apply_policy(planned.clone(), 60.0, DegenerateClipPolicy::Keep);
        assert_eq!(kept, planned);
    }
}
