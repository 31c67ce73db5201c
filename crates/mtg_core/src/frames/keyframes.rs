//! Scene-change key-frame selection.
//!
//! Single pass over the sampled stream:
//! 1. The first frame is always accepted.
//! 2. Each later frame is scored against the last accepted frame and
//!    accepted when the score exceeds the threshold.
//! 3. Scanning stops once `max_count` frames are accepted.
//! 4. If fewer than `min_useful` frames were accepted after a full scan,
//!    evenly spaced frames are used instead.
//!
//! For step 4 the selector keeps one reservoir frame per interval target
//! while scanning, so no second decode pass is needed and memory stays
//! bounded by `max_count`.

use std::time::Duration;

use super::diff::{FrameDiffMetric, FrameSignature};
use super::error::FrameError;
use super::interval::{failure_message, rebase_decode_error, IntervalFrameSelector};
use super::types::{DecodeFailure, Frame, KeyFrame, KeyFrameSet, Selection};

/// Default change-score threshold (0..=255 scale).
pub const DEFAULT_THRESHOLD: f64 = 30.0;
/// Default maximum number of key frames.
pub const DEFAULT_MAX_KEY_FRAMES: usize = 15;

/// Selects visually distinct frames from a sampled frame stream.
#[derive(Debug, Clone)]
pub struct KeyFrameSelector {
    metric: FrameDiffMetric,
    threshold: f64,
    max_count: usize,
    min_useful: usize,
    fallback_interval: Duration,
}

impl Default for KeyFrameSelector {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD, DEFAULT_MAX_KEY_FRAMES)
    }
}

impl KeyFrameSelector {
    /// Create a selector. `max_count` is clamped to at least 1.
    pub fn new(threshold: f64, max_count: usize) -> Self {
        Self {
            metric: FrameDiffMetric::default(),
            threshold: threshold.max(0.0),
            max_count: max_count.max(1),
            min_useful: 1,
            fallback_interval: Duration::from_secs(10),
        }
    }

    pub fn with_metric(mut self, metric: FrameDiffMetric) -> Self {
        self.metric = metric;
        self
    }

    /// Minimum number of scene-change frames before falling back to
    /// interval selection. Clamped to `1..=max_count`.
    pub fn with_min_useful(mut self, min_useful: usize) -> Self {
        self.min_useful = min_useful.clamp(1, self.max_count);
        self
    }

    /// Interval used when falling back to evenly spaced frames.
    pub fn with_fallback_interval(mut self, interval: Duration) -> Self {
        self.fallback_interval = interval;
        self
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn max_count(&self) -> usize {
        self.max_count
    }

    /// Run selection over `frames`, a single-pass stream of sampled frames.
    ///
    /// `duration` is the probed video duration, used only for the interval
    /// fallback targets.
    ///
    /// # Errors
    /// - [`FrameError::EmptyInput`] when the stream yields no frame.
    /// - The stream's own error when it fails before the first frame
    ///   (decode errors are reported without a last timestamp).
    ///
    /// A failure after at least one frame is not an error: the frames
    /// gathered so far are returned with `decode_error` set, and no
    /// fallback is attempted.
    pub fn select<I>(&self, frames: I, duration: Duration) -> Result<Selection, FrameError>
    where
        I: IntoIterator<Item = Result<Frame, FrameError>>,
    {
        let mut reservoir = Reservoir::new(self, duration);
        let mut accepted = KeyFrameSet::default();
        let mut previous: Option<FrameSignature> = None;
        let mut last_seen: Option<Duration> = None;
        let mut scanned = 0u64;
        let mut capped = false;
        let mut decode_error = None;

        for item in frames {
            let frame = match item {
                Ok(frame) => frame,
                Err(e) => match last_seen {
                    None => return Err(rebase_decode_error(e)),
                    Some(last) => {
                        tracing::warn!(
                            "[KeyFrames] Decode failed after {:.2}s, keeping {} key frames: {}",
                            last.as_secs_f64(),
                            accepted.len(),
                            e
                        );
                        decode_error = Some(DecodeFailure {
                            last_timestamp_secs: Some(last.as_secs_f64()),
                            message: failure_message(&e),
                        });
                        break;
                    }
                },
            };

            // Sampling timestamps must increase; anything else is dropped.
            if last_seen.is_some_and(|last| frame.timestamp() <= last) {
                tracing::trace!(
                    "[KeyFrames] Skipping out-of-order frame at {:.3}s",
                    frame.timestamp().as_secs_f64()
                );
                continue;
            }
            last_seen = Some(frame.timestamp());
            scanned += 1;
            reservoir.offer(&frame);

            let signature = self.metric.signature(frame.image());
            let score = match &previous {
                None => 0.0,
                Some(prev) => self.metric.distance(prev, &signature),
            };

            if previous.is_none() || score > self.threshold {
                tracing::trace!(
                    "[KeyFrames] Accepted frame {} at {:.2}s (score {:.2})",
                    frame.index(),
                    frame.timestamp().as_secs_f64(),
                    score
                );
                previous = Some(signature);
                accepted.push_ordered(KeyFrame { frame, score });

                if accepted.len() >= self.max_count {
                    capped = true;
                    break;
                }
            }
        }

        if scanned == 0 {
            return Err(FrameError::EmptyInput);
        }

        let mut fell_back = false;
        if decode_error.is_none() && !capped && accepted.len() < self.min_useful {
            let fallback = reservoir.into_set();
            if fallback.len() > accepted.len() {
                tracing::info!(
                    "[KeyFrames] Only {} scene change(s) found, using {} evenly spaced frames",
                    accepted.len(),
                    fallback.len()
                );
                accepted = fallback;
                fell_back = true;
            }
        }

        tracing::info!(
            "[KeyFrames] Selected {} key frames from {} sampled frames{}",
            accepted.len(),
            scanned,
            if capped { " (limit reached)" } else { "" }
        );

        Ok(Selection {
            key_frames: accepted,
            decode_error,
            fell_back,
            frames_scanned: scanned,
        })
    }
}

/// One slot per interval target, filled with the first frame at or after it.
///
/// Only allocated when a fallback is possible at all (`min_useful > 1`).
struct Reservoir {
    targets: Vec<Duration>,
    next: usize,
    frames: Vec<Frame>,
}

impl Reservoir {
    fn new(selector: &KeyFrameSelector, duration: Duration) -> Self {
        let targets = if selector.min_useful > 1 {
            IntervalFrameSelector::new(selector.fallback_interval, selector.max_count)
                .timestamps(duration)
        } else {
            Vec::new()
        };
        Self {
            targets,
            next: 0,
            frames: Vec::new(),
        }
    }

    fn offer(&mut self, frame: &Frame) {
        let mut matched = false;
        while self.next < self.targets.len() && frame.timestamp() >= self.targets[self.next] {
            self.next += 1;
            matched = true;
        }
        if matched {
            self.frames.push(frame.clone());
        }
    }

    fn into_set(self) -> KeyFrameSet {
        let mut set = KeyFrameSet::default();
        for frame in self.frames {
            set.push_ordered(KeyFrame { frame, score: 0.0 });
        }
        set
    }
}
