//! Evenly spaced frame selection.

use std::time::Duration;

use super::error::FrameError;
use super::types::{DecodeFailure, Frame, KeyFrame, KeyFrameSet, Selection};

/// Produces evenly spaced timestamps across a video.
///
/// When `0, interval, 2·interval, …` would exceed `max_count`, the effective
/// interval is widened to `duration / max_count` instead of truncating the
/// tail, so the whole video is always covered.
#[derive(Debug, Clone, Copy)]
pub struct IntervalFrameSelector {
    interval: Duration,
    max_count: usize,
}

impl IntervalFrameSelector {
    /// `max_count` is clamped to at least 1.
    pub fn new(interval: Duration, max_count: usize) -> Self {
        Self {
            interval,
            max_count: max_count.max(1),
        }
    }

    pub fn max_count(&self) -> usize {
        self.max_count
    }

    /// Target timestamps for a video of the given duration.
    ///
    /// Always starts at 0 and never yields more than `max_count` entries.
    /// Computed on whole milliseconds so spacing is exact.
    pub fn timestamps(&self, duration: Duration) -> Vec<Duration> {
        let duration_ms = duration.as_millis() as u64;
        if duration_ms == 0 {
            return vec![Duration::ZERO];
        }

        let max = self.max_count as u64;
        let interval_ms = self.interval.as_millis() as u64;

        let mut step = if interval_ms == 0 {
            (duration_ms / max).max(1)
        } else {
            interval_ms
        };
        let mut count = duration_ms / step + 1;

        if count > max {
            step = (duration_ms / max).max(1);
            count = max.min(duration_ms / step + 1);
        }

        (0..count).map(|i| Duration::from_millis(i * step)).collect()
    }

    /// Pick, for each target timestamp, the first sampled frame at or after it.
    ///
    /// A sampled frame that satisfies several targets is kept once. A decode
    /// error after at least one frame ends collection and is reported on the
    /// returned selection.
    pub fn collect<I>(&self, frames: I, duration: Duration) -> Result<Selection, FrameError>
    where
        I: IntoIterator<Item = Result<Frame, FrameError>>,
    {
        let targets = self.timestamps(duration);
        let mut next_target = 0;
        let mut picked = KeyFrameSet::default();
        let mut last_seen: Option<Duration> = None;
        let mut scanned = 0u64;
        let mut decode_error = None;

        for item in frames {
            let frame = match item {
                Ok(frame) => frame,
                Err(e) => match last_seen {
                    None => return Err(rebase_decode_error(e)),
                    Some(last) => {
                        decode_error = Some(DecodeFailure {
                            last_timestamp_secs: Some(last.as_secs_f64()),
                            message: failure_message(&e),
                        });
                        break;
                    }
                },
            };

            if last_seen.is_some_and(|last| frame.timestamp() <= last) {
                continue;
            }
            last_seen = Some(frame.timestamp());
            scanned += 1;

            let mut matched = false;
            while next_target < targets.len() && frame.timestamp() >= targets[next_target] {
                next_target += 1;
                matched = true;
            }
            if matched {
                picked.push_ordered(KeyFrame { frame, score: 0.0 });
            }
            if next_target >= targets.len() {
                break;
            }
        }

        if scanned == 0 {
            return Err(FrameError::EmptyInput);
        }

        tracing::debug!(
            "[Interval] Picked {} of {} targets from {} sampled frames",
            picked.len(),
            targets.len(),
            scanned
        );

        Ok(Selection {
            key_frames: picked,
            decode_error,
            fell_back: false,
            frames_scanned: scanned,
        })
    }
}

/// Message recorded on a [`DecodeFailure`]; the timestamp is tracked separately.
pub(crate) fn failure_message(err: &FrameError) -> String {
    match err {
        FrameError::Decode { message, .. } => message.clone(),
        other => other.to_string(),
    }
}

/// An error before any frame was read has no last good timestamp.
pub(crate) fn rebase_decode_error(err: FrameError) -> FrameError {
    match err {
        FrameError::Decode { message, .. } => FrameError::decode(None, message),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgb, RgbImage};

    fn secs(v: &[u64]) -> Vec<Duration> {
        v.iter().map(|s| Duration::from_secs(*s)).collect()
    }

    fn frames(count: u64) -> Vec<Result<Frame, FrameError>> {
        (0..count)
            .map(|i| {
                let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, Rgb([0, 0, 0])));
                Ok(Frame::new(i, Duration::from_secs(i), img))
            })
            .collect()
    }

    #[test]
    fn fixed_interval_within_cap() {
        let selector = IntervalFrameSelector::new(Duration::from_secs(10), 15);
        assert_eq!(
            selector.timestamps(Duration::from_secs(30)),
            secs(&[0, 10, 20, 30])
        );
    }

    #[test]
    fn cap_widens_interval_instead_of_truncating() {
        let selector = IntervalFrameSelector::new(Duration::from_secs(10), 4);
        let ts = selector.timestamps(Duration::from_secs(300));
        assert_eq!(ts, secs(&[0, 75, 150, 225]));
    }

    #[test]
    fn single_frame_cap_yields_start() {
        let selector = IntervalFrameSelector::new(Duration::from_secs(10), 1);
        assert_eq!(selector.timestamps(Duration::from_secs(120)), secs(&[0]));
    }

    #[test]
    fn zero_duration_yields_start() {
        let selector = IntervalFrameSelector::new(Duration::from_secs(10), 15);
        assert_eq!(selector.timestamps(Duration::ZERO), secs(&[0]));
    }

    #[test]
    fn zero_interval_spreads_over_cap() {
        let selector = IntervalFrameSelector::new(Duration::ZERO, 5);
        let ts = selector.timestamps(Duration::from_secs(100));
        assert_eq!(ts, secs(&[0, 20, 40, 60, 80]));
    }

    #[test]
    fn tiny_duration_never_duplicates() {
        let selector = IntervalFrameSelector::new(Duration::ZERO, 15);
        let ts = selector.timestamps(Duration::from_millis(5));
        assert!(ts.len() <= 15);
        assert!(ts.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn collect_picks_first_frame_at_or_after_target() {
        let selector = IntervalFrameSelector::new(Duration::from_secs(10), 15);
        let selection = selector
            .collect(frames(35), Duration::from_secs(34))
            .unwrap();
        assert_eq!(
            selection.key_frames.timestamps(),
            secs(&[0, 10, 20, 30])
        );
        assert!(!selection.fell_back);
    }

    #[test]
    fn collect_on_empty_stream_is_empty_input() {
        let selector = IntervalFrameSelector::new(Duration::from_secs(10), 15);
        let result = selector.collect(Vec::new(), Duration::from_secs(30));
        assert!(matches!(result, Err(FrameError::EmptyInput)));
    }

    fn failing_after(good: u64, total: u64) -> Vec<Result<Frame, FrameError>> {
        let mut stream = frames(good);
        stream.extend((good..total).map(|i| {
            Err(FrameError::decode(
                Some(Duration::from_secs(i)),
                "invalid NAL unit",
            ))
        }));
        stream
    }

    #[test]
    fn decode_error_keeps_frames_read_so_far() {
        let selector = IntervalFrameSelector::new(Duration::from_secs(2), 15);
        let selection = selector
            .collect(failing_after(8, 20), Duration::from_secs(20))
            .unwrap();

        assert_eq!(selection.key_frames.timestamps(), secs(&[0, 2, 4, 6]));
        assert_eq!(selection.frames_scanned, 8);
        assert!(!selection.fell_back);
        let failure = selection.decode_error.unwrap();
        assert_eq!(failure.last_timestamp_secs, Some(7.0));
        assert_eq!(failure.message, "invalid NAL unit");
    }

    #[test]
    fn decode_error_before_any_frame_is_an_error() {
        let selector = IntervalFrameSelector::new(Duration::from_secs(2), 15);
        let result = selector.collect(failing_after(0, 20), Duration::from_secs(20));
        assert!(matches!(
            result,
            Err(FrameError::Decode {
                last_timestamp: None,
                ..
            })
        ));
    }

    proptest::proptest! {
        #[test]
        fn timestamps_are_capped_and_start_at_zero(
            duration_ms in 0u64..10_000_000,
            interval_ms in 0u64..600_000,
            max_count in 0usize..64,
        ) {
            let selector = IntervalFrameSelector::new(Duration::from_millis(interval_ms), max_count);
            let ts = selector.timestamps(Duration::from_millis(duration_ms));
            proptest::prop_assert!(!ts.is_empty());
            proptest::prop_assert!(ts.len() <= max_count.max(1));
            proptest::prop_assert_eq!(ts[0], Duration::ZERO);
            proptest::prop_assert!(ts.iter().all(|t| *t <= Duration::from_millis(duration_ms)));
            proptest::prop_assert!(ts.windows(2).all(|w| w[0] < w[1]));
        }
    }
}
