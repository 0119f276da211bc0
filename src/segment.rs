//! Silence-aware segmentation of a source video.
//!
//! Cuts land on the midpoint of a detected pause near the target length, so
//! narration is never split mid-sentence when a pause is available.

use serde::{Deserialize, Serialize};

use crate::error::{BundleError, Result};

/// How far past the target boundary a pause may still be used as a cut.
pub const SILENCE_SEARCH_SLACK: f64 = 30.0;

/// Window length used when no silence data is available at all.
pub const FALLBACK_WINDOW: f64 = 60.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SilenceInterval {
    pub start: f64,
    pub end: f64,
}

impl SilenceInterval {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn midpoint(&self) -> f64 {
        (self.start + self.end) / 2.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    /// 1-based position in the plan
    pub index: usize,
    pub start_time: f64,
    pub end_time: f64,
    pub duration: f64,
}

impl Segment {
    fn new(index: usize, start_time: f64, end_time: f64) -> Self {
        Self {
            index,
            start_time,
            end_time,
            duration: end_time - start_time,
        }
    }
}

/// Split `[0, total_duration)` into contiguous segments.
///
/// Each non-final segment ends at the silence midpoint closest to
/// `start + max_duration` inside `(start + min_duration, start + max_duration + 30s)`,
/// or exactly at `start + max_duration` when no pause qualifies. The final
/// segment always runs to `total_duration`. Without any silence data the plan
/// falls back to fixed 60 second windows.
pub fn plan_segments(
    total_duration: f64,
    silences: &[SilenceInterval],
    min_duration: f64,
    max_duration: f64,
) -> Result<Vec<Segment>> {
    if !(max_duration > 0.0) {
        return Err(BundleError::InvalidInput(format!(
            "max segment duration must be positive, got {}",
            max_duration
        )));
    }
    if !(min_duration >= 0.0) || min_duration > max_duration {
        return Err(BundleError::InvalidInput(format!(
            "min segment duration {} must be within [0, {}]",
            min_duration, max_duration
        )));
    }
    if !total_duration.is_finite() || total_duration <= 0.0 {
        return Ok(Vec::new());
    }

    if silences.is_empty() {
        return Ok(fixed_windows(total_duration, FALLBACK_WINDOW));
    }

    let mut midpoints: Vec<f64> = silences
        .iter()
        .map(SilenceInterval::midpoint)
        .filter(|m| m.is_finite())
        .collect();
    midpoints.sort_by(|a, b| a.total_cmp(b));

    let mut segments = Vec::new();
    let mut current_start = 0.0;

    while current_start < total_duration {
        let index = segments.len() + 1;
        let target = current_start + max_duration;

        if target >= total_duration {
            segments.push(Segment::new(index, current_start, total_duration));
            break;
        }

        let window_start = current_start + min_duration;
        let window_end = target + SILENCE_SEARCH_SLACK;

        // Midpoints are sorted, so the first of two equally close candidates wins
        let cut = midpoints
            .iter()
            .copied()
            .filter(|&m| m > window_start && m < window_end && m < total_duration)
            .fold(None, |best: Option<f64>, m| match best {
                Some(b) if (b - target).abs() <= (m - target).abs() => Some(b),
                _ => Some(m),
            })
            .unwrap_or(target);

        segments.push(Segment::new(index, current_start, cut));
        current_start = cut;
    }

    Ok(segments)
}

fn fixed_windows(total_duration: f64, window: f64) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut start = 0.0;
    while start < total_duration {
        let end = (start + window).min(total_duration);
        segments.push(Segment::new(segments.len() + 1, start, end));
        start = end;
    }
    segments
}

/// Parse ffmpeg `silencedetect` diagnostics into intervals.
///
/// A pause still open when the stream ends is closed at `total_duration`.
pub fn parse_silence_log(log: &str, total_duration: f64) -> Vec<SilenceInterval> {
    let mut intervals = Vec::new();
    let mut open_start: Option<f64> = None;

    for line in log.lines() {
        if let Some(value) = field_after(line, "silence_start:") {
            open_start = Some(value.max(0.0));
        } else if let Some(end) = field_after(line, "silence_end:") {
            // silence_end lines also carry "| silence_duration: X"
            let start = open_start.take().or_else(|| {
                field_after(line, "silence_duration:").map(|d| (end - d).max(0.0))
            });
            if let Some(start) = start {
                intervals.push(SilenceInterval::new(start, end));
            }
        }
    }

    if let Some(start) = open_start {
        if start < total_duration {
            intervals.push(SilenceInterval::new(start, total_duration));
        }
    }

    intervals
}

fn field_after(line: &str, marker: &str) -> Option<f64> {
    let rest = &line[line.find(marker)? + marker.len()..];
    rest.split_whitespace().next()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_covers(segments: &[Segment], total: f64) {
        assert!(!segments.is_empty());
        assert_eq!(segments[0].start_time, 0.0);
        assert_eq!(segments.last().unwrap().end_time, total);
        for (i, pair) in segments.windows(2).enumerate() {
            assert_eq!(pair[0].end_time, pair[1].start_time, "gap after segment {}", i + 1);
        }
        for (i, s) in segments.iter().enumerate() {
            assert_eq!(s.index, i + 1);
            assert!((s.duration - (s.end_time - s.start_time)).abs() < 1e-9);
        }
    }

    #[test]
    fn test_cut_lands_on_silence_midpoint() {
        let silences = [SilenceInterval::new(60.0, 61.0)];
        let segments = plan_segments(150.0, &silences, 20.0, 120.0).unwrap();

        assert_eq!(segments.len(), 2);
        assert_eq!((segments[0].start_time, segments[0].end_time), (0.0, 60.5));
        assert_eq!((segments[1].start_time, segments[1].end_time), (60.5, 150.0));
        assert_covers(&segments, 150.0);
    }

    #[test]
    fn test_no_silence_falls_back_to_fixed_windows() {
        let segments = plan_segments(150.0, &[], 20.0, 120.0).unwrap();

        let bounds: Vec<(f64, f64)> = segments.iter().map(|s| (s.start_time, s.end_time)).collect();
        assert_eq!(bounds, vec![(0.0, 60.0), (60.0, 120.0), (120.0, 150.0)]);
    }

    #[test]
    fn test_cut_at_target_when_no_pause_qualifies() {
        // Pause is too early (inside min_duration) to be used
        let silences = [SilenceInterval::new(5.0, 6.0)];
        let segments = plan_segments(300.0, &silences, 20.0, 100.0).unwrap();

        let ends: Vec<f64> = segments.iter().map(|s| s.end_time).collect();
        assert_eq!(ends, vec![100.0, 200.0, 300.0]);
    }

    #[test]
    fn test_picks_pause_closest_to_target() {
        let silences = [
            SilenceInterval::new(40.0, 42.0),  // 41
            SilenceInterval::new(95.0, 97.0),  // 96
            SilenceInterval::new(110.0, 114.0), // 112
        ];
        let segments = plan_segments(400.0, &silences, 20.0, 100.0).unwrap();

        assert_eq!(segments[0].end_time, 96.0);
    }

    #[test]
    fn test_pause_past_target_within_slack_is_used() {
        let silences = [SilenceInterval::new(120.0, 124.0)];
        let segments = plan_segments(400.0, &silences, 20.0, 100.0).unwrap();

        assert_eq!(segments[0].end_time, 122.0);
        assert!(segments[0].duration <= 100.0 + SILENCE_SEARCH_SLACK);
    }

    #[test]
    fn test_equidistant_pauses_resolve_to_earlier() {
        let silences = [
            SilenceInterval::new(89.0, 91.0),  // 90, 10 before target
            SilenceInterval::new(109.0, 111.0), // 110, 10 after target
        ];
        let segments = plan_segments(400.0, &silences, 20.0, 100.0).unwrap();

        assert_eq!(segments[0].end_time, 90.0);
    }

    #[test]
    fn test_tail_is_never_dropped() {
        let silences = [SilenceInterval::new(99.0, 101.0)];
        let segments = plan_segments(101.5, &silences, 20.0, 100.0).unwrap();

        assert_covers(&segments, 101.5);
        assert_eq!(segments.len(), 2);
        assert!((segments[1].duration - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_pause_beyond_end_is_ignored() {
        let silences = [SilenceInterval::new(118.0, 128.0)];
        let segments = plan_segments(121.0, &silences, 20.0, 100.0).unwrap();

        assert_covers(&segments, 121.0);
        assert_eq!(segments[0].end_time, 100.0);
    }

    #[test]
    fn test_durations_stay_within_bounds() {
        let silences: Vec<SilenceInterval> = (0..60)
            .map(|i| {
                let t = i as f64 * 37.3 + 3.1;
                SilenceInterval::new(t, t + 0.8)
            })
            .collect();
        let total = 2000.0;
        let (min, max) = (25.0, 90.0);
        let segments = plan_segments(total, &silences, min, max).unwrap();

        assert_covers(&segments, total);
        for s in &segments[..segments.len() - 1] {
            assert!(s.duration > min, "segment {} too short: {}", s.index, s.duration);
            assert!(s.duration < max + SILENCE_SEARCH_SLACK, "segment {} too long: {}", s.index, s.duration);
        }
    }

    #[test]
    fn test_plan_is_deterministic() {
        let silences = [
            SilenceInterval::new(33.0, 34.0),
            SilenceInterval::new(71.0, 75.0),
            SilenceInterval::new(140.0, 141.0),
        ];
        let a = plan_segments(200.0, &silences, 10.0, 60.0).unwrap();
        let b = plan_segments(200.0, &silences, 10.0, 60.0).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_unsorted_silences_are_handled() {
        let sorted = [SilenceInterval::new(30.0, 31.0), SilenceInterval::new(70.0, 71.0)];
        let reversed = [sorted[1], sorted[0]];
        assert_eq!(
            plan_segments(200.0, &sorted, 10.0, 60.0).unwrap(),
            plan_segments(200.0, &reversed, 10.0, 60.0).unwrap()
        );
    }

    #[test]
    fn test_empty_for_non_positive_duration() {
        assert!(plan_segments(0.0, &[], 20.0, 120.0).unwrap().is_empty());
        assert!(plan_segments(-3.0, &[], 20.0, 120.0).unwrap().is_empty());
    }

    #[test]
    fn test_rejects_invalid_bounds() {
        assert!(plan_segments(100.0, &[], 20.0, 0.0).is_err());
        assert!(plan_segments(100.0, &[], 50.0, 40.0).is_err());
    }

    #[test]
    fn test_parse_silence_log() {
        let log = "\
[silencedetect @ 0x7f] silence_start: 12.5
[silencedetect @ 0x7f] silence_end: 13.75 | silence_duration: 1.25
frame= 100 fps=0.0 q=-0.0 size=N/A
[silencedetect @ 0x7f] silence_start: 60
[silencedetect @ 0x7f] silence_end: 61 | silence_duration: 1
[silencedetect @ 0x7f] silence_start: 148.2
";
        let intervals = parse_silence_log(log, 150.0);

        assert_eq!(
            intervals,
            vec![
                SilenceInterval::new(12.5, 13.75),
                SilenceInterval::new(60.0, 61.0),
                SilenceInterval::new(148.2, 150.0),
            ]
        );
    }

    #[test]
    fn test_parse_silence_end_without_start_uses_duration() {
        let log = "[silencedetect @ 0x1] silence_end: 4.5 | silence_duration: 1.5\n";
        assert_eq!(parse_silence_log(log, 10.0), vec![SilenceInterval::new(3.0, 4.5)]);
    }
}
