//! Groups aligned words into a contiguous scene timeline
//!
//! The builder walks the words once in start order and decides, for every
//! gap between consecutive words, whether to keep singing the current line,
//! break to a new line, or insert an instrumental bridge. The resulting
//! segments always tile `[0, audio_duration]` exactly.

use super::{Result, Segment, SegmentKind, Timeline, TimelineError, TimestampedWord};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Segmentation thresholds, in seconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentThresholds {
    /// Leading silence longer than this becomes an intro scene
    pub intro_gap: f64,
    /// Gap that ends a line
    pub line_gap: f64,
    /// Longest span a single line may cover
    pub max_line_duration: f64,
    /// Gap that becomes an instrumental bridge
    pub bridge_gap: f64,
    /// Trailing music longer than this becomes an outro scene
    pub outro_gap: f64,
    /// Padding past the last word when the audio duration is unknown
    pub fallback_padding: f64,
    /// Tolerance for boundary comparisons
    pub tiling_epsilon: f64,
}

impl Default for SegmentThresholds {
    fn default() -> Self {
        Self {
            intro_gap: 2.0,
            line_gap: 0.5,
            max_line_duration: 5.0,
            bridge_gap: 2.0,
            outro_gap: 2.0,
            fallback_padding: 5.0,
            tiling_epsilon: 0.0,
        }
    }
}

impl SegmentThresholds {
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("intro_gap", self.intro_gap),
            ("line_gap", self.line_gap),
            ("max_line_duration", self.max_line_duration),
            ("bridge_gap", self.bridge_gap),
            ("outro_gap", self.outro_gap),
            ("fallback_padding", self.fallback_padding),
            ("tiling_epsilon", self.tiling_epsilon),
        ];
        for (name, value) in fields {
            if !value.is_finite() || value < 0.0 {
                return Err(TimelineError::InvalidThresholds(format!(
                    "{name} must be a finite, non-negative number of seconds (got {value})"
                )));
            }
        }
        if self.max_line_duration <= 0.0 {
            return Err(TimelineError::InvalidThresholds(
                "max_line_duration must be positive".into(),
            ));
        }
        if self.fallback_padding <= 0.0 {
            return Err(TimelineError::InvalidThresholds(
                "fallback_padding must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Builds a [`Timeline`] from a word stream
#[derive(Debug, Clone)]
pub struct SegmentBuilder {
    thresholds: SegmentThresholds,
}

impl SegmentBuilder {
    pub fn new(thresholds: SegmentThresholds) -> Result<Self> {
        thresholds.validate()?;
        Ok(Self { thresholds })
    }

    #[must_use]
    pub fn thresholds(&self) -> &SegmentThresholds {
        &self.thresholds
    }

    /// Partition the song into scenes.
    ///
    /// `audio_duration` of `None` (or a non-positive value) pads the timeline
    /// past the last word by `fallback_padding`. Words may arrive unsorted; they
    /// are ordered by start time, keeping the input order for ties.
    pub fn build(
        &self,
        words: &[TimestampedWord],
        audio_duration: Option<f64>,
    ) -> Result<Timeline> {
        for (index, word) in words.iter().enumerate() {
            word.check(index)?;
        }

        let audio_duration = audio_duration.filter(|d| d.is_finite() && *d > 0.0);

        let mut sorted = words.to_vec();
        sorted.sort_by(|a, b| a.start.total_cmp(&b.start));

        let mut segments = match sorted.split_first() {
            Some((first, rest)) => self.group_lines(first, rest),
            None => {
                let duration = audio_duration.ok_or(TimelineError::EmptyInput)?;
                vec![Segment::instrumental(SegmentKind::Intro, 0.0, duration)]
            }
        };

        let last_end = segments.last().map_or(0.0, |s| s.end);
        let end = audio_duration.unwrap_or(last_end + self.thresholds.fallback_padding);
        self.close_out(&mut segments, end);

        let mut segments = merge_degenerate(segments);
        for segment in &mut segments {
            segment.refresh_text();
        }

        let timeline =
            Timeline::from_segments(segments, Some(end), self.thresholds.tiling_epsilon)?;

        debug!(
            words = words.len(),
            segments = timeline.len(),
            duration = end,
            "Built timeline"
        );

        Ok(timeline)
    }

    fn group_lines(&self, first: &TimestampedWord, rest: &[TimestampedWord]) -> Vec<Segment> {
        let t = &self.thresholds;
        let mut segments = Vec::new();

        if first.start > t.intro_gap {
            segments.push(Segment::instrumental(SegmentKind::Intro, 0.0, first.start));
        }

        let mut current = Segment::line(first.clone());

        for word in rest {
            let gap = word.start - current.end;
            let span = word.end - current.start;

            if gap > t.line_gap || span > t.max_line_duration {
                let next = Segment::line(word.clone());
                if gap > t.bridge_gap {
                    let bridge = Segment::instrumental(SegmentKind::Bridge, current.end, word.start);
                    segments.push(std::mem::replace(&mut current, next));
                    segments.push(bridge);
                } else {
                    // Hold the line on screen until the next one starts
                    current.end = word.start;
                    segments.push(std::mem::replace(&mut current, next));
                }
            } else {
                current.end = current.end.max(word.end);
                current.words.push(word.clone());
            }
        }
        segments.push(current);

        // Short lead-in silence belongs to the first line
        if let Some(head) = segments.first_mut() {
            head.start = 0.0;
        }

        segments
    }

    fn close_out(&self, segments: &mut Vec<Segment>, end: f64) {
        let last_end = segments.last().map_or(0.0, |s| s.end);

        if end - last_end > self.thresholds.outro_gap {
            segments.push(Segment::instrumental(SegmentKind::Outro, last_end, end));
            return;
        }

        if end < last_end {
            let before = segments.len();
            segments.retain(|s| s.start < end);
            debug!(
                dropped = before - segments.len(),
                audio_end = end,
                "Clamped segments that run past the end of the audio"
            );
        }

        if let Some(last) = segments.last_mut() {
            last.end = end;
        }
    }
}

/// Fold zero-length segments into their successor (or predecessor at the end)
fn merge_degenerate(segments: Vec<Segment>) -> Vec<Segment> {
    let mut merged: Vec<Segment> = Vec::with_capacity(segments.len());
    let mut carry: Option<Segment> = None;

    for mut segment in segments {
        if let Some(held) = carry.take() {
            segment.start = held.start;
            absorb_words(&mut merged, &mut segment, held.words);
        }
        if segment.end > segment.start {
            merged.push(segment);
        } else {
            carry = Some(segment);
        }
    }

    if let Some(held) = carry {
        if let Some(prev) = merged.last_mut() {
            prev.end = held.end;
            if prev.kind.is_lyrics() {
                prev.words.extend(held.words);
            }
        }
    }

    merged
}

fn absorb_words(merged: &mut [Segment], segment: &mut Segment, mut words: Vec<TimestampedWord>) {
    if words.is_empty() {
        return;
    }
    if segment.kind.is_lyrics() {
        words.append(&mut segment.words);
        segment.words = words;
    } else if let Some(prev) = merged.last_mut().filter(|p| p.kind.is_lyrics()) {
        prev.words.extend(words);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(text: &str, start: f64, end: f64) -> TimestampedWord {
        TimestampedWord::new(text, start, end)
    }

    fn builder() -> SegmentBuilder {
        SegmentBuilder::new(SegmentThresholds::default()).unwrap()
    }

    fn kinds(timeline: &Timeline) -> Vec<SegmentKind> {
        timeline.iter().map(|s| s.kind).collect()
    }

    #[test]
    fn test_intro_emitted_for_long_lead_in() {
        let words = vec![word("hello", 3.0, 3.5), word("there", 3.6, 4.0)];
        let timeline = builder().build(&words, Some(6.0)).unwrap();

        let intro = &timeline.segments()[0];
        assert_eq!(intro.kind, SegmentKind::Intro);
        assert_eq!(intro.start, 0.0);
        assert_eq!(intro.end, 3.0);
        assert_eq!(intro.text, "(Intro Music)");
        assert_eq!(timeline.segments()[1].start, 3.0);
    }

    #[test]
    fn test_short_lead_in_joins_first_line() {
        let words = vec![word("hi", 1.5, 2.0)];
        let timeline = builder().build(&words, Some(3.0)).unwrap();

        assert_eq!(kinds(&timeline), vec![SegmentKind::Lyrics]);
        assert_eq!(timeline.segments()[0].start, 0.0);
        assert_eq!(timeline.segments()[0].end, 3.0);
    }

    #[test]
    fn test_bridge_spans_gap_exactly() {
        let words = vec![word("one", 0.0, 1.0), word("two", 4.0, 4.5)];
        let timeline = builder().build(&words, Some(5.0)).unwrap();

        assert_eq!(
            kinds(&timeline),
            vec![SegmentKind::Lyrics, SegmentKind::Bridge, SegmentKind::Lyrics]
        );
        let bridge = &timeline.segments()[1];
        assert_eq!(bridge.start, 1.0);
        assert_eq!(bridge.end, 4.0);
        assert_eq!(bridge.text, "(Instrumental)");
        assert!(bridge.words.is_empty());

        // No lyrics segment crosses the gap
        for seg in timeline.iter().filter(|s| s.kind.is_lyrics()) {
            assert!(seg.end <= 1.0 || seg.start >= 4.0);
        }
    }

    #[test]
    fn test_last_line_stretched_to_audio_end() {
        let words = vec![word("first", 0.5, 1.0), word("last", 9.0, 9.5)];
        let timeline = builder().build(&words, Some(10.0)).unwrap();

        let last = timeline.segments().last().unwrap();
        assert_eq!(last.kind, SegmentKind::Lyrics);
        assert_eq!(last.end, 10.0);
        assert!(!kinds(&timeline).contains(&SegmentKind::Outro));
    }

    #[test]
    fn test_outro_for_long_tail() {
        let words = vec![word("done", 0.0, 5.0)];
        let timeline = builder().build(&words, Some(10.0)).unwrap();

        assert_eq!(kinds(&timeline), vec![SegmentKind::Lyrics, SegmentKind::Outro]);
        let outro = &timeline.segments()[1];
        assert_eq!(outro.start, 5.0);
        assert_eq!(outro.end, 10.0);
        assert_eq!(outro.text, "(Outro Music)");
    }

    #[test]
    fn test_line_break_extends_to_next_word() {
        let words = vec![word("a", 0.0, 0.4), word("b", 1.0, 1.4)];
        let timeline = builder().build(&words, Some(1.4)).unwrap();

        assert_eq!(timeline.len(), 2);
        assert_eq!(timeline.segments()[0].end, 1.0);
        assert_eq!(timeline.segments()[1].start, 1.0);
        assert_eq!(timeline.segments()[0].text, "a");
        assert_eq!(timeline.segments()[1].text, "b");
    }

    #[test]
    fn test_span_forces_break_without_gap() {
        let words: Vec<_> = (0..14)
            .map(|i| word("la", f64::from(i) * 0.5, f64::from(i + 1) * 0.5))
            .collect();
        let timeline = builder().build(&words, Some(7.0)).unwrap();

        assert_eq!(kinds(&timeline), vec![SegmentKind::Lyrics, SegmentKind::Lyrics]);
        assert_eq!(timeline.segments()[0].end, 5.0);
        assert_eq!(timeline.segments()[0].words.len(), 10);
        assert_eq!(timeline.segments()[1].words.len(), 4);
    }

    #[test]
    fn test_words_joined_into_text() {
        let words = vec![
            word("hello", 3.0, 3.5),
            word("world", 3.6, 4.2),
        ];
        let timeline = builder().build(&words, Some(5.0)).unwrap();
        assert_eq!(timeline.segments()[1].text, "hello world");
    }

    #[test]
    fn test_empty_words_with_duration() {
        let timeline = builder().build(&[], Some(12.0)).unwrap();
        assert_eq!(kinds(&timeline), vec![SegmentKind::Intro]);
        assert_eq!(timeline.total_duration(), 12.0);
    }

    #[test]
    fn test_empty_words_without_duration() {
        assert!(matches!(
            builder().build(&[], None),
            Err(TimelineError::EmptyInput)
        ));
        assert!(matches!(
            builder().build(&[], Some(0.0)),
            Err(TimelineError::EmptyInput)
        ));
    }

    #[test]
    fn test_unknown_duration_pads_past_last_word() {
        let words = vec![word("x", 0.0, 4.0)];
        let timeline = builder().build(&words, None).unwrap();

        assert_eq!(timeline.total_duration(), 9.0);
        assert_eq!(kinds(&timeline), vec![SegmentKind::Lyrics, SegmentKind::Outro]);
        assert_eq!(timeline.segments()[1].start, 4.0);
    }

    #[test]
    fn test_unsorted_words_are_ordered() {
        let words = vec![word("two", 0.6, 1.0), word("one", 0.0, 0.5)];
        let timeline = builder().build(&words, Some(1.0)).unwrap();
        assert_eq!(timeline.segments()[0].text, "one two");
    }

    #[test]
    fn test_zero_length_segment_merged_forward() {
        // The break lands exactly on the open line's start
        let words = vec![word("short", 0.0, 0.2), word("long", 0.0, 5.5)];
        let timeline = builder().build(&words, Some(6.0)).unwrap();

        assert_eq!(timeline.len(), 1);
        let seg = &timeline.segments()[0];
        assert_eq!(seg.start, 0.0);
        assert_eq!(seg.end, 6.0);
        assert_eq!(seg.text, "short long");
    }

    #[test]
    fn test_words_past_audio_end_are_clamped() {
        let words = vec![word("one", 0.0, 1.0), word("two", 5.0, 6.0)];
        let timeline = builder().build(&words, Some(4.0)).unwrap();

        assert_eq!(kinds(&timeline), vec![SegmentKind::Lyrics, SegmentKind::Bridge]);
        assert_eq!(timeline.total_duration(), 4.0);
    }

    #[test]
    fn test_malformed_word_reports_index() {
        let words = vec![word("ok", 0.0, 0.5), word("bad", 2.0, 1.0)];
        match builder().build(&words, Some(3.0)) {
            Err(TimelineError::MalformedWord { index, .. }) => assert_eq!(index, 1),
            other => panic!("expected MalformedWord, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_thresholds_rejected() {
        let thresholds = SegmentThresholds {
            line_gap: -1.0,
            ..SegmentThresholds::default()
        };
        assert!(matches!(
            SegmentBuilder::new(thresholds),
            Err(TimelineError::InvalidThresholds(_))
        ));

        let thresholds = SegmentThresholds {
            max_line_duration: 0.0,
            ..SegmentThresholds::default()
        };
        assert!(SegmentBuilder::new(thresholds).is_err());
    }

    /// Linear congruential generator for reproducible word streams
    struct Lcg(u64);

    impl Lcg {
        fn next_f64(&mut self) -> f64 {
            self.0 = self
                .0
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            (self.0 >> 11) as f64 / (1u64 << 53) as f64
        }
    }

    #[test]
    fn test_tiling_holds_across_thresholds_and_inputs() {
        let configs = [
            SegmentThresholds::default(),
            SegmentThresholds {
                line_gap: 0.1,
                max_line_duration: 1.0,
                bridge_gap: 0.5,
                ..SegmentThresholds::default()
            },
            SegmentThresholds {
                intro_gap: 0.0,
                outro_gap: 0.0,
                line_gap: 3.0,
                bridge_gap: 1.0,
                max_line_duration: 20.0,
                ..SegmentThresholds::default()
            },
        ];

        let mut rng = Lcg(42);
        for thresholds in configs {
            let builder = SegmentBuilder::new(thresholds).unwrap();
            for _ in 0..50 {
                let mut t = rng.next_f64() * 4.0;
                let count = 1 + (rng.next_f64() * 40.0) as usize;
                let mut words = Vec::with_capacity(count);
                for _ in 0..count {
                    // Occasional overlaps and ties
                    let start = (t - rng.next_f64() * 0.3).max(0.0);
                    let end = start + rng.next_f64() * 0.8;
                    words.push(word("w", start, end));
                    t = end + rng.next_f64().powi(3) * 6.0;
                }
                let last_end = words.iter().map(|w| w.end).fold(0.0, f64::max);
                let duration = if rng.next_f64() < 0.2 {
                    None
                } else {
                    Some(last_end * (0.8 + rng.next_f64() * 0.6) + 0.01)
                };

                let timeline = builder.build(&words, duration).unwrap();
                let segs = timeline.segments();
                assert_eq!(segs[0].start, 0.0);
                for pair in segs.windows(2) {
                    assert_eq!(pair[0].end, pair[1].start);
                }
                for seg in segs {
                    assert!(seg.end > seg.start, "degenerate segment {seg:?}");
                    if !seg.kind.is_lyrics() {
                        assert!(seg.words.is_empty());
                    }
                }
                if let Some(d) = duration {
                    assert_eq!(timeline.total_duration(), d);
                }
            }
        }
    }
}
