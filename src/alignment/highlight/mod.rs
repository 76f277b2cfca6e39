use crate::alignment::matcher::Matcher;
use crate::alignment::transcript::Transcript;
use crate::config::{HighlightConfig, RejectPolicy};
use crate::types::TextToken;

mod cursor;

pub use cursor::HighlightCursor;

/// How a seek target was turned into a token index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekSource {
    /// The timed word whose interval contains the seek time.
    Containing(usize),
    /// The last timed word that started before the seek time.
    Preceding(usize),
    /// Linear reading-rate estimate from the seek time.
    TimeEstimate,
    Unresolved,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeekResolution {
    pub resolved_index: Option<usize>,
    pub source: SeekSource,
    pub painted: Vec<usize>,
}

/// Drives the highlight cursor from the playback clock.
///
/// Every operation returns the tokens it newly highlighted, in ascending
/// order, so the caller can paint them.
#[derive(Debug, Clone)]
pub struct Highlighter {
    config: HighlightConfig,
    matcher: Matcher,
    cursor: HighlightCursor,
}

impl Highlighter {
    pub fn new(config: HighlightConfig, matcher: Matcher, token_count: usize) -> Self {
        Self {
            config,
            matcher,
            cursor: HighlightCursor::new(token_count),
        }
    }

    pub fn cursor(&self) -> &HighlightCursor {
        &self.cursor
    }

    pub fn config(&self) -> &HighlightConfig {
        &self.config
    }

    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    pub fn reset(&mut self) {
        self.cursor.reset();
    }

    pub fn tick(
        &mut self,
        tokens: &[TextToken],
        transcript: &Transcript,
        time: f64,
        duration: f64,
    ) -> Vec<usize> {
        let mut painted = Vec::new();
        if !time.is_finite() || time < 0.0 {
            tracing::warn!(time, "highlight: ignoring invalid playback time");
            return painted;
        }
        if transcript.is_empty() || tokens.is_empty() {
            return painted;
        }

        self.handle_initial_words(tokens, transcript, time, &mut painted);
        self.process_due_words(tokens, transcript, time, &mut painted);
        self.catch_up(tokens, transcript, time, &mut painted);

        if duration.is_finite() && duration > 0.0 && time >= duration - self.config.end_guard_s {
            let before = painted.len();
            let last = self.cursor.last_highlighted_index();
            self.highlight_range(tokens, last, tokens.len(), &mut painted);
            if painted.len() > before {
                tracing::debug!(
                    time,
                    duration,
                    painted = painted.len() - before,
                    "highlight: painted final words at audio end"
                );
            }
        }
        painted
    }

    /// Reset the cursor and repaint `[0, resolved]` for the new playback position.
    pub fn handle_seek(
        &mut self,
        tokens: &[TextToken],
        transcript: &Transcript,
        time: f64,
    ) -> SeekResolution {
        self.cursor.reset();
        let time = if time.is_finite() { time.max(0.0) } else { 0.0 };

        let (resolved_index, source) = self.resolve_seek_target(tokens, transcript, time);
        let mut painted = Vec::new();
        if let Some(index) = resolved_index {
            self.highlight_range(tokens, 0, index, &mut painted);
        }

        // Timed words that started before the seek point are accounted for
        // by the resolution above.
        let started = transcript.started_count(time);
        for timed_index in 0..started {
            self.cursor.mark_processed(timed_index);
        }
        self.cursor.set_next_timing(started);
        if transcript
            .get(0)
            .is_some_and(|first| time >= first.start_time)
        {
            self.cursor.finish_initial_phase();
        }

        tracing::info!(
            time,
            resolved_index = ?resolved_index,
            source = ?source,
            highlighted = painted.len(),
            "highlight: seek resolved"
        );

        SeekResolution {
            resolved_index,
            source,
            painted,
        }
    }

    /// Paint every token not yet highlighted, skip tokens included.
    pub fn handle_audio_end(&mut self, tokens: &[TextToken]) -> Vec<usize> {
        let painted: Vec<usize> = (0..tokens.len()).filter(|&i| self.cursor.mark(i)).collect();
        self.cursor.advance_last_to(tokens.len());
        tracing::info!(
            painted = painted.len(),
            total = tokens.len(),
            "highlight: audio ended, remaining words painted"
        );
        painted
    }

    fn handle_initial_words(
        &mut self,
        tokens: &[TextToken],
        transcript: &Transcript,
        time: f64,
        painted: &mut Vec<usize>,
    ) {
        if self.cursor.is_initial_phase_done() {
            return;
        }
        let Some(first) = transcript.get(0) else {
            return;
        };

        let lookahead_time = first.start_time - self.config.lookahead_s();
        if time >= lookahead_time.max(0.0) && time < first.start_time {
            let estimate = ((time * self.config.words_per_second).floor() as usize).max(1);
            self.highlight_range(tokens, 0, estimate - 1, painted);
            tracing::debug!(
                time,
                estimate,
                "highlight: painted words spoken before the first timed word"
            );
        }
        if time >= first.start_time {
            self.cursor.finish_initial_phase();
        }
    }

    fn process_due_words(
        &mut self,
        tokens: &[TextToken],
        transcript: &Transcript,
        time: f64,
        painted: &mut Vec<usize>,
    ) {
        let lookahead = self.config.lookahead_s();
        while let Some(word) = transcript.get(self.cursor.next_timing_to_consider()) {
            if word.start_time - lookahead > time {
                break;
            }
            let timed_index = self.cursor.next_timing_to_consider();
            self.process_timing(tokens, transcript, timed_index, painted);
            self.cursor.set_next_timing(timed_index + 1);
        }
    }

    fn process_timing(
        &mut self,
        tokens: &[TextToken],
        transcript: &Transcript,
        timed_index: usize,
        painted: &mut Vec<usize>,
    ) {
        if !self.cursor.mark_processed(timed_index) {
            return;
        }
        let center = self.cursor.last_highlighted_index();
        let best = self
            .matcher
            .match_timed_word(tokens, transcript, timed_index, center);

        let Some(index) = best.token_index else {
            self.recover_rejected(tokens, transcript, timed_index, painted);
            return;
        };
        if index < center {
            tracing::debug!(
                timed_index,
                token_index = index,
                last_highlighted = center,
                "highlight: match behind the cursor, not advancing"
            );
            return;
        }

        tracing::debug!(
            timed_index,
            word = transcript.normalized(timed_index),
            token_index = index,
            probability = format!("{:.3}", best.probability),
            word_score = best.word_score,
            context_score = format!("{:.3}", best.context_score),
            "highlight: accepted match"
        );
        self.highlight_range(tokens, center, index, painted);

        if timed_index + 1 < transcript.len() {
            self.fill_between_anchors(tokens, transcript, timed_index, index, painted);
        }
    }

    /// Look one timed word ahead; when it anchors further along, paint the
    /// tokens in between.
    fn fill_between_anchors(
        &mut self,
        tokens: &[TextToken],
        transcript: &Transcript,
        timed_index: usize,
        index: usize,
        painted: &mut Vec<usize>,
    ) {
        let next = self.matcher.match_timed_word(
            tokens,
            transcript,
            timed_index + 1,
            self.cursor.last_highlighted_index(),
        );
        let Some(next_index) = next.token_index else {
            return;
        };
        if next_index <= index + 1 {
            return;
        }
        let (Some(current), Some(following)) =
            (transcript.get(timed_index), transcript.get(timed_index + 1))
        else {
            return;
        };

        let silence = following.start_time - current.end_time;
        if silence > self.config.silence_gap_s {
            let estimated = ((silence * self.config.gap_words_per_second).ceil() as usize).max(1);
            let between = next_index - index - 1;
            let count = estimated.min(between);
            self.highlight_range(tokens, index + 1, index + count, painted);
            tracing::debug!(
                silence = format!("{silence:.3}"),
                estimated,
                between,
                "highlight: estimated words in silence gap"
            );
        } else {
            self.highlight_range(tokens, index + 1, next_index - 1, painted);
        }
    }

    fn recover_rejected(
        &mut self,
        tokens: &[TextToken],
        transcript: &Transcript,
        timed_index: usize,
        painted: &mut Vec<usize>,
    ) {
        if self.config.reject_policy == RejectPolicy::ForwardExactSearch {
            let from = self.cursor.last_highlighted_index();
            if let Some(index) = self.matcher.forward_exact_search(
                tokens,
                transcript.normalized(timed_index),
                from,
                self.config.forward_search_min,
            ) {
                tracing::debug!(
                    timed_index,
                    token_index = index,
                    "highlight: recovered by forward exact search"
                );
                self.highlight_range(tokens, from, index, painted);
                return;
            }
        }
        tracing::debug!(
            timed_index,
            word = transcript.normalized(timed_index),
            "highlight: skipping low-confidence match"
        );
    }

    /// Re-match the latest due timed word and close any lag up to it.
    fn catch_up(
        &mut self,
        tokens: &[TextToken],
        transcript: &Transcript,
        time: f64,
        painted: &mut Vec<usize>,
    ) {
        let lookahead = self.config.lookahead_s();
        let due = transcript
            .words()
            .partition_point(|w| w.start_time - lookahead <= time);
        let Some(latest) = due.checked_sub(1) else {
            return;
        };
        if self.cursor.last_catch_up() == Some(latest) {
            return;
        }
        self.cursor.set_last_catch_up(latest);

        let last = self.cursor.last_highlighted_index();
        let expected = self.matcher.match_timed_word(tokens, transcript, latest, last);
        if let Some(index) = expected.token_index.filter(|&i| i >= last) {
            let before = painted.len();
            self.highlight_range(tokens, last, index, painted);
            tracing::debug!(
                timed_index = latest,
                token_index = index,
                painted = painted.len() - before,
                "highlight: caught up to current time"
            );
        }
    }

    fn resolve_seek_target(
        &self,
        tokens: &[TextToken],
        transcript: &Transcript,
        time: f64,
    ) -> (Option<usize>, SeekSource) {
        if tokens.is_empty() {
            return (None, SeekSource::Unresolved);
        }

        if let Some(timed_index) = transcript.containing(time) {
            if let Some(index) = self.seek_match(tokens, transcript, timed_index) {
                return (Some(index), SeekSource::Containing(timed_index));
            }
        }
        if let Some(timed_index) = transcript.last_started(time) {
            if let Some(index) = self.seek_match(tokens, transcript, timed_index) {
                return (Some(index), SeekSource::Preceding(timed_index));
            }
        }

        if time > 0.0 {
            let estimate = (time * self.config.words_per_second).floor() as usize;
            return (Some(estimate.min(tokens.len() - 1)), SeekSource::TimeEstimate);
        }
        (None, SeekSource::Unresolved)
    }

    /// Match a timed word after a seek, centering the search on the token
    /// proportionally as far into the document as the word is into the transcript.
    fn seek_match(
        &self,
        tokens: &[TextToken],
        transcript: &Transcript,
        timed_index: usize,
    ) -> Option<usize> {
        let center = timed_index * tokens.len() / transcript.len().max(1);
        let best = self
            .matcher
            .match_timed_word(tokens, transcript, timed_index, center);
        if best.token_index.is_some() {
            return best.token_index;
        }
        // Untimed stretches (prefaces, headings) skew the proportional center.
        let index = self
            .matcher
            .best_exact_match(tokens, transcript, timed_index)?;
        tracing::debug!(
            timed_index,
            token_index = index,
            center,
            "highlight: seek matched outside the proportional window"
        );
        Some(index)
    }

    /// Paint `[max(start, last), end]`, clipped to the document, and move
    /// `last` past `end`.
    fn highlight_range(
        &mut self,
        tokens: &[TextToken],
        start: usize,
        end: usize,
        painted: &mut Vec<usize>,
    ) {
        let Some(max_index) = tokens.len().checked_sub(1) else {
            return;
        };
        let end = end.min(max_index);
        let from = start.max(self.cursor.last_highlighted_index());
        if from > end {
            return;
        }
        for index in from..=end {
            if self.cursor.mark(index) {
                painted.push(index);
            }
        }
        self.cursor.advance_last_to(end + 1);
    }
}
