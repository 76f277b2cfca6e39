use crate::alignment::highlight::{HighlightCursor, Highlighter, SeekResolution};
use crate::alignment::seeker::{extract_paragraphs, ParagraphSeeker, SeekAttempt};
use crate::alignment::tokenization::TokenizedDocument;
use crate::alignment::transcript::Transcript;
use crate::config::ReadAlongConfig;
use crate::pipeline::traits::{PlaybackClock, RenderSurface, Tokenizer, WordFollower};
use crate::types::{Paragraph, PlaybackState, SeekOutcome, TextToken};

/// Stale refs counted before the scan stops and rehydration starts.
const STALE_SCAN_LIMIT: usize = 5;

/// One document/audio pairing: owns the cursor, the render surface and the clock.
pub struct ReadAlongSession {
    config: ReadAlongConfig,
    document: TokenizedDocument,
    transcript: Transcript,
    tokenizer: Box<dyn Tokenizer>,
    highlighter: Highlighter,
    seeker: ParagraphSeeker,
    clock: Box<dyn PlaybackClock>,
    surface: Box<dyn RenderSurface>,
    follower: Option<Box<dyn WordFollower>>,
    state: PlaybackState,
    current: Option<usize>,
    painted_all: bool,
    destroyed: bool,
}

pub(crate) struct ReadAlongSessionParts {
    pub config: ReadAlongConfig,
    pub document: TokenizedDocument,
    pub transcript: Transcript,
    pub tokenizer: Box<dyn Tokenizer>,
    pub highlighter: Highlighter,
    pub seeker: ParagraphSeeker,
    pub clock: Box<dyn PlaybackClock>,
    pub surface: Box<dyn RenderSurface>,
    pub follower: Option<Box<dyn WordFollower>>,
}

impl ReadAlongSession {
    pub(crate) fn from_parts(parts: ReadAlongSessionParts) -> Self {
        Self {
            config: parts.config,
            document: parts.document,
            transcript: parts.transcript,
            tokenizer: parts.tokenizer,
            highlighter: parts.highlighter,
            seeker: parts.seeker,
            clock: parts.clock,
            surface: parts.surface,
            follower: parts.follower,
            state: PlaybackState::Idle,
            current: None,
            painted_all: false,
            destroyed: false,
        }
    }

    pub fn config(&self) -> &ReadAlongConfig {
        &self.config
    }

    pub fn document(&self) -> &TokenizedDocument {
        &self.document
    }

    pub fn tokens(&self) -> &[TextToken] {
        &self.document.tokens
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn cursor(&self) -> &HighlightCursor {
        self.highlighter.cursor()
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_tracking(&self) -> bool {
        self.state == PlaybackState::Tracking
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Last token painted, the one an auto-scroll collaborator should follow.
    pub fn current_token(&self) -> Option<&TextToken> {
        self.current.and_then(|i| self.document.tokens.get(i))
    }

    pub fn current_time(&self) -> f64 {
        self.clock.current_time()
    }

    pub fn duration(&self) -> f64 {
        self.clock.duration()
    }

    pub fn attach_follower(&mut self, follower: Box<dyn WordFollower>) {
        self.follower = Some(follower);
    }

    pub fn detach_follower(&mut self) -> Option<Box<dyn WordFollower>> {
        self.follower.take()
    }

    pub fn on_play(&mut self) {
        if self.destroyed {
            tracing::warn!("session: play ignored after destroy");
            return;
        }
        if !self.config.word_highlighting {
            if !self.painted_all {
                let all: Vec<usize> = (0..self.document.len()).collect();
                self.apply_paint(&all);
                self.painted_all = true;
                tracing::info!(
                    tokens = all.len(),
                    "session: word highlighting disabled, painted whole document"
                );
            }
            self.state = PlaybackState::Tracking;
            return;
        }
        if self.state != PlaybackState::Tracking {
            tracing::info!(time = self.clock.current_time(), "session: tracking started");
        }
        self.state = PlaybackState::Tracking;
    }

    /// Stop tracking. Safe to call repeatedly.
    pub fn on_pause(&mut self) {
        if self.state == PlaybackState::Tracking {
            tracing::info!(time = self.clock.current_time(), "session: tracking paused");
            self.state = PlaybackState::Idle;
        }
    }

    /// The clock moved to `time`; reset the cursor before any later tick sees it.
    pub fn on_seek(&mut self, time: f64) -> Option<SeekResolution> {
        if self.destroyed || !self.config.word_highlighting {
            return None;
        }
        let resume = self.state == PlaybackState::Tracking;
        self.state = PlaybackState::Seeking;

        let previous: Vec<usize> = self.highlighter.cursor().highlighted_indices().collect();
        let resolution = self
            .highlighter
            .handle_seek(&self.document.tokens, &self.transcript, time);
        for index in previous {
            if !self.highlighter.cursor().is_highlighted(index) {
                self.paint_one(index, false);
            }
        }
        self.current = None;
        self.apply_paint(&resolution.painted);

        self.state = if resume {
            PlaybackState::Tracking
        } else {
            PlaybackState::Idle
        };
        Some(resolution)
    }

    pub fn on_end(&mut self) {
        if self.destroyed {
            return;
        }
        self.state = PlaybackState::Completed;
        if !self.config.word_highlighting {
            return;
        }
        let painted = self.highlighter.handle_audio_end(&self.document.tokens);
        self.apply_paint(&painted);
    }

    /// Read the clock and advance the cursor. Returns the newly highlighted tokens.
    pub fn tick(&mut self) -> Vec<usize> {
        if self.destroyed || !self.config.word_highlighting {
            return Vec::new();
        }
        self.rehydrate_if_stale();
        let time = self.clock.current_time();
        let duration = self.clock.duration();
        let painted = self
            .highlighter
            .tick(&self.document.tokens, &self.transcript, time, duration);
        self.apply_paint(&painted);
        painted
    }

    /// Tick only while tracking.
    pub fn poll(&mut self) -> Vec<usize> {
        if self.is_tracking() {
            self.tick()
        } else {
            Vec::new()
        }
    }

    /// Move the clock and resynchronize the cursor.
    pub fn seek_to(&mut self, time: f64) -> Option<SeekResolution> {
        if self.destroyed {
            return None;
        }
        let duration = self.clock.duration();
        let mut target = time.max(0.0);
        if duration.is_finite() && duration > 0.0 {
            target = target.min(duration);
        }
        self.clock.seek_to(target);
        self.on_seek(target)
    }

    pub fn seek_to_paragraph(&mut self, text: &str, min_probability: Option<f64>) -> SeekOutcome {
        let outcome = self.seeker.seek(
            &self.document.tokens,
            &self.transcript,
            text,
            min_probability,
        );
        if let Some(timestamp) = outcome.timestamp() {
            self.seek_to(timestamp);
        }
        outcome
    }

    pub fn seek_to_paragraphs<S: AsRef<str>>(
        &mut self,
        texts: &[S],
        min_probability: Option<f64>,
    ) -> Vec<SeekAttempt> {
        let attempts = self.seeker.seek_many(
            &self.document.tokens,
            &self.transcript,
            texts,
            min_probability,
        );
        if let Some(timestamp) = attempts.last().and_then(|a| a.outcome.timestamp()) {
            self.seek_to(timestamp);
        }
        attempts
    }

    pub fn paragraphs(&self) -> Vec<Paragraph> {
        extract_paragraphs(&self.document.tokens)
    }

    pub fn extract_paragraphs(&self) -> Vec<String> {
        self.paragraphs()
            .into_iter()
            .map(|p| p.text.trim().to_string())
            .collect()
    }

    pub fn seeker_mut(&mut self) -> &mut ParagraphSeeker {
        &mut self.seeker
    }

    /// Unpaint every token and forget the cursor.
    pub fn clear_highlights(&mut self) {
        let highlighted: Vec<usize> = self.highlighter.cursor().highlighted_indices().collect();
        for index in highlighted {
            self.paint_one(index, false);
        }
        if self.painted_all {
            for index in 0..self.document.len() {
                self.paint_one(index, false);
            }
            self.painted_all = false;
        }
        self.highlighter.reset();
        self.current = None;
    }

    /// Pause, clear and refuse further ticks. Idempotent.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.on_pause();
        self.clear_highlights();
        self.follower = None;
        self.state = PlaybackState::Idle;
        self.destroyed = true;
        tracing::info!("session: destroyed");
    }

    fn paint_one(&mut self, index: usize, highlighted: bool) {
        if let Some(token) = self.document.tokens.get(index) {
            if self.surface.is_live(&token.render_ref) {
                self.surface.paint(&token.render_ref, highlighted);
            } else {
                tracing::warn!(index, "session: skipped paint on stale render ref");
            }
        }
    }

    fn apply_paint(&mut self, painted: &[usize]) {
        for &index in painted {
            self.paint_one(index, true);
        }
        let Some(&last) = painted.last() else {
            return;
        };
        self.current = Some(last);
        let token = self.document.tokens.get(last);
        if let (Some(follower), Some(token)) = (self.follower.as_mut(), token) {
            follower.word_highlighted(token);
        }
    }

    fn rehydrate_if_stale(&mut self) {
        let mut stale = 0;
        for token in &self.document.tokens {
            if !self.surface.is_live(&token.render_ref) {
                stale += 1;
                if stale > STALE_SCAN_LIMIT {
                    break;
                }
            }
        }
        if stale == 0 {
            return;
        }

        let remapped = self
            .tokenizer
            .rehydrate(&mut self.document, self.surface.as_ref());
        let highlighted: Vec<usize> = self.highlighter.cursor().highlighted_indices().collect();
        for &index in &highlighted {
            self.paint_one(index, true);
        }
        tracing::warn!(
            stale,
            remapped,
            repainted = highlighted.len(),
            "session: rehydrated stale render refs"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::builder::ReadAlongBuilder;
    use crate::pipeline::defaults::{ManualClock, MemorySurface, RecordingFollower};
    use crate::types::{DocumentLeaf, TimedWord};

    fn words() -> Vec<TimedWord> {
        vec![
            TimedWord::new("the", 0.0, 0.2),
            TimedWord::new("quick", 0.2, 0.5),
            TimedWord::new("brown", 0.5, 0.55),
            TimedWord::new("fox", 0.8, 1.0),
        ]
    }

    fn session(config: ReadAlongConfig) -> (ReadAlongSession, ManualClock, MemorySurface) {
        let clock = ManualClock::new(5.0);
        let surface = MemorySurface::new();
        let session = ReadAlongBuilder::new(config)
            .with_document(vec![DocumentLeaf::new("the quick brown fox", 0)])
            .with_transcript_words(words())
            .build(Box::new(clock.clone()), Box::new(surface.clone()))
            .unwrap();
        (session, clock, surface)
    }

    #[test]
    fn poll_only_ticks_while_tracking() {
        let (mut s, clock, surface) = session(ReadAlongConfig::default());
        clock.set_time(0.85);
        assert!(s.poll().is_empty());
        s.on_play();
        assert_eq!(s.poll(), [0, 1, 2, 3]);
        assert_eq!(surface.painted_indices(), [0, 1, 2, 3]);
        assert_eq!(s.current_token().map(|t| t.index), Some(3));
    }

    #[test]
    fn seek_back_unpaints_tokens() {
        let (mut s, clock, surface) = session(ReadAlongConfig::default());
        s.on_play();
        clock.set_time(0.85);
        s.tick();
        s.seek_to(0.3);
        assert_eq!(clock.time(), 0.3);
        assert_eq!(surface.painted_indices(), [0, 1]);
        assert!(s.is_tracking());
    }

    #[test]
    fn follower_hears_last_token_of_each_batch() {
        let (mut s, clock, _) = session(ReadAlongConfig::default());
        let follower = RecordingFollower::new();
        s.attach_follower(Box::new(follower.clone()));
        s.on_play();
        clock.set_time(0.3);
        s.tick();
        clock.set_time(0.85);
        s.tick();
        assert_eq!(follower.seen(), [1, 3]);
    }

    #[test]
    fn rerender_is_rehydrated_before_tick() {
        let (mut s, clock, surface) = session(ReadAlongConfig::default());
        s.on_play();
        clock.set_time(0.3);
        s.tick();
        surface.rerender();
        assert_eq!(surface.painted_count(), 0);
        clock.set_time(0.85);
        s.tick();
        assert_eq!(surface.painted_indices(), [0, 1, 2, 3]);
        assert!(s
            .tokens()
            .iter()
            .all(|t| t.render_ref.generation == surface.generation()));
    }

    #[test]
    fn disabled_highlighting_paints_everything_once() {
        let config = ReadAlongConfig {
            word_highlighting: false,
            ..ReadAlongConfig::default()
        };
        let (mut s, clock, surface) = session(config);
        s.on_play();
        assert_eq!(surface.painted_count(), 4);
        let calls = surface.paint_calls();
        clock.set_time(0.85);
        assert!(s.tick().is_empty());
        s.on_pause();
        s.on_play();
        assert_eq!(surface.paint_calls(), calls);
        assert_eq!(s.cursor().highlighted_count(), 0);
    }

    #[test]
    fn destroy_is_idempotent_and_final() {
        let (mut s, clock, surface) = session(ReadAlongConfig::default());
        s.on_play();
        clock.set_time(0.85);
        s.tick();
        s.destroy();
        s.destroy();
        assert!(s.is_destroyed());
        assert_eq!(surface.painted_count(), 0);
        s.on_play();
        assert!(!s.is_tracking());
        assert!(s.tick().is_empty());
    }

    #[test]
    fn paragraph_seek_moves_clock_and_cursor() {
        let (mut s, clock, surface) = session(ReadAlongConfig::default());
        let outcome = s.seek_to_paragraph("brown fox", None);
        assert_eq!(outcome.timestamp(), Some(0.5));
        assert_eq!(clock.time(), 0.5);
        assert_eq!(surface.painted_indices(), [0, 1, 2]);
    }

    #[test]
    fn end_completes_and_paints_rest() {
        let (mut s, _, surface) = session(ReadAlongConfig::default());
        s.on_play();
        s.on_end();
        assert_eq!(s.state(), PlaybackState::Completed);
        assert_eq!(surface.painted_count(), 4);
        assert!(s.poll().is_empty());
    }
}
