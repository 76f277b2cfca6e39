use std::path::Path;

use serde_json::Value;

use crate::alignment::highlight::Highlighter;
use crate::alignment::matcher::Matcher;
use crate::alignment::seeker::ParagraphSeeker;
use crate::alignment::transcript::Transcript;
use crate::config::ReadAlongConfig;
use crate::error::ReadAlongError;
use crate::pipeline::defaults::WhitespaceTokenizer;
use crate::pipeline::session::{ReadAlongSession, ReadAlongSessionParts};
use crate::pipeline::traits::{PlaybackClock, RenderSurface, Tokenizer, WordFollower};
use crate::types::{DocumentLeaf, TimedWord};

enum TranscriptSource {
    Words(Vec<TimedWord>),
    Value(Value),
    Json(String),
    File(std::path::PathBuf),
}

/// One-time setup of a document/audio pairing. Tokenization and transcript
/// loading both happen in `build`, never during ticking.
pub struct ReadAlongBuilder {
    config: ReadAlongConfig,
    tokenizer: Option<Box<dyn Tokenizer>>,
    follower: Option<Box<dyn WordFollower>>,
    leaves: Vec<DocumentLeaf>,
    transcript: Option<TranscriptSource>,
}

impl ReadAlongBuilder {
    pub fn new(config: ReadAlongConfig) -> Self {
        Self {
            config,
            tokenizer: None,
            follower: None,
            leaves: Vec::new(),
            transcript: None,
        }
    }

    pub fn with_tokenizer(mut self, tokenizer: Box<dyn Tokenizer>) -> Self {
        self.tokenizer = Some(tokenizer);
        self
    }

    pub fn with_follower(mut self, follower: Box<dyn WordFollower>) -> Self {
        self.follower = Some(follower);
        self
    }

    pub fn with_document(mut self, leaves: Vec<DocumentLeaf>) -> Self {
        self.leaves = leaves;
        self
    }

    /// Already-parsed words; the configured offset still applies.
    pub fn with_transcript_words(mut self, words: Vec<TimedWord>) -> Self {
        self.transcript = Some(TranscriptSource::Words(words));
        self
    }

    pub fn with_transcript_value(mut self, raw: Value) -> Self {
        self.transcript = Some(TranscriptSource::Value(raw));
        self
    }

    pub fn with_transcript_json(mut self, data: impl Into<String>) -> Self {
        self.transcript = Some(TranscriptSource::Json(data.into()));
        self
    }

    pub fn with_transcript_file(mut self, path: impl AsRef<Path>) -> Self {
        self.transcript = Some(TranscriptSource::File(path.as_ref().to_path_buf()));
        self
    }

    pub fn build(
        self,
        clock: Box<dyn PlaybackClock>,
        surface: Box<dyn RenderSurface>,
    ) -> Result<ReadAlongSession, ReadAlongError> {
        self.config.validate()?;
        let offset_ms = self.config.transcript_offset_ms;

        let transcript = match self.transcript {
            None => Transcript::empty(),
            Some(TranscriptSource::Words(words)) => Transcript::from_words(words, offset_ms),
            Some(TranscriptSource::Value(raw)) => Transcript::from_value(&raw, offset_ms),
            Some(TranscriptSource::Json(data)) => Transcript::from_json_str(&data, offset_ms)?,
            Some(TranscriptSource::File(path)) => Transcript::load(&path, offset_ms)?,
        };

        let tokenizer = self
            .tokenizer
            .unwrap_or_else(|| Box::new(WhitespaceTokenizer));
        let document = tokenizer.tokenize(&self.leaves, surface.generation());
        if document.is_empty() {
            tracing::warn!("session: document has no tokens");
        }
        if transcript.is_empty() {
            tracing::warn!("session: transcript has no timed words, highlighting only at end");
        }

        let highlighter = Highlighter::new(
            self.config.highlight.clone(),
            Matcher::new(self.config.matcher.clone()),
            document.len(),
        );
        let seeker = ParagraphSeeker::new(self.config.seeker.clone());

        tracing::info!(
            tokens = document.len(),
            words = document.word_count(),
            timed_words = transcript.len(),
            word_highlighting = self.config.word_highlighting,
            "session: built"
        );

        Ok(ReadAlongSession::from_parts(ReadAlongSessionParts {
            config: self.config,
            document,
            transcript,
            tokenizer,
            highlighter,
            seeker,
            clock,
            surface,
            follower: self.follower,
        }))
    }
}
