use std::fmt;

use serde::{Deserialize, Serialize};

/// One text-bearing leaf of the rendered document, in document order.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentLeaf {
    pub text: String,
    /// Identifier of the block-level host (paragraph, heading, list item) the leaf sits in.
    pub block: usize,
}

impl DocumentLeaf {
    pub fn new(text: impl Into<String>, block: usize) -> Self {
        Self {
            text: text.into(),
            block,
        }
    }
}

/// Weak, revalidatable handle to a token's rendered element.
///
/// A ref stays valid only for the render generation it was resolved in;
/// after an external re-render it must be resolved again by `ordinal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderRef {
    pub ordinal: usize,
    pub generation: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextToken {
    pub index: usize,
    /// `None` for runs that normalize to nothing (pure punctuation).
    pub normalized_word: Option<String>,
    pub raw_text: String,
    pub block: usize,
    pub render_ref: RenderRef,
}

impl TextToken {
    pub fn is_skip(&self) -> bool {
        self.normalized_word.is_none()
    }

    pub fn word(&self) -> Option<&str> {
        self.normalized_word.as_deref()
    }
}

/// One transcript entry. Times are seconds, `start_time <= end_time`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedWord {
    pub word: String,
    #[serde(rename = "time_start")]
    pub start_time: f64,
    #[serde(rename = "time_end")]
    pub end_time: f64,
}

impl TimedWord {
    pub fn new(word: impl Into<String>, start_time: f64, end_time: f64) -> Self {
        Self {
            word: word.into(),
            start_time,
            end_time,
        }
    }

    pub fn contains(&self, time: f64) -> bool {
        time >= self.start_time && time <= self.end_time
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchResult {
    pub token_index: Option<usize>,
    /// In [0, 1].
    pub probability: f64,
    /// Either 0 or 1.
    pub word_score: f64,
    /// In [0, 1].
    pub context_score: f64,
}

impl MatchResult {
    pub const NONE: Self = Self {
        token_index: None,
        probability: 0.0,
        word_score: 0.0,
        context_score: 0.0,
    };

    pub fn is_accepted(&self) -> bool {
        self.token_index.is_some()
    }
}

/// Best-scoring token window found for a paragraph query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WindowMatch {
    pub start: usize,
    /// Inclusive.
    pub end: usize,
    pub probability: f64,
    pub direct: f64,
    pub context: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SeekFailure {
    NoValidWords,
    NoTokens,
    LowProbability { best: Option<WindowMatch> },
    NoAudioTiming { window: WindowMatch },
}

impl fmt::Display for SeekFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoValidWords => f.write_str("no valid words"),
            Self::NoTokens => f.write_str("document has no tokens"),
            Self::LowProbability { best: Some(best) } => {
                write!(f, "low match probability ({:.3})", best.probability)
            }
            Self::LowProbability { best: None } => f.write_str("low match probability"),
            Self::NoAudioTiming { .. } => f.write_str("no audio timing"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SeekOutcome {
    Success {
        timestamp: f64,
        timed_word_index: usize,
        window: WindowMatch,
    },
    Failed {
        reason: SeekFailure,
    },
}

impl SeekOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn timestamp(&self) -> Option<f64> {
        match self {
            Self::Success { timestamp, .. } => Some(*timestamp),
            Self::Failed { .. } => None,
        }
    }
}

/// Contiguous run of tokens sharing a block host.
#[derive(Debug, Clone, PartialEq)]
pub struct Paragraph {
    pub start: usize,
    /// Inclusive.
    pub end: usize,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Tracking,
    Seeking,
    Completed,
}
