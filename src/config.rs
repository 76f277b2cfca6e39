use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ReadAlongError;

/// Weights of the overlap/positional blend used by both the matcher and the
/// paragraph seeker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimilarityWeights {
    pub overlap: f64,
    pub positional: f64,
}

impl Default for SimilarityWeights {
    fn default() -> Self {
        Self {
            overlap: 0.6,
            positional: 0.4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    /// Candidate tokens considered on each side of the search center.
    pub window_size: usize,
    /// Neighbours collected on each side when building a context.
    pub context_size: usize,
    pub word_weight: f64,
    pub context_weight: f64,
    /// Acceptance gate when the candidate's word is an exact match.
    pub exact_accept_threshold: f64,
    /// Acceptance gate when only the context supports the candidate.
    pub fuzzy_accept_threshold: f64,
    /// Extra probability floor applied after the gates. 0 disables it.
    pub min_probability: f64,
    pub similarity: SimilarityWeights,
}

impl MatcherConfig {
    pub const DEFAULT_WINDOW_SIZE: usize = 10;
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            window_size: Self::DEFAULT_WINDOW_SIZE,
            context_size: Self::DEFAULT_WINDOW_SIZE,
            word_weight: 0.4,
            context_weight: 0.6,
            exact_accept_threshold: 0.2,
            fuzzy_accept_threshold: 0.3,
            min_probability: 0.0,
            similarity: SimilarityWeights::default(),
        }
    }
}

/// What the highlighter does with a timed word the matcher rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectPolicy {
    #[default]
    Skip,
    ForwardExactSearch,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HighlightConfig {
    pub lookahead_ms: u64,
    /// Reading-rate estimate used before the first timed word and for seek fallback.
    pub words_per_second: f64,
    /// Reading-rate estimate used to size a gap between two anchors after a pause.
    pub gap_words_per_second: f64,
    /// Silence between two anchors above which the gap is estimated instead of filled.
    pub silence_gap_s: f64,
    /// Distance from the end of the audio at which every remaining token is painted.
    pub end_guard_s: f64,
    pub poll_interval_ms: u64,
    pub reject_policy: RejectPolicy,
    /// Minimum span of the forward exact search.
    pub forward_search_min: usize,
}

impl HighlightConfig {
    pub const MAX_POLL_INTERVAL_MS: u64 = 100;

    pub fn lookahead_s(&self) -> f64 {
        self.lookahead_ms as f64 / 1000.0
    }
}

impl Default for HighlightConfig {
    fn default() -> Self {
        Self {
            lookahead_ms: 50,
            words_per_second: 2.5,
            gap_words_per_second: 3.0,
            silence_gap_s: 0.1,
            end_guard_s: 0.1,
            poll_interval_ms: 50,
            reject_policy: RejectPolicy::Skip,
            forward_search_min: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeekerConfig {
    pub min_probability: f64,
    pub context_window: usize,
    pub direct_weight: f64,
    pub context_weight: f64,
    /// Share of a window's tokens that must carry a word for the window to be scored.
    pub min_word_coverage: f64,
    pub similarity: SimilarityWeights,
}

impl SeekerConfig {
    pub const MIN_CONTEXT_WINDOW: usize = 5;
    pub const MAX_CONTEXT_WINDOW: usize = 50;

    pub fn set_min_probability(&mut self, threshold: f64) {
        self.min_probability = if threshold.is_finite() {
            threshold.clamp(0.0, 1.0)
        } else {
            0.0
        };
    }

    pub fn set_context_window(&mut self, window: usize) {
        self.context_window = window.clamp(Self::MIN_CONTEXT_WINDOW, Self::MAX_CONTEXT_WINDOW);
    }
}

impl Default for SeekerConfig {
    fn default() -> Self {
        Self {
            min_probability: 0.4,
            context_window: 15,
            direct_weight: 0.7,
            context_weight: 0.3,
            min_word_coverage: 0.5,
            similarity: SimilarityWeights::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadAlongConfig {
    pub matcher: MatcherConfig,
    pub highlight: HighlightConfig,
    pub seeker: SeekerConfig,
    /// Signed shift applied to every transcript time at load.
    pub transcript_offset_ms: i64,
    /// Off for languages the transcript cannot be aligned against word by word.
    pub word_highlighting: bool,
}

impl Default for ReadAlongConfig {
    fn default() -> Self {
        Self {
            matcher: MatcherConfig::default(),
            highlight: HighlightConfig::default(),
            seeker: SeekerConfig::default(),
            transcript_offset_ms: 0,
            word_highlighting: true,
        }
    }
}

impl ReadAlongConfig {
    pub fn load(path: &Path) -> Result<Self, ReadAlongError> {
        let data = std::fs::read_to_string(path)
            .map_err(|e| ReadAlongError::io("read read-along config", e))?;
        Self::from_json_str(&data)
    }

    pub fn from_json_str(data: &str) -> Result<Self, ReadAlongError> {
        let config: Self = serde_json::from_str(data)
            .map_err(|e| ReadAlongError::json("parse read-along config", e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReadAlongError> {
        let weights = [
            ("matcher.word_weight", self.matcher.word_weight),
            ("matcher.context_weight", self.matcher.context_weight),
            ("matcher.exact_accept_threshold", self.matcher.exact_accept_threshold),
            ("matcher.fuzzy_accept_threshold", self.matcher.fuzzy_accept_threshold),
            ("matcher.min_probability", self.matcher.min_probability),
            ("matcher.similarity.overlap", self.matcher.similarity.overlap),
            ("matcher.similarity.positional", self.matcher.similarity.positional),
            ("highlight.words_per_second", self.highlight.words_per_second),
            ("highlight.gap_words_per_second", self.highlight.gap_words_per_second),
            ("highlight.silence_gap_s", self.highlight.silence_gap_s),
            ("highlight.end_guard_s", self.highlight.end_guard_s),
            ("seeker.min_probability", self.seeker.min_probability),
            ("seeker.direct_weight", self.seeker.direct_weight),
            ("seeker.context_weight", self.seeker.context_weight),
            ("seeker.min_word_coverage", self.seeker.min_word_coverage),
            ("seeker.similarity.overlap", self.seeker.similarity.overlap),
            ("seeker.similarity.positional", self.seeker.similarity.positional),
        ];
        for (name, value) in weights {
            if !value.is_finite() || value < 0.0 {
                return Err(ReadAlongError::invalid_config(format!(
                    "{name} must be a finite non-negative number, got {value}"
                )));
            }
        }
        if self.matcher.window_size == 0 {
            return Err(ReadAlongError::invalid_config(
                "matcher.window_size must be at least 1",
            ));
        }
        if self.seeker.context_window == 0 {
            return Err(ReadAlongError::invalid_config(
                "seeker.context_window must be at least 1",
            ));
        }
        let poll = self.highlight.poll_interval_ms;
        if poll == 0 || poll > HighlightConfig::MAX_POLL_INTERVAL_MS {
            return Err(ReadAlongError::invalid_config(format!(
                "highlight.poll_interval_ms must be in 1..={}, got {poll}",
                HighlightConfig::MAX_POLL_INTERVAL_MS
            )));
        }
        Ok(())
    }
}
