use crate::alignment::similarity::context_similarity;
use crate::alignment::tokenization::normalize_word;
use crate::alignment::transcript::Transcript;
use crate::config::SeekerConfig;
use crate::types::{Paragraph, SeekFailure, SeekOutcome, TextToken, WindowMatch};

/// One `seek_many` try.
#[derive(Debug, Clone, PartialEq)]
pub struct SeekAttempt {
    pub index: usize,
    pub text: String,
    pub outcome: SeekOutcome,
}

/// Whole-paragraph fuzzy locator. Runs only on explicit user intent, so a
/// full scan over the document is acceptable.
#[derive(Debug, Clone, Default)]
pub struct ParagraphSeeker {
    config: SeekerConfig,
}

impl ParagraphSeeker {
    pub fn new(config: SeekerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SeekerConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut SeekerConfig {
        &mut self.config
    }

    /// Split on whitespace and normalize each word the way tokens are normalized.
    pub fn preprocess(text: &str) -> Vec<String> {
        text.split_whitespace()
            .map(normalize_word)
            .filter(|w| !w.is_empty())
            .collect()
    }

    /// Best-scoring window of `query.len()` tokens. Ties keep the earliest window.
    pub fn find_best_window(&self, tokens: &[TextToken], query: &[String]) -> Option<WindowMatch> {
        let size = query.len();
        if size == 0 || tokens.len() < size {
            return None;
        }

        let mut best: Option<WindowMatch> = None;
        for start in 0..=tokens.len() - size {
            let window_words: Vec<&str> = tokens[start..start + size]
                .iter()
                .filter_map(TextToken::word)
                .collect();
            if (window_words.len() as f64) < size as f64 * self.config.min_word_coverage {
                continue;
            }

            let direct = context_similarity(query, &window_words, self.config.similarity);
            let surrounding = self.text_context(tokens, start, start + size);
            let context = context_similarity(query, &surrounding, self.config.similarity);
            let probability =
                self.config.direct_weight * direct + self.config.context_weight * context;

            if probability > best.map_or(0.0, |b| b.probability) {
                best = Some(WindowMatch {
                    start,
                    end: start + size - 1,
                    probability,
                    direct,
                    context,
                });
            }
        }
        best
    }

    /// Timed word with the same normalized word as the token, chosen by
    /// neighborhood similarity.
    pub fn find_timed_word(
        &self,
        tokens: &[TextToken],
        transcript: &Transcript,
        token_index: usize,
    ) -> Option<usize> {
        let target = tokens.get(token_index)?.word()?;
        let text_context = self.text_context(tokens, token_index, token_index + 1);

        let mut best: Option<(usize, f64)> = None;
        for timed_index in (0..transcript.len()).filter(|&i| transcript.normalized(i) == target) {
            let audio_context = self.audio_context(transcript, timed_index);
            let score = 0.5
                + 0.5 * context_similarity(&text_context, &audio_context, self.config.similarity);
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((timed_index, score));
            }
        }
        best.map(|(index, _)| index)
    }

    /// Locate `query` in the document and return the start time of the matching timed word.
    ///
    /// `min_probability` overrides the configured threshold for this call.
    pub fn seek(
        &self,
        tokens: &[TextToken],
        transcript: &Transcript,
        query: &str,
        min_probability: Option<f64>,
    ) -> SeekOutcome {
        let threshold = min_probability.unwrap_or(self.config.min_probability);
        let words = Self::preprocess(query);
        if words.is_empty() {
            return SeekOutcome::Failed {
                reason: SeekFailure::NoValidWords,
            };
        }
        if tokens.is_empty() {
            return SeekOutcome::Failed {
                reason: SeekFailure::NoTokens,
            };
        }

        let best = self.find_best_window(tokens, &words);
        let window = match best {
            Some(window) if window.probability >= threshold => window,
            _ => {
                tracing::debug!(
                    query_words = words.len(),
                    best = best.map(|b| b.probability),
                    threshold,
                    "seeker: no window above threshold"
                );
                return SeekOutcome::Failed {
                    reason: SeekFailure::LowProbability { best },
                };
            }
        };

        let anchor = (window.start..=window.end).find(|&i| !tokens[i].is_skip());
        let Some(timed_word_index) =
            anchor.and_then(|i| self.find_timed_word(tokens, transcript, i))
        else {
            tracing::debug!(
                start = window.start,
                end = window.end,
                "seeker: window has no matching timed word"
            );
            return SeekOutcome::Failed {
                reason: SeekFailure::NoAudioTiming { window },
            };
        };

        let timestamp = transcript
            .get(timed_word_index)
            .map_or(0.0, |w| w.start_time);
        tracing::info!(
            start = window.start,
            end = window.end,
            probability = format!("{:.3}", window.probability),
            timed_word_index,
            timestamp,
            "seeker: paragraph located"
        );
        SeekOutcome::Success {
            timestamp,
            timed_word_index,
            window,
        }
    }

    /// Try each text in order and stop at the first success.
    pub fn seek_many<S: AsRef<str>>(
        &self,
        tokens: &[TextToken],
        transcript: &Transcript,
        texts: &[S],
        min_probability: Option<f64>,
    ) -> Vec<SeekAttempt> {
        let mut attempts = Vec::new();
        for (index, text) in texts.iter().enumerate() {
            let outcome = self.seek(tokens, transcript, text.as_ref(), min_probability);
            let done = outcome.is_success();
            attempts.push(SeekAttempt {
                index,
                text: text.as_ref().to_string(),
                outcome,
            });
            if done {
                break;
            }
        }
        attempts
    }

    /// Words of the non-skip tokens in `[start - cw, end + cw)`.
    fn text_context<'a>(&self, tokens: &'a [TextToken], start: usize, end: usize) -> Vec<&'a str> {
        let window = self.config.context_window;
        let from = start.saturating_sub(window);
        let to = tokens.len().min(end.saturating_add(window));
        tokens[from.min(to)..to]
            .iter()
            .filter_map(TextToken::word)
            .collect()
    }

    fn audio_context<'a>(&self, transcript: &'a Transcript, timed_index: usize) -> Vec<&'a str> {
        let window = self.config.context_window;
        let from = timed_index.saturating_sub(window);
        let to = transcript.len().min(timed_index.saturating_add(window));
        (from..to)
            .map(|i| transcript.normalized(i))
            .filter(|w| !w.is_empty())
            .collect()
    }
}

/// Group contiguous tokens sharing a block host.
pub fn extract_paragraphs(tokens: &[TextToken]) -> Vec<Paragraph> {
    let mut paragraphs: Vec<Paragraph> = Vec::new();
    for token in tokens {
        match paragraphs.last_mut() {
            Some(current) if tokens[current.start].block == token.block => {
                current.end = token.index;
                current.text.push(' ');
                current.text.push_str(&token.raw_text);
            }
            _ => paragraphs.push(Paragraph {
                start: token.index,
                end: token.index,
                text: token.raw_text.clone(),
            }),
        }
    }
    paragraphs.retain(|p| !p.text.trim().is_empty());
    paragraphs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alignment::tokenization::tokenize_leaves;
    use crate::types::{DocumentLeaf, TimedWord};

    fn doc(leaves: &[(&str, usize)]) -> Vec<TextToken> {
        let leaves: Vec<DocumentLeaf> = leaves
            .iter()
            .map(|&(text, block)| DocumentLeaf::new(text, block))
            .collect();
        tokenize_leaves(&leaves, 0).tokens
    }

    fn quick_brown_fox() -> (Vec<TextToken>, Transcript) {
        let transcript = Transcript::from_words(
            vec![
                TimedWord::new("the", 0.0, 0.2),
                TimedWord::new("quick", 0.2, 0.5),
                TimedWord::new("brown", 0.5, 0.55),
                TimedWord::new("fox", 0.8, 1.0),
            ],
            0,
        );
        (doc(&[("the quick brown fox", 0)]), transcript)
    }

    #[test]
    fn preprocess_matches_token_normalization() {
        assert_eq!(
            ParagraphSeeker::preprocess("  Don't STOP -- now! "),
            ["don't", "stop", "now"]
        );
    }

    #[test]
    fn seeks_to_matching_paragraph() {
        let (tokens, transcript) = quick_brown_fox();
        let outcome = ParagraphSeeker::default().seek(&tokens, &transcript, "brown fox", None);
        let SeekOutcome::Success {
            timestamp,
            timed_word_index,
            window,
        } = outcome
        else {
            panic!("expected success, got {outcome:?}");
        };
        assert_eq!((window.start, window.end), (2, 3));
        assert_eq!(timed_word_index, 2);
        assert_eq!(timestamp, 0.5);
        assert_eq!(window.direct, 1.0);
    }

    #[test]
    fn empty_query_has_no_valid_words() {
        let (tokens, transcript) = quick_brown_fox();
        let outcome = ParagraphSeeker::default().seek(&tokens, &transcript, " ?! ", None);
        assert_eq!(
            outcome,
            SeekOutcome::Failed {
                reason: SeekFailure::NoValidWords
            }
        );
    }

    #[test]
    fn empty_document_short_circuits() {
        let (_, transcript) = quick_brown_fox();
        let outcome = ParagraphSeeker::default().seek(&[], &transcript, "brown fox", None);
        assert_eq!(
            outcome,
            SeekOutcome::Failed {
                reason: SeekFailure::NoTokens
            }
        );
    }

    #[test]
    fn unrelated_query_is_low_probability() {
        let (tokens, transcript) = quick_brown_fox();
        let outcome = ParagraphSeeker::default().seek(&tokens, &transcript, "lazy dog", None);
        assert!(matches!(
            outcome,
            SeekOutcome::Failed {
                reason: SeekFailure::LowProbability { best: None }
            }
        ));
    }

    #[test]
    fn threshold_override_applies_per_call() {
        let (tokens, transcript) = quick_brown_fox();
        let seeker = ParagraphSeeker::default();
        assert!(!seeker.seek(&tokens, &transcript, "brown fox", Some(0.95)).is_success());
        assert!(seeker.seek(&tokens, &transcript, "brown cat", Some(0.2)).is_success());
    }

    #[test]
    fn query_longer_than_document_fails() {
        let (tokens, transcript) = quick_brown_fox();
        let outcome = ParagraphSeeker::default().seek(
            &tokens,
            &transcript,
            "the quick brown fox jumps",
            None,
        );
        assert!(!outcome.is_success());
    }

    #[test]
    fn sparse_windows_are_rejected() {
        let tokens = doc(&[("-- -- -- brown", 0)]);
        let query = ParagraphSeeker::preprocess("a b c brown");
        let best = ParagraphSeeker::default().find_best_window(&tokens, &query);
        assert_eq!(best, None);
    }

    #[test]
    fn missing_audio_timing_is_reported() {
        let tokens = doc(&[("the quick brown fox", 0)]);
        let transcript = Transcript::from_words(vec![TimedWord::new("zebra", 0.0, 0.4)], 0);
        let outcome = ParagraphSeeker::default().seek(&tokens, &transcript, "brown fox", None);
        assert!(matches!(
            outcome,
            SeekOutcome::Failed {
                reason: SeekFailure::NoAudioTiming { window }
            } if window.start == 2
        ));
    }

    #[test]
    fn repeated_word_is_disambiguated_by_context() {
        let tokens = doc(&[("red fish blue fish", 0)]);
        let mut spoken = vec!["fish"];
        spoken.extend(["x"; 10]);
        spoken.extend(["red", "fish", "blue", "fish"]);
        let transcript = Transcript::from_words(
            spoken
                .iter()
                .enumerate()
                .map(|(i, w)| TimedWord::new(*w, i as f64, i as f64 + 0.5))
                .collect(),
            0,
        );
        let mut config = SeekerConfig::default();
        config.set_context_window(5);
        let seeker = ParagraphSeeker::new(config);

        // The lone "fish" at 0 has no neighbors in common with the text.
        let found = seeker.find_timed_word(&tokens, &transcript, 1);
        assert!(matches!(found, Some(12 | 14)), "got {found:?}");
        assert_eq!(seeker.find_timed_word(&tokens, &transcript, 0), Some(11));
    }

    #[test]
    fn seek_many_stops_at_first_success() {
        let (tokens, transcript) = quick_brown_fox();
        let attempts = ParagraphSeeker::default().seek_many(
            &tokens,
            &transcript,
            &["lazy dog", "quick brown", "brown fox"],
            None,
        );
        assert_eq!(attempts.len(), 2);
        assert_eq!(attempts[1].index, 1);
        assert_eq!(attempts[1].outcome.timestamp(), Some(0.2));
    }

    #[test]
    fn paragraphs_follow_block_hosts() {
        let tokens = doc(&[("Chapter One", 0), ("It was", 1), (" a night.", 1), ("End", 2)]);
        let paragraphs = extract_paragraphs(&tokens);
        let texts: Vec<&str> = paragraphs.iter().map(|p| p.text.as_str()).collect();
        assert_eq!(texts, ["Chapter One", "It was a night.", "End"]);
        assert_eq!((paragraphs[1].start, paragraphs[1].end), (2, 5));
    }
}
