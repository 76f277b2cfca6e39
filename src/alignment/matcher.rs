use crate::alignment::similarity::context_similarity;
use crate::alignment::transcript::Transcript;
use crate::config::MatcherConfig;
use crate::types::{MatchResult, TextToken};

/// Bounded local aligner: scores the tokens around a search center against
/// one timed word using the word itself plus the surrounding words in both
/// streams.
#[derive(Debug, Clone, Default)]
pub struct Matcher {
    config: MatcherConfig,
}

impl Matcher {
    pub fn new(config: MatcherConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MatcherConfig {
        &self.config
    }

    pub fn match_timed_word(
        &self,
        tokens: &[TextToken],
        transcript: &Transcript,
        timed_index: usize,
        search_center: usize,
    ) -> MatchResult {
        if tokens.is_empty() || timed_index >= transcript.len() {
            return MatchResult::NONE;
        }

        let target = transcript.normalized(timed_index);
        let window = self.config.window_size;
        let start = search_center.saturating_sub(window);
        let end = tokens.len().min(search_center.saturating_add(window + 1));
        if start >= end {
            return MatchResult::NONE;
        }

        let audio_context = self.audio_context(transcript, timed_index);
        let mut best = MatchResult::NONE;

        for token in &tokens[start..end] {
            let Some(word) = token.word() else {
                continue;
            };
            let word_score = if word == target { 1.0 } else { 0.0 };
            let text_context = self.text_context(tokens, token.index);
            let context_score =
                context_similarity(&audio_context, &text_context, self.config.similarity)
                    .clamp(0.0, 1.0);
            let probability = (self.config.word_weight * word_score
                + self.config.context_weight * context_score)
                .clamp(0.0, 1.0);

            // Strictly greater keeps the lowest index on ties.
            if probability > best.probability {
                best = MatchResult {
                    token_index: Some(token.index),
                    probability,
                    word_score,
                    context_score,
                };
            }
        }

        if self.accepts(&best) {
            best
        } else {
            MatchResult::NONE
        }
    }

    fn accepts(&self, candidate: &MatchResult) -> bool {
        if candidate.token_index.is_none() {
            return false;
        }
        let threshold = if candidate.word_score == 1.0 {
            self.config.exact_accept_threshold
        } else {
            self.config.fuzzy_accept_threshold
        };
        candidate.probability > threshold && candidate.probability >= self.config.min_probability
    }

    /// Normalized words of the timed words around `timed_index`, itself excluded.
    pub fn audio_context<'a>(
        &self,
        transcript: &'a Transcript,
        timed_index: usize,
    ) -> Vec<&'a str> {
        let size = self.config.context_size;
        let start = timed_index.saturating_sub(size);
        let end = transcript.len().min(timed_index.saturating_add(size + 1));
        (start..end)
            .filter(|&i| i != timed_index)
            .map(|i| transcript.normalized(i))
            .filter(|w| !w.is_empty())
            .collect()
    }

    /// Normalized words of the tokens around `token_index`, itself and skip tokens excluded.
    pub fn text_context<'a>(&self, tokens: &'a [TextToken], token_index: usize) -> Vec<&'a str> {
        let size = self.config.context_size;
        let start = token_index.saturating_sub(size);
        let end = tokens.len().min(token_index.saturating_add(size + 1));
        tokens[start.min(end)..end]
            .iter()
            .filter(|t| t.index != token_index)
            .filter_map(TextToken::word)
            .collect()
    }

    /// Document-wide scan: among tokens whose word equals the timed word
    /// exactly, the one whose surroundings agree best with the transcript.
    /// Ties keep the lowest index.
    pub fn best_exact_match(
        &self,
        tokens: &[TextToken],
        transcript: &Transcript,
        timed_index: usize,
    ) -> Option<usize> {
        let target = transcript.normalized(timed_index);
        if target.is_empty() {
            return None;
        }
        let audio_context = self.audio_context(transcript, timed_index);
        let mut best: Option<(usize, f64)> = None;
        for token in tokens.iter().filter(|t| t.word() == Some(target)) {
            let text_context = self.text_context(tokens, token.index);
            let score = context_similarity(&audio_context, &text_context, self.config.similarity);
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((token.index, score));
            }
        }
        best.map(|(index, _)| index)
    }

    /// First token at or after `from` whose word equals `target` exactly,
    /// looking at most `max(min_span, window_size)` tokens ahead.
    pub fn forward_exact_search(
        &self,
        tokens: &[TextToken],
        target: &str,
        from: usize,
        min_span: usize,
    ) -> Option<usize> {
        if target.is_empty() {
            return None;
        }
        let end = tokens
            .len()
            .min(from.saturating_add(min_span.max(self.config.window_size)));
        tokens
            .get(from..end)?
            .iter()
            .find(|t| t.word() == Some(target))
            .map(|t| t.index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alignment::tokenization::tokenize_leaves;
    use crate::types::{DocumentLeaf, TimedWord};

    fn tokens(text: &str) -> Vec<TextToken> {
        tokenize_leaves(&[DocumentLeaf::new(text, 0)], 0).tokens
    }

    fn transcript(words: &[&str]) -> Transcript {
        Transcript::from_words(
            words
                .iter()
                .enumerate()
                .map(|(i, w)| TimedWord::new(*w, i as f64 * 0.3, i as f64 * 0.3 + 0.25))
                .collect(),
            0,
        )
    }

    #[test]
    fn exact_word_with_matching_context_scores_one() {
        let toks = tokens("the quick brown fox");
        let tr = transcript(&["the", "quick", "brown", "fox"]);
        let m = Matcher::default().match_timed_word(&toks, &tr, 2, 0);
        assert_eq!(m.token_index, Some(2));
        assert!((m.probability - 1.0).abs() < 1e-12);
        assert_eq!(m.word_score, 1.0);
    }

    #[test]
    fn misrecognized_word_is_recovered_through_context() {
        let toks = tokens("once upon the time ends");
        let tr = transcript(&["once", "upon", "teh", "time", "ends"]);
        let m = Matcher::default().match_timed_word(&toks, &tr, 2, 1);
        assert_eq!(m.token_index, Some(2));
        assert_eq!(m.word_score, 0.0);
        assert!(m.context_score > 0.5);
        assert!(m.probability > 0.3);
    }

    #[test]
    fn unrelated_word_is_rejected() {
        let toks = tokens("alpha beta gamma");
        let tr = transcript(&["zulu"]);
        let m = Matcher::default().match_timed_word(&toks, &tr, 0, 0);
        assert_eq!(m, MatchResult::NONE);
    }

    #[test]
    fn empty_document_short_circuits() {
        let tr = transcript(&["anything"]);
        let m = Matcher::default().match_timed_word(&[], &tr, 0, 0);
        assert!(!m.is_accepted());
        assert_eq!(m.probability, 0.0);
    }

    #[test]
    fn skip_tokens_are_never_candidates() {
        let toks = tokens("-- word --");
        let tr = transcript(&["word"]);
        let m = Matcher::default().match_timed_word(&toks, &tr, 0, 0);
        assert_eq!(m.token_index, Some(1));
    }

    #[test]
    fn ties_prefer_lowest_index() {
        // Single timed word: every candidate has an empty-vs-nonempty context (score 0),
        // so both "echo" tokens tie at 0.4.
        let toks = tokens("echo echo");
        let tr = transcript(&["echo"]);
        let m = Matcher::default().match_timed_word(&toks, &tr, 0, 1);
        assert_eq!(m.token_index, Some(0));
        assert!((m.probability - 0.4).abs() < 1e-12);
    }

    #[test]
    fn candidates_outside_window_are_ignored() {
        let text = (0..30).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ");
        let toks = tokens(&text);
        let tr = transcript(&["w25"]);
        let m = Matcher::default().match_timed_word(&toks, &tr, 0, 0);
        assert!(!m.is_accepted());
        let m = Matcher::default().match_timed_word(&toks, &tr, 0, 20);
        assert_eq!(m.token_index, Some(25));
    }

    #[test]
    fn external_gate_rejects_weak_matches() {
        let toks = tokens("once upon the time ends");
        let tr = transcript(&["once", "upon", "teh", "time", "ends"]);
        let gated = Matcher::new(MatcherConfig {
            min_probability: 0.8,
            ..MatcherConfig::default()
        });
        assert!(!gated.match_timed_word(&toks, &tr, 2, 1).is_accepted());
    }

    #[test]
    fn scores_stay_in_bounds() {
        let toks = tokens("a b a c a d e f a");
        let tr = transcript(&["a", "x", "a", "c", "q", "d", "a"]);
        let matcher = Matcher::default();
        for ti in 0..tr.len() {
            for center in 0..=toks.len() {
                let m = matcher.match_timed_word(&toks, &tr, ti, center);
                assert!((0.0..=1.0).contains(&m.probability));
                assert!(m.word_score == 0.0 || m.word_score == 1.0);
                assert!((0.0..=1.0).contains(&m.context_score));
            }
        }
    }

    #[test]
    fn best_exact_match_uses_context_across_the_document() {
        let toks = tokens("the cat sat on the mat and the dog ran");
        let tr = transcript(&["and", "the", "dog"]);
        let matcher = Matcher::new(MatcherConfig {
            context_size: 1,
            ..MatcherConfig::default()
        });
        assert_eq!(matcher.best_exact_match(&toks, &tr, 1), Some(7));
        assert_eq!(matcher.best_exact_match(&toks, &tr, 5), None);
    }

    #[test]
    fn forward_exact_search_scans_ahead_only() {
        let toks = tokens("one two three four");
        let matcher = Matcher::default();
        assert_eq!(matcher.forward_exact_search(&toks, "three", 1, 3), Some(2));
        assert_eq!(matcher.forward_exact_search(&toks, "one", 1, 3), None);
        assert_eq!(matcher.forward_exact_search(&toks, "four", 9, 3), None);
    }
}
