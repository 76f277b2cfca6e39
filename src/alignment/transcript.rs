use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use crate::alignment::tokenization::normalize_word;
use crate::error::ReadAlongError;
use crate::types::TimedWord;

/// Ordered timed words plus their normalized forms, ready for matching.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transcript {
    words: Vec<TimedWord>,
    normalized: Vec<String>,
}

/// Either shape of a transcript artifact: a bare list (flat entries or
/// monologues) or an object carrying `monologues`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawTranscript {
    Nested { monologues: Vec<Value> },
    List(Vec<Value>),
}

#[derive(Debug, Deserialize)]
struct RawMonologue {
    #[serde(default)]
    elements: Vec<Value>,
}

/// Keys tried in order; the first one holding the right JSON type wins.
const WORD_KEYS: [&str; 2] = ["value", "word"];
const START_KEYS: [&str; 3] = ["ts", "start_ts", "time_start"];
const END_KEYS: [&str; 2] = ["end_ts", "time_end"];

impl Transcript {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_value(raw: &Value, offset_ms: i64) -> Self {
        let entries = match RawTranscript::deserialize(raw) {
            Ok(RawTranscript::Nested { monologues }) => flatten_monologues(&monologues),
            Ok(RawTranscript::List(items)) if items.iter().any(is_monologue) => {
                flatten_monologues(&items)
            }
            Ok(RawTranscript::List(items)) => items,
            Err(_) => {
                tracing::warn!("transcript: unrecognized artifact shape, no timed words loaded");
                Vec::new()
            }
        };

        let total = entries.len();
        let words: Vec<TimedWord> = entries.iter().filter_map(entry_to_word).collect();
        if words.len() < total {
            tracing::warn!(
                dropped = total - words.len(),
                kept = words.len(),
                "transcript: dropped malformed entries"
            );
        }
        Self::from_words(words, offset_ms)
    }

    pub fn from_json_str(data: &str, offset_ms: i64) -> Result<Self, ReadAlongError> {
        let raw: Value =
            serde_json::from_str(data).map_err(|e| ReadAlongError::json("parse transcript", e))?;
        Ok(Self::from_value(&raw, offset_ms))
    }

    pub fn from_slice(data: &[u8], offset_ms: i64) -> Result<Self, ReadAlongError> {
        let raw: Value =
            serde_json::from_slice(data).map_err(|e| ReadAlongError::json("parse transcript", e))?;
        Ok(Self::from_value(&raw, offset_ms))
    }

    pub fn load(path: &Path, offset_ms: i64) -> Result<Self, ReadAlongError> {
        let data = std::fs::read(path).map_err(|e| ReadAlongError::io("read transcript", e))?;
        Self::from_slice(&data, offset_ms)
    }

    /// Apply the offset (clamped at zero), drop non-finite entries, sort by start.
    pub fn from_words(words: Vec<TimedWord>, offset_ms: i64) -> Self {
        let offset_s = offset_ms as f64 / 1000.0;
        let mut words: Vec<TimedWord> = words
            .into_iter()
            .filter(|w| w.start_time.is_finite() && w.end_time.is_finite())
            .map(|w| {
                let start_time = (w.start_time + offset_s).max(0.0);
                let end_time = (w.end_time + offset_s).max(start_time);
                TimedWord {
                    word: w.word,
                    start_time,
                    end_time,
                }
            })
            .collect();
        words.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));

        if offset_ms != 0 {
            tracing::info!(offset_ms, "transcript: applied time offset");
        }
        tracing::info!(words = words.len(), "transcript: loaded timed words");

        let normalized = words.iter().map(|w| normalize_word(&w.word)).collect();
        Self { words, normalized }
    }

    pub fn words(&self) -> &[TimedWord] {
        &self.words
    }

    pub fn get(&self, index: usize) -> Option<&TimedWord> {
        self.words.get(index)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn normalized(&self, index: usize) -> &str {
        self.normalized.get(index).map(String::as_str).unwrap_or("")
    }

    /// Number of words whose start is at or before `time`.
    pub fn started_count(&self, time: f64) -> usize {
        self.words.partition_point(|w| w.start_time <= time)
    }

    /// Latest-starting word whose `[start, end]` interval contains `time`.
    /// On a shared boundary the word that starts there wins.
    pub fn containing(&self, time: f64) -> Option<usize> {
        let upper = self.started_count(time);
        self.words[..upper].iter().rposition(|w| w.contains(time))
    }

    /// Last word that started at or before `time`.
    pub fn last_started(&self, time: f64) -> Option<usize> {
        self.started_count(time).checked_sub(1)
    }
}

fn is_monologue(item: &Value) -> bool {
    item.get("elements").is_some()
}

fn flatten_monologues(monologues: &[Value]) -> Vec<Value> {
    monologues
        .iter()
        .filter_map(|m| RawMonologue::deserialize(m).ok())
        .flat_map(|m| m.elements)
        .filter(|el| el.get("type").and_then(Value::as_str) == Some("text"))
        .collect()
}

fn first_number(entry: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|k| entry.get(k).and_then(Value::as_f64))
}

fn entry_to_word(entry: &Value) -> Option<TimedWord> {
    if entry
        .get("type")
        .is_some_and(|kind| kind.as_str() != Some("text"))
    {
        return None;
    }
    let word = WORD_KEYS
        .iter()
        .find_map(|k| entry.get(k).and_then(Value::as_str))?
        .trim();
    if word.is_empty() {
        return None;
    }
    Some(TimedWord {
        word: word.to_string(),
        start_time: first_number(entry, &START_KEYS)?,
        end_time: first_number(entry, &END_KEYS)?,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn flat_list_is_loaded_in_order() {
        let raw = json!([
            {"word": "brown", "time_start": 0.5, "time_end": 0.8},
            {"word": "The", "time_start": 0.0, "time_end": 0.2},
            {"word": "quick", "time_start": 0.2, "time_end": 0.5}
        ]);
        let t = Transcript::from_value(&raw, 0);
        let words: Vec<&str> = t.words().iter().map(|w| w.word.as_str()).collect();
        assert_eq!(words, ["The", "quick", "brown"]);
        assert_eq!(t.normalized(0), "the");
    }

    #[test]
    fn nested_monologues_use_varying_keys() {
        let raw = json!({
            "monologues": [
                {"speaker": 0, "elements": [
                    {"type": "text", "value": "Hello", "ts": 0.1, "end_ts": 0.4},
                    {"type": "punct", "value": ","},
                    {"type": "text", "value": "world", "start_ts": 0.5, "end_ts": 0.9}
                ]},
                {"speaker": 1, "elements": [
                    {"type": "text", "value": "again", "time_start": 1.0, "time_end": 1.3}
                ]}
            ]
        });
        let t = Transcript::from_value(&raw, 0);
        assert_eq!(t.len(), 3);
        assert_eq!(t.words()[1], TimedWord::new("world", 0.5, 0.9));
        assert_eq!(t.words()[2].start_time, 1.0);
    }

    #[test]
    fn bare_array_of_monologues_is_nested() {
        let raw = json!([
            {"elements": [{"type": "text", "value": "solo", "ts": 2.0, "end_ts": 2.5}]}
        ]);
        let t = Transcript::from_value(&raw, 0);
        assert_eq!(t.words(), &[TimedWord::new("solo", 2.0, 2.5)]);
    }

    #[test]
    fn entries_missing_timestamps_are_dropped() {
        let raw = json!([
            {"word": "kept", "time_start": 0.0, "time_end": 0.3},
            {"word": "nostart", "time_end": 0.6},
            {"word": "noend", "time_start": 0.6},
            {"word": "bad", "time_start": "soon", "time_end": 1.0},
            {"word": "  ", "time_start": 1.0, "time_end": 1.2}
        ]);
        let t = Transcript::from_value(&raw, 0);
        assert_eq!(t.len(), 1);
        assert_eq!(t.words()[0].word, "kept");
    }

    #[test]
    fn start_and_end_keys_follow_priority_order() {
        let raw = json!({
            "monologues": [{"elements": [
                {"type": "text", "value": "one", "ts": 0.1, "start_ts": 9.0, "end_ts": 0.3},
                {"type": "text", "value": "two", "ts": null, "start_ts": 0.4, "end_ts": 0.6},
                {"type": "text", "value": "three", "ts": 0.7, "end_ts": 0.9, "time_end": 5.0},
                {"type": "text", "value": "four", "ts": "late", "time_start": 1.0, "end_ts": 1.2}
            ]}]
        });
        let t = Transcript::from_value(&raw, 0);
        assert_eq!(
            t.words(),
            &[
                TimedWord::new("one", 0.1, 0.3),
                TimedWord::new("two", 0.4, 0.6),
                TimedWord::new("three", 0.7, 0.9),
                TimedWord::new("four", 1.0, 1.2),
            ]
        );
    }

    #[test]
    fn negative_offset_clamps_at_zero() {
        let raw = json!([
            {"word": "a", "time_start": 0.1, "time_end": 0.2},
            {"word": "b", "time_start": 1.0, "time_end": 1.4}
        ]);
        let t = Transcript::from_value(&raw, -300);
        assert_eq!(t.words()[0].start_time, 0.0);
        assert_eq!(t.words()[0].end_time, 0.0);
        assert!((t.words()[1].start_time - 0.7).abs() < 1e-9);
        assert!((t.words()[1].end_time - 1.1).abs() < 1e-9);
    }

    #[test]
    fn positive_offset_shifts_forward() {
        let t = Transcript::from_words(vec![TimedWord::new("x", 0.0, 0.5)], 250);
        assert!((t.words()[0].start_time - 0.25).abs() < 1e-9);
        assert!((t.words()[0].end_time - 0.75).abs() < 1e-9);
    }

    #[test]
    fn unknown_shape_yields_empty_transcript() {
        let t = Transcript::from_value(&json!({"words": 3}), 0);
        assert!(t.is_empty());
    }

    #[test]
    fn invalid_json_is_an_error() {
        let err = Transcript::from_json_str("[{", 0).unwrap_err();
        assert!(matches!(err, ReadAlongError::Json { .. }));
    }

    #[test]
    fn time_lookups() {
        let t = Transcript::from_words(
            vec![
                TimedWord::new("the", 0.0, 0.2),
                TimedWord::new("quick", 0.2, 0.5),
                TimedWord::new("brown", 0.5, 0.55),
                TimedWord::new("fox", 0.8, 1.0),
            ],
            0,
        );
        assert_eq!(t.containing(0.3), Some(1));
        assert_eq!(t.containing(0.2), Some(1));
        assert_eq!(t.containing(0.1), Some(0));
        assert_eq!(t.containing(0.6), None);
        assert_eq!(t.last_started(0.6), Some(2));
        assert_eq!(t.last_started(-1.0), None);
        assert_eq!(t.started_count(5.0), 4);
    }
}
