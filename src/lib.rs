pub mod alignment;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod types;

pub use alignment::highlight::{HighlightCursor, Highlighter, SeekResolution, SeekSource};
pub use alignment::matcher::Matcher;
pub use alignment::report::{
    aggregate_samples, ReplayAggregates, ReplayMeta, ReplayRecorder, ReplayReport, ReplaySample,
};
pub use alignment::seeker::{extract_paragraphs, ParagraphSeeker, SeekAttempt};
pub use alignment::tokenization::{normalize_word, tokenize_leaves, Segment, TokenizedDocument};
pub use alignment::transcript::Transcript;
pub use config::{HighlightConfig, MatcherConfig, ReadAlongConfig, RejectPolicy, SeekerConfig};
pub use error::ReadAlongError;
pub use pipeline::builder::ReadAlongBuilder;
pub use pipeline::driver::{
    playback_channel, run_playback_loop, PlaybackEvent, PlaybackHandle, PlaybackTask,
};
pub use pipeline::reader::MultiPageReader;
pub use pipeline::session::ReadAlongSession;
pub use pipeline::traits::{PlaybackClock, RenderSurface, Tokenizer, WordFollower};
pub use types::{
    DocumentLeaf, MatchResult, Paragraph, PlaybackState, RenderRef, SeekFailure, SeekOutcome,
    TextToken, TimedWord, WindowMatch,
};
