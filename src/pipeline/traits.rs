use crate::alignment::tokenization::{remap_render_refs, TokenizedDocument};
use crate::types::{DocumentLeaf, RenderRef, TextToken};

pub trait Tokenizer: Send + Sync {
    fn tokenize(&self, leaves: &[DocumentLeaf], generation: u64) -> TokenizedDocument;

    /// Re-resolve render refs invalidated by a re-render. Returns how many changed.
    fn rehydrate(&self, document: &mut TokenizedDocument, surface: &dyn RenderSurface) -> usize {
        remap_render_refs(document, surface)
    }
}

/// Source of playback position. Times are seconds.
pub trait PlaybackClock: Send {
    fn current_time(&self) -> f64;

    /// Non-finite or non-positive when unknown.
    fn duration(&self) -> f64;

    fn seek_to(&mut self, time: f64);
}

/// Where highlighted tokens are shown. Elements may be replaced externally,
/// which bumps the generation and invalidates earlier refs.
pub trait RenderSurface: Send {
    fn generation(&self) -> u64;

    fn is_live(&self, render_ref: &RenderRef) -> bool;

    fn resolve(&self, ordinal: usize) -> Option<RenderRef>;

    fn paint(&mut self, render_ref: &RenderRef, highlighted: bool);
}

/// Observer told about each newly highlighted token, e.g. to scroll it into view.
pub trait WordFollower: Send {
    fn word_highlighted(&mut self, token: &TextToken);
}
