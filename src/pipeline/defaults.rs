use std::sync::{Arc, Mutex, MutexGuard};

use crate::alignment::tokenization::{tokenize_leaves, TokenizedDocument};
use crate::pipeline::traits::{PlaybackClock, RenderSurface, Tokenizer, WordFollower};
use crate::types::{DocumentLeaf, RenderRef, TextToken};

pub struct WhitespaceTokenizer;

impl Tokenizer for WhitespaceTokenizer {
    fn tokenize(&self, leaves: &[DocumentLeaf], generation: u64) -> TokenizedDocument {
        tokenize_leaves(leaves, generation)
    }
}

fn lock<T>(state: &Mutex<T>) -> MutexGuard<'_, T> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug, Default)]
struct SurfaceState {
    generation: u64,
    painted: Vec<bool>,
    paint_calls: usize,
}

/// In-memory render surface. Clones share state, so a caller can keep one
/// handle for inspection after boxing another into a session.
#[derive(Debug, Clone, Default)]
pub struct MemorySurface {
    state: Arc<Mutex<SurfaceState>>,
}

impl MemorySurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an external re-render: every element is replaced and loses its paint.
    pub fn rerender(&self) {
        let mut state = lock(&self.state);
        state.generation += 1;
        state.painted.iter_mut().for_each(|p| *p = false);
    }

    pub fn is_painted(&self, ordinal: usize) -> bool {
        lock(&self.state).painted.get(ordinal).copied().unwrap_or(false)
    }

    pub fn painted_indices(&self) -> Vec<usize> {
        lock(&self.state)
            .painted
            .iter()
            .enumerate()
            .filter_map(|(i, &on)| on.then_some(i))
            .collect()
    }

    pub fn painted_count(&self) -> usize {
        lock(&self.state).painted.iter().filter(|&&on| on).count()
    }

    pub fn paint_calls(&self) -> usize {
        lock(&self.state).paint_calls
    }
}

impl RenderSurface for MemorySurface {
    fn generation(&self) -> u64 {
        lock(&self.state).generation
    }

    fn is_live(&self, render_ref: &RenderRef) -> bool {
        render_ref.generation == lock(&self.state).generation
    }

    fn resolve(&self, ordinal: usize) -> Option<RenderRef> {
        Some(RenderRef {
            ordinal,
            generation: lock(&self.state).generation,
        })
    }

    fn paint(&mut self, render_ref: &RenderRef, highlighted: bool) {
        let mut state = lock(&self.state);
        if render_ref.generation != state.generation {
            return;
        }
        state.paint_calls += 1;
        if state.painted.len() <= render_ref.ordinal {
            state.painted.resize(render_ref.ordinal + 1, false);
        }
        state.painted[render_ref.ordinal] = highlighted;
    }
}

#[derive(Debug, Clone, Copy)]
struct ClockState {
    time: f64,
    duration: f64,
}

/// Clock moved by hand. Clones share state.
#[derive(Debug, Clone)]
pub struct ManualClock {
    state: Arc<Mutex<ClockState>>,
}

impl ManualClock {
    pub fn new(duration: f64) -> Self {
        Self {
            state: Arc::new(Mutex::new(ClockState {
                time: 0.0,
                duration,
            })),
        }
    }

    pub fn set_time(&self, time: f64) {
        lock(&self.state).time = time;
    }

    pub fn set_duration(&self, duration: f64) {
        lock(&self.state).duration = duration;
    }

    pub fn advance(&self, delta: f64) {
        lock(&self.state).time += delta;
    }

    pub fn time(&self) -> f64 {
        lock(&self.state).time
    }
}

impl PlaybackClock for ManualClock {
    fn current_time(&self) -> f64 {
        lock(&self.state).time
    }

    fn duration(&self) -> f64 {
        lock(&self.state).duration
    }

    fn seek_to(&mut self, time: f64) {
        lock(&self.state).time = time.max(0.0);
    }
}

pub struct NoopFollower;

impl WordFollower for NoopFollower {
    fn word_highlighted(&mut self, _token: &TextToken) {}
}

/// Follower that records the index of every token it is told about.
#[derive(Debug, Clone, Default)]
pub struct RecordingFollower {
    seen: Arc<Mutex<Vec<usize>>>,
}

impl RecordingFollower {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seen(&self) -> Vec<usize> {
        lock(&self.seen).clone()
    }
}

impl WordFollower for RecordingFollower {
    fn word_highlighted(&mut self, token: &TextToken) {
        lock(&self.seen).push(token.index);
    }
}
