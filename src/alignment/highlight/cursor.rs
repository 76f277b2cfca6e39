use std::collections::HashSet;

/// Per-pairing highlighting progress.
///
/// Within one tracking session `last_highlighted_index` and the highlighted
/// set only grow; `reset` is the single way to shrink them.
#[derive(Debug, Clone, PartialEq)]
pub struct HighlightCursor {
    /// One past the furthest highlighted token: the next token to paint.
    last_highlighted_index: usize,
    highlighted: Vec<bool>,
    highlighted_count: usize,
    next_timing_to_consider: usize,
    processed_timings: HashSet<usize>,
    initial_phase_done: bool,
    last_catch_up: Option<usize>,
}

impl HighlightCursor {
    pub fn new(token_count: usize) -> Self {
        Self {
            last_highlighted_index: 0,
            highlighted: vec![false; token_count],
            highlighted_count: 0,
            next_timing_to_consider: 0,
            processed_timings: HashSet::new(),
            initial_phase_done: false,
            last_catch_up: None,
        }
    }

    pub fn last_highlighted_index(&self) -> usize {
        self.last_highlighted_index
    }

    pub fn next_timing_to_consider(&self) -> usize {
        self.next_timing_to_consider
    }

    pub fn is_initial_phase_done(&self) -> bool {
        self.initial_phase_done
    }

    pub fn is_processed(&self, timed_index: usize) -> bool {
        self.processed_timings.contains(&timed_index)
    }

    pub fn is_highlighted(&self, index: usize) -> bool {
        self.highlighted.get(index).copied().unwrap_or(false)
    }

    pub fn highlighted_count(&self) -> usize {
        self.highlighted_count
    }

    pub fn token_count(&self) -> usize {
        self.highlighted.len()
    }

    pub fn is_complete(&self) -> bool {
        self.highlighted_count == self.highlighted.len()
    }

    pub fn highlighted_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.highlighted
            .iter()
            .enumerate()
            .filter_map(|(i, &on)| on.then_some(i))
    }

    pub(crate) fn reset(&mut self) {
        self.last_highlighted_index = 0;
        self.highlighted.iter_mut().for_each(|h| *h = false);
        self.highlighted_count = 0;
        self.next_timing_to_consider = 0;
        self.processed_timings.clear();
        self.initial_phase_done = false;
        self.last_catch_up = None;
    }

    /// Returns true when the token was not highlighted before.
    pub(crate) fn mark(&mut self, index: usize) -> bool {
        match self.highlighted.get_mut(index) {
            Some(slot) if !*slot => {
                *slot = true;
                self.highlighted_count += 1;
                true
            }
            _ => false,
        }
    }

    pub(crate) fn advance_last_to(&mut self, next: usize) {
        self.last_highlighted_index = self.last_highlighted_index.max(next);
    }

    pub(crate) fn mark_processed(&mut self, timed_index: usize) -> bool {
        self.processed_timings.insert(timed_index)
    }

    pub(crate) fn set_next_timing(&mut self, next: usize) {
        self.next_timing_to_consider = next;
    }

    pub(crate) fn finish_initial_phase(&mut self) {
        self.initial_phase_done = true;
    }

    pub(crate) fn last_catch_up(&self) -> Option<usize> {
        self.last_catch_up
    }

    pub(crate) fn set_last_catch_up(&mut self, timed_index: usize) {
        self.last_catch_up = Some(timed_index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mark_counts_each_token_once() {
        let mut cursor = HighlightCursor::new(3);
        assert!(cursor.mark(1));
        assert!(!cursor.mark(1));
        assert!(!cursor.mark(7));
        assert_eq!(cursor.highlighted_count(), 1);
        assert_eq!(cursor.highlighted_indices().collect::<Vec<_>>(), [1]);
    }

    #[test]
    fn last_index_never_moves_backwards() {
        let mut cursor = HighlightCursor::new(5);
        cursor.advance_last_to(3);
        cursor.advance_last_to(1);
        assert_eq!(cursor.last_highlighted_index(), 3);
    }

    #[test]
    fn reset_clears_everything() {
        let mut cursor = HighlightCursor::new(2);
        cursor.mark(0);
        cursor.advance_last_to(1);
        cursor.mark_processed(4);
        cursor.set_next_timing(5);
        cursor.finish_initial_phase();
        cursor.set_last_catch_up(4);
        cursor.reset();
        assert_eq!(cursor, HighlightCursor::new(2));
    }
}
