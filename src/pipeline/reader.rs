use crate::alignment::highlight::SeekResolution;
use crate::error::ReadAlongError;
use crate::pipeline::session::ReadAlongSession;
use crate::pipeline::traits::WordFollower;

pub const DEFAULT_SKIP_SECONDS: f64 = 10.0;

/// Many document/audio pairings, at most one of them active.
///
/// Switching pages pauses every other page before the word follower moves,
/// so no two pages ever drive the follower at once.
pub struct MultiPageReader {
    pages: Vec<ReadAlongSession>,
    active: Option<usize>,
    follower: Option<Box<dyn WordFollower>>,
}

impl MultiPageReader {
    pub fn new(pages: Vec<ReadAlongSession>, follower: Option<Box<dyn WordFollower>>) -> Self {
        Self {
            pages,
            active: None,
            follower,
        }
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn active(&self) -> Option<usize> {
        self.active
    }

    pub fn page(&self, index: usize) -> Option<&ReadAlongSession> {
        self.pages.get(index)
    }

    pub fn active_session(&self) -> Option<&ReadAlongSession> {
        self.active.and_then(|i| self.pages.get(i))
    }

    pub fn active_session_mut(&mut self) -> Option<&mut ReadAlongSession> {
        match self.active {
            Some(i) => self.pages.get_mut(i),
            None => None,
        }
    }

    pub fn set_active(&mut self, index: usize) -> Result<(), ReadAlongError> {
        if index >= self.pages.len() {
            return Err(ReadAlongError::PageOutOfRange {
                index,
                len: self.pages.len(),
            });
        }

        for (k, page) in self.pages.iter_mut().enumerate() {
            if k != index {
                page.on_pause();
            }
        }

        let previous = self.active.replace(index);
        if let Some(prev) = previous.filter(|&p| p != index) {
            if let Some(follower) = self.pages[prev].detach_follower() {
                self.follower = Some(follower);
            }
        }
        if let Some(follower) = self.follower.take() {
            self.pages[index].attach_follower(follower);
        }

        if previous != Some(index) {
            tracing::info!(
                page = index,
                previous = ?previous,
                "reader: active page changed"
            );
        }
        Ok(())
    }

    pub fn play(&mut self) -> Result<(), ReadAlongError> {
        let index = self.active.ok_or(ReadAlongError::NoActivePage)?;
        for (k, page) in self.pages.iter_mut().enumerate() {
            if k != index {
                page.on_pause();
            }
        }
        self.pages[index].on_play();
        Ok(())
    }

    pub fn pause(&mut self) {
        if let Some(page) = self.active_session_mut() {
            page.on_pause();
        }
    }

    /// Returns whether the active page is now playing.
    pub fn toggle(&mut self) -> Result<bool, ReadAlongError> {
        let playing = self
            .active_session()
            .ok_or(ReadAlongError::NoActivePage)?
            .is_tracking();
        if playing {
            self.pause();
            Ok(false)
        } else {
            self.play()?;
            Ok(true)
        }
    }

    pub fn seek(&mut self, time: f64) -> Result<Option<SeekResolution>, ReadAlongError> {
        let page = self.active_session_mut().ok_or(ReadAlongError::NoActivePage)?;
        Ok(page.seek_to(time))
    }

    pub fn forward(&mut self, seconds: f64) -> Result<Option<SeekResolution>, ReadAlongError> {
        let now = self.current_time();
        self.seek(now + seconds)
    }

    pub fn rewind(&mut self, seconds: f64) -> Result<Option<SeekResolution>, ReadAlongError> {
        let now = self.current_time();
        self.seek((now - seconds).max(0.0))
    }

    pub fn current_time(&self) -> f64 {
        self.active_session().map_or(0.0, ReadAlongSession::current_time)
    }

    pub fn duration(&self) -> f64 {
        self.active_session().map_or(0.0, ReadAlongSession::duration)
    }

    pub fn poll(&mut self) -> Vec<usize> {
        self.active_session_mut()
            .map(ReadAlongSession::poll)
            .unwrap_or_default()
    }

    /// Finish the active page and move to the next one. Returns false on the last page.
    pub fn next_page(&mut self, autoplay: bool) -> Result<bool, ReadAlongError> {
        let index = self.active.ok_or(ReadAlongError::NoActivePage)?;
        self.pages[index].on_end();
        if index + 1 >= self.pages.len() {
            tracing::info!(page = index, "reader: last page finished");
            return Ok(false);
        }
        self.set_active(index + 1)?;
        if autoplay {
            self.play()?;
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReadAlongConfig;
    use crate::pipeline::builder::ReadAlongBuilder;
    use crate::pipeline::defaults::{ManualClock, MemorySurface, RecordingFollower};
    use crate::types::{DocumentLeaf, TimedWord};

    fn page(text: &str) -> (ReadAlongSession, ManualClock) {
        let clock = ManualClock::new(30.0);
        let words = text
            .split_whitespace()
            .enumerate()
            .map(|(i, w)| TimedWord::new(w, i as f64 * 0.5, i as f64 * 0.5 + 0.4))
            .collect();
        let session = ReadAlongBuilder::new(ReadAlongConfig::default())
            .with_document(vec![DocumentLeaf::new(text, 0)])
            .with_transcript_words(words)
            .build(Box::new(clock.clone()), Box::new(MemorySurface::new()))
            .unwrap();
        (session, clock)
    }

    fn reader(follower: &RecordingFollower) -> (MultiPageReader, Vec<ManualClock>) {
        let (a, ca) = page("first page words");
        let (b, cb) = page("second page words");
        (
            MultiPageReader::new(vec![a, b], Some(Box::new(follower.clone()))),
            vec![ca, cb],
        )
    }

    #[test]
    fn switching_pages_pauses_previous_and_moves_follower() {
        let follower = RecordingFollower::new();
        let (mut r, clocks) = reader(&follower);
        r.set_active(0).unwrap();
        r.play().unwrap();
        clocks[0].set_time(0.1);
        r.poll();

        r.set_active(1).unwrap();
        assert!(!r.page(0).unwrap().is_tracking());
        r.play().unwrap();
        clocks[1].set_time(0.6);
        r.poll();
        assert_eq!(follower.seen(), [0, 1]);
        assert_eq!(r.active(), Some(1));
    }

    #[test]
    fn commands_require_an_active_page() {
        let follower = RecordingFollower::new();
        let (mut r, _) = reader(&follower);
        assert!(matches!(r.play(), Err(ReadAlongError::NoActivePage)));
        assert!(matches!(
            r.set_active(7),
            Err(ReadAlongError::PageOutOfRange { index: 7, len: 2 })
        ));
        assert!(r.poll().is_empty());
    }

    #[test]
    fn toggle_flips_playback() {
        let follower = RecordingFollower::new();
        let (mut r, _) = reader(&follower);
        r.set_active(0).unwrap();
        assert!(r.toggle().unwrap());
        assert!(!r.toggle().unwrap());
    }

    #[test]
    fn forward_and_rewind_clamp_to_audio() {
        let follower = RecordingFollower::new();
        let (mut r, clocks) = reader(&follower);
        r.set_active(0).unwrap();
        r.forward(DEFAULT_SKIP_SECONDS).unwrap();
        assert_eq!(clocks[0].time(), 10.0);
        r.forward(25.0).unwrap();
        assert_eq!(clocks[0].time(), 30.0);
        r.rewind(45.0).unwrap();
        assert_eq!(clocks[0].time(), 0.0);
    }

    #[test]
    fn next_page_finishes_current_and_autoplays() {
        let follower = RecordingFollower::new();
        let (mut r, _) = reader(&follower);
        r.set_active(0).unwrap();
        assert!(r.next_page(true).unwrap());
        assert!(r.page(0).unwrap().cursor().is_complete());
        assert!(r.active_session().unwrap().is_tracking());
        assert!(!r.next_page(false).unwrap());
    }
}
