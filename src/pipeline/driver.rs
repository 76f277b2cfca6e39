use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};

use crate::config::HighlightConfig;
use crate::pipeline::session::ReadAlongSession;
use crate::types::SeekOutcome;

/// Playback clock notifications and user commands, applied between ticks.
#[derive(Debug)]
pub enum PlaybackEvent {
    Play,
    Pause,
    Seek(f64),
    End,
    SeekToParagraph {
        text: String,
        reply: oneshot::Sender<SeekOutcome>,
    },
    Shutdown,
}

/// Sending side of a playback loop. Cheap to clone; every method is a no-op
/// once the loop has stopped.
#[derive(Debug, Clone)]
pub struct PlaybackHandle {
    tx: mpsc::UnboundedSender<PlaybackEvent>,
}

pub fn playback_channel() -> (PlaybackHandle, mpsc::UnboundedReceiver<PlaybackEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (PlaybackHandle { tx }, rx)
}

impl PlaybackHandle {
    /// Returns false when the loop is gone.
    pub fn send(&self, event: PlaybackEvent) -> bool {
        self.tx.send(event).is_ok()
    }

    pub fn play(&self) -> bool {
        self.send(PlaybackEvent::Play)
    }

    pub fn pause(&self) -> bool {
        self.send(PlaybackEvent::Pause)
    }

    pub fn seek(&self, time: f64) -> bool {
        self.send(PlaybackEvent::Seek(time))
    }

    pub fn end(&self) -> bool {
        self.send(PlaybackEvent::End)
    }

    pub async fn seek_to_paragraph(&self, text: impl Into<String>) -> Option<SeekOutcome> {
        let (reply, rx) = oneshot::channel();
        if !self.send(PlaybackEvent::SeekToParagraph {
            text: text.into(),
            reply,
        }) {
            return None;
        }
        rx.await.ok()
    }

    pub fn shutdown(&self) {
        let _ = self.tx.send(PlaybackEvent::Shutdown);
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Own the session until shutdown: apply events first, tick on the poll
/// interval only while tracking. Returns the number of ticks run.
pub async fn run_playback_loop(
    session: &mut ReadAlongSession,
    mut events: mpsc::UnboundedReceiver<PlaybackEvent>,
) -> u64 {
    let period_ms = session
        .config()
        .highlight
        .poll_interval_ms
        .clamp(1, HighlightConfig::MAX_POLL_INTERVAL_MS);
    let mut timer = interval(Duration::from_millis(period_ms));
    timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut ticks = 0u64;

    tracing::info!(period_ms, "driver: playback loop started");

    loop {
        tokio::select! {
            biased;

            event = events.recv() => match event {
                None | Some(PlaybackEvent::Shutdown) => break,
                Some(event) => apply_event(session, event),
            },

            _ = timer.tick(), if session.is_tracking() => {
                session.tick();
                ticks += 1;
            }
        }
    }

    session.on_pause();
    events.close();
    tracing::info!(ticks, "driver: playback loop stopped");
    ticks
}

fn apply_event(session: &mut ReadAlongSession, event: PlaybackEvent) {
    match event {
        PlaybackEvent::Play => session.on_play(),
        PlaybackEvent::Pause => session.on_pause(),
        PlaybackEvent::Seek(time) => {
            session.seek_to(time);
        }
        PlaybackEvent::End => session.on_end(),
        PlaybackEvent::SeekToParagraph { text, reply } => {
            let outcome = session.seek_to_paragraph(&text, None);
            if reply.send(outcome).is_err() {
                tracing::debug!("driver: paragraph seek caller went away");
            }
        }
        PlaybackEvent::Shutdown => {}
    }
}

/// A playback loop running on its own task.
pub struct PlaybackTask {
    handle: PlaybackHandle,
    task: Option<JoinHandle<ReadAlongSession>>,
}

impl PlaybackTask {
    pub fn spawn(mut session: ReadAlongSession) -> Self {
        let (handle, events) = playback_channel();
        let task = tokio::spawn(async move {
            run_playback_loop(&mut session, events).await;
            session
        });
        Self {
            handle,
            task: Some(task),
        }
    }

    pub fn handle(&self) -> PlaybackHandle {
        self.handle.clone()
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stop the loop and hand the session back. Later calls return `None`.
    pub async fn stop(&mut self) -> Option<ReadAlongSession> {
        self.handle.shutdown();
        let task = self.task.take()?;
        match task.await {
            Ok(session) => Some(session),
            Err(e) => {
                tracing::error!(error = %e, "driver: playback task failed");
                None
            }
        }
    }
}
