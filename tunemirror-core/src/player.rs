//! Playback contract served to media-control exporters.
//!
//! [`QueuePlayer`] is the in-memory implementation: it tracks transport state
//! and drives the [`QueueController`], pushing a [`PlayerStatus`] on every
//! change. Audio output lives elsewhere.

use crate::error::{MirrorError, Result};
use crate::event::{Event, EventBus};
use crate::model::{Id, Song};
use crate::queue::QueueController;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::debug;

pub const MAX_VOLUME: u8 = 100;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerState {
    #[default]
    Stop,
    Play,
    Pause,
}

/// Status pushed to exporters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerStatus {
    pub state: PlayerState,
    pub song: Option<Song>,
    pub album: Option<Id>,
    pub artist: Option<String>,
    pub elapsed: Duration,
    pub volume: u8,
    pub muted: bool,
    pub paused: bool,
}

impl Default for PlayerStatus {
    fn default() -> Self {
        Self {
            state: PlayerState::Stop,
            song: None,
            album: None,
            artist: None,
            elapsed: Duration::ZERO,
            volume: MAX_VOLUME,
            muted: false,
            paused: false,
        }
    }
}

impl PlayerStatus {
    fn set_song(&mut self, song: Option<Song>) {
        self.album = song.as_ref().map(|s| s.album.clone());
        self.artist = song.as_ref().map(|s| s.display_artist().to_owned());
        self.song = song;
        self.elapsed = Duration::ZERO;
    }
}

pub trait Player: Send + Sync {
    fn play(&self) -> Result<()>;
    fn pause(&self) -> Result<()>;
    fn play_pause(&self) -> Result<()>;
    fn stop(&self) -> Result<()>;
    fn next(&self) -> Result<()>;
    fn previous(&self) -> Result<()>;
    fn seek(&self, position: Duration) -> Result<()>;
    fn set_volume(&self, volume: u8) -> Result<()>;
    fn set_mute(&self, muted: bool) -> Result<()>;
    fn status(&self) -> PlayerStatus;
}

#[derive(Debug)]
pub struct QueuePlayer {
    queue: Arc<QueueController>,
    status: Mutex<PlayerStatus>,
    events: EventBus,
}

impl QueuePlayer {
    pub fn new(queue: Arc<QueueController>, events: EventBus) -> Self {
        Self {
            queue,
            status: Mutex::new(PlayerStatus::default()),
            events,
        }
    }

    fn lock(&self) -> MutexGuard<'_, PlayerStatus> {
        self.status.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Apply `f` to the status and push the result.
    fn update(&self, f: impl FnOnce(&mut PlayerStatus)) {
        let snapshot = {
            let mut status = self.lock();
            f(&mut *status);
            status.paused = status.state == PlayerState::Pause;
            status.clone()
        };
        self.events.emit(Event::StatusChanged(snapshot));
    }

    /// Re-read the playing song after a queue move.
    fn follow_queue(&self) {
        let current = self.queue.current();
        self.update(|status| {
            if current.is_none() {
                status.state = PlayerState::Stop;
            }
            status.set_song(current);
        });
    }
}

impl Player for QueuePlayer {
    fn play(&self) -> Result<()> {
        let current = self
            .queue
            .current()
            .ok_or_else(|| MirrorError::InvalidState("queue is empty".to_owned()))?;
        debug!("Playing '{}'", current.name);
        self.update(|status| {
            if status.song.as_ref().map(|s| &s.id) != Some(&current.id) {
                status.set_song(Some(current));
            }
            status.state = PlayerState::Play;
        });
        Ok(())
    }

    fn pause(&self) -> Result<()> {
        self.update(|status| {
            if status.state == PlayerState::Play {
                status.state = PlayerState::Pause;
            }
        });
        Ok(())
    }

    fn play_pause(&self) -> Result<()> {
        let state = self.lock().state;
        match state {
            PlayerState::Play => self.pause(),
            PlayerState::Pause | PlayerState::Stop => self.play(),
        }
    }

    fn stop(&self) -> Result<()> {
        self.update(|status| {
            status.state = PlayerState::Stop;
            status.elapsed = Duration::ZERO;
        });
        Ok(())
    }

    fn next(&self) -> Result<()> {
        if self.queue.advance().is_none() {
            return Err(MirrorError::InvalidState("queue is empty".to_owned()));
        }
        self.follow_queue();
        Ok(())
    }

    fn previous(&self) -> Result<()> {
        if self.queue.previous().is_none() {
            return Err(MirrorError::InvalidState("history is empty".to_owned()));
        }
        self.follow_queue();
        Ok(())
    }

    fn seek(&self, position: Duration) -> Result<()> {
        let duration = match &self.lock().song {
            Some(song) => song.duration,
            None => return Err(MirrorError::InvalidState("nothing playing".to_owned())),
        };
        if position.as_secs() > u64::from(duration) {
            return Err(MirrorError::InvalidInput(format!(
                "seek to {}s beyond song length {}s",
                position.as_secs(),
                duration
            )));
        }
        self.update(|status| status.elapsed = position);
        Ok(())
    }

    fn set_volume(&self, volume: u8) -> Result<()> {
        self.update(|status| status.volume = volume.min(MAX_VOLUME));
        Ok(())
    }

    fn set_mute(&self, muted: bool) -> Result<()> {
        self.update(|status| status.muted = muted);
        Ok(())
    }

    fn status(&self) -> PlayerStatus {
        self.lock().clone()
    }
}
