//! Playback queue and history.
//!
//! Position 0 of the queue is the song currently playing. Advancing moves the
//! head onto the front of the history. Observers run on the mutating thread
//! after the lock has been released, so they may call back into the
//! controller.

use crate::model::Song;
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

pub const DEFAULT_HISTORY_LIMIT: usize = 100;

pub type QueueChangedFn = Arc<dyn Fn(&[Song]) + Send + Sync>;
pub type HistoryChangedFn = Arc<dyn Fn(&[Song]) + Send + Sync>;

/// Handle returned by [`QueueController::subscribe_queue_changed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Default)]
struct QueueState {
    songs: Vec<Song>,
    history: VecDeque<Song>,
    history_limit: usize,
    version: u32,
    next_subscription: u64,
    queue_observers: Vec<(SubscriptionId, QueueChangedFn)>,
    history_observer: Option<HistoryChangedFn>,
}

impl QueueState {
    fn touch(&mut self) {
        self.version = self.version.wrapping_add(1);
    }

    fn push_history(&mut self, song: Song) {
        self.history.push_front(song);
        self.history.truncate(self.history_limit);
    }
}

/// Collected under the lock, delivered after it is released.
#[derive(Default)]
struct Notification {
    queue: Option<(Vec<Song>, Vec<QueueChangedFn>)>,
    history: Option<(Vec<Song>, HistoryChangedFn)>,
}

impl Notification {
    fn queue(state: &QueueState) -> Self {
        Self::default().with_queue(state)
    }

    fn with_queue(mut self, state: &QueueState) -> Self {
        let observers = state
            .queue_observers
            .iter()
            .map(|(_, f)| Arc::clone(f))
            .collect();
        self.queue = Some((state.songs.clone(), observers));
        self
    }

    fn with_history(mut self, state: &QueueState) -> Self {
        if let Some(f) = &state.history_observer {
            self.history = Some((state.history.iter().cloned().collect(), Arc::clone(f)));
        }
        self
    }

    fn deliver(self) {
        if let Some((songs, observers)) = self.queue {
            for observer in observers {
                observer(&songs);
            }
        }
        if let Some((history, observer)) = self.history {
            observer(&history);
        }
    }
}

pub struct QueueController {
    state: Mutex<QueueState>,
}

impl fmt::Debug for QueueController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("QueueController")
            .field("queued", &state.songs.len())
            .field("history", &state.history.len())
            .field("version", &state.version)
            .finish_non_exhaustive()
    }
}

impl Default for QueueController {
    fn default() -> Self {
        Self::new()
    }
}

impl QueueController {
    pub fn new() -> Self {
        Self::with_history_limit(DEFAULT_HISTORY_LIMIT)
    }

    pub fn with_history_limit(history_limit: usize) -> Self {
        Self {
            state: Mutex::new(QueueState {
                history_limit,
                ..Default::default()
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        // A panicking observer never runs under the lock, so the state is intact.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Applies `f` under the lock and notifies observers after releasing it.
    fn mutate<R>(&self, f: impl FnOnce(&mut QueueState) -> (R, Notification)) -> R {
        let (result, notification) = {
            let mut state = self.lock();
            f(&mut *state)
        };
        notification.deliver();
        result
    }

    pub fn queue(&self) -> Vec<Song> {
        self.lock().songs.clone()
    }

    pub fn current(&self) -> Option<Song> {
        self.lock().songs.first().cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().songs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().songs.is_empty()
    }

    /// Bumped on every queue mutation.
    pub fn version(&self) -> u32 {
        self.lock().version
    }

    /// Remove every queued song. With `first == false` the playing song stays.
    pub fn clear_queue(&self, first: bool) {
        self.mutate(|state| {
            if first || state.songs.is_empty() {
                state.songs.clear();
            } else {
                state.songs.truncate(1);
            }
            state.touch();
            debug!("Queue cleared (first: {}), {} left", first, state.songs.len());
            ((), Notification::queue(state))
        })
    }

    pub fn add_songs(&self, songs: Vec<Song>) {
        self.mutate(|state| {
            debug!("Appending {} songs to queue", songs.len());
            state.songs.extend(songs);
            state.touch();
            ((), Notification::queue(state))
        })
    }

    /// Insert right after the playing song. An empty queue is simply filled.
    pub fn play_next(&self, songs: Vec<Song>) {
        self.mutate(|state| {
            let at = state.songs.len().min(1);
            debug!("Inserting {} songs at position {}", songs.len(), at);
            state.songs.splice(at..at, songs);
            state.touch();
            ((), Notification::queue(state))
        })
    }

    /// Swap the song at `index` with its earlier or later neighbour.
    pub fn reorder(&self, index: usize, move_earlier: bool) -> bool {
        self.mutate(|state| {
            let target = if move_earlier {
                index.checked_sub(1)
            } else {
                index.checked_add(1)
            };
            match target {
                Some(target) if index < state.songs.len() && target < state.songs.len() => {
                    state.songs.swap(index, target);
                    state.touch();
                    (true, Notification::queue(state))
                }
                _ => (false, Notification::default()),
            }
        })
    }

    /// Out-of-range indices are ignored. Index 0 removes the playing song.
    pub fn remove_song(&self, index: usize) {
        self.mutate(|state| {
            if index >= state.songs.len() {
                return ((), Notification::default());
            }
            let song = state.songs.remove(index);
            debug!("Removed '{}' from queue position {}", song.name, index);
            state.touch();
            ((), Notification::queue(state))
        })
    }

    /// Most recent first, at most `n` entries.
    pub fn history(&self, n: usize) -> Vec<Song> {
        self.lock().history.iter().take(n).cloned().collect()
    }

    /// Move the playing song to the history and return it.
    pub fn advance(&self) -> Option<Song> {
        self.mutate(|state| {
            if state.songs.is_empty() {
                return (None, Notification::default());
            }
            let song = state.songs.remove(0);
            state.push_history(song.clone());
            state.touch();
            let notification = Notification::queue(state).with_history(state);
            (Some(song), notification)
        })
    }

    /// Put the most recently played song back at the head of the queue.
    pub fn previous(&self) -> Option<Song> {
        self.mutate(|state| {
            let Some(song) = state.history.pop_front() else {
                return (None, Notification::default());
            };
            state.songs.insert(0, song.clone());
            state.touch();
            let notification = Notification::queue(state).with_history(state);
            (Some(song), notification)
        })
    }

    /// Observers are called in registration order.
    pub fn subscribe_queue_changed<F>(&self, f: F) -> SubscriptionId
    where
        F: Fn(&[Song]) + Send + Sync + 'static,
    {
        let mut state = self.lock();
        let id = SubscriptionId(state.next_subscription);
        state.next_subscription += 1;
        state.queue_observers.push((id, Arc::new(f)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut state = self.lock();
        let before = state.queue_observers.len();
        state.queue_observers.retain(|(sid, _)| *sid != id);
        state.queue_observers.len() != before
    }

    /// Replaces any previously registered history observer.
    pub fn set_history_changed_callback<F>(&self, f: F)
    where
        F: Fn(&[Song]) + Send + Sync + 'static,
    {
        self.lock().history_observer = Some(Arc::new(f));
    }
}
