//! Playlist controller
//!
//! Thin sequencing layer over one [`PlaybackEngine`]: an ordered track list,
//! a cursor, and a loop flag. The embedder owns the controller thread and
//! drives `advance()` from `TrackFinished` events; the engine's start
//! semantics (retire-then-start) make re-entrancy safe.

use crate::error::{Error, Result};
use crate::playback::engine::PlaybackEngine;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// One playlist entry.
#[derive(Debug, Clone)]
pub struct TrackEntry {
    pub id: Uuid,
    pub path: PathBuf,
}

/// Ordered track list plus cursor and loop flag over one engine.
pub struct Playlist {
    engine: Arc<PlaybackEngine>,
    tracks: Vec<TrackEntry>,
    current: usize,
    looping: bool,
}

impl Playlist {
    pub fn new(engine: Arc<PlaybackEngine>) -> Self {
        Self {
            engine,
            tracks: Vec::new(),
            current: 0,
            looping: false,
        }
    }

    /// Append a track; returns its entry id.
    pub fn add(&mut self, path: impl AsRef<Path>) -> Uuid {
        let entry = TrackEntry {
            id: Uuid::new_v4(),
            path: path.as_ref().to_path_buf(),
        };
        let id = entry.id;
        debug!("Added track {} ({})", id, entry.path.display());
        self.tracks.push(entry);
        id
    }

    /// Remove the track at `index`.
    ///
    /// Removing the currently-playing entry stops the session; removing an
    /// entry before the cursor shifts the cursor down by one so it keeps
    /// pointing at the same logical track.
    pub fn remove(&mut self, index: usize) -> Result<TrackEntry> {
        if index >= self.tracks.len() {
            return Err(Error::Playback(format!(
                "Track index {} out of range (len {})",
                index,
                self.tracks.len()
            )));
        }

        let entry = self.tracks.remove(index);

        if index == self.current && self.engine.is_active() {
            info!("Removed the playing track {}; stopping", entry.id);
            self.engine.stop();
        } else if index < self.current {
            self.current -= 1;
        }

        if self.current >= self.tracks.len() {
            self.current = 0;
        }

        Ok(entry)
    }

    /// Remove every track, stopping any active session.
    pub fn clear(&mut self) {
        if self.engine.is_active() {
            self.engine.stop();
        }
        self.tracks.clear();
        self.current = 0;
    }

    /// Set the cursor and start that track, retiring any active session.
    pub fn select_and_play(&mut self, index: usize) -> Result<Uuid> {
        if index >= self.tracks.len() {
            return Err(Error::Playback(format!(
                "Track index {} out of range (len {})",
                index,
                self.tracks.len()
            )));
        }

        self.current = index;
        let path = self.tracks[index].path.clone();
        self.engine.play_file(&path)
    }

    /// React to a natural end-of-track.
    ///
    /// With the loop flag set, steps to the next track (wrapping to the
    /// start) and begins playing it; returns `true`. Otherwise the engine is
    /// left `Idle` and `false` is returned.
    pub fn advance(&mut self) -> Result<bool> {
        if self.tracks.is_empty() || !self.looping {
            return Ok(false);
        }

        let next = (self.current + 1) % self.tracks.len();
        self.select_and_play(next)?;
        Ok(true)
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    pub fn looping(&self) -> bool {
        self.looping
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current(&self) -> Option<&TrackEntry> {
        self.tracks.get(self.current)
    }

    pub fn tracks(&self) -> &[TrackEntry] {
        &self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn engine(&self) -> &Arc<PlaybackEngine> {
        &self.engine
    }
}
