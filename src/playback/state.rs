//! Playback state and session control flags
//!
//! The controller thread and the run loop coordinate through a
//! [`SessionControl`]: pause/stop booleans under one mutex plus a condvar so
//! a paused loop sleeps until woken instead of polling. Flags are never
//! reset by the run loop; every session gets a fresh control, so no
//! controller request can be lost inside a session's lifetime.

use std::sync::{Condvar, Mutex};

/// Playback engine state.
///
/// `Stopped` is the brief teardown window between a stop request being
/// observed and the session releasing its sink; `stop()` returns only after
/// full retirement, so callers normally observe `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Playing,
    Paused,
    Stopped,
}

#[derive(Debug, Default)]
struct ControlFlags {
    paused: bool,
    stopped: bool,
}

/// Shared pause/stop signaling between controller and run loop.
#[derive(Debug, Default)]
pub struct SessionControl {
    flags: Mutex<ControlFlags>,
    cond: Condvar,
}

impl SessionControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request that the run loop idle between frames.
    pub fn pause(&self) {
        self.flags.lock().unwrap().paused = true;
        self.cond.notify_all();
    }

    /// Wake a paused run loop.
    pub fn resume(&self) {
        self.flags.lock().unwrap().paused = false;
        self.cond.notify_all();
    }

    /// Request session termination. Effective even while paused.
    pub fn stop(&self) {
        self.flags.lock().unwrap().stopped = true;
        self.cond.notify_all();
    }

    pub fn is_paused(&self) -> bool {
        self.flags.lock().unwrap().paused
    }

    pub fn is_stopped(&self) -> bool {
        self.flags.lock().unwrap().stopped
    }

    /// Gate called at the top of every frame iteration.
    ///
    /// Blocks (without polling) while paused; returns `true` as soon as a
    /// stop request is visible, whether it arrived before, during, or
    /// instead of a pause.
    pub fn wait_while_paused(&self) -> bool {
        let mut flags = self.flags.lock().unwrap();
        while flags.paused && !flags.stopped {
            flags = self.cond.wait(flags).unwrap();
        }
        flags.stopped
    }
}
