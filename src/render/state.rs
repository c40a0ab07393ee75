//! Render session state machine
//!
//! Tracks a render session from creation to shutdown:
//! `Idle → Running → Draining → Stopped`.

use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Render session lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Waiting for the stream format
    Idle,
    /// Delivering events to the device
    Running,
    /// Cancellation or stream closure seen; finishing in-flight work
    Draining,
    /// Session finished
    Stopped,
}

/// Why a render stage or session ended without error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Upstream channel closed and everything queued was handled
    Closed,
    /// Cancellation observed
    Cancelled,
}

#[derive(Debug)]
struct Inner {
    phase: SessionPhase,
    created_at: Instant,
    running_at: Option<Instant>,
    stopped_at: Option<Instant>,
}

/// Shared session state, observable while the session runs
#[derive(Debug)]
pub struct SessionState {
    inner: Mutex<Inner>,
}

impl SessionState {
    /// Create a new state in `Idle`
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                phase: SessionPhase::Idle,
                created_at: Instant::now(),
                running_at: None,
                stopped_at: None,
            }),
        }
    }

    /// Current phase
    pub fn phase(&self) -> SessionPhase {
        self.inner.lock().phase
    }

    /// Transition `Idle → Running`
    pub fn start(&self) -> bool {
        let mut inner = self.inner.lock();
        if inner.phase != SessionPhase::Idle {
            return false;
        }
        inner.phase = SessionPhase::Running;
        inner.running_at = Some(Instant::now());
        true
    }

    /// Transition `Running → Draining`
    pub fn drain(&self) -> bool {
        let mut inner = self.inner.lock();
        if inner.phase != SessionPhase::Running {
            return false;
        }
        inner.phase = SessionPhase::Draining;
        true
    }

    /// Move to the terminal `Stopped` phase from anywhere
    pub fn stop(&self) {
        let mut inner = self.inner.lock();
        if inner.phase != SessionPhase::Stopped {
            inner.phase = SessionPhase::Stopped;
            inner.stopped_at = Some(Instant::now());
        }
    }

    /// Check if the session is delivering or draining
    pub fn is_active(&self) -> bool {
        matches!(
            self.phase(),
            SessionPhase::Running | SessionPhase::Draining
        )
    }

    /// Time spent since entering `Running`, up to `Stopped`
    pub fn running_duration(&self) -> Duration {
        let inner = self.inner.lock();
        match inner.running_at {
            Some(start) => inner
                .stopped_at
                .unwrap_or_else(Instant::now)
                .duration_since(start),
            None => Duration::ZERO,
        }
    }

    /// Time since the session was created
    pub fn age(&self) -> Duration {
        self.inner.lock().created_at.elapsed()
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}
