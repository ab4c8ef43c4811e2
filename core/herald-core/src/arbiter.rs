//! Refresh arbiter: debounces one-shot refreshes and tracks the stream.
//!
//! A refresh and the live stream run side by side after activation; the
//! arbiter only decides whether a new refresh may start and whether a
//! finished one still belongs to the current activation.
//!
//! The debounce window is measured from request time: `last_refresh` moves
//! when a refresh starts, not when it completes.

use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Refreshing,
    Streaming,
}

/// Proof that a refresh was started, tied to the activation that started it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshTicket {
    epoch: u64,
}

#[derive(Debug)]
pub struct RefreshArbiter {
    guard: Duration,
    last_refresh: Option<Instant>,
    active: bool,
    epoch: u64,
    in_flight: usize,
    streaming: bool,
}

impl RefreshArbiter {
    pub fn new(guard: Duration) -> Self {
        Self {
            guard,
            last_refresh: None,
            active: false,
            epoch: 0,
            in_flight: 0,
            streaming: false,
        }
    }

    pub fn activate(&mut self) {
        self.active = true;
    }

    /// Forces `Idle`. Refreshes still in flight become stale.
    pub fn deactivate(&mut self) {
        self.active = false;
        self.epoch += 1;
        self.in_flight = 0;
        self.streaming = false;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Starts a refresh unless inactive or inside the guard window.
    pub fn try_begin_refresh(&mut self, now: Instant) -> Option<RefreshTicket> {
        if !self.active {
            return None;
        }
        if let Some(last) = self.last_refresh {
            if now.saturating_duration_since(last) < self.guard {
                return None;
            }
        }
        self.last_refresh = Some(now);
        self.in_flight += 1;
        Some(RefreshTicket { epoch: self.epoch })
    }

    /// Records a completed refresh. Returns false if its result must be
    /// ignored because the arbiter was deactivated since it started.
    pub fn finish_refresh(&mut self, ticket: RefreshTicket) -> bool {
        if ticket.epoch != self.epoch {
            return false;
        }
        self.in_flight = self.in_flight.saturating_sub(1);
        true
    }

    pub fn stream_opened(&mut self) {
        self.streaming = true;
    }

    pub fn stream_closed(&mut self) {
        self.streaming = false;
    }

    pub fn refreshes_in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn last_refresh(&self) -> Option<Instant> {
        self.last_refresh
    }

    pub fn phase(&self) -> Phase {
        if self.streaming {
            Phase::Streaming
        } else if self.in_flight > 0 {
            Phase::Refreshing
        } else {
            Phase::Idle
        }
    }
}
