// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
//! Transport time bookkeeping, independent of any device.
//!
//! While playing, the position is derived from the output clock relative to a clock
//! reference that corresponds to sample position 0. While not playing, the position is
//! the stored paused offset. Every method is total: calls that don't apply to the
//! current state do nothing.
use std::fmt;

/// The state of the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    /// Nothing is playing. The paused offset is the position.
    Idle,
    /// A chain is live and the position follows the clock.
    Playing,
    /// Playback ran to the end. Behaves like Idle at offset 0.
    Ended,
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self {
            TransportState::Idle => "idle",
            TransportState::Playing => "playing",
            TransportState::Ended => "ended",
        };
        write!(f, "{}", state)
    }
}

#[derive(Debug, Clone)]
pub struct Transport {
    state: TransportState,
    /// Output clock time of sample position 0 for the current run.
    clock_reference: f64,
    /// Position in seconds while not playing.
    paused_offset: f64,
    /// Length of the loaded buffer in seconds.
    duration: f64,
}

impl Transport {
    pub fn new(duration: f64) -> Transport {
        Transport {
            state: TransportState::Idle,
            clock_reference: 0.0,
            paused_offset: 0.0,
            duration: if duration.is_finite() {
                duration.max(0.0)
            } else {
                0.0
            },
        }
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == TransportState::Playing
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn paused_offset(&self) -> f64 {
        self.paused_offset
    }

    pub fn clock_reference(&self) -> f64 {
        self.clock_reference
    }

    /// Clamps a time to [0, duration]. NaN maps to 0.
    pub fn clamp(&self, seconds: f64) -> f64 {
        if seconds.is_nan() {
            return 0.0;
        }
        seconds.clamp(0.0, self.duration)
    }

    /// Enters Playing at the paused offset. Returns the offset the source should start
    /// at, or None if already playing.
    pub fn start(&mut self, now: f64) -> Option<f64> {
        if self.is_playing() {
            return None;
        }
        let offset = self.paused_offset;
        self.clock_reference = now - offset;
        self.state = TransportState::Playing;
        Some(offset)
    }

    /// Leaves Playing, freezing the position. Returns false if not playing.
    pub fn pause(&mut self, now: f64) -> bool {
        if !self.is_playing() {
            return false;
        }
        self.paused_offset = self.clamp(now - self.clock_reference);
        self.state = TransportState::Idle;
        true
    }

    /// Goes to Idle at offset 0 from any state.
    pub fn stop(&mut self) {
        self.paused_offset = 0.0;
        self.state = TransportState::Idle;
    }

    /// Sets the paused offset, clamped. Only valid while not playing; a seek while
    /// playing goes through pause and start. An Ended transport becomes Idle.
    pub fn set_offset(&mut self, seconds: f64) -> bool {
        if self.is_playing() {
            return false;
        }
        self.paused_offset = self.clamp(seconds);
        self.state = TransportState::Idle;
        true
    }

    /// The current position in seconds.
    pub fn position(&self, now: f64) -> f64 {
        if self.is_playing() {
            (now - self.clock_reference).clamp(0.0, self.duration)
        } else {
            self.paused_offset
        }
    }

    /// Handles a natural end of the source. If the clock says the run really reached the
    /// end (within tolerance), moves to Ended at offset 0 and returns true. Otherwise the
    /// signal is treated as spurious and nothing changes.
    pub fn complete(&mut self, now: f64, tolerance: f64) -> bool {
        if !self.is_playing() || now - self.clock_reference < self.duration - tolerance {
            return false;
        }
        self.paused_offset = 0.0;
        self.state = TransportState::Ended;
        true
    }
}
