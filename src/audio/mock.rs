// Copyright (C) 2025 Michael Wilson <mike@mdwn.dev>
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
use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, AtomicU32, Ordering},
        Arc,
    },
    time::Duration,
};

use tracing::{debug, info};

use super::chain::OutputChain;
use super::output::Output;
use super::pcm;

/// Frames rendered per block when the clock is advanced.
const BLOCK_FRAMES: usize = 512;

/// A mock device. Doesn't actually play anything. Its clock only moves when advanced,
/// and advancing renders the connected chain as a real device would.
pub struct Device {
    name: String,
    output: Output,
    released: AtomicBool,
    /// Peak absolute sample of the most recent advance, as f32 bits.
    peak: AtomicU32,
}

impl Device {
    /// Gets the given mock device with the speech service's format.
    pub fn get(name: &str) -> Device {
        Device::with_format(name, pcm::DEFAULT_SAMPLE_RATE, pcm::DEFAULT_CHANNELS)
    }

    /// Gets a mock device with the given format.
    pub fn with_format(name: &str, sample_rate: u32, channels: u16) -> Device {
        info!(device = name, sample_rate, channels, "Opened mock device.");
        Device {
            name: name.to_string(),
            output: Output::new(sample_rate, channels.max(1)),
            released: AtomicBool::new(false),
            peak: AtomicU32::new(0),
        }
    }

    /// Moves the clock forward, rendering whatever is connected.
    pub fn advance(&self, duration: Duration) {
        if self.is_released() {
            return;
        }

        let channels = usize::from(self.output.channels());
        let mut frames =
            (duration.as_secs_f64() * f64::from(self.output.sample_rate())).round() as usize;
        let mut block = vec![0.0f32; BLOCK_FRAMES * channels];
        let mut peak = 0.0f32;

        while frames > 0 {
            let len = frames.min(BLOCK_FRAMES);
            let data = &mut block[..len * channels];
            self.output.render(data);
            peak = data.iter().fold(peak, |peak, s| peak.max(s.abs()));
            frames -= len;
        }

        self.peak.store(peak.to_bits(), Ordering::Relaxed);
        debug!(device = self.name, now = self.output.now(), "Advanced mock clock.");
    }

    /// Returns true if the device is currently playing.
    pub fn is_playing(&self) -> bool {
        self.output.is_playing()
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Relaxed)
    }

    /// Peak absolute sample rendered by the last call to advance.
    pub fn last_peak(&self) -> f32 {
        f32::from_bits(self.peak.load(Ordering::Relaxed))
    }
}

impl super::Device for Device {
    fn now(&self) -> f64 {
        self.output.now()
    }

    fn sample_rate(&self) -> u32 {
        self.output.sample_rate()
    }

    fn channels(&self) -> u16 {
        self.output.channels()
    }

    fn connect(&self, chain: Arc<OutputChain>) {
        if !self.is_released() {
            self.output.connect(chain);
        }
    }

    fn disconnect(&self) {
        self.output.disconnect();
    }

    fn release(&self) {
        self.output.disconnect();
        if !self.released.swap(true, Ordering::Relaxed) {
            info!(device = self.name, "Released mock device.");
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name,)
    }
}
