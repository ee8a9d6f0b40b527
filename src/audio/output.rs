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
//! The output bus shared by every device implementation. It holds the single live
//! chain and counts rendered frames, which is the device's clock.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use parking_lot::Mutex;

use super::chain::{OutputChain, SourceState};

/// The device side of the output: one chain slot and a frame clock.
pub struct Output {
    sample_rate: u32,
    channels: u16,
    chain: Mutex<Option<Arc<OutputChain>>>,
    /// Frames rendered since the output was opened.
    frames: AtomicU64,
}

impl Output {
    pub fn new(sample_rate: u32, channels: u16) -> Output {
        Output {
            sample_rate,
            channels,
            chain: Mutex::new(None),
            frames: AtomicU64::new(0),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Seconds of audio rendered so far.
    pub fn now(&self) -> f64 {
        self.frames.load(Ordering::Acquire) as f64 / f64::from(self.sample_rate)
    }

    /// Replaces the live chain.
    pub fn connect(&self, chain: Arc<OutputChain>) {
        *self.chain.lock() = Some(chain);
    }

    pub fn disconnect(&self) {
        *self.chain.lock() = None;
    }

    /// Returns true if a chain is connected and its source is still running.
    pub fn is_playing(&self) -> bool {
        self.chain
            .lock()
            .as_ref()
            .is_some_and(|chain| chain.source().state() == SourceState::Running)
    }

    /// Fills an interleaved device buffer and advances the clock. The clock moves
    /// whether or not anything is connected.
    ///
    /// The chain slot is only tried, never waited on, so the render path can't be held
    /// up by the controller swapping chains. A missed slot renders silence.
    pub fn render(&self, data: &mut [f32]) {
        data.fill(0.0);

        let chain = self.chain.try_lock().and_then(|slot| slot.clone());
        if let Some(chain) = chain {
            chain.render(data, self.channels);
        }

        let frames = data.len() / usize::from(self.channels.max(1));
        self.frames.fetch_add(frames as u64, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use crossbeam_channel::unbounded;

    use super::*;
    use crate::audio::{analyser::AnalyserSettings, buffer::SampleBuffer};

    #[test]
    fn test_clock_advances_without_chain() {
        let output = Output::new(24000, 2);
        let mut data = vec![1.0; 2 * 12000];
        output.render(&mut data);

        assert_eq!(output.now(), 0.5);
        assert!(data.iter().all(|s| *s == 0.0));
        assert!(!output.is_playing());
    }

    #[test]
    fn test_render_connected_chain() {
        let output = Output::new(10, 1);
        let (tx, _rx) = unbounded();
        let buffer = Arc::new(SampleBuffer::new(vec![vec![0.5; 5]], 10).unwrap());
        let chain =
            Arc::new(OutputChain::new(1, buffer, 1.0, AnalyserSettings::default(), tx).unwrap());
        chain.start(0.0).unwrap();
        output.connect(chain);
        assert!(output.is_playing());

        let mut data = vec![1.0; 10];
        output.render(&mut data);
        assert_eq!(&data[..5], &[0.5; 5]);
        assert_eq!(&data[5..], &[0.0; 5]);
        assert_eq!(output.now(), 1.0);
        assert!(!output.is_playing());

        output.disconnect();
        output.render(&mut data);
        assert!(data.iter().all(|s| *s == 0.0));
    }
}
