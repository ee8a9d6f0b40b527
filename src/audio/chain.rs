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
//! The output chain: a one-shot source, a gain stage and an analyser tap, wired
//! source -> gain -> analyser -> device.
//!
//! A chain is built for every run of playback and thrown away afterwards. The source
//! can be started exactly once.
use std::sync::{
    atomic::{AtomicU32, AtomicU8, AtomicUsize, Ordering},
    Arc,
};

use crossbeam_channel::Sender;

use super::analyser::{Analyser, AnalyserSettings};
use super::buffer::SampleBuffer;
use super::error::{AnalyserError, ChainError};

/// Frames mixed per analyser write in the render path.
const RENDER_BLOCK_FRAMES: usize = 256;

/// Signals sent from the render path back to the owner of the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainEvent {
    /// The source of the given chain ran out of frames on its own.
    Ended { generation: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SourceState {
    Pending = 0,
    Running = 1,
    Stopped = 2,
    Exhausted = 3,
}

impl SourceState {
    fn from_u8(value: u8) -> SourceState {
        match value {
            0 => SourceState::Pending,
            1 => SourceState::Running,
            2 => SourceState::Stopped,
            _ => SourceState::Exhausted,
        }
    }
}

/// A source that plays a sample buffer from a start offset to its end, once.
pub struct Source {
    buffer: Arc<SampleBuffer>,
    state: AtomicU8,
    /// Next frame to render.
    cursor: AtomicUsize,
}

impl Source {
    fn new(buffer: Arc<SampleBuffer>) -> Source {
        Source {
            buffer,
            state: AtomicU8::new(SourceState::Pending as u8),
            cursor: AtomicUsize::new(0),
        }
    }

    pub fn state(&self) -> SourceState {
        SourceState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// The next frame the source will render.
    pub fn cursor(&self) -> usize {
        self.cursor.load(Ordering::Acquire)
    }
}

/// A gain stage. Stored as f32 bits so that it can change while rendering.
pub struct Gain {
    bits: AtomicU32,
}

impl Gain {
    fn new(value: f32) -> Gain {
        Gain {
            bits: AtomicU32::new(value.to_bits()),
        }
    }

    pub fn get(&self) -> f32 {
        f32::from_bits(self.bits.load(Ordering::Relaxed))
    }

    pub fn set(&self, value: f32) {
        self.bits.store(value.to_bits(), Ordering::Relaxed);
    }
}

/// One run's worth of output wiring.
pub struct OutputChain {
    generation: u64,
    source: Source,
    gain: Gain,
    analyser: Analyser,
    ended_tx: Sender<ChainEvent>,
}

impl OutputChain {
    /// Builds a chain for the buffer. The generation tags the chain's events.
    pub fn new(
        generation: u64,
        buffer: Arc<SampleBuffer>,
        gain: f32,
        analyser: AnalyserSettings,
        ended_tx: Sender<ChainEvent>,
    ) -> Result<OutputChain, AnalyserError> {
        Ok(OutputChain {
            generation,
            source: Source::new(buffer),
            gain: Gain::new(gain),
            analyser: Analyser::new(analyser)?,
            ended_tx,
        })
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    pub fn gain(&self) -> &Gain {
        &self.gain
    }

    pub fn analyser(&self) -> &Analyser {
        &self.analyser
    }

    /// Starts the source at the given offset in seconds. A source can only be started once.
    pub fn start(&self, offset: f64) -> Result<(), ChainError> {
        if self.source.state() != SourceState::Pending {
            return Err(ChainError::AlreadyStarted);
        }
        self.source
            .cursor
            .store(self.source.buffer.frame_at(offset), Ordering::Release);
        self.source
            .state
            .compare_exchange(
                SourceState::Pending as u8,
                SourceState::Running as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map(|_| ())
            .map_err(|_| ChainError::AlreadyStarted)
    }

    /// Stops the source. It can't be restarted afterwards. Stopping never signals Ended.
    pub fn stop(&self) {
        let _ = self
            .source
            .state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |state| {
                match SourceState::from_u8(state) {
                    SourceState::Pending | SourceState::Running => {
                        Some(SourceState::Stopped as u8)
                    }
                    _ => None,
                }
            });
    }

    /// Renders interleaved frames into out, overwriting what is there. Output channels
    /// beyond the source's channel count repeat the source channels in order.
    ///
    /// Returns the number of frames taken from the source. Frames past the end of the
    /// source are left untouched. When the last frame has been rendered the chain sends
    /// ChainEvent::Ended exactly once.
    pub fn render(&self, out: &mut [f32], out_channels: u16) -> usize {
        let out_channels = usize::from(out_channels);
        if out_channels == 0 || self.source.state() != SourceState::Running {
            return 0;
        }

        let buffer = &self.source.buffer;
        let src_channels = usize::from(buffer.channel_count());
        let start = self.source.cursor();
        let frames = (out.len() / out_channels).min(buffer.frame_count().saturating_sub(start));
        let gain = self.gain.get();

        let mut mono = [0.0f32; RENDER_BLOCK_FRAMES];
        let mut rendered = 0;
        while rendered < frames {
            let block = (frames - rendered).min(RENDER_BLOCK_FRAMES);
            for (i, mono_sample) in mono.iter_mut().enumerate().take(block) {
                let frame = start + rendered + i;
                let out_frame =
                    &mut out[(rendered + i) * out_channels..(rendered + i + 1) * out_channels];
                for (channel, sample) in out_frame.iter_mut().enumerate() {
                    *sample = buffer.sample(channel % src_channels, frame) * gain;
                }

                let sum: f32 = (0..src_channels)
                    .map(|channel| buffer.sample(channel, frame))
                    .sum();
                *mono_sample = sum / src_channels as f32 * gain;
            }
            self.analyser.write(&mono[..block]);
            rendered += block;
        }

        let cursor = start + frames;
        self.source.cursor.store(cursor, Ordering::Release);

        if cursor >= buffer.frame_count()
            && self
                .source
                .state
                .compare_exchange(
                    SourceState::Running as u8,
                    SourceState::Exhausted as u8,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                )
                .is_ok()
        {
            // The owner may already be gone, in which case nobody cares.
            let _ = self.ended_tx.send(ChainEvent::Ended {
                generation: self.generation,
            });
        }

        frames
    }
}

#[cfg(test)]
mod test {
    use crossbeam_channel::unbounded;

    use super::*;

    fn chain(
        buffer: SampleBuffer,
        gain: f32,
    ) -> (OutputChain, crossbeam_channel::Receiver<ChainEvent>) {
        let (tx, rx) = unbounded();
        let chain =
            OutputChain::new(7, Arc::new(buffer), gain, AnalyserSettings::default(), tx).unwrap();
        (chain, rx)
    }

    #[test]
    fn test_source_is_one_shot() {
        let (chain, _rx) = chain(SampleBuffer::silent(1, 100, 24000).unwrap(), 1.0);
        assert_eq!(chain.source().state(), SourceState::Pending);

        assert!(chain.start(0.0).is_ok());
        assert_eq!(chain.source().state(), SourceState::Running);
        assert_eq!(chain.start(0.0), Err(ChainError::AlreadyStarted));

        chain.stop();
        assert_eq!(chain.source().state(), SourceState::Stopped);
        assert_eq!(chain.start(0.0), Err(ChainError::AlreadyStarted));

        let mut out = vec![0.0; 10];
        assert_eq!(chain.render(&mut out, 1), 0);
    }

    #[test]
    fn test_render_from_offset_and_signal_end() {
        let samples: Vec<f32> = (0..100).map(|i| i as f32 / 100.0).collect();
        let buffer = SampleBuffer::new(vec![samples], 100).unwrap();
        let (chain, rx) = chain(buffer, 1.0);

        chain.start(0.5).unwrap();
        assert_eq!(chain.source().cursor(), 50);

        let mut out = vec![0.0; 30];
        assert_eq!(chain.render(&mut out, 1), 30);
        assert_eq!(out[0], 0.5);
        assert_eq!(out[29], 0.79);
        assert!(rx.try_recv().is_err());

        let mut out = vec![-1.0; 30];
        assert_eq!(chain.render(&mut out, 1), 20);
        assert_eq!(out[19], 0.99);
        // Untouched past the end of the source.
        assert_eq!(out[20], -1.0);
        assert_eq!(chain.source().state(), SourceState::Exhausted);
        assert_eq!(rx.try_recv(), Ok(ChainEvent::Ended { generation: 7 }));

        // Exhaustion is only signalled once.
        assert_eq!(chain.render(&mut out, 1), 0);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_stop_does_not_signal_end() {
        let (chain, rx) = chain(SampleBuffer::silent(1, 100, 24000).unwrap(), 1.0);
        chain.start(0.0).unwrap();
        chain.stop();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_gain_applies_while_running() {
        let buffer = SampleBuffer::new(vec![vec![0.5; 8]], 24000).unwrap();
        let (chain, _rx) = chain(buffer, 0.0);
        chain.start(0.0).unwrap();

        let mut out = vec![1.0; 4];
        chain.render(&mut out, 1);
        assert_eq!(out, vec![0.0; 4]);

        chain.gain().set(1.0);
        chain.render(&mut out, 1);
        assert_eq!(out, vec![0.5; 4]);
    }

    #[test]
    fn test_mono_fans_out_to_stereo() {
        let buffer = SampleBuffer::new(vec![vec![0.25, -0.25]], 24000).unwrap();
        let (chain, _rx) = chain(buffer, 1.0);
        chain.start(0.0).unwrap();

        let mut out = vec![0.0; 4];
        assert_eq!(chain.render(&mut out, 2), 2);
        assert_eq!(out, vec![0.25, 0.25, -0.25, -0.25]);
    }
}
