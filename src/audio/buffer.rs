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
use std::{fmt, time::Duration};

use super::error::DecodeError;
use crate::util::duration_minutes_seconds;

/// An immutable, planar, multi-channel buffer of float samples.
///
/// Samples are nominally in [-1.0, 1.0] but are not clamped here. Clamping only
/// happens when the buffer is encoded.
#[derive(Clone, Debug, PartialEq)]
pub struct SampleBuffer {
    /// One Vec per channel, each exactly frame_count long.
    channels: Vec<Vec<f32>>,
    sample_rate: u32,
    frame_count: usize,
}

impl SampleBuffer {
    /// Creates a buffer from planar channel data.
    pub fn new(channels: Vec<Vec<f32>>, sample_rate: u32) -> Result<SampleBuffer, DecodeError> {
        if channels.is_empty() || channels.len() > usize::from(u16::MAX) {
            return Err(DecodeError::InvalidChannelCount);
        }
        if sample_rate == 0 {
            return Err(DecodeError::InvalidSampleRate);
        }

        let frame_count = channels[0].len();
        if let Some((channel, samples)) = channels
            .iter()
            .enumerate()
            .find(|(_, samples)| samples.len() != frame_count)
        {
            return Err(DecodeError::ChannelLengthMismatch {
                channel,
                expected: frame_count,
                actual: samples.len(),
            });
        }

        Ok(SampleBuffer {
            channels,
            sample_rate,
            frame_count,
        })
    }

    /// Creates a buffer of silence.
    pub fn silent(
        channel_count: u16,
        frame_count: usize,
        sample_rate: u32,
    ) -> Result<SampleBuffer, DecodeError> {
        SampleBuffer::new(
            vec![vec![0.0; frame_count]; usize::from(channel_count)],
            sample_rate,
        )
    }

    pub fn channel_count(&self) -> u16 {
        // Bounded by the check in new().
        self.channels.len() as u16
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    /// Returns the samples for the given channel.
    pub fn channel(&self, channel: usize) -> Option<&[f32]> {
        self.channels.get(channel).map(Vec::as_slice)
    }

    /// Returns the sample at the given channel and frame.
    #[inline]
    pub fn sample(&self, channel: usize, frame: usize) -> f32 {
        self.channels[channel][frame]
    }

    /// The length of the buffer in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.frame_count as f64 / f64::from(self.sample_rate)
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.duration_secs())
    }

    /// Converts a time offset in seconds to a frame index, clamped to the buffer.
    pub fn frame_at(&self, seconds: f64) -> usize {
        if seconds.is_nan() || seconds <= 0.0 {
            return 0;
        }
        let frame = (seconds * f64::from(self.sample_rate)).floor() as usize;
        frame.min(self.frame_count)
    }
}

impl fmt::Display for SampleBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} channel(s), {}Hz, {} frames ({})",
            self.channel_count(),
            self.sample_rate,
            self.frame_count,
            duration_minutes_seconds(self.duration())
        )
    }
}
