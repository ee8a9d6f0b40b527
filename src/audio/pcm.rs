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
//! Decoding of raw, headerless 16-bit PCM as produced by the speech service.
use base64::{engine::general_purpose::STANDARD, Engine};
use tracing::debug;

use super::buffer::SampleBuffer;
use super::error::DecodeError;

/// Sample rate of the speech service's PCM output.
pub const DEFAULT_SAMPLE_RATE: u32 = 24000;

/// The speech service produces mono audio.
pub const DEFAULT_CHANNELS: u16 = 1;

/// Each sample is a signed 16-bit little-endian integer.
pub const BYTES_PER_SAMPLE: usize = 2;

/// Divisor mapping i16 onto [-1.0, 0.999969]. The range is asymmetric on purpose.
pub const PCM_SCALE: f32 = 32768.0;

/// Returns the number of bytes that will be decoded from an input of the given length.
///
/// A trailing odd byte is dropped rather than treated as an error.
pub fn valid_len(len: usize) -> usize {
    len - len % BYTES_PER_SAMPLE
}

/// Decodes interleaved signed 16-bit little-endian PCM into a planar sample buffer.
///
/// A trailing odd byte is ignored, as is any trailing partial frame. Only an invalid
/// channel count or sample rate is an error.
pub fn decode(
    bytes: &[u8],
    sample_rate: u32,
    channel_count: u16,
) -> Result<SampleBuffer, DecodeError> {
    if channel_count == 0 {
        return Err(DecodeError::InvalidChannelCount);
    }
    if sample_rate == 0 {
        return Err(DecodeError::InvalidSampleRate);
    }

    let valid = valid_len(bytes.len());
    if valid != bytes.len() {
        debug!(len = bytes.len(), "Dropping trailing odd PCM byte.");
    }

    let num_channels = usize::from(channel_count);
    let frame_count = valid / BYTES_PER_SAMPLE / num_channels;
    let mut channels = vec![Vec::with_capacity(frame_count); num_channels];

    for frame in bytes[..frame_count * num_channels * BYTES_PER_SAMPLE]
        .chunks_exact(num_channels * BYTES_PER_SAMPLE)
    {
        for (channel, sample) in channels
            .iter_mut()
            .zip(frame.chunks_exact(BYTES_PER_SAMPLE))
        {
            let value = i16::from_le_bytes([sample[0], sample[1]]);
            channel.push(f32::from(value) / PCM_SCALE);
        }
    }

    SampleBuffer::new(channels, sample_rate)
}

/// Decodes a base64 payload and then the PCM inside it.
pub fn decode_base64(
    payload: &str,
    sample_rate: u32,
    channel_count: u16,
) -> Result<SampleBuffer, DecodeError> {
    let bytes = STANDARD.decode(payload.trim())?;
    decode(&bytes, sample_rate, channel_count)
}
