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

/// Errors produced while turning raw PCM into a sample buffer.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Channel count must be greater than 0")]
    InvalidChannelCount,

    #[error("Sample rate must be greater than 0")]
    InvalidSampleRate,

    #[error("Channel {channel} has {actual} samples, expected {expected}")]
    ChannelLengthMismatch {
        channel: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid base64 audio payload: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// Errors produced while encoding a sample buffer as WAV.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("Frame limit {limit} exceeds the {available} frames in the buffer")]
    FrameLimitExceeded { limit: usize, available: usize },

    #[error("Cannot encode a buffer with zero channels")]
    NoChannels,

    #[error("Encoded size of {0} bytes does not fit in a WAV header")]
    TooLarge(u64),

    #[error("{channels} channel(s) at {sample_rate}Hz does not fit in a WAV header")]
    FormatTooLarge { channels: u16, sample_rate: u32 },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Errors produced while exporting a WAV file to disk.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("Encode error: {0}")]
    Encode(#[from] EncodeError),

    #[error("IO error writing {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        source: std::io::Error,
    },
}

/// Errors produced by output devices.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("No output device found with name {0}")]
    NotFound(String),

    #[error("No default output device is available")]
    NoDefault,

    #[error("Output stream error: {0}")]
    Stream(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Errors produced when configuring the analyser tap.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum AnalyserError {
    #[error("FFT size must be a power of two between 32 and 32768, got {0}")]
    InvalidFftSize(usize),

    #[error("Smoothing must be between 0 and 1, got {0}")]
    InvalidSmoothing(f32),

    #[error("Minimum decibels ({min}) must be below maximum decibels ({max})")]
    InvalidDecibelRange { min: f32, max: f32 },
}

/// Errors produced by the output chain.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ChainError {
    #[error("Source has already been started; build a new chain instead")]
    AlreadyStarted,
}
