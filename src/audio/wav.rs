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
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use tracing::info;

use super::buffer::SampleBuffer;
use super::error::{EncodeError, ExportError};

/// Size of the canonical RIFF/WAVE header.
pub const HEADER_LEN: usize = 44;

/// The encoder only writes 16-bit integer PCM.
pub const BITS_PER_SAMPLE: u16 = 16;

const BYTES_PER_SAMPLE: usize = (BITS_PER_SAMPLE / 8) as usize;
const FMT_CHUNK_LEN: u32 = 16;
const FORMAT_PCM: u16 = 1;

/// Frames quantized per write call when streaming.
const WRITE_BLOCK_FRAMES: usize = 4096;

/// Default product name used for exported files.
pub const DEFAULT_PRODUCT: &str = "DocuVoice_AI";

/// Quantizes a float sample to 16 bits.
///
/// Negative samples below -0.5 scale by 32768 and everything else by 32767, so that
/// -1.0 reaches i16::MIN and 1.0 reaches i16::MAX. The result truncates toward zero.
/// The arithmetic is done in f64 so that truncation matches bit for bit.
#[inline]
pub fn quantize(sample: f32) -> i16 {
    let sample = f64::from(sample).clamp(-1.0, 1.0);
    let scaled = if 0.5 + sample < 0.0 {
        sample * 32768.0
    } else {
        sample * 32767.0
    };
    scaled as i16
}

/// Returns the total file length for the given frames and channels, or None if it
/// overflows.
pub fn encoded_len(frames: usize, channel_count: u16) -> Option<usize> {
    frames
        .checked_mul(usize::from(channel_count))?
        .checked_mul(BYTES_PER_SAMPLE)?
        .checked_add(HEADER_LEN)
}

/// Encodes the first frame_limit frames of the buffer as a canonical 16-bit PCM WAV file.
pub fn encode(buffer: &SampleBuffer, frame_limit: usize) -> Result<Vec<u8>, EncodeError> {
    let layout = Layout::new(buffer, frame_limit)?;
    let mut out = Vec::with_capacity(layout.total_len as usize);
    write_layout(buffer, frame_limit, &layout, &mut out)?;
    Ok(out)
}

/// Encodes the whole buffer.
pub fn encode_all(buffer: &SampleBuffer) -> Result<Vec<u8>, EncodeError> {
    encode(buffer, buffer.frame_count())
}

/// The validated sizes that go in the header.
struct Layout {
    total_len: u32,
    block_align: u16,
    byte_rate: u32,
}

impl Layout {
    fn new(buffer: &SampleBuffer, frame_limit: usize) -> Result<Layout, EncodeError> {
        let channel_count = buffer.channel_count();
        if channel_count == 0 {
            return Err(EncodeError::NoChannels);
        }
        if frame_limit > buffer.frame_count() {
            return Err(EncodeError::FrameLimitExceeded {
                limit: frame_limit,
                available: buffer.frame_count(),
            });
        }

        let format_err = || EncodeError::FormatTooLarge {
            channels: channel_count,
            sample_rate: buffer.sample_rate(),
        };
        let block_align = channel_count
            .checked_mul(BYTES_PER_SAMPLE as u16)
            .ok_or_else(format_err)?;
        let byte_rate = buffer
            .sample_rate()
            .checked_mul(u32::from(block_align))
            .ok_or_else(format_err)?;

        let total_len = encoded_len(frame_limit, channel_count).unwrap_or(usize::MAX);
        let total_len =
            u32::try_from(total_len).map_err(|_| EncodeError::TooLarge(total_len as u64))?;

        Ok(Layout {
            total_len,
            block_align,
            byte_rate,
        })
    }
}

/// Streams the WAV encoding of the first frame_limit frames into the writer.
pub fn write<W: Write>(
    buffer: &SampleBuffer,
    frame_limit: usize,
    writer: &mut W,
) -> Result<(), EncodeError> {
    let layout = Layout::new(buffer, frame_limit)?;
    write_layout(buffer, frame_limit, &layout, writer)
}

fn write_layout<W: Write>(
    buffer: &SampleBuffer,
    frame_limit: usize,
    layout: &Layout,
    writer: &mut W,
) -> Result<(), EncodeError> {
    let channel_count = buffer.channel_count();
    writer.write_all(&header(buffer.sample_rate(), channel_count, layout))?;

    let num_channels = usize::from(channel_count);
    let mut block = Vec::with_capacity(WRITE_BLOCK_FRAMES * num_channels * BYTES_PER_SAMPLE);
    let mut frame = 0;
    while frame < frame_limit {
        let end = (frame + WRITE_BLOCK_FRAMES).min(frame_limit);
        block.clear();
        for index in frame..end {
            for channel in 0..num_channels {
                block.extend_from_slice(&quantize(buffer.sample(channel, index)).to_le_bytes());
            }
        }
        writer.write_all(&block)?;
        frame = end;
    }

    Ok(())
}

/// Builds the 44 byte header. All integers are little-endian.
fn header(sample_rate: u32, channel_count: u16, layout: &Layout) -> [u8; HEADER_LEN] {
    let total_len = layout.total_len;
    let mut header = [0u8; HEADER_LEN];
    header[0..4].copy_from_slice(b"RIFF");
    header[4..8].copy_from_slice(&(total_len - 8).to_le_bytes());
    header[8..12].copy_from_slice(b"WAVE");
    header[12..16].copy_from_slice(b"fmt ");
    header[16..20].copy_from_slice(&FMT_CHUNK_LEN.to_le_bytes());
    header[20..22].copy_from_slice(&FORMAT_PCM.to_le_bytes());
    header[22..24].copy_from_slice(&channel_count.to_le_bytes());
    header[24..28].copy_from_slice(&sample_rate.to_le_bytes());
    header[28..32].copy_from_slice(&layout.byte_rate.to_le_bytes());
    header[32..34].copy_from_slice(&layout.block_align.to_le_bytes());
    header[34..36].copy_from_slice(&BITS_PER_SAMPLE.to_le_bytes());
    header[36..40].copy_from_slice(b"data");
    header[40..44].copy_from_slice(&(total_len - HEADER_LEN as u32).to_le_bytes());
    header
}

/// Returns the export file name for the given product.
pub fn export_file_name(product: &str) -> String {
    format!("{}_Output.wav", product)
}

/// Writes the whole buffer to <dir>/<product>_Output.wav and returns the path.
pub fn export(buffer: &SampleBuffer, dir: &Path, product: &str) -> Result<PathBuf, ExportError> {
    export_frames(buffer, buffer.frame_count(), dir, product)
}

/// Like export, but only writes the first frame_limit frames.
pub fn export_frames(
    buffer: &SampleBuffer,
    frame_limit: usize,
    dir: &Path,
    product: &str,
) -> Result<PathBuf, ExportError> {
    Layout::new(buffer, frame_limit)?;
    let path = dir.join(export_file_name(product));
    let io_err = |source| ExportError::Io {
        path: path.clone(),
        source,
    };

    let mut writer = BufWriter::new(File::create(&path).map_err(io_err)?);
    write(buffer, frame_limit, &mut writer)?;
    writer.flush().map_err(io_err)?;

    info!(
        path = path.display().to_string(),
        frames = frame_limit,
        "Exported WAV."
    );
    Ok(path)
}
