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
use std::{fmt, sync::Arc};

use crate::config;

pub mod analyser;
pub mod buffer;
pub mod chain;
pub mod cpal;
pub mod error;
pub mod mock;
pub mod output;
pub mod pcm;
pub mod wav;

pub use buffer::SampleBuffer;
pub use chain::OutputChain;
pub use error::{DecodeError, DeviceError, EncodeError, ExportError};

/// An output device: a clock plus a sink for at most one output chain at a time.
///
/// The device is handed to the player at construction and released when the player's
/// session ends. It renders the connected chain on its own schedule.
pub trait Device: fmt::Display + Send + Sync {
    /// The current time of the output clock in seconds. Monotonic.
    fn now(&self) -> f64;

    /// The sample rate the device renders at.
    fn sample_rate(&self) -> u32;

    /// The number of interleaved output channels.
    fn channels(&self) -> u16;

    /// Routes the given chain to the output, replacing any chain already connected.
    fn connect(&self, chain: Arc<OutputChain>);

    /// Disconnects the current chain, if any.
    fn disconnect(&self);

    /// Releases the device. Nothing is rendered afterwards.
    fn release(&self);
}

/// Lists devices known to cpal.
pub fn list_devices() -> Result<Vec<cpal::DeviceInfo>, DeviceError> {
    cpal::Device::list()
}

/// Gets the device described by the given configuration.
pub fn get_device(config: &config::Audio) -> Result<Arc<dyn Device>, DeviceError> {
    let device = config.device();
    if device.starts_with("mock") {
        return Ok(Arc::new(mock::Device::with_format(
            device,
            config.sample_rate(),
            config.channels(),
        )));
    };

    Ok(Arc::new(cpal::Device::get(config)?))
}
