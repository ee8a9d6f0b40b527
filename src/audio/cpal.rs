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
use std::{fmt, sync::Arc, thread, time::Duration};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use parking_lot::Mutex;
use tracing::{error, info, span, Level};

use super::chain::OutputChain;
use super::error::DeviceError;
use super::output::Output;
use crate::{config, playsync::CancelHandle};

/// How often the output thread checks whether it should shut down.
const SHUTDOWN_POLL: Duration = Duration::from_millis(100);

/// The name that selects the host's default output device.
pub const DEFAULT_DEVICE: &str = "default";

/// A listed output device.
pub struct DeviceInfo {
    pub name: String,
    pub host: String,
    pub max_channels: u16,
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Channels={}) ({})",
            self.name, self.max_channels, self.host
        )
    }
}

/// A cpal output device. The stream is owned by a dedicated output thread for the
/// lifetime of the device and renders whatever chain is connected.
pub struct Device {
    name: String,
    output: Arc<Output>,
    shutdown: CancelHandle,
    output_thread: Mutex<Option<thread::JoinHandle<()>>>,
}

fn stream_err<E: fmt::Display>(err: E) -> DeviceError {
    DeviceError::Stream(err.to_string())
}

impl Device {
    /// Lists the cpal output devices on every available host.
    pub fn list() -> Result<Vec<DeviceInfo>, DeviceError> {
        // Suppress noisy output here.
        let _shh_stdout = shh::stdout()?;
        let _shh_stderr = shh::stderr()?;

        let mut devices: Vec<DeviceInfo> = Vec::new();
        for host_id in cpal::available_hosts() {
            let host = cpal::host_from_id(host_id).map_err(stream_err)?;
            let host_devices = match host.output_devices() {
                Ok(host_devices) => host_devices,
                Err(e) => {
                    error!(
                        err = e.to_string(),
                        host = host_id.name(),
                        "Unable to list devices for host"
                    );
                    continue;
                }
            };

            for device in host_devices {
                let Ok(output_configs) = device.supported_output_configs() else {
                    continue;
                };
                let max_channels = output_configs
                    .map(|config| config.channels())
                    .max()
                    .unwrap_or(0);

                if max_channels > 0 {
                    devices.push(DeviceInfo {
                        name: device.name().map_err(stream_err)?,
                        host: host_id.name().to_string(),
                        max_channels,
                    });
                }
            }
        }

        devices.sort_by_key(|device| device.name.to_string());
        Ok(devices)
    }

    /// Finds the named device, or the default device, on any available host.
    fn find(name: &str) -> Result<cpal::Device, DeviceError> {
        if name == DEFAULT_DEVICE {
            return cpal::default_host()
                .default_output_device()
                .ok_or(DeviceError::NoDefault);
        }

        for host_id in cpal::available_hosts() {
            let host = cpal::host_from_id(host_id).map_err(stream_err)?;
            let Ok(mut devices) = host.output_devices() else {
                continue;
            };
            if let Some(device) = devices.find(|device| {
                device
                    .name()
                    .is_ok_and(|device_name| device_name.trim() == name)
            }) {
                return Ok(device);
            }
        }

        Err(DeviceError::NotFound(name.to_string()))
    }

    /// Opens the configured device and starts its output stream.
    pub fn get(config: &config::Audio) -> Result<Device, DeviceError> {
        let span = span!(Level::INFO, "open device (cpal)");
        let _enter = span.enter();

        let name = config.device().to_string();
        let device = Device::find(&name)?;
        let output = Arc::new(Output::new(config.sample_rate(), config.channels()));
        let shutdown = CancelHandle::new();

        let stream_config = cpal::StreamConfig {
            channels: config.channels(),
            sample_rate: cpal::SampleRate(config.sample_rate()),
            buffer_size: match config.buffer_size() {
                Some(frames) => cpal::BufferSize::Fixed(frames),
                None => cpal::BufferSize::Default,
            },
        };

        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<(), DeviceError>>(1);
        let output_thread = {
            let output = output.clone();
            let shutdown = shutdown.clone();
            let name = name.clone();
            // cpal streams can't move between threads, so the stream lives and dies here.
            thread::spawn(move || {
                let stream = device
                    .build_output_stream(
                        &stream_config,
                        move |data: &mut [f32], _: &cpal::OutputCallbackInfo| output.render(data),
                        |err| error!(err = err.to_string(), "Output stream error"),
                        None,
                    )
                    .map_err(stream_err)
                    .and_then(|stream| stream.play().map_err(stream_err).map(|_| stream));

                let stream = match stream {
                    Ok(stream) => {
                        let _ = ready_tx.send(Ok(()));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                info!(device = name, "Output stream started.");
                while !shutdown.wait_timeout(SHUTDOWN_POLL) {}
                drop(stream);
                info!(device = name, "Output stream stopped.");
            })
        };

        ready_rx
            .recv()
            .map_err(|_| DeviceError::Stream("output thread exited before starting".into()))??;

        Ok(Device {
            name,
            output,
            shutdown,
            output_thread: Mutex::new(Some(output_thread)),
        })
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
        if !self.shutdown.is_cancelled() {
            self.output.connect(chain);
        }
    }

    fn disconnect(&self) {
        self.output.disconnect();
    }

    fn release(&self) {
        self.output.disconnect();
        self.shutdown.cancel();
        if let Some(output_thread) = self.output_thread.lock().take() {
            if output_thread.join().is_err() {
                error!(device = self.name, "Error while joining output thread");
            }
        }
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        super::Device::release(self);
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Channels={}, {}Hz)",
            self.name,
            self.output.channels(),
            self.output.sample_rate()
        )
    }
}
