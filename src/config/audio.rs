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
use serde::Deserialize;

use crate::audio::{cpal::DEFAULT_DEVICE, pcm};

/// A YAML representation of the audio configuration.
#[derive(Deserialize, Clone, Debug)]
pub struct Audio {
    /// The audio device. "default" selects the host's default output, names starting
    /// with "mock" select the mock device.
    #[serde(default = "default_device")]
    device: String,

    /// Output sample rate in Hz (default: 24000). Audio is never resampled, so this
    /// should match the decoded audio.
    sample_rate: Option<u32>,

    /// Output channel count (default: 1).
    channels: Option<u16>,

    /// Fixed device buffer size in frames. When unset the backend chooses.
    buffer_size: Option<u32>,
}

fn default_device() -> String {
    DEFAULT_DEVICE.to_string()
}

impl Audio {
    /// New will create a new Audio configuration.
    pub fn new(device: &str) -> Audio {
        Audio {
            device: device.to_string(),
            sample_rate: None,
            channels: None,
            buffer_size: None,
        }
    }

    /// Creates an Audio configuration with an explicit format.
    pub fn with_format(device: &str, sample_rate: u32, channels: u16) -> Audio {
        Audio {
            sample_rate: Some(sample_rate),
            channels: Some(channels),
            ..Audio::new(device)
        }
    }

    /// Returns a copy of this configuration pointing at another device.
    pub fn with_device(&self, device: &str) -> Audio {
        Audio {
            device: device.to_string(),
            ..self.clone()
        }
    }

    /// Returns the device from the configuration.
    pub fn device(&self) -> &str {
        &self.device
    }

    /// Returns the output sample rate (default: 24000)
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
            .filter(|rate| *rate > 0)
            .unwrap_or(pcm::DEFAULT_SAMPLE_RATE)
    }

    /// Returns the output channel count (default: 1)
    pub fn channels(&self) -> u16 {
        self.channels
            .filter(|channels| *channels > 0)
            .unwrap_or(pcm::DEFAULT_CHANNELS)
    }

    /// Returns the fixed device buffer size, if any.
    pub fn buffer_size(&self) -> Option<u32> {
        self.buffer_size
    }
}

impl Default for Audio {
    fn default() -> Self {
        Audio::new(DEFAULT_DEVICE)
    }
}

#[cfg(test)]
mod test {
    use config::{Config, File, FileFormat};

    use super::*;

    #[test]
    fn test_defaults() {
        let audio = Audio::new("default");
        assert_eq!(audio.device(), "default");
        assert_eq!(audio.sample_rate(), 24000);
        assert_eq!(audio.channels(), 1);
        assert_eq!(audio.buffer_size(), None);

        let moved = Audio::with_format("a", 48000, 2).with_device("b");
        assert_eq!(moved.device(), "b");
        assert_eq!(moved.sample_rate(), 48000);
        assert_eq!(moved.channels(), 2);
    }

    #[test]
    fn test_deserialize() {
        let yaml = r#"
            device: "Speakers"
            sample_rate: 44100
            channels: 2
            buffer_size: 256
        "#;
        let audio = Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize::<Audio>()
            .unwrap();

        assert_eq!(audio.device(), "Speakers");
        assert_eq!(audio.sample_rate(), 44100);
        assert_eq!(audio.channels(), 2);
        assert_eq!(audio.buffer_size(), Some(256));
    }

    #[test]
    fn test_zero_values_fall_back() {
        let yaml = r#"
            sample_rate: 0
            channels: 0
        "#;
        let audio = Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize::<Audio>()
            .unwrap();

        assert_eq!(audio.device(), "default");
        assert_eq!(audio.sample_rate(), 24000);
        assert_eq!(audio.channels(), 1);
    }
}
