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
use std::time::Duration;

use duration_string::DurationString;
use serde::Deserialize;

use super::audio::Audio;
use super::error::ConfigError;
use crate::audio::{analyser::AnalyserSettings, wav};
use crate::player::{PlayerSettings, END_TOLERANCE};

/// The default display frame period for the spectrum loop (about 60 frames a second).
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// The configuration for the player.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Player {
    /// The audio output configuration.
    #[serde(default)]
    audio: Audio,
    /// Transport timing.
    playback: Option<Playback>,
    /// The analyser tap feeding the spectrum display.
    analyser: Option<Analyser>,
    /// Export naming.
    export: Option<Export>,
}

/// Transport timing configuration.
#[derive(Deserialize, Clone, Debug, Default)]
struct Playback {
    /// Tolerance for treating the end of a source as natural completion (default: 100ms).
    end_tolerance: Option<String>,
    /// The display frame period (default: 16ms).
    frame_interval: Option<String>,
}

/// Analyser configuration. Unset fields take the analyser defaults.
#[derive(Deserialize, Clone, Debug, Default)]
struct Analyser {
    fft_size: Option<usize>,
    smoothing: Option<f32>,
    min_decibels: Option<f32>,
    max_decibels: Option<f32>,
}

/// Export configuration.
#[derive(Deserialize, Clone, Debug, Default)]
struct Export {
    /// The product name exported files are named after.
    product: Option<String>,
}

fn parse_duration(value: &Option<String>, default: Duration) -> Result<Duration, ConfigError> {
    match value {
        Some(value) => Ok(DurationString::from_string(value.clone())
            .map_err(|e| ConfigError::Duration {
                value: value.clone(),
                reason: e.to_string(),
            })?
            .into()),
        None => Ok(default),
    }
}

impl Player {
    /// Returns the audio configuration.
    pub fn audio(&self) -> &Audio {
        &self.audio
    }

    /// Overrides the configured device.
    pub fn set_device(&mut self, device: &str) {
        self.audio = self.audio.with_device(device);
    }

    /// Returns the natural-completion tolerance.
    pub fn end_tolerance(&self) -> Result<Duration, ConfigError> {
        parse_duration(
            &self
                .playback
                .as_ref()
                .and_then(|playback| playback.end_tolerance.clone()),
            END_TOLERANCE,
        )
    }

    /// Returns the display frame period.
    pub fn frame_interval(&self) -> Result<Duration, ConfigError> {
        let interval = parse_duration(
            &self
                .playback
                .as_ref()
                .and_then(|playback| playback.frame_interval.clone()),
            DEFAULT_FRAME_INTERVAL,
        )?;
        if interval.is_zero() {
            return Err(ConfigError::Duration {
                value: "0".to_string(),
                reason: "frame interval must be greater than zero".to_string(),
            });
        }
        Ok(interval)
    }

    /// Returns validated analyser settings.
    pub fn analyser(&self) -> Result<AnalyserSettings, ConfigError> {
        let defaults = AnalyserSettings::default();
        let settings = match &self.analyser {
            Some(analyser) => AnalyserSettings {
                fft_size: analyser.fft_size.unwrap_or(defaults.fft_size),
                smoothing: analyser.smoothing.unwrap_or(defaults.smoothing),
                min_decibels: analyser.min_decibels.unwrap_or(defaults.min_decibels),
                max_decibels: analyser.max_decibels.unwrap_or(defaults.max_decibels),
            },
            None => defaults,
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Returns the product name used for exported files.
    pub fn product(&self) -> &str {
        self.export
            .as_ref()
            .and_then(|export| export.product.as_deref())
            .unwrap_or(wav::DEFAULT_PRODUCT)
    }

    /// Builds the settings the player is constructed with.
    pub fn player_settings(&self) -> Result<PlayerSettings, ConfigError> {
        Ok(PlayerSettings {
            end_tolerance: self.end_tolerance()?,
            analyser: self.analyser()?,
        })
    }
}
