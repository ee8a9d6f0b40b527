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
//! The analyser tap at the end of the output chain.
//!
//! The render path writes post-gain mono samples into a ring of the most recent
//! fft_size samples. Readers take byte magnitude snapshots from it. The two sides
//! hold separate locks so that a reader running an FFT never stalls the render path
//! for longer than a copy of the ring.
use std::{f32::consts::PI, sync::Arc};

use parking_lot::Mutex;
use rustfft::{num_complex::Complex, Fft, FftPlanner};

use super::error::AnalyserError;

pub const DEFAULT_FFT_SIZE: usize = 512;
pub const DEFAULT_SMOOTHING: f32 = 0.8;
pub const DEFAULT_MIN_DECIBELS: f32 = -100.0;
pub const DEFAULT_MAX_DECIBELS: f32 = -30.0;

const MIN_FFT_SIZE: usize = 32;
const MAX_FFT_SIZE: usize = 32768;

/// Settings for the analyser tap.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AnalyserSettings {
    /// Number of time-domain samples per transform. Must be a power of two.
    pub fft_size: usize,
    /// Weight given to the previous snapshot when smoothing, in [0, 1].
    pub smoothing: f32,
    /// Level mapped to a magnitude byte of 0.
    pub min_decibels: f32,
    /// Level mapped to a magnitude byte of 255.
    pub max_decibels: f32,
}

impl AnalyserSettings {
    pub fn validate(&self) -> Result<(), AnalyserError> {
        if !self.fft_size.is_power_of_two()
            || !(MIN_FFT_SIZE..=MAX_FFT_SIZE).contains(&self.fft_size)
        {
            return Err(AnalyserError::InvalidFftSize(self.fft_size));
        }
        if !(0.0..=1.0).contains(&self.smoothing) {
            return Err(AnalyserError::InvalidSmoothing(self.smoothing));
        }
        if self.min_decibels.is_nan()
            || self.max_decibels.is_nan()
            || self.min_decibels >= self.max_decibels
        {
            return Err(AnalyserError::InvalidDecibelRange {
                min: self.min_decibels,
                max: self.max_decibels,
            });
        }
        Ok(())
    }

    /// The number of frequency bins each snapshot contains.
    pub fn frequency_bin_count(&self) -> usize {
        self.fft_size / 2
    }
}

impl Default for AnalyserSettings {
    fn default() -> Self {
        AnalyserSettings {
            fft_size: DEFAULT_FFT_SIZE,
            smoothing: DEFAULT_SMOOTHING,
            min_decibels: DEFAULT_MIN_DECIBELS,
            max_decibels: DEFAULT_MAX_DECIBELS,
        }
    }
}

/// Ring of the most recent time-domain samples.
struct Ring {
    samples: Vec<f32>,
    /// Index of the oldest sample, which is also the next write position.
    write_pos: usize,
}

/// Reader-side state that persists between snapshots.
struct Spectrum {
    smoothed: Vec<f32>,
    scratch: Vec<Complex<f32>>,
}

/// A frequency-domain tap on the output signal.
pub struct Analyser {
    settings: AnalyserSettings,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    ring: Mutex<Ring>,
    spectrum: Mutex<Spectrum>,
}

impl Analyser {
    /// Creates a new analyser. The FFT is planned once here.
    pub fn new(settings: AnalyserSettings) -> Result<Analyser, AnalyserError> {
        settings.validate()?;
        let size = settings.fft_size;

        let fft = FftPlanner::<f32>::new().plan_fft_forward(size);
        let window = blackman_window(size);

        Ok(Analyser {
            fft,
            window,
            ring: Mutex::new(Ring {
                samples: vec![0.0; size],
                write_pos: 0,
            }),
            spectrum: Mutex::new(Spectrum {
                smoothed: vec![0.0; settings.frequency_bin_count()],
                scratch: vec![Complex::new(0.0, 0.0); size],
            }),
            settings,
        })
    }

    pub fn settings(&self) -> &AnalyserSettings {
        &self.settings
    }

    pub fn frequency_bin_count(&self) -> usize {
        self.settings.frequency_bin_count()
    }

    /// Appends mono samples to the time-domain ring. Called from the render path.
    pub fn write(&self, samples: &[f32]) {
        let mut ring = self.ring.lock();
        let size = ring.samples.len();

        // Only the newest fft_size samples can ever be read back.
        let samples = &samples[samples.len().saturating_sub(size)..];
        for sample in samples {
            let pos = ring.write_pos;
            ring.samples[pos] = *sample;
            ring.write_pos = (pos + 1) % size;
        }
    }

    /// Fills out with the current magnitude of each frequency bin, scaled to 0..=255.
    ///
    /// Each call applies smoothing against the previous call, so calling this once per
    /// display frame gives a stable visualization. Returns the number of bins written.
    pub fn byte_frequency_data(&self, out: &mut [u8]) -> usize {
        let mut spectrum = self.spectrum.lock();
        let Spectrum { smoothed, scratch } = &mut *spectrum;

        {
            let ring = self.ring.lock();
            let size = ring.samples.len();
            for (i, value) in scratch.iter_mut().enumerate() {
                let sample = ring.samples[(ring.write_pos + i) % size];
                *value = Complex::new(sample * self.window[i], 0.0);
            }
        }

        self.fft.process(scratch);

        let scale = 1.0 / self.settings.fft_size as f32;
        let smoothing = self.settings.smoothing;
        let min_db = self.settings.min_decibels;
        let range = self.settings.max_decibels - min_db;

        for (bin, level) in smoothed.iter_mut().enumerate() {
            let magnitude = scratch[bin].norm() * scale;
            let value = smoothing * *level + (1.0 - smoothing) * magnitude;
            *level = if value.is_finite() { value } else { 0.0 };
        }

        let written = out.len().min(smoothed.len());
        for (byte, level) in out.iter_mut().zip(smoothed.iter()) {
            let db = 20.0 * level.log10();
            let scaled = 255.0 * (db - min_db) / range;
            // -inf (silence) clamps to 0.
            *byte = scaled.clamp(0.0, 255.0) as u8;
        }
        written
    }
}

fn blackman_window(size: usize) -> Vec<f32> {
    const ALPHA: f32 = 0.16;
    let a0 = 0.5 * (1.0 - ALPHA);
    let a1 = 0.5;
    let a2 = 0.5 * ALPHA;

    (0..size)
        .map(|i| {
            let x = i as f32 / size as f32;
            a0 - a1 * (2.0 * PI * x).cos() + a2 * (4.0 * PI * x).cos()
        })
        .collect()
}
