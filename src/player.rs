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
use std::{sync::Arc, time::Duration};

use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::{debug, error, info, span, warn, Level, Span};

use crate::audio::{
    analyser::AnalyserSettings,
    chain::{ChainEvent, OutputChain},
    error::AnalyserError,
    Device, SampleBuffer,
};
use crate::playsync::CancelHandle;

pub mod spectrum;
pub mod transport;

pub use spectrum::{SpectrumCallback, SubscriptionId};
pub use transport::TransportState;

use spectrum::SpectrumFeed;
use transport::Transport;

/// How close to the end of the buffer the clock must be for an exhausted source to count
/// as a natural end of playback.
pub const END_TOLERANCE: Duration = Duration::from_millis(100);

/// Settings the player is constructed with.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerSettings {
    /// Tolerance for natural completion.
    pub end_tolerance: Duration,
    /// Analyser settings for every chain the player builds.
    pub analyser: AnalyserSettings,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        PlayerSettings {
            end_tolerance: END_TOLERANCE,
            analyser: AnalyserSettings::default(),
        }
    }
}

/// Plays a single sample buffer through an output device with transport controls and a
/// spectrum feed.
///
/// All operations run on the owner's thread and never block. The device's render path
/// reports the end of a source over a channel, which is handled by poll (and by every
/// display frame).
pub struct Player {
    device: Arc<dyn Device>,
    settings: PlayerSettings,
    buffer: Option<Arc<SampleBuffer>>,
    transport: Transport,
    /// The live chain. Only present while playing.
    chain: Option<Arc<OutputChain>>,
    /// Incremented for every chain so that events from old chains can be told apart.
    generation: u64,
    muted: bool,
    released: bool,
    feed: SpectrumFeed,
    events_tx: Sender<ChainEvent>,
    events_rx: Receiver<ChainEvent>,
    /// The logging span.
    span: Span,
}

impl Player {
    /// Creates a new player on the given device.
    pub fn new(device: Arc<dyn Device>, settings: PlayerSettings) -> Result<Player, AnalyserError> {
        settings.analyser.validate()?;
        let (events_tx, events_rx) = unbounded();
        Ok(Player {
            device,
            settings,
            buffer: None,
            transport: Transport::new(0.0),
            chain: None,
            generation: 0,
            muted: false,
            released: false,
            feed: SpectrumFeed::new(),
            events_tx,
            events_rx,
            span: span!(Level::INFO, "playback"),
        })
    }

    /// Replaces the loaded buffer. Playback stops and the position goes back to 0.
    pub fn load_buffer(&mut self, buffer: Arc<SampleBuffer>) {
        let span = self.span.clone();
        let _enter = span.enter();
        self.teardown();
        self.feed.cancel();
        self.drain_events();

        if buffer.sample_rate() != self.device.sample_rate() {
            warn!(
                buffer_rate = buffer.sample_rate(),
                device_rate = self.device.sample_rate(),
                device = self.device.to_string(),
                "Buffer sample rate differs from the device, playback speed will be off."
            );
        }

        info!(
            duration = buffer.duration_secs(),
            channels = buffer.channel_count(),
            "Loaded buffer."
        );
        self.transport = Transport::new(buffer.duration_secs());
        self.buffer = Some(buffer);
    }

    /// Drops the loaded buffer, stopping playback.
    pub fn unload(&mut self) {
        let span = self.span.clone();
        let _enter = span.enter();
        self.teardown();
        self.feed.cancel();
        self.drain_events();
        self.transport = Transport::new(0.0);
        self.buffer = None;
    }

    /// Starts playback from the current offset. Does nothing without a buffer, while
    /// already playing or after the player has been closed.
    pub fn play(&mut self) {
        let span = self.span.clone();
        let _enter = span.enter();
        if self.released || self.transport.is_playing() {
            return;
        }
        let Some(buffer) = self.buffer.clone() else {
            debug!("No buffer loaded, nothing to play.");
            return;
        };

        self.teardown();
        self.generation += 1;
        let chain = match OutputChain::new(
            self.generation,
            buffer,
            self.gain(),
            self.settings.analyser,
            self.events_tx.clone(),
        ) {
            Ok(chain) => Arc::new(chain),
            Err(e) => {
                // Settings are validated on construction so this can't happen.
                error!(err = e.to_string(), "Unable to build output chain.");
                return;
            }
        };

        let now = self.device.now();
        let Some(offset) = self.transport.start(now) else {
            return;
        };
        if let Err(e) = chain.start(offset) {
            error!(err = e.to_string(), "Unable to start source.");
            self.transport.stop();
            return;
        }
        self.device.connect(chain.clone());
        self.chain = Some(chain);
        self.feed.start();

        info!(
            position = offset,
            duration = self.transport.duration(),
            device = self.device.to_string(),
            "Playing."
        );
    }

    /// Pauses playback, keeping the position. Does nothing unless playing.
    pub fn pause(&mut self) {
        let span = self.span.clone();
        let _enter = span.enter();
        if !self.transport.pause(self.device.now()) {
            return;
        }
        self.teardown();
        self.feed.cancel();
        info!(position = self.transport.paused_offset(), "Paused.");
    }

    /// Stops playback and goes back to the start.
    pub fn stop(&mut self) {
        let span = self.span.clone();
        let _enter = span.enter();
        self.teardown();
        self.feed.cancel();
        self.transport.stop();
        info!("Stopped.");
    }

    /// Moves to the given position in seconds, clamped to the buffer. Playback continues
    /// from the new position if it was playing.
    pub fn seek(&mut self, seconds: f64) {
        let span = self.span.clone();
        let _enter = span.enter();
        let target = self.transport.clamp(seconds);
        info!(position = target, "Seeking.");
        if self.transport.is_playing() {
            self.pause();
            self.transport.set_offset(target);
            self.play();
        } else {
            self.transport.set_offset(target);
        }
    }

    /// Flips the mute state, applying it to the live chain immediately. Returns whether the
    /// player is now muted.
    pub fn toggle_mute(&mut self) -> bool {
        let span = self.span.clone();
        let _enter = span.enter();
        self.muted = !self.muted;
        if let Some(chain) = &self.chain {
            chain.gain().set(self.gain());
        }
        info!(muted = self.muted, "Toggled mute.");
        self.muted
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// The current position in seconds.
    pub fn current_position(&self) -> f64 {
        self.transport.position(self.device.now())
    }

    /// The length of the loaded buffer in seconds, or 0 if nothing is loaded.
    pub fn duration(&self) -> f64 {
        self.transport.duration()
    }

    pub fn is_playing(&self) -> bool {
        self.transport.is_playing()
    }

    pub fn state(&self) -> TransportState {
        self.transport.state()
    }

    pub fn buffer(&self) -> Option<&Arc<SampleBuffer>> {
        self.buffer.as_ref()
    }

    /// Handles end-of-source events from the render path. Returns true if playback ended.
    pub fn poll(&mut self) -> bool {
        let span = self.span.clone();
        let _enter = span.enter();
        let mut ended = false;
        while let Ok(event) = self.events_rx.try_recv() {
            match event {
                ChainEvent::Ended { generation } => {
                    if generation != self.generation || !self.transport.is_playing() {
                        debug!(generation, "Ignoring end of stale chain.");
                        continue;
                    }
                    let now = self.device.now();
                    let tolerance = self.settings.end_tolerance.as_secs_f64();
                    if !self.transport.complete(now, tolerance) {
                        debug!(
                            position = self.transport.position(now),
                            "Source ended early, ignoring."
                        );
                        continue;
                    }
                    self.teardown();
                    self.feed.cancel();
                    info!(duration = self.transport.duration(), "Playback ended.");
                    ended = true;
                }
            }
        }
        ended
    }

    /// Subscribes to spectrum frames. The callback receives a magnitude (0-255) per
    /// frequency bin and the position in seconds.
    pub fn subscribe(&mut self, callback: SpectrumCallback) -> SubscriptionId {
        self.feed.subscribe(callback)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.feed.unsubscribe(id)
    }

    /// The cancel handle of the current frame loop, if playback is running.
    pub fn frame_handle(&self) -> Option<CancelHandle> {
        self.feed.task().filter(|task| !task.is_cancelled()).cloned()
    }

    /// Runs one display frame: handles pending events, then delivers a spectrum snapshot.
    /// Returns false once the frame loop should stop.
    pub fn on_frame(&mut self) -> bool {
        self.poll();
        if !self.transport.is_playing() || !self.feed.is_active() {
            return false;
        }
        let Some(chain) = &self.chain else {
            return false;
        };
        let position = self.transport.position(self.device.now());
        self.feed.deliver(chain.analyser(), position)
    }

    /// Releases the output device. The player can't play afterwards.
    pub fn close(&mut self) {
        if self.released {
            return;
        }
        let span = self.span.clone();
        let _enter = span.enter();
        self.teardown();
        self.feed.cancel();
        self.transport.stop();
        self.device.release();
        self.released = true;
        info!(device = self.device.to_string(), "Closed player.");
    }

    fn gain(&self) -> f32 {
        if self.muted {
            0.0
        } else {
            1.0
        }
    }

    /// Stops and disconnects the live chain, if any.
    fn teardown(&mut self) {
        if let Some(chain) = self.chain.take() {
            chain.stop();
            self.device.disconnect();
        }
    }

    fn drain_events(&self) {
        while self.events_rx.try_recv().is_ok() {}
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod test {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use super::*;
    use crate::audio::mock;
    use crate::testutil::audio_test_utils::sine;

    const RATE: u32 = 24000;

    fn setup(seconds: usize) -> (Arc<mock::Device>, Player) {
        let device = Arc::new(mock::Device::get("mock-device"));
        let mut player = Player::new(device.clone(), PlayerSettings::default()).unwrap();
        let samples = sine(440.0, 0.5, RATE, RATE as usize * seconds);
        player.load_buffer(Arc::new(SampleBuffer::new(vec![samples], RATE).unwrap()));
        (device, player)
    }

    fn advance(device: &mock::Device, millis: u64) {
        device.advance(Duration::from_millis(millis));
    }

    fn recorder(player: &mut Player) -> Arc<Mutex<Vec<(Vec<u8>, f64)>>> {
        let frames = Arc::new(Mutex::new(Vec::new()));
        let recorded = frames.clone();
        player.subscribe(Box::new(move |magnitudes, position| {
            recorded.lock().unwrap().push((magnitudes.to_vec(), position));
        }));
        frames
    }

    #[test]
    fn test_play_pause_resume() {
        let (device, mut player) = setup(2);
        assert_eq!(player.state(), TransportState::Idle);
        assert_eq!(player.duration(), 2.0);

        player.play();
        assert!(player.is_playing());
        assert!(device.is_playing());

        advance(&device, 1000);
        assert!((player.current_position() - 1.0).abs() < 0.1);

        player.pause();
        assert!(!player.is_playing());
        assert!(!device.is_playing());
        let paused = player.current_position();
        assert!((paused - 1.0).abs() < 0.1);

        advance(&device, 500);
        assert_eq!(player.current_position(), paused);

        player.play();
        advance(&device, 250);
        assert!((player.current_position() - (paused + 0.25)).abs() < 0.01);
    }

    #[test]
    fn test_play_twice_keeps_chain() {
        let (device, mut player) = setup(2);
        player.play();
        advance(&device, 500);
        player.play();
        assert!((player.current_position() - 0.5).abs() < 0.01);
    }

    #[test]
    fn test_noops_without_buffer() {
        let device = Arc::new(mock::Device::get("mock-device"));
        let mut player = Player::new(device.clone(), PlayerSettings::default()).unwrap();
        player.play();
        player.pause();
        player.seek(1.0);
        player.stop();
        assert!(!player.is_playing());
        assert!(!device.is_playing());
        assert_eq!(player.current_position(), 0.0);
        assert_eq!(player.duration(), 0.0);
        assert!(player.buffer().is_none());
    }

    #[test]
    fn test_pause_from_idle() {
        let (device, mut player) = setup(2);
        for offset in [0.0, 0.7, 2.0] {
            player.seek(offset);
            advance(&device, 100);
            player.pause();
            assert_eq!(player.state(), TransportState::Idle);
            assert_eq!(player.current_position(), offset);
        }
    }

    #[test]
    fn test_seek() {
        let (device, mut player) = setup(2);
        player.seek(1.5);
        assert_eq!(player.current_position(), 1.5);
        player.seek(-1.0);
        assert_eq!(player.current_position(), 0.0);
        player.seek(10.0);
        assert_eq!(player.current_position(), 2.0);

        player.seek(0.5);
        player.play();
        advance(&device, 200);
        player.seek(1.0);
        assert!(player.is_playing());
        advance(&device, 300);
        assert!((player.current_position() - 1.3).abs() < 0.01);
    }

    #[test]
    fn test_stop() {
        let (device, mut player) = setup(2);
        player.play();
        advance(&device, 700);
        player.stop();
        assert_eq!(player.state(), TransportState::Idle);
        assert_eq!(player.current_position(), 0.0);
        assert!(!device.is_playing());
        assert!(player.frame_handle().is_none());
    }

    #[test]
    fn test_natural_end() {
        let (device, mut player) = setup(2);
        player.play();
        let handle = player.frame_handle().unwrap();

        advance(&device, 2100);
        assert!(player.poll());
        assert_eq!(player.state(), TransportState::Ended);
        assert_eq!(player.current_position(), 0.0);
        assert!(handle.is_cancelled());
        assert!(player.frame_handle().is_none());
        assert!(!device.is_playing());

        // Playing again starts from the beginning.
        player.play();
        advance(&device, 500);
        assert!((player.current_position() - 0.5).abs() < 0.01);
    }

    #[test]
    fn test_seek_from_ended() {
        let (device, mut player) = setup(1);
        player.play();
        advance(&device, 1100);
        player.poll();
        assert_eq!(player.state(), TransportState::Ended);

        player.seek(0.25);
        assert_eq!(player.state(), TransportState::Idle);
        assert_eq!(player.current_position(), 0.25);
    }

    #[test]
    fn test_stale_end_is_ignored() {
        let (device, mut player) = setup(2);
        player.play();
        // The source runs out but the end isn't handled before the user pauses.
        advance(&device, 2100);
        player.pause();
        player.seek(0.5);
        player.play();

        assert!(!player.poll());
        assert!(player.is_playing());
        assert!(player.frame_handle().is_some());
        assert!((player.current_position() - 0.5).abs() < 0.01);
    }

    #[test]
    fn test_mute() {
        let (device, mut player) = setup(2);
        let frames = recorder(&mut player);

        assert!(player.toggle_mute());
        player.play();
        advance(&device, 300);
        assert_eq!(device.last_peak(), 0.0);
        assert!(player.on_frame());
        {
            let frames = frames.lock().unwrap();
            let (magnitudes, _) = frames.last().unwrap();
            assert!(magnitudes.iter().all(|m| *m == 0));
        }

        let before = player.current_position();
        assert!(!player.toggle_mute());
        assert_eq!(player.current_position(), before);
        advance(&device, 300);
        assert!(device.last_peak() > 0.4);
        assert!(player.on_frame());
        let frames = frames.lock().unwrap();
        let (magnitudes, _) = frames.last().unwrap();
        assert!(magnitudes.iter().any(|m| *m > 0));
    }

    #[test]
    fn test_spectrum_frames() {
        let (device, mut player) = setup(2);
        let frames = recorder(&mut player);

        // Nothing is delivered before playing.
        assert!(!player.on_frame());

        player.play();
        advance(&device, 500);
        assert!(player.on_frame());

        {
            let frames = frames.lock().unwrap();
            assert_eq!(frames.len(), 1);
            let (magnitudes, position) = &frames[0];
            assert_eq!(magnitudes.len(), 256);
            assert!((position - 0.5).abs() < 0.01);

            // 440Hz at 24kHz with 512 point frames lands in bin 9.
            let peak = magnitudes
                .iter()
                .enumerate()
                .max_by_key(|(_, m)| **m)
                .map(|(bin, _)| bin)
                .unwrap();
            assert!((8..=10).contains(&peak), "peak bin was {}", peak);
        }

        // Pausing stops the frames.
        player.pause();
        assert!(!player.on_frame());
        assert_eq!(frames.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_unsubscribe() {
        let (device, mut player) = setup(1);
        let frames = Arc::new(Mutex::new(0));
        let counted = frames.clone();
        let id = player.subscribe(Box::new(move |_, _| *counted.lock().unwrap() += 1));

        player.play();
        advance(&device, 100);
        player.on_frame();
        assert!(player.unsubscribe(id));
        player.on_frame();
        assert_eq!(*frames.lock().unwrap(), 1);
    }

    #[test]
    fn test_load_resets() {
        let (device, mut player) = setup(2);
        player.play();
        advance(&device, 600);
        let handle = player.frame_handle().unwrap();

        let samples = sine(220.0, 0.5, RATE, RATE as usize * 3);
        player.load_buffer(Arc::new(SampleBuffer::new(vec![samples], RATE).unwrap()));
        assert_eq!(player.state(), TransportState::Idle);
        assert_eq!(player.current_position(), 0.0);
        assert_eq!(player.duration(), 3.0);
        assert!(handle.is_cancelled());
        assert!(!device.is_playing());

        player.unload();
        assert!(player.buffer().is_none());
        player.play();
        assert!(!player.is_playing());
    }

    #[test]
    fn test_close_releases_device() {
        let (device, mut player) = setup(2);
        player.play();
        player.close();
        assert!(device.is_released());
        assert!(!player.is_playing());

        player.play();
        assert!(!player.is_playing());
        assert!(!device.is_playing());

        let (device, player) = setup(1);
        drop(player);
        assert!(device.is_released());
    }

    #[test]
    fn test_invalid_analyser_settings() {
        let device = Arc::new(mock::Device::get("mock-device"));
        let settings = PlayerSettings {
            analyser: AnalyserSettings {
                fft_size: 100,
                ..AnalyserSettings::default()
            },
            ..PlayerSettings::default()
        };
        assert!(matches!(
            Player::new(device, settings),
            Err(AnalyserError::InvalidFftSize(100))
        ));
    }
}
