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
use crate::audio::analyser::Analyser;
use crate::playsync::CancelHandle;

/// Identifies a spectrum subscription.
pub type SubscriptionId = u64;

/// Receives the magnitude of each frequency bin (0-255) and the position in seconds.
pub type SpectrumCallback = Box<dyn FnMut(&[u8], f64) + Send>;

/// Delivers analyser snapshots to subscribers, one per display frame, for the
/// duration of a single run of playback.
///
/// Each run gets its own cancel handle. Cancelling it is what stops the loop; the
/// frame callback checks it before doing anything.
pub struct SpectrumFeed {
    subscribers: Vec<(SubscriptionId, SpectrumCallback)>,
    next_id: SubscriptionId,
    task: Option<CancelHandle>,
    magnitudes: Vec<u8>,
}

impl SpectrumFeed {
    pub fn new() -> SpectrumFeed {
        SpectrumFeed {
            subscribers: Vec::new(),
            next_id: 0,
            task: None,
            magnitudes: Vec::new(),
        }
    }

    pub fn subscribe(&mut self, callback: SpectrumCallback) -> SubscriptionId {
        let id = self.next_id;
        self.next_id += 1;
        self.subscribers.push((id, callback));
        id
    }

    /// Removes a subscription. Returns false if it didn't exist.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(subscriber, _)| *subscriber != id);
        before != self.subscribers.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Starts a new run, cancelling any previous one. Returns the run's handle.
    pub fn start(&mut self) -> CancelHandle {
        self.cancel();
        let task = CancelHandle::new();
        self.task = Some(task.clone());
        task
    }

    /// Cancels the current run, if any.
    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.cancel();
        }
    }

    /// Returns the current run's handle.
    pub fn task(&self) -> Option<&CancelHandle> {
        self.task.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_cancelled())
    }

    /// Reads one snapshot from the analyser and hands it to every subscriber. Does
    /// nothing unless a run is active.
    pub fn deliver(&mut self, analyser: &Analyser, position: f64) -> bool {
        if !self.is_active() {
            return false;
        }

        self.magnitudes.resize(analyser.frequency_bin_count(), 0);
        analyser.byte_frequency_data(&mut self.magnitudes);
        for (_, callback) in self.subscribers.iter_mut() {
            callback(&self.magnitudes, position);
        }
        true
    }
}

impl Default for SpectrumFeed {
    fn default() -> Self {
        SpectrumFeed::new()
    }
}

#[cfg(test)]
mod test {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::audio::analyser::AnalyserSettings;

    #[test]
    fn test_subscribe_and_unsubscribe() {
        let mut feed = SpectrumFeed::new();
        let first = feed.subscribe(Box::new(|_, _| {}));
        let second = feed.subscribe(Box::new(|_, _| {}));
        assert_ne!(first, second);
        assert_eq!(feed.subscriber_count(), 2);

        assert!(feed.unsubscribe(first));
        assert!(!feed.unsubscribe(first));
        assert_eq!(feed.subscriber_count(), 1);
    }

    #[test]
    fn test_deliver_only_while_active() {
        let analyser = Analyser::new(AnalyserSettings::default()).unwrap();
        let frames: Arc<Mutex<Vec<(usize, f64)>>> = Arc::new(Mutex::new(Vec::new()));

        let mut feed = SpectrumFeed::new();
        {
            let frames = frames.clone();
            feed.subscribe(Box::new(move |magnitudes, position| {
                frames.lock().unwrap().push((magnitudes.len(), position));
            }));
        }

        assert!(!feed.deliver(&analyser, 0.0));

        let task = feed.start();
        assert!(feed.is_active());
        assert!(feed.deliver(&analyser, 0.5));

        feed.cancel();
        assert!(task.is_cancelled());
        assert!(!feed.is_active());
        assert!(!feed.deliver(&analyser, 0.75));

        assert_eq!(*frames.lock().unwrap(), vec![(256, 0.5)]);
    }

    #[test]
    fn test_restart_cancels_previous_run() {
        let mut feed = SpectrumFeed::new();
        let first = feed.start();
        let second = feed.start();
        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());
        assert!(feed.is_active());
    }
}
