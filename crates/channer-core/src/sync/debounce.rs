//! Debouncing of remote change notifications
//!
//! A key becomes ready once no new signal for it arrived for a full quiet
//! window. Bursts of signals therefore collapse into one detection pass.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};

/// Pending keys and when each becomes ready
#[derive(Debug)]
pub struct DebounceState {
    window: Duration,
    deadlines: HashMap<String, Instant>,
}

impl DebounceState {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            deadlines: HashMap::new(),
        }
    }

    /// Note a signal for `key`, pushing its deadline back
    pub fn record(&mut self, key: impl Into<String>, now: Instant) {
        self.deadlines.insert(key.into(), now + self.window);
    }

    /// Remove and return every key whose quiet window has elapsed, sorted
    pub fn take_ready(&mut self, now: Instant) -> Vec<String> {
        let mut ready = self
            .deadlines
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(key, _)| key.clone())
            .collect::<Vec<_>>();
        for key in &ready {
            self.deadlines.remove(key);
        }
        ready.sort();
        ready
    }

    /// Remove and return everything still pending, sorted
    pub fn drain(&mut self) -> Vec<String> {
        let mut keys = self.deadlines.drain().map(|(key, _)| key).collect::<Vec<_>>();
        keys.sort();
        keys
    }

    /// Earliest pending deadline
    pub fn next_deadline(&self) -> Option<Instant> {
        self.deadlines.values().min().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.deadlines.is_empty()
    }
}

/// Handle feeding a background debounce task.
///
/// Dropping every handle flushes pending keys and stops the task.
#[derive(Debug, Clone)]
pub struct RemoteChangeDebouncer {
    signals: mpsc::UnboundedSender<String>,
}

impl RemoteChangeDebouncer {
    /// Start the debounce task; ready batches arrive on the returned receiver
    pub fn spawn(window: Duration) -> (Self, mpsc::UnboundedReceiver<Vec<String>>) {
        let (signals, mut incoming) = mpsc::unbounded_channel::<String>();
        let (ready_tx, ready_rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            let mut state = DebounceState::new(window);
            loop {
                let deadline = state.next_deadline();
                tokio::select! {
                    signal = incoming.recv() => {
                        if let Some(key) = signal {
                            state.record(key, Instant::now());
                        } else {
                            let rest = state.drain();
                            if !rest.is_empty() {
                                let _ = ready_tx.send(rest);
                            }
                            break;
                        }
                    }
                    () = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                        let ready = state.take_ready(Instant::now());
                        if !ready.is_empty() && ready_tx.send(ready).is_err() {
                            break;
                        }
                    }
                }
            }
            tracing::debug!("Remote change debouncer stopped");
        });

        (Self { signals }, ready_rx)
    }

    /// Report a remote change for `key`
    pub fn notify(&self, key: impl Into<String>) {
        if self.signals.send(key.into()).is_err() {
            tracing::warn!("Remote change debouncer is no longer running");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_waits_for_quiet_window() {
        let start = Instant::now();
        let mut state = DebounceState::new(Duration::from_millis(500));

        state.record("favorites", start);
        state.record("favorites", start + Duration::from_millis(300));
        assert!(state.take_ready(start + Duration::from_millis(600)).is_empty());

        assert_eq!(
            state.take_ready(start + Duration::from_millis(800)),
            vec!["favorites".to_string()]
        );
        assert!(state.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn burst_collapses_into_one_batch() {
        let (debouncer, mut ready) = RemoteChangeDebouncer::spawn(Duration::from_millis(500));

        debouncer.notify("favorites");
        debouncer.notify("favorites");
        debouncer.notify("threadHistory");
        debouncer.notify("favorites");

        let batch = ready.recv().await.unwrap();
        assert_eq!(
            batch,
            vec!["favorites".to_string(), "threadHistory".to_string()]
        );
        assert!(ready.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn late_signal_extends_window() {
        let start = Instant::now();
        let (debouncer, mut ready) = RemoteChangeDebouncer::spawn(Duration::from_millis(500));

        debouncer.notify("favorites");
        tokio::time::sleep(Duration::from_millis(300)).await;
        debouncer.notify("favorites");

        let batch = ready.recv().await.unwrap();
        assert_eq!(batch, vec!["favorites".to_string()]);
        assert!(start.elapsed() >= Duration::from_millis(800));
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_handle_flushes_pending_keys() {
        let (debouncer, mut ready) = RemoteChangeDebouncer::spawn(Duration::from_secs(60));
        debouncer.notify("settings");
        drop(debouncer);

        assert_eq!(ready.recv().await.unwrap(), vec!["settings".to_string()]);
        assert!(ready.recv().await.is_none());
    }
}
