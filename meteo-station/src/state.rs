//! Station state
//!
//! Settings live in a `watch` channel and are replaced as a whole snapshot:
//! the control listener is the only writer, the broadcaster reads the latest
//! snapshot on every tick and is woken when it changes.

use crate::config::StationConfig;
use meteo_protocol::{EncodingFormat, Variable, TARGET_ALL};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq)]
pub struct StationSettings {
    pub encoding: EncodingFormat,
    pub frequency: Duration,
    pub sending: bool,
    pub running: bool,
    pub variables: Vec<Variable>,
}

impl StationSettings {
    pub fn initial(config: &StationConfig) -> Self {
        Self {
            encoding: EncodingFormat::Json,
            frequency: config.initial_frequency,
            sending: true,
            running: true,
            variables: config.variables.clone(),
        }
    }

    /// Case-insensitive lookup among the managed variables.
    pub fn variable_mut(&mut self, name: &str) -> Option<&mut Variable> {
        self.variables.iter_mut().find(|v| v.name.eq_ignore_ascii_case(name))
    }
}

pub struct StationState {
    pub server_id: String,
    settings: watch::Sender<StationSettings>,
}

pub type SharedState = Arc<StationState>;

impl StationState {
    pub fn new(server_id: impl Into<String>, initial: StationSettings) -> SharedState {
        let (settings, _) = watch::channel(initial);
        Arc::new(Self {
            server_id: server_id.into(),
            settings,
        })
    }

    pub fn snapshot(&self) -> StationSettings {
        self.settings.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<StationSettings> {
        self.settings.subscribe()
    }

    /// Applies `change` to a copy of the settings and publishes the copy
    /// only when `change` succeeds.
    pub fn try_update<T, E, F>(&self, change: F) -> Result<T, E>
    where
        F: FnOnce(&mut StationSettings) -> Result<T, E>,
    {
        let mut next = self.snapshot();
        let out = change(&mut next)?;
        self.settings.send_replace(next);
        Ok(out)
    }

    /// Exact match on the own id, `ALL` in any case.
    pub fn is_addressed(&self, target: &str) -> bool {
        target == self.server_id || target.eq_ignore_ascii_case(TARGET_ALL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> SharedState {
        let config = StationConfig::new("S1", 0, Vec::new());
        StationState::new("S1", StationSettings::initial(&config))
    }

    #[test]
    fn test_target_matching() {
        let state = state();
        assert!(state.is_addressed("S1"));
        assert!(state.is_addressed("ALL"));
        assert!(state.is_addressed("all"));
        assert!(!state.is_addressed("s1"));
        assert!(!state.is_addressed("S2"));
    }

    #[test]
    fn test_failed_update_leaves_settings_untouched() {
        let state = state();
        let before = state.snapshot();
        let result: Result<(), &str> = state.try_update(|s| {
            s.sending = false;
            Err("rejected")
        });
        assert!(result.is_err());
        assert_eq!(state.snapshot(), before);
    }

    #[tokio::test]
    async fn test_update_wakes_subscribers() {
        let state = state();
        let mut rx = state.subscribe();
        state
            .try_update(|s| {
                s.frequency = Duration::from_millis(250);
                Ok::<_, ()>(())
            })
            .unwrap();
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().frequency, Duration::from_millis(250));
    }
}
