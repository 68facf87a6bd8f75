//! Run options for the sequencer.

use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Environment variable overriding [`RunOptions::step_delay_ms`].
pub const STEP_DELAY_ENV: &str = "DECKHAND_STEP_DELAY_MS";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunOptions {
    /// Pause between consecutive instructions, in milliseconds. Zero disables it.
    pub step_delay_ms: u64,
}

impl RunOptions {
    pub fn with_step_delay_ms(mut self, step_delay_ms: u64) -> Self {
        self.step_delay_ms = step_delay_ms;
        self
    }

    pub fn step_delay(&self) -> Option<Duration> {
        (self.step_delay_ms > 0).then(|| Duration::from_millis(self.step_delay_ms))
    }

    /// Applies [`STEP_DELAY_ENV`] when it holds a valid number. Invalid values
    /// are logged and ignored.
    pub fn apply_env_overrides(&mut self) {
        let Ok(raw) = env::var(STEP_DELAY_ENV) else {
            return;
        };
        match raw.trim().parse::<u64>() {
            Ok(delay) => self.step_delay_ms = delay,
            Err(error) => warn!(variable = STEP_DELAY_ENV, value = %raw, error = %error, "ignoring invalid step delay"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_delay_is_disabled() {
        assert_eq!(RunOptions::default().step_delay(), None);
        assert_eq!(
            RunOptions::default().with_step_delay_ms(250).step_delay(),
            Some(Duration::from_millis(250))
        );
    }

    #[test]
    fn test_env_override() {
        temp_env::with_var(STEP_DELAY_ENV, Some("40"), || {
            let mut options = RunOptions::default().with_step_delay_ms(5);
            options.apply_env_overrides();
            assert_eq!(options.step_delay_ms, 40);
        });
        temp_env::with_var(STEP_DELAY_ENV, Some("soon"), || {
            let mut options = RunOptions::default().with_step_delay_ms(5);
            options.apply_env_overrides();
            assert_eq!(options.step_delay_ms, 5);
        });
    }

    #[test]
    fn test_deserialize_partial_document() {
        let options: RunOptions = serde_yaml::from_str("{}").expect("empty");
        assert_eq!(options, RunOptions::default());
        let options: RunOptions = serde_yaml::from_str("step_delay_ms: 15").expect("delay");
        assert_eq!(options.step_delay_ms, 15);
    }
}
