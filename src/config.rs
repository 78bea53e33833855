//! Player configuration
//!
//! Settings are read from YAML. Every key is optional:
//!
//! ```yaml
//! tick-interval-ms: 100
//! playback-rate: 1.0
//! chord-octave: 3
//! keyboard-octaves: 2
//! lyric-policy: bounded
//! time-unit: seconds
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::PlayerError;
use crate::playback::{MAX_PLAYBACK_RATE, MIN_PLAYBACK_RATE};
use crate::song::TimeUnit;
use crate::timeline::LookupPolicy;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct PlayerConfig {
    /// Interval of the periodic time-update timer, in milliseconds
    pub tick_interval_ms: u64,
    /// Initial playback rate
    pub playback_rate: f64,
    /// Base octave for chord pitch sets and the first keyboard octave
    pub chord_octave: i32,
    /// Number of octaves shown on the virtual keyboard
    pub keyboard_octaves: u32,
    /// How lyric lines are matched against the playback position
    pub lyric_policy: LookupPolicy,
    /// Unit of the timestamps in song data files
    pub time_unit: TimeUnit,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 100,
            playback_rate: 1.0,
            chord_octave: 3,
            keyboard_octaves: 2,
            lyric_policy: LookupPolicy::Bounded,
            time_unit: TimeUnit::Seconds,
        }
    }
}

impl PlayerConfig {
    /// Parse and validate a YAML document.
    pub fn from_yaml(source: &str) -> Result<Self, PlayerError> {
        // An empty document means "all defaults"
        if source.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: PlayerConfig =
            serde_yaml::from_str(source).map_err(|e| PlayerError::ConfigError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, PlayerError> {
        let source = fs::read_to_string(path).map_err(|e| {
            PlayerError::ConfigError(format!("cannot read '{}': {}", path.display(), e))
        })?;
        Self::from_yaml(&source)
    }

    pub fn validate(&self) -> Result<(), PlayerError> {
        if self.tick_interval_ms == 0 {
            return Err(PlayerError::ConfigError(
                "tick-interval-ms must be greater than 0".to_string(),
            ));
        }
        if !(MIN_PLAYBACK_RATE..=MAX_PLAYBACK_RATE).contains(&self.playback_rate) {
            return Err(PlayerError::ConfigError(format!(
                "playback-rate {} is outside [{}, {}]",
                self.playback_rate, MIN_PLAYBACK_RATE, MAX_PLAYBACK_RATE
            )));
        }
        if self.keyboard_octaves == 0 {
            return Err(PlayerError::ConfigError(
                "keyboard-octaves must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}
