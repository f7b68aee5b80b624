use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::capture::CaptureRegion;
use crate::detection::Signal;
use crate::error::ConfigError;
use crate::team::{Team, DEFAULT_ACCEPTANCE};

/// Capture rectangles, in pixels of a 1920x1080 frame.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Regions {
    pub scores: CaptureRegion,
    pub time: CaptureRegion,
    pub energy: CaptureRegion,
    pub objectives: CaptureRegion,
    pub kos: CaptureRegion,
    pub defeated: CaptureRegion,
    pub state: CaptureRegion,
    pub score_option: CaptureRegion,
}

impl Default for Regions {
    fn default() -> Self {
        let energy = CaptureRegion::from_corners(908, 764, 1008, 864);
        Self {
            scores: CaptureRegion::from_corners(500, 50, 1500, 250),
            time: CaptureRegion::from_corners(846, 0, 1046, 100),
            objectives: CaptureRegion::from_corners(350, 210, 1200, 310),
            kos: CaptureRegion::from_corners(730, 130, 1160, 310),
            // Middle third of the screen.
            defeated: CaptureRegion::from_corners(640, 0, 1280, 1080),
            state: CaptureRegion::from_corners(640, 0, 1280, 1080),
            score_option: CaptureRegion::from_corners(
                energy.x - 100,
                energy.y - 100,
                energy.right() + 100,
                energy.bottom() - 100,
            ),
            energy,
        }
    }
}

impl Regions {
    fn all(&self) -> [(&'static str, &CaptureRegion); 8] {
        [
            ("scores", &self.scores),
            ("time", &self.time),
            ("energy", &self.energy),
            ("objectives", &self.objectives),
            ("kos", &self.kos),
            ("defeated", &self.defeated),
            ("state", &self.state),
            ("score_option", &self.score_option),
        ]
    }
}

/// Back-off applied when a signal stays absent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BackoffConfig {
    /// Cadence multiplier while backed off.
    pub multiplier: f32,
    /// Consecutive absent ticks before backing off.
    pub absent_ticks: u32,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            multiplier: 4.0,
            absent_ticks: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Global correlation acceptance (0-1]
    pub acceptance: f32,

    /// Per-team acceptance overrides
    pub team_acceptance: BTreeMap<Team, f32>,

    /// Window in which an equal value is treated as the same detection
    pub duplicate_window_ms: u64,

    pub regions: Regions,

    /// Tick period per signal in milliseconds; missing entries use the signal default
    pub cadence_ms: BTreeMap<Signal, u64>,

    pub backoff: BackoffConfig,

    /// Delay before a tentative self score is confirmed
    pub confirm_delay_ms: u64,

    /// Reset an active match whose event log has been idle this long
    pub idle_reset_secs: u64,

    /// Signals that never run
    pub disabled: Vec<Signal>,

    /// Collect per-template statistics
    pub stats: bool,

    /// Root of the `<category>/<team>/<name>.png` template tree
    pub template_dir: PathBuf,

    /// Monitor captured by the screen source
    pub monitor_index: usize,

    /// Retention cap of the event log
    pub max_events: usize,
}

impl Default for Config {
    fn default() -> Self {
        let team_acceptance = [
            Team::Purple,
            Team::Orange,
            Team::First,
            Team::Player,
            Team::Energy,
        ]
        .into_iter()
        .map(|t| (t, t.default_acceptance()))
        .collect();

        Self {
            acceptance: DEFAULT_ACCEPTANCE,
            team_acceptance,
            duplicate_window_ms: 4000,
            regions: Regions::default(),
            cadence_ms: Signal::ALL
                .into_iter()
                .map(|s| (s, s.default_cadence_ms()))
                .collect(),
            backoff: BackoffConfig::default(),
            confirm_delay_ms: 1000,
            idle_reset_secs: 180,
            disabled: Vec::new(),
            stats: false,
            template_dir: PathBuf::from("templates"),
            monitor_index: 0,
            max_events: 4096,
        }
    }
}

impl Config {
    /// Load configuration from `path`.
    /// Creates a default config file if it doesn't exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let content = fs::read_to_string(path).map_err(|e| ConfigError::LoadFailed {
                path: path.display().to_string(),
                source: Box::new(e),
            })?;
            let config: Config =
                serde_json::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                    path: path.display().to_string(),
                    source: Box::new(e),
                })?;
            config.validate()?;
            tracing::info!("Loaded config from: {}", path.display());
            Ok(config)
        } else {
            let config = Config::default();
            config.save(path)?;
            tracing::info!("Created default config at: {}", path.display());
            Ok(config)
        }
    }

    /// Save configuration to disk
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| ConfigError::DirectoryCreationFailed {
                path: parent.display().to_string(),
                source: e,
            })?;
        }

        let json = serde_json::to_string_pretty(self).map_err(|e| ConfigError::SaveFailed {
            path: path.display().to_string(),
            source: Box::new(e),
        })?;
        fs::write(path, json).map_err(|e| ConfigError::SaveFailed {
            path: path.display().to_string(),
            source: Box::new(e),
        })?;

        Ok(())
    }

    /// Default config location under the platform config directory.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .map(|dir| dir.join("ArenaHud"))
            .unwrap_or_else(|| PathBuf::from("config"))
            .join("config.json")
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let in_range = |a: f32| a > 0.0 && a <= 1.0;

        if !in_range(self.acceptance) {
            return Err(ConfigError::Invalid(format!(
                "acceptance {} outside (0, 1]",
                self.acceptance
            )));
        }
        if let Some((team, a)) = self.team_acceptance.iter().find(|(_, a)| !in_range(**a)) {
            return Err(ConfigError::Invalid(format!(
                "acceptance {} for {} outside (0, 1]",
                a, team
            )));
        }
        if let Some((name, _)) = self.regions.all().into_iter().find(|(_, r)| r.is_empty()) {
            return Err(ConfigError::Invalid(format!("region {} is empty", name)));
        }
        if let Some((signal, _)) = self.cadence_ms.iter().find(|(_, ms)| **ms == 0) {
            return Err(ConfigError::Invalid(format!("cadence of {} is zero", signal)));
        }
        if self.duplicate_window_ms == 0 {
            return Err(ConfigError::Invalid("duplicate window is zero".to_string()));
        }
        if self.backoff.multiplier < 1.0 {
            return Err(ConfigError::Invalid(format!(
                "backoff multiplier {} below 1",
                self.backoff.multiplier
            )));
        }
        Ok(())
    }

    /// Acceptance for `team`, falling back to the global value.
    pub fn acceptance_for(&self, team: Team) -> f32 {
        self.team_acceptance
            .get(&team)
            .copied()
            .unwrap_or(self.acceptance)
    }

    pub fn cadence(&self, signal: Signal) -> Duration {
        Duration::from_millis(
            self.cadence_ms
                .get(&signal)
                .copied()
                .unwrap_or_else(|| signal.default_cadence_ms()),
        )
    }

    pub fn duplicate_window(&self) -> Duration {
        Duration::from_millis(self.duplicate_window_ms)
    }

    pub fn confirm_delay(&self) -> Duration {
        Duration::from_millis(self.confirm_delay_ms)
    }

    pub fn idle_reset(&self) -> Duration {
        Duration::from_secs(self.idle_reset_secs)
    }

    pub fn is_enabled(&self, signal: Signal) -> bool {
        !self.disabled.contains(&signal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.acceptance, 0.91);
        assert_eq!(config.duplicate_window_ms, 4000);
        assert_eq!(config.acceptance_for(Team::Player), 0.75);
        assert_eq!(config.acceptance_for(Team::Time), 0.91);
        assert_eq!(config.cadence(Signal::FirstScore), Duration::from_millis(250));
        assert_eq!(
            config.regions.energy,
            CaptureRegion::new(908, 764, 100, 100)
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let json = serde_json::to_string(&config).unwrap();
        let deserialized: Config = serde_json::from_str(&json).unwrap();

        assert_eq!(config.regions, deserialized.regions);
        assert_eq!(config.team_acceptance, deserialized.team_acceptance);
        assert_eq!(config.cadence_ms, deserialized.cadence_ms);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: Config = serde_json::from_str(r#"{"stats": true}"#).unwrap();
        assert!(config.stats);
        assert_eq!(config.max_events, 4096);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.acceptance = 1.5;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.regions.time.width = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.cadence_ms.insert(Signal::Clock, 0);
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.duplicate_window_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_creates_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let config = Config::load(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.idle_reset_secs, 180);

        let mut edited = config.clone();
        edited.disabled.push(Signal::KnockOuts);
        edited.save(&path).unwrap();

        let reloaded = Config::load(&path).unwrap();
        assert!(!reloaded.is_enabled(Signal::KnockOuts));
        assert!(reloaded.is_enabled(Signal::Clock));
    }
}
