//! TripCraft configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::{ConfidenceWeights, format_amount};
use crate::events::DEFAULT_CHANNEL_CAPACITY;
use crate::modification::ConflictRules;
use crate::pipeline::{BudgetShares, NIGHTLY_FLOOR, StageSet};
use crate::session::Planner;

/// Main TripCraft configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Budget category percentages
    pub budget: BudgetShares,

    /// Per-stage weights for the overall confidence
    pub confidence: ConfidenceWeights,

    /// Conflict rule thresholds
    pub conflicts: ConflictRules,

    /// Session store settings
    pub sessions: SessionsConfig,
}

impl Config {
    /// Validate configuration before use
    ///
    /// Call this early in startup to fail fast with clear error messages.
    pub fn validate(&self) -> Result<()> {
        self.budget.validate().context("Invalid budget shares")?;

        if !self.confidence.is_valid() {
            eyre::bail!(
                "Confidence weights must be non-negative and sum to 1.0 (got {:.3})",
                self.confidence.total()
            );
        }

        if self.conflicts.min_hotel_nightly_rate < 0.0 || self.conflicts.min_flight_fare < 0.0 {
            eyre::bail!("Conflict thresholds must not be negative");
        }
        if self.conflicts.min_hotel_nightly_rate < NIGHTLY_FLOOR {
            eyre::bail!(
                "min-hotel-nightly-rate must be at least {}, the cheapest rate the hotel stage prices",
                format_amount(NIGHTLY_FLOOR)
            );
        }
        if !(self.conflicts.cheaper_factor > 0.0 && self.conflicts.cheaper_factor < 1.0) {
            eyre::bail!(
                "cheaper-factor must be between 0 and 1 (got {})",
                self.conflicts.cheaper_factor
            );
        }

        if self.sessions.event_capacity == 0 {
            eyre::bail!("sessions.event-capacity must be at least 1");
        }

        Ok(())
    }

    /// Load configuration with fallback chain
    ///
    /// Explicit path, then `./.tripcraft.yml`, then
    /// `~/.config/tripcraft/tripcraft.yml`, then defaults.
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        let local_config = PathBuf::from(".tripcraft.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("tripcraft").join("tripcraft.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Build a planner over `stages` from this configuration
    pub fn planner(&self, stages: StageSet) -> Result<Planner> {
        Planner::new(
            stages,
            self.budget.clone(),
            self.confidence.clone(),
            self.conflicts.clone(),
        )
        .context("Invalid budget shares")
    }
}

/// Session store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionsConfig {
    /// Sessions idle longer than this are dropped
    #[serde(rename = "max-idle-hours")]
    pub max_idle_hours: u64,

    /// Event bus capacity
    #[serde(rename = "event-capacity")]
    pub event_capacity: usize,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            max_idle_hours: 24,
            event_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl SessionsConfig {
    pub fn max_idle(&self) -> chrono::Duration {
        // Capped at a century
        chrono::Duration::hours(self.max_idle_hours.min(876_000) as i64)
    }
}
