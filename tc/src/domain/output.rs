//! Stage names and stage outputs

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The planning stages, in declaration order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageName {
    Destination,
    Flight,
    Hotel,
    Dining,
    Budget,
    Itinerary,
    Verification,
}

impl StageName {
    /// Every stage in declaration order
    pub const ALL: [StageName; 7] = [
        StageName::Destination,
        StageName::Flight,
        StageName::Hotel,
        StageName::Dining,
        StageName::Budget,
        StageName::Itinerary,
        StageName::Verification,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Destination => "destination",
            Self::Flight => "flight",
            Self::Hotel => "hotel",
            Self::Dining => "dining",
            Self::Budget => "budget",
            Self::Itinerary => "itinerary",
            Self::Verification => "verification",
        }
    }
}

impl std::fmt::Display for StageName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for StageName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|stage| stage.as_str() == s.to_lowercase())
            .ok_or_else(|| format!("Unknown stage: {}", s))
    }
}

/// Where a stage's data came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    /// Live backend (API)
    Primary,
    /// Curated seed data
    Secondary,
    /// Generated fallback
    Fallback,
}

impl std::fmt::Display for DataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Primary => write!(f, "primary"),
            Self::Secondary => write!(f, "secondary"),
            Self::Fallback => write!(f, "fallback"),
        }
    }
}

/// Output of one stage execution
///
/// Immutable once produced; plans hold outputs behind `Arc` so snapshots share them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageOutput {
    /// Stage-specific content
    pub payload: Value,

    pub data_source: DataSource,

    /// Confidence in [0.0, 1.0]; 0.0 means no data was found
    pub confidence: f64,

    pub warnings: Vec<String>,
}

impl StageOutput {
    /// Create an output, clamping confidence into [0.0, 1.0]
    pub fn new(payload: Value, data_source: DataSource, confidence: f64) -> Self {
        let confidence = if confidence.is_nan() { 0.0 } else { confidence.clamp(0.0, 1.0) };
        Self {
            payload,
            data_source,
            confidence,
            warnings: Vec::new(),
        }
    }

    /// A degraded output: nothing found, but not a failure
    pub fn empty(data_source: DataSource, warning: impl Into<String>) -> Self {
        Self {
            payload: Value::Null,
            data_source,
            confidence: 0.0,
            warnings: vec![warning.into()],
        }
    }

    /// Builder method to add a warning
    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }

    /// Whether the stage found nothing usable
    pub fn is_degraded(&self) -> bool {
        self.confidence == 0.0
    }

    /// Read a numeric field from the payload
    pub fn number(&self, key: &str) -> Option<f64> {
        self.payload.get(key).and_then(Value::as_f64)
    }
}
