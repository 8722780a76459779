//! TripRequest domain type
//!
//! The immutable description of the trip a session plans for.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum travelers accepted in one request
pub const MAX_TRAVELERS: u32 = 20;

/// Errors from request validation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RequestError {
    #[error("Destination must not be empty")]
    EmptyDestination,

    #[error("End date {end} must be after start date {start}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    #[error("Budget must be a positive amount, got {0}")]
    InvalidBudget(f64),

    #[error("Traveler count must be between 1 and 20, got {0}")]
    InvalidTravelers(u32),
}

/// Accommodation tier preference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum AccommodationTier {
    Budget,
    #[default]
    MidRange,
    Luxury,
}

/// Daily pace preference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Pace {
    Relaxed,
    #[default]
    Moderate,
    Packed,
}

/// User preferences for trip planning
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TripPreferences {
    pub accommodation: AccommodationTier,

    /// e.g. culture, food, nature
    pub interests: Vec<String>,

    /// e.g. vegetarian, halal
    #[serde(rename = "dietary-restrictions")]
    pub dietary_restrictions: Vec<String>,

    pub pace: Pace,
}

/// A trip planning request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripRequest {
    /// City and country, e.g. "Bali, Indonesia"
    pub destination: String,

    /// Departure city for flights
    #[serde(default)]
    pub origin: Option<String>,

    #[serde(rename = "start-date")]
    pub start_date: NaiveDate,

    #[serde(rename = "end-date")]
    pub end_date: NaiveDate,

    /// Total budget for the whole trip
    pub budget: f64,

    #[serde(default = "default_travelers")]
    pub travelers: u32,

    #[serde(default)]
    pub preferences: TripPreferences,
}

fn default_travelers() -> u32 {
    1
}

impl TripRequest {
    /// Create a validated request
    pub fn new(
        destination: impl Into<String>,
        start_date: NaiveDate,
        end_date: NaiveDate,
        budget: f64,
        travelers: u32,
    ) -> Result<Self, RequestError> {
        let request = Self {
            destination: destination.into(),
            origin: None,
            start_date,
            end_date,
            budget,
            travelers,
            preferences: TripPreferences::default(),
        };
        request.validate()?;
        Ok(request)
    }

    /// Builder method to set the origin
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// Builder method to set preferences
    pub fn with_preferences(mut self, preferences: TripPreferences) -> Self {
        self.preferences = preferences;
        self
    }

    /// Check field constraints (deserialized requests must be validated before use)
    pub fn validate(&self) -> Result<(), RequestError> {
        if self.destination.trim().is_empty() {
            return Err(RequestError::EmptyDestination);
        }
        if self.end_date <= self.start_date {
            return Err(RequestError::InvalidDateRange {
                start: self.start_date,
                end: self.end_date,
            });
        }
        if !self.budget.is_finite() || self.budget <= 0.0 {
            return Err(RequestError::InvalidBudget(self.budget));
        }
        if self.travelers == 0 || self.travelers > MAX_TRAVELERS {
            return Err(RequestError::InvalidTravelers(self.travelers));
        }
        Ok(())
    }

    /// Number of nights (end date minus start date)
    pub fn duration_days(&self) -> u32 {
        (self.end_date - self.start_date).num_days().max(0) as u32
    }
}
