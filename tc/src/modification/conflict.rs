//! Conflict detection
//!
//! Stateless rule evaluation of a modification against the current plan
//! (and, for queue-level checks, the pending modifications). Never mutates
//! anything; an empty result means the modification may be queued.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{Modification, ModificationAction, Plan, format_amount};
use crate::pipeline::{BudgetAllocationStrategy, BudgetCategory, NIGHTLY_FLOOR};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictType {
    BudgetExceeded,
    ImpossibleRequest,
    DependencyConflict,
    DataUnavailable,
}

impl std::fmt::Display for ConflictType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BudgetExceeded => write!(f, "budget-exceeded"),
            Self::ImpossibleRequest => write!(f, "impossible-request"),
            Self::DependencyConflict => write!(f, "dependency-conflict"),
            Self::DataUnavailable => write!(f, "data-unavailable"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Severity {
    Warning,
    Error,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// A reason a modification may not (or should not) proceed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conflict {
    pub conflict_type: ConflictType,
    pub severity: Severity,
    pub message: String,
    pub suggestions: Vec<String>,
}

impl Conflict {
    pub fn new(conflict_type: ConflictType, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            conflict_type,
            severity,
            message: message.into(),
            suggestions: Vec::new(),
        }
    }

    /// Builder method to add a remediation suggestion
    pub fn suggest(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    /// Blocking conflicts prevent queueing; warnings do not
    pub fn is_blocking(&self) -> bool {
        self.severity >= Severity::Error
    }
}

impl std::fmt::Display for Conflict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.conflict_type, self.message)
    }
}

/// Thresholds used by the conflict rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ConflictRules {
    /// Cheapest nightly rate considered feasible
    pub min_hotel_nightly_rate: f64,

    /// Cheapest per-traveler fare considered feasible
    pub min_flight_fare: f64,

    /// Ceiling factor applied to the current rate for "cheaper" hotel requests
    pub cheaper_factor: f64,
}

impl Default for ConflictRules {
    fn default() -> Self {
        Self {
            min_hotel_nightly_rate: NIGHTLY_FLOOR,
            min_flight_fare: 500_000.0,
            cheaper_factor: 0.8,
        }
    }
}

/// Checks modifications before they are queued
#[derive(Debug, Clone, Default)]
pub struct ConflictDetector {
    rules: ConflictRules,
    strategy: BudgetAllocationStrategy,
}

impl ConflictDetector {
    pub fn new(rules: ConflictRules, strategy: BudgetAllocationStrategy) -> Self {
        Self { rules, strategy }
    }

    pub fn rules(&self) -> &ConflictRules {
        &self.rules
    }

    /// Conflicts between a modification and the current plan
    pub fn check(&self, modification: &Modification, plan: &Plan) -> Vec<Conflict> {
        debug!(action = modification.action.kind(), "ConflictDetector::check: called");
        let trip_days = plan.request.duration_days().max(1);

        match &modification.action {
            ModificationAction::ChangeHotel(params) => {
                let mut conflicts = Vec::new();
                if let Some(max) = params.max_price {
                    conflicts.extend(self.check_hotel_price(max, plan));
                }
                conflicts
            }
            ModificationAction::ChangeFlight(params) => {
                let mut conflicts = Vec::new();
                if let Some(max) = params.max_price {
                    conflicts.extend(self.check_flight_price(max, params.direct_only, plan));
                }
                if params.preferred_airline.as_deref().is_some_and(|a| a.trim().is_empty()) {
                    conflicts.push(
                        Conflict::new(ConflictType::DataUnavailable, Severity::Error, "Airline name is required")
                            .suggest("Specify the airline (e.g., 'Garuda Indonesia') or leave it unset"),
                    );
                }
                conflicts
            }
            ModificationAction::ChangeMeal(params) => {
                let mut conflicts = Vec::new();
                if let Some(conflict) = day_out_of_range(params.day, trip_days) {
                    conflicts.push(conflict);
                }
                if params.dietary.trim().is_empty() {
                    conflicts.push(
                        Conflict::new(ConflictType::DataUnavailable, Severity::Error, "Dietary preference is required")
                            .suggest("Specify the dietary preference (e.g., 'vegetarian')"),
                    );
                }
                conflicts
            }
            ModificationAction::AddActivity(params) => {
                let mut conflicts = Vec::new();
                if params.activity_type.trim().is_empty() {
                    conflicts.push(
                        Conflict::new(ConflictType::DataUnavailable, Severity::Error, "Activity type is required")
                            .suggest("Specify the activity type (e.g., 'snorkeling')"),
                    );
                }
                if let Some(conflict) = params.day.and_then(|d| day_out_of_range(d, trip_days)) {
                    conflicts.push(conflict);
                }
                conflicts
            }
            ModificationAction::RemoveActivity(params) => {
                if params.activity_name.trim().is_empty() {
                    vec![
                        Conflict::new(ConflictType::DataUnavailable, Severity::Error, "Activity name is required")
                            .suggest("Specify the activity to remove (e.g., 'Monkey Forest')"),
                    ]
                } else {
                    Vec::new()
                }
            }
            ModificationAction::AddCustomItem(params) => {
                let mut conflicts = Vec::new();
                if params.item_name.trim().is_empty() {
                    conflicts.push(
                        Conflict::new(ConflictType::DataUnavailable, Severity::Error, "Item name is required")
                            .suggest("Specify the item name (e.g., 'Warung Bu Yanti')"),
                    );
                }
                if let Some(conflict) = params.day.and_then(|d| day_out_of_range(d, trip_days)) {
                    conflicts.push(conflict);
                }
                conflicts
            }
            ModificationAction::RegenerateComponent(params) => {
                if plan.output(params.component).is_none() {
                    vec![
                        Conflict::new(
                            ConflictType::DependencyConflict,
                            Severity::Error,
                            format!("Cannot regenerate {}: the plan has no {} output", params.component, params.component),
                        )
                        .suggest("Run the full pipeline again"),
                    ]
                } else {
                    Vec::new()
                }
            }
        }
    }

    /// Conflicts between a modification and modifications already queued
    pub fn check_pending(&self, modification: &Modification, pending: &[Modification]) -> Vec<Conflict> {
        debug!(pending = pending.len(), "ConflictDetector::check_pending: called");
        let ModificationAction::RemoveActivity(params) = &modification.action else {
            return Vec::new();
        };
        let target = params.activity_name.trim();

        pending
            .iter()
            .filter(|p| match &p.action {
                ModificationAction::AddActivity(add) => add.activity_name().eq_ignore_ascii_case(target),
                ModificationAction::AddCustomItem(add) => add.item_name.trim().eq_ignore_ascii_case(target),
                _ => false,
            })
            .map(|p| {
                Conflict::new(
                    ConflictType::DependencyConflict,
                    Severity::Error,
                    format!("'{}' is added by pending modification '{}'", target, p.description),
                )
                .suggest("Clear the queue or apply the pending addition first")
            })
            .collect()
    }

    fn check_hotel_price(&self, max: f64, plan: &Plan) -> Vec<Conflict> {
        if !max.is_finite() || max <= 0.0 {
            return vec![Conflict::new(
                ConflictType::ImpossibleRequest,
                Severity::Critical,
                "Hotel max price must be a positive amount",
            )];
        }

        let floor = self.rules.min_hotel_nightly_rate;
        if max < floor {
            return vec![
                Conflict::new(
                    ConflictType::ImpossibleRequest,
                    Severity::Error,
                    format!(
                        "Budget too low: no hotels available under {} per night",
                        format_amount(floor)
                    ),
                )
                .suggest(format!("Increase max price to at least {}", format_amount(floor * 2.0)))
                .suggest("Consider a different destination")
                .suggest("Look for hostels or guesthouses"),
            ];
        }

        let nights = f64::from(plan.request.duration_days().max(1));
        let Ok(allocation) = self.strategy.allocate(plan.request.budget) else {
            return Vec::new();
        };
        let share = allocation.amount(BudgetCategory::Hotel);
        if max * nights > share {
            return vec![
                Conflict::new(
                    ConflictType::BudgetExceeded,
                    Severity::Warning,
                    format!(
                        "Hotels at up to {} per night could cost {}, above the hotel budget of {}",
                        format_amount(max),
                        format_amount(max * nights),
                        format_amount(share)
                    ),
                )
                .suggest(format!("Lower the max price to {}", format_amount(share / nights))),
            ];
        }
        Vec::new()
    }

    fn check_flight_price(&self, max: f64, direct_only: bool, plan: &Plan) -> Vec<Conflict> {
        if !max.is_finite() || max <= 0.0 {
            return vec![Conflict::new(
                ConflictType::ImpossibleRequest,
                Severity::Critical,
                "Flight max price must be a positive amount",
            )];
        }

        let floor = self.rules.min_flight_fare;
        if max < floor {
            let mut conflict = Conflict::new(
                ConflictType::ImpossibleRequest,
                Severity::Error,
                format!("Budget too low: no flights available under {}", format_amount(floor)),
            )
            .suggest(format!("Increase max price to at least {}", format_amount(floor)))
            .suggest("Consider flexible travel dates");
            if direct_only {
                conflict = conflict.suggest("Allow connecting flights");
            }
            return vec![conflict];
        }

        let travelers = f64::from(plan.request.travelers.max(1));
        let Ok(allocation) = self.strategy.allocate(plan.request.budget) else {
            return Vec::new();
        };
        let share = allocation.amount(BudgetCategory::Flight);
        if max * travelers > share {
            return vec![Conflict::new(
                ConflictType::BudgetExceeded,
                Severity::Warning,
                format!(
                    "Fares up to {} for {} traveler(s) could exceed the flight budget of {}",
                    format_amount(max),
                    plan.request.travelers,
                    format_amount(share)
                ),
            )];
        }
        Vec::new()
    }
}

/// Impossible-request conflict when `day` is outside 1..=trip_days
fn day_out_of_range(day: u32, trip_days: u32) -> Option<Conflict> {
    if (1..=trip_days).contains(&day) {
        return None;
    }
    Some(
        Conflict::new(
            ConflictType::ImpossibleRequest,
            Severity::Error,
            format!("Day {} is outside the trip (days 1-{})", day, trip_days),
        )
        .suggest(format!("Choose a day between 1 and {}", trip_days)),
    )
}

/// Whether any conflict blocks queueing
pub fn has_blocking(conflicts: &[Conflict]) -> bool {
    conflicts.iter().any(Conflict::is_blocking)
}
