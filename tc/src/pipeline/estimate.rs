//! Offline estimate stages
//!
//! Deterministic stand-ins for the real content generators. Each stage
//! derives its content from the request, the budget constraint and earlier
//! outputs only, so the same inputs always yield the same plan.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::debug;

use super::budget::{BudgetCategory, BudgetConstraint};
use super::context::PipelineContext;
use super::error::StageExecutionError;
use super::stage::{Stage, StageMetadata, StageSet};
use crate::domain::{
    AccommodationTier, DataSource, HotelConstraint, ModificationAction, Pace, StageName, StageOutput, TripRequest,
    format_amount,
};

/// Cheapest nightly rate the estimator can find
pub const NIGHTLY_FLOOR: f64 = 150_000.0;

const ESTIMATE_CONFIDENCE: f64 = 0.6;
const DEFAULT_AIRLINE: &str = "Garuda Indonesia";
const DEFAULT_ORIGIN: &str = "Jakarta";

/// Estimate implementation of a single stage
#[derive(Debug, Clone, Copy)]
pub struct EstimateStage {
    name: StageName,
}

impl EstimateStage {
    pub fn new(name: StageName) -> Self {
        Self { name }
    }

    /// A registry with an estimate stage for every pipeline stage
    pub fn stage_set() -> StageSet {
        let mut set = StageSet::new();
        for name in StageName::ALL {
            set.register(Arc::new(Self::new(name)));
        }
        set
    }
}

#[async_trait]
impl Stage for EstimateStage {
    fn name(&self) -> StageName {
        self.name
    }

    async fn execute(
        &self,
        request: &TripRequest,
        context: &PipelineContext,
        budget: &BudgetConstraint,
    ) -> Result<(StageOutput, StageMetadata), StageExecutionError> {
        debug!(stage = %self.name, "EstimateStage::execute: called");
        let result = match self.name {
            StageName::Destination => destination(request),
            StageName::Flight => flight(request, context, budget),
            StageName::Hotel => hotel(request, context, budget),
            StageName::Dining => dining(request, context, budget)?,
            StageName::Budget => budget_breakdown(request, context)?,
            StageName::Itinerary => itinerary(request, context, budget)?,
            StageName::Verification => verification(request, context)?,
        };
        Ok(result)
    }
}

/// First comma-separated part of the destination
fn city(request: &TripRequest) -> &str {
    request.destination.split(',').next().map(str::trim).unwrap_or(&request.destination)
}

fn title_case(s: &str) -> String {
    let mut chars = s.trim().chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn trip_days(request: &TripRequest) -> u32 {
    request.duration_days().max(1)
}

/// Whether the current batch asks to rebuild this stage from scratch
fn regenerating(context: &PipelineContext, stage: StageName) -> bool {
    context
        .modifications()
        .iter()
        .any(|m| matches!(&m.action, ModificationAction::RegenerateComponent(p) if p.component == stage))
}

/// Array field of the stage's previous output, unless it is being regenerated
fn carried(context: &PipelineContext, stage: StageName, key: &str) -> Vec<Value> {
    if regenerating(context, stage) {
        return Vec::new();
    }
    context
        .previous()
        .and_then(|p| p.payload.get(key))
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

fn destination(request: &TripRequest) -> (StageOutput, StageMetadata) {
    let city = city(request);
    let highlights: Vec<String> = request
        .preferences
        .interests
        .iter()
        .map(|i| format!("{} spots in {}", title_case(i), city))
        .collect();

    let payload = json!({
        "name": request.destination,
        "city": city,
        "days": trip_days(request),
        "highlights": highlights,
    });
    (
        StageOutput::new(payload, DataSource::Fallback, ESTIMATE_CONFIDENCE),
        StageMetadata::new(format!("Researched {}", city)),
    )
}

fn flight(request: &TripRequest, context: &PipelineContext, budget: &BudgetConstraint) -> (StageOutput, StageMetadata) {
    let travelers = f64::from(request.travelers.max(1));
    let mut fare = budget.limit / travelers * 0.9;
    if let Some(ceiling) = budget.price_ceiling {
        fare = fare.min(ceiling);
    }

    let mut airline = DEFAULT_AIRLINE.to_string();
    let mut direct = false;
    for modification in context.modifications() {
        if let ModificationAction::ChangeFlight(params) = &modification.action {
            if let Some(preferred) = &params.preferred_airline {
                airline = preferred.clone();
            }
            direct |= params.direct_only;
        }
    }

    let origin = request.origin.as_deref().unwrap_or(DEFAULT_ORIGIN);
    let estimated_cost = fare * travelers;
    let payload = json!({
        "airline": airline,
        "origin": origin,
        "destination": city(request),
        "direct": direct,
        "fare_per_traveler": fare,
        "estimated_cost": estimated_cost,
    });
    (
        StageOutput::new(payload, DataSource::Fallback, ESTIMATE_CONFIDENCE),
        StageMetadata::new(format!("{} from {}, {}", airline, origin, format_amount(estimated_cost))),
    )
}

fn hotel(request: &TripRequest, context: &PipelineContext, budget: &BudgetConstraint) -> (StageOutput, StageMetadata) {
    let city = city(request);
    let nights = trip_days(request);

    let mut tier = request.preferences.accommodation;
    let mut central = false;
    for modification in context.modifications() {
        if let ModificationAction::ChangeHotel(params) = &modification.action {
            match params.constraint {
                Some(HotelConstraint::Upgrade) => tier = AccommodationTier::Luxury,
                Some(HotelConstraint::Closer) => central = true,
                Some(HotelConstraint::Cheaper) | None => {}
            }
        }
    }

    let (factor, kind) = match tier {
        AccommodationTier::Budget => (0.6, "Guesthouse"),
        AccommodationTier::MidRange => (0.85, "Boutique Hotel"),
        AccommodationTier::Luxury => (1.0, "Resort & Spa"),
    };
    let mut nightly = budget.limit / f64::from(nights) * factor;
    if let Some(ceiling) = budget.price_ceiling {
        nightly = nightly.min(ceiling);
    }

    if nightly < NIGHTLY_FLOOR {
        let warning = format!("No hotels found under {} per night in {}", format_amount(nightly), city);
        return (
            StageOutput::empty(DataSource::Fallback, warning),
            StageMetadata::new("No hotels found"),
        );
    }

    let name = if central {
        format!("Central {} {}", city, kind)
    } else {
        format!("{} {}", city, kind)
    };
    let estimated_cost = nightly * f64::from(nights);
    let payload = json!({
        "name": name,
        "nightly_rate": nightly,
        "nights": nights,
        "estimated_cost": estimated_cost,
    });
    (
        StageOutput::new(payload, DataSource::Fallback, ESTIMATE_CONFIDENCE),
        StageMetadata::new(format!("{}, {} per night", name, format_amount(nightly))),
    )
}

fn dining(
    request: &TripRequest,
    context: &PipelineContext,
    budget: &BudgetConstraint,
) -> Result<(StageOutput, StageMetadata), StageExecutionError> {
    context.require(StageName::Destination, StageName::Dining)?;

    let label = request
        .preferences
        .dietary_restrictions
        .first()
        .map(|d| title_case(d))
        .unwrap_or_else(|| "Local".to_string());

    let mut overrides = carried(context, StageName::Dining, "overrides");
    for modification in context.modifications() {
        if let ModificationAction::ChangeMeal(params) = &modification.action {
            overrides.push(json!({
                "day": params.day,
                "meal": params.meal.to_string(),
                "dish": format!("{} {}", title_case(&params.dietary), params.meal),
            }));
        }
    }

    let meals: Vec<Value> = (1..=trip_days(request))
        .map(|day| {
            let mut entry = json!({"day": day});
            for slot in ["breakfast", "lunch", "dinner"] {
                let dish = overrides
                    .iter()
                    .rev()
                    .find(|o| o["day"].as_u64() == Some(u64::from(day)) && o["meal"].as_str() == Some(slot))
                    .and_then(|o| o["dish"].as_str().map(str::to_string))
                    .unwrap_or_else(|| format!("{} {}", label, slot));
                entry[slot] = json!(dish);
            }
            entry
        })
        .collect();

    let estimated_cost = budget.limit * 0.9;
    let payload = json!({
        "meals": meals,
        "overrides": overrides,
        "estimated_cost": estimated_cost,
    });
    Ok((
        StageOutput::new(payload, DataSource::Fallback, ESTIMATE_CONFIDENCE),
        StageMetadata::new(format!("{} days of meals, {}", meals.len(), format_amount(estimated_cost))),
    ))
}

fn budget_breakdown(
    request: &TripRequest,
    context: &PipelineContext,
) -> Result<(StageOutput, StageMetadata), StageExecutionError> {
    let mut warnings = Vec::new();
    let mut cost_of = |stage: StageName| -> Result<f64, StageExecutionError> {
        let output = context.require(stage, StageName::Budget)?;
        Ok(output.number("estimated_cost").unwrap_or_else(|| {
            warnings.push(format!("{} cost unavailable", stage));
            0.0
        }))
    };
    let flight = cost_of(StageName::Flight)?;
    let hotel = cost_of(StageName::Hotel)?;
    let dining = cost_of(StageName::Dining)?;

    let allocation = context.allocation();
    let activities = allocation.amount(BudgetCategory::Activities);
    let misc = allocation.amount(BudgetCategory::Misc);
    let total = flight + hotel + dining + activities + misc;
    let remaining = request.budget - total;

    let mut output = StageOutput::new(
        json!({
            "breakdown": {
                "flight": flight,
                "hotel": hotel,
                "dining": dining,
                "activities": activities,
                "misc": misc,
            },
            "total": total,
            "remaining": remaining,
            "within_budget": remaining >= 0.0,
        }),
        DataSource::Fallback,
        0.7,
    );
    if remaining < 0.0 {
        let over = (-remaining / request.budget * 100.0).round();
        output = output.with_warning(format!("Estimated total exceeds budget by {:.0}%", over));
    }
    for warning in warnings {
        output = output.with_warning(warning);
    }

    Ok((output, StageMetadata::new(format!("Estimated total {}", format_amount(total)))))
}

fn activities_per_day(pace: Pace) -> usize {
    match pace {
        Pace::Relaxed => 1,
        Pace::Moderate => 2,
        Pace::Packed => 3,
    }
}

fn itinerary(
    request: &TripRequest,
    context: &PipelineContext,
    budget: &BudgetConstraint,
) -> Result<(StageOutput, StageMetadata), StageExecutionError> {
    context.require(StageName::Destination, StageName::Itinerary)?;
    let city = city(request);
    let days = trip_days(request);

    let mut removed: Vec<String> = carried(context, StageName::Itinerary, "removed")
        .iter()
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect();
    let mut extras = carried(context, StageName::Itinerary, "extras");
    let mut warnings = Vec::new();

    for modification in context.modifications() {
        match &modification.action {
            ModificationAction::AddActivity(params) => extras.push(json!({
                "name": params.activity_name(),
                "kind": "activity",
                "day": params.day.unwrap_or(1),
            })),
            ModificationAction::AddCustomItem(params) => extras.push(json!({
                "name": params.item_name,
                "kind": params.item_kind,
                "day": params.day.unwrap_or(1),
            })),
            ModificationAction::RemoveActivity(params) => {
                removed.push(params.activity_name.clone());
            }
            _ => {}
        }
    }

    let is_removed = |name: &str| removed.iter().any(|r| r.eq_ignore_ascii_case(name));
    extras.retain(|e| !e["name"].as_str().is_some_and(is_removed));

    let interests: Vec<String> = if request.preferences.interests.is_empty() {
        vec!["sightseeing".to_string(), "local markets".to_string()]
    } else {
        request.preferences.interests.clone()
    };
    let per_day = activities_per_day(request.preferences.pace);
    let hotel_name = context
        .get(StageName::Hotel)
        .and_then(|h| h.payload.get("name"))
        .and_then(Value::as_str)
        .map(str::to_string);

    let mut total_activities = 0usize;
    let schedule: Vec<Value> = (1..=days)
        .map(|day| {
            let mut activities = Vec::new();
            if day == 1
                && let Some(hotel) = &hotel_name
            {
                activities.push(format!("Check in at {}", hotel));
            }
            for slot in 0..per_day {
                let idx = ((day as usize - 1) * per_day + slot) % interests.len();
                let name = format!("{} in {}", title_case(&interests[idx]), city);
                if !is_removed(&name) {
                    activities.push(name);
                }
            }
            for extra in &extras {
                let extra_day = extra["day"].as_u64().unwrap_or(1).clamp(1, u64::from(days));
                if extra_day == u64::from(day)
                    && let Some(name) = extra["name"].as_str()
                {
                    activities.push(name.to_string());
                }
            }
            total_activities += activities.len();
            json!({"day": day, "activities": activities})
        })
        .collect();

    // Removals that matched nothing in this pass
    for modification in context.modifications() {
        if let ModificationAction::RemoveActivity(params) = &modification.action {
            let base_match = interests
                .iter()
                .any(|i| format!("{} in {}", title_case(i), city).eq_ignore_ascii_case(&params.activity_name));
            let extra_match = carried(context, StageName::Itinerary, "extras")
                .iter()
                .any(|e| e["name"].as_str().is_some_and(|n| n.eq_ignore_ascii_case(&params.activity_name)));
            if !base_match && !extra_match {
                warnings.push(format!("No activity named '{}' in itinerary", params.activity_name));
            }
        }
    }

    let slots = (days as usize * per_day).max(1) as f64;
    let estimated_cost = budget.limit / slots * total_activities as f64;
    let mut output = StageOutput::new(
        json!({
            "days": schedule,
            "extras": extras,
            "removed": removed,
            "estimated_cost": estimated_cost,
        }),
        DataSource::Fallback,
        ESTIMATE_CONFIDENCE,
    );
    for warning in warnings {
        output = output.with_warning(warning);
    }

    Ok((
        output,
        StageMetadata::new(format!("{} days, {} activities", days, total_activities)),
    ))
}

fn verification(
    request: &TripRequest,
    context: &PipelineContext,
) -> Result<(StageOutput, StageMetadata), StageExecutionError> {
    let budget = context.require(StageName::Budget, StageName::Verification)?;
    let itinerary = context.require(StageName::Itinerary, StageName::Verification)?;

    let mut issues = Vec::new();
    let total = budget.number("total").unwrap_or(0.0);
    if total > request.budget {
        issues.push(format!(
            "Estimated total {} is above the budget of {}",
            format_amount(total),
            format_amount(request.budget)
        ));
    }
    let planned_days = itinerary
        .payload
        .get("days")
        .and_then(Value::as_array)
        .map(Vec::len)
        .unwrap_or(0);
    if planned_days != trip_days(request) as usize {
        issues.push(format!(
            "Itinerary covers {} days, trip has {}",
            planned_days,
            trip_days(request)
        ));
    }
    for stage in [StageName::Flight, StageName::Hotel, StageName::Dining] {
        if context.get(stage).is_some_and(|o| o.is_degraded()) {
            issues.push(format!("{} has no data", stage));
        }
    }

    let verified = issues.is_empty();
    let confidence = if verified { 0.9 } else { 0.4 };
    let summary = if verified {
        "Plan verified".to_string()
    } else {
        format!("{} issue(s) found", issues.len())
    };
    let mut output = StageOutput::new(
        json!({"verified": verified, "issues": issues, "total_estimate": total}),
        DataSource::Fallback,
        confidence,
    );
    for issue in &issues {
        output = output.with_warning(issue.clone());
    }
    Ok((output, StageMetadata::new(summary)))
}
