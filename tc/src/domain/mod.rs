//! Domain types for TripCraft
//!
//! Core domain types: TripRequest, StageOutput, Plan, Modification.

mod id;
mod modification;
mod money;
mod output;
mod plan;
mod request;

pub use id::generate_id;
pub use modification::{
    AddActivityParams, AddCustomItemParams, ChangeFlightParams, ChangeHotelParams, ChangeMealParams, CustomItemKind,
    HotelConstraint, MealSlot, Modification, ModificationAction, ModificationResult, RegenerateParams,
    RemoveActivityParams,
};
pub use money::format_amount;
pub use output::{DataSource, StageName, StageOutput};
pub use plan::{ConfidenceWeights, Plan, PlanError, WEIGHT_EPSILON};
pub use request::{AccommodationTier, MAX_TRAVELERS, Pace, RequestError, TripPreferences, TripRequest};
