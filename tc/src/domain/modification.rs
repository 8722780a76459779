//! Modification domain types
//!
//! Each action carries a typed parameter struct; parameters are checked
//! when the modification is queued, not when it is applied.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::generate_id;
use super::money::format_amount;
use super::output::StageName;

/// Preference used when changing hotels without an explicit ceiling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HotelConstraint {
    Cheaper,
    Closer,
    Upgrade,
}

impl std::fmt::Display for HotelConstraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cheaper => write!(f, "cheaper"),
            Self::Closer => write!(f, "closer"),
            Self::Upgrade => write!(f, "upgrade"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MealSlot {
    Breakfast,
    Lunch,
    Dinner,
}

impl std::fmt::Display for MealSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Breakfast => write!(f, "breakfast"),
            Self::Lunch => write!(f, "lunch"),
            Self::Dinner => write!(f, "dinner"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CustomItemKind {
    Restaurant,
    Hotel,
    Attraction,
    Activity,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ChangeHotelParams {
    /// Nightly price ceiling
    #[serde(default)]
    pub max_price: Option<f64>,
    #[serde(default)]
    pub constraint: Option<HotelConstraint>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ChangeFlightParams {
    /// Round-trip fare ceiling per traveler
    #[serde(default)]
    pub max_price: Option<f64>,
    #[serde(default)]
    pub preferred_airline: Option<String>,
    #[serde(default)]
    pub direct_only: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ChangeMealParams {
    /// 1-indexed trip day
    pub day: u32,
    pub meal: MealSlot,
    pub dietary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AddActivityParams {
    pub activity_type: String,
    #[serde(default)]
    pub day: Option<u32>,
}

impl AddActivityParams {
    /// Name the added activity appears under in the itinerary
    pub fn activity_name(&self) -> String {
        let mut chars = self.activity_type.trim().chars();
        match chars.next() {
            Some(first) => format!("{} activity", first.to_uppercase().chain(chars).collect::<String>()),
            None => String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RemoveActivityParams {
    pub activity_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AddCustomItemParams {
    pub item_name: String,
    pub item_kind: CustomItemKind,
    #[serde(default)]
    pub day: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RegenerateParams {
    pub component: StageName,
}

/// A requested change with its typed parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum ModificationAction {
    ChangeHotel(ChangeHotelParams),
    ChangeFlight(ChangeFlightParams),
    ChangeMeal(ChangeMealParams),
    AddActivity(AddActivityParams),
    RemoveActivity(RemoveActivityParams),
    AddCustomItem(AddCustomItemParams),
    RegenerateComponent(RegenerateParams),
}

impl ModificationAction {
    /// Action tag as used in serialized form
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ChangeHotel(_) => "change-hotel",
            Self::ChangeFlight(_) => "change-flight",
            Self::ChangeMeal(_) => "change-meal",
            Self::AddActivity(_) => "add-activity",
            Self::RemoveActivity(_) => "remove-activity",
            Self::AddCustomItem(_) => "add-custom-item",
            Self::RegenerateComponent(_) => "regenerate-component",
        }
    }

    /// Default human-readable description
    pub fn describe(&self) -> String {
        match self {
            Self::ChangeHotel(p) => match (p.constraint, p.max_price) {
                (Some(constraint), _) => format!("Change hotel (constraint: {})", constraint),
                (None, Some(max)) => format!("Change hotel (max price: {})", format_amount(max)),
                (None, None) => "Change hotel".to_string(),
            },
            Self::ChangeFlight(p) => {
                let mut details = Vec::new();
                if let Some(max) = p.max_price {
                    details.push(format!("max price: {}", format_amount(max)));
                }
                if let Some(airline) = &p.preferred_airline {
                    details.push(format!("airline: {}", airline));
                }
                if p.direct_only {
                    details.push("direct only".to_string());
                }
                if details.is_empty() {
                    "Change flight".to_string()
                } else {
                    format!("Change flight ({})", details.join(", "))
                }
            }
            Self::ChangeMeal(p) => format!("Change Day {} {} to {}", p.day, p.meal, p.dietary),
            Self::AddActivity(p) => match p.day {
                Some(day) => format!("Add {} activity on Day {}", p.activity_type, day),
                None => format!("Add {} activity", p.activity_type),
            },
            Self::RemoveActivity(p) => format!("Remove {}", p.activity_name),
            Self::AddCustomItem(p) => match p.day {
                Some(day) => format!("Add {} on Day {}", p.item_name, day),
                None => format!("Add {}", p.item_name),
            },
            Self::RegenerateComponent(p) => format!("Regenerate {}", p.component),
        }
    }
}

/// A queued change request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Modification {
    pub id: String,

    pub action: ModificationAction,

    pub description: String,

    /// Stages that must re-run, in execution order
    pub affected_stages: Vec<StageName>,

    pub created_at: DateTime<Utc>,
}

impl Modification {
    /// Create a modification with the action's default description
    pub fn new(action: ModificationAction, affected_stages: Vec<StageName>) -> Self {
        let description = action.describe();
        Self {
            id: generate_id("mod", action.kind()),
            action,
            description,
            affected_stages,
            created_at: Utc::now(),
        }
    }

    /// Builder method to override the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Whether this modification requires the stage to re-run
    pub fn affects(&self, stage: StageName) -> bool {
        self.affected_stages.contains(&stage)
    }
}

/// Outcome of applying one modification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModificationResult {
    pub success: bool,
    pub modification: Modification,
    pub message: String,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ModificationResult {
    pub fn applied(modification: Modification, warnings: Vec<String>) -> Self {
        let message = format!("Applied: {}", modification.description);
        Self {
            success: true,
            modification,
            message,
            errors: Vec::new(),
            warnings,
        }
    }

    pub fn failed(modification: Modification, error: impl Into<String>) -> Self {
        let message = format!("Failed: {}", modification.description);
        Self {
            success: false,
            modification,
            message,
            errors: vec![error.into()],
            warnings: Vec::new(),
        }
    }
}
