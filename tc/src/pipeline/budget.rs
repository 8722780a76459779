//! Budget allocation strategy
//!
//! Splits a total budget into fixed category shares. The last category
//! absorbs floating point remainder so that shares always sum to the total.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{StageName, format_amount};

/// Tolerance for share and allocation sums
pub const BUDGET_EPSILON: f64 = 1e-6;

/// Errors from budget allocation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BudgetError {
    #[error("Budget must be a positive finite amount, got {0}")]
    NonPositive(f64),

    #[error("Budget shares must sum to 100%, got {0}%")]
    InvalidShares(f64),
}

/// Budget categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetCategory {
    Flight,
    Hotel,
    Food,
    Activities,
    Misc,
}

impl BudgetCategory {
    pub const ALL: [BudgetCategory; 5] = [
        BudgetCategory::Flight,
        BudgetCategory::Hotel,
        BudgetCategory::Food,
        BudgetCategory::Activities,
        BudgetCategory::Misc,
    ];

    /// Category that bounds a stage's spending, if any
    pub fn for_stage(stage: StageName) -> Option<Self> {
        match stage {
            StageName::Flight => Some(Self::Flight),
            StageName::Hotel => Some(Self::Hotel),
            StageName::Dining => Some(Self::Food),
            StageName::Itinerary => Some(Self::Activities),
            StageName::Destination | StageName::Budget | StageName::Verification => None,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Flight => "Flights",
            Self::Hotel => "Hotels",
            Self::Food => "Food",
            Self::Activities => "Activities",
            Self::Misc => "Miscellaneous",
        }
    }
}

impl std::fmt::Display for BudgetCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Flight => write!(f, "flight"),
            Self::Hotel => write!(f, "hotel"),
            Self::Food => write!(f, "food"),
            Self::Activities => write!(f, "activities"),
            Self::Misc => write!(f, "misc"),
        }
    }
}

/// Category percentages (0-100)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetShares {
    pub flight: f64,
    pub hotel: f64,
    pub food: f64,
    pub activities: f64,
    pub misc: f64,
}

impl Default for BudgetShares {
    fn default() -> Self {
        Self {
            flight: 35.0,
            hotel: 30.0,
            food: 20.0,
            activities: 10.0,
            misc: 5.0,
        }
    }
}

impl BudgetShares {
    /// Percentage for a category
    pub fn percent(&self, category: BudgetCategory) -> f64 {
        match category {
            BudgetCategory::Flight => self.flight,
            BudgetCategory::Hotel => self.hotel,
            BudgetCategory::Food => self.food,
            BudgetCategory::Activities => self.activities,
            BudgetCategory::Misc => self.misc,
        }
    }

    /// Shares must be non-negative and sum to 100
    pub fn validate(&self) -> Result<(), BudgetError> {
        let total: f64 = BudgetCategory::ALL.iter().map(|c| self.percent(*c)).sum();
        let negative = BudgetCategory::ALL.iter().any(|c| self.percent(*c) < 0.0);
        if negative || (total - 100.0).abs() > BUDGET_EPSILON {
            return Err(BudgetError::InvalidShares(total));
        }
        Ok(())
    }
}

/// A total budget split into category amounts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetAllocation {
    pub total: f64,
    amounts: BTreeMap<BudgetCategory, f64>,
}

impl BudgetAllocation {
    /// Amount allocated to a category
    pub fn amount(&self, category: BudgetCategory) -> f64 {
        self.amounts.get(&category).copied().unwrap_or(0.0)
    }

    /// All category amounts
    pub fn amounts(&self) -> &BTreeMap<BudgetCategory, f64> {
        &self.amounts
    }

    /// Sum of all category amounts
    pub fn sum(&self) -> f64 {
        self.amounts.values().sum()
    }

    /// Human-readable allocation summary
    pub fn summary(&self) -> String {
        let mut lines = vec![format!("Budget Allocation (Total: {}):", format_amount(self.total))];
        for (category, amount) in &self.amounts {
            let percent = if self.total > 0.0 { amount / self.total * 100.0 } else { 0.0 };
            lines.push(format!(
                "  - {}: {} ({:.0}%)",
                category.label(),
                format_amount(*amount),
                percent
            ));
        }
        lines.join("\n")
    }
}

/// Allocates budgets using fixed category shares
#[derive(Debug, Clone, Default)]
pub struct BudgetAllocationStrategy {
    shares: BudgetShares,
}

impl BudgetAllocationStrategy {
    /// Create a strategy; shares are validated up front
    pub fn new(shares: BudgetShares) -> Result<Self, BudgetError> {
        shares.validate()?;
        Ok(Self { shares })
    }

    pub fn shares(&self) -> &BudgetShares {
        &self.shares
    }

    /// Split a total budget into category amounts
    pub fn allocate(&self, total: f64) -> Result<BudgetAllocation, BudgetError> {
        if !total.is_finite() || total <= 0.0 {
            return Err(BudgetError::NonPositive(total));
        }

        let mut amounts = BTreeMap::new();
        let mut assigned = 0.0;
        let (last, rest) = BudgetCategory::ALL.split_last().ok_or(BudgetError::InvalidShares(0.0))?;

        for category in rest {
            let amount = total * self.shares.percent(*category) / 100.0;
            assigned += amount;
            amounts.insert(*category, amount);
        }
        amounts.insert(*last, (total - assigned).max(0.0));

        Ok(BudgetAllocation { total, amounts })
    }
}

/// Spending bounds handed to a stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetConstraint {
    /// Category bounding the stage, if any
    pub category: Option<BudgetCategory>,

    /// Share of the budget the stage may spend (the whole budget when uncategorized)
    pub limit: f64,

    /// Total trip budget
    pub total: f64,

    /// Per-unit price ceiling requested by the user (nightly rate, fare)
    pub price_ceiling: Option<f64>,
}

impl BudgetConstraint {
    /// Constraint for a stage derived from an allocation
    pub fn for_stage(stage: StageName, allocation: &BudgetAllocation) -> Self {
        let category = BudgetCategory::for_stage(stage);
        let limit = category.map(|c| allocation.amount(c)).unwrap_or(allocation.total);
        Self {
            category,
            limit,
            total: allocation.total,
            price_ceiling: None,
        }
    }

    /// Builder method to set a price ceiling
    pub fn with_price_ceiling(mut self, ceiling: Option<f64>) -> Self {
        self.price_ceiling = ceiling;
        self
    }
}
