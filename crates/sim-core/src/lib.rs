#![deny(warnings)]

//! Core domain models and invariants for the business simulation.
//!
//! This crate defines the serializable simulation state (companies,
//! products, market conditions, decisions, results and events) with
//! validation helpers guaranteeing the basic invariants.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

mod company;
mod config;
mod market;
mod product;
mod records;
mod state;

pub use company::{Company, CompanyProfile, CompetitiveStrategy, CreditRating, HumanResources};
pub use config::{default_reference_prices, Difficulty, SimulationConfig, BUDGET, MID_RANGE, PREMIUM};
pub use market::{ConsumerPreferences, EconomicIndicators, ImpactArea, MarketCondition, TechnologyTrend};
pub use product::{
    clamp_rating, Product, ProductProfile, ProductStatus, MAX_BUDGET, MAX_CAPACITY, MAX_RATING,
    MAX_UNIT_PRICE,
};
pub use records::{
    CapacityProject, Decision, DecisionKind, Event, EventKind, NewProduct, PerformanceResult,
    ProductPerformance, StockStatus, TrendImpact,
};
pub use state::{SimulationState, SimulationStatus};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(
    /// Simulation identifier, e.g. "sim_demo".
    SimulationId
);
string_id!(CompanyId);
string_id!(UserId);
string_id!(ProductId);
string_id!(
    /// Market segment name, e.g. "budget", "mid-range", "premium".
    SegmentId
);
string_id!(MarketConditionId);
string_id!(DecisionId);
string_id!(EventId);

/// Validation errors for domain invariants.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    /// A required text field is blank.
    #[error("{0} must not be empty")]
    Empty(&'static str),
    /// Numeric field must be finite.
    #[error("non-finite numeric value in {0}")]
    NonFinite(&'static str),
    /// Value outside its allowed range.
    #[error("{field} = {value} is outside [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
    /// Price or cost must be non-negative.
    #[error("negative monetary value in {0}")]
    NegativeMoney(&'static str),
    /// Value above the largest one the engine accepts.
    #[error("{field} = {value} exceeds the limit of {limit}")]
    TooLarge {
        field: &'static str,
        value: String,
        limit: String,
    },
    /// Selling price must be strictly positive.
    #[error("price of {0} must be > 0")]
    NonPositivePrice(String),
    /// Segment not listed in the configuration.
    #[error("unknown segment: {0}")]
    UnknownSegment(String),
    /// Segment listed without a reference price.
    #[error("segment {0} has no reference price")]
    MissingReferencePrice(String),
    /// Identifier used twice.
    #[error("duplicate id: {0}")]
    DuplicateId(String),
    /// Reference to a parent that does not exist.
    #[error("{child} refers to missing {parent}")]
    DanglingReference { child: String, parent: String },
    /// More or less than one market condition for a period.
    #[error("period {period} has {count} market conditions, expected 1")]
    MarketConditionCount { period: u32, count: usize },
}

fn check_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NonFinite(field));
    }
    if value < min || value > max {
        return Err(ValidationError::OutOfRange {
            field,
            value,
            min,
            max,
        });
    }
    Ok(())
}

fn check_money(field: &'static str, value: Decimal) -> Result<(), ValidationError> {
    if value < Decimal::ZERO {
        return Err(ValidationError::NegativeMoney(field));
    }
    Ok(())
}

fn check_limit<T: PartialOrd + fmt::Display>(
    field: &'static str,
    value: T,
    limit: T,
) -> Result<(), ValidationError> {
    if value > limit {
        return Err(ValidationError::TooLarge {
            field,
            value: value.to_string(),
            limit: limit.to_string(),
        });
    }
    Ok(())
}

/// Validate configuration values.
pub fn validate_config(cfg: &SimulationConfig) -> Result<(), ValidationError> {
    check_money("initial_cash", cfg.initial_cash)?;
    check_range("events_frequency", cfg.events_frequency, 0.0, 1.0)?;
    if cfg.periods == 0 {
        return Err(ValidationError::OutOfRange {
            field: "periods",
            value: 0.0,
            min: 1.0,
            max: f64::from(u32::MAX),
        });
    }
    if cfg.market_segments.is_empty() {
        return Err(ValidationError::Empty("market_segments"));
    }
    let mut seen = BTreeSet::new();
    for seg in &cfg.market_segments {
        if seg.0.trim().is_empty() {
            return Err(ValidationError::Empty("segment name"));
        }
        if !seen.insert(seg) {
            return Err(ValidationError::DuplicateId(seg.0.clone()));
        }
        match cfg.reference_price(seg) {
            Some(p) if p > Decimal::ZERO => {}
            _ => return Err(ValidationError::MissingReferencePrice(seg.0.clone())),
        }
    }
    Ok(())
}

/// Validate a company on its own.
pub fn validate_company(c: &Company) -> Result<(), ValidationError> {
    if c.name.trim().is_empty() {
        return Err(ValidationError::Empty("company name"));
    }
    check_money("cash_balance", c.cash_balance)?;
    check_money("total_assets", c.total_assets)?;
    check_money("total_liabilities", c.total_liabilities)?;
    check_money("fixed_assets", c.fixed_assets)?;
    check_range("brand_value", c.brand_value, 0.0, 100.0)?;
    let hr = &c.profile.human_resources;
    check_money("average_salary", hr.average_salary)?;
    check_money("training_budget", hr.training_budget)?;
    check_range("employee_satisfaction", hr.employee_satisfaction, 0.0, 100.0)?;
    check_range("productivity", hr.productivity, 0.01, 10.0)?;
    check_range("turnover_rate", hr.turnover_rate, 0.0, 1.0)?;
    Ok(())
}

/// Validate a product on its own.
pub fn validate_product(p: &Product) -> Result<(), ValidationError> {
    if p.name.trim().is_empty() {
        return Err(ValidationError::Empty("product name"));
    }
    check_range("quality_rating", p.quality_rating, 0.0, MAX_RATING)?;
    check_range("innovation_rating", p.innovation_rating, 0.0, MAX_RATING)?;
    check_range("sustainability_rating", p.sustainability_rating, 0.0, MAX_RATING)?;
    check_money("production_cost", p.production_cost)?;
    check_money("development_cost", p.development_cost)?;
    check_money("marketing_budget", p.marketing_budget)?;
    if p.selling_price <= Decimal::ZERO {
        return Err(ValidationError::NonPositivePrice(p.id.0.clone()));
    }
    check_product_limits(
        p.production_cost,
        p.selling_price,
        p.production_capacity,
        p.development_cost,
        p.marketing_budget,
    )
}

/// Bounds that keep `capacity * cost` and every period's sums far from
/// the `Decimal` range.
fn check_product_limits(
    production_cost: Decimal,
    selling_price: Decimal,
    production_capacity: u64,
    development_cost: Decimal,
    marketing_budget: Decimal,
) -> Result<(), ValidationError> {
    check_limit("production_cost", production_cost, MAX_UNIT_PRICE)?;
    check_limit("selling_price", selling_price, MAX_UNIT_PRICE)?;
    check_limit("production_capacity", production_capacity, MAX_CAPACITY)?;
    check_limit("development_cost", development_cost, MAX_BUDGET)?;
    check_limit("marketing_budget", marketing_budget, MAX_BUDGET)?;
    Ok(())
}

/// Validate a product specification before it is developed.
pub fn validate_new_product(p: &NewProduct, cfg: &SimulationConfig) -> Result<(), ValidationError> {
    if p.name.trim().is_empty() {
        return Err(ValidationError::Empty("product name"));
    }
    if !cfg.has_segment(&p.category) {
        return Err(ValidationError::UnknownSegment(p.category.0.clone()));
    }
    check_range("quality_rating", p.quality_rating, 0.0, MAX_RATING)?;
    check_range("innovation_rating", p.innovation_rating, 0.0, MAX_RATING)?;
    check_range("sustainability_rating", p.sustainability_rating, 0.0, MAX_RATING)?;
    check_money("production_cost", p.production_cost)?;
    check_money("development_cost", p.development_cost)?;
    check_money("marketing_budget", p.marketing_budget)?;
    if p.selling_price <= Decimal::ZERO {
        return Err(ValidationError::NonPositivePrice(p.name.clone()));
    }
    check_product_limits(
        p.production_cost,
        p.selling_price,
        p.production_capacity,
        p.development_cost,
        p.marketing_budget,
    )
}

/// Validate a market condition's numeric fields.
pub fn validate_market_condition(m: &MarketCondition) -> Result<(), ValidationError> {
    check_money("total_market_size", m.total_market_size)?;
    check_range("sustainability_importance", m.sustainability_importance, 0.0, 1.0)?;
    for share in m.segment_distribution.values() {
        check_range("segment_distribution", *share, 0.0, 1.0)?;
    }
    let total: f64 = m.segment_distribution.values().sum();
    check_range("segment_distribution total", total, 0.999, 1.001)?;
    let e = &m.economic_indicators;
    for (field, v) in [
        ("gdp_growth", e.gdp_growth),
        ("inflation_rate", e.inflation_rate),
        ("interest_rate", e.interest_rate),
        ("unemployment_rate", e.unemployment_rate),
        ("consumer_confidence", e.consumer_confidence),
        ("business_sentiment", e.business_sentiment),
    ] {
        if !v.is_finite() {
            return Err(ValidationError::NonFinite(field));
        }
    }
    for p in m.consumer_preferences.values() {
        check_range("price_sensitivity", p.price_sensitivity, 0.0, 1.0)?;
        check_range("quality_sensitivity", p.quality_sensitivity, 0.0, 1.0)?;
        check_range("brand_loyalty", p.brand_loyalty, 0.0, 1.0)?;
        check_range("innovation_preference", p.innovation_preference, 0.0, 1.0)?;
        check_range("sustainability_preference", p.sustainability_preference, 0.0, 1.0)?;
    }
    for t in &m.technology_trends {
        check_range("impact_strength", t.impact_strength, 0.0, 1.0)?;
        check_range("adoption_rate", t.adoption_rate, 0.0, 1.0)?;
    }
    Ok(())
}

/// Validate the whole simulation, including cross references.
pub fn validate_simulation(sim: &SimulationState) -> Result<(), ValidationError> {
    if sim.name.trim().is_empty() {
        return Err(ValidationError::Empty("simulation name"));
    }
    validate_config(&sim.config)?;

    let mut company_ids = BTreeSet::new();
    for c in &sim.companies {
        validate_company(c)?;
        if c.simulation_id != sim.id {
            return Err(ValidationError::DanglingReference {
                child: c.id.0.clone(),
                parent: c.simulation_id.0.clone(),
            });
        }
        if !company_ids.insert(&c.id) {
            return Err(ValidationError::DuplicateId(c.id.0.clone()));
        }
    }

    let mut product_ids = BTreeSet::new();
    for p in &sim.products {
        validate_product(p)?;
        if !company_ids.contains(&p.company_id) {
            return Err(ValidationError::DanglingReference {
                child: p.id.0.clone(),
                parent: p.company_id.0.clone(),
            });
        }
        if !sim.config.has_segment(&p.category) {
            return Err(ValidationError::UnknownSegment(p.category.0.clone()));
        }
        if !product_ids.insert(&p.id) {
            return Err(ValidationError::DuplicateId(p.id.0.clone()));
        }
    }

    for m in &sim.market_conditions {
        validate_market_condition(m)?;
        if m.simulation_id != sim.id {
            return Err(ValidationError::DanglingReference {
                child: m.id.0.clone(),
                parent: m.simulation_id.0.clone(),
            });
        }
        let count = sim
            .market_conditions
            .iter()
            .filter(|o| o.period == m.period)
            .count();
        if count != 1 {
            return Err(ValidationError::MarketConditionCount {
                period: m.period,
                count,
            });
        }
    }
    for period in 0..=sim.current_period.min(sim.config.periods.saturating_sub(1)) {
        if sim.market_condition(period).is_none() {
            return Err(ValidationError::MarketConditionCount { period, count: 0 });
        }
    }
    Ok(())
}
