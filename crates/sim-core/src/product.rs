use crate::{CompanyId, ProductId, SegmentId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Upper bound of the quality, innovation and sustainability ratings.
pub const MAX_RATING: f64 = 10.0;

/// Highest unit price or unit cost a product may carry.
pub const MAX_UNIT_PRICE: Decimal = Decimal::from_parts(1_000_000, 0, 0, false, 0);

/// Highest per-period capacity of one product, including expansions.
pub const MAX_CAPACITY: u64 = 10_000_000;

/// Highest single budget or development spend.
pub const MAX_BUDGET: Decimal = Decimal::from_parts(1_000_000_000, 0, 0, false, 0);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductStatus {
    Development,
    Active,
    Discontinued,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductProfile {
    pub features: Vec<String>,
    pub target_audience: String,
}

/// An item offered by a company in one segment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub company_id: CompanyId,
    pub name: String,
    pub description: String,
    /// Segment the product competes in.
    pub category: SegmentId,
    pub quality_rating: f64,
    pub innovation_rating: f64,
    pub sustainability_rating: f64,
    /// Standard cost of one unit.
    pub production_cost: Decimal,
    pub selling_price: Decimal,
    pub inventory_level: u64,
    /// Units per period.
    pub production_capacity: u64,
    pub development_cost: Decimal,
    /// Spent every period while active.
    pub marketing_budget: Decimal,
    pub status: ProductStatus,
    pub launch_period: u32,
    pub discontinue_period: Option<u32>,
    pub profile: ProductProfile,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn is_active(&self) -> bool {
        self.status == ProductStatus::Active
    }

    /// Inventory valued at standard cost.
    pub fn inventory_value(&self) -> Decimal {
        Decimal::from(self.inventory_level).saturating_mul(self.production_cost)
    }
}

/// Clamp a rating into `[0, MAX_RATING]`.
pub fn clamp_rating(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, MAX_RATING)
}
