//! Decisions taken by companies and what each period produced.

use crate::{CompanyId, DecisionId, EventId, ProductId, ProductProfile, SegmentId, SimulationId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Specification of a product a company wants to develop.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub category: SegmentId,
    pub quality_rating: f64,
    pub innovation_rating: f64,
    pub sustainability_rating: f64,
    pub production_cost: Decimal,
    pub selling_price: Decimal,
    pub production_capacity: u64,
    pub development_cost: Decimal,
    #[serde(default)]
    pub marketing_budget: Decimal,
    /// Periods until launch; zero means the product is sold right away.
    pub development_periods: u32,
    #[serde(default)]
    pub profile: ProductProfile,
}

/// What a company chose to do in a period.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionKind {
    SetPrice {
        product_id: ProductId,
        price: Decimal,
    },
    /// Standing production order, kept until changed.
    SetProduction {
        product_id: ProductId,
        units: u64,
    },
    SetMarketingBudget {
        product_id: ProductId,
        budget: Decimal,
    },
    /// Paid up front; capacity arrives after `implementation_periods`.
    ExpandCapacity {
        product_id: ProductId,
        units: u64,
        implementation_periods: u32,
    },
    InvestInQuality {
        product_id: ProductId,
        amount: Decimal,
    },
    LaunchProduct(NewProduct),
    DiscontinueProduct {
        product_id: ProductId,
    },
    SetTrainingBudget {
        amount: Decimal,
    },
}

impl DecisionKind {
    /// Product the decision targets, if any.
    pub fn product_id(&self) -> Option<&ProductId> {
        match self {
            DecisionKind::SetPrice { product_id, .. }
            | DecisionKind::SetProduction { product_id, .. }
            | DecisionKind::SetMarketingBudget { product_id, .. }
            | DecisionKind::ExpandCapacity { product_id, .. }
            | DecisionKind::InvestInQuality { product_id, .. }
            | DecisionKind::DiscontinueProduct { product_id } => Some(product_id),
            DecisionKind::LaunchProduct(_) | DecisionKind::SetTrainingBudget { .. } => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DecisionKind::SetPrice { .. } => "set_price",
            DecisionKind::SetProduction { .. } => "set_production",
            DecisionKind::SetMarketingBudget { .. } => "set_marketing_budget",
            DecisionKind::ExpandCapacity { .. } => "expand_capacity",
            DecisionKind::InvestInQuality { .. } => "invest_in_quality",
            DecisionKind::LaunchProduct(_) => "launch_product",
            DecisionKind::DiscontinueProduct { .. } => "discontinue_product",
            DecisionKind::SetTrainingBudget { .. } => "set_training_budget",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub id: DecisionId,
    pub company_id: CompanyId,
    /// Period the decision applies to.
    pub period: u32,
    pub kind: DecisionKind,
    pub submitted_at: DateTime<Utc>,
}

/// Capacity being built; added to the product once `ready_period` starts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CapacityProject {
    pub product_id: ProductId,
    pub units: u64,
    pub ready_period: u32,
    pub investment: Decimal,
}

/// Company-level outcome of one period.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PerformanceResult {
    pub company_id: CompanyId,
    pub period: u32,
    pub revenue: Decimal,
    pub cost_of_goods_sold: Decimal,
    pub operating_expenses: Decimal,
    pub profit: Decimal,
    pub cash_balance: Decimal,
    pub total_assets: Decimal,
    pub total_liabilities: Decimal,
    pub units_sold: u64,
    /// Units sold over units demanded across all segments.
    pub market_share: f64,
    pub brand_value: f64,
    pub score: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockStatus {
    InStock,
    LowStock,
    OutOfStock,
}

impl StockStatus {
    /// Low stock means under a tenth of one period's capacity.
    pub fn classify(inventory: u64, capacity: u64) -> Self {
        if inventory == 0 {
            StockStatus::OutOfStock
        } else if inventory.saturating_mul(10) < capacity {
            StockStatus::LowStock
        } else {
            StockStatus::InStock
        }
    }
}

/// Product-level outcome of one period.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProductPerformance {
    pub product_id: ProductId,
    pub company_id: CompanyId,
    pub period: u32,
    pub units_produced: u64,
    pub units_demanded: u64,
    pub units_sold: u64,
    pub lost_sales: u64,
    pub revenue: Decimal,
    /// Production spend plus marketing.
    pub cost: Decimal,
    pub profit: Decimal,
    /// Units sold over segment demand.
    pub market_share: f64,
    pub ending_inventory: u64,
    pub stock_status: StockStatus,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendImpact {
    Opportunity,
    Threat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    SupplyChainDisruption,
    DemandBoom,
    EconomicDownturn,
    SustainabilityShift,
    RegulatoryChange,
    TechnologyBreakthrough,
}

impl EventKind {
    pub const ALL: [EventKind; 6] = [
        EventKind::SupplyChainDisruption,
        EventKind::DemandBoom,
        EventKind::EconomicDownturn,
        EventKind::SustainabilityShift,
        EventKind::RegulatoryChange,
        EventKind::TechnologyBreakthrough,
    ];

    pub fn impact(self) -> TrendImpact {
        match self {
            EventKind::SupplyChainDisruption
            | EventKind::EconomicDownturn
            | EventKind::RegulatoryChange => TrendImpact::Threat,
            EventKind::DemandBoom
            | EventKind::SustainabilityShift
            | EventKind::TechnologyBreakthrough => TrendImpact::Opportunity,
        }
    }

    /// Periods the event stays in effect.
    pub fn duration(self) -> u32 {
        match self {
            EventKind::SupplyChainDisruption => 3,
            EventKind::DemandBoom => 2,
            EventKind::EconomicDownturn => 4,
            EventKind::SustainabilityShift => 6,
            EventKind::RegulatoryChange => 6,
            EventKind::TechnologyBreakthrough => 1,
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            EventKind::SupplyChainDisruption => {
                "Global supply chain problems raise production costs."
            }
            EventKind::DemandBoom => "A surge in consumer spending enlarges the market.",
            EventKind::EconomicDownturn => "The economy cools and consumer confidence drops.",
            EventKind::SustainabilityShift => {
                "Consumers increasingly value sustainable products and practices."
            }
            EventKind::RegulatoryChange => {
                "New product safety and environmental rules raise costs outside the premium segment."
            }
            EventKind::TechnologyBreakthrough => {
                "A new technology raises the value buyers put on innovation."
            }
        }
    }
}

/// A market event rolled at the end of `period`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub simulation_id: SimulationId,
    pub period: u32,
    pub kind: EventKind,
    pub description: String,
    /// Strength of the effect, a fraction.
    pub magnitude: f64,
    pub duration: u32,
    pub impact: TrendImpact,
}

impl Event {
    /// Effects run from the period after the roll for `duration` periods.
    pub fn is_active_in(&self, period: u32) -> bool {
        period > self.period && period <= self.period.saturating_add(self.duration)
    }

    /// True in the first period the event is in effect.
    pub fn starts_in(&self, period: u32) -> bool {
        period == self.period.saturating_add(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stock_status_thresholds() {
        assert_eq!(StockStatus::classify(0, 1000), StockStatus::OutOfStock);
        assert_eq!(StockStatus::classify(99, 1000), StockStatus::LowStock);
        assert_eq!(StockStatus::classify(100, 1000), StockStatus::InStock);
    }

    #[test]
    fn event_window_follows_roll() {
        let ev = Event {
            id: EventId::new("event_2_1"),
            simulation_id: SimulationId::new("sim"),
            period: 2,
            kind: EventKind::SupplyChainDisruption,
            description: String::new(),
            magnitude: 0.1,
            duration: 3,
            impact: TrendImpact::Threat,
        };
        assert!(!ev.is_active_in(2));
        assert!(ev.starts_in(3));
        assert!(ev.is_active_in(3) && ev.is_active_in(5));
        assert!(!ev.is_active_in(6));
    }

    #[test]
    fn decision_kind_json_shape() {
        let kind = DecisionKind::SetPrice {
            product_id: ProductId::new("product_demo_1"),
            price: Decimal::new(280, 0),
        };
        let s = serde_json::to_string(&kind).unwrap();
        assert!(s.starts_with("{\"set_price\""));
        let back: DecisionKind = serde_json::from_str(&s).unwrap();
        assert_eq!(back, kind);
        assert_eq!(back.label(), "set_price");
    }
}
