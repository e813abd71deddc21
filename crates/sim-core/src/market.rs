use crate::{MarketConditionId, SegmentId, SimulationId};
use chrono::{DateTime, Utc};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Macro-economic indicators. Rates are fractions (0.021 = 2.1%).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EconomicIndicators {
    pub gdp_growth: f64,
    pub inflation_rate: f64,
    pub interest_rate: f64,
    pub unemployment_rate: f64,
    /// Index, 100 is neutral.
    pub consumer_confidence: f64,
    /// Index in [0, 100], 50 is neutral.
    pub business_sentiment: f64,
}

/// How buyers in one segment weigh product attributes, each in [0, 1].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConsumerPreferences {
    pub price_sensitivity: f64,
    pub quality_sensitivity: f64,
    pub brand_loyalty: f64,
    pub innovation_preference: f64,
    pub sustainability_preference: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImpactArea {
    ProductDevelopment,
    CustomerExperience,
    Operations,
    Marketing,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TechnologyTrend {
    pub name: String,
    pub impact_area: ImpactArea,
    pub impact_strength: f64,
    pub adoption_rate: f64,
}

/// Economic and market snapshot for one period of one simulation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MarketCondition {
    pub id: MarketConditionId,
    pub simulation_id: SimulationId,
    pub period: u32,
    /// Currency value of all sales the market absorbs in the period.
    pub total_market_size: Decimal,
    /// Share of the market per segment; sums to 1.
    pub segment_distribution: BTreeMap<SegmentId, f64>,
    pub economic_indicators: EconomicIndicators,
    pub consumer_preferences: BTreeMap<SegmentId, ConsumerPreferences>,
    pub technology_trends: Vec<TechnologyTrend>,
    /// In [0, 1].
    pub sustainability_importance: f64,
    pub created_at: DateTime<Utc>,
}

impl MarketCondition {
    /// Currency value of one segment; zero for unknown segments.
    pub fn segment_value(&self, segment: &SegmentId) -> Decimal {
        let share = self
            .segment_distribution
            .get(segment)
            .copied()
            .and_then(Decimal::from_f64)
            .unwrap_or(Decimal::ZERO);
        self.total_market_size * share
    }

    /// Combined pull of the trends in one area: sum of strength x adoption.
    pub fn trend_boost(&self, area: ImpactArea) -> f64 {
        self.technology_trends
            .iter()
            .filter(|t| t.impact_area == area)
            .map(|t| t.impact_strength * t.adoption_rate)
            .sum()
    }

    pub fn preferences(&self, segment: &SegmentId) -> Option<&ConsumerPreferences> {
        self.consumer_preferences.get(segment)
    }
}
