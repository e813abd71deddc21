//! Simulation configuration.

use crate::SegmentId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Segment identifier of the entry-level market.
pub const BUDGET: &str = "budget";
/// Segment identifier of the mainstream market.
pub const MID_RANGE: &str = "mid-range";
/// Segment identifier of the high-end market.
pub const PREMIUM: &str = "premium";

/// How hard the rival firms compete.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    /// Aggregate attractiveness held by non-player firms in every segment.
    pub fn rival_strength(self) -> f64 {
        match self {
            Difficulty::Easy => 1.5,
            Difficulty::Medium => 2.5,
            Difficulty::Hard => 4.0,
        }
    }
}

/// Parameters fixed at simulation creation. Missing keys take the
/// values of [`SimulationConfig::default`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Starting cash of every company.
    pub initial_cash: Decimal,
    /// Number of periods before the simulation completes.
    pub periods: u32,
    /// Segments products may be sold in.
    pub market_segments: Vec<SegmentId>,
    /// Rival strength selector.
    pub difficulty: Difficulty,
    /// Probability in [0,1] that a market event fires in a period.
    pub events_frequency: f64,
    /// Seed for deterministic event and market drift rolls.
    pub rng_seed: u64,
    /// Price anchor of each segment; demand is measured against it.
    pub reference_prices: BTreeMap<SegmentId, Decimal>,
}

fn default_rng_seed() -> u64 {
    42
}

/// Midpoints of the price bands of the three standard segments.
pub fn default_reference_prices() -> BTreeMap<SegmentId, Decimal> {
    BTreeMap::from([
        (SegmentId::new(BUDGET), Decimal::new(75, 0)),
        (SegmentId::new(MID_RANGE), Decimal::new(175, 0)),
        (SegmentId::new(PREMIUM), Decimal::new(375, 0)),
    ])
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            initial_cash: Decimal::new(1_000_000, 0),
            periods: 12,
            market_segments: vec![
                SegmentId::new(BUDGET),
                SegmentId::new(MID_RANGE),
                SegmentId::new(PREMIUM),
            ],
            difficulty: Difficulty::Medium,
            events_frequency: 0.3,
            rng_seed: default_rng_seed(),
            reference_prices: default_reference_prices(),
        }
    }
}

impl SimulationConfig {
    pub fn has_segment(&self, segment: &SegmentId) -> bool {
        self.market_segments.contains(segment)
    }

    pub fn reference_price(&self, segment: &SegmentId) -> Option<Decimal> {
        self.reference_prices.get(segment).copied()
    }
}
