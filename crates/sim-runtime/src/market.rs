//! Market drift between periods and random market events.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use sim_core::{
    Event, EventId, EventKind, ImpactArea, MarketCondition, MarketConditionId, SegmentId,
    SimulationId, SimulationState, TechnologyTrend, PREMIUM,
};
use sim_econ::with_noise;

const EVENT_STREAM: u64 = 0xE7E7;
const MARKET_STREAM: u64 = 0x3A12;

/// Per-period generator; independent of how many draws earlier periods made.
fn period_rng(seed: u64, period: u32, stream: u64) -> ChaCha8Rng {
    let mix = (u64::from(period) + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    ChaCha8Rng::seed_from_u64(seed ^ mix ^ stream)
}

/// "sim_demo" + 3 -> "market_demo_3".
pub fn market_condition_id(simulation: &SimulationId, period: u32) -> MarketConditionId {
    let stem = simulation
        .as_str()
        .strip_prefix("sim_")
        .unwrap_or(simulation.as_str());
    MarketConditionId::new(format!("market_{stem}_{period}"))
}

/// Roll the event, if any, that fires at the end of `period`.
pub fn roll_event(state: &SimulationState, period: u32) -> Option<Event> {
    let mut rng = period_rng(state.config.rng_seed, period, EVENT_STREAM);
    if !rng.gen_bool(state.config.events_frequency.clamp(0.0, 1.0)) {
        return None;
    }
    let kind = EventKind::ALL[rng.gen_range(0..EventKind::ALL.len())];
    let magnitude = (rng.gen_range(0.05..0.2f64) * 1000.0).round() / 1000.0;
    Some(Event {
        id: EventId::new(format!("event_{}_{}", period, state.events.len() + 1)),
        simulation_id: state.id.clone(),
        period,
        kind,
        description: kind.describe().to_string(),
        magnitude,
        duration: kind.duration(),
        impact: kind.impact(),
    })
}

/// Production cost multiplier for one segment in one period.
pub fn cost_multiplier(state: &SimulationState, period: u32, segment: &SegmentId) -> Decimal {
    let mut m = 1.0;
    for ev in state.active_events(period) {
        match ev.kind {
            EventKind::SupplyChainDisruption => m *= 1.0 + ev.magnitude,
            EventKind::RegulatoryChange if segment.as_str() != PREMIUM => {
                m *= 1.0 + ev.magnitude / 2.0
            }
            _ => {}
        }
    }
    Decimal::from_f64(m).unwrap_or(Decimal::ONE).round_dp(4)
}

fn scale(value: Decimal, factor: f64) -> Decimal {
    value * Decimal::from_f64(factor).unwrap_or(Decimal::ONE)
}

/// Market condition for `period`, derived from the one before it.
///
/// The economy drifts, the market grows with GDP, technology adoption
/// rises, and events starting in `period` apply their one-off effects.
pub fn next_market_condition(
    state: &SimulationState,
    prev: &MarketCondition,
    period: u32,
) -> MarketCondition {
    let mut rng = period_rng(state.config.rng_seed, period, MARKET_STREAM);

    let mut econ = prev.economic_indicators.clone();
    econ.gdp_growth = (econ.gdp_growth + rng.gen_range(-0.002..=0.002f64)).clamp(-0.05, 0.08);
    econ.inflation_rate = (econ.inflation_rate + rng.gen_range(-0.001..=0.001f64)).clamp(0.0, 0.15);
    econ.interest_rate = (econ.interest_rate
        + (econ.inflation_rate + 0.015 - econ.interest_rate) * 0.1)
        .clamp(0.0, 0.2);
    let momentum = econ.gdp_growth - 0.02;
    econ.unemployment_rate = (econ.unemployment_rate - momentum * 0.1
        + rng.gen_range(-0.001..=0.001f64))
    .clamp(0.02, 0.25);
    econ.consumer_confidence = (econ.consumer_confidence
        + momentum * 100.0
        + rng.gen_range(-0.5..=0.5f64))
    .clamp(50.0, 150.0);
    econ.business_sentiment = (econ.business_sentiment
        + momentum * 50.0
        + rng.gen_range(-0.5..=0.5f64))
    .clamp(0.0, 100.0);

    let mut size = scale(prev.total_market_size, 1.0 + econ.gdp_growth / 12.0);
    let mut importance = prev.sustainability_importance;
    let mut preferences = prev.consumer_preferences.clone();
    let mut trends: Vec<TechnologyTrend> = prev
        .technology_trends
        .iter()
        .map(|t| TechnologyTrend {
            adoption_rate: (t.adoption_rate + (1.0 - t.adoption_rate) * 0.05).min(1.0),
            ..t.clone()
        })
        .collect();

    for ev in state.events.iter().filter(|e| e.starts_in(period)) {
        match ev.kind {
            EventKind::DemandBoom => size = scale(size, 1.0 + ev.magnitude),
            EventKind::EconomicDownturn => {
                econ.gdp_growth = (econ.gdp_growth - ev.magnitude * 0.1).max(-0.05);
                econ.consumer_confidence = (econ.consumer_confidence - ev.magnitude * 50.0).max(50.0);
                size = scale(size, 1.0 - ev.magnitude / 2.0);
            }
            EventKind::SustainabilityShift => {
                importance = (importance + ev.magnitude).min(1.0);
                for p in preferences.values_mut() {
                    p.sustainability_preference =
                        (p.sustainability_preference + ev.magnitude / 2.0).min(1.0);
                }
            }
            EventKind::TechnologyBreakthrough => trends.push(TechnologyTrend {
                name: format!("Breakthrough of period {}", ev.period),
                impact_area: ImpactArea::ProductDevelopment,
                impact_strength: ev.magnitude.min(1.0),
                adoption_rate: 0.1,
            }),
            EventKind::SupplyChainDisruption | EventKind::RegulatoryChange => {}
        }
    }

    let whole = size.floor().to_u64().unwrap_or(0);
    let noisy = with_noise(whole, 0.02, rng.gen()).unwrap_or(whole);

    MarketCondition {
        id: market_condition_id(&state.id, period),
        simulation_id: state.id.clone(),
        period,
        total_market_size: Decimal::from(noisy),
        segment_distribution: prev.segment_distribution.clone(),
        economic_indicators: econ,
        consumer_preferences: preferences,
        technology_trends: trends,
        sustainability_importance: importance,
        created_at: chrono::Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SimulationFactory;
    use sim_core::BUDGET;

    fn event(state: &SimulationState, period: u32, kind: EventKind, magnitude: f64) -> Event {
        Event {
            id: EventId::new(format!("event_{period}_{}", state.events.len() + 1)),
            simulation_id: state.id.clone(),
            period,
            kind,
            description: kind.describe().to_string(),
            magnitude,
            duration: kind.duration(),
            impact: kind.impact(),
        }
    }

    fn next_size(state: &SimulationState, period: u32) -> Decimal {
        let prev = state.market_conditions[0].clone();
        next_market_condition(state, &prev, period).total_market_size
    }

    #[test]
    fn supply_disruption_raises_costs_while_active() {
        let mut state = SimulationFactory::demo_state();
        let ev = event(&state, 2, EventKind::SupplyChainDisruption, 0.1);
        state.events.push(ev);
        let budget = SegmentId::new(BUDGET);

        assert_eq!(cost_multiplier(&state, 2, &budget), Decimal::ONE);
        assert_eq!(cost_multiplier(&state, 3, &budget), Decimal::new(11, 1));
        assert_eq!(cost_multiplier(&state, 5, &budget), Decimal::new(11, 1));
        assert_eq!(cost_multiplier(&state, 6, &budget), Decimal::ONE);
    }

    #[test]
    fn regulation_spares_premium() {
        let mut state = SimulationFactory::demo_state();
        let ev = event(&state, 0, EventKind::RegulatoryChange, 0.1);
        state.events.push(ev);

        assert_eq!(
            cost_multiplier(&state, 1, &SegmentId::new(BUDGET)),
            Decimal::new(105, 2)
        );
        assert_eq!(cost_multiplier(&state, 1, &SegmentId::new(PREMIUM)), Decimal::ONE);
    }

    #[test]
    fn demand_events_reshape_the_next_market() {
        let base = SimulationFactory::demo_state();
        let baseline = next_size(&base, 1);

        let mut boom = base.clone();
        let ev = event(&boom, 0, EventKind::DemandBoom, 0.15);
        boom.events.push(ev);
        assert!(next_size(&boom, 1) > baseline);

        let mut downturn = base.clone();
        let ev = event(&downturn, 0, EventKind::EconomicDownturn, 0.15);
        downturn.events.push(ev);
        assert!(next_size(&downturn, 1) < baseline);
        let prev = base.market_conditions[0].clone();
        let calm = next_market_condition(&base, &prev, 1);
        let hit = next_market_condition(&downturn, &prev, 1);
        assert!(
            hit.economic_indicators.consumer_confidence
                < calm.economic_indicators.consumer_confidence
        );
    }

    #[test]
    fn onset_effects_apply_once() {
        let mut state = SimulationFactory::demo_state();
        let ev = event(&state, 0, EventKind::DemandBoom, 0.2);
        state.events.push(ev);
        let calm = SimulationFactory::demo_state();
        assert_eq!(next_size(&state, 2), next_size(&calm, 2));
    }

    #[test]
    fn sustainability_shift_raises_importance() {
        let mut state = SimulationFactory::demo_state();
        let ev = event(&state, 0, EventKind::SustainabilityShift, 0.1);
        state.events.push(ev);
        let prev = state.market_conditions[0].clone();
        let next = next_market_condition(&state, &prev, 1);
        assert!((next.sustainability_importance - 0.77).abs() < 1e-9);
        let budget = SegmentId::new(BUDGET);
        assert!(
            next.consumer_preferences[&budget].sustainability_preference
                > prev.consumer_preferences[&budget].sustainability_preference
        );

        let calm = SimulationFactory::demo_state();
        let unchanged = next_market_condition(&calm, &prev, 1);
        assert_eq!(unchanged.sustainability_importance, prev.sustainability_importance);
    }

    #[test]
    fn event_rolls_follow_frequency_and_seed() {
        let mut state = SimulationFactory::demo_state();
        state.config.events_frequency = 0.0;
        assert!(roll_event(&state, 3).is_none());

        state.config.events_frequency = 1.0;
        let ev = roll_event(&state, 3).unwrap();
        assert_eq!(ev.period, 3);
        assert!((0.05..=0.2).contains(&ev.magnitude));
        assert_eq!(ev.duration, ev.kind.duration());
        assert_eq!(roll_event(&state, 3), Some(ev));
    }
}
