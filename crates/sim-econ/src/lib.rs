#![deny(warnings)]

//! Economic models: demand, product appeal and market clearing.
//!
//! This module provides validated utilities for:
//! - Demand under constant elasticity around a segment's reference price
//! - Scoring how attractive a product is to one segment's buyers
//! - Splitting a segment's demand between products and rival firms
//! - Capital cost of capacity expansions and simple pricing helpers

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use sim_core::{ConsumerPreferences, ImpactArea, MarketCondition, MAX_RATING};
use thiserror::Error;

/// Errors produced by economic helpers.
#[derive(Debug, Error, PartialEq)]
pub enum EconError {
    /// Elasticity must be strictly negative.
    #[error("invalid elasticity: {0}")]
    InvalidElasticity(f64),
    /// Monetary values must be non-negative; prices must be > 0.
    #[error("invalid price or cost value")]
    InvalidPrice,
    /// Numeric conversion failed or produced a non-finite value.
    #[error("non-finite numeric conversion")]
    NonFinite,
    /// Capacity projects take one to three periods.
    #[error("implementation time must be 1..=3 periods, got {0}")]
    InvalidImplementationTime(u32),
    /// Result does not fit in a `Decimal`.
    #[error("arithmetic overflow")]
    Overflow,
}

/// Price as cost plus a fractional margin.
///
/// let cost = Decimal::new(4000, 2); // 40.00
/// assert_eq!(cost_plus(cost, Decimal::new(10, 2)), Decimal::new(4400, 2));
pub fn cost_plus(unit_cost: Decimal, margin: Decimal) -> Decimal {
    unit_cost * (Decimal::ONE + margin)
}

/// Demand under constant elasticity with respect to a reference price.
///
/// Q = base * (price / ref_price)^{elasticity}. Requires base >= 0,
/// price > 0, ref_price > 0 and elasticity < 0. The result is floored and
/// saturates at u64::MAX.
pub fn demand(base: u64, price: Decimal, ref_price: Decimal, elasticity: f64) -> Result<u64, EconError> {
    if !elasticity.is_finite() || elasticity >= 0.0 {
        return Err(EconError::InvalidElasticity(elasticity));
    }
    if price <= Decimal::ZERO || ref_price <= Decimal::ZERO {
        return Err(EconError::InvalidPrice);
    }
    let ratio = (price / ref_price).to_f64().ok_or(EconError::NonFinite)?;
    if !(ratio.is_finite() && ratio > 0.0) {
        return Err(EconError::NonFinite);
    }
    let q = (base as f64) * ratio.powf(elasticity);
    if !q.is_finite() || q <= 0.0 {
        return Ok(0);
    }
    if q >= u64::MAX as f64 {
        return Ok(u64::MAX);
    }
    Ok(q.floor() as u64)
}

/// Scale `units` by a seeded uniform factor in [1 - noise_frac, 1 + noise_frac].
///
/// `noise_frac` must be in [0, 1). Same seed, same answer.
pub fn with_noise(units: u64, noise_frac: f64, seed: u64) -> Result<u64, EconError> {
    if !noise_frac.is_finite() || !(0.0..1.0).contains(&noise_frac) {
        return Err(EconError::NonFinite);
    }
    if noise_frac == 0.0 {
        return Ok(units);
    }
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let u: f64 = rng.gen_range(-noise_frac..=noise_frac);
    let noisy = (units as f64) * (1.0 + u);
    Ok(noisy.floor().clamp(0.0, u64::MAX as f64) as u64)
}

/// Average selling price: sum(p_i * q_i) / sum(q_i).
/// Returns None when the slices differ in length or nothing was sold.
pub fn asp(prices: &[Decimal], quantities: &[u64]) -> Option<Decimal> {
    if prices.len() != quantities.len() || prices.is_empty() {
        return None;
    }
    let mut num = Decimal::ZERO;
    let mut den: u128 = 0;
    for (p, &q) in prices.iter().zip(quantities) {
        if *p < Decimal::ZERO {
            return None;
        }
        num += *p * Decimal::from(q);
        den = den.saturating_add(q as u128);
    }
    if den == 0 {
        return None;
    }
    Some(num / Decimal::from(den))
}

/// Apply a promotional discount to price. `discount_frac` in [0, 1).
///
/// let p = promo_price(Decimal::new(1000, 2), 0.1).unwrap();
/// assert_eq!(p, Decimal::new(900, 2));
pub fn promo_price(price: Decimal, discount_frac: f64) -> Result<Decimal, EconError> {
    if price < Decimal::ZERO {
        return Err(EconError::InvalidPrice);
    }
    if !discount_frac.is_finite() || !(0.0..1.0).contains(&discount_frac) {
        return Err(EconError::NonFinite);
    }
    let f = Decimal::from_f64(1.0 - discount_frac).ok_or(EconError::NonFinite)?;
    Ok(price * f)
}

/// Cost multiplier of a capacity project by implementation time:
/// rush (1 period) 1.25, standard (2) 1.0, extended (3) 0.9.
pub fn implementation_multiplier(periods: u32) -> Result<Decimal, EconError> {
    match periods {
        1 => Ok(Decimal::new(125, 2)),
        2 => Ok(Decimal::ONE),
        3 => Ok(Decimal::new(90, 2)),
        other => Err(EconError::InvalidImplementationTime(other)),
    }
}

/// Up-front investment for `units` of extra capacity: each unit of
/// capacity costs twice the product's unit production cost.
pub fn capacity_investment(
    production_cost: Decimal,
    units: u64,
    implementation_periods: u32,
) -> Result<Decimal, EconError> {
    if production_cost < Decimal::ZERO {
        return Err(EconError::InvalidPrice);
    }
    let mul = implementation_multiplier(implementation_periods)?;
    Decimal::from(units)
        .checked_mul(production_cost)
        .and_then(|v| v.checked_mul(Decimal::from(2)))
        .and_then(|v| v.checked_mul(mul))
        .ok_or(EconError::Overflow)
}

/// Units a segment absorbs in a period: currency value over the reference
/// price, scaled by consumer confidence (100 is neutral).
pub fn segment_units(
    segment_value: Decimal,
    reference_price: Decimal,
    consumer_confidence: f64,
) -> Result<u64, EconError> {
    if reference_price <= Decimal::ZERO || segment_value < Decimal::ZERO {
        return Err(EconError::InvalidPrice);
    }
    if !consumer_confidence.is_finite() || consumer_confidence < 0.0 {
        return Err(EconError::NonFinite);
    }
    let factor = Decimal::from_f64(consumer_confidence / 100.0).ok_or(EconError::NonFinite)?;
    Ok((segment_value / reference_price * factor)
        .floor()
        .to_u64()
        .unwrap_or(0))
}

/// Buyer tastes of one segment in one period.
#[derive(Clone, Debug, PartialEq)]
pub struct SegmentTaste {
    pub price_sensitivity: f64,
    pub quality_sensitivity: f64,
    pub brand_loyalty: f64,
    pub innovation_preference: f64,
    pub sustainability_preference: f64,
    /// Market-wide weight of sustainability, [0, 1].
    pub sustainability_importance: f64,
    /// Pull of product-development technology trends.
    pub innovation_boost: f64,
}

impl SegmentTaste {
    pub fn from_market(prefs: &ConsumerPreferences, market: &MarketCondition) -> Self {
        Self {
            price_sensitivity: prefs.price_sensitivity,
            quality_sensitivity: prefs.quality_sensitivity,
            brand_loyalty: prefs.brand_loyalty,
            innovation_preference: prefs.innovation_preference,
            sustainability_preference: prefs.sustainability_preference,
            sustainability_importance: market.sustainability_importance,
            innovation_boost: market.trend_boost(ImpactArea::ProductDevelopment),
        }
    }

    /// Price elasticity implied by price sensitivity: -(1 + 2s).
    pub fn elasticity(&self) -> f64 {
        -(1.0 + 2.0 * self.price_sensitivity)
    }
}

/// What a buyer sees of a product.
#[derive(Clone, Debug, PartialEq)]
pub struct Offer {
    pub price: Decimal,
    pub reference_price: Decimal,
    pub quality: f64,
    pub innovation: f64,
    pub sustainability: f64,
    /// Company brand value, [0, 100].
    pub brand_value: f64,
    pub marketing_spend: Decimal,
}

const PRICE_SCALE: u64 = 1_000_000;

/// Attractiveness of an offer to a segment. A mid-rated product at the
/// reference price with no brand and no marketing scores about 1.0.
///
/// The score multiplies a price term (constant elasticity), and one term
/// each for quality, innovation, sustainability, brand and marketing.
/// Never negative.
pub fn attractiveness(offer: &Offer, taste: &SegmentTaste) -> Result<f64, EconError> {
    let price_term = demand(PRICE_SCALE, offer.price, offer.reference_price, taste.elasticity())? as f64
        / PRICE_SCALE as f64;
    let centered = |rating: f64| rating.clamp(0.0, MAX_RATING) / MAX_RATING - 0.5;

    let quality = 1.0 + 2.0 * taste.quality_sensitivity * centered(offer.quality);
    let innovation =
        1.0 + taste.innovation_preference * (1.0 + taste.innovation_boost) * centered(offer.innovation);
    let sustainability = 1.0
        + 2.0
            * taste.sustainability_preference
            * taste.sustainability_importance
            * centered(offer.sustainability);
    let brand = 1.0 + taste.brand_loyalty * (offer.brand_value.clamp(0.0, 100.0) / 100.0 - 0.5);
    let spend = offer.marketing_spend.max(Decimal::ZERO).to_f64().ok_or(EconError::NonFinite)?;
    let marketing = 1.0 + 0.1 * (1.0 + spend / 10_000.0).ln();

    let score = price_term * quality * innovation * sustainability * brand * marketing;
    if !score.is_finite() {
        return Err(EconError::NonFinite);
    }
    Ok(score.max(0.0))
}

/// One product competing for a segment.
#[derive(Clone, Debug, PartialEq)]
pub struct Contender {
    pub score: f64,
    /// Units on hand to sell.
    pub available: u64,
}

/// How one contender fared in a segment. `sold + lost == demanded`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Allocation {
    pub demanded: u64,
    pub sold: u64,
    pub lost: u64,
}

/// Split `segment_units` between contenders and the rival firms in
/// proportion to attractiveness. Sales are capped by availability; units
/// a contender cannot serve are lost, not passed on.
pub fn clear_segment(
    segment_units: u64,
    rival_strength: f64,
    contenders: &[Contender],
) -> Result<Vec<Allocation>, EconError> {
    if !rival_strength.is_finite() || rival_strength < 0.0 {
        return Err(EconError::NonFinite);
    }
    let mut total = rival_strength;
    for c in contenders {
        if !c.score.is_finite() || c.score < 0.0 {
            return Err(EconError::NonFinite);
        }
        total += c.score;
    }
    if total <= 0.0 {
        return Ok(vec![Allocation::default(); contenders.len()]);
    }
    Ok(contenders
        .iter()
        .map(|c| {
            let demanded = ((segment_units as f64) * c.score / total).floor() as u64;
            let sold = demanded.min(c.available);
            Allocation {
                demanded,
                sold,
                lost: demanded - sold,
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn taste() -> SegmentTaste {
        SegmentTaste {
            price_sensitivity: 0.5,
            quality_sensitivity: 0.5,
            brand_loyalty: 0.4,
            innovation_preference: 0.4,
            sustainability_preference: 0.4,
            sustainability_importance: 0.67,
            innovation_boost: 0.0,
        }
    }

    fn offer(price: i64) -> Offer {
        Offer {
            price: Decimal::new(price, 0),
            reference_price: Decimal::new(175, 0),
            quality: 5.0,
            innovation: 5.0,
            sustainability: 5.0,
            brand_value: 50.0,
            marketing_spend: Decimal::ZERO,
        }
    }

    #[test]
    fn test_cost_plus() {
        assert_eq!(
            cost_plus(Decimal::new(4000, 2), Decimal::new(10, 2)),
            Decimal::new(4400, 2)
        );
    }

    #[test]
    fn demand_identity_at_ref_price() {
        let q = demand(1000, Decimal::new(100, 2), Decimal::new(100, 2), -2.0).unwrap();
        assert_eq!(q, 1000);
    }

    #[test]
    fn demand_rejects_bad_inputs() {
        let p = Decimal::ONE;
        assert!(demand(1000, p, p, 0.5).is_err());
        assert!(demand(1000, Decimal::ZERO, p, -1.0).is_err());
        assert!(demand(1000, p, p, f64::NAN).is_err());
    }

    #[test]
    fn noise_is_seeded_and_bounded() {
        let a = with_noise(1000, 0.1, 7).unwrap();
        assert_eq!(a, with_noise(1000, 0.1, 7).unwrap());
        assert!((900..=1100).contains(&a));
        assert_eq!(with_noise(1000, 0.0, 1).unwrap(), 1000);
        assert!(with_noise(1000, 1.0, 1).is_err());
    }

    #[test]
    fn asp_weights_by_quantity() {
        let prices = [Decimal::new(300, 0), Decimal::new(150, 0)];
        assert_eq!(asp(&prices, &[1, 2]).unwrap(), Decimal::new(200, 0));
        assert_eq!(asp(&prices, &[0, 0]), None);
        assert_eq!(
            promo_price(Decimal::new(1000, 2), 0.1).unwrap().round_dp(2),
            Decimal::new(900, 2)
        );
        assert!(promo_price(Decimal::ONE, 1.0).is_err());
    }

    #[test]
    fn rush_projects_cost_more() {
        let c = Decimal::new(100, 0);
        let rush = capacity_investment(c, 10, 1).unwrap();
        let standard = capacity_investment(c, 10, 2).unwrap();
        let extended = capacity_investment(c, 10, 3).unwrap();
        assert_eq!(standard, Decimal::new(2000, 0));
        assert!(rush > standard && standard > extended);
        assert_eq!(
            capacity_investment(c, 10, 4),
            Err(EconError::InvalidImplementationTime(4))
        );
        assert_eq!(
            capacity_investment(Decimal::MAX, u64::MAX, 1),
            Err(EconError::Overflow)
        );
    }

    #[test]
    fn segment_units_scale_with_confidence() {
        let v = Decimal::new(2_000_000, 0);
        let p = Decimal::new(175, 0);
        assert_eq!(segment_units(v, p, 100.0).unwrap(), 11_428);
        assert!(segment_units(v, p, 90.0).unwrap() < 11_428);
    }

    #[test]
    fn neutral_offer_scores_one() {
        let s = attractiveness(&offer(175), &taste()).unwrap();
        assert!((s - 1.0).abs() < 1e-6, "score {s}");
    }

    #[test]
    fn quality_and_marketing_raise_appeal() {
        let base = attractiveness(&offer(175), &taste()).unwrap();
        let mut better = offer(175);
        better.quality = 9.0;
        assert!(attractiveness(&better, &taste()).unwrap() > base);
        let mut marketed = offer(175);
        marketed.marketing_spend = Decimal::new(50_000, 0);
        assert!(attractiveness(&marketed, &taste()).unwrap() > base);
    }

    #[test]
    fn clearing_caps_sales_by_inventory() {
        let out = clear_segment(
            1000,
            1.0,
            &[
                Contender { score: 1.0, available: 100 },
                Contender { score: 2.0, available: 10_000 },
            ],
        )
        .unwrap();
        assert_eq!(out[0], Allocation { demanded: 250, sold: 100, lost: 150 });
        assert_eq!(out[1], Allocation { demanded: 500, sold: 500, lost: 0 });
    }

    #[test]
    fn clearing_with_nobody_is_empty() {
        let out = clear_segment(1000, 0.0, &[Contender { score: 0.0, available: 5 }]).unwrap();
        assert_eq!(out, vec![Allocation::default()]);
    }

    proptest! {
        #[test]
        fn appeal_falls_as_price_rises(p in 20i64..1_000, step in 1i64..200) {
            let low = attractiveness(&offer(p), &taste()).unwrap();
            let high = attractiveness(&offer(p + step), &taste()).unwrap();
            prop_assert!(low >= high);
        }

        #[test]
        fn clearing_conserves_units(units in 0u64..10_000_000,
                                    rival in 0.0f64..5.0,
                                    s1 in 0.0f64..5.0, s2 in 0.0f64..5.0,
                                    a1 in 0u64..100_000, a2 in 0u64..100_000) {
            let out = clear_segment(units, rival, &[
                Contender { score: s1, available: a1 },
                Contender { score: s2, available: a2 },
            ]).unwrap();
            let demanded: u64 = out.iter().map(|a| a.demanded).sum();
            prop_assert!(demanded <= units);
            prop_assert!(out[0].sold <= a1 && out[1].sold <= a2);
            for a in &out {
                prop_assert_eq!(a.sold + a.lost, a.demanded);
            }
        }
    }
}
