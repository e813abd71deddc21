#![deny(warnings)]

//! Company scoring and a rule-based advisor that proposes decisions.

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sim_core::{CompanyId, DecisionKind, ProductPerformance, SimulationState};
use sim_econ::{capacity_investment, cost_plus, promo_price};
use tracing::debug;

/// Trivial utility: higher is better.
pub fn utility(market_share: f64, margin: f64) -> f64 {
    (market_share * 0.7) + (margin * 0.3)
}

/// Period score in points: utility of market share and profit margin,
/// margin clamped to [-1, 1], times 100.
pub fn company_score(revenue: Decimal, profit: Decimal, market_share: f64) -> f64 {
    let margin = if revenue > Decimal::ZERO {
        (profit / revenue).to_f64().unwrap_or(0.0).clamp(-1.0, 1.0)
    } else if profit < Decimal::ZERO {
        -1.0
    } else {
        0.0
    };
    utility(market_share.clamp(0.0, 1.0), margin) * 100.0
}

/// Decisions proposed for one company and the score they aim for.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Plan {
    pub decisions: Vec<DecisionKind>,
    pub expected_score: f64,
}

/// Tuning of the advisor's rules.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Advisor {
    /// Fractional price move on stockouts or overstock.
    pub price_step: f64,
    /// Production target as a multiple of last period's demand.
    pub production_headroom: f64,
    /// Expand when demand exceeds capacity by this factor.
    pub expansion_trigger: f64,
    /// Keep this multiple of the investment in cash after expanding.
    pub cash_cover: f64,
    /// Never price below cost plus this margin.
    pub min_margin: f64,
}

impl Default for Advisor {
    fn default() -> Self {
        Self {
            price_step: 0.05,
            production_headroom: 1.1,
            expansion_trigger: 1.2,
            cash_cover: 2.0,
            min_margin: 0.1,
        }
    }
}

impl Advisor {
    /// Load advisor tuning from YAML; missing keys keep their defaults.
    pub fn from_yaml_str(text: &str) -> anyhow::Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Propose decisions for the current period from the results of the
    /// previous one. Nothing is proposed before the first period is played.
    pub fn plan(&self, state: &SimulationState, company_id: &CompanyId) -> Plan {
        let Some(company) = state.company(company_id) else {
            return Plan {
                decisions: vec![],
                expected_score: 0.0,
            };
        };
        let Some(last_period) = state.current_period.checked_sub(1) else {
            return Plan {
                decisions: vec![],
                expected_score: 0.0,
            };
        };
        let last: Vec<&ProductPerformance> = state
            .product_results_for(last_period)
            .filter(|r| &r.company_id == company_id)
            .collect();

        let mut decisions = Vec::new();
        let mut committed = Decimal::ZERO;
        for perf in last {
            let Some(product) = state.product(&perf.product_id) else {
                continue;
            };
            if !product.is_active() {
                continue;
            }

            let floor = cost_plus(
                product.production_cost,
                Decimal::from_f64(self.min_margin).unwrap_or(Decimal::ZERO),
            );
            let step = Decimal::from_f64(self.price_step).unwrap_or(Decimal::ZERO);
            if perf.lost_sales > 0 {
                let price = (product.selling_price * (Decimal::ONE + step)).round_dp(2);
                decisions.push(DecisionKind::SetPrice {
                    product_id: product.id.clone(),
                    price,
                });
            } else if perf.ending_inventory > perf.units_demanded.saturating_mul(2) {
                let price = promo_price(product.selling_price, self.price_step)
                    .unwrap_or(product.selling_price)
                    .round_dp(2)
                    .max(floor);
                if price < product.selling_price {
                    decisions.push(DecisionKind::SetPrice {
                        product_id: product.id.clone(),
                        price,
                    });
                }
            }

            let target = ((perf.units_demanded as f64) * self.production_headroom).ceil() as u64;
            let needed = target.saturating_sub(product.inventory_level);
            decisions.push(DecisionKind::SetProduction {
                product_id: product.id.clone(),
                units: needed.min(product.production_capacity),
            });

            let trigger = (product.production_capacity as f64) * self.expansion_trigger;
            let building = state
                .capacity_projects
                .iter()
                .any(|p| p.product_id == product.id);
            if (perf.units_demanded as f64) > trigger && !building {
                let units = perf.units_demanded - product.production_capacity;
                if let Ok(investment) = capacity_investment(product.production_cost, units, 2) {
                    let cover = Decimal::from_f64(self.cash_cover).unwrap_or(Decimal::ONE);
                    if (committed + investment) * cover <= company.cash_balance {
                        committed += investment;
                        decisions.push(DecisionKind::ExpandCapacity {
                            product_id: product.id.clone(),
                            units,
                            implementation_periods: 2,
                        });
                    }
                }
            }
        }

        let expected_score = state
            .results_for(last_period)
            .find(|r| &r.company_id == company_id)
            .map(|r| r.score)
            .unwrap_or(0.0);
        debug!(company = %company_id, n = decisions.len(), "advisor plan");
        Plan {
            decisions,
            expected_score,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn monotonic_increase() {
        assert!(utility(0.2, 0.1) < utility(0.3, 0.1));
        assert!(utility(0.2, 0.1) < utility(0.2, 0.2));
    }

    #[test]
    fn score_without_revenue() {
        assert_eq!(company_score(Decimal::ZERO, Decimal::ZERO, 0.0), 0.0);
        let s = company_score(Decimal::ZERO, Decimal::new(-10, 0), 0.0);
        assert!((s + 30.0).abs() < 1e-9);
    }

    #[test]
    fn advisor_yaml_keeps_defaults() {
        let a = Advisor::from_yaml_str("price_step: 0.1\n").unwrap();
        assert_eq!(a.price_step, 0.1);
        assert_eq!(a.production_headroom, Advisor::default().production_headroom);
    }

    #[test]
    fn plan_follows_last_period() {
        let mut engine = sim_runtime::SimulationFactory::create_demo_simulation();
        let company = CompanyId::new("company_demo");
        let advisor = Advisor::default();
        assert!(advisor.plan(engine.state(), &company).decisions.is_empty());

        engine.advance_period().unwrap();
        let state = engine.state();
        let plan = advisor.plan(state, &company);
        let produced: Vec<&str> = plan
            .decisions
            .iter()
            .filter_map(|d| match d {
                DecisionKind::SetProduction { product_id, units } => {
                    let p = state.product(product_id).unwrap();
                    assert!(*units <= p.production_capacity);
                    Some(product_id.as_str())
                }
                _ => None,
            })
            .collect();
        assert_eq!(produced, vec!["product_demo_1", "product_demo_2"]);
        assert!(plan.expected_score > 0.0);
        assert!(advisor.plan(state, &CompanyId::new("nobody")).decisions.is_empty());
    }

    proptest! {
        #[test]
        fn score_bounded(rev in 1i64..10_000_000, profit in -20_000_000i64..10_000_000, share in 0.0f64..1.0) {
            let s = company_score(Decimal::new(rev, 0), Decimal::new(profit, 0), share);
            prop_assert!((-30.001..=100.001).contains(&s));
        }
    }
}
