#![deny(warnings)]

//! ECS runtime for the simulation.
//!
//! [`SimulationFactory`] builds initial states and [`SimulationEngine`]
//! plays them period by period through a chained Bevy schedule.

mod engine;
mod factory;
pub mod market;
pub mod pipeline;
pub mod systems;

pub use engine::{EngineError, PeriodReport, SimulationEngine, Standing};
pub use factory::{
    baseline_market_condition, CompanySeed, Scenario, SimulationFactory, SimulationParams,
};
pub use systems::init_world;

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal::Decimal;
    use sim_core::{
        validate_simulation, CompanyId, DecisionKind, NewProduct, ProductId, ProductProfile,
        ProductStatus, SegmentId, SimulationStatus, ValidationError, BUDGET, MAX_CAPACITY,
        PREMIUM,
    };
    use std::collections::BTreeMap;

    fn demo_company() -> CompanyId {
        CompanyId::new("company_demo")
    }

    fn widget(n: u32) -> ProductId {
        ProductId::new(format!("product_demo_{n}"))
    }

    fn gadget() -> NewProduct {
        NewProduct {
            name: "Gadget".into(),
            description: String::new(),
            category: SegmentId::new(BUDGET),
            quality_rating: 5.0,
            innovation_rating: 5.0,
            sustainability_rating: 5.0,
            production_cost: Decimal::new(35, 0),
            selling_price: Decimal::new(70, 0),
            production_capacity: 1500,
            development_cost: Decimal::new(40_000, 0),
            marketing_budget: Decimal::ZERO,
            development_periods: 1,
            profile: ProductProfile::default(),
        }
    }

    fn two_companies() -> SimulationEngine {
        let scenario = Scenario {
            name: "Duel".into(),
            description: String::new(),
            config: Default::default(),
            companies: vec![
                CompanySeed {
                    name: "Alpha".into(),
                    description: String::new(),
                    user_id: None,
                    products: vec![NewProduct {
                        development_periods: 0,
                        ..gadget()
                    }],
                },
                CompanySeed {
                    name: "Beta".into(),
                    description: String::new(),
                    user_id: None,
                    products: vec![NewProduct {
                        name: "Beta Gadget".into(),
                        development_periods: 0,
                        ..gadget()
                    }],
                },
            ],
        };
        SimulationFactory::create_simulation(scenario.into_params()).unwrap()
    }

    #[test]
    fn demo_contents() {
        let engine = SimulationFactory::create_demo_simulation();
        let state = engine.state();
        assert_eq!(state.companies.len(), 1);
        assert_eq!(state.products.len(), 3);
        assert_eq!(state.market_conditions.len(), 1);
        assert_eq!(state.market_conditions[0].period, 0);
        assert!(state.decisions.is_empty());
        assert!(state.performance_results.is_empty());
        assert!(state.events.is_empty());
        assert_eq!(engine.status(), SimulationStatus::Active);
        validate_simulation(state).unwrap();

        let company = &state.companies[0];
        assert_eq!(company.name, "TechInnovate Inc.");
        assert_eq!(company.cash_balance, company.total_assets);
        assert_eq!(company.total_liabilities, Decimal::ZERO);
    }

    #[test]
    fn basic_widget_launches_in_period_one() {
        let mut engine = SimulationFactory::create_demo_simulation();
        let first = engine.advance_period().unwrap();
        assert!(first.launched.is_empty());
        assert_eq!(
            engine.state().product(&widget(3)).unwrap().status,
            ProductStatus::Development
        );

        let second = engine.advance_period().unwrap();
        assert_eq!(second.launched, vec![widget(3)]);
        assert!(engine.state().product(&widget(3)).unwrap().is_active());
        assert!(second.products.iter().any(|p| p.product_id == widget(3)));
    }

    #[test]
    fn one_market_condition_per_period() {
        let mut engine = SimulationFactory::create_demo_simulation();
        for played in 1..=12u32 {
            engine.advance_period().unwrap();
            let state = engine.state();
            let expected = played.min(11) + 1;
            assert_eq!(state.market_conditions.len() as u32, expected);
            for period in 0..expected {
                assert_eq!(
                    state
                        .market_conditions
                        .iter()
                        .filter(|m| m.period == period)
                        .count(),
                    1
                );
            }
        }
        assert_eq!(engine.status(), SimulationStatus::Completed);
    }

    #[test]
    fn advancing_past_the_end_fails() {
        let mut engine = SimulationFactory::create_demo_simulation();
        let reports = engine.advance_periods(20).unwrap();
        assert_eq!(reports.len(), 12);
        assert_eq!(
            engine.advance_period().unwrap_err(),
            EngineError::NotActive(SimulationStatus::Completed)
        );
    }

    #[test]
    fn units_are_conserved() {
        let mut engine = SimulationFactory::create_demo_simulation();
        for _ in 0..6 {
            let before: BTreeMap<ProductId, u64> = engine
                .state()
                .products
                .iter()
                .map(|p| (p.id.clone(), p.inventory_level))
                .collect();
            let report = engine.advance_period().unwrap();
            for perf in &report.products {
                assert_eq!(perf.units_sold + perf.lost_sales, perf.units_demanded);
                let start = before.get(&perf.product_id).copied().unwrap_or(0);
                assert!(perf.units_sold <= start + perf.units_produced);
                assert_eq!(
                    start + perf.units_produced - perf.units_sold,
                    perf.ending_inventory
                );
            }
        }
    }

    #[test]
    fn same_seed_same_history() {
        let run = || {
            let mut engine = SimulationFactory::create_demo_simulation();
            engine.advance_periods(12).unwrap();
            let state = engine.snapshot();
            let sizes: Vec<Decimal> = state
                .market_conditions
                .iter()
                .map(|m| m.total_market_size)
                .collect();
            (state.performance_results, state.events, sizes)
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn parent_ids_never_change() {
        let mut engine = two_companies();
        let owners = |e: &SimulationEngine| -> Vec<(ProductId, CompanyId)> {
            e.state()
                .products
                .iter()
                .map(|p| (p.id.clone(), p.company_id.clone()))
                .collect()
        };
        let before = owners(&engine);
        engine.advance_periods(4).unwrap();
        assert_eq!(owners(&engine), before);
        let sim = engine.state().id.clone();
        assert!(engine.state().companies.iter().all(|c| c.simulation_id == sim));
    }

    #[test]
    fn decisions_are_validated() {
        let mut engine = two_companies();
        let alpha = CompanyId::new("company_1");
        let beta_product = engine
            .state()
            .products
            .iter()
            .find(|p| p.company_id == CompanyId::new("company_2"))
            .unwrap()
            .id
            .clone();
        let alpha_product = engine.state().products[0].id.clone();

        assert_eq!(
            engine.submit_decision(
                &CompanyId::new("company_9"),
                DecisionKind::SetTrainingBudget { amount: Decimal::ONE }
            ),
            Err(EngineError::UnknownCompany(CompanyId::new("company_9")))
        );
        assert!(matches!(
            engine.submit_decision(
                &alpha,
                DecisionKind::SetPrice {
                    product_id: beta_product,
                    price: Decimal::TEN
                }
            ),
            Err(EngineError::NotOwner { .. })
        ));
        assert!(matches!(
            engine.submit_decision(
                &alpha,
                DecisionKind::SetPrice {
                    product_id: alpha_product.clone(),
                    price: Decimal::ZERO
                }
            ),
            Err(EngineError::InvalidDecision(_))
        ));
        assert!(matches!(
            engine.submit_decision(
                &alpha,
                DecisionKind::SetProduction {
                    product_id: alpha_product.clone(),
                    units: 1_000_000
                }
            ),
            Err(EngineError::InvalidDecision(_))
        ));
        assert!(matches!(
            engine.submit_decision(
                &alpha,
                DecisionKind::ExpandCapacity {
                    product_id: alpha_product.clone(),
                    units: 100,
                    implementation_periods: 4
                }
            ),
            Err(EngineError::InvalidDecision(_))
        ));
        assert!(matches!(
            engine.submit_decision(
                &alpha,
                DecisionKind::InvestInQuality {
                    product_id: alpha_product.clone(),
                    amount: Decimal::new(600_000, 0)
                }
            ),
            Ok(_)
        ));
        // Second outlay would overdraw the remaining cash.
        assert!(matches!(
            engine.submit_decision(
                &alpha,
                DecisionKind::InvestInQuality {
                    product_id: alpha_product,
                    amount: Decimal::new(600_000, 0)
                }
            ),
            Err(EngineError::InsufficientCash { .. })
        ));
        assert!(matches!(
            engine.submit_decision(
                &alpha,
                DecisionKind::LaunchProduct(NewProduct {
                    category: SegmentId::new("luxury"),
                    ..gadget()
                })
            ),
            Err(EngineError::Validation(_))
        ));
    }

    #[test]
    fn decisions_take_effect() {
        let mut engine = SimulationFactory::create_demo_simulation();
        let company = demo_company();
        engine
            .submit_decision(
                &company,
                DecisionKind::SetPrice {
                    product_id: widget(1),
                    price: Decimal::new(320, 0),
                },
            )
            .unwrap();
        engine
            .submit_decision(
                &company,
                DecisionKind::ExpandCapacity {
                    product_id: widget(2),
                    units: 500,
                    implementation_periods: 1,
                },
            )
            .unwrap();
        engine
            .submit_decision(&company, DecisionKind::LaunchProduct(gadget()))
            .unwrap();
        engine.advance_period().unwrap();

        let state = engine.state();
        assert_eq!(state.product(&widget(1)).unwrap().selling_price, Decimal::new(320, 0));
        assert_eq!(state.products.len(), 4);
        assert_eq!(state.products[3].status, ProductStatus::Development);
        assert_eq!(state.products[3].company_id, company);
        // 500 units x 75 x 2 x 1.25, less 2% depreciation
        assert_eq!(state.companies[0].fixed_assets, Decimal::new(91_875, 0));
        assert_eq!(state.product(&widget(2)).unwrap().production_capacity, 3000);

        engine.advance_period().unwrap();
        let state = engine.state();
        assert_eq!(state.product(&widget(2)).unwrap().production_capacity, 3500);
        assert!(state.products[3].is_active());
    }

    #[test]
    fn discontinued_products_stop_selling() {
        let mut engine = SimulationFactory::create_demo_simulation();
        engine
            .submit_decision(
                &demo_company(),
                DecisionKind::DiscontinueProduct { product_id: widget(2) },
            )
            .unwrap();
        let report = engine.advance_period().unwrap();
        let product = engine.state().product(&widget(2)).unwrap();
        assert_eq!(product.status, ProductStatus::Discontinued);
        assert_eq!(product.inventory_level, 0);
        assert!(report.products.iter().all(|p| p.product_id != widget(2)));
        assert!(matches!(
            engine.submit_decision(
                &demo_company(),
                DecisionKind::SetPrice {
                    product_id: widget(2),
                    price: Decimal::TEN
                }
            ),
            Err(EngineError::InvalidDecision(_))
        ));
    }

    #[test]
    fn paused_simulation_rejects_work() {
        let mut engine = SimulationFactory::create_demo_simulation();
        engine.pause().unwrap();
        assert_eq!(
            engine.advance_period().unwrap_err(),
            EngineError::NotActive(SimulationStatus::Paused)
        );
        engine.resume().unwrap();
        assert!(engine.advance_period().is_ok());
        assert!(engine.start().is_err());
    }

    #[test]
    fn setup_simulation_waits_for_start() {
        let scenario = Scenario {
            name: "Held".into(),
            description: String::new(),
            config: Default::default(),
            companies: vec![CompanySeed {
                name: "Alpha".into(),
                description: String::new(),
                user_id: None,
                products: vec![gadget()],
            }],
        };
        let params = SimulationParams {
            start_in_setup: true,
            ..scenario.into_params()
        };
        let mut engine = SimulationFactory::create_simulation(params).unwrap();
        assert_eq!(engine.status(), SimulationStatus::Setup);
        assert_eq!(
            engine.advance_period().unwrap_err(),
            EngineError::NotActive(SimulationStatus::Setup)
        );
        assert!(engine.pause().is_err());

        engine.start().unwrap();
        assert_eq!(engine.status(), SimulationStatus::Active);
        assert!(engine.start().is_err());
        assert_eq!(engine.advance_period().unwrap().period, 0);
    }

    #[test]
    fn oversized_decisions_are_rejected() {
        let mut engine = two_companies();
        let alpha = CompanyId::new("company_1");
        let costly = NewProduct {
            production_cost: Decimal::from(10u64.pow(18)) * Decimal::from(10u64.pow(9)),
            selling_price: Decimal::from(10u64.pow(18)),
            production_capacity: 1000,
            development_cost: Decimal::ZERO,
            development_periods: 0,
            ..gadget()
        };
        assert!(matches!(
            engine.submit_decision(&alpha, DecisionKind::LaunchProduct(costly)),
            Err(EngineError::Validation(ValidationError::TooLarge { field: "production_cost", .. }))
        ));
        let bottomless = NewProduct {
            production_capacity: u64::MAX,
            development_cost: Decimal::ZERO,
            development_periods: 0,
            ..gadget()
        };
        assert!(matches!(
            engine.submit_decision(&alpha, DecisionKind::LaunchProduct(bottomless)),
            Err(EngineError::Validation(ValidationError::TooLarge {
                field: "production_capacity",
                ..
            }))
        ));

        // Free capacity still stops at the limit.
        let free = NewProduct {
            production_cost: Decimal::ZERO,
            selling_price: Decimal::ONE,
            production_capacity: MAX_CAPACITY - 10,
            development_cost: Decimal::ZERO,
            development_periods: 0,
            ..gadget()
        };
        engine
            .submit_decision(&alpha, DecisionKind::LaunchProduct(free))
            .unwrap();
        engine.advance_period().unwrap();
        let free_id = engine
            .state()
            .products_of(&alpha)
            .find(|p| p.production_capacity == MAX_CAPACITY - 10)
            .map(|p| p.id.clone())
            .unwrap();
        engine
            .submit_decision(
                &alpha,
                DecisionKind::ExpandCapacity {
                    product_id: free_id.clone(),
                    units: 10,
                    implementation_periods: 1,
                },
            )
            .unwrap();
        assert!(matches!(
            engine.submit_decision(
                &alpha,
                DecisionKind::ExpandCapacity {
                    product_id: free_id.clone(),
                    units: 1,
                    implementation_periods: 1,
                }
            ),
            Err(EngineError::InvalidDecision(_))
        ));
        assert!(matches!(
            engine.submit_decision(
                &alpha,
                DecisionKind::SetPrice {
                    product_id: free_id.clone(),
                    price: Decimal::from(10u64.pow(12)),
                }
            ),
            Err(EngineError::InvalidDecision(_))
        ));

        engine.advance_periods(3).unwrap();
        let product = engine.state().product(&free_id).unwrap();
        assert_eq!(product.production_capacity, MAX_CAPACITY);
        assert!(engine.state().companies.iter().all(|c| c.cash_balance >= Decimal::ZERO));
    }

    #[test]
    fn leaderboard_ranks_by_score() {
        let mut engine = two_companies();
        engine.advance_periods(3).unwrap();
        let board = engine.leaderboard();
        assert_eq!(board.len(), 2);
        assert!(board[0].total_score >= board[1].total_score);
    }

    #[test]
    fn scenario_yaml_fills_defaults() {
        let yaml = r#"
name: Premium Duel
config:
  periods: 6
  difficulty: hard
companies:
  - name: Alpha
    products:
      - name: Halo
        category: premium
        quality_rating: 9.0
        innovation_rating: 8.0
        sustainability_rating: 7.0
        production_cost: "180"
        selling_price: "360"
        production_capacity: 1500
        development_cost: "0"
        development_periods: 0
  - name: Beta
"#;
        let scenario = Scenario::from_yaml_str(yaml).unwrap();
        assert_eq!(scenario.config.periods, 6);
        assert_eq!(scenario.config.events_frequency, 0.3);
        let params = scenario.into_params();
        assert_eq!(params.id.as_str(), "sim_premium_duel");

        let mut engine = SimulationFactory::create_simulation(params).unwrap();
        let state = engine.state();
        assert_eq!(state.companies.len(), 2);
        assert_eq!(state.products[0].category, SegmentId::new(PREMIUM));
        assert!(state.products[0].is_active());
        assert_eq!(engine.advance_periods(10).unwrap().len(), 6);
    }

    #[test]
    fn autopilot_plans_are_accepted() {
        let mut engine = SimulationFactory::create_demo_simulation();
        let advisor = sim_ai::Advisor::default();
        for _ in 0..12 {
            let plan = advisor.plan(engine.state(), &demo_company());
            for kind in plan.decisions {
                engine.submit_decision(&demo_company(), kind).unwrap();
            }
            engine.advance_period().unwrap();
        }
        assert_eq!(engine.status(), SimulationStatus::Completed);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(8))]
        #[test]
        fn cash_never_negative(seed in any::<u64>(), price in 60i64..600) {
            let mut state = SimulationFactory::demo_state();
            state.config.rng_seed = seed;
            state.config.events_frequency = 1.0;
            let mut engine = SimulationEngine::new(state).unwrap();
            engine.submit_decision(&demo_company(), DecisionKind::SetPrice {
                product_id: widget(1),
                price: Decimal::new(price, 0),
            }).unwrap();
            for _ in 0..12 {
                engine.advance_period().unwrap();
                for c in &engine.state().companies {
                    prop_assert!(c.cash_balance >= Decimal::ZERO);
                    prop_assert!(c.total_liabilities >= Decimal::ZERO);
                    prop_assert!((0.0..=100.0).contains(&c.brand_value));
                }
                for p in &engine.state().products {
                    prop_assert!((0.0..=10.0).contains(&p.quality_rating));
                }
            }
        }
    }
}
