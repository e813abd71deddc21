//! Initial states: the demo simulation and simulations built from parameters.

use crate::engine::{EngineError, SimulationEngine};
use crate::market::market_condition_id;
use crate::pipeline::{build_product, next_product_id};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sim_core::{
    Company, CompanyId, CompanyProfile, CompetitiveStrategy, ConsumerPreferences, CreditRating,
    EconomicIndicators, HumanResources, ImpactArea, MarketCondition, NewProduct, Product,
    ProductId, ProductProfile, ProductStatus, SegmentId, SimulationConfig, SimulationId,
    SimulationState, SimulationStatus, TechnologyTrend, UserId, BUDGET, MID_RANGE, PREMIUM,
};
use std::collections::BTreeMap;
use tracing::info;

/// Parameters of a fresh simulation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulationParams {
    pub id: SimulationId,
    pub name: String,
    pub description: String,
    pub created_by: UserId,
    pub config: SimulationConfig,
    pub companies: Vec<CompanySeed>,
    /// Leave the simulation in `Setup` until [`SimulationEngine::start`].
    #[serde(default)]
    pub start_in_setup: bool,
}

/// A company to create, with the products it starts with.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompanySeed {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub products: Vec<NewProduct>,
}

/// Scenario file contents.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub config: SimulationConfig,
    pub companies: Vec<CompanySeed>,
}

impl Scenario {
    pub fn from_yaml_str(text: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }

    pub fn into_params(self) -> SimulationParams {
        let slug: String = self
            .name
            .to_lowercase()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        SimulationParams {
            id: SimulationId::new(format!("sim_{}", slug.trim_matches('_'))),
            name: self.name,
            description: self.description,
            created_by: UserId::new("user_scenario"),
            config: self.config,
            companies: self.companies,
            start_in_setup: false,
        }
    }
}

pub struct SimulationFactory;

impl SimulationFactory {
    /// The demo simulation: one company with three widgets, twelve periods.
    pub fn create_demo_simulation() -> SimulationEngine {
        SimulationEngine::new_unchecked(Self::demo_state())
    }

    pub fn demo_state() -> SimulationState {
        let now = Utc::now();
        let sim_id = SimulationId::new("sim_demo");
        let company_id = CompanyId::new("company_demo");
        let user_id = UserId::new("user_demo");
        let config = SimulationConfig::default();

        let company = Company {
            id: company_id.clone(),
            simulation_id: sim_id.clone(),
            user_id: user_id.clone(),
            name: "TechInnovate Inc.".into(),
            description: "A technology innovation company".into(),
            logo_url: None,
            cash_balance: config.initial_cash,
            total_assets: config.initial_cash,
            total_liabilities: Decimal::ZERO,
            fixed_assets: Decimal::ZERO,
            credit_rating: CreditRating::B,
            brand_value: 50.0,
            profile: CompanyProfile {
                mission_statement: "To innovate and transform technology".into(),
                competitive_strategy: CompetitiveStrategy::Differentiator,
                human_resources: starting_workforce(),
            },
            created_at: now,
            updated_at: now,
        };

        let widget = |n: u32, name: &str, description: &str, segment: &str| Product {
            id: ProductId::new(format!("product_demo_{n}")),
            company_id: company_id.clone(),
            name: name.into(),
            description: description.into(),
            category: SegmentId::new(segment),
            quality_rating: 0.0,
            innovation_rating: 0.0,
            sustainability_rating: 0.0,
            production_cost: Decimal::ZERO,
            selling_price: Decimal::ZERO,
            inventory_level: 0,
            production_capacity: 0,
            development_cost: Decimal::ZERO,
            marketing_budget: Decimal::ZERO,
            status: ProductStatus::Active,
            launch_period: 0,
            discontinue_period: None,
            profile: ProductProfile::default(),
            created_at: now,
            updated_at: now,
        };
        let features = |items: &[&str], audience: &str| ProductProfile {
            features: items.iter().map(|s| s.to_string()).collect(),
            target_audience: audience.into(),
        };

        let premium = Product {
            quality_rating: 8.5,
            innovation_rating: 7.2,
            sustainability_rating: 6.8,
            production_cost: Decimal::new(150, 0),
            selling_price: Decimal::new(300, 0),
            inventory_level: 1000,
            production_capacity: 2000,
            development_cost: Decimal::new(200_000, 0),
            marketing_budget: Decimal::new(50_000, 0),
            profile: features(
                &["Advanced AI", "Premium Materials", "Extended Warranty"],
                "High-income professionals",
            ),
            ..widget(1, "Premium Widget", "Our flagship premium widget", PREMIUM)
        };
        let standard = Product {
            quality_rating: 6.5,
            innovation_rating: 5.8,
            sustainability_rating: 6.0,
            production_cost: Decimal::new(75, 0),
            selling_price: Decimal::new(150, 0),
            inventory_level: 1500,
            production_capacity: 3000,
            development_cost: Decimal::new(100_000, 0),
            marketing_budget: Decimal::new(30_000, 0),
            profile: features(
                &["Reliable Performance", "Good Value"],
                "Middle-income consumers",
            ),
            ..widget(2, "Standard Widget", "Our mid-range widget offering", MID_RANGE)
        };
        let basic = Product {
            quality_rating: 4.5,
            innovation_rating: 3.2,
            sustainability_rating: 5.0,
            production_cost: Decimal::new(40, 0),
            selling_price: Decimal::new(80, 0),
            inventory_level: 0,
            production_capacity: 4000,
            development_cost: Decimal::new(50_000, 0),
            marketing_budget: Decimal::ZERO,
            status: ProductStatus::Development,
            launch_period: 1,
            profile: features(
                &["Essential Functionality", "Affordable"],
                "Budget-conscious consumers",
            ),
            ..widget(3, "Basic Widget", "Our entry-level widget", BUDGET)
        };

        let market = baseline_market_condition(&sim_id, &config, now);

        SimulationState {
            id: sim_id,
            name: "Business Strategy Simulation".into(),
            description: "A simulation focused on strategic decision-making".into(),
            config,
            current_period: 0,
            status: SimulationStatus::Active,
            created_by: user_id,
            created_at: now,
            updated_at: now,
            companies: vec![company],
            products: vec![premium, standard, basic],
            decisions: vec![],
            market_conditions: vec![market],
            performance_results: vec![],
            product_performance: vec![],
            events: vec![],
            production_plans: BTreeMap::new(),
            capacity_projects: vec![],
        }
    }

    /// A fresh simulation, active unless `start_in_setup` is set. Every
    /// company starts with the configured cash; seeded products in
    /// development launch after their development periods.
    pub fn create_simulation(params: SimulationParams) -> Result<SimulationEngine, EngineError> {
        let now = Utc::now();
        let SimulationParams {
            id,
            name,
            description,
            created_by,
            config,
            companies,
            start_in_setup,
        } = params;
        if companies.is_empty() {
            return Err(EngineError::InvalidDecision(
                "a simulation needs at least one company".into(),
            ));
        }
        let market = baseline_market_condition(&id, &config, now);
        let mut state = SimulationState {
            id: id.clone(),
            name,
            description,
            current_period: 0,
            status: if start_in_setup {
                SimulationStatus::Setup
            } else {
                SimulationStatus::Active
            },
            created_by: created_by.clone(),
            created_at: now,
            updated_at: now,
            companies: vec![],
            products: vec![],
            decisions: vec![],
            market_conditions: vec![market],
            performance_results: vec![],
            product_performance: vec![],
            events: vec![],
            production_plans: BTreeMap::new(),
            capacity_projects: vec![],
            config,
        };

        for (i, seed) in companies.into_iter().enumerate() {
            let company_id = CompanyId::new(format!("company_{}", i + 1));
            state.companies.push(Company {
                id: company_id.clone(),
                simulation_id: id.clone(),
                user_id: seed.user_id.unwrap_or_else(|| created_by.clone()),
                name: seed.name,
                description: seed.description,
                logo_url: None,
                cash_balance: state.config.initial_cash,
                total_assets: state.config.initial_cash,
                total_liabilities: Decimal::ZERO,
                fixed_assets: Decimal::ZERO,
                credit_rating: CreditRating::B,
                brand_value: 50.0,
                profile: CompanyProfile {
                    mission_statement: String::new(),
                    competitive_strategy: CompetitiveStrategy::Hybrid,
                    human_resources: starting_workforce(),
                },
                created_at: now,
                updated_at: now,
            });
            for spec in &seed.products {
                sim_core::validate_new_product(spec, &state.config)?;
                let product_id = next_product_id(&state, &company_id);
                let product = build_product(product_id, company_id.clone(), spec, 0, now);
                state.products.push(product);
            }
        }

        info!(
            simulation = %state.id,
            companies = state.companies.len(),
            products = state.products.len(),
            "simulation created"
        );
        SimulationEngine::new(state)
    }
}

fn starting_workforce() -> HumanResources {
    HumanResources {
        total_employees: 100,
        average_salary: Decimal::new(50_000, 0),
        training_budget: Decimal::ZERO,
        employee_satisfaction: 50.0,
        productivity: 1.0,
        turnover_rate: 0.15,
    }
}

fn baseline_share(segment: &str) -> Option<f64> {
    match segment {
        BUDGET => Some(0.3),
        MID_RANGE => Some(0.4),
        PREMIUM => Some(0.3),
        _ => None,
    }
}

fn baseline_preferences(segment: &str) -> ConsumerPreferences {
    let (price, quality, brand, innovation, sustainability) = match segment {
        BUDGET => (0.8, 0.3, 0.2, 0.2, 0.2),
        MID_RANGE => (0.5, 0.5, 0.4, 0.4, 0.4),
        PREMIUM => (0.3, 0.8, 0.7, 0.6, 0.6),
        _ => (0.5, 0.5, 0.5, 0.5, 0.5),
    };
    ConsumerPreferences {
        price_sensitivity: price,
        quality_sensitivity: quality,
        brand_loyalty: brand,
        innovation_preference: innovation,
        sustainability_preference: sustainability,
    }
}

/// Period-0 market: a 5,000,000 market split over the configured
/// segments. The three standard segments keep their 30/40/30 weights,
/// other segments weigh in at the mean; shares are normalized to 1.
pub fn baseline_market_condition(
    simulation: &SimulationId,
    config: &SimulationConfig,
    now: DateTime<Utc>,
) -> MarketCondition {
    let weights: Vec<(SegmentId, f64)> = config
        .market_segments
        .iter()
        .map(|s| (s.clone(), baseline_share(s.as_str()).unwrap_or(1.0 / 3.0)))
        .collect();
    let total: f64 = weights.iter().map(|(_, w)| w).sum();
    let segment_distribution = weights
        .into_iter()
        .map(|(s, w)| (s, if total > 0.0 { w / total } else { 0.0 }))
        .collect();
    let consumer_preferences = config
        .market_segments
        .iter()
        .map(|s| (s.clone(), baseline_preferences(s.as_str())))
        .collect();

    MarketCondition {
        id: market_condition_id(simulation, 0),
        simulation_id: simulation.clone(),
        period: 0,
        total_market_size: Decimal::new(5_000_000, 0),
        segment_distribution,
        economic_indicators: EconomicIndicators {
            gdp_growth: 0.028,
            inflation_rate: 0.021,
            interest_rate: 0.035,
            unemployment_rate: 0.042,
            consumer_confidence: 102.8,
            business_sentiment: 56.4,
        },
        consumer_preferences,
        technology_trends: vec![
            TechnologyTrend {
                name: "AI and Machine Learning".into(),
                impact_area: ImpactArea::ProductDevelopment,
                impact_strength: 0.25,
                adoption_rate: 0.4,
            },
            TechnologyTrend {
                name: "Internet of Things".into(),
                impact_area: ImpactArea::CustomerExperience,
                impact_strength: 0.2,
                adoption_rate: 0.35,
            },
        ],
        sustainability_importance: 0.67,
        created_at: now,
    }
}
