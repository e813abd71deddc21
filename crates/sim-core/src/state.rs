use crate::{
    CapacityProject, Company, CompanyId, Decision, Event, MarketCondition, PerformanceResult,
    Product, ProductId, ProductPerformance, SimulationConfig, SimulationId, UserId,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimulationStatus {
    Setup,
    Active,
    Paused,
    Completed,
}

/// Complete state of one simulation; a snapshot of it resumes exactly.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulationState {
    pub id: SimulationId,
    pub name: String,
    pub description: String,
    pub config: SimulationConfig,
    /// Period about to be played.
    pub current_period: u32,
    pub status: SimulationStatus,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub companies: Vec<Company>,
    pub products: Vec<Product>,
    pub decisions: Vec<Decision>,
    pub market_conditions: Vec<MarketCondition>,
    pub performance_results: Vec<PerformanceResult>,
    pub product_performance: Vec<ProductPerformance>,
    pub events: Vec<Event>,
    /// Standing production orders; products without one run at capacity.
    #[serde(default)]
    pub production_plans: BTreeMap<ProductId, u64>,
    #[serde(default)]
    pub capacity_projects: Vec<CapacityProject>,
}

impl SimulationState {
    pub fn company(&self, id: &CompanyId) -> Option<&Company> {
        self.companies.iter().find(|c| &c.id == id)
    }

    pub fn company_mut(&mut self, id: &CompanyId) -> Option<&mut Company> {
        self.companies.iter_mut().find(|c| &c.id == id)
    }

    pub fn product(&self, id: &ProductId) -> Option<&Product> {
        self.products.iter().find(|p| &p.id == id)
    }

    pub fn product_mut(&mut self, id: &ProductId) -> Option<&mut Product> {
        self.products.iter_mut().find(|p| &p.id == id)
    }

    pub fn products_of<'a>(&'a self, company: &'a CompanyId) -> impl Iterator<Item = &'a Product> {
        self.products.iter().filter(move |p| &p.company_id == company)
    }

    pub fn market_condition(&self, period: u32) -> Option<&MarketCondition> {
        self.market_conditions.iter().find(|m| m.period == period)
    }

    pub fn latest_market_condition(&self) -> Option<&MarketCondition> {
        self.market_conditions.iter().max_by_key(|m| m.period)
    }

    pub fn decisions_for(&self, period: u32) -> impl Iterator<Item = &Decision> {
        self.decisions.iter().filter(move |d| d.period == period)
    }

    pub fn results_for(&self, period: u32) -> impl Iterator<Item = &PerformanceResult> {
        self.performance_results
            .iter()
            .filter(move |r| r.period == period)
    }

    pub fn product_results_for(&self, period: u32) -> impl Iterator<Item = &ProductPerformance> {
        self.product_performance
            .iter()
            .filter(move |r| r.period == period)
    }

    /// Events whose effects apply in `period`.
    pub fn active_events(&self, period: u32) -> impl Iterator<Item = &Event> {
        self.events.iter().filter(move |e| e.is_active_in(period))
    }

    /// Planned output of a product, capped by capacity.
    pub fn planned_production(&self, product: &Product) -> u64 {
        self.production_plans
            .get(&product.id)
            .copied()
            .unwrap_or(product.production_capacity)
            .min(product.production_capacity)
    }

    pub fn is_finished(&self) -> bool {
        self.current_period >= self.config.periods
    }
}
