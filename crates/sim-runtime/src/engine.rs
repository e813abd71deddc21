use crate::pipeline::PeriodLedger;
use crate::systems::{init_world, period_schedule, Sim};
use bevy_ecs::prelude::{Schedule, World};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sim_core::{
    validate_new_product, validate_simulation, CompanyId, Decision, DecisionId, DecisionKind,
    Event, PerformanceResult, ProductId, ProductPerformance, ProductStatus, SimulationState,
    SimulationStatus, ValidationError, MAX_BUDGET, MAX_CAPACITY, MAX_UNIT_PRICE,
};
use sim_econ::{capacity_investment, EconError};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error, PartialEq)]
pub enum EngineError {
    #[error("simulation is {0:?}, not active")]
    NotActive(SimulationStatus),
    #[error("unknown company: {0}")]
    UnknownCompany(CompanyId),
    #[error("unknown product: {0}")]
    UnknownProduct(ProductId),
    #[error("product {product} does not belong to {company}")]
    NotOwner {
        product: ProductId,
        company: CompanyId,
    },
    #[error("invalid decision: {0}")]
    InvalidDecision(String),
    #[error("insufficient cash: needed {needed}, available {available}")]
    InsufficientCash { needed: Decimal, available: Decimal },
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Econ(#[from] EconError),
}

/// What one period produced.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PeriodReport {
    pub period: u32,
    pub results: Vec<PerformanceResult>,
    pub products: Vec<ProductPerformance>,
    /// Events rolled at the end of the period.
    pub events: Vec<Event>,
    pub launched: Vec<ProductId>,
    /// Status after the period.
    pub status: SimulationStatus,
}

/// A company's place in the ranking.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Standing {
    pub company_id: CompanyId,
    pub name: String,
    pub total_score: f64,
    pub cash_balance: Decimal,
}

/// Owns one simulation and plays it period by period.
pub struct SimulationEngine {
    world: World,
    schedule: Schedule,
}

impl SimulationEngine {
    /// Wrap a state after checking its invariants.
    pub fn new(state: SimulationState) -> Result<Self, EngineError> {
        validate_simulation(&state)?;
        Ok(Self::new_unchecked(state))
    }

    pub(crate) fn new_unchecked(state: SimulationState) -> Self {
        Self {
            world: init_world(state),
            schedule: period_schedule(),
        }
    }

    pub fn state(&self) -> &SimulationState {
        &self.world.resource::<Sim>().0
    }

    fn state_mut(&mut self) -> &mut SimulationState {
        &mut self.world.resource_mut::<Sim>().into_inner().0
    }

    /// Owned copy of the state, e.g. for persistence.
    pub fn snapshot(&self) -> SimulationState {
        self.state().clone()
    }

    pub fn current_period(&self) -> u32 {
        self.state().current_period
    }

    pub fn status(&self) -> SimulationStatus {
        self.state().status
    }

    fn ensure_active(&self) -> Result<(), EngineError> {
        match self.status() {
            SimulationStatus::Active => Ok(()),
            other => Err(EngineError::NotActive(other)),
        }
    }

    /// Setup -> Active.
    pub fn start(&mut self) -> Result<(), EngineError> {
        self.transition(SimulationStatus::Setup, SimulationStatus::Active)
    }

    /// Active -> Paused.
    pub fn pause(&mut self) -> Result<(), EngineError> {
        self.transition(SimulationStatus::Active, SimulationStatus::Paused)
    }

    /// Paused -> Active.
    pub fn resume(&mut self) -> Result<(), EngineError> {
        self.transition(SimulationStatus::Paused, SimulationStatus::Active)
    }

    fn transition(&mut self, from: SimulationStatus, to: SimulationStatus) -> Result<(), EngineError> {
        let current = self.status();
        if current != from {
            return Err(EngineError::InvalidDecision(format!(
                "cannot move from {current:?} to {to:?}"
            )));
        }
        let state = self.state_mut();
        state.status = to;
        state.updated_at = Utc::now();
        info!(simulation = %state.id, status = ?to, "status changed");
        Ok(())
    }

    /// Validate a decision and queue it for the current period.
    pub fn submit_decision(
        &mut self,
        company_id: &CompanyId,
        kind: DecisionKind,
    ) -> Result<DecisionId, EngineError> {
        self.ensure_active()?;
        let state = self.state();
        let company = state
            .company(company_id)
            .ok_or_else(|| EngineError::UnknownCompany(company_id.clone()))?;

        if let Some(product_id) = kind.product_id() {
            let product = state
                .product(product_id)
                .ok_or_else(|| EngineError::UnknownProduct(product_id.clone()))?;
            if &product.company_id != company_id {
                return Err(EngineError::NotOwner {
                    product: product_id.clone(),
                    company: company_id.clone(),
                });
            }
            if product.status == ProductStatus::Discontinued {
                return Err(EngineError::InvalidDecision(format!(
                    "{product_id} is discontinued"
                )));
            }
        }

        match &kind {
            DecisionKind::SetPrice { price, .. } if *price <= Decimal::ZERO => {
                return Err(EngineError::InvalidDecision("price must be > 0".into()));
            }
            DecisionKind::SetPrice { price, .. } if *price > MAX_UNIT_PRICE => {
                return Err(EngineError::InvalidDecision(format!(
                    "price {price} exceeds {MAX_UNIT_PRICE}"
                )));
            }
            DecisionKind::SetProduction { product_id, units } => {
                let capacity = state
                    .product(product_id)
                    .map(|p| p.production_capacity)
                    .unwrap_or(0);
                if *units > capacity {
                    return Err(EngineError::InvalidDecision(format!(
                        "production of {units} exceeds capacity {capacity}"
                    )));
                }
            }
            DecisionKind::SetMarketingBudget { budget: amount, .. }
            | DecisionKind::InvestInQuality { amount, .. }
            | DecisionKind::SetTrainingBudget { amount }
                if *amount < Decimal::ZERO =>
            {
                return Err(EngineError::InvalidDecision(format!(
                    "{} amount must not be negative",
                    kind.label()
                )));
            }
            DecisionKind::SetMarketingBudget { budget: amount, .. }
            | DecisionKind::InvestInQuality { amount, .. }
            | DecisionKind::SetTrainingBudget { amount }
                if *amount > MAX_BUDGET =>
            {
                return Err(EngineError::InvalidDecision(format!(
                    "{} amount exceeds {MAX_BUDGET}",
                    kind.label()
                )));
            }
            DecisionKind::ExpandCapacity { units: 0, .. } => {
                return Err(EngineError::InvalidDecision("expansion of zero units".into()));
            }
            DecisionKind::ExpandCapacity {
                implementation_periods,
                ..
            } if !(1..=3).contains(implementation_periods) => {
                return Err(EngineError::InvalidDecision(format!(
                    "implementation time must be 1..=3 periods, got {implementation_periods}"
                )));
            }
            DecisionKind::ExpandCapacity {
                product_id, units, ..
            } => {
                let planned = planned_capacity(state, product_id);
                if planned.saturating_add(*units) > MAX_CAPACITY {
                    return Err(EngineError::InvalidDecision(format!(
                        "capacity of {product_id} would exceed {MAX_CAPACITY}"
                    )));
                }
            }
            DecisionKind::LaunchProduct(spec) => validate_new_product(spec, &state.config)?,
            _ => {}
        }

        let outlay = outlay(state, &kind)?;
        if outlay > Decimal::ZERO {
            let period = state.current_period;
            let mut committed = Decimal::ZERO;
            for d in state
                .decisions_for(period)
                .filter(|d| &d.company_id == company_id)
            {
                committed += outlay_of(state, &d.kind);
            }
            let needed = committed + outlay;
            if needed > company.cash_balance {
                return Err(EngineError::InsufficientCash {
                    needed,
                    available: company.cash_balance,
                });
            }
        }

        let period = state.current_period;
        let id = DecisionId::new(format!("decision_{}_{}", period, state.decisions.len() + 1));
        debug!(decision = %id, company = %company_id, kind = kind.label(), "decision accepted");
        self.state_mut().decisions.push(Decision {
            id: id.clone(),
            company_id: company_id.clone(),
            period,
            kind,
            submitted_at: Utc::now(),
        });
        Ok(id)
    }

    /// Play the current period.
    pub fn advance_period(&mut self) -> Result<PeriodReport, EngineError> {
        self.ensure_active()?;
        let period = self.current_period();
        self.world.insert_resource(PeriodLedger::new(period));
        self.schedule.run(&mut self.world);

        let ledger = self.world.resource::<PeriodLedger>();
        let state = self.state();
        let report = PeriodReport {
            period,
            results: state.results_for(period).cloned().collect(),
            products: state.product_results_for(period).cloned().collect(),
            events: state
                .events
                .iter()
                .filter(|e| ledger.new_events.contains(&e.id))
                .cloned()
                .collect(),
            launched: ledger.launched.clone(),
            status: state.status,
        };
        info!(
            period,
            companies = report.results.len(),
            events = report.events.len(),
            "period complete"
        );
        Ok(report)
    }

    /// Play up to `n` periods, stopping early when the simulation completes.
    pub fn advance_periods(&mut self, n: u32) -> Result<Vec<PeriodReport>, EngineError> {
        let mut reports = Vec::new();
        for _ in 0..n {
            let report = self.advance_period()?;
            let done = report.status == SimulationStatus::Completed;
            reports.push(report);
            if done {
                break;
            }
        }
        Ok(reports)
    }

    /// Companies by summed score over all periods played, best first.
    pub fn leaderboard(&self) -> Vec<Standing> {
        let state = self.state();
        let mut board: Vec<Standing> = state
            .companies
            .iter()
            .map(|c| Standing {
                company_id: c.id.clone(),
                name: c.name.clone(),
                total_score: state
                    .performance_results
                    .iter()
                    .filter(|r| r.company_id == c.id)
                    .map(|r| r.score)
                    .sum(),
                cash_balance: c.cash_balance,
            })
            .collect();
        board.sort_by(|a, b| {
            b.total_score
                .total_cmp(&a.total_score)
                .then_with(|| a.company_id.cmp(&b.company_id))
        });
        board
    }
}

/// Capacity of a product once every project under way or queued this
/// period is finished.
fn planned_capacity(state: &SimulationState, product_id: &ProductId) -> u64 {
    let current = state
        .product(product_id)
        .map(|p| p.production_capacity)
        .unwrap_or(0);
    let building = state
        .capacity_projects
        .iter()
        .filter(|c| &c.product_id == product_id)
        .map(|c| c.units);
    let queued = state
        .decisions_for(state.current_period)
        .filter_map(|d| match &d.kind {
            DecisionKind::ExpandCapacity {
                product_id: target,
                units,
                ..
            } if target == product_id => Some(*units),
            _ => None,
        });
    building
        .chain(queued)
        .fold(current, |acc, units| acc.saturating_add(units))
}

/// Cash a decision spends when it is applied.
fn outlay(state: &SimulationState, kind: &DecisionKind) -> Result<Decimal, EngineError> {
    Ok(match kind {
        DecisionKind::ExpandCapacity {
            product_id,
            units,
            implementation_periods,
        } => {
            let cost = state
                .product(product_id)
                .map(|p| p.production_cost)
                .ok_or_else(|| EngineError::UnknownProduct(product_id.clone()))?;
            capacity_investment(cost, *units, *implementation_periods)?.round_dp(2)
        }
        DecisionKind::InvestInQuality { amount, .. } => *amount,
        DecisionKind::LaunchProduct(spec) => spec.development_cost,
        _ => Decimal::ZERO,
    })
}

fn outlay_of(state: &SimulationState, kind: &DecisionKind) -> Decimal {
    outlay(state, kind).unwrap_or(Decimal::ZERO)
}
