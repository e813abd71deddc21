//! The steps of one simulated period, in execution order.
//!
//! Every step reads and updates the simulation state and the period
//! ledger. Decisions were validated on submission, so steps never fail;
//! anything unexpected is logged and skipped.

use crate::market::{cost_multiplier, next_market_condition, roll_event};
use bevy_ecs::prelude::Resource;
use chrono::{DateTime, Utc};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use sim_core::{
    clamp_rating, CapacityProject, Company, CompanyId, ConsumerPreferences, Decision,
    DecisionKind, EventId, NewProduct, PerformanceResult, Product, ProductId, ProductPerformance,
    ProductStatus, SegmentId, SimulationState, SimulationStatus, StockStatus,
};
use sim_econ::{attractiveness, capacity_investment, clear_segment, segment_units, Contender, Offer, SegmentTaste};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Flows of one product during the period being played.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProductLedger {
    pub produced: u64,
    pub unit_cost: Decimal,
    pub production_spend: Decimal,
    pub demanded: u64,
    pub sold: u64,
    pub lost: u64,
    pub revenue: Decimal,
    pub marketing: Decimal,
    pub segment_units: u64,
}

/// Flows of one company during the period being played.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CompanyLedger {
    pub revenue: Decimal,
    pub cogs: Decimal,
    pub production_spend: Decimal,
    pub marketing: Decimal,
    pub payroll: Decimal,
    pub training: Decimal,
    pub holding: Decimal,
    pub depreciation: Decimal,
    pub interest: Decimal,
    /// Development and quality spending, expensed when paid.
    pub development: Decimal,
    pub writedowns: Decimal,
    pub capital_outlay: Decimal,
    pub credit_drawn: Decimal,
    pub operating_expenses: Decimal,
    pub profit: Decimal,
    pub units_sold: u64,
}

/// Scratch book of the period being played; reset before every period.
#[derive(Resource, Clone, Debug, Default)]
pub struct PeriodLedger {
    pub period: u32,
    pub products: BTreeMap<ProductId, ProductLedger>,
    pub companies: BTreeMap<CompanyId, CompanyLedger>,
    pub segment_demand: BTreeMap<SegmentId, u64>,
    pub launched: Vec<ProductId>,
    pub new_events: Vec<EventId>,
}

impl PeriodLedger {
    pub fn new(period: u32) -> Self {
        Self {
            period,
            ..Self::default()
        }
    }

    fn company(&mut self, id: &CompanyId) -> &mut CompanyLedger {
        self.companies.entry(id.clone()).or_default()
    }

    fn product(&mut self, id: &ProductId) -> &mut ProductLedger {
        self.products.entry(id.clone()).or_default()
    }
}

fn dec(v: f64) -> Decimal {
    Decimal::from_f64(v).unwrap_or(Decimal::ZERO)
}

fn money(v: Decimal) -> Decimal {
    v.round_dp(2)
}

/// Pay from cash; whatever cash cannot cover is drawn on the credit line.
fn pay(company: &mut Company, ledger: &mut CompanyLedger, amount: Decimal) {
    if company.cash_balance >= amount {
        company.cash_balance -= amount;
        return;
    }
    let draw = amount - company.cash_balance;
    company.cash_balance = Decimal::ZERO;
    company.total_liabilities += draw;
    ledger.credit_drawn += draw;
    warn!(company = %company.id, %draw, "cash shortfall drawn on credit line");
}

/// Next free id of the form `product_<company stem>_<n>`.
pub fn next_product_id(state: &SimulationState, company: &CompanyId) -> ProductId {
    let stem = company
        .as_str()
        .strip_prefix("company_")
        .unwrap_or(company.as_str());
    let mut n = state.products.len() + 1;
    loop {
        let id = ProductId::new(format!("product_{stem}_{n}"));
        if state.product(&id).is_none() {
            return id;
        }
        n += 1;
    }
}

/// Product built from a specification; sold from `period + development_periods`.
pub fn build_product(
    id: ProductId,
    company: CompanyId,
    spec: &NewProduct,
    period: u32,
    now: DateTime<Utc>,
) -> Product {
    Product {
        id,
        company_id: company,
        name: spec.name.clone(),
        description: spec.description.clone(),
        category: spec.category.clone(),
        quality_rating: spec.quality_rating,
        innovation_rating: spec.innovation_rating,
        sustainability_rating: spec.sustainability_rating,
        production_cost: spec.production_cost,
        selling_price: spec.selling_price,
        inventory_level: 0,
        production_capacity: spec.production_capacity,
        development_cost: spec.development_cost,
        marketing_budget: spec.marketing_budget,
        status: if spec.development_periods == 0 {
            ProductStatus::Active
        } else {
            ProductStatus::Development
        },
        launch_period: period + spec.development_periods,
        discontinue_period: None,
        profile: spec.profile.clone(),
        created_at: now,
        updated_at: now,
    }
}

/// Step 1: apply this period's decisions in submission order.
pub fn apply_decisions(state: &mut SimulationState, ledger: &mut PeriodLedger) {
    let decisions: Vec<Decision> = state.decisions_for(ledger.period).cloned().collect();
    for d in &decisions {
        apply_decision(state, ledger, d);
    }
}

fn apply_decision(state: &mut SimulationState, ledger: &mut PeriodLedger, d: &Decision) {
    let now = Utc::now();
    let period = ledger.period;
    debug!(company = %d.company_id, kind = d.kind.label(), "applying decision");
    match &d.kind {
        DecisionKind::SetPrice { product_id, price } => {
            if let Some(p) = state.product_mut(product_id) {
                p.selling_price = *price;
                p.updated_at = now;
            }
        }
        DecisionKind::SetProduction { product_id, units } => {
            state.production_plans.insert(product_id.clone(), *units);
        }
        DecisionKind::SetMarketingBudget { product_id, budget } => {
            if let Some(p) = state.product_mut(product_id) {
                p.marketing_budget = *budget;
                p.updated_at = now;
            }
        }
        DecisionKind::ExpandCapacity {
            product_id,
            units,
            implementation_periods,
        } => {
            let Some(cost) = state.product(product_id).map(|p| p.production_cost) else {
                return;
            };
            let investment = match capacity_investment(cost, *units, *implementation_periods) {
                Ok(v) => money(v),
                Err(e) => {
                    warn!(decision = %d.id, error = %e, "skipping capacity expansion");
                    return;
                }
            };
            let book = ledger.company(&d.company_id);
            if let Some(c) = state.company_mut(&d.company_id) {
                pay(c, book, investment);
                c.fixed_assets += investment;
                c.updated_at = now;
            }
            book.capital_outlay += investment;
            state.capacity_projects.push(CapacityProject {
                product_id: product_id.clone(),
                units: *units,
                ready_period: period + implementation_periods,
                investment,
            });
        }
        DecisionKind::InvestInQuality { product_id, amount } => {
            let book = ledger.company(&d.company_id);
            if let Some(c) = state.company_mut(&d.company_id) {
                pay(c, book, *amount);
            }
            book.development += *amount;
            let amount = amount.to_f64().unwrap_or(0.0);
            if let Some(p) = state.product_mut(product_id) {
                p.quality_rating = clamp_rating(p.quality_rating + amount / 200_000.0);
                p.innovation_rating = clamp_rating(p.innovation_rating + amount / 400_000.0);
                p.updated_at = now;
            }
        }
        DecisionKind::LaunchProduct(spec) => {
            let book = ledger.company(&d.company_id);
            if let Some(c) = state.company_mut(&d.company_id) {
                pay(c, book, spec.development_cost);
            }
            book.development += spec.development_cost;
            let id = next_product_id(state, &d.company_id);
            info!(product = %id, launch = period + spec.development_periods, "product in development");
            state
                .products
                .push(build_product(id, d.company_id.clone(), spec, period, now));
        }
        DecisionKind::DiscontinueProduct { product_id } => {
            let Some(p) = state.product_mut(product_id) else {
                return;
            };
            let value = p.inventory_value();
            let salvage = money(value / Decimal::from(2));
            p.status = ProductStatus::Discontinued;
            p.discontinue_period = Some(period);
            p.inventory_level = 0;
            p.updated_at = now;
            state.production_plans.remove(product_id);
            let book = ledger.company(&d.company_id);
            book.writedowns += value - salvage;
            if let Some(c) = state.company_mut(&d.company_id) {
                c.cash_balance += salvage;
            }
        }
        DecisionKind::SetTrainingBudget { amount } => {
            if let Some(c) = state.company_mut(&d.company_id) {
                c.profile.human_resources.training_budget = *amount;
                c.updated_at = now;
            }
        }
    }
}

/// Step 2: launch products whose development is over and finish capacity projects.
pub fn run_lifecycle(state: &mut SimulationState, ledger: &mut PeriodLedger) {
    let period = ledger.period;
    for p in state.products.iter_mut() {
        if p.status == ProductStatus::Development && p.launch_period <= period {
            p.status = ProductStatus::Active;
            p.updated_at = Utc::now();
            info!(product = %p.id, period, "product launched");
            ledger.launched.push(p.id.clone());
        }
    }
    let (ready, pending): (Vec<CapacityProject>, Vec<CapacityProject>) = state
        .capacity_projects
        .drain(..)
        .partition(|c| c.ready_period <= period);
    state.capacity_projects = pending;
    for project in ready {
        if let Some(p) = state.product_mut(&project.product_id) {
            p.production_capacity = p.production_capacity.saturating_add(project.units);
            info!(product = %p.id, capacity = p.production_capacity, "capacity expansion completed");
        }
    }
}

/// Step 3: produce the planned output of every active product.
pub fn run_production(state: &mut SimulationState, ledger: &mut PeriodLedger) {
    let period = ledger.period;
    let productivity: BTreeMap<CompanyId, f64> = state
        .companies
        .iter()
        .map(|c| (c.id.clone(), c.profile.human_resources.productivity))
        .collect();

    let mut runs = Vec::new();
    for p in state.products.iter().filter(|p| p.is_active()) {
        let prod = productivity.get(&p.company_id).copied().unwrap_or(1.0).max(0.01);
        let units = state.planned_production(p);
        let cost = p
            .production_cost
            .checked_mul(cost_multiplier(state, period, &p.category))
            .and_then(|c| c.checked_div(dec(prod)))
            .map(money)
            .and_then(|unit_cost| {
                unit_cost
                    .checked_mul(Decimal::from(units))
                    .map(|spend| (unit_cost, spend))
            });
        match cost {
            Some((unit_cost, spend)) => {
                runs.push((p.id.clone(), p.company_id.clone(), units, unit_cost, spend))
            }
            None => warn!(product = %p.id, units, "production cost overflows, nothing produced"),
        }
    }

    for (product_id, company_id, units, unit_cost, spend) in runs {
        if let Some(p) = state.product_mut(&product_id) {
            p.inventory_level = p.inventory_level.saturating_add(units);
        }
        let entry = ledger.product(&product_id);
        entry.produced = units;
        entry.unit_cost = unit_cost;
        entry.production_spend = spend;
        ledger.company(&company_id).production_spend += spend;
        debug!(product = %product_id, units, %unit_cost, "produced");
    }
}

fn neutral_preferences() -> ConsumerPreferences {
    ConsumerPreferences {
        price_sensitivity: 0.5,
        quality_sensitivity: 0.5,
        brand_loyalty: 0.5,
        innovation_preference: 0.5,
        sustainability_preference: 0.5,
    }
}

/// Step 4: clear every segment, selling from inventory.
pub fn clear_markets(state: &mut SimulationState, ledger: &mut PeriodLedger) {
    let period = ledger.period;
    let Some(market) = state.market_condition(period).cloned() else {
        warn!(period, "no market condition, nothing sold");
        return;
    };
    let rival = state.config.difficulty.rival_strength();
    let brands: BTreeMap<CompanyId, f64> = state
        .companies
        .iter()
        .map(|c| (c.id.clone(), c.brand_value))
        .collect();

    for segment in state.config.market_segments.clone() {
        let Some(reference_price) = state.config.reference_price(&segment) else {
            continue;
        };
        let units = segment_units(
            market.segment_value(&segment),
            reference_price,
            market.economic_indicators.consumer_confidence,
        )
        .unwrap_or(0);
        ledger.segment_demand.insert(segment.clone(), units);

        let prefs = market
            .preferences(&segment)
            .cloned()
            .unwrap_or_else(neutral_preferences);
        let taste = SegmentTaste::from_market(&prefs, &market);

        let entrants: Vec<usize> = state
            .products
            .iter()
            .enumerate()
            .filter(|(_, p)| p.is_active() && p.category == segment)
            .map(|(i, _)| i)
            .collect();
        let contenders: Vec<Contender> = entrants
            .iter()
            .map(|&i| {
                let p = &state.products[i];
                let offer = Offer {
                    price: p.selling_price,
                    reference_price,
                    quality: p.quality_rating,
                    innovation: p.innovation_rating,
                    sustainability: p.sustainability_rating,
                    brand_value: brands.get(&p.company_id).copied().unwrap_or(0.0),
                    marketing_spend: p.marketing_budget,
                };
                Contender {
                    score: attractiveness(&offer, &taste).unwrap_or(0.0),
                    available: p.inventory_level,
                }
            })
            .collect();
        let allocations = match clear_segment(units, rival, &contenders) {
            Ok(a) => a,
            Err(e) => {
                warn!(%segment, error = %e, "segment clearing failed");
                continue;
            }
        };

        for (&i, mut alloc) in entrants.iter().zip(allocations) {
            let p = &mut state.products[i];
            let revenue = match p.selling_price.checked_mul(Decimal::from(alloc.sold)) {
                Some(r) => r,
                None => {
                    warn!(product = %p.id, sold = alloc.sold, "revenue overflows, sale dropped");
                    alloc.lost = alloc.demanded;
                    alloc.sold = 0;
                    Decimal::ZERO
                }
            };
            p.inventory_level -= alloc.sold;
            let marketing = p.marketing_budget;
            let (product_id, company_id) = (p.id.clone(), p.company_id.clone());

            let entry = ledger.product(&product_id);
            entry.demanded = alloc.demanded;
            entry.sold = alloc.sold;
            entry.lost = alloc.lost;
            entry.revenue = revenue;
            entry.marketing = marketing;
            entry.segment_units = units;
            let cogs = entry.unit_cost.saturating_mul(Decimal::from(alloc.sold));

            let book = ledger.company(&company_id);
            book.revenue += revenue;
            book.cogs += cogs;
            book.marketing += marketing;
            book.units_sold = book.units_sold.saturating_add(alloc.sold);
        }
    }
}

/// Step 5: book costs, settle cash and debt, and update brand, HR and credit.
pub fn settle_finances(state: &mut SimulationState, ledger: &mut PeriodLedger) {
    let period = ledger.period;
    let interest_rate = state
        .market_condition(period)
        .map(|m| m.economic_indicators.interest_rate)
        .unwrap_or(0.0);
    let reserve = state.config.initial_cash / Decimal::from(2);

    let mut stock: BTreeMap<CompanyId, (Decimal, f64, usize)> = BTreeMap::new();
    for p in &state.products {
        let e = stock
            .entry(p.company_id.clone())
            .or_insert((Decimal::ZERO, 0.0, 0));
        e.0 += p.inventory_value();
        if p.is_active() {
            e.1 += p.quality_rating;
            e.2 += 1;
        }
    }

    for c in state.companies.iter_mut() {
        let (inventory_value, quality_sum, active) =
            stock.get(&c.id).copied().unwrap_or((Decimal::ZERO, 0.0, 0));
        let book = ledger.company(&c.id);
        let hr = &c.profile.human_resources;

        book.payroll = money(hr.payroll());
        book.training = hr.training_budget;
        book.holding = money(inventory_value * Decimal::new(1, 2));
        book.depreciation = money(c.fixed_assets * Decimal::new(2, 2));
        book.interest = money(c.total_liabilities * dec(interest_rate / 12.0));

        let cash_costs = book.production_spend
            + book.marketing
            + book.payroll
            + book.training
            + book.holding
            + book.interest;
        book.operating_expenses = book.marketing
            + book.payroll
            + book.training
            + book.holding
            + book.interest
            + book.depreciation
            + book.development
            + book.writedowns;
        book.profit = money(book.revenue - book.cogs - book.operating_expenses);

        let cash = c.cash_balance + book.revenue - cash_costs;
        if cash < Decimal::ZERO {
            let draw = -cash;
            c.cash_balance = Decimal::ZERO;
            c.total_liabilities += draw;
            book.credit_drawn += draw;
            warn!(company = %c.id, %draw, "operating loss drawn on credit line");
        } else {
            c.cash_balance = cash;
        }
        let surplus = c.cash_balance - reserve;
        if surplus > Decimal::ZERO && c.total_liabilities > Decimal::ZERO {
            let repay = surplus.min(c.total_liabilities);
            c.cash_balance -= repay;
            c.total_liabilities -= repay;
            debug!(company = %c.id, %repay, "repaid credit line");
        }
        c.cash_balance = money(c.cash_balance);
        c.total_liabilities = money(c.total_liabilities);
        c.fixed_assets = money(c.fixed_assets - book.depreciation);
        c.total_assets = money(c.cash_balance + inventory_value + c.fixed_assets);

        let ratio = c.debt_ratio();
        if ratio > 0.6 || (book.profit < Decimal::ZERO && book.credit_drawn > Decimal::ZERO) {
            c.credit_rating = c.credit_rating.downgrade();
        } else if ratio < 0.2 && book.profit > Decimal::ZERO {
            c.credit_rating = c.credit_rating.upgrade();
        }

        let avg_quality = if active > 0 {
            quality_sum / active as f64
        } else {
            5.0
        };
        let marketing = book.marketing.to_f64().unwrap_or(0.0);
        c.brand_value =
            (c.brand_value * 0.99 + marketing / 50_000.0 + (avg_quality - 5.0) * 0.1).clamp(0.0, 100.0);

        let hr = &mut c.profile.human_resources;
        let per_head = if hr.total_employees > 0 {
            hr.training_budget.to_f64().unwrap_or(0.0) / f64::from(hr.total_employees)
        } else {
            0.0
        };
        let target = 50.0 + (per_head / 20.0).min(30.0);
        hr.employee_satisfaction =
            (hr.employee_satisfaction + (target - hr.employee_satisfaction) * 0.2).clamp(0.0, 100.0);
        hr.productivity = 0.8 + hr.employee_satisfaction / 250.0;
        hr.turnover_rate = (0.25 - hr.employee_satisfaction / 500.0).clamp(0.0, 1.0);
        c.updated_at = Utc::now();
    }
}

/// Step 6: roll the market event of this period.
pub fn roll_events(state: &mut SimulationState, ledger: &mut PeriodLedger) {
    if let Some(event) = roll_event(state, ledger.period) {
        info!(period = ledger.period, kind = ?event.kind, magnitude = event.magnitude, "market event");
        ledger.new_events.push(event.id.clone());
        state.events.push(event);
    }
}

/// Step 7: write performance records of the period.
pub fn record_results(state: &mut SimulationState, ledger: &mut PeriodLedger) {
    let period = ledger.period;
    let market_units: u64 = ledger.segment_demand.values().sum();

    for p in state.products.iter().filter(|p| p.status != ProductStatus::Discontinued) {
        let e = ledger.products.get(&p.id).cloned().unwrap_or_default();
        let cost = e.production_spend + e.marketing;
        let profit = money(e.revenue - e.unit_cost.saturating_mul(Decimal::from(e.sold)) - e.marketing);
        state.product_performance.push(ProductPerformance {
            product_id: p.id.clone(),
            company_id: p.company_id.clone(),
            period,
            units_produced: e.produced,
            units_demanded: e.demanded,
            units_sold: e.sold,
            lost_sales: e.lost,
            revenue: money(e.revenue),
            cost: money(cost),
            profit,
            market_share: share(e.sold, e.segment_units),
            ending_inventory: p.inventory_level,
            stock_status: StockStatus::classify(p.inventory_level, p.production_capacity),
        });
    }

    for c in &state.companies {
        let book = ledger.companies.get(&c.id).cloned().unwrap_or_default();
        let market_share = share(book.units_sold, market_units);
        state.performance_results.push(PerformanceResult {
            company_id: c.id.clone(),
            period,
            revenue: money(book.revenue),
            cost_of_goods_sold: money(book.cogs),
            operating_expenses: money(book.operating_expenses),
            profit: book.profit,
            cash_balance: c.cash_balance,
            total_assets: c.total_assets,
            total_liabilities: c.total_liabilities,
            units_sold: book.units_sold,
            market_share,
            brand_value: c.brand_value,
            score: sim_ai::company_score(book.revenue, book.profit, market_share),
        });
    }
}

fn share(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

/// Step 8: move the clock and open the next period's market.
pub fn advance_clock(state: &mut SimulationState, ledger: &mut PeriodLedger) {
    state.current_period = ledger.period + 1;
    state.updated_at = Utc::now();
    if state.is_finished() {
        state.status = SimulationStatus::Completed;
        info!(simulation = %state.id, periods = state.config.periods, "simulation completed");
        return;
    }
    let next = state.current_period;
    if state.market_condition(next).is_some() {
        return;
    }
    if let Some(prev) = state.market_condition(ledger.period) {
        let condition = next_market_condition(state, prev, next);
        state.market_conditions.push(condition);
    }
}
