#![deny(warnings)]

//! Headless CLI: builds the demo or a scenario simulation and plays it.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use sim_ai::Advisor;
use sim_core::{PerformanceResult, SimulationStatus};
use sim_runtime::{Scenario, SimulationEngine, SimulationFactory};
use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Default)]
struct Args {
    scenario: Option<String>,
    periods: Option<u32>,
    seed: Option<u64>,
    autopilot: bool,
    advisor: Option<String>,
    db: Option<String>,
    json: bool,
}

fn parse_args() -> Args {
    let mut args = Args::default();
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--scenario" => args.scenario = it.next(),
            "--periods" => args.periods = it.next().and_then(|s| s.parse().ok()),
            "--seed" => args.seed = it.next().and_then(|s| s.parse().ok()),
            "--autopilot" => args.autopilot = true,
            "--advisor" => args.advisor = it.next(),
            "--db" => args.db = it.next(),
            "--json" => args.json = true,
            other => warn!(arg = other, "ignoring unknown argument"),
        }
    }
    args
}

async fn build_engine(args: &Args) -> Result<SimulationEngine> {
    match &args.scenario {
        Some(path) => {
            let text = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("reading scenario {path}"))?;
            let mut scenario = Scenario::from_yaml_str(&text)
                .with_context(|| format!("parsing scenario {path}"))?;
            if let Some(periods) = args.periods {
                scenario.config.periods = periods;
            }
            if let Some(seed) = args.seed {
                scenario.config.rng_seed = seed;
            }
            Ok(SimulationFactory::create_simulation(scenario.into_params())?)
        }
        None => {
            let mut state = SimulationFactory::demo_state();
            if let Some(periods) = args.periods {
                state.config.periods = periods;
            }
            if let Some(seed) = args.seed {
                state.config.rng_seed = seed;
            }
            Ok(SimulationEngine::new(state)?)
        }
    }
}

fn kpi_line(name: &str, r: &PerformanceResult) -> String {
    format!(
        "KPI | period: {} | {} | revenue: ${} | profit: ${} | cash: ${} | debt: ${} | share: {:.1}% | units: {} | score: {:.1}",
        r.period,
        name,
        r.revenue.round_dp(0),
        r.profit.round_dp(0),
        r.cash_balance.round_dp(0),
        r.total_liabilities.round_dp(0),
        r.market_share * 100.0,
        r.units_sold,
        r.score
    )
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logging setup
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_max_level(Level::INFO)
        .init();

    let args = parse_args();
    info!(
        ?args,
        git_sha = env!("GIT_SHA"),
        build_date = env!("BUILD_DATE"),
        "starting CLI"
    );

    let advisor = match &args.advisor {
        Some(path) => Advisor::from_yaml_str(
            &tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("reading advisor config {path}"))?,
        )?,
        None => Advisor::default(),
    };

    let mut engine = build_engine(&args).await?;
    let state = engine.state();
    println!(
        "Simulation OK | {} | companies: {} | products: {} | periods: {}",
        state.name,
        state.companies.len(),
        state.products.len(),
        state.config.periods
    );

    let store = match &args.db {
        Some(url) => {
            let pool = persistence::init_db(url).await?;
            let save = persistence::create_save(&pool, &engine.state().name, None).await?;
            persistence::save_snapshot(&pool, save, engine.state()).await?;
            Some((pool, save))
        }
        None => None,
    };

    while engine.status() == SimulationStatus::Active {
        if args.autopilot {
            let companies: Vec<_> = engine.state().companies.iter().map(|c| c.id.clone()).collect();
            for company in companies {
                let plan = advisor.plan(engine.state(), &company);
                for kind in plan.decisions {
                    if let Err(e) = engine.submit_decision(&company, kind) {
                        warn!(%company, error = %e, "advisor decision rejected");
                    }
                }
            }
        }

        let report = engine.advance_period()?;
        for r in &report.results {
            let name = engine
                .state()
                .company(&r.company_id)
                .map(|c| c.name.as_str())
                .unwrap_or("?");
            println!("{}", kpi_line(name, r));
        }
        for event in &report.events {
            println!("EVENT | period: {} | {}", event.period, event.description);
        }
        if let Some((pool, save)) = &store {
            persistence::save_snapshot(pool, *save, engine.state()).await?;
        }
    }

    for (rank, s) in engine.leaderboard().iter().enumerate() {
        println!(
            "RANK | {} | {} | score: {:.1} | cash: ${}",
            rank + 1,
            s.name,
            s.total_score,
            s.cash_balance.round_dp(0)
        );
    }
    let total_cash: Decimal = engine.state().companies.iter().map(|c| c.cash_balance).sum();
    info!(%total_cash, periods = engine.current_period(), "simulation finished");

    if args.json {
        println!("{}", serde_json::to_string_pretty(engine.state())?);
    }
    Ok(())
}
