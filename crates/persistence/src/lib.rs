#![deny(warnings)]

//! Persistence layer: SQLite schema, simulation snapshots and KPI history.

use anyhow::{Context, Result};
use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use sim_core::{CompanyId, SimulationState};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use tracing::{debug, info};

/// Returns the default SQLite URL used for local saves.
pub fn default_sqlite_url() -> &'static str {
    "sqlite://./saves/main.db"
}

/// Open (creating if missing) and migrate a database.
pub async fn init_db(url: &str) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(url)
        .with_context(|| format!("invalid database url {url}"))?
        .create_if_missing(true)
        .foreign_keys(true);
    // Every connection to an in-memory database is a separate database.
    let pool = if url.contains(":memory:") {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?
    } else {
        SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?
    };
    sqlx::migrate!("./migrations").run(&pool).await?;
    info!(%url, "database ready");
    Ok(pool)
}

/// Create a save slot and return its id.
pub async fn create_save(pool: &SqlitePool, name: &str, note: Option<&str>) -> Result<i64> {
    let id = sqlx::query("INSERT INTO saves (name, note, created_at) VALUES (?, ?, ?)")
        .bind(name)
        .bind(note)
        .bind(Utc::now().to_rfc3339())
        .execute(pool)
        .await?
        .last_insert_rowid();
    debug!(save_id = id, name, "save created");
    Ok(id)
}

#[derive(Clone, Debug, PartialEq)]
pub struct SaveInfo {
    pub id: i64,
    pub name: String,
    pub note: Option<String>,
    pub created_at: String,
}

pub async fn list_saves(pool: &SqlitePool) -> Result<Vec<SaveInfo>> {
    let rows = sqlx::query_as::<_, (i64, String, Option<String>, String)>(
        "SELECT id, name, note, created_at FROM saves ORDER BY id",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows
        .into_iter()
        .map(|(id, name, note, created_at)| SaveInfo {
            id,
            name,
            note,
            created_at,
        })
        .collect())
}

/// Money to whole cents, rounding half away from zero.
pub fn decimal_to_cents_i64(value: Decimal) -> Result<i64> {
    value
        .checked_mul(Decimal::from(100))
        .and_then(|cents| {
            cents
                .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
                .to_i64()
        })
        .with_context(|| format!("{value} does not fit in i64 cents"))
}

/// Store the state under its current period, replacing an earlier
/// snapshot of the same period, and record the KPIs of every period
/// played so far.
pub async fn save_snapshot(pool: &SqlitePool, save_id: i64, state: &SimulationState) -> Result<()> {
    let json = serde_json::to_string(state)?;
    let status = serde_json::to_value(state.status)?
        .as_str()
        .unwrap_or_default()
        .to_string();
    let now = Utc::now().to_rfc3339();

    let mut tx = pool.begin().await?;
    sqlx::query(
        "INSERT OR REPLACE INTO snapshots \
         (save_id, period, simulation_id, status, state_json, created_at) \
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(save_id)
    .bind(i64::from(state.current_period))
    .bind(state.id.as_str())
    .bind(status)
    .bind(json)
    .bind(now.as_str())
    .execute(&mut *tx)
    .await?;

    for r in &state.performance_results {
        sqlx::query(
            "INSERT OR REPLACE INTO period_kpis \
             (save_id, company_id, period, revenue_cents, profit_cents, cash_cents, market_share, score) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(save_id)
        .bind(r.company_id.as_str())
        .bind(i64::from(r.period))
        .bind(decimal_to_cents_i64(r.revenue)?)
        .bind(decimal_to_cents_i64(r.profit)?)
        .bind(decimal_to_cents_i64(r.cash_balance)?)
        .bind(r.market_share)
        .bind(r.score)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;
    debug!(save_id, period = state.current_period, "snapshot saved");
    Ok(())
}

fn decode(json: &str) -> Result<SimulationState> {
    serde_json::from_str(json).context("corrupt snapshot")
}

/// The snapshot taken at `period`, if any.
pub async fn load_snapshot(
    pool: &SqlitePool,
    save_id: i64,
    period: u32,
) -> Result<Option<SimulationState>> {
    let row = sqlx::query_as::<_, (String,)>(
        "SELECT state_json FROM snapshots WHERE save_id = ? AND period = ?",
    )
    .bind(save_id)
    .bind(i64::from(period))
    .fetch_optional(pool)
    .await?;
    row.map(|(json,)| decode(&json)).transpose()
}

/// The snapshot with the highest period, if any.
pub async fn latest_snapshot(pool: &SqlitePool, save_id: i64) -> Result<Option<SimulationState>> {
    let row = sqlx::query_as::<_, (String,)>(
        "SELECT state_json FROM snapshots WHERE save_id = ? ORDER BY period DESC LIMIT 1",
    )
    .bind(save_id)
    .fetch_optional(pool)
    .await?;
    row.map(|(json,)| decode(&json)).transpose()
}

/// Periods with a snapshot, ascending.
pub async fn list_periods(pool: &SqlitePool, save_id: i64) -> Result<Vec<u32>> {
    let rows = sqlx::query_as::<_, (i64,)>(
        "SELECT period FROM snapshots WHERE save_id = ? ORDER BY period",
    )
    .bind(save_id)
    .fetch_all(pool)
    .await?;
    rows.into_iter()
        .map(|(p,)| u32::try_from(p).context("period out of range"))
        .collect()
}

/// One company's KPIs of one period.
#[derive(Clone, Debug, PartialEq)]
pub struct KpiRow {
    pub period: u32,
    pub revenue_cents: i64,
    pub profit_cents: i64,
    pub cash_cents: i64,
    pub market_share: f64,
    pub score: f64,
}

pub async fn kpi_history(pool: &SqlitePool, save_id: i64, company: &CompanyId) -> Result<Vec<KpiRow>> {
    let rows = sqlx::query_as::<_, (i64, i64, i64, i64, f64, f64)>(
        "SELECT period, revenue_cents, profit_cents, cash_cents, market_share, score \
         FROM period_kpis WHERE save_id = ? AND company_id = ? ORDER BY period",
    )
    .bind(save_id)
    .bind(company.as_str())
    .fetch_all(pool)
    .await?;
    rows.into_iter()
        .map(|(period, revenue_cents, profit_cents, cash_cents, market_share, score)| {
            Ok(KpiRow {
                period: u32::try_from(period).context("period out of range")?,
                revenue_cents,
                profit_cents,
                cash_cents,
                market_share,
                score,
            })
        })
        .collect()
}
