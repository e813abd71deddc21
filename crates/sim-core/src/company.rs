use crate::{CompanyId, SimulationId, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Letter grade from best (`AAA`) to worst (`CCC`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CreditRating {
    AAA,
    AA,
    A,
    BBB,
    BB,
    B,
    CCC,
}

impl CreditRating {
    const LADDER: [CreditRating; 7] = [
        CreditRating::AAA,
        CreditRating::AA,
        CreditRating::A,
        CreditRating::BBB,
        CreditRating::BB,
        CreditRating::B,
        CreditRating::CCC,
    ];

    fn rank(self) -> usize {
        self as usize
    }

    /// One notch better, saturating at `AAA`.
    pub fn upgrade(self) -> Self {
        Self::LADDER[self.rank().saturating_sub(1)]
    }

    /// One notch worse, saturating at `CCC`.
    pub fn downgrade(self) -> Self {
        Self::LADDER[(self.rank() + 1).min(Self::LADDER.len() - 1)]
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompetitiveStrategy {
    CostLeader,
    Differentiator,
    Focus,
    Hybrid,
}

/// Workforce figures. Salary is annual; periods are months.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HumanResources {
    pub total_employees: u32,
    pub average_salary: Decimal,
    /// Spent every period.
    pub training_budget: Decimal,
    /// In [0, 100].
    pub employee_satisfaction: f64,
    /// Output multiplier; 1.0 is baseline.
    pub productivity: f64,
    /// Share of staff leaving per year.
    pub turnover_rate: f64,
}

impl HumanResources {
    /// Monthly payroll.
    pub fn payroll(&self) -> Decimal {
        Decimal::from(self.total_employees) * self.average_salary / Decimal::from(12)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompanyProfile {
    pub mission_statement: String,
    pub competitive_strategy: CompetitiveStrategy,
    pub human_resources: HumanResources,
}

/// A firm participating in one simulation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Company {
    pub id: CompanyId,
    pub simulation_id: SimulationId,
    pub user_id: UserId,
    pub name: String,
    pub description: String,
    pub logo_url: Option<String>,
    /// Never negative; shortfalls are drawn as liabilities.
    pub cash_balance: Decimal,
    pub total_assets: Decimal,
    pub total_liabilities: Decimal,
    /// Book value of capacity investments.
    #[serde(default)]
    pub fixed_assets: Decimal,
    pub credit_rating: CreditRating,
    /// In [0, 100].
    pub brand_value: f64,
    pub profile: CompanyProfile,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Company {
    /// Liabilities over assets; 1.0 when the company owns nothing.
    pub fn debt_ratio(&self) -> f64 {
        use rust_decimal::prelude::ToPrimitive;
        if self.total_assets <= Decimal::ZERO {
            return 1.0;
        }
        (self.total_liabilities / self.total_assets)
            .to_f64()
            .unwrap_or(1.0)
    }
}
