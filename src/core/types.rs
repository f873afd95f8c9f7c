use serde::Serialize;
use thiserror::Error;

/// What happens to the freed-up cash flow once the accelerated loan is retired.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum PostPayoffPolicy {
    /// Keep paying the scheduled payment plus the monthly extra, into the pile.
    ReinvestPayment,
    /// Contribute a fixed custom amount each month instead.
    FixedContribution(f64),
}

/// Longest accepted term. Keeps every compounding factor finite.
pub const MAX_TERM_YEARS: u32 = 100;

/// Ceiling on any annual percentage input.
pub const MAX_RATE_PERCENT: f64 = 100.0;

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LumpSum {
    pub amount: f64,
    /// 1-indexed month the lump lands in.
    pub month: u32,
}

#[derive(Debug, Clone)]
pub struct SimulationInputs {
    pub principal: f64,
    pub annual_rate_percent: f64,
    pub term_years: u32,
    pub monthly_extra_payment: f64,
    pub investment_return_percent: f64,
    pub inflation_percent: f64,
    pub one_time_payment: Option<LumpSum>,
    pub post_payoff_policy: PostPayoffPolicy,
}

impl SimulationInputs {
    pub fn total_months(&self) -> u32 {
        self.term_years.saturating_mul(12)
    }

    pub fn monthly_rate(&self) -> f64 {
        self.annual_rate_percent / 100.0 / 12.0
    }

    pub fn investment_monthly_rate(&self) -> f64 {
        self.investment_return_percent / 100.0 / 12.0
    }

    pub fn inflation_monthly_rate(&self) -> f64 {
        self.inflation_percent / 100.0 / 12.0
    }

    /// Lump amount landing in `month`, zero for every other month.
    pub fn lump_for_month(&self, month: u32) -> f64 {
        match self.one_time_payment {
            Some(lump) if lump.month == month && lump.amount > 0.0 => lump.amount,
            _ => 0.0,
        }
    }

    /// Checks the ranges the engine assumes. The engine itself stays permissive,
    /// so this is only called at the CLI and HTTP boundary.
    pub fn validate(&self) -> Result<(), InvalidInputError> {
        if !self.principal.is_finite() || self.principal <= 0.0 {
            return Err(InvalidInputError::NonPositive("--principal"));
        }
        if self.term_years == 0 {
            return Err(InvalidInputError::NonPositive("--years"));
        }
        if self.term_years > MAX_TERM_YEARS {
            return Err(InvalidInputError::AboveMax {
                name: "--years",
                max: f64::from(MAX_TERM_YEARS),
            });
        }
        check_non_negative("--extra-payment", self.monthly_extra_payment)?;
        for (name, value) in [
            ("--rate", self.annual_rate_percent),
            ("--investment-rate", self.investment_return_percent),
            ("--inflation-rate", self.inflation_percent),
        ] {
            check_non_negative(name, value)?;
            if value > MAX_RATE_PERCENT {
                return Err(InvalidInputError::AboveMax {
                    name,
                    max: MAX_RATE_PERCENT,
                });
            }
        }
        // A lump month outside the term is accepted and never applied.
        if let Some(lump) = self.one_time_payment {
            check_non_negative("--one-time-payment-amount", lump.amount)?;
        }
        if let PostPayoffPolicy::FixedContribution(amount) = self.post_payoff_policy {
            check_non_negative("--post-payoff-investment-amount", amount)?;
        }
        Ok(())
    }
}

fn check_non_negative(name: &'static str, value: f64) -> Result<(), InvalidInputError> {
    if !value.is_finite() {
        return Err(InvalidInputError::NotFinite(name));
    }
    if value < 0.0 {
        return Err(InvalidInputError::Negative(name));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvalidInputError {
    #[error("{0} must be > 0")]
    NonPositive(&'static str),
    #[error("{0} must be >= 0")]
    Negative(&'static str),
    #[error("{0} must be a finite number")]
    NotFinite(&'static str),
    #[error("{name} must be <= {max}")]
    AboveMax { name: &'static str, max: f64 },
}

/// Money fields of one schedule row. The same shape carries nominal and
/// inflation-deflated figures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthValues {
    pub payment: f64,
    pub interest: f64,
    pub principal: f64,
    pub extra_payment: f64,
    pub remaining_balance: f64,
    pub cumulative_interest: f64,
    pub baseline_balance: f64,
    pub baseline_interest: f64,
    pub baseline_cumulative_interest: f64,
    pub investment_value: f64,
    pub investment_yield: f64,
    pub reinvestment_yield: f64,
    pub cumulative_interest_saved: f64,
    pub net_worth_a: f64,
    pub net_worth_b: f64,
}

impl MonthValues {
    pub fn deflate(&self, factor: f64) -> Self {
        Self {
            payment: self.payment / factor,
            interest: self.interest / factor,
            principal: self.principal / factor,
            extra_payment: self.extra_payment / factor,
            remaining_balance: self.remaining_balance / factor,
            cumulative_interest: self.cumulative_interest / factor,
            baseline_balance: self.baseline_balance / factor,
            baseline_interest: self.baseline_interest / factor,
            baseline_cumulative_interest: self.baseline_cumulative_interest / factor,
            investment_value: self.investment_value / factor,
            investment_yield: self.investment_yield / factor,
            reinvestment_yield: self.reinvestment_yield / factor,
            cumulative_interest_saved: self.cumulative_interest_saved / factor,
            net_worth_a: self.net_worth_a / factor,
            net_worth_b: self.net_worth_b / factor,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthRecord {
    pub month: u32,
    pub nominal: MonthValues,
    pub real: MonthValues,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryTotals {
    pub total_invested: f64,
    pub investment_value: f64,
    pub investment_yield: f64,
    pub total_interest: f64,
    pub baseline_total_interest: f64,
    pub interest_saved: f64,
    pub reinvestment_value: f64,
    pub reinvestment_yield: f64,
    pub net_worth_a: f64,
    pub net_worth_b: f64,
}

/// Final totals. In `real`, the interest figures are sums of each month's
/// deflated interest; everything else is deflated by the final month's factor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationSummary {
    pub nominal: SummaryTotals,
    pub real: SummaryTotals,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationResult {
    pub monthly_payment: f64,
    pub total_interest: f64,
    pub total_paid: f64,
    pub payoff_month: u32,
    pub schedule: Vec<MonthRecord>,
    pub summary: SimulationSummary,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartValues {
    pub remaining_balance: f64,
    pub baseline_balance: f64,
    pub investment_value: f64,
    pub net_worth_a: f64,
    pub net_worth_b: f64,
}

impl From<&MonthValues> for ChartValues {
    fn from(values: &MonthValues) -> Self {
        Self {
            remaining_balance: values.remaining_balance,
            baseline_balance: values.baseline_balance,
            investment_value: values.investment_value,
            net_worth_a: values.net_worth_a,
            net_worth_b: values.net_worth_b,
        }
    }
}

/// One point of the yearly chart series.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearPoint {
    pub label: String,
    pub month: u32,
    pub nominal: ChartValues,
    pub real: ChartValues,
}
