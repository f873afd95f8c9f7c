use tracing::debug;

use super::types::{
    MonthRecord, MonthValues, PostPayoffPolicy, SimulationInputs, SimulationResult,
    SimulationSummary, SummaryTotals,
};

/// Slack allowed when deciding that a payment covers the remaining balance.
/// Keeps drift in the final scheduled month from leaving a residual balance
/// or pushing it below zero.
const PAYOFF_TOLERANCE: f64 = 1e-4;

#[derive(Debug, Clone, Copy, Default)]
struct LoanStep {
    interest: f64,
    principal: f64,
    paid: f64,
    balance: f64,
    overflow: f64,
}

#[derive(Debug, Clone, Copy, Default)]
struct BaselineMonth {
    balance: f64,
    interest: f64,
    cumulative_interest: f64,
    cumulative_interest_real: f64,
}

#[derive(Debug, Clone, Copy)]
struct AcceleratedMonth {
    payment: f64,
    interest: f64,
    principal: f64,
    extra_payment: f64,
    balance: f64,
    cumulative_interest: f64,
    investment_value: f64,
    investment_yield: f64,
    reinvestment_pile: f64,
    reinvestment_yield: f64,
}

/// Running state of Scenario A's loan and both investment piles.
#[derive(Debug)]
struct Ledger {
    balance: f64,
    total_interest: f64,
    total_interest_real: f64,
    total_paid: f64,
    reinvestment_pile: f64,
    reinvestment_yield: f64,
    investment_value: f64,
    total_invested: f64,
}

impl Ledger {
    fn new(principal: f64) -> Self {
        Self {
            balance: principal,
            total_interest: 0.0,
            total_interest_real: 0.0,
            total_paid: 0.0,
            reinvestment_pile: 0.0,
            reinvestment_yield: 0.0,
            investment_value: 0.0,
            total_invested: 0.0,
        }
    }

    fn advance(
        &mut self,
        inputs: &SimulationInputs,
        scheduled_payment: f64,
        month: u32,
        deflator: f64,
    ) -> AcceleratedMonth {
        let investment_rate = inputs.investment_monthly_rate();
        let lump = inputs.lump_for_month(month);
        let mut step = LoanStep::default();
        let mut extra_payment = 0.0;

        if self.balance > 0.0 {
            extra_payment = inputs.monthly_extra_payment + lump;
            let intended = scheduled_payment + extra_payment;
            step = apply_payment(self.balance, inputs.monthly_rate(), intended);
            self.balance = step.balance;

            // Overflow only rolls into the pile under the reinvest policy.
            if inputs.post_payoff_policy == PostPayoffPolicy::ReinvestPayment && step.overflow > 0.0
            {
                self.reinvestment_pile += step.overflow;
            }

            self.total_interest += step.interest;
            self.total_interest_real += step.interest / deflator;
            self.total_paid += step.paid;
        } else {
            let growth = self.reinvestment_pile * investment_rate;
            self.reinvestment_pile += growth;
            self.reinvestment_yield += growth;

            self.reinvestment_pile += match inputs.post_payoff_policy {
                PostPayoffPolicy::ReinvestPayment => {
                    scheduled_payment + inputs.monthly_extra_payment + lump
                }
                PostPayoffPolicy::FixedContribution(amount) => amount,
            };
        }

        self.investment_value += self.investment_value * investment_rate;
        let contribution = inputs.monthly_extra_payment + lump;
        if contribution > 0.0 {
            self.investment_value += contribution;
            self.total_invested += contribution;
        }

        AcceleratedMonth {
            payment: step.paid,
            interest: step.interest,
            principal: step.principal,
            extra_payment,
            balance: self.balance,
            cumulative_interest: self.total_interest,
            investment_value: self.investment_value,
            investment_yield: self.investment_value - self.total_invested,
            reinvestment_pile: self.reinvestment_pile,
            reinvestment_yield: self.reinvestment_yield,
        }
    }
}

/// Level payment that retires `principal` over `term_years` at the given
/// annual rate. A zero term has no payment; a zero rate divides evenly.
pub fn monthly_payment(principal: f64, annual_rate_percent: f64, term_years: u32) -> f64 {
    let total_months = term_years.saturating_mul(12);
    if total_months == 0 {
        return 0.0;
    }

    let monthly_rate = annual_rate_percent / 100.0 / 12.0;
    if monthly_rate > 0.0 {
        let periods = i32::try_from(total_months).unwrap_or(i32::MAX);
        let growth = (1.0 + monthly_rate).powi(periods);
        if !growth.is_finite() {
            // Limit of the annuity formula as the term grows without bound.
            return principal * monthly_rate;
        }
        principal * monthly_rate * growth / (growth - 1.0)
    } else {
        principal / total_months as f64
    }
}

pub fn simulate(inputs: &SimulationInputs) -> SimulationResult {
    let total_months = inputs.total_months();
    if total_months == 0 {
        return SimulationResult::default();
    }

    let scheduled_payment = monthly_payment(
        inputs.principal,
        inputs.annual_rate_percent,
        inputs.term_years,
    );
    let inflation_rate = inputs.inflation_monthly_rate();
    let baseline = amortize_baseline(inputs, scheduled_payment);

    let mut ledger = Ledger::new(inputs.principal);
    let mut schedule = Vec::with_capacity(total_months as usize);
    for (month, base) in (1..=total_months).zip(&baseline) {
        let deflator = deflator(inflation_rate, month);
        let accelerated = ledger.advance(inputs, scheduled_payment, month, deflator);
        let nominal = combine_month(&accelerated, base);
        schedule.push(MonthRecord {
            month,
            nominal,
            real: nominal.deflate(deflator),
        });
    }

    let payoff_month = find_payoff_month(&schedule).unwrap_or(total_months);
    let final_baseline = baseline.last().copied().unwrap_or_default();
    let summary = summarize(
        &ledger,
        &final_baseline,
        schedule.last().map(|r| r.nominal).unwrap_or_default(),
        deflator(inflation_rate, total_months),
    );

    debug!(
        months = total_months,
        payoff_month,
        monthly_payment = scheduled_payment,
        net_worth_a = summary.nominal.net_worth_a,
        net_worth_b = summary.nominal.net_worth_b,
        "simulation finished"
    );

    SimulationResult {
        monthly_payment: scheduled_payment,
        total_interest: ledger.total_interest,
        total_paid: ledger.total_paid,
        payoff_month,
        schedule,
        summary,
    }
}

fn amortize_baseline(inputs: &SimulationInputs, scheduled_payment: f64) -> Vec<BaselineMonth> {
    let monthly_rate = inputs.monthly_rate();
    let inflation_rate = inputs.inflation_monthly_rate();
    let mut state = BaselineMonth {
        balance: inputs.principal,
        ..BaselineMonth::default()
    };

    (1..=inputs.total_months())
        .map(|month| {
            let step = apply_payment(state.balance, monthly_rate, scheduled_payment);
            state.balance = step.balance;
            state.interest = step.interest;
            state.cumulative_interest += step.interest;
            state.cumulative_interest_real += step.interest / deflator(inflation_rate, month);
            state
        })
        .collect()
}

fn apply_payment(balance: f64, monthly_rate: f64, intended: f64) -> LoanStep {
    if balance <= 0.0 {
        return LoanStep::default();
    }

    let interest = balance * monthly_rate;
    let due = balance + interest;
    if intended + PAYOFF_TOLERANCE >= due {
        LoanStep {
            interest,
            principal: balance,
            paid: due,
            balance: 0.0,
            overflow: (intended - due).max(0.0),
        }
    } else {
        let principal = intended - interest;
        LoanStep {
            interest,
            principal,
            paid: intended,
            balance: balance - principal,
            overflow: 0.0,
        }
    }
}

fn combine_month(accelerated: &AcceleratedMonth, baseline: &BaselineMonth) -> MonthValues {
    MonthValues {
        payment: accelerated.payment,
        interest: accelerated.interest,
        principal: accelerated.principal,
        extra_payment: accelerated.extra_payment,
        remaining_balance: accelerated.balance,
        cumulative_interest: accelerated.cumulative_interest,
        baseline_balance: baseline.balance,
        baseline_interest: baseline.interest,
        baseline_cumulative_interest: baseline.cumulative_interest,
        investment_value: accelerated.investment_value,
        investment_yield: accelerated.investment_yield,
        reinvestment_yield: accelerated.reinvestment_yield,
        cumulative_interest_saved: (baseline.cumulative_interest
            - accelerated.cumulative_interest)
            .max(0.0),
        net_worth_a: accelerated.reinvestment_pile - accelerated.balance,
        net_worth_b: accelerated.investment_value - baseline.balance,
    }
}

fn summarize(
    ledger: &Ledger,
    baseline: &BaselineMonth,
    last: MonthValues,
    final_deflator: f64,
) -> SimulationSummary {
    let nominal = SummaryTotals {
        total_invested: ledger.total_invested,
        investment_value: ledger.investment_value,
        investment_yield: ledger.investment_value - ledger.total_invested,
        total_interest: ledger.total_interest,
        baseline_total_interest: baseline.cumulative_interest,
        interest_saved: (baseline.cumulative_interest - ledger.total_interest).max(0.0),
        reinvestment_value: ledger.reinvestment_pile,
        reinvestment_yield: ledger.reinvestment_yield,
        net_worth_a: last.net_worth_a,
        net_worth_b: last.net_worth_b,
    };

    let real = SummaryTotals {
        total_invested: nominal.total_invested / final_deflator,
        investment_value: nominal.investment_value / final_deflator,
        investment_yield: nominal.investment_yield / final_deflator,
        total_interest: ledger.total_interest_real,
        baseline_total_interest: baseline.cumulative_interest_real,
        interest_saved: (baseline.cumulative_interest_real - ledger.total_interest_real).max(0.0),
        reinvestment_value: nominal.reinvestment_value / final_deflator,
        reinvestment_yield: nominal.reinvestment_yield / final_deflator,
        net_worth_a: nominal.net_worth_a / final_deflator,
        net_worth_b: nominal.net_worth_b / final_deflator,
    };

    SimulationSummary { nominal, real }
}

fn find_payoff_month(schedule: &[MonthRecord]) -> Option<u32> {
    schedule
        .iter()
        .find(|record| record.nominal.remaining_balance == 0.0)
        .map(|record| record.month)
}

fn deflator(inflation_monthly_rate: f64, month: u32) -> f64 {
    (1.0 + inflation_monthly_rate).powi(i32::try_from(month).unwrap_or(i32::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::LumpSum;
    use proptest::prelude::{prop_assert, prop_assert_eq, proptest};

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn assert_approx_tol(actual: f64, expected: f64, tol: f64) {
        assert!(
            (actual - expected).abs() <= tol,
            "expected {expected}, got {actual}, tolerance {tol}"
        );
    }

    fn sample_inputs() -> SimulationInputs {
        SimulationInputs {
            principal: 300_000.0,
            annual_rate_percent: 5.5,
            term_years: 30,
            monthly_extra_payment: 200.0,
            investment_return_percent: 7.0,
            inflation_percent: 2.5,
            one_time_payment: None,
            post_payoff_policy: PostPayoffPolicy::ReinvestPayment,
        }
    }

    fn plain_inputs() -> SimulationInputs {
        let mut inputs = sample_inputs();
        inputs.monthly_extra_payment = 0.0;
        inputs.one_time_payment = None;
        inputs
    }

    fn assert_schedule_invariants(inputs: &SimulationInputs, result: &SimulationResult) {
        let inflation_rate = inputs.inflation_monthly_rate();
        let mut prev: Option<&MonthValues> = None;
        for record in &result.schedule {
            let row = &record.nominal;
            assert!(row.remaining_balance >= 0.0, "month {}", record.month);
            assert!(row.baseline_balance >= 0.0, "month {}", record.month);
            assert!(row.remaining_balance <= inputs.principal + EPS);
            assert!(row.cumulative_interest_saved >= 0.0);

            if let Some(prev) = prev {
                assert!(row.remaining_balance <= prev.remaining_balance);
                assert!(row.baseline_balance <= prev.baseline_balance);
                assert!(row.cumulative_interest >= prev.cumulative_interest);
                assert!(row.baseline_cumulative_interest >= prev.baseline_cumulative_interest);
                assert!(row.investment_value >= prev.investment_value);
                if prev.remaining_balance == 0.0 {
                    assert_eq!(row.remaining_balance, 0.0);
                }
            }

            let factor = deflator(inflation_rate, record.month);
            assert_approx_tol(
                record.real.net_worth_a,
                row.net_worth_a / factor,
                1e-9 * row.net_worth_a.abs().max(1.0),
            );
            prev = Some(row);
        }
    }

    #[test]
    fn monthly_payment_matches_standard_annuity() {
        assert_approx_tol(monthly_payment(300_000.0, 5.5, 30), 1703.37, 0.01);
        assert_approx_tol(monthly_payment(100_000.0, 12.0, 1), 8884.88, 0.01);
    }

    #[test]
    fn monthly_payment_zero_rate_divides_evenly() {
        assert_approx(monthly_payment(120_000.0, 0.0, 10), 1_000.0);
    }

    #[test]
    fn monthly_payment_zero_term_is_zero() {
        assert_eq!(monthly_payment(120_000.0, 5.0, 0), 0.0);
    }

    #[test]
    fn zero_term_returns_empty_result() {
        let mut inputs = sample_inputs();
        inputs.term_years = 0;

        let result = simulate(&inputs);
        assert_eq!(result, SimulationResult::default());
        assert!(result.schedule.is_empty());
        assert_eq!(result.payoff_month, 0);
        assert_eq!(result.summary.nominal, SummaryTotals::default());
        assert_eq!(result.summary.real, SummaryTotals::default());
    }

    #[test]
    fn reference_mortgage_retires_early_and_both_scenarios_end_positive() {
        let inputs = sample_inputs();
        let result = simulate(&inputs);

        assert_eq!(result.schedule.len(), 360);
        assert_approx_tol(result.monthly_payment, 1703.37, 0.01);
        assert!(result.payoff_month < 360);
        assert_eq!(
            result.schedule[result.payoff_month as usize - 1]
                .nominal
                .remaining_balance,
            0.0
        );
        assert!(
            result.schedule[result.payoff_month as usize - 2]
                .nominal
                .remaining_balance
                > 0.0
        );

        let summary = result.summary;
        for value in [
            summary.nominal.net_worth_a,
            summary.nominal.net_worth_b,
            summary.real.net_worth_a,
            summary.real.net_worth_b,
        ] {
            assert!(value.is_finite() && value > 0.0, "got {value}");
        }
        assert!(summary.nominal.interest_saved > 0.0);
        assert!(summary.nominal.reinvestment_yield > 0.0);
        assert_approx(summary.nominal.total_invested, 200.0 * 360.0);
        assert_schedule_invariants(&inputs, &result);
    }

    #[test]
    fn no_extra_payments_track_the_baseline_exactly() {
        let inputs = plain_inputs();
        let result = simulate(&inputs);

        assert_eq!(result.payoff_month, 360);
        for record in &result.schedule {
            let row = &record.nominal;
            assert_eq!(row.remaining_balance, row.baseline_balance);
            assert_eq!(row.interest, row.baseline_interest);
            assert_eq!(row.cumulative_interest, row.baseline_cumulative_interest);
            assert_eq!(row.cumulative_interest_saved, 0.0);
            assert_eq!(row.extra_payment, 0.0);
        }
        assert_eq!(result.schedule[359].nominal.remaining_balance, 0.0);
        assert!(result.schedule[358].nominal.remaining_balance > 0.0);
        assert_approx_tol(result.total_paid, result.monthly_payment * 360.0, 1e-3);
    }

    #[test]
    fn zero_rate_charges_no_interest() {
        let mut inputs = sample_inputs();
        inputs.annual_rate_percent = 0.0;
        inputs.principal = 120_000.0;
        inputs.term_years = 10;

        let result = simulate(&inputs);
        assert_approx(result.monthly_payment, 1_000.0);
        assert_eq!(result.total_interest, 0.0);
        for record in &result.schedule {
            let row = &record.nominal;
            assert_eq!(row.interest, 0.0);
            assert_eq!(row.baseline_interest, 0.0);
            assert!(!row.payment.is_nan());
            assert_eq!(row.principal, row.payment);
        }
        // 1200 per month retires 120000 in 100 months.
        assert_eq!(result.payoff_month, 100);
    }

    #[test]
    fn lump_sum_shortens_payoff_and_cuts_interest() {
        let without = simulate(&sample_inputs());

        let mut inputs = sample_inputs();
        inputs.one_time_payment = Some(LumpSum {
            amount: 50_000.0,
            month: 12,
        });
        let with = simulate(&inputs);

        assert!(with.payoff_month < without.payoff_month);
        assert!(
            with.schedule[359].nominal.cumulative_interest
                < without.schedule[359].nominal.cumulative_interest
        );
        assert_approx(with.schedule[11].nominal.extra_payment, 50_200.0);
        assert_approx(
            with.summary.nominal.total_invested - without.summary.nominal.total_invested,
            50_000.0,
        );
        assert_schedule_invariants(&inputs, &with);
    }

    #[test]
    fn lump_outside_term_is_never_applied() {
        let reference = simulate(&sample_inputs());
        for month in [0, 361, 10_000] {
            let mut inputs = sample_inputs();
            inputs.one_time_payment = Some(LumpSum {
                amount: 50_000.0,
                month,
            });
            assert_eq!(simulate(&inputs), reference, "lump month {month}");
        }

        let mut inputs = sample_inputs();
        inputs.one_time_payment = Some(LumpSum {
            amount: 0.0,
            month: 12,
        });
        assert_eq!(simulate(&inputs), reference);
    }

    #[test]
    fn oracle_short_loan_matches_hand_calculation() {
        let inputs = SimulationInputs {
            principal: 1_200.0,
            annual_rate_percent: 0.0,
            term_years: 1,
            monthly_extra_payment: 100.0,
            investment_return_percent: 12.0,
            inflation_percent: 0.0,
            one_time_payment: None,
            post_payoff_policy: PostPayoffPolicy::ReinvestPayment,
        };

        // Scheduled payment is 100, so 200 a month clears 1200 in month 6.
        // Reinvestment pile, months 7-12, yield then +200:
        //   200, 402, 606.02, 812.0802, 1020.201002, 1230.40301202
        // Invest-the-difference pile: 100 * (1.01^12 - 1) / 0.01
        let result = simulate(&inputs);
        assert_approx(result.monthly_payment, 100.0);
        assert_eq!(result.payoff_month, 6);
        assert_approx(result.total_paid, 1_200.0);
        assert_eq!(result.total_interest, 0.0);

        let summary = result.summary.nominal;
        assert_approx(summary.reinvestment_value, 1_230.403_012_02);
        assert_approx(summary.reinvestment_yield, 30.403_012_02);
        assert_approx(summary.net_worth_a, 1_230.403_012_02);

        let expected_b = 100.0 * (1.01_f64.powi(12) - 1.0) / 0.01;
        assert_approx(summary.investment_value, expected_b);
        assert_approx(summary.net_worth_b, expected_b);
        assert_approx(summary.total_invested, 1_200.0);
        assert_approx(summary.investment_yield, expected_b - 1_200.0);

        // No yield in the month a contribution lands.
        assert_approx(result.schedule[0].nominal.investment_value, 100.0);
        assert_approx(result.schedule[6].nominal.reinvestment_yield, 0.0);
        assert_approx(result.schedule[7].nominal.reinvestment_yield, 2.0);

        // Baseline takes the full term at 100 a month.
        assert_approx(result.schedule[5].nominal.baseline_balance, 600.0);
        assert_eq!(result.schedule[11].nominal.baseline_balance, 0.0);
    }

    fn short_loan_with_lump(month: u32, policy: PostPayoffPolicy) -> SimulationInputs {
        SimulationInputs {
            principal: 1_200.0,
            annual_rate_percent: 0.0,
            term_years: 1,
            monthly_extra_payment: 100.0,
            investment_return_percent: 12.0,
            inflation_percent: 0.0,
            one_time_payment: Some(LumpSum { amount: 500.0, month }),
            post_payoff_policy: policy,
        }
    }

    #[test]
    fn lump_after_payoff_lands_in_both_piles() {
        let without = simulate(&short_loan_with_lump(0, PostPayoffPolicy::ReinvestPayment));
        let with = simulate(&short_loan_with_lump(9, PostPayoffPolicy::ReinvestPayment));

        // Loan is gone in month 6, so the month 9 lump never touches it.
        assert_eq!(with.payoff_month, 6);
        assert_approx(with.total_paid, 1_200.0);
        assert_eq!(with.schedule[8].nominal.extra_payment, 0.0);

        // Month 9 pile: 402 * 1.01 + 200 + 500, then three months of yield.
        assert_approx(with.schedule[8].nominal.net_worth_a, 1_106.02);
        let compounded = 500.0 * 1.01_f64.powi(3);
        assert_approx(with.summary.nominal.reinvestment_value, 1_230.403_012_02 + compounded);
        assert_approx(
            with.summary.nominal.reinvestment_value - without.summary.nominal.reinvestment_value,
            compounded,
        );
        assert_approx(
            with.summary.nominal.investment_value - without.summary.nominal.investment_value,
            compounded,
        );
        assert_approx(
            with.summary.nominal.total_invested - without.summary.nominal.total_invested,
            500.0,
        );
    }

    #[test]
    fn lump_after_payoff_skips_fixed_contribution_pile() {
        let policy = PostPayoffPolicy::FixedContribution(200.0);
        let without = simulate(&short_loan_with_lump(0, policy));
        let with = simulate(&short_loan_with_lump(9, policy));

        assert_eq!(with.payoff_month, 6);
        assert_approx(with.summary.nominal.reinvestment_value, 1_230.403_012_02);
        assert_eq!(
            with.summary.nominal.reinvestment_value,
            without.summary.nominal.reinvestment_value
        );
        // Scenario B still invests the lump.
        assert_approx(
            with.summary.nominal.investment_value - without.summary.nominal.investment_value,
            500.0 * 1.01_f64.powi(3),
        );
    }

    #[test]
    fn monthly_payment_falls_back_to_interest_when_growth_overflows() {
        let payment = monthly_payment(100_000.0, 1_000.0, 100_000);
        assert!(payment.is_finite());
        assert_approx(payment, 100_000.0 * 10.0 / 12.0);
    }

    #[test]
    fn longest_term_at_highest_rates_stays_finite() {
        let mut inputs = sample_inputs();
        inputs.term_years = crate::core::MAX_TERM_YEARS;
        inputs.annual_rate_percent = crate::core::MAX_RATE_PERCENT;
        inputs.investment_return_percent = crate::core::MAX_RATE_PERCENT;
        inputs.inflation_percent = crate::core::MAX_RATE_PERCENT;
        assert!(inputs.validate().is_ok());

        let result = simulate(&inputs);
        assert!(result.monthly_payment.is_finite());
        assert_eq!(result.schedule.len(), 1_200);
        for record in &result.schedule {
            for row in [&record.nominal, &record.real] {
                assert!(row.remaining_balance.is_finite() && row.remaining_balance >= 0.0);
                assert!(row.baseline_balance.is_finite() && row.baseline_balance >= 0.0);
                assert!(row.investment_value.is_finite());
                assert!(row.net_worth_a.is_finite());
                assert!(row.net_worth_b.is_finite());
            }
        }
        assert!(result.summary.nominal.net_worth_a.is_finite());
        assert!(result.summary.real.net_worth_b.is_finite());
    }

    #[test]
    fn payoff_month_pays_only_what_is_owed() {
        let inputs = sample_inputs();
        let result = simulate(&inputs);
        let payoff = result.payoff_month as usize;
        let before = result.schedule[payoff - 2].nominal;
        let last = result.schedule[payoff - 1].nominal;

        assert_approx(last.principal, before.remaining_balance);
        assert_approx(last.payment, before.remaining_balance + last.interest);
        assert!(last.payment <= result.monthly_payment + inputs.monthly_extra_payment + 1e-3);

        let after = result.schedule[payoff].nominal;
        assert_eq!(after.payment, 0.0);
        assert_eq!(after.interest, 0.0);
        assert_eq!(after.extra_payment, 0.0);
    }

    #[test]
    fn payoff_overflow_rolls_into_reinvestment_pile() {
        let mut inputs = SimulationInputs {
            principal: 1_000.0,
            annual_rate_percent: 0.0,
            term_years: 1,
            monthly_extra_payment: 0.0,
            investment_return_percent: 0.0,
            inflation_percent: 0.0,
            one_time_payment: Some(LumpSum {
                amount: 950.0,
                month: 1,
            }),
            post_payoff_policy: PostPayoffPolicy::ReinvestPayment,
        };

        let result = simulate(&inputs);
        let payment = 1_000.0 / 12.0;
        assert_eq!(result.payoff_month, 1);
        assert_approx(result.schedule[0].nominal.payment, 1_000.0);
        // Month one overflow is payment + 950 - 1000, then 11 more payments.
        assert_approx(result.schedule[0].nominal.net_worth_a, payment - 50.0);
        assert_approx(result.summary.nominal.net_worth_a, 950.0);
        assert_approx(result.summary.nominal.net_worth_b, 950.0);

        inputs.post_payoff_policy = PostPayoffPolicy::FixedContribution(10.0);
        let fixed = simulate(&inputs);
        assert_approx(fixed.schedule[0].nominal.net_worth_a, 0.0);
        assert_approx(fixed.summary.nominal.net_worth_a, 110.0);
        assert_approx(fixed.summary.nominal.reinvestment_value, 110.0);
    }

    #[test]
    fn fixed_contribution_ignores_freed_payment() {
        let mut reinvest_inputs = sample_inputs();
        reinvest_inputs.investment_return_percent = 0.0;
        let reinvest = simulate(&reinvest_inputs);

        let mut inputs = reinvest_inputs.clone();
        inputs.post_payoff_policy = PostPayoffPolicy::FixedContribution(500.0);
        let fixed = simulate(&inputs);

        assert_eq!(fixed.payoff_month, reinvest.payoff_month);
        let months_after = (360 - fixed.payoff_month) as f64;
        assert_approx_tol(
            fixed.summary.nominal.reinvestment_value,
            500.0 * months_after,
            1e-6,
        );
        assert!(
            fixed.summary.nominal.reinvestment_value < reinvest.summary.nominal.reinvestment_value
        );
        // Scenario B does not depend on the post-payoff policy.
        assert_eq!(
            fixed.summary.nominal.net_worth_b,
            reinvest.summary.nominal.net_worth_b
        );
    }

    #[test]
    fn real_values_are_nominal_deflated_by_month() {
        let inputs = sample_inputs();
        let result = simulate(&inputs);
        let rate = inputs.inflation_monthly_rate();

        for record in &result.schedule {
            let factor = (1.0 + rate).powi(record.month as i32);
            assert_eq!(record.real, record.nominal.deflate(factor));
            assert_approx_tol(
                record.real.investment_value * factor,
                record.nominal.investment_value,
                1e-6,
            );
        }

        let final_factor = (1.0 + rate).powi(360);
        let summary = result.summary;
        assert_approx(
            summary.real.net_worth_a,
            summary.nominal.net_worth_a / final_factor,
        );
        assert_approx(
            summary.real.net_worth_b,
            summary.nominal.net_worth_b / final_factor,
        );
        // Real interest is paid over time, so it sits between the two deflations.
        assert!(summary.real.total_interest < summary.nominal.total_interest);
        assert!(summary.real.total_interest > summary.nominal.total_interest / final_factor);
    }

    #[test]
    fn zero_inflation_real_equals_nominal() {
        let mut inputs = sample_inputs();
        inputs.inflation_percent = 0.0;
        let result = simulate(&inputs);

        for record in &result.schedule {
            assert_eq!(record.real, record.nominal);
        }
        assert_approx(
            result.summary.real.total_interest,
            result.summary.nominal.total_interest,
        );
    }

    #[test]
    fn reruns_are_identical() {
        let inputs = sample_inputs();
        assert_eq!(simulate(&inputs), simulate(&inputs));
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(32))]

        #[test]
        fn prop_schedule_invariants_hold(
            principal in 1_000u32..1_000_000,
            rate_bp in 0u32..1500,
            years in 1u32..41,
            extra in 0u32..3_000,
            investment_bp in 0u32..1200,
            inflation_bp in 0u32..800,
            lump_amount in 0u32..200_000,
            lump_month in 0u32..500,
            reinvest in proptest::bool::ANY,
            fixed_amount in 0u32..5_000
        ) {
            let inputs = SimulationInputs {
                principal: principal as f64,
                annual_rate_percent: rate_bp as f64 / 100.0,
                term_years: years,
                monthly_extra_payment: extra as f64,
                investment_return_percent: investment_bp as f64 / 100.0,
                inflation_percent: inflation_bp as f64 / 100.0,
                one_time_payment: Some(LumpSum {
                    amount: lump_amount as f64,
                    month: lump_month,
                }),
                post_payoff_policy: if reinvest {
                    PostPayoffPolicy::ReinvestPayment
                } else {
                    PostPayoffPolicy::FixedContribution(fixed_amount as f64)
                },
            };

            let result = simulate(&inputs);
            prop_assert_eq!(result.schedule.len() as u32, years * 12);
            prop_assert!(result.payoff_month >= 1);
            prop_assert!(result.payoff_month <= years * 12);
            prop_assert!(result.monthly_payment.is_finite());
            prop_assert!(result.summary.nominal.net_worth_a.is_finite());
            prop_assert!(result.summary.nominal.net_worth_b.is_finite());
            prop_assert!(result.summary.nominal.interest_saved >= 0.0);
            prop_assert_eq!(result.schedule.last().map(|r| r.nominal.baseline_balance), Some(0.0));
            assert_schedule_invariants(&inputs, &result);
        }
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(24))]

        #[test]
        fn prop_no_extra_matches_baseline_and_runs_full_term(
            principal in 1_000u32..1_000_000,
            rate_bp in 0u32..1500,
            years in 1u32..41,
            inflation_bp in 0u32..800
        ) {
            let mut inputs = plain_inputs();
            inputs.principal = principal as f64;
            inputs.annual_rate_percent = rate_bp as f64 / 100.0;
            inputs.term_years = years;
            inputs.inflation_percent = inflation_bp as f64 / 100.0;

            let result = simulate(&inputs);
            prop_assert_eq!(result.payoff_month, years * 12);
            for record in &result.schedule {
                prop_assert_eq!(record.nominal.remaining_balance, record.nominal.baseline_balance);
                prop_assert_eq!(
                    record.nominal.cumulative_interest,
                    record.nominal.baseline_cumulative_interest
                );
            }
        }
    }
}
