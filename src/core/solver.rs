use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use super::{MAX_RATE_PERCENT, SimulationInputs, simulate};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum GoalType {
    /// Smallest monthly extra payment that retires the loan by the target month.
    #[serde(rename_all = "camelCase")]
    RequiredExtraPayment { target_payoff_month: u32 },
    /// Investment return (percent) at which both strategies end with equal net worth.
    BreakEvenReturn,
}

#[derive(Debug, Clone, Copy)]
pub struct GoalSolveConfig {
    pub goal_type: GoalType,
    pub search_min: f64,
    pub search_max: f64,
    pub tolerance: f64,
    pub max_iterations: u32,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalSolveIteration {
    pub iteration: u32,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub candidate_value: f64,
    pub payoff_month: u32,
    pub net_worth_gap: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalSolveResult {
    pub goal_type: GoalType,
    pub search_min: f64,
    pub search_max: f64,
    pub tolerance: f64,
    pub max_iterations: u32,
    pub solved_value: Option<f64>,
    pub achieved_payoff_month: Option<u32>,
    pub achieved_net_worth_gap: Option<f64>,
    pub iterations: Vec<GoalSolveIteration>,
    pub converged: bool,
    pub feasible: bool,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GoalSolveError {
    #[error("targetPayoffMonth must be between 1 and {total_months}")]
    TargetOutOfRange { total_months: u32 },
    #[error("search bounds must be finite")]
    NonFiniteBounds,
    #[error("searchMax must be greater than searchMin")]
    EmptySearchRange,
    #[error("searchMin must be >= 0")]
    NegativeSearchMin,
    #[error("tolerance must be > 0")]
    NonPositiveTolerance,
    #[error("maxIterations must be > 0")]
    NoIterations,
    #[error("maxIterations must be <= {max}")]
    TooManyIterations { max: u32 },
    #[error("searchMax must be <= {max} for a return search")]
    ReturnSearchTooHigh { max: f64 },
}

/// Bisection halves the bracket each step, so this is far past any useful depth.
pub const MAX_SOLVE_ITERATIONS: u32 = 200;

#[derive(Debug, Clone, Copy)]
struct CandidateEval {
    payoff_month: u32,
    /// Final net worth A minus final net worth B.
    net_worth_gap: f64,
}

pub fn solve_goal(
    inputs: &SimulationInputs,
    config: GoalSolveConfig,
) -> Result<GoalSolveResult, GoalSolveError> {
    validate_config(inputs, config)?;

    let mut iterations = Vec::with_capacity(config.max_iterations as usize);
    let low_eval = evaluate_candidate(inputs, config.goal_type, config.search_min);
    let high_eval = evaluate_candidate(inputs, config.goal_type, config.search_max);

    let mut solved_value = None;
    let mut converged = false;
    let feasible;
    let message;

    match config.goal_type {
        GoalType::RequiredExtraPayment {
            target_payoff_month,
        } => {
            let meets = |eval: CandidateEval| eval.payoff_month <= target_payoff_month;
            if meets(low_eval) {
                solved_value = Some(config.search_min);
                converged = true;
                feasible = true;
                message = "Already retires the loan by the target at the lower bound.".to_string();
            } else if !meets(high_eval) {
                feasible = false;
                message = "No extra payment within the search bounds meets the target.".to_string();
            } else {
                let mut lo = config.search_min;
                let mut hi = config.search_max;
                let mut it = 0;
                while it < config.max_iterations {
                    it += 1;
                    let mid = (lo + hi) * 0.5;
                    let eval = evaluate_candidate(inputs, config.goal_type, mid);
                    iterations.push(iteration_record(it, lo, hi, mid, eval));

                    if meets(eval) {
                        hi = mid;
                    } else {
                        lo = mid;
                    }

                    if (hi - lo).abs() <= config.tolerance {
                        converged = true;
                        solved_value = Some(hi);
                        break;
                    }
                }
                if solved_value.is_none() {
                    solved_value = Some(hi);
                }
                feasible = true;
                message = if converged {
                    "Solved required extra payment.".to_string()
                } else {
                    "Reached max iterations before tolerance was met; returning best estimate."
                        .to_string()
                };
            }
        }
        GoalType::BreakEvenReturn => {
            let pay_down_wins = |eval: CandidateEval| eval.net_worth_gap >= 0.0;
            if pay_down_wins(low_eval) == pay_down_wins(high_eval) {
                feasible = false;
                message = if pay_down_wins(low_eval) {
                    "Paying down the loan wins across the whole search range.".to_string()
                } else {
                    "Investing the difference wins across the whole search range.".to_string()
                };
            } else {
                let mut lo = config.search_min;
                let mut hi = config.search_max;
                let low_side = pay_down_wins(low_eval);
                let mut it = 0;
                while it < config.max_iterations {
                    it += 1;
                    let mid = (lo + hi) * 0.5;
                    let eval = evaluate_candidate(inputs, config.goal_type, mid);
                    iterations.push(iteration_record(it, lo, hi, mid, eval));

                    if pay_down_wins(eval) == low_side {
                        lo = mid;
                    } else {
                        hi = mid;
                    }

                    if (hi - lo).abs() <= config.tolerance {
                        converged = true;
                        break;
                    }
                }
                solved_value = Some((lo + hi) * 0.5);
                feasible = true;
                message = if converged {
                    "Solved break-even investment return.".to_string()
                } else {
                    "Reached max iterations before tolerance was met; returning best estimate."
                        .to_string()
                };
            }
        }
    }

    let mut achieved_payoff_month = None;
    let mut achieved_net_worth_gap = None;
    if let Some(value) = solved_value {
        let final_eval = evaluate_candidate(inputs, config.goal_type, value);
        achieved_payoff_month = Some(final_eval.payoff_month);
        achieved_net_worth_gap = Some(final_eval.net_worth_gap);
    }

    debug!(
        iterations = iterations.len(),
        feasible,
        converged,
        solved_value = ?solved_value,
        "goal solve finished"
    );

    Ok(GoalSolveResult {
        goal_type: config.goal_type,
        search_min: config.search_min,
        search_max: config.search_max,
        tolerance: config.tolerance,
        max_iterations: config.max_iterations,
        solved_value,
        achieved_payoff_month,
        achieved_net_worth_gap,
        iterations,
        converged,
        feasible,
        message,
    })
}

fn iteration_record(
    iteration: u32,
    lower_bound: f64,
    upper_bound: f64,
    candidate_value: f64,
    eval: CandidateEval,
) -> GoalSolveIteration {
    GoalSolveIteration {
        iteration,
        lower_bound,
        upper_bound,
        candidate_value,
        payoff_month: eval.payoff_month,
        net_worth_gap: eval.net_worth_gap,
    }
}

fn evaluate_candidate(
    base_inputs: &SimulationInputs,
    goal_type: GoalType,
    candidate_value: f64,
) -> CandidateEval {
    let mut inputs = base_inputs.clone();
    match goal_type {
        GoalType::RequiredExtraPayment { .. } => {
            inputs.monthly_extra_payment = candidate_value.max(0.0);
        }
        GoalType::BreakEvenReturn => {
            inputs.investment_return_percent = candidate_value.max(0.0);
        }
    }

    let result = simulate(&inputs);
    CandidateEval {
        payoff_month: result.payoff_month,
        net_worth_gap: result.summary.nominal.net_worth_a - result.summary.nominal.net_worth_b,
    }
}

fn validate_config(
    inputs: &SimulationInputs,
    config: GoalSolveConfig,
) -> Result<(), GoalSolveError> {
    if let GoalType::RequiredExtraPayment {
        target_payoff_month,
    } = config.goal_type
    {
        let total_months = inputs.total_months();
        if target_payoff_month == 0 || target_payoff_month > total_months {
            return Err(GoalSolveError::TargetOutOfRange { total_months });
        }
    }
    if !config.search_min.is_finite() || !config.search_max.is_finite() {
        return Err(GoalSolveError::NonFiniteBounds);
    }
    if config.search_min < 0.0 {
        return Err(GoalSolveError::NegativeSearchMin);
    }
    if config.search_max <= config.search_min {
        return Err(GoalSolveError::EmptySearchRange);
    }
    if !config.tolerance.is_finite() || config.tolerance <= 0.0 {
        return Err(GoalSolveError::NonPositiveTolerance);
    }
    if config.max_iterations == 0 {
        return Err(GoalSolveError::NoIterations);
    }
    if config.max_iterations > MAX_SOLVE_ITERATIONS {
        return Err(GoalSolveError::TooManyIterations {
            max: MAX_SOLVE_ITERATIONS,
        });
    }
    if config.goal_type == GoalType::BreakEvenReturn && config.search_max > MAX_RATE_PERCENT {
        return Err(GoalSolveError::ReturnSearchTooHigh {
            max: MAX_RATE_PERCENT,
        });
    }
    Ok(())
}
