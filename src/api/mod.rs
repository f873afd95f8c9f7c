use axum::{
    Router,
    extract::{Json, Query},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::core::{
    GoalSolveConfig, GoalSolveError, GoalSolveResult, GoalType, InvalidInputError, LumpSum,
    MonthRecord, PostPayoffPolicy, SimulationInputs, SimulationResult, SimulationSummary,
    YearPoint, monthly_payment, simulate, solve_goal, yearly_points,
};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum ApiGoal {
    #[serde(alias = "requiredExtraPayment", alias = "required_extra_payment")]
    RequiredExtraPayment,
    #[serde(alias = "breakEvenReturn", alias = "break_even_return")]
    BreakEvenReturn,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SimulatePayload {
    principal: Option<f64>,
    rate: Option<f64>,
    years: Option<u32>,
    extra_payment: Option<f64>,
    investment_rate: Option<f64>,
    inflation_rate: Option<f64>,
    one_time_payment_amount: Option<f64>,
    one_time_payment_month: Option<u32>,
    continue_investing_after_payoff: Option<bool>,
    post_payoff_investment_amount: Option<f64>,

    include_schedule: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SolvePayload {
    #[serde(flatten)]
    simulation: SimulatePayload,
    goal: Option<ApiGoal>,
    target_payoff_month: Option<u32>,
    search_min: Option<f64>,
    search_max: Option<f64>,
    tolerance: Option<f64>,
    max_iterations: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct PaymentQuery {
    principal: Option<f64>,
    rate: Option<f64>,
    years: Option<u32>,
    extra_payment: Option<f64>,
}

#[derive(Parser, Debug)]
#[command(
    name = "paydown",
    about = "Compare paying a loan down early against investing the difference"
)]
struct Cli {
    #[arg(long, default_value_t = 300_000.0, help = "Loan principal")]
    principal: f64,
    #[arg(long, default_value_t = 5.5, help = "Annual loan rate in percent")]
    rate: f64,
    #[arg(long, default_value_t = 30, help = "Loan term in years")]
    years: u32,
    #[arg(
        long,
        default_value_t = 200.0,
        help = "Extra principal paid every month in the pay-down scenario"
    )]
    extra_payment: f64,
    #[arg(
        long,
        default_value_t = 7.0,
        help = "Annual investment return in percent"
    )]
    investment_rate: f64,
    #[arg(long, default_value_t = 2.5, help = "Annual inflation in percent")]
    inflation_rate: f64,
    #[arg(long, default_value_t = 0.0, help = "One-time lump payment amount")]
    one_time_payment_amount: f64,
    #[arg(
        long,
        default_value_t = 0,
        help = "Month the lump payment lands in, 1-indexed; 0 disables it"
    )]
    one_time_payment_month: u32,
    #[arg(
        long,
        default_value_t = true,
        action = clap::ArgAction::Set,
        help = "After payoff, invest the freed loan payment plus the monthly extra"
    )]
    continue_investing_after_payoff: bool,
    #[arg(
        long,
        default_value_t = 0.0,
        help = "Fixed monthly investment after payoff, used when --continue-investing-after-payoff=false"
    )]
    post_payoff_investment_amount: f64,
    #[arg(long, help = "Include the month-by-month schedule in the output")]
    schedule: bool,
    #[arg(long, help = "Include the yearly chart series in the output")]
    yearly: bool,
}

#[derive(Copy, Clone, Debug)]
struct ApiOptions {
    include_schedule: bool,
}

#[derive(Debug)]
struct ApiRequest {
    inputs: SimulationInputs,
    options: ApiOptions,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SimulateResponse {
    monthly_payment: f64,
    total_interest: f64,
    total_paid: f64,
    payoff_month: u32,
    summary: SimulationSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    schedule: Option<Vec<MonthRecord>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    yearly_points: Option<Vec<YearPoint>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PaymentResponse {
    monthly_payment: f64,
    post_payoff_reinvestment: f64,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Args(#[from] clap::Error),
    #[error(transparent)]
    Input(#[from] InvalidInputError),
    #[error("failed to encode result: {0}")]
    Encode(#[from] serde_json::Error),
}

fn build_inputs(cli: &Cli) -> Result<SimulationInputs, InvalidInputError> {
    let one_time_payment = (cli.one_time_payment_month > 0 || cli.one_time_payment_amount != 0.0)
        .then_some(LumpSum {
            amount: cli.one_time_payment_amount,
            month: cli.one_time_payment_month,
        });

    // The custom amount only means something when the payment is not reinvested.
    let post_payoff_policy = if cli.continue_investing_after_payoff {
        PostPayoffPolicy::ReinvestPayment
    } else {
        PostPayoffPolicy::FixedContribution(cli.post_payoff_investment_amount)
    };

    let inputs = SimulationInputs {
        principal: cli.principal,
        annual_rate_percent: cli.rate,
        term_years: cli.years,
        monthly_extra_payment: cli.extra_payment,
        investment_return_percent: cli.investment_rate,
        inflation_percent: cli.inflation_rate,
        one_time_payment,
        post_payoff_policy,
    };
    inputs.validate()?;
    Ok(inputs)
}

/// Parses CLI arguments, runs one simulation and renders it as JSON.
pub fn run_cli<I, T>(args: I) -> Result<String, CliError>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let cli = Cli::try_parse_from(args)?;
    let inputs = build_inputs(&cli)?;
    let result = simulate(&inputs);
    let response = build_simulate_response(result, cli.schedule, cli.yearly);
    Ok(serde_json::to_string_pretty(&response)?)
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = Router::new()
        .route(
            "/api/simulate",
            get(simulate_get_handler).post(simulate_post_handler),
        )
        .route("/api/payment", get(payment_handler))
        .route("/api/solve", post(solve_handler))
        .fallback(not_found_handler);

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "paydown HTTP API listening");
    info!("local access: http://127.0.0.1:{port}/api/simulate");

    axum::serve(listener, app).await
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn simulate_get_handler(Query(payload): Query<SimulatePayload>) -> Response {
    simulate_handler_impl(payload).await
}

async fn simulate_post_handler(Json(payload): Json<SimulatePayload>) -> Response {
    simulate_handler_impl(payload).await
}

async fn simulate_handler_impl(payload: SimulatePayload) -> Response {
    let request = match api_request_from_payload(payload) {
        Ok(request) => request,
        Err(err) => {
            warn!(error = %err, "rejected simulate request");
            return error_response(StatusCode::BAD_REQUEST, &err.to_string());
        }
    };

    let result = simulate(&request.inputs);
    let response = build_simulate_response(result, request.options.include_schedule, true);
    json_response(StatusCode::OK, response)
}

async fn payment_handler(Query(query): Query<PaymentQuery>) -> Response {
    match payment_from_query(query) {
        Ok(preview) => json_response(StatusCode::OK, preview),
        Err(err) => {
            warn!(error = %err, "rejected payment request");
            error_response(StatusCode::BAD_REQUEST, &err.to_string())
        }
    }
}

fn payment_from_query(query: PaymentQuery) -> Result<PaymentResponse, InvalidInputError> {
    let mut cli = default_cli_for_api();
    if let Some(v) = query.principal {
        cli.principal = v;
    }
    if let Some(v) = query.rate {
        cli.rate = v;
    }
    if let Some(v) = query.years {
        cli.years = v;
    }
    if let Some(v) = query.extra_payment {
        cli.extra_payment = v;
    }

    let inputs = build_inputs(&cli)?;
    let payment = monthly_payment(
        inputs.principal,
        inputs.annual_rate_percent,
        inputs.term_years,
    );
    Ok(PaymentResponse {
        monthly_payment: payment,
        post_payoff_reinvestment: payment + inputs.monthly_extra_payment,
    })
}

async fn solve_handler(Json(payload): Json<SolvePayload>) -> Response {
    match solve_from_payload(payload) {
        Ok(result) => json_response(StatusCode::OK, result),
        Err(msg) => {
            warn!(error = %msg, "rejected solve request");
            error_response(StatusCode::BAD_REQUEST, &msg)
        }
    }
}

fn solve_from_payload(payload: SolvePayload) -> Result<GoalSolveResult, String> {
    let request = api_request_from_payload(payload.simulation).map_err(|e| e.to_string())?;
    let inputs = request.inputs;

    let goal = payload.goal.unwrap_or(ApiGoal::BreakEvenReturn);
    let (goal_type, default_max) = match goal {
        ApiGoal::RequiredExtraPayment => {
            let target_payoff_month = payload
                .target_payoff_month
                .ok_or_else(|| "targetPayoffMonth is required for required-extra-payment".to_string())?;
            (
                GoalType::RequiredExtraPayment {
                    target_payoff_month,
                },
                inputs.principal,
            )
        }
        ApiGoal::BreakEvenReturn => (GoalType::BreakEvenReturn, 30.0),
    };

    let config = GoalSolveConfig {
        goal_type,
        search_min: payload.search_min.unwrap_or(0.0),
        search_max: payload.search_max.unwrap_or(default_max),
        tolerance: payload.tolerance.unwrap_or(0.01),
        max_iterations: payload.max_iterations.unwrap_or(60),
    };
    solve_goal(&inputs, config).map_err(|e: GoalSolveError| e.to_string())
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-store"),
    );
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

#[cfg(test)]
fn api_request_from_json(json: &str) -> Result<ApiRequest, String> {
    let payload = serde_json::from_str::<SimulatePayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    api_request_from_payload(payload).map_err(|e| e.to_string())
}

fn api_request_from_payload(payload: SimulatePayload) -> Result<ApiRequest, InvalidInputError> {
    let mut cli = default_cli_for_api();

    if let Some(v) = payload.principal {
        cli.principal = v;
    }
    if let Some(v) = payload.rate {
        cli.rate = v;
    }
    if let Some(v) = payload.years {
        cli.years = v;
    }
    if let Some(v) = payload.extra_payment {
        cli.extra_payment = v;
    }
    if let Some(v) = payload.investment_rate {
        cli.investment_rate = v;
    }
    if let Some(v) = payload.inflation_rate {
        cli.inflation_rate = v;
    }
    if let Some(v) = payload.one_time_payment_amount {
        cli.one_time_payment_amount = v;
    }
    if let Some(v) = payload.one_time_payment_month {
        cli.one_time_payment_month = v;
    }
    if let Some(v) = payload.continue_investing_after_payoff {
        cli.continue_investing_after_payoff = v;
    }
    if let Some(v) = payload.post_payoff_investment_amount {
        cli.post_payoff_investment_amount = v;
    }

    let inputs = build_inputs(&cli)?;
    let options = ApiOptions {
        include_schedule: payload.include_schedule.unwrap_or(true),
    };
    Ok(ApiRequest { inputs, options })
}

fn default_cli_for_api() -> Cli {
    Cli {
        principal: 300_000.0,
        rate: 5.5,
        years: 30,
        extra_payment: 200.0,
        investment_rate: 7.0,
        inflation_rate: 2.5,
        one_time_payment_amount: 0.0,
        one_time_payment_month: 0,
        continue_investing_after_payoff: true,
        post_payoff_investment_amount: 0.0,
        schedule: false,
        yearly: false,
    }
}

fn build_simulate_response(
    result: SimulationResult,
    include_schedule: bool,
    include_yearly: bool,
) -> SimulateResponse {
    let yearly = include_yearly.then(|| yearly_points(&result.schedule));
    SimulateResponse {
        monthly_payment: result.monthly_payment,
        total_interest: result.total_interest,
        total_paid: result.total_paid,
        payoff_month: result.payoff_month,
        summary: result.summary,
        schedule: include_schedule.then_some(result.schedule),
        yearly_points: yearly,
    }
}
