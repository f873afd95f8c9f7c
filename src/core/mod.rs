mod engine;
mod series;
mod solver;
mod types;

pub use engine::{monthly_payment, simulate};
pub use series::yearly_points;
pub use solver::{
    GoalSolveConfig, GoalSolveError, GoalSolveIteration, GoalSolveResult, GoalType,
    MAX_SOLVE_ITERATIONS, solve_goal,
};
pub use types::{
    ChartValues, InvalidInputError, LumpSum, MAX_RATE_PERCENT, MAX_TERM_YEARS, MonthRecord,
    MonthValues, PostPayoffPolicy, SimulationInputs, SimulationResult, SimulationSummary,
    SummaryTotals, YearPoint,
};
