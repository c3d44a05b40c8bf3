//! # Portfolio
//!
//! $$
//! \sigma_p^2 = \mathbf{w}^\top \Sigma \mathbf{w}
//! $$
//!
//! Return statistics, portfolio metrics, Monte Carlo exploration, constrained optimization
//! and efficient-frontier construction.

pub mod data;
pub mod engine;
pub mod frontier;
pub mod metrics;
pub mod optimizers;
pub mod simulation;
pub mod types;

pub use data::ReturnSeries;
pub use data::ReturnsStatistics;
pub use engine::AnalysisConfig;
pub use engine::AnalysisReport;
pub use engine::PortfolioEngine;
pub use frontier::EfficientFrontierBuilder;
pub use frontier::SweepOutcome;
pub use frontier::capital_market_line;
pub use metrics::PortfolioMetrics;
pub use metrics::normalize_weights;
pub use metrics::portfolio_return;
pub use metrics::portfolio_volatility;
pub use metrics::sharpe_ratio;
pub use optimizers::ConstrainedOptimizer;
pub use optimizers::SolverConfig;
pub use optimizers::optimize_portfolio;
pub use simulation::SimulationTable;
pub use types::Bounds;
pub use types::FrontierCurve;
pub use types::FrontierPoint;
pub use types::Frequency;
pub use types::Objective;
pub use types::OptimizationResult;
pub use types::SkippedTarget;
