//! # Errors
//!
//! $$
//! \text{ok}(\mathbf w) \lor \text{err}(\kappa),\quad \kappa\in\{\text{data},\text{weights},\text{solver},\dots\}
//! $$
//!
//! Error kinds surfaced by the statistics, metrics, simulation and optimization layers.

use thiserror::Error;

/// Failure modes of the portfolio core.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PortfolioError {
  /// Fewer than two periods, so the sample covariance is undefined.
  #[error("returns data needs at least 2 periods, got {periods}")]
  EmptyReturnsData { periods: usize },

  /// Zero-sum, non-finite or negative weight vector.
  #[error("invalid weights: {0}")]
  InvalidWeights(String),

  /// Sharpe ratio requested for a portfolio with zero volatility.
  #[error("portfolio volatility is zero, the Sharpe ratio is undefined")]
  DegenerateVolatility,

  /// Unrecognized sampling frequency label.
  #[error("invalid frequency '{0}', expected one of: daily, weekly, monthly")]
  InvalidFrequency(String),

  /// Solver did not reach a feasible stationary point.
  #[error("optimization failed: {0}")]
  OptimizationFailure(String),

  /// Weight vector length differs from the asset count.
  #[error("expected {expected} weights (one per asset), got {actual}")]
  WeightCountMismatch { expected: usize, actual: usize },

  /// Box bounds outside `0 <= min <= max <= 1`.
  #[error("invalid bounds [{min_weight}, {max_weight}], expected 0 <= min <= max <= 1")]
  InvalidBounds { min_weight: f64, max_weight: f64 },

  /// Unrecognized objective label or missing target value.
  #[error("invalid objective: {0}")]
  InvalidObjective(String),

  /// Malformed input that is not covered by a more specific kind.
  #[error("invalid input: {0}")]
  InvalidInput(String),
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, PortfolioError>;

impl PortfolioError {
  /// Short stable identifier, handy for consumer layers mapping errors to messages.
  pub fn kind(&self) -> &'static str {
    match self {
      PortfolioError::EmptyReturnsData { .. } => "empty_returns_data",
      PortfolioError::InvalidWeights(_) => "invalid_weights",
      PortfolioError::DegenerateVolatility => "degenerate_volatility",
      PortfolioError::InvalidFrequency(_) => "invalid_frequency",
      PortfolioError::OptimizationFailure(_) => "optimization_failure",
      PortfolioError::WeightCountMismatch { .. } => "weight_count_mismatch",
      PortfolioError::InvalidBounds { .. } => "invalid_bounds",
      PortfolioError::InvalidObjective(_) => "invalid_objective",
      PortfolioError::InvalidInput(_) => "invalid_input",
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn messages_carry_context() {
    let err = PortfolioError::WeightCountMismatch {
      expected: 3,
      actual: 2,
    };
    assert_eq!(err.to_string(), "expected 3 weights (one per asset), got 2");
    assert_eq!(err.kind(), "weight_count_mismatch");

    let err = PortfolioError::OptimizationFailure("budget exhausted".to_string());
    assert!(err.to_string().contains("budget exhausted"));
  }
}
