//! # Efficient Frontier
//!
//! $$
//! \sigma^\*(r)=\min_{\mathbf w}\ \sigma_p(\mathbf w)\quad\text{s.t.}\quad \mu_p(\mathbf w)=r,\ \ r\in[r_{\min},r_{\max}]
//! $$
//!
//! Target-return sweep between the minimum-volatility and maximum-return portfolios.

use rayon::prelude::*;
use serde::Serialize;
use tracing::debug;
use tracing::warn;

use super::data::ReturnsStatistics;
use super::metrics::PortfolioMetrics;
use super::optimizers::ConstrainedOptimizer;
use super::types::Bounds;
use super::types::FrontierCurve;
use super::types::FrontierPoint;
use super::types::Frequency;
use super::types::Objective;
use super::types::SkippedTarget;
use crate::error::PortfolioError;
use crate::error::Result;

/// Result of solving one frontier target.
#[derive(Clone, Debug, Serialize)]
pub enum SweepOutcome {
  Solved {
    target_return: f64,
    point: FrontierPoint,
  },
  Skipped {
    target_return: f64,
    reason: String,
  },
}

impl SweepOutcome {
  /// Target return this outcome belongs to.
  pub fn target_return(&self) -> f64 {
    match self {
      SweepOutcome::Solved { target_return, .. } | SweepOutcome::Skipped { target_return, .. } => {
        *target_return
      }
    }
  }
}

/// `points` evenly spaced values over `[lo, hi]`, both ends included.
pub fn target_grid(lo: f64, hi: f64, points: usize) -> Result<Vec<f64>> {
  match points {
    0 => Err(PortfolioError::InvalidInput(
      "frontier needs at least one point".to_string(),
    )),
    1 => Ok(vec![lo]),
    _ => {
      let step = (hi - lo) / (points - 1) as f64;
      Ok(
        (0..points)
          .map(|i| if i == points - 1 { hi } else { lo + step * i as f64 })
          .collect(),
      )
    }
  }
}

/// Gather sweep outcomes, in order, into a curve.
pub fn collect_curve(outcomes: Vec<SweepOutcome>) -> FrontierCurve {
  let mut curve = FrontierCurve::default();
  for outcome in outcomes {
    match outcome {
      SweepOutcome::Solved { point, .. } => curve.points.push(point),
      SweepOutcome::Skipped {
        target_return,
        reason,
      } => curve.skipped.push(SkippedTarget {
        target_return,
        reason,
      }),
    }
  }

  if curve.is_empty() {
    warn!(skipped = curve.skipped.len(), "efficient frontier is empty");
  }
  curve
}

/// Sweeps target returns with a [`ConstrainedOptimizer`].
#[derive(Clone, Debug, Default)]
pub struct EfficientFrontierBuilder {
  optimizer: ConstrainedOptimizer,
}

impl EfficientFrontierBuilder {
  /// Construct a builder around an explicit optimizer.
  pub fn new(optimizer: ConstrainedOptimizer) -> Self {
    Self { optimizer }
  }

  /// Build the frontier over `points` targets.
  ///
  /// Failures of the two anchor solves propagate; failures of individual targets are
  /// recorded in [`FrontierCurve::skipped`].
  pub fn build(
    &self,
    stats: &ReturnsStatistics,
    bounds: &Bounds,
    risk_free_rate: f64,
    frequency: Frequency,
    points: usize,
  ) -> Result<FrontierCurve> {
    if points == 0 {
      return Err(PortfolioError::InvalidInput(
        "frontier needs at least one point".to_string(),
      ));
    }

    let min_vol = self.optimizer.optimize(
      stats,
      Objective::MinimizeVolatility,
      bounds,
      risk_free_rate,
      frequency,
    )?;
    let max_ret = self.optimizer.optimize(
      stats,
      Objective::MaximizeReturn,
      bounds,
      risk_free_rate,
      frequency,
    )?;

    let min_return = min_vol.metrics.expected_return;
    let max_return = max_ret.metrics.expected_return.max(min_return);
    debug!(min_return, max_return, points, "sweeping efficient frontier");

    let targets = target_grid(min_return, max_return, points)?;
    let outcomes = self.sweep(stats, bounds, risk_free_rate, frequency, &targets);
    Ok(collect_curve(outcomes))
  }

  /// Solve every target in parallel, keeping the order of `targets`.
  pub fn sweep(
    &self,
    stats: &ReturnsStatistics,
    bounds: &Bounds,
    risk_free_rate: f64,
    frequency: Frequency,
    targets: &[f64],
  ) -> Vec<SweepOutcome> {
    targets
      .par_iter()
      .map(|&target_return| {
        match self.optimizer.optimize(
          stats,
          Objective::TargetReturn(target_return),
          bounds,
          risk_free_rate,
          frequency,
        ) {
          Ok(res) => SweepOutcome::Solved {
            target_return,
            point: FrontierPoint {
              expected_return: res.metrics.expected_return,
              volatility: res.metrics.volatility,
            },
          },
          Err(e) => {
            debug!(target_return, error = %e, "skipping frontier target");
            SweepOutcome::Skipped {
              target_return,
              reason: e.to_string(),
            }
          }
        }
      })
      .collect()
  }
}

/// Capital market line `r = rf + S * sigma` for `sigma` in `[0, 1.5 * sigma_tangency]`.
pub fn capital_market_line(
  risk_free_rate: f64,
  tangency: &PortfolioMetrics,
  points: usize,
) -> Result<Vec<FrontierPoint>> {
  let sigmas = target_grid(0.0, 1.5 * tangency.volatility, points)?;
  Ok(
    sigmas
      .into_iter()
      .map(|volatility| FrontierPoint {
        expected_return: risk_free_rate + tangency.sharpe_ratio * volatility,
        volatility,
      })
      .collect(),
  )
}
