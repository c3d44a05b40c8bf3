//! # Portfolio Engine
//!
//! $$
//! (\hat\mu,\hat\Sigma)\ \to\ \{\mathbf w_{\text{cur}},\ \mathbf w_{\text{MC}},\ \mathbf w^\*,\ \sigma^\*(r)\}
//! $$
//!
//! High-level orchestration: statistics, current portfolio, Monte Carlo, optimum and frontier
//! in one pass.

use ndarray::Array1;
use ndarray::ArrayView1;
use serde::Serialize;
use tracing::info;
use tracing::warn;

use super::data::ReturnSeries;
use super::data::ReturnsStatistics;
use super::frontier::EfficientFrontierBuilder;
use super::frontier::capital_market_line;
use super::metrics::PortfolioMetrics;
use super::metrics::WEIGHT_SUM_TOLERANCE;
use super::metrics::normalize_weights;
use super::optimizers::ConstrainedOptimizer;
use super::optimizers::SolverConfig;
use super::simulation;
use super::simulation::SimulationTable;
use super::types::Bounds;
use super::types::FrontierCurve;
use super::types::FrontierPoint;
use super::types::Frequency;
use super::types::Objective;
use super::types::OptimizationResult;
use crate::error::PortfolioError;
use crate::error::Result;

/// Points on the capital market line of a report.
const CML_POINTS: usize = 50;

/// Runtime configuration for [`PortfolioEngine`].
#[derive(Clone, Debug)]
pub struct AnalysisConfig {
  /// Sampling frequency of the input returns.
  pub frequency: Frequency,
  /// Annualized risk-free rate used in every Sharpe computation.
  pub risk_free_rate: f64,
  /// Objective of the optimal portfolio.
  pub objective: Objective,
  /// Per-asset weight bounds.
  pub bounds: Bounds,
  /// Monte Carlo sample count.
  pub num_simulations: usize,
  /// Target returns on the frontier.
  pub frontier_points: usize,
  /// Fixed Monte Carlo seed, random when `None`.
  pub seed: Option<u64>,
  /// Iteration and tolerance budget of every optimization.
  pub solver: SolverConfig,
}

impl Default for AnalysisConfig {
  fn default() -> Self {
    Self {
      frequency: Frequency::Daily,
      risk_free_rate: 0.02,
      objective: Objective::MaximizeSharpe,
      bounds: Bounds::default(),
      num_simulations: 10_000,
      frontier_points: 50,
      seed: None,
      solver: SolverConfig::default(),
    }
  }
}

impl AnalysisConfig {
  /// Check rates, counts, bounds and the solver budget before any work starts.
  pub fn validate(&self) -> Result<()> {
    if !(self.risk_free_rate.is_finite() && self.risk_free_rate >= 0.0) {
      return Err(PortfolioError::InvalidInput(format!(
        "risk-free rate must be a non-negative number, got {}",
        self.risk_free_rate
      )));
    }
    if self.num_simulations == 0 {
      return Err(PortfolioError::InvalidInput(
        "number of simulations must be positive".to_string(),
      ));
    }
    if self.frontier_points == 0 {
      return Err(PortfolioError::InvalidInput(
        "frontier needs at least one point".to_string(),
      ));
    }
    if let Objective::TargetReturn(r) = self.objective {
      if !r.is_finite() {
        return Err(PortfolioError::InvalidObjective(format!(
          "target return must be finite, got {r}"
        )));
      }
    }
    self.bounds.validate()?;
    self.solver.validate()
  }
}

/// Everything one analysis produces.
#[derive(Clone, Debug, Serialize)]
pub struct AnalysisReport {
  pub frequency: Frequency,
  pub risk_free_rate: f64,
  pub objective: Objective,
  pub statistics: ReturnsStatistics,
  /// Current weights after validation and renormalization.
  pub current_weights: Array1<f64>,
  pub current: PortfolioMetrics,
  pub simulation: SimulationTable,
  pub optimal: OptimizationResult,
  pub frontier: FrontierCurve,
  pub capital_market_line: Vec<FrontierPoint>,
}

impl AnalysisReport {
  /// Asset labels in column order.
  pub fn assets(&self) -> &[String] {
    self.statistics.assets()
  }

  /// Best Monte Carlo sample by Sharpe ratio, as `(weights, metrics)`.
  pub fn best_simulated(&self) -> Option<(ArrayView1<'_, f64>, &PortfolioMetrics)> {
    let i = self.simulation.max_sharpe_index()?;
    Some((self.simulation.weights.row(i), &self.simulation.metrics[i]))
  }
}

/// Single entry point for a full portfolio analysis.
#[derive(Clone, Debug, Default)]
pub struct PortfolioEngine {
  config: AnalysisConfig,
}

impl PortfolioEngine {
  /// Construct a new engine with explicit configuration.
  pub fn new(config: AnalysisConfig) -> Self {
    Self { config }
  }

  /// Borrow engine configuration.
  pub fn config(&self) -> &AnalysisConfig {
    &self.config
  }

  /// Evaluate user weights, renormalizing (with a warning) when they do not sum to one.
  pub fn evaluate_current(
    &self,
    stats: &ReturnsStatistics,
    weights: Option<&[f64]>,
  ) -> Result<(Array1<f64>, PortfolioMetrics)> {
    let n = stats.num_assets();
    let raw = match weights {
      Some(w) => Array1::from(w.to_vec()),
      None => Array1::from_elem(n, 1.0 / n as f64),
    };

    let w = normalize_weights(raw.view(), n)?;
    let sum = raw.sum();
    if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
      warn!(sum, "current weights do not sum to one, renormalizing");
    }

    let metrics = PortfolioMetrics::from_weights(
      w.view(),
      stats,
      self.config.frequency,
      self.config.risk_free_rate,
    )?;
    Ok((w, metrics))
  }

  /// Run the full analysis on `series`.
  pub fn analyze(&self, series: &ReturnSeries, current_weights: Option<&[f64]>) -> Result<AnalysisReport> {
    let cfg = &self.config;
    cfg.validate()?;
    info!(
      assets = series.num_assets(),
      periods = series.num_periods(),
      objective = %cfg.objective,
      frequency = %cfg.frequency,
      "starting portfolio analysis"
    );

    let stats = ReturnsStatistics::derive(series)?;
    let (current_weights, current) = self.evaluate_current(&stats, current_weights)?;

    let seed = cfg.seed.unwrap_or_else(rand::random);
    let simulation = simulation::sample_seeded(
      &stats,
      cfg.num_simulations,
      cfg.risk_free_rate,
      cfg.frequency,
      seed,
    )?;

    let optimizer = ConstrainedOptimizer::new(cfg.solver.clone());
    let optimal = optimizer.optimize(
      &stats,
      cfg.objective,
      &cfg.bounds,
      cfg.risk_free_rate,
      cfg.frequency,
    )?;

    let frontier = EfficientFrontierBuilder::new(optimizer).build(
      &stats,
      &cfg.bounds,
      cfg.risk_free_rate,
      cfg.frequency,
      cfg.frontier_points,
    )?;
    let cml = capital_market_line(cfg.risk_free_rate, &optimal.metrics, CML_POINTS)?;

    info!(
      expected_return = optimal.metrics.expected_return,
      volatility = optimal.metrics.volatility,
      sharpe_ratio = optimal.metrics.sharpe_ratio,
      frontier_points = frontier.len(),
      skipped = frontier.skipped.len(),
      "portfolio analysis finished"
    );

    Ok(AnalysisReport {
      frequency: cfg.frequency,
      risk_free_rate: cfg.risk_free_rate,
      objective: cfg.objective,
      statistics: stats,
      current_weights,
      current,
      simulation,
      optimal,
      frontier,
      capital_market_line: cml,
    })
  }
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use tracing_test::traced_test;

  use super::*;

  fn synthetic_series() -> ReturnSeries {
    let drift = [0.0003, 0.0005, 0.0008];
    let amp = [0.008, 0.012, 0.02];
    let rows: Vec<Vec<f64>> = (0..160)
      .map(|t| {
        let t = t as f64;
        (0..3)
          .map(|i| drift[i] + amp[i] * (t * (0.7 + 0.45 * i as f64) + i as f64).sin())
          .collect()
      })
      .collect();
    ReturnSeries::from_rows(vec!["AAA".into(), "BBB".into(), "CCC".into()], &rows).unwrap()
  }

  fn quick_config() -> AnalysisConfig {
    AnalysisConfig {
      num_simulations: 400,
      frontier_points: 6,
      seed: Some(17),
      ..AnalysisConfig::default()
    }
  }

  #[test]
  fn analyze_produces_consistent_report() {
    let engine = PortfolioEngine::new(quick_config());
    let report = engine.analyze(&synthetic_series(), None).unwrap();

    assert_eq!(report.assets().len(), 3);
    assert_eq!(report.simulation.len(), 400);
    assert_eq!(report.capital_market_line.len(), CML_POINTS);
    assert_abs_diff_eq!(report.current_weights.sum(), 1.0, epsilon = 1e-12);
    assert_abs_diff_eq!(report.optimal.weights.sum(), 1.0, epsilon = 1e-6);
    assert!(!report.frontier.is_empty());

    // the optimizer should not lose to random sampling by more than solver slack
    let (_, best) = report.best_simulated().unwrap();
    assert!(report.optimal.metrics.sharpe_ratio >= best.sharpe_ratio - 1e-4);
    assert!(report.optimal.metrics.sharpe_ratio >= report.current.sharpe_ratio - 1e-6);
  }

  #[test]
  fn seeded_analysis_is_reproducible() {
    let engine = PortfolioEngine::new(quick_config());
    let series = synthetic_series();
    let a = engine.analyze(&series, None).unwrap();
    let b = engine.analyze(&series, None).unwrap();
    assert_eq!(a.simulation.weights, b.simulation.weights);
  }

  #[test]
  #[traced_test]
  fn current_weights_are_renormalized_with_warning() {
    let engine = PortfolioEngine::new(quick_config());
    let series = synthetic_series();
    let stats = ReturnsStatistics::derive(&series).unwrap();

    let (w, _) = engine.evaluate_current(&stats, Some(&[2.0, 1.0, 1.0])).unwrap();
    assert_abs_diff_eq!(w[0], 0.5, epsilon = 1e-12);
    assert_abs_diff_eq!(w.sum(), 1.0, epsilon = 1e-9);
    assert!(logs_contain("renormalizing"));
  }

  #[test]
  fn wrong_weight_count_is_rejected() {
    let engine = PortfolioEngine::new(quick_config());
    let err = engine
      .analyze(&synthetic_series(), Some(&[0.5, 0.5]))
      .unwrap_err();
    assert_eq!(
      err,
      PortfolioError::WeightCountMismatch {
        expected: 3,
        actual: 2
      }
    );
  }

  #[test]
  fn config_validation() {
    assert!(AnalysisConfig::default().validate().is_ok());

    let bad = [
      AnalysisConfig {
        risk_free_rate: -0.01,
        ..AnalysisConfig::default()
      },
      AnalysisConfig {
        num_simulations: 0,
        ..AnalysisConfig::default()
      },
      AnalysisConfig {
        frontier_points: 0,
        ..AnalysisConfig::default()
      },
      AnalysisConfig {
        bounds: Bounds {
          min_weight: 0.7,
          max_weight: 0.2,
        },
        ..AnalysisConfig::default()
      },
    ];
    for cfg in bad.iter() {
      assert!(cfg.validate().is_err());
    }
  }

  #[test]
  fn too_short_series_fails_early() {
    let series =
      ReturnSeries::from_rows(vec!["A".into(), "B".into()], &[vec![0.01, 0.02]]).unwrap();
    let err = PortfolioEngine::new(quick_config())
      .analyze(&series, None)
      .unwrap_err();
    assert_eq!(err, PortfolioError::EmptyReturnsData { periods: 1 });
  }
}
