//! # Portfolio Optimizers
//!
//! $$
//! \min_{\mathbf{w}} f(\mathbf w)\quad\text{s.t.}\quad A\mathbf w=\mathbf b,\ \ \ell\le w_i\le u
//! $$
//!
//! Constrained optimizer over the weight simplex. Linear equalities (budget and optional
//! target return) are removed exactly by working in the affine space
//! $\mathbf w = \mathbf w_0 + Z\mathbf y$; box bounds are enforced with an augmented
//! Lagrangian whose subproblems are solved with Nelder-Mead.

use std::time::Duration;
use std::time::Instant;

use argmin::core::CostFunction;
use argmin::core::Executor;
use argmin::solver::neldermead::NelderMead;
use nalgebra::DMatrix;
use nalgebra::DVector;
use ndarray::Array1;
use ndarray::Array2;
use tracing::debug;

use super::data::ReturnsStatistics;
use super::metrics::PortfolioMetrics;
use super::metrics::WEIGHT_SUM_TOLERANCE;
use super::metrics::portfolio_return;
use super::metrics::portfolio_volatility;
use super::metrics::sharpe_ratio;
use super::types::Bounds;
use super::types::Frequency;
use super::types::Objective;
use super::types::OptimizationResult;
use crate::error::PortfolioError;
use crate::error::Result;

/// Objective value used for `MaximizeSharpe` when a trial portfolio has zero volatility.
pub const SHARPE_DEGENERATE_PENALTY: f64 = 1e10;

/// Reported volatility below this is rounding noise on a riskless portfolio.
pub const VOLATILITY_FLOOR: f64 = 1e-12;

const PINV_EPS: f64 = 1e-10;
const NULL_SPACE_EPS: f64 = 1e-8;
const MIN_SIMPLEX_STEP: f64 = 1e-5;
const RANGE_TOLERANCE: f64 = 1e-9;

/// Iteration and tolerance budget of [`ConstrainedOptimizer`].
#[derive(Clone, Debug)]
pub struct SolverConfig {
  /// Augmented Lagrangian multiplier updates.
  pub max_outer_iters: usize,
  /// Nelder-Mead iterations per subproblem.
  pub max_inner_iters: u64,
  /// Largest accepted bound violation.
  pub feasibility_tolerance: f64,
  /// Relative objective change treated as stalled.
  pub objective_tolerance: f64,
  /// Standard deviation of simplex costs at which Nelder-Mead stops.
  pub simplex_tolerance: f64,
  /// Edge length of the first subproblem simplex.
  pub initial_step: f64,
  /// Penalty weight of the first subproblem.
  pub initial_penalty: f64,
  /// Factor applied to the penalty when the bound violation stalls.
  pub penalty_growth: f64,
  /// Upper cap of the penalty weight.
  pub max_penalty: f64,
  /// Wall-clock budget of one optimization, unlimited when `None`.
  pub time_budget: Option<Duration>,
}

impl Default for SolverConfig {
  fn default() -> Self {
    Self {
      max_outer_iters: 60,
      max_inner_iters: 3000,
      feasibility_tolerance: 1e-6,
      objective_tolerance: 1e-10,
      simplex_tolerance: 1e-14,
      initial_step: 0.05,
      initial_penalty: 10.0,
      penalty_growth: 10.0,
      max_penalty: 1e12,
      time_budget: None,
    }
  }
}

impl SolverConfig {
  /// Check that tolerances, penalties and iteration budgets are positive.
  pub fn validate(&self) -> Result<()> {
    let positive = [
      ("feasibility_tolerance", self.feasibility_tolerance),
      ("objective_tolerance", self.objective_tolerance),
      ("simplex_tolerance", self.simplex_tolerance),
      ("initial_step", self.initial_step),
      ("initial_penalty", self.initial_penalty),
      ("max_penalty", self.max_penalty),
    ];
    if let Some((name, v)) = positive.iter().find(|(_, v)| !(v.is_finite() && *v > 0.0)) {
      return Err(PortfolioError::InvalidInput(format!(
        "solver {name} must be positive, got {v}"
      )));
    }
    if !(self.penalty_growth.is_finite() && self.penalty_growth >= 1.0) {
      return Err(PortfolioError::InvalidInput(format!(
        "solver penalty_growth must be >= 1, got {}",
        self.penalty_growth
      )));
    }
    if self.max_outer_iters == 0 || self.max_inner_iters == 0 {
      return Err(PortfolioError::InvalidInput(
        "solver iteration budgets must be positive".to_string(),
      ));
    }
    Ok(())
  }
}

/// Scalar objective as a pure function of a trial weight vector.
#[derive(Clone, Debug)]
struct PortfolioObjective {
  objective: Objective,
  stats: ReturnsStatistics,
  frequency: Frequency,
  risk_free_rate: f64,
}

impl PortfolioObjective {
  fn value(&self, w: &Array1<f64>) -> f64 {
    match self.objective {
      Objective::MaximizeSharpe => {
        let ret = portfolio_return(w.view(), &self.stats, self.frequency);
        let vol = portfolio_volatility(w.view(), &self.stats, self.frequency);
        match sharpe_ratio(ret, vol, self.risk_free_rate) {
          Ok(s) => -s,
          Err(_) => SHARPE_DEGENERATE_PENALTY,
        }
      }
      Objective::MinimizeVolatility | Objective::TargetReturn(_) => {
        portfolio_volatility(w.view(), &self.stats, self.frequency)
      }
      Objective::MaximizeReturn => -portfolio_return(w.view(), &self.stats, self.frequency),
    }
  }
}

/// Affine set `{ w : A w = b }` parametrized as `w = origin + basis * y`.
#[derive(Clone, Debug)]
struct AffineWeights {
  origin: Array1<f64>,
  /// `n x m`, orthonormal columns spanning the null space of `A`.
  basis: Array2<f64>,
}

impl AffineWeights {
  fn new(a: &DMatrix<f64>, b: &DVector<f64>) -> Result<Self> {
    let n = a.ncols();
    let pinv = a
      .clone()
      .pseudo_inverse(PINV_EPS)
      .map_err(|e| PortfolioError::OptimizationFailure(e.to_string()))?;
    let x0 = &pinv * b;

    let residual = (a * &x0 - b).amax();
    if residual > 1e-9 * (1.0 + b.amax()) {
      return Err(PortfolioError::OptimizationFailure(format!(
        "equality constraints are inconsistent (residual {residual:.3e})"
      )));
    }

    let projector = DMatrix::<f64>::identity(n, n) - &pinv * a;
    let mut directions: Vec<DVector<f64>> = Vec::new();
    for j in 0..n {
      let mut v: DVector<f64> = projector.column(j).into_owned();
      // two passes of modified Gram-Schmidt
      for _ in 0..2 {
        for q in &directions {
          let c = q.dot(&v);
          v -= q * c;
        }
      }
      let norm = v.norm();
      if norm > NULL_SPACE_EPS {
        directions.push(v / norm);
      }
    }

    let m = directions.len();
    Ok(Self {
      origin: x0.iter().copied().collect(),
      basis: Array2::from_shape_fn((n, m), |(i, k)| directions[k][i]),
    })
  }

  fn dim(&self) -> usize {
    self.basis.ncols()
  }

  fn weights(&self, y: &[f64]) -> Array1<f64> {
    let y = Array1::from(y.to_vec());
    &self.origin + &self.basis.dot(&y)
  }

  fn coordinates(&self, w: &Array1<f64>) -> Vec<f64> {
    self.basis.t().dot(&(w - &self.origin)).to_vec()
  }
}

fn phr_term(g: f64, multiplier: f64, penalty: f64) -> f64 {
  let shifted = (multiplier + penalty * g).max(0.0);
  (shifted * shifted - multiplier * multiplier) / (2.0 * penalty)
}

fn bound_violation(w: &Array1<f64>, bounds: &Bounds) -> f64 {
  w.iter().fold(0.0_f64, |acc, &wi| {
    acc
      .max(bounds.min_weight - wi)
      .max(wi - bounds.max_weight)
  })
}

/// Subproblem: objective plus Powell-Hestenes-Rockafellar terms for the box.
struct AugmentedLagrangian {
  objective: PortfolioObjective,
  space: AffineWeights,
  bounds: Bounds,
  /// Interleaved `[lower_0, upper_0, lower_1, upper_1, ...]`.
  multipliers: Vec<f64>,
  penalty: f64,
}

impl CostFunction for AugmentedLagrangian {
  type Param = Vec<f64>;
  type Output = f64;

  fn cost(&self, y: &Self::Param) -> std::result::Result<Self::Output, argmin::core::Error> {
    let w = self.space.weights(y);
    let mut value = self.objective.value(&w);

    for (i, &wi) in w.iter().enumerate() {
      value += phr_term(self.bounds.min_weight - wi, self.multipliers[2 * i], self.penalty);
      value += phr_term(wi - self.bounds.max_weight, self.multipliers[2 * i + 1], self.penalty);
    }

    Ok(if value.is_finite() { value } else { 1e300 })
  }
}

/// Exact extremes of `mean . w` over `{ sum w = 1, min <= w_i <= max }`.
fn attainable_return_range(annual_mean: &Array1<f64>, bounds: &Bounds) -> (f64, f64) {
  let n = annual_mean.len();
  let mut order: Vec<usize> = (0..n).collect();
  order.sort_by(|&a, &b| annual_mean[a].total_cmp(&annual_mean[b]));

  let lo = greedy_fill(order.iter().copied(), annual_mean, bounds);
  let hi = greedy_fill(order.iter().rev().copied(), annual_mean, bounds);
  (lo, hi)
}

/// Start every asset at the floor, then hand out the remaining budget in `ranked` order.
fn greedy_fill(ranked: impl Iterator<Item = usize>, annual_mean: &Array1<f64>, bounds: &Bounds) -> f64 {
  let mut remaining = 1.0 - annual_mean.len() as f64 * bounds.min_weight;
  let mut ret = 0.0;
  for i in ranked {
    let add = (bounds.max_weight - bounds.min_weight).min(remaining.max(0.0));
    remaining -= add;
    ret += (bounds.min_weight + add) * annual_mean[i];
  }
  ret
}

fn initial_simplex(y0: &[f64], step: f64) -> Vec<Vec<f64>> {
  let mut simplex = Vec::with_capacity(y0.len() + 1);
  simplex.push(y0.to_vec());
  for i in 0..y0.len() {
    let mut point = y0.to_vec();
    point[i] += step;
    simplex.push(point);
  }
  simplex
}

/// Local constrained optimizer for long-only, box-bounded portfolios.
#[derive(Clone, Debug, Default)]
pub struct ConstrainedOptimizer {
  config: SolverConfig,
}

impl ConstrainedOptimizer {
  /// Construct an optimizer with an explicit solver budget.
  pub fn new(config: SolverConfig) -> Self {
    Self { config }
  }

  /// Borrow the solver budget.
  pub fn config(&self) -> &SolverConfig {
    &self.config
  }

  /// Solve `objective` under the budget constraint and `bounds`, starting from equal weights.
  ///
  /// Returned weights lie inside `bounds` and sum to one within [`WEIGHT_SUM_TOLERANCE`].
  /// A solution whose volatility is below [`VOLATILITY_FLOOR`] yields
  /// [`PortfolioError::DegenerateVolatility`].
  pub fn optimize(
    &self,
    stats: &ReturnsStatistics,
    objective: Objective,
    bounds: &Bounds,
    risk_free_rate: f64,
    frequency: Frequency,
  ) -> Result<OptimizationResult> {
    self.config.validate()?;
    bounds.validate()?;
    if !risk_free_rate.is_finite() {
      return Err(PortfolioError::InvalidInput(format!(
        "risk-free rate must be finite, got {risk_free_rate}"
      )));
    }

    let n = stats.num_assets();
    if !bounds.admits_simplex(n) {
      return Err(PortfolioError::OptimizationFailure(format!(
        "bounds [{}, {}] admit no weights summing to one across {n} assets",
        bounds.min_weight, bounds.max_weight
      )));
    }

    let af = frequency.annualization_factor();
    let (a, b) = match objective {
      Objective::TargetReturn(target) => {
        if !target.is_finite() {
          return Err(PortfolioError::InvalidObjective(format!(
            "target return must be finite, got {target}"
          )));
        }
        let annual_mean = stats.mean().mapv(|m| m * af);
        let (lo, hi) = attainable_return_range(&annual_mean, bounds);
        let tol = RANGE_TOLERANCE * (1.0 + target.abs());
        if target < lo - tol || target > hi + tol {
          return Err(PortfolioError::OptimizationFailure(format!(
            "target return {target:.6} is outside the attainable range [{lo:.6}, {hi:.6}]"
          )));
        }
        (
          DMatrix::from_fn(2, n, |i, j| if i == 0 { 1.0 } else { annual_mean[j] }),
          DVector::from_vec(vec![1.0, target]),
        )
      }
      _ => (
        DMatrix::from_element(1, n, 1.0),
        DVector::from_element(1, 1.0),
      ),
    };

    let space = AffineWeights::new(&a, &b)?;
    let cost = PortfolioObjective {
      objective,
      stats: stats.clone(),
      frequency,
      risk_free_rate,
    };

    let start = Array1::from_elem(n, 1.0 / n as f64);
    let y = if space.dim() == 0 {
      Vec::new()
    } else {
      self.augmented_lagrangian(&cost, &space, bounds, space.coordinates(&start))?
    };

    let raw = space.weights(&y);
    let violation = bound_violation(&raw, bounds);
    if violation > self.config.feasibility_tolerance {
      return Err(PortfolioError::OptimizationFailure(format!(
        "no feasible weights for {objective}: bound violation {violation:.3e}"
      )));
    }

    // project the residual violation onto the box
    let weights = raw.mapv(|w| w.clamp(bounds.min_weight, bounds.max_weight));
    let sum = weights.sum();
    if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
      return Err(PortfolioError::OptimizationFailure(format!(
        "weights sum to {sum} after projection onto the bounds"
      )));
    }

    let metrics = PortfolioMetrics::from_weights(weights.view(), stats, frequency, risk_free_rate)?;
    if metrics.volatility < VOLATILITY_FLOOR {
      return Err(PortfolioError::DegenerateVolatility);
    }
    debug!(
      %objective,
      expected_return = metrics.expected_return,
      volatility = metrics.volatility,
      "optimization converged"
    );

    Ok(OptimizationResult { weights, metrics })
  }

  fn augmented_lagrangian(
    &self,
    objective: &PortfolioObjective,
    space: &AffineWeights,
    bounds: &Bounds,
    y0: Vec<f64>,
  ) -> Result<Vec<f64>> {
    let cfg = &self.config;
    let started = Instant::now();
    let n = space.origin.len();

    let mut y = y0;
    let mut multipliers = vec![0.0; 2 * n];
    let mut penalty = cfg.initial_penalty;
    let mut prev_value = f64::NAN;
    let mut prev_violation = f64::INFINITY;
    let mut violation = f64::INFINITY;

    for outer in 0..cfg.max_outer_iters {
      if let Some(budget) = cfg.time_budget {
        if started.elapsed() >= budget {
          if violation <= cfg.feasibility_tolerance {
            debug!(outer, violation, "time budget exhausted, keeping feasible iterate");
            return Ok(y);
          }
          return Err(PortfolioError::OptimizationFailure(format!(
            "time budget of {budget:?} exhausted after {outer} outer iterations"
          )));
        }
      }

      let subproblem = AugmentedLagrangian {
        objective: objective.clone(),
        space: space.clone(),
        bounds: *bounds,
        multipliers: multipliers.clone(),
        penalty,
      };
      let step = (cfg.initial_step * 0.5_f64.powi(outer as i32)).max(MIN_SIMPLEX_STEP);
      y = self.solve_subproblem(subproblem, &y, step)?;

      let w = space.weights(&y);
      let value = objective.value(&w);
      violation = bound_violation(&w, bounds);

      for (i, &wi) in w.iter().enumerate() {
        multipliers[2 * i] = (multipliers[2 * i] + penalty * (bounds.min_weight - wi)).max(0.0);
        multipliers[2 * i + 1] =
          (multipliers[2 * i + 1] + penalty * (wi - bounds.max_weight)).max(0.0);
      }
      debug!(outer, value, violation, penalty, "augmented lagrangian step");

      let stalled = (value - prev_value).abs() <= cfg.objective_tolerance * (1.0 + value.abs());
      if violation <= cfg.feasibility_tolerance && stalled {
        return Ok(y);
      }
      if violation > 0.25 * prev_violation {
        penalty = (penalty * cfg.penalty_growth).min(cfg.max_penalty);
      }
      prev_violation = violation;
      prev_value = value;
    }

    if violation <= cfg.feasibility_tolerance {
      debug!(violation, "outer budget exhausted, keeping feasible iterate");
      return Ok(y);
    }
    Err(PortfolioError::OptimizationFailure(format!(
      "no convergence after {} outer iterations (bound violation {violation:.3e})",
      cfg.max_outer_iters
    )))
  }

  fn solve_subproblem(&self, problem: AugmentedLagrangian, y0: &[f64], step: f64) -> Result<Vec<f64>> {
    let solver = NelderMead::new(initial_simplex(y0, step))
      .with_sd_tolerance(self.config.simplex_tolerance)
      .map_err(|e| PortfolioError::OptimizationFailure(format!("invalid solver setup: {e}")))?;

    let res = Executor::new(problem, solver)
      .configure(|state| state.max_iters(self.config.max_inner_iters))
      .run()
      .map_err(|e| PortfolioError::OptimizationFailure(format!("subproblem failed: {e}")))?;

    res.state.best_param.ok_or_else(|| {
      PortfolioError::OptimizationFailure("subproblem returned no parameters".to_string())
    })
  }
}

/// [`ConstrainedOptimizer::optimize`] with the default solver budget.
pub fn optimize_portfolio(
  stats: &ReturnsStatistics,
  objective: Objective,
  bounds: &Bounds,
  risk_free_rate: f64,
  frequency: Frequency,
) -> Result<OptimizationResult> {
  ConstrainedOptimizer::default().optimize(stats, objective, bounds, risk_free_rate, frequency)
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use ndarray::array;

  use super::*;

  fn labels(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("A{i}")).collect()
  }

  fn scenario_stats() -> ReturnsStatistics {
    ReturnsStatistics::from_moments(
      labels(2),
      array![0.001, 0.002],
      array![[0.0004, 0.0001], [0.0001, 0.0009]],
    )
    .unwrap()
  }

  fn stats3() -> ReturnsStatistics {
    ReturnsStatistics::from_moments(
      labels(3),
      array![0.0004, 0.0006, 0.0009],
      array![
        [0.0001, 0.00002, 0.0],
        [0.00002, 0.0002, 0.00003],
        [0.0, 0.00003, 0.0004]
      ],
    )
    .unwrap()
  }

  #[test]
  fn equal_variance_uncorrelated_pair_splits_evenly() {
    let stats =
      ReturnsStatistics::from_moments(labels(2), array![0.001, 0.0005], array![[0.0004, 0.0], [0.0, 0.0004]])
        .unwrap();
    let res = optimize_portfolio(
      &stats,
      Objective::MinimizeVolatility,
      &Bounds::default(),
      0.02,
      Frequency::Daily,
    )
    .unwrap();

    assert_abs_diff_eq!(res.weights[0], 0.5, epsilon = 1e-4);
    assert_abs_diff_eq!(res.weights[1], 0.5, epsilon = 1e-4);
  }

  #[test]
  fn single_asset_objectives_agree() {
    let stats =
      ReturnsStatistics::from_moments(labels(1), array![0.0007], array![[0.0002]]).unwrap();
    let bounds = Bounds::default();

    let results: Vec<OptimizationResult> = [
      Objective::MaximizeSharpe,
      Objective::MinimizeVolatility,
      Objective::MaximizeReturn,
    ]
    .iter()
    .map(|&obj| optimize_portfolio(&stats, obj, &bounds, 0.02, Frequency::Daily).unwrap())
    .collect();

    for res in &results {
      assert_eq!(res.weights.len(), 1);
      assert_abs_diff_eq!(res.weights[0], 1.0, epsilon = 1e-12);
      assert_eq!(res.metrics, results[0].metrics);
    }
  }

  #[test]
  fn min_volatility_diversifies() {
    let stats = scenario_stats();
    let res = optimize_portfolio(
      &stats,
      Objective::MinimizeVolatility,
      &Bounds::default(),
      0.02,
      Frequency::Daily,
    )
    .unwrap();

    let standalone = stats.asset_volatilities(Frequency::Daily);
    assert!(res.metrics.volatility < standalone[0]);
    assert!(res.metrics.volatility < standalone[1]);
    assert_abs_diff_eq!(res.weights.sum(), 1.0, epsilon = 1e-9);

    // closed form: w0 = (s22 - s12) / (s11 + s22 - 2 s12)
    assert_abs_diff_eq!(res.weights[0], 0.0008 / 0.0011, epsilon = 1e-4);
  }

  #[test]
  fn max_sharpe_matches_tangency_closed_form() {
    let stats = scenario_stats();
    let res = optimize_portfolio(
      &stats,
      Objective::MaximizeSharpe,
      &Bounds::default(),
      0.02,
      Frequency::Daily,
    )
    .unwrap();

    // w ~ Sigma^-1 (mu - rf), annualized
    let excess = [0.252 - 0.02, 0.504 - 0.02];
    let (s11, s12, s22) = (0.0004 * 252.0, 0.0001 * 252.0, 0.0009 * 252.0);
    let z0 = s22 * excess[0] - s12 * excess[1];
    let z1 = -s12 * excess[0] + s11 * excess[1];
    assert_abs_diff_eq!(res.weights[0], z0 / (z0 + z1), epsilon = 1e-3);
    assert_abs_diff_eq!(res.weights.sum(), 1.0, epsilon = 1e-9);

    let equal = PortfolioMetrics::evaluate(array![0.5, 0.5].view(), &stats, Frequency::Daily, 0.02)
      .unwrap();
    assert!(res.metrics.sharpe_ratio >= equal.sharpe_ratio);
  }

  #[test]
  fn max_return_fills_best_assets_up_to_the_cap() {
    let stats = stats3();
    let bounds = Bounds::new(0.1, 0.5).unwrap();
    let res =
      optimize_portfolio(&stats, Objective::MaximizeReturn, &bounds, 0.02, Frequency::Daily).unwrap();

    assert_abs_diff_eq!(res.weights[0], 0.1, epsilon = 1e-3);
    assert_abs_diff_eq!(res.weights[1], 0.4, epsilon = 1e-3);
    assert_abs_diff_eq!(res.weights[2], 0.5, epsilon = 1e-3);
    assert!(res.weights.iter().all(|&w| (0.1..=0.5).contains(&w)));
    assert!(PortfolioMetrics::evaluate(res.weights.view(), &stats, Frequency::Daily, 0.02).is_ok());
  }

  fn correlated_stats(n: usize) -> ReturnsStatistics {
    let mean = Array1::from_shape_fn(n, |i| 0.0002 + 0.0001 * i as f64);
    let sd = Array1::from_shape_fn(n, |i| 0.01 + 0.002 * i as f64);
    let cov = Array2::from_shape_fn((n, n), |(i, j)| {
      let rho = if i == j { 1.0 } else { 0.2 };
      rho * sd[i] * sd[j]
    });
    ReturnsStatistics::from_moments(labels(n), mean, cov).unwrap()
  }

  #[test]
  fn results_round_trip_through_evaluate() {
    let stats = correlated_stats(10);
    let cases = [
      (Objective::MaximizeSharpe, Bounds::default()),
      (Objective::MinimizeVolatility, Bounds::default()),
      (Objective::MaximizeReturn, Bounds::default()),
      (Objective::MaximizeReturn, Bounds::new(0.0, 0.15).unwrap()),
      (Objective::TargetReturn(0.1), Bounds::new(0.02, 0.3).unwrap()),
    ];

    for (objective, bounds) in cases {
      let res = optimize_portfolio(&stats, objective, &bounds, 0.02, Frequency::Daily).unwrap();
      assert!(
        res
          .weights
          .iter()
          .all(|&w| w >= bounds.min_weight && w <= bounds.max_weight),
        "{objective}: {:?}",
        res.weights
      );
      let again = PortfolioMetrics::evaluate(res.weights.view(), &stats, Frequency::Daily, 0.02);
      assert!(again.is_ok(), "{objective}: {again:?}");
    }
  }

  #[test]
  fn rounding_noise_volatility_is_degenerate() {
    let stats = ReturnsStatistics::from_moments(
      labels(2),
      array![0.0001, 0.0001],
      array![[1e-30, 0.0], [0.0, 1e-30]],
    )
    .unwrap();
    let err = optimize_portfolio(
      &stats,
      Objective::MinimizeVolatility,
      &Bounds::default(),
      0.02,
      Frequency::Daily,
    )
    .unwrap_err();
    assert_eq!(err, PortfolioError::DegenerateVolatility);
  }

  #[test]
  fn target_return_is_met_exactly() {
    let stats = stats3();
    let bounds = Bounds::default();
    let target = 0.15;
    let res = optimize_portfolio(
      &stats,
      Objective::TargetReturn(target),
      &bounds,
      0.02,
      Frequency::Daily,
    )
    .unwrap();

    assert_abs_diff_eq!(res.metrics.expected_return, target, epsilon = 1e-6);
    assert_abs_diff_eq!(res.weights.sum(), 1.0, epsilon = 1e-6);

    let min_vol =
      optimize_portfolio(&stats, Objective::MinimizeVolatility, &bounds, 0.02, Frequency::Daily)
        .unwrap();
    assert!(res.metrics.volatility >= min_vol.metrics.volatility - 1e-9);
  }

  #[test]
  fn unattainable_target_return_fails() {
    let bounds = Bounds::default();
    // attainable annual returns are [0.252, 0.504] and [0.1008, 0.2268]
    for (stats, target) in [
      (scenario_stats(), 0.60),
      (scenario_stats(), 0.10),
      (stats3(), 0.30),
      (stats3(), 0.05),
    ] {
      let err = optimize_portfolio(
        &stats,
        Objective::TargetReturn(target),
        &bounds,
        0.02,
        Frequency::Daily,
      )
      .unwrap_err();
      assert!(matches!(err, PortfolioError::OptimizationFailure(_)), "{err}");
    }
  }

  #[test]
  fn infeasible_bounds_fail() {
    let bounds = Bounds::new(0.0, 0.3).unwrap();
    let err =
      optimize_portfolio(&stats3(), Objective::MinimizeVolatility, &bounds, 0.02, Frequency::Daily)
        .unwrap_err();
    assert!(matches!(err, PortfolioError::OptimizationFailure(_)));
  }

  #[test]
  fn exhausted_time_budget_fails() {
    let optimizer = ConstrainedOptimizer::new(SolverConfig {
      time_budget: Some(Duration::ZERO),
      ..SolverConfig::default()
    });
    let err = optimizer
      .optimize(
        &stats3(),
        Objective::MinimizeVolatility,
        &Bounds::default(),
        0.02,
        Frequency::Daily,
      )
      .unwrap_err();
    assert!(err.to_string().contains("time budget"));
  }

  #[test]
  fn degenerate_sharpe_uses_penalty() {
    let stats = ReturnsStatistics::from_moments(
      labels(2),
      array![0.001, 0.001],
      array![[0.0, 0.0], [0.0, 0.0]],
    )
    .unwrap();
    let objective = PortfolioObjective {
      objective: Objective::MaximizeSharpe,
      stats: stats.clone(),
      frequency: Frequency::Daily,
      risk_free_rate: 0.02,
    };
    assert_eq!(objective.value(&array![0.5, 0.5]), SHARPE_DEGENERATE_PENALTY);

    // the solver survives, the zero-volatility answer is still reported
    let err = optimize_portfolio(
      &stats,
      Objective::MaximizeSharpe,
      &Bounds::default(),
      0.02,
      Frequency::Daily,
    )
    .unwrap_err();
    assert_eq!(err, PortfolioError::DegenerateVolatility);
  }

  #[test]
  fn affine_space_reproduces_equalities() {
    let a = DMatrix::from_row_slice(2, 3, &[1.0, 1.0, 1.0, 0.1, 0.2, 0.3]);
    let b = DVector::from_vec(vec![1.0, 0.22]);
    let space = AffineWeights::new(&a, &b).unwrap();
    assert_eq!(space.dim(), 1);

    let w = space.weights(&[0.37]);
    assert_abs_diff_eq!(w.sum(), 1.0, epsilon = 1e-12);
    assert_abs_diff_eq!(0.1 * w[0] + 0.2 * w[1] + 0.3 * w[2], 0.22, epsilon = 1e-12);

    let y = space.coordinates(&w);
    assert_abs_diff_eq!(y[0], 0.37, epsilon = 1e-12);
  }

  #[test]
  fn inconsistent_equalities_are_rejected() {
    let a = DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 2.0, 2.0]);
    let b = DVector::from_vec(vec![1.0, 3.0]);
    assert!(matches!(
      AffineWeights::new(&a, &b),
      Err(PortfolioError::OptimizationFailure(_))
    ));
  }

  #[test]
  fn attainable_range_is_greedy_fill() {
    let mean = array![0.1, 0.2, 0.3];
    let (lo, hi) = attainable_return_range(&mean, &Bounds::new(0.1, 0.5).unwrap());
    assert_abs_diff_eq!(lo, 0.5 * 0.1 + 0.4 * 0.2 + 0.1 * 0.3, epsilon = 1e-12);
    assert_abs_diff_eq!(hi, 0.1 * 0.1 + 0.4 * 0.2 + 0.5 * 0.3, epsilon = 1e-12);
  }
}
