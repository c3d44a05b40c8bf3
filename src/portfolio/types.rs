//! # Portfolio Types
//!
//! $$
//! \mathbf{w}^\*=\arg\max_{\mathbf{w}} \frac{\mathbb E[R_p]-r_f}{\sigma_p}
//! $$
//!
//! Shared enums and result containers for portfolio optimization.

use std::fmt::Display;
use std::str::FromStr;

use ndarray::Array1;
use serde::Deserialize;
use serde::Serialize;

use super::metrics::PortfolioMetrics;
use crate::error::PortfolioError;
use crate::error::Result;

/// Sampling frequency of a return series.
///
/// Selects the annualization factor; one analysis uses exactly one frequency.
#[derive(Default, Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
  #[default]
  Daily,
  Weekly,
  Monthly,
}

impl Frequency {
  /// Periods per year.
  pub fn annualization_factor(self) -> f64 {
    match self {
      Frequency::Daily => 252.0,
      Frequency::Weekly => 52.0,
      Frequency::Monthly => 12.0,
    }
  }
}

impl FromStr for Frequency {
  type Err = PortfolioError;

  fn from_str(s: &str) -> Result<Self> {
    match s.trim().to_lowercase().as_str() {
      "daily" | "d" | "1d" => Ok(Self::Daily),
      "weekly" | "w" | "1wk" => Ok(Self::Weekly),
      "monthly" | "m" | "1mo" => Ok(Self::Monthly),
      _ => Err(PortfolioError::InvalidFrequency(s.to_string())),
    }
  }
}

impl Display for Frequency {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Frequency::Daily => write!(f, "daily"),
      Frequency::Weekly => write!(f, "weekly"),
      Frequency::Monthly => write!(f, "monthly"),
    }
  }
}

/// Optimization target.
#[derive(Default, Clone, Copy, PartialEq, Debug, Serialize, Deserialize)]
pub enum Objective {
  /// Tangency portfolio.
  #[default]
  MaximizeSharpe,
  /// Global minimum-volatility portfolio.
  MinimizeVolatility,
  /// Highest expected return reachable under the bounds.
  MaximizeReturn,
  /// Minimum volatility at a fixed annualized expected return.
  TargetReturn(f64),
}

impl Objective {
  /// Parse an objective label. `target_return` is required for the target variant
  /// and ignored otherwise.
  pub fn parse(label: &str, target_return: Option<f64>) -> Result<Self> {
    match label.trim().to_lowercase().replace('-', "_").as_str() {
      "sharpe" | "max_sharpe" | "maximize_sharpe" => Ok(Self::MaximizeSharpe),
      "min_volatility" | "min_vol" | "minimize_volatility" => Ok(Self::MinimizeVolatility),
      "max_return" | "maximize_return" => Ok(Self::MaximizeReturn),
      "target_return" | "target" => match target_return {
        Some(r) if r.is_finite() => Ok(Self::TargetReturn(r)),
        Some(r) => Err(PortfolioError::InvalidObjective(format!(
          "target return must be finite, got {r}"
        ))),
        None => Err(PortfolioError::InvalidObjective(
          "target_return objective needs a target value".to_string(),
        )),
      },
      _ => Err(PortfolioError::InvalidObjective(format!(
        "unknown objective '{label}', expected one of: sharpe, min_volatility, max_return, target_return"
      ))),
    }
  }
}

impl Display for Objective {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Objective::MaximizeSharpe => write!(f, "maximum Sharpe ratio"),
      Objective::MinimizeVolatility => write!(f, "minimum volatility"),
      Objective::MaximizeReturn => write!(f, "maximum return"),
      Objective::TargetReturn(r) => write!(f, "minimum volatility at {:.2}% return", r * 100.0),
    }
  }
}

/// Per-asset weight bounds, applied uniformly.
#[derive(Clone, Copy, PartialEq, Debug, Serialize, Deserialize)]
pub struct Bounds {
  pub min_weight: f64,
  pub max_weight: f64,
}

impl Default for Bounds {
  fn default() -> Self {
    Self {
      min_weight: 0.0,
      max_weight: 1.0,
    }
  }
}

impl Bounds {
  /// Construct validated bounds.
  pub fn new(min_weight: f64, max_weight: f64) -> Result<Self> {
    let bounds = Self {
      min_weight,
      max_weight,
    };
    bounds.validate()?;
    Ok(bounds)
  }

  /// Check `0 <= min <= max <= 1`.
  pub fn validate(&self) -> Result<()> {
    let ok = self.min_weight.is_finite()
      && self.max_weight.is_finite()
      && 0.0 <= self.min_weight
      && self.min_weight <= self.max_weight
      && self.max_weight <= 1.0;

    if ok {
      Ok(())
    } else {
      Err(PortfolioError::InvalidBounds {
        min_weight: self.min_weight,
        max_weight: self.max_weight,
      })
    }
  }

  /// Whether some weight vector over `n` assets sums to one inside the box.
  pub fn admits_simplex(&self, n: usize) -> bool {
    let n = n as f64;
    n * self.min_weight <= 1.0 + 1e-12 && n * self.max_weight >= 1.0 - 1e-12
  }
}

/// Output of a single optimization run.
///
/// Weights are projected onto the bounds after the solve. Volatility at rounding-noise level
/// is reported as an error instead of an unbounded Sharpe ratio.
#[derive(Clone, Debug, Serialize)]
pub struct OptimizationResult {
  /// Solver weights, in asset order.
  pub weights: Array1<f64>,
  /// Metrics recomputed from `weights`.
  pub metrics: PortfolioMetrics,
}

/// A single point on the efficient frontier.
#[derive(Clone, Copy, PartialEq, Debug, Serialize)]
pub struct FrontierPoint {
  pub expected_return: f64,
  pub volatility: f64,
}

/// A frontier target that could not be solved.
#[derive(Clone, Debug, Serialize)]
pub struct SkippedTarget {
  pub target_return: f64,
  pub reason: String,
}

/// Efficient frontier ordered by ascending target return.
#[derive(Clone, Debug, Default, Serialize)]
pub struct FrontierCurve {
  pub points: Vec<FrontierPoint>,
  pub skipped: Vec<SkippedTarget>,
}

impl FrontierCurve {
  /// Number of solved points.
  pub fn len(&self) -> usize {
    self.points.len()
  }

  /// Whether no target was solved.
  pub fn is_empty(&self) -> bool {
    self.points.is_empty()
  }

  /// Iterate solved points in ascending target order.
  pub fn iter(&self) -> impl Iterator<Item = &FrontierPoint> {
    self.points.iter()
  }
}
