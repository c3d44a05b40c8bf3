//! # Portfolio Data Utilities
//!
//! $$
//! \hat\mu_i=\frac1T\sum_t r_{t,i},\qquad
//! \hat\Sigma_{ij}=\frac{1}{T-1}\sum_t (r_{t,i}-\hat\mu_i)(r_{t,j}-\hat\mu_j)
//! $$
//!
//! Return series preprocessing and mean/covariance estimation.

use ndarray::Array1;
use ndarray::Array2;
use ndarray::ArrayView1;
use ndarray::Axis;
use serde::Serialize;

use super::types::Frequency;
use crate::error::PortfolioError;
use crate::error::Result;

const SYMMETRY_TOLERANCE: f64 = 1e-12;

/// Periodic returns per asset, aligned by period (rows) and asset (columns).
#[derive(Clone, Debug)]
pub struct ReturnSeries {
  assets: Vec<String>,
  returns: Array2<f64>,
}

impl ReturnSeries {
  /// Wrap an aligned `periods x assets` return table.
  pub fn new(assets: Vec<String>, returns: Array2<f64>) -> Result<Self> {
    if assets.is_empty() {
      return Err(PortfolioError::InvalidInput(
        "return series needs at least one asset".to_string(),
      ));
    }
    if returns.ncols() != assets.len() {
      return Err(PortfolioError::InvalidInput(format!(
        "{} asset labels for {} return columns",
        assets.len(),
        returns.ncols()
      )));
    }
    if let Some(((t, i), _)) = returns.indexed_iter().find(|(_, r)| !r.is_finite()) {
      return Err(PortfolioError::InvalidInput(format!(
        "non-finite return for '{}' at period {t}",
        assets[i]
      )));
    }

    Ok(Self { assets, returns })
  }

  /// Build from row-major period vectors.
  pub fn from_rows(assets: Vec<String>, rows: &[Vec<f64>]) -> Result<Self> {
    let n = assets.len();
    if let Some(t) = rows.iter().position(|row| row.len() != n) {
      return Err(PortfolioError::InvalidInput(format!(
        "period {t} has {} values, expected {n}",
        rows[t].len()
      )));
    }
    let flat: Vec<f64> = rows.iter().flatten().copied().collect();
    let returns = Array2::from_shape_vec((rows.len(), n), flat)
      .map_err(|e| PortfolioError::InvalidInput(e.to_string()))?;
    Self::new(assets, returns)
  }

  /// Percent-change returns from a `periods x assets` price table.
  ///
  /// Missing prices are encoded as NaN; any period whose return is not finite for
  /// some asset is dropped.
  pub fn from_prices(assets: Vec<String>, prices: &Array2<f64>) -> Result<Self> {
    if prices.ncols() != assets.len() {
      return Err(PortfolioError::InvalidInput(format!(
        "{} asset labels for {} price columns",
        assets.len(),
        prices.ncols()
      )));
    }

    let mut rows = Vec::with_capacity(prices.nrows().saturating_sub(1));
    for t in 1..prices.nrows() {
      let prev = prices.row(t - 1);
      let cur = prices.row(t);
      let row: Vec<f64> = cur
        .iter()
        .zip(prev.iter())
        .map(|(&p1, &p0)| p1 / p0 - 1.0)
        .collect();
      if row.iter().all(|r| r.is_finite()) {
        rows.push(row);
      }
    }

    Self::from_rows(assets, &rows)
  }

  /// Asset labels in column order.
  pub fn assets(&self) -> &[String] {
    &self.assets
  }

  /// Borrow the `periods x assets` return table.
  pub fn returns(&self) -> &Array2<f64> {
    &self.returns
  }

  /// Number of asset columns.
  pub fn num_assets(&self) -> usize {
    self.assets.len()
  }

  /// Number of return periods.
  pub fn num_periods(&self) -> usize {
    self.returns.nrows()
  }
}

/// Immutable mean/covariance snapshot of a return series, in per-period units.
#[derive(Clone, Debug, Serialize)]
pub struct ReturnsStatistics {
  assets: Vec<String>,
  mean: Array1<f64>,
  covariance: Array2<f64>,
  periods: usize,
}

impl ReturnsStatistics {
  /// Sample mean and sample covariance (`T - 1` denominator).
  pub fn derive(series: &ReturnSeries) -> Result<Self> {
    let periods = series.num_periods();
    if periods < 2 {
      return Err(PortfolioError::EmptyReturnsData { periods });
    }

    let returns = series.returns();
    let mean = returns
      .mean_axis(Axis(0))
      .ok_or(PortfolioError::EmptyReturnsData { periods })?;
    let centered = returns - &mean.view().insert_axis(Axis(0));

    let n = series.num_assets();
    let denom = (periods - 1) as f64;
    let mut covariance = Array2::zeros((n, n));
    for i in 0..n {
      let ci = centered.column(i);
      for j in i..n {
        let c = ci.dot(&centered.column(j)) / denom;
        covariance[[i, j]] = c;
        covariance[[j, i]] = c;
      }
    }

    Ok(Self {
      assets: series.assets().to_vec(),
      mean,
      covariance,
      periods,
    })
  }

  /// Statistics from already-estimated per-period moments.
  pub fn from_moments(assets: Vec<String>, mean: Array1<f64>, covariance: Array2<f64>) -> Result<Self> {
    let n = mean.len();
    if n == 0 {
      return Err(PortfolioError::InvalidInput(
        "mean vector is empty".to_string(),
      ));
    }
    if assets.len() != n {
      return Err(PortfolioError::InvalidInput(format!(
        "{} asset labels for {n} mean entries",
        assets.len()
      )));
    }
    if covariance.dim() != (n, n) {
      return Err(PortfolioError::InvalidInput(format!(
        "covariance shape {:?} does not match {n} assets",
        covariance.dim()
      )));
    }
    if mean.iter().chain(covariance.iter()).any(|v| !v.is_finite()) {
      return Err(PortfolioError::InvalidInput(
        "moments contain non-finite values".to_string(),
      ));
    }
    for i in 0..n {
      if covariance[[i, i]] < 0.0 {
        return Err(PortfolioError::InvalidInput(format!(
          "negative variance for '{}'",
          assets[i]
        )));
      }
      for j in (i + 1)..n {
        let (a, b) = (covariance[[i, j]], covariance[[j, i]]);
        if (a - b).abs() > SYMMETRY_TOLERANCE * (1.0 + a.abs().max(b.abs())) {
          return Err(PortfolioError::InvalidInput(format!(
            "covariance is not symmetric at ({i}, {j})"
          )));
        }
      }
    }

    Ok(Self {
      assets,
      mean,
      covariance,
      periods: 0,
    })
  }

  /// Asset labels in column order.
  pub fn assets(&self) -> &[String] {
    &self.assets
  }

  /// Number of assets.
  pub fn num_assets(&self) -> usize {
    self.mean.len()
  }

  /// Per-period mean returns.
  pub fn mean(&self) -> ArrayView1<'_, f64> {
    self.mean.view()
  }

  /// Per-period covariance matrix.
  pub fn covariance(&self) -> &Array2<f64> {
    &self.covariance
  }

  /// Number of periods the statistics were estimated from (0 when built from moments).
  pub fn periods(&self) -> usize {
    self.periods
  }

  /// Standalone annualized volatility of every asset.
  pub fn asset_volatilities(&self, frequency: Frequency) -> Array1<f64> {
    let af = frequency.annualization_factor();
    self
      .covariance
      .diag()
      .mapv(|v| (v * af).max(0.0).sqrt())
  }

  /// Pearson correlation implied by the covariance matrix.
  pub fn correlation(&self) -> Array2<f64> {
    let n = self.num_assets();
    let sd = self.covariance.diag().mapv(|v| v.max(0.0).sqrt());

    Array2::from_shape_fn((n, n), |(i, j)| {
      let denom = sd[i] * sd[j];
      if i == j {
        1.0
      } else if denom > 1e-15 {
        (self.covariance[[i, j]] / denom).clamp(-1.0, 1.0)
      } else {
        0.0
      }
    })
  }
}
