//! # Portfolio Metrics
//!
//! $$
//! \mu_p = k\,\boldsymbol\mu^\top\mathbf w,\qquad
//! \sigma_p = \sqrt{\mathbf w^\top (k\Sigma)\,\mathbf w},\qquad
//! S = \frac{\mu_p - r_f}{\sigma_p}
//! $$
//!
//! Annualized return, volatility and Sharpe ratio of a weight vector.

use ndarray::Array1;
use ndarray::ArrayView1;
use serde::Serialize;

use super::data::ReturnsStatistics;
use super::types::Frequency;
use crate::error::PortfolioError;
use crate::error::Result;

/// Weights summing to one within this tolerance are used as-is.
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// Derived, never-cached risk/return summary of one weight vector.
#[derive(Clone, Copy, PartialEq, Debug, Serialize)]
pub struct PortfolioMetrics {
  /// Annualized expected return.
  pub expected_return: f64,
  /// Annualized volatility, never negative.
  pub volatility: f64,
  /// `(expected_return - risk_free) / volatility`.
  pub sharpe_ratio: f64,
}

/// Annualized expected return `k * mean . w`.
pub fn portfolio_return(weights: ArrayView1<f64>, stats: &ReturnsStatistics, frequency: Frequency) -> f64 {
  stats.mean().dot(&weights) * frequency.annualization_factor()
}

/// Annualized volatility. Negative quadratic forms from rounding are clamped to zero.
pub fn portfolio_volatility(
  weights: ArrayView1<f64>,
  stats: &ReturnsStatistics,
  frequency: Frequency,
) -> f64 {
  let sigma_w = stats.covariance().dot(&weights);
  let variance = weights.dot(&sigma_w) * frequency.annualization_factor();
  variance.max(0.0).sqrt()
}

/// Sharpe ratio, undefined for a zero-volatility portfolio.
pub fn sharpe_ratio(expected_return: f64, volatility: f64, risk_free_rate: f64) -> Result<f64> {
  if volatility == 0.0 {
    return Err(PortfolioError::DegenerateVolatility);
  }
  Ok((expected_return - risk_free_rate) / volatility)
}

/// Validate a weight vector and rescale it onto the unit sum when needed.
pub fn normalize_weights(weights: ArrayView1<f64>, num_assets: usize) -> Result<Array1<f64>> {
  if weights.len() != num_assets {
    return Err(PortfolioError::WeightCountMismatch {
      expected: num_assets,
      actual: weights.len(),
    });
  }
  if let Some(i) = weights.iter().position(|w| !w.is_finite()) {
    return Err(PortfolioError::InvalidWeights(format!(
      "weight {i} is not finite"
    )));
  }
  if let Some(i) = weights.iter().position(|&w| w < 0.0) {
    return Err(PortfolioError::InvalidWeights(format!(
      "weight {i} is negative ({})",
      weights[i]
    )));
  }

  let sum = weights.sum();
  if sum.abs() < 1e-12 {
    return Err(PortfolioError::InvalidWeights(
      "weights sum to zero".to_string(),
    ));
  }

  if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
    Ok(weights.mapv(|w| w / sum))
  } else {
    Ok(weights.to_owned())
  }
}

impl PortfolioMetrics {
  /// Validate, renormalize if needed, then compute metrics.
  pub fn evaluate(
    weights: ArrayView1<f64>,
    stats: &ReturnsStatistics,
    frequency: Frequency,
    risk_free_rate: f64,
  ) -> Result<Self> {
    let w = normalize_weights(weights, stats.num_assets())?;
    Self::from_weights(w.view(), stats, frequency, risk_free_rate)
  }

  /// Metrics of weights taken verbatim (no validation or rescaling).
  pub(crate) fn from_weights(
    weights: ArrayView1<f64>,
    stats: &ReturnsStatistics,
    frequency: Frequency,
    risk_free_rate: f64,
  ) -> Result<Self> {
    let expected_return = portfolio_return(weights, stats, frequency);
    let volatility = portfolio_volatility(weights, stats, frequency);
    let sharpe_ratio = sharpe_ratio(expected_return, volatility, risk_free_rate)?;

    Ok(Self {
      expected_return,
      volatility,
      sharpe_ratio,
    })
  }
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use ndarray::array;

  use super::*;

  fn two_asset_stats() -> ReturnsStatistics {
    ReturnsStatistics::from_moments(
      vec!["A".to_string(), "B".to_string()],
      array![0.001, 0.002],
      array![[0.0004, 0.0001], [0.0001, 0.0009]],
    )
    .unwrap()
  }

  #[test]
  fn evaluate_matches_closed_form() {
    let stats = two_asset_stats();
    let w = array![0.5, 0.5];
    let m = PortfolioMetrics::evaluate(w.view(), &stats, Frequency::Daily, 0.02).unwrap();

    let ret = (0.5 * 0.001 + 0.5 * 0.002) * 252.0;
    let var = 0.25 * 0.0004 + 0.25 * 0.0009 + 2.0 * 0.25 * 0.0001;
    let vol = (var * 252.0_f64).sqrt();

    assert_abs_diff_eq!(m.expected_return, ret, epsilon = 1e-12);
    assert_abs_diff_eq!(m.volatility, vol, epsilon = 1e-12);
    assert_abs_diff_eq!(m.sharpe_ratio, (ret - 0.02) / vol, epsilon = 1e-10);
  }

  #[test]
  fn evaluate_renormalizes_positive_sums() {
    let stats = two_asset_stats();
    let raw = array![3.0, 1.0];
    let normalized = normalize_weights(raw.view(), 2).unwrap();
    assert_abs_diff_eq!(normalized.sum(), 1.0, epsilon = 1e-9);

    let scaled = PortfolioMetrics::evaluate(raw.view(), &stats, Frequency::Daily, 0.02).unwrap();
    let direct =
      PortfolioMetrics::evaluate(array![0.75, 0.25].view(), &stats, Frequency::Daily, 0.02)
        .unwrap();
    assert_abs_diff_eq!(scaled.expected_return, direct.expected_return, epsilon = 1e-12);
    assert_abs_diff_eq!(scaled.volatility, direct.volatility, epsilon = 1e-12);
  }

  #[test]
  fn evaluate_rejects_malformed_weights() {
    let stats = two_asset_stats();
    let cases = [array![0.0, 0.0], array![f64::NAN, 1.0], array![1.5, -0.5]];
    for w in cases.iter() {
      assert!(matches!(
        PortfolioMetrics::evaluate(w.view(), &stats, Frequency::Daily, 0.0),
        Err(PortfolioError::InvalidWeights(_))
      ));
    }

    assert_eq!(
      PortfolioMetrics::evaluate(array![1.0].view(), &stats, Frequency::Daily, 0.0).unwrap_err(),
      PortfolioError::WeightCountMismatch {
        expected: 2,
        actual: 1
      }
    );
  }

  #[test]
  fn zero_volatility_is_signalled() {
    let stats = ReturnsStatistics::from_moments(
      vec!["CASH".to_string()],
      array![0.0001],
      array![[0.0]],
    )
    .unwrap();

    assert_eq!(
      PortfolioMetrics::evaluate(array![1.0].view(), &stats, Frequency::Daily, 0.02).unwrap_err(),
      PortfolioError::DegenerateVolatility
    );
    assert_eq!(portfolio_volatility(array![1.0].view(), &stats, Frequency::Daily), 0.0);
  }

  #[test]
  fn negative_quadratic_form_is_clamped() {
    // indefinite by construction, emulates rounding noise
    let stats = ReturnsStatistics::from_moments(
      vec!["A".to_string(), "B".to_string()],
      array![0.0, 0.0],
      array![[1e-20, -1e-6], [-1e-6, 1e-20]],
    )
    .unwrap();
    let vol = portfolio_volatility(array![0.5, 0.5].view(), &stats, Frequency::Daily);
    assert_eq!(vol, 0.0);
  }

  #[test]
  fn evaluate_is_bit_identical_across_calls() {
    let stats = two_asset_stats();
    let w = array![0.3, 0.9];
    let a = PortfolioMetrics::evaluate(w.view(), &stats, Frequency::Weekly, 0.01).unwrap();
    let b = PortfolioMetrics::evaluate(w.view(), &stats, Frequency::Weekly, 0.01).unwrap();

    assert_eq!(a.expected_return.to_bits(), b.expected_return.to_bits());
    assert_eq!(a.volatility.to_bits(), b.volatility.to_bits());
    assert_eq!(a.sharpe_ratio.to_bits(), b.sharpe_ratio.to_bits());
  }
}
