//! # Monte Carlo Portfolios
//!
//! $$
//! u_i \sim \mathcal U(0,1),\qquad w_i = \frac{u_i}{\sum_j u_j}
//! $$
//!
//! Random exploration of the weight simplex.

use ndarray::Array1;
use ndarray::Array2;
use ndarray_stats::QuantileExt;
use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::Serialize;
use tracing::debug;

use super::data::ReturnsStatistics;
use super::metrics::PortfolioMetrics;
use super::types::Frequency;
use crate::error::PortfolioError;
use crate::error::Result;

/// Samples drawn from one RNG stream. Fixed so results do not depend on thread count.
const CHUNK_SIZE: usize = 1024;

/// Per-sample metrics and weights, index-aligned.
#[derive(Clone, Debug, Serialize)]
pub struct SimulationTable {
  /// One entry per sample.
  pub metrics: Vec<PortfolioMetrics>,
  /// `num_samples x num_assets`, row `i` produced `metrics[i]`.
  pub weights: Array2<f64>,
}

impl SimulationTable {
  /// Number of samples.
  pub fn len(&self) -> usize {
    self.metrics.len()
  }

  /// Whether the table holds no samples.
  pub fn is_empty(&self) -> bool {
    self.metrics.is_empty()
  }

  /// Index of the sample with the highest Sharpe ratio.
  pub fn max_sharpe_index(&self) -> Option<usize> {
    let sharpe: Array1<f64> = self.metrics.iter().map(|m| m.sharpe_ratio).collect();
    sharpe.argmax().ok()
  }

  /// Index of the sample with the lowest volatility.
  pub fn min_volatility_index(&self) -> Option<usize> {
    let vol: Array1<f64> = self.metrics.iter().map(|m| m.volatility).collect();
    vol.argmin().ok()
  }
}

fn draw_simplex_weights<R: Rng + ?Sized>(rng: &mut R, n: usize) -> Array1<f64> {
  let mut w: Array1<f64> = (0..n).map(|_| rng.random::<f64>()).collect();
  let sum = w.sum();
  w.mapv_inplace(|x| x / sum);
  w
}

fn chunk_seed(seed: u64, chunk: usize) -> u64 {
  // splitmix64 finalizer
  let mut z = seed.wrapping_add((chunk as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15));
  z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
  z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
  z ^ (z >> 31)
}

/// Draw `num_samples` random long-only portfolios with a fresh seed.
pub fn sample(
  stats: &ReturnsStatistics,
  num_samples: usize,
  risk_free_rate: f64,
  frequency: Frequency,
) -> Result<SimulationTable> {
  sample_seeded(stats, num_samples, risk_free_rate, frequency, rand::random())
}

/// Reproducible variant of [`sample`].
pub fn sample_seeded(
  stats: &ReturnsStatistics,
  num_samples: usize,
  risk_free_rate: f64,
  frequency: Frequency,
  seed: u64,
) -> Result<SimulationTable> {
  if num_samples == 0 {
    return Err(PortfolioError::InvalidInput(
      "number of simulations must be positive".to_string(),
    ));
  }

  let n = stats.num_assets();
  let chunks = num_samples.div_ceil(CHUNK_SIZE);
  debug!(num_samples, chunks, seed, "sampling random portfolios");

  let per_chunk: Vec<Vec<(PortfolioMetrics, Array1<f64>)>> = (0..chunks)
    .into_par_iter()
    .map(|c| -> Result<Vec<(PortfolioMetrics, Array1<f64>)>> {
      let mut rng = StdRng::seed_from_u64(chunk_seed(seed, c));
      let start = c * CHUNK_SIZE;
      let end = (start + CHUNK_SIZE).min(num_samples);
      let mut out = Vec::with_capacity(end - start);
      for _ in start..end {
        let w = draw_simplex_weights(&mut rng, n);
        let m = PortfolioMetrics::from_weights(w.view(), stats, frequency, risk_free_rate)?;
        out.push((m, w));
      }
      Ok(out)
    })
    .collect::<Result<_>>()?;

  let mut metrics = Vec::with_capacity(num_samples);
  let mut weights = Array2::zeros((num_samples, n));
  for (i, (m, w)) in per_chunk.into_iter().flatten().enumerate() {
    metrics.push(m);
    weights.row_mut(i).assign(&w);
  }

  Ok(SimulationTable { metrics, weights })
}
