//! # frontier-rs
//!
//! $$
//! \max_{\mathbf w\in\Delta}\ \frac{\mu_p(\mathbf w)-r_f}{\sigma_p(\mathbf w)}
//! $$
//!
//! Mean-variance portfolio analysis: sample statistics of a return series, annualized
//! metrics, random portfolios on the simplex, bounded optimization and the efficient frontier.

pub mod error;
pub mod portfolio;

pub use error::PortfolioError;
pub use error::Result;
