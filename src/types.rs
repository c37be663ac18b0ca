//! # Portfolio Types
//!
//! $$
//! \mathbf{w}^\*=\arg\min_{\mathbf{w}} f(\mathbf{w}) \quad \text{s.t.} \quad \mathbf{1}^\top\mathbf{w}=1
//! $$
//!
//! Shared enums and result containers for the allocation strategies.

use ndarray::Array1;

/// Supported allocation strategies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Strategy {
  /// Weights minimizing portfolio volatility.
  MinVariance,
  /// Tangency portfolio: weights maximizing the Sharpe ratio.
  MaxSharpe,
  /// Equalized (or budgeted) marginal risk contributions.
  RiskParity,
  /// Weights maximizing the diversification ratio.
  MaxDiversification,
  /// Uniform 1/n baseline.
  EqualWeight,
}

impl Strategy {
  /// Parse a string into a [`Strategy`].
  pub fn from_str(s: &str) -> Self {
    match s.to_lowercase().as_str() {
      "tangency" | "max-sharpe" | "maxsharpe" => Self::MaxSharpe,
      "risk-parity" | "riskparity" | "erc" => Self::RiskParity,
      "max-div" | "max-diversification" | "maxdiversification" => Self::MaxDiversification,
      "equal" | "equal-weight" | "equalweight" | "1/n" => Self::EqualWeight,
      _ => Self::MinVariance,
    }
  }
}

/// Output of one allocation run, as consumed by reporting and backtesting.
#[derive(Clone, Debug)]
pub struct OptimizedPortfolio {
  /// Final weights, in the caller's asset ordering.
  pub weights: Array1<f64>,
  /// Expected portfolio return `w'μ` (annualized if inputs are annualized).
  pub expected_return: f64,
  /// Portfolio volatility `sqrt(w'Σw)`.
  pub volatility: f64,
  /// Sharpe ratio `(expected_return - risk_free) / volatility`.
  pub sharpe: f64,
  /// Per-asset risk contributions `w ⊙ Σw / volatility`.
  pub risk_contributions: Array1<f64>,
}

/// One point of the mean-variance efficient frontier.
///
/// `volatility` is `None` when the sub-problem for this target return did
/// not converge; the sweep keeps going and reports a partial frontier.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrontierPoint {
  /// Target expected return of this grid point.
  pub target_return: f64,
  /// Minimum attainable volatility at the target, if feasible.
  pub volatility: Option<f64>,
}
