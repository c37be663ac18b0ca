//! # Errors
//!
//! Typed failure modes surfaced by the optimization engine.

/// All errors that can occur while computing an allocation.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PortfolioError {
  /// The nonlinear solve did not reach a feasible stationary point within
  /// its iteration budget. Carries the solver diagnostic. Recoverable:
  /// callers may retry with a different initial guess or relaxed bounds.
  #[error("optimization failed: {0}")]
  OptimizationFailed(String),

  /// Portfolio volatility (or another ratio denominator) is numerically
  /// indistinguishable from zero, so Sharpe, diversification and risk
  /// contribution ratios are undefined. Detected before any division.
  #[error("degenerate input: {0}")]
  DegenerateInput(String),

  /// The covariance matrix violates the positive-semi-definiteness or
  /// symmetry assumptions, which indicates malformed upstream statistics.
  #[error("numeric error: {0}")]
  NumericError(String),

  /// Dimension mismatch or an otherwise malformed argument.
  #[error("invalid input: {0}")]
  InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, PortfolioError>;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn display_includes_diagnostic() {
    let err = PortfolioError::OptimizationFailed("max iterations reached".into());
    assert_eq!(
      err.to_string(),
      "optimization failed: max iterations reached"
    );

    let err = PortfolioError::DegenerateInput("zero portfolio volatility".into());
    assert!(err.to_string().starts_with("degenerate input"));
  }
}
