//! # Portfolio Metrics
//!
//! $$
//! \sigma_p = \sqrt{\mathbf{w}^\top \Sigma \mathbf{w}}
//! $$
//!
//! Risk and return primitives shared by every objective, plus input
//! validation for the caller-supplied statistics.

use ndarray::aview1;
use ndarray::Array1;
use ndarray::Array2;

use crate::error::PortfolioError;
use crate::error::Result;

/// Below this, portfolio volatility is treated as zero and every ratio over
/// it as undefined.
pub(crate) const VOL_EPS: f64 = 1e-12;

/// Tolerance on a negative `w'Σw` radicand before Σ is declared non-PSD.
pub(crate) const PSD_TOL: f64 = 1e-10;

const SYMMETRY_TOL: f64 = 1e-8;
const BUDGET_TOL: f64 = 1e-6;

/// Expected portfolio return `w'μ`.
pub fn portfolio_return(weights: &Array1<f64>, mu: &Array1<f64>) -> f64 {
  weights.dot(mu)
}

/// Portfolio volatility `sqrt(w'Σw)`.
///
/// A radicand below `-1e-10` means Σ is not positive semi-definite and is
/// reported as [`PortfolioError::NumericError`]; tiny negative values from
/// floating-point roundoff clamp to zero.
pub fn portfolio_volatility(weights: &Array1<f64>, sigma: &Array2<f64>) -> Result<f64> {
  let radicand = weights.dot(&sigma.dot(weights));
  if radicand < -PSD_TOL {
    return Err(PortfolioError::NumericError(format!(
      "negative portfolio variance {radicand:.3e}: covariance matrix is not positive semi-definite"
    )));
  }
  Ok(radicand.max(0.0).sqrt())
}

/// Marginal risk contribution vector `Σw`.
pub fn marginal_risk(weights: &Array1<f64>, sigma: &Array2<f64>) -> Array1<f64> {
  sigma.dot(weights)
}

/// Per-asset risk contributions `w ⊙ Σw / σ_p`, summing to σ_p.
pub fn risk_contributions(weights: &Array1<f64>, sigma: &Array2<f64>) -> Result<Array1<f64>> {
  let vol = portfolio_volatility(weights, sigma)?;
  if vol <= VOL_EPS {
    return Err(PortfolioError::DegenerateInput(
      "portfolio volatility is numerically zero, risk contributions are undefined".into(),
    ));
  }
  let marginal = marginal_risk(weights, sigma);
  Ok(weights * &marginal / vol)
}

/// Standalone asset volatilities `σ_i = sqrt(Σ_ii)`.
pub fn asset_volatilities(sigma: &Array2<f64>) -> Array1<f64> {
  sigma.diag().mapv(|v| v.max(0.0).sqrt())
}

/// Diversification ratio `(w·σ) / σ_p`; ≥ 1 for any long-only portfolio
/// over imperfectly correlated assets.
pub fn diversification_ratio(weights: &Array1<f64>, sigma: &Array2<f64>) -> Result<f64> {
  let vol = portfolio_volatility(weights, sigma)?;
  if vol <= VOL_EPS {
    return Err(PortfolioError::DegenerateInput(
      "portfolio volatility is numerically zero, diversification ratio is undefined".into(),
    ));
  }
  Ok(weights.dot(&asset_volatilities(sigma)) / vol)
}

/// `w'Σw` over a plain slice, clamped at zero. Used inside objective
/// closures where the optimizer owns the parameter vector.
pub(crate) fn variance_of(x: &[f64], sigma: &Array2<f64>) -> f64 {
  let w = aview1(x);
  w.dot(&sigma.dot(&w)).max(0.0)
}

/// Validate a covariance matrix: square, symmetric, sane diagonal.
///
/// A zero-variance asset makes volatility ratios undefined downstream and is
/// rejected up front as [`PortfolioError::DegenerateInput`] rather than
/// surfacing later as a division error.
pub fn validate_covariance(sigma: &Array2<f64>) -> Result<()> {
  let n = sigma.nrows();
  if n == 0 {
    return Err(PortfolioError::InvalidInput(
      "at least one asset required".into(),
    ));
  }
  if sigma.ncols() != n {
    return Err(PortfolioError::InvalidInput(format!(
      "covariance matrix is {}x{}, expected square",
      n,
      sigma.ncols()
    )));
  }

  for i in 0..n {
    for j in (i + 1)..n {
      if (sigma[[i, j]] - sigma[[j, i]]).abs() > SYMMETRY_TOL {
        return Err(PortfolioError::NumericError(format!(
          "covariance matrix is not symmetric: cov[{i}][{j}]={} != cov[{j}][{i}]={}",
          sigma[[i, j]],
          sigma[[j, i]]
        )));
      }
    }
  }

  for i in 0..n {
    let var = sigma[[i, i]];
    if var < -PSD_TOL {
      return Err(PortfolioError::NumericError(format!(
        "negative variance {var:.3e} for asset {i}"
      )));
    }
    if var <= VOL_EPS {
      return Err(PortfolioError::DegenerateInput(format!(
        "asset {i} has zero variance"
      )));
    }
  }

  Ok(())
}

/// Validate the (μ, Σ) pair shares one asset ordering and dimension.
pub fn validate_inputs(mu: &Array1<f64>, sigma: &Array2<f64>) -> Result<()> {
  validate_covariance(sigma)?;
  if mu.len() != sigma.nrows() {
    return Err(PortfolioError::InvalidInput(format!(
      "expected returns have length {} but covariance matrix is {}x{}",
      mu.len(),
      sigma.nrows(),
      sigma.ncols()
    )));
  }
  Ok(())
}

/// Validate a caller-supplied risk budget: non-negative, sums to one.
pub fn validate_budget(budget: &Array1<f64>, n: usize) -> Result<()> {
  if budget.len() != n {
    return Err(PortfolioError::InvalidInput(format!(
      "risk budget has length {} but the universe has {} assets",
      budget.len(),
      n
    )));
  }
  if budget.iter().any(|&b| b < -VOL_EPS) {
    return Err(PortfolioError::InvalidInput(
      "risk budget entries must be non-negative".into(),
    ));
  }
  let total: f64 = budget.sum();
  if (total - 1.0).abs() > BUDGET_TOL {
    return Err(PortfolioError::InvalidInput(format!(
      "risk budget sums to {total}, expected 1"
    )));
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use ndarray::arr1;
  use ndarray::arr2;

  use super::*;

  fn diag_sigma() -> Array2<f64> {
    arr2(&[[0.04, 0.0], [0.0, 0.09]])
  }

  #[test]
  fn return_and_volatility_match_closed_form() {
    let mu = arr1(&[0.08, 0.12]);
    let w = arr1(&[0.5, 0.5]);
    let sigma = diag_sigma();

    assert_abs_diff_eq!(portfolio_return(&w, &mu), 0.10, epsilon = 1e-12);
    // var = 0.25*0.04 + 0.25*0.09 = 0.0325
    assert_abs_diff_eq!(
      portfolio_volatility(&w, &sigma).unwrap(),
      0.0325_f64.sqrt(),
      epsilon = 1e-12
    );
  }

  #[test]
  fn risk_contributions_sum_to_volatility() {
    let sigma = arr2(&[[0.04, 0.006], [0.006, 0.09]]);
    let w = arr1(&[0.6, 0.4]);
    let rc = risk_contributions(&w, &sigma).unwrap();
    let vol = portfolio_volatility(&w, &sigma).unwrap();
    assert_abs_diff_eq!(rc.sum(), vol, epsilon = 1e-12);
  }

  #[test]
  fn negative_radicand_is_a_numeric_error() {
    // Symmetric but indefinite: w = (0.5, 0.5) gives w'Σw = -1.
    let sigma = arr2(&[[1.0, -3.0], [-3.0, 1.0]]);
    let w = arr1(&[0.5, 0.5]);
    assert!(matches!(
      portfolio_volatility(&w, &sigma),
      Err(PortfolioError::NumericError(_))
    ));
  }

  #[test]
  fn zero_volatility_is_degenerate_for_ratios() {
    let sigma = arr2(&[[0.04, 0.0], [0.0, 0.09]]);
    let w = arr1(&[0.0, 0.0]);
    assert!(matches!(
      risk_contributions(&w, &sigma),
      Err(PortfolioError::DegenerateInput(_))
    ));
    assert!(matches!(
      diversification_ratio(&w, &sigma),
      Err(PortfolioError::DegenerateInput(_))
    ));
  }

  #[test]
  fn diversification_ratio_of_uncorrelated_pair() {
    // Equal vols, zero correlation, half-half weights: DR = sqrt(2).
    let sigma = arr2(&[[0.04, 0.0], [0.0, 0.04]]);
    let w = arr1(&[0.5, 0.5]);
    let dr = diversification_ratio(&w, &sigma).unwrap();
    assert_abs_diff_eq!(dr, 2.0_f64.sqrt(), epsilon = 1e-12);
  }

  #[test]
  fn validation_rejects_asymmetric_covariance() {
    let sigma = arr2(&[[0.04, 0.01], [0.02, 0.09]]);
    assert!(matches!(
      validate_covariance(&sigma),
      Err(PortfolioError::NumericError(_))
    ));
  }

  #[test]
  fn validation_rejects_zero_variance_asset() {
    let sigma = arr2(&[[0.04, 0.0], [0.0, 0.0]]);
    assert!(matches!(
      validate_covariance(&sigma),
      Err(PortfolioError::DegenerateInput(_))
    ));
  }

  #[test]
  fn validation_rejects_dimension_mismatch() {
    let mu = arr1(&[0.08, 0.12, 0.10]);
    let sigma = diag_sigma();
    assert!(matches!(
      validate_inputs(&mu, &sigma),
      Err(PortfolioError::InvalidInput(_))
    ));
  }

  #[test]
  fn budget_validation() {
    assert!(validate_budget(&arr1(&[0.5, 0.3, 0.2]), 3).is_ok());
    assert!(validate_budget(&arr1(&[0.5, 0.5]), 3).is_err());
    assert!(validate_budget(&arr1(&[0.7, 0.6, -0.3]), 3).is_err());
    assert!(validate_budget(&arr1(&[0.4, 0.3, 0.2]), 3).is_err());
  }
}
