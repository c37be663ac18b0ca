//! # Portfolio Optimizers
//!
//! $$
//! \mathbf{w}^\*=\arg\min_{\mathbf{w}\in\mathcal{W}} f(\mathbf{w}), \qquad \mathcal{W}=\{\mathbf{w}:\mathbf{1}^\top\mathbf{w}=1\}
//! $$
//!
//! The four allocation formulations and the efficient frontier sweep. Each
//! formulation only describes an objective over the shared constraint set;
//! the actual solve goes through [`crate::solver`].

use ndarray::aview1;
use ndarray::Array1;
use ndarray::Array2;
use rayon::prelude::*;
use tracing::warn;

use crate::error::PortfolioError;
use crate::error::Result;
use crate::metrics;
use crate::solver::AugmentedLagrangianSolver;
use crate::solver::BoundsPolicy;
use crate::solver::ConstrainedProblem;
use crate::solver::ConstrainedSolver;
use crate::solver::ScalarFn;
use crate::types::FrontierPoint;

fn bounds_for(short_allowed: bool) -> BoundsPolicy {
  if short_allowed {
    BoundsPolicy::Unbounded
  } else {
    BoundsPolicy::UnitBox
  }
}

fn budget_equality<'a>() -> ScalarFn<'a> {
  Box::new(|w: &[f64]| w.iter().sum::<f64>() - 1.0)
}

fn target_return_equality<'a>(mu: &'a Array1<f64>, target: f64) -> ScalarFn<'a> {
  Box::new(move |w: &[f64]| aview1(w).dot(mu) - target)
}

fn volatility_objective<'a>(sigma: &'a Array2<f64>) -> ScalarFn<'a> {
  Box::new(move |w: &[f64]| metrics::variance_of(w, sigma).sqrt())
}

fn into_weights(result: crate::solver::SolverResult) -> Result<Array1<f64>> {
  if !result.converged {
    return Err(PortfolioError::OptimizationFailed(result.message));
  }
  Ok(Array1::from(result.weights))
}

fn linspace(start: f64, end: f64, points: usize) -> Vec<f64> {
  if points == 1 {
    return vec![start];
  }
  let step = (end - start) / (points - 1) as f64;
  (0..points).map(|i| start + step * i as f64).collect()
}

/// Mean-variance optimizer over caller-owned statistics.
///
/// Borrows the annualized expected returns and covariance matrix; both must
/// share one asset ordering.
pub struct MarkowitzOptimizer<'a> {
  mu: &'a Array1<f64>,
  sigma: &'a Array2<f64>,
  risk_free: f64,
  solver: AugmentedLagrangianSolver,
}

impl<'a> MarkowitzOptimizer<'a> {
  pub fn new(mu: &'a Array1<f64>, sigma: &'a Array2<f64>, risk_free: f64) -> Self {
    Self {
      mu,
      sigma,
      risk_free,
      solver: AugmentedLagrangianSolver::default(),
    }
  }

  /// Replace the default solver configuration.
  pub fn with_solver(mut self, solver: AugmentedLagrangianSolver) -> Self {
    self.solver = solver;
    self
  }

  /// Minimum variance portfolio: weights minimizing `sqrt(w'Σw)`.
  pub fn min_variance_portfolio(&self, short_allowed: bool) -> Result<Array1<f64>> {
    metrics::validate_inputs(self.mu, self.sigma)?;

    let problem = ConstrainedProblem::new(
      self.mu.len(),
      volatility_objective(self.sigma),
      vec![budget_equality()],
      bounds_for(short_allowed),
    );
    let weights = into_weights(self.solver.minimize(&problem, None))?;
    metrics::portfolio_volatility(&weights, self.sigma)?;
    Ok(weights)
  }

  /// Tangency portfolio: weights maximizing the Sharpe ratio
  /// `(w'μ - rf) / sqrt(w'Σw)`.
  pub fn tangency_portfolio(&self, short_allowed: bool) -> Result<Array1<f64>> {
    metrics::validate_inputs(self.mu, self.sigma)?;

    let mu = self.mu;
    let sigma = self.sigma;
    let risk_free = self.risk_free;
    let neg_sharpe: ScalarFn<'_> = Box::new(move |w: &[f64]| {
      let var = metrics::variance_of(w, sigma);
      if var < 1e-30 {
        return 1e10;
      }
      -(aview1(w).dot(mu) - risk_free) / var.sqrt()
    });

    let problem = ConstrainedProblem::new(
      self.mu.len(),
      neg_sharpe,
      vec![budget_equality()],
      bounds_for(short_allowed),
    );
    let weights = into_weights(self.solver.minimize(&problem, None))?;

    let vol = metrics::portfolio_volatility(&weights, self.sigma)?;
    if vol <= metrics::VOL_EPS {
      return Err(PortfolioError::DegenerateInput(
        "maximum-Sharpe portfolio has zero volatility, Sharpe ratio is undefined".into(),
      ));
    }
    Ok(weights)
  }

  /// Trace the efficient frontier over a target-return grid.
  ///
  /// Without an explicit `return_range`, the grid spans `points` evenly
  /// spaced values from the minimum variance portfolio's return up to the
  /// tangency portfolio's return, inclusive. Every grid point is solved
  /// independently from the uniform initial guess; a point whose sub-problem
  /// does not converge is recorded with `volatility: None` instead of
  /// aborting the sweep. Output ordering matches the grid ordering.
  pub fn efficient_frontier(
    &self,
    return_range: Option<&[f64]>,
    short_allowed: bool,
    points: usize,
  ) -> Result<Vec<FrontierPoint>> {
    metrics::validate_inputs(self.mu, self.sigma)?;

    let grid: Vec<f64> = match return_range {
      Some(range) => range.to_vec(),
      None => {
        if points == 0 {
          return Err(PortfolioError::InvalidInput(
            "frontier point count must be positive".into(),
          ));
        }
        let mvp = self.min_variance_portfolio(short_allowed)?;
        let tangency = self.tangency_portfolio(short_allowed)?;
        let min_ret = metrics::portfolio_return(&mvp, self.mu);
        let max_ret = metrics::portfolio_return(&tangency, self.mu);
        linspace(min_ret, max_ret, points)
      }
    };

    let n = self.mu.len();
    let bounds = bounds_for(short_allowed);
    let frontier = grid
      .par_iter()
      .map(|&target| {
        let problem = ConstrainedProblem::new(
          n,
          volatility_objective(self.sigma),
          vec![budget_equality(), target_return_equality(self.mu, target)],
          bounds,
        );
        let result = self.solver.minimize(&problem, None);
        if result.converged {
          let vol = metrics::variance_of(&result.weights, self.sigma).sqrt();
          FrontierPoint {
            target_return: target,
            volatility: Some(vol),
          }
        } else {
          warn!(target_return = target, "infeasible frontier point");
          FrontierPoint {
            target_return: target,
            volatility: None,
          }
        }
      })
      .collect();

    Ok(frontier)
  }
}

/// Risk parity optimizer: match risk-contribution fractions to a budget.
///
/// The budget defaults to uniform `1/n` (equal risk contribution); a caller
/// supplied budget must be non-negative and sum to one.
pub struct RiskParityOptimizer<'a> {
  sigma: &'a Array2<f64>,
  budget: Option<Array1<f64>>,
  solver: AugmentedLagrangianSolver,
}

impl<'a> RiskParityOptimizer<'a> {
  pub fn new(sigma: &'a Array2<f64>, budget: Option<Array1<f64>>) -> Self {
    Self {
      sigma,
      budget,
      solver: AugmentedLagrangianSolver::default(),
    }
  }

  /// Replace the default solver configuration.
  pub fn with_solver(mut self, solver: AugmentedLagrangianSolver) -> Self {
    self.solver = solver;
    self
  }

  /// Solve for the weights whose risk-contribution fractions
  /// `w_i (Σw)_i / w'Σw` match the budget.
  ///
  /// Non-convergence is a hard error for this portfolio: the caller gets
  /// [`PortfolioError::OptimizationFailed`] with the solver diagnostic, not
  /// a fallback weighting.
  pub fn optimize(&self, short_allowed: bool) -> Result<Array1<f64>> {
    metrics::validate_covariance(self.sigma)?;
    let n = self.sigma.nrows();

    let budget = match &self.budget {
      Some(b) => {
        metrics::validate_budget(b, n)?;
        b.clone()
      }
      None => Array1::from_elem(n, 1.0 / n as f64),
    };

    let sigma = self.sigma;
    let objective: ScalarFn<'_> = Box::new(move |w: &[f64]| {
      let var = metrics::variance_of(w, sigma);
      if var < 1e-30 {
        return 1e10;
      }
      let marginal = sigma.dot(&aview1(w));
      let mut err = 0.0;
      for i in 0..w.len() {
        let fraction = w[i] * marginal[i] / var;
        let d = fraction - budget[i];
        err += d * d;
      }
      err
    });

    let problem = ConstrainedProblem::new(
      n,
      objective,
      vec![budget_equality()],
      bounds_for(short_allowed),
    );
    let weights = into_weights(self.solver.minimize(&problem, None))?;
    metrics::risk_contributions(&weights, self.sigma)?;
    Ok(weights)
  }
}

/// Maximum diversification optimizer.
pub struct MaxDiversificationOptimizer<'a> {
  sigma: &'a Array2<f64>,
  solver: AugmentedLagrangianSolver,
}

impl<'a> MaxDiversificationOptimizer<'a> {
  pub fn new(sigma: &'a Array2<f64>) -> Self {
    Self {
      sigma,
      solver: AugmentedLagrangianSolver::default(),
    }
  }

  /// Replace the default solver configuration.
  pub fn with_solver(mut self, solver: AugmentedLagrangianSolver) -> Self {
    self.solver = solver;
    self
  }

  /// Solve for the weights maximizing the diversification ratio
  /// `(w·σ) / sqrt(w'Σw)` with `σ_i = sqrt(Σ_ii)`.
  pub fn optimize(&self, short_allowed: bool) -> Result<Array1<f64>> {
    metrics::validate_covariance(self.sigma)?;
    let n = self.sigma.nrows();

    let asset_vols = metrics::asset_volatilities(self.sigma);
    let sigma = self.sigma;
    let objective: ScalarFn<'_> = Box::new(move |w: &[f64]| {
      let var = metrics::variance_of(w, sigma);
      if var < 1e-30 {
        return 1e10;
      }
      -aview1(w).dot(&asset_vols) / var.sqrt()
    });

    let problem = ConstrainedProblem::new(
      n,
      objective,
      vec![budget_equality()],
      bounds_for(short_allowed),
    );
    let weights = into_weights(self.solver.minimize(&problem, None))?;
    metrics::diversification_ratio(&weights, self.sigma)?;
    Ok(weights)
  }
}
