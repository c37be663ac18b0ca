//! # Portfolio Engine
//!
//! $$
//! \mathbf{w}^\* = \operatorname{Optimize}(\mu, \Sigma)
//! $$
//!
//! High-level orchestration API: strategy selection, shared configuration
//! and the per-portfolio statistics consumed downstream.

use ndarray::Array1;
use ndarray::Array2;

use crate::error::PortfolioError;
use crate::error::Result;
use crate::metrics;
use crate::optimizers::MarkowitzOptimizer;
use crate::optimizers::MaxDiversificationOptimizer;
use crate::optimizers::RiskParityOptimizer;
use crate::solver::AugmentedLagrangianSolver;
use crate::solver::SolverOptions;
use crate::types::FrontierPoint;
use crate::types::OptimizedPortfolio;
use crate::types::Strategy;

/// Runtime configuration for [`PortfolioEngine`].
///
/// Everything that would otherwise be a module-wide constant lives here:
/// the risk-free rate, the short-selling toggle, the frontier point count
/// and the solver tuning.
#[derive(Clone, Debug)]
pub struct PortfolioEngineConfig {
  /// Annual risk-free rate used by the tangency objective and Sharpe
  /// computations.
  pub risk_free: f64,
  /// Allow short selling (drops the `[0, 1]` box on every weight).
  pub allow_short: bool,
  /// Grid size for [`PortfolioEngine::frontier`].
  pub frontier_points: usize,
  /// Target risk contributions for risk parity; uniform when `None`.
  pub risk_budget: Option<Array1<f64>>,
  /// Solver tuning shared by every strategy.
  pub solver: SolverOptions,
}

impl Default for PortfolioEngineConfig {
  fn default() -> Self {
    Self {
      risk_free: 0.0,
      allow_short: false,
      frontier_points: 50,
      risk_budget: None,
      solver: SolverOptions::default(),
    }
  }
}

/// Single entry point over the allocation strategies.
#[derive(Clone, Debug)]
pub struct PortfolioEngine {
  config: PortfolioEngineConfig,
}

impl PortfolioEngine {
  /// Construct a new engine with explicit configuration.
  pub fn new(config: PortfolioEngineConfig) -> Self {
    Self { config }
  }

  /// Borrow engine configuration.
  pub fn config(&self) -> &PortfolioEngineConfig {
    &self.config
  }

  fn solver(&self) -> AugmentedLagrangianSolver {
    AugmentedLagrangianSolver::new(self.config.solver.clone())
  }

  /// Optimize weights for `strategy` and assemble the portfolio statistics
  /// reporting consumes: expected return, volatility, Sharpe ratio and
  /// per-asset risk contributions.
  pub fn optimize(
    &self,
    strategy: Strategy,
    mu: &Array1<f64>,
    sigma: &Array2<f64>,
  ) -> Result<OptimizedPortfolio> {
    let allow_short = self.config.allow_short;
    let weights = match strategy {
      Strategy::MinVariance => MarkowitzOptimizer::new(mu, sigma, self.config.risk_free)
        .with_solver(self.solver())
        .min_variance_portfolio(allow_short)?,
      Strategy::MaxSharpe => MarkowitzOptimizer::new(mu, sigma, self.config.risk_free)
        .with_solver(self.solver())
        .tangency_portfolio(allow_short)?,
      Strategy::RiskParity => RiskParityOptimizer::new(sigma, self.config.risk_budget.clone())
        .with_solver(self.solver())
        .optimize(allow_short)?,
      Strategy::MaxDiversification => MaxDiversificationOptimizer::new(sigma)
        .with_solver(self.solver())
        .optimize(allow_short)?,
      Strategy::EqualWeight => {
        metrics::validate_inputs(mu, sigma)?;
        Array1::from_elem(mu.len(), 1.0 / mu.len() as f64)
      }
    };

    let expected_return = metrics::portfolio_return(&weights, mu);
    let volatility = metrics::portfolio_volatility(&weights, sigma)?;
    if volatility <= metrics::VOL_EPS {
      return Err(PortfolioError::DegenerateInput(
        "optimized portfolio has zero volatility".into(),
      ));
    }
    let risk_contributions = metrics::risk_contributions(&weights, sigma)?;

    Ok(OptimizedPortfolio {
      sharpe: (expected_return - self.config.risk_free) / volatility,
      weights,
      expected_return,
      volatility,
      risk_contributions,
    })
  }

  /// Trace the efficient frontier with the configured point count.
  pub fn frontier(&self, mu: &Array1<f64>, sigma: &Array2<f64>) -> Result<Vec<FrontierPoint>> {
    MarkowitzOptimizer::new(mu, sigma, self.config.risk_free)
      .with_solver(self.solver())
      .efficient_frontier(None, self.config.allow_short, self.config.frontier_points)
  }
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use ndarray::arr1;
  use ndarray::arr2;

  use super::*;

  fn scenario() -> (Array1<f64>, Array2<f64>) {
    let mu = arr1(&[0.08, 0.12, 0.10]);
    let sigma = arr2(&[
      [0.04, 0.0, 0.0],
      [0.0, 0.09, 0.0],
      [0.0, 0.0, 0.06],
    ]);
    (mu, sigma)
  }

  fn engine_with_rf(risk_free: f64) -> PortfolioEngine {
    let config = PortfolioEngineConfig {
      risk_free,
      ..PortfolioEngineConfig::default()
    };
    PortfolioEngine::new(config)
  }

  #[test]
  fn end_to_end_min_variance_scenario() {
    let (mu, sigma) = scenario();
    let engine = engine_with_rf(0.02);

    let portfolio = engine.optimize(Strategy::MinVariance, &mu, &sigma).unwrap();

    assert_abs_diff_eq!(portfolio.weights[0], 0.473684, epsilon = 1e-2);
    assert_abs_diff_eq!(portfolio.weights[1], 0.210526, epsilon = 1e-2);
    assert_abs_diff_eq!(portfolio.weights[2], 0.315789, epsilon = 1e-2);
    assert!((portfolio.weights.sum() - 1.0).abs() < 1e-6);

    // Statistics are internally consistent.
    assert_abs_diff_eq!(
      portfolio.sharpe,
      (portfolio.expected_return - 0.02) / portfolio.volatility,
      epsilon = 1e-12
    );
    assert_abs_diff_eq!(
      portfolio.risk_contributions.sum(),
      portfolio.volatility,
      epsilon = 1e-9
    );
  }

  #[test]
  fn every_strategy_produces_a_fully_invested_portfolio() {
    let (mu, sigma) = scenario();
    let engine = engine_with_rf(0.02);

    for strategy in [
      Strategy::MinVariance,
      Strategy::MaxSharpe,
      Strategy::RiskParity,
      Strategy::MaxDiversification,
      Strategy::EqualWeight,
    ] {
      let portfolio = engine.optimize(strategy, &mu, &sigma).unwrap();
      assert!(
        (portfolio.weights.sum() - 1.0).abs() < 1e-6,
        "{strategy:?} violates the budget"
      );
      assert!(portfolio.weights.iter().all(|&w| (0.0..=1.0).contains(&w)));
      assert!(portfolio.volatility > 0.0);
    }
  }

  #[test]
  fn equal_weight_baseline_is_uniform() {
    let (mu, sigma) = scenario();
    let engine = engine_with_rf(0.0);

    let portfolio = engine.optimize(Strategy::EqualWeight, &mu, &sigma).unwrap();
    for &w in portfolio.weights.iter() {
      assert_abs_diff_eq!(w, 1.0 / 3.0, epsilon = 1e-12);
    }
    assert_abs_diff_eq!(portfolio.expected_return, 0.10, epsilon = 1e-12);
  }

  #[test]
  fn risk_budget_flows_through_config() {
    let sigma = arr2(&[[0.04, 0.0], [0.0, 0.01]]);
    let mu = arr1(&[0.08, 0.05]);
    let config = PortfolioEngineConfig {
      risk_budget: Some(arr1(&[0.6, 0.4])),
      ..PortfolioEngineConfig::default()
    };
    let engine = PortfolioEngine::new(config);

    let portfolio = engine.optimize(Strategy::RiskParity, &mu, &sigma).unwrap();
    let fractions = &portfolio.risk_contributions / portfolio.volatility;
    assert_abs_diff_eq!(fractions[0], 0.6, epsilon = 1e-3);
    assert_abs_diff_eq!(fractions[1], 0.4, epsilon = 1e-3);
  }

  #[test]
  fn frontier_uses_configured_point_count() {
    let (mu, sigma) = scenario();
    let config = PortfolioEngineConfig {
      risk_free: 0.02,
      frontier_points: 7,
      ..PortfolioEngineConfig::default()
    };
    let engine = PortfolioEngine::new(config);

    let frontier = engine.frontier(&mu, &sigma).unwrap();
    assert_eq!(frontier.len(), 7);
    for pair in frontier.windows(2) {
      assert!(pair[0].target_return <= pair[1].target_return);
    }
  }

  #[test]
  fn engine_is_deterministic() {
    let (mu, sigma) = scenario();
    let engine = engine_with_rf(0.02);

    let a = engine.optimize(Strategy::RiskParity, &mu, &sigma).unwrap();
    let b = engine.optimize(Strategy::RiskParity, &mu, &sigma).unwrap();
    assert_eq!(a.weights, b.weights);
    assert_eq!(a.volatility, b.volatility);
  }

  #[test]
  fn default_config_matches_documented_defaults() {
    let config = PortfolioEngineConfig::default();
    assert_eq!(config.risk_free, 0.0);
    assert!(!config.allow_short);
    assert_eq!(config.frontier_points, 50);
    assert!(config.risk_budget.is_none());
  }
}
