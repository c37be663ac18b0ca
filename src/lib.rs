//! # portfolio-rs
//!
//! $$
//! \min_{\mathbf{w}}\ \sqrt{\mathbf{w}^\top\Sigma\mathbf{w}} \quad \text{s.t.} \quad \mathbf{1}^\top\mathbf{w}=1,\ \ 0\le w_i\le 1
//! $$
//!
//! Portfolio allocation under the classical quantitative criteria: minimum
//! variance, maximum Sharpe ratio (tangency), equal risk contribution and
//! maximum diversification, plus the mean-variance efficient frontier.
//!
//! The caller supplies annualized expected returns and an annualized
//! covariance matrix aligned to one asset ordering; every solver borrows
//! them read-only and returns a weight vector in the same ordering, or a
//! typed error. All solves are synchronous, deterministic and free of
//! shared mutable state.

pub mod engine;
pub mod error;
pub mod metrics;
pub mod optimizers;
pub mod solver;
pub mod types;

pub use engine::PortfolioEngine;
pub use engine::PortfolioEngineConfig;
pub use error::PortfolioError;
pub use metrics::asset_volatilities;
pub use metrics::diversification_ratio;
pub use metrics::marginal_risk;
pub use metrics::portfolio_return;
pub use metrics::portfolio_volatility;
pub use metrics::risk_contributions;
pub use optimizers::MarkowitzOptimizer;
pub use optimizers::MaxDiversificationOptimizer;
pub use optimizers::RiskParityOptimizer;
pub use solver::AugmentedLagrangianSolver;
pub use solver::BoundsPolicy;
pub use solver::ConstrainedProblem;
pub use solver::ConstrainedSolver;
pub use solver::SolverOptions;
pub use solver::SolverResult;
pub use types::FrontierPoint;
pub use types::OptimizedPortfolio;
pub use types::Strategy;
