//! # Constrained Solver
//!
//! $$
//! \mathcal{L}_\rho(\mathbf{w},\lambda)=f(\mathbf{w})+\sum_j\lambda_j c_j(\mathbf{w})+\tfrac{\rho}{2}\sum_j c_j(\mathbf{w})^2
//! $$
//!
//! Minimizes a scalar objective over a weight vector subject to nonlinear
//! equality constraints and optional box bounds. Every portfolio
//! formulation goes through this interface, so the formulations stay
//! decoupled from the solving strategy.
//!
//! The provided implementation runs an augmented Lagrangian outer loop
//! (multiplier updates, penalty escalation) around argmin's L-BFGS with
//! central finite-difference gradients. Bounds enter the Lagrangian as
//! clamped-multiplier inequality terms, so the inner subproblem stays
//! smooth and unconstrained.

use std::time::Instant;

use argmin::core::CostFunction;
use argmin::core::Executor;
use argmin::core::Gradient;
use argmin::solver::gradientdescent::SteepestDescent;
use argmin::solver::linesearch::condition::ArmijoCondition;
use argmin::solver::linesearch::BacktrackingLineSearch;
use argmin::solver::linesearch::MoreThuenteLineSearch;
use argmin::solver::quasinewton::LBFGS;
use impl_new_derive::ImplNew;
use tracing::debug;

/// Scalar function of the weight vector.
pub type ScalarFn<'a> = Box<dyn Fn(&[f64]) -> f64 + Sync + 'a>;

/// Bound shape applied to every weight.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BoundsPolicy {
  /// No bounds: short selling allowed.
  Unbounded,
  /// `0 <= w_i <= 1` for every weight: long-only.
  UnitBox,
}

/// A constrained minimization problem over `n` weights.
///
/// Every equality constraint function is required to equal zero at the
/// solution.
pub struct ConstrainedProblem<'a> {
  pub n: usize,
  pub objective: ScalarFn<'a>,
  pub equalities: Vec<ScalarFn<'a>>,
  pub bounds: BoundsPolicy,
}

impl<'a> ConstrainedProblem<'a> {
  pub fn new(
    n: usize,
    objective: ScalarFn<'a>,
    equalities: Vec<ScalarFn<'a>>,
    bounds: BoundsPolicy,
  ) -> Self {
    Self {
      n,
      objective,
      equalities,
      bounds,
    }
  }
}

/// Tuning knobs for [`AugmentedLagrangianSolver`].
#[derive(Clone, Debug)]
pub struct SolverOptions {
  /// Maximum tolerated equality/bound violation at a converged solution.
  pub constraint_tol: f64,
  /// Maximum tolerated infinity norm of the Lagrangian gradient at a
  /// converged solution.
  pub stationarity_tol: f64,
  /// Gradient norm at which the inner L-BFGS stops.
  pub gradient_tol: f64,
  /// Relative step for central finite differences.
  pub fd_step: f64,
  /// Outer multiplier/penalty iterations.
  pub max_outer_iters: u64,
  /// Inner L-BFGS iterations per outer iteration.
  pub max_inner_iters: u64,
  /// Optional wall-clock cap per solve, in seconds.
  pub max_seconds: Option<f64>,
}

impl Default for SolverOptions {
  fn default() -> Self {
    Self {
      constraint_tol: 1e-8,
      stationarity_tol: 1e-4,
      gradient_tol: 1e-8,
      fd_step: 1e-6,
      max_outer_iters: 30,
      max_inner_iters: 200,
      max_seconds: None,
    }
  }
}

/// Outcome of one constrained solve.
///
/// `weights` is only meaningful when `converged` is true. Non-convergence
/// is a normal, reportable outcome: the solver never panics and never
/// returns an error to the caller.
#[derive(Clone, Debug, Default)]
pub struct SolverResult {
  pub weights: Vec<f64>,
  pub converged: bool,
  /// Human-readable diagnostic from the solve.
  pub message: String,
  pub outer_iters: u64,
  /// Largest equality/bound violation at the final iterate.
  pub constraint_violation: f64,
}

/// Strategy-agnostic interface for constrained minimization.
pub trait ConstrainedSolver {
  /// Minimize `problem`, starting from `x0` or the uniform vector `1/n`.
  ///
  /// Deterministic: fixed inputs and a fixed initial guess reproduce the
  /// result exactly.
  fn minimize(&self, problem: &ConstrainedProblem<'_>, x0: Option<&[f64]>) -> SolverResult;
}

/// Augmented Lagrangian solver backed by argmin's L-BFGS.
#[derive(ImplNew, Clone, Debug)]
pub struct AugmentedLagrangianSolver {
  pub options: SolverOptions,
}

impl Default for AugmentedLagrangianSolver {
  fn default() -> Self {
    Self {
      options: SolverOptions::default(),
    }
  }
}

/// Smooth unconstrained subproblem handed to the inner solver.
#[derive(Clone)]
struct AugLag<'a> {
  problem: &'a ConstrainedProblem<'a>,
  lambda: Vec<f64>,
  mu_lo: Vec<f64>,
  mu_hi: Vec<f64>,
  rho: f64,
  fd_step: f64,
}

/// Shifted quadratic penalty for one inequality `g <= 0` with clamped
/// multiplier `mu`.
fn bound_term(g: f64, mu: f64, rho: f64) -> f64 {
  let shifted = (mu / rho + g).max(0.0);
  0.5 * rho * shifted * shifted - mu * mu / (2.0 * rho)
}

impl AugLag<'_> {
  fn eval(&self, x: &[f64]) -> f64 {
    let mut value = (self.problem.objective)(x);
    for (j, c) in self.problem.equalities.iter().enumerate() {
      let cj = c(x);
      value += self.lambda[j] * cj + 0.5 * self.rho * cj * cj;
    }
    if self.problem.bounds == BoundsPolicy::UnitBox {
      for (i, &xi) in x.iter().enumerate() {
        value += bound_term(-xi, self.mu_lo[i], self.rho);
        value += bound_term(xi - 1.0, self.mu_hi[i], self.rho);
      }
    }
    value
  }

  fn fd_gradient(&self, x: &[f64]) -> Vec<f64> {
    let mut probe = x.to_vec();
    let mut grad = vec![0.0; x.len()];
    for i in 0..x.len() {
      let h = self.fd_step * x[i].abs().max(1.0);
      let orig = probe[i];
      probe[i] = orig + h;
      let f_plus = self.eval(&probe);
      probe[i] = orig - h;
      let f_minus = self.eval(&probe);
      probe[i] = orig;
      grad[i] = (f_plus - f_minus) / (2.0 * h);
    }
    grad
  }
}

impl CostFunction for AugLag<'_> {
  type Param = Vec<f64>;
  type Output = f64;

  fn cost(&self, x: &Self::Param) -> Result<Self::Output, argmin::core::Error> {
    Ok(self.eval(x))
  }
}

impl Gradient for AugLag<'_> {
  type Param = Vec<f64>;
  type Gradient = Vec<f64>;

  fn gradient(&self, x: &Self::Param) -> Result<Self::Gradient, argmin::core::Error> {
    Ok(self.fd_gradient(x))
  }
}

fn violation(problem: &ConstrainedProblem<'_>, x: &[f64]) -> f64 {
  let mut v = 0.0_f64;
  for c in &problem.equalities {
    v = v.max(c(x).abs());
  }
  if problem.bounds == BoundsPolicy::UnitBox {
    for &xi in x {
      v = v.max(-xi).max(xi - 1.0);
    }
  }
  v
}

impl AugmentedLagrangianSolver {
  /// Inner smooth solve. L-BFGS with More-Thuente line search first; if the
  /// line search gives up (noisy finite-difference gradients near a
  /// stationary point), retry once with backtracking steepest descent,
  /// which only needs sufficient decrease.
  fn solve_subproblem(&self, subproblem: &AugLag<'_>, x: &[f64]) -> Vec<f64> {
    let opts = &self.options;

    let linesearch = MoreThuenteLineSearch::new();
    if let Ok(solver) = LBFGS::new(linesearch, 10).with_tolerance_grad(opts.gradient_tol) {
      match Executor::new(subproblem.clone(), solver)
        .configure(|state| state.param(x.to_vec()).max_iters(opts.max_inner_iters))
        .run()
      {
        Ok(res) => {
          if let Some(best) = res.state.best_param {
            return best;
          }
        }
        Err(e) => {
          debug!(error = %e, "L-BFGS stalled, falling back to steepest descent");
        }
      }
    }

    let condition = match ArmijoCondition::new(1e-4) {
      Ok(c) => c,
      Err(_) => return x.to_vec(),
    };
    let solver = SteepestDescent::new(BacktrackingLineSearch::new(condition));
    match Executor::new(subproblem.clone(), solver)
      .configure(|state| state.param(x.to_vec()).max_iters(opts.max_inner_iters))
      .run()
    {
      Ok(res) => res.state.best_param.unwrap_or_else(|| x.to_vec()),
      Err(_) => x.to_vec(),
    }
  }
}

impl ConstrainedSolver for AugmentedLagrangianSolver {
  fn minimize(&self, problem: &ConstrainedProblem<'_>, x0: Option<&[f64]>) -> SolverResult {
    let opts = &self.options;
    let n = problem.n;

    if n == 0 {
      return SolverResult {
        message: "problem has no variables".into(),
        ..SolverResult::default()
      };
    }
    if let Some(guess) = x0 {
      if guess.len() != n {
        return SolverResult {
          message: format!("initial guess has length {}, expected {n}", guess.len()),
          ..SolverResult::default()
        };
      }
    }

    let mut x: Vec<f64> = x0
      .map(|g| g.to_vec())
      .unwrap_or_else(|| vec![1.0 / n as f64; n]);

    let m = problem.equalities.len();
    let mut lambda = vec![0.0; m];
    let mut mu_lo = vec![0.0; n];
    let mut mu_hi = vec![0.0; n];
    let mut rho = 10.0_f64;
    let mut prev_viol = f64::INFINITY;
    let mut viol = violation(problem, &x);

    let start = Instant::now();
    let mut converged = false;
    let mut message = String::new();
    let mut outer_done = 0;

    for outer in 1..=opts.max_outer_iters {
      outer_done = outer;

      if let Some(cap) = opts.max_seconds {
        if start.elapsed().as_secs_f64() > cap {
          message = format!("wall-clock cap of {cap}s exceeded at outer iteration {outer}");
          break;
        }
      }

      let subproblem = AugLag {
        problem,
        lambda: lambda.clone(),
        mu_lo: mu_lo.clone(),
        mu_hi: mu_hi.clone(),
        rho,
        fd_step: opts.fd_step,
      };

      x = self.solve_subproblem(&subproblem, &x);

      viol = violation(problem, &x);
      let grad_inf = subproblem
        .fd_gradient(&x)
        .iter()
        .fold(0.0_f64, |acc, g| acc.max(g.abs()));
      debug!(outer, rho, violation = viol, stationarity = grad_inf, "outer iteration");

      if viol <= opts.constraint_tol && grad_inf <= opts.stationarity_tol {
        converged = true;
        message = format!(
          "converged in {outer} outer iterations: constraint violation {viol:.2e}, stationarity {grad_inf:.2e}"
        );
        break;
      }

      if viol <= 0.25 * prev_viol {
        // Good progress on feasibility: first-order multiplier update.
        for (j, c) in problem.equalities.iter().enumerate() {
          lambda[j] += rho * c(&x);
        }
        if problem.bounds == BoundsPolicy::UnitBox {
          for i in 0..n {
            mu_lo[i] = (mu_lo[i] - rho * x[i]).max(0.0);
            mu_hi[i] = (mu_hi[i] + rho * (x[i] - 1.0)).max(0.0);
          }
        }
        prev_viol = viol;
      } else {
        rho = (rho * 5.0).min(1e8);
      }
    }

    if !converged && message.is_empty() {
      message = format!(
        "no feasible stationary point within {} outer iterations: constraint violation {viol:.2e}",
        opts.max_outer_iters
      );
    }

    if converged && problem.bounds == BoundsPolicy::UnitBox {
      // Strip residual violations below the constraint tolerance.
      for xi in &mut x {
        *xi = xi.clamp(0.0, 1.0);
      }
    }

    SolverResult {
      weights: x,
      converged,
      message,
      outer_iters: outer_done,
      constraint_violation: viol,
    }
  }
}
