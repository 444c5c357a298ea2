//! Maximum-likelihood logistic regression.
//!
//! Newton-Raphson (equivalently IRLS) with step-halving on the log-likelihood:
//!   beta <- beta + (X'WX)^{-1} X'(y - mu),  W = diag(mu * (1 - mu))
//! Standard errors come from the inverse observed information at the optimum,
//! and Wald z statistics are tested against a standard normal.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use statrs::function::erf::erfc;
use std::f64::consts::SQRT_2;
use thiserror::Error;

/// Convergence and degeneracy controls.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogisticConfig {
    /// Maximum Newton iterations.
    pub max_iter: usize,
    /// Convergence tolerance on the largest coefficient change.
    pub tol: f64,
    /// Fitted probabilities this close to every response mean perfect separation.
    pub separation_eps: f64,
    /// Linear predictor magnitude treated as saturated when the fit does not converge.
    pub saturation_eta: f64,
    /// Cholesky pivots below this fraction of their diagonal are singular.
    pub singular_tol: f64,
}

impl Default for LogisticConfig {
    fn default() -> Self {
        Self {
            max_iter: 35,
            tol: 1e-8,
            separation_eps: 1e-8,
            saturation_eta: 30.0,
            singular_tol: 1e-10,
        }
    }
}

/// Why a fit produced no estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FitFailure {
    #[error("response has a single class")]
    ConstantResponse,
    #[error("response is perfectly separated by the predictors")]
    PerfectSeparation,
    #[error("design matrix is singular")]
    SingularDesign,
    #[error("did not converge within {0} iterations")]
    NotConverged(usize),
    #[error("non-finite estimate")]
    NonFinite,
    #[error("design has {rows} rows but the response has {len}")]
    DimensionMismatch { rows: usize, len: usize },
}

impl FitFailure {
    /// Short reason code written to result tables.
    pub fn code(&self) -> &'static str {
        match self {
            FitFailure::ConstantResponse => "constant_response",
            FitFailure::PerfectSeparation => "perfect_separation",
            FitFailure::SingularDesign => "singular_design",
            FitFailure::NotConverged(_) => "not_converged",
            FitFailure::NonFinite => "non_finite",
            FitFailure::DimensionMismatch { .. } => "dimension_mismatch",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogisticFit {
    pub coefficients: Vec<f64>,
    pub standard_errors: Vec<f64>,
    pub z_values: Vec<f64>,
    pub p_values: Vec<f64>,
    pub log_likelihood: f64,
    pub iterations: usize,
}

/// Lower-triangular Cholesky factor of a symmetric positive-definite matrix.
#[derive(Debug, Clone)]
pub struct Cholesky {
    l: Array2<f64>,
}

impl Cholesky {
    pub fn new(a: &Array2<f64>, rel_tol: f64) -> Result<Self, FitFailure> {
        let p = a.nrows();
        if a.ncols() != p {
            return Err(FitFailure::DimensionMismatch {
                rows: p,
                len: a.ncols(),
            });
        }
        let mut l = Array2::<f64>::zeros((p, p));
        for j in 0..p {
            let diag = a[[j, j]];
            let mut pivot = diag;
            for k in 0..j {
                pivot -= l[[j, k]] * l[[j, k]];
            }
            // pivot / diag is 1 - R² of column j on the preceding columns
            if !pivot.is_finite() || diag <= 0.0 || pivot <= rel_tol * diag {
                return Err(FitFailure::SingularDesign);
            }
            let ljj = pivot.sqrt();
            l[[j, j]] = ljj;
            for i in (j + 1)..p {
                let mut s = a[[i, j]];
                for k in 0..j {
                    s -= l[[i, k]] * l[[j, k]];
                }
                l[[i, j]] = s / ljj;
            }
        }
        Ok(Cholesky { l })
    }

    /// Solves `A x = b`.
    pub fn solve(&self, b: &Array1<f64>) -> Array1<f64> {
        let p = self.l.nrows();
        let mut z = Array1::<f64>::zeros(p);
        for i in 0..p {
            let mut s = b[i];
            for k in 0..i {
                s -= self.l[[i, k]] * z[k];
            }
            z[i] = s / self.l[[i, i]];
        }
        let mut x = Array1::<f64>::zeros(p);
        for i in (0..p).rev() {
            let mut s = z[i];
            for k in (i + 1)..p {
                s -= self.l[[k, i]] * x[k];
            }
            x[i] = s / self.l[[i, i]];
        }
        x
    }

    /// Diagonal of `A^{-1}`.
    pub fn inverse_diagonal(&self) -> Array1<f64> {
        let p = self.l.nrows();
        let mut diag = Array1::<f64>::zeros(p);
        for j in 0..p {
            let mut e = Array1::<f64>::zeros(p);
            e[j] = 1.0;
            diag[j] = self.solve(&e)[j];
        }
        diag
    }
}

#[inline]
fn logistic(eta: f64) -> f64 {
    if eta >= 0.0 {
        1.0 / (1.0 + (-eta).exp())
    } else {
        let z = eta.exp();
        z / (1.0 + z)
    }
}

/// log(1 + exp(eta)) without overflow.
#[inline]
fn softplus(eta: f64) -> f64 {
    eta.max(0.0) + (-eta.abs()).exp().ln_1p()
}

fn log_likelihood(eta: &Array1<f64>, y: ArrayView1<f64>) -> f64 {
    eta.iter()
        .zip(y.iter())
        .map(|(&e, &yi)| yi * e - softplus(e))
        .sum()
}

/// X' diag(w) X
fn weighted_gram(x: ArrayView2<f64>, w: &Array1<f64>) -> Array2<f64> {
    let xw = &x * &w.view().insert_axis(Axis(1));
    x.t().dot(&xw)
}

/// Two-sided p-value of a standard normal statistic.
pub fn normal_two_sided_p(z: f64) -> f64 {
    erfc(z.abs() / SQRT_2).clamp(0.0, 1.0)
}

/// Fits `y ~ x` by maximum likelihood. `x` must already contain any intercept
/// column; `y` must be coded 0/1.
pub fn fit_logistic(
    x: ArrayView2<f64>,
    y: ArrayView1<f64>,
    config: &LogisticConfig,
) -> Result<LogisticFit, FitFailure> {
    let n = y.len();
    let p = x.ncols();
    if x.nrows() != n {
        return Err(FitFailure::DimensionMismatch {
            rows: x.nrows(),
            len: n,
        });
    }
    if n <= p {
        return Err(FitFailure::SingularDesign);
    }
    let cases = y.iter().filter(|&&v| v == 1.0).count();
    if cases == 0 || cases == n {
        return Err(FitFailure::ConstantResponse);
    }

    let mut beta = Array1::<f64>::zeros(p);
    let mut eta = x.dot(&beta);
    let mut ll = log_likelihood(&eta, y);

    for iter in 1..=config.max_iter {
        let mu = eta.mapv(logistic);
        let w = mu.mapv(|m| m * (1.0 - m));
        let score = x.t().dot(&(&y - &mu));
        let info = weighted_gram(x, &w);
        let delta = match Cholesky::new(&info, config.singular_tol) {
            Ok(chol) => chol.solve(&score),
            // Collapsed weights under a diverging fit look like collinearity
            Err(FitFailure::SingularDesign) if is_saturated(&eta, &mu, config) => {
                return Err(FitFailure::PerfectSeparation);
            }
            Err(failure) => return Err(failure),
        };

        // Step-halving keeps the log-likelihood non-decreasing
        let mut step = 1.0;
        let (candidate, candidate_eta, candidate_ll) = loop {
            let candidate = &beta + &(&delta * step);
            let candidate_eta = x.dot(&candidate);
            let candidate_ll = log_likelihood(&candidate_eta, y);
            if candidate_ll >= ll - 1e-12 * (1.0 + ll.abs()) {
                break (candidate, candidate_eta, candidate_ll);
            }
            if step < 1e-6 {
                return Err(FitFailure::NotConverged(iter));
            }
            step *= 0.5;
        };
        if !candidate_ll.is_finite() || candidate.iter().any(|b| !b.is_finite()) {
            return Err(FitFailure::NonFinite);
        }

        // Convergence is judged on the full Newton step
        let max_change = delta.iter().fold(0.0_f64, |acc, d| acc.max(d.abs()));
        beta = candidate;
        eta = candidate_eta;
        ll = candidate_ll;

        let perfect = eta
            .iter()
            .zip(y.iter())
            .all(|(&e, &yi)| (yi - logistic(e)).abs() < config.separation_eps);
        if perfect {
            return Err(FitFailure::PerfectSeparation);
        }

        if max_change < config.tol {
            return finish_fit(x, beta, &eta, ll, iter, config);
        }
    }

    if eta.iter().any(|e| e.abs() > config.saturation_eta) {
        Err(FitFailure::PerfectSeparation)
    } else {
        Err(FitFailure::NotConverged(config.max_iter))
    }
}

/// True when some linear predictor is beyond the saturation bound or some
/// fitted probability sits within `separation_eps` of 0 or 1.
fn is_saturated(eta: &Array1<f64>, mu: &Array1<f64>, config: &LogisticConfig) -> bool {
    eta.iter().any(|e| e.abs() > config.saturation_eta)
        || mu
            .iter()
            .any(|&m| m < config.separation_eps || m > 1.0 - config.separation_eps)
}

fn finish_fit(
    x: ArrayView2<f64>,
    beta: Array1<f64>,
    eta: &Array1<f64>,
    log_likelihood: f64,
    iterations: usize,
    config: &LogisticConfig,
) -> Result<LogisticFit, FitFailure> {
    let w = eta.mapv(|e| {
        let m = logistic(e);
        m * (1.0 - m)
    });
    let info = weighted_gram(x, &w);
    let variances = match Cholesky::new(&info, config.singular_tol) {
        Ok(chol) => chol.inverse_diagonal(),
        Err(FitFailure::SingularDesign) if is_saturated(eta, &eta.mapv(logistic), config) => {
            return Err(FitFailure::PerfectSeparation);
        }
        Err(failure) => return Err(failure),
    };

    let standard_errors: Vec<f64> = variances.iter().map(|v| v.max(0.0).sqrt()).collect();
    if standard_errors.iter().any(|s| !s.is_finite() || *s <= 0.0) {
        return Err(FitFailure::NonFinite);
    }
    let coefficients = beta.to_vec();
    let z_values: Vec<f64> = coefficients
        .iter()
        .zip(&standard_errors)
        .map(|(b, s)| b / s)
        .collect();
    let p_values = z_values.iter().map(|&z| normal_two_sided_p(z)).collect();

    Ok(LogisticFit {
        coefficients,
        standard_errors,
        z_values,
        p_values,
        log_likelihood,
        iterations,
    })
}
