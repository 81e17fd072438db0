use nalgebra::{DMatrix, DVector};
use pair_core::PairError;

/// Smallest-to-largest singular value ratio below which a design matrix is
/// treated as rank deficient.
const CONDITION_TOLERANCE: f64 = 1e-10;

/// Ordinary least squares fit of `y = X b + e`.
#[derive(Debug, Clone)]
pub struct OlsFit {
    pub coefficients: Vec<f64>,
    pub std_errors: Vec<f64>,
    pub residuals: Vec<f64>,
    /// Sum of squared residuals.
    pub ssr: f64,
    pub nobs: usize,
}

impl OlsFit {
    pub fn t_stat(&self, idx: usize) -> Option<f64> {
        let se = *self.std_errors.get(idx)?;
        if se > 0.0 && se.is_finite() {
            Some(self.coefficients[idx] / se)
        } else {
            None
        }
    }

    /// Gaussian AIC up to a constant shared by fits on the same sample.
    pub fn aic(&self) -> f64 {
        let n = self.nobs as f64;
        n * (self.ssr / n).ln() + 2.0 * self.coefficients.len() as f64
    }
}

/// Reject a matrix whose singular values span more than the condition tolerance.
pub fn check_rank(x: &DMatrix<f64>, what: &str) -> Result<(), PairError> {
    let singular = x.clone().svd(false, false).singular_values;
    let max_sv = singular.max();
    let min_sv = singular.min();
    if !(max_sv > 0.0) || min_sv / max_sv < CONDITION_TOLERANCE {
        return Err(PairError::RegressionDegenerate(format!(
            "{} is rank deficient (condition {:.3e})",
            what,
            if min_sv > 0.0 { max_sv / min_sv } else { f64::INFINITY }
        )));
    }
    Ok(())
}

/// Solve an OLS problem, failing with `RegressionDegenerate` on a rank-deficient
/// or ill-conditioned design instead of producing garbage coefficients.
pub fn ols(y: &[f64], x: &DMatrix<f64>) -> Result<OlsFit, PairError> {
    let (n, k) = x.shape();
    if n != y.len() {
        return Err(PairError::RegressionDegenerate(format!(
            "design has {} rows but response has {}",
            n,
            y.len()
        )));
    }
    if k == 0 || n <= k {
        return Err(PairError::RegressionDegenerate(format!(
            "{} observations cannot identify {} coefficients",
            n, k
        )));
    }

    check_rank(x, "design matrix")?;

    let xt = x.transpose();
    let xtx_inv = (&xt * x)
        .try_inverse()
        .ok_or_else(|| PairError::RegressionDegenerate("X'X is singular".to_string()))?;
    let yv = DVector::from_column_slice(y);
    let beta = &xtx_inv * (&xt * &yv);
    let fitted = x * &beta;
    let residuals: Vec<f64> = (yv - fitted).iter().copied().collect();
    let ssr: f64 = residuals.iter().map(|r| r * r).sum();
    let sigma2 = ssr / (n - k) as f64;
    let std_errors = (0..k).map(|i| (sigma2 * xtx_inv[(i, i)]).max(0.0).sqrt()).collect();

    let coefficients: Vec<f64> = beta.iter().copied().collect();
    if coefficients.iter().any(|c| !c.is_finite()) {
        return Err(PairError::RegressionDegenerate("non-finite coefficient".to_string()));
    }

    Ok(OlsFit {
        coefficients,
        std_errors,
        residuals,
        ssr,
        nobs: n,
    })
}

/// Fit `y = alpha + beta * x + e`. Returns (alpha, beta, residuals).
pub fn linear_fit(y: &[f64], x: &[f64]) -> Result<(f64, f64, Vec<f64>), PairError> {
    let design = DMatrix::from_fn(x.len(), 2, |r, c| if c == 0 { 1.0 } else { x[r] });
    let fit = ols(y, &design)?;
    Ok((fit.coefficients[0], fit.coefficients[1], fit.residuals))
}
