//! Johansen trace and maximum-eigenvalue tests for a two-variable system,
//! with a constant and one lagged difference.

use nalgebra::{DMatrix, SymmetricEigen};
use pair_core::PairError;

use crate::regression::check_rank;

/// 90/95/99% trace critical values for the null rank r = 0 and r <= 1.
const TRACE_CRITICAL: [[f64; 3]; 2] = [[13.4294, 15.4943, 19.9349], [2.7055, 3.8415, 6.6349]];
/// 90/95/99% maximum-eigenvalue critical values for r = 0 and r <= 1.
const MAX_EIG_CRITICAL: [[f64; 3]; 2] = [[12.2971, 14.2639, 18.52], [2.7055, 3.8415, 6.6349]];

pub const MIN_JOHANSEN_OBSERVATIONS: usize = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct JohansenResult {
    /// Eigenvalues, largest first.
    pub eigenvalues: [f64; 2],
    /// Trace statistics for r = 0 and r <= 1.
    pub trace: [f64; 2],
    pub max_eigen: [f64; 2],
    /// Cointegrating vector for the largest eigenvalue, as (first, second) weights.
    pub vector: [f64; 2],
    pub nobs: usize,
}

impl JohansenResult {
    /// `a - hedge_ratio * b` is the stationary combination.
    pub fn hedge_ratio(&self) -> Option<f64> {
        let [w1, w2] = self.vector;
        if w1.abs() < 1e-12 {
            return None;
        }
        let beta = -w2 / w1;
        beta.is_finite().then_some(beta)
    }

    /// Coarse significance of the r = 0 trace statistic: the smallest tabulated
    /// level it clears, or 1.0 when it clears none.
    pub fn trace_pvalue(&self) -> f64 {
        bucket(self.trace[0], &TRACE_CRITICAL[0])
    }

    pub fn max_eigen_pvalue(&self) -> f64 {
        bucket(self.max_eigen[0], &MAX_EIG_CRITICAL[0])
    }

    pub fn trace_critical(rank: usize) -> Option<[f64; 3]> {
        TRACE_CRITICAL.get(rank).copied()
    }
}

fn bucket(stat: f64, critical: &[f64; 3]) -> f64 {
    if stat > critical[2] {
        0.01
    } else if stat > critical[1] {
        0.05
    } else if stat > critical[0] {
        0.10
    } else {
        1.0
    }
}

fn demean(m: &mut DMatrix<f64>) {
    for mut col in m.column_iter_mut() {
        let mean = col.mean();
        col.add_scalar_mut(-mean);
    }
}

fn residualize(y: &DMatrix<f64>, z: &DMatrix<f64>, zz_inv: &DMatrix<f64>) -> DMatrix<f64> {
    let coef = zz_inv * (z.transpose() * y);
    y - z * coef
}

pub fn johansen_test(a: &[f64], b: &[f64]) -> Result<JohansenResult, PairError> {
    if a.len() != b.len() {
        return Err(PairError::InvalidSeries(format!(
            "Johansen inputs differ in length ({} vs {})",
            a.len(),
            b.len()
        )));
    }
    if a.len() < MIN_JOHANSEN_OBSERVATIONS {
        return Err(PairError::InsufficientHistory {
            required: MIN_JOHANSEN_OBSERVATIONS,
            actual: a.len(),
        });
    }

    // Rows t = 1..n-2 in difference space: dx[t], dx[t-1] and the level x[t].
    let n = a.len();
    let t_obs = n - 2;
    let diff = |s: &[f64], t: usize| s[t + 1] - s[t];
    let mut dx = DMatrix::from_fn(t_obs, 2, |r, c| if c == 0 { diff(a, r + 1) } else { diff(b, r + 1) });
    let mut z = DMatrix::from_fn(t_obs, 2, |r, c| if c == 0 { diff(a, r) } else { diff(b, r) });
    let mut lx = DMatrix::from_fn(t_obs, 2, |r, c| if c == 0 { a[r + 1] } else { b[r + 1] });
    demean(&mut dx);
    demean(&mut z);
    demean(&mut lx);

    let degenerate = |what: &str| PairError::RegressionDegenerate(format!("Johansen: {} is singular", what));
    check_rank(&z, "Johansen lagged differences")?;
    check_rank(&lx, "Johansen levels")?;

    let zz_inv = (z.transpose() * &z).try_inverse().ok_or_else(|| degenerate("lagged difference moment matrix"))?;
    let r0 = residualize(&dx, &z, &zz_inv);
    let rk = residualize(&lx, &z, &zz_inv);

    let scale = 1.0 / t_obs as f64;
    let s00 = r0.transpose() * &r0 * scale;
    let s0k = r0.transpose() * &rk * scale;
    let skk = rk.transpose() * &rk * scale;

    let s00_inv = s00.try_inverse().ok_or_else(|| degenerate("S00"))?;
    let chol = skk.cholesky().ok_or_else(|| degenerate("Skk"))?;
    let l_inv = chol.l().try_inverse().ok_or_else(|| degenerate("Cholesky factor of Skk"))?;

    let product = &l_inv * s0k.transpose() * &s00_inv * &s0k * l_inv.transpose();
    let symmetric = (&product + product.transpose()) * 0.5;
    let eigen = SymmetricEigen::new(symmetric);

    let mut order: Vec<usize> = (0..2).collect();
    order.sort_by(|&i, &j| eigen.eigenvalues[j].total_cmp(&eigen.eigenvalues[i]));
    let lambda = |k: usize| eigen.eigenvalues[order[k]].clamp(0.0, 1.0 - 1e-12);
    let eigenvalues = [lambda(0), lambda(1)];
    if eigenvalues.iter().any(|v| !v.is_finite()) {
        return Err(degenerate("eigen decomposition"));
    }

    let w = eigen.eigenvectors.column(order[0]).into_owned();
    let v = l_inv.transpose() * w;

    let t = t_obs as f64;
    let ln1m = |l: f64| (1.0 - l).ln();
    let trace = [-t * (ln1m(eigenvalues[0]) + ln1m(eigenvalues[1])), -t * ln1m(eigenvalues[1])];
    let max_eigen = [-t * ln1m(eigenvalues[0]), -t * ln1m(eigenvalues[1])];

    Ok(JohansenResult {
        eigenvalues,
        trace,
        max_eigen,
        vector: [v[0], v[1]],
        nobs: t_obs,
    })
}
