//! Clamped cubic spline
//!
//! Piecewise cubic `a + b*dx + c*dx^2 + d*dx^3` through the knots with the
//! first derivative prescribed at both ends. The `c` coefficients solve a
//! tridiagonal system assembled as a dense matrix, as the path spline this
//! is derived from does.

use nalgebra::{DMatrix, DVector};

use crate::common::{PlannerError, PlannerResult};

#[derive(Debug, Clone)]
pub struct CubicSpline {
    a: Vec<f64>,
    b: Vec<f64>,
    c: Vec<f64>,
    d: Vec<f64>,
    x: Vec<f64>,
}

impl CubicSpline {
    /// Spline through `(x[i], y[i])` with slopes `start_slope` and `end_slope` at the ends
    pub fn clamped(x: &[f64], y: &[f64], start_slope: f64, end_slope: f64) -> PlannerResult<Self> {
        if x.len() < 2 || x.len() != y.len() {
            return Err(PlannerError::NumericalError(format!(
                "spline needs matching knots and values, got {} and {}",
                x.len(),
                y.len()
            )));
        }
        let h: Vec<f64> = x.windows(2).map(|w| w[1] - w[0]).collect();
        if h.iter().any(|&hi| !(hi > 0.0)) {
            return Err(PlannerError::NumericalError("spline knots must be strictly increasing".to_string()));
        }

        let a = y.to_vec();
        let a_mat = Self::calc_a(&h);
        let b_vec = Self::calc_b(&h, &a, start_slope, end_slope);
        let c_vec = a_mat
            .lu()
            .solve(&b_vec)
            .ok_or_else(|| PlannerError::NumericalError("singular spline system".to_string()))?;
        let c: Vec<f64> = c_vec.iter().copied().collect();

        let mut b = Vec::with_capacity(h.len());
        let mut d = Vec::with_capacity(h.len());
        for i in 0..h.len() {
            d.push((c[i + 1] - c[i]) / (3.0 * h[i]));
            b.push((a[i + 1] - a[i]) / h[i] - h[i] * (c[i + 1] + 2.0 * c[i]) / 3.0);
        }

        Ok(Self { a, b, c, d, x: x.to_vec() })
    }

    pub fn knots(&self) -> &[f64] {
        &self.x
    }

    /// Value at `t`, clamped to the knot range
    pub fn calc(&self, t: f64) -> f64 {
        let (i, dx) = self.locate(t);
        self.a[i] + self.b[i] * dx + self.c[i] * dx.powi(2) + self.d[i] * dx.powi(3)
    }

    pub fn calcd(&self, t: f64) -> f64 {
        let (i, dx) = self.locate(t);
        self.b[i] + 2.0 * self.c[i] * dx + 3.0 * self.d[i] * dx.powi(2)
    }

    pub fn calcdd(&self, t: f64) -> f64 {
        let (i, dx) = self.locate(t);
        2.0 * self.c[i] + 6.0 * self.d[i] * dx
    }

    fn locate(&self, t: f64) -> (usize, f64) {
        let first = self.x[0];
        let last = self.x[self.x.len() - 1];
        let t = t.clamp(first, last);
        let i = self.search_index(t);
        (i, t - self.x[i])
    }

    /// Segment containing `t`
    fn search_index(&self, t: f64) -> usize {
        let segments = self.x.len() - 1;
        let i = self.x.partition_point(|&knot| knot <= t);
        i.saturating_sub(1).min(segments - 1)
    }

    fn calc_a(h: &[f64]) -> DMatrix<f64> {
        let nx = h.len() + 1;
        let mut a = DMatrix::zeros(nx, nx);
        a[(0, 0)] = 2.0 * h[0];
        a[(0, 1)] = h[0];
        for i in 1..nx - 1 {
            a[(i, i - 1)] = h[i - 1];
            a[(i, i)] = 2.0 * (h[i - 1] + h[i]);
            a[(i, i + 1)] = h[i];
        }
        a[(nx - 1, nx - 2)] = h[nx - 2];
        a[(nx - 1, nx - 1)] = 2.0 * h[nx - 2];
        a
    }

    fn calc_b(h: &[f64], a: &[f64], start_slope: f64, end_slope: f64) -> DVector<f64> {
        let nx = h.len() + 1;
        let mut b = DVector::zeros(nx);
        b[0] = 3.0 * ((a[1] - a[0]) / h[0] - start_slope);
        for i in 1..nx - 1 {
            b[i] = 3.0 * (a[i + 1] - a[i]) / h[i] - 3.0 * (a[i] - a[i - 1]) / h[i - 1];
        }
        b[nx - 1] = 3.0 * (end_slope - (a[nx - 1] - a[nx - 2]) / h[nx - 2]);
        b
    }
}
