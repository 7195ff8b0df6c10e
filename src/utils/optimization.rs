//! Bounded optimizers used for parameter estimation.
//!
//! [`nelder_mead`] handles the multi-parameter smoothing fits and
//! [`brent_minimize`] the one-dimensional transform parameter search.

use std::cmp::Ordering;
use std::time::{Duration, Instant};

/// Result of Nelder-Mead optimization.
#[derive(Debug, Clone)]
pub struct NelderMeadResult {
    /// The optimal point found.
    pub optimal_point: Vec<f64>,
    /// The objective function value at the optimal point.
    pub optimal_value: f64,
    /// Number of iterations performed.
    pub iterations: usize,
    /// Whether the simplex converged within tolerance.
    pub converged: bool,
    /// Whether the wall-clock budget was exhausted.
    pub timed_out: bool,
}

/// Configuration for Nelder-Mead optimization.
#[derive(Debug, Clone)]
pub struct NelderMeadConfig {
    /// Maximum number of iterations.
    pub max_iter: usize,
    /// Convergence tolerance on the spread of objective values.
    pub tolerance: f64,
    /// Reflection coefficient (default: 1.0).
    pub alpha: f64,
    /// Expansion coefficient (default: 2.0).
    pub gamma: f64,
    /// Contraction coefficient (default: 0.5).
    pub rho: f64,
    /// Shrinkage coefficient (default: 0.5).
    pub sigma: f64,
    /// Initial simplex step size (default: 0.05).
    pub initial_step: f64,
    /// Optional wall-clock limit.
    pub time_budget: Option<Duration>,
}

impl Default for NelderMeadConfig {
    fn default() -> Self {
        Self {
            max_iter: 1000,
            tolerance: 1e-8,
            alpha: 1.0,
            gamma: 2.0,
            rho: 0.5,
            sigma: 0.5,
            initial_step: 0.05,
            time_budget: None,
        }
    }
}

impl NelderMeadConfig {
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_time_budget(mut self, budget: Duration) -> Self {
        self.time_budget = Some(budget);
        self
    }
}

/// Minimize `objective` with the Nelder-Mead simplex method.
///
/// Every candidate point is clamped into `bounds` before evaluation. Stops
/// when the objective spread or simplex size falls below tolerance, when
/// `max_iter` is reached, or when the time budget runs out.
///
/// # Example
/// ```
/// use forecast_pipeline::utils::optimization::{nelder_mead, NelderMeadConfig};
///
/// let result = nelder_mead(
///     |x| (x[0] - 2.0).powi(2) + (x[1] - 3.0).powi(2),
///     &[0.0, 0.0],
///     None,
///     NelderMeadConfig::default(),
/// );
///
/// assert!(result.converged);
/// assert!((result.optimal_point[0] - 2.0).abs() < 0.01);
/// ```
pub fn nelder_mead<F>(
    objective: F,
    initial: &[f64],
    bounds: Option<&[(f64, f64)]>,
    config: NelderMeadConfig,
) -> NelderMeadResult
where
    F: Fn(&[f64]) -> f64,
{
    let dim = initial.len();
    if dim == 0 {
        return NelderMeadResult {
            optimal_point: vec![],
            optimal_value: f64::NAN,
            iterations: 0,
            converged: false,
            timed_out: false,
        };
    }

    let started = Instant::now();
    let eval = |p: &[f64]| {
        let v = objective(p);
        if v.is_nan() {
            f64::INFINITY
        } else {
            v
        }
    };

    let start = clamp_to_bounds(initial, bounds);
    let mut simplex: Vec<Vec<f64>> = vec![start.clone()];
    for i in 0..dim {
        let mut vertex = start.clone();
        vertex[i] += if start[i].abs() > 1e-10 {
            config.initial_step * start[i].abs()
        } else {
            config.initial_step
        };
        simplex.push(clamp_to_bounds(&vertex, bounds));
    }
    let mut values: Vec<f64> = simplex.iter().map(|v| eval(v)).collect();

    let mut iterations = 0;
    let mut converged = false;
    let mut timed_out = false;

    while iterations < config.max_iter {
        if let Some(budget) = config.time_budget {
            if started.elapsed() >= budget {
                timed_out = true;
                break;
            }
        }
        iterations += 1;

        let mut order: Vec<usize> = (0..=dim).collect();
        order.sort_by(|&a, &b| values[a].partial_cmp(&values[b]).unwrap_or(Ordering::Equal));
        let best = order[0];
        let worst = order[dim];
        let second_worst = order[dim - 1];

        if values[worst] - values[best] < config.tolerance {
            converged = true;
            break;
        }

        let centroid = centroid_excluding(&simplex, worst);
        let spread = simplex
            .iter()
            .map(|v| distance(v, &centroid))
            .fold(0.0, f64::max);
        if spread < config.tolerance {
            converged = true;
            break;
        }

        let reflected = clamp_to_bounds(&towards(&centroid, &simplex[worst], -config.alpha), bounds);
        let f_reflected = eval(&reflected);

        if f_reflected < values[best] {
            let expanded = clamp_to_bounds(&towards(&centroid, &reflected, config.gamma), bounds);
            let f_expanded = eval(&expanded);
            if f_expanded < f_reflected {
                simplex[worst] = expanded;
                values[worst] = f_expanded;
            } else {
                simplex[worst] = reflected;
                values[worst] = f_reflected;
            }
            continue;
        }

        if f_reflected < values[second_worst] {
            simplex[worst] = reflected;
            values[worst] = f_reflected;
            continue;
        }

        let (target, f_target) = if f_reflected < values[worst] {
            (reflected, f_reflected)
        } else {
            (simplex[worst].clone(), values[worst])
        };
        let contracted = clamp_to_bounds(&towards(&centroid, &target, config.rho), bounds);
        let f_contracted = eval(&contracted);
        if f_contracted < f_target {
            simplex[worst] = contracted;
            values[worst] = f_contracted;
            continue;
        }

        let anchor = simplex[best].clone();
        for i in (0..=dim).filter(|&i| i != best) {
            let shrunk: Vec<f64> = anchor
                .iter()
                .zip(&simplex[i])
                .map(|(a, x)| a + config.sigma * (x - a))
                .collect();
            simplex[i] = clamp_to_bounds(&shrunk, bounds);
            values[i] = eval(&simplex[i]);
        }
    }

    let best = values
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(Ordering::Equal))
        .map(|(i, _)| i)
        .unwrap_or(0);

    NelderMeadResult {
        optimal_point: simplex[best].clone(),
        optimal_value: values[best],
        iterations,
        converged,
        timed_out,
    }
}

/// Result of a one-dimensional bounded minimization.
#[derive(Debug, Clone, Copy)]
pub struct BrentResult {
    pub x: f64,
    pub value: f64,
    pub iterations: usize,
    pub converged: bool,
}

/// Minimize a univariate function on `[lower, upper]` with Brent's method.
///
/// Combines golden-section steps with parabolic interpolation. NaN objective
/// values are treated as `+inf`.
pub fn brent_minimize<F>(
    objective: F,
    lower: f64,
    upper: f64,
    tolerance: f64,
    max_iter: usize,
) -> BrentResult
where
    F: Fn(f64) -> f64,
{
    const GOLDEN: f64 = 0.381_966_011_250_105_1;
    const EPS: f64 = 1e-10;

    let f = |x: f64| {
        let v = objective(x);
        if v.is_nan() {
            f64::INFINITY
        } else {
            v
        }
    };

    let (mut a, mut b) = if lower <= upper {
        (lower, upper)
    } else {
        (upper, lower)
    };
    let mut x = a + GOLDEN * (b - a);
    let (mut w, mut v) = (x, x);
    let mut fx = f(x);
    let (mut fw, mut fv) = (fx, fx);
    let mut d: f64 = 0.0;
    let mut e: f64 = 0.0;

    let mut iterations = 0;
    let mut converged = false;

    while iterations < max_iter {
        let mid = 0.5 * (a + b);
        let tol1 = tolerance * x.abs() + EPS;
        let tol2 = 2.0 * tol1;
        if (x - mid).abs() <= tol2 - 0.5 * (b - a) {
            converged = true;
            break;
        }
        iterations += 1;

        let mut golden_step = true;
        if e.abs() > tol1 {
            let r = (x - w) * (fx - fv);
            let mut q = (x - v) * (fx - fw);
            let mut p = (x - v) * q - (x - w) * r;
            q = 2.0 * (q - r);
            if q > 0.0 {
                p = -p;
            } else {
                q = -q;
            }
            let previous = e;
            e = d;
            if p.abs() < (0.5 * q * previous).abs() && p > q * (a - x) && p < q * (b - x) {
                d = p / q;
                let u = x + d;
                if u - a < tol2 || b - u < tol2 {
                    d = tol1.copysign(mid - x);
                }
                golden_step = false;
            }
        }
        if golden_step {
            e = if x >= mid { a - x } else { b - x };
            d = GOLDEN * e;
        }

        let u = if d.abs() >= tol1 {
            x + d
        } else {
            x + tol1.copysign(d)
        };
        let fu = f(u);

        if fu <= fx {
            if u >= x {
                a = x;
            } else {
                b = x;
            }
            v = w;
            fv = fw;
            w = x;
            fw = fx;
            x = u;
            fx = fu;
        } else {
            if u < x {
                a = u;
            } else {
                b = u;
            }
            if fu <= fw || w == x {
                v = w;
                fv = fw;
                w = u;
                fw = fu;
            } else if fu <= fv || v == x || v == w {
                v = u;
                fv = fu;
            }
        }
    }

    BrentResult {
        x,
        value: fx,
        iterations,
        converged,
    }
}

fn centroid_excluding(simplex: &[Vec<f64>], exclude: usize) -> Vec<f64> {
    let dim = simplex[0].len();
    let count = (simplex.len() - 1) as f64;
    let mut centroid = vec![0.0; dim];
    for vertex in simplex.iter().enumerate().filter(|(i, _)| *i != exclude).map(|(_, v)| v) {
        for (c, x) in centroid.iter_mut().zip(vertex) {
            *c += x;
        }
    }
    centroid.iter_mut().for_each(|c| *c /= count);
    centroid
}

/// `centroid + coef * (point - centroid)`; a negative coefficient reflects.
fn towards(centroid: &[f64], point: &[f64], coef: f64) -> Vec<f64> {
    centroid
        .iter()
        .zip(point)
        .map(|(c, p)| c + coef * (p - c))
        .collect()
}

fn clamp_to_bounds(point: &[f64], bounds: Option<&[(f64, f64)]>) -> Vec<f64> {
    match bounds {
        None => point.to_vec(),
        Some(b) => point
            .iter()
            .enumerate()
            .map(|(i, &x)| b.get(i).map_or(x, |&(lo, hi)| x.clamp(lo, hi)))
            .collect(),
    }
}

fn distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt()
}
