//! ETS (Error-Trend-Seasonal) exponential smoothing.
//!
//! Covers additive or multiplicative errors, no/additive/damped trend and
//! no/additive/multiplicative seasonality. States are initialised
//! heuristically from the first observations and the smoothing parameters
//! are estimated by minimising the negative log-likelihood with Nelder-Mead.

use super::spec::{EtsSpec, ErrorType, OptimizerBudget, SeasonalType};
use super::traits::{Forecaster, InformationCriteria};
use crate::core::{Forecast, TimeSeries};
use crate::error::{ForecastError, Result};
use crate::utils::optimization::nelder_mead;
use crate::utils::stats::interval_z;
use serde::Serialize;
use std::f64::consts::PI;

const SMOOTHING_BOUNDS: (f64, f64) = (0.0001, 0.9999);
const DAMPING_BOUNDS: (f64, f64) = (0.8, 0.98);

/// Estimated smoothing parameters. Unused components hold neutral values
/// (`beta = gamma = 0`, `phi = 1`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EtsParams {
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
    pub phi: f64,
}

#[derive(Debug, Clone)]
struct EtsState {
    level: f64,
    trend: f64,
    /// Indexed by absolute position modulo the period.
    seasonals: Vec<f64>,
}

struct FilterOutput {
    fitted: Vec<f64>,
    innovations: Vec<f64>,
    sum_sq: f64,
    sum_log_forecast: f64,
    count: usize,
    state: EtsState,
}

/// ETS state-space model.
#[derive(Debug, Clone)]
pub struct Ets {
    spec: EtsSpec,
    period: usize,
    budget: OptimizerBudget,
    params: Option<EtsParams>,
    state: Option<EtsState>,
    history: Option<TimeSeries>,
    fitted: Option<Vec<f64>>,
    residuals: Option<Vec<f64>>,
    sigma2: Option<f64>,
    criteria: Option<InformationCriteria>,
}

impl Ets {
    /// Create a new ETS model for a series with the given seasonal period.
    pub fn new(spec: EtsSpec, period: usize) -> Self {
        Self {
            spec,
            period: period.max(1),
            budget: OptimizerBudget::default(),
            params: None,
            state: None,
            history: None,
            fitted: None,
            residuals: None,
            sigma2: None,
            criteria: None,
        }
    }

    pub fn with_budget(mut self, budget: OptimizerBudget) -> Self {
        self.budget = budget;
        self
    }

    pub fn spec(&self) -> EtsSpec {
        self.spec
    }

    /// Estimated parameters, once fitted.
    pub fn params(&self) -> Option<EtsParams> {
        self.params
    }

    /// Innovation variance (relative errors for multiplicative error models).
    pub fn sigma2(&self) -> Option<f64> {
        self.sigma2
    }

    fn start_index(&self) -> usize {
        if self.spec.has_seasonal() {
            self.period
        } else {
            1
        }
    }

    fn min_observations(&self) -> usize {
        if self.spec.has_seasonal() {
            2 * self.period
        } else if self.spec.has_trend() {
            3
        } else {
            2
        }
    }

    /// Heuristic initial level, trend and seasonal states.
    fn initial_state(&self, values: &[f64]) -> EtsState {
        let p = self.period;
        let seasonal = self.spec.has_seasonal();

        let level = if seasonal {
            values[..p].iter().sum::<f64>() / p as f64
        } else {
            values[0]
        };

        let trend = if !self.spec.has_trend() {
            0.0
        } else if seasonal {
            (0..p).map(|i| values[p + i] - values[i]).sum::<f64>() / (p * p) as f64
        } else {
            values[1] - values[0]
        };

        let seasonals = match self.spec.seasonal {
            SeasonalType::None => Vec::new(),
            SeasonalType::Additive => values[..p].iter().map(|y| y - level).collect(),
            SeasonalType::Multiplicative => values[..p].iter().map(|y| y / level).collect(),
        };

        EtsState {
            level,
            trend,
            seasonals,
        }
    }

    /// Run the smoothing recursions. Returns `None` when a multiplicative
    /// component leaves its domain.
    fn filter(&self, values: &[f64], params: &EtsParams) -> Option<FilterOutput> {
        let n = values.len();
        let start = self.start_index();
        let mut state = self.initial_state(values);
        let EtsParams {
            alpha,
            beta,
            gamma,
            phi,
        } = *params;

        let mut fitted = vec![f64::NAN; n];
        let mut innovations = vec![f64::NAN; n];
        let mut sum_sq = 0.0;
        let mut sum_log_forecast = 0.0;

        for (t, &y) in values.iter().enumerate().skip(start) {
            let slot = t % self.period;
            let base = state.level + phi * state.trend;
            let s = state.seasonals.get(slot).copied();

            let forecast = match (self.spec.seasonal, s) {
                (SeasonalType::Additive, Some(s)) => base + s,
                (SeasonalType::Multiplicative, Some(s)) => base * s,
                _ => base,
            };
            if !forecast.is_finite() {
                return None;
            }

            let error = y - forecast;
            let innovation = match self.spec.error {
                ErrorType::Additive => error,
                ErrorType::Multiplicative => {
                    if forecast <= 0.0 {
                        return None;
                    }
                    sum_log_forecast += forecast.ln();
                    error / forecast
                }
            };
            fitted[t] = forecast;
            innovations[t] = innovation;
            sum_sq += innovation * innovation;

            let deseasonalized = match (self.spec.seasonal, s) {
                (SeasonalType::Additive, Some(s)) => y - s,
                (SeasonalType::Multiplicative, Some(s)) => y / s,
                _ => y,
            };
            let previous_level = state.level;
            state.level = alpha * deseasonalized + (1.0 - alpha) * base;
            if self.spec.has_trend() {
                state.trend =
                    beta * (state.level - previous_level) + (1.0 - beta) * phi * state.trend;
            }
            match (self.spec.seasonal, s) {
                (SeasonalType::Additive, Some(s)) => {
                    state.seasonals[slot] = gamma * (y - base) + (1.0 - gamma) * s;
                }
                (SeasonalType::Multiplicative, Some(s)) => {
                    if base <= 0.0 {
                        return None;
                    }
                    state.seasonals[slot] = gamma * (y / base) + (1.0 - gamma) * s;
                }
                _ => {}
            }
        }

        Some(FilterOutput {
            fitted,
            innovations,
            sum_sq,
            sum_log_forecast,
            count: n - start,
            state,
        })
    }

    /// Negative log-likelihood up to an additive constant.
    fn objective(&self, values: &[f64], params: &EtsParams) -> f64 {
        match self.filter(values, params) {
            Some(out) if out.count > 0 => {
                let count = out.count as f64;
                let sigma2 = (out.sum_sq / count).max(f64::MIN_POSITIVE);
                0.5 * count * sigma2.ln() + out.sum_log_forecast
            }
            _ => f64::INFINITY,
        }
    }

    /// Map an optimiser vector to parameters for this specification.
    fn unpack(&self, x: &[f64]) -> EtsParams {
        let mut it = x.iter().copied();
        let alpha = it.next().unwrap_or(0.5);
        let beta = if self.spec.has_trend() {
            it.next().unwrap_or(0.1)
        } else {
            0.0
        };
        let gamma = if self.spec.has_seasonal() {
            it.next().unwrap_or(0.1)
        } else {
            0.0
        };
        let phi = if self.spec.is_damped() {
            it.next().unwrap_or(0.98)
        } else {
            1.0
        };
        EtsParams {
            alpha,
            beta,
            gamma,
            phi,
        }
    }

    fn initial_point(&self) -> (Vec<f64>, Vec<(f64, f64)>) {
        let mut x = vec![0.5];
        let mut bounds = vec![SMOOTHING_BOUNDS];
        if self.spec.has_trend() {
            x.push(0.1);
            bounds.push(SMOOTHING_BOUNDS);
        }
        if self.spec.has_seasonal() {
            x.push(0.1);
            bounds.push(SMOOTHING_BOUNDS);
        }
        if self.spec.is_damped() {
            x.push(0.95);
            bounds.push(DAMPING_BOUNDS);
        }
        (x, bounds)
    }

    fn num_smoothing_params(&self) -> usize {
        1 + usize::from(self.spec.has_trend())
            + usize::from(self.spec.has_seasonal())
            + usize::from(self.spec.is_damped())
    }

    /// Smoothing parameters plus initial states.
    fn num_estimated(&self) -> usize {
        let states = 1
            + usize::from(self.spec.has_trend())
            + if self.spec.has_seasonal() { self.period } else { 0 };
        self.num_smoothing_params() + states
    }

    /// Coefficient of the innovation `j` steps back in the h-step error.
    fn psi(&self, params: &EtsParams, j: usize) -> f64 {
        let trend_gain = if self.spec.has_trend() {
            let damped: f64 = if self.spec.is_damped() {
                (1..=j).map(|i| params.phi.powi(i as i32)).sum()
            } else {
                j as f64
            };
            params.beta * damped
        } else {
            0.0
        };
        let seasonal_gain = if self.spec.has_seasonal() && j % self.period == 0 {
            params.gamma
        } else {
            0.0
        };
        params.alpha * (1.0 + trend_gain) + seasonal_gain
    }

    fn validate(&self, values: &[f64]) -> Result<()> {
        if self.spec.has_seasonal() && self.period < 2 {
            return Err(ForecastError::InvalidParameter(format!(
                "{} needs a seasonal period of at least 2",
                self.spec.short_name()
            )));
        }
        let needed = self.min_observations();
        if values.len() < needed {
            return Err(ForecastError::InsufficientData {
                needed,
                got: values.len(),
            });
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(ForecastError::Domain(
                "ETS requires finite observations".to_string(),
            ));
        }
        if self.spec.requires_positive() && values.iter().any(|&v| v <= 0.0) {
            return Err(ForecastError::Domain(format!(
                "{} requires strictly positive data",
                self.spec.short_name()
            )));
        }
        Ok(())
    }
}

fn damped_sum(phi: f64, h: usize) -> f64 {
    if (phi - 1.0).abs() < 1e-10 {
        h as f64
    } else {
        phi * (1.0 - phi.powi(h as i32)) / (1.0 - phi)
    }
}

impl Forecaster for Ets {
    fn fit(&mut self, series: &TimeSeries) -> Result<()> {
        let values = series.values();
        self.validate(values)?;

        let (x0, bounds) = self.initial_point();
        let result = nelder_mead(
            |x| self.objective(values, &self.unpack(x)),
            &x0,
            Some(&bounds),
            self.budget.nelder_mead_config(),
        );
        if !result.converged {
            tracing::debug!(
                model = %self.spec.short_name(),
                iterations = result.iterations,
                timed_out = result.timed_out,
                "ETS optimiser did not converge"
            );
            return Err(ForecastError::NonConvergence {
                iterations: result.iterations,
            });
        }

        let params = self.unpack(&result.optimal_point);
        let out = self.filter(values, &params).ok_or_else(|| {
            ForecastError::ComputationError(format!(
                "{} produced non-positive forecasts at the optimum",
                self.spec.short_name()
            ))
        })?;

        let count = out.count as f64;
        let sigma2 = out.sum_sq / count;
        let log_likelihood =
            -0.5 * count * (1.0 + (2.0 * PI).ln() + sigma2.max(f64::MIN_POSITIVE).ln())
                - out.sum_log_forecast;
        let k = self.num_estimated() as f64;
        self.criteria = Some(InformationCriteria {
            log_likelihood,
            aic: -2.0 * log_likelihood + 2.0 * k,
            aicc: -2.0 * log_likelihood + 2.0 * k * count / (count - k - 1.0).max(1.0),
            bic: -2.0 * log_likelihood + k * count.ln(),
        });

        tracing::debug!(
            model = %self.spec.short_name(),
            alpha = params.alpha,
            beta = params.beta,
            gamma = params.gamma,
            phi = params.phi,
            iterations = result.iterations,
            "ETS fitted"
        );

        self.params = Some(params);
        self.state = Some(out.state);
        self.sigma2 = Some(sigma2);
        self.fitted = Some(out.fitted);
        self.residuals = Some(out.innovations);
        self.history = Some(series.clone());
        Ok(())
    }

    fn predict_with_intervals(&self, horizon: usize, level: f64) -> Result<Forecast> {
        let (Some(state), Some(params), Some(history)) =
            (self.state.as_ref(), self.params.as_ref(), self.history.as_ref())
        else {
            return Err(ForecastError::ComputationError(
                "model must be fitted before forecasting".to_string(),
            ));
        };
        let sigma2 = self.sigma2.unwrap_or(0.0);
        let n = history.len();
        let z = interval_z(level);

        let mut point = Vec::with_capacity(horizon);
        let mut lower = Vec::with_capacity(horizon);
        let mut upper = Vec::with_capacity(horizon);
        let mut psi_sq_sum = 0.0;

        for h in 1..=horizon {
            let trend_term = if self.spec.is_damped() {
                damped_sum(params.phi, h) * state.trend
            } else if self.spec.has_trend() {
                h as f64 * state.trend
            } else {
                0.0
            };
            let base = state.level + trend_term;
            let mean = match self.spec.seasonal {
                SeasonalType::None => base,
                SeasonalType::Additive => base + state.seasonals[(n + h - 1) % self.period],
                SeasonalType::Multiplicative => base * state.seasonals[(n + h - 1) % self.period],
            };

            if h > 1 {
                psi_sq_sum += self.psi(params, h - 1).powi(2);
            }
            let scale = match self.spec.error {
                ErrorType::Additive => 1.0,
                ErrorType::Multiplicative => mean.abs(),
            };
            let se = scale * (sigma2 * (1.0 + psi_sq_sum)).sqrt();

            point.push(mean);
            lower.push(mean - z * se);
            upper.push(mean + z * se);
        }

        Forecast::new(history.future_timestamps(horizon)?, point, lower, upper, level)
    }

    fn fitted_values(&self) -> Option<&[f64]> {
        self.fitted.as_deref()
    }

    fn residuals(&self) -> Option<&[f64]> {
        self.residuals.as_deref()
    }

    fn name(&self) -> &str {
        "ETS"
    }

    fn information_criteria(&self) -> Option<InformationCriteria> {
        self.criteria
    }

    fn num_parameters(&self) -> usize {
        self.num_smoothing_params()
    }
}
