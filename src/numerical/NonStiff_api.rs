//! Explicit Runge-Kutta solvers of the initial value problem `y' = f(t, y)`, `y(t0) = y0`.
//!
//! - `RK45`: Dormand-Prince 5(4), adaptive step, error controlled by the 4th order embedded pair
//! - `RK23`: Bogacki-Shampine 3(2), adaptive step
//! - `RK4`: classic fixed step Runge-Kutta
//!
//! Step control follows SciPy's `solve_ivp`: the error is measured in the RMS norm scaled by
//! `atol + max(|y_old|, |y_new|)*rtol`, the step grows by at most 10 and shrinks by at most 5 per
//! attempt. Values at the requested `t_eval` points come from the dense output polynomial of the
//! step that covers them (a cubic Hermite interpolant for the fixed step `RK4`). While sampling,
//! a step never spans more than a tenth of the interval, which keeps the interpolated samples
//! within the requested tolerance.
use crate::numerical::ivp_common::{
    RhsFn, hermite_interpolate, norm, select_initial_step, validate_first_step,
    validate_max_step, validate_tol,
};
use enum_dispatch::enum_dispatch;
use log::{debug, info};
use nalgebra::{DMatrix, DVector};
use std::marker::PhantomData;
use std::time::Instant;
use strum_macros::{Display, EnumIter, EnumString};

const SAFETY: f64 = 0.9;
const MIN_FACTOR: f64 = 0.2;
const MAX_FACTOR: f64 = 10.0;
/// minimum number of steps across the interval when `t_eval` is given
const MIN_SAMPLED_STEPS: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, EnumString, Display, EnumIter)]
pub enum IntegrationMethod {
    #[default]
    RK45,
    RK23,
    RK4,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum IvpError {
    #[error("invalid solver option: {0}")]
    InvalidOption(String),
    #[error("t_eval must be sorted and lie within [{t0}, {t_bound}]")]
    InvalidTEval { t0: f64, t_bound: f64 },
    #[error("right-hand side returned {got} components, expected {expected}")]
    DimensionMismatch { expected: usize, got: usize },
    #[error("right-hand side is not finite at t = {0}")]
    NonFinite(f64),
    #[error("required step size is less than spacing between numbers at t = {0}")]
    StepSizeTooSmall(f64),
    #[error("maximum number of steps ({0}) exceeded at t = {1}")]
    TooManySteps(usize, f64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct IvpOptions {
    pub rtol: f64,
    pub atol: f64,
    pub max_step: f64,
    /// `None` selects the first step automatically
    pub first_step: Option<f64>,
    pub max_steps: usize,
}

impl Default for IvpOptions {
    fn default() -> Self {
        IvpOptions {
            rtol: 1e-3,
            atol: 1e-6,
            max_step: f64::INFINITY,
            first_step: None,
            max_steps: 100_000,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SolverStats {
    /// number of right-hand side evaluations
    pub nfev: usize,
    pub accepted: usize,
    pub rejected: usize,
}

/// Samples of the solution: `y` has one row per point of `t` and one column per variable.
#[derive(Debug, Clone)]
pub struct IvpSolution {
    pub t: DVector<f64>,
    pub y: DMatrix<f64>,
    pub stats: SolverStats,
}

/// The IVP solver as seen by the rest of the crate
pub trait IvpSolve {
    /// Integrates from `t_span.0` to `t_span.1` and samples the solution at `t_eval`
    /// (at every accepted step when `t_eval` is empty).
    fn solve_ivp(
        &self,
        fun: &RhsFn,
        t_span: (f64, f64),
        y0: &DVector<f64>,
        t_eval: &[f64],
        method: IntegrationMethod,
    ) -> Result<IvpSolution, IvpError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Running,
    Finished,
}

/// Last accepted step: enough to interpolate anywhere inside it.
#[derive(Debug, Clone)]
pub struct StepState {
    pub t: f64,
    pub y: DVector<f64>,
    pub f: DVector<f64>,
    pub t_old: f64,
    pub y_old: DVector<f64>,
    pub f_old: DVector<f64>,
    /// dense output coefficients of the last step, one column per power of the step fraction
    pub q: Option<DMatrix<f64>>,
}

impl StepState {
    fn new(t0: f64, y0: DVector<f64>, f0: DVector<f64>) -> Self {
        StepState {
            t: t0,
            y: y0.clone(),
            f: f0.clone(),
            t_old: t0,
            y_old: y0,
            f_old: f0,
            q: None,
        }
    }

    fn advance(
        &mut self,
        t_new: f64,
        y_new: DVector<f64>,
        f_new: DVector<f64>,
        q: Option<DMatrix<f64>>,
    ) {
        self.t_old = self.t;
        self.y_old = std::mem::replace(&mut self.y, y_new);
        self.f_old = std::mem::replace(&mut self.f, f_new);
        self.t = t_new;
        self.q = q;
    }

    pub fn interpolate(&self, t: f64) -> DVector<f64> {
        if t == self.t {
            return self.y.clone();
        }
        match &self.q {
            Some(q) => {
                // y_old + h * sum_j Q[:, j] x^(j+1)
                let h = self.t - self.t_old;
                let x = (t - self.t_old) / h;
                let mut dy = DVector::zeros(self.y_old.len());
                let mut p = x;
                for column in q.column_iter() {
                    dy.axpy(p, &column, 1.0);
                    p *= x;
                }
                &self.y_old + dy * h
            }
            None => hermite_interpolate(
                self.t_old, &self.y_old, &self.f_old, self.t, &self.y, &self.f, t,
            ),
        }
    }
}

#[enum_dispatch]
pub trait Solver {
    /// one accepted step towards `t_bound`
    fn step(&mut self, fun: &RhsFn, t_bound: f64) -> Result<Status, IvpError>;
    fn state(&self) -> &StepState;
    fn stats(&self) -> SolverStats;
}

#[enum_dispatch(Solver)]
pub enum Solvers {
    RK45(DormandPrince),
    RK23(BogackiShampine),
    RK4(ClassicRK4),
}

impl Solvers {
    pub fn new(
        method: IntegrationMethod,
        fun: &RhsFn,
        t0: f64,
        y0: &DVector<f64>,
        t_bound: f64,
        options: &IvpOptions,
    ) -> Result<Solvers, IvpError> {
        let (rtol, atol) = validate_tol(options.rtol, options.atol)?;
        let max_step = validate_max_step(options.max_step)?;
        let first_step = options
            .first_step
            .map(|h| validate_first_step(h, t0, t_bound))
            .transpose()?;
        let f0 = checked_rhs(fun, t0, y0)?;
        let settings = StepSettings {
            rtol,
            atol,
            max_step,
        };
        let solver = match method {
            IntegrationMethod::RK45 => Solvers::RK45(DormandPrince::new(
                fun, t0, y0, f0, t_bound, first_step, settings,
            )),
            IntegrationMethod::RK23 => Solvers::RK23(BogackiShampine::new(
                fun, t0, y0, f0, t_bound, first_step, settings,
            )),
            IntegrationMethod::RK4 => {
                let h = first_step.unwrap_or_else(|| ((t_bound - t0) / 1000.0).min(max_step));
                Solvers::RK4(ClassicRK4::new(t0, y0, f0, h))
            }
        };
        Ok(solver)
    }
}

/// evaluates `f(t, y)` and checks the dimension and finiteness of the result
fn checked_rhs(fun: &RhsFn, t: f64, y: &DVector<f64>) -> Result<DVector<f64>, IvpError> {
    let f = fun(t, y);
    if f.len() != y.len() {
        return Err(IvpError::DimensionMismatch {
            expected: y.len(),
            got: f.len(),
        });
    }
    if f.iter().any(|v| !v.is_finite()) {
        return Err(IvpError::NonFinite(t));
    }
    Ok(f)
}

////////////////////////////////////////////////////////////////////////////////////////
//          ADAPTIVE RUNGE-KUTTA
////////////////////////////////////////////////////////////////////////////////////////

/// Butcher tableau of an embedded explicit pair with the FSAL property.
pub trait ButcherTableau {
    /// order of the error estimator
    const ERROR_ORDER: f64;
    const C: &'static [f64];
    /// rows of the lower triangular matrix `A`, row `i` has `i` entries
    const A: &'static [&'static [f64]];
    const B: &'static [f64];
    /// error weights, one more entry than stages: the last one multiplies `f(t_new, y_new)`
    const E: &'static [f64];
    /// dense output coefficients, one row per stage plus `f(t_new, y_new)`
    const P: &'static [&'static [f64]];
}

pub struct DormandPrince54;

impl ButcherTableau for DormandPrince54 {
    const ERROR_ORDER: f64 = 4.0;
    const C: &'static [f64] = &[0.0, 1.0 / 5.0, 3.0 / 10.0, 4.0 / 5.0, 8.0 / 9.0, 1.0];
    const A: &'static [&'static [f64]] = &[
        &[],
        &[1.0 / 5.0],
        &[3.0 / 40.0, 9.0 / 40.0],
        &[44.0 / 45.0, -56.0 / 15.0, 32.0 / 9.0],
        &[19372.0 / 6561.0, -25360.0 / 2187.0, 64448.0 / 6561.0, -212.0 / 729.0],
        &[
            9017.0 / 3168.0,
            -355.0 / 33.0,
            46732.0 / 5247.0,
            49.0 / 176.0,
            -5103.0 / 18656.0,
        ],
    ];
    const B: &'static [f64] = &[
        35.0 / 384.0,
        0.0,
        500.0 / 1113.0,
        125.0 / 192.0,
        -2187.0 / 6784.0,
        11.0 / 84.0,
    ];
    const E: &'static [f64] = &[
        -71.0 / 57600.0,
        0.0,
        71.0 / 16695.0,
        -71.0 / 1920.0,
        17253.0 / 339200.0,
        -22.0 / 525.0,
        1.0 / 40.0,
    ];
    const P: &'static [&'static [f64]] = &[
        &[
            1.0,
            -8048581381.0 / 2820520608.0,
            8663915743.0 / 2820520608.0,
            -12715105075.0 / 11282082432.0,
        ],
        &[0.0, 0.0, 0.0, 0.0],
        &[
            0.0,
            131558114200.0 / 32700410799.0,
            -68118460800.0 / 10900136933.0,
            87487479700.0 / 32700410799.0,
        ],
        &[
            0.0,
            -1754552775.0 / 470086768.0,
            14199869525.0 / 1410260304.0,
            -10690763975.0 / 1880347072.0,
        ],
        &[
            0.0,
            127303824393.0 / 49829197408.0,
            -318862633887.0 / 49829197408.0,
            701980252875.0 / 199316789632.0,
        ],
        &[
            0.0,
            -282668133.0 / 205662961.0,
            2019193451.0 / 616988883.0,
            -1453857185.0 / 822651844.0,
        ],
        &[
            0.0,
            40617522.0 / 29380423.0,
            -110615467.0 / 29380423.0,
            69997945.0 / 29380423.0,
        ],
    ];
}

pub struct BogackiShampine32;

impl ButcherTableau for BogackiShampine32 {
    const ERROR_ORDER: f64 = 2.0;
    const C: &'static [f64] = &[0.0, 1.0 / 2.0, 3.0 / 4.0];
    const A: &'static [&'static [f64]] = &[&[], &[1.0 / 2.0], &[0.0, 3.0 / 4.0]];
    const B: &'static [f64] = &[2.0 / 9.0, 1.0 / 3.0, 4.0 / 9.0];
    const E: &'static [f64] = &[5.0 / 72.0, -1.0 / 12.0, -1.0 / 9.0, 1.0 / 8.0];
    const P: &'static [&'static [f64]] = &[
        &[1.0, -4.0 / 3.0, 5.0 / 9.0],
        &[0.0, 1.0, -2.0 / 3.0],
        &[0.0, 4.0 / 3.0, -8.0 / 9.0],
        &[0.0, -1.0, 1.0],
    ];
}

#[derive(Debug, Clone, Copy)]
pub struct StepSettings {
    pub rtol: f64,
    pub atol: f64,
    pub max_step: f64,
}

pub struct AdaptiveRK<T: ButcherTableau> {
    state: StepState,
    h_abs: f64,
    settings: StepSettings,
    stats: SolverStats,
    _tableau: PhantomData<T>,
}

pub type DormandPrince = AdaptiveRK<DormandPrince54>;
pub type BogackiShampine = AdaptiveRK<BogackiShampine32>;

impl<T: ButcherTableau> AdaptiveRK<T> {
    pub fn new(
        fun: &RhsFn,
        t0: f64,
        y0: &DVector<f64>,
        f0: DVector<f64>,
        t_bound: f64,
        first_step: Option<f64>,
        settings: StepSettings,
    ) -> Self {
        let mut stats = SolverStats {
            nfev: 1,
            ..SolverStats::default()
        };
        let h_abs = match first_step {
            Some(h) => h,
            None => {
                stats.nfev += 1;
                select_initial_step(
                    fun,
                    t0,
                    y0,
                    t_bound,
                    settings.max_step,
                    &f0,
                    1.0,
                    T::ERROR_ORDER,
                    settings.rtol,
                    settings.atol,
                )
            }
        };
        debug!("initial step {}", h_abs);
        AdaptiveRK {
            state: StepState::new(t0, y0.clone(), f0),
            h_abs,
            settings,
            stats,
            _tableau: PhantomData,
        }
    }

    /// one Runge-Kutta step of size `h`: the new state, its derivative and the stages
    fn rk_step(&mut self, fun: &RhsFn, h: f64) -> (DVector<f64>, DVector<f64>, Vec<DVector<f64>>) {
        let t = self.state.t;
        let y = &self.state.y;
        let mut k: Vec<DVector<f64>> = Vec::with_capacity(T::B.len() + 1);
        k.push(self.state.f.clone());
        for (a, c) in T::A.iter().zip(T::C.iter()).skip(1) {
            let mut dy = DVector::zeros(y.len());
            for (a_j, k_j) in a.iter().zip(k.iter()) {
                dy.axpy(*a_j * h, k_j, 1.0);
            }
            k.push(fun(t + c * h, &(y + dy)));
        }
        let mut y_new = y.clone();
        for (b_i, k_i) in T::B.iter().zip(k.iter()) {
            y_new.axpy(*b_i * h, k_i, 1.0);
        }
        let f_new = fun(t + h, &y_new);
        self.stats.nfev += T::B.len();
        k.push(f_new.clone());
        (y_new, f_new, k)
    }

    fn estimate_error_norm(k: &[DVector<f64>], h: f64, scale: &DVector<f64>) -> f64 {
        let mut err = DVector::zeros(scale.len());
        for (e_i, k_i) in T::E.iter().zip(k.iter()) {
            err.axpy(*e_i * h, k_i, 1.0);
        }
        norm(&err.component_div(scale))
    }

    /// `Q = K^T P`: column `j` multiplies `x^(j+1)` in the dense output of the step
    fn dense_output(k: &[DVector<f64>]) -> DMatrix<f64> {
        let n = k.first().map_or(0, |k0| k0.len());
        let order = T::P.first().map_or(0, |row| row.len());
        let mut q = DMatrix::zeros(n, order);
        for (k_i, p_i) in k.iter().zip(T::P.iter()) {
            for (j, p_ij) in p_i.iter().enumerate() {
                if *p_ij != 0.0 {
                    let mut column = q.column_mut(j);
                    column.axpy(*p_ij, k_i, 1.0);
                }
            }
        }
        q
    }
}

impl<T: ButcherTableau> Solver for AdaptiveRK<T> {
    fn step(&mut self, fun: &RhsFn, t_bound: f64) -> Result<Status, IvpError> {
        let t = self.state.t;
        if t >= t_bound {
            return Ok(Status::Finished);
        }
        let error_exponent = -1.0 / (T::ERROR_ORDER + 1.0);
        let min_step = 10.0 * (next_after(t) - t).abs();
        let mut h_abs = self.h_abs.clamp(min_step, self.settings.max_step.max(min_step));
        let mut step_rejected = false;
        loop {
            if h_abs < min_step {
                return Err(IvpError::StepSizeTooSmall(t));
            }
            let t_new = (t + h_abs).min(t_bound);
            let h = t_new - t;
            let (y_new, f_new, k) = self.rk_step(fun, h);
            let scale = self
                .state
                .y
                .zip_map(&y_new, |a, b| self.settings.atol + a.abs().max(b.abs()) * self.settings.rtol);
            let error_norm = Self::estimate_error_norm(&k, h, &scale);
            if error_norm < 1.0 {
                let mut factor = if error_norm == 0.0 {
                    MAX_FACTOR
                } else {
                    MAX_FACTOR.min(SAFETY * error_norm.powf(error_exponent))
                };
                if step_rejected {
                    factor = factor.min(1.0);
                }
                self.h_abs = h.abs() * factor;
                self.stats.accepted += 1;
                let q = Self::dense_output(&k);
                self.state.advance(t_new, y_new, f_new, Some(q));
                break;
            }
            // a NaN error norm lands here too, f64::max then picks MIN_FACTOR
            h_abs = h.abs() * MIN_FACTOR.max(SAFETY * error_norm.powf(error_exponent));
            self.stats.rejected += 1;
            step_rejected = true;
        }
        if self.state.t >= t_bound {
            Ok(Status::Finished)
        } else {
            Ok(Status::Running)
        }
    }

    fn state(&self) -> &StepState {
        &self.state
    }

    fn stats(&self) -> SolverStats {
        self.stats
    }
}

/// smallest representable number above `t`
fn next_after(t: f64) -> f64 {
    if t.is_nan() || t == f64::INFINITY {
        return t;
    }
    if t == 0.0 {
        return f64::from_bits(1);
    }
    let bits = t.to_bits();
    if t > 0.0 {
        f64::from_bits(bits + 1)
    } else {
        f64::from_bits(bits - 1)
    }
}

////////////////////////////////////////////////////////////////////////////////////////
//          FIXED STEP RK4
////////////////////////////////////////////////////////////////////////////////////////
pub struct ClassicRK4 {
    state: StepState,
    h: f64,
    stats: SolverStats,
}

impl ClassicRK4 {
    pub fn new(t0: f64, y0: &DVector<f64>, f0: DVector<f64>, h: f64) -> Self {
        ClassicRK4 {
            state: StepState::new(t0, y0.clone(), f0),
            h,
            stats: SolverStats {
                nfev: 1,
                ..SolverStats::default()
            },
        }
    }
}

impl Solver for ClassicRK4 {
    fn step(&mut self, fun: &RhsFn, t_bound: f64) -> Result<Status, IvpError> {
        let t = self.state.t;
        if t >= t_bound {
            return Ok(Status::Finished);
        }
        let h = self.h.min(t_bound - t);
        let y = &self.state.y;
        let k1 = &self.state.f;
        let k2 = fun(t + h / 2.0, &(y + k1 * (h / 2.0)));
        let k3 = fun(t + h / 2.0, &(y + &k2 * (h / 2.0)));
        let k4 = fun(t + h, &(y + &k3 * h));
        let y_new = y + (k1 + &k2 * 2.0 + &k3 * 2.0 + &k4) * (h / 6.0);
        let t_new = if t_bound - (t + h) <= f64::EPSILON * t_bound.abs() {
            t_bound
        } else {
            t + h
        };
        let f_new = fun(t_new, &y_new);
        self.stats.nfev += 4;
        if y_new.iter().chain(f_new.iter()).any(|v| !v.is_finite()) {
            return Err(IvpError::NonFinite(t_new));
        }
        self.stats.accepted += 1;
        self.state.advance(t_new, y_new, f_new, None);
        if t_new >= t_bound {
            Ok(Status::Finished)
        } else {
            Ok(Status::Running)
        }
    }

    fn state(&self) -> &StepState {
        &self.state
    }

    fn stats(&self) -> SolverStats {
        self.stats
    }
}

////////////////////////////////////////////////////////////////////////////////////////
//          MAIN LOOP
////////////////////////////////////////////////////////////////////////////////////////

/// IVP solver built on the explicit Runge-Kutta steppers of this module
#[derive(Debug, Clone, Default)]
pub struct NonStiffSolver {
    pub options: IvpOptions,
}

impl NonStiffSolver {
    pub fn new(options: IvpOptions) -> Self {
        NonStiffSolver { options }
    }
}

impl IvpSolve for NonStiffSolver {
    fn solve_ivp(
        &self,
        fun: &RhsFn,
        t_span: (f64, f64),
        y0: &DVector<f64>,
        t_eval: &[f64],
        method: IntegrationMethod,
    ) -> Result<IvpSolution, IvpError> {
        let start = Instant::now();
        let (t0, t_bound) = t_span;
        if !(t0.is_finite() && t_bound.is_finite() && t_bound > t0) {
            return Err(IvpError::InvalidOption(format!(
                "t_span must be finite and increasing, got ({}, {})",
                t0, t_bound
            )));
        }
        if y0.is_empty() {
            return Err(IvpError::InvalidOption("y0 must not be empty".to_string()));
        }
        let sorted = t_eval.windows(2).all(|w| w[0] <= w[1]);
        let inside = t_eval.iter().all(|&t| t >= t0 && t <= t_bound);
        if !sorted || !inside {
            return Err(IvpError::InvalidTEval { t0, t_bound });
        }

        let mut options = self.options.clone();
        if !t_eval.is_empty() {
            options.max_step = options.max_step.min((t_bound - t0) / MIN_SAMPLED_STEPS);
        }
        let mut solver = Solvers::new(method, fun, t0, y0, t_bound, &options)?;
        let mut t_out: Vec<f64> = Vec::new();
        let mut y_out: Vec<DVector<f64>> = Vec::new();
        let mut next = 0;
        if t_eval.is_empty() {
            t_out.push(t0);
            y_out.push(y0.clone());
        }
        while next < t_eval.len() && t_eval[next] <= t0 {
            t_out.push(t_eval[next]);
            y_out.push(y0.clone());
            next += 1;
        }

        let mut steps = 0;
        loop {
            let status = solver.step(fun, t_bound)?;
            steps += 1;
            let state = solver.state();
            if t_eval.is_empty() {
                t_out.push(state.t);
                y_out.push(state.y.clone());
            }
            while next < t_eval.len() && t_eval[next] <= state.t {
                t_out.push(t_eval[next]);
                y_out.push(state.interpolate(t_eval[next]));
                next += 1;
            }
            if status == Status::Finished {
                break;
            }
            if steps >= self.options.max_steps {
                return Err(IvpError::TooManySteps(self.options.max_steps, state.t));
            }
        }

        let stats = solver.stats();
        let y = DMatrix::from_fn(y_out.len(), y0.len(), |i, j| y_out[i][j]);
        info!(
            "{} finished in {} ms: nfev = {}, accepted = {}, rejected = {}",
            method,
            start.elapsed().as_millis(),
            stats.nfev,
            stats.accepted,
            stats.rejected
        );
        Ok(IvpSolution {
            t: DVector::from_vec(t_out),
            y,
            stats,
        })
    }
}

////////////////////////////////////////////////////////////////////////////////////////
//          TESTS
///////////////////////////////////////////////////////////////////////////////////////
#[cfg(test)]
mod tests_nonstiff_api {
    use super::*;
    use approx::assert_relative_eq;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    fn linspace(a: f64, b: f64, n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| a + (b - a) * i as f64 / (n - 1) as f64)
            .collect()
    }

    fn tight() -> NonStiffSolver {
        NonStiffSolver::new(IvpOptions {
            rtol: 1e-8,
            atol: 1e-10,
            ..IvpOptions::default()
        })
    }

    #[test]
    fn test_method_names() {
        assert_eq!(IntegrationMethod::from_str("RK23").unwrap(), IntegrationMethod::RK23);
        assert_eq!(IntegrationMethod::default().to_string(), "RK45");
        assert!(IntegrationMethod::from_str("LSODA").is_err());
    }

    #[test]
    fn test_exponential_decay_all_methods() {
        // y' = -0.5 y, y(0) = 10
        let fun = |_t: f64, y: &DVector<f64>| y * -0.5;
        let y0 = DVector::from_vec(vec![10.0]);
        let t_eval = linspace(0.0, 5.0, 100);
        for method in IntegrationMethod::iter() {
            let sol = tight().solve_ivp(&fun, (0.0, 5.0), &y0, &t_eval, method).unwrap();
            assert_eq!(sol.t.len(), 100);
            assert_eq!(sol.y.shape(), (100, 1));
            assert_eq!(sol.t[0], 0.0);
            assert_eq!(sol.y[(0, 0)], 10.0);
            for (i, &t) in t_eval.iter().enumerate() {
                assert_relative_eq!(sol.y[(i, 0)], 10.0 * (-0.5 * t).exp(), epsilon = 1e-4);
            }
            assert!(sol.stats.nfev > 0);
            assert!(sol.stats.accepted > 0);
        }
    }

    #[test]
    fn test_harmonic_oscillator() {
        // y1' = y2, y2' = -y1
        let fun = |_t: f64, y: &DVector<f64>| DVector::from_vec(vec![y[1], -y[0]]);
        let y0 = DVector::from_vec(vec![1.0, 0.0]);
        let t_eval = linspace(0.0, 10.0, 100);
        let sol = tight()
            .solve_ivp(&fun, (0.0, 10.0), &y0, &t_eval, IntegrationMethod::RK45)
            .unwrap();
        for (i, &t) in t_eval.iter().enumerate() {
            assert_relative_eq!(sol.y[(i, 0)], t.cos(), epsilon = 1e-4);
            assert_relative_eq!(sol.y[(i, 1)], -t.sin(), epsilon = 1e-4);
        }
    }

    #[test]
    fn test_samples_between_steps_meet_default_tolerance() {
        // y' = cosh(t) y, y(0) = 1, y = exp(sinh(t))
        let fun = |t: f64, y: &DVector<f64>| y * t.cosh();
        let y0 = DVector::from_vec(vec![1.0]);
        let t_eval = linspace(0.0, 1.0, 100);
        for method in [IntegrationMethod::RK45, IntegrationMethod::RK23] {
            let sol = NonStiffSolver::default()
                .solve_ivp(&fun, (0.0, 1.0), &y0, &t_eval, method)
                .unwrap();
            // far fewer steps than samples, so most samples are interpolated
            assert!(sol.stats.accepted < t_eval.len());
            let worst = t_eval
                .iter()
                .enumerate()
                .map(|(i, &t)| {
                    let exact = t.sinh().exp();
                    ((sol.y[(i, 0)] - exact) / exact).abs()
                })
                .fold(0.0, f64::max);
            assert!(worst < 1e-3, "{}: max relative error {}", method, worst);
        }
    }

    #[test]
    fn test_dense_output_matches_step_ends() {
        let fun = |_t: f64, y: &DVector<f64>| DVector::from_vec(vec![y[1], -y[0]]);
        let y0 = DVector::from_vec(vec![1.0, 0.0]);
        let mut solver =
            Solvers::new(IntegrationMethod::RK45, &fun, 0.0, &y0, 10.0, &IvpOptions::default())
                .unwrap();
        solver.step(&fun, 10.0).unwrap();
        let state = solver.state();
        assert!(state.q.is_some());
        let start = state.interpolate(state.t_old);
        assert_relative_eq!(start[0], state.y_old[0], epsilon = 1e-12);
        assert_relative_eq!(start[1], state.y_old[1], epsilon = 1e-12);
        let end = state.interpolate(state.t - 1e-12);
        assert_relative_eq!(end[0], state.y[0], epsilon = 1e-9);
        assert_relative_eq!(end[1], state.y[1], epsilon = 1e-9);
    }

    #[test]
    fn test_default_tolerances_are_loose_but_close() {
        let fun = |_t: f64, y: &DVector<f64>| DVector::from_vec(vec![y[1], -y[0]]);
        let y0 = DVector::from_vec(vec![1.0, 0.0]);
        let sol = NonStiffSolver::default()
            .solve_ivp(&fun, (0.0, 10.0), &y0, &[], IntegrationMethod::RK45)
            .unwrap();
        // every accepted step is recorded when t_eval is empty
        assert_eq!(sol.t.len(), sol.stats.accepted + 1);
        let last = sol.t.len() - 1;
        assert_relative_eq!(sol.t[last], 10.0);
        assert_relative_eq!(sol.y[(last, 0)], 10.0_f64.cos(), epsilon = 1e-2);
    }

    #[test]
    fn test_nonlinear_growth() {
        // y' = y^2, y(0) = 1, y = 1/(1 - t)
        let fun = |_t: f64, y: &DVector<f64>| y.map(|v| v * v);
        let y0 = DVector::from_vec(vec![1.0]);
        let t_eval = linspace(0.0, 0.5, 11);
        for method in [IntegrationMethod::RK45, IntegrationMethod::RK23] {
            let sol = tight().solve_ivp(&fun, (0.0, 0.5), &y0, &t_eval, method).unwrap();
            assert_relative_eq!(sol.y[(10, 0)], 2.0, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_coupled_linear_system() {
        // y1' = -2 y1 + y2, y2' = y1 - 2 y2 -> eigenvalues -1 and -3
        let fun = |_t: f64, y: &DVector<f64>| {
            DVector::from_vec(vec![-2.0 * y[0] + y[1], y[0] - 2.0 * y[1]])
        };
        let y0 = DVector::from_vec(vec![1.0, 0.0]);
        let t_eval = linspace(0.0, 2.0, 5);
        let sol = tight()
            .solve_ivp(&fun, (0.0, 2.0), &y0, &t_eval, IntegrationMethod::RK45)
            .unwrap();
        for (i, &t) in t_eval.iter().enumerate() {
            let (a, b) = ((-t).exp() / 2.0, (-3.0 * t).exp() / 2.0);
            assert_relative_eq!(sol.y[(i, 0)], a + b, epsilon = 1e-5);
            assert_relative_eq!(sol.y[(i, 1)], a - b, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_invalid_inputs() {
        let fun = |_t: f64, y: &DVector<f64>| -y;
        let y0 = DVector::from_vec(vec![1.0]);
        let solver = NonStiffSolver::default();
        let err = solver
            .solve_ivp(&fun, (0.0, 1.0), &y0, &[0.5, 0.2], IntegrationMethod::RK45)
            .unwrap_err();
        assert!(matches!(err, IvpError::InvalidTEval { .. }));
        let err = solver
            .solve_ivp(&fun, (0.0, 1.0), &y0, &[2.0], IntegrationMethod::RK45)
            .unwrap_err();
        assert!(matches!(err, IvpError::InvalidTEval { .. }));
        let err = solver
            .solve_ivp(&fun, (1.0, 1.0), &y0, &[], IntegrationMethod::RK45)
            .unwrap_err();
        assert!(matches!(err, IvpError::InvalidOption(_)));

        let wrong_size = |_t: f64, _y: &DVector<f64>| DVector::zeros(2);
        let err = solver
            .solve_ivp(&wrong_size, (0.0, 1.0), &y0, &[], IntegrationMethod::RK45)
            .unwrap_err();
        assert_eq!(err, IvpError::DimensionMismatch { expected: 1, got: 2 });

        let not_finite = |_t: f64, _y: &DVector<f64>| DVector::from_vec(vec![f64::NAN]);
        let err = solver
            .solve_ivp(&not_finite, (0.0, 1.0), &y0, &[], IntegrationMethod::RK45)
            .unwrap_err();
        assert_eq!(err, IvpError::NonFinite(0.0));
    }

    #[test]
    fn test_step_budget() {
        let fun = |_t: f64, y: &DVector<f64>| -y;
        let y0 = DVector::from_vec(vec![1.0]);
        let solver = NonStiffSolver::new(IvpOptions {
            max_steps: 3,
            first_step: Some(1e-3),
            max_step: 1e-3,
            ..IvpOptions::default()
        });
        let err = solver
            .solve_ivp(&fun, (0.0, 1.0), &y0, &[], IntegrationMethod::RK45)
            .unwrap_err();
        assert!(matches!(err, IvpError::TooManySteps(3, _)));
    }

    #[test]
    fn test_blow_up_is_reported() {
        // y' = y^2, y(0) = 1 blows up at t = 1
        let fun = |_t: f64, y: &DVector<f64>| y.map(|v| v * v);
        let y0 = DVector::from_vec(vec![1.0]);
        let result = NonStiffSolver::default().solve_ivp(
            &fun,
            (0.0, 2.0),
            &y0,
            &[],
            IntegrationMethod::RK45,
        );
        assert!(result.is_err());
    }
}
