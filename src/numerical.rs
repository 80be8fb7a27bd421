/// Helpers shared by the explicit steppers: tolerance and step validation, RMS norm,
/// automatic first step, Hermite interpolation.
pub mod ivp_common;
/// # Explicit Runge-Kutta IVP solvers
/// RK45 (Dormand-Prince 5(4), default), RK23 (Bogacki-Shampine 3(2)) and fixed step RK4 behind
/// the [`NonStiff_api::IvpSolve`] trait.
///# Example
/// ```
/// use RustedODE::numerical::NonStiff_api::{IntegrationMethod, IvpSolve, NonStiffSolver};
/// use nalgebra::DVector;
/// let fun = |_t: f64, y: &DVector<f64>| DVector::from_vec(vec![y[1], -y[0]]);
/// let y0 = DVector::from_vec(vec![1.0, 0.0]);
/// let t_eval: Vec<f64> = (0..=10).map(|i| i as f64).collect();
/// let solution = NonStiffSolver::default()
///     .solve_ivp(&fun, (0.0, 10.0), &y0, &t_eval, IntegrationMethod::RK45)
///     .unwrap();
/// assert_eq!(solution.y.shape(), (11, 2));
/// ```
pub mod NonStiff_api;
