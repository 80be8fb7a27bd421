//! Helpers shared by the explicit Runge-Kutta steppers: option validation, the scaled RMS norm,
//! the automatic first step and cubic Hermite interpolation between two accepted points.
extern crate nalgebra as na;

use crate::numerical::NonStiff_api::IvpError;
use log::{error, info};
use na::DVector;

/// right-hand side `f(t, y) -> dy/dt`
pub type RhsFn<'a> = dyn Fn(f64, &DVector<f64>) -> DVector<f64> + 'a;

pub fn validate_first_step(first_step: f64, t0: f64, t_bound: f64) -> Result<f64, IvpError> {
    if first_step <= 0.0 {
        return Err(IvpError::InvalidOption("`first_step` must be positive.".to_string()));
    }
    if first_step > (t_bound - t0).abs() {
        return Err(IvpError::InvalidOption("`first_step` exceeds bounds.".to_string()));
    }
    info!("first step validation: done");
    Ok(first_step)
}

pub fn validate_max_step(max_step: f64) -> Result<f64, IvpError> {
    if max_step <= 0.0 || max_step.is_nan() {
        return Err(IvpError::InvalidOption("`max_step` must be positive.".to_string()));
    }
    Ok(max_step)
}

/// Clamps a too small `rtol` to `100*EPS` and rejects a negative `atol`.
pub fn validate_tol(rtol: f64, atol: f64) -> Result<(f64, f64), IvpError> {
    if !rtol.is_finite() || !atol.is_finite() {
        return Err(IvpError::InvalidOption("tolerances must be finite.".to_string()));
    }
    let rtol = if rtol < 100.0 * f64::EPSILON {
        error!(
            "`rtol` is too small. Setting `rtol = max(rtol, 100.0 * f64::EPSILON)`."
        );
        f64::max(rtol, 100.0 * f64::EPSILON)
    } else {
        rtol
    };
    if atol < 0.0 {
        return Err(IvpError::InvalidOption("`atol` is negative.".to_string()));
    }
    Ok((rtol, atol))
}

/// RMS norm
pub fn norm(vector: &DVector<f64>) -> f64 {
    if vector.is_empty() {
        return 0.0;
    }
    vector.norm() / (vector.len() as f64).sqrt()
}

/// `atol + |y| * rtol`, element-wise
pub fn scale_func(rtol: f64, atol: f64, y: &DVector<f64>) -> DVector<f64> {
    y.map(|y_i| atol + y_i.abs() * rtol)
}

/// Empirical choice of the first step (Hairer, Norsett, Wanner, "Solving ODE I", II.4).
///
/// - `direction`: 1.0 forward, -1.0 backward
/// - `order`: order of the error estimator of the method
pub fn select_initial_step(
    fun: &RhsFn,
    t0: f64,
    y0: &DVector<f64>,
    t_bound: f64,
    max_step: f64,
    f0: &DVector<f64>,
    direction: f64,
    order: f64,
    rtol: f64,
    atol: f64,
) -> f64 {
    if y0.is_empty() {
        return f64::INFINITY;
    }

    let interval_length = (t_bound - t0).abs();
    if interval_length == 0.0 {
        return 0.0;
    }

    let scale = scale_func(rtol, atol, y0);
    let d0 = norm(&y0.component_div(&scale));
    let d1 = norm(&f0.component_div(&scale));
    let h0 = if d0 < 1e-5 || d1 < 1e-5 {
        1e-6
    } else {
        0.01 * d0 / d1
    };

    let h0 = h0.min(interval_length);
    let y1 = y0 + h0 * direction * f0;
    let f1 = fun(t0 + h0 * direction, &y1);
    let d2 = norm(&(f1 - f0).component_div(&scale)) / h0;
    let h1 = if d1 <= 1e-15 && d2 <= 1e-15 {
        f64::max(1e-6, h0 * 1e-3)
    } else {
        (0.01 / d1.max(d2)).powf(1.0 / (order + 1.0))
    };

    [100.0 * h0, h1, interval_length, max_step]
        .into_iter()
        .fold(f64::INFINITY, f64::min)
}

/// Cubic Hermite interpolant on `[t_old, t_new]` built from the states and slopes at both ends.
pub fn hermite_interpolate(
    t_old: f64,
    y_old: &DVector<f64>,
    f_old: &DVector<f64>,
    t_new: f64,
    y_new: &DVector<f64>,
    f_new: &DVector<f64>,
    t: f64,
) -> DVector<f64> {
    let h = t_new - t_old;
    if h == 0.0 {
        return y_new.clone();
    }
    let s = (t - t_old) / h;
    let s2 = s * s;
    let s3 = s2 * s;
    let h10 = s3 - 2.0 * s2 + s;
    let h01 = -2.0 * s3 + 3.0 * s2;
    let h11 = s3 - s2;
    // h00 = 1 - h01, so a constant state stays bit-exact
    y_old + (y_new - y_old) * h01 + f_old * (h10 * h) + f_new * (h11 * h)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_validators() {
        assert!(validate_first_step(0.1, 0.0, 1.0).is_ok());
        assert!(validate_first_step(-0.1, 0.0, 1.0).is_err());
        assert!(validate_first_step(2.0, 0.0, 1.0).is_err());
        assert!(validate_max_step(f64::INFINITY).is_ok());
        assert!(validate_max_step(0.0).is_err());
        let (rtol, atol) = validate_tol(1e-20, 1e-6).unwrap();
        assert_relative_eq!(rtol, 100.0 * f64::EPSILON);
        assert_relative_eq!(atol, 1e-6);
        assert!(validate_tol(1e-3, -1.0).is_err());
    }

    #[test]
    fn test_norm() {
        let v = DVector::from_vec(vec![3.0, 4.0]);
        assert_relative_eq!(norm(&v), 5.0 / 2.0_f64.sqrt());
        assert_eq!(norm(&DVector::zeros(0)), 0.0);
    }

    #[test]
    fn test_select_initial_step_is_bounded() {
        let fun = |_t: f64, y: &DVector<f64>| -y;
        let y0 = DVector::from_vec(vec![1.0]);
        let f0 = fun(0.0, &y0);
        let h = select_initial_step(&fun, 0.0, &y0, 10.0, f64::INFINITY, &f0, 1.0, 4.0, 1e-3, 1e-6);
        assert!(h > 0.0 && h <= 10.0);
        let h = select_initial_step(&fun, 0.0, &y0, 10.0, 1e-3, &f0, 1.0, 4.0, 1e-3, 1e-6);
        assert!(h <= 1e-3);
    }

    #[test]
    fn test_hermite_is_exact_for_cubics() {
        // y = t^3, y' = 3t^2
        let y = |t: f64| DVector::from_vec(vec![t * t * t]);
        let f = |t: f64| DVector::from_vec(vec![3.0 * t * t]);
        let value = hermite_interpolate(1.0, &y(1.0), &f(1.0), 2.0, &y(2.0), &f(2.0), 1.3);
        assert_relative_eq!(value[0], 1.3_f64.powi(3), epsilon = 1e-12);
    }
}
