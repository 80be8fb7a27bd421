//! The three text fields of a request, validated and typed.
use crate::dual_solver::errors::DualSolverError;
use crate::numerical::NonStiff_api::IntegrationMethod;
use std::str::FromStr;

/// number of points of the sample grid
pub const SAMPLE_COUNT: usize = 100;
pub const DEFAULT_TIME_END: f64 = 10.0;

#[derive(Debug, Clone, PartialEq)]
pub struct OdeRequest {
    /// one right-hand side per state variable, in order
    pub equations: Vec<String>,
    pub initial_state: Vec<f64>,
    pub time_end: f64,
}

impl OdeRequest {
    /// `ode` is `;`-separated, `initial_condition` comma-separated; `time_end` defaults to 10.
    pub fn parse(
        ode: &str,
        initial_condition: &str,
        time_end: Option<&str>,
    ) -> Result<Self, DualSolverError> {
        Ok(OdeRequest {
            equations: parse_equations(ode)?,
            initial_state: parse_initial_condition(initial_condition)?,
            time_end: time_end.map_or(Ok(DEFAULT_TIME_END), parse_time_end)?,
        })
    }

    /// equation count equals initial-condition count
    pub fn is_consistent(&self) -> bool {
        self.equations.len() == self.initial_state.len()
    }

    pub fn dimension(&self) -> usize {
        self.initial_state.len()
    }

    pub fn sample_grid(&self, samples: usize) -> Vec<f64> {
        linspace(0.0, self.time_end, samples)
    }
}

pub fn parse_equations(ode: &str) -> Result<Vec<String>, DualSolverError> {
    if ode.trim().is_empty() {
        return Err(DualSolverError::invalid("no equations given"));
    }
    ode.split(';')
        .enumerate()
        .map(|(i, equation)| {
            let equation = equation.trim();
            if equation.is_empty() {
                Err(DualSolverError::invalid(format!("equation {} is empty", i + 1)))
            } else {
                Ok(equation.to_string())
            }
        })
        .collect()
}

pub fn parse_initial_condition(initial_condition: &str) -> Result<Vec<f64>, DualSolverError> {
    initial_condition
        .split(',')
        .map(|value| {
            let value = value.trim();
            value
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| {
                    DualSolverError::invalid(format!("initial condition '{}' is not a number", value))
                })
        })
        .collect()
}

pub fn parse_time_end(time_end: &str) -> Result<f64, DualSolverError> {
    match time_end.trim().parse::<f64>() {
        Ok(t) if t.is_finite() && t > 0.0 => Ok(t),
        _ => Err(DualSolverError::invalid(format!(
            "time_end must be a positive number, got '{}'",
            time_end.trim()
        ))),
    }
}

pub fn parse_method(method: &str) -> Result<IntegrationMethod, DualSolverError> {
    IntegrationMethod::from_str(method.trim()).map_err(|_| {
        DualSolverError::invalid(format!("unknown integration method '{}'", method.trim()))
    })
}

/// `n` evenly spaced points from `start` to `end`, both included
pub fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (n - 1) as f64;
            (0..n)
                .map(|i| if i == n - 1 { end } else { start + step * i as f64 })
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_parse_request() {
        let request = OdeRequest::parse(" y2 ; -y1 ", "1, 0", Some("10")).unwrap();
        assert_eq!(request.equations, vec!["y2".to_string(), "-y1".to_string()]);
        assert_eq!(request.initial_state, vec![1.0, 0.0]);
        assert_eq!(request.time_end, 10.0);
        assert!(request.is_consistent());
    }

    #[test]
    fn test_default_time_end() {
        let request = OdeRequest::parse("-0.5*y1", "10", None).unwrap();
        assert_eq!(request.time_end, DEFAULT_TIME_END);
    }

    #[test]
    fn test_count_mismatch_is_not_a_parse_error() {
        let request = OdeRequest::parse("y1;y2", "1", Some("5")).unwrap();
        assert!(!request.is_consistent());
        assert_eq!(request.dimension(), 1);
    }

    #[test]
    fn test_invalid_fields() {
        for (ode, ic, t) in [
            ("", "1", "5"),
            ("  ", "1", "5"),
            ("y1;", "1", "5"),
            ("y1", "one", "5"),
            ("y1", "1,", "5"),
            ("y1", "1", "0"),
            ("y1", "1", "-2"),
            ("y1", "1", "ten"),
            ("y1", "1", "inf"),
        ] {
            let result = OdeRequest::parse(ode, ic, Some(t));
            assert!(
                matches!(result, Err(DualSolverError::InvalidRequest(_))),
                "{:?} accepted",
                (ode, ic, t)
            );
        }
    }

    #[test]
    fn test_parse_method() {
        assert_eq!(parse_method(" RK23 ").unwrap(), IntegrationMethod::RK23);
        assert!(matches!(parse_method("Euler"), Err(DualSolverError::InvalidRequest(_))));
    }

    #[test]
    fn test_linspace() {
        let grid = linspace(0.0, 5.0, SAMPLE_COUNT);
        assert_eq!(grid.len(), 100);
        assert_eq!(grid[0], 0.0);
        assert_eq!(grid[99], 5.0);
        assert_relative_eq!(grid[1], 5.0 / 99.0, epsilon = 1e-15);
        assert_eq!(linspace(0.0, 1.0, 1), vec![0.0]);
        assert!(linspace(0.0, 1.0, 0).is_empty());
    }
}
