//! Equations -> derivative function -> sampled trajectory.
//!
//! The state dimension is the number of initial values. When the equation count differs, surplus
//! equations are dropped and missing ones give a zero derivative, so a mismatched request still
//! produces a trajectory to show next to the mismatch message.
use crate::dual_solver::binding::{VariableBinding, state_name};
use crate::dual_solver::errors::DualSolverError;
use crate::numerical::NonStiff_api::{IntegrationMethod, IvpSolve, SolverStats};
use crate::symbolic::parse_expr::{EvalError, SyntaxTree, parse_expression};
use log::{debug, info, warn};
use nalgebra::{DMatrix, DVector};
use std::cell::RefCell;
use std::collections::HashSet;

/// An equation that could not be evaluated and contributed zero instead
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    /// zero-based position of the equation
    pub equation: usize,
    pub t: f64,
    pub message: String,
}

/// Receiver of the soft failures of the derivative function
pub trait DiagnosticSink {
    fn report(&self, diagnostic: Diagnostic);
}

/// Writes diagnostics to the log: the first occurrence of each message as a warning, repeats
/// at debug level.
#[derive(Debug, Default)]
pub struct LogSink {
    seen: RefCell<HashSet<(usize, String)>>,
}

impl DiagnosticSink for LogSink {
    fn report(&self, diagnostic: Diagnostic) {
        let key = (diagnostic.equation, diagnostic.message.clone());
        if self.seen.borrow_mut().insert(key) {
            warn!(
                "⚠️ Undefined variable in equation {} at t = {}: {}",
                diagnostic.equation + 1,
                diagnostic.t,
                diagnostic.message
            );
        } else {
            debug!(
                "equation {} at t = {}: {}",
                diagnostic.equation + 1,
                diagnostic.t,
                diagnostic.message
            );
        }
    }
}

/// Keeps every diagnostic in memory
#[derive(Debug, Default)]
pub struct CollectingSink {
    diagnostics: RefCell<Vec<Diagnostic>>,
}

impl CollectingSink {
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.diagnostics.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.diagnostics.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.borrow().is_empty()
    }
}

impl DiagnosticSink for CollectingSink {
    fn report(&self, diagnostic: Diagnostic) {
        self.diagnostics.borrow_mut().push(diagnostic);
    }
}

/// Samples of every state variable on the sample grid
#[derive(Debug, Clone)]
pub struct NumericTrajectory {
    pub t: DVector<f64>,
    /// one row per sample, one column per state variable
    pub y: DMatrix<f64>,
    /// `y1..yN`
    pub labels: Vec<String>,
    pub stats: SolverStats,
}

impl NumericTrajectory {
    pub fn column(&self, i: usize) -> Vec<f64> {
        self.y.column(i).iter().copied().collect()
    }
}

/// Parses one syntax tree per state variable, dropping surplus equations and padding missing
/// ones with zero.
pub fn parse_system(
    equations: &[String],
    dimension: usize,
) -> Result<Vec<SyntaxTree>, DualSolverError> {
    if equations.len() > dimension {
        warn!(
            "{} equations for {} initial values: equations {}..{} are not integrated",
            equations.len(),
            dimension,
            dimension + 1,
            equations.len()
        );
    } else if equations.len() < dimension {
        warn!(
            "{} equations for {} initial values: the remaining variables are held constant",
            equations.len(),
            dimension
        );
    }
    (0..dimension)
        .map(|i| match equations.get(i) {
            Some(source) => parse_expression(source).map_err(|e| {
                DualSolverError::invalid(format!("equation {} '{}': {}", i + 1, source, e))
            }),
            None => Ok(SyntaxTree::Number(0.0)),
        })
        .collect()
}

/// One evaluation at the initial point. Unbound names are tolerated here as everywhere else,
/// every other evaluation error would repeat at each step and ends the request.
pub fn check_system(system: &[SyntaxTree], y0: &[f64]) -> Result<(), DualSolverError> {
    let binding = VariableBinding::numeric(0.0, y0);
    for (i, tree) in system.iter().enumerate() {
        match tree.evaluate(binding.scope()) {
            Err(e) if !e.is_unbound_name() => {
                return Err(DualSolverError::invalid(format!("equation {}: {}", i + 1, e)));
            }
            _ => {}
        }
    }
    Ok(())
}

/// `f(t, y)` of the system. Variables are bound anew at each call; an equation with an unbound
/// name is reported to `sink` and contributes zero.
pub fn derivative_function<'a>(
    system: &'a [SyntaxTree],
    sink: &'a dyn DiagnosticSink,
) -> impl Fn(f64, &DVector<f64>) -> DVector<f64> + 'a {
    move |t: f64, y: &DVector<f64>| {
        let binding = VariableBinding::numeric(t, y.as_slice());
        DVector::from_iterator(
            system.len(),
            system.iter().enumerate().map(|(i, tree)| {
                match tree.evaluate(binding.scope()) {
                    Ok(value) => value,
                    Err(e) => {
                        sink.report(diagnostic(i, t, &e));
                        0.0
                    }
                }
            }),
        )
    }
}

fn diagnostic(equation: usize, t: f64, error: &EvalError) -> Diagnostic {
    Diagnostic {
        equation,
        t,
        message: error.to_string(),
    }
}

/// Integrates the system over `t_eval[0]..t_eval[last]` and samples it at `t_eval`
pub fn integrate(
    equations: &[String],
    y0: &[f64],
    t_eval: &[f64],
    method: IntegrationMethod,
    solver: &dyn IvpSolve,
    sink: &dyn DiagnosticSink,
) -> Result<NumericTrajectory, DualSolverError> {
    let (Some(&t0), Some(&t_end)) = (t_eval.first(), t_eval.last()) else {
        return Err(DualSolverError::invalid("empty sample grid"));
    };
    if y0.is_empty() {
        return Err(DualSolverError::invalid("no initial values given"));
    }
    let system = parse_system(equations, y0.len())?;
    check_system(&system, y0)?;

    let fun = derivative_function(&system, sink);
    info!(
        "integrating {} equations with {} on [{}, {}]",
        system.len(),
        method,
        t0,
        t_end
    );
    let y0 = DVector::from_column_slice(y0);
    let solution = solver.solve_ivp(&fun, (t0, t_end), &y0, t_eval, method)?;
    Ok(NumericTrajectory {
        t: solution.t,
        y: solution.y,
        labels: (0..system.len()).map(state_name).collect(),
        stats: solution.stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dual_solver::request::linspace;
    use crate::numerical::NonStiff_api::{IvpError, IvpSolution, NonStiffSolver};
    use crate::numerical::ivp_common::RhsFn;
    use approx::assert_relative_eq;

    fn strings(equations: &[&str]) -> Vec<String> {
        equations.iter().map(|s| s.to_string()).collect()
    }

    struct FailingSolver;

    impl IvpSolve for FailingSolver {
        fn solve_ivp(
            &self,
            _fun: &RhsFn,
            _t_span: (f64, f64),
            _y0: &DVector<f64>,
            _t_eval: &[f64],
            _method: IntegrationMethod,
        ) -> Result<IvpSolution, IvpError> {
            Err(IvpError::StepSizeTooSmall(0.5))
        }
    }

    #[test]
    fn test_derivative_function_binds_alias_and_time() {
        let system = parse_system(&strings(&["-v + t", "y1*y2"]), 2).unwrap();
        let sink = CollectingSink::default();
        let f = derivative_function(&system, &sink);
        let dy = f(2.0, &DVector::from_vec(vec![3.0, 4.0]));
        assert_eq!(dy.as_slice(), &[-1.0, 12.0]);
        assert!(sink.is_empty());
    }

    #[test]
    fn test_unbound_name_zeroes_only_its_component() {
        let system = parse_system(&strings(&["unknown_name", "-y2"]), 2).unwrap();
        let sink = CollectingSink::default();
        let f = derivative_function(&system, &sink);
        let dy = f(1.0, &DVector::from_vec(vec![1.0, 2.0]));
        assert_eq!(dy.as_slice(), &[0.0, -2.0]);
        let diagnostics = sink.diagnostics();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].equation, 0);
        assert_eq!(diagnostics[0].t, 1.0);
        assert_eq!(diagnostics[0].message, "name 'unknown_name' is not defined");
    }

    #[test]
    fn test_wrong_library_is_an_unbound_name() {
        let system = parse_system(&strings(&["sp.exp(t)"]), 1).unwrap();
        assert!(check_system(&system, &[1.0]).is_ok());
        let sink = CollectingSink::default();
        let f = derivative_function(&system, &sink);
        assert_eq!(f(0.0, &DVector::from_vec(vec![1.0]))[0], 0.0);
        assert_eq!(sink.diagnostics()[0].message, "name 'sp' is not defined");
    }

    #[test]
    fn test_fatal_equations() {
        assert!(matches!(
            parse_system(&strings(&["y1 +* 2"]), 1),
            Err(DualSolverError::InvalidRequest(_))
        ));
        let system = parse_system(&strings(&["np.foo(t)"]), 1).unwrap();
        assert!(check_system(&system, &[1.0]).is_err());
        let system = parse_system(&strings(&["y1(t)"]), 1).unwrap();
        assert!(check_system(&system, &[1.0]).is_err());
    }

    #[test]
    fn test_dimension_follows_initial_values() {
        let system = parse_system(&strings(&["y1", "y2"]), 1).unwrap();
        assert_eq!(system.len(), 1);
        let system = parse_system(&strings(&["y2"]), 2).unwrap();
        assert_eq!(system.len(), 2);
        assert_eq!(system[1], SyntaxTree::Number(0.0));
    }

    #[test]
    fn test_integrate_decay() {
        let t_eval = linspace(0.0, 5.0, 100);
        let sink = LogSink::default();
        let trajectory = integrate(
            &strings(&["-0.5*y1"]),
            &[10.0],
            &t_eval,
            IntegrationMethod::RK45,
            &NonStiffSolver::default(),
            &sink,
        )
        .unwrap();
        assert_eq!(trajectory.y.shape(), (100, 1));
        assert_eq!(trajectory.labels, vec!["y1".to_string()]);
        assert_eq!(trajectory.t[0], 0.0);
        assert_eq!(trajectory.y[(0, 0)], 10.0);
        assert_relative_eq!(trajectory.y[(99, 0)], 10.0 * (-2.5f64).exp(), epsilon = 5e-2);
        assert!(trajectory.stats.nfev > 0);
    }

    #[test]
    fn test_integrator_failure_is_fatal() {
        let t_eval = linspace(0.0, 1.0, 10);
        let result = integrate(
            &strings(&["y1"]),
            &[1.0],
            &t_eval,
            IntegrationMethod::RK45,
            &FailingSolver,
            &LogSink::default(),
        );
        assert!(matches!(
            result,
            Err(DualSolverError::Integration(IvpError::StepSizeTooSmall(_)))
        ));
    }

    #[test]
    fn test_log_sink_accepts_repeats() {
        let sink = LogSink::default();
        for t in [0.0, 0.1] {
            sink.report(Diagnostic {
                equation: 0,
                t,
                message: "name 'x' is not defined".to_string(),
            });
        }
        assert_eq!(sink.seen.borrow().len(), 1);
    }
}
