//! Equations -> `Derivative(yi(t), t) = rhs_i` -> closed form, one equation at a time.
use crate::dual_solver::binding::{TIME, VariableBinding, unknown_functions};
use crate::symbolic::dsolve::{ClosedFormSolve, DsolveError};
use crate::symbolic::parse_expr::{EvalError, ParseError, parse_expression, rewrite_qualifiers};
use crate::symbolic::symbolic_engine::{Equation, Expr};
use itertools::Itertools;
use log::{info, warn};
use std::fmt;

/// Reasons for the symbolic side to give up; only their text leaves this module
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SymbolicError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Eval(#[from] EvalError),
    #[error(transparent)]
    Dsolve(#[from] DsolveError),
    #[error("no initial value for {0}")]
    MissingInitialValue(String),
}

/// Closed-form solutions, one per state variable, or the text explaining why there are none
#[derive(Debug, Clone, PartialEq)]
pub enum SymbolicSolution {
    Solved(Vec<Equation>),
    Failed(String),
}

impl SymbolicSolution {
    pub fn failed(message: impl fmt::Display) -> Self {
        SymbolicSolution::Failed(format!("⚠️ Error: {}", message))
    }

    pub fn is_solved(&self) -> bool {
        matches!(self, SymbolicSolution::Solved(_))
    }

    pub fn equations(&self) -> &[Equation] {
        match self {
            SymbolicSolution::Solved(equations) => equations,
            SymbolicSolution::Failed(_) => &[],
        }
    }
}

/// One `yi(t) = ...` line per solution, or the error text
impl fmt::Display for SymbolicSolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymbolicSolution::Solved(equations) => write!(f, "{}", equations.iter().join("\n")),
            SymbolicSolution::Failed(message) => write!(f, "{}", message),
        }
    }
}

/// `Derivative(yi(t), t) = rhs_i` for every equation, with `np.` rewritten to `sp.` first
pub fn build_equations(equations: &[String]) -> Result<Vec<Equation>, SymbolicError> {
    let unknowns = unknown_functions(equations.len());
    let binding = VariableBinding::symbolic(equations.len());
    equations
        .iter()
        .zip(unknowns)
        .map(|(source, unknown)| {
            let tree = parse_expression(&rewrite_qualifiers(source))?;
            let rhs = tree.to_symbolic(binding.scope())?.simplify();
            Ok(Equation::new(
                Expr::Derivative(Box::new(unknown), TIME.to_string()),
                rhs,
            ))
        })
        .collect()
}

fn solve_each(
    equations: &[String],
    initial_state: &[f64],
    solver: &dyn ClosedFormSolve,
) -> Result<Vec<Equation>, SymbolicError> {
    let odes = build_equations(equations)?;
    odes.iter()
        .zip(unknown_functions(odes.len()))
        .enumerate()
        .map(|(i, (ode, unknown))| {
            let y0 = *initial_state
                .get(i)
                .ok_or_else(|| SymbolicError::MissingInitialValue(unknown.to_string()))?;
            info!("solving {} with {}(0) = {}", ode, unknown, y0);
            Ok(solver.dsolve(ode, &unknown, y0)?)
        })
        .collect()
}

/// Solves every equation on its own with its own initial value. Coupled unknowns stay opaque
/// functions of `t`. The first failure replaces the whole result.
pub fn solve(
    equations: &[String],
    initial_state: &[f64],
    solver: &dyn ClosedFormSolve,
) -> SymbolicSolution {
    match solve_each(equations, initial_state, solver) {
        Ok(solutions) => SymbolicSolution::Solved(solutions),
        Err(e) => {
            warn!("closed-form solution failed: {}", e);
            SymbolicSolution::failed(e)
        }
    }
}
