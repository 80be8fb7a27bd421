#![allow(non_camel_case_types)]
#![allow(non_snake_case)]
/// a module turns a String expression into a syntax tree and interprets it either numerically
/// or symbolically
///
///# Example
/// ```
/// use RustedODE::symbolic::parse_expr::parse_expression;
/// use RustedODE::symbolic::symbolic_engine::Expr;
/// use std::collections::HashMap;
/// let tree = parse_expression("-0.5*y1 + sin(t)").unwrap();
/// let scope = HashMap::from([("t".to_string(), 0.0), ("y1".to_string(), 2.0)]);
/// assert_eq!(tree.evaluate(&scope).unwrap(), -1.0);
/// let t = Expr::Var("t".to_string());
/// let scope = HashMap::from([
///     ("t".to_string(), t.clone()),
///     ("y1".to_string(), Expr::function("y1", t)),
/// ]);
/// let sym = tree.to_symbolic(&scope).unwrap();
/// assert_eq!(sym.to_string(), "-0.5*y1(t) + sin(t)");
/// ```
/// ________________________________________________________________________________________________________________________________
pub mod parse_expr;
///____________________________________________________________________________________________________________________________
/// # Symbolic engine
/// a module
/// 1) defines the expression tree with unknown functions `y1(t)` and unevaluated
///    `Derivative`/`Integral` forms
/// 2) prints expressions in the usual mathematical notation
/// 3) substitutes variables and unknown functions
///# Example#
/// ```
/// use RustedODE::symbolic::symbolic_engine::{Equation, Expr};
/// let t = Expr::Var("t".to_string());
/// let y1 = Expr::function("y1", t.clone());
/// let eq = Equation::new(
///     Expr::Derivative(Box::new(y1.clone()), "t".to_string()),
///     -y1 + Expr::Const(1.0),
/// );
/// assert_eq!(eq.to_string(), "Derivative(y1(t), t) = -y1(t) + 1");
/// ```
pub mod symbolic_engine;
/// analytical derivatives and numerical evaluation of expressions
pub mod symbolic_engine_derivatives;
/// rule based simplification
pub mod symbolic_simplify;
/// indefinite and definite integrals of elementary expressions
pub mod symbolic_integration;
///____________________________________________________________________________________________________________________________
/// # Closed-form solution of one first-order ODE
///# Example#
/// ```
/// use RustedODE::symbolic::dsolve::{ClosedFormSolve, Dsolve};
/// use RustedODE::symbolic::symbolic_engine::{Equation, Expr};
/// let t = Expr::Var("t".to_string());
/// let y1 = Expr::function("y1", t);
/// let eq = Equation::new(
///     Expr::Derivative(Box::new(y1.clone()), "t".to_string()),
///     Expr::Const(-0.5) * y1.clone(),
/// );
/// let solution = Dsolve::default().dsolve(&eq, &y1, 10.0).unwrap();
/// assert_eq!(solution.to_string(), "y1(t) = 10*exp(-0.5*t)");
/// ```
pub mod dsolve;
