//! # Symbolic Derivatives and Evaluation
//!
//! Analytical differentiation of [`Expr`] trees and their numerical evaluation.
//!
//! - `diff(var)` - chain rule, product rule and quotient rule over the full `Expr` variant set;
//!   unknown functions of `var` turn into unevaluated `Derivative` nodes, and an `Integral`
//!   over `var` differentiates back to its integrand
//! - `eval_expression(vars, values)` - evaluates an explicit expression, `None` when the
//!   expression still holds unknown functions or a variable missing from `vars`
//! - `lambdify1D(var)` - one-argument closure over the expression, used to sample closed-form
//!   solutions on the time grid
use crate::symbolic::symbolic_engine::Expr;

impl Expr {
    /// Computes the analytical derivative with respect to a variable.
    ///
    /// # Examples
    /// ```rust, ignore
    /// let x = Expr::Var("x".to_string());
    /// let f = x.clone().pow(Expr::Const(2.0)); // x^2
    /// let df_dx = f.diff("x"); // 2*x
    /// ```
    pub fn diff(&self, var: &str) -> Expr {
        match self {
            Expr::Var(name) => {
                if name == var {
                    Expr::Const(1.0)
                } else {
                    Expr::Const(0.0)
                }
            }
            Expr::Const(_) => Expr::Const(0.0),
            Expr::Add(lhs, rhs) => Expr::Add(Box::new(lhs.diff(var)), Box::new(rhs.diff(var))),
            Expr::Sub(lhs, rhs) => Expr::Sub(Box::new(lhs.diff(var)), Box::new(rhs.diff(var))),
            Expr::Mul(lhs, rhs) => Expr::Add(
                Box::new(Expr::Mul(Box::new(lhs.diff(var)), rhs.clone())),
                Box::new(Expr::Mul(lhs.clone(), Box::new(rhs.diff(var)))),
            ),
            Expr::Div(lhs, rhs) => Expr::Div(
                Box::new(Expr::Sub(
                    Box::new(Expr::Mul(Box::new(lhs.diff(var)), rhs.clone())),
                    Box::new(Expr::Mul(Box::new(rhs.diff(var)), lhs.clone())),
                )),
                Box::new(Expr::Mul(rhs.clone(), rhs.clone())),
            ),
            Expr::Pow(base, exp) => {
                if !exp.contains_variable(var) && !exp.contains_dependent(var) {
                    // d(u^n) = n*u^(n-1)*du
                    Expr::Mul(
                        Box::new(Expr::Mul(
                            exp.clone(),
                            Box::new(Expr::Pow(
                                base.clone(),
                                Box::new(Expr::Sub(exp.clone(), Box::new(Expr::Const(1.0)))),
                            )),
                        )),
                        Box::new(base.diff(var)),
                    )
                } else {
                    // d(u^w) = u^w * (dw*ln(u) + w*du/u)
                    Expr::Mul(
                        Box::new(self.clone()),
                        Box::new(Expr::Add(
                            Box::new(Expr::Mul(Box::new(exp.diff(var)), Box::new(Expr::Ln(base.clone())))),
                            Box::new(Expr::Div(
                                Box::new(Expr::Mul(exp.clone(), Box::new(base.diff(var)))),
                                base.clone(),
                            )),
                        )),
                    )
                }
            }
            Expr::Exp(expr) => {
                Expr::Mul(Box::new(Expr::Exp(expr.clone())), Box::new(expr.diff(var)))
            }
            Expr::Ln(expr) => Expr::Div(Box::new(expr.diff(var)), expr.clone()),
            Expr::sin(expr) => {
                Expr::Mul(Box::new(Expr::cos(expr.clone())), Box::new(expr.diff(var)))
            }
            Expr::cos(expr) => Expr::Mul(
                Box::new(Expr::Mul(
                    Box::new(Expr::Const(-1.0)),
                    Box::new(Expr::sin(expr.clone())),
                )),
                Box::new(expr.diff(var)),
            ),
            Expr::tg(expr) => Expr::Mul(
                Box::new(Expr::Div(
                    Box::new(Expr::Const(1.0)),
                    Box::new(Expr::Pow(
                        Box::new(Expr::cos(expr.clone())),
                        Box::new(Expr::Const(2.0)),
                    )),
                )),
                Box::new(expr.diff(var)),
            ),
            Expr::arcsin(expr) => Expr::Div(
                Box::new(expr.diff(var)),
                Box::new(Expr::Pow(
                    Box::new(Expr::Sub(
                        Box::new(Expr::Const(1.0)),
                        Box::new(Expr::Pow(expr.clone(), Box::new(Expr::Const(2.0)))),
                    )),
                    Box::new(Expr::Const(0.5)),
                )),
            ),
            Expr::arccos(expr) => Expr::Div(
                Box::new(Expr::Mul(
                    Box::new(Expr::Const(-1.0)),
                    Box::new(expr.diff(var)),
                )),
                Box::new(Expr::Pow(
                    Box::new(Expr::Sub(
                        Box::new(Expr::Const(1.0)),
                        Box::new(Expr::Pow(expr.clone(), Box::new(Expr::Const(2.0)))),
                    )),
                    Box::new(Expr::Const(0.5)),
                )),
            ),
            Expr::arctg(expr) => Expr::Div(
                Box::new(expr.diff(var)),
                Box::new(Expr::Add(
                    Box::new(Expr::Const(1.0)),
                    Box::new(Expr::Pow(expr.clone(), Box::new(Expr::Const(2.0)))),
                )),
            ),
            Expr::Func(_, arg) => {
                if arg.contains_variable(var) {
                    // chain rule against the unknown function's own derivative
                    Expr::Mul(
                        Box::new(Expr::Derivative(Box::new(self.clone()), var.to_string())),
                        Box::new(arg.diff(var)),
                    )
                } else {
                    Expr::Const(0.0)
                }
            }
            Expr::Derivative(inner, _) => {
                if inner.contains_variable(var) {
                    Expr::Derivative(Box::new(self.clone()), var.to_string())
                } else {
                    Expr::Const(0.0)
                }
            }
            Expr::Integral(integrand, upper) => {
                if upper == var {
                    integrand.as_ref().clone()
                } else if integrand.contains_variable(var) {
                    Expr::Integral(Box::new(integrand.diff(var)), upper.clone())
                } else {
                    Expr::Const(0.0)
                }
            }
        }
    } // end of diff

    /// true when an unknown function or an unevaluated form depends on `var`
    fn contains_dependent(&self, var: &str) -> bool {
        self.any_node(&|node| match node {
            Expr::Func(_, arg) => arg.contains_variable(var),
            Expr::Integral(_, upper) => upper == var,
            _ => false,
        })
    }

    /// Evaluates the expression for the given variable values.
    ///
    /// # Arguments
    /// * `vars` - Variable names in order matching values array
    /// * `values` - Numerical values for each variable
    ///
    /// # Returns
    /// `None` when a variable is missing or the expression is not explicit
    pub fn eval_expression(&self, vars: &[&str], values: &[f64]) -> Option<f64> {
        let value = match self {
            Expr::Var(name) => {
                let index = vars.iter().position(|&x| x == name)?;
                *values.get(index)?
            }
            Expr::Const(val) => *val,
            Expr::Add(lhs, rhs) => lhs.eval_expression(vars, values)? + rhs.eval_expression(vars, values)?,
            Expr::Sub(lhs, rhs) => lhs.eval_expression(vars, values)? - rhs.eval_expression(vars, values)?,
            Expr::Mul(lhs, rhs) => lhs.eval_expression(vars, values)? * rhs.eval_expression(vars, values)?,
            Expr::Div(lhs, rhs) => lhs.eval_expression(vars, values)? / rhs.eval_expression(vars, values)?,
            Expr::Pow(base, exp) => {
                let base_fn = base.eval_expression(vars, values)?;
                let exp_fn = exp.eval_expression(vars, values)?;
                base_fn.powf(exp_fn)
            }
            Expr::Exp(expr) => expr.eval_expression(vars, values)?.exp(),
            Expr::Ln(expr) => expr.eval_expression(vars, values)?.ln(),
            Expr::sin(expr) => expr.eval_expression(vars, values)?.sin(),
            Expr::cos(expr) => expr.eval_expression(vars, values)?.cos(),
            Expr::tg(expr) => expr.eval_expression(vars, values)?.tan(),
            Expr::arcsin(expr) => expr.eval_expression(vars, values)?.asin(),
            Expr::arccos(expr) => expr.eval_expression(vars, values)?.acos(),
            Expr::arctg(expr) => expr.eval_expression(vars, values)?.atan(),
            Expr::Func(..) | Expr::Derivative(..) | Expr::Integral(..) => return None,
        };
        Some(value)
    } // end of eval_expression

    /// Turns an expression of one variable into a closure.
    pub fn lambdify1D(&self, var: &str) -> impl Fn(f64) -> Option<f64> + '_ {
        let var = var.to_string();
        move |x| self.eval_expression(&[var.as_str()], &[x])
    }

    /// Evaluates an expression of one variable on every point of `x`.
    pub fn calc_vector_lambdified1D(&self, var: &str, x: &[f64]) -> Option<Vec<f64>> {
        let f = self.lambdify1D(var);
        x.iter().map(|&xi| f(xi)).collect()
    }
}
