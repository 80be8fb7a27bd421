//! Closed-form solver for a single first-order ODE `Derivative(y(t), t) = rhs` with `y(0) = y0`.
//!
//! Strategies, tried in order:
//! 1. quadrature: `rhs` does not involve `y`, so `y = y0 + ∫_0^t rhs`. Terms that cannot be
//!    integrated (other unknown functions, hard integrands) stay as unevaluated `Integral` nodes
//! 2. linear: `rhs = a(t)*y + b(t)`, solved with the integrating factor `exp(∫_0^t a)`;
//!    constant coefficients take a shortcut that prints without integrals
//! 3. autonomous separable: `rhs = g(y)`. Power laws `k*y^n` are solved explicitly, anything else
//!    goes through `H(y) = ∫ dy/g(y)`, inverted when possible, otherwise returned in implicit form
//!
//! Anything else is a [`DsolveError`]. The solver never looks at other equations of a system:
//! another unknown function is an opaque function of `t`.
use crate::symbolic::symbolic_engine::{Equation, Expr};
use log::debug;

/// name of the variable standing for the unknown function while the right-hand side is analysed
const PLACEHOLDER: &str = "_u";

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DsolveError {
    #[error("{equation} is not a first-order equation for {unknown}")]
    NotFirstOrder { equation: String, unknown: String },
    #[error("unable to solve {equation}: {reason}")]
    Unsupported { equation: String, reason: String },
}

/// Solver of one equation with its own initial condition
pub trait ClosedFormSolve {
    fn dsolve(
        &self,
        equation: &Equation,
        unknown: &Expr,
        initial_value: f64,
    ) -> Result<Equation, DsolveError>;
}

pub struct Dsolve {
    /// independent variable
    pub arg: String,
}

impl Default for Dsolve {
    fn default() -> Self {
        Dsolve::new("t")
    }
}

impl ClosedFormSolve for Dsolve {
    fn dsolve(
        &self,
        equation: &Equation,
        unknown: &Expr,
        initial_value: f64,
    ) -> Result<Equation, DsolveError> {
        let Expr::Func(name, _) = unknown else {
            return Err(self.not_first_order(equation, unknown));
        };
        if equation.lhs != Expr::Derivative(Box::new(unknown.clone()), self.arg.clone()) {
            return Err(self.not_first_order(equation, unknown));
        }
        let u = Expr::Var(PLACEHOLDER.to_string());
        let g = equation.rhs.substitute_function(name, &u).simplify();
        let unsupported = |reason: &str| DsolveError::Unsupported {
            equation: equation.to_string(),
            reason: reason.to_string(),
        };

        let solution = if !g.contains_variable(PLACEHOLDER) {
            debug!("{}: quadrature", equation);
            self.solve_quadrature(&g, initial_value)
        } else {
            let a = g.diff(PLACEHOLDER).simplify();
            if !a.contains_variable(PLACEHOLDER) {
                let b = g.set_variable(PLACEHOLDER, 0.0).simplify();
                debug!("{}: linear, a = {}, b = {}", equation, a, b);
                self.solve_linear(&a, &b, initial_value)
            } else if !g.contains_variable(&self.arg) && g.is_explicit() {
                debug!("{}: autonomous separable", equation);
                return self
                    .solve_separable(&g, unknown, initial_value)
                    .ok_or_else(|| unsupported("no antiderivative of 1/rhs"));
            } else {
                return Err(unsupported("right-hand side is nonlinear and not separable"));
            }
        };
        Ok(Equation::new(unknown.clone(), solution.simplify()))
    }
}

impl Dsolve {
    pub fn new(arg: &str) -> Self {
        Dsolve {
            arg: arg.to_string(),
        }
    }

    fn not_first_order(&self, equation: &Equation, unknown: &Expr) -> DsolveError {
        DsolveError::NotFirstOrder {
            equation: equation.to_string(),
            unknown: unknown.to_string(),
        }
    }

    fn t(&self) -> Expr {
        Expr::Var(self.arg.clone())
    }

    /// `∫_0^t f`, term by term; terms without an antiderivative stay unevaluated
    fn quadrature(&self, f: &Expr) -> Expr {
        match f {
            Expr::Add(lhs, rhs) => self.quadrature(lhs) + self.quadrature(rhs),
            Expr::Sub(lhs, rhs) => self.quadrature(lhs) - self.quadrature(rhs),
            _ => f
                .integrate_from_zero(&self.arg)
                .unwrap_or_else(|_| Expr::Integral(Box::new(f.clone()), self.arg.clone())),
        }
    }

    fn solve_quadrature(&self, g: &Expr, y0: f64) -> Expr {
        Expr::Const(y0) + self.quadrature(g)
    }

    /// `y' = a*y + b`
    fn solve_linear(&self, a: &Expr, b: &Expr, y0: f64) -> Expr {
        if let (Some(a), Some(c)) = (a.as_const(), b.as_const()) {
            let growth = (Expr::Const(a) * self.t()).exp();
            if c == 0.0 {
                return Expr::Const(y0) * growth;
            }
            // y = (y0 + c/a)*exp(a*t) - c/a
            return Expr::Const(y0 + c / a) * growth + Expr::Const(-c / a);
        }
        // y = exp(A) * (y0 + ∫_0^t b*exp(-A)), A = ∫_0^t a
        let big_a = self.quadrature(a).simplify();
        let factor = big_a.clone().exp();
        if b.is_zero() {
            return Expr::Const(y0) * factor;
        }
        let integrand = (b.clone() * (-big_a).exp()).simplify();
        factor * (Expr::Const(y0) + self.quadrature(&integrand))
    }

    /// `y' = g(y)`
    fn solve_separable(&self, g: &Expr, unknown: &Expr, y0: f64) -> Option<Equation> {
        if let Some((k, n)) = power_law(g) {
            // y^(1-n) = y0^(1-n) + (1-n)*k*t
            if y0 == 0.0 && n > 0.0 {
                return Some(Equation::new(unknown.clone(), Expr::Const(0.0)));
            }
            let m = 1.0 - n;
            let start = y0.powf(m);
            if start.is_finite() {
                let base = Expr::Const(start) + Expr::Const(m * k) * self.t();
                let rhs = base.pow(Expr::Const(1.0 / m)).simplify();
                if explicit_matches(&rhs, &self.arg, y0) {
                    return Some(Equation::new(unknown.clone(), rhs));
                }
            }
        }
        // H(y) = t + H(y0), H = ∫ dy/g(y)
        let h = reciprocal(g).simplify().integrate(PLACEHOLDER).ok()?.simplify();
        let h0 = h.eval_expression(&[PLACEHOLDER], &[y0])?;
        if !h0.is_finite() {
            return None;
        }
        let level = self.t() + Expr::Const(h0);
        if let Some(explicit) = invert(&h, level.clone()) {
            let explicit = explicit.simplify();
            if explicit_matches(&explicit, &self.arg, y0) {
                return Some(Equation::new(unknown.clone(), explicit));
            }
        }
        Some(Equation::new(
            h.substitute_variable(PLACEHOLDER, unknown),
            level.simplify(),
        ))
    }
}

/// `k*u^n` or `u^n`, with `u` the placeholder
fn power_law(g: &Expr) -> Option<(f64, f64)> {
    let exponent = |e: &Expr| match e {
        Expr::Pow(base, n) if matches!(base.as_ref(), Expr::Var(name) if name == PLACEHOLDER) => {
            n.as_const()
        }
        _ => None,
    };
    match g {
        Expr::Mul(k, rest) => Some((k.as_const()?, exponent(rest)?)),
        _ => Some((1.0, exponent(g)?)),
    }
}

/// `1/g`, folding the reciprocal into powers and exponentials so the result stays integrable
fn reciprocal(g: &Expr) -> Expr {
    match g {
        Expr::Var(_) => g.clone().pow(Expr::Const(-1.0)),
        Expr::Pow(base, exp) => Expr::Pow(base.clone(), Box::new(-exp.as_ref().clone())),
        Expr::Exp(arg) => Expr::Exp(Box::new(-arg.as_ref().clone())),
        Expr::Mul(lhs, rhs) => match lhs.as_ref() {
            Expr::Const(k) if *k != 0.0 => Expr::Const(1.0 / k) * reciprocal(rhs),
            _ => reciprocal(lhs) * reciprocal(rhs),
        },
        Expr::Div(lhs, rhs) => rhs.as_ref().clone() * reciprocal(lhs),
        _ => Expr::Const(1.0) / g.clone(),
    }
}

/// Solves `h(u) = target` for `u` when `u` occurs once along a chain of invertible operations.
fn invert(h: &Expr, target: Expr) -> Option<Expr> {
    let has_u = |e: &Expr| e.contains_variable(PLACEHOLDER);
    match h {
        Expr::Var(name) if name == PLACEHOLDER => Some(target),
        Expr::Add(lhs, rhs) if !has_u(rhs) => invert(lhs, target - rhs.as_ref().clone()),
        Expr::Add(lhs, rhs) if !has_u(lhs) => invert(rhs, target - lhs.as_ref().clone()),
        Expr::Sub(lhs, rhs) if !has_u(rhs) => invert(lhs, target + rhs.as_ref().clone()),
        Expr::Sub(lhs, rhs) if !has_u(lhs) => invert(rhs, lhs.as_ref().clone() - target),
        Expr::Mul(lhs, rhs) if !has_u(lhs) => invert(rhs, target / lhs.as_ref().clone()),
        Expr::Mul(lhs, rhs) if !has_u(rhs) => invert(lhs, target / rhs.as_ref().clone()),
        Expr::Div(lhs, rhs) if !has_u(rhs) => invert(lhs, target * rhs.as_ref().clone()),
        Expr::Div(lhs, rhs) if !has_u(lhs) => invert(rhs, lhs.as_ref().clone() / target),
        Expr::Exp(arg) => invert(arg, target.ln()),
        Expr::Ln(arg) => invert(arg, target.exp()),
        Expr::Pow(base, exp) if !has_u(exp) => {
            let n = exp.as_const()?;
            invert(base, target.pow(Expr::Const(1.0 / n)))
        }
        _ => None,
    }
}

/// true when `y` is explicit and `y(0) == y0`; guards against picking the wrong branch of an inverse
fn explicit_matches(y: &Expr, arg: &str, y0: f64) -> bool {
    if !y.is_explicit() {
        return false;
    }
    match y.eval_expression(&[arg], &[0.0]) {
        Some(value) => (value - y0).abs() <= 1e-9 * (1.0 + y0.abs()),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn t() -> Expr {
        Expr::Var("t".to_string())
    }

    fn y(name: &str) -> Expr {
        Expr::function(name, t())
    }

    fn ode(name: &str, rhs: Expr) -> Equation {
        Equation::new(Expr::Derivative(Box::new(y(name)), "t".to_string()), rhs)
    }

    fn check_on_grid(solution: &Equation, exact: impl Fn(f64) -> f64) {
        for x in [0.0, 0.4, 1.0, 2.5] {
            let value = solution.rhs.eval_expression(&["t"], &[x]).unwrap();
            assert_relative_eq!(value, exact(x), epsilon = 1e-9, max_relative = 1e-9);
        }
    }

    #[test]
    fn test_exponential_decay() {
        let eq = ode("y1", Expr::Const(-0.5) * y("y1"));
        let solution = Dsolve::default().dsolve(&eq, &y("y1"), 10.0).unwrap();
        assert_eq!(solution.to_string(), "y1(t) = 10*exp(-0.5*t)");
    }

    #[test]
    fn test_constant_coefficient_linear() {
        // y' = 10 - y, y(0) = 0
        let eq = ode("y1", Expr::Const(10.0) - y("y1"));
        let solution = Dsolve::default().dsolve(&eq, &y("y1"), 0.0).unwrap();
        assert_eq!(solution.to_string(), "y1(t) = -10*exp(-t) + 10");
        check_on_grid(&solution, |t| 10.0 - 10.0 * (-t).exp());
    }

    #[test]
    fn test_negative_constants_print_as_sums() {
        // y' = -y + t, y(0) = 1
        let eq = ode("y1", -y("y1") + t());
        let solution = Dsolve::default().dsolve(&eq, &y("y1"), 1.0).unwrap();
        assert!(!solution.to_string().contains("(-1)"), "{}", solution);
        check_on_grid(&solution, |t| 2.0 * (-t).exp() + t - 1.0);
    }

    #[test]
    fn test_forced_linear() {
        // y' = -y + sin(t), y(0) = 0
        let eq = ode("y1", -y("y1") + Expr::sin(t().boxed()));
        let solution = Dsolve::default().dsolve(&eq, &y("y1"), 0.0).unwrap();
        check_on_grid(&solution, |t| 0.5 * (t.sin() - t.cos() + (-t).exp()));
    }

    #[test]
    fn test_time_dependent_coefficient() {
        // y' = t*y, y(0) = 2
        let eq = ode("y1", t() * y("y1"));
        let solution = Dsolve::default().dsolve(&eq, &y("y1"), 2.0).unwrap();
        check_on_grid(&solution, |t| 2.0 * (t * t / 2.0).exp());
    }

    #[test]
    fn test_quadrature() {
        // y' = cos(t), y(0) = 1
        let eq = ode("y1", Expr::cos(t().boxed()));
        let solution = Dsolve::default().dsolve(&eq, &y("y1"), 1.0).unwrap();
        check_on_grid(&solution, |t| 1.0 + t.sin());
    }

    #[test]
    fn test_other_unknown_stays_unevaluated() {
        let eq = ode("y1", y("y2"));
        let solution = Dsolve::default().dsolve(&eq, &y("y1"), 1.0).unwrap();
        assert_eq!(solution.to_string(), "y1(t) = 1 + Integral(y2(t), (t, 0, t))");

        let eq = ode("y2", -y("y1"));
        let solution = Dsolve::default().dsolve(&eq, &y("y2"), 0.0).unwrap();
        assert_eq!(solution.to_string(), "y2(t) = Integral(-y1(t), (t, 0, t))");
    }

    #[test]
    fn test_power_law() {
        // y' = y^2, y(0) = 1 -> y = 1/(1 - t)
        let eq = ode("y1", y("y1").pow(Expr::Const(2.0)));
        let solution = Dsolve::default().dsolve(&eq, &y("y1"), 1.0).unwrap();
        assert_eq!(solution.to_string(), "y1(t) = (1 - t)^(-1)");
        for x in [0.0, 0.3, 0.6] {
            let value = solution.rhs.eval_expression(&["t"], &[x]).unwrap();
            assert_relative_eq!(value, 1.0 / (1.0 - x), epsilon = 1e-12);
        }
        let solution = Dsolve::default().dsolve(&eq, &y("y1"), 0.0).unwrap();
        assert_eq!(solution.rhs, Expr::Const(0.0));
    }

    #[test]
    fn test_separable_with_inversion() {
        // y' = exp(-y), y(0) = 0 -> y = ln(t + 1)
        let eq = ode("y1", (-y("y1")).exp());
        let solution = Dsolve::default().dsolve(&eq, &y("y1"), 0.0).unwrap();
        assert_eq!(solution.lhs, y("y1"));
        check_on_grid(&solution, |t| (t + 1.0).ln());
    }

    #[test]
    fn test_unsupported_equations() {
        // nonlinear in y and explicitly time dependent
        let eq = ode("y1", t() * y("y1").pow(Expr::Const(2.0)) + Expr::sin(y("y1").boxed()));
        let err = Dsolve::default().dsolve(&eq, &y("y1"), 1.0).unwrap_err();
        assert!(matches!(err, DsolveError::Unsupported { .. }));

        let not_ode = Equation::new(y("y1"), t());
        let err = Dsolve::default().dsolve(&not_ode, &y("y1"), 1.0).unwrap_err();
        assert!(matches!(err, DsolveError::NotFirstOrder { .. }));
    }
}
