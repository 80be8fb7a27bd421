use crate::symbolic::symbolic_engine::Expr;

impl Expr {
    /// SYMBOLIC INTEGRATION

    /// Main integration method - integrates with respect to a variable
    /// Returns the indefinite integral (without constant of integration)
    ///  This module deals with simple integrals: linear arguments, polynomial times exponential
    ///  and exponential times sine or cosine.
    pub fn integrate(&self, var: &str) -> Result<Expr, String> {
        if !self.contains_variable(var) {
            // ∫ c dx = c*x, also covers symbols free of x
            return Ok(self.clone() * Expr::Var(var.to_string()));
        }
        match self {
            // ∫ x dx = x²/2
            Expr::Var(_) => Ok(Expr::Pow(
                Box::new(Expr::Var(var.to_string())),
                Box::new(Expr::Const(2.0)),
            ) / Expr::Const(2.0)),

            Expr::Const(_) => Ok(self.clone() * Expr::Var(var.to_string())),

            // ∫ (f + g) dx = ∫ f dx + ∫ g dx
            Expr::Add(lhs, rhs) => {
                let lhs_int = lhs.integrate(var)?;
                let rhs_int = rhs.integrate(var)?;
                Ok(lhs_int + rhs_int)
            }

            // ∫ (f - g) dx = ∫ f dx - ∫ g dx
            Expr::Sub(lhs, rhs) => {
                let lhs_int = lhs.integrate(var)?;
                let rhs_int = rhs.integrate(var)?;
                Ok(lhs_int - rhs_int)
            }

            Expr::Mul(lhs, rhs) => self.integrate_multiplication(lhs, rhs, var),

            Expr::Div(lhs, rhs) => self.integrate_division(lhs, rhs, var),

            // ∫ x^n dx = x^(n+1)/(n+1) for n ≠ -1
            Expr::Pow(base, exp) => self.integrate_power(base, exp, var),

            // ∫ e^(a*x+b) dx = e^(a*x+b)/a
            Expr::Exp(expr) => {
                let a = expr.linear_slope(var).ok_or_else(|| {
                    format!("Cannot integrate exponential of nonlinear argument: {}", expr)
                })?;
                Ok(self.clone() / Expr::Const(a))
            }

            // ∫ ln(a*x+b) dx = ((a*x+b)*ln(a*x+b) - (a*x+b))/a
            Expr::Ln(expr) => {
                let a = expr.linear_slope(var).ok_or_else(|| {
                    format!("Cannot integrate logarithm of nonlinear argument: {}", expr)
                })?;
                let inner = expr.as_ref().clone();
                Ok((inner.clone() * self.clone() - inner) / Expr::Const(a))
            }

            // ∫ sin(a*x+b) dx = -cos(a*x+b)/a
            Expr::sin(expr) => {
                let a = expr.linear_slope(var).ok_or_else(|| {
                    format!("Cannot integrate sine of nonlinear argument: {}", expr)
                })?;
                Ok(Expr::cos(expr.clone()) / Expr::Const(-a))
            }

            // ∫ cos(a*x+b) dx = sin(a*x+b)/a
            Expr::cos(expr) => {
                let a = expr.linear_slope(var).ok_or_else(|| {
                    format!("Cannot integrate cosine of nonlinear argument: {}", expr)
                })?;
                Ok(Expr::sin(expr.clone()) / Expr::Const(a))
            }

            // ∫ tg(a*x+b) dx = -ln(cos(a*x+b))/a
            Expr::tg(expr) => {
                let a = expr.linear_slope(var).ok_or_else(|| {
                    format!("Cannot integrate tangent of nonlinear argument: {}", expr)
                })?;
                Ok(Expr::Ln(Box::new(Expr::cos(expr.clone()))) / Expr::Const(-a))
            }

            Expr::arcsin(_) | Expr::arccos(_) | Expr::arctg(_) => {
                Err(format!("Cannot integrate inverse trigonometric function: {}", self))
            }

            Expr::Func(..) | Expr::Derivative(..) | Expr::Integral(..) => {
                Err(format!("Cannot integrate unknown function: {}", self))
            }
        }
    }

    /// Slope `a` of an argument of the form `a*x + b`, `None` when the argument is not linear.
    pub fn linear_slope(&self, var: &str) -> Option<f64> {
        if !self.is_explicit() {
            return None;
        }
        let slope = self.diff(var).simplify().as_const()?;
        if slope == 0.0 { None } else { Some(slope) }
    }

    fn integrate_multiplication(&self, lhs: &Expr, rhs: &Expr, var: &str) -> Result<Expr, String> {
        // Check if one factor is constant
        if !lhs.contains_variable(var) {
            let rhs_int = rhs.integrate(var)?;
            return Ok(lhs.clone() * rhs_int);
        }

        if !rhs.contains_variable(var) {
            let lhs_int = lhs.integrate(var)?;
            return Ok(rhs.clone() * lhs_int);
        }

        // Pattern 1: polynomial * exponential
        if let Some(result) = Self::integrate_polynomial_times_exponential(lhs, rhs, var) {
            return result;
        }
        if let Some(result) = Self::integrate_polynomial_times_exponential(rhs, lhs, var) {
            return result;
        }

        // Pattern 2: exponential * sine or cosine
        if let Some(result) = Self::integrate_exponential_times_trig(lhs, rhs, var) {
            return Ok(result);
        }
        if let Some(result) = Self::integrate_exponential_times_trig(rhs, lhs, var) {
            return Ok(result);
        }

        // Pattern 3: the product simplifies into something integrable
        let product = Expr::Mul(Box::new(lhs.clone()), Box::new(rhs.clone()));
        let simplified = product.simplify();
        if simplified != product && !matches!(simplified, Expr::Mul(..)) {
            return simplified.integrate(var);
        }

        Err(format!("Cannot integrate product: {} * {}", lhs, rhs))
    }

    /// ∫ x^n e^(a*x+b) dx by repeated integration by parts, n a non-negative integer
    fn integrate_polynomial_times_exponential(
        poly: &Expr,
        exp: &Expr,
        var: &str,
    ) -> Option<Result<Expr, String>> {
        let Expr::Exp(arg) = exp else {
            return None;
        };
        let a = arg.linear_slope(var)?;
        let is_monomial = match poly {
            Expr::Var(name) => name == var,
            Expr::Pow(base, n) => matches!(
                (base.as_ref(), n.as_ref()),
                (Expr::Var(name), Expr::Const(n)) if name == var && *n >= 1.0 && n.fract() == 0.0
            ),
            _ => false,
        };
        if !is_monomial {
            return None;
        }
        // ∫ p e dx = p e / a - (1/a) ∫ p' e dx
        let rest = (poly.diff(var).simplify() * exp.clone()).simplify().integrate(var);
        Some(rest.map(|rest_int| {
            poly.clone() * exp.clone() / Expr::Const(a) - rest_int / Expr::Const(a)
        }))
    }

    /// ∫ e^(a*x+b) sin(c*x+d) dx and ∫ e^(a*x+b) cos(c*x+d) dx
    fn integrate_exponential_times_trig(exp: &Expr, trig: &Expr, var: &str) -> Option<Expr> {
        let Expr::Exp(exp_arg) = exp else {
            return None;
        };
        let a = exp_arg.linear_slope(var)?;
        let denominator = |c: f64| Expr::Const(a * a + c * c);
        match trig {
            Expr::sin(arg) => {
                let c = arg.linear_slope(var)?;
                let sin = Expr::sin(arg.clone());
                let cos = Expr::cos(arg.clone());
                Some(
                    exp.clone() * (Expr::Const(a) * sin - Expr::Const(c) * cos) / denominator(c),
                )
            }
            Expr::cos(arg) => {
                let c = arg.linear_slope(var)?;
                let sin = Expr::sin(arg.clone());
                let cos = Expr::cos(arg.clone());
                Some(
                    exp.clone() * (Expr::Const(a) * cos + Expr::Const(c) * sin) / denominator(c),
                )
            }
            _ => None,
        }
    }

    /// Handle division in integration
    fn integrate_division(&self, lhs: &Expr, rhs: &Expr, var: &str) -> Result<Expr, String> {
        // If denominator is constant: ∫ f(x)/c dx = (1/c) * ∫ f(x) dx
        if !rhs.contains_variable(var) {
            let lhs_int = lhs.integrate(var)?;
            return Ok(lhs_int / rhs.clone());
        }

        // ∫ c/(a*x+b) dx = (c/a)*ln(a*x+b)
        if !lhs.contains_variable(var) {
            if let Some(a) = rhs.linear_slope(var) {
                return Ok(lhs.clone() / Expr::Const(a) * Expr::Ln(Box::new(rhs.clone())));
            }
            // ∫ c/e^(g) dx = ∫ c*e^(-g) dx
            if let Expr::Exp(arg) = rhs {
                let reciprocal = Expr::Exp(Box::new(-arg.as_ref().clone()));
                return (lhs.clone() * reciprocal).simplify().integrate(var);
            }
        }

        // Special case: ∫ f'(x)/f(x) dx = ln|f(x)|
        let derivative = rhs.diff(var).simplify();
        if derivative == lhs.simplify() {
            return Ok(Expr::Ln(Box::new(rhs.clone())));
        }

        Err(format!("Cannot integrate division: {} / {}", lhs, rhs))
    }

    /// Handle power integration
    fn integrate_power(&self, base: &Expr, exp: &Expr, var: &str) -> Result<Expr, String> {
        // ∫ (a*x+b)^n dx where n is constant
        if !exp.contains_variable(var) {
            if let (Some(a), Some(n)) = (base.linear_slope(var), exp.as_const()) {
                if (n + 1.0).abs() < f64::EPSILON {
                    // ∫ (a*x+b)^(-1) dx = ln|a*x+b|/a
                    return Ok(Expr::Ln(Box::new(base.clone())) / Expr::Const(a));
                }
                return Ok(Expr::Pow(Box::new(base.clone()), Box::new(Expr::Const(n + 1.0)))
                    / Expr::Const(a * (n + 1.0)));
            }
        }
        // ∫ c^(a*x+b) dx = c^(a*x+b)/(a*ln(c))
        if let (Some(c), Some(a)) = (base.as_const(), exp.linear_slope(var)) {
            if c > 0.0 && c != 1.0 {
                return Ok(self.clone() / Expr::Const(a * c.ln()));
            }
        }
        Err(format!("Cannot integrate power: {}^{}", base, exp))
    }

    /// Definite integral from 0 to `var`: `F(var) - F(0)`, simplified.
    pub fn integrate_from_zero(&self, var: &str) -> Result<Expr, String> {
        let antiderivative = self.integrate(var)?.simplify();
        let at_zero = antiderivative.set_variable(var, 0.0).simplify();
        if at_zero.is_explicit() {
            if let Some(value) = at_zero.eval_expression(&[], &[]) {
                if !value.is_finite() {
                    return Err(format!("Improper integral of {} at 0", self));
                }
                return Ok((antiderivative - Expr::Const(value)).simplify());
            }
        }
        Ok((antiderivative - at_zero).simplify())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn t() -> Expr {
        Expr::Var("t".to_string())
    }

    /// checks F' == f numerically on a few points
    fn check_antiderivative(f: &Expr) {
        let integral = f.integrate("t").unwrap();
        let derivative = integral.diff("t");
        for x in [0.3, 0.7, 1.2] {
            let lhs = derivative.eval_expression(&["t"], &[x]).unwrap();
            let rhs = f.eval_expression(&["t"], &[x]).unwrap();
            assert_relative_eq!(lhs, rhs, epsilon = 1e-9, max_relative = 1e-9);
        }
    }

    #[test]
    fn test_elementary_integrals() {
        check_antiderivative(&Expr::Const(3.0));
        check_antiderivative(&(t() * t()));
        check_antiderivative(&t().pow(Expr::Const(-1.0)));
        check_antiderivative(&(Expr::Const(2.0) * t() + Expr::Const(1.0)).pow(Expr::Const(3.0)));
        check_antiderivative(&(Expr::Const(-0.5) * t()).exp());
        check_antiderivative(&Expr::sin(Box::new(Expr::Const(2.0) * t())));
        check_antiderivative(&Expr::cos(t().boxed()));
        check_antiderivative(&Expr::tg(t().boxed()));
        check_antiderivative(&(t() + Expr::Const(1.0)).ln());
        check_antiderivative(&(Expr::Const(1.0) / (t() + Expr::Const(2.0))));
        check_antiderivative(&Expr::Const(2.0).pow(t()));
    }

    #[test]
    fn test_integration_by_parts_patterns() {
        check_antiderivative(&(t() * (Expr::Const(2.0) * t()).exp()));
        check_antiderivative(&(t().pow(Expr::Const(2.0)) * t().exp()));
        check_antiderivative(&(t().exp() * Expr::sin(t().boxed())));
        check_antiderivative(&(Expr::cos(Box::new(Expr::Const(3.0) * t())) * (Expr::Const(-1.0) * t()).exp()));
    }

    #[test]
    fn test_unsupported_integrals() {
        assert!(Expr::function("y2", t()).integrate("t").is_err());
        assert!(Expr::sin(Box::new(t() * t())).integrate("t").is_err());
    }

    #[test]
    fn test_integrate_from_zero() {
        // ∫_0^t cos(s) ds = sin(t)
        let f = Expr::cos(t().boxed()).integrate_from_zero("t").unwrap();
        assert_relative_eq!(f.eval_expression(&["t"], &[1.2]).unwrap(), 1.2_f64.sin(), epsilon = 1e-12);
        // ∫_0^t e^s ds = e^t - 1
        let f = t().exp().integrate_from_zero("t").unwrap();
        assert_relative_eq!(f.eval_expression(&["t"], &[0.5]).unwrap(), 0.5_f64.exp() - 1.0, epsilon = 1e-12);
        // ∫_0^t 1/s ds diverges
        assert!((Expr::Const(1.0) / t()).integrate_from_zero("t").is_err());
    }
}
