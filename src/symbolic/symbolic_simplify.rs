//! # Symbolic Simplification Module
//!
//! Rule-based simplification applied to parsed right-hand sides and to closed-form answers
//! before they are printed.
//!
//! ## Rules
//!
//! ### Constant Folding
//! `2 + 3 = 5`, `2 * 3 = 6`, `2^3 = 8`, `exp(0) = 1`, `log(1) = 0`
//!
//! ### Identities
//! `x + 0 = x`, `x * 1 = x`, `0 * x = 0`, `x / 1 = x`, `x^1 = x`, `x^0 = 1`,
//! `x - x = 0`, `x / x = 1`, `exp(log(x)) = x`, `log(exp(x)) = x`, `x - (-c) = x + c`
//!
//! ### Constant Collection
//! Constants are pulled to the left of products and merged:
//! `(2 * x) * 3 = 6 * x`, `x * 3 = 3 * x`, `(6 * x) / 2 = 3 * x`, `x / (-0.5) = -2 * x`
//!
//! ### Like Terms
//! `c1 * x + c2 * x = (c1 + c2) * x`, `x + x = 2 * x`, `c1 * x - c2 * x = (c1 - c2) * x`
//!
//! ### Powers
//! `x * x = x^2`, `x^a * x^b = x^(a+b)`, `x^a / x^b = x^(a-b)`
use crate::symbolic::symbolic_engine::Expr;

impl Expr {
    /// splits `c * rest` into `(c, rest)`; any other expression has coefficient 1
    fn split_coefficient(&self) -> (f64, Expr) {
        match self {
            Expr::Mul(lhs, rhs) => match lhs.as_ref() {
                Expr::Const(c) => (*c, rhs.as_ref().clone()),
                _ => (1.0, self.clone()),
            },
            _ => (1.0, self.clone()),
        }
    }

    fn with_coefficient(c: f64, rest: Expr) -> Expr {
        Expr::Mul(Box::new(Expr::Const(c)), Box::new(rest)).simplify_()
    }

    /// One bottom-up pass of the simplification rules.
    pub fn simplify_(&self) -> Expr {
        match self {
            Expr::Var(_) | Expr::Const(_) => self.clone(),
            Expr::Add(lhs, rhs) => {
                let lhs = lhs.simplify_();
                let rhs = rhs.simplify_();
                match (&lhs, &rhs) {
                    (Expr::Const(a), Expr::Const(b)) => Expr::Const(a + b), // (a) + (b) = (a + b)
                    (Expr::Const(0.0), _) => rhs,                           // 0 + x = x
                    (_, Expr::Const(0.0)) => lhs,                           // x + 0 = x
                    _ => {
                        let (c1, rest1) = lhs.split_coefficient();
                        let (c2, rest2) = rhs.split_coefficient();
                        if rest1 == rest2 && !matches!(rest1, Expr::Const(_)) {
                            Self::with_coefficient(c1 + c2, rest1)
                        } else {
                            Expr::Add(Box::new(lhs), Box::new(rhs))
                        }
                    }
                }
            }
            Expr::Sub(lhs, rhs) => {
                let lhs = lhs.simplify_();
                let rhs = rhs.simplify_();
                match (&lhs, &rhs) {
                    (Expr::Const(a), Expr::Const(b)) => Expr::Const(a - b), // (a) - (b) = (a - b)
                    (_, Expr::Const(0.0)) => lhs,                           // x - 0 = x
                    (Expr::Const(0.0), _) => Self::with_coefficient(-1.0, rhs), // 0 - x = -x
                    _ if lhs == rhs => Expr::Const(0.0),                    // x - x = 0
                    (_, Expr::Const(c)) if *c < 0.0 => {
                        Expr::Add(Box::new(lhs.clone()), Box::new(Expr::Const(-c))) // x - (-c) = x + c
                    }
                    _ => {
                        let (c1, rest1) = lhs.split_coefficient();
                        let (c2, rest2) = rhs.split_coefficient();
                        if rest1 == rest2 && !matches!(rest1, Expr::Const(_)) {
                            Self::with_coefficient(c1 - c2, rest1)
                        } else if c2 < 0.0 {
                            // x - (-c*y) = x + c*y
                            Expr::Add(Box::new(lhs), Box::new(Self::with_coefficient(-c2, rest2)))
                        } else {
                            Expr::Sub(Box::new(lhs), Box::new(rhs))
                        }
                    }
                }
            }
            Expr::Mul(lhs, rhs) => {
                let lhs = lhs.simplify_();
                let rhs = rhs.simplify_();
                match (&lhs, &rhs) {
                    (Expr::Const(a), Expr::Const(b)) => Expr::Const(a * b), // (a) * (b) = (a * b)
                    (Expr::Const(0.0), _) | (_, Expr::Const(0.0)) => Expr::Const(0.0), // 0 * x = 0
                    (Expr::Const(1.0), _) => rhs,                           // 1 * x = x
                    (_, Expr::Const(1.0)) => lhs,                           // x * 1 = x
                    // x * c = c * x
                    (_, Expr::Const(c)) => Self::with_coefficient(*c, lhs),
                    // c2 * (c1 * x) = (c2 * c1) * x
                    (Expr::Const(c), Expr::Mul(inner_lhs, inner_rhs)) => match inner_lhs.as_ref() {
                        Expr::Const(c1) => Self::with_coefficient(c * c1, inner_rhs.as_ref().clone()),
                        _ => Expr::Mul(Box::new(lhs), Box::new(rhs)),
                    },
                    // (c * x) * y = c * (x * y)
                    (Expr::Mul(inner_lhs, inner_rhs), _) if matches!(inner_lhs.as_ref(), Expr::Const(_)) => {
                        let product = Expr::Mul(inner_rhs.clone(), Box::new(rhs)).simplify_();
                        Expr::Mul(inner_lhs.clone(), Box::new(product)).simplify_()
                    }
                    // x * (c * y) = c * (x * y)
                    (_, Expr::Mul(inner_lhs, inner_rhs)) if matches!(inner_lhs.as_ref(), Expr::Const(_)) => {
                        let product = Expr::Mul(Box::new(lhs.clone()), inner_rhs.clone()).simplify_();
                        Expr::Mul(inner_lhs.clone(), Box::new(product)).simplify_()
                    }
                    // Power rules: x^a * x^b = x^(a+b)
                    (Expr::Pow(base1, exp1), Expr::Pow(base2, exp2)) if base1 == base2 => {
                        let new_exp = Expr::Add(exp1.clone(), exp2.clone()).simplify_();
                        Expr::Pow(base1.clone(), Box::new(new_exp)).simplify_()
                    }
                    (_, Expr::Pow(base, exp)) if base.as_ref() == &lhs => {
                        let new_exp = Expr::Add(Box::new(Expr::Const(1.0)), exp.clone()).simplify_();
                        Expr::Pow(base.clone(), Box::new(new_exp)).simplify_()
                    }
                    (Expr::Pow(base, exp), _) if base.as_ref() == &rhs => {
                        let new_exp = Expr::Add(exp.clone(), Box::new(Expr::Const(1.0))).simplify_();
                        Expr::Pow(base.clone(), Box::new(new_exp)).simplify_()
                    }
                    (Expr::Exp(a), Expr::Exp(b)) => {
                        Expr::Exp(Box::new(Expr::Add(a.clone(), b.clone()).simplify_()))
                    }
                    _ if lhs == rhs && !matches!(lhs, Expr::Const(_)) => {
                        Expr::Pow(Box::new(lhs), Box::new(Expr::Const(2.0)))
                    }
                    _ => Expr::Mul(Box::new(lhs), Box::new(rhs)),
                }
            }
            Expr::Div(lhs, rhs) => {
                let lhs = lhs.simplify_();
                let rhs = rhs.simplify_();
                match (&lhs, &rhs) {
                    (Expr::Const(a), Expr::Const(b)) if *b != 0.0 => Expr::Const(a / b), // (a) / (b) = (a / b)
                    (Expr::Const(0.0), _) => Expr::Const(0.0), // 0 / x = 0
                    (_, Expr::Const(1.0)) => lhs,              // x / 1 = x
                    (_, Expr::Const(-1.0)) => Self::with_coefficient(-1.0, lhs),
                    _ if lhs == rhs => Expr::Const(1.0),
                    // (c1 * x) / c2 = (c1/c2) * x
                    (Expr::Mul(inner_lhs, inner_rhs), Expr::Const(c)) if *c != 0.0 => {
                        match inner_lhs.as_ref() {
                            Expr::Const(c1) => Self::with_coefficient(c1 / c, inner_rhs.as_ref().clone()),
                            _ => Expr::Div(Box::new(lhs), Box::new(rhs)),
                        }
                    }
                    // x / 0.5 = 2 * x
                    (_, Expr::Const(c)) if *c != 0.0 && (1.0 / c).fract() == 0.0 => {
                        Self::with_coefficient(1.0 / c, lhs)
                    }
                    // x / (-c) = -(x / c)
                    (_, Expr::Const(c)) if *c < 0.0 => Self::with_coefficient(
                        -1.0,
                        Expr::Div(Box::new(lhs.clone()), Box::new(Expr::Const(-c))),
                    ),
                    // Power rules: x^a / x^b = x^(a-b)
                    (Expr::Pow(base1, exp1), Expr::Pow(base2, exp2)) if base1 == base2 => {
                        let new_exp = Expr::Sub(exp1.clone(), exp2.clone()).simplify_();
                        Expr::Pow(base1.clone(), Box::new(new_exp)).simplify_()
                    }
                    (Expr::Exp(a), Expr::Exp(b)) => {
                        Expr::Exp(Box::new(Expr::Sub(a.clone(), b.clone()).simplify_()))
                    }
                    _ => Expr::Div(Box::new(lhs), Box::new(rhs)),
                }
            }
            Expr::Pow(base, exp) => {
                let base = base.simplify_();
                let exp = exp.simplify_();
                match (&base, &exp) {
                    (Expr::Const(a), Expr::Const(b)) if a.powf(*b).is_finite() => Expr::Const(a.powf(*b)),
                    (_, Expr::Const(0.0)) => Expr::Const(1.0), // x^0 = 1
                    (_, Expr::Const(1.0)) => base,             // x^1 = x
                    (Expr::Const(1.0), _) => Expr::Const(1.0), // 1^x = 1
                    _ => Expr::Pow(Box::new(base), Box::new(exp)),
                }
            }
            Expr::Exp(expr) => {
                let expr = expr.simplify_();
                match &expr {
                    Expr::Const(0.0) => Expr::Const(1.0),
                    Expr::Ln(inner) => inner.as_ref().clone(),
                    _ => Expr::Exp(Box::new(expr)),
                }
            }
            Expr::Ln(expr) => {
                let expr = expr.simplify_();
                match &expr {
                    Expr::Const(1.0) => Expr::Const(0.0),
                    Expr::Exp(inner) => inner.as_ref().clone(),
                    _ => Expr::Ln(Box::new(expr)),
                }
            }
            Expr::sin(expr) => {
                let expr = expr.simplify_();
                match &expr {
                    Expr::Const(0.0) => Expr::Const(0.0),
                    _ => Expr::sin(Box::new(expr)),
                }
            }
            Expr::cos(expr) => {
                let expr = expr.simplify_();
                match &expr {
                    Expr::Const(0.0) => Expr::Const(1.0),
                    _ => Expr::cos(Box::new(expr)),
                }
            }
            Expr::tg(expr) => {
                let expr = expr.simplify_();
                match &expr {
                    Expr::Const(0.0) => Expr::Const(0.0),
                    _ => Expr::tg(Box::new(expr)),
                }
            }
            Expr::arcsin(expr) => Expr::arcsin(Box::new(expr.simplify_())),
            Expr::arccos(expr) => Expr::arccos(Box::new(expr.simplify_())),
            Expr::arctg(expr) => Expr::arctg(Box::new(expr.simplify_())),
            Expr::Func(..) | Expr::Derivative(..) | Expr::Integral(..) => {
                self.map_children(|child| child.simplify_())
            }
        }
    }

    /// Repeats [`Expr::simplify_`] until the expression stops changing.
    pub fn simplify(&self) -> Expr {
        let mut current = self.simplify_();
        for _ in 0..16 {
            let next = current.simplify_();
            if next == current {
                break;
            }
            current = next;
        }
        current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t() -> Expr {
        Expr::Var("t".to_string())
    }

    #[test]
    fn test_constant_folding() {
        let expr = (Expr::Const(2.0) + Expr::Const(3.0)) * Expr::Const(4.0);
        assert_eq!(expr.simplify(), Expr::Const(20.0));
        let expr = Expr::Const(2.0).pow(Expr::Const(3.0)) - Expr::Const(8.0);
        assert_eq!(expr.simplify(), Expr::Const(0.0));
        assert_eq!(Expr::Const(0.0).exp().simplify(), Expr::Const(1.0));
    }

    #[test]
    fn test_identities() {
        assert_eq!((t() + Expr::Const(0.0)).simplify(), t());
        assert_eq!((t() * Expr::Const(1.0)).simplify(), t());
        assert_eq!((Expr::Const(0.0) * t()).simplify(), Expr::Const(0.0));
        assert_eq!((t() - t()).simplify(), Expr::Const(0.0));
        assert_eq!((t() / t()).simplify(), Expr::Const(1.0));
        assert_eq!(t().ln().exp().simplify(), t());
    }

    #[test]
    fn test_constant_collection_and_printing() {
        let expr = (Expr::Const(2.0) * t()) * Expr::Const(3.0);
        assert_eq!(expr.simplify().to_string(), "6*t");
        let expr = (Expr::Const(-0.5) * t()).exp() * Expr::Const(10.0);
        assert_eq!(expr.simplify().to_string(), "10*exp(-0.5*t)");
        let expr = (Expr::Const(6.0) * t()) / Expr::Const(2.0);
        assert_eq!(expr.simplify().to_string(), "3*t");
        let expr = Expr::Const(-1.0) * (Expr::Const(-1.0) * t());
        assert_eq!(expr.simplify(), t());
    }

    #[test]
    fn test_like_terms_and_powers() {
        assert_eq!((t() + t()).simplify().to_string(), "2*t");
        let expr = Expr::Const(3.0) * t() - Expr::Const(1.0) * t();
        assert_eq!(expr.simplify().to_string(), "2*t");
        assert_eq!((t() * t()).simplify().to_string(), "t^2");
        let expr = t().pow(Expr::Const(2.0)) * t();
        assert_eq!(expr.simplify().to_string(), "t^3");
    }

    #[test]
    fn test_subtracting_negatives() {
        let expr = t() - Expr::Const(-1.0);
        assert_eq!(expr.simplify().to_string(), "t + 1");
        let expr = t().exp() - Expr::Const(-2.0) * t();
        assert_eq!(expr.simplify().to_string(), "exp(t) + 2*t");
        let expr = t() - Expr::Const(1.0);
        assert_eq!(expr.simplify().to_string(), "t - 1");
    }

    #[test]
    fn test_unknown_functions_are_kept() {
        let y2 = Expr::function("y2", t());
        let expr = Expr::Integral((y2.clone() * Expr::Const(1.0)).boxed(), "t".to_string());
        assert_eq!(
            expr.simplify(),
            Expr::Integral(y2.boxed(), "t".to_string())
        );
    }
}
