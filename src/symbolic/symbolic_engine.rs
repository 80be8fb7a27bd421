//! # Symbolic Engine Module
//!
//! Core symbolic expression type used by the closed-form side of the dual solver.
//!
//! ## Main Structures and Methods
//!
//! ### `Expr` Enum
//! - **Variables**: `Var(String)` - the independent variable `t` and placeholders
//! - **Constants**: `Const(f64)` - numerical constants
//! - **Operations**: `Add`, `Sub`, `Mul`, `Div`, `Pow` - basic arithmetic
//! - **Functions**: `Exp`, `Ln`, `sin`, `cos`, `tg`, `arcsin`, `arccos`, `arctg`
//! - **Unknown functions**: `Func("y1", t)` - an unknown function of time, `y1(t)`
//! - **Unevaluated forms**: `Derivative(f, t)` and `Integral(f, t)` (definite, from 0 to t)
//!
//! ### `Equation`
//! A symbolic equality `lhs = rhs`, used both for the ODE `Derivative(y1(t), t) = rhs`
//! and for the closed-form answer `y1(t) = ...`.
//!
//! ## Interesting Code Features
//!
//! 1. **Operator Overloading**: std::ops traits (Add, Sub, Mul, Div, Neg) give
//!    natural syntax: `x.clone() * Expr::Const(2.0)`
//! 2. **Precedence-aware printing**: `Display` emits the minimal set of parentheses,
//!    so a solution prints as `10*exp(-0.5*t)` rather than `(10 * exp((-0.5 * t)))`
//! 3. **Non-standard Variant Names**: variants keep the mathematical notation (tg, arctg)
//!    while printing uses the conventional names (tan, atan)

#![allow(non_camel_case_types)]

use std::fmt;

/// Core symbolic expression enum representing mathematical expressions as an abstract syntax tree.
///
/// # Examples
/// ```rust, ignore
/// use RustedODE::symbolic::symbolic_engine::Expr;
/// let t = Expr::Var("t".to_string());
/// let expr = Expr::Const(10.0) * (Expr::Const(-0.5) * t).exp();
/// assert_eq!(expr.to_string(), "10*exp(-0.5*t)");
/// ```
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    /// Symbolic variable with a name (e.g., "t")
    Var(String),
    /// Numerical constant value
    Const(f64),
    /// Addition operation: left + right
    Add(Box<Expr>, Box<Expr>),
    /// Subtraction operation: left - right
    Sub(Box<Expr>, Box<Expr>),
    /// Multiplication operation: left * right
    Mul(Box<Expr>, Box<Expr>),
    /// Division operation: left / right
    Div(Box<Expr>, Box<Expr>),
    /// Power operation: base ^ exponent
    Pow(Box<Expr>, Box<Expr>),
    /// Exponential function: e^x
    Exp(Box<Expr>),
    /// Natural logarithm: ln(x)
    Ln(Box<Expr>),
    /// Sine function: sin(x)
    sin(Box<Expr>),
    /// Cosine function: cos(x)
    cos(Box<Expr>),
    /// Tangent function: tan(x) - uses mathematical notation 'tg'
    tg(Box<Expr>),
    /// Arcsine function: arcsin(x)
    arcsin(Box<Expr>),
    /// Arccosine function: arccos(x)
    arccos(Box<Expr>),
    /// Arctangent function: arctan(x) - uses mathematical notation 'arctg'
    arctg(Box<Expr>),
    /// Unknown function of one argument, e.g. `y1(t)`
    Func(String, Box<Expr>),
    /// Unevaluated derivative of the expression with respect to the named variable
    Derivative(Box<Expr>, String),
    /// Unevaluated definite integral from 0 to the named variable
    Integral(Box<Expr>, String),
}

/// Symbolic equality `lhs = rhs`
#[derive(Clone, Debug, PartialEq)]
pub struct Equation {
    pub lhs: Expr,
    pub rhs: Expr,
}

impl Equation {
    pub fn new(lhs: Expr, rhs: Expr) -> Self {
        Equation { lhs, rhs }
    }
}

impl fmt::Display for Equation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} = {}", self.lhs, self.rhs)
    }
}

// binding strength used by the printer; the gaps leave room for a leading minus sign
const PREC_SUM: u8 = 2;
const PREC_NEG: u8 = 3;
const PREC_PRODUCT: u8 = 4;
const PREC_POWER: u8 = 6;
const PREC_ATOM: u8 = 8;

impl Expr {
    /// true when the printed form starts with a minus sign
    fn leading_negative(&self) -> bool {
        match self {
            Expr::Const(c) => *c < 0.0 || (*c == 0.0 && c.is_sign_negative()),
            Expr::Mul(lhs, _) | Expr::Div(lhs, _) => lhs.leading_negative(),
            _ => false,
        }
    }

    fn precedence(&self) -> u8 {
        if self.leading_negative() {
            return PREC_NEG;
        }
        match self {
            Expr::Add(..) | Expr::Sub(..) => PREC_SUM,
            Expr::Mul(..) | Expr::Div(..) => PREC_PRODUCT,
            Expr::Pow(_, exp) if !matches!(exp.as_ref(), Expr::Const(c) if *c == 0.5) => PREC_POWER,
            _ => PREC_ATOM,
        }
    }

    /// flips the sign of a leading-negative expression, used to print `a + (-b)` as `a - b`
    fn negate_leading(&self) -> Expr {
        match self {
            Expr::Const(c) => Expr::Const(-c),
            Expr::Mul(lhs, rhs) => match lhs.as_ref() {
                Expr::Const(c) if *c == -1.0 => rhs.as_ref().clone(),
                _ => Expr::Mul(Box::new(lhs.negate_leading()), rhs.clone()),
            },
            Expr::Div(lhs, rhs) => Expr::Div(Box::new(lhs.negate_leading()), rhs.clone()),
            other => other.clone(),
        }
    }

    fn write_operand(&self, f: &mut fmt::Formatter, min_prec: u8) -> fmt::Result {
        if self.precedence() < min_prec {
            write!(f, "({})", self)
        } else {
            write!(f, "{}", self)
        }
    }
}

/// Display implementation for pretty printing symbolic expressions.
///
/// Parentheses are emitted only where precedence or associativity requires them.
/// `Const(-1) * x` prints as `-x`, `x^0.5` prints as `sqrt(x)`.
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Expr::Var(name) => write!(f, "{}", name),
            Expr::Const(val) => write!(f, "{}", val),
            Expr::Add(lhs, rhs) => {
                lhs.write_operand(f, PREC_SUM)?;
                if rhs.leading_negative() {
                    write!(f, " - ")?;
                    rhs.negate_leading().write_operand(f, PREC_SUM + 1)
                } else {
                    write!(f, " + ")?;
                    rhs.write_operand(f, PREC_SUM)
                }
            }
            Expr::Sub(lhs, rhs) => {
                lhs.write_operand(f, PREC_SUM)?;
                write!(f, " - ")?;
                rhs.write_operand(f, PREC_PRODUCT)
            }
            Expr::Mul(lhs, rhs) => {
                if let Expr::Const(c) = lhs.as_ref() {
                    if *c == -1.0 {
                        write!(f, "-")?;
                        return rhs.write_operand(f, PREC_PRODUCT);
                    }
                }
                lhs.write_operand(f, PREC_NEG)?;
                write!(f, "*")?;
                rhs.write_operand(f, PREC_PRODUCT)
            }
            Expr::Div(lhs, rhs) => {
                lhs.write_operand(f, PREC_NEG)?;
                write!(f, "/")?;
                rhs.write_operand(f, PREC_POWER)
            }
            Expr::Pow(base, exp) => {
                if let Expr::Const(c) = exp.as_ref() {
                    if *c == 0.5 {
                        return write!(f, "sqrt({})", base);
                    }
                }
                base.write_operand(f, PREC_ATOM)?;
                write!(f, "^")?;
                exp.write_operand(f, PREC_POWER)
            }
            Expr::Exp(expr) => write!(f, "exp({})", expr),
            Expr::Ln(expr) => write!(f, "log({})", expr),
            Expr::sin(expr) => write!(f, "sin({})", expr),
            Expr::cos(expr) => write!(f, "cos({})", expr),
            Expr::tg(expr) => write!(f, "tan({})", expr),
            Expr::arcsin(expr) => write!(f, "asin({})", expr),
            Expr::arccos(expr) => write!(f, "acos({})", expr),
            Expr::arctg(expr) => write!(f, "atan({})", expr),
            Expr::Func(name, arg) => write!(f, "{}({})", name, arg),
            Expr::Derivative(expr, var) => write!(f, "Derivative({}, {})", expr, var),
            Expr::Integral(expr, var) => write!(f, "Integral({}, ({}, 0, {}))", expr, var, var),
        }
    }
}

impl std::ops::Add for Expr {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Expr::Add(self.boxed(), rhs.boxed())
    }
}

impl std::ops::Sub for Expr {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Expr::Sub(self.boxed(), rhs.boxed())
    }
}

impl std::ops::Mul for Expr {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self::Output {
        Expr::Mul(self.boxed(), rhs.boxed())
    }
}

impl std::ops::Div for Expr {
    type Output = Self;

    fn div(self, rhs: Self) -> Self::Output {
        Expr::Div(self.boxed(), rhs.boxed())
    }
}

impl std::ops::Neg for Expr {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Expr::Mul(Box::new(Expr::Const(-1.0)), Box::new(self))
    }
}

impl Expr {
    /// Unknown function `name(arg)`
    pub fn function(name: &str, arg: Expr) -> Expr {
        Expr::Func(name.to_string(), arg.boxed())
    }

    pub fn boxed(self) -> Box<Self> {
        Box::new(self)
    }

    pub fn exp(self) -> Expr {
        Expr::Exp(self.boxed())
    }

    pub fn ln(self) -> Expr {
        Expr::Ln(self.boxed())
    }

    pub fn pow(self, rhs: Expr) -> Expr {
        Expr::Pow(self.boxed(), rhs.boxed())
    }

    pub fn is_zero(&self) -> bool {
        matches!(self, Expr::Const(c) if *c == 0.0)
    }

    /// Returns the value of a constant node.
    pub fn as_const(&self) -> Option<f64> {
        match self {
            Expr::Const(c) => Some(*c),
            _ => None,
        }
    }

    /// Applies `f` to every direct child and rebuilds the node.
    pub fn map_children<F>(&self, mut f: F) -> Expr
    where
        F: FnMut(&Expr) -> Expr,
    {
        match self {
            Expr::Var(_) | Expr::Const(_) => self.clone(),
            Expr::Add(lhs, rhs) => Expr::Add(f(lhs).boxed(), f(rhs).boxed()),
            Expr::Sub(lhs, rhs) => Expr::Sub(f(lhs).boxed(), f(rhs).boxed()),
            Expr::Mul(lhs, rhs) => Expr::Mul(f(lhs).boxed(), f(rhs).boxed()),
            Expr::Div(lhs, rhs) => Expr::Div(f(lhs).boxed(), f(rhs).boxed()),
            Expr::Pow(base, exp) => Expr::Pow(f(base).boxed(), f(exp).boxed()),
            Expr::Exp(expr) => Expr::Exp(f(expr).boxed()),
            Expr::Ln(expr) => Expr::Ln(f(expr).boxed()),
            Expr::sin(expr) => Expr::sin(f(expr).boxed()),
            Expr::cos(expr) => Expr::cos(f(expr).boxed()),
            Expr::tg(expr) => Expr::tg(f(expr).boxed()),
            Expr::arcsin(expr) => Expr::arcsin(f(expr).boxed()),
            Expr::arccos(expr) => Expr::arccos(f(expr).boxed()),
            Expr::arctg(expr) => Expr::arctg(f(expr).boxed()),
            Expr::Func(name, arg) => Expr::Func(name.clone(), f(arg).boxed()),
            Expr::Derivative(expr, var) => Expr::Derivative(f(expr).boxed(), var.clone()),
            Expr::Integral(expr, var) => Expr::Integral(f(expr).boxed(), var.clone()),
        }
    }

    /// Returns true when `pred` holds for this node or any node below it.
    pub fn any_node<F>(&self, pred: &F) -> bool
    where
        F: Fn(&Expr) -> bool,
    {
        if pred(self) {
            return true;
        }
        match self {
            Expr::Var(_) | Expr::Const(_) => false,
            Expr::Add(lhs, rhs)
            | Expr::Sub(lhs, rhs)
            | Expr::Mul(lhs, rhs)
            | Expr::Div(lhs, rhs)
            | Expr::Pow(lhs, rhs) => lhs.any_node(pred) || rhs.any_node(pred),
            Expr::Exp(expr)
            | Expr::Ln(expr)
            | Expr::sin(expr)
            | Expr::cos(expr)
            | Expr::tg(expr)
            | Expr::arcsin(expr)
            | Expr::arccos(expr)
            | Expr::arctg(expr)
            | Expr::Func(_, expr)
            | Expr::Derivative(expr, _)
            | Expr::Integral(expr, _) => expr.any_node(pred),
        }
    }

    /// Substitutes a variable with a constant value.
    pub fn set_variable(&self, var: &str, value: f64) -> Expr {
        self.substitute_variable(var, &Expr::Const(value))
    }

    /// Replaces every occurrence of variable `var` with `expr`.
    pub fn substitute_variable(&self, var: &str, expr: &Expr) -> Expr {
        match self {
            Expr::Var(name) if name == var => expr.clone(),
            _ => self.map_children(|child| child.substitute_variable(var, expr)),
        }
    }

    /// Replaces every application of the unknown function `name` with `expr`, whatever its argument.
    pub fn substitute_function(&self, name: &str, expr: &Expr) -> Expr {
        match self {
            Expr::Func(func, _) if func == name => expr.clone(),
            _ => self.map_children(|child| child.substitute_function(name, expr)),
        }
    }

    /// Checks if the expression contains the variable `var_name`.
    pub fn contains_variable(&self, var_name: &str) -> bool {
        self.any_node(&|node| matches!(node, Expr::Var(name) if name == var_name))
    }

    /// True when the expression holds no unknown functions and no unevaluated forms,
    /// so it can be evaluated numerically once its variables are set.
    pub fn is_explicit(&self) -> bool {
        !self.any_node(&|node| {
            matches!(
                node,
                Expr::Func(..) | Expr::Derivative(..) | Expr::Integral(..)
            )
        })
    }
}
