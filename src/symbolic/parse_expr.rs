//! Parser of right-hand sides of ODEs.
//!
//! A `nom` grammar turns the text into a [`SyntaxTree`]; the tree is never executed as code.
//! Two interpreters walk it:
//! - [`NumericInterpreter`] evaluates it to `f64` (library qualifier `np.`)
//! - [`SymbolicInterpreter`] turns it into a symbolic [`Expr`] (library qualifier `sp.`)
//!
//! Grammar (loosest binding first):
//! ```text
//! expr    := term (("+" | "-") term)*
//! term    := unary (("*" | "/") unary)*
//! unary   := ("-" | "+") unary | power
//! power   := atom (("^" | "**") unary)?
//! atom    := number | call | name | "(" expr ")"
//! call    := name "(" expr ("," expr)* ")"
//! name    := ident ("." ident)?
//! ```
//! Power is right-associative and binds tighter than unary minus, `-x^2 == -(x^2)`.
//!
//! The grammar and the tree walkers recurse, so the input is bounded before parsing: at most
//! [`MAX_NESTING`] open parentheses and at most [`MAX_OPERATORS`] operator characters.
use crate::symbolic::symbolic_engine::Expr;
use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::tag,
    character::complete::{alpha1, alphanumeric1, char, digit0, digit1, multispace0, one_of},
    combinator::{map, map_res, not, opt, recognize, value},
    multi::{fold_many0, many0, separated_list1},
    sequence::{delimited, pair, preceded, terminated},
};
use regex::Regex;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::LazyLock;
use strum_macros::{Display, EnumIter, EnumString};

/// Binary operators of the grammar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

/// Abstract syntax tree of one right-hand side
#[derive(Debug, Clone, PartialEq)]
pub enum SyntaxTree {
    Number(f64),
    /// `name` or `qualifier.name`
    Name {
        qualifier: Option<String>,
        name: String,
    },
    /// `name(args)` or `qualifier.name(args)`
    Call {
        qualifier: Option<String>,
        name: String,
        args: Vec<SyntaxTree>,
    },
    Neg(Box<SyntaxTree>),
    Binary(BinaryOp, Box<SyntaxTree>, Box<SyntaxTree>),
}

/// Allow-list of callable functions
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display, EnumIter)]
pub enum ElementaryFunction {
    #[strum(to_string = "exp")]
    Exp,
    #[strum(to_string = "log", serialize = "ln")]
    Log,
    #[strum(to_string = "log10")]
    Log10,
    #[strum(to_string = "sqrt")]
    Sqrt,
    #[strum(to_string = "sin")]
    Sin,
    #[strum(to_string = "cos")]
    Cos,
    #[strum(to_string = "tan")]
    Tan,
    #[strum(to_string = "arcsin", serialize = "asin")]
    Asin,
    #[strum(to_string = "arccos", serialize = "acos")]
    Acos,
    #[strum(to_string = "arctan", serialize = "atan")]
    Atan,
    #[strum(to_string = "sinh")]
    Sinh,
    #[strum(to_string = "cosh")]
    Cosh,
    #[strum(to_string = "tanh")]
    Tanh,
}

/// Named constants reachable with or without a library qualifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display)]
pub enum NamedConstant {
    #[strum(to_string = "pi")]
    Pi,
    #[strum(to_string = "e")]
    E,
}

impl NamedConstant {
    pub fn value(&self) -> f64 {
        match self {
            NamedConstant::Pi => std::f64::consts::PI,
            NamedConstant::E => std::f64::consts::E,
        }
    }
}

/// deepest parenthesis nesting accepted by [`parse_expression`]
pub const MAX_NESTING: usize = 64;
/// largest number of `+ - * / ^` characters accepted by [`parse_expression`]
pub const MAX_OPERATORS: usize = 256;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("empty expression")]
    Empty,
    #[error("invalid syntax at position {position}: '{fragment}'")]
    Syntax { position: usize, fragment: String },
    #[error("parentheses nested deeper than {limit} at position {position}")]
    TooDeep { position: usize, limit: usize },
    #[error("expression has more than {limit} operators")]
    TooManyOperators { limit: usize },
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvalError {
    #[error("name '{0}' is not defined")]
    UnboundName(String),
    #[error("module '{qualifier}' has no attribute '{name}'")]
    UnknownAttribute { qualifier: String, name: String },
    #[error("'{0}' is not callable")]
    NotCallable(String),
    #[error("{name}() takes exactly one argument ({given} given)")]
    Arity { name: String, given: usize },
}

impl EvalError {
    /// Unbound-name failures are the ones the numeric side absorbs.
    pub fn is_unbound_name(&self) -> bool {
        matches!(self, EvalError::UnboundName(_))
    }
}

////////////////////////////////////////////////////////////////////////////////
//                              GRAMMAR
////////////////////////////////////////////////////////////////////////////////

fn ws<'a, O, P>(inner: P) -> impl Parser<&'a str, Output = O, Error = nom::error::Error<&'a str>>
where
    P: Parser<&'a str, Output = O, Error = nom::error::Error<&'a str>>,
{
    delimited(multispace0, inner, multispace0)
}

fn number(input: &str) -> IResult<&str, SyntaxTree> {
    let mantissa = alt((
        recognize((digit1, opt((char('.'), digit0)))),
        recognize((char('.'), digit1)),
    ));
    let exponent = opt((one_of("eE"), opt(one_of("+-")), digit1));
    map_res(recognize((mantissa, exponent)), |s: &str| {
        s.parse::<f64>().map(SyntaxTree::Number)
    })
    .parse(input)
}

fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        alt((alpha1, tag("_"))),
        many0(alt((alphanumeric1, tag("_")))),
    ))
    .parse(input)
}

fn name_or_call(input: &str) -> IResult<&str, SyntaxTree> {
    let (input, first) = identifier(input)?;
    let (input, second) = opt(preceded(char('.'), identifier)).parse(input)?;
    let (qualifier, name) = match second {
        Some(name) => (Some(first.to_string()), name.to_string()),
        None => (None, first.to_string()),
    };
    let (input, args) = opt(delimited(
        ws(char('(')),
        separated_list1(ws(char(',')), expr),
        ws(char(')')),
    ))
    .parse(input)?;
    let tree = match args {
        Some(args) => SyntaxTree::Call {
            qualifier,
            name,
            args,
        },
        None => SyntaxTree::Name { qualifier, name },
    };
    Ok((input, tree))
}

fn atom(input: &str) -> IResult<&str, SyntaxTree> {
    ws(alt((
        number,
        name_or_call,
        delimited(ws(char('(')), expr, ws(char(')'))),
    )))
    .parse(input)
}

fn power(input: &str) -> IResult<&str, SyntaxTree> {
    let (input, base) = atom(input)?;
    let (input, exponent) = opt(preceded(ws(alt((tag("**"), tag("^")))), unary)).parse(input)?;
    let tree = match exponent {
        Some(exponent) => SyntaxTree::Binary(BinaryOp::Pow, Box::new(base), Box::new(exponent)),
        None => base,
    };
    Ok((input, tree))
}

fn unary(input: &str) -> IResult<&str, SyntaxTree> {
    alt((
        map(preceded(ws(char('-')), unary), |tree| {
            SyntaxTree::Neg(Box::new(tree))
        }),
        preceded(ws(char('+')), unary),
        power,
    ))
    .parse(input)
}

fn term(input: &str) -> IResult<&str, SyntaxTree> {
    let (input, first) = unary(input)?;
    let operator = ws(alt((
        value(BinaryOp::Mul, terminated(char('*'), not(char('*')))),
        value(BinaryOp::Div, char('/')),
    )));
    fold_many0(
        pair(operator, unary),
        move || first.clone(),
        |acc, (op, rhs)| SyntaxTree::Binary(op, Box::new(acc), Box::new(rhs)),
    )
    .parse(input)
}

fn expr(input: &str) -> IResult<&str, SyntaxTree> {
    let (input, first) = term(input)?;
    let operator = ws(alt((
        value(BinaryOp::Add, char('+')),
        value(BinaryOp::Sub, char('-')),
    )));
    fold_many0(
        pair(operator, term),
        move || first.clone(),
        |acc, (op, rhs)| SyntaxTree::Binary(op, Box::new(acc), Box::new(rhs)),
    )
    .parse(input)
}

/// Rejects inputs whose parse tree would be too deep to walk recursively.
fn check_nesting(input: &str) -> Result<(), ParseError> {
    let mut depth = 0usize;
    let mut operators = 0usize;
    for (position, c) in input.char_indices() {
        match c {
            '(' => {
                depth += 1;
                if depth > MAX_NESTING {
                    return Err(ParseError::TooDeep {
                        position,
                        limit: MAX_NESTING,
                    });
                }
            }
            ')' => depth = depth.saturating_sub(1),
            '+' | '-' | '*' | '/' | '^' => {
                operators += 1;
                if operators > MAX_OPERATORS {
                    return Err(ParseError::TooManyOperators {
                        limit: MAX_OPERATORS,
                    });
                }
            }
            _ => {}
        }
    }
    Ok(())
}

/// Parses one right-hand side into a syntax tree; the whole input must be consumed.
pub fn parse_expression(input: &str) -> Result<SyntaxTree, ParseError> {
    if input.trim().is_empty() {
        return Err(ParseError::Empty);
    }
    check_nesting(input)?;
    let syntax_error = |rest: &str| ParseError::Syntax {
        position: input.len() - rest.len(),
        fragment: rest.trim().to_string(),
    };
    match expr(input) {
        Ok((rest, tree)) if rest.trim().is_empty() => Ok(tree),
        Ok((rest, _)) => Err(syntax_error(rest)),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(syntax_error(e.input)),
        Err(nom::Err::Incomplete(_)) => Err(syntax_error("")),
    }
}

static NUMERIC_QUALIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bnp\.").expect("qualifier pattern is valid"));

/// Rewrites numeric-library qualifiers `np.` into symbolic-library qualifiers `sp.`
pub fn rewrite_qualifiers(input: &str) -> String {
    NUMERIC_QUALIFIER.replace_all(input, "sp.").into_owned()
}

////////////////////////////////////////////////////////////////////////////////
//                              INTERPRETERS
////////////////////////////////////////////////////////////////////////////////

/// One way of giving meaning to a [`SyntaxTree`]
pub trait Interpreter {
    type Value: Clone;
    /// library qualifier accepted in front of functions and constants
    fn library(&self) -> &'static str;
    fn number(&self, value: f64) -> Self::Value;
    fn constant(&self, constant: NamedConstant) -> Self::Value;
    fn negate(&self, value: Self::Value) -> Self::Value;
    fn binary(&self, op: BinaryOp, lhs: Self::Value, rhs: Self::Value) -> Self::Value;
    fn apply(&self, function: ElementaryFunction, arg: Self::Value) -> Self::Value;
}

/// Evaluation mode: plain `f64` arithmetic
pub struct NumericInterpreter;

impl Interpreter for NumericInterpreter {
    type Value = f64;

    fn library(&self) -> &'static str {
        "np"
    }

    fn number(&self, value: f64) -> f64 {
        value
    }

    fn constant(&self, constant: NamedConstant) -> f64 {
        constant.value()
    }

    fn negate(&self, value: f64) -> f64 {
        -value
    }

    fn binary(&self, op: BinaryOp, lhs: f64, rhs: f64) -> f64 {
        match op {
            BinaryOp::Add => lhs + rhs,
            BinaryOp::Sub => lhs - rhs,
            BinaryOp::Mul => lhs * rhs,
            BinaryOp::Div => lhs / rhs,
            BinaryOp::Pow => lhs.powf(rhs),
        }
    }

    fn apply(&self, function: ElementaryFunction, x: f64) -> f64 {
        match function {
            ElementaryFunction::Exp => x.exp(),
            ElementaryFunction::Log => x.ln(),
            ElementaryFunction::Log10 => x.log10(),
            ElementaryFunction::Sqrt => x.sqrt(),
            ElementaryFunction::Sin => x.sin(),
            ElementaryFunction::Cos => x.cos(),
            ElementaryFunction::Tan => x.tan(),
            ElementaryFunction::Asin => x.asin(),
            ElementaryFunction::Acos => x.acos(),
            ElementaryFunction::Atan => x.atan(),
            ElementaryFunction::Sinh => x.sinh(),
            ElementaryFunction::Cosh => x.cosh(),
            ElementaryFunction::Tanh => x.tanh(),
        }
    }
}

/// Derivation mode: builds symbolic expressions
pub struct SymbolicInterpreter;

impl Interpreter for SymbolicInterpreter {
    type Value = Expr;

    fn library(&self) -> &'static str {
        "sp"
    }

    fn number(&self, value: f64) -> Expr {
        Expr::Const(value)
    }

    fn constant(&self, constant: NamedConstant) -> Expr {
        Expr::Const(constant.value())
    }

    fn negate(&self, value: Expr) -> Expr {
        match value {
            Expr::Const(c) => Expr::Const(-c),
            other => -other,
        }
    }

    fn binary(&self, op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
        match op {
            BinaryOp::Add => lhs + rhs,
            BinaryOp::Sub => lhs - rhs,
            BinaryOp::Mul => lhs * rhs,
            BinaryOp::Div => lhs / rhs,
            BinaryOp::Pow => lhs.pow(rhs),
        }
    }

    fn apply(&self, function: ElementaryFunction, x: Expr) -> Expr {
        let half = Expr::Const(0.5);
        match function {
            ElementaryFunction::Exp => x.exp(),
            ElementaryFunction::Log => x.ln(),
            ElementaryFunction::Log10 => x.ln() / Expr::Const(10.0).ln(),
            ElementaryFunction::Sqrt => x.pow(half),
            ElementaryFunction::Sin => Expr::sin(x.boxed()),
            ElementaryFunction::Cos => Expr::cos(x.boxed()),
            ElementaryFunction::Tan => Expr::tg(x.boxed()),
            ElementaryFunction::Asin => Expr::arcsin(x.boxed()),
            ElementaryFunction::Acos => Expr::arccos(x.boxed()),
            ElementaryFunction::Atan => Expr::arctg(x.boxed()),
            ElementaryFunction::Sinh => half * (x.clone().exp() - (-x).exp()),
            ElementaryFunction::Cosh => half * (x.clone().exp() + (-x).exp()),
            ElementaryFunction::Tanh => {
                let e2x = (Expr::Const(2.0) * x).exp();
                (e2x.clone() - Expr::Const(1.0)) / (e2x + Expr::Const(1.0))
            }
        }
    }
}

impl SyntaxTree {
    /// Walks the tree with the given interpreter; `scope` holds the bound names.
    pub fn interpret<I: Interpreter>(
        &self,
        interpreter: &I,
        scope: &HashMap<String, I::Value>,
    ) -> Result<I::Value, EvalError> {
        match self {
            SyntaxTree::Number(value) => Ok(interpreter.number(*value)),
            SyntaxTree::Name { qualifier, name } => {
                Self::resolve_name(interpreter, scope, qualifier.as_deref(), name)
            }
            SyntaxTree::Call {
                qualifier,
                name,
                args,
            } => {
                let function = Self::resolve_function(interpreter, scope, qualifier.as_deref(), name)?;
                if args.len() != 1 {
                    return Err(EvalError::Arity {
                        name: name.clone(),
                        given: args.len(),
                    });
                }
                let arg = args[0].interpret(interpreter, scope)?;
                Ok(interpreter.apply(function, arg))
            }
            SyntaxTree::Neg(inner) => Ok(interpreter.negate(inner.interpret(interpreter, scope)?)),
            SyntaxTree::Binary(op, lhs, rhs) => {
                let lhs = lhs.interpret(interpreter, scope)?;
                let rhs = rhs.interpret(interpreter, scope)?;
                Ok(interpreter.binary(*op, lhs, rhs))
            }
        }
    }

    fn check_qualifier<I: Interpreter>(interpreter: &I, qualifier: &str) -> Result<(), EvalError> {
        if qualifier == interpreter.library() {
            Ok(())
        } else {
            Err(EvalError::UnboundName(qualifier.to_string()))
        }
    }

    fn resolve_name<I: Interpreter>(
        interpreter: &I,
        scope: &HashMap<String, I::Value>,
        qualifier: Option<&str>,
        name: &str,
    ) -> Result<I::Value, EvalError> {
        match qualifier {
            None => {
                if let Some(value) = scope.get(name) {
                    return Ok(value.clone());
                }
                NamedConstant::from_str(name)
                    .map(|constant| interpreter.constant(constant))
                    .map_err(|_| EvalError::UnboundName(name.to_string()))
            }
            Some(qualifier) => {
                Self::check_qualifier(interpreter, qualifier)?;
                NamedConstant::from_str(name)
                    .map(|constant| interpreter.constant(constant))
                    .map_err(|_| EvalError::UnknownAttribute {
                        qualifier: qualifier.to_string(),
                        name: name.to_string(),
                    })
            }
        }
    }

    fn resolve_function<I: Interpreter>(
        interpreter: &I,
        scope: &HashMap<String, I::Value>,
        qualifier: Option<&str>,
        name: &str,
    ) -> Result<ElementaryFunction, EvalError> {
        if let Some(qualifier) = qualifier {
            Self::check_qualifier(interpreter, qualifier)?;
        }
        match ElementaryFunction::from_str(name) {
            Ok(function) => Ok(function),
            Err(_) => Err(match qualifier {
                Some(qualifier) => EvalError::UnknownAttribute {
                    qualifier: qualifier.to_string(),
                    name: name.to_string(),
                },
                None if scope.contains_key(name) || NamedConstant::from_str(name).is_ok() => {
                    EvalError::NotCallable(name.to_string())
                }
                None => EvalError::UnboundName(name.to_string()),
            }),
        }
    }

    /// Evaluation mode
    pub fn evaluate(&self, scope: &HashMap<String, f64>) -> Result<f64, EvalError> {
        self.interpret(&NumericInterpreter, scope)
    }

    /// Derivation mode
    pub fn to_symbolic(&self, scope: &HashMap<String, Expr>) -> Result<Expr, EvalError> {
        self.interpret(&SymbolicInterpreter, scope)
    }
}
