/// parse document with structure like
/// ```text
/// request
///   ode: -0.5*y1 + sin(t); y2
///   initial_condition: 1, 0
/// solver
///   method: RK45
/// ```
/// which has titles on their own lines followed by `key: value` lines. The value is the rest of
/// the line, typed as integer, float, boolean or string. Comment lines start with `//` or `#`.
use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::tag,
    character::complete::{alpha1, alphanumeric1, line_ending, multispace0, not_line_ending, space0},
    combinator::{eof, map, recognize},
    multi::{many0, many1},
    sequence::{delimited, pair, separated_pair, terminated},
};
use std::collections::HashMap;
use std::fmt::Display;

pub type SectionMap = HashMap<String, Value>;
pub type DocumentMap = HashMap<String, SectionMap>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TaskError {
    #[error("cannot parse task document near: '{0}'")]
    Syntax(String),
    #[error("unknown section '{0}'")]
    UnknownSection(String),
    #[error("missing section '{0}'")]
    MissingSection(String),
    #[error("unknown key '{key}' in section '{section}'")]
    UnknownKey { section: String, key: String },
    #[error("invalid value '{value}' for '{key}': {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
    #[error("cannot read task file: {0}")]
    Io(String),
}

/// enum to represent different value types:
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Float(f64),
    Integer(i64),
    Boolean(bool),
}

impl Value {
    fn parse(s: &str) -> Value {
        let s = s.trim();
        if let Ok(val) = s.parse::<i64>() {
            Value::Integer(val)
        } else if let Ok(val) = s.parse::<f64>() {
            Value::Float(val)
        } else if let Ok(val) = s.parse::<bool>() {
            Value::Boolean(val)
        } else {
            Value::String(s.to_string())
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        if let Value::Integer(i) = self {
            Some(*i)
        } else {
            None
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::String(s) => write!(f, "{}", s),
            Value::Float(val) => write!(f, "{}", val),
            Value::Integer(val) => write!(f, "{}", val),
            Value::Boolean(val) => write!(f, "{}", val),
        }
    }
}

fn identifier(input: &str) -> IResult<&str, String> {
    let parser = recognize(pair(
        alt((alpha1, tag("_"))),
        many0(alt((alphanumeric1, tag("_")))),
    ));
    map(parser, String::from).parse(input)
}

/// end of a line or of the whole input
fn line_end(input: &str) -> IResult<&str, &str> {
    alt((line_ending, eof)).parse(input)
}

/// Parses a title: a word alone on its line
fn parse_title(input: &str) -> IResult<&str, String> {
    delimited(space0, identifier, pair(space0, line_end)).parse(input)
}

/// Parses `key: rest of the line`
fn parse_key_value_pair(input: &str) -> IResult<&str, (String, Value)> {
    let colon_separator = delimited(space0, tag(":"), space0);
    let value = map(not_line_ending, Value::parse);
    delimited(
        space0,
        separated_pair(identifier, colon_separator, value),
        line_end,
    )
    .parse(input)
}

/// Parses a section with a title and its key-value pairs
fn parse_section(input: &str) -> IResult<&str, (String, SectionMap)> {
    let (input, title) = parse_title(input)?;
    let (input, pairs) = many0(parse_key_value_pair).parse(input)?;
    Ok((input, (title, pairs.into_iter().collect())))
}

/// Filters out comment lines (starting with // or #) and blank lines
fn filter_comments(input: &str) -> String {
    input
        .lines()
        .filter(|line| {
            let trimmed = line.trim();
            !trimmed.starts_with("//") && !trimmed.starts_with('#') && !trimmed.is_empty()
        })
        .collect::<Vec<&str>>()
        .join("\n")
}

/// Parses the entire document into a map of sections; later sections with the same title
/// extend earlier ones.
pub fn parse_document(input: &str) -> Result<DocumentMap, TaskError> {
    let filtered = filter_comments(input);
    let mut parser = many1(terminated(parse_section, multispace0));
    let (remaining, sections) = parser
        .parse(filtered.as_str())
        .map_err(|_| TaskError::Syntax(first_line(&filtered)))?;
    if !remaining.trim().is_empty() {
        return Err(TaskError::Syntax(first_line(remaining)));
    }
    let mut document = DocumentMap::new();
    for (title, section) in sections {
        document.entry(title).or_default().extend(section);
    }
    Ok(document)
}

fn first_line(input: &str) -> String {
    input.lines().next().unwrap_or_default().trim().to_string()
}

/// Checks that the document only uses the given sections and keys.
pub fn check_template(document: &DocumentMap, template: &[(&str, &[&str])]) -> Result<(), TaskError> {
    for (title, section) in document {
        let Some((_, keys)) = template.iter().find(|(name, _)| *name == title.as_str()) else {
            return Err(TaskError::UnknownSection(title.clone()));
        };
        if let Some(key) = section.keys().find(|key| !keys.contains(&key.as_str())) {
            return Err(TaskError::UnknownKey {
                section: title.clone(),
                key: key.clone(),
            });
        }
    }
    Ok(())
}
