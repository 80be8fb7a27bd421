//! Solver and output settings, and their loading from a task document:
//! ```text
//! request
//!   ode: y2; -y1
//!   initial_condition: 1, 0
//!   time_end: 10
//! solver
//!   method: RK45
//!   rtol: 1e-6
//! output
//!   loglevel: info
//!   png: oscillator.png
//! ```
use crate::Utils::logger::parse_loglevel;
use crate::Utils::plots::MAX_SIDE;
use crate::Utils::task_parser::{SectionMap, TaskError, Value, check_template, parse_document};
use crate::dual_solver::errors::DualSolverError;
use crate::dual_solver::request::{
    DEFAULT_TIME_END, OdeRequest, SAMPLE_COUNT, parse_equations, parse_initial_condition,
    parse_method, parse_time_end,
};
use crate::numerical::NonStiff_api::{IntegrationMethod, IvpOptions};
use simplelog::LevelFilter;
use std::path::{Path, PathBuf};

const TEMPLATE: &[(&str, &[&str])] = &[
    ("request", &["ode", "initial_condition", "time_end"]),
    (
        "solver",
        &["method", "rtol", "atol", "max_step", "first_step", "max_steps", "samples"],
    ),
    (
        "output",
        &["loglevel", "log_file", "csv", "png", "width", "height"],
    ),
];

#[derive(Debug, Clone, PartialEq)]
pub struct SolverConfig {
    pub method: IntegrationMethod,
    pub rtol: f64,
    pub atol: f64,
    pub max_step: f64,
    pub first_step: Option<f64>,
    pub max_steps: usize,
    /// points of the sample grid over `[0, time_end]`
    pub samples: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        let options = IvpOptions::default();
        SolverConfig {
            method: IntegrationMethod::default(),
            rtol: options.rtol,
            atol: options.atol,
            max_step: options.max_step,
            first_step: options.first_step,
            max_steps: options.max_steps,
            samples: SAMPLE_COUNT,
        }
    }
}

impl SolverConfig {
    /// the same settings with the integration method named by `method`
    pub fn with_method(mut self, method: &str) -> Result<Self, DualSolverError> {
        self.method = parse_method(method)?;
        Ok(self)
    }

    pub fn ivp_options(&self) -> IvpOptions {
        IvpOptions {
            rtol: self.rtol,
            atol: self.atol,
            max_step: self.max_step,
            first_step: self.first_step,
            max_steps: self.max_steps,
        }
    }

    fn from_section(section: Option<&SectionMap>) -> Result<Self, TaskError> {
        let mut config = SolverConfig::default();
        let Some(section) = section else {
            return Ok(config);
        };
        if let Some(value) = section.get("method") {
            config.method = parse_method(&value.to_string())
                .map_err(|e| invalid_value("method", value, &e.to_string()))?;
        }
        if let Some(value) = section.get("rtol") {
            config.rtol = positive_float("rtol", value)?;
        }
        if let Some(value) = section.get("atol") {
            config.atol = positive_float("atol", value)?;
        }
        if let Some(value) = section.get("max_step") {
            config.max_step = positive_float("max_step", value)?;
        }
        if let Some(value) = section.get("first_step") {
            config.first_step = Some(positive_float("first_step", value)?);
        }
        if let Some(value) = section.get("max_steps") {
            config.max_steps = positive_integer("max_steps", value)?;
        }
        if let Some(value) = section.get("samples") {
            config.samples = positive_integer("samples", value)?;
        }
        Ok(config)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutputConfig {
    pub loglevel: LevelFilter,
    pub log_file: Option<PathBuf>,
    pub csv: Option<PathBuf>,
    pub png: Option<PathBuf>,
    pub width: u32,
    pub height: u32,
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            loglevel: LevelFilter::Info,
            log_file: None,
            csv: None,
            png: None,
            width: 640,
            height: 480,
        }
    }
}

impl OutputConfig {
    fn from_section(section: Option<&SectionMap>) -> Result<Self, TaskError> {
        let mut config = OutputConfig::default();
        let Some(section) = section else {
            return Ok(config);
        };
        if let Some(value) = section.get("loglevel") {
            config.loglevel = parse_loglevel(&value.to_string()).ok_or_else(|| {
                invalid_value("loglevel", value, "expected debug, info, warn, error or off")
            })?;
        }
        let path = |key: &str| section.get(key).map(|v| PathBuf::from(v.to_string()));
        config.log_file = path("log_file");
        config.csv = path("csv");
        config.png = path("png");
        if let Some(value) = section.get("width") {
            config.width = pixels("width", value)?;
        }
        if let Some(value) = section.get("height") {
            config.height = pixels("height", value)?;
        }
        Ok(config)
    }
}

/// Everything one run of the demo binary needs
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub request: OdeRequest,
    pub solver: SolverConfig,
    pub output: OutputConfig,
}

impl Task {
    pub fn parse(document: &str) -> Result<Self, DualSolverError> {
        let document = parse_document(document)?;
        check_template(&document, TEMPLATE)?;
        let request_section = document
            .get("request")
            .ok_or_else(|| TaskError::MissingSection("request".to_string()))?;
        let field = |key: &str| request_section.get(key).map(|v| v.to_string());
        let ode = field("ode").ok_or_else(|| missing_key("ode"))?;
        let initial_condition =
            field("initial_condition").ok_or_else(|| missing_key("initial_condition"))?;

        let solver = SolverConfig::from_section(document.get("solver"))?;
        let request = OdeRequest {
            equations: parse_equations(&ode)?,
            initial_state: parse_initial_condition(&initial_condition)?,
            time_end: match field("time_end") {
                Some(t) => parse_time_end(&t)?,
                None => DEFAULT_TIME_END,
            },
        };
        let output = OutputConfig::from_section(document.get("output"))?;
        Ok(Task {
            request,
            solver,
            output,
        })
    }

    pub fn from_file(path: &Path) -> Result<Self, DualSolverError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| TaskError::Io(format!("{}: {}", path.display(), e)))?;
        Task::parse(&content)
    }
}

fn missing_key(key: &str) -> TaskError {
    TaskError::InvalidValue {
        key: key.to_string(),
        value: String::new(),
        reason: "missing in section 'request'".to_string(),
    }
}

fn invalid_value(key: &str, value: &Value, reason: &str) -> TaskError {
    TaskError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn positive_float(key: &str, value: &Value) -> Result<f64, TaskError> {
    match value.as_float() {
        Some(v) if v > 0.0 => Ok(v),
        _ => Err(invalid_value(key, value, "expected a positive number")),
    }
}

fn positive_integer(key: &str, value: &Value) -> Result<usize, TaskError> {
    match value.as_integer() {
        Some(v) if v > 0 => Ok(v as usize),
        _ => Err(invalid_value(key, value, "expected a positive integer")),
    }
}

fn pixels(key: &str, value: &Value) -> Result<u32, TaskError> {
    let v = positive_integer(key, value)?;
    u32::try_from(v)
        .ok()
        .filter(|v| *v <= MAX_SIDE)
        .ok_or_else(|| invalid_value(key, value, &format!("at most {} pixels", MAX_SIDE)))
}
