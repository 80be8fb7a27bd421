// Copyright (c)  by Gleb E. Zaslavkiy
//MIT License
use crate::dual_solver::config::{OutputConfig, SolverConfig};
use crate::dual_solver::errors::DualSolverError;
use crate::dual_solver::reconciler::{DualSolution, solve_request};
use crate::dual_solver::request::OdeRequest;
use log::info;
use std::path::PathBuf;

/// A request as it would arrive from a form: three text fields
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scenario {
    pub name: &'static str,
    pub ode: &'static str,
    pub initial_condition: &'static str,
    pub time_end: &'static str,
}

pub const SCENARIOS: [Scenario; 4] = [
    Scenario {
        name: "decay",
        ode: "-0.5*y1",
        initial_condition: "10",
        time_end: "5",
    },
    Scenario {
        name: "oscillator",
        ode: "y2;-y1",
        initial_condition: "1,0",
        time_end: "10",
    },
    Scenario {
        name: "mismatch",
        ode: "y1;y2",
        initial_condition: "1",
        time_end: "5",
    },
    Scenario {
        name: "unbound_name",
        ode: "unknown_name",
        initial_condition: "1",
        time_end: "5",
    },
];

impl Scenario {
    pub fn request(&self) -> Result<OdeRequest, DualSolverError> {
        OdeRequest::parse(self.ode, self.initial_condition, Some(self.time_end))
    }

    /// solves the scenario with default settings and writes `<name>.png`
    pub fn run(&self) -> Result<DualSolution, DualSolverError> {
        info!(
            "scenario {}: ode = '{}', initial_condition = '{}', time_end = {}",
            self.name, self.ode, self.initial_condition, self.time_end
        );
        let output = OutputConfig {
            png: Some(PathBuf::from(format!("{}.png", self.name))),
            ..OutputConfig::default()
        };
        let solution = solve_request(&self.request()?, &SolverConfig::default(), &output)?;
        solution.export(&output)?;
        Ok(solution)
    }
}

pub fn dual_solver_examples(example: usize) -> Result<DualSolution, DualSolverError> {
    match SCENARIOS.get(example) {
        Some(scenario) => scenario.run(),
        None => Err(DualSolverError::invalid(format!(
            "no example {}, there are {}",
            example,
            SCENARIOS.len()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scenarios_parse() {
        for scenario in SCENARIOS {
            assert!(scenario.request().is_ok(), "{}", scenario.name);
        }
        assert!(!SCENARIOS[2].request().unwrap().is_consistent());
    }

    #[test]
    fn test_unknown_example() {
        assert!(matches!(
            dual_solver_examples(SCENARIOS.len()),
            Err(DualSolverError::InvalidRequest(_))
        ));
    }
}
