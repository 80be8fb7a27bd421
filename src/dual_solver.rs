//! # Dual solver
//! A system of first-order ODEs given as text is solved twice: numerically, sampled on
//! `linspace(0, time_end, 100)`, and in closed form, one equation at a time. Both results are
//! then merged into one [`reconciler::DualSolution`].
//!
//! ```text
//! ode: "y2; -y1"   initial_condition: "1, 0"   time_end: "10"
//!        |
//!        +-- numeric_pipeline  -> NumericTrajectory -> PNG, base64
//!        +-- symbolic_pipeline -> SymbolicSolution  -> "y1(t) = ..." lines or "⚠️ Error: ..."
//! ```
//!
//!# Example
//! ```
//! use RustedODE::dual_solver::config::{OutputConfig, SolverConfig};
//! use RustedODE::dual_solver::reconciler::solve_request;
//! use RustedODE::dual_solver::request::OdeRequest;
//! let request = OdeRequest::parse("-0.5*y1", "10", Some("5")).unwrap();
//! let solution =
//!     solve_request(&request, &SolverConfig::default(), &OutputConfig::default()).unwrap();
//! assert_eq!(solution.sym_solution, "y1(t) = 10*exp(-0.5*t)");
//! assert_eq!(solution.trajectory.t.len(), 100);
//! assert!(solution.image_base64.starts_with("iVBORw0KGgo"));
//! ```

/// names bound inside equations: `t`, `y1..yN` and `v`
pub mod binding;
/// solver and output settings, task documents
pub mod config;
pub mod errors;
/// equations -> derivative function -> sampled trajectory
pub mod numeric_pipeline;
/// orchestration of both pipelines, result merging and export
pub mod reconciler;
/// request fields: equations, initial condition, time horizon
pub mod request;
/// equations -> closed-form solutions, one per equation
pub mod symbolic_pipeline;
