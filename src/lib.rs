// Copyright (c)  by Gleb E. Zaslavkiy
//MIT License
#![allow(non_camel_case_types)]
#![allow(non_snake_case)]
//! # RustedODE
//! Numerical and closed-form solutions of systems of first-order ODEs written as text.
//! - [`symbolic`]: expression grammar, symbolic expressions, simplification, integration and
//!   the closed-form solver
//! - [`numerical`]: explicit Runge-Kutta IVP solvers (RK45, RK23, RK4)
//! - [`dual_solver`]: both pipelines and the merging of their results
//! - [`Utils`]: logging, CSV export, plotting, task documents
pub mod Examples;
pub mod Utils;
pub mod dual_solver;
pub mod numerical;
pub mod symbolic;
