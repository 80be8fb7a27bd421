// Copyright (c)  by Gleb E. Zaslavkiy
//MIT License
//! examples of usage of RustedODE
/// the four reference requests of the dual solver: decay, oscillator, count mismatch, unbound name
pub mod dual_solver_examples;
