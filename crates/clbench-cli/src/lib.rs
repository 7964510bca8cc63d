//! clbench CLI library
//!
//! This library exposes the argument model and output helpers for testing.

pub mod cli;
pub mod exit;
pub mod output;
