//! Template functional tests
//!
//! Each case provisions a fresh site, scaffolds a template into a clean
//! working directory, publishes it to the site and checks the landing
//! page. Cases come from a YAML suite or the built-in template list.

mod config;
mod runner;
pub mod workspace;

pub use config::*;
pub use runner::{print_summary, CaseOutcome, Harness, RunOptions, Step, TestResult};
