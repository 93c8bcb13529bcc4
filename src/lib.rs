//! Web app template smoke tests
//!
//! This library provisions a hosting site, scaffolds a web application
//! template with a command-line build tool, publishes it to the site and
//! verifies the landing page over HTTP.

pub mod build;
pub mod cli;
pub mod commands;
pub mod common;
pub mod provision;
pub mod testing;
pub mod verify;

// Re-export commonly used types for tests
pub use common::{Error, Result};
pub use testing::{Harness, RunOptions, TemplateCase, TestSuite};
