//! Common utilities shared by the runner, provisioners and CLI

pub mod config;
pub mod error;
pub mod logging;
pub mod naming;
pub mod paths;

pub use error::{Error, Result};
