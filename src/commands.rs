//! CLI command definitions
//!
//! Defines the clap commands for the smoke-test CLI.

use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Provision a site per case, scaffold and publish the template, verify the landing page
    Run {
        /// YAML suite file (default: the built-in web/razor/mvc cases)
        #[arg(long, conflicts_with = "template")]
        suite: Option<PathBuf>,

        /// Run a single ad-hoc template instead of a suite
        #[arg(long, requires = "expected")]
        template: Option<String>,

        /// Substring the ad-hoc template's landing page must contain
        #[arg(long, requires = "template")]
        expected: Option<String>,

        /// Only run cases whose id or template contains this string
        #[arg(long)]
        filter: Option<String>,

        /// Leave provisioned sites in place after the run
        #[arg(long)]
        keep_resources: bool,

        /// Deployment template overriding config and suite
        #[arg(long)]
        deployment_template: Option<PathBuf>,
    },

    /// List the cases of a suite
    List {
        /// YAML suite file (default: the built-in cases)
        #[arg(long)]
        suite: Option<PathBuf>,
    },

    /// Show the effective configuration
    Config {
        /// Write a default config file if none exists
        #[arg(long)]
        init: bool,
    },
}
