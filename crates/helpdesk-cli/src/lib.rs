//! CLI argument model and validation for the helpdesk binary.
//!
//! Every flag has an environment fallback so the bot can be configured
//! entirely from the process environment.

pub mod cli_args;
pub mod validation;

pub use cli_args::Cli;
pub use validation::*;
