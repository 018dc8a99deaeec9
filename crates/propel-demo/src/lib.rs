#![forbid(unsafe_code)]

//! A small command-line walkthrough of a Propel view-model.
//!
//! `propel-demo form` edits a profile and prints what its path observers
//! see; `propel-demo save` drives the profile's save command through
//! rejection, failure and success.

pub mod cli;
pub mod error;
pub mod logging;
pub mod model;
pub mod scenario;

pub use cli::{Cli, Commands, run, run_from_env};
pub use error::{DemoError, Result};
