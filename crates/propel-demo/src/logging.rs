#![forbid(unsafe_code)]

//! Subscriber installation for the demo binary.

use tracing_subscriber::EnvFilter;

use crate::error::{DemoError, Result};

/// Filter used when neither `--log-level` nor `RUST_LOG` is set.
pub const DEFAULT_FILTER: &str = "warn";

/// Resolve the filter: explicit directives win over `RUST_LOG`.
pub fn filter(directives: Option<&str>) -> Result<EnvFilter> {
    match directives {
        Some(directives) => Ok(EnvFilter::try_new(directives)?),
        None => Ok(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))),
    }
}

/// Install a global `fmt` subscriber writing to stderr.
pub fn init(directives: Option<&str>, json: bool) -> Result<()> {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter(directives)?)
        .with_writer(std::io::stderr)
        .with_target(false);
    let installed = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|err| DemoError::Logging {
        message: err.to_string(),
    })
}
