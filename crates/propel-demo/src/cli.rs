#![forbid(unsafe_code)]

use clap::{Args, Parser, Subcommand};
use propel_runtime::{ObjectConfig, StoreKind};
use tracing::info;

use crate::error::{DemoError, Result};
use crate::logging;
use crate::scenario::{run_form, run_save};

/// Exit code when the save scenario ends with nothing persisted.
pub const NOT_SAVED_EXIT_CODE: i32 = 3;

#[derive(Debug, Parser)]
#[command(
    name = "propel-demo",
    about = "Drive a sample Propel view-model from the command line",
    version
)]
pub struct Cli {
    /// Log filter directives (overrides RUST_LOG), e.g. `propel_runtime=debug`.
    #[arg(long = "log-level", env = "PROPEL_DEMO_LOG_LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Emit logs as JSON lines.
    #[arg(long, env = "PROPEL_DEMO_JSON", global = true)]
    pub json: bool,

    /// Property store backing every object (`hash` or `linear`).
    #[arg(long, env = "PROPEL_DEMO_STORE", default_value = "hash", global = true)]
    pub store: StoreKind,

    /// Log every committed change at debug level.
    #[arg(long = "log-changes", env = "PROPEL_DEMO_LOG_CHANGES", global = true)]
    pub log_changes: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Edit a profile and print what its observers see.
    Form(FormArgs),

    /// Run the profile's save command against a flaky backend.
    Save(SaveArgs),
}

#[derive(Debug, Clone, Args)]
pub struct FormArgs {
    #[arg(long, default_value = "Ada")]
    pub name: String,

    /// Homes to move through, in order.
    #[arg(long = "city", default_values_t = [String::from("London"), String::from("Paris")])]
    pub cities: Vec<String>,
}

#[derive(Debug, Clone, Args)]
pub struct SaveArgs {
    #[arg(long, default_value = "Ada")]
    pub name: String,

    /// Number of saves the backend rejects before accepting one.
    #[arg(long, default_value_t = 1)]
    pub failures: u32,
}

impl Cli {
    #[must_use]
    pub fn object_config(&self) -> ObjectConfig {
        ObjectConfig::new()
            .with_store(self.store)
            .with_log_changes(self.log_changes)
    }
}

pub fn run_from_env() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.log_level.as_deref(), cli.json)?;
    run(cli)
}

pub fn run(cli: Cli) -> Result<()> {
    let config = cli.object_config();
    info!(store = %config.store, log_changes = config.log_changes, "demo.start");
    match cli.command {
        Commands::Form(args) => {
            for line in run_form(&config, &args.name, &args.cities)? {
                println!("{line}");
            }
            Ok(())
        }
        Commands::Save(args) => {
            let (lines, saved) = run_save(&config, &args.name, args.failures)?;
            for line in lines {
                println!("{line}");
            }
            if saved == 0 {
                return Err(DemoError::exit(NOT_SAVED_EXIT_CODE, "profile was not saved"));
            }
            println!("saved {saved} profile(s)");
            Ok(())
        }
    }
}
