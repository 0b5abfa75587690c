use crate::cli::HarnessCli;
use clap::Parser;

/// Initialise the CLI and logging for a scenario binary.
pub fn init() -> HarnessCli {
    env_logger::init();

    HarnessCli::parse()
}
