//! Command dispatch: bridges CLI args -> DeviceManager calls -> output.

pub mod config_cmd;
pub mod monitor;
pub mod ptz;
pub mod snapshot;
pub mod status;
pub mod stream;
pub mod util;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a camera-facing command to its handler.
pub async fn dispatch(cmd: Command, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Monitor(args) => monitor::handle(args, global).await,
        Command::Status => status::handle(global).await,
        Command::Snapshot(args) => snapshot::handle(args, global).await,
        Command::Ptz(args) => ptz::handle(args, global).await,
        Command::Stream(args) => stream::handle(args, global).await,
        Command::Config(args) => config_cmd::handle(args, global),
        Command::Completions(_) => Err(CliError::Internal(
            "completions are generated before dispatch".into(),
        )),
    }
}
