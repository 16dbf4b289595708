//! `paddock stream start|stop`.

use crate::cli::{GlobalOpts, StreamArgs, StreamCommand};
use crate::error::CliError;
use crate::output;

use super::util;

pub async fn handle(args: StreamArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let (target, starting) = match args.command {
        StreamCommand::Start(target) => (target, true),
        StreamCommand::Stop(target) => (target, false),
    };
    let tier = util::tier(target.quality);

    let (manager, device) = util::connect_one(global, &target.camera).await?;
    let ok = if starting {
        manager.start_stream(&device.id, tier).await
    } else {
        manager.stop_stream(&device.id, tier).await
    };
    manager.shutdown().await;

    let verb = if starting { "start" } else { "stop" };
    if !ok {
        return Err(CliError::Rejected {
            camera: target.camera,
            command: format!("stream {verb} ({tier})"),
        });
    }
    output::print_output(&format!("{} {tier}: {verb} requested", target.camera), global.quiet);
    Ok(())
}
