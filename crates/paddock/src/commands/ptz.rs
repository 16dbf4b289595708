//! `paddock ptz`: pan, tilt, zoom or recall a preset.

use paddock_core::{PtzAction, PtzCommand};

use crate::cli::{GlobalOpts, PtzActionArg, PtzArgs};
use crate::error::CliError;
use crate::output;

use super::util;

impl From<PtzActionArg> for PtzAction {
    fn from(arg: PtzActionArg) -> Self {
        match arg {
            PtzActionArg::PanLeft => Self::PanLeft,
            PtzActionArg::PanRight => Self::PanRight,
            PtzActionArg::TiltUp => Self::TiltUp,
            PtzActionArg::TiltDown => Self::TiltDown,
            PtzActionArg::ZoomIn => Self::ZoomIn,
            PtzActionArg::ZoomOut => Self::ZoomOut,
            PtzActionArg::Stop => Self::Stop,
            PtzActionArg::Home => Self::Home,
            PtzActionArg::GotoPreset => Self::GotoPreset,
        }
    }
}

fn build(args: &PtzArgs) -> Result<PtzCommand, CliError> {
    let mut command = match (args.action, args.preset.as_deref()) {
        (PtzActionArg::GotoPreset, Some(preset)) => {
            PtzCommand::goto_preset(args.camera.as_str(), preset)
        }
        (PtzActionArg::GotoPreset, None) => {
            return Err(CliError::Validation {
                field: "--preset".into(),
                reason: "goto-preset needs a preset id".into(),
            });
        }
        (_, Some(_)) => {
            return Err(CliError::Validation {
                field: "--preset".into(),
                reason: "only valid with goto-preset".into(),
            });
        }
        (action, None) => PtzCommand::new(args.camera.as_str(), action.into()),
    };
    if let Some(value) = args.value {
        command = command.with_value(value);
    }
    Ok(command)
}

pub async fn handle(args: PtzArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let command = build(&args)?;
    let (manager, _device) = util::connect_one(global, &args.camera).await?;
    let accepted = manager.control_ptz(&command).await;
    manager.shutdown().await;

    if !accepted {
        return Err(CliError::Rejected {
            camera: args.camera,
            command: format!("ptz {}", command.action),
        });
    }
    output::print_output(&format!("{} {}", args.camera, command.action), global.quiet);
    Ok(())
}
