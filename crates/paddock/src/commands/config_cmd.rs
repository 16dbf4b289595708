//! Config subcommand handlers.

use paddock_config::{CameraEntry, Config, PresetEntry};

use crate::cli::{ConfigArgs, ConfigCommand, ConfigInitArgs, GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output;

use super::util;

fn starter() -> Config {
    Config {
        cameras: vec![CameraEntry {
            id: "foaling-box".into(),
            name: Some("Foaling box".into()),
            host: "127.0.0.1:8554".into(),
            username: Some("admin".into()),
            password: None,
            password_env: Some("PADDOCK_FOALING_BOX_PASSWORD".into()),
            ptz: true,
            presets: vec![PresetEntry {
                id: "door".into(),
                name: Some("Stall door".into()),
            }],
            qualities: vec!["main".into(), "sub".into()],
            enabled: true,
        }],
        ..Config::default()
    }
}

fn show(global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = util::load(global)?.redacted();
    let out = match global.format {
        OutputFormat::Table => cfg.to_toml()?,
        OutputFormat::Json => output::render_json(&cfg, false)?,
        OutputFormat::JsonCompact => output::render_json(&cfg, true)?,
        OutputFormat::Plain => cfg
            .cameras
            .iter()
            .map(|c| c.id.as_str())
            .collect::<Vec<_>>()
            .join("\n"),
    };
    output::print_output(&out, global.quiet);
    Ok(())
}

fn init(args: &ConfigInitArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let path = util::config_file(global);
    if path.exists() && !args.force {
        return Err(CliError::ConfigExists {
            path: path.display().to_string(),
        });
    }
    paddock_config::save_config(&starter(), &path)?;
    tracing::info!(path = %path.display(), "wrote starter config");
    output::print_output(&path.display().to_string(), global.quiet);
    Ok(())
}

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Show => show(global),
        ConfigCommand::Path => {
            // Printed even under --quiet: it is the whole point of the command.
            println!("{}", util::config_file(global).display());
            Ok(())
        }
        ConfigCommand::Init(init_args) => init(&init_args, global),
    }
}
