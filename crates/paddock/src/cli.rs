//! Clap derive structures for the `paddock` CLI.
//!
//! Only clap types live here: `build.rs` compiles this file on its own to
//! render man pages.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// paddock -- watch and drive barn cameras through a stream gateway
#[derive(Debug, Parser)]
#[command(
    name = "paddock",
    version,
    about = "Monitor and control paddock cameras from the command line",
    long_about = "Connects to each configured camera's stream gateway, keeps the\n\
        connection alive with automatic reconnects, reports health, and\n\
        relays stream, PTZ and snapshot commands.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config file (defaults to the platform config directory)
    #[arg(long, env = "PADDOCK_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        short = 'f',
        env = "PADDOCK_FORMAT",
        default_value = "table",
        global = true
    )]
    pub format: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Accept self-signed gateway certificates
    #[arg(long, short = 'k', global = true)]
    pub insecure: bool,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON (one event per line under `monitor`)
    JsonCompact,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Connect every enabled camera and print events until Ctrl-C
    #[command(alias = "watch")]
    Monitor(MonitorArgs),

    /// Probe each camera's gateway once
    #[command(alias = "st")]
    Status,

    /// Capture a still image
    #[command(alias = "snap")]
    Snapshot(SnapshotArgs),

    /// Send a pan-tilt-zoom command
    Ptz(PtzArgs),

    /// Start or stop a gateway stream
    Stream(StreamArgs),

    /// Inspect the configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Monitor ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct MonitorArgs {
    /// Only these cameras (repeatable; default: all enabled)
    #[arg(long = "camera", short = 'c')]
    pub cameras: Vec<String>,

    /// Hide periodic health updates
    #[arg(long)]
    pub no_health: bool,
}

// ── Snapshot ─────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct SnapshotArgs {
    /// Camera id from the config file
    pub camera: String,

    /// Stream tier to capture from
    #[arg(long, default_value = "sub")]
    pub quality: QualityArg,

    /// Write the image here (default: <camera>-<quality>.<ext>)
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,
}

// ── PTZ ──────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct PtzArgs {
    /// Camera id from the config file
    pub camera: String,

    /// What to do
    pub action: PtzActionArg,

    /// Speed or step for pan/tilt/zoom
    #[arg(long)]
    pub value: Option<f64>,

    /// Preset id (required for goto-preset)
    #[arg(long)]
    pub preset: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PtzActionArg {
    PanLeft,
    PanRight,
    TiltUp,
    TiltDown,
    ZoomIn,
    ZoomOut,
    Stop,
    Home,
    GotoPreset,
}

// ── Stream ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct StreamArgs {
    #[command(subcommand)]
    pub command: StreamCommand,
}

#[derive(Debug, Subcommand)]
pub enum StreamCommand {
    /// Ask the gateway to start encoding a stream
    Start(StreamTarget),
    /// Ask the gateway to stop a stream
    Stop(StreamTarget),
}

#[derive(Debug, Args)]
pub struct StreamTarget {
    /// Camera id from the config file
    pub camera: String,

    /// Stream tier
    #[arg(long, default_value = "main")]
    pub quality: QualityArg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum QualityArg {
    /// Full-resolution main stream
    Main,
    /// Low-bandwidth sub stream
    Sub,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the effective configuration (passwords masked)
    Show,
    /// Print the config file path
    Path,
    /// Write a starter config file
    Init(ConfigInitArgs),
}

#[derive(Debug, Args)]
pub struct ConfigInitArgs {
    /// Overwrite an existing file
    #[arg(long)]
    pub force: bool,
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Target shell
    pub shell: clap_complete::Shell,
}
