//! Clap derive structures for the `lightstack` CLI.
//!
//! Defines the complete command tree, global flags, and shared types.

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// lightstack -- drive and watch a LightStack alert server
#[derive(Debug, Parser)]
#[command(
    name = "lightstack",
    version,
    about = "Trigger, clear and watch LightStack alerts from the command line",
    long_about = "A client for LightStack alert servers.\n\n\
        Keeps a live mirror of the server's active alerts over its WebSocket\n\
        push API and shows which alert the LED stack should be displaying.",
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
    /// Server profile to use
    #[arg(long, short = 'p', env = "LIGHTSTACK_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Server host (overrides profile)
    #[arg(long, env = "LIGHTSTACK_HOST", global = true)]
    pub host: Option<String>,

    /// Server port (overrides profile)
    #[arg(long, env = "LIGHTSTACK_PORT", global = true)]
    pub port: Option<u16>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "LIGHTSTACK_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Command timeout in seconds (overrides profile)
    #[arg(long, env = "LIGHTSTACK_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
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
    /// Show connection status and the alert currently displayed
    #[command(alias = "st")]
    Status,

    /// List active alerts, most urgent first
    #[command(alias = "ls")]
    Alerts,

    /// Trigger (or re-trigger) an alert
    Trigger(TriggerArgs),

    /// Clear one alert
    Clear(ClearArgs),

    /// Clear every active alert
    ClearAll(ClearAllArgs),

    /// Stream state changes until interrupted
    Watch(WatchArgs),

    /// Decode or encode LED values without a server
    Decode(DecodeArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  ALERT COMMANDS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct TriggerArgs {
    /// Alert key, e.g. garage_door_open
    pub key: String,

    /// Priority override, 1 (critical) to 5 (info)
    #[arg(long, short = 'P', value_parser = clap::value_parser!(u8).range(1..=5))]
    pub priority: Option<u8>,

    /// LED color: palette name (red, orange, ...) or hue 0-255
    #[arg(long)]
    pub color: Option<String>,

    /// LED effect: name (pulse, fast_blink, ...) or code
    #[arg(long)]
    pub effect: Option<String>,

    /// LED brightness percent, 0-100
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
    pub brightness: Option<u8>,

    /// LED duration: 30s, 10m, 2h or indefinite
    #[arg(long)]
    pub duration: Option<String>,

    /// Description shown with the alert
    #[arg(long)]
    pub description: Option<String>,

    /// Audit note recorded by the server
    #[arg(long)]
    pub note: Option<String>,
}

#[derive(Debug, Args)]
pub struct ClearArgs {
    /// Alert key to clear
    pub key: String,

    /// Audit note recorded by the server
    #[arg(long)]
    pub note: Option<String>,
}

#[derive(Debug, Args)]
pub struct ClearAllArgs {
    /// Audit note recorded by the server
    #[arg(long)]
    pub note: Option<String>,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Also print every change to the active alert list
    #[arg(long, short = 'a')]
    pub all: bool,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  DECODE
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct DecodeArgs {
    #[command(subcommand)]
    pub command: DecodeCommand,
}

#[derive(Debug, Subcommand)]
pub enum DecodeCommand {
    /// Duration byte (1-255) or text such as "10 minutes"
    Duration {
        value: String,
    },

    /// Effect code or name
    Effect {
        value: String,
    },

    /// Hue (0-255) or palette name
    Color {
        value: String,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  CONFIG
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Write a profile to the config file
    Init {
        /// Replace the profile if it already exists
        #[arg(long)]
        force: bool,
    },

    /// Display current resolved configuration
    Show,

    /// Print the config file location
    Path,

    /// List configured profiles
    Profiles,

    /// Set the default profile
    Use {
        /// Profile name to set as default
        name: String,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  COMPLETIONS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
