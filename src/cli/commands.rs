//! Command definitions for the alarm clock CLI.
//!
//! Uses clap derive macro for argument parsing.

use clap::{Args, Parser, Subcommand};

// ============================================================================
// CLI Structure
// ============================================================================

/// Radio alarm clock CLI
#[derive(Parser, Debug)]
#[command(
    name = "mezamashi",
    version,
    about = "ラジオ目覚ましCLI",
    long_about = "インターネットラジオや音楽サービスのプレイリストで起こしてくれる\n\
                  目覚ましデーモンと、その操作用CLIです。",
    propagate_version = true
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable verbose output for debugging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

// ============================================================================
// Subcommands
// ============================================================================

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Add a new alarm
    Add(AddArgs),

    /// List all alarms
    List,

    /// Enable an alarm
    Enable {
        /// Alarm id
        id: String,
    },

    /// Disable an alarm
    Disable {
        /// Alarm id
        id: String,
    },

    /// Delete an alarm
    Delete {
        /// Alarm id
        id: String,
    },

    /// Snooze the currently ringing alarm
    Snooze {
        /// Deferral in minutes (defaults to the alarm's own interval)
        #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..=60))]
        minutes: Option<u32>,
    },

    /// Stop the currently ringing alarm
    Stop,

    /// Show daemon status and alarms
    Status,

    /// Preview a station or playlist before saving it
    Preview(PreviewArgs),

    /// Stop preview playback
    PreviewStop,

    /// Run the alarm daemon (foreground)
    Daemon,

    /// Generate shell completion scripts
    Completions {
        /// Shell type for completion script
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

// ============================================================================
// Add Command Arguments
// ============================================================================

/// Arguments for the add command
#[derive(Args, Debug, Clone)]
pub struct AddArgs {
    /// Alarm time as HH:MM (local time)
    #[arg(short, long)]
    pub time: String,

    /// Repeat weekdays, 0=Sunday..6=Saturday (e.g. --days 1,2,3,4,5)
    #[arg(
        short,
        long,
        value_delimiter = ',',
        value_parser = clap::value_parser!(u8).range(0..=6)
    )]
    pub days: Vec<u8>,

    /// Radio stream URL
    #[arg(long)]
    pub stream_url: Option<String>,

    /// Radio station display name
    #[arg(long)]
    pub stream_name: Option<String>,

    /// Music-service playlist URI
    #[arg(long)]
    pub playlist_uri: Option<String>,

    /// Playlist display name
    #[arg(long)]
    pub playlist_name: Option<String>,

    /// Snooze interval in minutes (1-60)
    #[arg(
        short,
        long,
        value_parser = clap::value_parser!(u32).range(1..=60)
    )]
    pub snooze_interval: Option<u32>,

    /// Disable the snooze action for this alarm
    #[arg(long)]
    pub no_snooze: bool,
}

// ============================================================================
// Preview Command Arguments
// ============================================================================

/// Arguments for the preview command
#[derive(Args, Debug, Clone)]
pub struct PreviewArgs {
    /// Radio stream URL
    #[arg(long)]
    pub stream_url: Option<String>,

    /// Radio station display name
    #[arg(long)]
    pub stream_name: Option<String>,

    /// Music-service playlist URI
    #[arg(long)]
    pub playlist_uri: Option<String>,

    /// Playlist display name
    #[arg(long)]
    pub playlist_name: Option<String>,
}

// ============================================================================
// Tests
// ============================================================================
