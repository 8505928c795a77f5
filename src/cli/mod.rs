use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "tubedigest",
    about = "TubeDigest - Collect the latest YouTube uploads and their transcripts",
    version,
    long_about = "A CLI tool that resolves YouTube channel URLs (handles, custom URLs, legacy usernames) to channel IDs, reads each channel's public upload feed and fetches a best-effort transcript for every video. No API key required."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable progress indicators
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub log_json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch the latest videos and transcripts for every configured channel
    Run {
        /// Channel list file (one reference per line, '#' starts a comment)
        #[arg(short, long, value_name = "FILE")]
        channels: Option<PathBuf>,

        /// Videos to take from each channel
        #[arg(short = 'n', long, value_name = "COUNT")]
        max_results: Option<usize>,

        /// Preferred transcript languages, in order
        #[arg(short, long, value_name = "LANG", value_delimiter = ',')]
        languages: Option<Vec<String>>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Output file path (prints to console if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Give up on unfinished work after this many seconds
        #[arg(long, value_name = "SECONDS")]
        deadline_secs: Option<u64>,
    },

    /// Resolve channel references to channel IDs
    Resolve {
        /// Channel URLs, handles or IDs
        #[arg(value_name = "REFERENCE", required = true)]
        references: Vec<String>,
    },

    /// List the latest videos of a channel
    Feed {
        /// Channel reference (URL, handle or channel ID)
        #[arg(value_name = "CHANNEL")]
        channel: String,

        /// Videos to list
        #[arg(short = 'n', long, value_name = "COUNT")]
        max_results: Option<usize>,
    },

    /// Print the transcript of a single video
    Transcript {
        /// Video ID
        #[arg(value_name = "VIDEO_ID")]
        video_id: String,

        /// Preferred transcript languages, in order
        #[arg(short, long, value_name = "LANG", value_delimiter = ',')]
        languages: Option<Vec<String>>,
    },

    /// Show configuration
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,
    },
}

#[derive(ValueEnum, Clone, Debug)]
pub enum OutputFormat {
    /// Plain text with transcript previews
    Text,
    /// JSON with full transcripts
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}
