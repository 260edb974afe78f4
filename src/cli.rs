use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "streamgate")]
#[command(author, version, about = "Tune media relay pipelines on demand and serve them as HLS")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP gateway
    Serve {
        /// Only accept these input URLs for tuning (default: accept any)
        #[arg(value_name = "INPUT_URL")]
        input_urls: Vec<String>,

        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Where to store stream output (default: $XDG_RUNTIME_DIR/streamgate)
        #[arg(long, value_name = "PATH")]
        working_directory: Option<PathBuf>,
    },

    /// Relay a single stream to a multicast address without the HTTP gateway
    Relay {
        /// Stream to relay
        #[arg(value_name = "INPUT_URL")]
        input_url: String,

        /// Multicast destination
        #[arg(long, value_name = "IP:PORT")]
        multicast_output: String,
    },

    /// Print the stream identifier for an address
    Encode {
        url: String,
    },

    /// Print the address a stream identifier stands for
    Decode {
        id: String,
    },

    /// Check that required external tools are available
    CheckTools,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
