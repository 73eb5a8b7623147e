use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "azure-bridge")]
#[command(about = "Work with Azure Storage disks and queues from the command line")]
pub struct CliConfig {
    #[arg(long, short, default_value = crate::config::toml_config::DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Use in-process services instead of the storage account. `--config`
    /// is ignored and nothing persists past this invocation.
    #[arg(long)]
    pub memory: bool,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Log as JSON to stderr")]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Upload a local file to a disk.
    Put {
        disk: String,
        path: String,
        file: PathBuf,
        #[arg(long)]
        mimetype: Option<String>,
    },
    /// Print a file's contents.
    Get { disk: String, path: String },
    Ls {
        disk: String,
        #[arg(default_value = "")]
        directory: String,
        #[arg(long, short)]
        recursive: bool,
    },
    Stat { disk: String, path: String },
    Rm { disk: String, path: String },
    Mkdir { disk: String, path: String },
    Rmdir { disk: String, path: String },
    Cp { disk: String, from: String, to: String },
    Mv { disk: String, from: String, to: String },
    /// Push a JSON payload onto a queue connection.
    Push {
        connection: String,
        payload: String,
        #[arg(long)]
        queue: Option<String>,
    },
    /// Push a JSON payload that becomes visible after `delay` seconds.
    Later {
        connection: String,
        delay: u64,
        payload: String,
        #[arg(long)]
        queue: Option<String>,
    },
    /// Pop one job, print it, then delete or release it.
    Pop {
        connection: String,
        #[arg(long)]
        queue: Option<String>,
        /// Release the job again after this many seconds instead of deleting it.
        #[arg(long)]
        release: Option<u64>,
    },
    Size {
        connection: String,
        #[arg(long)]
        queue: Option<String>,
    },
}
