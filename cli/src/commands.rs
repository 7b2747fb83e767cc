pub mod hosts;
pub mod images;

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};
use cmover_common::migration::RuntimeKind;

#[derive(Parser)]
#[command(name = "cmover")]
#[command(about = "Move container images between runtimes, locally or over SSH.")]
pub struct CommandLine {
    #[command(subcommand)]
    pub command: Commands,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Settings file, defaults to ~/.cmover/config.toml
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Migrate images from one runtime to another
    #[command(alias = "i")]
    Images(ImagesArgs),
    /// Print the hosts a list of addresses and ranges expands to
    #[command(alias = "h")]
    Hosts {
        /// e.g. 10.0.0.1, 10.0.0.10-20, [fe80::1]:2222
        #[arg(required = true, value_delimiter = ',')]
        tokens: Vec<String>,
    },
}

#[derive(Args, Debug)]
pub struct ImagesArgs {
    /// Image references, e.g. alpine:latest
    pub images: Vec<String>,

    /// Runtime to export from
    #[arg(long = "src-type", default_value = "docker")]
    pub source: RuntimeKind,

    /// Runtime to import into
    #[arg(long = "dst-type", default_value = "containerd")]
    pub destination: RuntimeKind,

    /// Destination namespace
    #[arg(short, long)]
    pub namespace: Option<String>,

    /// Migrate every tagged image in the source runtime
    #[arg(short, long)]
    pub all: bool,

    /// File with one image reference per line
    #[arg(long = "image-list", value_name = "FILE")]
    pub image_list: Option<PathBuf>,

    /// Remote hosts; migrates locally when none are given
    #[arg(long, value_delimiter = ',')]
    pub hosts: Vec<String>,

    #[arg(short, long)]
    pub username: Option<String>,

    /// Takes precedence over the private key
    #[arg(short, long)]
    pub password: Option<String>,

    #[arg(long, value_name = "FILE")]
    pub private_key: Option<PathBuf>,

    #[arg(long)]
    pub key_passphrase: Option<String>,

    /// Maximum migrations in flight (default: unbounded)
    #[arg(short = 'j', long)]
    pub concurrency: Option<usize>,

    /// Only report the first failure instead of every result
    #[arg(long)]
    pub first_error: bool,

    /// Remote directory the archive is uploaded to
    #[arg(long)]
    pub remote_dir: Option<String>,

    /// Local directory for staged archives
    #[arg(long, value_name = "DIR")]
    pub staging_dir: Option<PathBuf>,

    /// containerd socket handed to ctr
    #[arg(long, value_name = "SOCKET")]
    pub containerd_address: Option<PathBuf>,

    #[arg(long)]
    pub no_progress: bool,
}

impl CommandLine {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
