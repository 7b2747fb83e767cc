//! # Settings
//!
//! Values that rarely change between runs: the node list and SSH credentials.
//!
//! Layered lowest to highest: `~/.cmover/config.toml` (or `--config`), then
//! `CMOVER_*` environment variables. Command-line flags override both when the
//! run's [`Config`](cmover_common::config::Config) is assembled.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

const SETTINGS_DIR: &str = ".cmover";
const SETTINGS_FILE: &str = "config.toml";
const ENV_PREFIX: &str = "CMOVER";

#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Host tokens used when `--hosts` is not given.
    pub nodes: Vec<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub private_key: Option<PathBuf>,
    pub key_passphrase: Option<String>,
    pub namespace: Option<String>,
    pub concurrency: Option<usize>,
    pub containerd_address: Option<PathBuf>,
    pub remote_dir: Option<String>,
    pub staging_dir: Option<PathBuf>,
}

fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from)
}

pub fn default_path() -> Option<PathBuf> {
    home_dir().map(|home| home.join(SETTINGS_DIR).join(SETTINGS_FILE))
}

/// `~/.ssh/id_rsa`, used when no key is configured anywhere.
pub fn default_private_key() -> Option<PathBuf> {
    home_dir().map(|home| home.join(".ssh").join("id_rsa"))
}

/// An explicit path must exist; the default one is optional.
pub fn load(explicit: Option<&Path>) -> anyhow::Result<Settings> {
    let mut builder = config::Config::builder();

    match explicit {
        Some(path) => {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        None => {
            if let Some(path) = default_path() {
                builder = builder.add_source(config::File::from(path).required(false));
            }
        }
    }
    builder = builder.add_source(config::Environment::with_prefix(ENV_PREFIX));

    builder
        .build()
        .context("failed to read settings")?
        .try_deserialize()
        .context("invalid settings")
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
