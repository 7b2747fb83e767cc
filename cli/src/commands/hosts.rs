use std::process::ExitCode;

use anyhow::Context;

use cmover_common::network::host::{self, HostSpec};

use crate::terminal::print;

pub fn hosts(tokens: &[String]) -> anyhow::Result<ExitCode> {
    let resolved: Vec<HostSpec> = host::resolve(tokens).context("cannot expand host list")?;
    print::hosts(&resolved);
    Ok(ExitCode::SUCCESS)
}
