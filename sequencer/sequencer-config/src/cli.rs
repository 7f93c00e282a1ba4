// Copyright (c) Bridge Sequencer Contributors
// SPDX-License-Identifier: Apache-2.0

use clap::Parser;
use std::path::PathBuf;

/// Command-line entry point shared by the node binary: the only required
/// argument is where to find the node's TOML configuration file.
#[derive(Parser, Debug)]
#[command(name = "sequencer-node", about = "Bridge sequencer kernel node")]
pub struct Args {
    #[arg(long, env = "SEQUENCER_CONFIG_PATH")]
    pub config_path: PathBuf,
}
