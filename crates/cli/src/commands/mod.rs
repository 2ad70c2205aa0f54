//! Command dispatch for the `afk` binary.

mod bots;
mod serve;

use anyhow::Result;

use crate::cli::{Cli, Commands};
use crate::config::resolve_data_dir;

pub async fn dispatch(cli: Cli) -> Result<()> {
	let data_dir = resolve_data_dir(cli.data_dir.as_deref());
	tracing::debug!(target = "afk.cli", data_dir = %data_dir.display(), "resolved data directory");

	match cli.command {
		Commands::Serve(args) => serve::execute(&data_dir, args).await,
		Commands::Bots { action } => bots::execute(&data_dir, action),
	}
}
