use std::path::Path;

use anyhow::Result;

use crate::cli::ServeArgs;
use crate::config::ServeConfig;
use crate::server;

pub async fn execute(data_dir: &Path, args: ServeArgs) -> Result<()> {
	let mut config = ServeConfig::load(data_dir)?;
	if let Some(bind) = args.bind {
		config.bind = bind;
	}
	server::run(data_dir, config).await
}
