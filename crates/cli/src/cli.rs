use std::path::PathBuf;

use afk_protocol::BotId;
use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "afk")]
#[command(about = "Supervise a fleet of long-lived idle game sessions")]
#[command(version)]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// Directory holding bot records, settings, histories, and config.json
	#[arg(long, global = true, value_name = "DIR")]
	pub data_dir: Option<PathBuf>,

	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// Run the control server and supervise every configured bot
	Serve(ServeArgs),

	/// Manage bot records directly (use while the server is stopped)
	Bots {
		#[command(subcommand)]
		action: BotsAction,
	},
}

#[derive(Args, Debug, Default)]
pub struct ServeArgs {
	/// Address to bind, overriding config.json (e.g. 0.0.0.0:3000)
	#[arg(long, value_name = "ADDR")]
	pub bind: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum BotsAction {
	/// List configured bots
	List {
		/// Print records as JSON
		#[arg(long)]
		json: bool,
	},

	/// Add a bot
	Add(AddBotArgs),

	/// Remove a bot, its record, and its log history
	#[command(alias = "remove")]
	Rm {
		/// Bot id
		id: BotId,
	},
}

#[derive(Args, Debug, Default)]
pub struct AddBotArgs {
	/// Display name (defaults to "Bot <id>")
	#[arg(long)]
	pub name: Option<String>,

	/// Game server host
	#[arg(long)]
	pub host: String,

	/// Game server port
	#[arg(long)]
	pub port: Option<u16>,

	/// Protocol version, or "auto"
	#[arg(long = "game-version", value_name = "VERSION")]
	pub version: Option<String>,

	/// Account email (or username with --offline)
	#[arg(long)]
	pub email: Option<String>,

	/// Use an offline-mode account instead of Microsoft authentication
	#[arg(long)]
	pub offline: bool,

	/// Dashboard user the bot is assigned to
	#[arg(long)]
	pub owner: Option<String>,
}
