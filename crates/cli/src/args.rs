use std::path::{Path, PathBuf};

use clap::{Parser, ValueHint};
use miette::Result;
use tracing::{debug, warn};
use tracing_appender::non_blocking::WorkerGuard;

pub mod logging;

const OPTSET_CONFIG: &str = "Configuration options";
const OPTSET_DEBUGGING: &str = "Debugging options";

/// Supervise a set of programs and scripts.
///
/// Warden starts, stops, and watches over the processes listed in its configuration file,
/// relaunching guarded processes when they exit on their own. It is controlled with JSON
/// messages, one per line, on standard input, and reports status changes the same way on
/// standard output.
///
/// Closing standard input, or interrupting Warden, stops every process before exiting.
#[derive(Debug, Clone, Parser)]
#[command(
	name = "warden",
	bin_name = "warden",
	author,
	version,
	long_about = None,
	after_help = "Messages are JSON objects with an \"action\" field: getProcessList, startProcess, stopProcess, startAll, stopAll, addProcess, updateProcess, deleteProcess, getConfig, saveConfig."
)]
#[cfg_attr(debug_assertions, command(before_help = "⚠ DEBUG BUILD ⚠"))]
#[cfg_attr(feature = "dev-console", command(before_help = "⚠ DEV CONSOLE ENABLED ⚠"))]
pub struct Args {
	/// Path to the configuration file
	///
	/// Defaults to 'warden.json' next to the warden executable. If the file doesn't exist, it is
	/// created with an empty process list.
	#[arg(
		long,
		short,
		env = "WARDEN_CONFIG",
		help_heading = OPTSET_CONFIG,
		value_hint = ValueHint::FilePath,
		value_name = "PATH",
	)]
	pub config: Option<PathBuf>,

	/// Start all enabled processes on launch
	///
	/// This is the same as setting 'autoStartOnOpen' in the configuration, for this run only.
	#[arg(
		long,
		help_heading = OPTSET_CONFIG,
	)]
	pub start_all: bool,

	#[command(flatten)]
	pub logging: logging::LoggingArgs,
}

impl Args {
	/// The configuration file to use: `--config`, or the default next to the executable.
	pub fn config_path(&self) -> Result<PathBuf> {
		match &self.config {
			Some(path) => Ok(path.clone()),
			None => crate::config::default_path(),
		}
	}

	/// Where logs go when no logging options are given: `logs` next to the configuration file.
	pub fn default_log_dir(&self) -> Result<PathBuf> {
		let config = self.config_path()?;
		let dir = config.parent().unwrap_or_else(|| Path::new(""));
		Ok(dir.join("logs"))
	}
}

pub async fn get_args() -> Result<(Args, Option<WorkerGuard>)> {
	let prearg_logs = logging::preargs();
	if prearg_logs {
		warn!("⚠ RUST_LOG environment variable set or hardcoded, logging options have no effect");
	}

	let args = Args::parse();
	let log_guard = if prearg_logs {
		None
	} else {
		logging::postargs(&args.logging, &args.default_log_dir()?).await?
	};

	debug!(?args, "got arguments");
	Ok((args, log_guard))
}
