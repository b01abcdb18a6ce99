use std::{
	env::var,
	io::stderr,
	path::{Path, PathBuf},
};

use clap::{ArgAction, Parser, ValueHint};
use miette::{bail, Result};
use tokio::fs::{create_dir_all, metadata};
use tracing::{info, warn};
use tracing_appender::{non_blocking, non_blocking::WorkerGuard, rolling};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Parser)]
pub struct LoggingArgs {
	/// Set diagnostic log level
	///
	/// This enables diagnostic logging: launches with their resolved command lines, exits with
	/// their codes, relaunches, and so on. Use multiple times to increase verbosity.
	///
	/// Goes up to '-vvvv'. When submitting bug reports, default to a '-vvv' log level.
	///
	/// Logs go to standard error, never to standard output, which carries status messages.
	///
	/// Setting $RUST_LOG also works, and takes precedence, but is not recommended. However, using
	/// $RUST_LOG is the only way to get logs from before these options are parsed.
	#[arg(
		long,
		short,
		help_heading = super::OPTSET_DEBUGGING,
		action = ArgAction::Count,
		default_value = "0",
		num_args = 0,
	)]
	pub verbose: u8,

	/// Write diagnostic logs to a file
	///
	/// This writes diagnostic logs to a file, instead of the terminal, in JSON format. If a log
	/// level was not already specified, this will set it to '-vv'.
	///
	/// If a path is not provided, the default is the working directory.
	///
	/// If the path provided is a directory, a file will be created in that directory. The file name
	/// will be the current date and time, in the format 'warden.YYYY-MM-DDTHH-MM-SSZ.log', so each
	/// run gets its own log.
	///
	/// Without this option or '-v', logs are written at the '-vv' level to such a file in a 'logs'
	/// directory next to the configuration file.
	#[arg(
		long,
		help_heading = super::OPTSET_DEBUGGING,
		num_args = 0..=1,
		default_missing_value = ".",
		value_hint = ValueHint::AnyPath,
		value_name = "PATH",
	)]
	pub log_file: Option<PathBuf>,
}

/// Where logs go once arguments are parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
	Stderr,
	File(PathBuf),
}

impl LoggingArgs {
	fn verbosity(&self) -> u8 {
		if self.verbose == 0 {
			2
		} else {
			self.verbose
		}
	}

	/// `-v` alone logs to the terminal; otherwise logs go to a file, by default in `default_dir`.
	#[must_use]
	pub fn target(&self, default_dir: &Path) -> LogTarget {
		match (&self.log_file, self.verbose) {
			(Some(file), _) => LogTarget::File(file.clone()),
			(None, 0) => LogTarget::File(default_dir.to_owned()),
			(None, _) => LogTarget::Stderr,
		}
	}
}

pub fn preargs() -> bool {
	let mut log_on = false;

	#[cfg(feature = "dev-console")]
	match console_subscriber::try_init() {
		Ok(_) => {
			warn!("dev-console enabled");
			log_on = true;
		}
		Err(e) => {
			eprintln!("Failed to initialise tokio console, falling back to normal logging\n{e}")
		}
	}

	if !log_on {
		if let Ok(filter) = var("RUST_LOG") {
			match tracing_subscriber::fmt()
				.with_env_filter(EnvFilter::from_default_env())
				.with_writer(stderr)
				.try_init()
			{
				Ok(()) => {
					warn!(RUST_LOG=%filter, "logging configured from RUST_LOG");
					log_on = true;
				}
				Err(e) => eprintln!("Failed to initialise logging with RUST_LOG, falling back\n{e}"),
			}
		}
	}

	log_on
}

pub async fn postargs(args: &LoggingArgs, default_dir: &Path) -> Result<Option<WorkerGuard>> {
	let verbosity = args.verbosity();
	let target = args.target(default_dir);

	if args.log_file.is_none() && target != LogTarget::Stderr {
		if let Err(err) = create_dir_all(default_dir).await {
			eprintln!("Failed to create log directory {default_dir:?}, continuing without logs\n{err}");
			return Ok(None);
		}
	}

	let (log_writer, guard) = if let LogTarget::File(file) = &target {
		let is_dir = metadata(&file).await.map_or(false, |info| info.is_dir());
		let (dir, filename) = if is_dir {
			(
				file.to_owned(),
				PathBuf::from(format!(
					"warden.{}.log",
					chrono::Utc::now().format("%Y-%m-%dT%H-%M-%SZ")
				)),
			)
		} else if let (Some(parent), Some(file_name)) = (file.parent(), file.file_name()) {
			(parent.into(), PathBuf::from(file_name))
		} else {
			bail!("Failed to determine log file name");
		};

		non_blocking(rolling::never(dir, filename))
	} else {
		non_blocking(stderr())
	};

	let mut builder = tracing_subscriber::fmt().with_env_filter(match verbosity {
		0 | 2 => "info",
		1 => "warn",
		3 => "debug",
		_ => "trace",
	});

	if verbosity > 2 {
		use tracing_subscriber::fmt::format::FmtSpan;
		builder = builder.with_span_events(FmtSpan::NEW | FmtSpan::CLOSE);
	}

	match if matches!(target, LogTarget::File(_)) {
		builder.json().with_writer(log_writer).try_init()
	} else if verbosity > 3 {
		builder.pretty().with_writer(log_writer).try_init()
	} else {
		builder.with_writer(log_writer).try_init()
	} {
		Ok(()) => info!("logging initialised"),
		Err(e) => eprintln!("Failed to initialise logging, continuing with none\n{e}"),
	}

	Ok(Some(guard))
}
