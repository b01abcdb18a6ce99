//! Error types.

use miette::Diagnostic;
use thiserror::Error;

/// Why a process could not be launched.
///
/// These never escape the supervisor: a failed launch is reported as the
/// [`Failed`](crate::ProcessStatus::Failed) status, and the error itself goes to the log.
#[derive(Debug, Diagnostic, Error)]
#[non_exhaustive]
pub enum LaunchError {
	/// The definition was removed between the start request and the launch.
	#[error("no definition for process {id:?}")]
	#[diagnostic(code(warden::launch::unknown_definition))]
	UnknownDefinition {
		/// Identifier that was looked up.
		id: String,
	},

	/// The argument string couldn't be split.
	#[error("cannot split arguments {args:?}: {err}")]
	#[diagnostic(
		code(warden::launch::arguments),
		help("arguments are split with shell quoting rules; check for an unclosed quote")
	)]
	Arguments {
		/// The argument string from the definition.
		args: String,

		/// The underlying error.
		#[source]
		err: shell_words::ParseError,
	},

	/// The OS refused to create the process.
	#[error("cannot spawn `{command}`: {err}")]
	#[diagnostic(code(warden::launch::spawn))]
	Spawn {
		/// The command line, for display.
		command: String,

		/// The underlying error.
		#[source]
		err: std::io::Error,
	},

	/// The process was created but its id could not be read, meaning it was already reaped.
	#[error("`{command}` was gone before its pid could be read")]
	#[diagnostic(code(warden::launch::vanished))]
	Vanished {
		/// The command line, for display.
		command: String,
	},
}
