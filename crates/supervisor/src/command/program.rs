use std::path::PathBuf;

use super::Interpreter;

/// A single program call.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Program {
	/// A raw program call: the path to an executable and its argument list.
	Exec {
		/// Path or name of the program.
		prog: PathBuf,

		/// The arguments to pass.
		args: Vec<String>,
	},

	/// A script, run through an interpreter.
	Script {
		/// The interpreter to run.
		interpreter: Interpreter,

		/// Path to the script.
		script: PathBuf,

		/// The arguments to pass to the script.
		args: Vec<String>,
	},
}

impl Program {
	/// The arguments passed to the executable or script.
	#[must_use]
	pub fn args(&self) -> &[String] {
		match self {
			Self::Exec { args, .. } | Self::Script { args, .. } => args,
		}
	}
}
