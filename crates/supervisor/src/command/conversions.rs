use std::{fmt, process::Stdio};

use tokio::process::Command as TokioCommand;
use tracing::trace;

use super::{Invocation, Program};

impl Program {
	/// Obtain a [`tokio::process::Command`].
	///
	/// The process gets a null stdin and stdout: the supervisor's own standard streams are not
	/// for its children. Standard error is inherited.
	pub fn to_spawnable(&self) -> TokioCommand {
		trace!(program=?self, "constructing command");

		let mut cmd = match self {
			Self::Exec { prog, args } => {
				let mut c = TokioCommand::new(prog);
				c.args(args);
				c
			}

			Self::Script {
				interpreter,
				script,
				args,
			} => {
				let mut c = TokioCommand::new(interpreter.prog.clone());

				// CMD.EXE does its own parsing of the command line: use raw_arg everywhere
				#[cfg(windows)]
				{
					for opt in &interpreter.options {
						c.raw_arg(opt);
					}
					if let Some(progopt) = &interpreter.program_option {
						c.raw_arg(progopt);
						// /C strips the outermost pair of quotes
						c.raw_arg(format!("\"\"{}\"\"", script.display()));
					} else {
						c.raw_arg(format!("\"{}\"", script.display()));
					}
					for arg in args {
						c.raw_arg(quote_windows(arg));
					}
				}

				#[cfg(not(windows))]
				{
					c.args(interpreter.options.clone());
					if let Some(progopt) = &interpreter.program_option {
						c.arg(progopt);
					}
					c.arg(script);
					c.args(args);
				}

				c
			}
		};

		cmd.stdin(Stdio::null()).stdout(Stdio::null());
		cmd
	}
}

impl Invocation {
	/// Obtain a [`tokio::process::Command`], with its working directory set.
	pub fn to_spawnable(&self) -> TokioCommand {
		let mut cmd = self.program.to_spawnable();
		if let Some(dir) = &self.working_dir {
			cmd.current_dir(dir);
		}
		cmd
	}
}

#[cfg(windows)]
fn quote_windows(arg: &str) -> std::borrow::Cow<'_, str> {
	if !arg.is_empty() && !arg.contains([' ', '\t', '"']) {
		return arg.into();
	}

	format!("\"{}\"", arg.replace('"', "\"\"")).into()
}

impl fmt::Display for Program {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Exec { prog, args } => {
				write!(f, "{}", prog.display())?;
				for arg in args {
					write!(f, " {}", shell_words::quote(arg))?;
				}

				Ok(())
			}
			Self::Script {
				interpreter,
				script,
				args,
			} => {
				write!(f, "{}", interpreter.prog.display())?;
				for opt in &interpreter.options {
					write!(f, " {opt}")?;
				}
				if let Some(progopt) = &interpreter.program_option {
					write!(f, " {}", progopt.to_string_lossy())?;
				}
				write!(f, " {}", script.display())?;
				for arg in args {
					write!(f, " {}", shell_words::quote(arg))?;
				}

				Ok(())
			}
		}
	}
}

impl fmt::Display for Invocation {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.program)
	}
}
