//! Command construction: turning a definition into something to spawn.

use std::path::PathBuf;

use crate::{
	definition::{ProcessDefinition, ProcessKind},
	errors::LaunchError,
};

#[doc(inline)]
pub use self::{interpreter::Interpreter, program::Program};

mod conversions;
mod interpreter;
mod program;

/// A program to run, and where to run it.
///
/// ```
/// # use warden_supervisor::{command::{Invocation, Program}, Interpreter, ProcessDefinition};
/// let def = ProcessDefinition {
///     args: "--port 8080 --name 'my server'".into(),
///     ..ProcessDefinition::new("web", "/srv/web/server")
/// };
/// let invocation = Invocation::from_definition(&def, &Interpreter::default()).unwrap();
/// assert_eq!(
///     invocation.program,
///     Program::Exec {
///         prog: "/srv/web/server".into(),
///         args: vec!["--port".into(), "8080".into(), "--name".into(), "my server".into()],
///     }
/// );
/// assert_eq!(invocation.working_dir, Some("/srv/web".into()));
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Invocation {
	/// The program call.
	pub program: Program,

	/// The working directory for the process, or `None` to inherit the supervisor's.
	pub working_dir: Option<PathBuf>,
}

impl Invocation {
	/// Build the invocation for a definition.
	///
	/// Scripts are wrapped in the given interpreter. The definition's argument string is split
	/// following shell quoting rules.
	pub fn from_definition(
		def: &ProcessDefinition,
		interpreter: &Interpreter,
	) -> Result<Self, LaunchError> {
		let args = shell_words::split(&def.args).map_err(|err| LaunchError::Arguments {
			args: def.args.clone(),
			err,
		})?;

		let program = match def.kind {
			ProcessKind::Executable => Program::Exec {
				prog: def.path.clone(),
				args,
			},
			ProcessKind::Script => Program::Script {
				interpreter: interpreter.clone(),
				script: def.path.clone(),
				args,
			},
		};

		Ok(Self {
			program,
			working_dir: def.working_dir().map(ToOwned::to_owned),
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn script_goes_through_interpreter() {
		let def = ProcessDefinition {
			args: "a \"b c\"".into(),
			..ProcessDefinition::new("s", "/opt/jobs/nightly.sh")
		};
		let inv = Invocation::from_definition(&def, &Interpreter::new("bash")).unwrap();
		assert_eq!(
			inv.program,
			Program::Script {
				interpreter: Interpreter::new("bash"),
				script: "/opt/jobs/nightly.sh".into(),
				args: vec!["a".into(), "b c".into()],
			}
		);
		assert_eq!(inv.to_string(), "bash /opt/jobs/nightly.sh a 'b c'");
	}

	#[test]
	fn unbalanced_quotes() {
		let def = ProcessDefinition {
			args: "--name 'oops".into(),
			..ProcessDefinition::new("x", "/bin/true")
		};
		assert!(matches!(
			Invocation::from_definition(&def, &Interpreter::default()),
			Err(LaunchError::Arguments { .. })
		));
	}

	#[test]
	fn empty_args() {
		let def = ProcessDefinition::new("x", "/bin/true");
		let inv = Invocation::from_definition(&def, &Interpreter::default()).unwrap();
		assert!(inv.program.args().is_empty());
		assert_eq!(inv.to_string(), "/bin/true");
	}
}
