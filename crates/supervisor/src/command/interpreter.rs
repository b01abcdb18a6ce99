use std::{borrow::Cow, ffi::OsStr, path::PathBuf};

/// How to call the interpreter used to run scripts.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Interpreter {
	/// Path or name of the interpreter.
	pub prog: PathBuf,

	/// Additional options to pass to the interpreter.
	///
	/// These will be inserted before the `program_option` immediately preceding the script path.
	pub options: Vec<String>,

	/// The option which precedes the script path, if any.
	///
	/// Unix shells take a script path as their first operand, so this is usually `None` there. On
	/// Windows, CMD.EXE needs `/C`.
	pub program_option: Option<Cow<'static, OsStr>>,
}

impl Interpreter {
	/// An interpreter which is given the script path as its first operand.
	pub fn new(name: impl Into<PathBuf>) -> Self {
		Self {
			prog: name.into(),
			options: Vec::new(),
			program_option: None,
		}
	}

	/// Shorthand for the CMD.EXE interpreter.
	#[must_use]
	pub fn cmd() -> Self {
		Self {
			prog: "CMD.EXE".into(),
			options: Vec::new(),
			program_option: Some(Cow::Borrowed(OsStr::new("/C"))),
		}
	}
}

impl Default for Interpreter {
	/// `sh` on Unix, CMD.EXE on Windows.
	fn default() -> Self {
		if cfg!(windows) {
			Self::cmd()
		} else {
			Self::new("sh")
		}
	}
}
