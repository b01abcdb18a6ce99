//! Process definitions: what to run, and how to look after it.

use std::{
	ffi::OsStr,
	path::{Path, PathBuf},
	time::Duration,
};

/// How a definition's path is run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ProcessKind {
	/// The path is an executable, run directly.
	#[default]
	Executable,

	/// The path is a script, run through the supervisor's [`Interpreter`](crate::Interpreter).
	///
	/// As the process the supervisor creates is the interpreter, the process id shown for a script
	/// is resolved to the interpreter's child shortly after launch, when there is one.
	Script,
}

impl ProcessKind {
	/// Guess the kind from a path's extension.
	///
	/// `.bat`, `.cmd`, and `.sh` files are scripts; everything else is an executable.
	pub fn from_path(path: impl AsRef<Path>) -> Self {
		match path
			.as_ref()
			.extension()
			.and_then(OsStr::to_str)
			.map(str::to_ascii_lowercase)
			.as_deref()
		{
			Some("bat" | "cmd" | "sh") => Self::Script,
			_ => Self::Executable,
		}
	}
}

/// A managed process, as described by the configuration.
///
/// The supervisor never modifies definitions; it is given the current list through
/// [`Supervisor::sync_definitions`](crate::Supervisor::sync_definitions) and consults it whenever
/// it needs to launch a process or decide whether to relaunch one.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ProcessDefinition {
	/// Stable, unique identifier.
	pub id: String,

	/// Path to the executable or script.
	///
	/// Its parent directory is used as the working directory of the process, so that relative
	/// paths used by the program resolve next to it.
	pub path: PathBuf,

	/// Arguments, as a single string.
	///
	/// This is split following shell quoting rules, but is not otherwise interpreted by a shell:
	/// there is no expansion of variables or globs.
	pub args: String,

	/// Whether `path` is run directly or through the interpreter.
	pub kind: ProcessKind,

	/// How long to wait after a start request before launching.
	pub start_delay: Duration,

	/// Whether to relaunch the process when it exits without having been asked to.
	pub guard: bool,

	/// How long to wait before such a relaunch.
	pub guard_delay: Duration,

	/// Whether the process is started by [`Supervisor::start_all`](crate::Supervisor::start_all).
	pub bulk_start: bool,
}

impl ProcessDefinition {
	/// A definition with defaults: kind guessed from the path, no start delay, guarded with a
	/// three second delay, and included in bulk starts.
	pub fn new(id: impl Into<String>, path: impl Into<PathBuf>) -> Self {
		let path = path.into();
		Self {
			id: id.into(),
			kind: ProcessKind::from_path(&path),
			path,
			args: String::new(),
			start_delay: Duration::ZERO,
			guard: true,
			guard_delay: Duration::from_secs(3),
			bulk_start: true,
		}
	}

	/// The directory the process should run in, if the path has one.
	pub fn working_dir(&self) -> Option<&Path> {
		self.path
			.parent()
			.filter(|dir| !dir.as_os_str().is_empty())
	}
}
