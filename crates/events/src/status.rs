use std::fmt;

/// Lifecycle status of a managed process.
///
/// Transitions:
///
/// - `Stopped` to `Starting` on a start request;
/// - `Starting` to `Running` once spawned, or to `Failed` if the OS refuses;
/// - `Running` to `Restarting` when the process exits on its own and is guarded;
/// - `Restarting` to `Running` once relaunched;
/// - anything to `Stopped` on a stop request, or on an unguarded exit.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ProcessStatus {
	/// Not running, and nothing is scheduled.
	#[default]
	Stopped,

	/// A start was requested and the process is waiting out its start delay, or being spawned.
	Starting,

	/// The process is alive.
	Running,

	/// The process exited on its own and a guarded relaunch is pending.
	Restarting,

	/// The last launch attempt was rejected by the OS.
	Failed,
}

impl ProcessStatus {
	/// The lowercase name of the status, as used on the wire.
	#[must_use]
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Stopped => "stopped",
			Self::Starting => "starting",
			Self::Running => "running",
			Self::Restarting => "restarting",
			Self::Failed => "failed",
		}
	}

	/// Whether a start request should be refused in this status.
	#[must_use]
	pub const fn is_busy(self) -> bool {
		matches!(self, Self::Starting | Self::Running)
	}
}

impl fmt::Display for ProcessStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// A status change notification for one managed process.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StatusEvent {
	/// Identifier of the process definition.
	pub id: String,

	/// Status after the transition.
	pub status: ProcessStatus,

	/// The process id to display for it, or 0 when nothing is running.
	///
	/// For scripts this may be the interpreter's pid at first, then the script's worker once the
	/// supervisor has found it.
	pub pid: u32,
}

impl StatusEvent {
	/// Shorthand constructor.
	pub fn new(id: impl Into<String>, status: ProcessStatus, pid: u32) -> Self {
		Self {
			id: id.into(),
			status,
			pid,
		}
	}
}
