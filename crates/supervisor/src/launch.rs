//! Spawning processes into termination groups.

use process_wrap::tokio::{ChildWrapper, CommandWrap, KillOnDrop};
use tracing::debug;

use crate::{command::Invocation, errors::LaunchError};

/// Spawn an invocation as the leader of a new termination group.
///
/// On Unix the process leads a new process group, with its signal mask reset. On Windows it is
/// created suspended, assigned to a new job object which kills everything in it when closed, then
/// resumed, so that nothing it spawns can escape the job.
///
/// Returns the child and its pid.
pub(crate) fn spawn(invocation: &Invocation) -> Result<(Box<dyn ChildWrapper>, u32), LaunchError> {
	let mut command = CommandWrap::from(invocation.to_spawnable());

	#[cfg(unix)]
	command
		.wrap(process_wrap::tokio::ProcessGroup::leader())
		.wrap(process_wrap::tokio::ResetSigmask);

	#[cfg(windows)]
	command.wrap(process_wrap::tokio::JobObject);

	command.wrap(KillOnDrop);

	debug!(command=%invocation, working_dir=?invocation.working_dir, "spawning process");
	let child = command.spawn().map_err(|err| LaunchError::Spawn {
		command: invocation.to_string(),
		err,
	})?;

	let pid = child.id().ok_or_else(|| LaunchError::Vanished {
		command: invocation.to_string(),
	})?;

	debug!(%pid, "spawned process");
	Ok((child, pid))
}
