//! Exit watchers: one task per launched process, turning its exit into a message.

use process_wrap::tokio::ChildWrapper;
use tokio::sync::{mpsc::WeakUnboundedSender, oneshot};
use tracing::{debug, trace, warn};
use warden_events::ProcessEnd;

use crate::supervisor::messages::{post, ExitNotice, Message};

/// Own a child until it exits, then tell the coordinator.
///
/// - `kill` asks for the root process alone to be killed;
/// - `group` is the termination group's release: once it fires (or its sender is dropped), the
///   whole group is killed.
///
/// After the exit is posted, the watcher stays around until the group is released, then kills
/// whatever is left in it.
pub(crate) async fn watch(
	id: String,
	instance: u64,
	mut child: Box<dyn ChildWrapper>,
	mut kill: oneshot::Receiver<()>,
	mut group: oneshot::Receiver<()>,
	inbox: WeakUnboundedSender<Message>,
) {
	let pid = child.id().unwrap_or_default();
	let mut kill_open = true;
	let mut group_open = true;

	let status = loop {
		tokio::select! {
			status = child.wait() => break status,
			request = &mut kill, if kill_open => {
				kill_open = false;
				if request.is_ok() {
					debug!(%id, %pid, "killing root process");
					#[cfg(unix)]
					kill_root(pid);
					#[cfg(not(unix))]
					{
						if let Err(err) = child.start_kill() {
							debug!(%id, %pid, %err, "could not kill root process");
						}
					}
				}
			}
			_ = &mut group, if group_open => {
				group_open = false;
				debug!(%id, %pid, "killing termination group");
				if let Err(err) = child.start_kill() {
					debug!(%id, %pid, %err, "could not kill termination group");
				}
			}
		}
	};

	let end = match status {
		Ok(status) => Some(ProcessEnd::from(status)),
		Err(err) => {
			warn!(%id, %pid, %err, "could not read exit status");
			None
		}
	};

	debug!(%id, %pid, ?end, "process exited");
	if !post(
		&inbox,
		Message::Exited(ExitNotice {
			id: id.clone(),
			instance,
			pid,
			end,
		}),
	) {
		trace!(%id, "supervisor gone, exit not delivered");
	}

	if group_open {
		// sender dropped counts as a release
		let _ = group.await;
	}

	if let Err(err) = child.start_kill() {
		trace!(%id, %pid, %err, "nothing left in termination group");
	}
}

#[cfg(unix)]
fn kill_root(pid: u32) {
	use nix::{
		sys::signal::{kill, Signal},
		unistd::Pid,
	};

	// the child is only reaped by wait(), so until then its pid can't have been reused
	let Ok(raw) = i32::try_from(pid) else {
		return;
	};

	if let Err(err) = kill(Pid::from_raw(raw), Signal::SIGKILL) {
		debug!(%pid, %err, "could not kill root process");
	}
}
