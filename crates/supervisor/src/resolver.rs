//! Child pid resolution for scripts.
//!
//! When a script is launched, the process the supervisor creates is the interpreter. What the user
//! usually wants to see is the process the script runs, so for scripts a probe looks a few times
//! for a child of the interpreter and, when it finds one, makes that the displayed pid.

use std::{sync::Arc, time::Duration};

use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};
use tokio::{sync::mpsc::WeakUnboundedSender, task::spawn_blocking, time::sleep};
use tracing::{debug, trace};

use crate::supervisor::messages::{post, Message};

/// How to look for a script's worker process.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolverConfig {
	/// How many times to look. Zero disables resolution.
	pub attempts: u32,

	/// How long to wait before each look.
	pub interval: Duration,

	/// Process names which are never picked, compared case-insensitively.
	///
	/// On Windows this defaults to the console host and error reporter processes attached to
	/// console programs. Elsewhere it is empty.
	pub skip_names: Vec<String>,
}

impl Default for ResolverConfig {
	fn default() -> Self {
		Self {
			attempts: 5,
			interval: Duration::from_millis(1500),
			skip_names: if cfg!(windows) {
				vec!["conhost.exe".into(), "WerFault.exe".into()]
			} else {
				Vec::new()
			},
		}
	}
}

/// Start probing for a child of `root`, posting a [`Message::ChildFound`] if one turns up.
pub(crate) fn spawn(
	config: Arc<ResolverConfig>,
	id: String,
	root: u32,
	inbox: WeakUnboundedSender<Message>,
) {
	tokio::spawn(async move {
		for attempt in 1..=config.attempts {
			sleep(config.interval).await;

			let probe = config.clone();
			let found = spawn_blocking(move || find_child(root, &probe.skip_names)).await;
			match found {
				Ok(Some(child)) => {
					debug!(%id, %root, %child, %attempt, "found script worker");
					if !post(&inbox, Message::ChildFound { id, root, child }) {
						trace!("supervisor gone, dropping resolved pid");
					}
					return;
				}
				Ok(None) => trace!(%id, %root, %attempt, "no script worker yet"),
				Err(err) => debug!(%id, %root, %err, "process probe failed"),
			}

			if inbox.upgrade().is_none() {
				return;
			}
		}

		debug!(%id, %root, "no script worker found, keeping interpreter pid");
	});
}

/// Find a child process of `parent`, skipping any named in `skip_names`.
///
/// If there are several, the lowest pid is returned, which for a script that has only just
/// started is normally the first thing it launched.
#[must_use]
pub fn find_child(parent: u32, skip_names: &[String]) -> Option<u32> {
	let mut system = System::new();
	system.refresh_processes_specifics(ProcessesToUpdate::All, true, ProcessRefreshKind::new());

	let parent = Pid::from_u32(parent);
	system
		.processes()
		.iter()
		.filter(|(pid, process)| **pid != parent && process.parent() == Some(parent))
		.filter(|(_, process)| {
			!skip_names
				.iter()
				.any(|skip| process.name().eq_ignore_ascii_case(skip))
		})
		.map(|(pid, _)| pid.as_u32())
		.min()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn no_children_of_nonexistent_parent() {
		assert_eq!(find_child(u32::MAX - 1, &[]), None);
	}
}
