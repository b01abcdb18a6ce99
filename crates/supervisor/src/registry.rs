//! The registry: live runtime state of every managed process, keyed by definition id.

use std::{
	collections::HashMap,
	sync::{Mutex, MutexGuard, PoisonError},
};

use tokio::{sync::oneshot, task::JoinHandle};
use tracing::trace;
use warden_events::{ProcessStatus, StatusEvent};

/// Handle to a termination group (a process group or job object).
///
/// Releasing it, explicitly or by dropping it, makes the exit watcher kill every process still in
/// the group. It can only be released once, as releasing consumes it.
#[derive(Debug)]
pub(crate) struct TerminationGroup(oneshot::Sender<()>);

impl TerminationGroup {
	pub fn new(release: oneshot::Sender<()>) -> Self {
		Self(release)
	}

	pub fn release(self) {
		// the watcher may already be done with the group, that's fine
		let _ = self.0.send(());
	}
}

/// Handle to the root process of a launch.
#[derive(Debug)]
pub(crate) struct ProcessHandle {
	pub pid: u32,
	pub instance: u64,
	kill: Option<oneshot::Sender<()>>,
}

impl ProcessHandle {
	pub fn new(pid: u32, instance: u64, kill: oneshot::Sender<()>) -> Self {
		Self {
			pid,
			instance,
			kill: Some(kill),
		}
	}

	/// Ask the exit watcher to force-kill the root process.
	///
	/// Subsequent calls do nothing.
	pub fn terminate(&mut self) {
		if let Some(kill) = self.kill.take() {
			let _ = kill.send(());
		}
	}
}

/// Handle to the task waiting for a process to exit.
#[derive(Debug)]
pub(crate) struct ExitWatch(JoinHandle<()>);

impl ExitWatch {
	pub fn new(task: JoinHandle<()>) -> Self {
		Self(task)
	}

	/// Stop watching without waiting for the exit.
	///
	/// The watcher owns the child, so this also drops it, which kills it.
	pub fn teardown(self) {
		self.0.abort();
	}
}

/// Everything acquired by one successful launch.
#[derive(Debug)]
pub(crate) struct Handles {
	pub process: ProcessHandle,
	pub group: TerminationGroup,
	pub watch: ExitWatch,
}

/// Runtime state for one managed process.
#[derive(Debug, Default)]
pub(crate) struct RuntimeEntry {
	pub status: ProcessStatus,

	/// The process id shown for this entry: the root process, or for scripts the interpreter's
	/// child once found. Zero when nothing runs.
	pub pid: u32,

	pub process: Option<ProcessHandle>,
	pub group: Option<TerminationGroup>,
	pub watch: Option<ExitWatch>,

	/// Set by a stop request and cleared by a start request. While set, neither a pending delay
	/// nor an exit may lead to a launch.
	pub stop_requested: bool,

	/// Bumped by every start and stop request, so that a delay scheduled before the latest of
	/// these can be recognised as superseded when it elapses.
	pub generation: u64,
}

impl RuntimeEntry {
	pub fn is_live(&self) -> bool {
		self.process.is_some()
	}

	pub fn event(&self, id: &str) -> StatusEvent {
		StatusEvent::new(id, self.status, self.pid)
	}

	/// Store the handles of a new launch, first releasing any left over from a previous one.
	pub fn install(&mut self, handles: Handles) {
		if self.is_live() {
			trace!(pid=%self.pid, "tearing down stale handles");
			self.teardown();
		}

		self.pid = handles.process.pid;
		self.process = Some(handles.process);
		self.group = Some(handles.group);
		self.watch = Some(handles.watch);
	}

	/// Release handles after the exit watcher has fired.
	///
	/// The group is released so the watcher can clear out anything the process left behind.
	pub fn release(&mut self) {
		self.process = None;
		self.watch = None;
		if let Some(group) = self.group.take() {
			group.release();
		}
		self.pid = 0;
	}

	/// Release handles and stop watching.
	pub fn teardown(&mut self) {
		if let Some(mut process) = self.process.take() {
			process.terminate();
		}
		if let Some(group) = self.group.take() {
			group.release();
		}
		if let Some(watch) = self.watch.take() {
			watch.teardown();
		}
		self.pid = 0;
	}
}

/// Runtime entries, keyed by definition id.
///
/// Entries are created lazily and never removed: an id whose definition went away keeps its
/// last known state, which is `Stopped` once it's been stopped.
#[derive(Debug, Default)]
pub(crate) struct Registry {
	entries: HashMap<String, RuntimeEntry>,
}

impl Registry {
	/// Lock a shared registry, ignoring poisoning.
	pub fn lock(shared: &Mutex<Self>) -> MutexGuard<'_, Self> {
		shared.lock().unwrap_or_else(PoisonError::into_inner)
	}

	/// The entry for an id, creating a stopped one if needed.
	pub fn ensure(&mut self, id: &str) -> &mut RuntimeEntry {
		self.entries.entry(id.to_owned()).or_default()
	}

	pub fn get(&self, id: &str) -> Option<&RuntimeEntry> {
		self.entries.get(id)
	}

	pub fn get_mut(&mut self, id: &str) -> Option<&mut RuntimeEntry> {
		self.entries.get_mut(id)
	}

	pub fn status(&self, id: &str) -> ProcessStatus {
		self.get(id).map_or(ProcessStatus::Stopped, |entry| entry.status)
	}

	pub fn displayed_pid(&self, id: &str) -> u32 {
		self.get(id).map_or(0, |entry| entry.pid)
	}

	/// All known ids, sorted.
	pub fn ids(&self) -> Vec<String> {
		let mut ids: Vec<String> = self.entries.keys().cloned().collect();
		ids.sort_unstable();
		ids
	}

	pub fn any_live(&self) -> bool {
		self.entries.values().any(RuntimeEntry::is_live)
	}

	/// Current status of every entry, sorted by id.
	pub fn snapshot(&self) -> Vec<StatusEvent> {
		let mut events: Vec<StatusEvent> = self
			.entries
			.iter()
			.map(|(id, entry)| entry.event(id))
			.collect();
		events.sort_unstable_by(|a, b| a.id.cmp(&b.id));
		events
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn handles(pid: u32, instance: u64) -> (Handles, oneshot::Receiver<()>, oneshot::Receiver<()>) {
		let (kill, kill_rx) = oneshot::channel();
		let (group, group_rx) = oneshot::channel();
		let watch = tokio::spawn(std::future::pending());
		(
			Handles {
				process: ProcessHandle::new(pid, instance, kill),
				group: TerminationGroup::new(group),
				watch: ExitWatch::new(watch),
			},
			kill_rx,
			group_rx,
		)
	}

	#[test]
	fn unknown_ids_are_stopped() {
		let registry = Registry::default();
		assert_eq!(registry.status("nope"), ProcessStatus::Stopped);
		assert_eq!(registry.displayed_pid("nope"), 0);
		assert!(registry.snapshot().is_empty());
	}

	#[test]
	fn snapshot_is_sorted() {
		let mut registry = Registry::default();
		registry.ensure("b").status = ProcessStatus::Running;
		registry.ensure("a");
		registry.ensure("c").status = ProcessStatus::Failed;

		let ids: Vec<_> = registry.snapshot().into_iter().map(|e| e.id).collect();
		assert_eq!(ids, ["a", "b", "c"]);
		assert_eq!(registry.ids(), ["a", "b", "c"]);
	}

	#[tokio::test]
	async fn release_after_exit() {
		let mut registry = Registry::default();
		let (handles, mut kill_rx, group_rx) = handles(42, 1);
		let entry = registry.ensure("p");
		entry.install(handles);
		assert_eq!(entry.pid, 42);
		assert!(registry.any_live());

		let entry = registry.ensure("p");
		entry.release();
		assert_eq!(entry.pid, 0);
		assert!(!entry.is_live());
		assert!(entry.group.is_none());
		assert!(!registry.any_live());

		// group was released, root was not explicitly killed
		assert_eq!(group_rx.await, Ok(()));
		assert!(kill_rx.try_recv().is_err());
	}

	#[tokio::test]
	async fn install_replaces_stale_handles() {
		let mut registry = Registry::default();
		let (first, kill_rx, group_rx) = handles(10, 1);
		let (second, _kill_rx, _group_rx) = handles(11, 2);

		let entry = registry.ensure("p");
		entry.install(first);
		entry.install(second);

		assert_eq!(entry.pid, 11);
		assert_eq!(entry.process.as_ref().map(|p| p.instance), Some(2));
		assert_eq!(kill_rx.await, Ok(()));
		assert_eq!(group_rx.await, Ok(()));
	}
}
