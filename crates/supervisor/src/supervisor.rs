use std::{
	sync::{Arc, Mutex},
	time::Duration,
};

use tokio::{
	sync::{broadcast, mpsc, oneshot},
	task::JoinHandle,
};
use tracing::debug;
use warden_events::{ProcessStatus, StatusEvent};

use crate::{
	command::Interpreter, definition::ProcessDefinition, registry::Registry,
	resolver::ResolverConfig,
};

use self::{
	coordinator::Coordinator,
	messages::{Control, ControlMessage, Message},
};

mod coordinator;
pub(crate) mod messages;

/// Supervisor settings which apply to every process.
#[derive(Clone, Debug)]
pub struct SupervisorConfig {
	/// How scripts are run.
	pub interpreter: Interpreter,

	/// How script worker pids are found.
	pub resolver: ResolverConfig,

	/// How many status events a subscriber may lag behind before it starts missing some.
	pub event_capacity: usize,

	/// How long [`Supervisor::shutdown`] waits for stopped processes to exit.
	pub shutdown_grace: Duration,
}

impl Default for SupervisorConfig {
	fn default() -> Self {
		Self {
			interpreter: Interpreter::default(),
			resolver: ResolverConfig::default(),
			event_capacity: 256,
			shutdown_grace: Duration::from_secs(5),
		}
	}
}

/// A handle to the supervisor.
///
/// This is cheap to clone; all clones control the same coordinator. Requests are processed one at
/// a time, in the order they're made, and each method resolves once its request has been applied.
/// Queries read the current state directly and don't go through the coordinator.
///
/// When the last handle is dropped, the coordinator stops and every managed process is killed.
#[derive(Clone, Debug)]
pub struct Supervisor {
	registry: Arc<Mutex<Registry>>,
	inbox: mpsc::UnboundedSender<Message>,
	events: broadcast::Sender<StatusEvent>,
}

impl Supervisor {
	/// Start a supervisor on the current Tokio runtime.
	///
	/// Returns the handle and the coordinator task, which finishes after [`shutdown`] or once every
	/// handle is dropped.
	///
	/// [`shutdown`]: Supervisor::shutdown
	#[must_use]
	pub fn spawn(config: SupervisorConfig) -> (Self, JoinHandle<()>) {
		let registry = Arc::new(Mutex::new(Registry::default()));
		let (inbox, receiver) = mpsc::unbounded_channel();
		let (events, _) = broadcast::channel(config.event_capacity.max(1));

		let coordinator = Coordinator::new(
			config,
			registry.clone(),
			inbox.downgrade(),
			events.clone(),
		);
		let task = tokio::spawn(coordinator.run(receiver));

		(
			Self {
				registry,
				inbox,
				events,
			},
			task,
		)
	}

	async fn control(&self, control: Control) -> bool {
		let (done, reply) = oneshot::channel();
		if self
			.inbox
			.send(Message::Control(ControlMessage { control, done }))
			.is_err()
		{
			debug!("supervisor is gone, request dropped");
			return false;
		}

		reply.await.unwrap_or(false)
	}

	/// Replace the process definitions.
	///
	/// Every definition gets a runtime entry (initially stopped); entries that already exist are
	/// left untouched, including those whose definition is no longer present.
	pub async fn sync_definitions(&self, definitions: Vec<ProcessDefinition>) {
		self.control(Control::Sync(definitions)).await;
	}

	/// Stop a process and drop its definition.
	///
	/// Returns false if the id was neither defined nor known.
	pub async fn forget_definition(&self, id: impl Into<String>) -> bool {
		self.control(Control::Forget(id.into())).await
	}

	/// Request that a process start.
	///
	/// Returns false without doing anything if there's no such definition, or if the process is
	/// already starting or running. Otherwise it goes to `Starting`, and is launched once its start
	/// delay has passed.
	pub async fn start(&self, id: impl Into<String>) -> bool {
		self.control(Control::Start(id.into())).await
	}

	/// Request that a process stop.
	///
	/// This kills the process and everything it spawned, and cancels any pending launch, including
	/// a guarded relaunch. Returns false if the id is unknown.
	pub async fn stop(&self, id: impl Into<String>) -> bool {
		self.control(Control::Stop(id.into())).await
	}

	/// Start every process whose definition enables bulk starting.
	pub async fn start_all(&self) {
		self.control(Control::StartAll).await;
	}

	/// Stop every known process.
	pub async fn stop_all(&self) {
		self.control(Control::StopAll).await;
	}

	/// Stop everything and wind down the coordinator.
	///
	/// This resolves once every process has exited, or once the configured grace period has passed.
	/// Further requests on any handle return false.
	pub async fn shutdown(&self) {
		self.control(Control::Shutdown).await;
	}

	/// Current status of a process. Unknown ids are `Stopped`.
	#[must_use]
	pub fn status(&self, id: &str) -> ProcessStatus {
		Registry::lock(&self.registry).status(id)
	}

	/// The process id shown for a process, or 0 if nothing is running.
	#[must_use]
	pub fn displayed_pid(&self, id: &str) -> u32 {
		Registry::lock(&self.registry).displayed_pid(id)
	}

	/// Current status of every known process, sorted by id.
	#[must_use]
	pub fn snapshot(&self) -> Vec<StatusEvent> {
		Registry::lock(&self.registry).snapshot()
	}

	/// Subscribe to status events.
	///
	/// Events are delivered in the order the transitions happened. Only events sent after this call
	/// are received; use [`snapshot`](Supervisor::snapshot) for the current state.
	#[must_use]
	pub fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
		self.events.subscribe()
	}
}
