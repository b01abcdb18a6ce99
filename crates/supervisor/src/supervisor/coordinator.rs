use std::{
	sync::{Arc, Mutex, MutexGuard},
	time::Duration,
};

use tokio::{
	sync::{
		broadcast,
		mpsc::{UnboundedReceiver, WeakUnboundedSender},
		oneshot,
	},
	time::timeout,
};
use tracing::{debug, info, trace, warn};
use warden_events::{ProcessStatus, StatusEvent};

use crate::{
	bridge,
	command::{Interpreter, Invocation},
	definition::{ProcessDefinition, ProcessKind},
	errors::LaunchError,
	launch,
	registry::{ExitWatch, Handles, ProcessHandle, Registry, TerminationGroup},
	resolver::{self, ResolverConfig},
	scheduler::{self, DelayKind},
};

use super::{
	messages::{Control, ControlMessage, ExitNotice, Message},
	SupervisorConfig,
};

/// The single writer of the registry.
pub(super) struct Coordinator {
	registry: Arc<Mutex<Registry>>,
	definitions: Vec<ProcessDefinition>,
	interpreter: Interpreter,
	resolver: Arc<ResolverConfig>,
	shutdown_grace: Duration,
	inbox: WeakUnboundedSender<Message>,
	events: broadcast::Sender<StatusEvent>,
	launches: u64,
}

impl Coordinator {
	pub fn new(
		config: SupervisorConfig,
		registry: Arc<Mutex<Registry>>,
		inbox: WeakUnboundedSender<Message>,
		events: broadcast::Sender<StatusEvent>,
	) -> Self {
		Self {
			registry,
			definitions: Vec::new(),
			interpreter: config.interpreter,
			resolver: Arc::new(config.resolver),
			shutdown_grace: config.shutdown_grace,
			inbox,
			events,
			launches: 0,
		}
	}

	pub async fn run(mut self, mut receiver: UnboundedReceiver<Message>) {
		debug!("supervisor coordinator running");

		while let Some(message) = receiver.recv().await {
			trace!(?message, "handling message");
			match message {
				Message::Control(ControlMessage {
					control: Control::Shutdown,
					done,
				}) => {
					self.shutdown(&mut receiver).await;
					let _ = done.send(true);
					break;
				}
				message => self.handle(message),
			}
		}

		debug!("supervisor coordinator stopped");
	}

	fn handle(&mut self, message: Message) {
		match message {
			Message::Control(ControlMessage { control, done }) => {
				let outcome = self.control(control);
				let _ = done.send(outcome);
			}
			Message::Exited(notice) => self.exited(notice),
			Message::DelayElapsed {
				id,
				kind,
				generation,
			} => self.delay_elapsed(&id, kind, generation),
			Message::ChildFound { id, root, child } => self.child_found(&id, root, child),
		}
	}

	fn control(&mut self, control: Control) -> bool {
		match control {
			Control::Start(id) => self.start(&id),
			Control::Stop(id) => self.stop(&id),
			Control::StartAll => {
				self.start_all();
				true
			}
			Control::StopAll => {
				self.stop_all();
				true
			}
			Control::Sync(definitions) => {
				self.sync(definitions);
				true
			}
			Control::Forget(id) => self.forget(&id),
			Control::Shutdown => false,
		}
	}

	fn registry(&self) -> MutexGuard<'_, Registry> {
		Registry::lock(&self.registry)
	}

	fn definition(&self, id: &str) -> Option<&ProcessDefinition> {
		self.definitions.iter().find(|def| def.id == id)
	}

	fn emit(&self, event: StatusEvent) {
		trace!(?event, "status changed");
		if self.events.send(event).is_err() {
			trace!("no status subscribers");
		}
	}

	fn sync(&mut self, definitions: Vec<ProcessDefinition>) {
		debug!(count=%definitions.len(), "updating process definitions");
		self.definitions = definitions;
		self.ensure_entries();
	}

	fn ensure_entries(&self) {
		let mut registry = self.registry();
		for def in &self.definitions {
			registry.ensure(&def.id);
		}
	}

	fn forget(&mut self, id: &str) -> bool {
		let stopped = self.stop(id);
		let before = self.definitions.len();
		self.definitions.retain(|def| def.id != id);
		let removed = self.definitions.len() != before;
		debug!(%id, %stopped, %removed, "forgot process");
		stopped || removed
	}

	fn start(&mut self, id: &str) -> bool {
		let Some(delay) = self.definition(id).map(|def| def.start_delay) else {
			debug!(%id, "start: no such process");
			return false;
		};

		let (event, generation) = {
			let mut registry = self.registry();
			let entry = registry.ensure(id);
			if entry.status.is_busy() {
				debug!(%id, status=%entry.status, "start: already started");
				return false;
			}

			entry.stop_requested = false;
			entry.generation += 1;
			entry.status = ProcessStatus::Starting;
			(entry.event(id), entry.generation)
		};
		self.emit(event);

		if delay.is_zero() {
			self.launch(id);
		} else {
			info!(%id, ?delay, "start delayed");
			scheduler::schedule(
				self.inbox.clone(),
				id.to_owned(),
				DelayKind::Start,
				delay,
				generation,
			);
		}

		true
	}

	fn start_all(&mut self) {
		self.ensure_entries();
		let ids: Vec<String> = self
			.definitions
			.iter()
			.filter(|def| def.bulk_start)
			.map(|def| def.id.clone())
			.collect();

		info!(count=%ids.len(), "starting all enabled processes");
		for id in ids {
			self.start(&id);
		}
	}

	fn stop(&mut self, id: &str) -> bool {
		let event = {
			let mut registry = self.registry();
			let Some(entry) = registry.get_mut(id) else {
				debug!(%id, "stop: no such process");
				return false;
			};

			entry.stop_requested = true;
			entry.generation += 1;

			// moved out before release so the exit path finds nothing to release again
			let group = entry.group.take();
			if let Some(process) = entry.process.as_mut() {
				process.terminate();
			}
			if let Some(group) = group {
				group.release();
			}

			if entry.is_live() {
				info!(%id, pid=%entry.pid, "stopping process");
				None
			} else {
				info!(%id, "process stopped");
				entry.status = ProcessStatus::Stopped;
				entry.pid = 0;
				Some(entry.event(id))
			}
		};

		if let Some(event) = event {
			self.emit(event);
		}

		true
	}

	fn stop_all(&mut self) {
		let ids = self.registry().ids();
		info!(count=%ids.len(), "stopping all processes");
		for id in ids {
			self.stop(&id);
		}
	}

	fn launch(&mut self, id: &str) {
		let Some(def) = self.definition(id).cloned() else {
			let err = LaunchError::UnknownDefinition { id: id.to_owned() };
			warn!(%err, "launch abandoned");
			let event = {
				let mut registry = self.registry();
				let entry = registry.ensure(id);
				entry.status = ProcessStatus::Stopped;
				entry.event(id)
			};
			self.emit(event);
			return;
		};

		let spawned = Invocation::from_definition(&def, &self.interpreter).and_then(|invocation| {
			info!(%id, command=%invocation, "launching process");
			launch::spawn(&invocation)
		});

		let (child, pid) = match spawned {
			Ok(spawned) => spawned,
			Err(err) => {
				warn!(%id, %err, "launch failed");
				let event = {
					let mut registry = self.registry();
					let entry = registry.ensure(id);
					entry.teardown();
					entry.status = ProcessStatus::Failed;
					entry.event(id)
				};
				self.emit(event);
				return;
			}
		};

		self.launches += 1;
		let instance = self.launches;
		let (kill, kill_rx) = oneshot::channel();
		let (group, group_rx) = oneshot::channel();
		let watch = tokio::spawn(bridge::watch(
			id.to_owned(),
			instance,
			child,
			kill_rx,
			group_rx,
			self.inbox.clone(),
		));

		let event = {
			let mut registry = self.registry();
			let entry = registry.ensure(id);
			entry.install(Handles {
				process: ProcessHandle::new(pid, instance, kill),
				group: TerminationGroup::new(group),
				watch: ExitWatch::new(watch),
			});
			entry.status = ProcessStatus::Running;
			entry.event(id)
		};
		info!(%id, %pid, %instance, "process running");
		self.emit(event);

		if def.kind == ProcessKind::Script && self.resolver.attempts > 0 {
			resolver::spawn(
				self.resolver.clone(),
				id.to_owned(),
				pid,
				self.inbox.clone(),
			);
		}
	}

	fn exited(&mut self, notice: ExitNotice) {
		let ExitNotice {
			id,
			instance,
			pid,
			end,
		} = notice;
		let guard_delay = self
			.definition(&id)
			.filter(|def| def.guard)
			.map(|def| def.guard_delay);

		let (event, relaunch) = {
			let mut registry = self.registry();
			let Some(entry) = registry.get_mut(&id) else {
				return;
			};

			if entry.process.as_ref().map(|process| process.instance) != Some(instance) {
				debug!(%id, %pid, %instance, "exit of a replaced process, ignoring");
				return;
			}

			entry.release();
			match end {
				Some(end) => info!(%id, %pid, code=%end.code(), ?end, "process exited"),
				None => info!(%id, %pid, "process exited with unknown status"),
			}

			let relaunch = guard_delay
				.filter(|_| !entry.stop_requested)
				.map(|delay| (delay, entry.generation));
			entry.status = if relaunch.is_some() {
				ProcessStatus::Restarting
			} else {
				ProcessStatus::Stopped
			};
			(entry.event(&id), relaunch)
		};
		self.emit(event);

		if let Some((delay, generation)) = relaunch {
			info!(%id, ?delay, "guard: relaunching after delay");
			scheduler::schedule(self.inbox.clone(), id, DelayKind::Guard, delay, generation);
		}
	}

	fn delay_elapsed(&mut self, id: &str, kind: DelayKind, generation: u64) {
		{
			let registry = self.registry();
			let Some(entry) = registry.get(id) else {
				return;
			};

			// a stop bumps the generation and has already reported Stopped
			if entry.stop_requested
				|| entry.generation != generation
				|| !matches!(
					entry.status,
					ProcessStatus::Starting | ProcessStatus::Restarting
				) {
				debug!(%id, ?kind, %generation, current=%entry.generation, "delayed launch superseded");
				return;
			}
		}

		debug!(%id, ?kind, "delay elapsed");
		self.launch(id);
	}

	fn child_found(&self, id: &str, root: u32, child: u32) {
		let event = {
			let mut registry = self.registry();
			let Some(entry) = registry.get_mut(id) else {
				return;
			};

			if !entry.is_live() || entry.pid != root {
				trace!(%id, %root, %child, "script worker found too late");
				return;
			}

			entry.pid = child;
			entry.event(id)
		};

		info!(%id, %root, %child, "showing script worker pid");
		self.emit(event);
	}

	async fn shutdown(&mut self, receiver: &mut UnboundedReceiver<Message>) {
		info!("shutting down");
		self.stop_all();

		let grace = self.shutdown_grace;
		let drain = async {
			loop {
				let live = self.registry().any_live();
				if !live {
					break;
				}

				let Some(message) = receiver.recv().await else {
					break;
				};

				match message {
					Message::Exited(notice) => self.exited(notice),
					Message::Control(ControlMessage { done, .. }) => {
						let _ = done.send(false);
					}
					Message::DelayElapsed { .. } | Message::ChildFound { .. } => {}
				}
			}
		};

		if timeout(grace, drain).await.is_err() {
			warn!(?grace, "some processes did not exit in time");
		}
	}
}
