//! The control transport: JSON messages in, JSON messages out.

use serde::{Deserialize, Serialize};
use tokio::{
	io::{AsyncWrite, AsyncWriteExt},
	sync::{
		broadcast::{self, error::RecvError},
		mpsc,
	},
};
use tracing::{debug, info, trace, warn};
use warden_events::{ProcessStatus, StatusEvent};
use warden_supervisor::Supervisor;

use crate::config::{new_id, type_from_path, ConfigStore, ProcessConfig};

/// An incoming message.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Request {
	GetProcessList,
	StartProcess {
		#[serde(default)]
		id: String,
	},
	StopProcess {
		#[serde(default)]
		id: String,
	},
	StartAll,
	StopAll,
	AddProcess {
		#[serde(default)]
		process: ProcessPatch,
	},
	UpdateProcess {
		#[serde(default)]
		process: ProcessPatch,
	},
	DeleteProcess {
		#[serde(default)]
		id: String,
	},
	GetConfig,
	SaveConfig {
		#[serde(default)]
		config: ConfigPatch,
	},
}

/// Fields of a process entry to set; absent fields are left as they are.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProcessPatch {
	pub id: Option<String>,
	pub name: Option<String>,
	pub path: Option<String>,
	#[serde(rename = "type")]
	pub kind: Option<String>,
	pub args: Option<String>,
	pub delay_seconds: Option<i64>,
	pub guard_enabled: Option<bool>,
	pub guard_delay_seconds: Option<i64>,
	pub enabled: Option<bool>,
}

impl ProcessPatch {
	fn apply(self, process: &mut ProcessConfig) {
		macro_rules! set {
			($($field:ident),+) => {
				$(if let Some(value) = self.$field {
					process.$field = value;
				})+
			};
		}

		set!(
			name,
			path,
			kind,
			args,
			delay_seconds,
			guard_enabled,
			guard_delay_seconds,
			enabled
		);
	}
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConfigPatch {
	pub auto_start_on_open: Option<bool>,
}

/// An outgoing message.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Response {
	ProcessListResponse { processes: Vec<ProcessView> },
	ProcessStatusChanged(StatusEvent),
	ConfigResponse {
		#[serde(rename = "autoStartOnOpen")]
		auto_start_on_open: bool,
	},
}

/// A process entry with its live status.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct ProcessView {
	#[serde(flatten)]
	pub config: ProcessConfig,
	pub status: ProcessStatus,
	pub pid: u32,
}

/// Applies requests to the configuration and the supervisor.
#[derive(Debug)]
pub struct Router {
	supervisor: Supervisor,
	store: ConfigStore,
}

impl Router {
	#[must_use]
	pub const fn new(supervisor: Supervisor, store: ConfigStore) -> Self {
		Self { supervisor, store }
	}

	#[must_use]
	pub const fn store(&self) -> &ConfigStore {
		&self.store
	}

	/// Handle one line of input.
	///
	/// Malformed lines and unknown actions are logged and otherwise ignored.
	pub async fn dispatch(&mut self, line: &str) -> Vec<Response> {
		let line = line.trim();
		if line.is_empty() {
			return Vec::new();
		}

		match serde_json::from_str::<Request>(line) {
			Ok(request) => self.handle(request).await,
			Err(err) => {
				warn!(%err, %line, "ignoring malformed message");
				Vec::new()
			}
		}
	}

	pub async fn handle(&mut self, request: Request) -> Vec<Response> {
		debug!(?request, "handling request");
		match request {
			Request::StartProcess { id }
			| Request::StopProcess { id }
			| Request::DeleteProcess { id }
				if id.is_empty() =>
			{
				warn!("ignoring request without an id");
				Vec::new()
			}
			Request::GetProcessList => vec![self.process_list()],
			Request::StartProcess { id } => {
				self.sync().await;
				self.supervisor.start(id).await;
				Vec::new()
			}
			Request::StopProcess { id } => {
				self.supervisor.stop(id).await;
				Vec::new()
			}
			Request::StartAll => {
				self.sync().await;
				self.supervisor.start_all().await;
				Vec::new()
			}
			Request::StopAll => {
				self.supervisor.stop_all().await;
				Vec::new()
			}
			Request::AddProcess { process } => {
				let mut entry = ProcessConfig::default();
				process.apply(&mut entry);
				entry.id = new_id();
				if entry.kind.is_empty() {
					entry.kind = type_from_path(&entry.path).into();
				}

				info!(id=%entry.id, path=%entry.path, "adding process");
				self.store.config_mut().processes.push(entry);
				self.save().await;
				self.sync().await;
				vec![self.process_list()]
			}
			Request::UpdateProcess { process } => {
				let Some(id) = process.id.clone().filter(|id| !id.is_empty()) else {
					warn!("ignoring update without an id");
					return Vec::new();
				};

				let Some(entry) = self
					.store
					.config_mut()
					.processes
					.iter_mut()
					.find(|entry| entry.id == id)
				else {
					warn!(%id, "ignoring update of unknown process");
					return Vec::new();
				};

				process.apply(entry);
				info!(%id, "updated process");
				self.save().await;
				self.sync().await;
				vec![self.process_list()]
			}
			Request::DeleteProcess { id } => {
				self.supervisor.forget_definition(id.clone()).await;
				self.store
					.config_mut()
					.processes
					.retain(|entry| entry.id != id);
				info!(%id, "deleted process");
				self.save().await;
				vec![self.process_list()]
			}
			Request::GetConfig => vec![self.config_response()],
			Request::SaveConfig { config } => {
				if let Some(auto) = config.auto_start_on_open {
					self.store.config_mut().auto_start_on_open = auto;
				}
				self.save().await;
				vec![self.config_response()]
			}
		}
	}

	async fn sync(&self) {
		self.supervisor
			.sync_definitions(self.store.definitions())
			.await;
	}

	async fn save(&self) {
		if let Err(err) = self.store.save().await {
			warn!(?err, "could not save configuration");
		}
	}

	fn process_list(&self) -> Response {
		Response::ProcessListResponse {
			processes: self
				.store
				.config()
				.processes
				.iter()
				.map(|config| ProcessView {
					status: self.supervisor.status(&config.id),
					pid: self.supervisor.displayed_pid(&config.id),
					config: config.clone(),
				})
				.collect(),
		}
	}

	fn config_response(&self) -> Response {
		Response::ConfigResponse {
			auto_start_on_open: self.store.config().auto_start_on_open,
		}
	}
}

/// Turn status events into responses, until the supervisor goes away.
pub async fn forward_events(
	mut events: broadcast::Receiver<StatusEvent>,
	responses: mpsc::UnboundedSender<Response>,
) {
	loop {
		match events.recv().await {
			Ok(event) => {
				if responses
					.send(Response::ProcessStatusChanged(event))
					.is_err()
				{
					break;
				}
			}
			Err(RecvError::Lagged(missed)) => {
				warn!(%missed, "status events were dropped");
			}
			Err(RecvError::Closed) => break,
		}
	}

	trace!("status forwarding ended");
}

/// Write responses as JSON lines until every sender is gone.
pub async fn write_responses(
	mut responses: mpsc::UnboundedReceiver<Response>,
	mut out: impl AsyncWrite + Unpin,
) -> std::io::Result<()> {
	while let Some(response) = responses.recv().await {
		let mut line = match serde_json::to_vec(&response) {
			Ok(line) => line,
			Err(err) => {
				warn!(%err, ?response, "could not serialise response");
				continue;
			}
		};
		line.push(b'\n');
		out.write_all(&line).await?;
		out.flush().await?;
	}

	Ok(())
}
