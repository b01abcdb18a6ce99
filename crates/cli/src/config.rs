//! The configuration store: process definitions and settings, persisted as JSON.

use std::{
	env::current_exe,
	path::PathBuf,
	time::Duration,
};

use miette::{miette, IntoDiagnostic, Result, WrapErr};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, info, warn};
use warden_supervisor::{
	Interpreter, ProcessDefinition, ProcessKind, ResolverConfig, SupervisorConfig,
};

const CONFIG_FILE_NAME: &str = "warden.json";

/// The whole configuration file.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
	/// Run `startAll` once at startup.
	#[serde(default)]
	pub auto_start_on_open: bool,

	#[serde(default)]
	pub processes: Vec<ProcessConfig>,

	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub interpreter: Option<InterpreterConfig>,

	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub resolver: Option<ResolverSettings>,
}

/// One managed process, as stored.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessConfig {
	#[serde(default)]
	pub id: String,

	/// Display name; not used by the supervisor.
	#[serde(default)]
	pub name: String,

	#[serde(default)]
	pub path: String,

	/// `exe` or `bat`; inferred from the path when empty.
	#[serde(default, rename = "type")]
	pub kind: String,

	#[serde(default)]
	pub args: String,

	#[serde(default)]
	pub delay_seconds: i64,

	#[serde(default = "yes")]
	pub guard_enabled: bool,

	#[serde(default = "default_guard_delay")]
	pub guard_delay_seconds: i64,

	/// Included in `startAll`.
	#[serde(default = "yes")]
	pub enabled: bool,
}

const fn yes() -> bool {
	true
}

const fn default_guard_delay() -> i64 {
	3
}

impl Default for ProcessConfig {
	fn default() -> Self {
		Self {
			id: String::new(),
			name: String::new(),
			path: String::new(),
			kind: String::new(),
			args: String::new(),
			delay_seconds: 0,
			guard_enabled: true,
			guard_delay_seconds: default_guard_delay(),
			enabled: true,
		}
	}
}

/// A fresh process id.
#[must_use]
pub fn new_id() -> String {
	uuid::Uuid::new_v4().to_string()
}

/// The stored type name for a path: `bat` for scripts, `exe` otherwise.
#[must_use]
pub fn type_from_path(path: &str) -> &'static str {
	match ProcessKind::from_path(path) {
		ProcessKind::Script => "bat",
		ProcessKind::Executable => "exe",
	}
}

fn seconds(value: i64) -> Duration {
	Duration::from_secs(u64::try_from(value).unwrap_or(0))
}

impl ProcessConfig {
	/// Fill in what a hand-written entry may leave out: the id and the type.
	pub fn normalise(&mut self) {
		if self.id.is_empty() {
			self.id = new_id();
		}

		if self.kind.is_empty() {
			self.kind = type_from_path(&self.path).into();
		}
	}

	#[must_use]
	pub fn process_kind(&self) -> ProcessKind {
		match self.kind.to_ascii_lowercase().as_str() {
			"" => ProcessKind::from_path(&self.path),
			"bat" | "cmd" | "sh" | "script" => ProcessKind::Script,
			_ => ProcessKind::Executable,
		}
	}

	/// The supervisor's view of this entry. Negative delays count as zero.
	#[must_use]
	pub fn to_definition(&self) -> ProcessDefinition {
		ProcessDefinition {
			id: self.id.clone(),
			path: PathBuf::from(&self.path),
			args: self.args.clone(),
			kind: self.process_kind(),
			start_delay: seconds(self.delay_seconds),
			guard: self.guard_enabled,
			guard_delay: seconds(self.guard_delay_seconds),
			bulk_start: self.enabled,
		}
	}
}

/// How to run scripts, when the platform default isn't wanted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterpreterConfig {
	pub program: String,

	#[serde(default)]
	pub options: Vec<String>,

	/// Option placed just before the script path, like `/C` for CMD.EXE.
	#[serde(default)]
	pub program_option: Option<String>,
}

impl From<&InterpreterConfig> for Interpreter {
	fn from(config: &InterpreterConfig) -> Self {
		let mut interpreter = Self::new(&config.program);
		interpreter.options.clone_from(&config.options);
		interpreter.program_option = config
			.program_option
			.clone()
			.map(|opt| std::ffi::OsString::from(opt).into());
		interpreter
	}
}

/// Tuning for the script worker pid lookup.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolverSettings {
	#[serde(default = "ResolverSettings::default_attempts")]
	pub attempts: u32,

	#[serde(default = "ResolverSettings::default_interval")]
	pub interval_ms: u64,

	#[serde(default = "ResolverSettings::default_skip_names")]
	pub skip_names: Vec<String>,
}

impl ResolverSettings {
	fn default_attempts() -> u32 {
		ResolverConfig::default().attempts
	}

	fn default_interval() -> u64 {
		u64::try_from(ResolverConfig::default().interval.as_millis()).unwrap_or(u64::MAX)
	}

	fn default_skip_names() -> Vec<String> {
		ResolverConfig::default().skip_names
	}
}

impl From<&ResolverSettings> for ResolverConfig {
	fn from(settings: &ResolverSettings) -> Self {
		Self {
			attempts: settings.attempts,
			interval: Duration::from_millis(settings.interval_ms),
			skip_names: settings.skip_names.clone(),
		}
	}
}

/// The configuration, and where it lives.
#[derive(Debug)]
pub struct ConfigStore {
	path: PathBuf,
	config: Config,
}

/// `warden.json` next to the running executable.
pub fn default_path() -> Result<PathBuf> {
	let exe = current_exe()
		.into_diagnostic()
		.wrap_err("cannot find the warden executable")?;
	let dir = exe
		.parent()
		.ok_or_else(|| miette!("executable {exe:?} has no parent directory"))?;
	Ok(dir.join(CONFIG_FILE_NAME))
}

impl ConfigStore {
	/// Load the configuration.
	///
	/// A missing file is created with the default configuration. A file which can't be read or
	/// parsed is reported, and the default configuration is used instead; the file is left alone.
	pub async fn load(path: impl Into<PathBuf>) -> Result<Self> {
		let path = path.into();
		let config = match fs::read_to_string(&path).await {
			Ok(text) if text.trim().is_empty() => {
				debug!(?path, "config file is empty, using defaults");
				Config::default()
			}
			Ok(text) => match serde_json::from_str::<Config>(&text) {
				Ok(mut config) => {
					for process in &mut config.processes {
						process.normalise();
					}
					info!(?path, processes=%config.processes.len(), "loaded configuration");
					config
				}
				Err(err) => {
					warn!(?path, %err, "config file is malformed, using defaults");
					Config::default()
				}
			},
			Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
				info!(?path, "no config file, creating one");
				let store = Self {
					path,
					config: Config::default(),
				};
				store.save().await?;
				return Ok(store);
			}
			Err(err) => {
				warn!(?path, %err, "cannot read config file, using defaults");
				Config::default()
			}
		};

		Ok(Self { path, config })
	}

	/// Write the configuration back to its file.
	pub async fn save(&self) -> Result<()> {
		let json = serde_json::to_string_pretty(&self.config).into_diagnostic()?;
		fs::write(&self.path, json)
			.await
			.into_diagnostic()
			.wrap_err_with(|| format!("cannot write config file {:?}", self.path))?;
		debug!(path=?self.path, "saved configuration");
		Ok(())
	}

	#[must_use]
	pub const fn config(&self) -> &Config {
		&self.config
	}

	pub fn config_mut(&mut self) -> &mut Config {
		&mut self.config
	}

	/// Every process, as the supervisor sees them.
	#[must_use]
	pub fn definitions(&self) -> Vec<ProcessDefinition> {
		self.config
			.processes
			.iter()
			.map(ProcessConfig::to_definition)
			.collect()
	}

	#[must_use]
	pub fn supervisor_config(&self) -> SupervisorConfig {
		let mut config = SupervisorConfig::default();
		if let Some(interpreter) = &self.config.interpreter {
			config.interpreter = interpreter.into();
		}
		if let Some(resolver) = &self.config.resolver {
			config.resolver = resolver.into();
		}
		config
	}
}

#[cfg(test)]
mod tests {
	use tempfile::TempDir;

	use super::*;

	#[tokio::test]
	async fn missing_file_is_created() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("warden.json");

		let store = ConfigStore::load(&path).await.unwrap();
		assert_eq!(store.config(), &Config::default());

		let written: Config =
			serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
		assert_eq!(written, Config::default());
	}

	#[tokio::test]
	async fn malformed_file_is_left_alone() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("warden.json");
		std::fs::write(&path, "{ not json").unwrap();

		let store = ConfigStore::load(&path).await.unwrap();
		assert_eq!(store.config(), &Config::default());
		assert_eq!(std::fs::read_to_string(&path).unwrap(), "{ not json");
	}

	#[tokio::test]
	async fn defaults_are_filled_in() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("warden.json");
		std::fs::write(
			&path,
			r#"{ "processes": [ { "path": "C:\\jobs\\nightly.BAT" }, { "id": "web", "path": "/srv/web", "delaySeconds": 2 } ] }"#,
		)
		.unwrap();

		let store = ConfigStore::load(&path).await.unwrap();
		let [nightly, web] = store.config().processes.as_slice() else {
			panic!("expected two processes");
		};

		assert!(!nightly.id.is_empty());
		assert_eq!(nightly.kind, "bat");
		assert!(nightly.guard_enabled);
		assert_eq!(nightly.guard_delay_seconds, 3);
		assert!(nightly.enabled);

		assert_eq!(web.id, "web");
		assert_eq!(web.kind, "exe");
		assert_eq!(web.to_definition().start_delay, Duration::from_secs(2));
		assert!(!store.config().auto_start_on_open);
	}

	#[tokio::test]
	async fn save_round_trips_field_names() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("warden.json");
		let mut store = ConfigStore::load(&path).await.unwrap();
		store.config_mut().auto_start_on_open = true;
		store.config_mut().processes.push(ProcessConfig {
			id: "a".into(),
			path: "/bin/a".into(),
			kind: "exe".into(),
			..ProcessConfig::default()
		});
		store.save().await.unwrap();

		let raw: serde_json::Value =
			serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
		assert_eq!(raw["autoStartOnOpen"], true);
		assert_eq!(raw["processes"][0]["type"], "exe");
		assert_eq!(raw["processes"][0]["guardDelaySeconds"], 3);
		assert_eq!(raw["processes"][0]["delaySeconds"], 0);
		assert!(raw.get("interpreter").is_none());
	}

	#[test]
	fn definitions() {
		let process = ProcessConfig {
			id: "job".into(),
			path: "/opt/job/run.sh".into(),
			args: "--once".into(),
			delay_seconds: -5,
			guard_enabled: false,
			guard_delay_seconds: 10,
			enabled: false,
			..ProcessConfig::default()
		};

		let def = process.to_definition();
		assert_eq!(def.kind, ProcessKind::Script);
		assert_eq!(def.start_delay, Duration::ZERO);
		assert_eq!(def.guard_delay, Duration::from_secs(10));
		assert!(!def.guard);
		assert!(!def.bulk_start);
		assert_eq!(def.args, "--once");
	}

	#[test]
	fn explicit_type_wins() {
		let process = ProcessConfig {
			path: "/opt/tool".into(),
			kind: "bat".into(),
			..ProcessConfig::default()
		};
		assert_eq!(process.process_kind(), ProcessKind::Script);
	}

	#[test]
	fn custom_interpreter_and_resolver() {
		let config: Config = serde_json::from_str(
			r#"{ "interpreter": { "program": "bash", "options": ["-e"] }, "resolver": { "attempts": 2 } }"#,
		)
		.unwrap();
		let store = ConfigStore {
			path: "unused.json".into(),
			config,
		};

		let sv = store.supervisor_config();
		assert_eq!(sv.interpreter.prog, PathBuf::from("bash"));
		assert_eq!(sv.interpreter.options, ["-e"]);
		assert_eq!(sv.interpreter.program_option, None);
		assert_eq!(sv.resolver.attempts, 2);
		assert_eq!(sv.resolver.interval, ResolverConfig::default().interval);
	}
}
