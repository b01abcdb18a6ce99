use std::path::Path;

use assert_cmd::Command;
use serde_json::Value;

fn warden(config: &Path, input: &str) -> Vec<Value> {
	let output = Command::cargo_bin("warden")
		.unwrap()
		.arg("--config")
		.arg(config)
		.env_remove("RUST_LOG")
		.write_stdin(input)
		.output()
		.unwrap();
	assert!(output.status.success(), "warden exited with {:?}", output.status);

	String::from_utf8(output.stdout)
		.unwrap()
		.lines()
		.map(|line| serde_json::from_str(line).unwrap())
		.collect()
}

#[test]
fn fresh_config_is_created() {
	let dir = tempfile::tempdir().unwrap();
	let config = dir.path().join("warden.json");

	let out = warden(
		&config,
		"{\"action\":\"getProcessList\"}\n{\"action\":\"getConfig\"}\n",
	);

	assert_eq!(out.len(), 2, "{out:?}");
	assert_eq!(out[0]["type"], "processListResponse");
	assert_eq!(out[0]["processes"], Value::Array(Vec::new()));
	assert_eq!(out[1]["type"], "configResponse");
	assert_eq!(out[1]["autoStartOnOpen"], false);

	let written: Value = serde_json::from_str(&std::fs::read_to_string(&config).unwrap()).unwrap();
	assert_eq!(written["autoStartOnOpen"], false);
}

#[test]
fn garbage_lines_are_skipped() {
	let dir = tempfile::tempdir().unwrap();
	let config = dir.path().join("warden.json");

	let out = warden(
		&config,
		"not json\n\n{\"action\":\"launchRockets\"}\n{\"action\":\"getConfig\"}\n",
	);

	assert_eq!(out.len(), 1, "{out:?}");
	assert_eq!(out[0]["type"], "configResponse");
}

#[test]
fn added_processes_are_persisted() {
	let dir = tempfile::tempdir().unwrap();
	let config = dir.path().join("warden.json");

	let out = warden(
		&config,
		concat!(
			r#"{"action":"addProcess","process":{"name":"nightly","path":"/opt/jobs/nightly.sh","args":"--full"}}"#,
			"\n",
			r#"{"action":"saveConfig","config":{"autoStartOnOpen":true}}"#,
			"\n",
		),
	);

	assert_eq!(out.len(), 2, "{out:?}");
	let listed = &out[0]["processes"][0];
	assert_eq!(listed["name"], "nightly");
	assert_eq!(listed["type"], "bat");
	assert_eq!(listed["status"], "stopped");
	assert_eq!(listed["pid"], 0);
	assert_eq!(out[1]["autoStartOnOpen"], true);

	let written: Value = serde_json::from_str(&std::fs::read_to_string(&config).unwrap()).unwrap();
	assert_eq!(written["autoStartOnOpen"], true);
	assert_eq!(written["processes"][0]["id"], listed["id"]);
	assert_eq!(written["processes"][0]["args"], "--full");

	// a second run picks up what the first one saved
	let out = warden(&config, "{\"action\":\"getProcessList\"}\n");
	assert_eq!(out[0]["processes"][0]["name"], "nightly");
}

#[test]
fn failed_launch_is_reported_and_logged() {
	let dir = tempfile::tempdir().unwrap();
	let config = dir.path().join("warden.json");
	std::fs::write(
		&config,
		r#"{ "processes": [ { "id": "bad", "path": "/nonexistent/warden/nope" } ] }"#,
	)
	.unwrap();

	let out = warden(&config, "{\"action\":\"startProcess\",\"id\":\"bad\"}\n");
	let statuses: Vec<&str> = out
		.iter()
		.filter(|line| line["type"] == "processStatusChanged" && line["id"] == "bad")
		.filter_map(|line| line["status"].as_str())
		.collect();
	assert_eq!(statuses, ["starting", "failed", "stopped"], "{out:?}");

	let logs: Vec<_> = std::fs::read_dir(dir.path().join("logs"))
		.unwrap()
		.map(|entry| entry.unwrap().path())
		.collect();
	let [log] = logs.as_slice() else {
		panic!("expected one log file, found {logs:?}");
	};
	assert!(log
		.file_name()
		.and_then(|name| name.to_str())
		.is_some_and(|name| name.starts_with("warden.") && name.ends_with(".log")));

	let text = std::fs::read_to_string(log).unwrap();
	assert!(text.contains("launching process"), "{text}");
	assert!(text.contains("/nonexistent/warden/nope"), "{text}");
	assert!(text.contains("launch failed"), "{text}");
}
