#![deny(rust_2018_idioms)]
#![allow(clippy::missing_const_for_fn, clippy::future_not_send)]

use miette::{IntoDiagnostic, Result};
use tokio::{
	io::{stdin, stdout, AsyncBufReadExt, BufReader},
	signal::ctrl_c,
	sync::mpsc,
};
use tracing::{debug, info, warn};
use warden_supervisor::Supervisor;

use crate::{
	config::ConfigStore,
	router::{forward_events, write_responses, Router},
};

pub mod args;
pub mod config;
pub mod router;

async fn run_warden(args: args::Args) -> Result<()> {
	info!(version=%env!("CARGO_PKG_VERSION"), "starting warden");

	let store = ConfigStore::load(args.config_path()?).await?;
	let auto_start = args.start_all || store.config().auto_start_on_open;

	let (supervisor, coordinator) = Supervisor::spawn(store.supervisor_config());
	supervisor.sync_definitions(store.definitions()).await;

	let (responses, outbox) = mpsc::unbounded_channel();
	let writer = tokio::spawn(write_responses(outbox, stdout()));
	let forwarder = tokio::spawn(forward_events(supervisor.subscribe(), responses.clone()));

	if auto_start {
		info!("starting all enabled processes");
		supervisor.start_all().await;
	}

	let mut router = Router::new(supervisor.clone(), store);
	let mut lines = BufReader::new(stdin()).lines();

	info!("ready for messages");
	loop {
		tokio::select! {
			line = lines.next_line() => match line {
				Ok(Some(line)) => {
					for response in router.dispatch(&line).await {
						if responses.send(response).is_err() {
							warn!("output closed, response dropped");
						}
					}
				}
				Ok(None) => {
					info!("end of input");
					break;
				}
				Err(err) => {
					warn!(%err, "cannot read input");
					break;
				}
			},
			_ = ctrl_c() => {
				info!("interrupted");
				break;
			}
		}
	}

	info!("stopping all processes");
	supervisor.shutdown().await;
	coordinator.await.into_diagnostic()?;

	// with every sender gone, the forwarder drains what's queued and ends
	drop(router);
	drop(supervisor);
	if let Err(err) = forwarder.await {
		warn!(%err, "status forwarding failed");
	}
	drop(responses);
	match writer.await.into_diagnostic()? {
		Ok(()) => debug!("output flushed"),
		Err(err) => warn!(%err, "could not write all output"),
	}

	info!("done");
	Ok(())
}

pub async fn run() -> Result<()> {
	let (args, _log_guard) = args::get_args().await?;
	run_warden(args).await
}
