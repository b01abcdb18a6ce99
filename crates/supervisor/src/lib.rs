//! Warden's process supervisor.
//!
//! This crate starts a small set of externally defined programs and scripts on demand, tracks
//! their live status, terminates them (including anything they spawned) on demand, and optionally
//! relaunches them after an exit nobody asked for ("guard" mode).
//!
//! # Usage
//!
//! A [`Supervisor`] is a handle to a coordinator task running on the Tokio runtime. It is given
//! the current list of [`ProcessDefinition`]s, and then controlled with `start`, `stop`,
//! `start_all`, and `stop_all`. Status changes are pushed to subscribers as
//! [`StatusEvent`]s; the current status of any process can also be queried directly.
//!
//! ```no_run
//! # #[tokio::main(flavor = "current_thread")] async fn main() { // single-threaded for doctest only
//! use std::time::Duration;
//! use warden_supervisor::{ProcessDefinition, Supervisor, SupervisorConfig};
//!
//! let (supervisor, _task) = Supervisor::spawn(SupervisorConfig::default());
//! let mut events = supervisor.subscribe();
//!
//! supervisor
//!     .sync_definitions(vec![ProcessDefinition {
//!         guard_delay: Duration::from_secs(3),
//!         ..ProcessDefinition::new("web", "/usr/local/bin/web-server")
//!     }])
//!     .await;
//!
//! supervisor.start("web").await;
//! while let Ok(event) = events.recv().await {
//!     println!("{} is {} (pid {})", event.id, event.status, event.pid);
//! }
//! # }
//! ```
//!
//! # Theory of Operation
//!
//! All changes to the table of runtime entries (the registry) and all status events come from a
//! single coordinator task, which drains one channel. Everything else runs as independent tasks
//! that only ever *send* to that channel:
//!
//! - each launched process gets an exit watcher task, which owns the child, waits on it without
//!   polling, and posts an exit notice when it ends;
//! - start delays and guard (restart) delays are sleeping tasks which post a message when they
//!   elapse, and the coordinator then re-checks whether a stop arrived in the meantime;
//! - for scripts, a probe task looks for the interpreter's child process so that the process id
//!   shown for the script is the one doing the work.
//!
//! Processes are spawned into a termination group: a process group on Unix, or a kill-on-close
//! job object on Windows. Each runtime entry holds the group's handle; releasing it kills the whole
//! tree. Stopping a process moves that handle out of its entry before releasing it, so that the
//! exit path can't release it a second time.
//!
//! Dropping every [`Supervisor`] handle closes the coordinator's channel, which stops the
//! coordinator and, with it, every process it was managing.

#![warn(clippy::unwrap_used, missing_docs, rustdoc::unescaped_backticks)]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![deny(rust_2018_idioms)]

#[doc(no_inline)]
pub use warden_events::{ProcessEnd, ProcessStatus, StatusEvent};

#[doc(inline)]
pub use self::{
	command::Interpreter,
	definition::{ProcessDefinition, ProcessKind},
	resolver::ResolverConfig,
	supervisor::{Supervisor, SupervisorConfig},
};

pub mod command;
pub mod definition;
pub mod errors;
pub mod resolver;

mod bridge;
mod launch;
mod registry;
mod scheduler;
mod supervisor;
