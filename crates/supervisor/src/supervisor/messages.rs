use tokio::sync::{mpsc::WeakUnboundedSender, oneshot};
use warden_events::ProcessEnd;

use crate::{definition::ProcessDefinition, scheduler::DelayKind};

/// Everything the coordinator reacts to.
#[derive(Debug)]
pub(crate) enum Message {
	/// A request from a [`Supervisor`](crate::Supervisor) handle.
	Control(ControlMessage),

	/// A process exited.
	Exited(ExitNotice),

	/// A start or guard delay elapsed.
	DelayElapsed {
		id: String,
		kind: DelayKind,
		generation: u64,
	},

	/// A script's worker process was found.
	ChildFound { id: String, root: u32, child: u32 },
}

#[derive(Debug)]
pub(crate) enum Control {
	Start(String),
	Stop(String),
	StartAll,
	StopAll,
	Sync(Vec<ProcessDefinition>),
	Forget(String),
	Shutdown,
}

#[derive(Debug)]
pub(crate) struct ControlMessage {
	pub control: Control,
	pub done: oneshot::Sender<bool>,
}

#[derive(Debug)]
pub(crate) struct ExitNotice {
	pub id: String,

	/// Which launch of `id` this is about.
	pub instance: u64,

	pub pid: u32,

	/// `None` if the exit status couldn't be read.
	pub end: Option<ProcessEnd>,
}

/// Send a message to the coordinator from a background task.
///
/// Returns false if the coordinator is gone.
pub(crate) fn post(inbox: &WeakUnboundedSender<Message>, message: Message) -> bool {
	inbox
		.upgrade()
		.is_some_and(|sender| sender.send(message).is_ok())
}
