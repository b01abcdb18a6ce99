//! Delayed launches: start delays and guard (restart) delays.

use std::time::Duration;

use tokio::{sync::mpsc::WeakUnboundedSender, time::sleep};
use tracing::trace;

use crate::supervisor::messages::{post, Message};

/// Which delay is elapsing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum DelayKind {
	/// The definition's start delay, after a start request.
	Start,

	/// The guard delay, after an exit nobody asked for.
	Guard,
}

/// Post a [`Message::DelayElapsed`] once `delay` has passed.
///
/// Nothing is checked here: the coordinator decides, when the message arrives, whether the launch
/// still makes sense for the entry's current `generation`.
pub(crate) fn schedule(
	inbox: WeakUnboundedSender<Message>,
	id: String,
	kind: DelayKind,
	delay: Duration,
	generation: u64,
) {
	trace!(%id, ?kind, ?delay, %generation, "scheduling delayed launch");
	tokio::spawn(async move {
		sleep(delay).await;
		if !post(
			&inbox,
			Message::DelayElapsed {
				id,
				kind,
				generation,
			},
		) {
			trace!("supervisor gone, dropping delayed launch");
		}
	});
}
