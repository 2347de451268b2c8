//! Worker mailboxes.
//!
//! Every worker owns an unbounded receiver and processes its messages one
//! at a time. Senders only ever `tell`: nothing waits on another worker.

use std::fmt;

use tokio::sync::mpsc;
use tracing::debug;

/// Sending half of a worker mailbox.
pub struct Address<M> {
    name: &'static str,
    tx: mpsc::UnboundedSender<M>,
}

impl<M> Address<M> {
    /// Fire-and-forget delivery. A message sent to a stopped worker is
    /// dropped.
    pub fn tell(&self, msg: M) {
        if self.tx.send(msg).is_err() {
            debug!(worker = self.name, "mailbox closed, message dropped");
        }
    }

    /// Whether the receiving worker has stopped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl<M> Clone for Address<M> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            tx: self.tx.clone(),
        }
    }
}

impl<M> fmt::Debug for Address<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Address").field("name", &self.name).finish()
    }
}

/// Create a mailbox for a worker called `name`.
pub fn mailbox<M>(name: &'static str) -> (Address<M>, mpsc::UnboundedReceiver<M>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Address { name, tx }, rx)
}
