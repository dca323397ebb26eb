use crate::foundation::ids::RequestId;
use crate::net::packets::Packet;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError, SyncSender, sync_channel};
use std::time::Duration;

/// Payload resolving a pending request.
#[derive(Clone, Debug, PartialEq)]
pub enum Reply {
    /// A render client created its copy of the session.
    Created,
    /// A node applied its running-state update, or failed with a message.
    Running(Result<(), String>),
    /// A node flushed its queued frames and reports its last finished frame.
    Flushed(u32),
}

impl Reply {
    /// Split a reply packet into its request id and payload.
    pub fn from_packet(packet: &Packet) -> Option<(RequestId, Reply)> {
        match packet {
            Packet::ConfigCreateReply { request } => Some((*request, Reply::Created)),
            Packet::NodeRunningReply { request, result } => {
                Some((*request, Reply::Running(result.clone())))
            }
            Packet::NodeFlushReply { request, finished } => {
                Some((*request, Reply::Flushed(*finished)))
            }
            _ => None,
        }
    }
}

/// Pending-request table correlating replies with the requests that wait for them.
///
/// Each registered request owns a one-element channel, so a reply served before anyone waits
/// is buffered rather than lost. Waiting consumes the slot.
pub struct RequestTable {
    next: AtomicU32,
    senders: Mutex<HashMap<RequestId, SyncSender<Reply>>>,
    receivers: Mutex<HashMap<RequestId, Receiver<Reply>>>,
}

impl Default for RequestTable {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestTable {
    pub fn new() -> Self {
        Self {
            next: AtomicU32::new(1),
            senders: Mutex::new(HashMap::new()),
            receivers: Mutex::new(HashMap::new()),
        }
    }

    pub fn register(&self) -> RequestId {
        let id = RequestId(self.next.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = sync_channel(1);
        self.senders.lock().insert(id, tx);
        self.receivers.lock().insert(id, rx);
        id
    }

    /// Resolve `id`. Returns `false` for unknown or already answered requests.
    pub fn serve(&self, id: RequestId, reply: Reply) -> bool {
        let senders = self.senders.lock();
        let Some(tx) = senders.get(&id) else {
            tracing::warn!(request = id.0, "reply for unknown request");
            return false;
        };
        tx.try_send(reply).is_ok()
    }

    /// Block until `id` is served or `timeout` elapses.
    pub fn wait(&self, id: RequestId, timeout: Duration) -> Option<Reply> {
        let rx = self.receivers.lock().remove(&id)?;
        let reply = match rx.recv_timeout(timeout) {
            Ok(reply) => Some(reply),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        };
        self.senders.lock().remove(&id);
        reply
    }

    /// Drop a request nobody is going to wait for.
    pub fn cancel(&self, id: RequestId) {
        self.senders.lock().remove(&id);
        self.receivers.lock().remove(&id);
    }

    pub fn pending(&self) -> usize {
        self.senders.lock().len()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/net/requests.rs"]
mod tests;
