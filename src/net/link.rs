use crate::foundation::error::{ClusterError, ClusterResult};
use crate::foundation::ids::NodeId;
use crate::net::packets::Packet;
use crate::net::requests::{Reply, RequestTable};
use std::fmt;
use std::sync::Arc;
use std::sync::mpsc;
use std::time::{Duration, Instant};

/// Address of one listening endpoint of a render client.
#[derive(Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct ConnectionDescription {
    pub hostname: String,
    #[serde(default)]
    pub port: u16,
}

/// Everything needed to reach a render client, launching it on demand.
#[derive(Clone, Debug)]
pub struct NodeLaunch {
    pub node: NodeId,
    pub name: String,
    pub descriptions: Vec<ConnectionDescription>,
    pub launch_timeout: Duration,
    pub launch_command: String,
    pub launch_quote: char,
    pub program: String,
    pub work_dir: String,
    pub auto_launch: bool,
}

impl NodeLaunch {
    /// Expand the launch command for `host`: `%h` is the host, `%c` the quoted render client
    /// started in the work directory.
    pub fn command_line(&self, host: &str) -> String {
        let q = self.launch_quote;
        let client = if self.work_dir.is_empty() {
            self.program.clone()
        } else {
            format!("cd {} && {}", self.work_dir, self.program)
        };
        self.launch_command
            .replace("%h", host)
            .replace("%c", &format!("{q}{client}{q}"))
    }

    pub fn hostnames(&self) -> Vec<&str> {
        self.descriptions.iter().map(|d| d.hostname.as_str()).collect()
    }
}

/// Connection to a remote process: the application or a render client.
pub trait NetNode: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;
    fn is_connected(&self) -> bool;
    fn send(&self, packet: Packet) -> ClusterResult<()>;
}

pub type NetNodeRef = Arc<dyn NetNode>;

/// Connection layer used to reach render clients.
pub trait Connector: Send + Sync {
    /// Start connecting, launching the render client when it does not run yet.
    fn initiate_connection(&self, launch: &NodeLaunch) -> ClusterResult<NetNodeRef>;

    /// Wait until an initiated connection is established.
    fn await_connection(&self, node: &NetNodeRef, timeout: Duration) -> bool;

    /// Tear the connection down from the server side.
    fn close(&self, node: &NetNodeRef);
}

/// Networking handles shared by the server and all its configurations.
#[derive(Clone)]
pub struct NetContext {
    pub connector: Arc<dyn Connector>,
    pub requests: Arc<RequestTable>,
    epoch: Instant,
}

impl NetContext {
    /// Context resolving replies through the table shared with `inbox`.
    pub fn new(connector: Arc<dyn Connector>, inbox: &ServerInbox) -> Self {
        Self {
            connector,
            requests: Arc::clone(&inbox.requests),
            epoch: Instant::now(),
        }
    }

    /// Server time base, in milliseconds since the context was created.
    pub fn time_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }
}

impl fmt::Debug for NetContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetContext")
            .field("pending_requests", &self.requests.pending())
            .finish()
    }
}

/// A packet received by the server together with its sender.
#[derive(Debug)]
pub struct Incoming {
    pub from: NetNodeRef,
    pub packet: Packet,
}

impl fmt::Debug for ServerInbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerInbox")
            .field("pending_requests", &self.requests.pending())
            .finish()
    }
}

/// Receiving side of the server.
///
/// Replies correlated by request id resolve the pending-request table directly, so a handler
/// blocked on them never waits for the dispatch loop it is running on. Everything else is queued
/// for the dispatch loop.
#[derive(Clone)]
pub struct ServerInbox {
    queue: mpsc::Sender<Incoming>,
    requests: Arc<RequestTable>,
}

impl ServerInbox {
    pub fn new(queue: mpsc::Sender<Incoming>, requests: Arc<RequestTable>) -> Self {
        Self { queue, requests }
    }

    /// Fresh inbox with its own request table, and the dispatch side of its queue.
    pub fn channel() -> (Self, mpsc::Receiver<Incoming>) {
        let (tx, rx) = mpsc::channel();
        (Self::new(tx, Arc::new(RequestTable::new())), rx)
    }

    pub fn requests(&self) -> &Arc<RequestTable> {
        &self.requests
    }

    pub fn deliver(&self, from: NetNodeRef, packet: Packet) -> ClusterResult<()> {
        if let Some((id, reply)) = Reply::from_packet(&packet) {
            self.requests.serve(id, reply);
            return Ok(());
        }
        self.queue
            .send(Incoming { from, packet })
            .map_err(|_| ClusterError::connection("server dispatch queue is closed"))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/net/link.rs"]
mod tests;
