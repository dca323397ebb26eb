//! In-process cluster: render clients run as threads, the application is a recording endpoint.

use crate::compound::statistics::{ScopedStatistic, Statistic};
use crate::foundation::error::{ClusterError, ClusterResult};
use crate::net::link::{Connector, NetNode, NetNodeRef, NodeLaunch, ServerInbox};
use crate::net::packets::Packet;
use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Weak};
use std::thread;
use std::time::{Duration, Instant};

/// Scripted behavior of the render client on one host.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum HostBehavior {
    #[default]
    Healthy,
    /// The launch command fails.
    Unreachable,
    /// Launched, but never connects back.
    NeverStarts,
    /// Rejects every running-state update.
    FailsInit,
    /// Ignores the exit request and stays connected until closed.
    Lingers,
    /// Never reports finished frames.
    Stalls,
}

/// Render client endpoint seen by the server.
#[derive(Debug)]
pub struct LoopbackClient {
    name: String,
    connected: AtomicBool,
    tx: Mutex<Option<mpsc::Sender<Packet>>>,
}

impl NetNode for LoopbackClient {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    fn send(&self, packet: Packet) -> ClusterResult<()> {
        let tx = self.tx.lock();
        let Some(tx) = tx.as_ref() else {
            return Err(ClusterError::connection(format!("{} is closed", self.name)));
        };
        tx.send(packet)
            .map_err(|_| ClusterError::connection(format!("{} has exited", self.name)))
    }
}

impl LoopbackClient {
    fn shut(&self) {
        self.connected.store(false, Ordering::Release);
        self.tx.lock().take();
    }
}

/// [`Connector`] spawning one render-client thread per connected node.
pub struct LoopbackCluster {
    inbox: ServerInbox,
    behaviors: Mutex<HashMap<String, HostBehavior>>,
    clients: Mutex<Vec<Arc<LoopbackClient>>>,
    launched: Mutex<Vec<String>>,
    forced_closes: Mutex<Vec<String>>,
    frame_time: Duration,
}

impl LoopbackCluster {
    pub fn new(inbox: ServerInbox) -> Self {
        Self {
            inbox,
            behaviors: Mutex::new(HashMap::new()),
            clients: Mutex::new(Vec::new()),
            launched: Mutex::new(Vec::new()),
            forced_closes: Mutex::new(Vec::new()),
            frame_time: Duration::from_millis(1),
        }
    }

    /// Simulated render time per task.
    pub fn with_frame_time(mut self, frame_time: Duration) -> Self {
        self.frame_time = frame_time;
        self
    }

    pub fn set_behavior(&self, host: &str, behavior: HostBehavior) {
        self.behaviors.lock().insert(host.to_owned(), behavior);
    }

    /// Launch commands issued so far.
    pub fn launched(&self) -> Vec<String> {
        self.launched.lock().clone()
    }

    /// Nodes whose connection was closed by the server rather than by the client.
    pub fn forced_closes(&self) -> Vec<String> {
        self.forced_closes.lock().clone()
    }

    pub fn connected_clients(&self) -> usize {
        self.clients
            .lock()
            .iter()
            .filter(|c| c.is_connected())
            .count()
    }

    fn behavior(&self, host: &str) -> HostBehavior {
        self.behaviors.lock().get(host).copied().unwrap_or_default()
    }
}

impl Connector for LoopbackCluster {
    fn initiate_connection(&self, launch: &NodeLaunch) -> ClusterResult<NetNodeRef> {
        let host = launch.hostnames().first().copied().unwrap_or_default().to_owned();
        let behavior = self.behavior(&host);
        if behavior == HostBehavior::Unreachable {
            return Err(ClusterError::connection(format!(
                "launch of '{}' failed",
                launch.command_line(&host)
            )));
        }
        self.launched.lock().push(launch.command_line(&host));

        let (tx, rx) = mpsc::channel();
        let client = Arc::new(LoopbackClient {
            name: launch.name.clone(),
            connected: AtomicBool::new(behavior != HostBehavior::NeverStarts),
            tx: Mutex::new(Some(tx)),
        });
        self.clients.lock().push(Arc::clone(&client));

        let worker = Worker {
            client: Arc::clone(&client),
            inbox: self.inbox.clone(),
            behavior,
            frame_time: self.frame_time,
            epoch: Instant::now(),
            finished: 0,
        };
        thread::Builder::new()
            .name(format!("render-client-{}", launch.name))
            .spawn(move || worker.run(rx))
            .map_err(|e| ClusterError::connection(format!("spawn render client: {e}")))?;

        Ok(client)
    }

    fn await_connection(&self, node: &NetNodeRef, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if node.is_connected() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(1).min(timeout));
        }
    }

    fn close(&self, node: &NetNodeRef) {
        let clients = self.clients.lock();
        let Some(client) = clients
            .iter()
            .find(|c| std::ptr::addr_eq(Arc::as_ptr(*c), Arc::as_ptr(node)))
        else {
            return;
        };
        if client.is_connected() {
            self.forced_closes.lock().push(client.name.clone());
        }
        client.shut();
    }
}

/// Simulated render client loop.
struct Worker {
    client: Arc<LoopbackClient>,
    inbox: ServerInbox,
    behavior: HostBehavior,
    frame_time: Duration,
    epoch: Instant,
    finished: u32,
}

impl Worker {
    fn run(mut self, rx: mpsc::Receiver<Packet>) {
        while let Ok(packet) = rx.recv() {
            if !self.handle(packet) {
                break;
            }
        }
        if self.behavior != HostBehavior::Lingers {
            self.client.shut();
        }
    }

    fn reply(&self, packet: Packet) {
        let from: NetNodeRef = Arc::clone(&self.client) as NetNodeRef;
        if let Err(e) = self.inbox.deliver(from, packet) {
            tracing::debug!(client = %self.client.name, "reply dropped: {e}");
        }
    }

    /// Returns `false` once the client should exit.
    fn handle(&mut self, packet: Packet) -> bool {
        match packet {
            Packet::CreateConfig {
                request: Some(request),
                ..
            } => self.reply(Packet::ConfigCreateReply { request }),
            Packet::NodeUpdateRunning { request, .. } => {
                let result = match self.behavior {
                    HostBehavior::FailsInit => Err(format!("{}: init failed", self.client.name)),
                    _ => Ok(()),
                };
                self.reply(Packet::NodeRunningReply { request, result });
            }
            Packet::NodeFrameStart {
                session,
                node,
                frame,
                tasks,
                ..
            } => {
                if self.behavior == HostBehavior::Stalls {
                    return true;
                }
                let mut statistics = Vec::with_capacity(tasks.len());
                let epoch = self.epoch;
                let now = move || epoch.elapsed().as_millis() as u64;
                for task in &tasks {
                    let _stat = ScopedStatistic::new(
                        &mut statistics,
                        &now,
                        task.compound,
                        task.channel,
                        frame,
                    );
                    thread::sleep(self.frame_time);
                }
                self.finished = frame;
                self.reply(Packet::NodeFrameFinished {
                    session,
                    node,
                    frame,
                    statistics,
                });
            }
            Packet::NodeFlushFrames {
                request: Some(request),
                ..
            } => self.reply(Packet::NodeFlushReply {
                request,
                finished: self.finished,
            }),
            Packet::ClientExit => {
                return self.behavior == HostBehavior::Lingers;
            }
            _ => {}
        }
        true
    }
}

/// Application endpoint. Records everything the server sends it and serves the application
/// node's share of the work, which runs in the application process.
#[derive(Debug)]
pub struct LoopbackApp {
    name: String,
    me: Weak<LoopbackApp>,
    inbox: Mutex<Option<ServerInbox>>,
    received: Mutex<Vec<Packet>>,
    arrived: Condvar,
    connected: AtomicBool,
}

impl LoopbackApp {
    pub fn new(name: impl Into<String>, inbox: ServerInbox) -> Arc<Self> {
        let name = name.into();
        Arc::new_cyclic(|me| Self {
            name,
            me: me.clone(),
            inbox: Mutex::new(Some(inbox)),
            received: Mutex::new(Vec::new()),
            arrived: Condvar::new(),
            connected: AtomicBool::new(true),
        })
    }

    pub fn link(self: &Arc<Self>) -> NetNodeRef {
        Arc::clone(self) as NetNodeRef
    }

    /// Send a command to the server as this application.
    pub fn command(&self, packet: Packet) -> ClusterResult<()> {
        let inbox = self.inbox.lock().clone();
        let (Some(inbox), Some(me)) = (inbox, self.me.upgrade()) else {
            return Err(ClusterError::connection("application is disconnected"));
        };
        inbox.deliver(me, packet)
    }

    /// Drop the connection to the server.
    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::Release);
        self.inbox.lock().take();
    }

    pub fn received(&self) -> Vec<Packet> {
        self.received.lock().clone()
    }

    pub fn clear(&self) {
        self.received.lock().clear();
    }

    /// Wait until a received packet matches `pred` and return it.
    pub fn wait_for(
        &self,
        timeout: Duration,
        mut pred: impl FnMut(&Packet) -> bool,
    ) -> Option<Packet> {
        let deadline = Instant::now() + timeout;
        let mut received = self.received.lock();
        loop {
            if let Some(p) = received.iter().find(|p| pred(p)) {
                return Some(p.clone());
            }
            if self.arrived.wait_until(&mut received, deadline).timed_out() {
                return received.iter().find(|p| pred(p)).cloned();
            }
        }
    }

    fn serve_local(&self, packet: &Packet) {
        let reply = match packet {
            Packet::NodeUpdateRunning { request, .. } => Some(Packet::NodeRunningReply {
                request: *request,
                result: Ok(()),
            }),
            Packet::NodeFrameStart {
                session,
                node,
                frame,
                ..
            } => Some(Packet::NodeFrameFinished {
                session: *session,
                node: *node,
                frame: *frame,
                statistics: Vec::<Statistic>::new(),
            }),
            Packet::NodeFlushFrames {
                request: Some(request),
                frame,
                ..
            } => Some(Packet::NodeFlushReply {
                request: *request,
                finished: *frame,
            }),
            _ => None,
        };
        if let Some(reply) = reply
            && let Err(e) = self.command(reply)
        {
            tracing::debug!(app = %self.name, "local reply dropped: {e}");
        }
    }
}

impl NetNode for LoopbackApp {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    fn send(&self, packet: Packet) -> ClusterResult<()> {
        if !self.is_connected() {
            return Err(ClusterError::connection("application is disconnected"));
        }
        self.serve_local(&packet);
        self.received.lock().push(packet);
        self.arrived.notify_all();
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/net/loopback.rs"]
mod tests;
