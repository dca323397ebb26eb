use crate::foundation::error::{ClusterError, ClusterResult};
use crate::foundation::ids::{NodeId, PipeId, RequestId, SessionId};
use crate::net::link::{ConnectionDescription, NetContext, NetNodeRef, NodeLaunch};
use crate::net::packets::{FrameTask, Packet};
use crate::net::requests::Reply;
use crate::settings::ServerSettings;
use std::time::Duration;

/// Run state of a node's render client.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeState {
    Stopped,
    Running,
}

/// Participation record of one host in a configuration.
#[derive(Clone, Debug)]
pub struct Node {
    pub name: String,
    /// Host the render client runs on. Empty for the application's own node.
    pub host: String,
    pub descriptions: Vec<ConnectionDescription>,
    /// Per-node overrides of the server launch settings.
    pub launch_timeout: Option<Duration>,
    pub launch_command: Option<String>,
    pub launch_quote: Option<char>,
    app_node: bool,
    activation: u32,
    state: NodeState,
    finished_frame: u32,
    link: Option<NetNodeRef>,
    pub(crate) pipes: Vec<PipeId>,
    error: String,
    pending: Option<RequestId>,
}

impl Node {
    pub fn new(name: impl Into<String>, host: impl Into<String>) -> Self {
        let host = host.into();
        Self {
            name: name.into(),
            descriptions: vec![ConnectionDescription {
                hostname: host.clone(),
                port: 0,
            }],
            host,
            launch_timeout: None,
            launch_command: None,
            launch_quote: None,
            app_node: false,
            activation: 0,
            state: NodeState::Stopped,
            finished_frame: 0,
            link: None,
            pipes: Vec::new(),
            error: String::new(),
            pending: None,
        }
    }

    /// The application's own node. It is never launched; its link is the application connection.
    pub fn application(name: impl Into<String>) -> Self {
        Self {
            app_node: true,
            descriptions: Vec::new(),
            ..Self::new(name, "")
        }
    }

    pub fn is_application_node(&self) -> bool {
        self.app_node
    }

    pub fn pipes(&self) -> &[PipeId] {
        &self.pipes
    }

    pub fn activate(&mut self) {
        self.activation += 1;
    }

    pub fn deactivate(&mut self) {
        debug_assert!(self.activation > 0, "unbalanced node deactivation");
        self.activation = self.activation.saturating_sub(1);
    }

    pub fn is_active(&self) -> bool {
        self.activation > 0
    }

    pub fn state(&self) -> NodeState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == NodeState::Running
    }

    pub fn finished_frame(&self) -> u32 {
        self.finished_frame
    }

    /// Record a finished frame report. Stale reports never move the counter back.
    pub fn set_finished_frame(&mut self, frame: u32) {
        self.finished_frame = self.finished_frame.max(frame);
    }

    pub fn reset_frames(&mut self) {
        self.finished_frame = 0;
    }

    pub fn error(&self) -> &str {
        &self.error
    }

    pub fn link(&self) -> Option<&NetNodeRef> {
        self.link.as_ref()
    }

    /// Bind an already established connection, used for the application node.
    pub fn attach(&mut self, link: NetNodeRef) {
        self.link = Some(link);
    }

    /// Forget the connection without closing it.
    pub fn detach(&mut self) -> Option<NetNodeRef> {
        self.link.take()
    }

    pub fn is_connected(&self) -> bool {
        self.link.as_ref().is_some_and(|l| l.is_connected())
    }

    /// Launch attributes of this node, server defaults overridden by the node's own.
    pub fn launch(
        &self,
        id: NodeId,
        settings: &ServerSettings,
        program: &str,
        work_dir: &str,
    ) -> NodeLaunch {
        NodeLaunch {
            node: id,
            name: self.name.clone(),
            descriptions: self.descriptions.clone(),
            launch_timeout: self.launch_timeout.unwrap_or(settings.launch_timeout()),
            launch_command: self
                .launch_command
                .clone()
                .unwrap_or_else(|| settings.launch_command.clone()),
            launch_quote: self.launch_quote.unwrap_or(settings.launch_quote),
            program: program.to_owned(),
            work_dir: work_dir.to_owned(),
            auto_launch: true,
        }
    }

    /// Start connecting. An existing link only reports whether it is still connected.
    pub fn connect(&mut self, net: &NetContext, launch: &NodeLaunch) -> bool {
        if let Some(link) = &self.link {
            return link.is_connected();
        }
        if self.app_node {
            self.error = "application node has no connection".to_owned();
            return false;
        }

        tracing::debug!(node = %self.name, hosts = ?launch.hostnames(), "connecting node");
        match net.connector.initiate_connection(launch) {
            Ok(link) => {
                self.link = Some(link);
                true
            }
            Err(e) => {
                self.error = e.to_string();
                false
            }
        }
    }

    /// Wait for an initiated connection within what is left of the pass's launch budget.
    pub fn sync_connect(&mut self, net: &NetContext, remaining: Duration) -> bool {
        let Some(link) = &self.link else {
            return false;
        };
        if link.is_connected() {
            return true;
        }
        if net.connector.await_connection(link, remaining) {
            return true;
        }
        net.connector.close(link);
        self.link = None;
        false
    }

    /// Drop the connection. The application owns its own link, so it is only detached.
    pub fn disconnect(&mut self, net: &NetContext) {
        let Some(link) = self.detach() else {
            return;
        };
        if !self.app_node {
            net.connector.close(&link);
        }
        self.state = NodeState::Stopped;
    }

    pub fn send(&self, packet: Packet) -> ClusterResult<()> {
        match &self.link {
            Some(link) => link.send(packet),
            None => Err(ClusterError::connection(format!(
                "node {} is not connected",
                self.name
            ))),
        }
    }

    /// First half of a running-state change: issue the update, do not wait.
    pub fn update_running(
        &mut self,
        net: &NetContext,
        session: SessionId,
        id: NodeId,
        init_id: u32,
        frame: u32,
        channels: Vec<String>,
    ) {
        self.error.clear();
        if !self.is_connected() {
            self.pending = None;
            if self.is_active() {
                self.error = "node is not connected".to_owned();
            }
            return;
        }

        let request = net.requests.register();
        let packet = Packet::NodeUpdateRunning {
            session,
            node: id,
            request,
            init_id,
            frame,
            active: self.is_active(),
            channels,
        };
        match self.send(packet) {
            Ok(()) => self.pending = Some(request),
            Err(e) => {
                net.requests.cancel(request);
                self.pending = None;
                self.error = e.to_string();
            }
        }
    }

    /// Second half of a running-state change: await the reply issued by [`Self::update_running`].
    pub fn sync_running(&mut self, net: &NetContext, timeout: Duration) -> bool {
        let Some(request) = self.pending.take() else {
            if !self.is_active() {
                self.state = NodeState::Stopped;
            }
            return self.error.is_empty();
        };

        match net.requests.wait(request, timeout) {
            Some(Reply::Running(Ok(()))) => {
                self.state = if self.is_active() {
                    NodeState::Running
                } else {
                    NodeState::Stopped
                };
                true
            }
            Some(Reply::Running(Err(msg))) => {
                self.state = NodeState::Stopped;
                self.error = msg;
                false
            }
            Some(other) => {
                self.state = NodeState::Stopped;
                self.error = format!("unexpected reply {other:?}");
                false
            }
            None => {
                self.state = NodeState::Stopped;
                self.error = "no reply to running-state update".to_owned();
                false
            }
        }
    }

    /// Hand the node its tasks for one frame.
    pub fn update(
        &self,
        session: SessionId,
        id: NodeId,
        frame_id: u32,
        frame: u32,
        version: u64,
        tasks: Vec<FrameTask>,
    ) -> ClusterResult<()> {
        self.send(Packet::NodeFrameStart {
            session,
            node: id,
            frame_id,
            frame,
            version,
            tasks,
        })
    }

    pub fn flush_frames(
        &self,
        session: SessionId,
        frame: u32,
        request: Option<RequestId>,
    ) -> ClusterResult<()> {
        self.send(Packet::NodeFlushFrames {
            session,
            frame,
            request,
        })
    }
}

#[cfg(test)]
#[path = "../../tests/unit/server/node.rs"]
mod tests;
