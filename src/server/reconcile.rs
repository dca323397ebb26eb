//! Applying staged changes of a configuration to the running cluster.
//!
//! One pass connects newly active nodes, creates the session on them, pushes every node's
//! running state, tears down nodes that became idle and finally deletes entities marked for
//! deletion. Passes run at init, at exit and before every frame.

use crate::display::canvas::{exit_canvas, purge_canvases};
use crate::foundation::ids::{NodeId, RequestId, WindowId};
use crate::net::link::NetNodeRef;
use crate::net::packets::Packet;
use crate::net::requests::Reply;
use crate::server::config::{Config, RunState};
use std::thread;
use std::time::Instant;

impl Config {
    /// Reconcile the cluster with the staged configuration. Returns `false` when a node could
    /// not be connected or failed its running-state change; the reasons are appended to the
    /// error message.
    pub(crate) fn update_running(&mut self) -> bool {
        if self.state == RunState::Stopped {
            return true;
        }
        self.error.clear();

        if !self.connect_nodes() {
            return false;
        }

        self.start_nodes();
        self.exit_deleted_canvases();
        let result = self.update_nodes();
        self.stop_nodes();
        self.delete_entities();
        self.sync_clock();
        result
    }

    fn active_nodes(&self) -> Vec<NodeId> {
        self.resources
            .topology
            .nodes
            .iter()
            .filter(|(_, n)| n.is_active())
            .map(|(id, _)| id)
            .collect()
    }

    fn connect_nodes(&mut self) -> bool {
        let clock = Instant::now();
        let nodes = self.active_nodes();

        let mut success = true;
        for &id in &nodes {
            if !self.connect_node(id) {
                success = false;
                break;
            }
        }

        for &id in &nodes {
            if !self.sync_connect_node(id, clock) {
                success = false;
            }
        }
        success
    }

    fn connect_node(&mut self, id: NodeId) -> bool {
        let node = &mut self.resources.topology.nodes[id];
        if node.is_application_node()
            && node.link().is_none()
            && let Some(app) = &self.app_link
        {
            node.attach(app.clone());
        }

        let launch = node.launch(id, &self.settings, &self.render_client, &self.work_dir);
        if node.connect(&self.net, &launch) {
            return true;
        }

        tracing::error!(node = %node.name, "connection failed: {}", node.error());
        let msg = format!(
            "Connection to node failed, node does not run and launch command failed: {}",
            node.name
        );
        self.append_error(&msg);
        false
    }

    fn sync_connect_node(&mut self, id: NodeId, clock: Instant) -> bool {
        let node = &mut self.resources.topology.nodes[id];
        if node.link().is_none() {
            return false;
        }

        let timeout = node.launch_timeout.unwrap_or(self.settings.launch_timeout());
        let remaining = timeout.saturating_sub(clock.elapsed());
        if node.sync_connect(&self.net, remaining) {
            return true;
        }

        let hosts: String = node
            .descriptions
            .iter()
            .map(|d| format!("{} ", d.hostname))
            .collect();
        let msg = format!("Connection of node failed, node did not start ( {hosts}) ");
        tracing::error!(node = %node.name, "{msg}");
        self.append_error(&msg);
        false
    }

    /// Create the session on every node that just became active. The application node got it
    /// when the session was chosen.
    fn start_nodes(&mut self) {
        let mut requests: Vec<(NodeId, RequestId)> = Vec::new();
        for (id, node) in self.resources.topology.nodes.iter() {
            if !node.is_active() || node.is_running() || node.is_application_node() {
                continue;
            }
            let request = self.net.requests.register();
            let packet = Packet::CreateConfig {
                session: self.session,
                name: self.name.clone(),
                request: Some(request),
                version: self.version,
            };
            match node.send(packet) {
                Ok(()) => requests.push((id, request)),
                Err(e) => {
                    self.net.requests.cancel(request);
                    tracing::warn!(node = %node.name, "create config not delivered: {e}");
                }
            }
        }

        let timeout = self.settings.reply_timeout();
        for (id, request) in requests {
            if self.net.requests.wait(request, timeout) != Some(Reply::Created) {
                let name = &self.resources.topology.nodes[id].name;
                tracing::warn!(node = %name, "no reply to create config");
            }
        }
    }

    fn exit_deleted_canvases(&mut self) {
        let r = &mut self.resources;
        let doomed: Vec<_> = r
            .display
            .canvases
            .iter()
            .filter(|(_, c)| c.needs_delete)
            .map(|(id, _)| id)
            .collect();
        for canvas in doomed {
            exit_canvas(&mut r.display, &mut r.topology, canvas);
        }
    }

    /// Push the running state to every node, then collect all answers.
    fn update_nodes(&mut self) -> bool {
        let ids = self.resources.topology.nodes.ids();
        for &id in &ids {
            let channels = self.resources.topology.active_channel_names(id);
            self.resources.topology.nodes[id].update_running(
                &self.net,
                self.session,
                id,
                self.init_id,
                self.current_frame,
                channels,
            );
        }

        let timeout = self.settings.reply_timeout();
        let mut result = true;
        for id in ids {
            let node = &mut self.resources.topology.nodes[id];
            if node.sync_running(&self.net, timeout) {
                continue;
            }
            let msg = format!("node {}: '{}'", node.name, node.error());
            self.append_error(&msg);
            result = false;
        }
        result
    }

    /// Release every render client that is not running, including active ones whose
    /// running-state change failed, and wait for them to disconnect.
    fn stop_nodes(&mut self) {
        let mut stopping: Vec<(String, NetNodeRef)> = Vec::new();
        for (_, node) in self.resources.topology.nodes.iter_mut() {
            if node.is_running() {
                continue;
            }
            if node.is_application_node() {
                node.detach();
                continue;
            }
            let Some(link) = node.detach() else {
                continue;
            };

            tracing::debug!(node = %node.name, "exiting node");
            for packet in [
                Packet::DestroyConfig {
                    session: self.session,
                },
                Packet::ClientExit,
            ] {
                if let Err(e) = link.send(packet) {
                    tracing::debug!(node = %node.name, "exit not delivered: {e}");
                }
            }
            stopping.push((node.name.clone(), link));
        }

        // one budget for all clients
        let interval = self.settings.teardown_poll_interval();
        let mut sleeps = self.settings.teardown_polls;
        for (name, link) in stopping {
            while sleeps > 0 && link.is_connected() {
                sleeps -= 1;
                if sleeps == 0 {
                    break;
                }
                thread::sleep(interval);
            }

            if link.is_connected() {
                tracing::warn!(node = %name, "forcefully disconnecting exited render client");
                self.net.connector.close(&link);
            }
            tracing::debug!(node = %name, "disconnected node");
        }
    }

    fn delete_entities(&mut self) {
        let r = &mut self.resources;
        let mut purged = purge_canvases(&mut r.display, &mut r.topology, &r.compounds);
        purged += r.display.purge();

        let doomed: Vec<WindowId> = r
            .topology
            .windows
            .iter()
            .filter(|(_, w)| w.needs_delete)
            .filter(|(_, w)| !w.channels().iter().any(|&c| r.compounds.uses_channel(c)))
            .map(|(id, _)| id)
            .collect();
        for window in doomed {
            if let Some(w) = r.topology.remove_window(window) {
                tracing::info!(window = %w.name, "deleting window");
                purged += 1;
            }
        }

        if purged > 0 {
            tracing::debug!(config = %self.name, purged, "deleted entities");
        }
    }

    fn sync_clock(&self) {
        let time_ms = self.net.time_ms();
        self.send_app(Packet::SyncClock { time_ms });

        for (_, node) in self.resources.topology.nodes.iter() {
            if !node.is_active() || node.is_application_node() {
                continue;
            }
            if let Err(e) = node.send(Packet::SyncClock { time_ms }) {
                tracing::warn!(node = %node.name, "clock sync not delivered: {e}");
            }
        }
    }
}
