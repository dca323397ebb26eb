use crate::compound::statistics::{Statistic, StatisticsLog};
use crate::display::canvas::{activate_canvas, exit_canvas, find_channel, init_canvas, update_canvas};
use crate::foundation::core::Eyes;
use crate::foundation::error::{ClusterError, ClusterResult};
use crate::foundation::ids::{CanvasId, ChannelId, CompoundId, NodeId, SegmentId, SessionId, ViewId, Visit};
use crate::net::link::{NetContext, NetNodeRef};
use crate::net::packets::{ConfigEvent, FrameTask, Packet};
use crate::net::requests::Reply;
use crate::resources::Resources;
use crate::server::snapshot::{TaskSnapshot, fingerprint};
use crate::settings::ServerSettings;

/// Run state of a configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunState {
    Stopped,
    Initializing,
    Running,
    Exiting,
}

/// One application session: the cluster resources, the compound tree, and the frame protocol
/// driving them.
///
/// A configuration is only ever mutated by the dispatch loop that owns it.
#[derive(Clone, Debug)]
pub struct Config {
    pub(crate) name: String,
    pub(crate) session: SessionId,
    pub(crate) state: RunState,
    pub(crate) current_frame: u32,
    pub(crate) finished_frame: u32,
    pub(crate) init_id: u32,
    pub(crate) error: String,
    pub(crate) work_dir: String,
    pub(crate) render_client: String,
    pub(crate) app_link: Option<NetNodeRef>,
    pub(crate) latency: u32,
    initial_latency: u32,
    pub(crate) needs_finish: bool,
    pub(crate) version: u64,
    fingerprint: Option<u64>,
    pub(crate) eyes: Eyes,
    pub(crate) settings: ServerSettings,
    pub(crate) resources: Resources,
    pub(crate) stats: StatisticsLog,
    pub(crate) net: NetContext,
}

impl Config {
    pub fn new(
        name: impl Into<String>,
        mut resources: Resources,
        settings: ServerSettings,
        net: NetContext,
    ) -> Self {
        let latency = settings.latency;
        resources.compounds.set_latency(latency);
        Self {
            name: name.into(),
            session: SessionId(0),
            state: RunState::Stopped,
            current_frame: 0,
            finished_frame: 0,
            init_id: 0,
            error: String::new(),
            work_dir: String::new(),
            render_client: String::new(),
            app_link: None,
            latency,
            initial_latency: latency,
            needs_finish: false,
            version: 0,
            fingerprint: None,
            eyes: Eyes::CYCLOP,
            settings,
            resources,
            stats: StatisticsLog::new(),
            net,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    pub(crate) fn set_session(&mut self, session: SessionId) {
        self.session = session;
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == RunState::Running
    }

    pub fn current_frame(&self) -> u32 {
        self.current_frame
    }

    pub fn finished_frame(&self) -> u32 {
        self.finished_frame
    }

    /// Aggregated error text of the last reconciliation.
    pub fn error(&self) -> &str {
        &self.error
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn latency(&self) -> u32 {
        self.latency
    }

    pub fn needs_finish(&self) -> bool {
        self.needs_finish
    }

    pub fn work_dir(&self) -> &str {
        &self.work_dir
    }

    pub fn render_client(&self) -> &str {
        &self.render_client
    }

    pub fn set_work_dir(&mut self, work_dir: impl Into<String>) {
        self.work_dir = work_dir.into();
    }

    pub fn set_render_client(&mut self, render_client: impl Into<String>) {
        self.render_client = render_client.into();
    }

    /// Eye passes rendered per frame.
    pub fn set_eyes(&mut self, eyes: Eyes) {
        self.eyes = eyes;
    }

    pub fn resources(&self) -> &Resources {
        &self.resources
    }

    pub fn resources_mut(&mut self) -> &mut Resources {
        &mut self.resources
    }

    pub fn statistics(&self) -> &StatisticsLog {
        &self.stats
    }

    /// Bind the controlling application. Only allowed while stopped.
    pub fn set_application_link(&mut self, link: Option<NetNodeRef>) -> ClusterResult<()> {
        if self.state != RunState::Stopped {
            return Err(ClusterError::invalid_state(format!(
                "cannot rebind the application of {} while {:?}",
                self.name, self.state
            )));
        }
        self.app_link = link;
        Ok(())
    }

    pub fn application_link(&self) -> Option<&NetNodeRef> {
        self.app_link.as_ref()
    }

    /// Back to the state of a freshly loaded configuration.
    pub fn restore(&mut self) {
        self.current_frame = 0;
        self.finished_frame = 0;
        self.app_link = None;
        self.work_dir.clear();
        self.render_client.clear();
        self.latency = self.initial_latency;
        self.resources.compounds.set_latency(self.latency);
        self.resources.compounds.freeze_equalizers(false);
        self.stats.clear();
    }

    pub fn find_application_node(&self) -> Option<NodeId> {
        self.resources.topology.find_application_node()
    }

    pub fn find_channel(&self, segment: SegmentId, view: ViewId) -> Option<ChannelId> {
        find_channel(&self.resources.topology, segment, view)
    }

    /// Create the destination channels of a canvas.
    pub fn activate_canvas(&mut self, canvas: CanvasId) -> Vec<ChannelId> {
        let r = &mut self.resources;
        activate_canvas(&r.display, &mut r.topology, canvas)
    }

    /// Create compounds for the canvas's destination channels that have none yet.
    pub fn update_canvas(&mut self, canvas: CanvasId) -> Vec<CompoundId> {
        let r = &mut self.resources;
        update_canvas(&r.display, &r.topology, &mut r.compounds, canvas)
    }

    pub(crate) fn send_app(&self, packet: Packet) {
        let Some(app) = &self.app_link else {
            tracing::debug!(config = %self.name, kind = packet.kind(), "no application to notify");
            return;
        };
        if let Err(e) = app.send(packet) {
            tracing::warn!(config = %self.name, "application notification failed: {e}");
        }
    }

    pub(crate) fn append_error(&mut self, msg: &str) {
        self.error.push_str(msg);
    }

    /// Initialize every entity and start the cluster.
    ///
    /// On failure the configuration is exited again and the aggregated error is returned; it
    /// also stays available through [`Self::error`].
    #[tracing::instrument(skip(self), fields(config = %self.name))]
    pub fn init(&mut self, init_id: u32) -> ClusterResult<()> {
        if self.state != RunState::Stopped {
            return Err(ClusterError::invalid_state(format!(
                "init of {} while {:?}",
                self.name, self.state
            )));
        }
        self.state = RunState::Initializing;
        self.current_frame = 0;
        self.finished_frame = 0;
        self.init_id = init_id;
        for (_, node) in self.resources.topology.nodes.iter_mut() {
            node.reset_frames();
        }

        let r = &mut self.resources;
        r.display.init_observers();
        for canvas in r.display.canvases.ids() {
            init_canvas(&mut r.display, &mut r.topology, canvas);
        }
        for root in r.compounds.roots().to_vec() {
            r.compounds.init(root, &mut r.topology);
        }

        if !self.update_running() {
            let error = self.error.clone();
            self.exit();
            self.error = error.clone();
            return Err(ClusterError::node(error));
        }

        self.needs_finish = false;
        self.state = RunState::Running;
        tracing::info!("configuration running");
        Ok(())
    }

    /// Stop the cluster and release every entity. Returns whether the final reconciliation
    /// succeeded.
    #[tracing::instrument(skip(self), fields(config = %self.name))]
    pub fn exit(&mut self) -> bool {
        if self.state == RunState::Stopped || self.state == RunState::Exiting {
            tracing::warn!(state = ?self.state, "exit of a configuration that is not running");
            return false;
        }
        if self.state != RunState::Running {
            tracing::warn!("exiting non-initialized configuration");
        }
        self.state = RunState::Exiting;

        let r = &mut self.resources;
        for root in r.compounds.roots().to_vec() {
            r.compounds.exit(root, &mut r.topology);
        }
        for canvas in r.display.canvases.ids() {
            exit_canvas(&mut r.display, &mut r.topology, canvas);
        }
        r.display.exit_observers();

        let success = self.update_running();

        for root in self.resources.compounds.roots().to_vec() {
            self.resources.compounds.deregister(root);
        }
        self.send_app(Packet::ConfigEvent(ConfigEvent::Exit));

        self.needs_finish = false;
        self.state = RunState::Stopped;
        success
    }

    /// Start the next frame on every active node.
    #[tracing::instrument(skip(self), fields(config = %self.name))]
    pub fn start_frame(&mut self, frame_id: u32) -> ClusterResult<()> {
        if self.state != RunState::Running {
            return Err(ClusterError::invalid_state(format!(
                "start frame of {} while {:?}",
                self.name, self.state
            )));
        }

        self.current_frame += 1;
        tracing::debug!(frame = self.current_frame, "start frame");

        for root in self.resources.compounds.roots().to_vec() {
            self.resources.compounds.update(root, &self.stats);
        }
        let snapshot = self.commit();

        let mut app_node_running = false;
        for (node_id, tasks) in snapshot {
            let node = &self.resources.topology.nodes[node_id];
            if node.is_application_node() {
                app_node_running = true;
            }
            let sent = node.update(
                self.session,
                node_id,
                frame_id,
                self.current_frame,
                self.version,
                tasks,
            );
            if let Err(e) = sent {
                tracing::warn!(node = %node.name, "frame start not delivered: {e}");
            }
        }

        if !app_node_running {
            self.send_app(Packet::ConfigReleaseFrameLocal {
                frame: self.current_frame,
            });
        }

        // no active node at all must still finish the frame
        self.notify_node_frame_finished(self.current_frame);
        Ok(())
    }

    /// Advance the finished frame once every active node has reached `frame`.
    pub fn notify_node_frame_finished(&mut self, frame: u32) {
        if self.finished_frame >= frame {
            return;
        }
        let all_done = self
            .resources
            .topology
            .nodes
            .iter()
            .all(|(_, n)| !n.is_active() || n.finished_frame() >= frame);
        if !all_done {
            return;
        }

        self.finished_frame = frame;
        self.send_app(Packet::ConfigFrameFinished {
            session: self.session,
            frame,
        });
    }

    /// Record a node's finished frame and its task timings.
    pub fn node_frame_finished(&mut self, node: NodeId, frame: u32, statistics: Vec<Statistic>) {
        if frame > self.current_frame {
            tracing::warn!(node = node.0, frame, current = self.current_frame, "finish report from the future");
            return;
        }
        let Some(n) = self.resources.topology.nodes.get_mut(node) else {
            tracing::warn!(node = node.0, "finish report from unknown node");
            return;
        };
        n.set_finished_frame(frame);
        for stat in statistics {
            self.stats.record(stat);
        }
        self.notify_node_frame_finished(frame);
    }

    /// Change the pipeline depth of every frame edge and swap barrier.
    pub fn change_latency(&mut self, latency: u32) {
        if self.latency == latency {
            return;
        }
        self.latency = latency;
        self.resources.compounds.set_latency(latency);
        self.needs_finish = true;
    }

    pub fn freeze_load_balancing(&mut self, freeze: bool) {
        let n = self.resources.compounds.freeze_equalizers(freeze);
        tracing::debug!(config = %self.name, freeze, balancers = n, "freeze load balancing");
    }

    /// Ask every active node to finish its queued frames.
    pub fn flush_all_frames(&mut self) {
        if self.current_frame == 0 {
            return;
        }
        for (_, node) in self.resources.topology.nodes.iter() {
            if !node.is_active() {
                continue;
            }
            if let Err(e) = node.flush_frames(self.session, self.current_frame, None) {
                tracing::warn!(node = %node.name, "flush not delivered: {e}");
            }
        }
        tracing::debug!(config = %self.name, frame = self.current_frame, "flush all frames");
    }

    /// Flush every active node and wait until the current frame is finished cluster-wide.
    pub fn flush_and_wait(&mut self) -> bool {
        if self.current_frame == 0 {
            return true;
        }

        let mut pending = Vec::new();
        for (id, node) in self.resources.topology.nodes.iter() {
            if !node.is_active() {
                continue;
            }
            let request = self.net.requests.register();
            match node.flush_frames(self.session, self.current_frame, Some(request)) {
                Ok(()) => pending.push((id, request)),
                Err(e) => {
                    self.net.requests.cancel(request);
                    tracing::warn!(node = %node.name, "flush not delivered: {e}");
                }
            }
        }

        let timeout = self.settings.reply_timeout();
        for (id, request) in pending {
            match self.net.requests.wait(request, timeout) {
                Some(Reply::Flushed(finished)) => {
                    self.resources.topology.nodes[id].set_finished_frame(finished.min(self.current_frame));
                }
                other => {
                    tracing::warn!(node = id.0, reply = ?other, "no flush reply");
                }
            }
        }

        self.notify_node_frame_finished(self.current_frame);
        self.finished_frame == self.current_frame
    }

    /// Tasks of every active node for the current decomposition. Bumps the version when they
    /// differ from the previous commit.
    pub(crate) fn commit(&mut self) -> TaskSnapshot {
        let snapshot: TaskSnapshot = self
            .resources
            .topology
            .nodes
            .iter()
            .filter(|(_, n)| n.is_active())
            .map(|(id, _)| (id, self.collect_tasks(id)))
            .collect();

        let fp = fingerprint(&snapshot);
        if self.fingerprint != Some(fp) {
            self.fingerprint = Some(fp);
            self.version += 1;
        }
        snapshot
    }

    /// Draw and assemble tasks of the active compounds rendering on `node`.
    pub fn collect_tasks(&self, node: NodeId) -> Vec<FrameTask> {
        let r = &self.resources;
        let mut tasks = Vec::new();
        r.compounds.walk_all(&mut |id, c| {
            if !c.is_active() {
                return Visit::Prune;
            }
            let draws = c.children().is_empty();
            if !draws && c.input_frames.is_empty() {
                return Visit::Continue;
            }
            let Some(channel) = r.compounds.channel(id) else {
                return Visit::Continue;
            };
            if r.topology.node_of_channel(channel) != Some(node) {
                return Visit::Continue;
            }
            let eyes = r.compounds.effective_eyes(id) & self.eyes;
            if eyes.is_empty() {
                return Visit::Continue;
            }

            tasks.push(FrameTask {
                compound: id,
                channel,
                channel_name: r.topology.channels[channel].name.clone(),
                eyes,
                range: r.compounds.effective_range(id),
                viewport: r.compounds.effective_viewport(id),
                buffers: c.buffers,
                inputs: c.input_frames.iter().map(|f| f.name.clone()).collect(),
                outputs: c.output_frames.iter().map(|f| f.name.clone()).collect(),
            });
            Visit::Continue
        });
        tasks
    }
}

#[cfg(test)]
#[path = "../../tests/unit/server/config.rs"]
mod tests;
