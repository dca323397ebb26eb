use crate::compound::frame::FrameNameCounter;
use crate::foundation::error::{ClusterError, ClusterResult};
use crate::foundation::ids::{RequestId, SessionId};
use crate::net::link::{Connector, Incoming, NetContext, NetNodeRef, ServerInbox};
use crate::net::packets::Packet;
use crate::server::config::Config;
use crate::server::loader::ConfigDef;
use crate::settings::ServerSettings;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError, TryRecvError};
use std::time::Duration;

/// Session registry and dispatch loop.
///
/// Loaded configurations are templates; every application session runs on its own copy.
pub struct Server {
    settings: ServerSettings,
    net: NetContext,
    inbox: ServerInbox,
    queue: mpsc::Receiver<Incoming>,
    templates: Vec<Config>,
    configs: BTreeMap<SessionId, Config>,
    next_session: u32,
    config_counter: u32,
    counter: FrameNameCounter,
    running: bool,
}

fn reply(to: &NetNodeRef, packet: Packet) {
    if let Err(e) = to.send(packet) {
        tracing::warn!(to = to.name(), "reply not delivered: {e}");
    }
}

/// Split `workdir#renderClient`. Without a separator the whole string is the work directory.
fn split_renderer_info(info: &str) -> (&str, &str) {
    info.split_once('#').unwrap_or((info, ""))
}

impl Server {
    pub fn new(
        settings: ServerSettings,
        connector: Arc<dyn Connector>,
        inbox: ServerInbox,
        queue: mpsc::Receiver<Incoming>,
    ) -> Self {
        let net = NetContext::new(connector, &inbox);
        Self {
            settings,
            net,
            inbox,
            queue,
            templates: Vec::new(),
            configs: BTreeMap::new(),
            next_session: 1,
            config_counter: 0,
            counter: FrameNameCounter::new(),
            running: false,
        }
    }

    pub fn settings(&self) -> &ServerSettings {
        &self.settings
    }

    pub fn net(&self) -> &NetContext {
        &self.net
    }

    /// Where applications and render clients deliver their packets.
    pub fn inbox(&self) -> &ServerInbox {
        &self.inbox
    }

    pub fn frame_counter(&self) -> &FrameNameCounter {
        &self.counter
    }

    /// Add a template configuration.
    pub fn add_config(&mut self, config: Config) {
        tracing::debug!(config = %config.name(), "template added");
        self.templates.push(config);
    }

    /// Build a template from a definition and add it.
    pub fn load_config(&mut self, def: ConfigDef) -> ClusterResult<()> {
        let config = def.into_config(&self.settings, self.net.clone(), &self.counter)?;
        self.add_config(config);
        Ok(())
    }

    pub fn templates(&self) -> &[Config] {
        &self.templates
    }

    pub fn sessions(&self) -> Vec<SessionId> {
        self.configs.keys().copied().collect()
    }

    pub fn config(&self, session: SessionId) -> Option<&Config> {
        self.configs.get(&session)
    }

    pub fn config_mut(&mut self, session: SessionId) -> Option<&mut Config> {
        self.configs.get_mut(&session)
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    fn register(&mut self, mut config: Config, app: &NetNodeRef) -> SessionId {
        let session = SessionId(self.next_session);
        self.next_session += 1;
        config.set_session(session);
        if config.name().is_empty() {
            self.config_counter += 1;
            config.set_name(format!("CONFIG_{}", self.config_counter));
        }

        reply(
            app,
            Packet::CreateConfig {
                session,
                name: config.name().to_owned(),
                request: None,
                version: config.version(),
            },
        );
        tracing::info!(session = session.0, config = %config.name(), "session registered");
        self.configs.insert(session, config);
        session
    }

    /// Bind the first template to the application.
    pub fn choose_config(
        &mut self,
        from: &NetNodeRef,
        request: RequestId,
        renderer_info: &str,
    ) -> Option<SessionId> {
        let Some(template) = self.templates.first() else {
            tracing::warn!("no configuration available");
            reply(
                from,
                Packet::ChooseConfigReply {
                    request,
                    session: None,
                },
            );
            return None;
        };

        let mut config = template.clone();
        let (work_dir, render_client) = split_renderer_info(renderer_info);
        config.set_work_dir(work_dir);
        config.set_render_client(render_client);
        self.bind(config, from, request)
    }

    /// Bind a configuration given as `workdir#renderClient#configText`.
    pub fn use_config(
        &mut self,
        from: &NetNodeRef,
        request: RequestId,
        config_info: &str,
    ) -> Option<SessionId> {
        let mut parts = config_info.splitn(3, '#');
        let work_dir = parts.next().unwrap_or_default();
        let render_client = parts.next().unwrap_or_default();
        let text = parts.next().unwrap_or_default();

        let parsed = if text.trim().is_empty() {
            Err(ClusterError::config("empty configuration text"))
        } else {
            ConfigDef::from_json(text)
                .and_then(|def| def.into_config(&self.settings, self.net.clone(), &self.counter))
        };
        let mut config = match parsed {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("use config failed: {e}");
                reply(
                    from,
                    Packet::ChooseConfigReply {
                        request,
                        session: None,
                    },
                );
                return None;
            }
        };

        config.set_work_dir(work_dir);
        config.set_render_client(render_client);
        self.bind(config, from, request)
    }

    fn bind(&mut self, mut config: Config, from: &NetNodeRef, request: RequestId) -> Option<SessionId> {
        let session = match config.set_application_link(Some(from.clone())) {
            Ok(()) => Some(self.register(config, from)),
            Err(e) => {
                tracing::warn!("cannot bind application: {e}");
                None
            }
        };
        reply(from, Packet::ChooseConfigReply { request, session });
        session
    }

    /// Exit and forget a session. Always replies.
    pub fn release_config(&mut self, from: &NetNodeRef, request: RequestId, session: SessionId) {
        match self.configs.remove(&session) {
            None => tracing::warn!(session = session.0, "release of unknown session"),
            Some(mut config) => {
                if config.is_running() {
                    tracing::warn!(config = %config.name(), "releasing running configuration");
                    config.exit();
                }
                reply(from, Packet::DestroyConfig { session });
                tracing::info!(session = session.0, config = %config.name(), "session released");
            }
        }
        reply(from, Packet::ReleaseConfigReply { request });
    }

    /// Stop the dispatch loop. Refused while sessions exist.
    pub fn shutdown(&mut self, from: &NetNodeRef, request: RequestId) -> bool {
        let result = self.configs.is_empty();
        if result {
            tracing::info!("server shutdown");
            self.running = false;
        } else {
            tracing::warn!(sessions = self.configs.len(), "shutdown refused, sessions still open");
        }
        reply(from, Packet::ShutdownReply { request, result });
        result
    }

    /// Handle one received packet.
    pub fn handle(&mut self, incoming: Incoming) -> ClusterResult<()> {
        let Incoming { from, packet } = incoming;
        tracing::trace!(from = from.name(), kind = packet.kind(), "dispatch");

        let session = match &packet {
            Packet::ChooseConfig {
                request,
                renderer_info,
            } => {
                self.choose_config(&from, *request, renderer_info);
                return Ok(());
            }
            Packet::UseConfig {
                request,
                config_info,
            } => {
                self.use_config(&from, *request, config_info);
                return Ok(());
            }
            Packet::ReleaseConfig { request, session } => {
                self.release_config(&from, *request, *session);
                return Ok(());
            }
            Packet::Shutdown { request } => {
                self.shutdown(&from, *request);
                return Ok(());
            }
            Packet::ConfigInit { session, .. }
            | Packet::ConfigExit { session, .. }
            | Packet::ConfigStartFrame { session, .. }
            | Packet::ConfigFinishAllFrames { session }
            | Packet::ConfigFreezeLoadBalancing { session, .. }
            | Packet::NodeFrameFinished { session, .. } => *session,
            other => {
                return Err(ClusterError::protocol(format!(
                    "unexpected {} from {}",
                    other.kind(),
                    from.name()
                )));
            }
        };

        match self.configs.get_mut(&session) {
            Some(config) => config.dispatch(&from, packet),
            None => {
                tracing::warn!(session = session.0, kind = packet.kind(), "command for unknown session");
                Ok(())
            }
        }
    }

    /// Handle the next packet if one arrives within `timeout`. Returns whether one was handled.
    pub fn poll(&mut self, timeout: Duration) -> ClusterResult<bool> {
        match self.queue.recv_timeout(timeout) {
            Ok(incoming) => {
                self.handle(incoming)?;
                Ok(true)
            }
            Err(RecvTimeoutError::Timeout) => Ok(false),
            Err(RecvTimeoutError::Disconnected) => {
                Err(ClusterError::connection("server dispatch queue is closed"))
            }
        }
    }

    /// Handle everything already queued.
    pub fn process_pending(&mut self) -> ClusterResult<usize> {
        let mut handled = 0;
        loop {
            match self.queue.try_recv() {
                Ok(incoming) => {
                    self.handle(incoming)?;
                    handled += 1;
                }
                Err(TryRecvError::Empty) => return Ok(handled),
                Err(TryRecvError::Disconnected) => {
                    return Err(ClusterError::connection("server dispatch queue is closed"));
                }
            }
        }
    }

    /// Dispatch until shut down.
    #[tracing::instrument(skip(self))]
    pub fn run(&mut self) -> ClusterResult<()> {
        if self.templates.is_empty() {
            return Err(ClusterError::config("no configuration loaded"));
        }
        self.running = true;
        tracing::info!(templates = self.templates.len(), "server running");
        while self.running {
            let incoming = self
                .queue
                .recv()
                .map_err(|_| ClusterError::connection("server dispatch queue is closed"))?;
            self.handle(incoming)?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/server/registry.rs"]
mod tests;
