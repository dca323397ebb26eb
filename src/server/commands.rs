use crate::foundation::error::{ClusterError, ClusterResult};
use crate::foundation::ids::RequestId;
use crate::net::link::NetNodeRef;
use crate::net::packets::Packet;
use crate::server::config::{Config, RunState};

fn reply(to: &NetNodeRef, packet: Packet) {
    if let Err(e) = to.send(packet) {
        tracing::warn!(to = to.name(), "reply not delivered: {e}");
    }
}

impl Config {
    /// Handle one session command. Packets that are not session commands are a protocol error.
    pub fn dispatch(&mut self, from: &NetNodeRef, packet: Packet) -> ClusterResult<()> {
        match packet {
            Packet::ConfigInit {
                request, init_id, ..
            } => self.cmd_init(from, request, init_id),
            Packet::ConfigExit { request, .. } => self.cmd_exit(from, request),
            Packet::ConfigStartFrame {
                request, frame_id, ..
            } => return self.cmd_start_frame(from, request, frame_id),
            Packet::ConfigFinishAllFrames { .. } => self.flush_all_frames(),
            Packet::ConfigFreezeLoadBalancing { freeze, .. } => self.freeze_load_balancing(freeze),
            Packet::NodeFrameFinished {
                node,
                frame,
                statistics,
                ..
            } => self.node_frame_finished(node, frame, statistics),
            other => {
                return Err(ClusterError::protocol(format!(
                    "{} is not a session command",
                    other.kind()
                )));
            }
        }
        Ok(())
    }

    fn cmd_init(&mut self, from: &NetNodeRef, request: RequestId, init_id: u32) {
        let result = self.init(init_id);
        match &result {
            Ok(()) => tracing::info!(config = %self.name, "config init successful"),
            Err(e) => tracing::info!(config = %self.name, "config init failed: {e}"),
        }

        self.commit();
        reply(
            from,
            Packet::ConfigInitReply {
                request,
                result: result.is_ok(),
                version: self.version,
                error: self.error.clone(),
            },
        );
        self.error.clear();
    }

    fn cmd_exit(&mut self, from: &NetNodeRef, request: RequestId) {
        let result = self.state == RunState::Running && self.exit();
        tracing::info!(config = %self.name, result, "config exit");
        reply(from, Packet::ConfigExitReply { request, result });
    }

    fn cmd_start_frame(
        &mut self,
        from: &NetNodeRef,
        request: RequestId,
        frame_id: u32,
    ) -> ClusterResult<()> {
        reply(
            from,
            Packet::ConfigSync {
                version: self.version,
            },
        );
        let needs_finish = self.needs_finish;
        reply(
            from,
            Packet::ConfigStartFrameReply {
                request,
                needs_finish,
            },
        );

        if needs_finish && !self.flush_and_wait() {
            tracing::warn!(config = %self.name, "pipeline not drained before frame start");
        }

        if self.state == RunState::Running && self.update_running() {
            self.start_frame(frame_id)?;
        } else {
            tracing::warn!(
                config = %self.name,
                "start frame failed, exiting config: {}",
                self.error
            );
            if self.state != RunState::Stopped {
                self.exit();
            }
            self.current_frame += 1;
        }

        if needs_finish {
            self.flush_all_frames();
            self.needs_finish = false;
        }

        if self.state == RunState::Stopped {
            // unlock the application
            reply(
                from,
                Packet::ConfigFrameFinished {
                    session: self.session,
                    frame: self.current_frame,
                },
            );
        }
        Ok(())
    }
}
