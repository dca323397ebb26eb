use crate::compound::statistics::Statistic;
use crate::foundation::core::{Buffers, Eyes, Range, Viewport};
use crate::foundation::ids::{ChannelId, CompoundId, NodeId, RequestId, SessionId};

/// One rendering task a node executes for a frame, derived from a leaf compound.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FrameTask {
    pub compound: CompoundId,
    pub channel: ChannelId,
    pub channel_name: String,
    pub eyes: Eyes,
    pub range: Range,
    pub viewport: Viewport,
    pub buffers: Buffers,
    /// Frame edges read before assembling.
    pub inputs: Vec<String>,
    /// Frame edges written after drawing.
    pub outputs: Vec<String>,
}

/// Events pushed to the application outside of request/reply pairs.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ConfigEvent {
    /// The configuration exited and all render clients were released.
    Exit,
}

/// Every message exchanged between the server, the application and render clients.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Packet {
    // application -> server
    ChooseConfig {
        request: RequestId,
        renderer_info: String,
    },
    UseConfig {
        request: RequestId,
        config_info: String,
    },
    ReleaseConfig {
        request: RequestId,
        session: SessionId,
    },
    Shutdown {
        request: RequestId,
    },
    ConfigInit {
        session: SessionId,
        request: RequestId,
        init_id: u32,
    },
    ConfigExit {
        session: SessionId,
        request: RequestId,
    },
    ConfigStartFrame {
        session: SessionId,
        request: RequestId,
        frame_id: u32,
    },
    ConfigFinishAllFrames {
        session: SessionId,
    },
    ConfigFreezeLoadBalancing {
        session: SessionId,
        freeze: bool,
    },

    // render client -> server
    ConfigCreateReply {
        request: RequestId,
    },
    NodeRunningReply {
        request: RequestId,
        result: Result<(), String>,
    },
    NodeFlushReply {
        request: RequestId,
        finished: u32,
    },
    NodeFrameFinished {
        session: SessionId,
        node: NodeId,
        frame: u32,
        statistics: Vec<Statistic>,
    },

    // server -> application
    ChooseConfigReply {
        request: RequestId,
        session: Option<SessionId>,
    },
    ReleaseConfigReply {
        request: RequestId,
    },
    ShutdownReply {
        request: RequestId,
        result: bool,
    },
    ConfigInitReply {
        request: RequestId,
        result: bool,
        version: u64,
        error: String,
    },
    ConfigExitReply {
        request: RequestId,
        result: bool,
    },
    ConfigSync {
        version: u64,
    },
    ConfigStartFrameReply {
        request: RequestId,
        needs_finish: bool,
    },
    ConfigFrameFinished {
        session: SessionId,
        frame: u32,
    },
    ConfigReleaseFrameLocal {
        frame: u32,
    },
    ConfigEvent(ConfigEvent),

    // server -> application and render clients
    CreateConfig {
        session: SessionId,
        name: String,
        request: Option<RequestId>,
        version: u64,
    },
    DestroyConfig {
        session: SessionId,
    },
    SyncClock {
        time_ms: u64,
    },

    // server -> render client
    NodeUpdateRunning {
        session: SessionId,
        node: NodeId,
        request: RequestId,
        init_id: u32,
        frame: u32,
        active: bool,
        channels: Vec<String>,
    },
    NodeFrameStart {
        session: SessionId,
        node: NodeId,
        frame_id: u32,
        frame: u32,
        version: u64,
        tasks: Vec<FrameTask>,
    },
    NodeFlushFrames {
        session: SessionId,
        frame: u32,
        request: Option<RequestId>,
    },
    ClientExit,
}

impl Packet {
    /// Request id of a reply that is resolved through the pending-request table instead of the
    /// dispatch queue.
    pub fn reply_request(&self) -> Option<RequestId> {
        match self {
            Packet::ConfigCreateReply { request }
            | Packet::NodeRunningReply { request, .. }
            | Packet::NodeFlushReply { request, .. } => Some(*request),
            _ => None,
        }
    }

    /// Short variant name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Packet::ChooseConfig { .. } => "ChooseConfig",
            Packet::UseConfig { .. } => "UseConfig",
            Packet::ReleaseConfig { .. } => "ReleaseConfig",
            Packet::Shutdown { .. } => "Shutdown",
            Packet::ConfigInit { .. } => "ConfigInit",
            Packet::ConfigExit { .. } => "ConfigExit",
            Packet::ConfigStartFrame { .. } => "ConfigStartFrame",
            Packet::ConfigFinishAllFrames { .. } => "ConfigFinishAllFrames",
            Packet::ConfigFreezeLoadBalancing { .. } => "ConfigFreezeLoadBalancing",
            Packet::ConfigCreateReply { .. } => "ConfigCreateReply",
            Packet::NodeRunningReply { .. } => "NodeRunningReply",
            Packet::NodeFlushReply { .. } => "NodeFlushReply",
            Packet::NodeFrameFinished { .. } => "NodeFrameFinished",
            Packet::ChooseConfigReply { .. } => "ChooseConfigReply",
            Packet::ReleaseConfigReply { .. } => "ReleaseConfigReply",
            Packet::ShutdownReply { .. } => "ShutdownReply",
            Packet::ConfigInitReply { .. } => "ConfigInitReply",
            Packet::ConfigExitReply { .. } => "ConfigExitReply",
            Packet::ConfigSync { .. } => "ConfigSync",
            Packet::ConfigStartFrameReply { .. } => "ConfigStartFrameReply",
            Packet::ConfigFrameFinished { .. } => "ConfigFrameFinished",
            Packet::ConfigReleaseFrameLocal { .. } => "ConfigReleaseFrameLocal",
            Packet::ConfigEvent(_) => "ConfigEvent",
            Packet::CreateConfig { .. } => "CreateConfig",
            Packet::DestroyConfig { .. } => "DestroyConfig",
            Packet::SyncClock { .. } => "SyncClock",
            Packet::NodeUpdateRunning { .. } => "NodeUpdateRunning",
            Packet::NodeFrameStart { .. } => "NodeFrameStart",
            Packet::NodeFlushFrames { .. } => "NodeFlushFrames",
            Packet::ClientExit => "ClientExit",
        }
    }
}
