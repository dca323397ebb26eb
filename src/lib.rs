#![forbid(unsafe_code)]

pub mod compound;
pub mod display;
pub mod foundation;
pub mod net;
pub mod resources;
pub mod server;
pub mod settings;

pub use compound::frame::FrameNameCounter;
pub use compound::tree::{Compound, CompoundTree};
pub use foundation::core::{Buffers, Eyes, PixelViewport, Range, Viewport};
pub use foundation::error::{ClusterError, ClusterResult};
pub use foundation::ids::{CompoundId, NodeId, SessionId, Visit};
pub use net::link::{Connector, NetContext, NetNode, NetNodeRef, ServerInbox};
pub use net::loopback::{HostBehavior, LoopbackApp, LoopbackCluster};
pub use net::packets::Packet;
pub use resources::descriptor::GpuDescriptor;
pub use resources::{Resources, auto_config};
pub use server::config::{Config, RunState};
pub use server::loader::ConfigDef;
pub use server::registry::Server;
pub use settings::ServerSettings;
