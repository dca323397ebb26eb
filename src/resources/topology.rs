use crate::foundation::core::{PixelViewport, Viewport};
use crate::foundation::ids::{Arena, ChannelId, NodeId, PipeId, SegmentId, ViewId, WindowId};
use crate::server::node::Node;

/// One GPU or display device of a node.
#[derive(Clone, Debug, PartialEq)]
pub struct Pipe {
    pub name: String,
    pub node: NodeId,
    pub device: Option<u32>,
    pub port: Option<u32>,
    pub pvp: PixelViewport,
    pub(crate) windows: Vec<WindowId>,
}

impl Pipe {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            node: NodeId(0),
            device: None,
            port: None,
            pvp: PixelViewport::INVALID,
            windows: Vec::new(),
        }
    }

    pub fn windows(&self) -> &[WindowId] {
        &self.windows
    }
}

/// Kind of surface a window renders into.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum DrawableHint {
    /// On-screen window.
    #[default]
    Window,
    /// Off-screen framebuffer object.
    Fbo,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Window {
    pub name: String,
    pub pipe: PipeId,
    pub pvp: PixelViewport,
    pub drawable: DrawableHint,
    pub needs_delete: bool,
    pub(crate) channels: Vec<ChannelId>,
}

impl Window {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pipe: PipeId(0),
            pvp: PixelViewport::INVALID,
            drawable: DrawableHint::Window,
            needs_delete: false,
            channels: Vec::new(),
        }
    }

    pub fn channels(&self) -> &[ChannelId] {
        &self.channels
    }
}

/// Part of a canvas shown through a channel: the view it renders and the segment it fills.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChannelOutput {
    pub view: ViewId,
    pub segment: SegmentId,
}

/// An output surface of a window.
#[derive(Clone, Debug, PartialEq)]
pub struct Channel {
    pub name: String,
    pub window: WindowId,
    /// Area of the window covered, relative to the window.
    pub viewport: Viewport,
    /// Set on destination channels created by canvas activation.
    pub output: Option<ChannelOutput>,
    activation: u32,
}

impl Channel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            window: WindowId(0),
            viewport: Viewport::FULL,
            output: None,
            activation: 0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.activation > 0
    }
}

/// Resource tree of a configuration: nodes own pipes, pipes own windows, windows own channels.
#[derive(Clone, Debug, Default)]
pub struct Topology {
    pub nodes: Arena<NodeId, Node>,
    pub pipes: Arena<PipeId, Pipe>,
    pub windows: Arena<WindowId, Window>,
    pub channels: Arena<ChannelId, Channel>,
}

impl Topology {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, node: Node) -> NodeId {
        self.nodes.insert(node)
    }

    pub fn add_pipe(&mut self, node: NodeId, pipe: Pipe) -> PipeId {
        let id = self.pipes.insert(Pipe { node, ..pipe });
        self.nodes[node].pipes.push(id);
        id
    }

    pub fn add_window(&mut self, pipe: PipeId, window: Window) -> WindowId {
        let id = self.windows.insert(Window { pipe, ..window });
        self.pipes[pipe].windows.push(id);
        id
    }

    pub fn add_channel(&mut self, window: WindowId, channel: Channel) -> ChannelId {
        let id = self.channels.insert(Channel { window, ..channel });
        self.windows[window].channels.push(id);
        id
    }

    /// Remove a window and its channels.
    pub fn remove_window(&mut self, window: WindowId) -> Option<Window> {
        let removed = self.windows.remove(window)?;
        for &channel in &removed.channels {
            self.channels.remove(channel);
        }
        if let Some(pipe) = self.pipes.get_mut(removed.pipe) {
            pipe.windows.retain(|w| *w != window);
        }
        Some(removed)
    }

    pub fn find_application_node(&self) -> Option<NodeId> {
        self.nodes
            .iter()
            .find(|(_, n)| n.is_application_node())
            .map(|(id, _)| id)
    }

    pub fn node_by_host(&self, host: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .find(|(_, n)| n.host == host)
            .map(|(id, _)| id)
    }

    pub fn find_channel_by_name(&self, name: &str) -> Option<ChannelId> {
        self.channels
            .iter()
            .find(|(_, c)| c.name == name)
            .map(|(id, _)| id)
    }

    pub fn pipe_of_channel(&self, channel: ChannelId) -> Option<PipeId> {
        let window = self.channels.get(channel)?.window;
        Some(self.windows.get(window)?.pipe)
    }

    pub fn node_of_channel(&self, channel: ChannelId) -> Option<NodeId> {
        Some(self.pipes.get(self.pipe_of_channel(channel)?)?.node)
    }

    /// First channel of the first window of `pipe`.
    pub fn first_channel(&self, pipe: PipeId) -> Option<ChannelId> {
        self.pipes
            .get(pipe)?
            .windows
            .iter()
            .find_map(|&w| self.windows.get(w)?.channels.first().copied())
    }

    /// Count one more user of `channel`, activating its node.
    pub fn activate_channel(&mut self, channel: ChannelId) {
        let Some(c) = self.channels.get_mut(channel) else {
            return;
        };
        c.activation += 1;
        if let Some(node) = self.node_of_channel(channel) {
            self.nodes[node].activate();
        }
    }

    pub fn deactivate_channel(&mut self, channel: ChannelId) {
        let Some(c) = self.channels.get_mut(channel) else {
            return;
        };
        if c.activation == 0 {
            tracing::warn!(channel = %c.name, "deactivating an inactive channel");
            return;
        }
        c.activation -= 1;
        if let Some(node) = self.node_of_channel(channel) {
            self.nodes[node].deactivate();
        }
    }

    /// Names of the active channels hosted by `node`.
    pub fn active_channel_names(&self, node: NodeId) -> Vec<String> {
        let Some(n) = self.nodes.get(node) else {
            return Vec::new();
        };
        n.pipes
            .iter()
            .filter_map(|&p| self.pipes.get(p))
            .flat_map(|p| p.windows.iter())
            .filter_map(|&w| self.windows.get(w))
            .flat_map(|w| w.channels.iter())
            .filter_map(|&c| self.channels.get(c))
            .filter(|c| c.is_active())
            .map(|c| c.name.clone())
            .collect()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/resources/topology.rs"]
mod tests;
