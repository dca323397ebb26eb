//! JSON configuration definitions.
//!
//! A definition either lists the cluster explicitly (nodes down to channels, display entities
//! and compounds, all cross-referenced by name) or asks for an automatic configuration from a
//! list of device descriptors.

use crate::compound::equalizer::Equalizer;
use crate::compound::frame::{Frame, FrameNameCounter, SwapBarrier};
use crate::compound::tree::{Compound, CompoundTree};
use crate::display::canvas::{activate_canvas, update_canvas};
use crate::display::{Canvas, Display, Layout, Observer};
use crate::foundation::core::{Buffers, Eyes, PixelViewport, Range, Viewport};
use crate::foundation::error::{ClusterError, ClusterResult};
use crate::foundation::ids::{CompoundId, ObserverId};
use crate::net::link::NetContext;
use crate::resources::descriptor::GpuDescriptor;
use crate::resources::topology::{Channel, DrawableHint, Pipe, Topology, Window};
use crate::resources::{Resources, auto_config};
use crate::server::config::Config;
use crate::server::node::Node;
use crate::settings::ServerSettings;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Duration;

#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigDef {
    pub name: String,
    /// Overrides the server latency.
    pub latency: Option<u32>,
    /// Eye passes rendered per frame.
    pub eyes: Option<Eyes>,
    pub auto: Option<AutoDef>,
    pub nodes: Vec<NodeDef>,
    pub observers: Vec<ObserverDef>,
    pub layouts: Vec<LayoutDef>,
    pub canvases: Vec<CanvasDef>,
    pub compounds: Vec<CompoundDef>,
}

/// Automatic configuration from discovered devices.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AutoDef {
    pub descriptors: Vec<GpuDescriptor>,
    pub layouts: Vec<String>,
}

#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NodeDef {
    pub name: String,
    pub host: String,
    /// The node runs inside the application process.
    pub application: bool,
    pub launch_timeout_ms: Option<u64>,
    pub launch_command: Option<String>,
    pub launch_quote: Option<char>,
    pub pipes: Vec<PipeDef>,
}

#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipeDef {
    pub name: String,
    pub device: Option<u32>,
    pub port: Option<u32>,
    pub pvp: Option<PixelViewport>,
    pub windows: Vec<WindowDef>,
}

#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WindowDef {
    pub name: String,
    pub pvp: Option<PixelViewport>,
    pub drawable: DrawableHint,
    pub channels: Vec<ChannelDef>,
}

#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChannelDef {
    pub name: String,
    pub viewport: Option<Viewport>,
}

#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ObserverDef {
    pub name: String,
    pub eye_base: Option<f32>,
}

#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LayoutDef {
    pub name: String,
    pub views: Vec<ViewDef>,
}

#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ViewDef {
    pub name: String,
    pub viewport: Option<Viewport>,
    /// Observer name.
    pub observer: Option<String>,
}

#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CanvasDef {
    pub name: String,
    /// Layout names, the first one is shown at init.
    pub layouts: Vec<String>,
    pub swap_barrier: Option<SwapBarrier>,
    pub segments: Vec<SegmentDef>,
}

#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SegmentDef {
    pub name: String,
    /// Display channel name.
    pub channel: Option<String>,
    pub viewport: Option<Viewport>,
    pub eyes: Option<Eyes>,
}

#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompoundDef {
    pub name: String,
    /// Channel name, a resource channel or a destination channel `<segment channel> <view>`.
    pub channel: Option<String>,
    pub eyes: Option<Eyes>,
    pub range: Option<Range>,
    pub viewport: Option<Viewport>,
    pub buffers: Option<Buffers>,
    pub input_frames: Vec<String>,
    pub output_frames: Vec<String>,
    pub swap_barrier: Option<SwapBarrier>,
    /// `"db"` or `"2d"`.
    pub load_balancer: Option<String>,
    pub children: Vec<CompoundDef>,
}

impl ConfigDef {
    pub fn from_json(text: &str) -> ClusterResult<Self> {
        serde_json::from_str(text)
            .map_err(|e| ClusterError::config(format!("parse configuration JSON: {e}")))
    }

    pub fn from_path(path: impl AsRef<Path>) -> ClusterResult<Self> {
        let path = path.as_ref();
        let f = File::open(path).map_err(|e| {
            ClusterError::config(format!("open configuration '{}': {e}", path.display()))
        })?;
        serde_json::from_reader(BufReader::new(f)).map_err(|e| {
            ClusterError::config(format!("parse configuration '{}': {e}", path.display()))
        })
    }

    pub fn validate(&self) -> ClusterResult<()> {
        if self.auto.is_some() {
            if !self.nodes.is_empty() || !self.canvases.is_empty() || !self.compounds.is_empty() {
                return Err(ClusterError::config(
                    "an automatic configuration cannot list resources",
                ));
            }
            return Ok(());
        }

        if self.nodes.iter().filter(|n| n.application).count() > 1 {
            return Err(ClusterError::config("more than one application node"));
        }

        for layout in &self.layouts {
            for view in &layout.views {
                if let Some(observer) = &view.observer
                    && !self.observers.iter().any(|o| &o.name == observer)
                {
                    return Err(ClusterError::config(format!(
                        "view '{}' references missing observer '{observer}'",
                        view.name
                    )));
                }
            }
        }
        for canvas in &self.canvases {
            for layout in &canvas.layouts {
                if !self.layouts.iter().any(|l| &l.name == layout) {
                    return Err(ClusterError::config(format!(
                        "canvas '{}' references missing layout '{layout}'",
                        canvas.name
                    )));
                }
            }
        }

        let mut stack: Vec<&CompoundDef> = self.compounds.iter().collect();
        while let Some(c) = stack.pop() {
            if let Some(lb) = &c.load_balancer
                && lb != "db"
                && lb != "2d"
            {
                return Err(ClusterError::config(format!(
                    "compound '{}' has unknown load balancer '{lb}'",
                    c.name
                )));
            }
            if let Some(r) = c.range
                && !(0.0 <= r.start && r.start <= r.end && r.end <= 1.0)
            {
                return Err(ClusterError::config(format!(
                    "compound '{}' has invalid range",
                    c.name
                )));
            }
            stack.extend(&c.children);
        }
        Ok(())
    }

    /// Build the entities of the definition.
    pub fn into_resources(self, counter: &FrameNameCounter) -> ClusterResult<Resources> {
        self.validate()?;
        if let Some(auto) = &self.auto {
            let layouts: Vec<&str> = auto.layouts.iter().map(String::as_str).collect();
            return auto_config(&auto.descriptors, &layouts, counter);
        }

        let mut topology = Topology::new();
        for node_def in &self.nodes {
            add_node(&mut topology, node_def);
        }

        let mut display = Display::new();
        let mut observers: HashMap<&str, ObserverId> = HashMap::new();
        for o in &self.observers {
            let mut observer = Observer::new(o.name.clone());
            if let Some(eye_base) = o.eye_base {
                observer.eye_base = eye_base;
            }
            observers.insert(o.name.as_str(), display.add_observer(observer));
        }

        let mut layouts = HashMap::new();
        for l in &self.layouts {
            let layout = display.add_layout(Layout::new(l.name.clone()));
            for v in &l.views {
                let observer = v.observer.as_deref().and_then(|o| observers.get(o).copied());
                display.add_view(
                    layout,
                    v.name.clone(),
                    v.viewport.unwrap_or(Viewport::FULL),
                    observer,
                );
            }
            layouts.insert(l.name.as_str(), layout);
        }

        let mut canvases = Vec::new();
        for c in &self.canvases {
            let mut canvas = Canvas::new(c.name.clone());
            canvas.swap_barrier = c.swap_barrier.clone();
            let canvas = display.add_canvas(canvas);
            for s in &c.segments {
                let channel = match &s.channel {
                    Some(name) => Some(topology.find_channel_by_name(name).ok_or_else(|| {
                        ClusterError::config(format!(
                            "segment '{}' references missing channel '{name}'",
                            s.name
                        ))
                    })?),
                    None => None,
                };
                let segment = display.add_segment(
                    canvas,
                    s.name.clone(),
                    s.viewport.unwrap_or(Viewport::FULL),
                    channel,
                );
                if let Some(eyes) = s.eyes {
                    display.segments[segment].eyes = eyes;
                }
            }
            for name in &c.layouts {
                if let Some(&layout) = layouts.get(name.as_str()) {
                    display.add_canvas_layout(canvas, layout);
                }
            }
            activate_canvas(&display, &mut topology, canvas);
            canvases.push(canvas);
        }

        let mut compounds = CompoundTree::new();
        for def in &self.compounds {
            let root = compounds.add_root(Compound::new(""));
            fill_compound(&mut compounds, &topology, root, def)?;
        }
        for canvas in canvases {
            update_canvas(&display, &topology, &mut compounds, canvas);
        }

        Ok(Resources {
            topology,
            display,
            compounds,
        })
    }

    /// Build a stopped configuration from the definition.
    pub fn into_config(
        self,
        settings: &ServerSettings,
        net: NetContext,
        counter: &FrameNameCounter,
    ) -> ClusterResult<Config> {
        let mut settings = settings.clone();
        if let Some(latency) = self.latency {
            settings.latency = latency;
        }
        let name = self.name.clone();
        let eyes = self.eyes;

        let resources = self.into_resources(counter)?;
        let mut config = Config::new(name, resources, settings, net);
        if let Some(eyes) = eyes {
            config.set_eyes(eyes);
        }
        Ok(config)
    }
}

fn add_node(topology: &mut Topology, def: &NodeDef) {
    let mut node = if def.application {
        Node::application(def.name.clone())
    } else {
        Node::new(def.name.clone(), def.host.clone())
    };
    node.launch_timeout = def.launch_timeout_ms.map(Duration::from_millis);
    node.launch_command = def.launch_command.clone();
    node.launch_quote = def.launch_quote;
    let node = topology.add_node(node);

    for p in &def.pipes {
        let mut pipe = Pipe::new(p.name.clone());
        pipe.device = p.device;
        pipe.port = p.port;
        pipe.pvp = p.pvp.unwrap_or(PixelViewport::INVALID);
        let pipe = topology.add_pipe(node, pipe);

        for w in &p.windows {
            let mut window = Window::new(w.name.clone());
            window.pvp = w.pvp.unwrap_or(PixelViewport::INVALID);
            window.drawable = w.drawable;
            let window = topology.add_window(pipe, window);

            for c in &w.channels {
                let mut channel = Channel::new(c.name.clone());
                channel.viewport = c.viewport.unwrap_or(Viewport::FULL);
                topology.add_channel(window, channel);
            }
        }
    }
}

/// Copy `def` into the compound `id` and build its children.
fn fill_compound(
    compounds: &mut CompoundTree,
    topology: &Topology,
    id: CompoundId,
    def: &CompoundDef,
) -> ClusterResult<()> {
    let channel = match &def.channel {
        Some(name) => Some(topology.find_channel_by_name(name).ok_or_else(|| {
            ClusterError::config(format!(
                "compound '{}' references missing channel '{name}'",
                def.name
            ))
        })?),
        None => None,
    };
    compounds.set_channel(id, channel);

    let c = &mut compounds[id];
    c.name = def.name.clone();
    if let Some(eyes) = def.eyes {
        c.eyes = eyes;
    }
    if let Some(range) = def.range {
        c.range = range;
    }
    if let Some(viewport) = def.viewport {
        c.viewport = viewport;
    }
    if let Some(buffers) = def.buffers {
        c.buffers = buffers;
    }
    c.input_frames = def.input_frames.iter().map(Frame::new).collect();
    c.output_frames = def.output_frames.iter().map(Frame::new).collect();
    c.swap_barrier = def.swap_barrier.clone();
    c.equalizers = match def.load_balancer.as_deref() {
        Some("db") => vec![Equalizer::range()],
        Some("2d") => vec![Equalizer::tile()],
        _ => Vec::new(),
    };

    for child in &def.children {
        let child_id = compounds.add_child(id, Compound::new(""));
        fill_compound(compounds, topology, child_id, child)?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/server/loader.rs"]
mod tests;
