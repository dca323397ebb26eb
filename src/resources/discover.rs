use crate::compound::equalizer::Equalizer;
use crate::compound::frame::{Frame, FrameNameCounter};
use crate::compound::tree::{Compound, CompoundTree};
use crate::display::Display;
use crate::foundation::core::{Buffers, DEFAULT_PIXEL_VIEWPORT, Eyes, RANGE_BASIS, Range};
use crate::foundation::error::{ClusterError, ClusterResult};
use crate::foundation::ids::{ChannelId, CompoundId};
use crate::resources::descriptor::GpuDescriptor;
use crate::resources::topology::{Channel, DrawableHint, Pipe, Topology, Window};
use crate::server::node::Node;
use std::collections::HashMap;

/// Name of the pipe driving the plain display of a host.
pub const DISPLAY_PIPE: &str = "display";

/// Build the resource tree for `descriptors`: one node per host, one pipe per device.
///
/// The application node is created first even when it contributes no device. Returns `None`
/// when nothing was discovered.
pub fn discover(descriptors: &[GpuDescriptor]) -> Option<Topology> {
    if descriptors.is_empty() {
        return None;
    }

    let mut topology = Topology::new();
    let mut nodes = HashMap::new();
    nodes.insert(String::new(), topology.add_node(Node::application("application")));

    let mut gpu_counter = 0u32;
    for info in descriptors {
        let node = *nodes
            .entry(info.hostname.clone())
            .or_insert_with(|| topology.add_node(Node::new(&info.hostname, &info.hostname)));

        let name = match info.device {
            None => DISPLAY_PIPE.to_owned(),
            Some(_) => {
                gpu_counter += 1;
                format!("GPU{gpu_counter}")
            }
        };
        let mut pipe = Pipe::new(name);
        pipe.device = info.device;
        pipe.port = info.port;
        pipe.pvp = info.pvp;
        topology.add_pipe(node, pipe);
    }
    Some(topology)
}

/// Collect the channels usable as render sources.
///
/// The application node's first pipe is the reference. Unless it is the plain display, its
/// first channel is a source itself; every other pipe of the application node gets an
/// off-screen window sized like the reference.
pub fn configure_source_channels(topology: &mut Topology) -> Vec<ChannelId> {
    let mut channels = Vec::new();

    let Some(app) = topology.find_application_node() else {
        tracing::warn!("no application node to configure sources on");
        return channels;
    };
    let pipes = topology.nodes[app].pipes().to_vec();
    let Some((&reference, others)) = pipes.split_first() else {
        tracing::warn!("application node has no pipes");
        return channels;
    };

    let ref_pipe = &topology.pipes[reference];
    let pvp = if ref_pipe.pvp.is_valid() {
        ref_pipe.pvp.at_origin()
    } else {
        DEFAULT_PIXEL_VIEWPORT
    };

    if ref_pipe.name != DISPLAY_PIPE {
        match topology.first_channel(reference) {
            Some(channel) => channels.push(channel),
            None => tracing::warn!(pipe = %ref_pipe.name, "reference pipe has no channel"),
        }
    }

    for &pipe in others {
        let pipe_name = topology.pipes[pipe].name.clone();
        let mut window = Window::new(format!("{pipe_name} source window"));
        window.pvp = pvp;
        window.drawable = DrawableHint::Fbo;
        let window = topology.add_window(pipe, window);
        let channel = Channel::new(format!("{pipe_name} source channel"));
        channels.push(topology.add_channel(window, channel));
    }
    channels
}

/// Builder adding source compounds under the segment compounds of a configuration.
pub struct CompoundBuilder<'a> {
    pub compounds: &'a mut CompoundTree,
    pub topology: &'a Topology,
    pub display: &'a Display,
    pub counter: &'a FrameNameCounter,
}

impl CompoundBuilder<'_> {
    /// Add the compounds requested by the layout of each root's segment channel.
    pub fn configure(&mut self, roots: &[CompoundId], sources: &[ChannelId]) -> ClusterResult<()> {
        if roots.is_empty() || sources.is_empty() {
            return Ok(());
        }

        for &root in roots {
            let children = self.compounds.children(root);
            if children.len() != 1 {
                tracing::warn!(
                    compound = %self.compounds[root].name,
                    "expected a single segment compound"
                );
                debug_assert_eq!(children.len(), 1);
                continue;
            }
            let segment_compound = children[0];
            let layout = self.layout_name(segment_compound).ok_or_else(|| {
                ClusterError::topology(format!(
                    "compound {} has no destination channel",
                    self.compounds[segment_compound].name
                ))
            })?;

            match layout.as_str() {
                "2D" => {
                    let mono = self.add_2d(segment_compound, sources);
                    self.compounds[mono].eyes = Eyes::CYCLOP;
                    let stereo = self.add_eye(segment_compound, sources);
                    self.compounds[stereo].eyes = Eyes::STEREO;
                }
                "static DB" | "dynamic DB" => {
                    let db = self.add_db(segment_compound, sources);
                    self.compounds[db].name = layout.clone();
                    if layout == "dynamic DB" {
                        self.compounds[db].equalizers.push(Equalizer::range());
                    }
                }
                "Simple" => {}
                other => {
                    return Err(ClusterError::topology(format!(
                        "unimplemented layout '{other}'"
                    )));
                }
            }
        }
        Ok(())
    }

    fn layout_name(&self, compound: CompoundId) -> Option<String> {
        let channel = self.compounds.channel(compound)?;
        let output = self.topology.channels.get(channel)?.output?;
        Some(self.display.layout_of_view(output.view)?.name.clone())
    }

    /// Display channel of the segment the compound's destination channel belongs to.
    fn output_channel(&self, compound: CompoundId) -> Option<ChannelId> {
        let channel = self.compounds.channel(compound)?;
        let output = self.topology.channels.get(channel)?.output?;
        self.display.segments.get(output.segment)?.channel
    }

    pub fn add_2d(&mut self, parent: CompoundId, sources: &[ChannelId]) -> CompoundId {
        let mut group = Compound::new("2D");
        group.equalizers.push(Equalizer::tile());
        let group = self.compounds.add_child(parent, group);
        self.add_sources(group, sources);
        group
    }

    pub fn add_db(&mut self, parent: CompoundId, sources: &[ChannelId]) -> CompoundId {
        let mut group = Compound::new("DB");
        if sources.len() > 1 {
            group.buffers = Buffers::COLOR | Buffers::DEPTH;
        }
        let group = self.compounds.add_child(parent, group);
        self.add_sources(group, sources);

        let children = self.compounds.children(group).to_vec();
        let ranges = db_ranges(children.len());
        for (child, range) in children.into_iter().zip(ranges) {
            self.compounds[child].range = range;
        }
        group
    }

    /// Split the sources at their midpoint between a left and a right eye pass.
    pub fn add_eye(&mut self, parent: CompoundId, sources: &[ChannelId]) -> CompoundId {
        let group = self.compounds.add_child(parent, Compound::new("Stereo"));
        let output = self.output_channel(group);

        let pivot = sources.len() / 2;
        let (left, rest) = sources.split_at(pivot);
        let (centre, right) = match rest.split_first() {
            Some((c, r)) => (Some(*c), r),
            None => (None, rest),
        };

        for (half, eyes) in [(left, Eyes::LEFT), (right, Eyes::RIGHT)] {
            let pass_through = half.is_empty() || (half.len() == 1 && Some(half[0]) == output);
            let child = if pass_through {
                self.compounds.add_child(group, Compound::new(""))
            } else {
                self.add_2d(group, half)
            };
            self.compounds[child].eyes = eyes | Eyes::CYCLOP;
        }

        if let Some(centre) = centre {
            self.add_sources(group, &[centre]);
        }
        group
    }

    /// Bind one child per source to `group`, connected to it by a fresh frame edge.
    pub fn add_sources(&mut self, group: CompoundId, sources: &[ChannelId]) {
        let output = self.output_channel(group);
        debug_assert!(output.is_some(), "source group without output channel");

        for &source in sources {
            if Some(source) == output {
                continue;
            }
            let name = self.counter.next_name(&self.compounds[group].name);
            let mut child =
                Compound::new(self.topology.channels[source].name.clone()).with_channel(source);
            child.output_frames.push(Frame::new(name.clone()));
            self.compounds.add_child(group, child);
            self.compounds[group].input_frames.push(Frame::new(name));
        }
    }
}

/// Contiguous ranges for `n` database children. The last one always ends at exactly 1.
pub fn db_ranges(n: usize) -> Vec<Range> {
    if n == 0 {
        return Vec::new();
    }
    let step = RANGE_BASIS / n as u32;
    (0..n as u32)
        .map(|i| {
            let start = i * step;
            if i + 1 == n as u32 {
                Range::new(start as f32 / RANGE_BASIS as f32, 1.0)
            } else {
                Range::from_fixed(start, start + step)
            }
        })
        .collect()
}

#[cfg(test)]
#[path = "../../tests/unit/resources/discover.rs"]
mod tests;
