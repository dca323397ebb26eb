use crate::compound::tree::{Compound, CompoundTree};
use crate::display::{CanvasState, Display};
use crate::foundation::ids::{CanvasId, ChannelId, CompoundId, SegmentId, ViewId};
use crate::resources::topology::{Channel, ChannelOutput, Topology};

/// Destination channel rendering `view` into `segment`, if the canvas was activated.
pub fn find_channel(topology: &Topology, segment: SegmentId, view: ViewId) -> Option<ChannelId> {
    topology
        .channels
        .iter()
        .find(|(_, c)| c.output == Some(ChannelOutput { view, segment }))
        .map(|(id, _)| id)
}

/// Create one destination channel per overlapping view/segment pair of every layout of
/// `canvas`. Returns the channels created by this call.
pub fn activate_canvas(
    display: &Display,
    topology: &mut Topology,
    canvas: CanvasId,
) -> Vec<ChannelId> {
    let Some(c) = display.canvases.get(canvas) else {
        return Vec::new();
    };

    let mut created = Vec::new();
    for &segment_id in &c.segments {
        let segment = &display.segments[segment_id];
        let Some(segment_channel) = segment.channel else {
            tracing::warn!(segment = %segment.name, "segment without display channel");
            continue;
        };
        let Some(source) = topology.channels.get(segment_channel) else {
            continue;
        };
        let window = source.window;
        let base = source.viewport;
        let channel_name = source.name.clone();

        for &layout_id in &c.layouts {
            for &view_id in display.layouts[layout_id].views() {
                let view = &display.views[view_id];
                let mut viewport = segment.viewport;
                viewport.intersect(view.viewport);
                if !viewport.has_area() {
                    continue;
                }
                if find_channel(topology, segment_id, view_id).is_some() {
                    continue;
                }

                // contribution of the segment area covered by the view, placed in the window
                viewport.transform(segment.viewport);
                let mut in_window = base;
                in_window.apply(viewport);

                let mut channel = Channel::new(format!("{channel_name} {}", view.name));
                channel.viewport = in_window;
                channel.output = Some(ChannelOutput {
                    view: view_id,
                    segment: segment_id,
                });
                created.push(topology.add_channel(window, channel));
            }
        }
    }
    created
}

/// Create a top-level compound, with a single child bound to it, for every destination channel
/// of `canvas` not used by any compound yet.
pub fn update_canvas(
    display: &Display,
    topology: &Topology,
    compounds: &mut CompoundTree,
    canvas: CanvasId,
) -> Vec<CompoundId> {
    let Some(c) = display.canvases.get(canvas) else {
        return Vec::new();
    };

    let mut added = Vec::new();
    for &layout_id in &c.layouts {
        for &view_id in display.layouts[layout_id].views() {
            for &segment_id in &c.segments {
                let Some(channel) = find_channel(topology, segment_id, view_id) else {
                    continue;
                };
                let bound = compounds
                    .all()
                    .into_iter()
                    .any(|id| compounds[id].own_channel() == Some(channel));
                if bound {
                    continue;
                }

                let mut group = Compound::new("");
                group.swap_barrier = c.swap_barrier.clone();
                let group = compounds.add_root(group);
                let name = topology.channels[channel].name.clone();
                compounds.add_child(group, Compound::new(name).with_channel(channel));
                added.push(group);
            }
        }
    }
    added
}

/// Activate the destination channels of the canvas's current layout.
pub fn init_canvas(display: &mut Display, topology: &mut Topology, canvas: CanvasId) {
    let Some(c) = display.canvases.get(canvas) else {
        return;
    };
    if c.state == CanvasState::Running {
        return;
    }

    let mut activated = Vec::new();
    if let Some(&layout_id) = c.layouts.get(c.active_layout) {
        for &view_id in display.layouts[layout_id].views() {
            for &segment_id in &c.segments {
                if let Some(channel) = find_channel(topology, segment_id, view_id) {
                    topology.activate_channel(channel);
                    activated.push(channel);
                }
            }
        }
    }

    let c = &mut display.canvases[canvas];
    c.activated = activated;
    c.state = CanvasState::Running;
}

pub fn exit_canvas(display: &mut Display, topology: &mut Topology, canvas: CanvasId) {
    let Some(c) = display.canvases.get_mut(canvas) else {
        return;
    };
    if c.state == CanvasState::Stopped {
        return;
    }
    for channel in c.activated.drain(..) {
        topology.deactivate_channel(channel);
    }
    c.state = CanvasState::Stopped;
}

/// Remove stopped canvases marked for deletion, with their segments and every destination
/// channel no active compound renders to.
pub fn purge_canvases(
    display: &mut Display,
    topology: &mut Topology,
    compounds: &CompoundTree,
) -> usize {
    let doomed: Vec<CanvasId> = display
        .canvases
        .iter()
        .filter(|(_, c)| c.needs_delete && c.state == CanvasState::Stopped)
        .map(|(id, _)| id)
        .collect();

    let mut purged = 0;
    for canvas in doomed {
        let Some(c) = display.canvases.get(canvas) else {
            continue;
        };
        let segments = c.segments.clone();
        let in_use = topology.channels.iter().any(|(id, ch)| {
            ch.output.is_some_and(|o| segments.contains(&o.segment)) && compounds.uses_channel(id)
        });
        if in_use {
            continue;
        }

        let destinations: Vec<ChannelId> = topology
            .channels
            .iter()
            .filter(|(_, ch)| ch.output.is_some_and(|o| segments.contains(&o.segment)))
            .map(|(id, _)| id)
            .collect();
        for channel in destinations {
            let window = topology.channels[channel].window;
            topology.channels.remove(channel);
            if let Some(w) = topology.windows.get_mut(window) {
                w.channels.retain(|c| *c != channel);
            }
        }
        for segment in segments {
            display.segments.remove(segment);
        }
        display.canvases.remove(canvas);
        purged += 1;
    }
    purged
}

#[cfg(test)]
#[path = "../../tests/unit/display/canvas.rs"]
mod tests;
