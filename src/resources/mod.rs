pub mod descriptor;
pub mod discover;
pub mod topology;

use crate::compound::frame::FrameNameCounter;
use crate::compound::tree::CompoundTree;
use crate::display::canvas::{activate_canvas, update_canvas};
use crate::display::{Canvas, Display, Layout, Observer};
use crate::foundation::core::Viewport;
use crate::foundation::error::{ClusterError, ClusterResult};
use crate::resources::descriptor::GpuDescriptor;
use crate::resources::discover::{CompoundBuilder, configure_source_channels, discover};
use crate::resources::topology::{Channel, Topology, Window};

/// Everything a configuration renders with: the resource tree, the display entities and the
/// compound tree.
#[derive(Clone, Debug, Default)]
pub struct Resources {
    pub topology: Topology,
    pub display: Display,
    pub compounds: CompoundTree,
}

/// Build a complete configuration for the discovered devices.
///
/// The application node's first pipe drives a display window with one canvas. Each name in
/// `layouts` becomes a layout with one full view on that canvas, and the compounds for it are
/// added according to the layout name.
pub fn auto_config(
    descriptors: &[GpuDescriptor],
    layouts: &[&str],
    counter: &FrameNameCounter,
) -> ClusterResult<Resources> {
    let mut topology = discover(descriptors)
        .ok_or_else(|| ClusterError::topology("no resources discovered"))?;

    let app = topology
        .find_application_node()
        .ok_or_else(|| ClusterError::topology("no application node"))?;
    let reference = *topology.nodes[app]
        .pipes()
        .first()
        .ok_or_else(|| ClusterError::topology("application node has no device"))?;

    let mut window = Window::new("display window");
    window.pvp = topology.pipes[reference].pvp;
    let window = topology.add_window(reference, window);
    let display_channel = topology.add_channel(window, Channel::new("display channel"));

    let mut display = Display::new();
    let observer = display.add_observer(Observer::new("observer"));
    let canvas = display.add_canvas(Canvas::new("canvas"));
    display.add_segment(canvas, "segment", Viewport::FULL, Some(display_channel));
    for &name in layouts {
        let layout = display.add_layout(Layout::new(name));
        display.add_view(layout, format!("{name} view"), Viewport::FULL, Some(observer));
        display.add_canvas_layout(canvas, layout);
    }

    let mut compounds = CompoundTree::new();
    activate_canvas(&display, &mut topology, canvas);
    let roots = update_canvas(&display, &topology, &mut compounds, canvas);

    let sources = configure_source_channels(&mut topology);
    CompoundBuilder {
        compounds: &mut compounds,
        topology: &topology,
        display: &display,
        counter,
    }
    .configure(&roots, &sources)?;

    Ok(Resources {
        topology,
        display,
        compounds,
    })
}

#[cfg(test)]
#[path = "../../tests/unit/resources/auto_config.rs"]
mod tests;
