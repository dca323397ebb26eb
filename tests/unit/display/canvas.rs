use super::*;
use crate::display::{Canvas, Layout, Observer};
use crate::foundation::core::Viewport;
use crate::resources::topology::{Pipe, Window};
use crate::server::node::Node;

struct Fixture {
    display: Display,
    topology: Topology,
    canvas: CanvasId,
    left: ViewId,
    right: ViewId,
    segments: [SegmentId; 2],
}

/// Two segments side by side, each on its own display channel, and one layout with a left and
/// a right view that overlap the middle.
fn fixture() -> Fixture {
    let mut topology = Topology::new();
    let node = topology.add_node(Node::application("application"));
    let pipe = topology.add_pipe(node, Pipe::new("display"));
    let window = topology.add_window(pipe, Window::new("wall"));
    let mut west = Channel::new("west");
    west.viewport = Viewport::new(0.0, 0.0, 0.5, 1.0);
    let west = topology.add_channel(window, west);
    let mut east = Channel::new("east");
    east.viewport = Viewport::new(0.5, 0.0, 0.5, 1.0);
    let east = topology.add_channel(window, east);

    let mut display = Display::new();
    let observer = display.add_observer(Observer::new("observer"));
    let layout = display.add_layout(Layout::new("layout"));
    let left = display.add_view(layout, "left", Viewport::new(0.0, 0.0, 0.75, 1.0), Some(observer));
    let right = display.add_view(layout, "right", Viewport::new(0.75, 0.0, 0.25, 1.0), Some(observer));
    let canvas = display.add_canvas(Canvas::new("canvas"));
    let a = display.add_segment(canvas, "a", Viewport::new(0.0, 0.0, 0.5, 1.0), Some(west));
    let b = display.add_segment(canvas, "b", Viewport::new(0.5, 0.0, 0.5, 1.0), Some(east));
    display.add_canvas_layout(canvas, layout);

    Fixture {
        display,
        topology,
        canvas,
        left,
        right,
        segments: [a, b],
    }
}

#[test]
fn activation_creates_one_channel_per_overlap() {
    let mut f = fixture();
    let created = activate_canvas(&f.display, &mut f.topology, f.canvas);

    // left covers both segments, right only the eastern one
    assert_eq!(created.len(), 3);
    let [a, b] = f.segments;
    assert!(find_channel(&f.topology, a, f.right).is_none());

    let west_left = find_channel(&f.topology, a, f.left).unwrap();
    assert_eq!(f.topology.channels[west_left].name, "west left");
    assert_eq!(
        f.topology.channels[west_left].viewport,
        Viewport::new(0.0, 0.0, 0.5, 1.0)
    );

    let east_left = find_channel(&f.topology, b, f.left).unwrap();
    let vp = f.topology.channels[east_left].viewport;
    assert!((vp.x - 0.5).abs() < 1e-6);
    assert!((vp.w - 0.25).abs() < 1e-6);

    let east_right = find_channel(&f.topology, b, f.right).unwrap();
    let vp = f.topology.channels[east_right].viewport;
    assert!((vp.x - 0.75).abs() < 1e-6);
    assert!((vp.w - 0.25).abs() < 1e-6);

    // a second activation finds everything in place
    assert!(activate_canvas(&f.display, &mut f.topology, f.canvas).is_empty());
}

#[test]
fn update_adds_compounds_for_unbound_channels_only() {
    let mut f = fixture();
    f.display.canvases[f.canvas].swap_barrier = Some(crate::compound::frame::SwapBarrier {
        name: "wall".to_owned(),
        latency: 1,
    });
    activate_canvas(&f.display, &mut f.topology, f.canvas);

    let mut compounds = CompoundTree::new();
    let bound = find_channel(&f.topology, f.segments[0], f.left).unwrap();
    compounds.add_root(Compound::new("mine").with_channel(bound));

    let roots = update_canvas(&f.display, &f.topology, &mut compounds, f.canvas);
    assert_eq!(roots.len(), 2);
    for root in roots {
        assert!(compounds[root].swap_barrier.is_some());
        let [child] = compounds.children(root) else {
            panic!("segment compound must have one child");
        };
        let channel = compounds[*child].own_channel().unwrap();
        assert_ne!(channel, bound);
        assert_eq!(compounds[*child].name, f.topology.channels[channel].name);
    }
    assert!(update_canvas(&f.display, &f.topology, &mut compounds, f.canvas).is_empty());
}

#[test]
fn init_and_exit_toggle_the_active_layout_channels() {
    let mut f = fixture();
    let created = activate_canvas(&f.display, &mut f.topology, f.canvas);

    init_canvas(&mut f.display, &mut f.topology, f.canvas);
    assert_eq!(f.display.canvases[f.canvas].state(), CanvasState::Running);
    assert!(created.iter().all(|&c| f.topology.channels[c].is_active()));
    assert!(f.topology.nodes[crate::foundation::ids::NodeId(0)].is_active());

    exit_canvas(&mut f.display, &mut f.topology, f.canvas);
    assert_eq!(f.display.canvases[f.canvas].state(), CanvasState::Stopped);
    assert!(created.iter().all(|&c| !f.topology.channels[c].is_active()));
}

#[test]
fn purge_removes_stopped_canvas_and_its_destination_channels() {
    let mut f = fixture();
    let created = activate_canvas(&f.display, &mut f.topology, f.canvas);
    f.display.canvases[f.canvas].needs_delete = true;

    let compounds = CompoundTree::new();
    assert_eq!(purge_canvases(&mut f.display, &mut f.topology, &compounds), 1);
    assert!(f.display.canvases.is_empty());
    assert!(f.display.segments.is_empty());
    assert!(created.iter().all(|&c| f.topology.channels.get(c).is_none()));
    assert_eq!(f.topology.channels.len(), 2);
}
