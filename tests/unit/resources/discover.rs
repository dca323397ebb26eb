use super::*;
use crate::foundation::core::PixelViewport;

#[test]
fn empty_feed_discovers_nothing() {
    assert!(discover(&[]).is_none());
}

#[test]
fn one_node_per_host_with_application_node_first() {
    let t = discover(&[
        GpuDescriptor::display(""),
        GpuDescriptor::gpu("render1", 0),
        GpuDescriptor::gpu("render1", 1),
        GpuDescriptor::gpu("", 0),
    ])
    .unwrap();

    let nodes: Vec<_> = t.nodes.iter().map(|(_, n)| n.name.clone()).collect();
    assert_eq!(nodes, ["application", "render1"]);
    assert!(t.nodes[t.find_application_node().unwrap()].is_application_node());

    let pipes: Vec<_> = t.pipes.iter().map(|(_, p)| p.name.clone()).collect();
    assert_eq!(pipes, ["display", "GPU1", "GPU2", "GPU3"]);
    let render1 = t.node_by_host("render1").unwrap();
    assert_eq!(t.nodes[render1].pipes().len(), 2);
}

#[test]
fn source_channels_skip_the_display_reference() {
    let mut t = discover(&[
        GpuDescriptor::display("").with_pvp(PixelViewport::new(100, 100, 800, 600)),
        GpuDescriptor::gpu("", 0),
        GpuDescriptor::gpu("", 1),
    ])
    .unwrap();

    let sources = configure_source_channels(&mut t);
    let names: Vec<_> = sources.iter().map(|&c| t.channels[c].name.clone()).collect();
    assert_eq!(names, ["GPU1 source channel", "GPU2 source channel"]);

    let window = t.channels[sources[0]].window;
    assert_eq!(t.windows[window].drawable, DrawableHint::Fbo);
    assert_eq!(t.windows[window].pvp, PixelViewport::new(0, 0, 800, 600));
}

#[test]
fn gpu_reference_contributes_its_own_channel() {
    let mut t = discover(&[GpuDescriptor::gpu("", 0)]).unwrap();
    let pipe = t.pipes.ids()[0];
    let window = t.add_window(pipe, Window::new("main"));
    let channel = t.add_channel(window, Channel::new("main"));

    assert_eq!(configure_source_channels(&mut t), [channel]);
}

#[test]
fn unsized_reference_falls_back_to_default_viewport() {
    let mut t = discover(&[GpuDescriptor::display(""), GpuDescriptor::gpu("", 0)]).unwrap();
    let sources = configure_source_channels(&mut t);
    let window = t.channels[sources[0]].window;
    assert_eq!(t.windows[window].pvp, DEFAULT_PIXEL_VIEWPORT);
}

#[test]
fn db_ranges_are_contiguous_and_end_at_one() {
    for n in [1, 3, 7, 100] {
        let ranges = db_ranges(n);
        assert_eq!(ranges.len(), n);
        assert_eq!(ranges[0].start, 0.0);
        assert_eq!(ranges[n - 1].end, 1.0);
        for pair in ranges.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
    }
    assert!(db_ranges(0).is_empty());
}
