use super::*;
use crate::compound::tree::Compound;
use crate::foundation::core::{Buffers, Eyes};
use crate::foundation::ids::CompoundId;

fn compound_named<'a>(r: &'a Resources, name: &str) -> (CompoundId, &'a Compound) {
    let id = r
        .compounds
        .find_by_name(name)
        .unwrap_or_else(|| panic!("no compound '{name}'"));
    (id, &r.compounds[id])
}

fn channel_names(r: &Resources, ids: &[CompoundId]) -> Vec<String> {
    ids.iter()
        .map(|&c| {
            r.compounds
                .channel(c)
                .map(|ch| r.topology.channels[ch].name.clone())
                .unwrap_or_default()
        })
        .collect()
}

#[test]
fn single_host_2d_builds_mono_and_stereo_groups() {
    let counter = FrameNameCounter::new();
    let r = auto_config(
        &[GpuDescriptor::display(""), GpuDescriptor::gpu("", 0)],
        &["2D"],
        &counter,
    )
    .unwrap();

    assert_eq!(r.topology.nodes.len(), 1);
    let app = r.topology.find_application_node().unwrap();
    assert_eq!(r.topology.nodes[app].pipes().len(), 2);

    let root = r.compounds.roots()[0];
    assert_eq!(r.compounds.roots().len(), 1);
    let [segment] = r.compounds.children(root) else {
        panic!("one segment compound expected");
    };
    assert_eq!(
        channel_names(&r, &[*segment]),
        ["display channel 2D view"]
    );

    let (mono, mono_c) = compound_named(&r, "2D");
    assert_eq!(mono_c.eyes, Eyes::CYCLOP);
    assert_eq!(mono_c.equalizers.len(), 1);
    assert_eq!(
        channel_names(&r, r.compounds.children(mono)),
        ["GPU1 source channel"]
    );
    assert_eq!(mono_c.input_frames.len(), 1);

    let (stereo, stereo_c) = compound_named(&r, "Stereo");
    assert_eq!(stereo_c.eyes, Eyes::STEREO);
    let children = r.compounds.children(stereo);
    assert_eq!(children.len(), 3);
    assert_eq!(r.compounds[children[0]].eyes, Eyes::LEFT | Eyes::CYCLOP);
    assert!(r.compounds.is_leaf(children[0]));
    assert_eq!(r.compounds[children[1]].eyes, Eyes::RIGHT | Eyes::CYCLOP);
    assert!(r.compounds.is_leaf(children[1]));
    assert_eq!(
        r.compounds[children[2]].own_channel().map(|c| r.topology.channels[c].name.clone()),
        Some("GPU1 source channel".to_owned())
    );
    assert_eq!(stereo_c.input_frames.len(), 1);
}

#[test]
fn frame_edges_pair_producers_with_their_group() {
    let counter = FrameNameCounter::new();
    let r = auto_config(
        &[
            GpuDescriptor::display(""),
            GpuDescriptor::gpu("", 0),
            GpuDescriptor::gpu("", 1),
        ],
        &["2D"],
        &counter,
    )
    .unwrap();

    let (mono, mono_c) = compound_named(&r, "2D");
    let inputs: Vec<_> = mono_c.input_frames.iter().map(|f| f.name.clone()).collect();
    let outputs: Vec<_> = r
        .compounds
        .children(mono)
        .iter()
        .flat_map(|&c| r.compounds[c].output_frames.iter().map(|f| f.name.clone()))
        .collect();
    assert_eq!(inputs, outputs);
    assert!(inputs.iter().all(|n| n.starts_with("Frame.2D.")));
}

#[test]
fn db_layouts_partition_the_range() {
    let counter = FrameNameCounter::new();
    let r = auto_config(
        &[
            GpuDescriptor::display(""),
            GpuDescriptor::gpu("", 0),
            GpuDescriptor::gpu("", 1),
            GpuDescriptor::gpu("", 2),
        ],
        &["static DB", "dynamic DB"],
        &counter,
    )
    .unwrap();
    assert_eq!(r.compounds.roots().len(), 2);

    let (_, fixed) = compound_named(&r, "static DB");
    assert!(fixed.equalizers.is_empty());
    assert_eq!(fixed.buffers, Buffers::COLOR | Buffers::DEPTH);

    let (db, dynamic) = compound_named(&r, "dynamic DB");
    assert_eq!(dynamic.equalizers.len(), 1);
    let ranges: Vec<_> = r
        .compounds
        .children(db)
        .iter()
        .map(|&c| r.compounds[c].range)
        .collect();
    assert_eq!(ranges.len(), 3);
    assert_eq!(ranges[0].start, 0.0);
    assert_eq!(ranges[2].end, 1.0);
}

#[test]
fn unknown_layout_is_a_topology_error() {
    let counter = FrameNameCounter::new();
    let err = auto_config(
        &[GpuDescriptor::display(""), GpuDescriptor::gpu("", 0)],
        &["Cave"],
        &counter,
    )
    .unwrap_err();
    assert!(matches!(err, ClusterError::Topology(_)));
}

#[test]
fn simple_layout_adds_no_sources() {
    let counter = FrameNameCounter::new();
    let r = auto_config(
        &[GpuDescriptor::display(""), GpuDescriptor::gpu("", 0)],
        &["Simple"],
        &counter,
    )
    .unwrap();
    assert_eq!(r.compounds.len(), 2);
    assert_eq!(counter.current(), 0);
}

#[test]
fn nothing_discovered_is_an_error() {
    let counter = FrameNameCounter::new();
    assert!(auto_config(&[], &["2D"], &counter).is_err());
}
