use super::*;
use crate::net::link::ServerInbox;
use crate::net::loopback::LoopbackCluster;
use std::sync::Arc;

const WALL: &str = r#"{
    "name": "wall",
    "latency": 2,
    "eyes": "LEFT | RIGHT",
    "nodes": [
        {
            "name": "application",
            "application": true,
            "pipes": [{
                "name": "display",
                "windows": [{
                    "name": "window",
                    "pvp": { "x": 0, "y": 0, "w": 1920, "h": 1080 },
                    "channels": [{ "name": "display" }]
                }]
            }]
        },
        {
            "name": "render1",
            "host": "render1",
            "launch_command": "rsh %h %c",
            "pipes": [{
                "name": "GPU1",
                "device": 0,
                "windows": [{
                    "name": "source",
                    "drawable": "Fbo",
                    "channels": [{ "name": "source" }]
                }]
            }]
        }
    ],
    "observers": [{ "name": "observer" }],
    "layouts": [{ "name": "2D", "views": [{ "name": "view", "observer": "observer" }] }],
    "canvases": [{
        "name": "canvas",
        "layouts": ["2D"],
        "segments": [{ "name": "segment", "channel": "display" }]
    }],
    "compounds": [{
        "name": "root",
        "channel": "display view",
        "load_balancer": "2d",
        "input_frames": ["frame"],
        "children": [{
            "name": "source",
            "channel": "source",
            "output_frames": ["frame"]
        }]
    }]
}"#;

#[test]
fn explicit_definition_builds_every_entity() {
    let counter = FrameNameCounter::new();
    let r = ConfigDef::from_json(WALL)
        .unwrap()
        .into_resources(&counter)
        .unwrap();

    assert_eq!(r.topology.nodes.len(), 2);
    let app = r.topology.find_application_node().unwrap();
    assert_eq!(r.topology.nodes[app].name, "application");
    let render1 = r.topology.node_by_host("render1").unwrap();
    assert_eq!(
        r.topology.nodes[render1].launch_command.as_deref(),
        Some("rsh %h %c")
    );

    let source = r.topology.find_channel_by_name("source").unwrap();
    let window = r.topology.channels[source].window;
    assert_eq!(r.topology.windows[window].drawable, DrawableHint::Fbo);

    // the canvas contributes one destination channel, already bound by the root compound
    let destination = r.topology.find_channel_by_name("display view").unwrap();
    assert_eq!(r.compounds.roots().len(), 1);
    let root = r.compounds.roots()[0];
    assert_eq!(r.compounds[root].name, "root");
    assert_eq!(r.compounds.channel(root), Some(destination));
    assert_eq!(r.compounds[root].equalizers.len(), 1);

    let [child] = r.compounds.children(root) else {
        panic!("one child expected");
    };
    assert_eq!(r.compounds.channel(*child), Some(source));
    assert_eq!(r.compounds[*child].output_frames, [Frame::new("frame")]);
}

#[test]
fn unbound_destination_channels_get_compounds() {
    let mut def = ConfigDef::from_json(WALL).unwrap();
    def.compounds.clear();
    let r = def.into_resources(&FrameNameCounter::new()).unwrap();

    let destination = r.topology.find_channel_by_name("display view").unwrap();
    assert_eq!(r.compounds.roots().len(), 1);
    assert!(r.compounds.uses_channel(destination));
}

#[test]
fn config_takes_name_latency_and_eyes() {
    let (inbox, _queue) = ServerInbox::channel();
    let net = NetContext::new(Arc::new(LoopbackCluster::new(inbox.clone())), &inbox);
    let config = ConfigDef::from_json(WALL)
        .unwrap()
        .into_config(&ServerSettings::default(), net, &FrameNameCounter::new())
        .unwrap();

    assert_eq!(config.name(), "wall");
    assert_eq!(config.latency(), 2);
    assert_eq!(config.eyes, Eyes::STEREO);
    let root = config.resources().compounds.roots()[0];
    let frame = &config.resources().compounds[root].input_frames[0];
    assert_eq!(frame.latency, 2);
}

#[test]
fn zero_latency_is_accepted() {
    let (inbox, _queue) = ServerInbox::channel();
    let net = NetContext::new(Arc::new(LoopbackCluster::new(inbox.clone())), &inbox);
    let config = ConfigDef::from_json(
        r#"{ "name": "x", "latency": 0, "nodes": [{ "name": "a", "application": true }] }"#,
    )
    .unwrap()
    .into_config(&ServerSettings::default(), net, &FrameNameCounter::new())
    .unwrap();
    assert_eq!(config.latency(), 0);
}

#[test]
fn automatic_definition_uses_discovery() {
    let def = ConfigDef::from_json(
        r#"{
            "name": "auto",
            "auto": {
                "descriptors": [{ "hostname": "" }, { "hostname": "", "device": 0 }],
                "layouts": ["Simple"]
            }
        }"#,
    )
    .unwrap();
    let r = def.into_resources(&FrameNameCounter::new()).unwrap();
    assert_eq!(r.topology.pipes.len(), 2);
    assert_eq!(r.compounds.roots().len(), 1);
}

#[test]
fn invalid_definitions_are_rejected() {
    let auto_with_nodes = ConfigDef {
        auto: Some(AutoDef {
            descriptors: Vec::new(),
            layouts: Vec::new(),
        }),
        nodes: vec![NodeDef::default()],
        ..ConfigDef::default()
    };
    let two_apps = ConfigDef {
        nodes: vec![
            NodeDef {
                application: true,
                ..NodeDef::default()
            },
            NodeDef {
                application: true,
                ..NodeDef::default()
            },
        ],
        ..ConfigDef::default()
    };
    let missing_layout = ConfigDef {
        canvases: vec![CanvasDef {
            layouts: vec!["nowhere".to_owned()],
            ..CanvasDef::default()
        }],
        ..ConfigDef::default()
    };
    let nested_balancer = ConfigDef {
        compounds: vec![CompoundDef {
            children: vec![CompoundDef {
                load_balancer: Some("dfr".to_owned()),
                ..CompoundDef::default()
            }],
            ..CompoundDef::default()
        }],
        ..ConfigDef::default()
    };
    let inverted_range = ConfigDef {
        compounds: vec![CompoundDef {
            range: Some(Range::new(0.8, 0.2)),
            ..CompoundDef::default()
        }],
        ..ConfigDef::default()
    };

    for def in [
        auto_with_nodes,
        two_apps,
        missing_layout,
        nested_balancer,
        inverted_range,
    ] {
        assert!(matches!(def.validate(), Err(ClusterError::Config(_))));
    }
}

#[test]
fn dangling_channel_reference_fails_the_build() {
    let mut def = ConfigDef::from_json(WALL).unwrap();
    def.compounds[0].children[0].channel = Some("missing".to_owned());
    let err = def.into_resources(&FrameNameCounter::new()).unwrap_err();
    assert!(err.to_string().contains("missing"));
}

#[test]
fn unknown_fields_are_rejected() {
    assert!(ConfigDef::from_json(r#"{ "name": "x", "frobnicate": true }"#).is_err());
}
