use super::*;
use crate::net::loopback::{LoopbackApp, LoopbackCluster};
use std::sync::Arc;

const ONE_NODE: &str = r#"{
    "nodes": [
        { "name": "application", "application": true },
        {
            "name": "render1",
            "host": "render1",
            "pipes": [{ "name": "GPU1", "windows": [{ "name": "window", "channels": [{ "name": "channel" }] }] }]
        }
    ],
    "compounds": [{ "name": "draw", "channel": "channel" }]
}"#;

struct Fixture {
    server: Server,
    app: Arc<LoopbackApp>,
    link: NetNodeRef,
}

fn fixture(templates: usize) -> Fixture {
    let (inbox, queue) = ServerInbox::channel();
    let cluster = Arc::new(LoopbackCluster::new(inbox.clone()));
    let settings = ServerSettings {
        launch_timeout_ms: 1_000,
        reply_timeout_ms: 1_000,
        teardown_polls: 200,
        teardown_poll_interval_ms: 1,
        ..ServerSettings::default()
    };
    let mut server = Server::new(settings, cluster, inbox.clone(), queue);
    for _ in 0..templates {
        server
            .load_config(ConfigDef::from_json(ONE_NODE).unwrap())
            .unwrap();
    }
    let app = LoopbackApp::new("application", inbox);
    let link = app.link();
    Fixture { server, app, link }
}

fn chosen_session(app: &LoopbackApp, request: RequestId) -> Option<Option<SessionId>> {
    app.received().into_iter().find_map(|p| match p {
        Packet::ChooseConfigReply { request: r, session } if r == request => Some(session),
        _ => None,
    })
}

#[test]
fn run_needs_a_template() {
    let mut f = fixture(0);
    assert!(matches!(f.server.run(), Err(ClusterError::Config(_))));
    assert!(!f.server.is_running());
}

#[test]
fn choose_binds_copies_of_the_first_template() {
    let mut f = fixture(1);
    let first = f
        .server
        .choose_config(&f.link, RequestId(1), "/work#client")
        .unwrap();
    let second = f.server.choose_config(&f.link, RequestId(2), "/other").unwrap();
    assert_ne!(first, second);
    assert_eq!(f.server.sessions(), [first, second]);

    let config = f.server.config(first).unwrap();
    assert_eq!(config.name(), "CONFIG_1");
    assert_eq!(config.session(), first);
    assert_eq!(config.work_dir(), "/work");
    assert_eq!(config.render_client(), "client");
    assert!(config.application_link().is_some());

    let config = f.server.config(second).unwrap();
    assert_eq!(config.name(), "CONFIG_2");
    assert_eq!(config.work_dir(), "/other");
    assert_eq!(config.render_client(), "");

    // templates stay untouched
    assert_eq!(f.server.templates()[0].session(), SessionId(0));
    assert!(f.server.templates()[0].application_link().is_none());
}

#[test]
fn session_is_announced_before_the_reply() {
    let mut f = fixture(1);
    let session = f.server.choose_config(&f.link, RequestId(7), ".#client").unwrap();

    let received = f.app.received();
    let created = received
        .iter()
        .position(|p| matches!(p, Packet::CreateConfig { session: s, request: None, .. } if *s == session))
        .unwrap();
    let replied = received
        .iter()
        .position(|p| matches!(p, Packet::ChooseConfigReply { .. }))
        .unwrap();
    assert!(created < replied);
    assert_eq!(chosen_session(&f.app, RequestId(7)), Some(Some(session)));
}

#[test]
fn choose_without_templates_replies_none() {
    let mut f = fixture(0);
    assert!(f.server.choose_config(&f.link, RequestId(1), "").is_none());
    assert_eq!(chosen_session(&f.app, RequestId(1)), Some(None));
}

#[test]
fn use_config_parses_the_inline_definition() {
    let mut f = fixture(0);
    let info = format!("/work#client#{ONE_NODE}");
    let session = f.server.use_config(&f.link, RequestId(1), &info).unwrap();
    let config = f.server.config(session).unwrap();
    assert_eq!(config.work_dir(), "/work");
    assert_eq!(config.render_client(), "client");
    assert_eq!(config.resources().topology.nodes.len(), 2);

    for bad in ["/work#client#", "/work", "/work#client#{ not json"] {
        assert!(f.server.use_config(&f.link, RequestId(2), bad).is_none());
    }
    assert_eq!(f.server.sessions(), [session]);
}

#[test]
fn release_destroys_the_session_and_always_replies() {
    let mut f = fixture(1);
    let session = f.server.choose_config(&f.link, RequestId(1), "").unwrap();
    f.server
        .config_mut(session)
        .unwrap()
        .init(1)
        .unwrap();

    f.server.release_config(&f.link, RequestId(2), session);
    assert!(f.server.sessions().is_empty());
    let received = f.app.received();
    assert!(received.contains(&Packet::DestroyConfig { session }));
    assert!(received.contains(&Packet::ReleaseConfigReply {
        request: RequestId(2)
    }));

    f.app.clear();
    f.server.release_config(&f.link, RequestId(3), session);
    assert_eq!(
        f.app.received(),
        [Packet::ReleaseConfigReply {
            request: RequestId(3)
        }]
    );
}

#[test]
fn shutdown_is_refused_while_sessions_exist() {
    let mut f = fixture(1);
    let session = f.server.choose_config(&f.link, RequestId(1), "").unwrap();
    assert!(!f.server.shutdown(&f.link, RequestId(2)));
    f.server.release_config(&f.link, RequestId(3), session);
    assert!(f.server.shutdown(&f.link, RequestId(4)));

    let results: Vec<bool> = f
        .app
        .received()
        .into_iter()
        .filter_map(|p| match p {
            Packet::ShutdownReply { result, .. } => Some(result),
            _ => None,
        })
        .collect();
    assert_eq!(results, [false, true]);
}

#[test]
fn handle_routes_session_commands() {
    let mut f = fixture(1);
    let session = f.server.choose_config(&f.link, RequestId(1), "").unwrap();

    f.server
        .handle(Incoming {
            from: f.link.clone(),
            packet: Packet::ConfigInit {
                session,
                request: RequestId(2),
                init_id: 1,
            },
        })
        .unwrap();
    assert!(f.server.config(session).unwrap().is_running());
    let init = f.app.received().into_iter().find_map(|p| match p {
        Packet::ConfigInitReply {
            result, version, ..
        } => Some((result, version)),
        _ => None,
    });
    assert_eq!(init, Some((true, 1)));

    // commands for sessions that are gone are dropped
    f.server
        .handle(Incoming {
            from: f.link.clone(),
            packet: Packet::ConfigFinishAllFrames {
                session: SessionId(99),
            },
        })
        .unwrap();
}

#[test]
fn server_to_client_packets_are_a_protocol_error() {
    let mut f = fixture(1);
    let err = f
        .server
        .handle(Incoming {
            from: f.link.clone(),
            packet: Packet::ShutdownReply {
                request: RequestId(1),
                result: true,
            },
        })
        .unwrap_err();
    assert!(matches!(err, ClusterError::Protocol(_)));
}

#[test]
fn poll_reports_an_idle_queue() {
    let mut f = fixture(1);
    assert!(!f.server.poll(Duration::from_millis(1)).unwrap());
    assert_eq!(f.server.process_pending().unwrap(), 0);

    f.app
        .command(Packet::ChooseConfig {
            request: RequestId(1),
            renderer_info: String::new(),
        })
        .unwrap();
    assert!(f.server.poll(Duration::from_secs(1)).unwrap());
    assert_eq!(f.server.sessions().len(), 1);
}
