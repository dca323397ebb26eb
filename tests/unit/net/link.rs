use super::*;
use crate::foundation::ids::RequestId;

#[derive(Debug)]
struct Dummy;

impl NetNode for Dummy {
    fn name(&self) -> &str {
        "dummy"
    }

    fn is_connected(&self) -> bool {
        true
    }

    fn send(&self, _packet: Packet) -> ClusterResult<()> {
        Ok(())
    }
}

fn launch() -> NodeLaunch {
    NodeLaunch {
        node: NodeId(1),
        name: "render1".to_owned(),
        descriptions: vec![ConnectionDescription {
            hostname: "render1".to_owned(),
            port: 4242,
        }],
        launch_timeout: Duration::from_secs(1),
        launch_command: "ssh -n %h %c".to_owned(),
        launch_quote: '\'',
        program: "worker".to_owned(),
        work_dir: "/tmp/app".to_owned(),
        auto_launch: true,
    }
}

#[test]
fn launch_command_expands_host_and_quoted_client() {
    let l = launch();
    assert_eq!(
        l.command_line("render1"),
        "ssh -n render1 'cd /tmp/app && worker'"
    );
    assert_eq!(l.hostnames(), vec!["render1"]);
}

#[test]
fn inbox_routes_replies_to_request_table_and_commands_to_queue() {
    let requests = Arc::new(RequestTable::new());
    let (tx, rx) = mpsc::channel();
    let inbox = ServerInbox::new(tx, Arc::clone(&requests));
    let from: NetNodeRef = Arc::new(Dummy);

    let id = requests.register();
    inbox
        .deliver(Arc::clone(&from), Packet::ConfigCreateReply { request: id })
        .unwrap();
    inbox
        .deliver(
            Arc::clone(&from),
            Packet::Shutdown {
                request: RequestId(9),
            },
        )
        .unwrap();

    assert_eq!(
        requests.wait(id, Duration::from_millis(10)),
        Some(Reply::Created)
    );
    let queued: Vec<Incoming> = rx.try_iter().collect();
    assert_eq!(queued.len(), 1);
    assert_eq!(queued[0].packet.kind(), "Shutdown");
}
