use super::*;
use std::sync::Arc;

#[test]
fn reply_served_before_wait_is_buffered() {
    let table = RequestTable::new();
    let id = table.register();
    assert!(table.serve(id, Reply::Created));
    assert_eq!(
        table.wait(id, Duration::from_millis(10)),
        Some(Reply::Created)
    );
    assert_eq!(table.pending(), 0);
}

#[test]
fn second_reply_for_same_request_is_rejected() {
    let table = RequestTable::new();
    let id = table.register();
    assert!(table.serve(id, Reply::Flushed(3)));
    assert!(!table.serve(id, Reply::Flushed(4)));
    assert_eq!(table.wait(id, Duration::from_millis(10)), Some(Reply::Flushed(3)));
}

#[test]
fn unknown_request_is_not_served() {
    let table = RequestTable::new();
    assert!(!table.serve(RequestId(999), Reply::Created));
    assert_eq!(table.wait(RequestId(999), Duration::from_millis(1)), None);
}

#[test]
fn wait_times_out_without_reply() {
    let table = RequestTable::new();
    let id = table.register();
    assert_eq!(table.wait(id, Duration::from_millis(20)), None);
    assert_eq!(table.pending(), 0);
}

#[test]
fn replies_from_another_thread_wake_the_waiter() {
    let table = Arc::new(RequestTable::new());
    let ids: Vec<RequestId> = (0..4).map(|_| table.register()).collect();

    let server = Arc::clone(&table);
    let served = ids.clone();
    let handle = std::thread::spawn(move || {
        for id in served.into_iter().rev() {
            std::thread::sleep(Duration::from_millis(5));
            server.serve(id, Reply::Running(Ok(())));
        }
    });

    for id in ids {
        assert_eq!(
            table.wait(id, Duration::from_secs(5)),
            Some(Reply::Running(Ok(())))
        );
    }
    handle.join().unwrap();
}

#[test]
fn reply_packets_map_to_payloads() {
    let packet = Packet::NodeRunningReply {
        request: RequestId(7),
        result: Err("no gpu".to_owned()),
    };
    assert_eq!(
        Reply::from_packet(&packet),
        Some((RequestId(7), Reply::Running(Err("no gpu".to_owned()))))
    );
    assert_eq!(Reply::from_packet(&Packet::ClientExit), None);
}
