use super::*;

#[test]
fn empty_object_yields_defaults() {
    let s = ServerSettings::from_reader("{}".as_bytes()).unwrap();
    assert_eq!(s, ServerSettings::default());
    assert_eq!(s.teardown_polls, 50);
    assert_eq!(s.teardown_poll_interval(), Duration::from_millis(100));
}

#[test]
fn partial_override_keeps_other_defaults() {
    let s = ServerSettings::from_reader(r#"{ "latency": 3, "launch_timeout_ms": 500 }"#.as_bytes())
        .unwrap();
    assert_eq!(s.latency, 3);
    assert_eq!(s.launch_timeout(), Duration::from_millis(500));
    assert_eq!(s.launch_command, "ssh -n %h %c");
}

#[test]
fn unknown_fields_are_rejected() {
    let err = ServerSettings::from_reader(r#"{ "latncy": 3 }"#.as_bytes()).unwrap_err();
    assert!(err.to_string().contains("configuration error:"));
}
