use super::*;

#[test]
fn display_prefixes_are_stable() {
    assert!(
        ClusterError::invalid_state("x")
            .to_string()
            .contains("invalid state:")
    );
    assert!(
        ClusterError::topology("x")
            .to_string()
            .contains("topology error:")
    );
    assert!(
        ClusterError::connection("x")
            .to_string()
            .contains("connection error:")
    );
    assert!(ClusterError::node("x").to_string().contains("node error:"));
    assert!(
        ClusterError::protocol("x")
            .to_string()
            .contains("protocol error:")
    );
    assert!(
        ClusterError::config("x")
            .to_string()
            .contains("configuration error:")
    );
}

#[test]
fn other_preserves_source() {
    let base = std::io::Error::other("boom");
    let err = ClusterError::Other(anyhow::Error::new(base));
    assert!(err.to_string().contains("boom"));
}
