use crate::foundation::error::{ClusterError, ClusterResult};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Duration;

/// Server-wide defaults applied to every configuration and node.
///
/// Every field has a default, so a settings file only needs to name what it overrides.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerSettings {
    /// Time budget for launching and connecting a render client.
    pub launch_timeout_ms: u64,
    /// Remote launch command. `%h` expands to the host, `%c` to the render-client command.
    pub launch_command: String,
    /// Quote character wrapped around arguments of the launch command.
    pub launch_quote: char,
    /// Frames that may be in flight before the application blocks.
    pub latency: u32,
    /// Poll budget shared by all render clients during teardown.
    pub teardown_polls: u32,
    /// Sleep between teardown polls.
    pub teardown_poll_interval_ms: u64,
    /// Upper bound for awaiting a node reply.
    pub reply_timeout_ms: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            launch_timeout_ms: 60_000,
            launch_command: "ssh -n %h %c".to_owned(),
            launch_quote: '"',
            latency: 1,
            teardown_polls: 50,
            teardown_poll_interval_ms: 100,
            reply_timeout_ms: 10_000,
        }
    }
}

impl ServerSettings {
    /// Parse settings from a JSON reader.
    pub fn from_reader<R: std::io::Read>(r: R) -> ClusterResult<Self> {
        serde_json::from_reader(r)
            .map_err(|e| ClusterError::config(format!("parse server settings JSON: {e}")))
    }

    /// Parse settings from a JSON file on disk.
    pub fn from_path(path: impl AsRef<Path>) -> ClusterResult<Self> {
        let path = path.as_ref();
        let f = File::open(path).map_err(|e| {
            ClusterError::config(format!("open server settings '{}': {e}", path.display()))
        })?;
        Self::from_reader(BufReader::new(f))
    }

    pub fn launch_timeout(&self) -> Duration {
        Duration::from_millis(self.launch_timeout_ms)
    }

    pub fn teardown_poll_interval(&self) -> Duration {
        Duration::from_millis(self.teardown_poll_interval_ms)
    }

    pub fn reply_timeout(&self) -> Duration {
        Duration::from_millis(self.reply_timeout_ms)
    }
}

#[cfg(test)]
#[path = "../tests/unit/settings.rs"]
mod tests;
