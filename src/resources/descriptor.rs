use crate::foundation::core::PixelViewport;
use crate::foundation::error::{ClusterError, ClusterResult};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// One device reported by resource discovery.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct GpuDescriptor {
    /// Host of the device. Empty means the application's own host.
    #[serde(default)]
    pub hostname: String,
    /// Device index; `None` for the plain display device.
    #[serde(default)]
    pub device: Option<u32>,
    #[serde(default)]
    pub port: Option<u32>,
    #[serde(default)]
    pub pvp: PixelViewport,
}

impl GpuDescriptor {
    pub fn display(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            device: None,
            port: None,
            pvp: PixelViewport::INVALID,
        }
    }

    pub fn gpu(hostname: impl Into<String>, device: u32) -> Self {
        Self {
            device: Some(device),
            ..Self::display(hostname)
        }
    }

    pub fn with_pvp(mut self, pvp: PixelViewport) -> Self {
        self.pvp = pvp;
        self
    }

    /// Parse a JSON array of descriptors.
    pub fn list_from_reader<R: std::io::Read>(r: R) -> ClusterResult<Vec<Self>> {
        serde_json::from_reader(r)
            .map_err(|e| ClusterError::config(format!("parse descriptor JSON: {e}")))
    }

    pub fn list_from_path(path: impl AsRef<Path>) -> ClusterResult<Vec<Self>> {
        let path = path.as_ref();
        let f = File::open(path).map_err(|e| {
            ClusterError::config(format!("open descriptors '{}': {e}", path.display()))
        })?;
        Self::list_from_reader(BufReader::new(f))
    }
}
