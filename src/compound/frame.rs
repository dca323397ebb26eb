use crate::foundation::core::Buffers;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

/// One end of a named data-transfer edge between two compounds.
///
/// A producer's output frame and a consumer's input frame pair up by sharing a name.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Frame {
    pub name: String,
    /// Frames buffered on this edge.
    #[serde(default)]
    pub latency: u32,
    #[serde(default)]
    pub buffers: Buffers,
}

impl Frame {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            latency: 0,
            buffers: Buffers::default(),
        }
    }
}

/// Cross-node barrier synchronizing buffer swaps of a set of compounds.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SwapBarrier {
    pub name: String,
    #[serde(default)]
    pub latency: u32,
}

/// Process-wide counter naming frame edges. Clones share the same count.
#[derive(Clone, Debug, Default)]
pub struct FrameNameCounter(Arc<AtomicU32>);

impl FrameNameCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next frame edge name for `group`: `Frame.<group>.<n>`, `n` starting at 1.
    pub fn next_name(&self, group: &str) -> String {
        let n = self.0.fetch_add(1, Ordering::Relaxed) + 1;
        format!("Frame.{group}.{n}")
    }

    pub fn current(&self) -> u32 {
        self.0.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/compound/frame.rs"]
mod tests;
