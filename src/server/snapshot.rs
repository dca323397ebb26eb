use crate::foundation::ids::NodeId;
use crate::net::packets::FrameTask;
use xxhash_rust::xxh3::Xxh3;

const XXH3_SEED: u64 = 0x5eed_c0de_a11c_e5e1;

/// Tasks of every active node for one frame.
pub type TaskSnapshot = Vec<(NodeId, Vec<FrameTask>)>;

/// Stable fingerprint of a task snapshot. Frame numbers are not part of a task, so an unchanged
/// decomposition hashes the same on every frame.
pub fn fingerprint(snapshot: &TaskSnapshot) -> u64 {
    let mut h = StableHasher::new();
    h.write_u32(snapshot.len() as u32);
    for (node, tasks) in snapshot {
        h.write_u32(node.0);
        h.write_u32(tasks.len() as u32);
        for task in tasks {
            write_task(&mut h, task);
        }
    }
    h.finish()
}

fn write_task(h: &mut StableHasher, t: &FrameTask) {
    h.write_u32(t.compound.0);
    h.write_u32(t.channel.0);
    h.write_str(&t.channel_name);
    h.write_u8(t.eyes.bits());
    h.write_u8(t.buffers.bits());
    h.write_f32(t.range.start);
    h.write_f32(t.range.end);
    h.write_f32(t.viewport.x);
    h.write_f32(t.viewport.y);
    h.write_f32(t.viewport.w);
    h.write_f32(t.viewport.h);
    h.write_u32(t.inputs.len() as u32);
    for name in &t.inputs {
        h.write_str(name);
    }
    h.write_u32(t.outputs.len() as u32);
    for name in &t.outputs {
        h.write_str(name);
    }
}

struct StableHasher {
    inner: Xxh3,
}

impl StableHasher {
    fn new() -> Self {
        Self {
            inner: Xxh3::with_seed(XXH3_SEED),
        }
    }

    fn write_bytes(&mut self, b: &[u8]) {
        self.inner.update(b);
    }

    fn write_u8(&mut self, v: u8) {
        self.write_bytes(&[v]);
    }

    fn write_u32(&mut self, v: u32) {
        self.write_bytes(&v.to_le_bytes());
    }

    fn write_f32(&mut self, v: f32) {
        // -0.0 and 0.0 describe the same assignment
        let v = if v == 0.0 { 0.0 } else { v };
        self.write_u32(v.to_bits());
    }

    fn write_str(&mut self, s: &str) {
        self.write_u32(s.len() as u32);
        self.write_bytes(s.as_bytes());
    }

    fn finish(self) -> u64 {
        self.inner.digest()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/server/snapshot.rs"]
mod tests;
