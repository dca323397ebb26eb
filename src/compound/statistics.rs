use crate::compound::tree::CompoundTree;
use crate::foundation::ids::{ChannelId, CompoundId};
use std::collections::HashMap;

/// Timing sample of one task executed by a render client.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Statistic {
    pub compound: CompoundId,
    pub channel: ChannelId,
    pub frame: u32,
    pub start_ms: u64,
    pub end_ms: u64,
}

impl Statistic {
    pub fn duration_ms(&self) -> u64 {
        self.end_ms.saturating_sub(self.start_ms)
    }
}

/// Measures a span of task work; the sample is recorded when the guard drops.
pub struct ScopedStatistic<'a> {
    sink: &'a mut Vec<Statistic>,
    now_ms: &'a dyn Fn() -> u64,
    compound: CompoundId,
    channel: ChannelId,
    frame: u32,
    start_ms: u64,
}

impl<'a> ScopedStatistic<'a> {
    pub fn new(
        sink: &'a mut Vec<Statistic>,
        now_ms: &'a dyn Fn() -> u64,
        compound: CompoundId,
        channel: ChannelId,
        frame: u32,
    ) -> Self {
        let start_ms = now_ms();
        Self {
            sink,
            now_ms,
            compound,
            channel,
            frame,
            start_ms,
        }
    }
}

impl Drop for ScopedStatistic<'_> {
    fn drop(&mut self) {
        let end_ms = (self.now_ms)().max(self.start_ms);
        self.sink.push(Statistic {
            compound: self.compound,
            channel: self.channel,
            frame: self.frame,
            start_ms: self.start_ms,
            end_ms,
        });
    }
}

/// Latest timing per compound, the metrics fed to load balancers.
#[derive(Clone, Debug, Default)]
pub struct StatisticsLog {
    latest: HashMap<CompoundId, Statistic>,
}

impl StatisticsLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep the sample if it is not older than what is already known for its compound.
    pub fn record(&mut self, stat: Statistic) {
        match self.latest.get(&stat.compound) {
            Some(known) if known.frame > stat.frame => {}
            _ => {
                self.latest.insert(stat.compound, stat);
            }
        }
    }

    pub fn latest(&self, compound: CompoundId) -> Option<&Statistic> {
        self.latest.get(&compound)
    }

    /// Summed latest task time of every compound below and including `root`.
    pub fn subtree_time_ms(&self, tree: &CompoundTree, root: CompoundId) -> Option<f32> {
        let mut total = 0u64;
        let mut seen = false;
        for id in tree.subtree(root) {
            if let Some(stat) = self.latest.get(&id) {
                total += stat.duration_ms();
                seen = true;
            }
        }
        seen.then_some(total as f32)
    }

    pub fn clear(&mut self) {
        self.latest.clear();
    }
}
