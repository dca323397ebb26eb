use crate::foundation::core::{RANGE_BASIS, Range, Viewport};
use crate::foundation::ids::CompoundId;

/// Current share and measured cost of one child of a balanced compound.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ChildLoad {
    pub child: CompoundId,
    /// Fraction of the work currently assigned, in `[0, 1]`.
    pub share: f32,
    /// Time spent on that share in the last measured frame.
    pub time_ms: f32,
}

/// New work assignment for one child.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Adjustment {
    Range { child: CompoundId, range: Range },
    Viewport { child: CompoundId, viewport: Viewport },
}

/// Adaptive strategy resizing the work of a compound's children between frames.
pub trait Rebalance {
    fn rebalance(&mut self, loads: &[ChildLoad]) -> Vec<Adjustment>;
}

/// Sort-last balancing: children get database ranges proportional to their speed.
#[derive(Clone, Debug, PartialEq)]
pub struct RangeBalancer {
    pub damping: f32,
}

/// Sort-first balancing: children get vertical screen tiles proportional to their speed.
#[derive(Clone, Debug, PartialEq)]
pub struct TileBalancer {
    pub damping: f32,
}

impl Default for RangeBalancer {
    fn default() -> Self {
        Self { damping: 0.5 }
    }
}

impl Default for TileBalancer {
    fn default() -> Self {
        Self { damping: 0.5 }
    }
}

impl Rebalance for RangeBalancer {
    fn rebalance(&mut self, loads: &[ChildLoad]) -> Vec<Adjustment> {
        let Some(shares) = target_shares(loads, self.damping) else {
            return Vec::new();
        };
        split_fixed(&shares)
            .into_iter()
            .zip(loads)
            .map(|((start, end), load)| Adjustment::Range {
                child: load.child,
                range: Range::from_fixed(start, end),
            })
            .collect()
    }
}

impl Rebalance for TileBalancer {
    fn rebalance(&mut self, loads: &[ChildLoad]) -> Vec<Adjustment> {
        let Some(shares) = target_shares(loads, self.damping) else {
            return Vec::new();
        };
        split_fixed(&shares)
            .into_iter()
            .zip(loads)
            .map(|((start, end), load)| {
                let r = Range::from_fixed(start, end);
                Adjustment::Viewport {
                    child: load.child,
                    viewport: Viewport::new(r.start, 0.0, r.width(), 1.0),
                }
            })
            .collect()
    }
}

/// Balancing strategy attached to a compound.
#[derive(Clone, Debug, PartialEq)]
pub enum Policy {
    Range(RangeBalancer),
    Tile(TileBalancer),
}

impl Policy {
    pub fn kind(&self) -> &'static str {
        match self {
            Policy::Range(_) => "db",
            Policy::Tile(_) => "2d",
        }
    }
}

impl Rebalance for Policy {
    fn rebalance(&mut self, loads: &[ChildLoad]) -> Vec<Adjustment> {
        match self {
            Policy::Range(p) => p.rebalance(loads),
            Policy::Tile(p) => p.rebalance(loads),
        }
    }
}

/// Attachment point of a policy. Freezing suspends resizing without detaching the policy.
#[derive(Clone, Debug, PartialEq)]
pub struct Equalizer {
    pub policy: Policy,
    pub frozen: bool,
}

impl Equalizer {
    pub fn range() -> Self {
        Self {
            policy: Policy::Range(RangeBalancer::default()),
            frozen: false,
        }
    }

    pub fn tile() -> Self {
        Self {
            policy: Policy::Tile(TileBalancer::default()),
            frozen: false,
        }
    }

    pub fn rebalance(&mut self, loads: &[ChildLoad]) -> Vec<Adjustment> {
        if self.frozen || loads.is_empty() {
            return Vec::new();
        }
        self.policy.rebalance(loads)
    }
}

/// Damped shares proportional to each child's speed (share per millisecond). `None` when no
/// child has a usable measurement.
fn target_shares(loads: &[ChildLoad], damping: f32) -> Option<Vec<f32>> {
    if loads.iter().all(|l| l.time_ms <= 0.0) {
        return None;
    }

    // Unmeasured children are assumed as fast as the slowest measured one.
    let min_speed = loads
        .iter()
        .filter(|l| l.time_ms > 0.0)
        .map(|l| l.share.max(f32::EPSILON) / l.time_ms)
        .fold(f32::INFINITY, f32::min);
    let speeds: Vec<f32> = loads
        .iter()
        .map(|l| {
            if l.time_ms > 0.0 {
                l.share.max(f32::EPSILON) / l.time_ms
            } else {
                min_speed
            }
        })
        .collect();
    let total: f32 = speeds.iter().sum();
    if total <= 0.0 || !total.is_finite() {
        return None;
    }

    let damping = damping.clamp(0.0, 1.0);
    Some(
        loads
            .iter()
            .zip(&speeds)
            .map(|(l, s)| l.share + damping * (s / total - l.share))
            .collect(),
    )
}

/// Contiguous fixed-point intervals of `[0, RANGE_BASIS]` proportional to `weights`. The last
/// interval always ends at the basis.
pub fn split_fixed(weights: &[f32]) -> Vec<(u32, u32)> {
    let total: f32 = weights.iter().map(|w| w.max(0.0)).sum();
    let n = weights.len();
    let mut out = Vec::with_capacity(n);
    let mut start = 0u32;
    for (i, w) in weights.iter().enumerate() {
        if i + 1 == n {
            out.push((start, RANGE_BASIS));
            break;
        }
        let step = if total > 0.0 {
            ((w.max(0.0) / total) * RANGE_BASIS as f32) as u32
        } else {
            RANGE_BASIS / n as u32
        };
        let end = (start + step).min(RANGE_BASIS);
        out.push((start, end));
        start = end;
    }
    out
}

#[cfg(test)]
#[path = "../../tests/unit/compound/equalizer.rs"]
mod tests;
