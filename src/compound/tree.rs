use crate::compound::equalizer::{Adjustment, ChildLoad, Equalizer, Policy};
use crate::compound::frame::{Frame, SwapBarrier};
use crate::compound::statistics::StatisticsLog;
use crate::foundation::core::{Buffers, Eyes, Range, Viewport};
use crate::foundation::ids::{Arena, ChannelId, CompoundId, Visit};
use crate::resources::topology::Topology;

/// One rendering task of the decomposition tree.
#[derive(Clone, Debug, PartialEq)]
pub struct Compound {
    pub name: String,
    parent: Option<CompoundId>,
    children: Vec<CompoundId>,
    channel: Option<ChannelId>,
    pub eyes: Eyes,
    pub range: Range,
    pub viewport: Viewport,
    pub buffers: Buffers,
    pub input_frames: Vec<Frame>,
    pub output_frames: Vec<Frame>,
    pub swap_barrier: Option<SwapBarrier>,
    pub equalizers: Vec<Equalizer>,
    active: bool,
    registered: bool,
}

impl Compound {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            children: Vec::new(),
            channel: None,
            eyes: Eyes::ALL,
            range: Range::ALL,
            viewport: Viewport::FULL,
            buffers: Buffers::default(),
            input_frames: Vec::new(),
            output_frames: Vec::new(),
            swap_barrier: None,
            equalizers: Vec::new(),
            active: false,
            registered: false,
        }
    }

    pub fn with_channel(mut self, channel: ChannelId) -> Self {
        self.channel = Some(channel);
        self
    }

    pub fn parent(&self) -> Option<CompoundId> {
        self.parent
    }

    pub fn children(&self) -> &[CompoundId] {
        &self.children
    }

    /// Channel set on this compound itself, ignoring inheritance.
    pub fn own_channel(&self) -> Option<ChannelId> {
        self.channel
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_registered(&self) -> bool {
        self.registered
    }
}

/// Arena-backed compound forest. Parents own their children; children keep a back-reference.
#[derive(Clone, Debug, Default)]
pub struct CompoundTree {
    arena: Arena<CompoundId, Compound>,
    roots: Vec<CompoundId>,
}

impl CompoundTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_root(&mut self, compound: Compound) -> CompoundId {
        let id = self.arena.insert(Compound {
            parent: None,
            children: Vec::new(),
            ..compound
        });
        self.roots.push(id);
        id
    }

    pub fn add_child(&mut self, parent: CompoundId, compound: Compound) -> CompoundId {
        let id = self.arena.insert(Compound {
            parent: Some(parent),
            children: Vec::new(),
            ..compound
        });
        self.arena[parent].children.push(id);
        id
    }

    /// Remove a top-level compound and everything below it.
    pub fn remove_root(&mut self, root: CompoundId) -> bool {
        let Some(pos) = self.roots.iter().position(|r| *r == root) else {
            return false;
        };
        self.roots.remove(pos);
        for id in self.subtree(root) {
            self.arena.remove(id);
        }
        true
    }

    pub fn roots(&self) -> &[CompoundId] {
        &self.roots
    }

    pub fn get(&self, id: CompoundId) -> Option<&Compound> {
        self.arena.get(id)
    }

    pub fn get_mut(&mut self, id: CompoundId) -> Option<&mut Compound> {
        self.arena.get_mut(id)
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    pub fn children(&self, id: CompoundId) -> &[CompoundId] {
        self.arena.get(id).map(|c| c.children.as_slice()).unwrap_or(&[])
    }

    pub fn is_leaf(&self, id: CompoundId) -> bool {
        self.children(id).is_empty()
    }

    pub fn set_channel(&mut self, id: CompoundId, channel: Option<ChannelId>) {
        if let Some(c) = self.arena.get_mut(id) {
            c.channel = channel;
        }
    }

    /// Channel the compound renders to: its own, else the closest ancestor's.
    pub fn channel(&self, id: CompoundId) -> Option<ChannelId> {
        let mut cur = Some(id);
        while let Some(c) = cur.and_then(|i| self.arena.get(i)) {
            if c.channel.is_some() {
                return c.channel;
            }
            cur = c.parent;
        }
        None
    }

    /// Eye passes after restriction by every ancestor.
    pub fn effective_eyes(&self, id: CompoundId) -> Eyes {
        let mut eyes = Eyes::ALL;
        let mut cur = Some(id);
        while let Some(c) = cur.and_then(|i| self.arena.get(i)) {
            eyes &= c.eyes;
            cur = c.parent;
        }
        eyes
    }

    /// Database range nested into every ancestor's range.
    pub fn effective_range(&self, id: CompoundId) -> Range {
        self.ancestry(id).into_iter().fold(Range::ALL, |acc, c| {
            let r = self.arena[c].range;
            Range::new(
                acc.start + r.start * acc.width(),
                acc.start + r.end * acc.width(),
            )
        })
    }

    /// Viewport nested into every ancestor's viewport, relative to the destination channel.
    pub fn effective_viewport(&self, id: CompoundId) -> Viewport {
        self.ancestry(id).into_iter().fold(Viewport::FULL, |mut acc, c| {
            acc.apply(self.arena[c].viewport);
            acc
        })
    }

    /// Path from the top-level compound down to `id`.
    fn ancestry(&self, id: CompoundId) -> Vec<CompoundId> {
        let mut path = Vec::new();
        let mut cur = Some(id);
        while let Some(i) = cur {
            let Some(c) = self.arena.get(i) else {
                break;
            };
            path.push(i);
            cur = c.parent;
        }
        path.reverse();
        path
    }

    /// Pre-order depth-first traversal below `root`.
    pub fn walk(
        &self,
        root: CompoundId,
        visit: &mut dyn FnMut(CompoundId, &Compound) -> Visit,
    ) -> Visit {
        let mut stack = vec![root];
        let mut result = Visit::Continue;
        while let Some(id) = stack.pop() {
            let Some(c) = self.arena.get(id) else {
                continue;
            };
            match visit(id, c) {
                Visit::Terminate => return Visit::Terminate,
                Visit::Prune => result = Visit::Prune,
                Visit::Continue => stack.extend(c.children.iter().rev()),
            }
        }
        result
    }

    /// [`Self::walk`] over every top-level compound.
    pub fn walk_all(&self, visit: &mut dyn FnMut(CompoundId, &Compound) -> Visit) -> Visit {
        let mut result = Visit::Continue;
        for &root in &self.roots {
            match self.walk(root, visit) {
                Visit::Terminate => return Visit::Terminate,
                Visit::Prune => result = Visit::Prune,
                Visit::Continue => {}
            }
        }
        result
    }

    /// All compounds below and including `root`, pre-order.
    pub fn subtree(&self, root: CompoundId) -> Vec<CompoundId> {
        let mut out = Vec::new();
        self.walk(root, &mut |id, _| {
            out.push(id);
            Visit::Continue
        });
        out
    }

    /// Every compound of the forest, pre-order.
    pub fn all(&self) -> Vec<CompoundId> {
        self.roots.iter().flat_map(|&r| self.subtree(r)).collect()
    }

    pub fn find_by_name(&self, name: &str) -> Option<CompoundId> {
        let mut found = None;
        self.walk_all(&mut |id, c| {
            if c.name == name {
                found = Some(id);
                return Visit::Terminate;
            }
            Visit::Continue
        });
        found
    }

    /// Whether an initialized compound renders to `channel`.
    pub fn uses_channel(&self, channel: ChannelId) -> bool {
        let mut used = false;
        self.walk_all(&mut |_, c| {
            if c.active && c.channel == Some(channel) {
                used = true;
                return Visit::Terminate;
            }
            Visit::Continue
        });
        used
    }

    /// Activate the subtree, depth-first, and the channels it renders to.
    pub fn init(&mut self, root: CompoundId, topology: &mut Topology) {
        for id in self.subtree(root) {
            let c = &mut self.arena[id];
            if c.active {
                continue;
            }
            c.active = true;
            c.registered = true;
            if let Some(channel) = c.channel {
                topology.activate_channel(channel);
            }
        }
    }

    /// Deactivate the subtree and release its channels, leaves first.
    pub fn exit(&mut self, root: CompoundId, topology: &mut Topology) {
        for id in self.subtree(root).into_iter().rev() {
            let c = &mut self.arena[id];
            if !c.active {
                continue;
            }
            c.active = false;
            if let Some(channel) = c.channel {
                topology.deactivate_channel(channel);
            }
        }
    }

    pub fn deregister(&mut self, root: CompoundId) {
        for id in self.subtree(root) {
            self.arena[id].registered = false;
        }
    }

    /// Run the load balancers of the subtree against the latest statistics.
    pub fn update(&mut self, root: CompoundId, stats: &StatisticsLog) -> usize {
        let mut applied = 0;
        for id in self.subtree(root) {
            if self.arena[id].equalizers.is_empty() || self.arena[id].children.is_empty() {
                continue;
            }
            let children = self.arena[id].children.clone();
            let mut equalizers = std::mem::take(&mut self.arena[id].equalizers);
            for eq in &mut equalizers {
                let loads: Vec<ChildLoad> = children
                    .iter()
                    .map(|&child| {
                        let c = &self.arena[child];
                        let share = match eq.policy {
                            Policy::Range(_) => c.range.width(),
                            Policy::Tile(_) => c.viewport.w,
                        };
                        ChildLoad {
                            child,
                            share,
                            time_ms: stats.subtree_time_ms(self, child).unwrap_or(0.0),
                        }
                    })
                    .collect();
                for adjustment in eq.rebalance(&loads) {
                    self.apply(adjustment);
                    applied += 1;
                }
            }
            self.arena[id].equalizers = equalizers;
        }
        applied
    }

    fn apply(&mut self, adjustment: Adjustment) {
        match adjustment {
            Adjustment::Range { child, range } => {
                if let Some(c) = self.arena.get_mut(child) {
                    c.range = range;
                }
            }
            Adjustment::Viewport { child, viewport } => {
                if let Some(c) = self.arena.get_mut(child) {
                    c.viewport = viewport;
                }
            }
        }
    }

    /// Set the frozen flag of every load balancer in the forest.
    pub fn freeze_equalizers(&mut self, freeze: bool) -> usize {
        let mut count = 0;
        for id in self.all() {
            for eq in &mut self.arena[id].equalizers {
                eq.frozen = freeze;
                count += 1;
            }
        }
        count
    }

    /// Propagate a pipeline depth to every frame edge and swap barrier.
    pub fn set_latency(&mut self, latency: u32) {
        for id in self.all() {
            let c = &mut self.arena[id];
            for frame in c.input_frames.iter_mut().chain(c.output_frames.iter_mut()) {
                frame.latency = latency;
            }
            if let Some(barrier) = &mut c.swap_barrier {
                barrier.latency = latency;
            }
        }
    }
}

impl std::ops::Index<CompoundId> for CompoundTree {
    type Output = Compound;

    fn index(&self, id: CompoundId) -> &Compound {
        &self.arena[id]
    }
}

impl std::ops::IndexMut<CompoundId> for CompoundTree {
    fn index_mut(&mut self, id: CompoundId) -> &mut Compound {
        &mut self.arena[id]
    }
}

#[cfg(test)]
#[path = "../../tests/unit/compound/tree.rs"]
mod tests;
