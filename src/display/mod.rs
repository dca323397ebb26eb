//! Display entities of a configuration: canvases split into segments, layouts of views, and the
//! observers looking at them.

pub mod canvas;

use crate::compound::frame::SwapBarrier;
use crate::foundation::core::{Eyes, Viewport};
use crate::foundation::ids::{Arena, CanvasId, ChannelId, LayoutId, ObserverId, SegmentId, ViewId};

#[derive(Clone, Debug, PartialEq)]
pub struct Observer {
    pub name: String,
    pub eye_base: f32,
    pub needs_delete: bool,
    pub(crate) active: bool,
}

impl Observer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            eye_base: 0.05,
            needs_delete: false,
            active: false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }
}

/// Named arrangement of views on a canvas.
#[derive(Clone, Debug, PartialEq)]
pub struct Layout {
    pub name: String,
    pub needs_delete: bool,
    pub(crate) views: Vec<ViewId>,
}

impl Layout {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            needs_delete: false,
            views: Vec::new(),
        }
    }

    pub fn views(&self) -> &[ViewId] {
        &self.views
    }
}

/// Area of a layout showing one observer's scene.
#[derive(Clone, Debug, PartialEq)]
pub struct View {
    pub name: String,
    pub layout: LayoutId,
    pub viewport: Viewport,
    pub observer: Option<ObserverId>,
}

/// Part of a canvas driven by one display channel.
#[derive(Clone, Debug, PartialEq)]
pub struct Segment {
    pub name: String,
    pub canvas: CanvasId,
    /// Display channel filling this segment.
    pub channel: Option<ChannelId>,
    pub viewport: Viewport,
    pub eyes: Eyes,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CanvasState {
    Stopped,
    Running,
}

/// Projection surface made of segments, showing one of its layouts at a time.
#[derive(Clone, Debug, PartialEq)]
pub struct Canvas {
    pub name: String,
    pub active_layout: usize,
    pub swap_barrier: Option<SwapBarrier>,
    pub needs_delete: bool,
    pub(crate) segments: Vec<SegmentId>,
    pub(crate) layouts: Vec<LayoutId>,
    pub(crate) state: CanvasState,
    /// Destination channels activated by init, released by exit.
    pub(crate) activated: Vec<ChannelId>,
}

impl Canvas {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            active_layout: 0,
            swap_barrier: None,
            needs_delete: false,
            segments: Vec::new(),
            layouts: Vec::new(),
            state: CanvasState::Stopped,
            activated: Vec::new(),
        }
    }

    pub fn segments(&self) -> &[SegmentId] {
        &self.segments
    }

    pub fn layouts(&self) -> &[LayoutId] {
        &self.layouts
    }

    pub fn state(&self) -> CanvasState {
        self.state
    }
}

#[derive(Clone, Debug, Default)]
pub struct Display {
    pub observers: Arena<ObserverId, Observer>,
    pub layouts: Arena<LayoutId, Layout>,
    pub views: Arena<ViewId, View>,
    pub canvases: Arena<CanvasId, Canvas>,
    pub segments: Arena<SegmentId, Segment>,
}

impl Display {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_observer(&mut self, observer: Observer) -> ObserverId {
        self.observers.insert(observer)
    }

    pub fn add_layout(&mut self, layout: Layout) -> LayoutId {
        self.layouts.insert(layout)
    }

    pub fn add_view(
        &mut self,
        layout: LayoutId,
        name: impl Into<String>,
        viewport: Viewport,
        observer: Option<ObserverId>,
    ) -> ViewId {
        let id = self.views.insert(View {
            name: name.into(),
            layout,
            viewport,
            observer,
        });
        self.layouts[layout].views.push(id);
        id
    }

    pub fn add_canvas(&mut self, canvas: Canvas) -> CanvasId {
        self.canvases.insert(canvas)
    }

    pub fn add_segment(
        &mut self,
        canvas: CanvasId,
        name: impl Into<String>,
        viewport: Viewport,
        channel: Option<ChannelId>,
    ) -> SegmentId {
        let id = self.segments.insert(Segment {
            name: name.into(),
            canvas,
            channel,
            viewport,
            eyes: Eyes::ALL,
        });
        self.canvases[canvas].segments.push(id);
        id
    }

    pub fn add_canvas_layout(&mut self, canvas: CanvasId, layout: LayoutId) {
        self.canvases[canvas].layouts.push(layout);
    }

    pub fn layout_of_view(&self, view: ViewId) -> Option<&Layout> {
        self.layouts.get(self.views.get(view)?.layout)
    }

    pub fn init_observers(&mut self) {
        for (_, o) in self.observers.iter_mut() {
            o.active = true;
        }
    }

    pub fn exit_observers(&mut self) {
        for (_, o) in self.observers.iter_mut() {
            o.active = false;
        }
    }

    /// Drop observers and layouts marked for deletion that no longer have users.
    pub fn purge(&mut self) -> usize {
        let mut purged = 0;
        for id in self.layouts.ids() {
            let in_use = self
                .canvases
                .iter()
                .any(|(_, c)| c.state == CanvasState::Running && c.layouts.contains(&id));
            if self.layouts[id].needs_delete && !in_use {
                let layout = self.layouts.remove(id);
                for view in layout.map(|l| l.views).unwrap_or_default() {
                    self.views.remove(view);
                }
                for (_, c) in self.canvases.iter_mut() {
                    c.layouts.retain(|l| *l != id);
                }
                purged += 1;
            }
        }
        for id in self.observers.ids() {
            let in_use = self.views.iter().any(|(_, v)| v.observer == Some(id));
            if self.observers[id].needs_delete && !in_use {
                self.observers.remove(id);
                purged += 1;
            }
        }
        purged
    }
}

#[cfg(test)]
#[path = "../../tests/unit/display/entities.rs"]
mod tests;
