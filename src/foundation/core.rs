use kurbo::Rect;

/// Integer basis used for fixed-point range subdivision.
pub const RANGE_BASIS: u32 = 100_000;

/// Fallback pixel viewport for surfaces that have not been sized yet.
pub const DEFAULT_PIXEL_VIEWPORT: PixelViewport = PixelViewport {
    x: 0,
    y: 0,
    w: 1920,
    h: 1200,
};

/// Pixel-space viewport of a device or window. Negative extents mean "unset".
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct PixelViewport {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl PixelViewport {
    pub const INVALID: Self = Self {
        x: 0,
        y: 0,
        w: -1,
        h: -1,
    };

    pub fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    pub fn is_valid(self) -> bool {
        self.w >= 0 && self.h >= 0
    }

    pub fn has_area(self) -> bool {
        self.w > 0 && self.h > 0
    }

    /// Same extent, moved to the origin.
    pub fn at_origin(self) -> Self {
        Self {
            x: 0,
            y: 0,
            ..self
        }
    }
}

impl Default for PixelViewport {
    fn default() -> Self {
        Self::INVALID
    }
}

/// Fractional viewport relative to a parent surface.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Viewport {
    pub const FULL: Self = Self {
        x: 0.0,
        y: 0.0,
        w: 1.0,
        h: 1.0,
    };

    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    pub fn is_valid(self) -> bool {
        self.w >= 0.0 && self.h >= 0.0
    }

    pub fn has_area(self) -> bool {
        self.w > 0.0 && self.h > 0.0
    }

    fn to_rect(self) -> Rect {
        Rect::new(
            f64::from(self.x),
            f64::from(self.y),
            f64::from(self.x + self.w),
            f64::from(self.y + self.h),
        )
    }

    fn from_rect(r: Rect) -> Self {
        Self {
            x: r.x0 as f32,
            y: r.y0 as f32,
            w: r.width() as f32,
            h: r.height() as f32,
        }
    }

    /// Clip to the overlap with `other`. Disjoint viewports end up without area.
    pub fn intersect(&mut self, other: Viewport) {
        let r = self.to_rect().intersect(other.to_rect());
        *self = Self::from_rect(r);
    }

    /// Express this viewport in the coordinate space of `rhs`.
    pub fn transform(&mut self, rhs: Viewport) {
        if rhs.w <= 0.0 || rhs.h <= 0.0 {
            return;
        }
        self.x = (self.x - rhs.x) / rhs.w;
        self.y = (self.y - rhs.y) / rhs.h;
        self.w /= rhs.w;
        self.h /= rhs.h;
    }

    /// Narrow this viewport to the sub-area `rhs` of itself.
    pub fn apply(&mut self, rhs: Viewport) {
        self.x += rhs.x * self.w;
        self.y += rhs.y * self.h;
        self.w *= rhs.w;
        self.h *= rhs.h;
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::FULL
    }
}

/// Database range of a sort-last task, a sub-interval of `[0, 1]`.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Range {
    pub start: f32,
    pub end: f32,
}

impl Range {
    pub const ALL: Self = Self {
        start: 0.0,
        end: 1.0,
    };

    pub fn new(start: f32, end: f32) -> Self {
        Self { start, end }
    }

    pub fn width(self) -> f32 {
        self.end - self.start
    }

    /// Range covering `[start, end)` of a fixed-point basis of [`RANGE_BASIS`].
    pub fn from_fixed(start: u32, end: u32) -> Self {
        Self {
            start: start as f32 / RANGE_BASIS as f32,
            end: end as f32 / RANGE_BASIS as f32,
        }
    }
}

impl Default for Range {
    fn default() -> Self {
        Self::ALL
    }
}

bitflags::bitflags! {
    /// Eye passes a compound renders.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
    pub struct Eyes: u8 {
        const CYCLOP = 1 << 0;
        const LEFT = 1 << 1;
        const RIGHT = 1 << 2;
        const STEREO = Self::LEFT.bits() | Self::RIGHT.bits();
        const ALL = Self::CYCLOP.bits() | Self::LEFT.bits() | Self::RIGHT.bits();
    }
}

bitflags::bitflags! {
    /// Framebuffer attachments transported by a frame edge.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
    pub struct Buffers: u8 {
        const COLOR = 1 << 0;
        const DEPTH = 1 << 1;
    }
}

impl Default for Eyes {
    fn default() -> Self {
        Self::ALL
    }
}

impl Default for Buffers {
    fn default() -> Self {
        Self::COLOR
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
