//! Display cutout geometry: notch bounding rectangles and waterfall edges.
//!
//! Cutouts are described in the panel's natural frame, i.e. the unrotated
//! active mode of the screen behind the display.  Clients want them in the
//! display's current frame, so every rectangle is turned with the display.
//!
//! # Waterfall displays (for beginners)
//!
//! A waterfall panel curves over its edges.  The curved strip on each side
//! is unusable for touch targets, so the service reports one rectangle per
//! side.  After a quarter turn the strip that was on the left of the panel
//! is at the top of the picture:
//!
//! ```text
//!    natural (0°)             rotated 90°
//!   ┌─┬────────┬─┐         ┌────────────────┐
//!   │L│        │R│         │       L        │
//!   │ │        │ │   ──►   ├────────────────┤
//!   │ │        │ │         │                │
//!   └─┴────────┴─┘         ├────────────────┤
//!                          │       R        │
//!                          └────────────────┘
//! ```

use serde::{Deserialize, Serialize};

use super::orientation::Rotation;

/// Axis-aligned rectangle in display pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// `true` when the rectangle is non-empty and lies inside a
    /// `width` x `height` frame anchored at the origin.
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        !self.is_empty()
            && self.x >= 0
            && self.y >= 0
            && i64::from(self.x) + i64::from(self.width) <= i64::from(width)
            && i64::from(self.y) + i64::from(self.height) <= i64::from(height)
    }

    /// Turns a rectangle from the natural `width` x `height` frame into the
    /// frame of a display rotated clockwise by `rotation`.
    ///
    /// The rectangle must fit the natural frame (see [`Self::fits_within`]).
    pub fn rotated(&self, rotation: Rotation, width: u32, height: u32) -> Rect {
        let (w, h) = (i64::from(width), i64::from(height));
        let (x, y) = (i64::from(self.x), i64::from(self.y));
        let (rw, rh) = (i64::from(self.width), i64::from(self.height));
        match rotation {
            Rotation::Rotation0 => *self,
            Rotation::Rotation90 => Rect::new(clamp_i32(h - y - rh), self.x, self.height, self.width),
            Rotation::Rotation180 => Rect::new(
                clamp_i32(w - x - rw),
                clamp_i32(h - y - rh),
                self.width,
                self.height,
            ),
            Rotation::Rotation270 => Rect::new(self.y, clamp_i32(w - x - rw), self.height, self.width),
        }
    }
}

fn clamp_i32(value: i64) -> i32 {
    i32::try_from(value).unwrap_or(if value < 0 { i32::MIN } else { i32::MAX })
}

/// Zero-size sides collapse to the empty rectangle.
fn edge(x: u32, y: u32, width: u32, height: u32) -> Rect {
    if width == 0 || height == 0 {
        return Rect::default();
    }
    Rect::new(clamp_i32(i64::from(x)), clamp_i32(i64::from(y)), width, height)
}

/// Width of the curved strip on each side of a waterfall panel, in the
/// natural frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CurvedBoundary {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl CurvedBoundary {
    /// Reads `[left, top, right, bottom]`; missing sides are zero and extra
    /// values are ignored.
    pub fn from_sides(sides: &[u32]) -> Self {
        let side = |i: usize| sides.get(i).copied().unwrap_or(0);
        Self {
            left: side(0),
            top: side(1),
            right: side(2),
            bottom: side(3),
        }
    }

    pub fn is_zero(&self) -> bool {
        self.left == 0 && self.top == 0 && self.right == 0 && self.bottom == 0
    }

    /// A side may cover at most half of the panel.
    pub fn fits(&self, width: u32, height: u32) -> bool {
        self.left <= width / 2
            && self.right <= width / 2
            && self.top <= height / 2
            && self.bottom <= height / 2
    }

    /// Edge rectangles as seen on a display rotated by `rotation`.
    ///
    /// `width` and `height` are the natural panel dimensions.  A boundary that
    /// is all zero or does not [`fit`](Self::fits) yields no areas.
    pub fn areas(&self, rotation: Rotation, width: u32, height: u32) -> WaterfallAreas {
        if self.is_zero() || !self.fits(width, height) {
            return WaterfallAreas::default();
        }
        let (w, h) = (width, height);
        let CurvedBoundary { left: l, top: t, right: r, bottom: b } = *self;
        match rotation {
            Rotation::Rotation0 => WaterfallAreas {
                left: edge(0, 0, l, h),
                top: edge(0, 0, w, t),
                right: edge(w - r, 0, r, h),
                bottom: edge(0, h - b, w, b),
            },
            Rotation::Rotation90 => WaterfallAreas {
                left: edge(0, 0, b, w),
                top: edge(0, 0, h, l),
                right: edge(h - t, 0, t, w),
                bottom: edge(0, w - r, h, r),
            },
            Rotation::Rotation180 => WaterfallAreas {
                left: edge(0, 0, r, h),
                top: edge(0, 0, w, b),
                right: edge(w - l, 0, l, h),
                bottom: edge(0, h - t, w, t),
            },
            Rotation::Rotation270 => WaterfallAreas {
                left: edge(0, 0, t, w),
                top: edge(0, 0, h, r),
                right: edge(h - b, 0, b, w),
                bottom: edge(0, w - l, h, l),
            },
        }
    }
}

/// Curved edge strips of a waterfall display, in display coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WaterfallAreas {
    pub left: Rect,
    pub top: Rect,
    pub right: Rect,
    pub bottom: Rect,
}

impl WaterfallAreas {
    pub fn is_empty(&self) -> bool {
        self.left.is_empty() && self.top.is_empty() && self.right.is_empty() && self.bottom.is_empty()
    }
}

/// Everything a client needs to lay out around the cutout of one display.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CutoutInfo {
    pub bounding_rects: Vec<Rect>,
    pub waterfall: WaterfallAreas,
}

// ── Tests ─────────────────────────────────────────────────────────────────────
