//! Screen-space geometry
//!
//! Positions are translations of an item's top-left corner in CSS-style
//! pixels. The header bar sits on top of the viewport, so the usable
//! vertical range is shortened by [`Viewport::header_height`].

use serde::{Deserialize, Serialize};

/// Default tile width in pixels
pub const DEFAULT_ITEM_WIDTH: f64 = 200.0;
/// Default tile height in pixels
pub const DEFAULT_ITEM_HEIGHT: f64 = 300.0;
/// Default header bar height in pixels
pub const DEFAULT_HEADER_HEIGHT: f64 = 30.0;

/// On-screen size of a tile
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Footprint {
    pub width: f64,
    pub height: f64,
}

impl Footprint {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

impl Default for Footprint {
    fn default() -> Self {
        Self::new(DEFAULT_ITEM_WIDTH, DEFAULT_ITEM_HEIGHT)
    }
}

/// Axis-aligned rectangle in screen space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl Rect {
    pub fn new(left: f64, top: f64, right: f64, bottom: f64) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Rectangle covering a tile placed at `(x, y)`
    pub fn from_origin(x: f64, y: f64, footprint: Footprint) -> Self {
        Self::new(x, y, x + footprint.width, y + footprint.height)
    }

    /// Grow the rectangle by `margin` on every side
    pub fn expand(&self, margin: f64) -> Self {
        Self::new(
            self.left - margin,
            self.top - margin,
            self.right + margin,
            self.bottom + margin,
        )
    }

    /// True if the two rectangles share any area or edge
    pub fn intersects(&self, other: &Rect) -> bool {
        self.left <= other.right
            && other.left <= self.right
            && self.top <= other.bottom
            && other.top <= self.bottom
    }

    /// True if no part of `self` lies within `other`
    pub fn is_entirely_outside(&self, other: &Rect) -> bool {
        !self.intersects(other)
    }
}

/// Inclusive clamp range for a tile's translation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl Bounds {
    /// Clamp a position into the bounds
    ///
    /// A degenerate range (max below min, on tiny viewports) pins to the
    /// minimum.
    pub fn clamp(&self, x: f64, y: f64) -> (f64, f64) {
        (
            x.min(self.max_x).max(self.min_x),
            y.min(self.max_y).max(self.min_y),
        )
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }
}

/// The visible window onto the canvas
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
    pub header_height: f64,
    pub scroll_x: f64,
    pub scroll_y: f64,
}

impl Viewport {
    /// Viewport of the given size with the default header and no scroll
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            header_height: DEFAULT_HEADER_HEIGHT,
            scroll_x: 0.0,
            scroll_y: 0.0,
        }
    }

    pub fn with_header_height(mut self, header_height: f64) -> Self {
        self.header_height = header_height;
        self
    }

    pub fn with_scroll(mut self, scroll_x: f64, scroll_y: f64) -> Self {
        self.scroll_x = scroll_x;
        self.scroll_y = scroll_y;
        self
    }

    /// Range a dragged or resized tile may occupy
    ///
    /// Half of the tile may hang off each edge:
    /// `[-w/2, width - w/2] x [-h/2, height - h/2 - header]`.
    pub fn clamp_bounds(&self, footprint: Footprint) -> Bounds {
        let half_w = footprint.width / 2.0;
        let half_h = footprint.height / 2.0;
        Bounds {
            min_x: -half_w,
            max_x: self.width - half_w,
            min_y: -half_h,
            max_y: self.height - half_h - self.header_height,
        }
    }

    /// Range for random initial placement: the tile stays fully on screen
    pub fn placement_bounds(&self, footprint: Footprint) -> Bounds {
        Bounds {
            min_x: 0.0,
            max_x: (self.width - footprint.width).max(0.0),
            min_y: 0.0,
            max_y: (self.height - footprint.height).max(0.0),
        }
    }

    /// Visible area in canvas coordinates
    pub fn rect(&self) -> Rect {
        Rect::new(
            self.scroll_x,
            self.scroll_y,
            self.scroll_x + self.width,
            self.scroll_y + self.height,
        )
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(1280.0, 800.0)
    }
}
