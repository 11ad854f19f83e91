//! Mapping of the hand position in the frame to screen coordinates.

use std::fmt;

use crate::{geometry::PixelPos, image::Rect, resolution::Resolution};

/// The fixed area of the camera frame that is mapped onto the whole screen.
///
/// Bounds are inclusive on all sides.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct RegionOfInterest {
    left: i32,
    top: i32,
    right: i32,
    bottom: i32,
}

impl RegionOfInterest {
    /// Creates a region from its inclusive pixel bounds.
    ///
    /// # Panics
    ///
    /// Panics if the region would be empty or degenerate.
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        assert!(
            left < right && top < bottom,
            "invalid region of interest ({}, {})-({}, {})",
            left,
            top,
            right,
            bottom
        );
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Computes the region of a frame of size `res`, leaving a border of `margin` (a fraction of
    /// each dimension) on every side.
    ///
    /// Bounds are truncated to whole pixels, so a 640x480 frame with a margin of 0.2 yields the
    /// region `(128, 96)-(512, 384)`.
    pub fn from_frame(res: Resolution, margin: f32) -> Self {
        assert!(
            (0.0..0.5).contains(&margin),
            "region margin must be in range 0.0..0.5, got {}",
            margin
        );
        let (w, h) = (res.width() as f32, res.height() as f32);
        Self::new(
            (w * margin) as i32,
            (h * margin) as i32,
            (w * (1.0 - margin)) as i32,
            (h * (1.0 - margin)) as i32,
        )
    }

    #[inline]
    pub fn left(&self) -> i32 {
        self.left
    }

    #[inline]
    pub fn top(&self) -> i32 {
        self.top
    }

    #[inline]
    pub fn right(&self) -> i32 {
        self.right
    }

    #[inline]
    pub fn bottom(&self) -> i32 {
        self.bottom
    }

    #[inline]
    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    #[inline]
    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    /// Returns whether `pos` lies within the region, borders included.
    pub fn contains(&self, pos: PixelPos) -> bool {
        (self.left..=self.right).contains(&pos.x) && (self.top..=self.bottom).contains(&pos.y)
    }

    /// Returns the rectangle to outline when drawing the region.
    pub fn to_rect(&self) -> Rect {
        Rect::from_top_left(
            self.left,
            self.top,
            self.width() as u32 + 1,
            self.height() as u32 + 1,
        )
    }
}

impl fmt::Debug for RegionOfInterest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {})-({}, {})",
            self.left, self.top, self.right, self.bottom
        )
    }
}

/// Maps frame positions inside a [`RegionOfInterest`] linearly onto the screen.
#[derive(Debug, Clone, Copy)]
pub struct CursorMapper {
    roi: RegionOfInterest,
    screen: Resolution,
}

impl CursorMapper {
    pub fn new(roi: RegionOfInterest, screen: Resolution) -> Self {
        Self { roi, screen }
    }

    #[inline]
    pub fn roi(&self) -> &RegionOfInterest {
        &self.roi
    }

    #[inline]
    pub fn screen(&self) -> Resolution {
        self.screen
    }

    /// Maps a frame position to a screen position.
    ///
    /// Returns `None` if `pos` is outside of the region of interest, in which case the cursor
    /// should stay where it is. The result is truncated to whole pixels, and the region's
    /// bottom-right corner maps to the screen's size (one past the last pixel).
    pub fn map(&self, pos: PixelPos) -> Option<PixelPos> {
        if !self.roi.contains(pos) {
            return None;
        }

        let scale = |v: i32, min: i32, extent: i32, target: u32| -> i32 {
            ((v - min) as f64 / extent as f64 * target as f64) as i32
        };
        Some(PixelPos::new(
            scale(pos.x, self.roi.left, self.roi.width(), self.screen.width()),
            scale(pos.y, self.roi.top, self.roi.height(), self.screen.height()),
        ))
    }
}
