//! Types for representing image and screen resolutions.

use std::fmt;

use crate::image::Rect;

/// Resolution (`width x height`) of an image, camera, or display.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Resolution {
    width: u32,
    height: u32,
}

impl Resolution {
    /// Creates a new [`Resolution`] of `width x height`.
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Returns the width of this [`Resolution`].
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Returns the height of this [`Resolution`].
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn num_pixels(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// Returns the largest square [`Rect`] centered inside of `self`.
    pub fn center_square(&self) -> Rect {
        let size = self.width.min(self.height);
        let x = (self.width - size) / 2;
        let y = (self.height - size) / 2;
        Rect::from_top_left(x as i32, y as i32, size, size)
    }
}

impl fmt::Debug for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn center_square() {
        assert_eq!(
            Resolution::new(640, 480).center_square(),
            Rect::from_top_left(80, 0, 480, 480)
        );
        assert_eq!(
            Resolution::new(480, 640).center_square(),
            Rect::from_top_left(0, 80, 480, 480)
        );
        assert_eq!(
            Resolution::new(10, 10).center_square(),
            Rect::from_top_left(0, 0, 10, 10)
        );
    }
}
