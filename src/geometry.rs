//! Conversion of normalized landmarks to frame pixels.

use nalgebra::Point2;

/// A position in frame or screen pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PixelPos {
    pub x: i32,
    pub y: i32,
}

impl PixelPos {
    #[inline]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Converts a normalized `(x, y)` landmark to pixel coordinates in a `width x height` frame.
///
/// Fractional pixel positions are truncated towards zero.
#[inline]
pub fn to_pixel(p: [f32; 2], width: u32, height: u32) -> PixelPos {
    PixelPos {
        x: (p[0] * width as f32) as i32,
        y: (p[1] * height as f32) as i32,
    }
}

/// Computes the Euclidean distance in pixels between two normalized landmarks.
///
/// Both landmarks are first converted to (truncated) pixel coordinates of a `width x height`
/// frame, so the result reflects what is visible in the frame rather than the raw network output.
pub fn distance(p1: [f32; 2], p2: [f32; 2], width: u32, height: u32) -> f32 {
    let a = to_pixel(p1, width, height);
    let b = to_pixel(p2, width, height);
    nalgebra::distance(
        &Point2::new(a.x as f32, a.y as f32),
        &Point2::new(b.x as f32, b.y as f32),
    )
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn random_point() -> [f32; 2] {
        [fastrand::f32(), fastrand::f32()]
    }

    #[test]
    fn identical_points() {
        for _ in 0..100 {
            let p = random_point();
            assert_eq!(distance(p, p, 640, 480), 0.0);
        }
        assert_eq!(distance([0.0, 0.0], [0.0, 0.0], 0, 0), 0.0);
    }

    #[test]
    fn symmetric() {
        for _ in 0..100 {
            let (a, b) = (random_point(), random_point());
            let (w, h) = (fastrand::u32(1..4000), fastrand::u32(1..4000));
            assert_eq!(distance(a, b, w, h), distance(b, a, w, h));
        }
    }

    #[test]
    fn pixel_space() {
        // 3-4-5 triangle in an 8x8 frame
        assert_relative_eq!(distance([0.0, 0.0], [0.375, 0.5], 8, 8), 5.0);
        // Normalized coordinates are scaled independently along each axis.
        assert_relative_eq!(distance([0.0, 0.5], [1.0, 0.5], 640, 480), 640.0);
        assert_relative_eq!(distance([0.5, 0.0], [0.5, 1.0], 640, 480), 480.0);
    }

    #[test]
    fn truncation() {
        assert_eq!(to_pixel([0.999, 0.001], 100, 100), PixelPos::new(99, 0));
        // Sub-pixel differences vanish.
        assert_eq!(distance([0.101, 0.5], [0.109, 0.5], 100, 100), 0.0);
    }
}
