use std::{cmp, fmt};

use embedded_graphics::prelude::*;

/// An axis-aligned rectangle.
///
/// This rectangle type uses (signed) integer coordinates and is meant to be used with the
/// [`crate::image`] module.
///
/// Rectangles are allowed to have zero height and/or width.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub(crate) rect: embedded_graphics::primitives::Rectangle,
}

impl Rect {
    /// Creates a rectangle extending outwards from a center point.
    pub fn from_center(x_center: i32, y_center: i32, width: u32, height: u32) -> Self {
        let top_left = Point {
            x: x_center - (width / 2) as i32,
            y: y_center - (height / 2) as i32,
        };

        Self {
            rect: embedded_graphics::primitives::Rectangle {
                top_left,
                size: Size { width, height },
            },
        }
    }

    /// Creates a rectangle extending downwards and right from a point.
    #[inline]
    pub fn from_top_left(top_left_x: i32, top_left_y: i32, width: u32, height: u32) -> Self {
        Self {
            rect: embedded_graphics::primitives::Rectangle {
                top_left: Point {
                    x: top_left_x,
                    y: top_left_y,
                },
                size: Size { width, height },
            },
        }
    }

    /// Computes the (axis-aligned) bounding rectangle that encompasses `points`.
    ///
    /// Returns `None` if `points` is an empty iterator.
    pub fn bounding<I: IntoIterator<Item = (i32, i32)>>(points: I) -> Option<Self> {
        let mut iter = points.into_iter();

        let (x, y) = iter.next()?;
        let (mut x_min, mut x_max, mut y_min, mut y_max) = (x, x, y, y);

        for (x, y) in iter {
            x_min = cmp::min(x_min, x);
            x_max = cmp::max(x_max, x);
            y_min = cmp::min(y_min, y);
            y_max = cmp::max(y_max, y);
        }

        let span = |min: i32, max: i32| {
            (i64::from(max) - i64::from(min) + 1).clamp(0, u32::MAX.into()) as u32
        };
        Some(Self::from_top_left(
            x_min,
            y_min,
            span(x_min, x_max),
            span(y_min, y_max),
        ))
    }

    /// Returns the X coordinate of the left side of the rectangle.
    #[inline]
    pub fn x(&self) -> i32 {
        self.rect.top_left.x
    }

    /// Returns the Y coordinate of the top side of the rectangle.
    #[inline]
    pub fn y(&self) -> i32 {
        self.rect.top_left.y
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.rect.size.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.rect.size.height
    }

    pub fn center(&self) -> (i32, i32) {
        (
            self.x() + (self.width() / 2) as i32,
            self.y() + (self.height() / 2) as i32,
        )
    }

    /// Returns whether the pixel at `(x, y)` lies inside of `self`.
    pub fn contains(&self, x: i32, y: i32) -> bool {
        let (x, y) = (i64::from(x), i64::from(y));
        let (left, top) = (i64::from(self.x()), i64::from(self.y()));
        x >= left
            && y >= top
            && x < left + i64::from(self.width())
            && y < top + i64::from(self.height())
    }

    /// Grows this rectangle by adding a margin relative to width and height.
    ///
    /// `amount` is the relative amount of the rectangles width and height to add to each side.
    #[must_use]
    pub fn grow_rel(&self, amount: f32) -> Self {
        let dx = (self.width() as f32 * amount) as i32;
        let dy = (self.height() as f32 * amount) as i32;
        Self::from_top_left(
            self.x() - dx,
            self.y() - dy,
            (i64::from(self.width()) + 2 * i64::from(dx)).clamp(0, u32::MAX.into()) as u32,
            (i64::from(self.height()) + 2 * i64::from(dy)).clamp(0, u32::MAX.into()) as u32,
        )
    }

    /// Returns the smallest square with the same center as `self` that contains `self`.
    #[must_use]
    pub fn to_square(&self) -> Self {
        let (x, y) = self.center();
        let size = cmp::max(self.width(), self.height());
        Self::from_center(x, y, size, size)
    }
}

impl fmt::Debug for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Rect @ ({},{})/{}x{}",
            self.x(),
            self.y(),
            self.width(),
            self.height()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounding() {
        assert_eq!(Rect::bounding(std::iter::empty()), None);
        assert_eq!(
            Rect::bounding([(1, 1)]),
            Some(Rect::from_top_left(1, 1, 1, 1))
        );
        assert_eq!(
            Rect::bounding([(1, 4), (3, 2)]),
            Some(Rect::from_top_left(1, 2, 3, 3))
        );
    }

    #[test]
    fn bounding_extreme_coordinates() {
        let rect = Rect::bounding([(i32::MIN, 0), (i32::MAX, 0)]).unwrap();
        assert_eq!(rect.x(), i32::MIN);
        assert_eq!(rect.width(), u32::MAX);
        assert_eq!(rect.height(), 1);

        let rect = Rect::bounding([(0, 0), (f32::INFINITY as i32, f32::NAN as i32)]).unwrap();
        assert_eq!(rect.width(), i32::MAX as u32 + 1);
        assert_eq!(rect.height(), 1);
    }

    #[test]
    fn contains() {
        let rect = Rect::from_top_left(10, 10, 5, 5);
        assert!(rect.contains(10, 10));
        assert!(rect.contains(14, 14));
        assert!(!rect.contains(15, 14));
        assert!(!rect.contains(9, 12));
    }

    #[test]
    fn grow_and_square() {
        let rect = Rect::from_top_left(10, 20, 10, 20);
        assert_eq!(rect.grow_rel(0.5), Rect::from_top_left(5, 10, 20, 40));
        assert_eq!(rect.to_square(), Rect::from_center(15, 30, 20, 20));
    }
}
