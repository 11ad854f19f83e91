//! Object detection primitives shared by single-shot detector networks.

pub mod nms;
pub mod ssd;

/// The logistic function, mapping raw network scores to confidences between 0.0 and 1.0.
#[inline]
pub fn sigmoid(v: f32) -> f32 {
    1.0 / (1.0 + (-v).exp())
}

/// A detected object.
///
/// A [`Detection`] consists of a [`BoundingRect`] enclosing the object, a confidence value, and a
/// possibly empty set of keypoints. Positions are in the coordinate system of the image the
/// detection was performed on.
///
/// Per convention, the confidence value lies between 0.0 and 1.0. It is used as the weight when
/// [`nms::NonMaxSuppression`] averages overlapping detections, so it has to have that range.
#[derive(Debug, Clone)]
pub struct Detection {
    confidence: f32,
    rect: BoundingRect,
    keypoints: Vec<Keypoint>,
}

impl Detection {
    pub fn new(confidence: f32, rect: BoundingRect) -> Self {
        Self::with_keypoints(confidence, rect, Vec::new())
    }

    pub fn with_keypoints(confidence: f32, rect: BoundingRect, keypoints: Vec<Keypoint>) -> Self {
        Self {
            confidence,
            rect,
            keypoints,
        }
    }

    #[inline]
    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    #[inline]
    pub fn bounding_rect(&self) -> BoundingRect {
        self.rect
    }

    #[inline]
    pub fn keypoints(&self) -> &[Keypoint] {
        &self.keypoints
    }

    /// Scales all positions by `(sx, sy)`, then offsets them by `(dx, dy)`.
    ///
    /// This maps a detection from a network's input coordinates to the area of the image that was
    /// fed to the network.
    #[must_use]
    pub fn transform(&self, sx: f32, sy: f32, dx: f32, dy: f32) -> Self {
        let r = self.rect;
        Self {
            confidence: self.confidence,
            rect: BoundingRect::from_center(r.xc * sx + dx, r.yc * sy + dy, r.w * sx, r.h * sy),
            keypoints: self
                .keypoints
                .iter()
                .map(|kp| Keypoint::new(kp.x * sx + dx, kp.y * sy + dy))
                .collect(),
        }
    }
}

/// A 2D keypoint produced as part of a [`Detection`].
///
/// The meaning of a keypoint depends on the detector and on its index in the keypoint list.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keypoint {
    x: f32,
    y: f32,
}

impl Keypoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    #[inline]
    pub fn x(&self) -> f32 {
        self.x
    }

    #[inline]
    pub fn y(&self) -> f32 {
        self.y
    }
}

/// Axis-aligned bounding rectangle of a detected object.
///
/// Unlike [`crate::image::Rect`], this uses float coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingRect {
    xc: f32,
    yc: f32,
    w: f32,
    h: f32,
}

impl BoundingRect {
    /// Creates a bounding rectangle centered at `(xc, yc)`.
    pub fn from_center(xc: f32, yc: f32, w: f32, h: f32) -> Self {
        Self { xc, yc, w, h }
    }

    #[inline]
    pub fn x_center(&self) -> f32 {
        self.xc
    }

    #[inline]
    pub fn y_center(&self) -> f32 {
        self.yc
    }

    #[inline]
    pub fn width(&self) -> f32 {
        self.w
    }

    #[inline]
    pub fn height(&self) -> f32 {
        self.h
    }

    /// Returns the amount of area covered by `self`.
    pub fn area(&self) -> f32 {
        self.w * self.h
    }

    fn top_left(&self) -> (f32, f32) {
        (self.xc - self.w / 2.0, self.yc - self.h / 2.0)
    }

    fn bottom_right(&self) -> (f32, f32) {
        (self.xc + self.w / 2.0, self.yc + self.h / 2.0)
    }

    fn intersection_area(&self, other: &Self) -> f32 {
        let (l1, t1) = self.top_left();
        let (l2, t2) = other.top_left();
        let (r1, b1) = self.bottom_right();
        let (r2, b2) = other.bottom_right();

        let w = r1.min(r2) - l1.max(l2);
        let h = b1.min(b2) - t1.max(t2);
        if w <= 0.0 || h <= 0.0 {
            0.0
        } else {
            w * h
        }
    }

    /// Computes the Intersection over Union (IOU) of `self` and `other`.
    ///
    /// Returns 0.0 if both rectangles are empty.
    pub fn iou(&self, other: &Self) -> f32 {
        let intersection = self.intersection_area(other);
        let union = self.area() + other.area() - intersection;
        if union <= 0.0 {
            0.0
        } else {
            intersection / union
        }
    }
}
