//! Hand landmark definitions.

use crate::{
    geometry::{self, PixelPos},
    image::{draw, Color, Image},
    resolution::Resolution,
};

/// Number of landmarks estimated per hand.
pub const NUM_LANDMARKS: usize = 21;

/// The landmarks of a single detected hand.
///
/// X and Y coordinates are normalized to the range 0.0 to 1.0 relative to the frame's width and
/// height. Z is a relative depth value (smaller values are closer to the camera) and is not used
/// by the control logic.
#[derive(Debug, Clone, PartialEq)]
pub struct HandLandmarks {
    positions: [[f32; 3]; NUM_LANDMARKS],
}

impl HandLandmarks {
    /// Creates a landmark set from normalized positions.
    pub fn new(positions: [[f32; 3]; NUM_LANDMARKS]) -> Self {
        Self { positions }
    }

    /// Creates a landmark set from normalized `(x, y)` positions at depth 0.
    pub fn from_xy(xy: [[f32; 2]; NUM_LANDMARKS]) -> Self {
        Self::new(xy.map(|[x, y]| [x, y, 0.0]))
    }

    /// Returns the normalized `(x, y)` position of a landmark.
    #[inline]
    pub fn get(&self, idx: LandmarkIdx) -> [f32; 2] {
        let [x, y, _] = self.positions[idx as usize];
        [x, y]
    }

    /// Returns the normalized positions of all landmarks.
    #[inline]
    pub fn positions(&self) -> &[[f32; 3]; NUM_LANDMARKS] {
        &self.positions
    }

    /// Returns the position of a landmark in pixels of a frame of size `res`.
    pub fn pixel_position(&self, idx: LandmarkIdx, res: Resolution) -> PixelPos {
        geometry::to_pixel(self.get(idx), res.width(), res.height())
    }

    /// Draws the hand skeleton onto `target`, which must be the frame the landmarks refer to.
    pub fn draw(&self, target: &mut Image) {
        let res = target.resolution();
        let px = |idx: LandmarkIdx| {
            let p = self.pixel_position(idx, res);
            (p.x, p.y)
        };

        for &(a, b) in CONNECTIVITY {
            draw::line(target, px(a), px(b))
                .color(Color::WHITE)
                .stroke_width(2);
        }
        for &idx in LandmarkIdx::ALL {
            let (x, y) = px(idx);
            draw::marker(target, x, y).color(Color::RED);
        }
    }
}

/// Names for the hand pose landmarks.
///
/// # Terminology
///
/// - **CMC**: [Carpometacarpal joint], the lowest joint of the thumb, located near the wrist.
/// - **MCP**: [Metacarpophalangeal joint], the lower joint forming the knuckles near the palm of
///   the hand.
/// - **PIP**: Proximal Interphalangeal joint, the joint between the MCP and DIP.
/// - **DIP**: Distal Interphalangeal joint, the highest joint of a finger.
/// - **Tip**: This landmark is just placed on the tip of the finger, above the DIP.
///
/// [Carpometacarpal joint]: https://en.wikipedia.org/wiki/Carpometacarpal_joint
/// [Metacarpophalangeal joint]: https://en.wikipedia.org/wiki/Metacarpophalangeal_joint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LandmarkIdx {
    Wrist,
    ThumbCmc,
    ThumbMcp,
    ThumbIp,
    ThumbTip,
    IndexFingerMcp,
    IndexFingerPip,
    IndexFingerDip,
    IndexFingerTip,
    MiddleFingerMcp,
    MiddleFingerPip,
    MiddleFingerDip,
    MiddleFingerTip,
    RingFingerMcp,
    RingFingerPip,
    RingFingerDip,
    RingFingerTip,
    PinkyMcp,
    PinkyPip,
    PinkyDip,
    PinkyTip,
}

impl LandmarkIdx {
    /// All landmarks, in network output order.
    pub const ALL: &'static [LandmarkIdx; NUM_LANDMARKS] = {
        use LandmarkIdx::*;
        &[
            Wrist,
            ThumbCmc,
            ThumbMcp,
            ThumbIp,
            ThumbTip,
            IndexFingerMcp,
            IndexFingerPip,
            IndexFingerDip,
            IndexFingerTip,
            MiddleFingerMcp,
            MiddleFingerPip,
            MiddleFingerDip,
            MiddleFingerTip,
            RingFingerMcp,
            RingFingerPip,
            RingFingerDip,
            RingFingerTip,
            PinkyMcp,
            PinkyPip,
            PinkyDip,
            PinkyTip,
        ]
    };
}

const CONNECTIVITY: &[(LandmarkIdx, LandmarkIdx)] = {
    use LandmarkIdx::*;
    &[
        // Surround the palm:
        (Wrist, ThumbCmc),
        (ThumbCmc, IndexFingerMcp),
        (IndexFingerMcp, MiddleFingerMcp),
        (MiddleFingerMcp, RingFingerMcp),
        (RingFingerMcp, PinkyMcp),
        (PinkyMcp, Wrist),
        // Thumb:
        (ThumbCmc, ThumbMcp),
        (ThumbMcp, ThumbIp),
        (ThumbIp, ThumbTip),
        // Index:
        (IndexFingerMcp, IndexFingerPip),
        (IndexFingerPip, IndexFingerDip),
        (IndexFingerDip, IndexFingerTip),
        // Middle:
        (MiddleFingerMcp, MiddleFingerPip),
        (MiddleFingerPip, MiddleFingerDip),
        (MiddleFingerDip, MiddleFingerTip),
        // Ring:
        (RingFingerMcp, RingFingerPip),
        (RingFingerPip, RingFingerDip),
        (RingFingerDip, RingFingerTip),
        // Pinky:
        (PinkyMcp, PinkyPip),
        (PinkyPip, PinkyDip),
        (PinkyDip, PinkyTip),
    ]
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn landmark_order() {
        for (i, idx) in LandmarkIdx::ALL.iter().enumerate() {
            assert_eq!(*idx as usize, i);
        }
    }

    #[test]
    fn pixel_position_truncates() {
        let mut xy = [[0.0; 2]; NUM_LANDMARKS];
        xy[LandmarkIdx::IndexFingerTip as usize] = [0.5, 0.999];
        let hand = HandLandmarks::from_xy(xy);
        let pos = hand.pixel_position(LandmarkIdx::IndexFingerTip, Resolution::new(641, 480));
        assert_eq!(pos, PixelPos { x: 320, y: 479 });
    }

    #[test]
    fn draw_stays_in_bounds() {
        let mut xy = [[0.5; 2]; NUM_LANDMARKS];
        xy[0] = [-0.5, 1.5];
        let hand = HandLandmarks::from_xy(xy);
        let mut image = Image::new(32, 32);
        hand.draw(&mut image);
        assert_ne!(image.get(16, 16), Color::NULL);
    }
}
