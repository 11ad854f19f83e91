//! Pinch gesture classification.
//!
//! Gestures are recognized by measuring the pixel distance between pairs of fingertips. The pairs
//! are checked in the order given by [`PINCH_RULES`], and the first pair that is closer than the
//! pinch threshold determines the gesture, so a thumb/index pinch masks all other pinches.
//!
//! A [`GestureClassifier`] only evaluates every Nth frame containing a hand, and remembers the
//! last gesture it fired: holding a pinch fires its gesture once, and it can only fire again after
//! all fingertips have been released.

use crate::{
    geometry,
    hand::{HandLandmarks, LandmarkIdx},
    resolution::Resolution,
};

/// A recognized pinch gesture and the click it triggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Gesture {
    /// Thumb and index finger: left click.
    LeftClick,
    /// Thumb and middle finger: right click.
    RightClick,
    /// Index and middle finger: double click.
    DoubleClick,
}

impl Gesture {
    /// Returns the label shown in the overlay when the gesture fires.
    pub fn label(&self) -> &'static str {
        match self {
            Gesture::LeftClick => "Left Click!",
            Gesture::RightClick => "Right Click!",
            Gesture::DoubleClick => "Double Click!",
        }
    }
}

/// Debounced gesture state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GestureState {
    /// No pinch is held.
    #[default]
    Idle,
    /// The contained gesture has fired and its pinch has not been released yet.
    Active(Gesture),
}

/// A pair of fingertips that triggers a gesture when pinched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinchRule {
    pub first: LandmarkIdx,
    pub second: LandmarkIdx,
    pub gesture: Gesture,
}

impl PinchRule {
    /// Computes the pixel distance between the rule's fingertips.
    pub fn distance(&self, hand: &HandLandmarks, res: Resolution) -> f32 {
        geometry::distance(
            hand.get(self.first),
            hand.get(self.second),
            res.width(),
            res.height(),
        )
    }
}

/// Pinch rules in priority order.
pub const PINCH_RULES: &[PinchRule] = &[
    PinchRule {
        first: LandmarkIdx::ThumbTip,
        second: LandmarkIdx::IndexFingerTip,
        gesture: Gesture::LeftClick,
    },
    PinchRule {
        first: LandmarkIdx::ThumbTip,
        second: LandmarkIdx::MiddleFingerTip,
        gesture: Gesture::RightClick,
    },
    PinchRule {
        first: LandmarkIdx::IndexFingerTip,
        second: LandmarkIdx::MiddleFingerTip,
        gesture: Gesture::DoubleClick,
    },
];

/// Returns the gesture of the first rule in `rules` whose fingertips are closer than `threshold`
/// pixels, or `None` if no fingertips are pinched.
pub fn select(
    rules: &[PinchRule],
    hand: &HandLandmarks,
    res: Resolution,
    threshold: f32,
) -> Option<Gesture> {
    rules
        .iter()
        .find(|rule| rule.distance(hand, res) < threshold)
        .map(|rule| rule.gesture)
}

/// Frame-sampled, debounced pinch classifier.
#[derive(Debug, Clone)]
pub struct GestureClassifier {
    rules: &'static [PinchRule],
    threshold: f32,
    check_every: u32,
    counter: u32,
    state: GestureState,
}

impl GestureClassifier {
    /// Creates a classifier that evaluates [`PINCH_RULES`] on every `check_every`th hand frame.
    ///
    /// # Panics
    ///
    /// Panics if `check_every` is zero.
    pub fn new(threshold: f32, check_every: u32) -> Self {
        assert!(check_every != 0, "gesture cadence must be at least one frame");
        Self {
            rules: PINCH_RULES,
            threshold,
            check_every,
            counter: 0,
            state: GestureState::Idle,
        }
    }

    /// Returns the current debounced state.
    #[inline]
    pub fn state(&self) -> GestureState {
        self.state
    }

    /// Returns the number of hand frames seen since the last evaluation.
    #[inline]
    pub fn counter(&self) -> u32 {
        self.counter
    }

    /// Feeds the landmarks of a hand visible in a frame of size `res`.
    ///
    /// Returns the gesture whose click should be injected now, if any.
    pub fn update(&mut self, hand: &HandLandmarks, res: Resolution) -> Option<Gesture> {
        self.counter += 1;
        if self.counter < self.check_every {
            return None;
        }
        self.counter = 0;

        let selected = select(self.rules, hand, res, self.threshold);
        self.transition(selected)
    }

    fn transition(&mut self, selected: Option<Gesture>) -> Option<Gesture> {
        match selected {
            None => {
                if self.state != GestureState::Idle {
                    log::trace!("pinch released");
                }
                self.state = GestureState::Idle;
                None
            }
            Some(gesture) if self.state == GestureState::Active(gesture) => None,
            Some(gesture) => {
                log::debug!("gesture {:?} (was {:?})", gesture, self.state);
                self.state = GestureState::Active(gesture);
                Some(gesture)
            }
        }
    }
}
