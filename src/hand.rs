//! Hand detection and landmark estimation.

pub mod detector;
pub mod landmark;
pub mod palm;

use crate::{image::Image, timer::Timer};

pub use landmark::{HandLandmarks, LandmarkIdx};

/// Locates at most one hand in a camera frame.
///
/// Implementations may keep state between frames (eg. to track a hand once it has been found), so
/// they should be fed consecutive frames of the same camera.
pub trait LandmarkDetector {
    /// Estimates the hand landmarks in `image`.
    ///
    /// Returns `Ok(None)` if no hand is visible with sufficient confidence.
    fn detect(&mut self, image: &Image) -> anyhow::Result<Option<HandLandmarks>>;

    /// Returns profiling timers for landmark estimation.
    fn timers(&self) -> Vec<&Timer> {
        Vec::new()
    }
}

impl<D: LandmarkDetector + ?Sized> LandmarkDetector for Box<D> {
    fn detect(&mut self, image: &Image) -> anyhow::Result<Option<HandLandmarks>> {
        (**self).detect(image)
    }

    fn timers(&self) -> Vec<&Timer> {
        (**self).timers()
    }
}
