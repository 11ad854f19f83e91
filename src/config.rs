//! Tuning constants and runtime settings.
//!
//! All thresholds are fixed at compile time. [`Settings`] bundles them so that they can be passed
//! through the control loop (and adjusted by tests), and resolves the few environment variable
//! overrides that select *resources* rather than behavior.

use std::{
    env::{self, VarError},
    path::PathBuf,
    time::Duration,
};

use anyhow::bail;

/// Pixel distance below which two fingertips count as pinched.
pub const PINCH_THRESHOLD: f32 = 30.0;

/// Fraction of the frame width/height excluded from the mapped region on each side.
pub const ROI_MARGIN: f32 = 0.2;

/// Gestures are only evaluated on every Nth frame that contains a hand.
pub const CHECK_EVERY: u32 = 10;

/// Minimum palm detection confidence required to start tracking a hand.
pub const MIN_DETECTION_CONFIDENCE: f32 = 0.7;

/// Minimum hand presence score required to report and keep tracking a hand.
pub const MIN_TRACKING_CONFIDENCE: f32 = 0.5;

/// Duration passed to every pointer move.
pub const MOVE_DURATION: Duration = Duration::from_millis(100);

/// Sleep inserted after every injected click.
pub const CLICK_PAUSE: Duration = Duration::from_millis(100);

pub const WINDOW_TITLE: &str = "Hand Gesture Control";

pub const HELP_TEXT: &[&str] = &[
    "Gestures:",
    "- Pinch index & thumb: Left Click",
    "- Pinch middle & thumb: Right Click",
    "- Pinch index & middle: Double Click",
    "Press ESC to exit",
];

const ENV_VAR_MODEL: &str = "HANDMOUSE_MODEL";
const ENV_VAR_PALM_MODEL: &str = "HANDMOUSE_PALM_MODEL";
const DEFAULT_MODEL_PATH: &str = "3rdparty/onnx/hand_landmark_full.onnx";
const DEFAULT_PALM_MODEL_PATH: &str = "3rdparty/onnx/palm_detection_full.onnx";

/// Reads a path override from the environment variable `var`.
fn path_from_env(var: &str) -> anyhow::Result<Option<PathBuf>> {
    match env::var(var) {
        Ok(path) => {
            log::debug!("model override: `{}` is set to '{}'", var, path);
            Ok(Some(path.into()))
        }
        Err(VarError::NotPresent) => Ok(None),
        Err(VarError::NotUnicode(s)) => bail!(
            "invalid value set for `{}` variable: {}",
            var,
            s.to_string_lossy()
        ),
    }
}

/// Settings of the hand tracking control loop.
#[derive(Debug, Clone)]
pub struct Settings {
    pub(crate) pinch_threshold: f32,
    pub(crate) roi_margin: f32,
    pub(crate) check_every: u32,
    pub(crate) min_detection_confidence: f32,
    pub(crate) min_tracking_confidence: f32,
    pub(crate) move_duration: Duration,
    pub(crate) click_pause: Duration,
    pub(crate) model_path: PathBuf,
    pub(crate) palm_model_path: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            pinch_threshold: PINCH_THRESHOLD,
            roi_margin: ROI_MARGIN,
            check_every: CHECK_EVERY,
            min_detection_confidence: MIN_DETECTION_CONFIDENCE,
            min_tracking_confidence: MIN_TRACKING_CONFIDENCE,
            move_duration: MOVE_DURATION,
            click_pause: CLICK_PAUSE,
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            palm_model_path: PathBuf::from(DEFAULT_PALM_MODEL_PATH),
        }
    }
}

impl Settings {
    /// Returns the default settings with environment overrides applied.
    ///
    /// Fails if an override is set to a value that is not valid unicode.
    pub fn from_env() -> anyhow::Result<Self> {
        let mut settings = Self::default();
        if let Some(path) = path_from_env(ENV_VAR_MODEL)? {
            settings.model_path = path;
        }
        if let Some(path) = path_from_env(ENV_VAR_PALM_MODEL)? {
            settings.palm_model_path = path;
        }
        Ok(settings)
    }

    /// Sets the pinch distance threshold, in frame pixels.
    #[inline]
    pub fn pinch_threshold(mut self, pixels: f32) -> Self {
        self.pinch_threshold = pixels;
        self
    }

    /// Sets the gesture evaluation cadence.
    ///
    /// # Panics
    ///
    /// Panics if `frames` is zero.
    #[inline]
    pub fn check_every(mut self, frames: u32) -> Self {
        assert!(frames != 0, "gesture cadence must be at least one frame");
        self.check_every = frames;
        self
    }

    /// Sets the duration of each pointer move.
    #[inline]
    pub fn move_duration(mut self, duration: Duration) -> Self {
        self.move_duration = duration;
        self
    }

    /// Sets the pause that follows every injected click.
    #[inline]
    pub fn click_pause(mut self, pause: Duration) -> Self {
        self.click_pause = pause;
        self
    }

    /// Sets the path of the hand landmark network.
    #[inline]
    pub fn model_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.model_path = path.into();
        self
    }

    /// Sets the path of the palm detection network.
    #[inline]
    pub fn palm_model_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.palm_model_path = path.into();
        self
    }

    pub fn roi_margin(&self) -> f32 {
        self.roi_margin
    }

    pub fn min_detection_confidence(&self) -> f32 {
        self.min_detection_confidence
    }

    pub fn min_tracking_confidence(&self) -> f32 {
        self.min_tracking_confidence
    }

    pub fn click_pause_duration(&self) -> Duration {
        self.click_pause
    }

    pub fn model(&self) -> &std::path::Path {
        &self.model_path
    }

    pub fn palm_model(&self) -> &std::path::Path {
        &self.palm_model_path
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;

    #[test]
    fn defaults() {
        let settings = Settings::default();
        assert_eq!(settings.pinch_threshold, 30.0);
        assert_eq!(settings.check_every, 10);
        assert_eq!(settings.roi_margin(), 0.2);
        assert_eq!(settings.min_detection_confidence(), 0.7);
        assert_eq!(settings.min_tracking_confidence(), 0.5);
        assert_eq!(settings.move_duration, Duration::from_millis(100));
    }

    #[test]
    fn model_paths() {
        let settings = Settings::default()
            .model_path("/models/landmarks.onnx")
            .palm_model_path("/models/palms.onnx");
        assert_eq!(settings.model(), Path::new("/models/landmarks.onnx"));
        assert_eq!(settings.palm_model(), Path::new("/models/palms.onnx"));
        assert_ne!(
            Settings::default().model(),
            Settings::default().palm_model()
        );
    }

    #[test]
    #[should_panic(expected = "at least one frame")]
    fn zero_cadence() {
        let _ = Settings::default().check_every(0);
    }
}
