//! Two-stage hand detection with the MediaPipe palm detection and hand landmark networks.
//!
//! The landmark network expects a roughly centered hand filling a square input image. While no
//! hand is being tracked, the palm detector searches the whole frame and the square enclosing the
//! most confident palm's hand is passed to the landmark network. Once landmarks were found, the
//! square around them (plus padding) is used for the next frame instead, and palm detection is
//! skipped until the landmark network loses the hand.

use std::path::Path;

use anyhow::bail;

use crate::{
    config::Settings,
    detection::Detection,
    image::{Image, Rect},
    nn::{Cnn, CnnInputShape, ColorMapper, Outputs},
    resolution::Resolution,
    timer::Timer,
};

use super::{
    landmark::{HandLandmarks, NUM_LANDMARKS},
    palm::{self, PalmDetector},
    LandmarkDetector,
};

/// Relative padding added to each side of the landmarks' bounding box to get the next frame's
/// search area.
pub const ROI_PADDING: f32 = 0.3;

/// The palm detection stage of a [`HandDetector`].
pub trait PalmStage {
    /// Returns all palms in `image` with a confidence of at least `min_confidence`.
    fn detect_palms(&mut self, image: &Image, min_confidence: f32)
        -> anyhow::Result<Vec<Detection>>;

    fn timers(&self) -> Vec<&Timer> {
        Vec::new()
    }
}

impl PalmStage for PalmDetector {
    fn detect_palms(
        &mut self,
        image: &Image,
        min_confidence: f32,
    ) -> anyhow::Result<Vec<Detection>> {
        self.detect(image, min_confidence)
    }

    fn timers(&self) -> Vec<&Timer> {
        PalmDetector::timers(self)
    }
}

/// The landmark stage of a [`HandDetector`].
pub trait LandmarkStage {
    /// Returns the size of the network input that `rect` is scaled to.
    fn input_resolution(&self) -> Resolution;

    /// Runs the landmark network on the area of `image` covered by `rect`.
    fn estimate(&mut self, image: &Image, rect: Rect) -> anyhow::Result<Outputs>;

    fn timers(&self) -> Vec<&Timer> {
        Vec::new()
    }
}

/// The MediaPipe hand landmark network.
pub struct LandmarkNetwork {
    cnn: Cnn,
    t_infer: Timer,
}

impl LandmarkNetwork {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let cnn = Cnn::load(path, CnnInputShape::NCHW, ColorMapper::linear(0.0..=1.0))?;
        Ok(Self {
            cnn,
            t_infer: Timer::new("landmark infer"),
        })
    }
}

impl LandmarkStage for LandmarkNetwork {
    fn input_resolution(&self) -> Resolution {
        self.cnn.input_resolution()
    }

    fn estimate(&mut self, image: &Image, rect: Rect) -> anyhow::Result<Outputs> {
        self.t_infer.time(|| self.cnn.estimate(image, rect))
    }

    fn timers(&self) -> Vec<&Timer> {
        vec![&self.t_infer]
    }
}

/// Raw landmark network result, with landmark positions in network input pixels.
#[derive(Debug, Clone, PartialEq)]
struct RawEstimate {
    positions: [[f32; 3]; NUM_LANDMARKS],
    presence: f32,
}

fn extract(outputs: &Outputs) -> anyhow::Result<RawEstimate> {
    let screen_landmarks = outputs.get(0)?;
    let presence_flag = outputs.get(1)?;

    if screen_landmarks.shape() != [1, NUM_LANDMARKS * 3] {
        bail!(
            "unexpected landmark output shape {:?}",
            screen_landmarks.shape()
        );
    }
    if presence_flag.shape() != [1, 1] {
        bail!(
            "unexpected presence output shape {:?}",
            presence_flag.shape()
        );
    }

    let mut positions = [[0.0; 3]; NUM_LANDMARKS];
    for (out, chunk) in positions
        .iter_mut()
        .zip(screen_landmarks.as_slice().chunks_exact(3))
    {
        out.copy_from_slice(chunk);
    }

    Ok(RawEstimate {
        positions,
        presence: presence_flag.as_slice()[0],
    })
}

/// Maps landmarks from the network input coordinate system to normalized frame coordinates.
///
/// `rect` is the area of the frame of size `frame` that was fed to a network taking inputs of
/// size `input`.
fn to_frame_coords(
    estimate: &RawEstimate,
    rect: Rect,
    input: Resolution,
    frame: Resolution,
) -> HandLandmarks {
    let sx = rect.width() as f32 / input.width() as f32;
    let sy = rect.height() as f32 / input.height() as f32;
    let positions = estimate.positions.map(|[x, y, z]| {
        [
            (rect.x() as f32 + x * sx) / frame.width() as f32,
            (rect.y() as f32 + y * sy) / frame.height() as f32,
            z * sx / frame.width() as f32,
        ]
    });
    HandLandmarks::new(positions)
}

/// Computes the search area for the frame following the one `hand` was found in.
fn next_search_rect(hand: &HandLandmarks, frame: Resolution) -> Option<Rect> {
    // Landmarks far outside the frame are garbage; keep them from overflowing pixel coordinates.
    let points = hand.positions().iter().map(|&[x, y, _]| {
        (
            (x.clamp(-1.0, 2.0) * frame.width() as f32) as i32,
            (y.clamp(-1.0, 2.0) * frame.height() as f32) as i32,
        )
    });
    Rect::bounding(points).map(|rect| rect.grow_rel(ROI_PADDING).to_square())
}

/// A [`LandmarkDetector`] that finds a hand with a [`PalmStage`] and follows it with a
/// [`LandmarkStage`].
///
/// A new hand is only accepted if its palm is detected with at least the detection confidence.
/// Landmarks are reported as long as the landmark network's presence score reaches the tracking
/// confidence.
pub struct HandDetector<P, L> {
    palms: P,
    landmarks: L,
    min_detection_confidence: f32,
    min_tracking_confidence: f32,
    search_rect: Option<Rect>,
}

/// The [`HandDetector`] running the MediaPipe networks.
pub type OnnxHandDetector = HandDetector<PalmDetector, LandmarkNetwork>;

impl OnnxHandDetector {
    /// Loads the networks configured in `settings`.
    pub fn load(settings: &Settings) -> anyhow::Result<Self> {
        let palms = PalmDetector::load(settings.palm_model())?;
        let landmarks = LandmarkNetwork::load(settings.model())?;
        log::info!(
            "loaded palm detection network '{}' ({} input) and hand landmark network '{}' ({} input)",
            settings.palm_model().display(),
            palms.input_resolution(),
            settings.model().display(),
            landmarks.input_resolution(),
        );
        Ok(Self::new(
            palms,
            landmarks,
            settings.min_detection_confidence(),
            settings.min_tracking_confidence(),
        ))
    }
}

impl<P: PalmStage, L: LandmarkStage> HandDetector<P, L> {
    pub fn new(
        palms: P,
        landmarks: L,
        min_detection_confidence: f32,
        min_tracking_confidence: f32,
    ) -> Self {
        Self {
            palms,
            landmarks,
            min_detection_confidence,
            min_tracking_confidence,
            search_rect: None,
        }
    }

    /// Returns the area to run the landmark network on, or `None` if there is no hand to look at.
    fn search_area(&mut self, image: &Image) -> anyhow::Result<Option<Rect>> {
        if let Some(rect) = self.search_rect {
            return Ok(Some(rect));
        }

        let palms = self
            .palms
            .detect_palms(image, self.min_detection_confidence)?;
        let best = palms
            .iter()
            .max_by(|a, b| a.confidence().total_cmp(&b.confidence()));
        Ok(best.map(|palm| {
            log::trace!("palm found (confidence {})", palm.confidence());
            palm::hand_region(palm)
        }))
    }
}

impl<P: PalmStage, L: LandmarkStage> LandmarkDetector for HandDetector<P, L> {
    fn detect(&mut self, image: &Image) -> anyhow::Result<Option<HandLandmarks>> {
        let res = image.resolution();
        let Some(rect) = self.search_area(image)? else {
            return Ok(None);
        };

        let outputs = self.landmarks.estimate(image, rect)?;
        let estimate = extract(&outputs)?;
        if estimate.presence < self.min_tracking_confidence {
            if self.search_rect.take().is_some() {
                log::trace!(
                    "hand lost (presence {} < {})",
                    estimate.presence,
                    self.min_tracking_confidence
                );
            }
            return Ok(None);
        }

        let hand = to_frame_coords(&estimate, rect, self.landmarks.input_resolution(), res);
        if self.search_rect.is_none() {
            log::trace!("tracking hand (presence {})", estimate.presence);
        }
        self.search_rect = next_search_rect(&hand, res);
        Ok(Some(hand))
    }

    fn timers(&self) -> Vec<&Timer> {
        let mut timers = self.palms.timers();
        timers.extend(self.landmarks.timers());
        timers
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use crate::{
        detection::{BoundingRect, Keypoint},
        hand::LandmarkIdx,
        nn::Tensor,
    };

    use super::*;

    fn outputs(landmarks: Vec<f32>, presence: f32) -> Outputs {
        Outputs::from(vec![
            Tensor::new(vec![1, landmarks.len()], landmarks),
            Tensor::new(vec![1, 1], vec![presence]),
        ])
    }

    #[derive(Default)]
    struct FakePalms {
        palms: Vec<Detection>,
        thresholds: Vec<f32>,
    }

    impl PalmStage for FakePalms {
        fn detect_palms(
            &mut self,
            _: &Image,
            min_confidence: f32,
        ) -> anyhow::Result<Vec<Detection>> {
            self.thresholds.push(min_confidence);
            Ok(self
                .palms
                .iter()
                .filter(|palm| palm.confidence() >= min_confidence)
                .cloned()
                .collect())
        }
    }

    /// Reports a hand spread across the middle of its input with a settable presence score.
    struct FakeLandmarks {
        presence: f32,
        rects: Vec<Rect>,
    }

    impl LandmarkStage for FakeLandmarks {
        fn input_resolution(&self) -> Resolution {
            Resolution::new(224, 224)
        }

        fn estimate(&mut self, _: &Image, rect: Rect) -> anyhow::Result<Outputs> {
            self.rects.push(rect);
            let landmarks = (0..NUM_LANDMARKS)
                .flat_map(|i| [60.0 + i as f32 * 5.0, 60.0 + i as f32 * 4.0, 0.0])
                .collect();
            Ok(outputs(landmarks, self.presence))
        }
    }

    fn palm(confidence: f32, xc: f32, yc: f32) -> Detection {
        let mut keypoints = vec![Keypoint::new(xc, yc); 7];
        keypoints[0] = Keypoint::new(xc, yc + 20.0);
        keypoints[2] = Keypoint::new(xc, yc - 20.0);
        Detection::with_keypoints(
            confidence,
            BoundingRect::from_center(xc, yc, 40.0, 40.0),
            keypoints,
        )
    }

    fn detector(palms: Vec<Detection>) -> HandDetector<FakePalms, FakeLandmarks> {
        HandDetector::new(
            FakePalms {
                palms,
                ..Default::default()
            },
            FakeLandmarks {
                presence: 1.0,
                rects: Vec::new(),
            },
            0.7,
            0.5,
        )
    }

    #[test]
    fn extract_outputs() {
        let landmarks = (0..63).map(|i| i as f32).collect::<Vec<_>>();
        let estimate = extract(&outputs(landmarks, 0.75)).unwrap();
        assert_eq!(estimate.positions[0], [0.0, 1.0, 2.0]);
        assert_eq!(estimate.positions[20], [60.0, 61.0, 62.0]);
        assert_eq!(estimate.presence, 0.75);
    }

    #[test]
    fn extract_rejects_bad_shapes() {
        assert!(extract(&outputs(vec![0.0; 42], 1.0)).is_err());
        assert!(extract(&Outputs::from(vec![Tensor::new(vec![1, 63], vec![0.0; 63])])).is_err());
    }

    #[test]
    fn frame_coords() {
        let mut positions = [[0.0; 3]; NUM_LANDMARKS];
        positions[LandmarkIdx::IndexFingerTip as usize] = [112.0, 56.0, 0.0];
        positions[LandmarkIdx::ThumbTip as usize] = [224.0, 224.0, 0.0];
        let estimate = RawEstimate {
            positions,
            presence: 1.0,
        };

        // A 480x480 square centered in a 640x480 frame.
        let frame = Resolution::new(640, 480);
        let hand = to_frame_coords(
            &estimate,
            frame.center_square(),
            Resolution::new(224, 224),
            frame,
        );

        let [x, y] = hand.get(LandmarkIdx::IndexFingerTip);
        assert_relative_eq!(x, (80.0 + 240.0) / 640.0, epsilon = 1e-5);
        assert_relative_eq!(y, 120.0 / 480.0, epsilon = 1e-5);
        let [x, y] = hand.get(LandmarkIdx::Wrist);
        assert_relative_eq!(x, 80.0 / 640.0, epsilon = 1e-5);
        assert_relative_eq!(y, 0.0, epsilon = 1e-5);
        let [x, y] = hand.get(LandmarkIdx::ThumbTip);
        assert_relative_eq!(x, 560.0 / 640.0, epsilon = 1e-5);
        assert_relative_eq!(y, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn search_rect_follows_hand() {
        let frame = Resolution::new(640, 480);
        let mut xy = [[0.25, 0.5]; NUM_LANDMARKS];
        xy[0] = [0.25 - 40.0 / 640.0, 0.5 - 20.0 / 480.0];
        xy[1] = [0.25 + 40.0 / 640.0, 0.5 + 20.0 / 480.0];
        let hand = HandLandmarks::from_xy(xy);

        let rect = next_search_rect(&hand, frame).unwrap();
        assert_eq!(rect.width(), rect.height());
        assert!(rect.width() > 80);
        let (cx, cy) = rect.center();
        assert!((cx - 160).abs() <= 2, "{cx}");
        assert!((cy - 240).abs() <= 2, "{cy}");
    }

    #[test]
    fn search_rect_of_garbage_landmarks() {
        let frame = Resolution::new(640, 480);
        let mut xy = [[0.5, 0.5]; NUM_LANDMARKS];
        xy[0] = [f32::INFINITY, f32::NEG_INFINITY];
        xy[1] = [f32::NAN, 1e30];
        let rect = next_search_rect(&HandLandmarks::from_xy(xy), frame).unwrap();
        assert!(rect.width() >= 1920);
    }

    #[test]
    fn uses_palm_crop_until_hand_is_tracked() {
        let image = Image::new(640, 480);
        // A small hand off-center, but inside the region mapped to the screen.
        let palm = palm(0.9, 200.0, 150.0);
        let mut detector = detector(vec![palm.clone()]);

        let hand = detector.detect(&image).unwrap().unwrap();
        assert_eq!(detector.palms.thresholds, [0.7]);
        assert_eq!(detector.landmarks.rects, [palm::hand_region(&palm)]);

        // Tracking: the landmark box replaces palm detection.
        assert!(detector.detect(&image).unwrap().is_some());
        assert_eq!(detector.palms.thresholds.len(), 1);
        assert_eq!(
            detector.landmarks.rects[1],
            next_search_rect(&hand, image.resolution()).unwrap()
        );

        // Presence below the tracking confidence drops the hand.
        detector.landmarks.presence = 0.4;
        assert!(detector.detect(&image).unwrap().is_none());
        assert_eq!(detector.search_rect, None);

        // Palm detection resumes.
        detector.landmarks.presence = 0.6;
        assert!(detector.detect(&image).unwrap().is_some());
        assert_eq!(detector.palms.thresholds, [0.7, 0.7]);
        assert_eq!(detector.landmarks.rects[3], palm::hand_region(&palm));
    }

    #[test]
    fn picks_most_confident_palm() {
        let image = Image::new(640, 480);
        let best = palm(0.95, 400.0, 300.0);
        let mut detector = detector(vec![palm(0.8, 200.0, 150.0), best.clone()]);

        assert!(detector.detect(&image).unwrap().is_some());
        assert_eq!(detector.landmarks.rects, [palm::hand_region(&best)]);
    }

    #[test]
    fn no_palm_no_hand() {
        let image = Image::new(640, 480);
        // Below the detection confidence.
        let mut detector = detector(vec![palm(0.6, 200.0, 150.0)]);

        assert!(detector.detect(&image).unwrap().is_none());
        assert!(detector.detect(&image).unwrap().is_none());
        assert_eq!(detector.palms.thresholds.len(), 2);
        assert!(detector.landmarks.rects.is_empty());
    }
}
