//! Palm detection.
//!
//! The MediaPipe palm detector is an SSD network that finds palms anywhere in a (letterboxed)
//! frame. Palms are much easier to detect than whole hands with their articulated fingers, and
//! the region enclosing the full hand can be derived from the palm's bounding box and keypoints.

use std::path::Path;

use anyhow::bail;
use nalgebra::Vector2;

use crate::{
    detection::{
        nms::NonMaxSuppression,
        sigmoid,
        ssd::{Anchors, LayerInfo},
        BoundingRect, Detection, Keypoint,
    },
    image::{Image, Rect},
    nn::{Cnn, CnnInputShape, ColorMapper, Outputs},
    resolution::Resolution,
    timer::Timer,
};

/// A keypoint of a palm [`Detection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PalmKeypoint {
    Wrist = 0,
    IndexFingerMcp = 1,
    MiddleFingerMcp = 2,
    RingFingerMcp = 3,
    PinkyMcp = 4,
    ThumbCmc = 5,
    ThumbMcp = 6,
}

const NUM_KEYPOINTS: usize = 7;

/// Box center, box size and 7 keypoints.
const BOX_PARAMS: usize = 4 + NUM_KEYPOINTS * 2;

/// Size of the hand region relative to the palm's bounding box.
const HAND_SCALE: f32 = 2.6;

/// Offset of the hand region's center from the palm's center towards the fingers, relative to the
/// palm's size.
const HAND_SHIFT: f32 = 0.5;

/// Returns the square region of the frame that encloses the whole hand belonging to `palm`.
pub fn hand_region(palm: &Detection) -> Rect {
    let rect = palm.bounding_rect();
    let size = rect.width().max(rect.height());
    let mut center = Vector2::new(rect.x_center(), rect.y_center());

    let kp = palm.keypoints();
    if let (Some(wrist), Some(mcp)) = (
        kp.get(PalmKeypoint::Wrist as usize),
        kp.get(PalmKeypoint::MiddleFingerMcp as usize),
    ) {
        let up = Vector2::new(mcp.x() - wrist.x(), mcp.y() - wrist.y());
        if let Some(up) = up.try_normalize(f32::EPSILON) {
            center += up * size * HAND_SHIFT;
        }
    }

    let side = (size * HAND_SCALE).round().max(1.0) as u32;
    Rect::from_center(center.x as i32, center.y as i32, side, side)
}

/// Decodes all detections with a confidence of at least `threshold` from the raw network output.
///
/// Positions are in network input pixels.
fn extract(
    anchors: &Anchors,
    input_res: Resolution,
    outputs: &Outputs,
    threshold: f32,
) -> anyhow::Result<Vec<Detection>> {
    let num_anchors = anchors.anchor_count();
    let boxes = outputs.get(0)?;
    let scores = outputs.get(1)?;
    if boxes.shape() != [1, num_anchors, BOX_PARAMS] {
        bail!("unexpected palm box output shape {:?}", boxes.shape());
    }
    if scores.shape() != [1, num_anchors, 1] {
        bail!("unexpected palm score output shape {:?}", scores.shape());
    }

    let input_w = input_res.width() as f32;
    let input_h = input_res.height() as f32;

    let mut detections = Vec::new();
    for (index, (&score, params)) in scores
        .as_slice()
        .iter()
        .zip(boxes.as_slice().chunks_exact(BOX_PARAMS))
        .enumerate()
    {
        let confidence = sigmoid(score);
        if confidence < threshold {
            continue;
        }

        let anchor = &anchors[index];
        let ax = anchor.x_center() * input_w;
        let ay = anchor.y_center() * input_h;
        let keypoints = params[4..]
            .chunks_exact(2)
            .map(|xy| Keypoint::new(xy[0] + ax, xy[1] + ay))
            .collect();
        detections.push(Detection::with_keypoints(
            confidence,
            BoundingRect::from_center(params[0] + ax, params[1] + ay, params[2], params[3]),
            keypoints,
        ));
    }

    Ok(detections)
}

/// Finds palms in camera frames with a MediaPipe palm detection network.
pub struct PalmDetector {
    cnn: Cnn,
    anchors: Anchors,
    nms: NonMaxSuppression,
    t_infer: Timer,
    t_extract: Timer,
}

impl PalmDetector {
    /// Loads a palm detection network taking square RGB inputs.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let cnn = Cnn::load(path, CnnInputShape::NCHW, ColorMapper::linear(0.0..=1.0))?;
        Self::new(cnn)
    }

    fn new(cnn: Cnn) -> anyhow::Result<Self> {
        let res = cnn.input_resolution();
        if res.width() != res.height() || res.width() % 16 != 0 {
            bail!("palm detection network has unsupported input size {}", res);
        }

        // Feature maps of stride 8 and 16.
        let anchors = Anchors::calculate(&[
            LayerInfo::new(2, res.width() / 8, res.height() / 8),
            LayerInfo::new(6, res.width() / 16, res.height() / 16),
        ]);

        Ok(Self {
            cnn,
            anchors,
            nms: NonMaxSuppression::new(),
            t_infer: Timer::new("palm infer"),
            t_extract: Timer::new("palm extract"),
        })
    }

    /// Returns the expected input resolution of the network.
    pub fn input_resolution(&self) -> Resolution {
        self.cnn.input_resolution()
    }

    /// Detects palms with a confidence of at least `threshold` in `image`.
    ///
    /// The image is letterboxed to the network's square input. Returned detections are in `image`
    /// pixel coordinates, most confident first.
    pub fn detect(&mut self, image: &Image, threshold: f32) -> anyhow::Result<Vec<Detection>> {
        let input_res = self.input_resolution();
        let rect = image.rect().to_square();

        let outputs = self.t_infer.time(|| self.cnn.estimate(image, rect))?;
        let mut raw = self
            .t_extract
            .time(|| extract(&self.anchors, input_res, &outputs, threshold))?;
        let palms = self.nms.process(&mut raw);

        let sx = rect.width() as f32 / input_res.width() as f32;
        let sy = rect.height() as f32 / input_res.height() as f32;
        let (dx, dy) = (rect.x() as f32, rect.y() as f32);
        Ok(palms.map(|det| det.transform(sx, sy, dx, dy)).collect())
    }

    pub fn timers(&self) -> Vec<&Timer> {
        vec![&self.t_infer, &self.t_extract]
    }
}

#[cfg(test)]
mod tests {
    use crate::nn::Tensor;

    use super::*;

    fn anchors() -> Anchors {
        Anchors::calculate(&[LayerInfo::new(1, 2, 2)])
    }

    /// Raw outputs for the 4 anchors of a 2x2 layer on a 32x32 input.
    fn outputs(scores: [f32; 4], params: [f32; BOX_PARAMS]) -> Outputs {
        let boxes = params.repeat(4);
        Outputs::from(vec![
            Tensor::new(vec![1, 4, BOX_PARAMS], boxes),
            Tensor::new(vec![1, 4, 1], scores.to_vec()),
        ])
    }

    fn palm(xc: f32, yc: f32, size: f32, wrist: (f32, f32), mcp: (f32, f32)) -> Detection {
        let mut keypoints = vec![Keypoint::new(xc, yc); NUM_KEYPOINTS];
        keypoints[PalmKeypoint::Wrist as usize] = Keypoint::new(wrist.0, wrist.1);
        keypoints[PalmKeypoint::MiddleFingerMcp as usize] = Keypoint::new(mcp.0, mcp.1);
        Detection::with_keypoints(1.0, BoundingRect::from_center(xc, yc, size, size), keypoints)
    }

    #[test]
    fn extract_thresholds_and_offsets() {
        let mut params = [0.0; BOX_PARAMS];
        params[..4].copy_from_slice(&[1.0, -1.0, 6.0, 4.0]);
        params[4] = 2.0;
        params[5] = 3.0;

        let res = Resolution::new(32, 32);
        let detections =
            extract(&anchors(), res, &outputs([-10.0, 10.0, -10.0, 0.0], params), 0.5).unwrap();
        assert_eq!(detections.len(), 2);

        // Anchor 1 is centered at (24, 8).
        let det = &detections[0];
        assert!(det.confidence() > 0.99);
        assert_eq!(
            det.bounding_rect(),
            BoundingRect::from_center(25.0, 7.0, 6.0, 4.0)
        );
        assert_eq!(det.keypoints().len(), NUM_KEYPOINTS);
        assert_eq!(det.keypoints()[0], Keypoint::new(26.0, 11.0));

        // Anchor 3 is centered at (24, 24), its score of 0 maps to a confidence of 0.5.
        assert_eq!(detections[1].confidence(), 0.5);
        assert_eq!(detections[1].bounding_rect().y_center(), 23.0);
    }

    #[test]
    fn extract_rejects_bad_shapes() {
        let res = Resolution::new(32, 32);
        let outputs = Outputs::from(vec![
            Tensor::new(vec![1, 4, 16], vec![0.0; 64]),
            Tensor::new(vec![1, 4, 1], vec![0.0; 4]),
        ]);
        assert!(extract(&anchors(), res, &outputs, 0.5).is_err());

        let outputs = Outputs::from(vec![Tensor::new(vec![1, 4, BOX_PARAMS], vec![0.0; 72])]);
        assert!(extract(&anchors(), res, &outputs, 0.5).is_err());
    }

    #[test]
    fn hand_region_extends_towards_fingers() {
        // Fingers pointing up.
        let region = hand_region(&palm(100.0, 200.0, 40.0, (100.0, 220.0), (100.0, 180.0)));
        assert_eq!(region.width(), 104);
        assert_eq!(region.height(), 104);
        assert_eq!(region.center(), (100, 180));

        // Fingers pointing right.
        let region = hand_region(&palm(100.0, 200.0, 40.0, (80.0, 200.0), (120.0, 200.0)));
        assert_eq!(region.center(), (120, 200));
    }

    #[test]
    fn hand_region_without_keypoints() {
        let det = Detection::new(1.0, BoundingRect::from_center(50.0, 60.0, 10.0, 20.0));
        let region = hand_region(&det);
        assert_eq!(region.width(), 52);
        assert_eq!(region.center(), (50, 60));
    }
}
