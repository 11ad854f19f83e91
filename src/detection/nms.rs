//! Non-Maximum Averaging.
//!
//! Single-Shot MultiBox Detectors produce many overlapping detections for a single object. The
//! suppressor here merges each cluster of overlapping detections into their confidence-weighted
//! average, which jitters less between frames than only keeping the most confident one.

use super::{BoundingRect, Detection, Keypoint};

/// A non-maximum suppression algorithm that averages overlapping detections.
pub struct NonMaxSuppression {
    iou_thresh: f32,
    avg_buf: Vec<Detection>,
    out_buf: Vec<Detection>,
}

impl NonMaxSuppression {
    /// The default intersection-over-union threshold used to determine if two detections overlap.
    pub const DEFAULT_IOU_THRESH: f32 = 0.3;

    pub fn new() -> Self {
        Self {
            iou_thresh: Self::DEFAULT_IOU_THRESH,
            avg_buf: Vec::new(),
            out_buf: Vec::new(),
        }
    }

    /// Sets the intersection-over-union threshold to consider two detections as overlapping.
    pub fn set_iou_thresh(&mut self, iou_thresh: f32) {
        self.iou_thresh = iou_thresh;
    }

    /// Performs non-maximum suppression on `detections`, which is emptied in the process.
    ///
    /// The merged detections are returned in order of descending confidence. Each carries the
    /// confidence of the most confident detection of its cluster.
    ///
    /// # Panics
    ///
    /// Panics if the detections do not all have the same number of keypoints.
    pub fn process(
        &mut self,
        detections: &mut Vec<Detection>,
    ) -> impl Iterator<Item = Detection> + '_ {
        self.out_buf.clear();

        // Sort by ascending confidence, process highest confidence first by starting at the back.
        detections.sort_unstable_by(|a, b| a.confidence.total_cmp(&b.confidence));

        while let Some(seed) = detections.pop() {
            self.avg_buf.clear();
            let seed_rect = seed.bounding_rect();
            let iou_thresh = self.iou_thresh;
            let avg_buf = &mut self.avg_buf;
            detections.retain(|other| {
                if seed_rect.iou(&other.bounding_rect()) >= iou_thresh {
                    avg_buf.push(other.clone());
                    false
                } else {
                    true
                }
            });
            avg_buf.push(seed);

            let merged = average(avg_buf);
            self.out_buf.push(merged);
        }

        self.avg_buf.clear();
        self.out_buf.drain(..)
    }
}

impl Default for NonMaxSuppression {
    fn default() -> Self {
        Self::new()
    }
}

/// Computes the confidence-weighted average of `cluster`, whose last element is the seed.
fn average(cluster: &[Detection]) -> Detection {
    let seed = &cluster[cluster.len() - 1];
    let num_keypoints = seed.keypoints().len();

    let (mut xc, mut yc, mut w, mut h) = (0.0, 0.0, 0.0, 0.0);
    let mut keypoints = vec![(0.0, 0.0); num_keypoints];
    let mut divisor = 0.0;
    for det in cluster {
        assert_eq!(
            det.keypoints().len(),
            num_keypoints,
            "keypoint count must be constant"
        );

        let factor = det.confidence();
        divisor += factor;
        let rect = det.bounding_rect();
        xc += rect.x_center() * factor;
        yc += rect.y_center() * factor;
        w += rect.width() * factor;
        h += rect.height() * factor;
        for (acc, kp) in keypoints.iter_mut().zip(det.keypoints()) {
            acc.0 += kp.x() * factor;
            acc.1 += kp.y() * factor;
        }
    }

    if divisor <= 0.0 {
        return seed.clone();
    }

    Detection::with_keypoints(
        seed.confidence(),
        BoundingRect::from_center(xc / divisor, yc / divisor, w / divisor, h / divisor),
        keypoints
            .into_iter()
            .map(|(x, y)| Keypoint::new(x / divisor, y / divisor))
            .collect(),
    )
}
