//! The hand tracking control loop.
//!
//! Every iteration captures a frame, mirrors it, locates the hand, moves the pointer to follow the
//! index fingertip, evaluates pinch gestures and finally shows the annotated frame. The loop runs
//! until the preview window asks to exit or an error occurs. Either way, the camera and the window
//! are released exactly once by [`App::shutdown`].

use crate::{
    config::Settings,
    cursor::{CursorMapper, RegionOfInterest},
    geometry::PixelPos,
    gesture::{Gesture, GestureClassifier},
    gui::FrameSink,
    hand::{HandLandmarks, LandmarkDetector, LandmarkIdx},
    input::{InputError, MouseButton, Pointer},
    overlay::Overlay,
    resolution::Resolution,
    timer::{FpsCounter, Timer},
    video::Camera,
};

/// Outcome of a single loop iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Continue,
    Exit,
}

/// The result of one processed frame, for inspection by callers driving the loop manually.
#[derive(Debug, Clone, Default)]
pub struct FrameReport {
    /// Landmarks of the hand visible in the (mirrored) frame.
    pub hand: Option<HandLandmarks>,
    /// Screen position the pointer was moved to.
    pub moved_to: Option<PixelPos>,
    /// Gesture whose click was injected.
    pub fired: Option<Gesture>,
}

/// Turns a fail-safe refusal into a warning, passing all other results through.
fn tolerate_failsafe(result: Result<(), InputError>) -> Result<bool, InputError> {
    match result {
        Ok(()) => Ok(true),
        Err(InputError::FailSafe { x, y }) => {
            log::warn!(
                "fail-safe triggered: pointer is in screen corner ({}, {}), ignoring action",
                x,
                y
            );
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

/// Injects the click associated with `gesture`.
fn inject<P: Pointer + ?Sized>(pointer: &mut P, gesture: Gesture) -> Result<(), InputError> {
    match gesture {
        Gesture::LeftClick => pointer.click(MouseButton::Left),
        Gesture::RightClick => pointer.click(MouseButton::Right),
        Gesture::DoubleClick => pointer.double_click(),
    }
}

/// The control loop and the resources it drives.
pub struct App<C: Camera, D: LandmarkDetector, P: Pointer, S: FrameSink> {
    camera: C,
    detector: D,
    pointer: P,
    sink: S,
    settings: Settings,
    mapper: CursorMapper,
    classifier: GestureClassifier,
    fps: FpsCounter,
    t_detect: Timer,
    t_inject: Timer,
    t_show: Timer,
    released: bool,
}

impl<C: Camera, D: LandmarkDetector, P: Pointer, S: FrameSink> App<C, D, P, S> {
    /// Creates the control loop for frames of size `frame`.
    ///
    /// The region of interest is derived from `frame` once and stays fixed afterwards. Fails if the
    /// screen size cannot be queried from `pointer`.
    pub fn new(
        camera: C,
        detector: D,
        pointer: P,
        sink: S,
        frame: Resolution,
        settings: Settings,
    ) -> anyhow::Result<Self> {
        let screen = pointer.screen_size()?;
        let roi = RegionOfInterest::from_frame(frame, settings.roi_margin);
        log::info!(
            "screen size {}, frame size {}, region of interest {:?}",
            screen,
            frame,
            roi
        );

        Ok(Self {
            camera,
            detector,
            pointer,
            sink,
            mapper: CursorMapper::new(roi, screen),
            classifier: GestureClassifier::new(settings.pinch_threshold, settings.check_every),
            settings,
            fps: FpsCounter::new("control loop"),
            t_detect: Timer::new("detect"),
            t_inject: Timer::new("inject"),
            t_show: Timer::new("show"),
            released: false,
        })
    }

    #[inline]
    pub fn roi(&self) -> &RegionOfInterest {
        self.mapper.roi()
    }

    /// Processes a single camera frame.
    ///
    /// Returns whether the loop should continue, along with what happened in this frame.
    pub fn step(&mut self) -> anyhow::Result<(Step, FrameReport)> {
        let mut frame = self.camera.read()?;
        frame.flip_horizontal_in_place();
        let res = frame.resolution();

        let hand = self.t_detect.time(|| self.detector.detect(&frame))?;

        let mut report = FrameReport::default();
        if let Some(hand) = &hand {
            let _guard = self.t_inject.start();

            let tip = hand.pixel_position(LandmarkIdx::IndexFingerTip, res);
            if let Some(target) = self.mapper.map(tip) {
                let moved = self
                    .pointer
                    .move_to(target, self.settings.move_duration);
                if tolerate_failsafe(moved)? {
                    report.moved_to = Some(target);
                }
            }

            if let Some(gesture) = self.classifier.update(hand, res) {
                log::info!("{}", gesture.label());
                if tolerate_failsafe(inject(&mut self.pointer, gesture))? {
                    report.fired = Some(gesture);
                }
            }
        }

        Overlay {
            roi: self.mapper.roi(),
            hand: hand.as_ref(),
            fired: report.fired,
        }
        .draw(&mut frame);
        self.t_show.time(|| self.sink.show(&frame))?;
        report.hand = hand;

        self.fps.tick_with(
            self.camera
                .timers()
                .into_iter()
                .chain(self.detector.timers())
                .chain([&self.t_detect, &self.t_inject, &self.t_show]),
        );

        if self.sink.exit_requested() {
            log::info!("exit requested");
            return Ok((Step::Exit, report));
        }
        Ok((Step::Continue, report))
    }

    /// Runs the loop until exit is requested or an iteration fails.
    pub fn run(&mut self) -> anyhow::Result<()> {
        loop {
            if let (Step::Exit, _) = self.step()? {
                return Ok(());
            }
        }
    }

    /// Runs the loop, logs the error that ended it (if any), then releases all resources.
    ///
    /// Loop errors are not propagated: once the loop has started, ending it is the only recovery.
    pub fn run_until_exit(mut self) {
        if let Err(e) = self.run() {
            log::error!("control loop failed: {:?}", e);
        }
        self.shutdown();
    }

    /// Releases the camera and closes the window.
    ///
    /// Only the first call has an effect. Failures are logged and otherwise ignored. This is also
    /// invoked when the [`App`] is dropped.
    pub fn shutdown(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        if let Err(e) = self.camera.release() {
            log::error!("failed to release camera: {:?}", e);
        }
        if let Err(e) = self.sink.close() {
            log::error!("failed to close window: {:?}", e);
        }
        log::info!("resources released");
    }
}

impl<C: Camera, D: LandmarkDetector, P: Pointer, S: FrameSink> Drop for App<C, D, P, S> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
