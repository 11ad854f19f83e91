use std::{
    cell::{Cell, RefCell},
    collections::VecDeque,
    rc::Rc,
    time::Duration,
};

use anyhow::bail;
use handmouse::{
    app::{App, Step},
    config::Settings,
    geometry::PixelPos,
    gesture::Gesture,
    gui::FrameSink,
    hand::{landmark::NUM_LANDMARKS, HandLandmarks, LandmarkDetector, LandmarkIdx},
    image::Image,
    input::{InputError, MouseButton, Pointer},
    resolution::Resolution,
    video::Camera,
};

const FRAME: Resolution = Resolution::new(640, 480);
const SCREEN: Resolution = Resolution::new(800, 600);

struct FakeCamera {
    frames_left: usize,
    releases: Rc<Cell<u32>>,
}

impl Camera for FakeCamera {
    fn read(&mut self) -> anyhow::Result<Image> {
        if self.releases.get() != 0 {
            bail!("camera has been released");
        }
        if self.frames_left == 0 {
            bail!("camera disconnected");
        }
        self.frames_left -= 1;
        Ok(Image::new(FRAME.width(), FRAME.height()))
    }

    fn release(&mut self) -> anyhow::Result<()> {
        self.releases.set(self.releases.get() + 1);
        Ok(())
    }
}

struct ScriptedDetector {
    script: VecDeque<Option<HandLandmarks>>,
}

impl LandmarkDetector for ScriptedDetector {
    fn detect(&mut self, image: &Image) -> anyhow::Result<Option<HandLandmarks>> {
        assert_eq!(image.resolution(), FRAME);
        Ok(self.script.pop_front().flatten())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Move(PixelPos),
    Click(MouseButton),
    DoubleClick,
}

#[derive(Default, Clone)]
struct RecordingPointer {
    actions: Rc<RefCell<Vec<Action>>>,
    fail_safe: Rc<Cell<bool>>,
}

impl RecordingPointer {
    fn record(&self, action: Action) -> Result<(), InputError> {
        if self.fail_safe.get() {
            return Err(InputError::FailSafe { x: 0, y: 0 });
        }
        self.actions.borrow_mut().push(action);
        Ok(())
    }

    fn moves(&self) -> Vec<PixelPos> {
        self.actions
            .borrow()
            .iter()
            .filter_map(|a| match a {
                Action::Move(pos) => Some(*pos),
                _ => None,
            })
            .collect()
    }

    fn clicks(&self) -> Vec<Action> {
        self.actions
            .borrow()
            .iter()
            .filter(|a| !matches!(a, Action::Move(_)))
            .copied()
            .collect()
    }
}

impl Pointer for RecordingPointer {
    fn screen_size(&self) -> Result<Resolution, InputError> {
        Ok(SCREEN)
    }

    fn move_to(&mut self, pos: PixelPos, duration: Duration) -> Result<(), InputError> {
        assert_eq!(duration, Duration::from_millis(100));
        self.record(Action::Move(pos))
    }

    fn click(&mut self, button: MouseButton) -> Result<(), InputError> {
        self.record(Action::Click(button))
    }

    fn double_click(&mut self) -> Result<(), InputError> {
        self.record(Action::DoubleClick)
    }
}

struct FakeSink {
    exit_after: Option<usize>,
    shown: usize,
    closes: Rc<Cell<u32>>,
}

impl FrameSink for FakeSink {
    fn show(&mut self, image: &Image) -> anyhow::Result<()> {
        assert_eq!(image.resolution(), FRAME);
        self.shown += 1;
        Ok(())
    }

    fn exit_requested(&self) -> bool {
        self.exit_after.map_or(false, |n| self.shown >= n)
    }

    fn close(&mut self) -> anyhow::Result<()> {
        self.closes.set(self.closes.get() + 1);
        Ok(())
    }
}

/// Builds a hand from normalized fingertip positions, with all other landmarks in the center.
fn hand(index: [f32; 2], thumb: [f32; 2], middle: [f32; 2]) -> HandLandmarks {
    let mut xy = [[0.5; 2]; NUM_LANDMARKS];
    xy[LandmarkIdx::IndexFingerTip as usize] = index;
    xy[LandmarkIdx::ThumbTip as usize] = thumb;
    xy[LandmarkIdx::MiddleFingerTip as usize] = middle;
    HandLandmarks::from_xy(xy)
}

/// Index fingertip in the center of the frame, thumb and middle finger far away.
fn open_hand() -> HandLandmarks {
    hand([0.5, 0.5], [0.25, 0.75], [0.75, 0.25])
}

/// Thumb 10 pixels to the right of the index fingertip.
fn thumb_index_pinch() -> HandLandmarks {
    hand([0.5, 0.5], [0.515625, 0.5], [0.75, 0.25])
}

struct Harness {
    releases: Rc<Cell<u32>>,
    closes: Rc<Cell<u32>>,
    pointer: RecordingPointer,
}

type TestApp = App<FakeCamera, ScriptedDetector, RecordingPointer, FakeSink>;

fn app(
    script: Vec<Option<HandLandmarks>>,
    frames: usize,
    exit_after: Option<usize>,
    settings: Settings,
) -> (TestApp, Harness) {
    let harness = Harness {
        releases: Rc::default(),
        closes: Rc::default(),
        pointer: RecordingPointer::default(),
    };
    let app = App::new(
        FakeCamera {
            frames_left: frames,
            releases: harness.releases.clone(),
        },
        ScriptedDetector {
            script: script.into(),
        },
        harness.pointer.clone(),
        FakeSink {
            exit_after,
            shown: 0,
            closes: harness.closes.clone(),
        },
        FRAME,
        settings,
    )
    .unwrap();
    (app, harness)
}

#[test]
fn cursor_follows_fingertip_inside_roi() {
    let script = vec![
        Some(open_hand()),
        // Top-left corner of the region of interest.
        Some(hand([0.2, 0.2], [0.5, 0.9], [0.9, 0.9])),
        // Left of the region of interest.
        Some(hand([0.1, 0.5], [0.5, 0.9], [0.9, 0.9])),
        None,
    ];
    let (mut app, harness) = app(script, 4, Some(4), Settings::default());
    assert_eq!(format!("{:?}", app.roi()), "(128, 96)-(512, 384)");

    let (step, report) = app.step().unwrap();
    assert_eq!(step, Step::Continue);
    assert_eq!(report.moved_to, Some(PixelPos::new(400, 300)));

    let (_, report) = app.step().unwrap();
    assert_eq!(report.moved_to, Some(PixelPos::new(0, 0)));

    let (_, report) = app.step().unwrap();
    assert!(report.hand.is_some());
    assert_eq!(report.moved_to, None);

    let (step, report) = app.step().unwrap();
    assert_eq!(step, Step::Exit);
    assert!(report.hand.is_none());

    assert_eq!(
        harness.pointer.moves(),
        [PixelPos::new(400, 300), PixelPos::new(0, 0)]
    );
    assert!(harness.pointer.clicks().is_empty());
}

#[test]
fn sustained_pinch_clicks_once() {
    let mut script = vec![Some(thumb_index_pinch()); 30];
    script.extend(vec![Some(open_hand()); 10]);
    script.extend(vec![Some(thumb_index_pinch()); 10]);
    let (mut app, harness) = app(script, 50, Some(50), Settings::default());

    app.run().unwrap();

    assert_eq!(
        harness.pointer.clicks(),
        [
            Action::Click(MouseButton::Left),
            Action::Click(MouseButton::Left)
        ]
    );
    assert_eq!(harness.pointer.moves().len(), 50);
}

#[test]
fn gesture_cadence_counts_hand_frames_only() {
    let script = vec![
        Some(thumb_index_pinch()),
        None,
        None,
        Some(thumb_index_pinch()),
    ];
    let settings = Settings::default().check_every(2);
    let (mut app, harness) = app(script, 4, None, settings);

    let fired = (0..4)
        .map(|_| app.step().unwrap().1.fired)
        .collect::<Vec<_>>();
    assert_eq!(fired, [None, None, None, Some(Gesture::LeftClick)]);
    assert_eq!(harness.pointer.clicks(), [Action::Click(MouseButton::Left)]);
}

#[test]
fn gesture_priority() {
    // Thumb, index and middle finger all within 30 pixels of each other.
    let bunched = hand([0.5, 0.5], [0.515625, 0.5], [0.5, 0.515625]);
    // Thumb and middle finger pinched, index finger away.
    let thumb_middle = hand([0.25, 0.5], [0.5, 0.5], [0.515625, 0.5]);
    // Index and middle finger pinched, thumb away.
    let index_middle = hand([0.5, 0.5], [0.25, 0.75], [0.515625, 0.5]);
    let script = vec![
        Some(bunched),
        Some(open_hand()),
        Some(thumb_middle),
        Some(open_hand()),
        Some(index_middle),
    ];
    let settings = Settings::default().check_every(1);
    let (mut app, harness) = app(script, 5, Some(5), settings);

    app.run().unwrap();

    assert_eq!(
        harness.pointer.clicks(),
        [
            Action::Click(MouseButton::Left),
            Action::Click(MouseButton::Right),
            Action::DoubleClick
        ]
    );
}

#[test]
fn failsafe_does_not_stop_loop() {
    let script = vec![Some(thumb_index_pinch()); 3];
    let settings = Settings::default().check_every(1);
    let (mut app, harness) = app(script, 3, Some(3), settings);
    harness.pointer.fail_safe.set(true);

    let (_, report) = app.step().unwrap();
    assert_eq!(report.moved_to, None);
    assert_eq!(report.fired, None);

    app.run().unwrap();
    assert!(harness.pointer.actions.borrow().is_empty());
}

#[test]
fn cleanup_runs_once_on_error() {
    let (app, harness) = app(vec![Some(open_hand()); 3], 3, None, Settings::default());

    // The fourth frame fails; the error is logged and the loop ends.
    app.run_until_exit();

    assert_eq!(harness.releases.get(), 1);
    assert_eq!(harness.closes.get(), 1);
    assert_eq!(harness.pointer.moves().len(), 3);
}

#[test]
fn cleanup_runs_once_on_exit() {
    let (mut app, harness) = app(vec![None; 5], 5, Some(2), Settings::default());

    app.run().unwrap();
    assert_eq!(harness.releases.get(), 0);

    app.shutdown();
    app.shutdown();
    drop(app);
    assert_eq!(harness.releases.get(), 1);
    assert_eq!(harness.closes.get(), 1);
}
