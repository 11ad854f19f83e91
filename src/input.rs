//! Synthetic mouse input.
//!
//! Every injected action is preceded by a fail-safe check: while the real pointer rests in one of
//! the four screen corners, all actions are refused with [`InputError::FailSafe`]. Moving the mouse
//! into a corner by hand is therefore a reliable way to take back control of the pointer.

use std::{thread, time::Duration};

use enigo::{Coordinate, Direction, Enigo, Mouse};
use thiserror::Error;

use crate::{geometry::PixelPos, resolution::Resolution};

/// Moves that are not longer than this are performed in a single step.
const MIN_TWEEN_DURATION: Duration = Duration::from_millis(100);

/// Minimum delay between two intermediate steps of a tweened move.
const MIN_STEP_DELAY: Duration = Duration::from_millis(50);

#[derive(Debug, Error)]
pub enum InputError {
    #[error("fail-safe triggered: pointer is in screen corner ({x}, {y})")]
    FailSafe { x: i32, y: i32 },
    #[error("input backend error: {0}")]
    Backend(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Right,
}

/// Injects pointer motion and clicks into the desktop session.
pub trait Pointer {
    /// Returns the size of the primary screen in pixels.
    fn screen_size(&self) -> Result<Resolution, InputError>;

    /// Moves the pointer to `pos`, taking `duration` to get there.
    fn move_to(&mut self, pos: PixelPos, duration: Duration) -> Result<(), InputError>;

    /// Clicks `button` once at the current pointer position.
    fn click(&mut self, button: MouseButton) -> Result<(), InputError>;

    /// Clicks the left button twice in quick succession.
    fn double_click(&mut self) -> Result<(), InputError>;
}

impl<P: Pointer + ?Sized> Pointer for Box<P> {
    fn screen_size(&self) -> Result<Resolution, InputError> {
        (**self).screen_size()
    }

    fn move_to(&mut self, pos: PixelPos, duration: Duration) -> Result<(), InputError> {
        (**self).move_to(pos, duration)
    }

    fn click(&mut self, button: MouseButton) -> Result<(), InputError> {
        (**self).click(button)
    }

    fn double_click(&mut self) -> Result<(), InputError> {
        (**self).double_click()
    }
}

/// Returns whether `pos` is one of the four corner pixels of `screen`.
pub fn in_failsafe_corner(pos: PixelPos, screen: Resolution) -> bool {
    let right = screen.width() as i32 - 1;
    let bottom = screen.height() as i32 - 1;
    (pos.x == 0 || pos.x == right) && (pos.y == 0 || pos.y == bottom)
}

/// Computes the positions a move from `from` to `to` passes through, and the delay to wait
/// before each of them.
///
/// Moves with a `duration` of up to 100ms jump directly to the target. Longer moves are split
/// into one step per pixel along the longer axis, reduced as needed to keep the steps at least
/// 50ms apart. The last position is always `to`.
pub fn tween_path(from: PixelPos, to: PixelPos, duration: Duration) -> (Vec<PixelPos>, Duration) {
    if duration <= MIN_TWEEN_DURATION {
        return (vec![to], Duration::ZERO);
    }

    let dx = to.x - from.x;
    let dy = to.y - from.y;
    let mut num_steps = dx.unsigned_abs().max(dy.unsigned_abs()).max(1);
    if duration / num_steps < MIN_STEP_DELAY {
        num_steps = (duration.as_nanos() / MIN_STEP_DELAY.as_nanos()).max(1) as u32;
    }
    let delay = duration / num_steps;

    let mut path = (1..num_steps)
        .map(|n| {
            let t = n as f64 / num_steps as f64;
            PixelPos::new(
                from.x + (dx as f64 * t) as i32,
                from.y + (dy as f64 * t) as i32,
            )
        })
        .collect::<Vec<_>>();
    path.push(to);
    (path, delay)
}

fn backend<E: std::fmt::Debug>(e: E) -> InputError {
    InputError::Backend(format!("{:?}", e))
}

/// A [`Pointer`] that drives the system mouse through [`enigo`].
pub struct EnigoPointer {
    enigo: Enigo,
    click_pause: Duration,
}

impl EnigoPointer {
    /// Connects to the system input backend.
    ///
    /// Every click is followed by a sleep of `click_pause`.
    pub fn new(click_pause: Duration) -> Result<Self, InputError> {
        let enigo = Enigo::new(&enigo::Settings::default()).map_err(backend)?;
        Ok(Self { enigo, click_pause })
    }

    fn location(&self) -> Result<PixelPos, InputError> {
        let (x, y) = self.enigo.location().map_err(backend)?;
        Ok(PixelPos::new(x, y))
    }

    fn fail_safe_check(&self) -> Result<(), InputError> {
        let pos = self.location()?;
        if in_failsafe_corner(pos, self.screen_size()?) {
            return Err(InputError::FailSafe { x: pos.x, y: pos.y });
        }
        Ok(())
    }

    fn button_click(&mut self, button: enigo::Button) -> Result<(), InputError> {
        self.enigo
            .button(button, Direction::Click)
            .map_err(backend)
    }
}

impl Pointer for EnigoPointer {
    fn screen_size(&self) -> Result<Resolution, InputError> {
        let (w, h) = self.enigo.main_display().map_err(backend)?;
        if w <= 0 || h <= 0 {
            return Err(InputError::Backend(format!(
                "invalid screen size {}x{}",
                w, h
            )));
        }
        Ok(Resolution::new(w as u32, h as u32))
    }

    fn move_to(&mut self, pos: PixelPos, duration: Duration) -> Result<(), InputError> {
        self.fail_safe_check()?;

        let screen = self.screen_size()?;
        let target = PixelPos::new(
            pos.x.clamp(0, screen.width() as i32 - 1),
            pos.y.clamp(0, screen.height() as i32 - 1),
        );
        let (path, delay) = tween_path(self.location()?, target, duration);
        for (i, step) in path.into_iter().enumerate() {
            if i != 0 {
                thread::sleep(delay);
                self.fail_safe_check()?;
            }
            self.enigo
                .move_mouse(step.x, step.y, Coordinate::Abs)
                .map_err(backend)?;
        }
        Ok(())
    }

    fn click(&mut self, button: MouseButton) -> Result<(), InputError> {
        self.fail_safe_check()?;
        self.button_click(match button {
            MouseButton::Left => enigo::Button::Left,
            MouseButton::Right => enigo::Button::Right,
        })?;
        thread::sleep(self.click_pause);
        Ok(())
    }

    fn double_click(&mut self) -> Result<(), InputError> {
        self.fail_safe_check()?;
        self.button_click(enigo::Button::Left)?;
        self.button_click(enigo::Button::Left)?;
        thread::sleep(self.click_pause);
        Ok(())
    }
}
