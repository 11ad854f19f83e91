//! A simple preview window.
//!
//! The window is opened when the first image is shown and sized to fit it. Key presses and the
//! window's close button are processed whenever a new image is shown.

use anyhow::anyhow;
use minifb::{Key, KeyRepeat, Window, WindowOptions};

use crate::{image::Image, resolution::Resolution};

/// Displays annotated frames and reports when the user wants to quit.
pub trait FrameSink {
    /// Shows `image`, replacing the previously shown one, and processes pending window events.
    fn show(&mut self, image: &Image) -> anyhow::Result<()>;

    /// Returns whether ESC was pressed or the window was closed during the last [`show`] call.
    ///
    /// [`show`]: FrameSink::show
    fn exit_requested(&self) -> bool;

    /// Closes the window.
    fn close(&mut self) -> anyhow::Result<()>;
}

/// A [`FrameSink`] backed by a native [`minifb`] window.
pub struct Display {
    title: String,
    window: Option<Window>,
    res: Resolution,
    buf: Vec<u32>,
    exit: bool,
}

impl Display {
    /// Creates a display whose window will be titled `title`.
    ///
    /// No window is opened until the first image is shown.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            window: None,
            res: Resolution::new(0, 0),
            buf: Vec::new(),
            exit: false,
        }
    }

    fn window_for(&mut self, res: Resolution) -> anyhow::Result<&mut Window> {
        if self.window.is_some() && self.res != res {
            log::debug!("image size changed from {} to {}, reopening window", self.res, res);
            self.window = None;
        }

        let window = match self.window.take() {
            Some(window) => window,
            None => {
                log::debug!("creating window '{}' at {}", self.title, res);
                let window = Window::new(
                    &self.title,
                    res.width() as usize,
                    res.height() as usize,
                    WindowOptions {
                        resize: false,
                        ..WindowOptions::default()
                    },
                )
                .map_err(|e| anyhow!("failed to open window '{}': {}", self.title, e))?;
                self.res = res;
                window
            }
        };
        Ok(self.window.insert(window))
    }
}

/// Converts `image` to the `0RGB` pixel layout used by [`minifb`].
fn convert(image: &Image, buf: &mut Vec<u32>) {
    buf.clear();
    buf.extend(image.pixels().map(|c| c.to_0rgb()));
}

impl FrameSink for Display {
    fn show(&mut self, image: &Image) -> anyhow::Result<()> {
        let res = image.resolution();
        let mut buf = std::mem::take(&mut self.buf);
        convert(image, &mut buf);

        let window = self.window_for(res)?;
        let result = window.update_with_buffer(&buf, res.width() as usize, res.height() as usize);
        let exit = !window.is_open()
            || window.is_key_down(Key::Escape)
            || window.is_key_pressed(Key::Escape, KeyRepeat::No);

        self.buf = buf;
        self.exit |= exit;
        result.map_err(|e| anyhow!("failed to update window '{}': {}", self.title, e))
    }

    fn exit_requested(&self) -> bool {
        self.exit
    }

    fn close(&mut self) -> anyhow::Result<()> {
        if self.window.take().is_some() {
            log::debug!("closed window '{}'", self.title);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::image::Color;

    use super::*;

    #[test]
    fn convert_to_0rgb() {
        let mut image = Image::new(2, 1);
        image.set(0, 0, Color::from_rgb8(0x12, 0x34, 0x56));
        image.set(1, 0, Color::WHITE);

        let mut buf = vec![7; 10];
        convert(&image, &mut buf);
        assert_eq!(buf, [0x123456, 0xffffff]);
    }

    #[test]
    fn closing_unopened_display() {
        let mut display = Display::new("test");
        assert!(!display.exit_requested());
        display.close().unwrap();
    }
}
