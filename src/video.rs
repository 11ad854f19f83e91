//! Camera frame sources.

pub mod webcam;

use std::fmt;

use thiserror::Error;

use crate::{image::Image, timer::Timer};

/// Error returned when no camera could be opened.
///
/// Opening the camera is the first thing the program does, and nothing useful can be done without
/// it, so this error is fatal.
#[derive(Debug, Error)]
pub enum CameraInitError {
    #[error("failed to enumerate video devices")]
    Enumerate(#[from] std::io::Error),
    #[error("no camera could be opened with any capture backend ({tried})")]
    NoDevice { tried: String },
}

/// A family of pixel formats that a camera can deliver frames in.
///
/// Backends are tried in the order they appear in [`Backend::ALL`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// JFIF JPEG or Motion JPEG compressed frames.
    Mjpeg,
    /// Uncompressed packed YUV 4:2:2 frames.
    Yuyv,
}

impl Backend {
    pub const ALL: &'static [Backend] = &[Backend::Mjpeg, Backend::Yuyv];
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Backend::Mjpeg => "MJPEG",
            Backend::Yuyv => "YUYV",
        })
    }
}

/// A source of camera frames.
pub trait Camera {
    /// Reads the next frame, blocking until one is available.
    fn read(&mut self) -> anyhow::Result<Image>;

    /// Releases the underlying device.
    ///
    /// Reading from a released camera fails.
    fn release(&mut self) -> anyhow::Result<()>;

    /// Returns profiling timers for frame capture.
    fn timers(&self) -> Vec<&Timer> {
        Vec::new()
    }
}

impl<C: Camera + ?Sized> Camera for Box<C> {
    fn read(&mut self) -> anyhow::Result<Image> {
        (**self).read()
    }

    fn release(&mut self) -> anyhow::Result<()> {
        (**self).release()
    }

    fn timers(&self) -> Vec<&Timer> {
        (**self).timers()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_order() {
        assert_eq!(Backend::ALL, &[Backend::Mjpeg, Backend::Yuyv]);
        assert_eq!(
            Backend::ALL.iter().map(|b| b.to_string()).collect::<Vec<_>>(),
            ["MJPEG", "YUYV"]
        );
    }

    #[test]
    fn init_error_message() {
        let err = CameraInitError::NoDevice {
            tried: "MJPEG, YUYV".into(),
        };
        assert_eq!(
            err.to_string(),
            "no camera could be opened with any capture backend (MJPEG, YUYV)"
        );
    }
}
