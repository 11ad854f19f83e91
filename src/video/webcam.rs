//! V4L2 webcam access.
//!
//! Devices are scanned once per [`Backend`]: all `VIDEO_CAPTURE` devices are first tried with
//! Motion JPEG formats, then with YUYV. A device is only accepted once it has delivered a decodable frame.

use std::{cmp::Reverse, env};

use anyhow::{bail, Context};
use itertools::Itertools;
use linuxvideo::{
    format::{FrameIntervals, FrameSizes, PixFormat, PixelFormat},
    stream::ReadStream,
    BufType, CapabilityFlags, Device, Fract,
};

use crate::{image::Image, resolution::Resolution, timer::Timer};

use super::{Backend, Camera, CameraInitError};

const ENV_VAR_WEBCAM_NAME: &str = "HANDMOUSE_WEBCAM_NAME";

/// Indicates whether to prefer a higher resolution or frame rate.
///
/// By default, [`ParamPreference::Resolution`] is used, selecting the resolution closest to the
/// desired one at the highest frame rate available for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[non_exhaustive]
pub enum ParamPreference {
    /// Keep the resolution when the desired parameters cannot be met.
    #[default]
    Resolution,
    /// Keep the frame rate when the desired parameters cannot be met.
    Framerate,
}

#[derive(Debug, Default, Clone, Copy)]
struct FramePrefs {
    resolution: Option<Resolution>,
    fps: Option<u32>,
    pref: ParamPreference,
}

/// Format negotiation options.
#[derive(Default)]
pub struct WebcamOptions {
    frame: FramePrefs,
}

impl WebcamOptions {
    /// Sets the desired image resolution.
    ///
    /// A lower resolution might be selected if the webcam cannot deliver the desired resolution.
    #[inline]
    pub fn resolution(mut self, resolution: Resolution) -> Self {
        self.frame.resolution = Some(resolution);
        self
    }

    /// Sets the desired frame rate.
    ///
    /// A lower frame rate might be selected if the webcam cannot deliver the desired frame rate.
    #[inline]
    pub fn fps(mut self, fps: u32) -> Self {
        self.frame.fps = Some(fps);
        self
    }

    /// Selects whether to keep the resolution or the frame rate when the camera cannot deliver
    /// both.
    #[inline]
    pub fn prefer(mut self, pref: ParamPreference) -> Self {
        self.frame.pref = pref;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct FrameFormat {
    resolution: Resolution,
    frame_interval: Fract,
}

impl FrameFormat {
    /// Frame rate, rounded to whole frames per second.
    fn fps(&self) -> u32 {
        (1.0 / self.frame_interval.as_f32()).round() as u32
    }
}

fn backend_supports(backend: Backend, format: PixelFormat) -> bool {
    match backend {
        Backend::Mjpeg => format == PixelFormat::MJPG || format == PixelFormat::JPEG,
        Backend::Yuyv => format == PixelFormat::YUYV,
    }
}

fn negotiate_format(
    device: &Device,
    backend: Backend,
    mut prefs: FramePrefs,
) -> anyhow::Result<(PixFormat, Fract)> {
    let mut pixel_format = None;
    for format in device.formats(BufType::VIDEO_CAPTURE) {
        let format = format?;
        if backend_supports(backend, format.pixel_format()) {
            pixel_format = Some(format.pixel_format());
            break;
        }
    }

    let Some(pixel_format) = pixel_format else {
        bail!("no {} pixel format offered", backend);
    };

    let mut formats = Vec::new();
    match device.frame_sizes(pixel_format)? {
        FrameSizes::Discrete(sizes) => {
            for size in sizes {
                let intervals =
                    match device.frame_intervals(pixel_format, size.width(), size.height())? {
                        FrameIntervals::Discrete(intervals) => intervals,
                        FrameIntervals::Stepwise(_) | FrameIntervals::Continuous(_) => {
                            bail!("stepwise or continuous frame rates are not supported")
                        }
                    };
                for rate in intervals {
                    formats.push(FrameFormat {
                        resolution: Resolution::new(size.width(), size.height()),
                        frame_interval: *rate.fract(),
                    });
                }
            }
        }
        FrameSizes::Stepwise(_) | FrameSizes::Continuous(_) => {
            bail!("stepwise or continuous resolutions are not supported");
        }
    }

    loop {
        if let Some(fmt) = negotiate_format_step(&formats, prefs) {
            return Ok((
                PixFormat::new(
                    fmt.resolution.width(),
                    fmt.resolution.height(),
                    pixel_format,
                ),
                fmt.frame_interval,
            ));
        }

        log::debug!("failed to negotiate format with prefs {:?}", prefs);
        let relaxed = match prefs.pref {
            ParamPreference::Resolution => {
                prefs.fps.take().is_some() || prefs.resolution.take().is_some()
            }
            ParamPreference::Framerate => {
                prefs.resolution.take().is_some() || prefs.fps.take().is_some()
            }
        };
        if !relaxed {
            break;
        }
        log::debug!("retrying with new prefs {:?}", prefs);
    }

    bail!("failed to negotiate a webcam format")
}

/// Picks the best format among those satisfying `prefs`.
///
/// Formats smaller than the desired resolution or slower than the desired frame rate are not
/// eligible. Of the rest, the one closest to the desired resolution is picked (the largest one if
/// no resolution is requested), with frame rate as the primary or secondary criterion depending on
/// the [`ParamPreference`].
fn negotiate_format_step(formats: &[FrameFormat], prefs: FramePrefs) -> Option<FrameFormat> {
    let eligible = formats.iter().filter(|fmt| {
        prefs.resolution.map_or(true, |res| {
            fmt.resolution.width() >= res.width() && fmt.resolution.height() >= res.height()
        }) && prefs.fps.map_or(true, |fps| fmt.fps() >= fps)
    });

    // Larger keys are better.
    let closeness = |fmt: &FrameFormat| match prefs.resolution {
        Some(_) => Reverse(fmt.resolution.num_pixels()),
        None => Reverse(u64::MAX - fmt.resolution.num_pixels()),
    };
    let best = match prefs.pref {
        ParamPreference::Resolution => {
            eligible.max_by_key(|fmt| (closeness(fmt), fmt.fps()))
        }
        ParamPreference::Framerate => {
            eligible.max_by_key(|fmt| (fmt.fps(), closeness(fmt)))
        }
    };
    best.copied()
}

/// Decodes a raw frame delivered by a device opened with `backend`.
///
/// Unless `strict` is set, decoding errors are logged and a blank frame is returned instead.
fn decode_frame(
    backend: Backend,
    resolution: Resolution,
    data: &[u8],
    strict: bool,
) -> anyhow::Result<Image> {
    let decoded = match backend {
        Backend::Mjpeg => Image::decode_jpeg(data),
        Backend::Yuyv => Image::decode_yuyv(resolution, data),
    };
    match decoded {
        Ok(image) => Ok(image),
        Err(e) if strict => Err(e),
        Err(e) => {
            // Even good webcams occasionally produce corrupted MJPG frames. Skipping the frame
            // would cause a latency spike, so hand back a blank one.
            log::error!("webcam decode error: {}", e);
            Ok(Image::new(resolution.width(), resolution.height()))
        }
    }
}

/// A webcam yielding a stream of [`Image`]s.
pub struct Webcam {
    stream: Option<ReadStream>,
    backend: Backend,
    resolution: Resolution,
    t_dequeue: Timer,
    t_decode: Timer,
}

impl Webcam {
    /// Opens the first webcam that delivers a decodable frame, trying each [`Backend`] in turn.
    ///
    /// If `HANDMOUSE_WEBCAM_NAME` is set, only the device with that name is considered.
    ///
    /// This function can block for a significant amount of time while the webcam initializes (on
    /// the order of hundreds of milliseconds).
    pub fn open(options: WebcamOptions) -> Result<Self, CameraInitError> {
        if let Ok(name) = env::var(ENV_VAR_WEBCAM_NAME) {
            log::debug!(
                "webcam override: `{}` is set to '{}'",
                ENV_VAR_WEBCAM_NAME,
                name,
            );
        }

        for &backend in Backend::ALL {
            log::debug!("trying video devices with {} backend", backend);
            for res in linuxvideo::list()? {
                match res {
                    Ok(dev) => match Self::open_impl(dev, &options, backend) {
                        Ok(Some(webcam)) => return Ok(webcam),
                        Ok(None) => {}
                        Err(e) => {
                            log::debug!("{:#}", e);
                        }
                    },
                    Err(e) => {
                        log::warn!("{}", e);
                    }
                }
            }
        }

        Err(CameraInitError::NoDevice {
            tried: Backend::ALL.iter().join(", "),
        })
    }

    fn open_impl(
        dev: Device,
        options: &WebcamOptions,
        backend: Backend,
    ) -> anyhow::Result<Option<Self>> {
        let caps = dev.capabilities()?;
        if let Ok(name) = env::var(ENV_VAR_WEBCAM_NAME) {
            if caps.card() != name {
                return Ok(None);
            }
        }

        let cap_flags = caps.device_capabilities();
        let path = dev.path()?;
        log::debug!(
            "device {} ({}) capabilities: {:?}",
            caps.card(),
            path.display(),
            cap_flags,
        );

        if !cap_flags.contains(CapabilityFlags::VIDEO_CAPTURE) {
            return Ok(None);
        }

        let (pixfmt, fract) = negotiate_format(&dev, backend, options.frame)
            .with_context(|| format!("{} ({})", caps.card(), path.display()))?;

        let capture = dev.video_capture(pixfmt)?;

        let format = capture.format();
        let resolution = Resolution::new(format.width(), format.height());

        let actual = capture.set_frame_interval(fract)?;

        let stream = capture.into_stream()?;
        let mut webcam = Self {
            stream: Some(stream),
            backend,
            resolution,
            t_dequeue: Timer::new("dequeue"),
            t_decode: Timer::new("decode"),
        };

        webcam.read_frame(true).with_context(|| {
            format!(
                "{} ({}) did not deliver a {} frame",
                caps.card(),
                path.display(),
                backend
            )
        })?;

        log::info!(
            "opened {} ({}), {} {} @ {:.1}Hz",
            caps.card(),
            path.display(),
            resolution,
            backend,
            1.0 / actual.as_f32(),
        );

        Ok(Some(webcam))
    }

    /// Returns the size of the frames produced by this webcam.
    #[inline]
    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Returns the backend this webcam was opened with.
    #[inline]
    pub fn backend(&self) -> Backend {
        self.backend
    }

    /// Reads the next frame from the camera.
    ///
    /// If no frame is available, this method will block until one is. Frames that fail to decode
    /// are replaced with a blank image.
    pub fn read(&mut self) -> anyhow::Result<Image> {
        self.read_frame(false)
    }

    fn read_frame(&mut self, strict: bool) -> anyhow::Result<Image> {
        let Some(stream) = &mut self.stream else {
            bail!("webcam has been released");
        };

        let (backend, resolution) = (self.backend, self.resolution);
        let t_decode = &self.t_decode;
        let dequeue_guard = self.t_dequeue.start();
        stream
            .dequeue(|buf| {
                drop(dequeue_guard);
                let decoded =
                    t_decode.time(|| decode_frame(backend, resolution, &buf, strict));
                Ok(decoded)
            })?
    }
}

impl Camera for Webcam {
    fn read(&mut self) -> anyhow::Result<Image> {
        Webcam::read(self)
    }

    fn release(&mut self) -> anyhow::Result<()> {
        if self.stream.take().is_some() {
            log::debug!("released webcam");
        }
        Ok(())
    }

    fn timers(&self) -> Vec<&Timer> {
        vec![&self.t_dequeue, &self.t_decode]
    }
}
