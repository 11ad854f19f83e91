use handmouse::{
    app::App,
    config::{Settings, HELP_TEXT, WINDOW_TITLE},
    gui::Display,
    hand::detector::OnnxHandDetector,
    input::EnigoPointer,
    resolution::Resolution,
    video::webcam::{Webcam, WebcamOptions},
};

fn main() -> anyhow::Result<()> {
    handmouse::init_logger!();

    let settings = Settings::from_env()?;
    let pointer = EnigoPointer::new(settings.click_pause_duration())?;
    let webcam = Webcam::open(
        WebcamOptions::default()
            .resolution(Resolution::new(640, 480))
            .fps(30),
    )?;
    let frame = webcam.resolution();
    let detector = OnnxHandDetector::load(&settings)?;

    let app = App::new(
        webcam,
        detector,
        pointer,
        Display::new(WINDOW_TITLE),
        frame,
        settings,
    )?;

    log::info!("starting hand gesture control");
    for line in HELP_TEXT {
        log::info!("{}", line);
    }
    app.run_until_exit();
    Ok(())
}
