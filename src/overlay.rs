//! Annotations drawn onto the preview frame.

use crate::{
    config::HELP_TEXT,
    cursor::RegionOfInterest,
    gesture::Gesture,
    hand::HandLandmarks,
    image::{draw, Color, Image},
};

const HELP_X: i32 = 10;
const HELP_TOP: i32 = 30;
const HELP_LINE_HEIGHT: i32 = 25;

/// Offset of the click label from the bottom-left corner of the frame.
const LABEL_OFFSET: i32 = 50;

/// Returns the color the label of `gesture` is drawn in.
pub fn gesture_color(gesture: Gesture) -> Color {
    match gesture {
        Gesture::LeftClick => Color::GREEN,
        Gesture::RightClick => Color::RED,
        Gesture::DoubleClick => Color::BLUE,
    }
}

/// Outlines the region of the frame that is mapped to the screen.
pub fn draw_roi(image: &mut Image, roi: &RegionOfInterest) {
    draw::rect(image, roi.to_rect())
        .color(Color::GREEN)
        .stroke_width(2);
}

/// Draws the gesture instructions into the top left corner.
pub fn draw_help(image: &mut Image) {
    for (i, line) in HELP_TEXT.iter().enumerate() {
        let y = HELP_TOP + i as i32 * HELP_LINE_HEIGHT;
        draw::text(image, HELP_X, y, line)
            .color(Color::WHITE)
            .align_left()
            .align_bottom();
    }
}

/// Draws the label of a gesture that has just fired near the bottom-left corner.
pub fn draw_gesture(image: &mut Image, gesture: Gesture) {
    let y = image.height() as i32 - LABEL_OFFSET;
    draw::text(image, LABEL_OFFSET, y, gesture.label())
        .color(gesture_color(gesture))
        .large()
        .align_left()
        .align_bottom();
}

/// Everything drawn on top of a single frame.
#[derive(Debug, Clone, Copy)]
pub struct Overlay<'a> {
    pub roi: &'a RegionOfInterest,
    pub hand: Option<&'a HandLandmarks>,
    pub fired: Option<Gesture>,
}

impl Overlay<'_> {
    /// Draws the overlay onto `image`, which must be the (mirrored) frame the hand was found in.
    pub fn draw(&self, image: &mut Image) {
        draw_roi(image, self.roi);
        draw_help(image);
        if let Some(hand) = self.hand {
            hand.draw(image);
        }
        if let Some(gesture) = self.fired {
            draw_gesture(image, gesture);
        }
    }
}
