//! Full-screen messages shared by all modes.

use crate::canvas::Canvas;
use crate::canvas::FONT_BOLD;
use crate::canvas::FONT_MEDIUM;
use crate::display::Display;
use crate::display::DisplayError;

const MAX_LINE_CHARS: usize = 60;

pub fn show_error(display: &mut dyn Display, message: &str) -> Result<(), DisplayError> {
    let canvas = error_canvas(display.resolution(), message);
    crate::display::present(display, canvas.image(), None)
}

pub fn show_notice<S: AsRef<str>>(
    display: &mut dyn Display,
    title: &str,
    lines: &[S],
) -> Result<(), DisplayError> {
    let canvas = notice_canvas(display.resolution(), title, lines);
    crate::display::present(display, canvas.image(), None)
}

pub fn show_loading(display: &mut dyn Display, message: &str) -> Result<(), DisplayError> {
    let (width, height) = display.resolution();
    let mut canvas = Canvas::new(width, height, crate::color::WHITE);
    canvas.text_centered(message, height as i32 / 2, &FONT_MEDIUM, crate::color::BLACK);
    crate::display::present(display, canvas.image(), None)
}

fn error_canvas((width, height): (u32, u32), message: &str) -> Canvas {
    let mut canvas = Canvas::new(width, height, crate::color::WHITE);
    let top = height as i32 / 3;

    canvas.text_scaled(
        "ERROR",
        embedded_graphics::prelude::Point::new(width as i32 / 2, top),
        &FONT_BOLD,
        3,
        crate::color::RED,
        crate::color::WHITE,
    );

    let lines = crate::canvas::wrap_text(message, MAX_LINE_CHARS);
    canvas.lines_centered(&lines, top + 60, &FONT_MEDIUM, crate::color::BLACK, 6);
    canvas
}

fn notice_canvas<S: AsRef<str>>((width, height): (u32, u32), title: &str, lines: &[S]) -> Canvas {
    let mut canvas = Canvas::new(width, height, crate::color::WHITE);
    let top = height as i32 / 3;

    canvas.text_scaled(
        title,
        embedded_graphics::prelude::Point::new(width as i32 / 2, top),
        &FONT_BOLD,
        2,
        crate::color::BLUE,
        crate::color::WHITE,
    );

    let wrapped: Vec<String> = lines
        .iter()
        .flat_map(|line| crate::canvas::wrap_text(line.as_ref(), MAX_LINE_CHARS))
        .collect();
    canvas.lines_centered(&wrapped, top + 50, &FONT_MEDIUM, crate::color::BLACK, 6);
    canvas
}

#[cfg(test)]
mod tests {
    use image::Rgb;

    use super::*;
    use crate::display::testing::RecordingDisplay;

    #[test]
    fn test_error_screen_has_red_title() {
        let mut display = RecordingDisplay::new(800, 480);
        show_error(&mut display, "Error in weather: no data").unwrap();

        assert_eq!(display.shown.len(), 1);
        let frame = &display.shown[0];
        assert_eq!(frame.dimensions(), (800, 480));
        assert!(frame.pixels().any(|p| p == &Rgb([255, 0, 0])));
        assert!(frame.pixels().any(|p| p == &Rgb([0, 0, 0])));
    }

    #[test]
    fn test_notice_screen() {
        let mut display = RecordingDisplay::new(800, 480);
        show_notice(&mut display, "No Photos Found", &["Folder: data/photos"]).unwrap();

        assert_eq!(display.shown.len(), 1);
        assert!(display.shown[0].pixels().any(|p| p == &Rgb([0, 0, 255])));
    }

    #[test]
    fn test_loading_screen() {
        let mut display = RecordingDisplay::new(200, 100);
        show_loading(&mut display, "Loading...").unwrap();
        assert_eq!(display.shown[0].dimensions(), (200, 100));
    }
}
