use std::convert::Infallible;

use embedded_graphics::mono_font::MonoFont;
use embedded_graphics::mono_font::MonoTextStyle;
use embedded_graphics::pixelcolor::Rgb888;
use embedded_graphics::prelude::DrawTarget;
use embedded_graphics::prelude::OriginDimensions;
use embedded_graphics::prelude::Point;
use embedded_graphics::prelude::Size;
use embedded_graphics::text::Alignment;
use embedded_graphics::text::Baseline;
use embedded_graphics::text::Text;
use embedded_graphics::text::TextStyleBuilder;
use embedded_graphics::Drawable;
use embedded_graphics::Pixel;
use image::RgbImage;

pub(crate) use embedded_graphics::mono_font::iso_8859_1::FONT_10X20 as FONT_MEDIUM;
pub(crate) use embedded_graphics::mono_font::iso_8859_1::FONT_6X13 as FONT_SMALL;
pub(crate) use embedded_graphics::mono_font::iso_8859_1::FONT_9X18_BOLD as FONT_BOLD;

/// Frame buffer the modes draw into before handing it to the display.
pub struct Canvas {
    image: RgbImage,
}

impl Canvas {
    pub fn new(width: u32, height: u32, background: Rgb888) -> Self {
        Self {
            image: RgbImage::from_pixel(width, height, crate::color::to_pixel(background)),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    /// Draw `text` with its top-left corner at `position`.
    pub fn text(&mut self, text: &str, position: Point, font: &MonoFont<'_>, color: Rgb888) {
        let style = TextStyleBuilder::new()
            .alignment(Alignment::Left)
            .baseline(Baseline::Top)
            .build();
        self.draw_text(text, position, font, color, style);
    }

    /// Draw `text` centered on `center`.
    pub fn text_centered_at(
        &mut self,
        text: &str,
        center: Point,
        font: &MonoFont<'_>,
        color: Rgb888,
    ) {
        let style = TextStyleBuilder::new()
            .alignment(Alignment::Center)
            .baseline(Baseline::Middle)
            .build();
        self.draw_text(text, center, font, color, style);
    }

    /// Draw `text` horizontally centered on the canvas, vertically centered on `y`.
    pub fn text_centered(&mut self, text: &str, y: i32, font: &MonoFont<'_>, color: Rgb888) {
        let center = Point::new(self.width() as i32 / 2, y);
        self.text_centered_at(text, center, font, color);
    }

    /// Draw each line centered, starting at `start_y`; returns the y below the last line.
    pub fn lines_centered<S: AsRef<str>>(
        &mut self,
        lines: &[S],
        start_y: i32,
        font: &MonoFont<'_>,
        color: Rgb888,
        spacing: i32,
    ) -> i32 {
        let step = font.character_size.height as i32 + spacing;
        let mut y = start_y;
        for line in lines.iter().map(AsRef::as_ref).filter(|l| !l.trim().is_empty()) {
            self.text_centered(line.trim(), y, font, color);
            y += step;
        }
        y
    }

    /// Draw `text` magnified by an integer factor, centered on `center`.
    ///
    /// The built-in fonts top out at 10x20, which is unreadable from across a room on an
    /// 800x480 panel, so large figures are rendered small and scaled up with nearest-neighbour.
    pub fn text_scaled(
        &mut self,
        text: &str,
        center: Point,
        font: &MonoFont<'_>,
        scale: u32,
        color: Rgb888,
        background: Rgb888,
    ) {
        let chars = text.chars().count() as u32;
        if chars == 0 || scale == 0 {
            return;
        }

        let width = chars * font.character_size.width + (chars - 1) * font.character_spacing;
        let height = font.character_size.height;
        let mut small = Canvas::new(width, height, background);
        small.text(text, Point::zero(), font, color);

        let big = image::imageops::resize(
            small.image(),
            width * scale,
            height * scale,
            image::imageops::FilterType::Nearest,
        );
        let x = i64::from(center.x) - i64::from(big.width() / 2);
        let y = i64::from(center.y) - i64::from(big.height() / 2);
        image::imageops::replace(&mut self.image, &big, x, y);
    }

    fn draw_text(
        &mut self,
        text: &str,
        position: Point,
        font: &MonoFont<'_>,
        color: Rgb888,
        style: embedded_graphics::text::TextStyle,
    ) {
        let character_style = MonoTextStyle::new(font, color);
        infallible(Text::with_text_style(text, position, character_style, style).draw(self));
    }
}

fn infallible<T>(result: Result<T, Infallible>) -> T {
    match result {
        Ok(value) => value,
        Err(never) => match never {},
    }
}

/// Draw a primitive on a canvas; drawing into memory cannot fail.
pub(crate) fn draw<D>(drawable: &D, canvas: &mut Canvas)
where
    D: Drawable<Color = Rgb888>,
{
    infallible(drawable.draw(canvas));
}

impl OriginDimensions for Canvas {
    fn size(&self) -> Size {
        Size::new(self.image.width(), self.image.height())
    }
}

impl DrawTarget for Canvas {
    type Color = Rgb888;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        let (width, height) = self.image.dimensions();
        for Pixel(point, color) in pixels {
            let (Ok(x), Ok(y)) = (u32::try_from(point.x), u32::try_from(point.y)) else {
                continue;
            };
            if x < width && y < height {
                self.image.put_pixel(x, y, crate::color::to_pixel(color));
            }
        }
        Ok(())
    }
}

/// Greedy word wrap to at most `max_chars` characters per line.
///
/// Explicit newlines are kept; words longer than a line are split.
pub fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut lines = Vec::new();

    for paragraph in text.lines() {
        let mut line = String::new();
        let mut line_len = 0;

        for word in paragraph.split_whitespace() {
            let mut word: Vec<char> = word.chars().collect();

            while word.len() > max_chars {
                if line_len > 0 {
                    lines.push(std::mem::take(&mut line));
                    line_len = 0;
                }
                let rest = word.split_off(max_chars);
                lines.push(word.into_iter().collect());
                word = rest;
            }

            if line_len > 0 && line_len + 1 + word.len() > max_chars {
                lines.push(std::mem::take(&mut line));
                line_len = 0;
            }
            if line_len > 0 {
                line.push(' ');
                line_len += 1;
            }
            line_len += word.len();
            line.extend(word);
        }

        if line_len > 0 {
            lines.push(line);
        }
    }

    lines
}
