use embedded_graphics::pixelcolor::Rgb888;
use image::Rgb;

pub(crate) const BLACK: Rgb888 = Rgb888::new(0, 0, 0);

pub(crate) const WHITE: Rgb888 = Rgb888::new(255, 255, 255);

pub(crate) const RED: Rgb888 = Rgb888::new(255, 0, 0);

pub(crate) const BLUE: Rgb888 = Rgb888::new(0, 0, 255);

pub(crate) const YELLOW: Rgb888 = Rgb888::new(255, 255, 0);

#[inline]
pub fn to_pixel(color: Rgb888) -> Rgb<u8> {
    use embedded_graphics::pixelcolor::RgbColor;

    Rgb([color.r(), color.g(), color.b()])
}

/// Background used behind images that do not cover the whole panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(untagged)]
pub enum BackgroundColor {
    Rgb([u8; 3]),
    Named(NamedColor),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NamedColor {
    White,
    Black,
    Gray,
    LightGray,
    DarkGray,

    /// Average of the four corner pixels of the source image
    Auto,
}

impl Default for BackgroundColor {
    fn default() -> Self {
        BackgroundColor::Named(NamedColor::White)
    }
}

impl BackgroundColor {
    /// Resolve to a concrete color, sampling `source` when set to `auto`.
    pub fn resolve(&self, source: &image::RgbImage) -> Rgb<u8> {
        match self {
            BackgroundColor::Rgb(rgb) => Rgb(*rgb),
            BackgroundColor::Named(NamedColor::White) => Rgb([255, 255, 255]),
            BackgroundColor::Named(NamedColor::Black) => Rgb([0, 0, 0]),
            BackgroundColor::Named(NamedColor::Gray) => Rgb([128, 128, 128]),
            BackgroundColor::Named(NamedColor::LightGray) => Rgb([192, 192, 192]),
            BackgroundColor::Named(NamedColor::DarkGray) => Rgb([64, 64, 64]),
            BackgroundColor::Named(NamedColor::Auto) => crate::compositor::corner_average(source)
                .unwrap_or(Rgb([255, 255, 255])),
        }
    }
}
