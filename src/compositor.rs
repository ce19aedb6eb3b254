//! Aspect-preserving placement of arbitrary images on a fixed-size canvas.

use image::imageops::FilterType;
use image::DynamicImage;
use image::Rgb;
use image::RgbImage;

/// Slack for float error when truncating `src * scale`, so that the axis
/// that determines the scale lands exactly on the target size.
const TRUNCATION_EPSILON: f64 = 1e-9;

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, serde::Deserialize, serde::Serialize,
)]
#[serde(rename_all = "snake_case")]
pub enum FitMode {
    /// Whole source visible, background padding on one axis
    #[default]
    Fit,

    /// Whole target covered, source cropped on one axis
    Fill,
}

#[derive(Debug, Clone, Copy)]
pub struct FitSpec {
    pub width: u32,
    pub height: u32,
    pub mode: FitMode,
    pub auto_rotate: bool,
    pub background: Rgb<u8>,
}

/// Where the scaled source ends up on the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub width: u32,
    pub height: u32,
    pub x: i64,
    pub y: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum CompositorError {
    #[error("Source image has no pixels ({width}x{height})")]
    EmptySource { width: u32, height: u32 },

    #[error("Target size must be positive, got {width}x{height}")]
    EmptyTarget { width: u32, height: u32 },
}

fn fit_ratio(src_w: u32, src_h: u32, target_w: u32, target_h: u32) -> f64 {
    let scale_w = f64::from(target_w) / f64::from(src_w);
    let scale_h = f64::from(target_h) / f64::from(src_h);
    scale_w.min(scale_h)
}

/// Whether turning the source by 90 degrees lets it be drawn strictly larger.
pub fn should_rotate(src_w: u32, src_h: u32, target_w: u32, target_h: u32) -> bool {
    let current = fit_ratio(src_w, src_h, target_w, target_h);
    let rotated = fit_ratio(src_h, src_w, target_w, target_h);
    rotated > current
}

/// Scaled size and paste offset for an already oriented source.
pub fn placement(src_w: u32, src_h: u32, target_w: u32, target_h: u32, mode: FitMode) -> Placement {
    let scale_w = f64::from(target_w) / f64::from(src_w);
    let scale_h = f64::from(target_h) / f64::from(src_h);
    let scale = match mode {
        FitMode::Fit => scale_w.min(scale_h),
        FitMode::Fill => scale_w.max(scale_h),
    };

    let width = (f64::from(src_w) * scale + TRUNCATION_EPSILON) as u32;
    let height = (f64::from(src_h) * scale + TRUNCATION_EPSILON) as u32;

    Placement {
        width,
        height,
        x: (i64::from(target_w) - i64::from(width)).div_euclid(2),
        y: (i64::from(target_h) - i64::from(height)).div_euclid(2),
    }
}

/// Scale `source` into a new canvas of exactly `spec.width` x `spec.height`.
pub fn fit_or_fill(source: &RgbImage, spec: &FitSpec) -> Result<RgbImage, CompositorError> {
    let (src_w, src_h) = source.dimensions();
    if src_w == 0 || src_h == 0 {
        return Err(CompositorError::EmptySource {
            width: src_w,
            height: src_h,
        });
    }
    if spec.width == 0 || spec.height == 0 {
        return Err(CompositorError::EmptyTarget {
            width: spec.width,
            height: spec.height,
        });
    }

    let rotated;
    let oriented = if spec.auto_rotate && should_rotate(src_w, src_h, spec.width, spec.height) {
        tracing::debug!(src_w, src_h, "Rotating image for a better fit");
        rotated = image::imageops::rotate270(source);
        &rotated
    } else {
        source
    };

    let (src_w, src_h) = oriented.dimensions();
    let place = placement(src_w, src_h, spec.width, spec.height, spec.mode);
    tracing::trace!(?place, mode = ?spec.mode, "Computed placement");

    let scaled = if (place.width, place.height) == (src_w, src_h) {
        oriented.clone()
    } else if place.width == 0 || place.height == 0 {
        RgbImage::new(place.width, place.height)
    } else {
        image::imageops::resize(oriented, place.width, place.height, FilterType::Lanczos3)
    };

    let mut canvas = RgbImage::from_pixel(spec.width, spec.height, spec.background);
    image::imageops::replace(&mut canvas, &scaled, place.x, place.y);
    Ok(canvas)
}

/// Average of the four corner pixels, `None` for an empty image.
pub fn corner_average(image: &RgbImage) -> Option<Rgb<u8>> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return None;
    }

    let corners = [
        image.get_pixel(0, 0),
        image.get_pixel(width - 1, 0),
        image.get_pixel(0, height - 1),
        image.get_pixel(width - 1, height - 1),
    ];

    let mut sum = [0u32; 3];
    for corner in corners {
        for (acc, channel) in sum.iter_mut().zip(corner.0) {
            *acc += u32::from(channel);
        }
    }

    Some(Rgb(sum.map(|channel| (channel / 4) as u8)))
}

/// Convert to RGB, compositing any transparency onto white.
pub fn flatten_alpha(image: &DynamicImage) -> RgbImage {
    if !image.color().has_alpha() {
        return image.to_rgb8();
    }

    let rgba = image.to_rgba8();
    let mut out = RgbImage::new(rgba.width(), rgba.height());
    for (x, y, pixel) in rgba.enumerate_pixels() {
        let [r, g, b, a] = pixel.0;
        let alpha = u32::from(a);
        let blend = |c: u8| ((u32::from(c) * alpha + 255 * (255 - alpha)) / 255) as u8;
        out.put_pixel(x, y, Rgb([blend(r), blend(g), blend(b)]));
    }
    out
}
