use image::RgbImage;

mod file;
pub mod palette;

pub use self::file::PaletteDisplay;

/// Sink for composed frames.
///
/// `show()` blocks until the panel refresh has completed or failed.
pub trait Display {
    fn resolution(&self) -> (u32, u32);

    fn set_image(&mut self, image: &RgbImage, saturation: Option<f32>) -> Result<(), DisplayError>;

    fn show(&mut self) -> Result<(), DisplayError>;
}

/// Stage and show a frame in one go.
pub fn present(
    display: &mut dyn Display,
    image: &RgbImage,
    saturation: Option<f32>,
) -> Result<(), DisplayError> {
    display.set_image(image, saturation)?;
    display.show()
}

#[derive(Debug, thiserror::Error)]
pub enum DisplayError {
    #[error("Frame is {actual_w}x{actual_h}, panel is {expected_w}x{expected_h}")]
    Resolution {
        expected_w: u32,
        expected_h: u32,
        actual_w: u32,
        actual_h: u32,
    },

    #[error("No frame staged")]
    NoFrame,

    #[error("Failed to create output directory '{}'", .path)]
    CreateDir {
        path: camino::Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write frame to '{}'", .path)]
    Encode {
        path: camino::Utf8PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Failed to move frame into place at '{}'", .path)]
    Rename {
        path: camino::Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to run refresh command '{command}'")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Refresh command '{command}' failed with {status}")]
    RefreshFailed {
        command: String,
        status: std::process::ExitStatus,
    },
}
