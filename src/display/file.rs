use camino::Utf8PathBuf;
use image::RgbImage;

use super::palette::Palette;
use super::Display;
use super::DisplayError;

/// Quantises frames to the panel palette and writes them out as PNG.
///
/// If a refresh command is configured it is run after every write with the
/// frame path appended, which is how the frame reaches the physical panel.
#[derive(Debug)]
pub struct PaletteDisplay {
    width: u32,
    height: u32,
    output: Utf8PathBuf,
    refresh_command: Vec<String>,
    dither: bool,
    default_saturation: f32,
    frame: Option<RgbImage>,
}

impl PaletteDisplay {
    pub fn new(config: &crate::config::DisplayConfig) -> Self {
        let [width, height] = config.resolution;
        Self {
            width,
            height,
            output: config.output.clone(),
            refresh_command: config.refresh_command.clone(),
            dither: config.dither,
            default_saturation: config.saturation,
            frame: None,
        }
    }

    /// Same panel settings, but frames go to `output` and no refresh command runs.
    pub fn to_file(config: &crate::config::DisplayConfig, output: Utf8PathBuf) -> Self {
        Self {
            output,
            refresh_command: Vec::new(),
            ..Self::new(config)
        }
    }

    fn write_frame(&self, frame: &RgbImage) -> Result<(), DisplayError> {
        if let Some(parent) = self.output.parent().filter(|p| !p.as_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| DisplayError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let file_name = self.output.file_name().unwrap_or("frame.png");
        let staging = self.output.with_file_name(format!(".{file_name}.tmp.png"));

        frame
            .save_with_format(&staging, image::ImageFormat::Png)
            .map_err(|source| DisplayError::Encode {
                path: staging.clone(),
                source,
            })?;

        std::fs::rename(&staging, &self.output).map_err(|source| DisplayError::Rename {
            path: self.output.clone(),
            source,
        })
    }

    fn run_refresh(&self) -> Result<(), DisplayError> {
        let Some((program, args)) = self.refresh_command.split_first() else {
            return Ok(());
        };

        let command = self.refresh_command.join(" ");
        tracing::debug!(%command, output = %self.output, "Running refresh command");

        let status = std::process::Command::new(program)
            .args(args)
            .arg(self.output.as_str())
            .status()
            .map_err(|source| DisplayError::Spawn {
                command: command.clone(),
                source,
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(DisplayError::RefreshFailed { command, status })
        }
    }
}

impl Display for PaletteDisplay {
    fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn set_image(&mut self, image: &RgbImage, saturation: Option<f32>) -> Result<(), DisplayError> {
        let (actual_w, actual_h) = image.dimensions();
        if (actual_w, actual_h) != (self.width, self.height) {
            return Err(DisplayError::Resolution {
                expected_w: self.width,
                expected_h: self.height,
                actual_w,
                actual_h,
            });
        }

        let palette = Palette::with_saturation(saturation.unwrap_or(self.default_saturation));
        self.frame = Some(super::palette::quantize(image, &palette, self.dither));
        Ok(())
    }

    fn show(&mut self) -> Result<(), DisplayError> {
        let frame = self.frame.take().ok_or(DisplayError::NoFrame)?;
        let started = std::time::Instant::now();

        self.write_frame(&frame)?;
        self.run_refresh()?;

        tracing::info!(output = %self.output, elapsed = ?started.elapsed(), "Frame shown");
        Ok(())
    }
}
