use camino::Utf8Path;
use camino::Utf8PathBuf;

use super::DisplayTimer;
use super::Mode;
use super::ModeError;
use crate::compositor::FitSpec;
use crate::config::PhotoCycleConfig;
use crate::display::Display;

/// Slideshow of the images in a local folder.
pub struct PhotoCycle {
    config: PhotoCycleConfig,
    photos: Vec<Utf8PathBuf>,
    next: usize,
    timer: DisplayTimer,
}

impl PhotoCycle {
    pub fn new(config: PhotoCycleConfig) -> Self {
        Self {
            timer: DisplayTimer::new(config.display_time),
            config,
            photos: Vec::new(),
            next: 0,
        }
    }

    async fn rescan(&mut self) -> Result<(), ModeError> {
        let mut photos = scan(&self.config.folder, &self.config.supported_formats).await?;
        if self.config.random_order {
            rand::seq::SliceRandom::shuffle(photos.as_mut_slice(), &mut rand::thread_rng());
        }

        tracing::info!(folder = %self.config.folder, count = photos.len(), "Scanned photos");
        self.photos = photos;
        self.next = 0;
        Ok(())
    }

    /// Load the next decodable photo, skipping broken files.
    fn next_photo(&mut self) -> Option<(Utf8PathBuf, image::RgbImage)> {
        while self.next < self.photos.len() {
            let path = self.photos[self.next].clone();
            self.next += 1;

            match image::open(&path) {
                Ok(decoded) => return Some((path, crate::compositor::flatten_alpha(&decoded))),
                Err(error) => tracing::warn!(%path, %error, "Skipping unreadable photo"),
            }
        }
        None
    }
}

impl Mode for PhotoCycle {
    async fn update(&mut self, display: &mut dyn Display) -> Result<(), ModeError> {
        if !self.timer.is_due() {
            return Ok(());
        }
        self.timer.mark();

        if self.next >= self.photos.len() {
            self.rescan().await?;
        }

        let Some((path, photo)) = self.next_photo() else {
            let formats = self.config.supported_formats.join(", ");
            crate::screens::show_notice(
                display,
                "No Photos Found",
                &[
                    format!("Folder: {}", self.config.folder),
                    format!("Formats: {formats}"),
                    "Add photos and they will appear on the next cycle".to_string(),
                ],
            )?;
            return Ok(());
        };

        let (width, height) = display.resolution();
        let spec = FitSpec {
            width,
            height,
            mode: self.config.fit,
            auto_rotate: self.config.auto_rotate,
            background: self.config.background_color.resolve(&photo),
        };
        let frame = crate::compositor::fit_or_fill(&photo, &spec)?;

        tracing::info!(%path, "Showing photo");
        crate::display::present(display, &frame, Some(self.config.saturation))?;
        Ok(())
    }

    fn on_enter(&mut self) {
        self.timer.reset();
    }
}

/// Files in `folder` with one of the `formats` extensions, sorted by path.
///
/// A missing folder yields no photos.
pub async fn scan(folder: &Utf8Path, formats: &[String]) -> Result<Vec<Utf8PathBuf>, ModeError> {
    let reading = |source| ModeError::ReadingFolder {
        path: folder.to_path_buf(),
        source,
    };

    let mut entries = match tokio::fs::read_dir(folder).await {
        Ok(entries) => entries,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!(%folder, "Photo folder does not exist");
            return Ok(Vec::new());
        }
        Err(error) => return Err(reading(error)),
    };

    let mut photos = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(reading)? {
        let Ok(path) = Utf8PathBuf::from_path_buf(entry.path()) else {
            tracing::debug!(path = ?entry.path(), "Skipping non UTF-8 path");
            continue;
        };

        let supported = path.extension().is_some_and(|ext| {
            formats
                .iter()
                .any(|format| format.trim_start_matches('.').eq_ignore_ascii_case(ext))
        });
        if supported && path.is_file() {
            photos.push(path);
        }
    }

    photos.sort();
    Ok(photos)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use camino::Utf8PathBuf;
    use image::Rgb;
    use image::RgbImage;

    use super::*;
    use crate::display::testing::RecordingDisplay;

    fn folder() -> (tempfile::TempDir, Utf8PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        (dir, path)
    }

    fn write_photo(path: &Utf8Path, color: [u8; 3]) {
        RgbImage::from_pixel(80, 40, Rgb(color)).save(path).unwrap();
    }

    fn config(folder: &Utf8Path) -> PhotoCycleConfig {
        PhotoCycleConfig {
            folder: folder.to_path_buf(),
            display_time: Duration::from_secs(3600),
            ..PhotoCycleConfig::default()
        }
    }

    #[tokio::test]
    async fn test_scan_filters_and_sorts() {
        let (_dir, folder) = folder();
        write_photo(&folder.join("b.png"), [0, 0, 0]);
        write_photo(&folder.join("a.PNG"), [0, 0, 0]);
        std::fs::write(folder.join("notes.txt"), "hello").unwrap();
        std::fs::create_dir(folder.join("nested.png")).unwrap();

        let formats = vec!["png".to_string(), "jpg".to_string()];
        let photos = scan(&folder, &formats).await.unwrap();
        let names: Vec<&str> = photos.iter().filter_map(|p| p.file_name()).collect();
        assert_eq!(names, vec!["a.PNG", "b.png"]);
    }

    #[tokio::test]
    async fn test_scan_missing_folder() {
        let (_dir, folder) = folder();
        let photos = scan(&folder.join("missing"), &["png".to_string()]).await.unwrap();
        assert!(photos.is_empty());
    }

    #[tokio::test]
    async fn test_cycles_in_order_and_waits() {
        let (_dir, folder) = folder();
        write_photo(&folder.join("1.png"), [255, 0, 0]);
        write_photo(&folder.join("2.png"), [0, 0, 255]);

        let mut mode = PhotoCycle::new(config(&folder));
        let mut display = RecordingDisplay::new(80, 40);

        mode.update(&mut display).await.unwrap();
        assert_eq!(display.shown.len(), 1);
        assert_eq!(display.shown[0].get_pixel(40, 20), &Rgb([255, 0, 0]));

        // display_time has not passed
        mode.update(&mut display).await.unwrap();
        assert_eq!(display.shown.len(), 1);

        mode.on_enter();
        mode.update(&mut display).await.unwrap();
        assert_eq!(display.shown.len(), 2);
        assert_eq!(display.shown[1].get_pixel(40, 20), &Rgb([0, 0, 255]));
        assert_eq!(display.shown[1].dimensions(), (80, 40));

        // Wraps around after a rescan
        mode.on_enter();
        mode.update(&mut display).await.unwrap();
        assert_eq!(display.shown[2].get_pixel(40, 20), &Rgb([255, 0, 0]));
    }

    #[tokio::test]
    async fn test_unreadable_photo_is_skipped() {
        let (_dir, folder) = folder();
        std::fs::write(folder.join("0.jpg"), b"not really a jpeg").unwrap();
        write_photo(&folder.join("1.png"), [0, 255, 0]);

        let mut mode = PhotoCycle::new(config(&folder));
        let mut display = RecordingDisplay::new(80, 40);
        mode.update(&mut display).await.unwrap();

        assert_eq!(display.shown.len(), 1);
        assert_eq!(display.shown[0].get_pixel(40, 20), &Rgb([0, 255, 0]));
    }

    #[tokio::test]
    async fn test_empty_folder_shows_notice() {
        let (_dir, folder) = folder();
        let mut mode = PhotoCycle::new(config(&folder));
        let mut display = RecordingDisplay::new(800, 480);

        mode.update(&mut display).await.unwrap();
        assert_eq!(display.shown.len(), 1);
        assert!(display.shown[0].pixels().any(|p| p == &Rgb([0, 0, 255])));
    }
}
