use camino::Utf8Path;
use camino::Utf8PathBuf;
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;

const JPEG_QUALITY: u8 = 85;

/// On-disk cache of downloaded feed images, stored as JPEG under a CRC32 of the URL.
#[derive(Debug, Clone)]
pub struct ImageCache {
    dir: Utf8PathBuf,
    client: reqwest::Client,
}

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Failed to download '{url}'")]
    Download {
        url: url::Url,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to decode image from '{url}'")]
    Decode {
        url: url::Url,
        #[source]
        source: image::ImageError,
    },
}

pub fn key(url: &url::Url) -> String {
    format!("{:08x}", crc32fast::hash(url.as_str().as_bytes()))
}

impl ImageCache {
    pub fn new(dir: Utf8PathBuf, client: reqwest::Client) -> Self {
        Self { dir, client }
    }

    pub fn path_for(&self, url: &url::Url) -> Utf8PathBuf {
        self.dir.join(format!("{}.jpg", key(url)))
    }

    /// Return the cached image for `url`, downloading and caching it if needed.
    pub async fn load_or_fetch(&self, url: &url::Url) -> Result<RgbImage, CacheError> {
        let path = self.path_for(url);

        if let Some(image) = read_cached(&path).await {
            tracing::debug!(%url, %path, "Image cache hit");
            return Ok(image);
        }

        tracing::debug!(%url, "Downloading image");
        let download = |source| CacheError::Download {
            url: url.clone(),
            source,
        };
        let bytes = self
            .client
            .get(url.clone())
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(download)?
            .bytes()
            .await
            .map_err(download)?;

        let image = image::load_from_memory(&bytes)
            .map(|decoded| crate::compositor::flatten_alpha(&decoded))
            .map_err(|source| CacheError::Decode {
                url: url.clone(),
                source,
            })?;

        self.store(url, &image).await;
        Ok(image)
    }

    /// Write `image` as the cache entry for `url`. Failures are logged only.
    pub async fn store(&self, url: &url::Url, image: &RgbImage) {
        let path = self.path_for(url);
        if let Err(error) = write_cached(&path, image).await {
            tracing::warn!(%path, %error, "Failed to cache image");
        }
    }
}

async fn read_cached(path: &Utf8Path) -> Option<RgbImage> {
    let bytes = tokio::fs::read(path).await.ok()?;
    match image::load_from_memory(&bytes) {
        Ok(image) => Some(image.to_rgb8()),
        Err(error) => {
            tracing::warn!(%path, %error, "Ignoring unreadable cache entry");
            None
        }
    }
}

async fn write_cached(path: &Utf8Path, image: &RgbImage) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut encoded = Vec::new();
    image.write_with_encoder(JpegEncoder::new_with_quality(&mut encoded, JPEG_QUALITY))?;
    tokio::fs::write(path, encoded).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use camino::Utf8PathBuf;
    use image::Rgb;
    use image::RgbImage;

    use super::*;

    fn url(s: &str) -> url::Url {
        url::Url::parse(s).unwrap()
    }

    #[test]
    fn test_key_is_stable_and_distinct() {
        let a = key(&url("https://64.media.tumblr.com/abc/s1280x1920/one.jpg"));
        let b = key(&url("https://64.media.tumblr.com/abc/s1280x1920/two.jpg"));

        assert_eq!(a.len(), 8);
        assert_eq!(a, key(&url("https://64.media.tumblr.com/abc/s1280x1920/one.jpg")));
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_cache_hit_skips_network() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf()).unwrap();
        let cache = ImageCache::new(dir, reqwest::Client::new());

        // Nothing listens on this port, so a download attempt would fail.
        let target = url("http://127.0.0.1:9/image.jpg");
        let image = RgbImage::from_pixel(16, 8, Rgb([200, 200, 200]));
        cache.store(&target, &image).await;

        let loaded = cache.load_or_fetch(&target).await.unwrap();
        assert_eq!(loaded.dimensions(), (16, 8));
    }

    #[tokio::test]
    async fn test_unreadable_entry_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().join("broken.jpg")).unwrap();
        tokio::fs::write(&path, b"not a jpeg").await.unwrap();

        assert!(read_cached(&path).await.is_none());
    }
}
