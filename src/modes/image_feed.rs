use std::time::Instant;

use super::DisplayTimer;
use super::Mode;
use super::ModeError;
use crate::cache::ImageCache;
use crate::compositor::FitSpec;
use crate::config::ImageFeedConfig;
use crate::display::Display;

const TUMBLR_DEFAULT_FEED: &str = "https://handsoffmydinosaur.tumblr.com/rss";
const DEVIANTART_FEED: &str = "https://backend.deviantart.com/rss.xml";

/// Size markers in thumbnail URLs.
const THUMBNAIL_MARKERS: [&str; 4] = ["s75x75", "s100x200", "s250x400", "/thumb"];

/// Extra markers of DeviantArt previews and placeholder images.
const DEVIANTART_MARKERS: [&str; 14] = [
    "150px", "200h", "350t", "400t", "50x50", "100x100", "150x150", "w_150", "h_150", "thumbnail",
    "placeholder", "noimage", "missing", "token=",
];

/// Which site a feed comes from; decides the default feed and the URL filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedKind {
    Tumblr,
    DeviantArt,
}

impl FeedKind {
    fn label(&self) -> &'static str {
        match self {
            FeedKind::Tumblr => "Tumblr",
            FeedKind::DeviantArt => "DeviantArt",
        }
    }

    /// The feed to read when the configuration does not name one.
    pub fn default_feed(&self, username: Option<&str>) -> Option<url::Url> {
        match self {
            FeedKind::Tumblr => url::Url::parse(TUMBLR_DEFAULT_FEED).ok(),
            FeedKind::DeviantArt => {
                let username = username?;
                url::Url::parse_with_params(DEVIANTART_FEED, &[("q", format!("gallery:{username}"))])
                    .ok()
            }
        }
    }

    /// Whether an image URL from this feed is worth showing.
    pub fn is_wanted(&self, url: &str) -> bool {
        let lower = url.to_lowercase();

        if THUMBNAIL_MARKERS.iter().any(|marker| url.contains(marker)) || lower.contains("avatar") {
            return false;
        }

        if *self == FeedKind::DeviantArt
            && DEVIANTART_MARKERS.iter().any(|marker| lower.contains(marker))
        {
            return false;
        }

        crate::feed::has_image_extension(url)
    }
}

/// Shows the images posted to an RSS feed, one per `display_time`.
pub struct ImageFeed {
    kind: FeedKind,
    config: ImageFeedConfig,
    feed_url: url::Url,
    client: reqwest::Client,
    cache: ImageCache,
    images: Vec<url::Url>,
    next: usize,
    last_fetch: Option<Instant>,
    timer: DisplayTimer,
}

impl ImageFeed {
    /// `None` if no feed URL is configured and none can be derived.
    pub fn new(
        kind: FeedKind,
        config: ImageFeedConfig,
        client: reqwest::Client,
        cache: ImageCache,
    ) -> Option<Self> {
        let feed_url = config
            .feed_url
            .clone()
            .or_else(|| kind.default_feed(config.username.as_deref()));
        let Some(feed_url) = feed_url else {
            tracing::warn!(feed = kind.label(), "No feed URL configured");
            return None;
        };

        Some(Self {
            kind,
            timer: DisplayTimer::new(config.display_time),
            config,
            feed_url,
            client,
            cache,
            images: Vec::new(),
            next: 0,
            last_fetch: None,
        })
    }

    fn needs_refresh(&self) -> bool {
        self.images.is_empty()
            || self
                .last_fetch
                .map_or(true, |last| last.elapsed() >= self.config.update_interval)
    }

    /// Re-read the feed. On failure the previous list is kept.
    async fn refresh(&mut self) {
        tracing::info!(feed = %self.feed_url, "Fetching image feed");
        self.last_fetch = Some(Instant::now());

        let channel = match crate::feed::fetch_channel(&self.client, &self.feed_url).await {
            Ok(channel) => channel,
            Err(error) => {
                tracing::error!(?error, kept = self.images.len(), "Failed to fetch image feed");
                return;
            }
        };

        let kind = self.kind;
        let images =
            crate::feed::image_urls(&channel, self.config.max_posts, |url| kind.is_wanted(url));
        tracing::info!(feed = %self.feed_url, count = images.len(), "Image feed updated");

        if !images.is_empty() {
            self.images = images;
            self.next = 0;
        }
    }

    async fn show_next(&mut self, display: &mut dyn Display) -> Result<(), ModeError> {
        let mut last_error = None;

        for _ in 0..self.images.len() {
            let url = self.images[self.next % self.images.len()].clone();
            self.next = (self.next + 1) % self.images.len();

            let image = match self.cache.load_or_fetch(&url).await {
                Ok(image) => image,
                Err(error) => {
                    tracing::warn!(?error, "Skipping feed image");
                    last_error = Some(error);
                    continue;
                }
            };

            let (width, height) = display.resolution();
            let spec = FitSpec {
                width,
                height,
                mode: self.config.fit,
                auto_rotate: self.config.auto_rotate,
                background: self.config.background_color.resolve(&image),
            };
            let frame = crate::compositor::fit_or_fill(&image, &spec)?;

            tracing::info!(%url, "Showing feed image");
            crate::display::present(display, &frame, Some(self.config.saturation))?;
            return Ok(());
        }

        match last_error {
            Some(error) => Err(error.into()),
            None => Ok(()),
        }
    }
}

impl Mode for ImageFeed {
    async fn update(&mut self, display: &mut dyn Display) -> Result<(), ModeError> {
        if !self.timer.is_due() {
            return Ok(());
        }
        self.timer.mark();

        if self.needs_refresh() {
            self.refresh().await;
        }

        if self.images.is_empty() {
            crate::screens::show_notice(
                display,
                "No Feed Images",
                &[
                    format!("{} feed: {}", self.kind.label(), self.feed_url),
                    "Check the feed address and connection".to_string(),
                ],
            )?;
            return Ok(());
        }

        self.show_next(display).await
    }

    fn on_enter(&mut self) {
        self.timer.reset();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;
    use std::time::Instant;

    use camino::Utf8PathBuf;
    use image::Rgb;
    use image::RgbImage;

    use super::*;
    use crate::display::testing::RecordingDisplay;

    #[test]
    fn test_tumblr_filter() {
        let kind = FeedKind::Tumblr;
        assert!(kind.is_wanted("https://64.media.tumblr.com/a/s1280x1920/one.jpg"));
        assert!(!kind.is_wanted("https://64.media.tumblr.com/a/s75x75/one.jpg"));
        assert!(!kind.is_wanted("https://64.media.tumblr.com/avatar_b_128.png"));
        assert!(!kind.is_wanted("https://example.tumblr.com/post/123"));
    }

    #[test]
    fn test_deviantart_filter() {
        let kind = FeedKind::DeviantArt;
        assert!(kind.is_wanted("https://images-wixmp.example.com/f/castle.jpg"));
        assert!(!kind.is_wanted("https://images-wixmp.example.com/f/castle_thumbnail.jpg"));
        assert!(!kind.is_wanted("https://images-wixmp.example.com/f/w_150,h_150/castle.jpg"));
        assert!(FeedKind::Tumblr.is_wanted("https://images-wixmp.example.com/f/w_150,h_150/castle.jpg"));
    }

    #[test]
    fn test_default_feeds() {
        assert_eq!(
            FeedKind::Tumblr.default_feed(None).unwrap().as_str(),
            TUMBLR_DEFAULT_FEED
        );
        assert!(FeedKind::DeviantArt.default_feed(None).is_none());
        assert_eq!(
            FeedKind::DeviantArt.default_feed(Some("someone")).unwrap().as_str(),
            "https://backend.deviantart.com/rss.xml?q=gallery%3Asomeone"
        );
    }

    #[test]
    fn test_deviantart_without_source_is_not_built() {
        let config = ImageFeedConfig::default();
        let cache = ImageCache::new("unused".into(), reqwest::Client::new());
        assert!(ImageFeed::new(FeedKind::DeviantArt, config, reqwest::Client::new(), cache).is_none());
    }

    #[tokio::test]
    async fn test_shows_cached_images_in_turn() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf()).unwrap();
        let client = reqwest::Client::new();
        let cache = ImageCache::new(dir, client.clone());

        let urls: Vec<url::Url> = ["http://127.0.0.1:9/red.jpg", "http://127.0.0.1:9/blue.jpg"]
            .iter()
            .map(|u| url::Url::parse(u).unwrap())
            .collect();
        cache.store(&urls[0], &RgbImage::from_pixel(80, 40, Rgb([255, 0, 0]))).await;
        cache.store(&urls[1], &RgbImage::from_pixel(80, 40, Rgb([0, 0, 255]))).await;

        let config = ImageFeedConfig {
            display_time: Duration::from_secs(3600),
            ..ImageFeedConfig::default()
        };
        let mut feed = ImageFeed::new(FeedKind::Tumblr, config, client, cache).unwrap();
        feed.images = urls;
        feed.last_fetch = Some(Instant::now());

        let mut display = RecordingDisplay::new(80, 40);
        feed.update(&mut display).await.unwrap();
        feed.update(&mut display).await.unwrap();
        feed.on_enter();
        feed.update(&mut display).await.unwrap();

        assert_eq!(display.shown.len(), 2);
        let center = |i: usize| display.shown[i].get_pixel(40, 20).0;
        assert!(center(0)[0] > 200 && center(0)[2] < 60, "{:?}", center(0));
        assert!(center(1)[2] > 200 && center(1)[0] < 60, "{:?}", center(1));
    }
}
