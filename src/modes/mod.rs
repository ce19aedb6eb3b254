use std::collections::BTreeMap;
use std::time::Duration;
use std::time::Instant;

use crate::display::Display;

pub mod image_feed;
pub mod news_feed;
pub mod photo_cycle;
pub mod weather;

/// Identifier of a selectable mode, as used in the configuration.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    serde::Deserialize,
    serde::Serialize,
    clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum ModeName {
    PhotoCycle,
    TumblrRss,
    DeviantartRss,
    NewsFeed,
    Weather,
}

impl ModeName {
    pub const ALL: [ModeName; 5] = [
        ModeName::PhotoCycle,
        ModeName::TumblrRss,
        ModeName::DeviantartRss,
        ModeName::NewsFeed,
        ModeName::Weather,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModeName::PhotoCycle => "photo_cycle",
            ModeName::TumblrRss => "tumblr_rss",
            ModeName::DeviantartRss => "deviantart_rss",
            ModeName::NewsFeed => "news_feed",
            ModeName::Weather => "weather",
        }
    }

    /// How often the LED blinks to acknowledge switching to this mode.
    pub fn flash_count(&self) -> u8 {
        match self {
            ModeName::PhotoCycle => 1,
            ModeName::TumblrRss => 2,
            ModeName::NewsFeed => 3,
            ModeName::Weather => 4,
            ModeName::DeviantartRss => 5,
        }
    }
}

impl std::fmt::Display for ModeName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown mode '{0}'")]
pub struct UnknownMode(pub String);

impl std::str::FromStr for ModeName {
    type Err = UnknownMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ModeName::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| UnknownMode(s.to_string()))
    }
}

/// A display routine driven by the scheduler.
///
/// `update()` is called on every tick while the mode is current. Implementations
/// decide from their own timers whether anything needs fetching or drawing, so
/// most calls return without touching the display.
pub trait Mode {
    async fn update(&mut self, display: &mut dyn Display) -> Result<(), ModeError>;

    /// Called once when the mode becomes current.
    fn on_enter(&mut self) {}
}

#[derive(Debug, thiserror::Error)]
pub enum ModeError {
    #[error(transparent)]
    Display(#[from] crate::display::DisplayError),

    #[error(transparent)]
    Compositor(#[from] crate::compositor::CompositorError),

    #[error(transparent)]
    Cache(#[from] crate::cache::CacheError),

    #[error(transparent)]
    Weather(#[from] self::weather::WeatherError),

    #[error("Failed to read photo folder '{}'", .path)]
    ReadingFolder {
        path: camino::Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Tracks when a mode last drew, so it only redraws every `interval`.
#[derive(Debug, Clone)]
pub struct DisplayTimer {
    interval: Duration,
    last_shown: Option<Instant>,
}

impl DisplayTimer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_shown: None,
        }
    }

    pub fn is_due(&self) -> bool {
        self.last_shown
            .map_or(true, |last| last.elapsed() >= self.interval)
    }

    /// Stamp the start of a draw attempt. A failed attempt also waits a full interval.
    pub fn mark(&mut self) {
        self.last_shown = Some(Instant::now());
    }

    pub fn reset(&mut self) {
        self.last_shown = None;
    }
}

/// The concrete modes, so the registry can hold them side by side.
pub enum AnyMode {
    PhotoCycle(self::photo_cycle::PhotoCycle),
    ImageFeed(self::image_feed::ImageFeed),
    NewsFeed(self::news_feed::NewsFeed),
    Weather(self::weather::Weather),
}

impl Mode for AnyMode {
    async fn update(&mut self, display: &mut dyn Display) -> Result<(), ModeError> {
        match self {
            AnyMode::PhotoCycle(mode) => mode.update(display).await,
            AnyMode::ImageFeed(mode) => mode.update(display).await,
            AnyMode::NewsFeed(mode) => mode.update(display).await,
            AnyMode::Weather(mode) => mode.update(display).await,
        }
    }

    fn on_enter(&mut self) {
        match self {
            AnyMode::PhotoCycle(mode) => mode.on_enter(),
            AnyMode::ImageFeed(mode) => mode.on_enter(),
            AnyMode::NewsFeed(mode) => mode.on_enter(),
            AnyMode::Weather(mode) => mode.on_enter(),
        }
    }
}

/// Build one mode from its configuration section, or `None` when it is disabled.
pub fn build(
    name: ModeName,
    config: &crate::config::Config,
    client: &reqwest::Client,
) -> Option<AnyMode> {
    if !config.is_enabled(name) {
        return None;
    }

    let cache = crate::cache::ImageCache::new(config.cache_dir.clone(), client.clone());
    let mode = match name {
        ModeName::PhotoCycle => AnyMode::PhotoCycle(self::photo_cycle::PhotoCycle::new(
            config.photo_cycle.clone(),
        )),
        ModeName::TumblrRss => AnyMode::ImageFeed(self::image_feed::ImageFeed::new(
            self::image_feed::FeedKind::Tumblr,
            config.tumblr_rss.clone(),
            client.clone(),
            cache,
        )?),
        ModeName::DeviantartRss => AnyMode::ImageFeed(self::image_feed::ImageFeed::new(
            self::image_feed::FeedKind::DeviantArt,
            config.deviantart_rss.clone(),
            client.clone(),
            cache,
        )?),
        ModeName::NewsFeed => AnyMode::NewsFeed(self::news_feed::NewsFeed::new(
            config.news_feed.clone(),
            client.clone(),
        )),
        ModeName::Weather => AnyMode::Weather(self::weather::Weather::new(
            config.weather.clone(),
            config.cache_dir.join("weather_data.json"),
            client.clone(),
        )),
    };

    Some(mode)
}

/// Every enabled mode, keyed by name.
pub fn build_all(
    config: &crate::config::Config,
    client: &reqwest::Client,
) -> BTreeMap<ModeName, AnyMode> {
    ModeName::ALL
        .into_iter()
        .filter_map(|name| {
            let mode = build(name, config, client);
            if mode.is_none() {
                tracing::debug!(mode = %name, "Mode disabled");
            }
            mode.map(|mode| (name, mode))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_name_roundtrip() {
        for name in ModeName::ALL {
            assert_eq!(name.as_str().parse::<ModeName>().unwrap(), name);
        }
    }

    #[test]
    fn test_unknown_mode_name() {
        let err = "solar_monitor".parse::<ModeName>().unwrap_err();
        assert_eq!(err.to_string(), "Unknown mode 'solar_monitor'");
    }

    #[test]
    fn test_flash_counts_are_distinct() {
        let mut counts: Vec<u8> = ModeName::ALL.iter().map(ModeName::flash_count).collect();
        counts.sort_unstable();
        counts.dedup();
        assert_eq!(counts.len(), ModeName::ALL.len());
    }

    #[test]
    fn test_display_timer() {
        let mut timer = DisplayTimer::new(Duration::from_secs(3600));
        assert!(timer.is_due());

        timer.mark();
        assert!(!timer.is_due());

        timer.reset();
        assert!(timer.is_due());
    }

    #[test]
    fn test_build_all_skips_disabled() {
        let config = crate::config::Config::default();
        let modes = build_all(&config, &reqwest::Client::new());

        assert!(modes.contains_key(&ModeName::PhotoCycle));
        assert!(modes.contains_key(&ModeName::Weather));
        assert!(!modes.contains_key(&ModeName::DeviantartRss));
    }
}
