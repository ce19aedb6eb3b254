use std::collections::BTreeMap;
use std::time::Duration;

use camino::Utf8Path;
use camino::Utf8PathBuf;

use crate::color::BackgroundColor;
use crate::color::NamedColor;
use crate::compositor::FitMode;
use crate::modes::ModeName;

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub display: DisplayConfig,
    pub gpio: GpioConfig,

    /// Which mode each button selects
    pub buttons: BTreeMap<ButtonId, String>,

    pub scheduler: SchedulerConfig,
    pub http: HttpConfig,
    pub cache_dir: Utf8PathBuf,

    pub photo_cycle: PhotoCycleConfig,
    pub tumblr_rss: ImageFeedConfig,
    pub deviantart_rss: ImageFeedConfig,
    pub news_feed: NewsFeedConfig,
    pub weather: WeatherConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            display: DisplayConfig::default(),
            gpio: GpioConfig::default(),
            buttons: BTreeMap::from([
                (ButtonId::A, ModeName::PhotoCycle.to_string()),
                (ButtonId::B, ModeName::TumblrRss.to_string()),
                (ButtonId::C, ModeName::NewsFeed.to_string()),
                (ButtonId::D, ModeName::Weather.to_string()),
            ]),
            scheduler: SchedulerConfig::default(),
            http: HttpConfig::default(),
            cache_dir: Utf8PathBuf::from("data/cache"),
            photo_cycle: PhotoCycleConfig::default(),
            tumblr_rss: ImageFeedConfig::default(),
            deviantart_rss: ImageFeedConfig {
                enabled: false,
                ..ImageFeedConfig::default()
            },
            news_feed: NewsFeedConfig::default(),
            weather: WeatherConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct DisplayConfig {
    /// Panel size in pixels, `[width, height]`
    pub resolution: [u32; 2],

    /// Where the quantised frame is written
    pub output: Utf8PathBuf,

    /// Program (and arguments) that pushes the written frame to the panel
    pub refresh_command: Vec<String>,

    pub dither: bool,

    /// Used when a mode does not pass its own saturation
    pub saturation: f32,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            resolution: [800, 480],
            output: Utf8PathBuf::from("data/frame.png"),
            refresh_command: Vec::new(),
            dither: true,
            saturation: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Deserialize, serde::Serialize)]
#[serde(try_from = "String", into = "String")]
pub enum ButtonId {
    A,
    B,
    C,
    D,
}

impl std::fmt::Display for ButtonId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ButtonId::A => "A",
            ButtonId::B => "B",
            ButtonId::C => "C",
            ButtonId::D => "D",
        };
        f.write_str(label)
    }
}

impl TryFrom<String> for ButtonId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "A" => Ok(ButtonId::A),
            "B" => Ok(ButtonId::B),
            "C" => Ok(ButtonId::C),
            "D" => Ok(ButtonId::D),
            other => Err(format!("unknown button '{other}', expected one of A, B, C, D")),
        }
    }
}

impl From<ButtonId> for String {
    fn from(value: ButtonId) -> Self {
        value.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct GpioConfig {
    pub chip: Utf8PathBuf,

    /// Line offset of each button
    pub lines: BTreeMap<ButtonId, u32>,

    /// Line offset of the feedback LED
    pub led: Option<u32>,

    /// Presses closer together than this are dropped
    #[serde(with = "humantime_serde")]
    pub debounce: Duration,

    /// How long the LED lights up on a press
    #[serde(with = "humantime_serde")]
    pub press_flash: Duration,
}

impl Default for GpioConfig {
    fn default() -> Self {
        Self {
            chip: Utf8PathBuf::from("/dev/gpiochip0"),
            lines: BTreeMap::from([
                (ButtonId::A, 5),
                (ButtonId::B, 6),
                (ButtonId::C, 16),
                (ButtonId::D, 24),
            ]),
            led: Some(13),
            debounce: Duration::from_millis(500),
            press_flash: Duration::from_millis(300),
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchedulerConfig {
    #[serde(with = "humantime_serde")]
    pub tick_interval: Duration,

    pub initial_mode: ModeName,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(100),
            initial_mode: ModeName::PhotoCycle,
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct HttpConfig {
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,

    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PhotoCycleConfig {
    pub enabled: bool,
    pub folder: Utf8PathBuf,

    #[serde(with = "humantime_serde")]
    pub display_time: Duration,

    pub random_order: bool,

    /// File extensions, matched case-insensitively
    pub supported_formats: Vec<String>,

    pub background_color: BackgroundColor,
    pub saturation: f32,
    pub fit: FitMode,
    pub auto_rotate: bool,
}

impl Default for PhotoCycleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            folder: Utf8PathBuf::from("data/photos"),
            display_time: Duration::from_secs(10 * 60),
            random_order: false,
            supported_formats: ["jpg", "jpeg", "png", "webp"]
                .map(String::from)
                .to_vec(),
            background_color: BackgroundColor::default(),
            saturation: 0.5,
            fit: FitMode::Fit,
            auto_rotate: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImageFeedConfig {
    pub enabled: bool,

    /// RSS document to read; falls back to the mode's built-in feed
    pub feed_url: Option<url::Url>,

    /// DeviantArt user whose gallery feed is shown when no `feed_url` is set
    pub username: Option<String>,

    #[serde(with = "humantime_serde")]
    pub display_time: Duration,

    /// How long a fetched post list is reused
    #[serde(with = "humantime_serde")]
    pub update_interval: Duration,

    pub max_posts: usize,
    pub background_color: BackgroundColor,
    pub saturation: f32,
    pub fit: FitMode,
    pub auto_rotate: bool,
}

impl Default for ImageFeedConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            feed_url: None,
            username: None,
            display_time: Duration::from_secs(5 * 60),
            update_interval: Duration::from_secs(24 * 60 * 60),
            max_posts: 300,
            background_color: BackgroundColor::Named(NamedColor::Auto),
            saturation: 1.0,
            fit: FitMode::Fit,
            auto_rotate: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct NewsFeedConfig {
    pub enabled: bool,
    pub feeds: Vec<url::Url>,

    /// Only show articles mentioning one of these; empty shows everything
    pub search_terms: Vec<String>,

    pub max_articles: usize,

    #[serde(with = "humantime_serde")]
    pub display_time: Duration,

    #[serde(with = "humantime_serde")]
    pub update_interval: Duration,

    pub saturation: f32,
}

impl Default for NewsFeedConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            feeds: ["https://rss.arxiv.org/rss/cs.LG"]
                .iter()
                .filter_map(|u| url::Url::parse(u).ok())
                .collect(),
            search_terms: Vec::new(),
            max_articles: 5,
            display_time: Duration::from_secs(30 * 60),
            update_interval: Duration::from_secs(6 * 60 * 60),
            saturation: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Units {
    #[default]
    Metric,
    Imperial,
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct WeatherConfig {
    pub enabled: bool,
    pub latitude: f64,
    pub longitude: f64,

    /// Shown in the header; formatted coordinates when unset
    pub location_name: Option<String>,

    pub units: Units,

    #[serde(with = "humantime_serde")]
    pub display_time: Duration,

    /// Cached forecasts younger than this are used without asking the API
    #[serde(with = "humantime_serde")]
    pub cache_duration: Duration,

    pub api_url: url::Url,
    pub saturation: f32,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            latitude: 51.5074,
            longitude: -0.1278,
            location_name: None,
            units: Units::Metric,
            display_time: Duration::from_secs(5 * 60),
            cache_duration: Duration::from_secs(60 * 60),
            api_url: crate::modes::weather::default_api_url(),
            saturation: 0.5,
        }
    }
}

impl Config {
    /// Read the configuration, writing the defaults to `path` first if it does not exist.
    pub async fn load(path: &Utf8Path) -> Result<Self, ConfigError> {
        let config_str = match tokio::fs::read_to_string(path).await {
            Ok(s) => s,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(%path, "No configuration found, writing defaults");
                let config = Config::default();
                config.write_to(path).await?;
                return Ok(config);
            }
            Err(source) => {
                return Err(ConfigError::ReadingFile {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        serde_json::from_str(&config_str).map_err(|source| ConfigError::ParsingConfig {
            path: path.to_path_buf(),
            source,
        })
    }

    async fn write_to(&self, path: &Utf8Path) -> Result<(), ConfigError> {
        let writing = |source| ConfigError::WritingFile {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(writing)?;
        }

        let json = serde_json::to_string_pretty(self).map_err(ConfigError::Serializing)?;
        tokio::fs::write(path, json).await.map_err(writing)
    }

    /// Check the values serde cannot, returning non-fatal warnings.
    pub fn validate(&self) -> Result<Vec<String>, ConfigError> {
        let mut problems = Vec::new();
        let mut warnings = Vec::new();

        let [width, height] = self.display.resolution;
        if width == 0 || height == 0 {
            problems.push(format!("display.resolution must be positive, got {width}x{height}"));
        }

        let saturations = [
            ("display.saturation", self.display.saturation),
            ("photo_cycle.saturation", self.photo_cycle.saturation),
            ("tumblr_rss.saturation", self.tumblr_rss.saturation),
            ("deviantart_rss.saturation", self.deviantart_rss.saturation),
            ("news_feed.saturation", self.news_feed.saturation),
            ("weather.saturation", self.weather.saturation),
        ];
        for (key, value) in saturations {
            if !(0.0..=1.0).contains(&value) {
                problems.push(format!("{key} must be between 0 and 1, got {value}"));
            }
        }

        let durations = [
            ("scheduler.tick_interval", self.scheduler.tick_interval),
            ("photo_cycle.display_time", self.photo_cycle.display_time),
            ("tumblr_rss.display_time", self.tumblr_rss.display_time),
            ("tumblr_rss.update_interval", self.tumblr_rss.update_interval),
            ("deviantart_rss.display_time", self.deviantart_rss.display_time),
            ("deviantart_rss.update_interval", self.deviantart_rss.update_interval),
            ("news_feed.display_time", self.news_feed.display_time),
            ("news_feed.update_interval", self.news_feed.update_interval),
            ("weather.display_time", self.weather.display_time),
            ("http.timeout", self.http.timeout),
        ];
        for (key, value) in durations {
            if value.is_zero() {
                problems.push(format!("{key} must not be zero"));
            }
        }

        if !(-90.0..=90.0).contains(&self.weather.latitude) {
            problems.push(format!("weather.latitude out of range: {}", self.weather.latitude));
        }
        if !(-180.0..=180.0).contains(&self.weather.longitude) {
            problems.push(format!("weather.longitude out of range: {}", self.weather.longitude));
        }

        if self.photo_cycle.enabled && self.photo_cycle.supported_formats.is_empty() {
            problems.push("photo_cycle.supported_formats must not be empty".to_string());
        }

        if self.news_feed.enabled && self.news_feed.feeds.is_empty() {
            warnings.push("news_feed is enabled but has no feeds".to_string());
        }

        if self.deviantart_rss.enabled
            && self.deviantart_rss.feed_url.is_none()
            && self.deviantart_rss.username.is_none()
        {
            problems.push("deviantart_rss needs either feed_url or username".to_string());
        }

        for (button, target) in &self.buttons {
            match target.parse::<ModeName>() {
                Ok(mode) if !self.is_enabled(mode) => {
                    warnings.push(format!("Button {button} selects disabled mode '{mode}'"));
                }
                Ok(_) => {}
                Err(_) => warnings.push(format!("Button {button} selects unknown mode '{target}'")),
            }
        }

        if !self.is_enabled(self.scheduler.initial_mode) {
            warnings.push(format!(
                "scheduler.initial_mode '{}' is disabled",
                self.scheduler.initial_mode
            ));
        }

        if problems.is_empty() {
            Ok(warnings)
        } else {
            Err(ConfigError::Invalid { problems })
        }
    }

    pub fn is_enabled(&self, mode: ModeName) -> bool {
        match mode {
            ModeName::PhotoCycle => self.photo_cycle.enabled,
            ModeName::TumblrRss => self.tumblr_rss.enabled,
            ModeName::DeviantartRss => self.deviantart_rss.enabled,
            ModeName::NewsFeed => self.news_feed.enabled,
            ModeName::Weather => self.weather.enabled,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read configuration file from path '{}'", .path)]
    ReadingFile {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write default configuration to '{}'", .path)]
    WritingFile {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration file '{}'", .path)]
    ParsingConfig {
        path: Utf8PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize configuration")]
    Serializing(#[source] serde_json::Error),

    #[error("Invalid configuration: {}", .problems.join("; "))]
    Invalid { problems: Vec<String> },
}
